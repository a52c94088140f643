use num_complex::Complex;
use std::collections::BTreeMap;
use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::{debug, warn};

use crate::error::SimulationError;
use crate::gate::{GateKind, GatePlacement};
use crate::grid::GridDims;

pub type ComplexF64 = Complex<f64>;

/// Qubit cap of [`StateVectorSimulator::default`]; 2^20 amplitudes.
pub const DEFAULT_MAX_QUBITS: usize = 20;

/// Consumes an immutable snapshot and reports the resulting state.
pub trait Simulator: Send + Sync {
    fn run(&self, dims: GridDims, placements: &[GatePlacement]) -> Result<StateVector, SimulationError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct StateVector {
    pub amplitudes: Vec<ComplexF64>,
    pub num_qubits: usize,
}

impl StateVector {
    pub fn new(num_qubits: usize) -> Self {
        let n = 1 << num_qubits;
        let mut amplitudes = vec![ComplexF64::new(0.0, 0.0); n];
        amplitudes[0] = ComplexF64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    pub fn apply(&mut self, gate: &GatePlacement) {
        let q = gate.qubit();
        let theta = gate.parameter().unwrap_or(0.0);
        match (gate.kind(), gate.target_qubit()) {
            (GateKind::H, _) => self.apply_h(q),
            (GateKind::X, _) => self.apply_x(q),
            (GateKind::Y, _) => self.apply_y(q),
            (GateKind::Z, _) => self.apply_phase(q, PI),
            (GateKind::S, _) => self.apply_phase(q, PI / 2.0),
            (GateKind::Sdg, _) => self.apply_phase(q, -PI / 2.0),
            (GateKind::T, _) => self.apply_phase(q, PI / 4.0),
            (GateKind::Tdg, _) => self.apply_phase(q, -PI / 4.0),
            (GateKind::Sx, _) => self.apply_sx(q),
            (GateKind::Rx, _) => self.apply_rx(q, theta),
            (GateKind::Ry, _) => self.apply_ry(q, theta),
            (GateKind::Rz, _) => self.apply_rz(q, theta),
            (GateKind::P, _) => self.apply_phase(q, theta),
            (GateKind::Cx, Some(t)) => self.apply_controlled(q, t, |s, t| s.apply_x(t)),
            (GateKind::Cy, Some(t)) => self.apply_controlled(q, t, |s, t| s.apply_y(t)),
            (GateKind::Ch, Some(t)) => self.apply_controlled(q, t, |s, t| s.apply_h(t)),
            (GateKind::Cz, Some(t)) => self.apply_cz(q, t),
            (GateKind::Swap, Some(t)) => self.apply_swap(q, t),
            // Terminal measurement is implied by the distribution.
            (GateKind::Measure, _) => {}
            (_, None) => {}
        }
    }

    /// Applies a single-qubit 2x2 matrix `[[a, b], [c, d]]`.
    fn apply_matrix(&mut self, q: usize, m: [ComplexF64; 4]) {
        let bit = 1 << q;
        for i in 0..self.amplitudes.len() {
            if (i & bit) == 0 {
                let j = i | bit;
                let (a0, a1) = (self.amplitudes[i], self.amplitudes[j]);
                self.amplitudes[i] = m[0] * a0 + m[1] * a1;
                self.amplitudes[j] = m[2] * a0 + m[3] * a1;
            }
        }
    }

    fn apply_h(&mut self, q: usize) {
        let h = ComplexF64::new(FRAC_1_SQRT_2, 0.0);
        self.apply_matrix(q, [h, h, h, -h]);
    }

    fn apply_x(&mut self, q: usize) {
        let bit = 1 << q;
        for i in 0..self.amplitudes.len() {
            if (i & bit) == 0 {
                self.amplitudes.swap(i, i | bit);
            }
        }
    }

    fn apply_y(&mut self, q: usize) {
        let zero = ComplexF64::new(0.0, 0.0);
        let i_comp = ComplexF64::new(0.0, 1.0);
        self.apply_matrix(q, [zero, -i_comp, i_comp, zero]);
    }

    fn apply_sx(&mut self, q: usize) {
        let p = ComplexF64::new(0.5, 0.5);
        let m = ComplexF64::new(0.5, -0.5);
        self.apply_matrix(q, [p, m, m, p]);
    }

    /// diag(1, e^{i·theta}); Z, S, T and P are all of this form.
    fn apply_phase(&mut self, q: usize, theta: f64) {
        let bit = 1 << q;
        let factor = ComplexF64::from_polar(1.0, theta);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if (i & bit) != 0 {
                *amp *= factor;
            }
        }
    }

    fn apply_rx(&mut self, q: usize, theta: f64) {
        let c = ComplexF64::new((theta / 2.0).cos(), 0.0);
        let js = ComplexF64::new(0.0, -(theta / 2.0).sin());
        self.apply_matrix(q, [c, js, js, c]);
    }

    fn apply_ry(&mut self, q: usize, theta: f64) {
        let c = ComplexF64::new((theta / 2.0).cos(), 0.0);
        let s = ComplexF64::new((theta / 2.0).sin(), 0.0);
        self.apply_matrix(q, [c, -s, s, c]);
    }

    fn apply_rz(&mut self, q: usize, theta: f64) {
        let bit = 1 << q;
        let phase = ComplexF64::from_polar(1.0, theta / 2.0);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if (i & bit) != 0 {
                *amp *= phase;
            } else {
                *amp *= phase.conj();
            }
        }
    }

    /// Applies `op` to `target` on the subspace where `control` is 1.
    fn apply_controlled(&mut self, control: usize, target: usize, op: impl Fn(&mut StateVector, usize)) {
        let c_bit = 1 << control;
        let mut branch = self.clone();
        op(&mut branch, target);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if (i & c_bit) != 0 {
                *amp = branch.amplitudes[i];
            }
        }
    }

    fn apply_cz(&mut self, control: usize, target: usize) {
        let mask = (1 << control) | (1 << target);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if (i & mask) == mask {
                *amp = -*amp;
            }
        }
    }

    fn apply_swap(&mut self, q1: usize, q2: usize) {
        let bit1 = 1 << q1;
        let bit2 = 1 << q2;
        for i in 0..self.amplitudes.len() {
            if (i & bit1) != 0 && (i & bit2) == 0 {
                let j = (i & !bit1) | bit2;
                self.amplitudes.swap(i, j);
            }
        }
    }

    /// Measurement outcome probabilities keyed by bitstring, qubit `n-1`
    /// leftmost. Outcomes with negligible probability are omitted.
    pub fn distribution(&self) -> BTreeMap<String, f64> {
        self.amplitudes
            .iter()
            .enumerate()
            .filter_map(|(i, amp)| {
                let prob = amp.norm_sqr();
                (prob > 1e-12).then(|| (format_bitstring(i, self.num_qubits), prob))
            })
            .collect()
    }

    pub fn qubit_probabilities(&self) -> Vec<QubitProbability> {
        let mut probs = vec![QubitProbability::default(); self.num_qubits];
        for (i, amp) in self.amplitudes.iter().enumerate() {
            let prob = amp.norm_sqr();
            for (q, p) in probs.iter_mut().enumerate() {
                if (i & (1 << q)) != 0 {
                    p.prob1 += prob;
                } else {
                    p.prob0 += prob;
                }
            }
        }
        probs
    }

    /// Bloch vector `(x, y, z)` of the reduced state of `qubit`.
    pub fn bloch_vector(&self, qubit: usize) -> [f64; 3] {
        let bit = 1 << qubit;
        let mut rho01 = ComplexF64::new(0.0, 0.0);
        let mut p0 = 0.0;
        let mut p1 = 0.0;
        for (i, amp) in self.amplitudes.iter().enumerate() {
            if (i & bit) == 0 {
                p0 += amp.norm_sqr();
                rho01 += amp * self.amplitudes[i | bit].conj();
            } else {
                p1 += amp.norm_sqr();
            }
        }
        [2.0 * rho01.re, -2.0 * rho01.im, p0 - p1]
    }
}

pub fn format_bitstring(state: usize, num_qubits: usize) -> String {
    (0..num_qubits)
        .rev()
        .map(|i| if state & (1 << i) != 0 { '1' } else { '0' })
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct QubitProbability {
    pub prob0: f64,
    pub prob1: f64,
}

/// Dense state-vector simulator.
#[derive(Clone, Debug)]
pub struct StateVectorSimulator {
    pub max_qubits: usize,
}

impl Default for StateVectorSimulator {
    fn default() -> Self {
        Self {
            max_qubits: DEFAULT_MAX_QUBITS,
        }
    }
}

impl Simulator for StateVectorSimulator {
    fn run(&self, dims: GridDims, placements: &[GatePlacement]) -> Result<StateVector, SimulationError> {
        if dims.num_qubits > self.max_qubits {
            return Err(SimulationError::TooManyQubits {
                num_qubits: dims.num_qubits,
                max: self.max_qubits,
            });
        }
        let mut gates: Vec<&GatePlacement> = placements.iter().collect();
        gates.sort_by_key(|g| g.canonical_key());

        let mut state = StateVector::new(dims.num_qubits);
        for gate in gates {
            if gate.qubits().any(|q| q >= dims.num_qubits) {
                return Err(SimulationError::InvalidCircuit(format!(
                    "{} at step {} touches a qubit outside the {}-qubit register",
                    gate.kind(),
                    gate.step(),
                    dims.num_qubits
                )));
            }
            state.apply(gate);
        }
        debug!(qubits = dims.num_qubits, gates = placements.len(), "simulated circuit");
        Ok(state)
    }
}

/// Runs `simulator` on a background thread. The caller keeps ownership of its
/// model; the worker only sees the owned snapshot.
pub fn spawn_simulation<S>(
    simulator: Arc<S>,
    dims: GridDims,
    snapshot: Vec<GatePlacement>,
) -> Receiver<Result<StateVector, SimulationError>>
where
    S: Simulator + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = simulator.run(dims, &snapshot);
        if tx.send(result).is_err() {
            warn!("simulation result dropped, receiver gone");
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(q: usize, gates: Vec<GatePlacement>) -> StateVector {
        StateVectorSimulator::default()
            .run(GridDims::new(q, 8).unwrap(), &gates)
            .unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn hadamard_gives_even_split() {
        let s = run(1, vec![GatePlacement::single(GateKind::H, 0, 0).unwrap()]);
        let d = s.distribution();
        assert!(close(d["0"], 0.5) && close(d["1"], 0.5));
        let [x, y, z] = s.bloch_vector(0);
        assert!(close(x, 1.0) && close(y, 0.0) && close(z, 0.0));
    }

    #[test]
    fn bell_state_is_correlated() {
        let s = run(
            2,
            vec![
                GatePlacement::single(GateKind::H, 0, 0).unwrap(),
                GatePlacement::controlled(GateKind::Cx, 0, 1, 1).unwrap(),
                GatePlacement::single(GateKind::Measure, 0, 2).unwrap(),
            ],
        );
        let d = s.distribution();
        assert_eq!(d.keys().collect::<Vec<_>>(), vec!["00", "11"]);
        assert!(close(d["00"], 0.5));
    }

    #[test]
    fn bitstrings_put_highest_qubit_first() {
        let s = run(3, vec![GatePlacement::single(GateKind::X, 0, 0).unwrap()]);
        assert_eq!(s.distribution().keys().next().map(String::as_str), Some("001"));
        let probs = s.qubit_probabilities();
        assert!(close(probs[0].prob1, 1.0) && close(probs[2].prob0, 1.0));
    }

    #[test]
    fn sx_squared_is_x() {
        let s = run(
            1,
            vec![
                GatePlacement::single(GateKind::Sx, 0, 0).unwrap(),
                GatePlacement::single(GateKind::Sx, 0, 1).unwrap(),
            ],
        );
        assert!(close(s.distribution()["1"], 1.0));
    }

    #[test]
    fn ry_and_phase_set_bloch_direction() {
        let s = run(
            1,
            vec![
                GatePlacement::rotation(GateKind::Ry, 0, 0, PI / 2.0).unwrap(),
                GatePlacement::single(GateKind::S, 0, 1).unwrap(),
            ],
        );
        let [x, y, z] = s.bloch_vector(0);
        assert!(close(x, 0.0) && close(y, 1.0) && close(z, 0.0));
    }

    #[test]
    fn controlled_gates_respect_control() {
        let s = run(2, vec![GatePlacement::controlled(GateKind::Ch, 0, 1, 0).unwrap()]);
        assert!(close(s.distribution()["00"], 1.0));
        let s = run(
            2,
            vec![
                GatePlacement::single(GateKind::X, 1, 0).unwrap(),
                GatePlacement::controlled(GateKind::Swap, 0, 1, 1).unwrap(),
                GatePlacement::controlled(GateKind::Cy, 1, 0, 2).unwrap(),
            ],
        );
        assert!(close(s.distribution()["01"], 1.0));
    }

    #[test]
    fn too_many_qubits_is_reported() {
        let sim = StateVectorSimulator { max_qubits: 2 };
        assert_eq!(
            sim.run(GridDims::new(3, 1).unwrap(), &[]),
            Err(SimulationError::TooManyQubits { num_qubits: 3, max: 2 })
        );
    }

    #[test]
    fn background_run_delivers_result() {
        let rx = spawn_simulation(
            Arc::new(StateVectorSimulator::default()),
            GridDims::new(1, 1).unwrap(),
            vec![GatePlacement::single(GateKind::X, 0, 0).unwrap()],
        );
        let state = rx.recv().unwrap().unwrap();
        assert!(close(state.distribution()["1"], 1.0));
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CircuitError, CircuitResult, RangeError};
use crate::gate::{GateKind, GatePlacement};
use crate::history::History;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub num_qubits: usize,
    pub num_steps: usize,
}

impl GridDims {
    pub fn new(num_qubits: usize, num_steps: usize) -> CircuitResult<Self> {
        if num_qubits == 0 || num_steps == 0 {
            return Err(RangeError::EmptyGrid {
                num_qubits,
                num_steps,
            }
            .into());
        }
        Ok(Self {
            num_qubits,
            num_steps,
        })
    }

    pub fn check_qubit(&self, qubit: usize) -> CircuitResult<()> {
        if qubit >= self.num_qubits {
            return Err(RangeError::QubitOutOfBounds {
                qubit,
                num_qubits: self.num_qubits,
            }
            .into());
        }
        Ok(())
    }

    pub fn check_step(&self, step: usize) -> CircuitResult<()> {
        if step >= self.num_steps {
            return Err(RangeError::StepOutOfBounds {
                step,
                num_steps: self.num_steps,
            }
            .into());
        }
        Ok(())
    }
}

/// Sparse placement set keyed by `(step, qubit)` of the anchor, so iteration
/// order is the canonical order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CircuitGrid {
    gates: BTreeMap<(usize, usize), GatePlacement>,
}

impl CircuitGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Placements in `(step, qubit)` order.
    pub fn placements(&self) -> impl Iterator<Item = &GatePlacement> {
        self.gates.values()
    }

    fn gates_at_step(&self, step: usize) -> impl Iterator<Item = &GatePlacement> {
        self.gates.range((step, 0)..=(step, usize::MAX)).map(|(_, g)| g)
    }

    /// The gate anchored at `(qubit, step)` or reserving it as a target.
    pub fn gate_at(&self, qubit: usize, step: usize) -> Option<&GatePlacement> {
        if let Some(g) = self.gates.get(&(step, qubit)) {
            return Some(g);
        }
        self.gates_at_step(step).find(|g| g.target_qubit() == Some(qubit))
    }

    pub fn anchored_at(&self, qubit: usize, step: usize) -> Option<&GatePlacement> {
        self.gates.get(&(step, qubit))
    }

    pub fn is_occupied(&self, qubit: usize, step: usize) -> bool {
        self.gate_at(qubit, step).is_some()
    }

    /// Inserts `gate` after checking bounds and occupancy. Leaves the grid
    /// untouched on error.
    pub fn place(&mut self, dims: GridDims, gate: GatePlacement) -> CircuitResult<()> {
        dims.check_qubit(gate.qubit())?;
        dims.check_step(gate.step())?;
        if let Some(t) = gate.target_qubit() {
            dims.check_qubit(t)?;
        }
        for q in gate.qubits() {
            if self.is_occupied(q, gate.step()) {
                return Err(CircuitError::OccupiedCell {
                    qubit: q,
                    step: gate.step(),
                });
            }
        }
        self.check_measure_order(&gate)?;
        self.gates.insert(gate.canonical_key(), gate);
        Ok(())
    }

    /// A measurement is the last thing on its wire, so the generated text
    /// (which lists measurements last) packs back into the same width.
    fn check_measure_order(&self, gate: &GatePlacement) -> CircuitResult<()> {
        for q in gate.qubits() {
            for other in self.placements().filter(|g| g.qubits().any(|oq| oq == q)) {
                let order = if other.kind() == GateKind::Measure && other.step() < gate.step() {
                    Some((other.step(), gate.step()))
                } else if gate.kind() == GateKind::Measure && other.step() > gate.step() {
                    Some((gate.step(), other.step()))
                } else {
                    None
                };
                if let Some((measured_at, step)) = order {
                    return Err(RangeError::AfterMeasure {
                        qubit: q,
                        step,
                        measured_at,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Removes the gate covering `(qubit, step)`, whether anchored or reserved.
    pub fn remove_at(&mut self, qubit: usize, step: usize) -> Option<GatePlacement> {
        let key = self.gate_at(qubit, step)?.canonical_key();
        self.gates.remove(&key)
    }

    pub fn cell_info(&self, qubit: usize, step: usize) -> CellInfo {
        let mut info = CellInfo::default();

        if let Some(gate) = self.gate_at(qubit, step) {
            info.is_control = gate.target_qubit().is_some() && gate.qubit() == qubit;
            info.is_target = gate.target_qubit() == Some(qubit);
            info.gate = Some(gate.clone());
        }

        // Vertical connections
        for g in self.gates_at_step(step) {
            let Some(t) = g.target_qubit() else {
                continue;
            };
            let (min_q, max_q) = (g.qubit().min(t), g.qubit().max(t));
            if qubit >= min_q && qubit <= max_q {
                if qubit > min_q {
                    info.vert_above = true;
                }
                if qubit < max_q {
                    info.vert_below = true;
                }
                if qubit > min_q && qubit < max_q && info.gate.is_none() {
                    info.pass_through = true;
                }
            }
        }

        info
    }
}

/// What the grid view needs to draw one cell.
#[derive(Clone, Debug, Default)]
pub struct CellInfo {
    pub gate: Option<GatePlacement>,
    pub is_control: bool,
    pub is_target: bool,
    pub vert_above: bool,
    pub vert_below: bool,
    pub pass_through: bool,
}

/// The authoritative circuit: fixed dimensions plus a history of grid
/// snapshots whose cursor is the current state.
#[derive(Clone, Debug)]
pub struct GridModel {
    dims: GridDims,
    history: History<CircuitGrid>,
}

impl GridModel {
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            history: History::new(CircuitGrid::new()),
        }
    }

    /// Builds a model whose baseline already holds `placements`, validated
    /// with the same rules as [`GridModel::replace_all`].
    pub fn from_placements<I>(dims: GridDims, placements: I, history_limit: Option<usize>) -> CircuitResult<Self>
    where
        I: IntoIterator<Item = GatePlacement>,
    {
        let mut grid = CircuitGrid::new();
        for gate in placements {
            grid.place(dims, gate)?;
        }
        let history = match history_limit {
            Some(limit) => History::with_limit(grid, limit),
            None => History::new(grid),
        };
        Ok(Self { dims, history })
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn grid(&self) -> &CircuitGrid {
        self.history.current()
    }

    pub fn gate_at(&self, qubit: usize, step: usize) -> Option<&GatePlacement> {
        self.grid().gate_at(qubit, step)
    }

    /// All placements in canonical `(step, qubit)` order.
    pub fn snapshot(&self) -> Vec<GatePlacement> {
        self.grid().placements().cloned().collect()
    }

    pub fn add_gate(
        &mut self,
        kind: GateKind,
        qubit: usize,
        step: usize,
        target_qubit: Option<usize>,
        parameter: Option<f64>,
    ) -> CircuitResult<GatePlacement> {
        let gate = GatePlacement::new(kind, qubit, step, target_qubit, parameter)?;
        let mut next = self.grid().clone();
        next.place(self.dims, gate.clone())?;
        debug!(%kind, qubit, step, ?target_qubit, "add gate");
        self.history.commit(next);
        Ok(gate)
    }

    /// Returns whether a gate was removed.
    pub fn remove_gate(&mut self, qubit: usize, step: usize) -> bool {
        let mut next = self.grid().clone();
        match next.remove_at(qubit, step) {
            Some(removed) => {
                debug!(kind = %removed.kind(), qubit, step, "remove gate");
                self.history.commit(next);
                true
            }
            None => false,
        }
    }

    /// Moves the gate anchored at the source cell. Either the whole move
    /// happens or nothing changes. A two-qubit gate keeps its target wire.
    pub fn move_gate(
        &mut self,
        from_qubit: usize,
        from_step: usize,
        to_qubit: usize,
        to_step: usize,
    ) -> CircuitResult<GatePlacement> {
        let mut next = self.grid().clone();
        let Some(original) = next.anchored_at(from_qubit, from_step).cloned() else {
            return Err(RangeError::NoGate {
                qubit: from_qubit,
                step: from_step,
            }
            .into());
        };
        if (from_qubit, from_step) == (to_qubit, to_step) {
            return Ok(original);
        }
        next.remove_at(from_qubit, from_step);
        let moved = original.at(to_qubit, to_step)?;
        next.place(self.dims, moved.clone())?;
        debug!(kind = %moved.kind(), from_qubit, from_step, to_qubit, to_step, "move gate");
        self.history.commit(next);
        Ok(moved)
    }

    /// Installs a whole new placement set as one history step, or nothing if
    /// any placement is invalid.
    pub fn replace_all<I>(&mut self, placements: I) -> CircuitResult<()>
    where
        I: IntoIterator<Item = GatePlacement>,
    {
        let mut next = CircuitGrid::new();
        for gate in placements {
            next.place(self.dims, gate)?;
        }
        debug!(gates = next.len(), "replace all placements");
        self.history.commit(next);
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_depth(&self) -> usize {
        self.history.depth()
    }
}

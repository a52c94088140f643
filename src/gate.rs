use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CircuitError, RangeError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateKind {
    H,
    X,
    Y,
    Z,
    S,
    Sdg,
    T,
    Tdg,
    Sx,
    Rx,
    Ry,
    Rz,
    P,
    #[serde(alias = "CNOT")]
    Cx,
    Cy,
    Cz,
    Ch,
    Swap,
    Measure,
}

impl GateKind {
    pub const ALL: [GateKind; 19] = [
        GateKind::H,
        GateKind::X,
        GateKind::Y,
        GateKind::Z,
        GateKind::S,
        GateKind::Sdg,
        GateKind::T,
        GateKind::Tdg,
        GateKind::Sx,
        GateKind::Rx,
        GateKind::Ry,
        GateKind::Rz,
        GateKind::P,
        GateKind::Cx,
        GateKind::Cy,
        GateKind::Cz,
        GateKind::Ch,
        GateKind::Swap,
        GateKind::Measure,
    ];

    /// Lowercase mnemonic used in program text.
    pub fn mnemonic(self) -> &'static str {
        match self {
            GateKind::H => "h",
            GateKind::X => "x",
            GateKind::Y => "y",
            GateKind::Z => "z",
            GateKind::S => "s",
            GateKind::Sdg => "sdg",
            GateKind::T => "t",
            GateKind::Tdg => "tdg",
            GateKind::Sx => "sx",
            GateKind::Rx => "rx",
            GateKind::Ry => "ry",
            GateKind::Rz => "rz",
            GateKind::P => "p",
            GateKind::Cx => "cx",
            GateKind::Cy => "cy",
            GateKind::Cz => "cz",
            GateKind::Ch => "ch",
            GateKind::Swap => "swap",
            GateKind::Measure => "measure",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<GateKind> {
        let lower = s.to_ascii_lowercase();
        if lower == "cnot" {
            return Some(GateKind::Cx);
        }
        GateKind::ALL.into_iter().find(|k| k.mnemonic() == lower)
    }

    /// Number of qubit operands.
    pub fn arity(self) -> usize {
        if self.is_two_qubit() { 2 } else { 1 }
    }

    pub fn is_two_qubit(self) -> bool {
        matches!(
            self,
            GateKind::Cx | GateKind::Cy | GateKind::Cz | GateKind::Ch | GateKind::Swap
        )
    }

    pub fn is_parameterized(self) -> bool {
        matches!(self, GateKind::Rx | GateKind::Ry | GateKind::Rz | GateKind::P)
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic().to_ascii_uppercase())
    }
}

/// One gate at a grid coordinate.
///
/// Constructed only through [`GatePlacement::new`], which guarantees the
/// placement carries a target exactly when its kind is a two-qubit gate and a
/// finite parameter exactly when its kind is parameterized. Grid bounds and
/// occupancy are checked by the grid model, not here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PlacementRecord", into = "PlacementRecord")]
pub struct GatePlacement {
    kind: GateKind,
    qubit: usize,
    step: usize,
    target_qubit: Option<usize>,
    parameter: Option<f64>,
}

impl GatePlacement {
    pub fn new(
        kind: GateKind,
        qubit: usize,
        step: usize,
        target_qubit: Option<usize>,
        parameter: Option<f64>,
    ) -> Result<Self, CircuitError> {
        match (kind.is_two_qubit(), target_qubit) {
            (true, None) => return Err(RangeError::MissingTarget { kind }.into()),
            (false, Some(_)) => return Err(RangeError::UnexpectedTarget { kind }.into()),
            (true, Some(t)) if t == qubit => {
                return Err(RangeError::SameQubit { kind, qubit }.into());
            }
            _ => {}
        }
        match (kind.is_parameterized(), parameter) {
            (true, None) => return Err(RangeError::MissingParameter { kind }.into()),
            (false, Some(_)) => return Err(RangeError::UnexpectedParameter { kind }.into()),
            (true, Some(value)) if !value.is_finite() => {
                return Err(RangeError::NonFiniteParameter { kind, value }.into());
            }
            _ => {}
        }
        Ok(Self {
            kind,
            qubit,
            step,
            target_qubit,
            parameter,
        })
    }

    pub fn single(kind: GateKind, qubit: usize, step: usize) -> Result<Self, CircuitError> {
        Self::new(kind, qubit, step, None, None)
    }

    pub fn rotation(kind: GateKind, qubit: usize, step: usize, angle: f64) -> Result<Self, CircuitError> {
        Self::new(kind, qubit, step, None, Some(angle))
    }

    pub fn controlled(
        kind: GateKind,
        control: usize,
        target: usize,
        step: usize,
    ) -> Result<Self, CircuitError> {
        Self::new(kind, control, step, Some(target), None)
    }

    pub fn kind(&self) -> GateKind {
        self.kind
    }

    pub fn qubit(&self) -> usize {
        self.qubit
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn target_qubit(&self) -> Option<usize> {
        self.target_qubit
    }

    pub fn parameter(&self) -> Option<f64> {
        self.parameter
    }

    /// Same gate relocated; shape was validated when `self` was built.
    pub fn at(&self, qubit: usize, step: usize) -> Result<Self, CircuitError> {
        Self::new(self.kind, qubit, step, self.target_qubit, self.parameter)
    }

    /// Qubits whose cell at `step` this placement occupies or reserves.
    pub fn qubits(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.qubit).chain(self.target_qubit)
    }

    /// Canonical `(step, qubit)` ordering key.
    pub fn canonical_key(&self) -> (usize, usize) {
        (self.step, self.qubit)
    }
}

#[derive(Serialize, Deserialize)]
struct PlacementRecord {
    kind: GateKind,
    qubit: usize,
    step: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_qubit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameter: Option<f64>,
}

impl TryFrom<PlacementRecord> for GatePlacement {
    type Error = CircuitError;

    fn try_from(r: PlacementRecord) -> Result<Self, Self::Error> {
        GatePlacement::new(r.kind, r.qubit, r.step, r.target_qubit, r.parameter)
    }
}

impl From<GatePlacement> for PlacementRecord {
    fn from(p: GatePlacement) -> Self {
        PlacementRecord {
            kind: p.kind,
            qubit: p.qubit,
            step: p.step,
            target_qubit: p.target_qubit,
            parameter: p.parameter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonics_round_trip() {
        for kind in GateKind::ALL {
            assert_eq!(GateKind::from_mnemonic(kind.mnemonic()), Some(kind));
        }
        assert_eq!(GateKind::from_mnemonic("CNOT"), Some(GateKind::Cx));
        assert_eq!(GateKind::from_mnemonic("RX"), Some(GateKind::Rx));
        assert_eq!(GateKind::from_mnemonic("ccx"), None);
    }

    #[test]
    fn two_qubit_gate_needs_distinct_target() {
        assert!(matches!(
            GatePlacement::new(GateKind::Cx, 0, 0, None, None),
            Err(CircuitError::InvalidRange(RangeError::MissingTarget { .. }))
        ));
        assert!(matches!(
            GatePlacement::controlled(GateKind::Cz, 1, 1, 0),
            Err(CircuitError::InvalidRange(RangeError::SameQubit { qubit: 1, .. }))
        ));
        assert!(GatePlacement::controlled(GateKind::Swap, 1, 0, 0).is_ok());
    }

    #[test]
    fn parameter_presence_follows_kind() {
        assert!(matches!(
            GatePlacement::single(GateKind::Rx, 0, 0),
            Err(CircuitError::InvalidRange(RangeError::MissingParameter { .. }))
        ));
        assert!(matches!(
            GatePlacement::new(GateKind::H, 0, 0, None, Some(1.0)),
            Err(CircuitError::InvalidRange(RangeError::UnexpectedParameter { .. }))
        ));
        assert!(matches!(
            GatePlacement::rotation(GateKind::P, 0, 0, f64::NAN),
            Err(CircuitError::InvalidRange(RangeError::NonFiniteParameter { .. }))
        ));
        let p = GatePlacement::rotation(GateKind::Ry, 2, 3, -12.5).unwrap();
        assert_eq!(p.parameter(), Some(-12.5));
    }

    #[test]
    fn serde_revalidates_shape() {
        let ok: GatePlacement =
            serde_json::from_str(r#"{"kind":"CNOT","qubit":0,"step":1,"target_qubit":2}"#).unwrap();
        assert_eq!(ok.kind(), GateKind::Cx);
        assert_eq!(ok.target_qubit(), Some(2));

        let bad = serde_json::from_str::<GatePlacement>(r#"{"kind":"H","qubit":0,"step":0,"target_qubit":1}"#);
        assert!(bad.is_err());

        let json = serde_json::to_string(&GatePlacement::single(GateKind::Sdg, 1, 4).unwrap()).unwrap();
        assert_eq!(json, r#"{"kind":"SDG","qubit":1,"step":4}"#);
    }
}

//! Grid → program text.
//!
//! The output is OpenQASM 2.0 restricted to the instruction vocabulary the
//! [`crate::parser`] understands. Identical placement sets always produce
//! byte-identical text.

use crate::gate::{GateKind, GatePlacement};
use crate::grid::GridDims;
use crate::params::format_param;

pub const HEADER: &str = "OPENQASM 2.0;\ninclude \"qelib1.inc\";\n";

/// Renders `placements` in canonical `(step, qubit)` order, with every
/// measurement moved after all other instructions.
pub fn generate(dims: GridDims, placements: &[GatePlacement]) -> String {
    let mut ordered: Vec<&GatePlacement> = placements.iter().collect();
    ordered.sort_by_key(|g| g.canonical_key());
    let (measures, gates): (Vec<&GatePlacement>, Vec<&GatePlacement>) = ordered
        .into_iter()
        .partition(|g| g.kind() == GateKind::Measure);

    let mut sb = String::from(HEADER);
    sb.push_str(&format!("qreg q[{}];\n", dims.num_qubits));
    sb.push_str(&format!("creg c[{}];\n", dims.num_qubits));

    for gate in gates.into_iter().chain(measures) {
        sb.push_str(&write_instruction(gate));
    }

    sb
}

fn write_instruction(gate: &GatePlacement) -> String {
    let kind = gate.kind();
    let q = gate.qubit();
    match (kind, gate.target_qubit(), gate.parameter()) {
        (GateKind::Measure, _, _) => format!("measure q[{q}] -> c[{q}];\n"),
        (_, Some(t), _) => format!("{} q[{q}], q[{t}];\n", kind.mnemonic()),
        (_, None, Some(angle)) => {
            format!("{}({}) q[{q}];\n", kind.mnemonic(), format_param(angle))
        }
        (_, None, None) => format!("{} q[{q}];\n", kind.mnemonic()),
    }
}

//! Program text → grid placements.
//!
//! Plain instruction text carries no column numbers, so steps are rebuilt by
//! packing: every qubit keeps a next-free-step counter, and each instruction,
//! taken in text order, lands on the earliest step free on all of its qubits.

use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{CircuitResult, RangeError, SyntaxError, SyntaxErrorKind};
use crate::gate::{GateKind, GatePlacement};
use crate::grid::GridDims;
use crate::params::parse_param_expr;

// ── Lazy-compiled regex patterns ──────────────────────────────────────────────

fn version_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^OPENQASM\s+\d+(?:\.\d+)?$").expect("valid pattern"))
}

fn include_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"^include\s+"[^"]*"$"#).expect("valid pattern"))
}

fn register_decl_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"^(qreg|creg)\s+(\w+)\s*\[\s*(\d+)\s*\]$").expect("valid pattern")
    })
}

fn measure_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^(?i:measure)\s+(.+?)\s*->\s*(.+)$").expect("valid pattern"))
}

fn gate_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"^([A-Za-z_]\w*)\s*(?:\(([^)]*)\))?\s*(.*)$").expect("valid pattern")
    })
}

fn operand_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^(\w+)\s*(?:\[\s*(\d+)\s*\])?$").expect("valid pattern"))
}

// ── Parser state ──────────────────────────────────────────────────────────────

/// One statement's location, used to build errors.
#[derive(Clone, Copy)]
struct Span<'a> {
    line: usize,
    raw: &'a str,
    code: &'a str,
}

impl Span<'_> {
    /// Columns count characters, not bytes. `fragment` must borrow from `raw`.
    fn error_at(&self, fragment: &str, kind: SyntaxErrorKind) -> SyntaxError {
        let mut offset = (fragment.as_ptr() as usize)
            .saturating_sub(self.raw.as_ptr() as usize)
            .min(self.raw.len());
        while !self.raw.is_char_boundary(offset) {
            offset -= 1;
        }
        SyntaxError::new(self.line, self.raw[..offset].chars().count() + 1, kind)
    }

    fn error(&self, kind: SyntaxErrorKind) -> SyntaxError {
        self.error_at(self.code, kind)
    }
}

/// A qubit or bit reference: `q[3]` or the whole register `q`.
struct Operand<'a> {
    index: Option<usize>,
    text: &'a str,
}

struct Parser {
    dims: GridDims,
    qreg_size: Option<usize>,
    creg_size: Option<usize>,
    /// Highest qubit and classical bit index referenced so far.
    highest_qubit: Option<usize>,
    highest_bit: Option<usize>,
    next_free: Vec<usize>,
    measured: Vec<bool>,
    placements: Vec<GatePlacement>,
}

/// Parses program text into placements for a grid of `dims`.
///
/// Fails with a syntax error on the first malformed line, or with
/// `InvalidRange` when the program needs more qubits or steps than the grid
/// has. A measured qubit takes no further instructions. On failure nothing is
/// returned.
pub fn parse(text: &str, dims: GridDims) -> CircuitResult<Vec<GatePlacement>> {
    let mut parser = Parser {
        dims,
        qreg_size: None,
        creg_size: None,
        highest_qubit: None,
        highest_bit: None,
        next_free: vec![0; dims.num_qubits],
        measured: vec![false; dims.num_qubits],
        placements: Vec::new(),
    };

    for (idx, raw) in text.lines().enumerate() {
        let code = strip_comment(raw).trim();
        if code.is_empty() {
            continue;
        }
        let code = code.strip_suffix(';').unwrap_or(code).trim_end();
        if code.is_empty() {
            continue;
        }
        let span = Span {
            line: idx + 1,
            raw,
            code,
        };
        parser.statement(span)?;
    }

    let mut placements = parser.placements;
    placements.sort_by_key(|g| g.canonical_key());
    debug!(gates = placements.len(), "parsed program text");
    Ok(placements)
}

fn strip_comment(raw: &str) -> &str {
    match raw.find("//") {
        Some(pos) => &raw[..pos],
        None => raw,
    }
}

impl Parser {
    fn statement(&mut self, span: Span<'_>) -> CircuitResult<()> {
        let code = span.code;

        if version_re().is_match(code) || include_re().is_match(code) {
            return Ok(());
        }

        if let Some(caps) = register_decl_re().captures(code) {
            return self.declare_register(span, &caps);
        }

        if let Some(caps) = measure_re().captures(code) {
            return self.measure(span, &caps);
        }

        let Some(caps) = gate_re().captures(code) else {
            return Err(span.error(SyntaxErrorKind::MalformedStatement(code.to_string())).into());
        };
        self.gate(span, &caps)
    }

    fn declare_register(&mut self, span: Span<'_>, caps: &Captures<'_>) -> CircuitResult<()> {
        let kind = &caps[1];
        let name = caps.get(2).map_or("", |m| m.as_str());
        let size_str = caps.get(3).map_or("", |m| m.as_str());
        let expected = if kind == "qreg" { "q" } else { "c" };
        if name != expected {
            return Err(span
                .error_at(name, SyntaxErrorKind::UnknownRegister(name.to_string()))
                .into());
        }
        let size: usize = size_str.parse().map_err(|_| {
            span.error_at(size_str, SyntaxErrorKind::MalformedStatement(span.code.to_string()))
        })?;
        let slot = if kind == "qreg" {
            &mut self.qreg_size
        } else {
            &mut self.creg_size
        };
        if slot.is_some() || size == 0 {
            return Err(span
                .error(SyntaxErrorKind::MalformedStatement(span.code.to_string()))
                .into());
        }
        let used = if kind == "qreg" {
            self.highest_qubit
        } else {
            self.highest_bit
        };
        if let Some(index) = used.filter(|&i| i >= size) {
            return Err(span
                .error_at(
                    size_str,
                    SyntaxErrorKind::IndexOutOfBounds {
                        register: expected.to_string(),
                        index,
                        size,
                    },
                )
                .into());
        }
        if kind == "qreg" && size > self.dims.num_qubits {
            return Err(RangeError::RegisterTooLarge {
                declared: size,
                num_qubits: self.dims.num_qubits,
            }
            .into());
        }
        *slot = Some(size);
        Ok(())
    }

    fn qreg_size(&self) -> usize {
        self.qreg_size.unwrap_or(self.dims.num_qubits)
    }

    fn creg_size(&self) -> usize {
        self.creg_size.unwrap_or(self.dims.num_qubits)
    }

    fn measure(&mut self, span: Span<'_>, caps: &Captures<'_>) -> CircuitResult<()> {
        let (Some(src), Some(dst)) = (caps.get(1), caps.get(2)) else {
            return Err(span
                .error(SyntaxErrorKind::MalformedStatement(span.code.to_string()))
                .into());
        };
        let src = self.operand(span, src.as_str(), "q", self.qreg_size())?;
        let dst = self.operand(span, dst.as_str(), "c", self.creg_size())?;

        match (src.index, dst.index) {
            (Some(q), Some(c)) => {
                self.highest_bit = self.highest_bit.max(Some(c));
                self.pack(span, GateKind::Measure, q, None, None)
            }
            (None, None) => {
                let (qubits, bits) = (self.qreg_size(), self.creg_size());
                if bits < qubits {
                    return Err(span
                        .error_at(
                            dst.text,
                            SyntaxErrorKind::IndexOutOfBounds {
                                register: "c".to_string(),
                                index: qubits - 1,
                                size: bits,
                            },
                        )
                        .into());
                }
                self.highest_bit = self.highest_bit.max(Some(qubits - 1));
                for q in 0..qubits {
                    self.pack(span, GateKind::Measure, q, None, None)?;
                }
                Ok(())
            }
            _ => Err(span
                .error_at(dst.text, SyntaxErrorKind::MalformedOperand(dst.text.to_string()))
                .into()),
        }
    }

    fn gate(&mut self, span: Span<'_>, caps: &Captures<'_>) -> CircuitResult<()> {
        let Some(name) = caps.get(1).map(|m| m.as_str()) else {
            return Err(span
                .error(SyntaxErrorKind::MalformedStatement(span.code.to_string()))
                .into());
        };
        let kind = match GateKind::from_mnemonic(name) {
            Some(GateKind::Measure) | None => {
                return Err(span
                    .error_at(name, SyntaxErrorKind::UnknownGate(name.to_string()))
                    .into());
            }
            Some(kind) => kind,
        };

        let params: Vec<&str> = match caps.get(2) {
            Some(m) if !m.as_str().trim().is_empty() => m.as_str().split(',').collect(),
            _ => Vec::new(),
        };
        let expected_params = usize::from(kind.is_parameterized());
        if params.len() != expected_params {
            return Err(span
                .error_at(
                    name,
                    SyntaxErrorKind::WrongParameterCount {
                        gate: name.to_string(),
                        expected: expected_params,
                        got: params.len(),
                    },
                )
                .into());
        }
        let parameter = match params.first() {
            Some(raw) => match parse_param_expr(raw) {
                Some(v) if v.is_finite() => Some(v),
                _ => {
                    return Err(span
                        .error_at(raw, SyntaxErrorKind::InvalidParameter(raw.trim().to_string()))
                        .into());
                }
            },
            None => None,
        };

        let operand_str = caps.get(3).map_or("", |m| m.as_str());
        let raw_operands: Vec<&str> = if operand_str.trim().is_empty() {
            Vec::new()
        } else {
            operand_str.split(',').collect()
        };
        if raw_operands.len() != kind.arity() {
            return Err(span
                .error_at(
                    name,
                    SyntaxErrorKind::WrongOperandCount {
                        gate: name.to_string(),
                        expected: kind.arity(),
                        got: raw_operands.len(),
                    },
                )
                .into());
        }

        let mut qubits = Vec::with_capacity(raw_operands.len());
        for raw in raw_operands {
            let operand = self.operand(span, raw, "q", self.qreg_size())?;
            let Some(index) = operand.index else {
                return Err(span
                    .error_at(operand.text, SyntaxErrorKind::MalformedOperand(operand.text.to_string()))
                    .into());
            };
            if qubits.contains(&index) {
                return Err(span
                    .error_at(operand.text, SyntaxErrorKind::DuplicateQubit(index))
                    .into());
            }
            qubits.push(index);
        }

        self.pack(span, kind, qubits[0], qubits.get(1).copied(), parameter)
    }

    fn operand<'a>(
        &self,
        span: Span<'a>,
        raw: &'a str,
        register: &str,
        size: usize,
    ) -> CircuitResult<Operand<'a>> {
        let text = raw.trim();
        let malformed = || span.error_at(text, SyntaxErrorKind::MalformedOperand(text.to_string()));
        let caps = operand_re().captures(text).ok_or_else(malformed)?;
        let name = caps.get(1).map_or("", |m| m.as_str());
        if name != register {
            return Err(span
                .error_at(text, SyntaxErrorKind::UnknownRegister(name.to_string()))
                .into());
        }
        let index = match caps.get(2) {
            Some(m) => Some(m.as_str().parse::<usize>().map_err(|_| malformed())?),
            None => None,
        };
        if let Some(index) = index {
            if index >= size {
                return Err(span
                    .error_at(
                        text,
                        SyntaxErrorKind::IndexOutOfBounds {
                            register: register.to_string(),
                            index,
                            size,
                        },
                    )
                    .into());
            }
        }
        Ok(Operand {
            index,
            text,
        })
    }

    /// Places one instruction at the earliest step free on all its qubits.
    fn pack(
        &mut self,
        span: Span<'_>,
        kind: GateKind,
        qubit: usize,
        target: Option<usize>,
        parameter: Option<f64>,
    ) -> CircuitResult<()> {
        let qubits = std::iter::once(qubit).chain(target);
        if let Some(q) = qubits.clone().find(|&q| self.measured[q]) {
            return Err(span.error(SyntaxErrorKind::AlreadyMeasured(q)).into());
        }
        let step = qubits.clone().map(|q| self.next_free[q]).max().unwrap_or(0);
        if step >= self.dims.num_steps {
            debug!(line = span.line, step, "program needs more steps than the grid has");
            return Err(RangeError::ProgramTooLong {
                line: span.line,
                step,
                num_steps: self.dims.num_steps,
            }
            .into());
        }
        for q in qubits {
            self.next_free[q] = step + 1;
            self.measured[q] = kind == GateKind::Measure;
            self.highest_qubit = self.highest_qubit.max(Some(q));
        }
        self.placements
            .push(GatePlacement::new(kind, qubit, step, target, parameter)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CircuitError;
    use std::f64::consts::PI;

    fn dims(q: usize, s: usize) -> GridDims {
        GridDims::new(q, s).unwrap()
    }

    fn syntax(result: CircuitResult<Vec<GatePlacement>>) -> SyntaxError {
        match result {
            Err(CircuitError::Syntax(e)) => e,
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    fn cells(placements: &[GatePlacement]) -> Vec<(GateKind, usize, usize, Option<usize>)> {
        placements
            .iter()
            .map(|g| (g.kind(), g.qubit(), g.step(), g.target_qubit()))
            .collect()
    }

    #[test]
    fn empty_program_has_no_gates() {
        assert!(parse("", dims(2, 2)).unwrap().is_empty());
        let header = "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[2];\ncreg c[2];\n";
        assert!(parse(header, dims(2, 2)).unwrap().is_empty());
    }

    #[test]
    fn sequential_gates_on_one_qubit_advance() {
        let p = parse("h q[0];\nx q[0];\nz q[0];", dims(1, 3)).unwrap();
        let steps: Vec<usize> = p.iter().map(|g| g.step()).collect();
        assert_eq!(steps, vec![0, 1, 2]);
    }

    #[test]
    fn independent_gates_share_a_column() {
        let p = parse("h q[0];\nx q[1];", dims(2, 1)).unwrap();
        assert_eq!(
            cells(&p),
            vec![(GateKind::H, 0, 0, None), (GateKind::X, 1, 0, None)]
        );
    }

    #[test]
    fn two_qubit_gate_waits_for_both_wires() {
        let text = "h q[0];\nh q[0];\ny q[2];\ncx q[2], q[0];\nx q[1];\nz q[2];";
        let p = parse(text, dims(3, 4)).unwrap();
        assert_eq!(
            cells(&p),
            vec![
                (GateKind::H, 0, 0, None),
                (GateKind::X, 1, 0, None),
                (GateKind::Y, 2, 0, None),
                (GateKind::H, 0, 1, None),
                (GateKind::Cx, 2, 2, Some(0)),
                (GateKind::Z, 2, 3, None),
            ]
        );
    }

    #[test]
    fn wire_between_control_and_target_stays_free() {
        let p = parse("cx q[0], q[2];\nh q[1];", dims(3, 1)).unwrap();
        assert_eq!(
            cells(&p),
            vec![(GateKind::Cx, 0, 0, Some(2)), (GateKind::H, 1, 0, None)]
        );
    }

    #[test]
    fn tolerates_surface_variation() {
        let text = "  // bell pair\n\nOPENQASM 2.0;\nH   q[ 0 ] ;\n\tCNOT q[0],q[1]   // entangle\nrz( -PI/4 ) q[1]\nry(1e-1) q[0];\n";
        let p = parse(text, dims(2, 3)).unwrap();
        assert_eq!(p.len(), 4);
        assert_eq!(p[1].kind(), GateKind::Cx);
        assert_eq!(p[2].parameter(), Some(0.1));
        assert_eq!(p[3].parameter(), Some(-(PI / 4.0)));
    }

    #[test]
    fn whole_register_measure_expands() {
        let p = parse("x q[1];\nmeasure q -> c;", dims(2, 2)).unwrap();
        assert_eq!(
            cells(&p),
            vec![
                (GateKind::Measure, 0, 0, None),
                (GateKind::X, 1, 0, None),
                (GateKind::Measure, 1, 1, None),
            ]
        );
    }

    #[test]
    fn unknown_gate_is_reported_with_location() {
        let err = syntax(parse("h q[0];\n  ccx q[0], q[1], q[2];", dims(3, 2)));
        assert_eq!((err.line, err.column), (2, 3));
        assert_eq!(err.kind, SyntaxErrorKind::UnknownGate("ccx".into()));
    }

    #[test]
    fn wrong_operand_count_is_rejected() {
        let err = syntax(parse("cx q[0];", dims(2, 2)));
        assert!(matches!(
            err.kind,
            SyntaxErrorKind::WrongOperandCount { expected: 2, got: 1, .. }
        ));
        let err = syntax(parse("h q[0], q[1];", dims(2, 2)));
        assert!(matches!(
            err.kind,
            SyntaxErrorKind::WrongOperandCount { expected: 1, got: 2, .. }
        ));
    }

    #[test]
    fn parameter_errors_are_rejected() {
        let err = syntax(parse("rx q[0];", dims(1, 1)));
        assert!(matches!(err.kind, SyntaxErrorKind::WrongParameterCount { expected: 1, got: 0, .. }));
        let err = syntax(parse("h(0.5) q[0];", dims(1, 1)));
        assert!(matches!(err.kind, SyntaxErrorKind::WrongParameterCount { expected: 0, got: 1, .. }));
        let err = syntax(parse("rx(abc) q[0];", dims(1, 1)));
        assert_eq!(err.kind, SyntaxErrorKind::InvalidParameter("abc".into()));
        assert_eq!(err.column, 4);
        let err = syntax(parse("rx(inf) q[0];", dims(1, 1)));
        assert_eq!(err.kind, SyntaxErrorKind::InvalidParameter("inf".into()));
    }

    #[test]
    fn out_of_range_index_is_a_syntax_error() {
        let err = syntax(parse("x q[0];\nx q[3];", dims(2, 4)));
        assert_eq!(err.line, 2);
        assert!(matches!(err.kind, SyntaxErrorKind::IndexOutOfBounds { index: 3, size: 2, .. }));

        let err = syntax(parse("qreg q[1];\nx q[1];", dims(2, 4)));
        assert!(matches!(err.kind, SyntaxErrorKind::IndexOutOfBounds { index: 1, size: 1, .. }));
    }

    #[test]
    fn nothing_follows_a_measurement() {
        let err = syntax(parse("measure q[0] -> c[0];\ncx q[1], q[0];", dims(2, 4)));
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, SyntaxErrorKind::AlreadyMeasured(0));
        let err = syntax(parse("measure q -> c;\nmeasure q[1] -> c[1];", dims(2, 4)));
        assert_eq!(err.kind, SyntaxErrorKind::AlreadyMeasured(1));
    }

    #[test]
    fn late_register_declaration_must_cover_used_indices() {
        let err = syntax(parse("x q[2];\nqreg q[2];", dims(3, 2)));
        assert_eq!((err.line, err.column), (2, 8));
        assert!(matches!(err.kind, SyntaxErrorKind::IndexOutOfBounds { index: 2, size: 2, .. }));

        let err = syntax(parse("measure q[0] -> c[1];\ncreg c[1];", dims(2, 2)));
        assert!(matches!(err.kind, SyntaxErrorKind::IndexOutOfBounds { index: 1, size: 1, .. }));

        assert!(parse("x q[1];\nqreg q[2];", dims(3, 2)).is_ok());
    }

    #[test]
    fn whole_register_measure_needs_enough_bits() {
        let err = syntax(parse("creg c[1];\nmeasure q -> c;", dims(2, 2)));
        assert_eq!(err.line, 2);
        assert!(matches!(
            err.kind,
            SyntaxErrorKind::IndexOutOfBounds { index: 1, size: 1, ref register } if register == "c"
        ));
    }

    #[test]
    fn columns_count_characters() {
        let err = syntax(parse("\u{a0}\u{a0}bogus q[0];", dims(1, 1)));
        assert_eq!(err.column, 3);
        let err = syntax(parse("cx\u{a0}q[0],\u{a0}q[0];", dims(2, 1)));
        assert_eq!(err.kind, SyntaxErrorKind::DuplicateQubit(0));
        assert_eq!(err.column, 10);
    }

    #[test]
    fn malformed_operands_and_registers() {
        let err = syntax(parse("x r[0];", dims(1, 1)));
        assert_eq!(err.kind, SyntaxErrorKind::UnknownRegister("r".into()));
        let err = syntax(parse("x q[0;", dims(1, 1)));
        assert!(matches!(err.kind, SyntaxErrorKind::MalformedOperand(_)));
        let err = syntax(parse("x q;", dims(1, 1)));
        assert!(matches!(err.kind, SyntaxErrorKind::MalformedOperand(_)));
        let err = syntax(parse("swap q[1], q[1];", dims(2, 1)));
        assert_eq!(err.kind, SyntaxErrorKind::DuplicateQubit(1));
        let err = syntax(parse("measure q[0] -> c;", dims(1, 1)));
        assert!(matches!(err.kind, SyntaxErrorKind::MalformedOperand(_)));
        let err = syntax(parse("measure q[0];", dims(1, 1)));
        assert_eq!(err.kind, SyntaxErrorKind::UnknownGate("measure".into()));
        let err = syntax(parse("123 garbage", dims(1, 1)));
        assert!(matches!(err.kind, SyntaxErrorKind::MalformedStatement(_)));
    }

    #[test]
    fn no_automatic_growth() {
        assert_eq!(
            parse("x q[0];\nx q[0];\nx q[0];", dims(1, 2)),
            Err(CircuitError::InvalidRange(RangeError::ProgramTooLong {
                line: 3,
                step: 2,
                num_steps: 2
            }))
        );
        assert_eq!(
            parse("qreg q[5];", dims(2, 2)),
            Err(CircuitError::InvalidRange(RangeError::RegisterTooLarge {
                declared: 5,
                num_qubits: 2
            }))
        );
    }
}

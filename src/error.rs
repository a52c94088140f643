//! Error types shared by the grid model, the program text parser and the
//! simulator hand-off.

use crate::gate::GateKind;
use thiserror::Error;

/// Errors raised by circuit operations.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum CircuitError {
    /// A coordinate, dimension or gate field is out of bounds or malformed.
    #[error("Invalid range: {0}")]
    InvalidRange(#[from] RangeError),

    /// The cell already holds a gate or is reserved by a two-qubit gate.
    #[error("Cell q[{qubit}] step {step} is already occupied")]
    OccupiedCell { qubit: usize, step: usize },

    /// Program text could not be parsed.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The simulator rejected the circuit.
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

/// Why a coordinate or gate shape was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum RangeError {
    #[error("grid dimensions must be at least 1x1, got {num_qubits}x{num_steps}")]
    EmptyGrid { num_qubits: usize, num_steps: usize },

    #[error("qubit {qubit} outside a {num_qubits}-qubit grid")]
    QubitOutOfBounds { qubit: usize, num_qubits: usize },

    #[error("step {step} outside a {num_steps}-step grid")]
    StepOutOfBounds { step: usize, num_steps: usize },

    #[error("{kind} target must differ from its control q[{qubit}]")]
    SameQubit { kind: GateKind, qubit: usize },

    #[error("{kind} requires a target qubit")]
    MissingTarget { kind: GateKind },

    #[error("{kind} does not take a target qubit")]
    UnexpectedTarget { kind: GateKind },

    #[error("{kind} requires an angle parameter")]
    MissingParameter { kind: GateKind },

    #[error("{kind} does not take a parameter")]
    UnexpectedParameter { kind: GateKind },

    #[error("{kind} parameter must be finite, got {value}")]
    NonFiniteParameter { kind: GateKind, value: f64 },

    /// A measurement ends its wire: nothing may follow it on that qubit.
    #[error("q[{qubit}] is measured at step {measured_at}, no gate may follow it (step {step})")]
    AfterMeasure {
        qubit: usize,
        step: usize,
        measured_at: usize,
    },

    #[error("line {line} needs step {step} but the grid has {num_steps} steps")]
    ProgramTooLong {
        line: usize,
        step: usize,
        num_steps: usize,
    },

    #[error("no gate anchored at q[{qubit}] step {step}")]
    NoGate { qubit: usize, step: usize },

    #[error("program declares {declared} qubits but the grid has {num_qubits}")]
    RegisterTooLarge { declared: usize, num_qubits: usize },
}

/// A parse failure with its 1-based location in the program text.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Syntax error at line {line}, column {column}: {kind}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub kind: SyntaxErrorKind,
}

impl SyntaxError {
    pub fn new(line: usize, column: usize, kind: SyntaxErrorKind) -> Self {
        Self { line, column, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum SyntaxErrorKind {
    #[error("unknown gate '{0}'")]
    UnknownGate(String),

    #[error("'{gate}' expects {expected} qubit operand(s), got {got}")]
    WrongOperandCount {
        gate: String,
        expected: usize,
        got: usize,
    },

    #[error("'{gate}' expects {expected} parameter(s), got {got}")]
    WrongParameterCount {
        gate: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid angle '{0}'")]
    InvalidParameter(String),

    #[error("index {index} out of bounds for register '{register}' of size {size}")]
    IndexOutOfBounds {
        register: String,
        index: usize,
        size: usize,
    },

    #[error("unknown register '{0}'")]
    UnknownRegister(String),

    #[error("qubit q[{0}] used twice in one instruction")]
    DuplicateQubit(usize),

    #[error("qubit q[{0}] was already measured")]
    AlreadyMeasured(usize),

    #[error("malformed operand '{0}'")]
    MalformedOperand(String),

    #[error("unrecognized statement '{0}'")]
    MalformedStatement(String),
}

/// Failures reported back by a simulator.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum SimulationError {
    #[error("{num_qubits} qubits exceeds the simulator limit of {max}")]
    TooManyQubits { num_qubits: usize, max: usize },

    #[error("invalid circuit: {0}")]
    InvalidCircuit(String),

    #[error("simulation worker stopped before returning a result")]
    Disconnected,
}

/// Failures reading or writing project and program files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProjectError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid project JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Project does not describe a valid circuit: {0}")]
    Circuit(#[from] CircuitError),
}

/// Result type for circuit operations.
pub type CircuitResult<T> = Result<T, CircuitError>;

/// Result type for project file operations.
pub type ProjectResult<T> = Result<T, ProjectError>;

//! Quantum circuit grid with a synchronized program-text view.
//!
//! The grid ([`grid::GridModel`]) is authoritative. [`codegen::generate`]
//! renders it as OpenQASM 2.0 text and [`parser::parse`] rebuilds a placement
//! set from edited text by packing each instruction into the earliest free
//! step. [`sync::SyncController`] ties the two together.
//!
//! ```
//! use qgrid::{GateKind, GridDims, GridModel, codegen, parser};
//!
//! let dims = GridDims::new(2, 5)?;
//! let mut model = GridModel::new(dims);
//! model.add_gate(GateKind::H, 0, 0, None, None)?;
//! model.add_gate(GateKind::Cx, 0, 1, Some(1), None)?;
//!
//! let text = codegen::generate(dims, &model.snapshot());
//! assert!(text.ends_with("h q[0];\ncx q[0], q[1];\n"));
//! assert_eq!(parser::parse(&text, dims)?, model.snapshot());
//! # Ok::<(), qgrid::CircuitError>(())
//! ```

pub mod app;
pub mod codegen;
pub mod error;
pub mod gate;
pub mod grid;
pub mod history;
pub mod menu;
pub mod params;
pub mod parser;
pub mod project;
pub mod quantum;
pub mod render;
pub mod sync;

pub use error::{
    CircuitError, CircuitResult, ProjectError, RangeError, SimulationError, SyntaxError,
    SyntaxErrorKind,
};
pub use gate::{GateKind, GatePlacement};
pub use grid::{GridDims, GridModel};
pub use project::Project;
pub use quantum::{Simulator, StateVector, StateVectorSimulator};
pub use sync::{RenderSurface, SyncController, Surfaces, TextSurface};

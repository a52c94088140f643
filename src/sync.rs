//! Keeps the grid and the program text in step.
//!
//! [`SyncController`] owns the one authoritative [`GridModel`]. Grid edits go
//! through the controller, which regenerates the text and pushes it to the
//! [`TextSurface`]; text edits are parsed as a whole and swapped into the
//! model as a single history step, after which the [`RenderSurface`] is
//! redrawn. A failed parse never touches the grid or the last good text.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

use crate::codegen::generate;
use crate::error::{CircuitError, CircuitResult, SimulationError};
use crate::gate::{GateKind, GatePlacement};
use crate::grid::{GridDims, GridModel};
use crate::parser::parse;
use crate::quantum::{Simulator, StateVector, spawn_simulation};

/// Where generated program text and parse errors are shown.
pub trait TextSurface {
    fn show_text(&mut self, text: &str);
    /// `None` clears a previously shown error.
    fn show_error(&mut self, error: Option<&CircuitError>);
}

/// Draws the grid. Never authoritative over state.
pub trait RenderSurface {
    fn redraw(&mut self, dims: GridDims, placements: &[GatePlacement]);
}

/// The pair of collaborators a sync event publishes to.
pub struct Surfaces<'a> {
    pub text: &'a mut dyn TextSurface,
    pub render: &'a mut dyn RenderSurface,
}

impl<'a> Surfaces<'a> {
    pub fn new(text: &'a mut dyn TextSurface, render: &'a mut dyn RenderSurface) -> Self {
        Self { text, render }
    }
}

#[derive(Debug)]
pub struct SyncController {
    model: GridModel,
    last_good_text: String,
    error: Option<CircuitError>,
}

impl SyncController {
    pub fn new(model: GridModel) -> Self {
        let last_good_text = generate(model.dims(), &model.snapshot());
        Self {
            model,
            last_good_text,
            error: None,
        }
    }

    pub fn model(&self) -> &GridModel {
        &self.model
    }

    pub fn dims(&self) -> GridDims {
        self.model.dims()
    }

    /// The text the current grid was last generated from or parsed from.
    pub fn last_good_text(&self) -> &str {
        &self.last_good_text
    }

    /// The error from the most recent rejected text edit, if still pending.
    pub fn error(&self) -> Option<&CircuitError> {
        self.error.as_ref()
    }

    /// Regenerates the text from the grid and publishes both views.
    pub fn grid_changed(&mut self, surfaces: &mut Surfaces<'_>) {
        let snapshot = self.model.snapshot();
        self.last_good_text = generate(self.model.dims(), &snapshot);
        self.error = None;
        surfaces.text.show_text(&self.last_good_text);
        surfaces.text.show_error(None);
        surfaces.render.redraw(self.model.dims(), &snapshot);
        debug!(gates = snapshot.len(), "published grid");
    }

    /// Applies an edited program. On failure the error is published and
    /// returned; grid and last good text stay as they were.
    pub fn text_changed(&mut self, text: &str, surfaces: &mut Surfaces<'_>) -> CircuitResult<()> {
        if text == self.last_good_text {
            if self.error.take().is_some() {
                surfaces.text.show_error(None);
            }
            return Ok(());
        }

        let applied = parse(text, self.model.dims()).and_then(|placements| {
            let count = placements.len();
            self.model.replace_all(placements).map(|()| count)
        });

        match applied {
            Ok(count) => {
                info!(gates = count, "applied program text");
                self.last_good_text = text.to_string();
                self.error = None;
                surfaces.text.show_error(None);
                surfaces
                    .render
                    .redraw(self.model.dims(), &self.model.snapshot());
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "rejected program text");
                surfaces.text.show_error(Some(&err));
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn place(
        &mut self,
        kind: GateKind,
        qubit: usize,
        step: usize,
        target_qubit: Option<usize>,
        parameter: Option<f64>,
        surfaces: &mut Surfaces<'_>,
    ) -> CircuitResult<GatePlacement> {
        let gate = self
            .model
            .add_gate(kind, qubit, step, target_qubit, parameter)?;
        self.grid_changed(surfaces);
        Ok(gate)
    }

    pub fn remove(&mut self, qubit: usize, step: usize, surfaces: &mut Surfaces<'_>) -> bool {
        let removed = self.model.remove_gate(qubit, step);
        if removed {
            self.grid_changed(surfaces);
        }
        removed
    }

    pub fn move_gate(
        &mut self,
        from: (usize, usize),
        to: (usize, usize),
        surfaces: &mut Surfaces<'_>,
    ) -> CircuitResult<GatePlacement> {
        let moved = self.model.move_gate(from.0, from.1, to.0, to.1)?;
        self.grid_changed(surfaces);
        Ok(moved)
    }

    pub fn undo(&mut self, surfaces: &mut Surfaces<'_>) -> bool {
        let moved = self.model.undo();
        if moved {
            self.grid_changed(surfaces);
        }
        moved
    }

    pub fn redo(&mut self, surfaces: &mut Surfaces<'_>) -> bool {
        let moved = self.model.redo();
        if moved {
            self.grid_changed(surfaces);
        }
        moved
    }

    /// Hands an owned snapshot to `simulator` on a background thread.
    pub fn simulate<S>(&self, simulator: Arc<S>) -> Receiver<Result<StateVector, SimulationError>>
    where
        S: Simulator + ?Sized + 'static,
    {
        spawn_simulation(simulator, self.model.dims(), self.model.snapshot())
    }
}

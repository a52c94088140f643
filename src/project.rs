//! Project files (JSON) and exported program text.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::codegen::generate;
use crate::error::{ProjectError, ProjectResult};
use crate::gate::GatePlacement;
use crate::grid::{GridDims, GridModel};

/// Everything needed to rebuild a [`GridModel`] exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub num_qubits: usize,
    pub num_steps: usize,
    #[serde(default)]
    pub placements: Vec<GatePlacement>,
}

impl Project {
    pub fn from_model(model: &GridModel) -> Self {
        let dims = model.dims();
        Self {
            num_qubits: dims.num_qubits,
            num_steps: dims.num_steps,
            placements: model.snapshot(),
        }
    }

    pub fn dims(&self) -> ProjectResult<GridDims> {
        Ok(GridDims::new(self.num_qubits, self.num_steps)?)
    }

    /// Re-validates every placement; an invalid project yields no model.
    pub fn into_model(self, history_limit: Option<usize>) -> ProjectResult<GridModel> {
        let dims = self.dims()?;
        Ok(GridModel::from_placements(dims, self.placements, history_limit)?)
    }

    pub fn to_json(&self) -> ProjectResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ProjectResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> ProjectResult<()> {
        let json = self.to_json()?;
        write_file(path, &json)?;
        info!(path = %path.display(), gates = self.placements.len(), "saved project");
        Ok(())
    }

    pub fn load(path: &Path) -> ProjectResult<Self> {
        let project = Self::from_json(&read_file(path)?)?;
        info!(path = %path.display(), gates = project.placements.len(), "loaded project");
        Ok(project)
    }
}

/// Writes the generated program text for `model` verbatim.
pub fn export_program(model: &GridModel, path: &Path) -> ProjectResult<()> {
    let text = generate(model.dims(), &model.snapshot());
    write_file(path, &text)?;
    info!(path = %path.display(), "exported program");
    Ok(())
}

pub fn read_program(path: &Path) -> ProjectResult<String> {
    read_file(path)
}

fn read_file(path: &Path) -> ProjectResult<String> {
    fs::read_to_string(path).map_err(|source| ProjectError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn write_file(path: &Path, contents: &str) -> ProjectResult<()> {
    fs::write(path, contents).map_err(|source| ProjectError::Io {
        path: path.display().to_string(),
        source,
    })
}

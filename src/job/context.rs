// Job context
//
// Build variables and job parameters for the job currently being executed.
// Shared read-only with every control request for the lifetime of the job.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Variable name to value, as handed to the substitution engine
pub type VariableMapping = HashMap<String, String>;

/// A single named value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Values scoped to the running job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobContext {
    /// Run-level values (run number, workspace, ...)
    #[serde(default)]
    pub build_variables: Vec<Variable>,

    /// Values scoped to the task being executed
    #[serde(default)]
    pub parameters: Vec<Variable>,
}

impl JobContext {
    pub fn new(build_variables: Vec<Variable>, parameters: Vec<Variable>) -> Self {
        Self {
            build_variables,
            parameters,
        }
    }

    /// Load a job context from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse job file {}", path.display()))
    }

    /// Merge build variables and parameters into one mapping.
    ///
    /// Parameters are written last, so a parameter wins over a build variable
    /// with the same name.
    pub fn variable_mapping(&self) -> VariableMapping {
        let mut vars = VariableMapping::with_capacity(
            self.build_variables.len() + self.parameters.len(),
        );

        for v in self.build_variables.iter().chain(self.parameters.iter()) {
            vars.insert(v.name.clone(), v.value.clone());
        }

        vars
    }
}

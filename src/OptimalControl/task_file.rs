//! JSON task files.
//!
//! ```json
//! {
//!   "problem_name": "min_time",
//!   "task":   { "N": 100, "L": 5.0, "aU": 1.0, "aL": -3.0, "R": 0.0, "tf_init": 10.0 },
//!   "solver": { "tolerance": 1e-8, "max_iterations": 500, "mu_init": 0.1 },
//!   "output": { "results_file": "results.txt", "plot_script": "plot.gnu", "plot": true }
//! }
//! ```
//! Only `task` is required, missing sections and fields take their default values.
use super::driver::{OutputConfig, run_pipeline};
use super::min_time_task::{MinTimeTask, OCPError};
use super::solution::Trajectory;
use crate::NLP::interior_point::SolverSettings;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemFile {
    #[serde(default)]
    pub problem_name: Option<String>,
    pub task: MinTimeTask,
    #[serde(default)]
    pub solver: SolverSettings,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for ProblemFile {
    fn default() -> Self {
        Self {
            problem_name: Some("min_time".to_string()),
            task: MinTimeTask::default(),
            solver: SolverSettings::default(),
            output: OutputConfig::default(),
        }
    }
}

impl ProblemFile {
    pub fn from_task(task: MinTimeTask) -> Self {
        Self {
            task,
            ..Self::default()
        }
    }

    pub fn from_json(content: &str) -> Result<Self, OCPError> {
        let problem: ProblemFile = serde_json::from_str(content)?;
        Ok(problem)
    }

    pub fn from_file(path: &Path) -> Result<Self, OCPError> {
        let content = fs::read_to_string(path)?;
        let problem = Self::from_json(&content)?;
        info!("task loaded from {}", path.display());
        Ok(problem)
    }

    pub fn save(&self, path: &Path) -> Result<(), OCPError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("task saved to {}", path.display());
        Ok(())
    }
}

/// Writes a task file with all default values
pub fn create_template(path: &Path) -> Result<(), OCPError> {
    ProblemFile::default().save(path)
}

/// Runs the whole pipeline with the renderer chosen by the output section
pub fn run(problem: &ProblemFile) -> Result<Trajectory, OCPError> {
    if let Some(name) = &problem.problem_name {
        info!("solving problem {}", name);
    }
    let renderer = problem.output.renderer();
    run_pipeline(&problem.task, &problem.solver, &problem.output, &renderer)
}

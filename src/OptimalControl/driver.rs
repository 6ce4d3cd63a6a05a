//! Linear pipeline: build the model, solve it, write the results table, plot.
use super::min_time_model::MinTimeModel;
use super::min_time_task::{MinTimeTask, OCPError};
use super::solution::Trajectory;
use crate::NLP::interior_point::{InteriorPoint, SolverSettings};
use crate::Utils::plots::{GnuplotRenderer, PlotBackend, Renderer, SilentRenderer};
use crate::Utils::results_writer::{save_csv, save_results};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// residual level above which a converged solution is reported as suspicious
const QUALITY_TOLERANCE: f64 = 1e-6;

/// Where the results go and how they are plotted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub results_file: String,
    pub plot_script: String,
    pub plot_program: String,
    pub plot_image: String,
    /// false selects the silent backend
    pub plot: bool,
    pub csv_file: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_file: "results.txt".to_string(),
            plot_script: "plot.gnu".to_string(),
            plot_program: "gnuplot".to_string(),
            plot_image: "min_time.png".to_string(),
            plot: true,
            csv_file: None,
        }
    }
}

impl OutputConfig {
    pub fn renderer(&self) -> PlotBackend {
        if self.plot {
            PlotBackend::from(GnuplotRenderer::new(
                &self.plot_program,
                Path::new(&self.plot_script),
                Path::new(&self.plot_image),
            ))
        } else {
            PlotBackend::from(SilentRenderer)
        }
    }
}

/// Builds the transcribed problem and solves it
pub fn solve_task(task: &MinTimeTask, settings: &SolverSettings) -> Result<Trajectory, OCPError> {
    let start = Instant::now();
    let model = MinTimeModel::build(task)?;
    info!(
        "model built: {} variables, {} constraints",
        model.n_variables(),
        model.n_constraints()
    );
    let problem = model.nlp.compile()?;
    let solution = InteriorPoint::new(settings.clone()).solve(&problem)?;
    let trajectory = model.extract_trajectory(&solution)?;
    trajectory.quality(task).log(QUALITY_TOLERANCE);
    info!(
        "minimum time tf = {:.6} ({} iterations, {:.3} s)",
        trajectory.tf,
        trajectory.iterations,
        start.elapsed().as_secs_f64()
    );
    Ok(trajectory)
}

/// Solve, write the results table (and the optional CSV copy), then plot.
///
/// A solver failure returns before anything is written. A plotting failure is only logged.
pub fn run_pipeline(
    task: &MinTimeTask,
    settings: &SolverSettings,
    output: &OutputConfig,
    renderer: &dyn Renderer,
) -> Result<Trajectory, OCPError> {
    let trajectory = solve_task(task, settings)?;
    let results = Path::new(&output.results_file);
    save_results(results, &trajectory)?;
    if let Some(csv) = &output.csv_file {
        save_csv(Path::new(csv), &trajectory)?;
    }
    if let Err(e) = renderer.render(results) {
        warn!("plotting failed: {}", e);
    }
    Ok(trajectory)
}

/// Solves the task for every drag coefficient in `frictions`, returns `(R, tf)` pairs
pub fn sweep_friction(
    task: &MinTimeTask,
    frictions: &[f64],
    settings: &SolverSettings,
) -> Result<Vec<(f64, f64)>, OCPError> {
    let mut results = Vec::with_capacity(frictions.len());
    for &r in frictions {
        let mut task_r = *task;
        task_r.set_friction(r);
        info!("friction sweep: R = {}", r);
        let trajectory = solve_task(&task_r, settings)?;
        results.push((r, trajectory.tf));
    }
    Ok(results)
}

use super::min_time_task::{MinTimeTask, OCPError};
use log::{info, warn};

/// Optimal trajectory on the discretization grid
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub tf: f64,
    /// interval length tf/N
    pub h: f64,
    /// node times i*h
    pub time: Vec<f64>,
    pub x: Vec<f64>,
    pub v: Vec<f64>,
    pub a: Vec<f64>,
    /// interior point iterations spent on the solution
    pub iterations: usize,
}

impl Trajectory {
    /// Builds a trajectory from node values; all arrays must have the same length N+1 >= 2
    pub fn from_arrays(h: f64, x: Vec<f64>, v: Vec<f64>, a: Vec<f64>) -> Result<Self, OCPError> {
        if x.len() < 2 || x.len() != v.len() || x.len() != a.len() {
            return Err(OCPError::CalculationError(format!(
                "inconsistent trajectory arrays: x {}, v {}, a {}",
                x.len(),
                v.len(),
                a.len()
            )));
        }
        if !h.is_finite() || h <= 0.0 {
            return Err(OCPError::CalculationError(format!(
                "interval length must be positive, got {}",
                h
            )));
        }
        let time = (0..x.len()).map(|i| i as f64 * h).collect();
        Ok(Self {
            tf: h * (x.len() - 1) as f64,
            h,
            time,
            x,
            v,
            a,
            iterations: 0,
        })
    }

    /// number of intervals N
    pub fn n_intervals(&self) -> usize {
        self.x.len() - 1
    }

    pub fn quality(&self, task: &MinTimeTask) -> SolutionQuality {
        SolutionQuality::compute(self, task)
    }

    /// time at which the acceleration changes sign for the first time
    pub fn switching_time(&self) -> Option<f64> {
        (1..self.a.len())
            .find(|&i| self.a[i - 1] > 0.0 && self.a[i] <= 0.0)
            .map(|i| self.time[i])
    }

    pub fn max_velocity(&self) -> f64 {
        self.v.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    ////////////////////////PRETTY PRINTING/////////////////////////////
    pub fn pretty_print_summary(&self) {
        use prettytable::{Table, row};

        println!("\n=== SOLUTION SUMMARY ===");
        let mut table = Table::new();
        table.add_row(row!["Quantity", "Value"]);
        table.add_row(row!["Final time (tf)", format!("{:.6}", self.tf)]);
        table.add_row(row!["Interval length (h)", format!("{:.6e}", self.h)]);
        table.add_row(row!["Max velocity", format!("{:.6}", self.max_velocity())]);
        let switching = match self.switching_time() {
            Some(t) => format!("{:.4}", t),
            None => "-".to_string(),
        };
        table.add_row(row!["Switching time", switching]);
        table.add_row(row!["Iterations", self.iterations]);
        table.printstd();
    }
}

/// Residuals of the discretized dynamics and of the boundary conditions, in division form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolutionQuality {
    /// max |(x_i - x_{i-1})/h - v_i|
    pub max_position_defect: f64,
    /// max |(v_i - v_{i-1})/h - (a_i - R*v_i^2)|
    pub max_velocity_defect: f64,
    /// max of |x_0|, |x_N - L|, |v_0|, |v_N|
    pub max_boundary_error: f64,
    /// max amount by which a_i leaves [aL, aU]
    pub max_bound_violation: f64,
}

impl SolutionQuality {
    pub fn compute(trajectory: &Trajectory, task: &MinTimeTask) -> Self {
        let h = trajectory.h;
        let (x, v, a) = (&trajectory.x, &trajectory.v, &trajectory.a);
        let n = trajectory.n_intervals();
        let mut max_position_defect: f64 = 0.0;
        let mut max_velocity_defect: f64 = 0.0;
        for i in 1..=n {
            let position_defect = (x[i] - x[i - 1]) / h - v[i];
            let velocity_defect = (v[i] - v[i - 1]) / h - (a[i] - task.R * v[i] * v[i]);
            max_position_defect = max_position_defect.max(position_defect.abs());
            max_velocity_defect = max_velocity_defect.max(velocity_defect.abs());
        }
        let max_boundary_error = x[0]
            .abs()
            .max((x[n] - task.L).abs())
            .max(v[0].abs())
            .max(v[n].abs());
        let max_bound_violation = a
            .iter()
            .map(|&ai| (task.aL - ai).max(ai - task.aU).max(0.0))
            .fold(0.0, f64::max);
        Self {
            max_position_defect,
            max_velocity_defect,
            max_boundary_error,
            max_bound_violation,
        }
    }

    pub fn max_error(&self) -> f64 {
        self.max_position_defect
            .max(self.max_velocity_defect)
            .max(self.max_boundary_error)
            .max(self.max_bound_violation)
    }

    pub fn is_within(&self, tolerance: f64) -> bool {
        self.max_error() <= tolerance
    }

    pub fn log(&self, tolerance: f64) {
        info!(
            "defects: position {:.3e}, velocity {:.3e}; boundary error {:.3e}; bound violation {:.3e}",
            self.max_position_defect,
            self.max_velocity_defect,
            self.max_boundary_error,
            self.max_bound_violation
        );
        if !self.is_within(tolerance) {
            warn!(
                "solution residuals {:.3e} exceed {:.1e}",
                self.max_error(),
                tolerance
            );
        }
    }
}

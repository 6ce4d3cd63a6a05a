use crate::NLP::NLPError;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OCPError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("solver failed: {0}")]
    SolverFailure(#[from] NLPError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task file parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("calculation error: {0}")]
    CalculationError(String),
}

/// Parameters of the minimum-time problem
#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinTimeTask {
    /// number of discretization intervals
    pub N: usize,
    /// target distance
    pub L: f64,
    /// upper acceleration bound
    pub aU: f64,
    /// lower acceleration bound
    pub aL: f64,
    /// drag coefficient
    pub R: f64,
    /// initial guess of the final time
    pub tf_init: f64,
}

impl Default for MinTimeTask {
    fn default() -> Self {
        Self {
            N: 100,
            L: 5.0,
            aU: 1.0,
            aL: -3.0,
            R: 0.0,
            tf_init: 10.0,
        }
    }
}

#[allow(non_snake_case)]
impl MinTimeTask {
    pub fn new(N: usize, L: f64, aU: f64, aL: f64, R: f64, tf_init: f64) -> Self {
        Self {
            N,
            L,
            aU,
            aL,
            R,
            tf_init,
        }
    }

    /// interval length of the initial guess
    pub fn h_init(&self) -> f64 {
        self.tf_init / self.N as f64
    }

    pub fn set_friction(&mut self, R: f64) {
        self.R = R;
    }

    ///////////////////////////////////////////VALIDATION////////////////////////////////////////////////
    /// Validate task parameters
    ///
    /// Checks:
    /// - at least one discretization interval
    /// - `tf_init` and `L` are positive and finite
    /// - `R` is non-negative
    /// - acceleration bounds are finite with `aL < aU`
    ///
    /// Bounds that do not contain zero are allowed, only a warning is issued.
    pub fn validate(&self) -> Result<(), OCPError> {
        if self.N == 0 {
            return Err(OCPError::InvalidConfiguration(
                "N must be a positive integer".to_string(),
            ));
        }
        if !self.tf_init.is_finite() || self.tf_init <= 0.0 {
            return Err(OCPError::InvalidConfiguration(format!(
                "tf_init must be positive, got {}",
                self.tf_init
            )));
        }
        if !self.L.is_finite() || self.L <= 0.0 {
            return Err(OCPError::InvalidConfiguration(format!(
                "L must be positive, got {}",
                self.L
            )));
        }
        if !self.R.is_finite() || self.R < 0.0 {
            return Err(OCPError::InvalidConfiguration(format!(
                "R must be non-negative, got {}",
                self.R
            )));
        }
        if !self.aL.is_finite() || !self.aU.is_finite() {
            return Err(OCPError::InvalidConfiguration(
                "acceleration bounds must be finite".to_string(),
            ));
        }
        if self.aL >= self.aU {
            return Err(OCPError::InvalidConfiguration(format!(
                "aL must be less than aU, got aL = {}, aU = {}",
                self.aL, self.aU
            )));
        }
        if self.aL > 0.0 || self.aU < 0.0 {
            warn!(
                "acceleration bounds [{}, {}] do not contain zero, the zero initial guess of a is moved inside the bounds",
                self.aL, self.aU
            );
        }
        if self.N == 1 {
            // v0 = v1 = 0 forces x1 = x0, only tf -> infinity satisfies the defects
            warn!("N = 1 has no finite-time solution, the solver will drive tf to large values");
        }
        Ok(())
    }

    ////////////////////////PRETTY PRINTING/////////////////////////////
    pub fn pretty_print_task(&self) {
        use prettytable::{Table, row};

        println!("\n=== MINIMUM TIME TASK ===");
        let mut table = Table::new();
        table.add_row(row!["Parameter", "Value"]);
        table.add_row(row!["Intervals (N)", self.N]);
        table.add_row(row!["Distance (L)", format!("{:.4}", self.L)]);
        table.add_row(row!["Max acceleration (aU)", format!("{:.4}", self.aU)]);
        table.add_row(row!["Min acceleration (aL)", format!("{:.4}", self.aL)]);
        table.add_row(row!["Drag coefficient (R)", format!("{:.4}", self.R)]);
        table.add_row(row!["Initial final time (tf_init)", format!("{:.4}", self.tf_init)]);
        table.printstd();
    }
}

//! # Nonlinear Programming Module
//!
//! This module provides a small general-purpose solver for nonlinear programs of the form
//!
//! ```text
//! minimize    f(z)
//! subject to  c(z) = 0
//!             z_L <= z <= z_U
//! ```
//!
//! where `f` and `c` are given as symbolic expressions (RustedSciThe `Expr`).
//!
//! ## Main Structures
//!
//! - **`SymbolicNLP`**: container of variables, bounds, initial guess, symbolic objective and
//!   symbolic equality constraints. Each function remembers the variables it depends on.
//! - **`CompiledNLP`**: numeric form of a `SymbolicNLP`. First and second derivatives are obtained
//!   analytically with `Expr::diff` and turned into closures with `lambdify_owned`.
//! - **`NLProblem`**: trait the solver works with, so hand-written problems can be solved too.
//! - **`InteriorPoint`**: primal-dual barrier method (filter line search with second-order
//!   correction, feasibility restoration phase, inertia-free Hessian regularization).
//!
//! ## Numerical Method
//!
//! For a barrier parameter `mu` the bounds are replaced by logarithmic barrier terms
//! `phi_mu(z) = f(z) - mu*sum(ln(z - z_L)) - mu*sum(ln(z_U - z))`, and the Newton step is taken from
//!
//! ```text
//! | W + Sigma + dw*I   J^T   | | dz      |     | grad(phi_mu) |
//! |                          | |         | = - |              |
//! | J                 -dc*I  | | lambda+ |     | c            |
//! ```
//!
//! with `W` the Hessian of the Lagrangian and `Sigma = Z_L/S_L + Z_U/S_U`. The barrier parameter is
//! decreased superlinearly once the barrier problem is solved to `kappa_eps*mu`.

pub mod interior_point;
pub mod symbolic_problem;

use thiserror::Error;

/// errors of the nonlinear programming layer
#[derive(Debug, Error)]
pub enum NLPError {
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("invalid problem: {0}")]
    InvalidProblem(String),
    #[error("maximum number of iterations ({iterations}) exceeded")]
    MaxIterationsExceeded { iterations: usize },
    #[error("restoration phase could not reduce the constraint violation (iteration {iteration})")]
    RestorationFailed { iteration: usize },
    #[error("KKT system could not be regularized (iteration {iteration})")]
    SingularSystem { iteration: usize },
    #[error("numerical failure: {0}")]
    NumericalFailure(String),
}

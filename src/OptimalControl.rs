//! # Minimum-Time Optimal Control Module
//!
//! This module solves the minimum-time problem for a point mass with bounded acceleration and
//! quadratic drag by direct transcription into a nonlinear program.
//!
//! ## Mathematical Model
//!
//! ### Nomenclature
//!
//! | Symbol | Description |
//! |--------|-------------|
//! | `x` | position |
//! | `v` | velocity |
//! | `a` | acceleration (control) |
//! | `R` | drag coefficient |
//! | `aL`, `aU` | acceleration bounds |
//! | `L` | target distance |
//! | `tf` | final time (free) |
//!
//! ### Continuous Problem
//!
//! ```text
//! minimize tf
//! dx/dt = v
//! dv/dt = a - R*v^2
//! aL <= a(t) <= aU
//! x(0) = 0, x(tf) = L, v(0) = 0, v(tf) = 0
//! ```
//!
//! ### Discretization
//!
//! `N` intervals of length `h = tf/N`, backward (implicit) Euler differences:
//!
//! ```text
//! x_i - x_{i-1} - h*v_i = 0
//! v_i - v_{i-1} - h*(a_i - R*v_i^2) = 0,   i = 1..N
//! ```
//!
//! plus the four boundary equalities, `2N + 4` constraints over `3N + 4` unknowns
//! (`tf`, `x_0..x_N`, `v_0..v_N`, `a_0..a_N`).
//!
//! ## Numerical Solution
//!
//! The transcribed problem is built symbolically (RustedSciThe `Expr`) and solved with the primal-dual
//! interior point method of the `NLP` module. For `R = 0` the optimum is the bang-bang profile
//! (full acceleration, then full braking), see `analytic`.

pub mod analytic;
pub mod driver;
pub mod min_time_model;
pub mod min_time_task;
mod min_time_tests;
pub mod solution;
pub mod task_file;

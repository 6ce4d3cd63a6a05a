//! # Interior Point Solver
//!
//! Primal-dual barrier method for problems given through the `NLProblem` trait.
//!
//! One iteration:
//! 1. evaluate f, grad f, c, J and check the optimality error E_0 (stop when E_0 <= tol)
//! 2. while the barrier problem is solved to `KAPPA_EPS*mu`, decrease `mu` and clear the filter
//! 3. assemble and factorize the KKT matrix (dense LU). If the curvature of the step is too small
//!    the Hessian block is shifted by `dw*I`; a singular matrix additionally gets `-dc*I` in the
//!    constraint block
//! 4. fraction-to-the-boundary rule gives the largest admissible primal step and the step of the
//!    bound multipliers
//! 5. backtracking filter line search on the pair (theta, phi_mu) with theta = |c|_1. Steps with
//!    a sufficient decrease of phi_mu are taken when the switching condition holds, all other
//!    steps must reduce theta or phi_mu against the filter. Up to `MAX_SOC` second-order
//!    corrections are tried when the first trial point increases theta
//! 6. if the step size falls below `alpha_min`, the feasibility restoration phase minimizes
//!    `rho*|p + n|_1 + zeta/2*|D(z - z_R)|^2` subject to `c(z) - p + n = 0`, `p, n >= 0` with the
//!    same method, until theta is reduced and the point is acceptable to the filter
//! 7. update `lambda`, `z_L`, `z_U`, keep `z_L*s_L` and `z_U*s_U` within a factor `KAPPA_SIGMA`
//!    of `mu`
//!
//! Equality constraints only; general inequalities have to be written with slack variables.

use super::NLPError;
use super::symbolic_problem::NLProblem;
use log::{debug, info, warn};
use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

const KAPPA_EPS: f64 = 10.0;
const KAPPA_MU: f64 = 0.2;
const THETA_MU: f64 = 1.5;
const TAU_MIN: f64 = 0.99;
const KAPPA_SIGMA: f64 = 1e10;
const S_MAX: f64 = 100.0;
const CURVATURE_KAPPA: f64 = 1e-10;
const DELTA_W_INIT: f64 = 1e-4;
const DELTA_W_MIN: f64 = 1e-20;
const DELTA_W_MAX: f64 = 1e20;
const DELTA_W_INC: f64 = 8.0;
const DELTA_W_INC_FIRST: f64 = 100.0;
const DELTA_W_DEC: f64 = 1.0 / 3.0;
const DELTA_C: f64 = 1e-8;
const LAMBDA_INIT_MAX: f64 = 1e3;
// filter line search
const ARMIJO_ETA: f64 = 1e-4;
const GAMMA_THETA: f64 = 1e-5;
const GAMMA_PHI: f64 = 1e-8;
const GAMMA_ALPHA: f64 = 0.05;
const SWITCH_DELTA: f64 = 1.0;
const S_THETA: f64 = 1.1;
const S_PHI: f64 = 2.3;
const THETA_MAX_FACTOR: f64 = 1e4;
const THETA_MIN_FACTOR: f64 = 1e-4;
const KAPPA_SOC: f64 = 0.99;
const MAX_SOC: usize = 4;
// restoration phase
const RHO_RESTORATION: f64 = 1000.0;
const KAPPA_RESTORATION: f64 = 0.9;

/// Settings of the interior point method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// tolerance of the scaled optimality error
    pub tolerance: f64,
    pub max_iterations: usize,
    /// initial barrier parameter
    pub mu_init: f64,
    /// relative distance the initial point is pushed inside the bounds
    pub bound_push: f64,
    /// the run is accepted when the error stays below this value for `acceptable_iterations`
    /// consecutive iterations
    pub acceptable_tolerance: f64,
    pub acceptable_iterations: usize,
    /// maximal number of step halvings in the line search before the restoration phase
    pub max_backtracks: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 500,
            mu_init: 0.1,
            bound_push: 1e-2,
            acceptable_tolerance: 1e-6,
            acceptable_iterations: 15,
            max_backtracks: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Solved,
    SolvedToAcceptableLevel,
    /// the restoration phase reached a point the outer iteration accepts
    FeasiblePointFound,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct NLPSolution {
    pub status: SolverStatus,
    /// primal solution
    pub x: DVector<f64>,
    pub objective: f64,
    /// multipliers of the equality constraints
    pub lambda: DVector<f64>,
    pub z_lower: DVector<f64>,
    pub z_upper: DVector<f64>,
    pub iterations: usize,
    /// max |c_j(x)|
    pub constraint_violation: f64,
    /// unscaled max norm of the gradient of the Lagrangian
    pub dual_infeasibility: f64,
    pub final_mu: f64,
}

/// components of the optimality error
#[derive(Debug, Clone, Copy)]
struct KktError {
    primal: f64,
    dual: f64,
    complementarity: f64,
    total: f64,
}

/// bounds of the variables; infinite values are treated as missing bounds
struct Bounds {
    lower: DVector<f64>,
    upper: DVector<f64>,
    has_lower: Vec<bool>,
    has_upper: Vec<bool>,
}

impl Bounds {
    fn new(lower: DVector<f64>, upper: DVector<f64>) -> Result<Self, NLPError> {
        for i in 0..lower.len() {
            if lower[i].is_nan() || upper[i].is_nan() || lower[i] > upper[i] {
                return Err(NLPError::InvalidProblem(format!(
                    "inconsistent bounds of variable {}: [{}, {}]",
                    i, lower[i], upper[i]
                )));
            }
            if lower[i] == upper[i] {
                return Err(NLPError::InvalidProblem(format!(
                    "variable {} is fixed by its bounds ({}), fixed variables are not supported",
                    i, lower[i]
                )));
            }
        }
        let has_lower = lower.iter().map(|l| l.is_finite()).collect();
        let has_upper = upper.iter().map(|u| u.is_finite()).collect();
        Ok(Self {
            lower,
            upper,
            has_lower,
            has_upper,
        })
    }

    fn len(&self) -> usize {
        self.lower.len()
    }

    fn count(&self) -> usize {
        self.has_lower.iter().filter(|b| **b).count() + self.has_upper.iter().filter(|b| **b).count()
    }

    /// moves the starting point strictly inside the box
    fn push_inside(&self, mut z: DVector<f64>, kappa: f64) -> DVector<f64> {
        for i in 0..self.len() {
            let (l, u) = (self.lower[i], self.upper[i]);
            match (self.has_lower[i], self.has_upper[i]) {
                (true, true) => {
                    let range = u - l;
                    let push_l = (kappa * l.abs().max(1.0)).min(kappa * range);
                    let push_u = (kappa * u.abs().max(1.0)).min(kappa * range);
                    z[i] = z[i].max(l + push_l).min(u - push_u);
                }
                (true, false) => z[i] = z[i].max(l + kappa * l.abs().max(1.0)),
                (false, true) => z[i] = z[i].min(u - kappa * u.abs().max(1.0)),
                (false, false) => {}
            }
        }
        z
    }

    /// distances to the bounds; 1.0 where the bound is missing
    fn slacks(&self, z: &DVector<f64>) -> (DVector<f64>, DVector<f64>) {
        let s_l = DVector::from_fn(self.len(), |i, _| {
            if self.has_lower[i] {
                z[i] - self.lower[i]
            } else {
                1.0
            }
        });
        let s_u = DVector::from_fn(self.len(), |i, _| {
            if self.has_upper[i] {
                self.upper[i] - z[i]
            } else {
                1.0
            }
        });
        (s_l, s_u)
    }

    /// largest alpha in (0, 1] keeping the slacks above (1 - tau) of their current values
    fn max_primal_step(
        &self,
        s_l: &DVector<f64>,
        s_u: &DVector<f64>,
        dz: &DVector<f64>,
        tau: f64,
    ) -> f64 {
        let mut alpha: f64 = 1.0;
        for i in 0..self.len() {
            if self.has_lower[i] && dz[i] < 0.0 {
                alpha = alpha.min(-tau * s_l[i] / dz[i]);
            }
            if self.has_upper[i] && dz[i] > 0.0 {
                alpha = alpha.min(tau * s_u[i] / dz[i]);
            }
        }
        alpha
    }

    fn max_dual_step(
        &self,
        zl: &DVector<f64>,
        dzl: &DVector<f64>,
        zu: &DVector<f64>,
        dzu: &DVector<f64>,
        tau: f64,
    ) -> f64 {
        let mut alpha: f64 = 1.0;
        for i in 0..self.len() {
            if self.has_lower[i] && dzl[i] < 0.0 {
                alpha = alpha.min(-tau * zl[i] / dzl[i]);
            }
            if self.has_upper[i] && dzu[i] < 0.0 {
                alpha = alpha.min(-tau * zu[i] / dzu[i]);
            }
        }
        alpha
    }

    /// -mu * sum of the logarithms of the slacks, infinity outside the box
    fn barrier(&self, z: &DVector<f64>, mu: f64) -> f64 {
        let mut value = 0.0;
        for i in 0..self.len() {
            if self.has_lower[i] {
                let s = z[i] - self.lower[i];
                if s <= 0.0 {
                    return f64::INFINITY;
                }
                value -= mu * s.ln();
            }
            if self.has_upper[i] {
                let s = self.upper[i] - z[i];
                if s <= 0.0 {
                    return f64::INFINITY;
                }
                value -= mu * s.ln();
            }
        }
        value
    }
}

fn inf_norm(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0, |acc: f64, x| acc.max(x.abs()))
}

fn l1_norm(v: &DVector<f64>) -> f64 {
    v.iter().map(|x| x.abs()).sum()
}

fn all_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// f + barrier terms, infinity outside the box or for non-finite values
fn barrier_objective(
    problem: &dyn NLProblem,
    bounds: &Bounds,
    z: &DVector<f64>,
    mu: f64,
) -> f64 {
    let barrier = bounds.barrier(z, mu);
    if !barrier.is_finite() {
        return f64::INFINITY;
    }
    let value = problem.objective(z) + barrier;
    if value.is_finite() { value } else { f64::INFINITY }
}

/// factorized KKT matrix together with the step it produced
struct KktStep {
    lu: LU<f64, Dyn, Dyn>,
    solution: DVector<f64>,
    delta_w: f64,
    delta_c: f64,
}

/// pairs (theta, phi) a trial point must not be dominated by
struct Filter {
    entries: Vec<(f64, f64)>,
    theta_max: f64,
}

impl Filter {
    fn new(theta_max: f64) -> Self {
        Self {
            entries: Vec::new(),
            theta_max,
        }
    }

    fn acceptable(&self, theta: f64, phi: f64) -> bool {
        theta < self.theta_max
            && !self
                .entries
                .iter()
                .any(|&(theta_f, phi_f)| theta >= theta_f && phi >= phi_f)
    }

    fn add(&mut self, theta: f64, phi: f64) {
        self.entries
            .retain(|&(theta_f, phi_f)| !(theta_f >= theta && phi_f >= phi));
        self.entries.push((theta, phi));
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepKind {
    /// sufficient decrease of the barrier objective, filter unchanged
    Objective,
    /// decrease of theta or phi against the current point, the point enters the filter
    Feasibility,
}

struct AcceptedStep {
    z: DVector<f64>,
    dz: DVector<f64>,
    lambda_plus: DVector<f64>,
    alpha: f64,
    kind: StepKind,
}

#[derive(Clone, Copy)]
enum Phase<'a> {
    Regular,
    /// restoration run; stops as soon as the test accepts the iterate
    Restoration(&'a dyn Fn(&DVector<f64>) -> bool),
}

/// Elastic feasibility problem of the restoration phase
///
/// variables `[z, p, n]`:
/// min `rho*sum(p + n) + zeta/2*sum(d_i*(z_i - z_R,i)^2)`  s.t.  `c(z) - p + n = 0`, `p, n >= 0`
struct RestorationProblem<'a> {
    problem: &'a dyn NLProblem,
    reference: DVector<f64>,
    weights: DVector<f64>,
    zeta: f64,
    mu: f64,
}

impl<'a> RestorationProblem<'a> {
    fn new(problem: &'a dyn NLProblem, reference: DVector<f64>, mu: f64) -> Self {
        let weights = reference.map(|r| {
            let d = (1.0 / r.abs().max(1e-8)).min(1.0);
            d * d
        });
        Self {
            problem,
            reference,
            weights,
            zeta: mu.sqrt(),
            mu,
        }
    }

    fn n_original(&self) -> usize {
        self.reference.len()
    }

    fn original(&self, z: &DVector<f64>) -> DVector<f64> {
        z.rows(0, self.n_original()).into_owned()
    }
}

impl NLProblem for RestorationProblem<'_> {
    fn n_variables(&self) -> usize {
        self.n_original() + 2 * self.problem.n_constraints()
    }

    fn n_constraints(&self) -> usize {
        self.problem.n_constraints()
    }

    /// `p` and `n` solve the barrier problem of the elastic variables for fixed `z_R`
    fn initial_guess(&self) -> DVector<f64> {
        let (n, m) = (self.n_original(), self.n_constraints());
        let c = self.problem.constraints(&self.reference);
        let mut z = DVector::zeros(n + 2 * m);
        z.rows_mut(0, n).copy_from(&self.reference);
        for j in 0..m {
            let a = (self.mu - RHO_RESTORATION * c[j]) / (2.0 * RHO_RESTORATION);
            let negative = a + (a * a + self.mu * c[j] / (2.0 * RHO_RESTORATION)).sqrt();
            z[n + j] = c[j] + negative;
            z[n + m + j] = negative;
        }
        z
    }

    fn lower_bounds(&self) -> DVector<f64> {
        let lower = self.problem.lower_bounds();
        let n = self.n_original();
        DVector::from_fn(self.n_variables(), |i, _| if i < n { lower[i] } else { 0.0 })
    }

    fn upper_bounds(&self) -> DVector<f64> {
        let upper = self.problem.upper_bounds();
        let n = self.n_original();
        DVector::from_fn(self.n_variables(), |i, _| {
            if i < n { upper[i] } else { f64::INFINITY }
        })
    }

    fn objective(&self, z: &DVector<f64>) -> f64 {
        let n = self.n_original();
        let elastic: f64 = z.rows(n, z.len() - n).sum();
        let proximity: f64 = (0..n)
            .map(|i| self.weights[i] * (z[i] - self.reference[i]).powi(2))
            .sum();
        RHO_RESTORATION * elastic + 0.5 * self.zeta * proximity
    }

    fn gradient(&self, z: &DVector<f64>) -> DVector<f64> {
        let n = self.n_original();
        DVector::from_fn(self.n_variables(), |i, _| {
            if i < n {
                self.zeta * self.weights[i] * (z[i] - self.reference[i])
            } else {
                RHO_RESTORATION
            }
        })
    }

    fn constraints(&self, z: &DVector<f64>) -> DVector<f64> {
        let (n, m) = (self.n_original(), self.n_constraints());
        let c = self.problem.constraints(&self.original(z));
        DVector::from_fn(m, |j, _| c[j] - z[n + j] + z[n + m + j])
    }

    fn jacobian(&self, z: &DVector<f64>) -> DMatrix<f64> {
        let (n, m) = (self.n_original(), self.n_constraints());
        let mut jacobian = DMatrix::zeros(m, n + 2 * m);
        jacobian
            .view_mut((0, 0), (m, n))
            .copy_from(&self.problem.jacobian(&self.original(z)));
        for j in 0..m {
            jacobian[(j, n + j)] = -1.0;
            jacobian[(j, n + m + j)] = 1.0;
        }
        jacobian
    }

    fn lagrangian_hessian(
        &self,
        z: &DVector<f64>,
        sigma_f: f64,
        lambda: &DVector<f64>,
    ) -> DMatrix<f64> {
        let n = self.n_original();
        let size = self.n_variables();
        let mut hessian = DMatrix::zeros(size, size);
        hessian
            .view_mut((0, 0), (n, n))
            .copy_from(&self.problem.lagrangian_hessian(&self.original(z), 0.0, lambda));
        for i in 0..n {
            hessian[(i, i)] += sigma_f * self.zeta * self.weights[i];
        }
        hessian
    }
}

/// Primal-dual interior point solver
pub struct InteriorPoint {
    pub settings: SolverSettings,
}

impl InteriorPoint {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// Solves the problem starting from `problem.initial_guess()`
    ///
    /// # Returns
    /// `NLPSolution` when the scaled optimality error drops below `tolerance` (or stays below
    /// `acceptable_tolerance` long enough), otherwise the reason of the failure.
    pub fn solve(&self, problem: &dyn NLProblem) -> Result<NLPSolution, NLPError> {
        self.run(problem, self.settings.mu_init, Phase::Regular)
    }

    fn run(
        &self,
        problem: &dyn NLProblem,
        mu_init: f64,
        phase: Phase<'_>,
    ) -> Result<NLPSolution, NLPError> {
        let settings = &self.settings;
        let n = problem.n_variables();
        let m = problem.n_constraints();
        let lower = problem.lower_bounds();
        let upper = problem.upper_bounds();
        let initial = problem.initial_guess();
        if lower.len() != n || upper.len() != n || initial.len() != n {
            return Err(NLPError::DimensionMismatch(format!(
                "{} variables but {} lower bounds, {} upper bounds, {} initial values",
                n,
                lower.len(),
                upper.len(),
                initial.len()
            )));
        }
        if n == 0 {
            return Err(NLPError::InvalidProblem("problem has no variables".to_string()));
        }
        if !(settings.tolerance > 0.0) || !(mu_init > 0.0) {
            return Err(NLPError::InvalidProblem(
                "tolerance and initial barrier parameter must be positive".to_string(),
            ));
        }
        let bounds = Bounds::new(lower, upper)?;
        let start = Instant::now();
        if let Phase::Regular = phase {
            info!(
                "interior point: {} variables, {} equality constraints, {} bounds",
                n,
                m,
                bounds.count()
            );
        }

        let mut z = bounds.push_inside(initial, settings.bound_push);
        let (s_l, _) = bounds.slacks(&z);
        let mut zl = DVector::from_fn(n, |i, _| match (bounds.has_lower[i], &phase) {
            (false, _) => 0.0,
            (true, Phase::Regular) => 1.0,
            (true, Phase::Restoration(_)) => mu_init / s_l[i],
        });
        let mut zu = DVector::from_fn(n, |i, _| if bounds.has_upper[i] { 1.0 } else { 0.0 });
        let mut lambda = self.initial_multipliers(problem, &z, &zl, &zu);
        let mut mu = mu_init;
        let mut delta_w_last = 0.0;
        let mut acceptable_counter = 0;

        let theta_init = l1_norm(&problem.constraints(&z));
        let mut filter = Filter::new(THETA_MAX_FACTOR * theta_init.max(1.0));
        let theta_min = THETA_MIN_FACTOR * theta_init.max(1.0);

        for iteration in 0..=settings.max_iterations {
            let f = problem.objective(&z);
            let grad = problem.gradient(&z);
            let c = problem.constraints(&z);
            let jac = problem.jacobian(&z);
            if !f.is_finite() || !all_finite(&grad) || !all_finite(&c) {
                return Err(NLPError::NumericalFailure(format!(
                    "non-finite function values at iteration {}",
                    iteration
                )));
            }
            if grad.len() != n || c.len() != m || jac.shape() != (m, n) {
                return Err(NLPError::DimensionMismatch(format!(
                    "gradient {}, constraints {}, jacobian {:?} for n = {}, m = {}",
                    grad.len(),
                    c.len(),
                    jac.shape(),
                    n,
                    m
                )));
            }
            let (s_l, s_u) = bounds.slacks(&z);
            let error = kkt_error(&bounds, &grad, &jac, &c, &lambda, &zl, &zu, &s_l, &s_u, 0.0);
            debug!(
                "{}iter {:4}  obj {:+.8e}  inf_pr {:.2e}  inf_du {:.2e}  compl {:.2e}  lg(mu) {:.1}",
                if let Phase::Regular = phase { "" } else { "r " },
                iteration,
                f,
                error.primal,
                error.dual,
                error.complementarity,
                mu.log10()
            );

            let finish = |status: SolverStatus, mu: f64| {
                build_solution(
                    status, &z, f, &grad, &jac, &lambda, &zl, &zu, iteration, &error, mu, &start,
                )
            };

            if let Phase::Restoration(restored) = phase {
                if iteration > 0 && restored(&z) {
                    return Ok(finish(SolverStatus::FeasiblePointFound, mu));
                }
            }
            if error.total <= settings.tolerance {
                return Ok(finish(SolverStatus::Solved, mu));
            }
            if error.total <= settings.acceptable_tolerance {
                acceptable_counter += 1;
                if acceptable_counter >= settings.acceptable_iterations {
                    return Ok(finish(SolverStatus::SolvedToAcceptableLevel, mu));
                }
            } else {
                acceptable_counter = 0;
            }
            if iteration == settings.max_iterations {
                warn!(
                    "interior point stopped after {} iterations, error {:.3e}",
                    iteration, error.total
                );
                return Err(NLPError::MaxIterationsExceeded {
                    iterations: settings.max_iterations,
                });
            }

            // barrier parameter update
            let mu_min = settings.tolerance / 10.0;
            loop {
                let barrier_error =
                    kkt_error(&bounds, &grad, &jac, &c, &lambda, &zl, &zu, &s_l, &s_u, mu);
                if barrier_error.total > KAPPA_EPS * mu || mu <= mu_min {
                    break;
                }
                mu = mu_min.max((KAPPA_MU * mu).min(mu.powf(THETA_MU)));
                filter.clear();
                debug!("barrier parameter decreased to {:.3e}", mu);
            }

            // Newton step
            let hessian = problem.lagrangian_hessian(&z, 1.0, &lambda);
            let sigma = DVector::from_fn(n, |i, _| {
                let mut s = 0.0;
                if bounds.has_lower[i] {
                    s += zl[i] / s_l[i];
                }
                if bounds.has_upper[i] {
                    s += zu[i] / s_u[i];
                }
                s
            });
            let grad_phi = DVector::from_fn(n, |i, _| {
                let mut g = grad[i];
                if bounds.has_lower[i] {
                    g -= mu / s_l[i];
                }
                if bounds.has_upper[i] {
                    g += mu / s_u[i];
                }
                g
            });
            let mut rhs = DVector::zeros(n + m);
            rhs.rows_mut(0, n).copy_from(&(-&grad_phi));
            rhs.rows_mut(n, m).copy_from(&(-&c));
            let step = factorize_kkt(
                &hessian,
                &sigma,
                &jac,
                &rhs,
                &mut delta_w_last,
                mu,
                iteration,
            )?;
            if step.delta_w > 0.0 || step.delta_c > 0.0 {
                debug!(
                    "regularization: delta_w {:.2e}, delta_c {:.2e}",
                    step.delta_w, step.delta_c
                );
            }
            let dz: DVector<f64> = step.solution.rows(0, n).into_owned();
            let lambda_plus: DVector<f64> = step.solution.rows(n, m).into_owned();
            let tau = TAU_MIN.max(1.0 - mu);
            let alpha_max = bounds.max_primal_step(&s_l, &s_u, &dz, tau);

            // filter line search
            let theta = l1_norm(&c);
            let phi = f + bounds.barrier(&z, mu);
            let slope = grad_phi.dot(&dz);
            let switching = |alpha: f64| {
                slope < 0.0
                    && theta <= theta_min
                    && alpha * (-slope).powf(S_PHI) > SWITCH_DELTA * theta.powf(S_THETA)
            };
            let judge = |theta_trial: f64, phi_trial: f64, alpha: f64| -> Option<StepKind> {
                if !theta_trial.is_finite()
                    || !phi_trial.is_finite()
                    || !filter.acceptable(theta_trial, phi_trial)
                {
                    return None;
                }
                if switching(alpha) {
                    (phi_trial <= phi + ARMIJO_ETA * alpha * slope).then_some(StepKind::Objective)
                } else {
                    (theta_trial <= (1.0 - GAMMA_THETA) * theta
                        || phi_trial <= phi - GAMMA_PHI * theta)
                        .then_some(StepKind::Feasibility)
                }
            };
            let alpha_min = if slope < 0.0 {
                let mut limit = GAMMA_THETA.min(GAMMA_PHI * theta / -slope);
                if theta <= theta_min {
                    limit = limit.min(SWITCH_DELTA * theta.powf(S_THETA) / (-slope).powf(S_PHI));
                }
                GAMMA_ALPHA * limit
            } else {
                GAMMA_ALPHA * GAMMA_THETA
            };

            let mut alpha = alpha_max;
            let mut accepted: Option<AcceptedStep> = None;
            for backtrack in 0..settings.max_backtracks {
                if alpha < alpha_min {
                    break;
                }
                let trial = &z + alpha * &dz;
                let c_trial = problem.constraints(&trial);
                let theta_trial = l1_norm(&c_trial);
                let phi_trial = barrier_objective(problem, &bounds, &trial, mu);
                if let Some(kind) = judge(theta_trial, phi_trial, alpha) {
                    accepted = Some(AcceptedStep {
                        z: trial,
                        dz: dz.clone(),
                        lambda_plus: lambda_plus.clone(),
                        alpha,
                        kind,
                    });
                    break;
                }
                if backtrack == 0 && m > 0 && theta_trial >= theta {
                    let mut c_soc = alpha * &c + &c_trial;
                    let mut theta_previous = theta_trial;
                    for _ in 0..MAX_SOC {
                        let mut rhs_soc = rhs.clone();
                        rhs_soc.rows_mut(n, m).copy_from(&(-&c_soc));
                        let Some(solution_soc) = step.lu.solve(&rhs_soc) else {
                            break;
                        };
                        if !all_finite(&solution_soc) {
                            break;
                        }
                        let dz_soc: DVector<f64> = solution_soc.rows(0, n).into_owned();
                        let alpha_soc = bounds.max_primal_step(&s_l, &s_u, &dz_soc, tau);
                        let trial_soc = &z + alpha_soc * &dz_soc;
                        let c_trial_soc = problem.constraints(&trial_soc);
                        let theta_soc = l1_norm(&c_trial_soc);
                        let phi_soc = barrier_objective(problem, &bounds, &trial_soc, mu);
                        if let Some(kind) = judge(theta_soc, phi_soc, alpha) {
                            debug!("second-order correction accepted");
                            accepted = Some(AcceptedStep {
                                z: trial_soc,
                                dz: dz_soc,
                                lambda_plus: solution_soc.rows(n, m).into_owned(),
                                alpha: alpha_soc,
                                kind,
                            });
                            break;
                        }
                        if theta_soc > KAPPA_SOC * theta_previous {
                            break;
                        }
                        theta_previous = theta_soc;
                        c_soc = alpha_soc * c_soc + c_trial_soc;
                    }
                    if accepted.is_some() {
                        break;
                    }
                }
                alpha *= 0.5;
            }

            let Some(accepted) = accepted else {
                if error.total <= settings.acceptable_tolerance {
                    warn!("line search failed, returning acceptable point");
                    return Ok(finish(SolverStatus::SolvedToAcceptableLevel, mu));
                }
                if let Phase::Restoration(_) = phase {
                    return Err(NLPError::RestorationFailed { iteration });
                }
                filter.add((1.0 - GAMMA_THETA) * theta, phi - GAMMA_PHI * theta);
                z = self.restore(problem, &bounds, &filter, &z, &c, mu, iteration)?;
                let (s_l, s_u) = bounds.slacks(&z);
                safeguard_bound_multipliers(&bounds, &mut zl, &mut zu, &s_l, &s_u, mu);
                lambda = self.initial_multipliers(problem, &z, &zl, &zu);
                continue;
            };

            if accepted.kind == StepKind::Feasibility {
                filter.add((1.0 - GAMMA_THETA) * theta, phi - GAMMA_PHI * theta);
            }
            let dzl = DVector::from_fn(n, |i, _| {
                if bounds.has_lower[i] {
                    mu / s_l[i] - zl[i] - zl[i] / s_l[i] * accepted.dz[i]
                } else {
                    0.0
                }
            });
            let dzu = DVector::from_fn(n, |i, _| {
                if bounds.has_upper[i] {
                    mu / s_u[i] - zu[i] + zu[i] / s_u[i] * accepted.dz[i]
                } else {
                    0.0
                }
            });
            let alpha_z = bounds.max_dual_step(&zl, &dzl, &zu, &dzu, tau);

            lambda += accepted.alpha * (&accepted.lambda_plus - &lambda);
            zl += alpha_z * &dzl;
            zu += alpha_z * &dzu;
            z = accepted.z;
            let (s_l, s_u) = bounds.slacks(&z);
            safeguard_bound_multipliers(&bounds, &mut zl, &mut zu, &s_l, &s_u, mu);
        }
        Err(NLPError::MaxIterationsExceeded {
            iterations: settings.max_iterations,
        })
    }

    /// Feasibility restoration: solves the elastic problem around `z` until the constraint
    /// violation drops to `KAPPA_RESTORATION` of its current value at a point the filter accepts
    #[allow(clippy::too_many_arguments)]
    fn restore(
        &self,
        problem: &dyn NLProblem,
        bounds: &Bounds,
        filter: &Filter,
        z: &DVector<f64>,
        c: &DVector<f64>,
        mu: f64,
        iteration: usize,
    ) -> Result<DVector<f64>, NLPError> {
        let n = z.len();
        let theta = l1_norm(c);
        info!(
            "restoration phase at iteration {}, constraint violation {:.3e}",
            iteration, theta
        );
        let restoration = RestorationProblem::new(problem, z.clone(), mu);
        let restored = |candidate: &DVector<f64>| -> bool {
            let original = candidate.rows(0, n).into_owned();
            let theta_trial = l1_norm(&problem.constraints(&original));
            theta_trial <= KAPPA_RESTORATION * theta
                && filter.acceptable(
                    theta_trial,
                    barrier_objective(problem, bounds, &original, mu),
                )
        };
        match self.run(&restoration, mu.max(inf_norm(c)), Phase::Restoration(&restored)) {
            Ok(solution) if restored(&solution.x) => {
                debug!(
                    "restoration phase finished after {} iterations",
                    solution.iterations
                );
                Ok(solution.x.rows(0, n).into_owned())
            }
            Ok(solution) => {
                warn!(
                    "restoration phase converged to a point with constraint violation {:.3e}, \
                     the problem may be locally infeasible",
                    l1_norm(&problem.constraints(&solution.x.rows(0, n).into_owned()))
                );
                Err(NLPError::RestorationFailed { iteration })
            }
            Err(e) => {
                warn!("restoration phase failed: {}", e);
                Err(NLPError::RestorationFailed { iteration })
            }
        }
    }

    /// least squares estimate of the constraint multipliers from
    /// [I J^T; J 0] [w; lambda] = [-(grad f - z_L + z_U); 0]
    fn initial_multipliers(
        &self,
        problem: &dyn NLProblem,
        z: &DVector<f64>,
        zl: &DVector<f64>,
        zu: &DVector<f64>,
    ) -> DVector<f64> {
        let n = problem.n_variables();
        let m = problem.n_constraints();
        if m == 0 {
            return DVector::zeros(0);
        }
        let grad = problem.gradient(z);
        let jac = problem.jacobian(z);
        let mut matrix = DMatrix::zeros(n + m, n + m);
        for i in 0..n {
            matrix[(i, i)] = 1.0;
        }
        matrix.view_mut((0, n), (n, m)).copy_from(&jac.transpose());
        matrix.view_mut((n, 0), (m, n)).copy_from(&jac);
        let mut rhs = DVector::zeros(n + m);
        rhs.rows_mut(0, n).copy_from(&(-(grad - zl + zu)));
        match matrix.lu().solve(&rhs) {
            Some(solution) => {
                let lambda: DVector<f64> = solution.rows(n, m).into_owned();
                if all_finite(&lambda) && inf_norm(&lambda) <= LAMBDA_INIT_MAX {
                    lambda
                } else {
                    debug!("least squares multipliers rejected, starting from zero");
                    DVector::zeros(m)
                }
            }
            None => DVector::zeros(m),
        }
    }
}

/// keeps z_L*s_L and z_U*s_U within a factor KAPPA_SIGMA of mu
fn safeguard_bound_multipliers(
    bounds: &Bounds,
    zl: &mut DVector<f64>,
    zu: &mut DVector<f64>,
    s_l: &DVector<f64>,
    s_u: &DVector<f64>,
    mu: f64,
) {
    for i in 0..bounds.len() {
        if bounds.has_lower[i] {
            zl[i] = zl[i]
                .max(mu / (KAPPA_SIGMA * s_l[i]))
                .min(KAPPA_SIGMA * mu / s_l[i]);
        }
        if bounds.has_upper[i] {
            zu[i] = zu[i]
                .max(mu / (KAPPA_SIGMA * s_u[i]))
                .min(KAPPA_SIGMA * mu / s_u[i]);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_solution(
    status: SolverStatus,
    z: &DVector<f64>,
    f: f64,
    grad: &DVector<f64>,
    jac: &DMatrix<f64>,
    lambda: &DVector<f64>,
    zl: &DVector<f64>,
    zu: &DVector<f64>,
    iteration: usize,
    error: &KktError,
    mu: f64,
    start: &Instant,
) -> NLPSolution {
    let dual_res = grad + jac.transpose() * lambda - zl + zu;
    info!(
        "interior point finished with {:?} after {} iterations ({:.3} s), objective {:.8e}",
        status,
        iteration,
        start.elapsed().as_secs_f64(),
        f
    );
    NLPSolution {
        status,
        x: z.clone(),
        objective: f,
        lambda: lambda.clone(),
        z_lower: zl.clone(),
        z_upper: zu.clone(),
        iterations: iteration,
        constraint_violation: error.primal,
        dual_infeasibility: inf_norm(&dual_res),
        final_mu: mu,
    }
}

/// scaled optimality error of the barrier problem with parameter `mu` (mu = 0: the problem itself)
#[allow(clippy::too_many_arguments)]
fn kkt_error(
    bounds: &Bounds,
    grad: &DVector<f64>,
    jac: &DMatrix<f64>,
    c: &DVector<f64>,
    lambda: &DVector<f64>,
    zl: &DVector<f64>,
    zu: &DVector<f64>,
    s_l: &DVector<f64>,
    s_u: &DVector<f64>,
    mu: f64,
) -> KktError {
    let n = grad.len();
    let m = c.len();
    let dual_res = grad + jac.transpose() * lambda - zl + zu;
    let dual = inf_norm(&dual_res);
    let primal = inf_norm(c);
    let mut complementarity: f64 = 0.0;
    for i in 0..n {
        if bounds.has_lower[i] {
            complementarity = complementarity.max((s_l[i] * zl[i] - mu).abs());
        }
        if bounds.has_upper[i] {
            complementarity = complementarity.max((s_u[i] * zu[i] - mu).abs());
        }
    }
    let z_sum = l1_norm(zl) + l1_norm(zu);
    let s_d = S_MAX.max((l1_norm(lambda) + z_sum) / (m + n) as f64) / S_MAX;
    let s_c = S_MAX.max(z_sum / n as f64) / S_MAX;
    let total = (dual / s_d).max(primal).max(complementarity / s_c);
    KktError {
        primal,
        dual,
        complementarity,
        total,
    }
}

fn assemble_kkt(
    hessian: &DMatrix<f64>,
    sigma: &DVector<f64>,
    jac: &DMatrix<f64>,
    delta_w: f64,
    delta_c: f64,
) -> DMatrix<f64> {
    let n = hessian.nrows();
    let m = jac.nrows();
    let mut kkt = DMatrix::zeros(n + m, n + m);
    kkt.view_mut((0, 0), (n, n)).copy_from(hessian);
    for i in 0..n {
        kkt[(i, i)] += sigma[i] + delta_w;
    }
    kkt.view_mut((0, n), (n, m)).copy_from(&jac.transpose());
    kkt.view_mut((n, 0), (m, n)).copy_from(jac);
    for j in 0..m {
        kkt[(n + j, n + j)] = -delta_c;
    }
    kkt
}

fn next_delta_w(delta_w: f64, delta_w_last: f64) -> f64 {
    if delta_w == 0.0 {
        if delta_w_last == 0.0 {
            DELTA_W_INIT
        } else {
            (DELTA_W_DEC * delta_w_last).max(DELTA_W_MIN)
        }
    } else if delta_w_last == 0.0 {
        DELTA_W_INC_FIRST * delta_w
    } else {
        DELTA_W_INC * delta_w
    }
}

/// Solves the KKT system, shifting the Hessian block until the step has enough curvature:
/// dz^T (W + Sigma + dw*I) dz >= CURVATURE_KAPPA * |dz|^2
fn factorize_kkt(
    hessian: &DMatrix<f64>,
    sigma: &DVector<f64>,
    jac: &DMatrix<f64>,
    rhs: &DVector<f64>,
    delta_w_last: &mut f64,
    mu: f64,
    iteration: usize,
) -> Result<KktStep, NLPError> {
    let n = hessian.nrows();
    let mut delta_w = 0.0;
    let mut delta_c = 0.0;
    loop {
        let lu = assemble_kkt(hessian, sigma, jac, delta_w, delta_c).lu();
        match lu.solve(rhs) {
            Some(solution) if all_finite(&solution) => {
                let dz: DVector<f64> = solution.rows(0, n).into_owned();
                let dz_norm2 = dz.norm_squared();
                let weighted: f64 = (0..n).map(|i| (sigma[i] + delta_w) * dz[i] * dz[i]).sum();
                let curvature = (hessian * &dz).dot(&dz) + weighted;
                if curvature >= CURVATURE_KAPPA * dz_norm2 {
                    if delta_w > 0.0 {
                        *delta_w_last = delta_w;
                    }
                    return Ok(KktStep {
                        lu,
                        solution,
                        delta_w,
                        delta_c,
                    });
                }
            }
            _ => {
                if delta_c == 0.0 {
                    delta_c = DELTA_C * mu.powf(0.25);
                }
            }
        }
        delta_w = next_delta_w(delta_w, *delta_w_last);
        if delta_w > DELTA_W_MAX {
            return Err(NLPError::SingularSystem { iteration });
        }
    }
}

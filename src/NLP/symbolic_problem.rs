//! # Symbolic Problem Module
//!
//! Declarative description of a nonlinear program. Variables are added one by one with their
//! initial guess and bounds, the objective and the equality constraints are given as RustedSciThe
//! expressions together with the names of the variables they depend on.
//!
//! `compile()` produces a `CompiledNLP`:
//! - gradient entries and Jacobian rows: `expr.diff(var)` for every argument of the function
//! - Hessian entries: second derivatives for every pair of arguments (upper triangle only)
//! - every expression is lambdified into a closure over the function's own arguments, so the cost of
//!   one evaluation does not grow with the total number of variables
//!
//! Derivatives that simplify to the constant zero are dropped from the Hessian pattern.

use super::NLPError;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;

/// numeric closure produced from a symbolic expression
type Lambda = Box<dyn Fn(Vec<f64>) -> f64>;

fn lambdify(expr: &Expr, args: &[&str]) -> Lambda {
    let fun = expr.clone().lambdify_owned(args.to_vec());
    Box::new(fun)
}

fn is_zero(expr: &Expr) -> bool {
    matches!(expr, Expr::Const(c) if *c == 0.0)
}

/// The interface the interior point solver works with.
///
/// Dense storage is used throughout: `jacobian` is `m x n`, `lagrangian_hessian` is `n x n`.
pub trait NLProblem {
    fn n_variables(&self) -> usize;
    fn n_constraints(&self) -> usize;
    fn initial_guess(&self) -> DVector<f64>;
    /// lower bounds, `f64::NEG_INFINITY` for variables without one
    fn lower_bounds(&self) -> DVector<f64>;
    /// upper bounds, `f64::INFINITY` for variables without one
    fn upper_bounds(&self) -> DVector<f64>;
    fn objective(&self, z: &DVector<f64>) -> f64;
    fn gradient(&self, z: &DVector<f64>) -> DVector<f64>;
    /// values of the equality constraints c(z)
    fn constraints(&self, z: &DVector<f64>) -> DVector<f64>;
    fn jacobian(&self, z: &DVector<f64>) -> DMatrix<f64>;
    /// sigma_f * hess(f) + sum_j lambda_j * hess(c_j)
    fn lagrangian_hessian(
        &self,
        z: &DVector<f64>,
        sigma_f: f64,
        lambda: &DVector<f64>,
    ) -> DMatrix<f64>;
}

/// symbolic expression together with the names of its arguments
#[derive(Debug, Clone)]
pub struct SymbolicFunction {
    pub expr: Expr,
    pub args: Vec<String>,
}

/// Declarative nonlinear program: variables, bounds, initial guess, objective, equality constraints
#[derive(Debug, Clone, Default)]
pub struct SymbolicNLP {
    /// variable names in the order of the solution vector
    pub variables: Vec<String>,
    /// name -> position in the solution vector
    pub index: HashMap<String, usize>,
    pub initial_guess: Vec<f64>,
    pub lower_bounds: Vec<f64>,
    pub upper_bounds: Vec<f64>,
    pub objective: Option<SymbolicFunction>,
    pub equalities: Vec<SymbolicFunction>,
}

impl SymbolicNLP {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a decision variable and returns its position in the solution vector
    ///
    /// # Arguments
    /// * `name` - unique variable name, used in the symbolic expressions
    /// * `initial` - initial guess
    /// * `lower`, `upper` - bounds, infinite values mean "no bound"
    pub fn add_variable(
        &mut self,
        name: &str,
        initial: f64,
        lower: f64,
        upper: f64,
    ) -> Result<usize, NLPError> {
        if self.index.contains_key(name) {
            return Err(NLPError::InvalidProblem(format!(
                "variable {} is defined twice",
                name
            )));
        }
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(NLPError::InvalidProblem(format!(
                "bounds of {} are inconsistent: [{}, {}]",
                name, lower, upper
            )));
        }
        if !initial.is_finite() {
            return Err(NLPError::InvalidProblem(format!(
                "initial guess of {} is not finite",
                name
            )));
        }
        let position = self.variables.len();
        self.variables.push(name.to_string());
        self.index.insert(name.to_string(), position);
        self.initial_guess.push(initial);
        self.lower_bounds.push(lower);
        self.upper_bounds.push(upper);
        Ok(position)
    }

    /// Sets the function to be minimized
    pub fn set_objective(&mut self, expr: Expr, args: Vec<String>) -> Result<(), NLPError> {
        let args = self.checked_args(args)?;
        self.objective = Some(SymbolicFunction { expr, args });
        Ok(())
    }

    /// Adds the equality constraint `expr = 0` and returns its row number
    pub fn add_equality(&mut self, expr: Expr, args: Vec<String>) -> Result<usize, NLPError> {
        let args = self.checked_args(args)?;
        self.equalities.push(SymbolicFunction { expr, args });
        Ok(self.equalities.len() - 1)
    }

    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn n_equalities(&self) -> usize {
        self.equalities.len()
    }

    /// all arguments must be known variables; repeated names are dropped
    fn checked_args(&self, args: Vec<String>) -> Result<Vec<String>, NLPError> {
        let mut unique: Vec<String> = Vec::with_capacity(args.len());
        for arg in args {
            if !self.index.contains_key(&arg) {
                return Err(NLPError::DimensionMismatch(format!(
                    "unknown variable {} in function arguments",
                    arg
                )));
            }
            if !unique.contains(&arg) {
                unique.push(arg);
            }
        }
        Ok(unique)
    }

    /// Turns the symbolic description into numeric closures for values, gradients and Hessians
    pub fn compile(&self) -> Result<CompiledNLP, NLPError> {
        let objective = self.objective.as_ref().ok_or_else(|| {
            NLPError::InvalidProblem("objective function is not defined".to_string())
        })?;
        if self.variables.is_empty() {
            return Err(NLPError::InvalidProblem("no variables defined".to_string()));
        }
        info!(
            "compiling NLP: {} variables, {} equality constraints",
            self.n_variables(),
            self.n_equalities()
        );
        let objective = CompiledFunction::from_symbolic(objective, &self.index)?;
        let mut constraints = Vec::with_capacity(self.equalities.len());
        for (row, eq) in self.equalities.iter().enumerate() {
            debug!("c{} = {}", row, eq.expr);
            constraints.push(CompiledFunction::from_symbolic(eq, &self.index)?);
        }
        let hessian_entries: usize = constraints.iter().map(|c| c.hessian.len()).sum();
        info!(
            "NLP compiled: {} jacobian entries, {} hessian entries",
            constraints.iter().map(|c| c.args.len()).sum::<usize>(),
            hessian_entries + objective.hessian.len()
        );
        Ok(CompiledNLP {
            variables: self.variables.clone(),
            initial_guess: DVector::from_vec(self.initial_guess.clone()),
            lower_bounds: DVector::from_vec(self.lower_bounds.clone()),
            upper_bounds: DVector::from_vec(self.upper_bounds.clone()),
            objective,
            constraints,
        })
    }
}

/// one scalar function with its lambdified first and second derivatives
struct CompiledFunction {
    /// global positions of the arguments
    args: Vec<usize>,
    value: Lambda,
    /// d f / d args[k]
    gradient: Vec<Lambda>,
    /// (k, l, d2 f / d args[k] d args[l]) for k <= l
    hessian: Vec<(usize, usize, Lambda)>,
}

impl CompiledFunction {
    fn from_symbolic(
        function: &SymbolicFunction,
        index: &HashMap<String, usize>,
    ) -> Result<Self, NLPError> {
        let mut args = Vec::with_capacity(function.args.len());
        for name in &function.args {
            let position = index.get(name).ok_or_else(|| {
                NLPError::DimensionMismatch(format!("unknown variable {}", name))
            })?;
            args.push(*position);
        }
        let names: Vec<&str> = function.args.iter().map(|s| s.as_str()).collect();

        let value = lambdify(&function.expr, &names);
        let mut first_derivatives = Vec::with_capacity(names.len());
        let mut gradient = Vec::with_capacity(names.len());
        for name in &names {
            let derivative = function.expr.clone().diff(*name).symplify();
            gradient.push(lambdify(&derivative, &names));
            first_derivatives.push(derivative);
        }
        let mut hessian = Vec::new();
        for k in 0..names.len() {
            for l in k..names.len() {
                let second = first_derivatives[k].clone().diff(names[l]).symplify();
                if is_zero(&second) {
                    continue;
                }
                hessian.push((k, l, lambdify(&second, &names)));
            }
        }
        Ok(Self {
            args,
            value,
            gradient,
            hessian,
        })
    }

    fn local(&self, z: &DVector<f64>) -> Vec<f64> {
        self.args.iter().map(|&k| z[k]).collect()
    }

    fn eval(&self, z: &DVector<f64>) -> f64 {
        (self.value)(self.local(z))
    }

    /// adds weight * hess(f) into a dense symmetric matrix
    fn add_hessian(&self, z: &DVector<f64>, weight: f64, target: &mut DMatrix<f64>) {
        if weight == 0.0 || self.hessian.is_empty() {
            return;
        }
        let local = self.local(z);
        for (k, l, second) in &self.hessian {
            let value = weight * second(local.clone());
            let (p, q) = (self.args[*k], self.args[*l]);
            target[(p, q)] += value;
            if p != q {
                target[(q, p)] += value;
            }
        }
    }
}

/// Numeric form of a `SymbolicNLP`
pub struct CompiledNLP {
    pub variables: Vec<String>,
    initial_guess: DVector<f64>,
    lower_bounds: DVector<f64>,
    upper_bounds: DVector<f64>,
    objective: CompiledFunction,
    constraints: Vec<CompiledFunction>,
}

impl NLProblem for CompiledNLP {
    fn n_variables(&self) -> usize {
        self.variables.len()
    }

    fn n_constraints(&self) -> usize {
        self.constraints.len()
    }

    fn initial_guess(&self) -> DVector<f64> {
        self.initial_guess.clone()
    }

    fn lower_bounds(&self) -> DVector<f64> {
        self.lower_bounds.clone()
    }

    fn upper_bounds(&self) -> DVector<f64> {
        self.upper_bounds.clone()
    }

    fn objective(&self, z: &DVector<f64>) -> f64 {
        self.objective.eval(z)
    }

    fn gradient(&self, z: &DVector<f64>) -> DVector<f64> {
        let mut gradient = DVector::zeros(self.n_variables());
        let local = self.objective.local(z);
        for (k, derivative) in self.objective.gradient.iter().enumerate() {
            gradient[self.objective.args[k]] += derivative(local.clone());
        }
        gradient
    }

    fn constraints(&self, z: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.constraints.len(),
            self.constraints.iter().map(|c| c.eval(z)),
        )
    }

    fn jacobian(&self, z: &DVector<f64>) -> DMatrix<f64> {
        let mut jacobian = DMatrix::zeros(self.n_constraints(), self.n_variables());
        for (row, constraint) in self.constraints.iter().enumerate() {
            let local = constraint.local(z);
            for (k, derivative) in constraint.gradient.iter().enumerate() {
                jacobian[(row, constraint.args[k])] += derivative(local.clone());
            }
        }
        jacobian
    }

    fn lagrangian_hessian(
        &self,
        z: &DVector<f64>,
        sigma_f: f64,
        lambda: &DVector<f64>,
    ) -> DMatrix<f64> {
        let n = self.n_variables();
        let mut hessian = DMatrix::zeros(n, n);
        self.objective.add_hessian(z, sigma_f, &mut hessian);
        for (row, constraint) in self.constraints.iter().enumerate() {
            constraint.add_hessian(z, lambda[row], &mut hessian);
        }
        hessian
    }
}

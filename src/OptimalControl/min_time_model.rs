//! Direct transcription of the minimum-time problem into a `SymbolicNLP`.
//!
//! Layout of the solution vector: `tf`, then `x0..xN`, `v0..vN`, `a0..aN`.
//! Constraint rows: for every interval `i = 1..N` the position defect `(x_i - x_{i-1})/h - v_i`
//! and the velocity defect `(v_i - v_{i-1})/h - (a_i - R*v_i^2)` with `h = tf/N`,
//! then `x0 = 0`, `xN = L`, `v0 = 0`, `vN = 0`. The barrier on `tf >= 0` keeps `tf` positive.
use super::min_time_task::{MinTimeTask, OCPError};
use super::solution::Trajectory;
use crate::NLP::interior_point::NLPSolution;
use crate::NLP::symbolic_problem::SymbolicNLP;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use log::info;

pub struct MinTimeModel {
    pub task: MinTimeTask,
    pub nlp: SymbolicNLP,
    tf: usize,
    x: Vec<usize>,
    v: Vec<usize>,
    a: Vec<usize>,
}

fn var(name: &str) -> Expr {
    Expr::Var(name.to_owned())
}

impl MinTimeModel {
    /// Validates the task, creates the variables with their initial guesses and bounds, the
    /// `2N + 4` equality constraints and the objective `tf`
    pub fn build(task: &MinTimeTask) -> Result<Self, OCPError> {
        task.validate()?;
        let n = task.N;
        let mut nlp = SymbolicNLP::new();

        let tf = nlp.add_variable("tf", task.tf_init, 0.0, f64::INFINITY)?;
        let v_init = task.L / task.tf_init;
        let mut x = Vec::with_capacity(n + 1);
        let mut v = Vec::with_capacity(n + 1);
        let mut a = Vec::with_capacity(n + 1);
        for i in 0..=n {
            let x_init = task.L * i as f64 / n as f64;
            x.push(nlp.add_variable(
                &format!("x{}", i),
                x_init,
                f64::NEG_INFINITY,
                f64::INFINITY,
            )?);
        }
        for i in 0..=n {
            v.push(nlp.add_variable(
                &format!("v{}", i),
                v_init,
                f64::NEG_INFINITY,
                f64::INFINITY,
            )?);
        }
        for i in 0..=n {
            a.push(nlp.add_variable(&format!("a{}", i), 0.0, task.aL, task.aU)?);
        }
        info!("{} variables created", nlp.n_variables());

        // 1/h
        let rate = Expr::Const(n as f64) / var("tf");
        for i in 1..=n {
            let (x_prev, x_i) = (format!("x{}", i - 1), format!("x{}", i));
            let (v_prev, v_i) = (format!("v{}", i - 1), format!("v{}", i));
            let a_i = format!("a{}", i);

            let position_defect = (var(&x_i) - var(&x_prev)) * rate.clone() - var(&v_i);
            nlp.add_equality(
                position_defect,
                vec!["tf".to_string(), x_prev, x_i, v_i.clone()],
            )?;

            let rhs = if task.R > 0.0 {
                var(&a_i) - Expr::Const(task.R) * var(&v_i) * var(&v_i)
            } else {
                var(&a_i)
            };
            let velocity_defect = (var(&v_i) - var(&v_prev)) * rate.clone() - rhs;
            nlp.add_equality(velocity_defect, vec!["tf".to_string(), v_prev, v_i, a_i])?;
        }
        let x_last = format!("x{}", n);
        let v_last = format!("v{}", n);
        nlp.add_equality(var("x0"), vec!["x0".to_string()])?;
        nlp.add_equality(var(&x_last) - Expr::Const(task.L), vec![x_last])?;
        nlp.add_equality(var("v0"), vec!["v0".to_string()])?;
        nlp.add_equality(var(&v_last), vec![v_last])?;
        info!("{} constraints created", nlp.n_equalities());

        nlp.set_objective(var("tf"), vec!["tf".to_string()])?;

        Ok(Self {
            task: *task,
            nlp,
            tf,
            x,
            v,
            a,
        })
    }

    pub fn n_variables(&self) -> usize {
        self.nlp.n_variables()
    }

    pub fn n_constraints(&self) -> usize {
        self.nlp.n_equalities()
    }

    pub fn tf_index(&self) -> usize {
        self.tf
    }

    pub fn x_index(&self, i: usize) -> Option<usize> {
        self.x.get(i).copied()
    }

    pub fn v_index(&self, i: usize) -> Option<usize> {
        self.v.get(i).copied()
    }

    pub fn a_index(&self, i: usize) -> Option<usize> {
        self.a.get(i).copied()
    }

    /// Reads `tf` and the node values out of the solver's primal vector
    pub fn extract_trajectory(&self, solution: &NLPSolution) -> Result<Trajectory, OCPError> {
        let z = &solution.x;
        if z.len() != self.n_variables() {
            return Err(OCPError::CalculationError(format!(
                "solution has {} entries, model has {} variables",
                z.len(),
                self.n_variables()
            )));
        }
        let tf = z[self.tf];
        let h = tf / self.task.N as f64;
        let values = |indices: &[usize]| -> Vec<f64> { indices.iter().map(|&k| z[k]).collect() };
        let mut trajectory =
            Trajectory::from_arrays(h, values(&self.x), values(&self.v), values(&self.a))?;
        trajectory.tf = tf;
        trajectory.iterations = solution.iterations;
        Ok(trajectory)
    }
}

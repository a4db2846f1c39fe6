//! Derivative-free minimisation.
//!
//! `Optimizer` is the capability seam used by the continuous search. The
//! bundled implementation runs argmin's Nelder–Mead solver. Convergence is
//! decided by the problem itself (`SimplexProblem::size`), so the caller can
//! measure the simplex in whatever unit makes sense (pixels, for dispersion
//! fitting).

use std::cell::RefCell;

use argmin::core::{
    ArgminError, CostFunction, Error, Executor, IterState, KV, Problem, Solver, State, TerminationReason,
    TerminationStatus,
};
use argmin::solver::neldermead::NelderMead as ArgminNelderMead;
use log::trace;

use crate::domain::OptimizerKind;
use crate::error::{CalibError, CalibResult};

/// Objective plus convergence measure.
pub trait SimplexProblem {
    /// Value to minimise. Must not fail; map failures to a large value.
    fn cost(&mut self, x: &[f64]) -> f64;

    /// Size of a simplex whose vertices are ordered best first.
    fn size(&self, simplex: &[Vec<f64>]) -> f64;
}

/// Result of a converged minimisation.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

pub trait Optimizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Minimise from `start` with initial steps `steps`.
    ///
    /// Fails with `Continue` when `max_iterations` pass without the simplex size
    /// dropping below `tolerance`.
    fn minimize(
        &self,
        problem: &mut dyn SimplexProblem,
        start: &[f64],
        steps: &[f64],
        tolerance: f64,
        max_iterations: usize,
    ) -> CalibResult<Minimum>;
}

impl OptimizerKind {
    pub fn instantiate(self) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::NelderMead => Box::new(NelderMead::default()),
            OptimizerKind::Disabled => Box::new(Unavailable),
        }
    }
}

/// Nelder–Mead coefficients, passed through to argmin's solver.
#[derive(Debug, Clone, Copy)]
pub struct NelderMead {
    pub reflection: f64,
    pub expansion: f64,
    pub contraction: f64,
    pub shrink: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
        }
    }
}

impl NelderMead {
    fn solver(&self, vertices: Vec<Vec<f64>>) -> Result<ArgminNelderMead<Vec<f64>, f64>, Error> {
        ArgminNelderMead::new(vertices)
            .with_alpha(self.reflection)?
            .with_gamma(self.expansion)?
            .with_rho(self.contraction)?
            .with_sigma(self.shrink)
    }
}

impl Optimizer for NelderMead {
    fn name(&self) -> &'static str {
        "nelder-mead"
    }

    fn minimize(
        &self,
        problem: &mut dyn SimplexProblem,
        start: &[f64],
        steps: &[f64],
        tolerance: f64,
        max_iterations: usize,
    ) -> CalibResult<Minimum> {
        let dim = start.len();
        if dim == 0 {
            return Err(CalibError::NullInput("nothing to optimise".to_string()));
        }
        if steps.len() != dim {
            return Err(CalibError::IncompatibleInput(format!(
                "{} steps for {dim} parameters",
                steps.len()
            )));
        }

        let mut vertices: Vec<Vec<f64>> = Vec::with_capacity(dim + 1);
        vertices.push(start.to_vec());
        for (i, &step) in steps.iter().enumerate() {
            let mut v = start.to_vec();
            v[i] += step;
            vertices.push(v);
        }

        let solver = SizedSimplex {
            inner: self.solver(vertices)?,
            vertices: Vec::new(),
            size: f64::INFINITY,
            tolerance,
        };
        let adapter = CostAdapter {
            problem: RefCell::new(problem),
            journal: RefCell::new(Vec::new()),
        };
        let result = Executor::new(adapter, solver)
            .configure(|state| state.max_iters(max_iterations as u64))
            .run()?;

        let iterations = result.state().get_iter() as usize;
        let simplex = &result.solver;
        if !simplex.converged() {
            return Err(CalibError::Continue(format!(
                "simplex did not converge to {tolerance} within {max_iterations} iterations (size {:.4})",
                simplex.size
            )));
        }
        let (x, value) = simplex.vertices[0].clone();
        Ok(Minimum { x, value, iterations })
    }
}

/// Exposes a `SimplexProblem` to argmin and records every evaluation.
struct CostAdapter<'p> {
    problem: RefCell<&'p mut dyn SimplexProblem>,
    /// Points evaluated since the solver last looked, with their costs.
    journal: RefCell<Vec<(Vec<f64>, f64)>>,
}

impl CostFunction for CostAdapter<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        let value = sanitize(self.problem.borrow_mut().cost(x));
        self.journal.borrow_mut().push((x.clone(), value));
        Ok(value)
    }
}

type SimplexState = IterState<Vec<f64>, (), (), (), (), f64>;

/// argmin's Nelder–Mead with convergence measured by `SimplexProblem::size`.
///
/// argmin keeps its simplex private, so the vertices are followed here from
/// the evaluations each step makes and the move it reports.
struct SizedSimplex {
    inner: ArgminNelderMead<Vec<f64>, f64>,
    /// Best first, ordered exactly as argmin orders its own copy.
    vertices: Vec<(Vec<f64>, f64)>,
    size: f64,
    tolerance: f64,
}

impl SizedSimplex {
    fn converged(&self) -> bool {
        self.size < self.tolerance
    }

    /// Fold one step's evaluations into the vertex list and re-measure it.
    fn follow(
        &mut self,
        problem: &Problem<CostAdapter<'_>>,
        state: &SimplexState,
        action: Option<&str>,
    ) -> Result<(), Error> {
        let adapter = problem.problem.as_ref().ok_or_else(|| ArgminError::NotInitialized {
            text: "problem was taken from the executor".to_string(),
        })?;
        let mut evaluated = std::mem::take(&mut *adapter.journal.borrow_mut());

        match action {
            None => self.vertices = evaluated,
            Some("Reflection") if evaluated.len() == 1 => replace_worst(&mut self.vertices, evaluated.swap_remove(0)),
            Some("Expansion") if evaluated.len() == 2 => {
                let expanded = evaluated.swap_remove(1);
                let reflected = evaluated.swap_remove(0);
                let keep = if expanded.1 < reflected.1 { expanded } else { reflected };
                replace_worst(&mut self.vertices, keep);
            }
            Some("ContractionOutside" | "ContractionInside") if evaluated.len() == 2 => {
                replace_worst(&mut self.vertices, evaluated.swap_remove(1));
            }
            Some("Shrink") if evaluated.len() == self.vertices.len() + 1 => {
                for (vertex, shrunk) in self.vertices.iter_mut().skip(1).zip(evaluated.drain(2..)) {
                    *vertex = shrunk;
                }
            }
            Some(other) => {
                return Err(ArgminError::PotentialBug {
                    text: format!("cannot follow simplex move {other} after {} evaluations", evaluated.len()),
                }
                .into());
            }
        }
        self.vertices
            .sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if self.vertices.first().map(|v| v.1) != Some(state.get_cost()) {
            return Err(ArgminError::PotentialBug {
                text: "followed simplex disagrees with the solver".to_string(),
            }
            .into());
        }
        let points: Vec<Vec<f64>> = self.vertices.iter().map(|(x, _)| x.clone()).collect();
        self.size = adapter.problem.borrow().size(&points);
        trace!(
            "simplex iter {}: best {:.6}, size {:.4}",
            state.get_iter(),
            self.vertices[0].1,
            self.size
        );
        Ok(())
    }
}

fn replace_worst(vertices: &mut [(Vec<f64>, f64)], vertex: (Vec<f64>, f64)) {
    if let Some(last) = vertices.last_mut() {
        *last = vertex;
    }
}

impl<'p> Solver<CostAdapter<'p>, SimplexState> for SizedSimplex {
    const NAME: &'static str = "Nelder-Mead (sized)";

    fn init(
        &mut self,
        problem: &mut Problem<CostAdapter<'p>>,
        state: SimplexState,
    ) -> Result<(SimplexState, Option<KV>), Error> {
        let (state, kv) = self.inner.init(problem, state)?;
        self.follow(problem, &state, None)?;
        Ok((state, kv))
    }

    fn next_iter(
        &mut self,
        problem: &mut Problem<CostAdapter<'p>>,
        state: SimplexState,
    ) -> Result<(SimplexState, Option<KV>), Error> {
        let (state, kv) = self.inner.next_iter(problem, state)?;
        let action = kv
            .as_ref()
            .and_then(|kv| kv.get("action"))
            .and_then(|v| v.get_string())
            .unwrap_or_default();
        self.follow(problem, &state, Some(action.as_str()))?;
        Ok((state, kv))
    }

    fn terminate(&mut self, _state: &SimplexState) -> TerminationStatus {
        if self.converged() {
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
        } else {
            TerminationStatus::NotTerminated
        }
    }
}

/// Stand-in used when continuous optimisation is switched off.
#[derive(Debug, Clone, Copy)]
pub struct Unavailable;

impl Optimizer for Unavailable {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn minimize(
        &self,
        _problem: &mut dyn SimplexProblem,
        _start: &[f64],
        _steps: &[f64],
        _tolerance: f64,
        _max_iterations: usize,
    ) -> CalibResult<Minimum> {
        Err(CalibError::UnsupportedMode(
            "continuous optimisation is disabled".to_string(),
        ))
    }
}

fn sanitize(v: f64) -> f64 {
    if v.is_nan() { f64::INFINITY } else { v }
}

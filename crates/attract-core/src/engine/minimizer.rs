use super::config::MinimizerConfig;
use super::error::EngineError;
use super::line_search::StrongWolfe;
use nalgebra::DVector;
use std::collections::VecDeque;
use tracing::{debug, info, instrument, trace, warn};

/// Variables closer than this (relative) to a bound count as sitting on it.
const BOUND_TOLERANCE: f64 = 1e-12;

/// A differentiable function of a fixed number of box-bounded variables.
pub trait Objective {
    fn dimension(&self) -> usize;

    /// Lower and upper bound of every variable. A variable with equal bounds is frozen.
    fn bounds(&self) -> Vec<(f64, f64)> {
        vec![(f64::NEG_INFINITY, f64::INFINITY); self.dimension()]
    }

    /// Returns the value at `variables` and writes the gradient into `gradient`, which
    /// has the same length.
    fn evaluate(&mut self, variables: &[f64], gradient: &mut [f64]) -> Result<f64, EngineError>;
}

impl<T: Objective + ?Sized> Objective for &mut T {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        (**self).bounds()
    }

    fn evaluate(&mut self, variables: &[f64], gradient: &mut [f64]) -> Result<f64, EngineError> {
        (**self).evaluate(variables, gradient)
    }
}

/// How a successful minimization stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimizationStatus {
    /// The projected gradient or the relative decrease fell below its tolerance.
    Converged,
    /// The iteration budget ran out first. This is a normal outcome, not an error.
    MaxIterReached,
}

#[derive(Debug, Clone)]
struct Correction {
    s: DVector<f64>,
    y: DVector<f64>,
}

/// Limited-memory BFGS with box constraints.
///
/// The active set is taken from the bounds at the start of every iteration: variables
/// sitting on a bound with the gradient pushing outward, and frozen variables, are
/// excluded from the quasi-Newton step. Steps are truncated at the nearest bound and
/// accepted by a strong Wolfe line search.
pub struct Lbfgs<O: Objective> {
    objective: O,
    config: MinimizerConfig,
    lower: DVector<f64>,
    upper: DVector<f64>,
    x: DVector<f64>,
    value: f64,
    gradient: DVector<f64>,
    evaluated: bool,
    history: VecDeque<Correction>,
    iterations: usize,
    trajectory: Vec<Vec<f64>>,
}

impl<O: Objective> Lbfgs<O> {
    /// Prepares a minimizer starting from the zero vector, projected into the bounds.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for an invalid `config` and
    /// [`EngineError::Initialization`] when the objective reports malformed bounds.
    pub fn new(objective: O, config: MinimizerConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let dimension = objective.dimension();
        let bounds = objective.bounds();
        if bounds.len() != dimension {
            return Err(EngineError::Initialization(format!(
                "objective has {} variables but {} bounds",
                dimension,
                bounds.len()
            )));
        }
        if let Some((index, (lo, hi))) = bounds
            .iter()
            .enumerate()
            .find(|(_, (lo, hi))| lo.is_nan() || hi.is_nan() || lo > hi)
        {
            return Err(EngineError::Initialization(format!(
                "invalid bounds [{lo}, {hi}] for variable {index}"
            )));
        }

        let lower = DVector::from_iterator(dimension, bounds.iter().map(|b| b.0));
        let upper = DVector::from_iterator(dimension, bounds.iter().map(|b| b.1));
        let x = project(&DVector::zeros(dimension), &lower, &upper);

        Ok(Self {
            objective,
            config,
            lower,
            upper,
            x,
            value: f64::NAN,
            gradient: DVector::zeros(dimension),
            evaluated: false,
            history: VecDeque::with_capacity(config.history_size),
            iterations: 0,
            trajectory: Vec::new(),
        })
    }

    /// Replaces the start point. It is projected into the bounds.
    pub fn with_start(mut self, start: &[f64]) -> Result<Self, EngineError> {
        if start.len() != self.x.len() {
            return Err(EngineError::Initialization(format!(
                "start point has {} variables, expected {}",
                start.len(),
                self.x.len()
            )));
        }
        self.x = project(&DVector::from_column_slice(start), &self.lower, &self.upper);
        self.evaluated = false;
        self.history.clear();
        Ok(self)
    }

    /// Runs at most `max_iterations` accepted iterations.
    ///
    /// Calling it again continues from the current point; the iteration count and the
    /// trajectory keep accumulating.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MinimizerFailure`] with the last accepted variables when
    /// the line search cannot decrease the objective even along steepest descent, and
    /// propagates any error raised by the objective.
    #[instrument(skip_all, name = "lbfgs_minimize", fields(dimension = self.x.len()))]
    pub fn minimize(&mut self, max_iterations: usize) -> Result<MinimizationStatus, EngineError> {
        if self.x.is_empty() {
            return Ok(MinimizationStatus::Converged);
        }
        if !self.evaluated {
            self.evaluate_current()?;
        }

        for _ in 0..max_iterations {
            if self.projected_gradient_norm() <= self.config.gradient_tolerance {
                info!(
                    iterations = self.iterations,
                    energy = self.value,
                    "Minimizer converged on projected gradient."
                );
                return Ok(MinimizationStatus::Converged);
            }

            let previous = self.value;
            self.step()?;
            self.iterations += 1;
            if self.config.record_trajectory {
                self.trajectory.push(self.x.as_slice().to_vec());
            }
            debug!(
                iteration = self.iterations,
                energy = self.value,
                projected_gradient = self.projected_gradient_norm(),
                "Accepted minimizer step."
            );

            let scale = previous.abs().max(self.value.abs()).max(1.0);
            if previous - self.value <= self.config.function_tolerance * scale {
                info!(
                    iterations = self.iterations,
                    energy = self.value,
                    "Minimizer converged on relative decrease."
                );
                return Ok(MinimizationStatus::Converged);
            }
        }

        if self.projected_gradient_norm() <= self.config.gradient_tolerance {
            Ok(MinimizationStatus::Converged)
        } else {
            Ok(MinimizationStatus::MaxIterReached)
        }
    }

    /// The variables of the current point, which is also the best point visited.
    pub fn minimized_variables(&self) -> &[f64] {
        self.x.as_slice()
    }

    pub fn iteration_count(&self) -> usize {
        self.iterations
    }

    /// Variables after accepted iteration `k + 1`. Only populated when
    /// [`MinimizerConfig::record_trajectory`] is set.
    pub fn variables_at_iteration(&self, k: usize) -> Option<&[f64]> {
        self.trajectory.get(k).map(Vec::as_slice)
    }

    pub fn trajectory(&self) -> &[Vec<f64>] {
        &self.trajectory
    }

    /// Objective value at the current point, or `None` before the first evaluation.
    pub fn energy(&self) -> Option<f64> {
        self.evaluated.then_some(self.value)
    }

    pub fn objective(&self) -> &O {
        &self.objective
    }

    pub fn into_objective(self) -> O {
        self.objective
    }

    fn evaluate_current(&mut self) -> Result<(), EngineError> {
        let mut gradient = DVector::zeros(self.x.len());
        self.value = self
            .objective
            .evaluate(self.x.as_slice(), gradient.as_mut_slice())?;
        self.gradient = gradient;
        self.evaluated = true;
        Ok(())
    }

    fn at_lower(&self, i: usize) -> bool {
        self.x[i] <= self.lower[i] + BOUND_TOLERANCE * (1.0 + self.lower[i].abs())
    }

    fn at_upper(&self, i: usize) -> bool {
        self.x[i] >= self.upper[i] - BOUND_TOLERANCE * (1.0 + self.upper[i].abs())
    }

    fn is_free(&self, i: usize) -> bool {
        let g = self.gradient[i];
        !(self.lower[i] == self.upper[i]
            || (self.at_lower(i) && g > 0.0)
            || (self.at_upper(i) && g < 0.0))
    }

    fn free_mask(&self) -> DVector<f64> {
        DVector::from_fn(self.x.len(), |i, _| if self.is_free(i) { 1.0 } else { 0.0 })
    }

    fn projected_gradient(&self) -> DVector<f64> {
        self.gradient.component_mul(&self.free_mask())
    }

    fn projected_gradient_norm(&self) -> f64 {
        self.projected_gradient().amax()
    }

    /// Two-loop recursion restricted to the free variables.
    fn quasi_newton_direction(&self, mask: &DVector<f64>) -> DVector<f64> {
        let pairs: Vec<(DVector<f64>, DVector<f64>, f64)> = self
            .history
            .iter()
            .filter_map(|c| {
                let s = c.s.component_mul(mask);
                let y = c.y.component_mul(mask);
                let sy = s.dot(&y);
                (sy > f64::EPSILON * y.norm_squared()).then_some((s, y, sy))
            })
            .collect();

        let mut q = self.gradient.component_mul(mask);
        let mut alphas = Vec::with_capacity(pairs.len());
        for (s, y, sy) in pairs.iter().rev() {
            let a = s.dot(&q) / sy;
            q.axpy(-a, y, 1.0);
            alphas.push(a);
        }

        let gamma = pairs
            .last()
            .map(|(_, y, sy)| sy / y.norm_squared())
            .unwrap_or(1.0);
        let mut r = q * gamma;
        for ((s, y, sy), a) in pairs.iter().zip(alphas.iter().rev()) {
            let b = y.dot(&r) / sy;
            r.axpy(a - b, s, 1.0);
        }
        -r.component_mul(mask)
    }

    /// Zeroes components that would leave the box from a bound the variable sits on.
    fn keep_feasible(&self, direction: &mut DVector<f64>) {
        for i in 0..direction.len() {
            if (self.at_lower(i) && direction[i] < 0.0) || (self.at_upper(i) && direction[i] > 0.0)
            {
                direction[i] = 0.0;
            }
        }
    }

    fn max_step(&self, direction: &DVector<f64>) -> f64 {
        (0..direction.len())
            .filter_map(|i| {
                let d = direction[i];
                if d > 0.0 {
                    Some((self.upper[i] - self.x[i]) / d)
                } else if d < 0.0 {
                    Some((self.lower[i] - self.x[i]) / d)
                } else {
                    None
                }
            })
            .fold(f64::INFINITY, f64::min)
            .max(0.0)
    }

    fn step(&mut self) -> Result<(), EngineError> {
        let mask = self.free_mask();
        let mut direction = self.quasi_newton_direction(&mask);
        self.keep_feasible(&mut direction);
        if !(self.gradient.dot(&direction) < 0.0) {
            self.history.clear();
            direction = -self.projected_gradient();
        }

        loop {
            let slope = self.gradient.dot(&direction);
            let max_step = self.max_step(&direction);
            let initial_step = if self.history.is_empty() {
                (1.0 / direction.norm()).min(max_step)
            } else {
                max_step.min(1.0)
            };
            let search = StrongWolfe {
                initial_step,
                max_step,
                max_evaluations: self.config.max_line_search_steps,
            };

            let objective = &mut self.objective;
            let (x, lower, upper) = (&self.x, &self.lower, &self.upper);
            let trial = search.search(self.value, slope, |alpha| {
                let point = project(&(x + &direction * alpha), lower, upper);
                let mut gradient = DVector::zeros(point.len());
                let value = objective.evaluate(point.as_slice(), gradient.as_mut_slice())?;
                let slope = gradient.dot(&direction);
                Ok((value, slope, (point, gradient)))
            })?;

            match trial {
                Some(trial) => {
                    trace!(
                        iteration = self.iterations,
                        step = trial.alpha,
                        slope = trial.slope,
                        energy = trial.value,
                        "Accepted line-search step."
                    );
                    let (point, gradient) = trial.data;
                    self.accept(point, trial.value, gradient);
                    return Ok(());
                }
                None if !self.history.is_empty() => {
                    warn!(
                        iteration = self.iterations,
                        "Line search failed along the quasi-Newton direction; retrying along steepest descent."
                    );
                    self.history.clear();
                    direction = -self.projected_gradient();
                }
                None => {
                    warn!(
                        iteration = self.iterations,
                        energy = self.value,
                        "Line search found no decreasing step."
                    );
                    return Err(EngineError::MinimizerFailure {
                        iterations: self.iterations,
                        variables: self.x.as_slice().to_vec(),
                        reason: "line search could not find a step with sufficient decrease"
                            .to_string(),
                    });
                }
            }
        }
    }

    fn accept(&mut self, point: DVector<f64>, value: f64, gradient: DVector<f64>) {
        let s = &point - &self.x;
        let y = &gradient - &self.gradient;
        if s.dot(&y) > f64::EPSILON * y.norm_squared() {
            if self.history.len() == self.config.history_size {
                self.history.pop_front();
            }
            self.history.push_back(Correction { s, y });
        }
        self.x = point;
        self.value = value;
        self.gradient = gradient;
    }
}

fn project(x: &DVector<f64>, lower: &DVector<f64>, upper: &DVector<f64>) -> DVector<f64> {
    DVector::from_fn(x.len(), |i, _| x[i].max(lower[i]).min(upper[i]))
}

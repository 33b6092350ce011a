use super::error::EngineError;
use tracing::trace;

/// Armijo constant of the sufficient-decrease condition.
pub(crate) const SUFFICIENT_DECREASE: f64 = 1e-4;
/// Curvature constant of the strong Wolfe condition.
pub(crate) const CURVATURE: f64 = 0.9;

/// A point evaluated along the search direction, with whatever the caller needs to keep
/// from that evaluation (typically the full gradient).
#[derive(Debug, Clone)]
pub(crate) struct Trial<T> {
    pub alpha: f64,
    pub value: f64,
    pub slope: f64,
    pub data: T,
}

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    alpha: f64,
    value: f64,
    slope: f64,
}

/// Strong Wolfe line search by bracketing followed by zoom.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StrongWolfe {
    pub initial_step: f64,
    /// Largest step that keeps the iterate inside its bounds.
    pub max_step: f64,
    pub max_evaluations: usize,
}

impl StrongWolfe {
    /// Searches along a descent direction.
    ///
    /// `phi(alpha)` returns the objective value, the directional derivative and a payload
    /// at the step `alpha`. `value0` and `slope0` describe the start point and `slope0`
    /// must be negative.
    ///
    /// Returns `None` when no step with sufficient decrease was found within the
    /// evaluation budget. If the budget runs out after some step already satisfied the
    /// sufficient-decrease condition, the best such step is returned even though its
    /// curvature condition may not hold. A step that reaches `max_step` with sufficient
    /// decrease is accepted as is, since the bounds forbid going further.
    pub fn search<T, F>(
        &self,
        value0: f64,
        slope0: f64,
        mut phi: F,
    ) -> Result<Option<Trial<T>>, EngineError>
    where
        F: FnMut(f64) -> Result<(f64, f64, T), EngineError>,
    {
        if !(slope0 < 0.0) || !(self.max_step > 0.0) {
            return Ok(None);
        }

        let sufficient = |alpha: f64, value: f64| {
            value.is_finite() && value <= value0 + SUFFICIENT_DECREASE * alpha * slope0
        };
        let flat_enough = |slope: f64| slope.abs() <= -CURVATURE * slope0;

        let mut lo = Endpoint {
            alpha: 0.0,
            value: value0,
            slope: slope0,
        };
        let mut lo_data: Option<T> = None;
        let mut alpha = self.initial_step.min(self.max_step);
        let mut evaluations = 0;

        let mut hi = loop {
            if evaluations >= self.max_evaluations {
                return Ok(Self::best(lo, lo_data));
            }
            let (value, slope, data) = phi(alpha)?;
            evaluations += 1;
            trace!(alpha, value, slope, "Line search bracketing trial.");

            if !sufficient(alpha, value) || (lo_data.is_some() && value >= lo.value) {
                break Endpoint {
                    alpha,
                    value,
                    slope,
                };
            }
            if flat_enough(slope) || alpha >= self.max_step {
                return Ok(Some(Trial {
                    alpha,
                    value,
                    slope,
                    data,
                }));
            }
            let current = Endpoint {
                alpha,
                value,
                slope,
            };
            if slope >= 0.0 {
                let previous = lo;
                lo = current;
                lo_data = Some(data);
                break previous;
            }
            lo = current;
            lo_data = Some(data);
            alpha = (2.0 * alpha).min(self.max_step);
        };

        loop {
            if evaluations >= self.max_evaluations {
                return Ok(Self::best(lo, lo_data));
            }
            let width = hi.alpha - lo.alpha;
            if width.abs() <= f64::EPSILON * lo.alpha.abs().max(1.0) {
                return Ok(Self::best(lo, lo_data));
            }

            let alpha = interpolate(&lo, &hi);
            let (value, slope, data) = phi(alpha)?;
            evaluations += 1;
            trace!(alpha, value, slope, "Line search zoom trial.");

            if !sufficient(alpha, value) || value >= lo.value {
                hi = Endpoint {
                    alpha,
                    value,
                    slope,
                };
                continue;
            }
            if flat_enough(slope) {
                return Ok(Some(Trial {
                    alpha,
                    value,
                    slope,
                    data,
                }));
            }
            if slope * (hi.alpha - lo.alpha) >= 0.0 {
                hi = lo;
            }
            lo = Endpoint {
                alpha,
                value,
                slope,
            };
            lo_data = Some(data);
        }
    }

    fn best<T>(lo: Endpoint, data: Option<T>) -> Option<Trial<T>> {
        data.map(|data| Trial {
            alpha: lo.alpha,
            value: lo.value,
            slope: lo.slope,
            data,
        })
    }
}

/// Minimizer of the quadratic through `lo` (value and slope) and `hi` (value), kept
/// within the inner 80% of the bracket. Falls back to bisection when the model is not
/// convex or `hi` is not finite.
fn interpolate(lo: &Endpoint, hi: &Endpoint) -> f64 {
    let width = hi.alpha - lo.alpha;
    let midpoint = lo.alpha + 0.5 * width;
    if !hi.value.is_finite() {
        return midpoint;
    }
    let curvature = hi.value - lo.value - lo.slope * width;
    if !(curvature > 0.0) {
        return midpoint;
    }
    let candidate = lo.alpha - lo.slope * width * width / (2.0 * curvature);
    let (a, b) = (lo.alpha + 0.1 * width, lo.alpha + 0.9 * width);
    let (min, max) = if a < b { (a, b) } else { (b, a) };
    if candidate.is_finite() {
        candidate.clamp(min, max)
    } else {
        midpoint
    }
}

//! One-dimensional Nelder–Mead search.
//!
//! The simplex is a pair of points. Reflection, expansion, contraction and shrink coefficients
//! are the standard (1, 2, 0.5, 0.5). The search stops once both the simplex width and the
//! spread of objective values fall under their tolerances, and fails once the iteration budget
//! is used up.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BucketError, BucketResult};
use crate::traits::Minimizer;

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;
const ZERO_START_STEP: f64 = 0.00025;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMeadSettings {
    pub max_iterations: usize,
    /// Initial simplex offset as a fraction of the starting point.
    pub initial_step: f64,
    pub x_tolerance: f64,
    pub f_tolerance: f64,
}

impl Default for NelderMeadSettings {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            initial_step: 0.05,
            x_tolerance: 1e-4,
            f_tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Minimum {
    pub x: f64,
    pub value: f64,
    pub iterations: usize,
    pub evaluations: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NelderMead {
    pub settings: NelderMeadSettings,
}

impl NelderMead {
    pub fn new(settings: NelderMeadSettings) -> Self {
        Self { settings }
    }
}

impl Minimizer for NelderMead {
    fn minimize<F: FnMut(f64) -> f64>(
        &self,
        mut objective: F,
        initial: f64,
    ) -> BucketResult<Minimum> {
        let settings = self.settings;
        if settings.max_iterations == 0 {
            return Err(BucketError::SearchNonConvergence {
                iterations: 0,
                residual: f64::NAN,
            });
        }

        let mut evaluations = 0usize;
        let mut eval = |x: f64| {
            evaluations += 1;
            let value = objective(x);
            if value.is_nan() {
                f64::INFINITY
            } else {
                value
            }
        };

        let second = if initial != 0.0 {
            initial * (1.0 + settings.initial_step)
        } else {
            ZERO_START_STEP
        };
        let mut best = (initial, eval(initial));
        let mut worst = (second, eval(second));
        let mut iterations = 0usize;

        loop {
            if worst.1 < best.1 {
                std::mem::swap(&mut best, &mut worst);
            }
            if (worst.0 - best.0).abs() <= settings.x_tolerance
                && (worst.1 - best.1).abs() <= settings.f_tolerance
            {
                break;
            }
            if iterations >= settings.max_iterations {
                debug!(
                    iterations,
                    x = best.0,
                    value = best.1,
                    "nelder-mead exhausted its iteration budget"
                );
                return Err(BucketError::SearchNonConvergence {
                    iterations,
                    residual: best.1,
                });
            }
            iterations += 1;

            let centroid = best.0;
            let xr = (1.0 + REFLECT) * centroid - REFLECT * worst.0;
            let fr = eval(xr);

            if fr < best.1 {
                let xe = (1.0 + REFLECT * EXPAND) * centroid - REFLECT * EXPAND * worst.0;
                let fe = eval(xe);
                worst = if fe < fr { (xe, fe) } else { (xr, fr) };
                continue;
            }

            // With a two-point simplex the reflected point is never better than the second
            // best without also beating the best, so only contractions remain.
            if fr < worst.1 {
                let xc = (1.0 + CONTRACT * REFLECT) * centroid - CONTRACT * REFLECT * worst.0;
                let fc = eval(xc);
                if fc <= fr {
                    worst = (xc, fc);
                    continue;
                }
            } else {
                let xcc = (1.0 - CONTRACT) * centroid + CONTRACT * worst.0;
                let fcc = eval(xcc);
                if fcc < worst.1 {
                    worst = (xcc, fcc);
                    continue;
                }
            }

            let xs = best.0 + SHRINK * (worst.0 - best.0);
            worst = (xs, eval(xs));
        }

        Ok(Minimum {
            x: best.0,
            value: best.1,
            iterations,
            evaluations,
        })
    }
}

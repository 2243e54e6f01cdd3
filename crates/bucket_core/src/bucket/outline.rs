//! Bunch outlines inside a bucket.
//!
//! An outline is the closed trajectory through a chosen potential level. Height targets map to
//! a level in closed form; length and emittance targets are found by a Nelder–Mead search over
//! the level.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Bucket;
use crate::error::{BucketError, BucketResult};
use crate::minimize::{NelderMead, NelderMeadSettings};
use crate::numerics::{level_crossing, linspace};
use crate::separatrix::upper_energy_bound;
use crate::traits::Minimizer;
use crate::types::{BunchQuantity, Contour};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineSettings {
    /// Points along each branch of an outline.
    pub contour_points: usize,
    /// Level tolerance of the search, relative to the well depth.
    pub level_tolerance: f64,
    /// Objective tolerance of the search, relative to the target.
    pub target_tolerance: f64,
    /// Largest relative mismatch between the matched outline and the target.
    pub acceptance: f64,
    pub max_iterations: usize,
}

impl Default for OutlineSettings {
    fn default() -> Self {
        Self {
            contour_points: 1000,
            level_tolerance: 1e-10,
            target_tolerance: 1e-10,
            acceptance: 1e-3,
            max_iterations: 500,
        }
    }
}

impl Bucket {
    fn well_floor(&self) -> f64 {
        self.well.iter().copied().fold(f64::INFINITY, f64::min)
    }

    fn well_top(&self) -> f64 {
        self.well.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Left and right times at which the working well crosses `level`.
    ///
    /// The outermost samples at or below the level bracket the crossings. Each crossing is the
    /// outermost root of the interpolant between such a sample and its outer neighbour, or the
    /// linear crossing when the interpolant has none there; at the ends of the array the end
    /// time is used. A level under the well floor collapses onto the time of the minimum.
    pub fn times_at_level(&self, level: f64) -> BucketResult<(f64, f64)> {
        if level.is_nan() {
            return Err(BucketError::InputShape("level must be a number".to_string()));
        }
        let maximum = self.well_top();
        if level > maximum {
            return Err(BucketError::AboveWellMaximum { level, maximum });
        }
        if level < 0.0 {
            return Err(BucketError::NegativePotential { level });
        }

        let n = self.well.len();
        let below = |i: &usize| self.well[*i] <= level;
        let (Some(left), Some(right)) = ((0..n).find(below), (0..n).rev().find(below)) else {
            let bottom = crate::numerics::argmin(&self.well).unwrap_or(0);
            return Ok((self.time[bottom], self.time[bottom]));
        };

        let roots = self.smooth_interpolant()?.roots(level);
        let l_time = if left == 0 {
            self.time[0]
        } else {
            let (a, b) = (self.time[left - 1], self.time[left]);
            roots_between(&roots, a, b)
                .next()
                .unwrap_or_else(|| level_crossing(&self.time, &self.well, left - 1, left, level))
        };
        let r_time = if right == n - 1 {
            self.time[n - 1]
        } else {
            let (a, b) = (self.time[right], self.time[right + 1]);
            roots_between(&roots, a, b)
                .last()
                .unwrap_or_else(|| level_crossing(&self.time, &self.well, right, right + 1, level))
        };
        Ok((l_time, r_time))
    }

    /// Closed outline of the trajectory at `level`.
    fn outline_at_level(&self, level: f64) -> BucketResult<Contour> {
        let (l_time, r_time) = self.times_at_level(level)?;
        let times = linspace(l_time, r_time, self.settings.contour_points.max(2));
        let floor = self.well_floor().min(level);
        let mut wells = self.smooth_interpolant()?.eval_many(&times);

        // Interpolation can swing past the sampled floor and the level between samples.
        for w in wells.iter_mut() {
            *w = w.clamp(floor, level);
        }
        if let Some(first) = wells.first_mut() {
            *first = level;
        }
        if let Some(last) = wells.last_mut() {
            *last = level;
        }

        let upper = upper_energy_bound(&times, &wells, &self.params)?;
        Ok(Contour::from_upper_bound(&times, &upper))
    }

    fn check_target(
        &self,
        quantity: BunchQuantity,
        target: f64,
        capacity: f64,
    ) -> BucketResult<()> {
        if target.is_nan() || target < 0.0 {
            return Err(BucketError::InputShape(format!(
                "bunch {quantity} must be a non-negative number; got {target}"
            )));
        }
        if target > capacity {
            return Err(BucketError::TargetOutOfRange {
                quantity,
                target,
                capacity,
            });
        }
        Ok(())
    }

    /// Outline whose half-height is `target_height`.
    pub fn outline_from_height(&self, target_height: f64) -> BucketResult<Contour> {
        if target_height == 0.0 {
            return Ok(Contour::zero());
        }
        self.check_target(BunchQuantity::Height, target_height, self.half_height())?;

        let offset = target_height * target_height / self.params.hamiltonian_factor();
        let level = (self.well_floor() + offset).min(self.well_top());
        self.outline_at_level(level)
    }

    /// Outline whose full length is `target_length`.
    pub fn outline_from_length(&self, target_length: f64) -> BucketResult<Contour> {
        if target_length == 0.0 {
            return Ok(Contour::zero());
        }
        self.check_target(BunchQuantity::Length, target_length, self.length())?;

        let level = self.search_level(target_length, self.length(), |level| {
            self.times_at_level(level).map(|(l, r)| r - l)
        })?;
        self.outline_at_level(level)
    }

    /// Outline enclosing `target_emittance`.
    pub fn outline_from_emittance(&self, target_emittance: f64) -> BucketResult<Contour> {
        if target_emittance == 0.0 {
            return Ok(Contour::zero());
        }
        self.check_target(BunchQuantity::Emittance, target_emittance, self.area())?;

        let level = self.search_level(target_emittance, self.area(), |level| {
            self.outline_at_level(level).map(|outline| outline.area())
        })?;
        self.outline_at_level(level)
    }

    /// Finds the level at which `measure` equals `target`.
    ///
    /// Levels outside the well are measured at the nearest edge and charged `capacity` per well
    /// depth of overshoot.
    fn search_level<M>(&self, target: f64, capacity: f64, measure: M) -> BucketResult<f64>
    where
        M: Fn(f64) -> BucketResult<f64>,
    {
        let floor = self.well_floor();
        let top = self.well_top();
        let depth = (top - floor).max(f64::MIN_POSITIVE);
        let settings = self.settings;

        let minimizer = NelderMead::new(NelderMeadSettings {
            max_iterations: settings.max_iterations,
            x_tolerance: settings.level_tolerance * depth,
            f_tolerance: settings.target_tolerance * target,
            ..NelderMeadSettings::default()
        });

        let lowest = floor.max(0.0).min(top);
        let objective = |level: f64| {
            let inside = level.clamp(lowest, top);
            let excess = (level - inside).abs() / depth;
            match measure(inside) {
                Ok(value) => (target - value).abs() + capacity * excess,
                Err(_) => capacity * (1.0 + excess),
            }
        };

        let initial = floor + 0.5 * (top - floor);
        let minimum = minimizer.minimize(objective, initial)?;
        let level = minimum.x.clamp(lowest, top);
        let achieved = measure(level)?;
        let residual = (achieved - target).abs();
        debug!(
            level,
            target,
            achieved,
            iterations = minimum.iterations,
            "outline search finished"
        );

        if residual > settings.acceptance * target {
            return Err(BucketError::SearchNonConvergence {
                iterations: minimum.iterations,
                residual,
            });
        }
        Ok(level)
    }
}

/// Sorted `roots` inside `[a, b]`, allowing for rounding at the segment ends.
fn roots_between(roots: &[f64], a: f64, b: f64) -> impl Iterator<Item = f64> + '_ {
    let slack = 1e-9 * (b - a).abs();
    roots
        .iter()
        .copied()
        .filter(move |&r| r >= a - slack && r <= b + slack)
}

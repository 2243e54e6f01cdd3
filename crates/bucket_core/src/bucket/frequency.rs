//! Synchrotron frequency spread across a bucket.
//!
//! Every interior sample of the well defines a trajectory at its own potential level. The
//! trajectory's phase-space area and its amplitude above the local minimum are collected in
//! time order, and the frequency is the finite-difference ratio `d(amplitude) / d(area)`.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::Bucket;
use crate::error::{BucketError, BucketResult};
use crate::numerics::{gradient, linspace, trapz};
use crate::spline::CubicSpline;

/// Tolerance, relative to the trajectory amplitude, for interpolation undershoot inside a
/// trajectory before it is treated as non-physical.
const UNDERSHOOT_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadSettings {
    /// Uniform grid the loaded well is resampled onto first; `None` uses the working copy.
    pub resample_points: Option<usize>,
    /// Points along each trajectory.
    pub trajectory_points: usize,
}

impl Default for SpreadSettings {
    fn default() -> Self {
        Self {
            resample_points: Some(5000),
            trajectory_points: 1000,
        }
    }
}

/// Frequency against amplitude for one bucket of the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpreadCurve {
    /// Time of the sample defining each trajectory.
    pub time: Vec<f64>,
    /// Phase-space area of each trajectory.
    pub action: Vec<f64>,
    /// Potential of each trajectory above the minimum it encloses.
    pub amplitude: Vec<f64>,
    pub frequency: Vec<f64>,
}

impl SpreadCurve {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    fn retain_times<F: Fn(f64) -> bool>(&mut self, keep: F) {
        let mask: Vec<bool> = self.time.iter().map(|&t| keep(t)).collect();
        for column in [
            &mut self.time,
            &mut self.action,
            &mut self.amplitude,
            &mut self.frequency,
        ] {
            let mut flags = mask.iter();
            column.retain(|_| flags.next().copied().unwrap_or(false));
        }
    }
}

/// Spread of a bucket and its sub-buckets, parents before children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencySpread {
    pub curves: Vec<SpreadCurve>,
}

impl FrequencySpread {
    /// All curves merged into one, ordered by time.
    pub fn combined(&self) -> SpreadCurve {
        let mut rows: Vec<(f64, f64, f64, f64)> = self
            .curves
            .iter()
            .flat_map(|c| {
                (0..c.len()).map(move |i| (c.time[i], c.action[i], c.amplitude[i], c.frequency[i]))
            })
            .collect();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut merged = SpreadCurve::default();
        for (t, action, amplitude, frequency) in rows {
            merged.time.push(t);
            merged.action.push(action);
            merged.amplitude.push(amplitude);
            merged.frequency.push(frequency);
        }
        merged
    }
}

impl Bucket {
    /// Frequency spread of this bucket and, recursively, of its sub-buckets.
    ///
    /// A bucket with sub-buckets keeps only the part of its own curve outside them. Samples
    /// whose trajectory cannot be resolved are skipped. When called on a top-level bucket,
    /// empty curves are dropped from the report.
    pub fn frequency_spread(&self, settings: &SpreadSettings) -> BucketResult<FrequencySpread> {
        let mut spread = FrequencySpread::default();
        self.collect_spread(settings, &mut spread.curves)?;
        if self.is_sub {
            return Ok(spread);
        }

        spread.curves.retain(|c| !c.is_empty());
        debug!(
            curves = spread.curves.len(),
            points = spread.curves.iter().map(SpreadCurve::len).sum::<usize>(),
            "computed frequency spread"
        );
        Ok(spread)
    }

    fn collect_spread(
        &self,
        settings: &SpreadSettings,
        curves: &mut Vec<SpreadCurve>,
    ) -> BucketResult<()> {
        let mut curve = self.spread_curve(settings)?;
        if let (Some(start), Some(stop)) = (self.inner_start(), self.inner_stop()) {
            curve.retain_times(|t| t < start || t > stop);
        }
        curves.push(curve);

        for sub in &self.sub_buckets {
            sub.collect_spread(settings, curves)?;
        }
        Ok(())
    }

    fn spread_curve(&self, settings: &SpreadSettings) -> BucketResult<SpreadCurve> {
        let (time, well) = match settings.resample_points {
            Some(n) => {
                let time = linspace(self.loaded.start(), self.loaded.stop(), n.max(3));
                let well = self.smooth_interpolant()?.eval_many(&time);
                (time, well)
            }
            None => (self.time.clone(), self.well.clone()),
        };
        let spline = CubicSpline::new(&time, &well)?;
        let slope = gradient(&well);
        let minima = spline.extrema().minima;
        let factor = self.params.hamiltonian_factor();
        let (first, last) = (time[0], time[time.len() - 1]);

        let mut curve = SpreadCurve::default();
        for i in 1..time.len() - 1 {
            let level = well[i];
            let roots: Vec<f64> = spline
                .roots(level)
                .into_iter()
                .filter(|&r| r > first && r < last)
                .collect();

            let Some(this) = nearest(&roots, time[i]) else {
                trace!(time = time[i], level, "no crossing at sample level");
                continue;
            };
            let bracket = if slope[i] > 0.0 {
                this.checked_sub(1).map(|other| (roots[other], roots[this]))
            } else if slope[i] < 0.0 {
                roots.get(this + 1).map(|&right| (roots[this], right))
            } else {
                continue;
            };
            let Some((left, right)) = bracket else {
                trace!(time = time[i], level, "crossing has no partner");
                continue;
            };

            let Some(use_min) = minima
                .iter()
                .filter(|(t, _)| *t > left && *t < right)
                .map(|&(_, value)| value)
                .reduce(f64::min)
            else {
                trace!(time = time[i], left, right, "no minimum inside trajectory");
                continue;
            };

            match trajectory_area(&spline, (left, right), level, use_min, factor, settings) {
                Ok(area) => {
                    curve.time.push(time[i]);
                    curve.action.push(area);
                    curve.amplitude.push(level - use_min);
                }
                Err(err) => trace!(time = time[i], %err, "skipping trajectory"),
            }
        }

        curve.frequency = gradient(&curve.amplitude)
            .into_iter()
            .zip(gradient(&curve.action))
            .map(|(da, dj)| da / dj)
            .collect();
        Ok(curve)
    }
}

fn nearest(roots: &[f64], t: f64) -> Option<usize> {
    roots
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - t).abs().total_cmp(&(b.1 - t).abs()))
        .map(|(i, _)| i)
}

/// Phase-space area `2∫√((level - U)·2β²E/η) dt` of the trajectory between two crossings.
fn trajectory_area(
    spline: &CubicSpline,
    (left, right): (f64, f64),
    level: f64,
    use_min: f64,
    factor: f64,
    settings: &SpreadSettings,
) -> BucketResult<f64> {
    let time = linspace(left, right, settings.trajectory_points.max(2));
    let scale = ((level - use_min) * factor).abs();
    let energy = time
        .iter()
        .map(|&t| {
            let value = (level - spline.eval(t)) * factor;
            if value.is_nan() || value < -UNDERSHOOT_TOLERANCE * scale {
                Err(BucketError::NonPhysicalWell { time: t, value })
            } else {
                Ok(value.max(0.0).sqrt())
            }
        })
        .collect::<BucketResult<Vec<f64>>>()?;
    Ok(2.0 * trapz(&energy, &time))
}

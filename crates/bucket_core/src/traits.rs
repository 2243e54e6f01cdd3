use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

use crate::error::BucketResult;
use crate::minimize::Minimum;
use crate::types::{PotentialWell, RingParameters};

/// A trait for types that can be used as scalars in the sampled-curve helpers.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Derivative-free minimization of a scalar function of one variable.
pub trait Minimizer {
    /// Minimizes `objective` starting from `initial`.
    /// Implementations must stop after a bounded number of iterations and report
    /// [`BucketError::SearchNonConvergence`](crate::error::BucketError) instead of looping.
    fn minimize<F: FnMut(f64) -> f64>(&self, objective: F, initial: f64) -> BucketResult<Minimum>;
}

/// Machine parameters through the acceleration cycle.
pub trait RingProgram {
    /// Number of discrete samples in the cycle.
    fn n_samples(&self) -> usize;

    /// Returns β, energy, η and revolution period at `sample`.
    fn parameters_at_sample(&self, sample: usize) -> anyhow::Result<RingParameters>;
}

/// Source of potential wells, one per cycle sample.
///
/// Voltage synthesis and the voltage-to-potential integration happen behind this trait.
pub trait WellProgram {
    /// Returns the potential well at `sample` over `time_bounds`, sampled at `resolution`
    /// points.
    fn potential_well(
        &self,
        sample: usize,
        ring: &RingParameters,
        time_bounds: (f64, f64),
        resolution: usize,
    ) -> anyhow::Result<PotentialWell>;
}

//! Hamiltonian transform of a potential well and the bucket geometry derived from it.

use serde::{Deserialize, Serialize};

use crate::error::{BucketError, BucketResult};
use crate::numerics::trapz;
use crate::types::{Contour, PhysicalParameters};

/// Scalar geometry of a bucket, computed once from its separatrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub half_height: f64,
    pub area: f64,
    pub length: f64,
    pub center: f64,
}

/// Hamiltonian of each sample relative to the top of the well: `(U_max - U)·2β²E/η`.
///
/// Fails with [`BucketError::NonPhysicalWell`] when a value is negative or not finite.
pub fn potential_to_hamiltonian(
    time: &[f64],
    well: &[f64],
    params: &PhysicalParameters,
) -> BucketResult<Vec<f64>> {
    BucketError::check_lengths(time, well)?;
    let max = well.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let factor = params.hamiltonian_factor();

    time.iter()
        .zip(well)
        .map(|(&t, &u)| {
            let value = (max - u) * factor;
            if value.is_finite() && value >= 0.0 {
                Ok(value)
            } else {
                Err(BucketError::NonPhysicalWell { time: t, value })
            }
        })
        .collect()
}

/// Upper energy bound `√H` of the well.
pub fn upper_energy_bound(
    time: &[f64],
    well: &[f64],
    params: &PhysicalParameters,
) -> BucketResult<Vec<f64>> {
    Ok(potential_to_hamiltonian(time, well, params)?
        .into_iter()
        .map(f64::sqrt)
        .collect())
}

/// Closed energy-domain contour of the well: `+√H` forwards in time, `-√H` backwards.
pub fn to_separatrix(
    time: &[f64],
    well: &[f64],
    params: &PhysicalParameters,
) -> BucketResult<(Vec<f64>, Contour)> {
    let upper = upper_energy_bound(time, well, params)?;
    let contour = Contour::from_upper_bound(time, &upper);
    Ok((upper, contour))
}

impl Geometry {
    pub fn from_separatrix(time: &[f64], upper: &[f64], separatrix: &Contour) -> Self {
        let half_height = separatrix
            .energy
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let length = match (time.first(), time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        };
        let center = if time.is_empty() {
            f64::NAN
        } else {
            time.iter().sum::<f64>() / time.len() as f64
        };
        Self {
            half_height,
            area: 2.0 * trapz(upper, time),
            length,
            center,
        }
    }
}

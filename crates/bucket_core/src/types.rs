//! Core value types shared by the bucket engine.
//!
//! Wells and contours are stored as paired coordinate vectors rather than point structs, which
//! matches how they are produced (sampled arrays) and consumed (plotting, quadrature).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BucketError, BucketResult};
use crate::numerics::trapz;

/// Reference parameters of the synchronous particle, constant for a bucket's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalParameters {
    /// Relativistic β.
    pub beta: f64,
    /// Total energy [eV].
    pub energy: f64,
    /// Slippage factor η.
    pub eta: f64,
}

impl PhysicalParameters {
    pub fn new(beta: f64, energy: f64, eta: f64) -> Self {
        Self { beta, energy, eta }
    }

    /// Factor converting a potential difference into a squared energy offset: 2β²E/η.
    pub fn hamiltonian_factor(&self) -> f64 {
        2.0 * self.beta * self.beta * self.energy / self.eta
    }
}

/// Machine parameters at one sample of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RingParameters {
    pub beta: f64,
    pub energy: f64,
    pub eta: f64,
    /// Revolution period [s].
    pub t_rev: f64,
}

impl RingParameters {
    pub fn physical(&self) -> PhysicalParameters {
        PhysicalParameters::new(self.beta, self.energy, self.eta)
    }
}

/// A sampled potential well with strictly increasing time.
///
/// Only [`PotentialWell::new`] builds one, deserialization included, so every instance is
/// validated and sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WellSamples")]
pub struct PotentialWell {
    time: Vec<f64>,
    well: Vec<f64>,
}

#[derive(Deserialize)]
struct WellSamples {
    time: Vec<f64>,
    well: Vec<f64>,
}

impl TryFrom<WellSamples> for PotentialWell {
    type Error = BucketError;

    fn try_from(samples: WellSamples) -> BucketResult<Self> {
        Self::new(samples.time, samples.well)
    }
}

impl PotentialWell {
    /// Validates the pair and sorts it by time.
    pub fn new(time: Vec<f64>, well: Vec<f64>) -> BucketResult<Self> {
        BucketError::check_lengths(&time, &well)?;
        if time.len() < 2 {
            return Err(BucketError::InputShape(format!(
                "a potential well needs at least 2 samples; got {}",
                time.len()
            )));
        }
        if time.iter().chain(well.iter()).any(|v| !v.is_finite()) {
            return Err(BucketError::InputShape(
                "time and well must be finite".to_string(),
            ));
        }

        let mut pairs: Vec<(f64, f64)> = time.into_iter().zip(well).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        if pairs.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(BucketError::InputShape(
                "time samples must be distinct".to_string(),
            ));
        }
        let (time, well) = pairs.into_iter().unzip();
        Ok(Self { time, well })
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn well(&self) -> &[f64] {
        &self.well
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.time.first().copied().unwrap_or(f64::NAN)
    }

    pub fn stop(&self) -> f64 {
        self.time.last().copied().unwrap_or(f64::NAN)
    }

    pub fn interval(&self) -> (f64, f64) {
        (self.start(), self.stop())
    }

    pub fn min(&self) -> f64 {
        self.well.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.well.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Returns a copy with the well shifted so that its minimum is zero.
    pub fn shifted_to_zero(&self) -> Self {
        let min = self.min();
        Self {
            time: self.time.clone(),
            well: self.well.iter().map(|w| w - min).collect(),
        }
    }
}

/// A closed contour in (time, energy) space.
///
/// The upper branch runs forward in time and the lower branch returns backwards, so the
/// trapezoid rule along the path gives the enclosed area directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    pub time: Vec<f64>,
    pub energy: Vec<f64>,
}

impl Contour {
    /// Mirrors `upper` about zero energy and closes the path.
    pub fn from_upper_bound(time: &[f64], upper: &[f64]) -> Self {
        let mut contour_time = Vec::with_capacity(2 * time.len());
        let mut energy = Vec::with_capacity(2 * time.len());
        contour_time.extend_from_slice(time);
        contour_time.extend(time.iter().rev());
        energy.extend_from_slice(upper);
        energy.extend(upper.iter().rev().map(|e| -e));
        Self {
            time: contour_time,
            energy,
        }
    }

    /// The degenerate contour of an empty bunch.
    pub fn zero() -> Self {
        Self {
            time: vec![0.0, 0.0],
            energy: vec![0.0, 0.0],
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.length() == 0.0 && self.height() == 0.0
    }

    pub fn length(&self) -> f64 {
        let (min, max) = min_max(&self.time);
        max - min
    }

    pub fn height(&self) -> f64 {
        min_max(&self.energy).1
    }

    pub fn area(&self) -> f64 {
        trapz(&self.energy, &self.time)
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BunchQuantity {
    Length,
    Height,
    Emittance,
}

impl fmt::Display for BunchQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BunchQuantity::Length => "length",
            BunchQuantity::Height => "height",
            BunchQuantity::Emittance => "emittance",
        };
        f.write_str(name)
    }
}

/// The single quantity a bunch is matched to. The other two follow from the outline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "quantity", content = "value", rename_all = "snake_case")]
pub enum BunchTarget {
    Length(f64),
    Height(f64),
    Emittance(f64),
}

impl BunchTarget {
    pub fn quantity(&self) -> BunchQuantity {
        match self {
            BunchTarget::Length(_) => BunchQuantity::Length,
            BunchTarget::Height(_) => BunchQuantity::Height,
            BunchTarget::Emittance(_) => BunchQuantity::Emittance,
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            BunchTarget::Length(v) | BunchTarget::Height(v) | BunchTarget::Emittance(v) => v,
        }
    }

    pub fn with_value(&self, value: f64) -> Self {
        match self {
            BunchTarget::Length(_) => BunchTarget::Length(value),
            BunchTarget::Height(_) => BunchTarget::Height(value),
            BunchTarget::Emittance(_) => BunchTarget::Emittance(value),
        }
    }
}

/// Bunch size matched inside a bucket, derived from one [`BunchTarget`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BunchParameters {
    pub target: BunchTarget,
    pub length: f64,
    pub height: f64,
    pub emittance: f64,
    pub outline: Contour,
}

impl BunchParameters {
    pub fn from_outline(target: BunchTarget, outline: Contour) -> Self {
        Self {
            target,
            length: outline.length(),
            height: outline.height(),
            emittance: outline.area(),
            outline,
        }
    }
}

//! Bucket parameters through an acceleration cycle.
//!
//! For every sample of the cycle the potential well is obtained from a [`WellProgram`], each
//! tracked particle is moved to the nearest potential minimum, and the well enclosing the
//! particle becomes its bucket. Bunches are then matched to per-particle emittances.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::bucket::{Bucket, OutlineSettings, OverfillPolicy};
use crate::partition::enclosing_well;
use crate::spline::CubicSpline;
use crate::traits::{RingProgram, WellProgram};
use crate::types::{BunchTarget, PotentialWell};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamSettings {
    /// Number of buckets the revolution period is divided into.
    pub harmonic_divide: usize,
    /// Samples per potential well.
    pub potential_resolution: usize,
    pub over_fill: OverfillPolicy,
    pub outline: OutlineSettings,
}

impl Default for BeamSettings {
    fn default() -> Self {
        Self {
            harmonic_divide: 1,
            potential_resolution: 1000,
            over_fill: OverfillPolicy::Reject,
            outline: OutlineSettings::default(),
        }
    }
}

/// Target bunch emittance per particle and sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmittanceProgram {
    Uniform(f64),
    /// Indexed `[particle][sample]`.
    PerParticle(Vec<Vec<f64>>),
}

impl EmittanceProgram {
    pub fn at(&self, particle: usize, sample: usize) -> Option<f64> {
        match self {
            EmittanceProgram::Uniform(value) => Some(*value),
            EmittanceProgram::PerParticle(table) => {
                table.get(particle).and_then(|row| row.get(sample)).copied()
            }
        }
    }
}

/// Bucket and bunch parameters, indexed `[particle][sample]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketTable {
    pub heights: Vec<Vec<f64>>,
    pub areas: Vec<Vec<f64>>,
    pub lengths: Vec<Vec<f64>>,
    pub bunch_heights: Vec<Vec<f64>>,
    pub bunch_lengths: Vec<Vec<f64>>,
    pub bunch_emittances: Vec<Vec<f64>>,
}

impl BucketTable {
    fn zeros(n_particles: usize, n_samples: usize) -> Self {
        let grid = vec![vec![0.0; n_samples]; n_particles];
        Self {
            heights: grid.clone(),
            areas: grid.clone(),
            lengths: grid.clone(),
            bunch_heights: grid.clone(),
            bunch_lengths: grid.clone(),
            bunch_emittances: grid,
        }
    }
}

pub struct BeamParameters<R: RingProgram, W: WellProgram> {
    ring: R,
    wells: W,
    settings: BeamSettings,
    use_samples: Vec<usize>,
    init_coord: Vec<f64>,
    bunch_emittance: EmittanceProgram,
    potential_wells: Vec<PotentialWell>,
    particle_tracks: Vec<Vec<f64>>,
    /// Keyed by `(sample index, particle)`.
    buckets: BTreeMap<(usize, usize), Bucket>,
    table: Option<BucketTable>,
}

impl<R: RingProgram, W: WellProgram> BeamParameters<R, W> {
    /// Uses every sample of the ring program and a single particle half a bucket period into
    /// the first revolution.
    pub fn new(ring: R, wells: W, settings: BeamSettings) -> Result<Self> {
        if settings.harmonic_divide == 0 {
            bail!("harmonic_divide must be at least 1.");
        }
        if settings.potential_resolution < 3 {
            bail!("potential_resolution must be at least 3.");
        }
        let n_samples = ring.n_samples();
        if n_samples == 0 {
            bail!("Ring program has no samples.");
        }
        let first = ring
            .parameters_at_sample(0)
            .context("reading ring parameters at sample 0")?;
        let init_coord = vec![0.5 * first.t_rev / settings.harmonic_divide as f64];

        Ok(Self {
            ring,
            wells,
            settings,
            use_samples: (0..n_samples).collect(),
            init_coord,
            bunch_emittance: EmittanceProgram::Uniform(0.0),
            potential_wells: Vec::new(),
            particle_tracks: Vec::new(),
            buckets: BTreeMap::new(),
            table: None,
        })
    }

    pub fn with_samples(mut self, use_samples: Vec<usize>) -> Result<Self> {
        if use_samples.is_empty() {
            bail!("At least one sample must be used.");
        }
        let n = self.ring.n_samples();
        if let Some(bad) = use_samples.iter().find(|&&s| s >= n) {
            bail!("Sample {bad} is outside the ring program ({n} samples).");
        }
        self.use_samples = use_samples;
        self.clear_results();
        Ok(self)
    }

    pub fn with_init_coord(mut self, init_coord: Vec<f64>) -> Result<Self> {
        if init_coord.is_empty() {
            bail!("At least one particle coordinate is required.");
        }
        self.init_coord = init_coord;
        self.clear_results();
        Ok(self)
    }

    fn clear_results(&mut self) {
        self.potential_wells.clear();
        self.particle_tracks.clear();
        self.buckets.clear();
        self.table = None;
    }

    pub fn with_bunch_emittance(mut self, bunch_emittance: EmittanceProgram) -> Self {
        self.bunch_emittance = bunch_emittance;
        self
    }

    pub fn settings(&self) -> &BeamSettings {
        &self.settings
    }

    pub fn n_samples(&self) -> usize {
        self.use_samples.len()
    }

    pub fn n_particles(&self) -> usize {
        self.init_coord.len()
    }

    pub fn potential_wells(&self) -> &[PotentialWell] {
        &self.potential_wells
    }

    /// Synchronous position of each particle, indexed `[particle][sample]`.
    pub fn particle_tracks(&self) -> &[Vec<f64>] {
        &self.particle_tracks
    }

    pub fn table(&self) -> Option<&BucketTable> {
        self.table.as_ref()
    }

    pub fn bucket(&self, sample: usize, particle: usize) -> Option<&Bucket> {
        self.buckets.get(&(sample, particle))
    }

    /// Recomputes wells, tracks, buckets and matched bunches.
    pub fn full_update(&mut self) -> Result<&BucketTable> {
        self.calc_potential_wells()?;
        self.track_synchronous()?;
        self.calc_buckets()?;
        self.bucket_parameters(true)
    }

    fn time_bounds(&self, t_rev: f64) -> (f64, f64) {
        let right = t_rev / self.settings.harmonic_divide as f64;
        (-0.1 * right, 1.1 * right)
    }

    pub fn calc_potential_wells(&mut self) -> Result<()> {
        let mut wells = Vec::with_capacity(self.use_samples.len());
        for &sample in &self.use_samples {
            let ring = self
                .ring
                .parameters_at_sample(sample)
                .with_context(|| format!("reading ring parameters at sample {sample}"))?;
            let well = self
                .wells
                .potential_well(
                    sample,
                    &ring,
                    self.time_bounds(ring.t_rev),
                    self.settings.potential_resolution,
                )
                .with_context(|| format!("computing potential well at sample {sample}"))?;
            wells.push(well);
        }
        self.potential_wells = wells;
        Ok(())
    }

    /// Places each particle in the potential minimum nearest to its starting coordinate, then
    /// follows the nearest minimum from sample to sample.
    pub fn track_synchronous(&mut self) -> Result<()> {
        if self.potential_wells.is_empty() {
            bail!("Potential wells must be calculated before tracking.");
        }
        let minima = self
            .potential_wells
            .iter()
            .enumerate()
            .map(|(i, well)| -> Result<Vec<f64>> {
                let spline = CubicSpline::new(well.time(), well.well())?;
                let locations: Vec<f64> =
                    spline.extrema().minima.into_iter().map(|(t, _)| t).collect();
                if locations.is_empty() {
                    bail!("Potential well at sample {} has no minimum.", self.use_samples[i]);
                }
                Ok(locations)
            })
            .collect::<Result<Vec<_>>>()?;

        let first_time = self.potential_wells[0].time();
        self.particle_tracks = self
            .init_coord
            .iter()
            .map(|&coord| {
                let start = first_time
                    .iter()
                    .rev()
                    .find(|&&t| t <= coord)
                    .copied()
                    .unwrap_or(first_time[0]);
                let mut track = Vec::with_capacity(minima.len());
                let mut position = start;
                for locations in &minima {
                    position = nearest_location(locations, position);
                    track.push(position);
                }
                track
            })
            .collect();
        Ok(())
    }

    /// The well around `particle` at sample index `sample`, shifted to a zero minimum.
    pub fn cut_well(&self, sample: usize, particle: usize) -> Result<PotentialWell> {
        let well = self
            .potential_wells
            .get(sample)
            .ok_or_else(|| anyhow!("No potential well at sample index {sample}."))?
            .shifted_to_zero();
        let location = self
            .particle_tracks
            .get(particle)
            .and_then(|track| track.get(sample))
            .copied()
            .ok_or_else(|| anyhow!("Particle {particle} is not tracked at sample index {sample}."))?;

        enclosing_well(&well, location)?.ok_or_else(|| {
            anyhow!("Particle {particle} at {location} is not inside a closed well at sample index {sample}.")
        })
    }

    pub fn calc_buckets(&mut self) -> Result<()> {
        let mut buckets = BTreeMap::new();
        for (i, &sample) in self.use_samples.iter().enumerate() {
            let params = self
                .ring
                .parameters_at_sample(sample)
                .with_context(|| format!("reading ring parameters at sample {sample}"))?
                .physical();
            for particle in 0..self.init_coord.len() {
                let well = self.cut_well(i, particle)?;
                let bucket = Bucket::from_well(&well, params, self.settings.outline)
                    .with_context(|| {
                        format!("building bucket of particle {particle} at sample {sample}")
                    })?;
                buckets.insert((i, particle), bucket);
            }
        }
        debug!(
            samples = self.use_samples.len(),
            particles = self.init_coord.len(),
            "constructed buckets"
        );
        self.buckets = buckets;
        Ok(())
    }

    /// Buckets of `particle`, in sample order.
    pub fn buckets_by_particle(&self, particle: usize) -> Vec<&Bucket> {
        self.buckets
            .iter()
            .filter(|((_, p), _)| *p == particle)
            .map(|(_, bucket)| bucket)
            .collect()
    }

    /// Tabulates bucket parameters and, when `update_bunch` is set, first matches every bunch
    /// to its target emittance under the configured over-fill policy. Unmatched bunches are
    /// reported as NaN.
    pub fn bucket_parameters(&mut self, update_bunch: bool) -> Result<&BucketTable> {
        let n_particles = self.init_coord.len();
        let mut table = BucketTable::zeros(n_particles, self.use_samples.len());
        let policy = self.settings.over_fill;

        for ((sample, particle), bucket) in self.buckets.iter_mut() {
            let (s, p) = (*sample, *particle);
            if update_bunch {
                let emittance = self.bunch_emittance.at(p, s).ok_or_else(|| {
                    anyhow!("No target emittance for particle {p} at sample index {s}.")
                })?;
                bucket
                    .set_bunch_with_policy(BunchTarget::Emittance(emittance), policy)
                    .with_context(|| {
                        format!("matching bunch of particle {p} at sample index {s}")
                    })?;
            }

            table.heights[p][s] = bucket.half_height();
            table.areas[p][s] = bucket.area();
            table.lengths[p][s] = bucket.length();
            table.bunch_heights[p][s] = bucket.bunch_height().unwrap_or(f64::NAN);
            table.bunch_lengths[p][s] = bucket.bunch_length().unwrap_or(f64::NAN);
            table.bunch_emittances[p][s] = bucket.bunch_emittance().unwrap_or(f64::NAN);
        }

        Ok(self.table.insert(table))
    }
}

fn nearest_location(locations: &[f64], position: f64) -> f64 {
    locations
        .iter()
        .copied()
        .min_by(|a, b| (a - position).abs().total_cmp(&(b - position).abs()))
        .unwrap_or(position)
}

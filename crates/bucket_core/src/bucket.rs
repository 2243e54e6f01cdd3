//! The bucket entity: a potential well, its separatrix and geometry, and the tree of
//! sub-buckets produced by nested inner wells.

pub mod frequency;
pub mod outline;

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::containment::ContainmentGraph;
use crate::error::{BucketError, BucketResult};
use crate::numerics::{linspace, trapz};
use crate::partition::partition_well;
use crate::separatrix::{to_separatrix, Geometry};
use crate::spline::CubicSpline;
use crate::types::{BunchParameters, BunchTarget, Contour, PhysicalParameters, PotentialWell};

pub use frequency::{FrequencySpread, SpreadCurve, SpreadSettings};
pub use outline::OutlineSettings;

/// What to do when a requested bunch does not fit in its bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverfillPolicy {
    /// Surface [`BucketError::TargetOutOfRange`].
    #[default]
    Reject,
    /// Log a warning and fill the whole bucket instead.
    SubstituteCapacity,
}

#[derive(Debug, Clone)]
pub struct Bucket {
    params: PhysicalParameters,
    loaded: PotentialWell,
    time: Vec<f64>,
    well: Vec<f64>,
    upper_energy_bound: Vec<f64>,
    separatrix: Contour,
    geometry: Geometry,
    bunch: Option<BunchParameters>,
    is_sub: bool,
    inner_wells: Vec<PotentialWell>,
    sub_buckets: Vec<Bucket>,
    settings: OutlineSettings,
    /// Interpolant of the loaded well; cleared by [`Bucket::reinterpolate`].
    smooth: OnceLock<CubicSpline>,
}

impl Bucket {
    /// Builds a top-level bucket from a raw well sample.
    ///
    /// The sample is sorted by time and shifted so that its minimum is zero, then split into
    /// the primary well (which this bucket describes) and its inner wells (which become the
    /// sub-bucket tree).
    pub fn new(
        time: Vec<f64>,
        well: Vec<f64>,
        params: PhysicalParameters,
    ) -> BucketResult<Self> {
        Self::with_settings(time, well, params, OutlineSettings::default())
    }

    pub fn with_settings(
        time: Vec<f64>,
        well: Vec<f64>,
        params: PhysicalParameters,
        settings: OutlineSettings,
    ) -> BucketResult<Self> {
        let raw = PotentialWell::new(time, well)?;
        Self::from_well(&raw, params, settings)
    }

    /// Builds a top-level bucket from an already validated well, shifted so that its minimum
    /// is zero.
    pub fn from_well(
        raw: &PotentialWell,
        params: PhysicalParameters,
        settings: OutlineSettings,
    ) -> BucketResult<Self> {
        let partition = partition_well(&raw.shifted_to_zero())?;
        let mut bucket = Self::build(partition.primary, params, settings, false)?;
        bucket.identify_substructure(partition.inner)?;
        debug!(
            length = bucket.geometry.length,
            area = bucket.geometry.area,
            sub_buckets = bucket.sub_buckets.len(),
            "constructed bucket"
        );
        Ok(bucket)
    }

    fn build(
        loaded: PotentialWell,
        params: PhysicalParameters,
        settings: OutlineSettings,
        is_sub: bool,
    ) -> BucketResult<Self> {
        let time = loaded.time().to_vec();
        let well = loaded.well().to_vec();
        let (upper_energy_bound, separatrix) = to_separatrix(&time, &well, &params)?;
        let geometry = Geometry::from_separatrix(&time, &upper_energy_bound, &separatrix);
        Ok(Self {
            params,
            loaded,
            time,
            well,
            upper_energy_bound,
            separatrix,
            geometry,
            bunch: None,
            is_sub,
            inner_wells: Vec::new(),
            sub_buckets: Vec::new(),
            settings,
            smooth: OnceLock::new(),
        })
    }

    /// Builds one sub-bucket per inner well, then attaches each to its immediate parent.
    fn identify_substructure(&mut self, inner: Vec<PotentialWell>) -> BucketResult<()> {
        let intervals: Vec<(f64, f64)> = inner.iter().map(PotentialWell::interval).collect();
        let graph = ContainmentGraph::from_intervals(&intervals);

        let arena = inner
            .iter()
            .map(|w| Self::build(w.clone(), self.params, self.settings, true))
            .collect::<BucketResult<Vec<_>>>()?;

        self.sub_buckets = graph
            .roots()
            .iter()
            .map(|&root| assemble(root, &graph, &arena, &inner))
            .collect();
        self.inner_wells = inner;
        Ok(())
    }

    pub fn params(&self) -> &PhysicalParameters {
        &self.params
    }

    pub fn settings(&self) -> &OutlineSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: OutlineSettings) {
        self.settings = settings;
    }

    /// Time axis of the working copy of the well.
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Working copy of the well, possibly resampled by [`Bucket::smooth_well`].
    pub fn well(&self) -> &[f64] {
        &self.well
    }

    pub fn loaded(&self) -> &PotentialWell {
        &self.loaded
    }

    pub fn upper_energy_bound(&self) -> &[f64] {
        &self.upper_energy_bound
    }

    pub fn separatrix(&self) -> &Contour {
        &self.separatrix
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn half_height(&self) -> f64 {
        self.geometry.half_height
    }

    pub fn area(&self) -> f64 {
        self.geometry.area
    }

    pub fn length(&self) -> f64 {
        self.geometry.length
    }

    pub fn center(&self) -> f64 {
        self.geometry.center
    }

    pub fn is_sub(&self) -> bool {
        self.is_sub
    }

    pub fn has_subs(&self) -> bool {
        !self.sub_buckets.is_empty()
    }

    /// Immediate sub-buckets.
    pub fn sub_buckets(&self) -> &[Bucket] {
        &self.sub_buckets
    }

    /// Every inner well inside this bucket, nested or not. On a sub-bucket these are the
    /// wells of its own sub-tree.
    pub fn inner_wells(&self) -> &[PotentialWell] {
        &self.inner_wells
    }

    /// Highest potential among the immediate sub-buckets.
    pub fn inner_max(&self) -> Option<f64> {
        self.sub_extent(|b| b.well.iter().copied().fold(f64::NEG_INFINITY, f64::max), f64::max)
    }

    /// Earliest time covered by an immediate sub-bucket.
    pub fn inner_start(&self) -> Option<f64> {
        self.sub_extent(|b| b.time.first().copied().unwrap_or(f64::INFINITY), f64::min)
    }

    /// Latest time covered by an immediate sub-bucket.
    pub fn inner_stop(&self) -> Option<f64> {
        self.sub_extent(|b| b.time.last().copied().unwrap_or(f64::NEG_INFINITY), f64::max)
    }

    fn sub_extent<F, G>(&self, value: F, combine: G) -> Option<f64>
    where
        F: Fn(&Bucket) -> f64,
        G: Fn(f64, f64) -> f64,
    {
        self.sub_buckets.iter().map(value).reduce(combine)
    }

    /// Separatrix of every inner well.
    pub fn inner_separatrices(&self) -> BucketResult<Vec<Contour>> {
        self.inner_wells
            .iter()
            .map(|w| to_separatrix(w.time(), w.well(), &self.params).map(|(_, contour)| contour))
            .collect()
    }

    /// Cubic interpolant of the loaded well, built on first use.
    pub fn smooth_interpolant(&self) -> BucketResult<&CubicSpline> {
        if let Some(spline) = self.smooth.get() {
            return Ok(spline);
        }
        let spline = CubicSpline::new(self.loaded.time(), self.loaded.well())?;
        Ok(self.smooth.get_or_init(|| spline))
    }

    /// Drops the cached interpolant so the next use rebuilds it from the loaded well.
    pub fn reinterpolate(&mut self) {
        self.smooth = OnceLock::new();
    }

    /// Resamples the working copy onto `n_points` evenly spaced times from the interpolant and
    /// recomputes the separatrix and geometry. A matched bunch is re-matched to its target.
    pub fn smooth_well(&mut self, n_points: usize) -> BucketResult<()> {
        if n_points < 2 {
            return Err(BucketError::InputShape(format!(
                "resampling needs at least 2 points; got {n_points}"
            )));
        }
        let time = linspace(self.loaded.start(), self.loaded.stop(), n_points);
        let well = self.smooth_interpolant()?.eval_many(&time);
        let (upper, separatrix) = to_separatrix(&time, &well, &self.params)?;

        self.geometry = Geometry::from_separatrix(&time, &upper, &separatrix);
        self.time = time;
        self.well = well;
        self.upper_energy_bound = upper;
        self.separatrix = separatrix;

        if let Some(previous) = self.bunch.take() {
            self.set_bunch(previous.target)?;
        }
        Ok(())
    }

    pub fn bunch(&self) -> Option<&BunchParameters> {
        self.bunch.as_ref()
    }

    pub fn bunch_length(&self) -> Option<f64> {
        self.bunch.as_ref().map(|b| b.length)
    }

    pub fn bunch_height(&self) -> Option<f64> {
        self.bunch.as_ref().map(|b| b.height)
    }

    pub fn bunch_emittance(&self) -> Option<f64> {
        self.bunch.as_ref().map(|b| b.emittance)
    }

    /// Matches the bunch to `target`; the other two quantities are measured from the outline.
    /// On error the previous bunch is left untouched.
    pub fn set_bunch(&mut self, target: BunchTarget) -> BucketResult<&BunchParameters> {
        let outline = match target {
            BunchTarget::Length(value) => self.outline_from_length(value)?,
            BunchTarget::Height(value) => self.outline_from_height(value)?,
            BunchTarget::Emittance(value) => self.outline_from_emittance(value)?,
        };
        Ok(self
            .bunch
            .insert(BunchParameters::from_outline(target, outline)))
    }

    /// Like [`Bucket::set_bunch`], but a target beyond the bucket capacity is replaced by the
    /// capacity when `policy` allows it.
    pub fn set_bunch_with_policy(
        &mut self,
        target: BunchTarget,
        policy: OverfillPolicy,
    ) -> BucketResult<&BunchParameters> {
        match self.set_bunch(target).map(|_| ()) {
            Ok(()) => {}
            Err(BucketError::TargetOutOfRange {
                quantity,
                target: requested,
                capacity,
            }) if policy == OverfillPolicy::SubstituteCapacity => {
                warn!(
                    %quantity,
                    requested,
                    capacity,
                    "requested bunch exceeds bucket, using bucket capacity instead"
                );
                self.set_bunch(target.with_value(capacity))?;
            }
            Err(err) => return Err(err),
        }
        self.bunch
            .as_ref()
            .ok_or_else(|| BucketError::InputShape("bunch was not matched".to_string()))
    }

    pub fn set_bunch_length(&mut self, value: f64) -> BucketResult<&BunchParameters> {
        self.set_bunch(BunchTarget::Length(value))
    }

    pub fn set_bunch_height(&mut self, value: f64) -> BucketResult<&BunchParameters> {
        self.set_bunch(BunchTarget::Height(value))
    }

    pub fn set_bunch_emittance(&mut self, value: f64) -> BucketResult<&BunchParameters> {
        self.set_bunch(BunchTarget::Emittance(value))
    }

    /// Action enclosed by the trajectory through each sample of the working well, `∮ΔE dt / 2π`.
    pub fn compute_action(&self) -> Vec<f64> {
        let factor = self.params.hamiltonian_factor();
        self.well
            .iter()
            .map(|&level| {
                let (time, contour): (Vec<f64>, Vec<f64>) = self
                    .time
                    .iter()
                    .zip(&self.well)
                    .filter(|&(_, &u)| u < level)
                    .map(|(&t, &u)| (t, ((level - u) * factor).abs().sqrt()))
                    .unzip();
                trapz(&contour, &time) / std::f64::consts::PI
            })
            .collect()
    }
}

fn assemble(
    node: usize,
    graph: &ContainmentGraph,
    arena: &[Bucket],
    inner: &[PotentialWell],
) -> Bucket {
    let mut bucket = arena[node].clone();
    bucket.inner_wells = graph
        .contained(node)
        .iter()
        .map(|&j| inner[j].clone())
        .collect();
    bucket.sub_buckets = graph
        .children(node)
        .iter()
        .map(|&child| assemble(child, graph, arena, inner))
        .collect();
    bucket
}

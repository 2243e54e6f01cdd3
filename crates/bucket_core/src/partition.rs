//! Splitting a raw potential well into its primary well and nested inner wells.
//!
//! The primary well is the region around the deepest point that stays below the lower of the
//! two edge values. Every interior local maximum of the primary well defines a level; the
//! regions directly left and right of that maximum which stay below the level are inner wells.
//! Well boundaries are placed on the exact level crossing by linear interpolation between the
//! bracketing samples.

use tracing::debug;

use crate::error::BucketResult;
use crate::numerics::{argmin, level_crossing};
use crate::types::PotentialWell;

/// Inner wells shallower than this fraction of the primary depth are dropped as noise.
const RELATIVE_DEPTH_LIMIT: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub primary: PotentialWell,
    /// Candidate sub-wells, sorted by start time and then by decreasing length.
    pub inner: Vec<PotentialWell>,
}

/// A maximal index range `[start, end]` whose samples all lie strictly below `level`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Run {
    start: usize,
    end: usize,
    level: f64,
}

pub fn partition_well(input: &PotentialWell) -> BucketResult<Partition> {
    let well = input.well();
    let n = well.len();
    let whole = Partition {
        primary: input.clone(),
        inner: Vec::new(),
    };
    if n < 3 {
        return Ok(whole);
    }

    let level = well[0].min(well[n - 1]);
    let deepest = match argmin(well) {
        Some(idx) if well[idx] < level => idx,
        _ => return Ok(whole),
    };
    let primary_run = run_around(well, deepest, level);
    let depth = level - well[deepest];

    let mut runs: Vec<Run> = Vec::new();
    for peak in local_maxima(well, primary_run.start, primary_run.end) {
        let peak_level = well[peak];
        let left = run_around(well, peak - 1, peak_level);
        let mut right_start = peak + 1;
        while right_start <= primary_run.end && well[right_start] == peak_level {
            right_start += 1;
        }
        let mut candidates = vec![left];
        if right_start <= primary_run.end && well[right_start] < peak_level {
            candidates.push(run_around(well, right_start, peak_level));
        }

        for run in candidates {
            let floor = well[run.start..=run.end]
                .iter()
                .copied()
                .fold(f64::INFINITY, f64::min);
            if run.level - floor <= RELATIVE_DEPTH_LIMIT * depth {
                continue;
            }
            if run == primary_run
                || runs
                    .iter()
                    .any(|r| r.start == run.start && r.end == run.end)
            {
                continue;
            }
            runs.push(run);
        }
    }

    let primary = extract(input, primary_run)?;
    let mut inner = runs
        .into_iter()
        .map(|run| extract(input, run))
        .collect::<BucketResult<Vec<_>>>()?;
    inner.sort_by(|a, b| {
        a.start()
            .total_cmp(&b.start())
            .then_with(|| b.stop().total_cmp(&a.stop()))
    });

    debug!(
        primary_points = primary.len(),
        inner_wells = inner.len(),
        "partitioned potential well"
    );
    Ok(Partition { primary, inner })
}

/// The outermost bounded well that contains `location`, or `None` when `location` does not
/// sit inside any closed well.
///
/// A local maximum within [`RELATIVE_DEPTH_LIMIT`] of the well range below a level still bounds
/// the well at that level, so sampling noise between equal maxima does not merge neighbouring
/// wells. The returned well is cut at the lower of its two rims.
pub fn enclosing_well(input: &PotentialWell, location: f64) -> BucketResult<Option<PotentialWell>> {
    let well = input.well();
    let n = well.len();
    if n < 3 {
        return Ok(None);
    }
    let offsets: Vec<f64> = input.time().iter().map(|t| (t - location).abs()).collect();
    let Some(idx) = argmin(&offsets) else {
        return Ok(None);
    };

    let peaks = local_maxima(well, 0, n - 1);
    let tolerance = RELATIVE_DEPTH_LIMIT * (input.max() - input.min());
    let blocks = |j: usize, level: f64| {
        well[j] >= level || (well[j] >= level - tolerance && peaks.contains(&j))
    };

    let mut levels: Vec<f64> = peaks.iter().map(|&i| well[i]).collect();
    levels.push(well[0].min(well[n - 1]));
    levels.sort_by(|a, b| b.total_cmp(a));
    levels.dedup();

    for level in levels {
        if blocks(idx, level) {
            continue;
        }
        let mut start = idx;
        while start > 0 && !blocks(start - 1, level) {
            start -= 1;
        }
        let mut end = idx;
        while end + 1 < n && !blocks(end + 1, level) {
            end += 1;
        }
        if start > 0 && end < n - 1 {
            let rim = level.min(well[start - 1]).min(well[end + 1]);
            return extract(input, Run { start, end, level: rim }).map(Some);
        }
    }
    Ok(None)
}

/// Interior local maxima in `(start, end)`; a plateau is reported at its first sample.
fn local_maxima(well: &[f64], start: usize, end: usize) -> Vec<usize> {
    let mut peaks = Vec::new();
    let mut i = start + 1;
    while i < end {
        if well[i - 1] < well[i] && well[i] >= well[i + 1] {
            let mut j = i;
            while j < end && well[j + 1] == well[i] {
                j += 1;
            }
            if j < end && well[j + 1] < well[i] {
                peaks.push(i);
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    peaks
}

fn run_around(well: &[f64], seed: usize, level: f64) -> Run {
    let mut start = seed;
    while start > 0 && well[start - 1] < level {
        start -= 1;
    }
    let mut end = seed;
    while end + 1 < well.len() && well[end + 1] < level {
        end += 1;
    }
    Run { start, end, level }
}

fn extract(input: &PotentialWell, run: Run) -> BucketResult<PotentialWell> {
    let (time, well) = (input.time(), input.well());
    let mut out_time = Vec::with_capacity(run.end - run.start + 3);
    let mut out_well = Vec::with_capacity(run.end - run.start + 3);

    if run.start > 0 {
        out_time.push(level_crossing(time, well, run.start - 1, run.start, run.level));
        out_well.push(run.level);
    }
    out_time.extend_from_slice(&time[run.start..=run.end]);
    out_well.extend_from_slice(&well[run.start..=run.end]);
    if run.end + 1 < well.len() {
        out_time.push(level_crossing(time, well, run.end, run.end + 1, run.level));
        out_well.push(run.level);
    }

    PotentialWell::new(out_time, out_well)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::linspace;

    fn intervals(wells: &[PotentialWell]) -> Vec<(f64, f64)> {
        wells.iter().map(|w| w.interval()).collect()
    }

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn single_minimum_has_no_inner_wells() {
        let time = linspace(-1.0, 1.0, 101);
        let well = time.iter().map(|t| 100.0 * t * t).collect();
        let input = PotentialWell::new(time, well).expect("well");
        let partition = partition_well(&input).expect("partition");
        assert!(partition.inner.is_empty());
        assert_eq!(partition.primary.len(), input.len());
        assert!(close(partition.primary.interval(), (-1.0, 1.0)));
    }

    #[test]
    fn lower_edge_sets_primary_level() {
        let time = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let well = vec![4.0, 1.0, 0.0, 1.0, 8.0];
        let input = PotentialWell::new(time, well).expect("well");
        let partition = partition_well(&input).expect("partition");
        let primary = partition.primary;
        assert_eq!(primary.well().first(), Some(&4.0));
        assert_eq!(primary.well().last(), Some(&4.0));
        assert!(close(primary.interval(), (0.0, 3.0 + 3.0 / 7.0)));
    }

    #[test]
    fn nested_staircase_is_fully_decomposed() {
        let time: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let well = vec![10.0, 5.0, 7.0, 3.0, 5.0, 0.0, 9.0, 2.0, 10.0];
        let input = PotentialWell::new(time, well).expect("well");
        let partition = partition_well(&input).expect("partition");

        let expected = [
            (0.2, 6.0),
            (0.6, 2.0),
            (2.0, 5.0 + 7.0 / 9.0),
            (2.5, 4.0),
            (4.0, 5.0 + 5.0 / 9.0),
            (6.0, 7.875),
        ];
        let found = intervals(&partition.inner);
        assert_eq!(found.len(), expected.len(), "found {found:?}");
        for (f, e) in found.iter().zip(expected) {
            assert!(close(*f, e), "interval {f:?} differs from {e:?}");
        }
    }

    #[test]
    fn enclosing_well_picks_outermost_bounded_region() {
        let time: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let well = vec![10.0, 5.0, 7.0, 3.0, 5.0, 0.0, 9.0, 2.0, 12.0];
        let input = PotentialWell::new(time, well).expect("well");
        let found = enclosing_well(&input, 5.0).expect("cut").expect("well around location");
        assert!(close(found.interval(), (0.0, 7.0 + 8.0 / 10.0)));
    }

    #[test]
    fn nearly_equal_maxima_keep_wells_apart() {
        let time: Vec<f64> = (0..7).map(|i| i as f64).collect();
        let well = vec![5.0, 10.0, 2.0, 9.9999, 2.0, 10.0, 5.0];
        let input = PotentialWell::new(time, well).expect("well");
        let found = enclosing_well(&input, 2.0).expect("cut").expect("well around location");
        let (start, stop) = found.interval();
        assert!((start - (1.0 + 0.0001 / 8.0)).abs() < 1e-9, "start {start}");
        assert!((stop - 3.0).abs() < 1e-12);
        assert_eq!(found.well().first(), Some(&9.9999));
    }

    #[test]
    fn enclosing_well_none_outside_any_well() {
        let time = vec![0.0, 1.0, 2.0];
        let well = vec![0.0, 1.0, 2.0];
        let input = PotentialWell::new(time, well).expect("well");
        assert!(enclosing_well(&input, 1.0).expect("cut").is_none());
    }
}

//! Natural cubic spline interpolation of a sampled well.
//!
//! Each segment is stored as a cubic in the local offset `dx = t - knots[k]`, which is the
//! piecewise-polynomial form used for level crossings and extrema.

use crate::error::{BucketError, BucketResult};
use crate::polynomial::{evaluate, real_roots_in};

const ROOT_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    knots: Vec<f64>,
    coeffs: Vec<[f64; 4]>,
    bounds: Vec<(f64, f64)>,
}

/// Interior turning points of a spline as `(time, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extrema {
    pub minima: Vec<(f64, f64)>,
    pub maxima: Vec<(f64, f64)>,
}

impl CubicSpline {
    /// Builds the interpolant through `(x, y)`. `x` must be strictly increasing.
    pub fn new(x: &[f64], y: &[f64]) -> BucketResult<Self> {
        BucketError::check_lengths(x, y)?;
        let n = x.len();
        if n < 2 {
            return Err(BucketError::InputShape(format!(
                "spline interpolation needs at least 2 points; got {n}"
            )));
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(BucketError::InputShape(
                "spline knots must be strictly increasing".to_string(),
            ));
        }

        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let m = second_derivatives(&h, y);

        let mut coeffs = Vec::with_capacity(n - 1);
        for k in 0..n - 1 {
            let hk = h[k];
            let a = y[k];
            let b = (y[k + 1] - y[k]) / hk - hk * (2.0 * m[k] + m[k + 1]) / 6.0;
            let c = m[k] / 2.0;
            let d = (m[k + 1] - m[k]) / (6.0 * hk);
            coeffs.push([a, b, c, d]);
        }

        let bounds = coeffs
            .iter()
            .zip(&h)
            .map(|(c, &hk)| segment_bounds(c, hk))
            .collect();

        Ok(Self {
            knots: x.to_vec(),
            coeffs,
            bounds,
        })
    }

    pub fn eval(&self, t: f64) -> f64 {
        let k = self.segment(t);
        evaluate(&self.coeffs[k], t - self.knots[k])
    }

    pub fn eval_many(&self, t: &[f64]) -> Vec<f64> {
        t.iter().map(|&ti| self.eval(ti)).collect()
    }

    /// All times where the spline equals `level`, sorted, within the knot range.
    pub fn roots(&self, level: f64) -> Vec<f64> {
        let span = self.knots[self.knots.len() - 1] - self.knots[0];
        let tol = ROOT_SLACK * (1.0 + level.abs());
        let mut roots: Vec<f64> = Vec::new();

        for (k, c) in self.coeffs.iter().enumerate() {
            let (lo, hi) = self.bounds[k];
            if level < lo - tol || level > hi + tol {
                continue;
            }
            let hk = self.knots[k + 1] - self.knots[k];
            let scaled = [
                c[0] - level,
                c[1] * hk,
                c[2] * hk * hk,
                c[3] * hk * hk * hk,
            ];
            for u in real_roots_in(&scaled, 0.0, 1.0, ROOT_SLACK) {
                roots.push(self.knots[k] + u * hk);
            }
        }

        roots.sort_by(|a, b| a.total_cmp(b));
        roots.dedup_by(|a, b| (*a - *b).abs() <= ROOT_SLACK * span);
        roots
    }

    /// Interior minima and maxima, located from the roots of the derivative.
    pub fn extrema(&self) -> Extrema {
        let first = self.knots[0];
        let last = self.knots[self.knots.len() - 1];
        let span = last - first;
        let mut found: Vec<(f64, f64, f64)> = Vec::new();

        for (k, c) in self.coeffs.iter().enumerate() {
            let hk = self.knots[k + 1] - self.knots[k];
            let slope = [c[1] * hk, 2.0 * c[2] * hk * hk, 3.0 * c[3] * hk * hk * hk];
            for u in real_roots_in(&slope, 0.0, 1.0, ROOT_SLACK) {
                let dx = u * hk;
                let t = self.knots[k] + dx;
                let curvature = 2.0 * c[2] + 6.0 * c[3] * dx;
                found.push((t, evaluate(c, dx), curvature));
            }
        }

        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.dedup_by(|a, b| (a.0 - b.0).abs() <= ROOT_SLACK * span);

        let mut extrema = Extrema::default();
        for (t, value, curvature) in found {
            if t <= first || t >= last {
                continue;
            }
            if curvature > 0.0 {
                extrema.minima.push((t, value));
            } else if curvature < 0.0 {
                extrema.maxima.push((t, value));
            }
        }
        extrema
    }

    fn segment(&self, t: f64) -> usize {
        let k = self.knots.partition_point(|&x| x <= t);
        k.saturating_sub(1).min(self.coeffs.len() - 1)
    }
}

/// Solves the tridiagonal system for the knot second derivatives with natural end
/// conditions (Thomas algorithm).
fn second_derivatives(h: &[f64], y: &[f64]) -> Vec<f64> {
    let n = y.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }

    let inner = n - 2;
    let mut diag = vec![0.0; inner];
    let mut upper = vec![0.0; inner];
    let mut rhs = vec![0.0; inner];
    for i in 0..inner {
        let k = i + 1;
        diag[i] = 2.0 * (h[k - 1] + h[k]);
        upper[i] = h[k];
        rhs[i] = 6.0 * ((y[k + 1] - y[k]) / h[k] - (y[k] - y[k - 1]) / h[k - 1]);
    }

    for i in 1..inner {
        let lower = h[i];
        let w = lower / diag[i - 1];
        diag[i] -= w * upper[i - 1];
        rhs[i] -= w * rhs[i - 1];
    }
    m[inner] = rhs[inner - 1] / diag[inner - 1];
    for i in (0..inner - 1).rev() {
        m[i + 1] = (rhs[i] - upper[i] * m[i + 2]) / diag[i];
    }
    m
}

fn segment_bounds(c: &[f64; 4], hk: f64) -> (f64, f64) {
    let mut lo = c[0].min(evaluate(c, hk));
    let mut hi = c[0].max(evaluate(c, hk));
    let slope = [c[1], 2.0 * c[2], 3.0 * c[3]];
    for dx in real_roots_in(&slope, 0.0, hk, 0.0) {
        let v = evaluate(c, dx);
        lo = lo.min(v);
        hi = hi.max(v);
    }
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::linspace;

    fn parabola(n: usize) -> (Vec<f64>, Vec<f64>) {
        let t = linspace(-1.0, 1.0, n);
        let w = t.iter().map(|x| x * x).collect();
        (t, w)
    }

    #[test]
    fn spline_reproduces_knots() {
        let (t, w) = parabola(21);
        let spline = CubicSpline::new(&t, &w).expect("spline should build");
        for (ti, wi) in t.iter().zip(&w) {
            assert!((spline.eval(*ti) - wi).abs() < 1e-12);
        }
    }

    #[test]
    fn spline_interpolates_smooth_curve_between_knots() {
        let t = linspace(0.0, std::f64::consts::PI, 101);
        let w: Vec<f64> = t.iter().map(|x| x.sin()).collect();
        let spline = CubicSpline::new(&t, &w).expect("spline should build");
        let probe = 1.2345;
        assert!((spline.eval(probe) - probe.sin()).abs() < 1e-6);
    }

    #[test]
    fn roots_of_parabola_level() {
        let (t, w) = parabola(201);
        let spline = CubicSpline::new(&t, &w).expect("spline should build");
        let roots = spline.roots(0.25);
        assert_eq!(roots.len(), 2, "roots {roots:?}");
        assert!((roots[0] + 0.5).abs() < 1e-5);
        assert!((roots[1] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn root_on_knot_is_reported_once() {
        let t = vec![0.0, 1.0, 2.0, 3.0];
        let w = vec![0.0, 1.0, 2.0, 3.0];
        let spline = CubicSpline::new(&t, &w).expect("spline should build");
        let roots = spline.roots(1.0);
        assert_eq!(roots.len(), 1, "roots {roots:?}");
        assert!((roots[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn extrema_of_double_well() {
        let t = linspace(-2.0, 2.0, 401);
        let w: Vec<f64> = t.iter().map(|x| (x * x - 1.0) * (x * x - 1.0)).collect();
        let spline = CubicSpline::new(&t, &w).expect("spline should build");
        let extrema = spline.extrema();
        assert_eq!(extrema.minima.len(), 2, "{extrema:?}");
        assert_eq!(extrema.maxima.len(), 1, "{extrema:?}");
        assert!((extrema.minima[0].0 + 1.0).abs() < 1e-3);
        assert!((extrema.minima[1].0 - 1.0).abs() < 1e-3);
        assert!(extrema.maxima[0].0.abs() < 1e-3);
        assert!((extrema.maxima[0].1 - 1.0).abs() < 1e-3);
    }

    #[test]
    fn spline_rejects_unsorted_knots() {
        let err = CubicSpline::new(&[0.0, 2.0, 1.0], &[0.0, 1.0, 2.0]).expect_err("expected error");
        assert!(format!("{err}").contains("strictly increasing"));
    }

    #[test]
    fn two_point_spline_is_linear() {
        let spline = CubicSpline::new(&[0.0, 2.0], &[1.0, 3.0]).expect("spline should build");
        assert!((spline.eval(1.0) - 2.0).abs() < 1e-12);
        assert_eq!(spline.roots(2.5), vec![1.5]);
    }
}

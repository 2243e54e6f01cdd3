//! Quadrature, finite differences and grid helpers for sampled curves.

use crate::traits::Scalar;

/// Trapezoid rule of `y` over the (not necessarily monotonic) abscissa `x`.
/// Returns zero for fewer than two points.
pub fn trapz<T: Scalar>(y: &[T], x: &[T]) -> T {
    let half = T::from_f64(0.5).unwrap_or_else(T::zero);
    y.windows(2)
        .zip(x.windows(2))
        .fold(T::zero(), |acc, (yy, xx)| acc + (xx[1] - xx[0]) * (yy[0] + yy[1]) * half)
}

/// Gradient with unit sample spacing: central differences in the interior and one-sided
/// differences at both ends.
pub fn gradient<T: Scalar>(f: &[T]) -> Vec<T> {
    let n = f.len();
    if n < 2 {
        return vec![T::zero(); n];
    }
    let half = T::from_f64(0.5).unwrap_or_else(T::zero);
    let mut out = Vec::with_capacity(n);
    out.push(f[1] - f[0]);
    for i in 1..n - 1 {
        out.push((f[i + 1] - f[i - 1]) * half);
    }
    out.push(f[n - 1] - f[n - 2]);
    out
}

/// `n` evenly spaced points over `[start, stop]`, both ends included.
pub fn linspace<T: Scalar>(start: T, stop: T, n: usize) -> Vec<T> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let steps = T::from_usize(n - 1).unwrap_or_else(T::one);
            let step = (stop - start) / steps;
            (0..n)
                .map(|i| {
                    if i == n - 1 {
                        stop
                    } else {
                        start + step * T::from_usize(i).unwrap_or_else(T::zero)
                    }
                })
                .collect()
        }
    }
}

/// Time at which the straight line between samples `a` and `b` reaches `level`.
pub fn level_crossing(time: &[f64], well: &[f64], a: usize, b: usize, level: f64) -> f64 {
    let dw = well[b] - well[a];
    if dw == 0.0 {
        return time[a];
    }
    time[a] + (level - well[a]) * (time[b] - time[a]) / dw
}

/// Index of the smallest value; the first one on ties.
pub fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

//! Real roots of low-order polynomials.
//!
//! Coefficients are given in ascending order, `c[0] + c[1] x + c[2] x² + c[3] x³`. Cubics go
//! through the eigenvalues of the companion matrix and are polished with Newton steps; lower
//! orders use closed forms.

use nalgebra::DMatrix;
use num_complex::Complex;

const LEADING_EPS: f64 = 1e-12;
const IMAG_EPS: f64 = 1e-7;
const NEWTON_STEPS: usize = 3;

/// Evaluates the polynomial at `x` (Horner).
pub fn evaluate(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Evaluates the first derivative at `x`.
pub fn evaluate_derivative(coeffs: &[f64], x: f64) -> f64 {
    coeffs
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .fold(0.0, |acc, (k, &c)| acc * x + k as f64 * c)
}

/// All real roots, sorted ascending. An identically zero polynomial has none.
pub fn real_roots(coeffs: &[f64]) -> Vec<f64> {
    let scale = coeffs.iter().fold(0.0_f64, |m, c| m.max(c.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return Vec::new();
    }
    let mut degree = coeffs.len().saturating_sub(1);
    while degree > 0 && coeffs[degree].abs() <= LEADING_EPS * scale {
        degree -= 1;
    }

    let mut roots = match degree {
        0 => Vec::new(),
        1 => vec![-coeffs[0] / coeffs[1]],
        2 => quadratic_roots(coeffs[0], coeffs[1], coeffs[2]),
        _ => companion_roots(&coeffs[..=degree]),
    };
    roots.retain(|r| r.is_finite());
    roots.sort_by(|a, b| a.total_cmp(b));
    roots
}

/// Real roots within `[lo, hi]`, widened by `slack` on both sides and clamped back.
pub fn real_roots_in(coeffs: &[f64], lo: f64, hi: f64, slack: f64) -> Vec<f64> {
    real_roots(coeffs)
        .into_iter()
        .filter(|&r| r >= lo - slack && r <= hi + slack)
        .map(|r| r.clamp(lo, hi))
        .collect()
}

fn quadratic_roots(c: f64, b: f64, a: f64) -> Vec<f64> {
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        // Tangent roots come out marginally negative.
        if disc >= -IMAG_EPS * b * b {
            return vec![-b / (2.0 * a)];
        }
        return Vec::new();
    }
    let sqrt_disc = disc.sqrt();
    let q = -0.5 * (b + b.signum() * sqrt_disc);
    if q == 0.0 {
        return vec![0.0, 0.0];
    }
    vec![q / a, c / q]
}

fn companion_roots(coeffs: &[f64]) -> Vec<f64> {
    let degree = coeffs.len() - 1;
    let lead = coeffs[degree];
    let mut companion = DMatrix::<f64>::zeros(degree, degree);
    for i in 1..degree {
        companion[(i, i - 1)] = 1.0;
    }
    for i in 0..degree {
        companion[(i, degree - 1)] = -coeffs[i] / lead;
    }

    let eigenvalues = companion.complex_eigenvalues();
    eigenvalues
        .iter()
        .filter(|z: &&Complex<f64>| z.im.abs() <= IMAG_EPS * (1.0 + z.re.abs()))
        .map(|z| polish(coeffs, z.re))
        .collect()
}

fn polish(coeffs: &[f64], mut x: f64) -> f64 {
    for _ in 0..NEWTON_STEPS {
        let slope = evaluate_derivative(coeffs, x);
        if slope == 0.0 || !slope.is_finite() {
            break;
        }
        let next = x - evaluate(coeffs, x) / slope;
        if !next.is_finite() {
            break;
        }
        x = next;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_roots(found: &[f64], expected: &[f64]) {
        assert_eq!(found.len(), expected.len(), "roots {found:?} vs {expected:?}");
        for (f, e) in found.iter().zip(expected) {
            assert!((f - e).abs() < 1e-9, "root {f} differs from {e}");
        }
    }

    #[test]
    fn cubic_with_three_real_roots() {
        // (x + 1)(x - 0.5)(x - 2) = x³ - 1.5x² - 1.5x + 1
        assert_roots(&real_roots(&[1.0, -1.5, -1.5, 1.0]), &[-1.0, 0.5, 2.0]);
    }

    #[test]
    fn cubic_with_complex_pair_keeps_real_root() {
        // (x - 3)(x² + 1) = x³ - 3x² + x - 3
        assert_roots(&real_roots(&[-3.0, 1.0, -3.0, 1.0]), &[3.0]);
    }

    #[test]
    fn degenerate_leading_coefficients_fall_back() {
        assert_roots(&real_roots(&[-4.0, 0.0, 1.0, 0.0]), &[-2.0, 2.0]);
        assert_roots(&real_roots(&[2.0, -1.0, 0.0, 0.0]), &[2.0]);
        assert!(real_roots(&[1.0, 0.0, 0.0, 0.0]).is_empty());
        assert!(real_roots(&[0.0, 0.0, 0.0, 0.0]).is_empty());
    }

    #[test]
    fn tangent_quadratic_gives_double_root() {
        let roots = real_roots(&[1.0, -2.0, 1.0]);
        assert!(!roots.is_empty());
        assert!(roots.iter().all(|r| (r - 1.0).abs() < 1e-6));
    }

    #[test]
    fn roots_in_interval_are_filtered() {
        let roots = real_roots_in(&[1.0, -1.5, -1.5, 1.0], 0.0, 1.0, 1e-12);
        assert_roots(&roots, &[0.5]);
    }

    #[test]
    fn evaluate_and_derivative_agree_with_hand_values() {
        let coeffs = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(evaluate(&coeffs, 2.0), 1.0 + 4.0 + 12.0 + 32.0);
        assert_eq!(evaluate_derivative(&coeffs, 2.0), 2.0 + 12.0 + 48.0);
    }
}

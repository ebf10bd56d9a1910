//! Direct least-squares ellipse fitting (Fitzgibbon et al., 1999).
//!
//! The segmenter hands whole contours to [`fit_ellipse`]; the fit solves the
//! constrained eigenvalue problem that enforces the ellipse condition
//! (B² − 4AC < 0) and converts the winning conic into geometric parameters.

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use thiserror::Error;

use crate::geometry::CoinEllipse;

/// Fewest contour points accepted by the fitter.
pub const MIN_FIT_POINTS: usize = 5;

/// Reasons an ellipse fit can fail.
#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("points do not determine an ellipse")]
    NotAnEllipse,
    #[error("numerical failure in the constrained eigenproblem")]
    Numerical,
}

/// Fit an ellipse to a set of `(x, y)` points.
///
/// Points are normalized (centroid shift, √2 mean-distance scale) before the
/// design matrix is accumulated; the conic is denormalized afterwards.
pub fn fit_ellipse(points: &[[f64; 2]]) -> Result<CoinEllipse, FitError> {
    let n = points.len();
    if n < MIN_FIT_POINTS {
        return Err(FitError::TooFewPoints { needed: MIN_FIT_POINTS, got: n });
    }

    let (mean_x, mean_y, scale) = normalization(points);

    // Scatter matrix S = Σ z zᵀ with z = [x², xy, y², x, y, 1] accumulated
    // directly; no per-point design matrix is materialized.
    let mut s = Matrix6::<f64>::zeros();
    for &[px, py] in points {
        let x = (px - mean_x) * scale;
        let y = (py - mean_y) * scale;
        let z = Vector6::new(x * x, x * y, y * y, x, y, 1.0);
        s += z * z.transpose();
    }

    let s11 = s.fixed_view::<3, 3>(0, 0).into_owned();
    let s12 = s.fixed_view::<3, 3>(0, 3).into_owned();
    let s22 = s.fixed_view::<3, 3>(3, 3).into_owned();

    // Constraint matrix for 4AC − B² > 0.
    let c1 = Matrix3::new(0.0, 0.0, 2.0, 0.0, -1.0, 0.0, 2.0, 0.0, 0.0);

    let s22_inv = s22.try_inverse().ok_or(FitError::Numerical)?;
    let reduced = s11 - s12 * s22_inv * s12.transpose();
    let c1_inv = c1.try_inverse().ok_or(FitError::Numerical)?;

    let quad = constrained_eigenvector(&(c1_inv * reduced)).ok_or(FitError::NotAnEllipse)?;
    let linear = -s22_inv * s12.transpose() * quad;

    let coeffs = denormalize(
        &Vector6::new(quad[0], quad[1], quad[2], linear[0], linear[1], linear[2]),
        mean_x,
        mean_y,
        scale,
    );

    conic_to_ellipse(&coeffs).ok_or(FitError::NotAnEllipse)
}

/// Normalization parameters: centroid and the scale bringing the mean
/// centroid distance to √2.
fn normalization(points: &[[f64; 2]]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p[0] - mean_x).powi(2) + (p[1] - mean_y).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let scale = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    (mean_x, mean_y, scale)
}

/// Eigenvector of `system` satisfying the ellipse constraint 4AC − B² > 0.
///
/// The system is not symmetric, so eigenvalues come from the characteristic
/// cubic and eigenvectors from the adjugate of the shifted matrix.
fn constrained_eigenvector(system: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let a = system;
    let trace = a[(0, 0)] + a[(1, 1)] + a[(2, 2)];
    let minor_sum = a[(0, 0)] * a[(1, 1)] - a[(0, 1)] * a[(1, 0)]
        + a[(0, 0)] * a[(2, 2)]
        - a[(0, 2)] * a[(2, 0)]
        + a[(1, 1)] * a[(2, 2)]
        - a[(1, 2)] * a[(2, 1)];
    let det = a.determinant();

    let mut best: Option<(f64, Vector3<f64>)> = None;
    for ev in real_cubic_roots(-trace, minor_sum, -det) {
        let shifted = system - Matrix3::identity() * ev;
        let Some(v) = null_vector(&shifted) else {
            continue;
        };
        if 4.0 * v[0] * v[2] - v[1] * v[1] > 0.0
            && best.map_or(true, |(kept, _)| ev.abs() < kept)
        {
            best = Some((ev.abs(), v));
        }
    }
    best.map(|(_, v)| v)
}

/// Null vector of a near-singular 3x3 matrix via the largest adjugate row.
fn null_vector(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let rows = [
        Vector3::new(
            m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
            -(m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)]),
            m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
        ),
        Vector3::new(
            -(m[(0, 1)] * m[(2, 2)] - m[(0, 2)] * m[(2, 1)]),
            m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
            -(m[(0, 0)] * m[(2, 1)] - m[(0, 1)] * m[(2, 0)]),
        ),
        Vector3::new(
            m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
            -(m[(0, 0)] * m[(1, 2)] - m[(0, 2)] * m[(1, 0)]),
            m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
        ),
    ];

    let best = rows
        .into_iter()
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;
    if best.norm_squared() < 1e-30 {
        return None;
    }
    Some(best.normalize())
}

/// Real roots of `x³ + px² + qx + r = 0`.
fn real_cubic_roots(p: f64, q: f64, r: f64) -> Vec<f64> {
    // Depressed cubic t³ + at + b with x = t − p/3.
    let a = q - p * p / 3.0;
    let b = 2.0 * p * p * p / 27.0 - p * q / 3.0 + r;
    let shift = -p / 3.0;
    let disc = -4.0 * a * a * a - 27.0 * b * b;

    if disc >= 0.0 {
        let radius = (-a / 3.0).max(0.0).sqrt();
        let cos_arg = if radius.abs() < 1e-15 {
            0.0
        } else {
            (-b / (2.0 * radius * radius * radius)).clamp(-1.0, 1.0)
        };
        let theta = cos_arg.acos();
        let tau = 2.0 * std::f64::consts::PI;
        (0..3)
            .map(|k| 2.0 * radius * ((theta + tau * k as f64) / 3.0).cos() + shift)
            .collect()
    } else {
        let sqrt_disc = (b * b / 4.0 + a * a * a / 27.0).sqrt();
        vec![(-b / 2.0 + sqrt_disc).cbrt() + (-b / 2.0 - sqrt_disc).cbrt() + shift]
    }
}

/// Undo the centroid/scale normalization on conic coefficients.
fn denormalize(c: &Vector6<f64>, mx: f64, my: f64, s: f64) -> [f64; 6] {
    let [a_, b_, c_, d_, e_, f_] = [c[0], c[1], c[2], c[3], c[4], c[5]];
    let s2 = s * s;
    [
        a_ * s2,
        b_ * s2,
        c_ * s2,
        -2.0 * a_ * s2 * mx - b_ * s2 * my + d_ * s,
        -b_ * s2 * mx - 2.0 * c_ * s2 * my + e_ * s,
        a_ * s2 * mx * mx + b_ * s2 * mx * my + c_ * s2 * my * my - d_ * s * mx - e_ * s * my
            + f_,
    ]
}

/// Convert `A x² + B xy + C y² + D x + E y + F = 0` to geometric parameters.
fn conic_to_ellipse(coeffs: &[f64; 6]) -> Option<CoinEllipse> {
    let [a, b, c, d, e, f] = *coeffs;

    if b * b - 4.0 * a * c >= 0.0 {
        return None;
    }

    // Center from the gradient zero of the quadratic form.
    let denom = 4.0 * a * c - b * b;
    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;

    let angle = if (a - c).abs() < 1e-15 {
        if b > 0.0 {
            std::f64::consts::FRAC_PI_4
        } else if b < 0.0 {
            -std::f64::consts::FRAC_PI_4
        } else {
            0.0
        }
    } else {
        0.5 * b.atan2(a - c)
    };

    // Semi-axes from the eigenvalues of the quadratic part.
    let sum = a + c;
    let diff = ((a - c).powi(2) + b * b).sqrt();
    let lambda1 = (sum + diff) / 2.0;
    let lambda2 = (sum - diff) / 2.0;

    let center_value = a * cx * cx + b * cx * cy + c * cy * cy + d * cx + e * cy + f;
    if center_value.abs() < 1e-15 {
        return None;
    }

    let a_sq = -center_value / lambda1;
    let b_sq = -center_value / lambda2;
    if a_sq <= 0.0 || b_sq <= 0.0 {
        return None;
    }

    let (mut semi_major, mut semi_minor, mut angle) = (a_sq.sqrt(), b_sq.sqrt(), angle);
    if semi_major < semi_minor {
        std::mem::swap(&mut semi_major, &mut semi_minor);
        angle += std::f64::consts::FRAC_PI_2;
    }
    // Normalize to (−π/2, π/2].
    while angle > std::f64::consts::FRAC_PI_2 {
        angle -= std::f64::consts::PI;
    }
    while angle <= -std::f64::consts::FRAC_PI_2 {
        angle += std::f64::consts::PI;
    }

    let ellipse = CoinEllipse {
        cx,
        cy,
        major: 2.0 * semi_major,
        minor: 2.0 * semi_minor,
        angle_deg: angle.to_degrees(),
    };
    ellipse_is_finite(&ellipse).then_some(ellipse)
}

fn ellipse_is_finite(e: &CoinEllipse) -> bool {
    e.cx.is_finite()
        && e.cy.is_finite()
        && e.major.is_finite()
        && e.minor.is_finite()
        && e.angle_deg.is_finite()
        && e.major > 0.0
        && e.minor > 0.0
}

/// Sample `n` boundary points of an ellipse (tests and annotation).
pub fn sample_boundary(e: &CoinEllipse, n: usize) -> Vec<[f64; 2]> {
    let phi = e.angle_deg.to_radians();
    let (sin, cos) = phi.sin_cos();
    let (sa, sb) = (0.5 * e.major, 0.5 * e.minor);
    (0..n)
        .map(|i| {
            let t = 2.0 * std::f64::consts::PI * (i as f64) / (n as f64);
            let px = sa * t.cos();
            let py = sb * t.sin();
            [e.cx + cos * px - sin * py, e.cy + sin * px + cos * py]
        })
        .collect()
}

//! Similarity transform estimation from the 3-point correspondence set.
//!
//! Provides:
//! - Exact 2-point similarity solve (minimal sample).
//! - Closed-form least-squares similarity fit over n ≥ 2 points.
//! - Deterministic least-median-of-squares estimation over the three
//!   minimal 2-point subsets, with an inlier refit.
//!
//! The fitted transform is constrained to the similarity family throughout:
//! rotation + uniform scale + translation, no shear, no per-axis scaling.

use nalgebra::Matrix3;

/// A 2D similarity transform stored as the four coefficients of the 2×3
/// matrix `[[a, -b, tx], [b, a, ty]]`.
///
/// Maps points in the generated-image frame to the template frame. Computed
/// once per alignment call; never cached across calls.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimilarityTransform {
    pub a: f64,
    pub b: f64,
    pub tx: f64,
    pub ty: f64,
}

impl SimilarityTransform {
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, tx: 0.0, ty: 0.0 }
    }

    /// Apply the transform to a point.
    pub fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        [
            self.a * p[0] - self.b * p[1] + self.tx,
            self.b * p[0] + self.a * p[1] + self.ty,
        ]
    }

    /// Row-major 2×3 matrix form.
    pub fn matrix_2x3(&self) -> [[f64; 3]; 2] {
        [[self.a, -self.b, self.tx], [self.b, self.a, self.ty]]
    }

    /// Uniform scale factor.
    pub fn scale(&self) -> f64 {
        self.a.hypot(self.b)
    }

    /// Rotation angle in degrees, counter-clockwise in image coordinates.
    pub fn rotation_deg(&self) -> f64 {
        self.b.atan2(self.a).to_degrees()
    }

    /// Homogeneous 3×3 matrix form.
    pub fn homogeneous(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.a, -self.b, self.tx,
            self.b, self.a, self.ty,
            0.0, 0.0, 1.0,
        )
    }

    /// Inverse transform, or `None` when the scale is numerically zero.
    ///
    /// The inverse of a similarity is a similarity, so the homogeneous
    /// inverse can be read back into coefficient form directly.
    pub fn try_inverse(&self) -> Option<Self> {
        if self.a * self.a + self.b * self.b < 1e-24 {
            return None;
        }
        let m = self.homogeneous().try_inverse()?;
        Some(Self {
            a: m[(0, 0)],
            b: m[(1, 0)],
            tx: m[(0, 2)],
            ty: m[(1, 2)],
        })
    }
}

/// Estimation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimilarityError {
    /// Correspondence points are collinear or coincident: rotation and scale
    /// are not stably determined.
    Degenerate,
    /// Fewer points than the fit requires.
    TooFewPoints { needed: usize, got: usize },
}

impl std::fmt::Display for SimilarityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Degenerate => write!(f, "degenerate point configuration"),
            Self::TooFewPoints { needed, got } => {
                write!(f, "too few points: need {}, got {}", needed, got)
            }
        }
    }
}

impl std::error::Error for SimilarityError {}

// ── Minimal and least-squares solves ─────────────────────────────────────

/// Exact similarity from two point correspondences, treating points as
/// complex numbers: `z = (q1 - q0) / (p1 - p0)`, `t = q0 - z * p0`.
///
/// Returns `None` when the source points coincide.
fn solve_two_point(
    p0: [f64; 2],
    p1: [f64; 2],
    q0: [f64; 2],
    q1: [f64; 2],
) -> Option<SimilarityTransform> {
    let dp = [p1[0] - p0[0], p1[1] - p0[1]];
    let dq = [q1[0] - q0[0], q1[1] - q0[1]];
    let denom = dp[0] * dp[0] + dp[1] * dp[1];
    if denom < 1e-18 {
        return None;
    }
    let a = (dq[0] * dp[0] + dq[1] * dp[1]) / denom;
    let b = (dq[1] * dp[0] - dq[0] * dp[1]) / denom;
    Some(SimilarityTransform {
        a,
        b,
        tx: q0[0] - (a * p0[0] - b * p0[1]),
        ty: q0[1] - (b * p0[0] + a * p0[1]),
    })
}

/// Closed-form least-squares similarity fit over n ≥ 2 correspondences
/// (uniform-scale Procrustes in centered coordinates).
pub fn fit_similarity_lsq(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<SimilarityTransform, SimilarityError> {
    let n = src.len().min(dst.len());
    if n < 2 {
        return Err(SimilarityError::TooFewPoints { needed: 2, got: n });
    }
    let nf = n as f64;
    let ms = [
        src[..n].iter().map(|p| p[0]).sum::<f64>() / nf,
        src[..n].iter().map(|p| p[1]).sum::<f64>() / nf,
    ];
    let md = [
        dst[..n].iter().map(|p| p[0]).sum::<f64>() / nf,
        dst[..n].iter().map(|p| p[1]).sum::<f64>() / nf,
    ];

    let mut dot = 0.0;
    let mut cross = 0.0;
    let mut norm = 0.0;
    for i in 0..n {
        let s = [src[i][0] - ms[0], src[i][1] - ms[1]];
        let d = [dst[i][0] - md[0], dst[i][1] - md[1]];
        dot += s[0] * d[0] + s[1] * d[1];
        cross += s[0] * d[1] - s[1] * d[0];
        norm += s[0] * s[0] + s[1] * s[1];
    }
    if norm < 1e-18 {
        return Err(SimilarityError::Degenerate);
    }

    let a = dot / norm;
    let b = cross / norm;
    Ok(SimilarityTransform {
        a,
        b,
        tx: md[0] - (a * ms[0] - b * ms[1]),
        ty: md[1] - (b * ms[0] + a * ms[1]),
    })
}

// ── Degeneracy gate ──────────────────────────────────────────────────────

/// Collinear or coincident triplet: the signed parallelogram area vanishes
/// relative to the point spread. The ratio is dimensionless, so the gate is
/// scale-invariant.
fn triplet_degenerate(p: &[[f64; 2]; 3]) -> bool {
    let d = |i: usize, j: usize| {
        let dx = p[j][0] - p[i][0];
        let dy = p[j][1] - p[i][1];
        dx * dx + dy * dy
    };
    let spread = d(0, 1).max(d(0, 2)).max(d(1, 2));
    if spread < 1e-12 {
        return true;
    }
    let cross = (p[1][0] - p[0][0]) * (p[2][1] - p[0][1])
        - (p[1][1] - p[0][1]) * (p[2][0] - p[0][0]);
    cross.abs() < 1e-9 * spread
}

// ── LMedS estimation ─────────────────────────────────────────────────────

fn squared_residual(t: &SimilarityTransform, s: [f64; 2], d: [f64; 2]) -> f64 {
    let p = t.apply(s);
    let dx = p[0] - d[0];
    let dy = p[1] - d[1];
    dx * dx + dy * dy
}

/// Robust similarity estimation mapping `src` (generated triplet) onto
/// `dst` (template triplet).
///
/// Least-median-of-squares over the three exhaustively enumerated 2-point
/// minimal subsets: each candidate fits its sample exactly and is scored by
/// the median (2nd-smallest of 3) squared residual over all points. With a
/// minimal sample of 2 out of 3 the median alone ties at zero whenever two
/// residuals vanish, so ties are broken by total squared residual. The
/// winner's inliers (LMedS sigma rule, n = 3, model dimension 2) then get a
/// least-squares refit. The whole procedure is deterministic: no random
/// sampling.
///
/// Returns [`SimilarityError::Degenerate`] when either triplet is collinear
/// or coincident.
pub fn estimate_similarity_lmeds(
    src: &[[f64; 2]; 3],
    dst: &[[f64; 2]; 3],
) -> Result<SimilarityTransform, SimilarityError> {
    if triplet_degenerate(src) || triplet_degenerate(dst) {
        return Err(SimilarityError::Degenerate);
    }

    const SUBSETS: [[usize; 2]; 3] = [[0, 1], [0, 2], [1, 2]];

    let mut best: Option<(f64, f64, SimilarityTransform)> = None;
    for [i, j] in SUBSETS {
        let cand = match solve_two_point(src[i], src[j], dst[i], dst[j]) {
            Some(t) => t,
            None => continue,
        };
        let mut r2 = [0.0f64; 3];
        for (k, r) in r2.iter_mut().enumerate() {
            *r = squared_residual(&cand, src[k], dst[k]);
        }
        r2.sort_by(f64::total_cmp);
        let median = r2[1];
        let total = r2[0] + r2[1] + r2[2];

        let better = match &best {
            None => true,
            Some((m, t, _)) => median < *m || (median == *m && total < *t),
        };
        if better {
            best = Some((median, total, cand));
        }
    }

    let (median, _, winner) = best.ok_or(SimilarityError::Degenerate)?;

    // Inlier threshold: 2.5 sigma with the small-sample LMedS correction
    // sigma = 1.4826 * (1 + 5 / (n - p)) * sqrt(median), n = 3, p = 2.
    let sigma = 1.4826 * 6.0 * median.sqrt();
    let thresh2 = (2.5 * sigma) * (2.5 * sigma) + 1e-12;

    let mut in_src = Vec::with_capacity(3);
    let mut in_dst = Vec::with_capacity(3);
    for k in 0..3 {
        if squared_residual(&winner, src[k], dst[k]) <= thresh2 {
            in_src.push(src[k]);
            in_dst.push(dst[k]);
        }
    }

    if in_src.len() >= 2 {
        if let Ok(refit) = fit_similarity_lsq(&in_src, &in_dst) {
            return Ok(refit);
        }
    }
    Ok(winner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EYE_MOUTH_TRIPLET: [[f64; 2]; 3] = [[60.0, 100.0], [140.0, 100.0], [100.0, 150.0]];

    fn map_triplet(t: &SimilarityTransform, p: &[[f64; 2]; 3]) -> [[f64; 2]; 3] {
        [t.apply(p[0]), t.apply(p[1]), t.apply(p[2])]
    }

    #[test]
    fn identity_round_trip() {
        let t = estimate_similarity_lmeds(&EYE_MOUTH_TRIPLET, &EYE_MOUTH_TRIPLET).unwrap();
        assert_relative_eq!(t.scale(), 1.0, epsilon = 1e-3);
        assert_relative_eq!(t.rotation_deg(), 0.0, epsilon = 1e-3);
        assert_relative_eq!(t.tx, 0.0, epsilon = 1e-3);
        assert_relative_eq!(t.ty, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn recovers_pure_scale_of_two() {
        // Template eye centers 40px above the mouth at twice the generated
        // geometry: eye-mouth distance 50 vs 25.
        let gen = [[40.0, 50.0], [60.0, 50.0], [50.0, 75.0]];
        let tmpl = [[80.0, 100.0], [120.0, 100.0], [100.0, 150.0]];

        let t = estimate_similarity_lmeds(&gen, &tmpl).unwrap();
        assert_relative_eq!(t.scale(), 2.0, epsilon = 1e-6);
        assert_relative_eq!(t.rotation_deg(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(t.tx, 0.0, epsilon = 1e-6);
        assert_relative_eq!(t.ty, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn recovers_rotation_scale_translation() {
        let truth = SimilarityTransform {
            a: 1.3 * (0.4f64).cos(),
            b: 1.3 * (0.4f64).sin(),
            tx: 25.0,
            ty: -14.0,
        };
        let dst = map_triplet(&truth, &EYE_MOUTH_TRIPLET);

        let t = estimate_similarity_lmeds(&EYE_MOUTH_TRIPLET, &dst).unwrap();
        assert_relative_eq!(t.a, truth.a, epsilon = 1e-9);
        assert_relative_eq!(t.b, truth.b, epsilon = 1e-9);
        assert_relative_eq!(t.tx, truth.tx, epsilon = 1e-7);
        assert_relative_eq!(t.ty, truth.ty, epsilon = 1e-7);
    }

    #[test]
    fn collinear_source_is_degenerate() {
        let src = [[0.0, 0.0], [10.0, 0.0], [20.0, 0.0]];
        assert_eq!(
            estimate_similarity_lmeds(&src, &EYE_MOUTH_TRIPLET),
            Err(SimilarityError::Degenerate)
        );
    }

    #[test]
    fn collinear_target_is_degenerate() {
        let dst = [[0.0, 0.0], [10.0, 0.0], [20.0, 0.0]];
        assert_eq!(
            estimate_similarity_lmeds(&EYE_MOUTH_TRIPLET, &dst),
            Err(SimilarityError::Degenerate)
        );
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let src = [[5.0, 5.0]; 3];
        assert_eq!(
            estimate_similarity_lmeds(&src, &EYE_MOUTH_TRIPLET),
            Err(SimilarityError::Degenerate)
        );
    }

    #[test]
    fn one_outlier_is_damped_versus_least_squares() {
        // Eye baseline (80px) longer than either eye-mouth distance (64px),
        // so the eye-pair candidate carries the smaller total residual when
        // the mouth center is mislocalized.
        let src = EYE_MOUTH_TRIPLET;
        let mut dst = src;
        dst[2] = [dst[2][0] + 30.0, dst[2][1] - 20.0];

        let robust = estimate_similarity_lmeds(&src, &dst).unwrap();
        let naive = fit_similarity_lsq(&src, &dst).unwrap();

        // The robust fit stays at identity; the naive fit is pulled away.
        assert_relative_eq!(robust.scale(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(robust.rotation_deg(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(robust.tx, 0.0, epsilon = 1e-9);

        let naive_drift = naive.tx.abs() + naive.ty.abs() + (naive.scale() - 1.0).abs();
        let robust_drift = robust.tx.abs() + robust.ty.abs() + (robust.scale() - 1.0).abs();
        assert!(naive_drift > 1.0);
        assert!(robust_drift < 1e-6);
    }

    #[test]
    fn estimation_is_deterministic() {
        let gen = [[41.5, 52.25], [61.0, 49.75], [50.5, 76.0]];
        let tmpl = [[83.0, 101.0], [121.5, 99.0], [99.5, 151.0]];
        let t1 = estimate_similarity_lmeds(&gen, &tmpl).unwrap();
        let t2 = estimate_similarity_lmeds(&gen, &tmpl).unwrap();
        assert_eq!(t1, t2);
    }

    #[test]
    fn two_point_solve_is_exact() {
        let t = solve_two_point([0.0, 0.0], [1.0, 0.0], [2.0, 3.0], [2.0, 5.0]).unwrap();
        // Rotation by 90° with scale 2, then translation.
        assert_relative_eq!(t.scale(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(t.rotation_deg(), 90.0, epsilon = 1e-9);
        let q = t.apply([1.0, 0.0]);
        assert_relative_eq!(q[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(q[1], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn inverse_round_trip() {
        let t = SimilarityTransform { a: 0.8, b: 0.3, tx: 12.0, ty: -7.0 };
        let inv = t.try_inverse().unwrap();
        let p = [33.0, 41.0];
        let back = inv.apply(t.apply(p));
        assert_relative_eq!(back[0], p[0], epsilon = 1e-9);
        assert_relative_eq!(back[1], p[1], epsilon = 1e-9);
    }

    #[test]
    fn zero_scale_has_no_inverse() {
        let t = SimilarityTransform { a: 0.0, b: 0.0, tx: 1.0, ty: 1.0 };
        assert!(t.try_inverse().is_none());
    }

    #[test]
    fn matrix_layout_is_row_major_2x3() {
        let t = SimilarityTransform { a: 1.0, b: 2.0, tx: 3.0, ty: 4.0 };
        assert_eq!(t.matrix_2x3(), [[1.0, -2.0, 3.0], [2.0, 1.0, 4.0]]);
    }
}

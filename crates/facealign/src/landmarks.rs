//! Normalized landmark output shared by both detector backends.

/// Which backend produced a [`LandmarkSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorTag {
    /// Five-point detector (native eye/mouth-corner keypoints).
    Primary,
    /// Dense-mesh detector (centers averaged over mesh clusters).
    Secondary,
}

impl std::fmt::Display for DetectorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// Landmarks for one face in the pixel grid of the image they were detected
/// on. Never constructed for a no-face outcome; absence is an explicit
/// detection error.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LandmarkSet {
    /// Left eye center (x, y) in source-image pixels.
    pub left_eye_center: [f64; 2],
    /// Right eye center (x, y) in source-image pixels.
    pub right_eye_center: [f64; 2],
    /// Mouth center (x, y) in source-image pixels.
    pub mouth_center: [f64; 2],
    /// Five points for overlay rendering, ordered
    /// [left-eye, right-eye, eye-midpoint, left-mouth-corner,
    /// right-mouth-corner]. Not used by the transform fit.
    pub five_points: [[f64; 2]; 5],
    /// Backend provenance.
    pub method: DetectorTag,
}

impl LandmarkSet {
    /// The ordered 3-point correspondence set used for the similarity fit:
    /// [left eye center, right eye center, mouth center].
    ///
    /// Three points let the 4-DoF fit damp jitter in any single landmark
    /// instead of solving it exactly from two.
    pub fn triplet(&self) -> [[f64; 2]; 3] {
        [self.left_eye_center, self.right_eye_center, self.mouth_center]
    }

    /// True when every stored coordinate is finite.
    pub fn is_finite(&self) -> bool {
        let centers = [self.left_eye_center, self.right_eye_center, self.mouth_center];
        centers
            .iter()
            .chain(self.five_points.iter())
            .all(|p| p[0].is_finite() && p[1].is_finite())
    }
}

/// Midpoint of two 2D points.
pub(crate) fn midpoint(p: [f64; 2], q: [f64; 2]) -> [f64; 2] {
    [(p[0] + q[0]) / 2.0, (p[1] + q[1]) / 2.0]
}

/// Mean of a non-empty point cluster.
pub(crate) fn centroid(pts: &[[f64; 2]]) -> [f64; 2] {
    let n = pts.len() as f64;
    let sx: f64 = pts.iter().map(|p| p[0]).sum();
    let sy: f64 = pts.iter().map(|p| p[1]).sum();
    [sx / n, sy / n]
}

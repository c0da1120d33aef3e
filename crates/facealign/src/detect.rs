//! The two concrete landmark detectors.
//!
//! Both emit schema-identical [`LandmarkSet`]s so everything downstream is
//! detector-agnostic. They differ only in how the eye and mouth centers are
//! derived from the backend's native output:
//!
//! - [`PrimaryDetector`]: centers straight from the five native keypoints.
//! - [`SecondaryDetector`]: centers averaged over fixed mesh-vertex clusters,
//!   which is noise-robust on meshes without canonical single "eye" indices.

use std::sync::Mutex;

use image::RgbImage;

use crate::backend::{BackendError, FaceMeshModel, FivePointModel};
use crate::landmarks::{centroid, midpoint, DetectorTag, LandmarkSet};

/// Failure of a single detector on a single image.
///
/// All of these are absorbed by the fallback chain; none reaches the public
/// alignment boundary directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    /// The backend ran and found no usable face.
    NoFaceDetected,
    /// The backend cannot be called (uninitialized, disabled, poisoned lock).
    BackendUnavailable,
    /// The backend answered with output that violates its contract.
    MalformedOutput(String),
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFaceDetected => write!(f, "no face detected"),
            Self::BackendUnavailable => write!(f, "backend unavailable"),
            Self::MalformedOutput(msg) => write!(f, "malformed backend output: {}", msg),
        }
    }
}

impl std::error::Error for DetectError {}

impl From<BackendError> for DetectError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unavailable => Self::BackendUnavailable,
            BackendError::Malformed(msg) => Self::MalformedOutput(msg),
        }
    }
}

fn check_finite(lm: LandmarkSet) -> Result<LandmarkSet, DetectError> {
    if lm.is_finite() {
        Ok(lm)
    } else {
        Err(DetectError::MalformedOutput(
            "non-finite landmark coordinates".into(),
        ))
    }
}

// ── Primary: five-point backend ──────────────────────────────────────────

/// Detector over a five-point backend.
///
/// The model handle is mutex-guarded so `detect` can be called from many
/// threads while the (possibly non-reentrant) inference runs one at a time.
/// Only the inference call holds the lock; landmark derivation does not.
pub struct PrimaryDetector {
    model: Mutex<Box<dyn FivePointModel>>,
}

impl PrimaryDetector {
    pub fn new(model: Box<dyn FivePointModel>) -> Self {
        Self { model: Mutex::new(model) }
    }

    /// Detect landmarks in `image`.
    pub fn detect(&self, image: &RgbImage) -> Result<LandmarkSet, DetectError> {
        let kp = {
            let mut model = self
                .model
                .lock()
                .map_err(|_| DetectError::BackendUnavailable)?;
            model.keypoints(image)?
        };
        let kp = kp.ok_or(DetectError::NoFaceDetected)?;

        let eye_mid = midpoint(kp.left_eye, kp.right_eye);
        let lm = LandmarkSet {
            left_eye_center: kp.left_eye,
            right_eye_center: kp.right_eye,
            mouth_center: midpoint(kp.left_mouth, kp.right_mouth),
            five_points: [kp.left_eye, kp.right_eye, eye_mid, kp.left_mouth, kp.right_mouth],
            method: DetectorTag::Primary,
        };
        check_finite(lm)
    }
}

// ── Secondary: dense-mesh backend ────────────────────────────────────────

/// Mesh vertex clusters used to derive stable centers (468-point topology).
const LEFT_EYE_IDX: [usize; 10] = [33, 133, 160, 159, 158, 157, 173, 246, 7, 163];
const RIGHT_EYE_IDX: [usize; 10] = [263, 362, 387, 386, 385, 384, 398, 466, 249, 390];
/// Upper lip, lower lip, and lip midline vertices.
const MOUTH_CENTER_IDX: [usize; 3] = [13, 14, 0];
/// Dedicated corner vertices kept for five-point compatibility.
const MOUTH_CORNER_IDX: [usize; 2] = [61, 291];

/// Smallest mesh length that covers every index above.
const MIN_MESH_LEN: usize = 467;

/// Detector over a dense face-mesh backend.
///
/// Mesh vertices arrive normalized to [0, 1]; they are scaled into the pixel
/// grid of `image` before any center is computed.
pub struct SecondaryDetector {
    model: Mutex<Box<dyn FaceMeshModel>>,
}

impl SecondaryDetector {
    pub fn new(model: Box<dyn FaceMeshModel>) -> Self {
        Self { model: Mutex::new(model) }
    }

    /// Detect landmarks in `image`.
    pub fn detect(&self, image: &RgbImage) -> Result<LandmarkSet, DetectError> {
        let mesh = {
            let mut model = self
                .model
                .lock()
                .map_err(|_| DetectError::BackendUnavailable)?;
            model.mesh(image)?
        };
        let mesh = mesh.ok_or(DetectError::NoFaceDetected)?;
        if mesh.len() < MIN_MESH_LEN {
            return Err(DetectError::MalformedOutput(format!(
                "mesh has {} vertices, need at least {}",
                mesh.len(),
                MIN_MESH_LEN
            )));
        }

        let (w, h) = (f64::from(image.width()), f64::from(image.height()));
        let px = |i: usize| -> [f64; 2] { [mesh[i][0] * w, mesh[i][1] * h] };
        let cluster = |idx: &[usize]| -> [f64; 2] {
            let pts: Vec<[f64; 2]> = idx.iter().map(|&i| px(i)).collect();
            centroid(&pts)
        };

        let left_eye_center = cluster(&LEFT_EYE_IDX);
        let right_eye_center = cluster(&RIGHT_EYE_IDX);
        let left_mouth = px(MOUTH_CORNER_IDX[0]);
        let right_mouth = px(MOUTH_CORNER_IDX[1]);

        let lm = LandmarkSet {
            left_eye_center,
            right_eye_center,
            mouth_center: cluster(&MOUTH_CENTER_IDX),
            five_points: [
                left_eye_center,
                right_eye_center,
                midpoint(left_eye_center, right_eye_center),
                left_mouth,
                right_mouth,
            ],
            method: DetectorTag::Secondary,
        };
        check_finite(lm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{StaticFivePoint, StaticMesh};
    use crate::test_utils::{face_five_keypoints, face_mesh_normalized, gradient_image};
    use approx::assert_relative_eq;

    #[test]
    fn primary_derives_centers_from_native_points() {
        let kp = face_five_keypoints(0.0, 0.0);
        let det = PrimaryDetector::new(Box::new(StaticFivePoint::with_keypoints(kp)));
        let img = gradient_image(200, 200);

        let lm = det.detect(&img).unwrap();
        assert_eq!(lm.method, DetectorTag::Primary);
        assert_eq!(lm.left_eye_center, kp.left_eye);
        assert_eq!(lm.right_eye_center, kp.right_eye);
        assert_relative_eq!(
            lm.mouth_center[0],
            (kp.left_mouth[0] + kp.right_mouth[0]) / 2.0
        );
        assert_relative_eq!(
            lm.mouth_center[1],
            (kp.left_mouth[1] + kp.right_mouth[1]) / 2.0
        );
        assert_eq!(lm.five_points[2], [100.0, 100.0]);
    }

    #[test]
    fn primary_no_face_is_not_a_landmark_set() {
        let det = PrimaryDetector::new(Box::new(StaticFivePoint::no_face()));
        let img = gradient_image(64, 64);
        assert_eq!(det.detect(&img), Err(DetectError::NoFaceDetected));
    }

    #[test]
    fn primary_unavailable_backend() {
        let det = PrimaryDetector::new(Box::new(StaticFivePoint::unavailable()));
        let img = gradient_image(64, 64);
        assert_eq!(det.detect(&img), Err(DetectError::BackendUnavailable));
    }

    #[test]
    fn secondary_scales_normalized_mesh_to_pixels() {
        let mesh = face_mesh_normalized();
        let det = SecondaryDetector::new(Box::new(StaticMesh::with_mesh(mesh.clone())));
        let img = gradient_image(200, 100);

        let lm = det.detect(&img).unwrap();
        assert_eq!(lm.method, DetectorTag::Secondary);

        // Cluster centroid of the left-eye vertices, scaled by (200, 100).
        let expected: [f64; 2] = {
            let sx: f64 = LEFT_EYE_IDX.iter().map(|&i| mesh[i][0] * 200.0).sum();
            let sy: f64 = LEFT_EYE_IDX.iter().map(|&i| mesh[i][1] * 100.0).sum();
            [sx / 10.0, sy / 10.0]
        };
        assert_relative_eq!(lm.left_eye_center[0], expected[0], epsilon = 1e-9);
        assert_relative_eq!(lm.left_eye_center[1], expected[1], epsilon = 1e-9);

        // Corner vertices come through unaveraged.
        assert_relative_eq!(lm.five_points[3][0], mesh[61][0] * 200.0, epsilon = 1e-9);
        assert_relative_eq!(lm.five_points[4][0], mesh[291][0] * 200.0, epsilon = 1e-9);
    }

    #[test]
    fn secondary_rejects_short_mesh() {
        let det = SecondaryDetector::new(Box::new(StaticMesh::with_mesh(vec![[0.5, 0.5]; 100])));
        let img = gradient_image(64, 64);
        assert!(matches!(
            det.detect(&img),
            Err(DetectError::MalformedOutput(_))
        ));
    }

    #[test]
    fn detect_is_callable_from_many_threads() {
        use std::sync::Arc;

        let det = Arc::new(PrimaryDetector::new(Box::new(
            StaticFivePoint::with_keypoints(face_five_keypoints(0.0, 0.0)),
        )));
        let img = gradient_image(64, 64);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let det = Arc::clone(&det);
                let img = img.clone();
                std::thread::spawn(move || det.detect(&img).map(|lm| lm.method))
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap().unwrap(), DetectorTag::Primary);
        }
    }
}

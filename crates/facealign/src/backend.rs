//! Model seams for the two external landmark backends.
//!
//! The inference runtimes themselves (model weights, device selection,
//! thresholds) live outside this crate; the pipeline only consumes the two
//! trait contracts below. Both are allowed to be non-reentrant: the detector
//! wrappers serialize calls with a per-detector mutex.

use image::RgbImage;

/// Failure modes of a backend inference call.
///
/// "No face found" is not an error at this level; it is the `Ok(None)`
/// outcome of a successful inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend never initialized or was administratively shut down.
    Unavailable,
    /// Inference ran but produced output the wrapper cannot interpret.
    Malformed(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "backend unavailable"),
            Self::Malformed(msg) => write!(f, "malformed backend output: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Five labeled keypoints in source-image pixel coordinates, in the native
/// order of the five-point detector family:
/// left eye, right eye, nose, left mouth corner, right mouth corner.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FiveKeypoints {
    pub left_eye: [f64; 2],
    pub right_eye: [f64; 2],
    pub nose: [f64; 2],
    pub left_mouth: [f64; 2],
    pub right_mouth: [f64; 2],
}

/// Five-point landmark model (primary backend family).
///
/// Deterministic for a fixed input and configuration. `Ok(None)` means the
/// inference ran and found no face.
pub trait FivePointModel: Send {
    fn keypoints(&mut self, image: &RgbImage) -> Result<Option<FiveKeypoints>, BackendError>;
}

/// Dense face-mesh model (secondary backend family).
///
/// Returns mesh vertices in *normalized* [0, 1] image coordinates, matching
/// the mesh runtime's native convention; the detector wrapper scales them to
/// pixels. `Ok(None)` means no face.
pub trait FaceMeshModel: Send {
    fn mesh(&mut self, image: &RgbImage) -> Result<Option<Vec<[f64; 2]>>, BackendError>;
}

/// Five-point model that replays precomputed keypoints.
///
/// Used to re-apply alignment from stored detection output, and as the test
/// stand-in for a real inference runtime.
#[derive(Debug, Clone, Default)]
pub struct StaticFivePoint {
    response: Option<FiveKeypoints>,
    available: bool,
}

impl StaticFivePoint {
    /// Backend that reports the given keypoints for every image.
    pub fn with_keypoints(kp: FiveKeypoints) -> Self {
        Self { response: Some(kp), available: true }
    }

    /// Backend that finds no face in any image.
    pub fn no_face() -> Self {
        Self { response: None, available: true }
    }

    /// Backend that fails every call as unavailable.
    pub fn unavailable() -> Self {
        Self { response: None, available: false }
    }
}

impl FivePointModel for StaticFivePoint {
    fn keypoints(&mut self, _image: &RgbImage) -> Result<Option<FiveKeypoints>, BackendError> {
        if !self.available {
            return Err(BackendError::Unavailable);
        }
        Ok(self.response)
    }
}

/// Mesh model that replays a precomputed normalized mesh.
#[derive(Debug, Clone, Default)]
pub struct StaticMesh {
    response: Option<Vec<[f64; 2]>>,
    available: bool,
}

impl StaticMesh {
    /// Backend that reports the given normalized mesh for every image.
    pub fn with_mesh(mesh: Vec<[f64; 2]>) -> Self {
        Self { response: Some(mesh), available: true }
    }

    /// Backend that finds no face in any image.
    pub fn no_face() -> Self {
        Self { response: None, available: true }
    }

    /// Backend that fails every call as unavailable.
    pub fn unavailable() -> Self {
        Self { response: None, available: false }
    }
}

impl FaceMeshModel for StaticMesh {
    fn mesh(&mut self, _image: &RgbImage) -> Result<Option<Vec<[f64; 2]>>, BackendError> {
        if !self.available {
            return Err(BackendError::Unavailable);
        }
        Ok(self.response.clone())
    }
}

/// Five-point model that replays per-image keypoints, matching inputs by
/// raster equality. Images without a stored entry report no face.
///
/// This is how the CLI feeds a keypoints sidecar through the regular
/// detector chain.
#[derive(Debug, Clone)]
pub struct KeyedFivePoint {
    entries: Vec<(RgbImage, FiveKeypoints)>,
}

impl KeyedFivePoint {
    pub fn new(entries: Vec<(RgbImage, FiveKeypoints)>) -> Self {
        Self { entries }
    }
}

impl FivePointModel for KeyedFivePoint {
    fn keypoints(&mut self, image: &RgbImage) -> Result<Option<FiveKeypoints>, BackendError> {
        Ok(self
            .entries
            .iter()
            .find(|(img, _)| img == image)
            .map(|(_, kp)| *kp))
    }
}

/// Mesh model that replays per-image normalized meshes, matching inputs by
/// raster equality.
#[derive(Debug, Clone)]
pub struct KeyedMesh {
    entries: Vec<(RgbImage, Vec<[f64; 2]>)>,
}

impl KeyedMesh {
    pub fn new(entries: Vec<(RgbImage, Vec<[f64; 2]>)>) -> Self {
        Self { entries }
    }
}

impl FaceMeshModel for KeyedMesh {
    fn mesh(&mut self, image: &RgbImage) -> Result<Option<Vec<[f64; 2]>>, BackendError> {
        Ok(self
            .entries
            .iter()
            .find(|(img, _)| img == image)
            .map(|(_, mesh)| mesh.clone()))
    }
}

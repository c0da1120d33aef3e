//! facealign — landmark-consistent registration of generated face images
//! onto template geometry.
//!
//! The pipeline stages are:
//!
//! 1. **Detect** – facial landmark extraction through a fallback chain of two
//!    backends (five-point and dense-mesh), with the same backend required to
//!    succeed on both the template and the generated image.
//! 2. **Triplet** – selection of three anatomically stable correspondence
//!    points (left eye center, right eye center, mouth center).
//! 3. **Estimate** – robust least-median-of-squares fit of a similarity
//!    transform (rotation + uniform scale + translation, no shear) mapping
//!    the generated triplet onto the template triplet.
//! 4. **Warp** – inverse-mapped bilinear resampling of the generated image
//!    into a canvas with the template's exact dimensions.
//!
//! # Public API
//! - [`FaceAligner`] as the primary entry point
//! - [`FallbackDetector`] with [`PrimaryDetector`] / [`SecondaryDetector`]
//! - [`SimilarityTransform`] and the estimation routines in [`similarity`]
//! - [`AlignmentResult`] as the serializable per-call outcome

pub mod aligner;
pub mod backend;
pub mod detect;
pub mod fallback;
pub mod landmarks;
pub mod similarity;
pub mod warp;

#[cfg(test)]
pub(crate) mod test_utils;

pub use aligner::{align_with_landmarks, AlignOptions, AlignmentResult, ErrorKind, FaceAligner};
pub use backend::{BackendError, FaceMeshModel, FiveKeypoints, FivePointModel};
pub use detect::{DetectError, PrimaryDetector, SecondaryDetector};
pub use fallback::{BackendToggles, FallbackDetector, LandmarkPair, PairError};
pub use landmarks::{DetectorTag, LandmarkSet};
pub use similarity::{estimate_similarity_lmeds, SimilarityError, SimilarityTransform};
pub use warp::{warp_into_canvas, WarpError};

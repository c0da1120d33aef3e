//! End-to-end alignment orchestration.
//!
//! [`FaceAligner`] owns the lifecycle of a single alignment call: read the
//! template for its canvas size, detect a consistent landmark pair, fit the
//! similarity transform from the triplets, warp, persist. Any stage failure
//! short-circuits the rest and is encoded in the returned
//! [`AlignmentResult`]; nothing is written to disk on failure and no panic
//! crosses the `align` boundary.

use std::path::Path;

use image::RgbImage;

use crate::fallback::{BackendToggles, FallbackDetector, PairError};
use crate::landmarks::{DetectorTag, LandmarkSet};
use crate::similarity::{estimate_similarity_lmeds, SimilarityTransform};
use crate::warp::warp_into_canvas;

/// Which stage of the alignment pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// An input path did not decode to a valid raster.
    ImageUnreadable,
    /// Both detector backends were disabled for the call.
    NoBackendEnabled,
    /// No backend produced landmarks for both images.
    NoConsistentDetection,
    /// The correspondence triplets are collinear or coincident.
    DegenerateConfiguration,
    /// Resampling could not produce a canvas.
    WarpFailure,
    /// The aligned image could not be persisted.
    OutputWriteFailed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImageUnreadable => write!(f, "input image unreadable"),
            Self::NoBackendEnabled => write!(f, "no detector backend enabled"),
            Self::NoConsistentDetection => write!(f, "no consistent landmark detection"),
            Self::DegenerateConfiguration => write!(f, "degenerate correspondence points"),
            Self::WarpFailure => write!(f, "warp failed to produce a canvas"),
            Self::OutputWriteFailed => write!(f, "failed to write aligned output"),
        }
    }
}

impl std::error::Error for ErrorKind {}

/// Outcome of one alignment call. Immutable after construction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AlignmentResult {
    pub success: bool,
    /// Backend that produced both landmark sets, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<DetectorTag>,
    /// Fitted 2×3 similarity matrix (row-major), on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<[[f64; 3]; 2]>,
    /// Uniform scale of the fitted transform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    /// Rotation of the fitted transform in degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_deg: Option<f64>,
    /// Output canvas dimensions [width, height] (the template's), or [0, 0]
    /// when the template was never read.
    pub canvas_size: [u32; 2],
    /// Failing stage, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl AlignmentResult {
    fn failure(error: ErrorKind, canvas_size: [u32; 2]) -> Self {
        Self {
            success: false,
            method: None,
            transform: None,
            scale: None,
            rotation_deg: None,
            canvas_size,
            error: Some(error),
        }
    }

    fn succeeded(method: DetectorTag, t: &SimilarityTransform, canvas_size: [u32; 2]) -> Self {
        Self {
            success: true,
            method: Some(method),
            transform: Some(t.matrix_2x3()),
            scale: Some(t.scale()),
            rotation_deg: Some(t.rotation_deg()),
            canvas_size,
            error: None,
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlignOptions {
    pub toggles: BackendToggles,
}

/// Fit the triplet transform and warp `generated` onto a canvas of the given
/// size, from already-detected landmark sets.
///
/// This is the detector-free tail of the pipeline, usable on its own when
/// landmarks were produced earlier and stored.
pub fn align_with_landmarks(
    generated: &RgbImage,
    template_lm: &LandmarkSet,
    generated_lm: &LandmarkSet,
    canvas_width: u32,
    canvas_height: u32,
) -> Result<(SimilarityTransform, RgbImage), ErrorKind> {
    let transform = estimate_similarity_lmeds(&generated_lm.triplet(), &template_lm.triplet())
        .map_err(|e| {
            tracing::warn!("similarity estimation failed: {}", e);
            ErrorKind::DegenerateConfiguration
        })?;
    let canvas =
        warp_into_canvas(generated, &transform, canvas_width, canvas_height).map_err(|e| {
            tracing::warn!("warp failed: {}", e);
            ErrorKind::WarpFailure
        })?;
    Ok((transform, canvas))
}

/// Caller-owned alignment orchestrator.
///
/// Holds the fallback detector pair; model loading happens in the backends
/// before construction and is amortized across calls. The aligner itself is
/// stateless per call and can be shared across threads.
pub struct FaceAligner {
    fallback: FallbackDetector,
}

impl FaceAligner {
    pub fn new(fallback: FallbackDetector) -> Self {
        Self { fallback }
    }

    /// Align the generated image onto the template's geometry and write the
    /// result to `output_path`.
    ///
    /// Failures never panic and never leave a partial output file; the
    /// returned result records which stage failed.
    pub fn align(
        &self,
        generated_path: &Path,
        template_path: &Path,
        output_path: &Path,
        options: &AlignOptions,
    ) -> AlignmentResult {
        let template = match read_rgb(template_path) {
            Ok(img) => img,
            Err(result) => return result,
        };
        let canvas_size = [template.width(), template.height()];

        let generated = match read_rgb(generated_path) {
            Ok(img) => img,
            Err(mut result) => {
                result.canvas_size = canvas_size;
                return result;
            }
        };

        let pair = match self.fallback.detect_pair(&template, &generated, options.toggles) {
            Ok(pair) => pair,
            Err(PairError::NoBackendEnabled) => {
                return AlignmentResult::failure(ErrorKind::NoBackendEnabled, canvas_size)
            }
            Err(PairError::NoConsistentDetection) => {
                return AlignmentResult::failure(ErrorKind::NoConsistentDetection, canvas_size)
            }
        };
        tracing::info!("landmarks detected with {} backend", pair.method);

        let (transform, canvas) = match align_with_landmarks(
            &generated,
            &pair.template,
            &pair.generated,
            canvas_size[0],
            canvas_size[1],
        ) {
            Ok(out) => out,
            Err(kind) => return AlignmentResult::failure(kind, canvas_size),
        };
        tracing::info!(
            "fitted similarity: scale={:.4} rotation={:.2}deg",
            transform.scale(),
            transform.rotation_deg(),
        );

        if let Err(e) = canvas.save(output_path) {
            tracing::warn!("failed to write {}: {}", output_path.display(), e);
            return AlignmentResult::failure(ErrorKind::OutputWriteFailed, canvas_size);
        }
        tracing::info!("aligned image written to {}", output_path.display());

        AlignmentResult::succeeded(pair.method, &transform, canvas_size)
    }
}

fn read_rgb(path: &Path) -> Result<RgbImage, AlignmentResult> {
    match image::open(path) {
        Ok(img) => Ok(img.to_rgb8()),
        Err(e) => {
            tracing::warn!("failed to read {}: {}", path.display(), e);
            Err(AlignmentResult::failure(ErrorKind::ImageUnreadable, [0, 0]))
        }
    }
}

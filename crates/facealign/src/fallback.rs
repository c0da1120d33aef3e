//! Fallback chain across the two detector backends.
//!
//! A transform fitted from landmarks of two *different* detectors would fold
//! each detector's systematic geometric bias into spurious rotation and
//! scale, so a pair is only accepted when the same backend succeeds on both
//! the template and the generated image. Backend consistency is a
//! correctness invariant here, not an optimization.

use image::RgbImage;

use crate::detect::{DetectError, PrimaryDetector, SecondaryDetector};
use crate::landmarks::{DetectorTag, LandmarkSet};

/// Per-call administrative switches for the two backends.
///
/// Disabling one backend isolates the other for evaluation; disabling both
/// is rejected as an input error.
#[derive(Debug, Clone, Copy)]
pub struct BackendToggles {
    pub use_primary: bool,
    pub use_secondary: bool,
}

impl Default for BackendToggles {
    fn default() -> Self {
        Self { use_primary: true, use_secondary: true }
    }
}

/// A consistent pair of landmark sets: both produced by `method`.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkPair {
    pub template: LandmarkSet,
    pub generated: LandmarkSet,
    pub method: DetectorTag,
}

/// Failure of the whole fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairError {
    /// Both backends were toggled off for this call.
    NoBackendEnabled,
    /// No backend produced a complete template + generated pair.
    NoConsistentDetection,
}

impl std::fmt::Display for PairError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoBackendEnabled => write!(f, "both detector backends are disabled"),
            Self::NoConsistentDetection => {
                write!(f, "no backend detected a face in both images")
            }
        }
    }
}

impl std::error::Error for PairError {}

/// Composes the two detectors with a fixed fallback order.
///
/// The order (primary first, secondary only when the primary pair is
/// incomplete) is a business rule of the pipeline, not configuration.
pub struct FallbackDetector {
    primary: PrimaryDetector,
    secondary: SecondaryDetector,
}

impl FallbackDetector {
    pub fn new(primary: PrimaryDetector, secondary: SecondaryDetector) -> Self {
        Self { primary, secondary }
    }

    /// Detect landmarks on the template and generated images with the same
    /// backend.
    ///
    /// Primary is tried on both images first; if either call fails, the
    /// attempt is discarded and secondary is tried on both. Per-image
    /// failures are absorbed here and logged, never surfaced individually.
    pub fn detect_pair(
        &self,
        template: &RgbImage,
        generated: &RgbImage,
        toggles: BackendToggles,
    ) -> Result<LandmarkPair, PairError> {
        if !toggles.use_primary && !toggles.use_secondary {
            return Err(PairError::NoBackendEnabled);
        }

        if toggles.use_primary {
            match pair_attempt(
                self.primary.detect(template),
                self.primary.detect(generated),
                DetectorTag::Primary,
            ) {
                Some(pair) => return Ok(pair),
                None => tracing::debug!("primary backend did not yield a complete pair"),
            }
        }

        if toggles.use_secondary {
            match pair_attempt(
                self.secondary.detect(template),
                self.secondary.detect(generated),
                DetectorTag::Secondary,
            ) {
                Some(pair) => return Ok(pair),
                None => tracing::debug!("secondary backend did not yield a complete pair"),
            }
        }

        tracing::warn!("all detector backends exhausted without a consistent pair");
        Err(PairError::NoConsistentDetection)
    }
}

fn pair_attempt(
    template: Result<LandmarkSet, DetectError>,
    generated: Result<LandmarkSet, DetectError>,
    tag: DetectorTag,
) -> Option<LandmarkPair> {
    match (template, generated) {
        (Ok(template), Ok(generated)) => Some(LandmarkPair { template, generated, method: tag }),
        (t, g) => {
            if let Err(e) = t {
                tracing::debug!("{} backend failed on template: {}", tag, e);
            }
            if let Err(e) = g {
                tracing::debug!("{} backend failed on generated image: {}", tag, e);
            }
            None
        }
    }
}

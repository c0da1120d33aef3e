//! Shared synthetic fixtures for unit tests: deterministic rasters, a
//! five-point keypoint layout, and a mesh with plausible cluster geometry.

use image::{Rgb, RgbImage};

use crate::backend::FiveKeypoints;
use crate::landmarks::{DetectorTag, LandmarkSet};

/// Deterministic raster with distinct pixel values for resampling checks.
pub(crate) fn gradient_image(w: u32, h: u32) -> RgbImage {
    let mut img = RgbImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            img.put_pixel(
                x,
                y,
                Rgb([
                    (x * 7 % 256) as u8,
                    (y * 11 % 256) as u8,
                    ((x + y) * 3 % 256) as u8,
                ]),
            );
        }
    }
    img
}

/// Five-point layout of a synthetic upright face, optionally translated.
/// Eye midpoint sits at (100 + dx, 100 + dy), mouth center at
/// (100 + dx, 150 + dy).
pub(crate) fn face_five_keypoints(dx: f64, dy: f64) -> FiveKeypoints {
    FiveKeypoints {
        left_eye: [60.0 + dx, 100.0 + dy],
        right_eye: [140.0 + dx, 100.0 + dy],
        nose: [100.0 + dx, 120.0 + dy],
        left_mouth: [80.0 + dx, 148.0 + dy],
        right_mouth: [120.0 + dx, 152.0 + dy],
    }
}

/// Normalized 468-vertex mesh with face-like cluster geometry: eye clusters
/// around (0.3, 0.4) and (0.7, 0.4), mouth midline around (0.5, 0.75).
pub(crate) fn face_mesh_normalized() -> Vec<[f64; 2]> {
    let mut mesh = vec![[0.5, 0.5]; 468];

    let left_eye = [33usize, 133, 160, 159, 158, 157, 173, 246, 7, 163];
    let right_eye = [263usize, 362, 387, 386, 385, 384, 398, 466, 249, 390];
    for (i, &k) in left_eye.iter().enumerate() {
        mesh[k] = [0.30 + 0.004 * i as f64, 0.40 + 0.002 * i as f64];
    }
    for (i, &k) in right_eye.iter().enumerate() {
        mesh[k] = [0.70 - 0.004 * i as f64, 0.40 + 0.002 * i as f64];
    }
    mesh[13] = [0.50, 0.73];
    mesh[14] = [0.50, 0.77];
    mesh[0] = [0.50, 0.75];
    mesh[61] = [0.40, 0.75];
    mesh[291] = [0.60, 0.75];
    mesh
}

/// A well-formed landmark set for the synthetic face.
pub(crate) fn landmark_set(method: DetectorTag) -> LandmarkSet {
    shifted_landmark_set(method, 0.0, 0.0)
}

/// The synthetic face's landmark set translated by (dx, dy).
pub(crate) fn shifted_landmark_set(method: DetectorTag, dx: f64, dy: f64) -> LandmarkSet {
    LandmarkSet {
        left_eye_center: [60.0 + dx, 100.0 + dy],
        right_eye_center: [140.0 + dx, 100.0 + dy],
        mouth_center: [100.0 + dx, 150.0 + dy],
        five_points: [
            [60.0 + dx, 100.0 + dy],
            [140.0 + dx, 100.0 + dy],
            [100.0 + dx, 100.0 + dy],
            [80.0 + dx, 148.0 + dy],
            [120.0 + dx, 152.0 + dy],
        ],
        method,
    }
}

//! Inverse-mapped bilinear resampling onto the template canvas.

use image::{Rgb, RgbImage};

use crate::similarity::SimilarityTransform;

/// Resampling failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarpError {
    /// Canvas has zero width or height.
    EmptyCanvas,
    /// Transform has no inverse (numerically zero scale).
    NonInvertible,
}

impl std::fmt::Display for WarpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCanvas => write!(f, "canvas has zero area"),
            Self::NonInvertible => write!(f, "transform is not invertible"),
        }
    }
}

impl std::error::Error for WarpError {}

/// Sample an RGB image at a sub-pixel position using bilinear interpolation.
/// Returns `None` when the position falls outside the image; the 2×2 support
/// is clamped at the far edge so positions on the last row or column resolve
/// to the edge pixels instead of dropping out.
#[inline]
fn bilinear_sample_rgb(img: &RgbImage, x: f64, y: f64) -> Option<[u8; 3]> {
    let (w, h) = img.dimensions();
    if x < 0.0 || y < 0.0 {
        return None;
    }
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    if x0 >= w || y0 >= h {
        return None;
    }
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - f64::from(x0);
    let fy = y - f64::from(y0);
    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for (c, o) in out.iter_mut().enumerate() {
        let v = (1.0 - fx) * (1.0 - fy) * f64::from(p00[c])
            + fx * (1.0 - fy) * f64::from(p10[c])
            + (1.0 - fx) * fy * f64::from(p01[c])
            + fx * fy * f64::from(p11[c]);
        *o = v.round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}

/// Resample `generated` through the inverse of `transform` into a freshly
/// allocated canvas of exactly `canvas_width` × `canvas_height` (the
/// template's dimensions).
///
/// Canvas pixels whose source position falls outside the generated image's
/// extent are filled with black. The input image is never mutated.
pub fn warp_into_canvas(
    generated: &RgbImage,
    transform: &SimilarityTransform,
    canvas_width: u32,
    canvas_height: u32,
) -> Result<RgbImage, WarpError> {
    if canvas_width == 0 || canvas_height == 0 {
        return Err(WarpError::EmptyCanvas);
    }
    let inverse = transform.try_inverse().ok_or(WarpError::NonInvertible)?;

    let mut canvas = RgbImage::new(canvas_width, canvas_height);
    for y in 0..canvas_height {
        for x in 0..canvas_width {
            let src = inverse.apply([f64::from(x), f64::from(y)]);
            if let Some(px) = bilinear_sample_rgb(generated, src[0], src[1]) {
                canvas.put_pixel(x, y, Rgb(px));
            }
        }
    }
    Ok(canvas)
}

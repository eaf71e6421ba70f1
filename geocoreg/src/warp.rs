//! Resampling of multi-channel images through a [`Transform`].
//!
//! Images are `(y, x, band)` arrays. Every output pixel `p` takes the source
//! value at `transform.apply(p)`; positions outside the source get the
//! configured border value. The same geometry is applied to every channel.

use glam::DVec2;
use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewMut2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::transform::Transform;

/// Interpolation method for resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMethod {
    /// Nearest neighbor. Keeps original values, suited to masks and class maps.
    Nearest,
    /// Bilinear interpolation.
    #[default]
    Bilinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    pub method: InterpolationMethod,
    /// Value written where the transform maps outside the source image.
    pub border_value: f32,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            method: InterpolationMethod::Bilinear,
            border_value: 0.0,
        }
    }
}

/// Warp `image` so that it lines up with the frame `transform` is expressed in.
///
/// The output has the same shape as the input. An identity transform returns an
/// exact copy of the input.
pub fn warp_image(
    image: ArrayView3<'_, f32>,
    transform: &Transform,
    config: &WarpConfig,
) -> Array3<f32> {
    if transform.is_identity() {
        return image.to_owned();
    }

    let mut output = Array3::<f32>::zeros(image.raw_dim());
    output
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, row)| warp_row(image, row, y, transform, config));

    output
}

fn warp_row(
    image: ArrayView3<'_, f32>,
    mut row: ArrayViewMut2<'_, f32>,
    y: usize,
    transform: &Transform,
    config: &WarpConfig,
) {
    for (x, mut pixel) in row.axis_iter_mut(Axis(0)).enumerate() {
        let src = transform.apply(DVec2::new(x as f64, y as f64));
        for (band, value) in pixel.iter_mut().enumerate() {
            let plane = image.index_axis(Axis(2), band);
            *value = match config.method {
                InterpolationMethod::Nearest => {
                    interpolate_nearest(plane, src.x, src.y, config.border_value)
                }
                InterpolationMethod::Bilinear => {
                    interpolate_bilinear(plane, src.x, src.y, config.border_value)
                }
            };
        }
    }
}

#[inline]
fn sample_pixel(plane: ArrayView2<'_, f32>, x: i64, y: i64, border: f32) -> f32 {
    let (height, width) = plane.dim();
    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
        border
    } else {
        plane[[y as usize, x as usize]]
    }
}

#[inline]
fn interpolate_nearest(plane: ArrayView2<'_, f32>, x: f64, y: f64, border: f32) -> f32 {
    sample_pixel(plane, x.round() as i64, y.round() as i64, border)
}

#[inline]
fn interpolate_bilinear(plane: ArrayView2<'_, f32>, x: f64, y: f64, border: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = (x - x0) as f32;
    let fy = (y - y0) as f32;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let p00 = sample_pixel(plane, x0, y0, border);
    // Exact grid positions never read the neighbour, so the last row and
    // column stay inside the image.
    if fx == 0.0 && fy == 0.0 {
        return p00;
    }
    let p10 = sample_pixel(plane, x0 + 1, y0, border);
    let p01 = sample_pixel(plane, x0, y0 + 1, border);
    let p11 = sample_pixel(plane, x0 + 1, y0 + 1, border);

    let top = p00 + fx * (p10 - p00);
    let bottom = p01 + fx * (p11 - p01);

    top + fy * (bottom - top)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 5 x 6 image with two channels: `10*y + x` and its negation.
    fn gradient_image() -> Array3<f32> {
        Array3::from_shape_fn((5, 6, 2), |(y, x, b)| {
            let v = (10 * y + x) as f32;
            if b == 0 { v } else { -v }
        })
    }

    #[test]
    fn test_identity_is_exact_copy() {
        let image = Array3::from_shape_fn((4, 4, 3), |(y, x, b)| {
            (y as f32 * 0.1).sin() + x as f32 * 1e-7 + b as f32
        });
        let warped = warp_image(image.view(), &Transform::identity(), &WarpConfig::default());
        assert_eq!(warped, image);
    }

    #[test]
    fn test_integer_translation_shifts_every_channel() {
        let image = gradient_image();
        let transform = Transform::translation(DVec2::new(1.0, 2.0));
        let warped = warp_image(image.view(), &transform, &WarpConfig::default());

        assert_eq!(warped.dim(), image.dim());
        // Output (y=0, x=0) samples source (y=2, x=1).
        assert_eq!(warped[[0, 0, 0]], 21.0);
        assert_eq!(warped[[0, 0, 1]], -21.0);
        assert_eq!(warped[[2, 4, 0]], 45.0);
        // Rows beyond the source get the border value.
        assert_eq!(warped[[4, 0, 0]], 0.0);
        assert_eq!(warped[[0, 5, 1]], 0.0);
    }

    #[test]
    fn test_half_pixel_bilinear() {
        let image = gradient_image();
        let transform = Transform::translation(DVec2::new(0.5, 0.0));
        let warped = warp_image(image.view(), &transform, &WarpConfig::default());
        assert!((warped[[1, 2, 0]] - 12.5).abs() < 1e-5);
        assert!((warped[[1, 2, 1]] + 12.5).abs() < 1e-5);
    }

    #[test]
    fn test_nearest_and_border_value() {
        let image = gradient_image();
        let config = WarpConfig {
            method: InterpolationMethod::Nearest,
            border_value: f32::NAN,
        };
        let transform = Transform::translation(DVec2::new(-0.4, 0.6));
        let warped = warp_image(image.view(), &transform, &config);

        assert_eq!(warped[[0, 1, 0]], 11.0);
        assert!(warped[[4, 0, 0]].is_nan());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: WarpConfig = serde_json::from_str(r#"{"border_value": -1.0}"#).unwrap();
        assert_eq!(config.method, InterpolationMethod::Bilinear);
        assert_eq!(config.border_value, -1.0);

        let config: WarpConfig = serde_json::from_str(r#"{"method": "Nearest"}"#).unwrap();
        assert_eq!(config.method, InterpolationMethod::Nearest);
        assert_eq!(config.border_value, 0.0);
    }
}

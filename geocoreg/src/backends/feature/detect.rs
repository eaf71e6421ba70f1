//! Harris corner detection and patch descriptors.

use glam::DVec2;
use ndarray::{s, Array2, ArrayView2};

use super::FeatureConfig;

/// A detected corner with its normalized patch descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Keypoint {
    /// Pixel position `(x, y)`.
    pub position: DVec2,
    pub response: f32,
    /// Zero-mean, unit-norm patch around the corner, row-major.
    pub descriptor: Vec<f32>,
}

/// Detect up to `config.max_features` corners, strongest first.
///
/// Corners closer to the border than the patch radius are skipped so every
/// keypoint has a complete descriptor.
pub fn detect_keypoints(plane: &Array2<f32>, config: &FeatureConfig) -> Vec<Keypoint> {
    let (height, width) = plane.dim();
    let margin = config.patch_radius.max(config.nms_radius) + 1;
    if height <= 2 * margin || width <= 2 * margin {
        return Vec::new();
    }

    let response = harris_response(plane.view(), config.harris_k);
    let max_response = response.iter().copied().fold(0.0f32, f32::max);
    if max_response <= 0.0 {
        return Vec::new();
    }
    let threshold = max_response * config.min_response_ratio;

    let r = config.nms_radius;
    let mut candidates: Vec<(usize, usize, f32)> = Vec::new();
    for y in margin..height - margin {
        for x in margin..width - margin {
            let v = response[[y, x]];
            if v < threshold {
                continue;
            }
            let window = response.slice(s![y - r..=y + r, x - r..=x + r]);
            // Ties keep the first maximum in row-major order.
            let is_max = window.indexed_iter().all(|((wy, wx), &w)| {
                let (ny, nx) = (y - r + wy, x - r + wx);
                w < v || (w == v && (ny, nx) >= (y, x))
            });
            if is_max {
                candidates.push((y, x, v));
            }
        }
    }

    candidates.sort_by(|a, b| b.2.total_cmp(&a.2).then((a.0, a.1).cmp(&(b.0, b.1))));
    candidates.truncate(config.max_features);

    candidates
        .into_iter()
        .filter_map(|(y, x, response)| {
            let descriptor = patch_descriptor(plane.view(), y, x, config.patch_radius)?;
            Some(Keypoint {
                position: DVec2::new(x as f64, y as f64),
                response,
                descriptor,
            })
        })
        .collect()
}

/// Harris corner measure `det(M) - k * trace(M)^2` over a 3x3 window of the
/// structure tensor `M`.
pub(crate) fn harris_response(plane: ArrayView2<'_, f32>, k: f32) -> Array2<f32> {
    let (height, width) = plane.dim();
    let mut ixx = Array2::<f32>::zeros((height, width));
    let mut iyy = Array2::<f32>::zeros((height, width));
    let mut ixy = Array2::<f32>::zeros((height, width));

    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let gx = 0.5 * (plane[[y, x + 1]] - plane[[y, x - 1]]);
            let gy = 0.5 * (plane[[y + 1, x]] - plane[[y - 1, x]]);
            ixx[[y, x]] = gx * gx;
            iyy[[y, x]] = gy * gy;
            ixy[[y, x]] = gx * gy;
        }
    }

    let mut response = Array2::<f32>::zeros((height, width));
    for y in 2..height.saturating_sub(2) {
        for x in 2..width.saturating_sub(2) {
            let window = s![y - 1..=y + 1, x - 1..=x + 1];
            let a = ixx.slice(window).sum();
            let b = iyy.slice(window).sum();
            let c = ixy.slice(window).sum();
            let trace = a + b;
            response[[y, x]] = a * b - c * c - k * trace * trace;
        }
    }
    response
}

/// `None` for patches without contrast.
fn patch_descriptor(
    plane: ArrayView2<'_, f32>,
    y: usize,
    x: usize,
    radius: usize,
) -> Option<Vec<f32>> {
    let patch = plane.slice(s![y - radius..=y + radius, x - radius..=x + radius]);
    let mean = patch.mean()?;
    let mut descriptor: Vec<f32> = patch.iter().map(|&v| v - mean).collect();
    let norm = descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= 1e-6 {
        return None;
    }
    descriptor.iter_mut().for_each(|v| *v /= norm);
    Some(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dark background with bright axis-aligned squares.
    fn squares() -> Array2<f32> {
        let mut plane = Array2::<f32>::zeros((48, 48));
        plane.slice_mut(s![10..20, 10..20]).fill(1.0);
        plane.slice_mut(s![28..40, 26..36]).fill(1.0);
        plane
    }

    #[test]
    fn test_harris_fires_on_corners_not_edges() {
        let response = harris_response(squares().view(), 0.04);
        let corner = response[[10, 10]].max(response[[9, 9]]);
        let edge = response[[15, 10]];
        let flat = response[[15, 15]];
        assert!(corner > 0.0);
        assert!(edge <= 0.0, "edge response {edge}");
        assert_eq!(flat, 0.0);
    }

    #[test]
    fn test_detect_finds_square_corners() {
        let config = FeatureConfig::default();
        let keypoints = detect_keypoints(&squares(), &config);

        // Two squares, four corners each.
        let positions: Vec<_> = keypoints.iter().map(|k| k.position).collect();
        assert_eq!(keypoints.len(), 8, "{positions:?}");
        for pair in keypoints.windows(2) {
            assert!(pair[0].response >= pair[1].response);
        }
        let len = (2 * config.patch_radius + 1).pow(2);
        assert!(keypoints.iter().all(|k| k.descriptor.len() == len));
    }

    #[test]
    fn test_flat_plane_has_no_keypoints() {
        let plane = Array2::<f32>::from_elem((32, 32), 0.5);
        assert!(detect_keypoints(&plane, &FeatureConfig::default()).is_empty());
    }

    #[test]
    fn test_descriptor_is_normalized() {
        let plane = squares();
        let descriptor = patch_descriptor(plane.view(), 10, 10, 3).unwrap();
        let norm: f32 = descriptor.iter().map(|v| v * v).sum();
        let mean: f32 = descriptor.iter().sum::<f32>() / descriptor.len() as f32;
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(mean.abs() < 1e-5);
    }
}

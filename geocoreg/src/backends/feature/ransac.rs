//! RANSAC (Random Sample Consensus) over matched keypoints.
//!
//! 1. Sample a minimal set of correspondences
//! 2. Fit a candidate transform
//! 3. Count correspondences within the inlier threshold
//! 4. Refine promising candidates on their inliers (LO-RANSAC)
//! 5. Refit the best model by least squares on all of its inliers

use glam::DVec2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AlignmentError, RansacFailureReason};
use crate::transform::{Transform, TransformType};

/// RANSAC configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    pub max_iterations: usize,
    /// Inlier distance threshold in pixels.
    pub inlier_threshold: f64,
    /// Target confidence for early termination.
    pub confidence: f64,
    /// Minimum inlier ratio to accept a model.
    pub min_inlier_ratio: f64,
    /// Random seed. `None` draws one from the thread RNG, making runs irreproducible.
    pub seed: Option<u64>,
    pub use_local_optimization: bool,
    pub lo_max_iterations: usize,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            inlier_threshold: 2.0,
            confidence: 0.999,
            min_inlier_ratio: 0.3,
            seed: Some(0x5EED_C0DE),
            use_local_optimization: true,
            lo_max_iterations: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RansacResult {
    pub transform: Transform,
    /// Indices of inlier correspondences.
    pub inliers: Vec<usize>,
    pub iterations: usize,
    pub inlier_ratio: f64,
}

pub struct RansacEstimator {
    config: RansacConfig,
}

impl RansacEstimator {
    pub fn new(config: RansacConfig) -> Self {
        Self { config }
    }

    /// Fit `transform_type` so that `transform.apply(ref_points[i]) ≈ target_points[i]`.
    pub fn estimate(
        &self,
        ref_points: &[DVec2],
        target_points: &[DVec2],
        transform_type: TransformType,
    ) -> Result<RansacResult, AlignmentError> {
        debug_assert_eq!(ref_points.len(), target_points.len());
        let n = ref_points.len();
        let min_samples = transform_type.min_points();

        if n < min_samples {
            return Err(AlignmentError::InsufficientMatches {
                found: n,
                required: min_samples,
            });
        }

        let mut rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };

        let threshold_sq = self.config.inlier_threshold * self.config.inlier_threshold;
        let mut best: Option<(Transform, Vec<usize>)> = None;

        let mut sample_indices: Vec<usize> = Vec::with_capacity(min_samples);
        let mut sample_ref: Vec<DVec2> = Vec::with_capacity(min_samples);
        let mut sample_target: Vec<DVec2> = Vec::with_capacity(min_samples);

        let mut iterations = 0;
        while iterations < self.config.max_iterations {
            iterations += 1;

            random_sample_into(&mut rng, n, min_samples, &mut sample_indices);
            sample_ref.clear();
            sample_target.clear();
            for &i in &sample_indices {
                sample_ref.push(ref_points[i]);
                sample_target.push(target_points[i]);
            }

            let Some(mut transform) =
                estimate_transform(&sample_ref, &sample_target, transform_type)
            else {
                continue;
            };
            let mut inliers = count_inliers(ref_points, target_points, &transform, threshold_sq);

            if self.config.use_local_optimization && inliers.len() >= min_samples {
                (transform, inliers) = self.local_optimization(
                    ref_points,
                    target_points,
                    transform,
                    inliers,
                    transform_type,
                    threshold_sq,
                );
            }

            let best_count = best.as_ref().map_or(0, |(_, b)| b.len());
            if inliers.len() > best_count {
                let inlier_ratio = inliers.len() as f64 / n as f64;
                best = Some((transform, inliers));

                if inlier_ratio >= self.config.min_inlier_ratio {
                    let adaptive_max =
                        adaptive_iterations(inlier_ratio, min_samples, self.config.confidence);
                    if iterations >= adaptive_max {
                        break;
                    }
                }
            }
        }

        let Some((transform, inliers)) = best.filter(|(_, inliers)| !inliers.is_empty()) else {
            return Err(AlignmentError::RansacFailed {
                reason: RansacFailureReason::NoInliersFound,
                iterations,
                best_inlier_count: 0,
            });
        };

        let inlier_ratio = inliers.len() as f64 / n as f64;
        if inliers.len() < min_samples || inlier_ratio < self.config.min_inlier_ratio {
            return Err(AlignmentError::RansacFailed {
                reason: RansacFailureReason::InsufficientInliers,
                iterations,
                best_inlier_count: inliers.len(),
            });
        }

        let (inlier_ref, inlier_target) = gather(ref_points, target_points, &inliers);
        let refined =
            estimate_transform(&inlier_ref, &inlier_target, transform_type).unwrap_or(transform);
        let final_inliers = count_inliers(ref_points, target_points, &refined, threshold_sq);
        let inlier_ratio = final_inliers.len() as f64 / n as f64;

        Ok(RansacResult {
            transform: refined,
            inliers: final_inliers,
            iterations,
            inlier_ratio,
        })
    }

    /// Refit on the current inliers until the inlier set stops growing.
    fn local_optimization(
        &self,
        ref_points: &[DVec2],
        target_points: &[DVec2],
        mut transform: Transform,
        mut inliers: Vec<usize>,
        transform_type: TransformType,
        threshold_sq: f64,
    ) -> (Transform, Vec<usize>) {
        for _ in 0..self.config.lo_max_iterations {
            let (inlier_ref, inlier_target) = gather(ref_points, target_points, &inliers);
            let Some(refined) = estimate_transform(&inlier_ref, &inlier_target, transform_type)
            else {
                break;
            };

            let new_inliers = count_inliers(ref_points, target_points, &refined, threshold_sq);
            if new_inliers.len() <= inliers.len() {
                break;
            }
            transform = refined;
            inliers = new_inliers;
        }
        (transform, inliers)
    }
}

fn gather(
    ref_points: &[DVec2],
    target_points: &[DVec2],
    indices: &[usize],
) -> (Vec<DVec2>, Vec<DVec2>) {
    indices
        .iter()
        .map(|&i| (ref_points[i], target_points[i]))
        .unzip()
}

/// Sample `k` distinct indices from `0..n` (Floyd's algorithm for small `k`).
fn random_sample_into<R: Rng>(rng: &mut R, n: usize, k: usize, buffer: &mut Vec<usize>) {
    debug_assert!(k <= n, "Cannot sample {} indices from {}", k, n);
    buffer.clear();

    if k <= n / 2 {
        for j in (n - k)..n {
            let t = rng.random_range(0..=j);
            if buffer.contains(&t) {
                buffer.push(j);
            } else {
                buffer.push(t);
            }
        }
    } else {
        buffer.extend(0..n);
        buffer.shuffle(rng);
        buffer.truncate(k);
    }
}

fn count_inliers(
    ref_points: &[DVec2],
    target_points: &[DVec2],
    transform: &Transform,
    threshold_sq: f64,
) -> Vec<usize> {
    ref_points
        .iter()
        .zip(target_points)
        .enumerate()
        .filter(|(_, (r, t))| transform.apply(**r).distance_squared(**t) <= threshold_sq)
        .map(|(i, _)| i)
        .collect()
}

/// Iterations needed to draw one all-inlier sample with the given confidence.
pub(crate) fn adaptive_iterations(inlier_ratio: f64, sample_size: usize, confidence: f64) -> usize {
    if inlier_ratio <= 0.0 || inlier_ratio >= 1.0 {
        return 1;
    }

    // N = log(1 - confidence) / log(1 - w^n)
    let w_n = inlier_ratio.powi(sample_size as i32);
    let log_conf = (1.0 - confidence).ln();
    let log_outlier = (1.0 - w_n).ln();

    if log_outlier >= 0.0 {
        return 1000;
    }

    (log_conf / log_outlier).ceil() as usize
}

pub(crate) fn estimate_transform(
    ref_points: &[DVec2],
    target_points: &[DVec2],
    transform_type: TransformType,
) -> Option<Transform> {
    let transform = match transform_type {
        TransformType::Translation => estimate_translation(ref_points, target_points),
        TransformType::Euclidean => estimate_rotation(ref_points, target_points, false),
        TransformType::Similarity => estimate_rotation(ref_points, target_points, true),
        TransformType::Affine => estimate_affine(ref_points, target_points),
    }?;
    transform.is_finite().then_some(transform)
}

/// Mean displacement.
fn estimate_translation(ref_points: &[DVec2], target_points: &[DVec2]) -> Option<Transform> {
    if ref_points.is_empty() {
        return None;
    }
    let sum: DVec2 = ref_points
        .iter()
        .zip(target_points)
        .map(|(r, t)| *t - *r)
        .sum();
    Some(Transform::translation(sum / ref_points.len() as f64))
}

/// Procrustes fit of rotation (and uniform scale when `with_scale`) plus translation.
fn estimate_rotation(
    ref_points: &[DVec2],
    target_points: &[DVec2],
    with_scale: bool,
) -> Option<Transform> {
    if ref_points.len() < 2 {
        return None;
    }

    let ref_centroid = centroid(ref_points);
    let tar_centroid = centroid(target_points);

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syx = 0.0;
    let mut syy = 0.0;
    let mut ref_var = 0.0;
    for (r, t) in ref_points.iter().zip(target_points) {
        let rc = *r - ref_centroid;
        let tc = *t - tar_centroid;
        sxx += rc.x * tc.x;
        sxy += rc.x * tc.y;
        syx += rc.y * tc.x;
        syy += rc.y * tc.y;
        ref_var += rc.length_squared();
    }

    if ref_var < 1e-10 {
        return None;
    }

    let angle = (sxy - syx).atan2(sxx + syy);
    let (sin_a, cos_a) = angle.sin_cos();
    let scale = if with_scale {
        ((sxx + syy) * cos_a + (sxy - syx) * sin_a) / ref_var
    } else {
        1.0
    };
    if scale <= 0.0 {
        return None;
    }

    let t = DVec2::new(
        tar_centroid.x - scale * (cos_a * ref_centroid.x - sin_a * ref_centroid.y),
        tar_centroid.y - scale * (sin_a * ref_centroid.x + cos_a * ref_centroid.y),
    );

    Some(if with_scale {
        Transform::similarity(t, angle, scale)
    } else {
        Transform::euclidean(t, angle)
    })
}

/// Least-squares affine fit via the 3x3 normal equations, solved once per
/// target coordinate.
fn estimate_affine(ref_points: &[DVec2], target_points: &[DVec2]) -> Option<Transform> {
    if ref_points.len() < 3 {
        return None;
    }

    let n = ref_points.len() as f64;
    let (mut sx, mut sy, mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    let (mut stx, mut sty, mut sx_tx, mut sy_tx, mut sx_ty, mut sy_ty) =
        (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);

    for (r, t) in ref_points.iter().zip(target_points) {
        sx += r.x;
        sy += r.y;
        sxx += r.x * r.x;
        sxy += r.x * r.y;
        syy += r.y * r.y;
        stx += t.x;
        sty += t.y;
        sx_tx += r.x * t.x;
        sy_tx += r.y * t.x;
        sx_ty += r.x * t.y;
        sy_ty += r.y * t.y;
    }

    // | sxx sxy sx |
    // | sxy syy sy |
    // | sx  sy  n  |
    let normal = glam::DMat3::from_cols(
        glam::DVec3::new(sxx, sxy, sx),
        glam::DVec3::new(sxy, syy, sy),
        glam::DVec3::new(sx, sy, n),
    );
    if normal.determinant().abs() < 1e-10 {
        return None;
    }
    let inv = normal.inverse();

    let row_x = inv * glam::DVec3::new(sx_tx, sy_tx, stx);
    let row_y = inv * glam::DVec3::new(sx_ty, sy_ty, sty);

    Some(Transform::affine([
        row_x.x, row_x.y, row_x.z, row_y.x, row_y.y, row_y.z,
    ]))
}

fn centroid(points: &[DVec2]) -> DVec2 {
    if points.is_empty() {
        return DVec2::ZERO;
    }
    points.iter().copied().sum::<DVec2>() / points.len() as f64
}

//! Feature matching ("feature") backend.
//!
//! Corners are detected on the channel-mean plane of each image, described by
//! normalized patches and matched mutually with a ratio test. RANSAC then fits
//! the configured transform model from reference keypoints to source keypoints.

pub mod detect;
pub mod matching;
pub mod ransac;


use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};

use super::{check_shapes, check_variance, mean_plane};
use crate::error::{AlignmentError, ArrayRole};
use crate::registrator::Aligner;
use crate::transform::{Transform, TransformType};
use crate::warp::{warp_image, WarpConfig};

pub use detect::{detect_keypoints, Keypoint};
pub use matching::{match_keypoints, FeatureMatch};
pub use ransac::{RansacConfig, RansacEstimator, RansacResult};

/// Configuration for corner detection and matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Strongest corners kept per image.
    pub max_features: usize,
    /// Harris sensitivity `k`.
    pub harris_k: f32,
    /// Corners weaker than this fraction of the strongest response are ignored.
    pub min_response_ratio: f32,
    /// Non-maximum suppression radius in pixels.
    pub nms_radius: usize,
    /// Descriptor patch radius; patches are `(2r + 1)^2` pixels.
    pub patch_radius: usize,
    /// Lowe's ratio test bound.
    pub match_ratio: f32,
    /// Keypoints and matches required before RANSAC runs.
    pub min_matches: usize,
    pub transform_type: TransformType,
    pub ransac: RansacConfig,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_features: 500,
            harris_k: 0.04,
            min_response_ratio: 0.01,
            nms_radius: 3,
            patch_radius: 4,
            match_ratio: 0.8,
            min_matches: 4,
            transform_type: TransformType::Similarity,
            ransac: RansacConfig::default(),
        }
    }
}

/// Aligner registered as `"feature"`.
#[derive(Debug, Clone, Default)]
pub struct FeatureMatching {
    pub config: FeatureConfig,
    pub warp: WarpConfig,
}

impl FeatureMatching {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            warp: WarpConfig::default(),
        }
    }

    pub fn with_warp(mut self, warp: WarpConfig) -> Self {
        self.warp = warp;
        self
    }
}

impl Aligner for FeatureMatching {
    fn name(&self) -> &str {
        "feature"
    }

    fn estimate(
        &self,
        source: ArrayView3<'_, f32>,
        reference: ArrayView3<'_, f32>,
    ) -> Result<Transform, AlignmentError> {
        check_shapes(&source, &reference)?;
        let config = &self.config;

        let reference_plane = mean_plane(&reference);
        let source_plane = mean_plane(&source);
        check_variance(&reference_plane, ArrayRole::Reference)?;
        check_variance(&source_plane, ArrayRole::Source)?;

        let required = config.min_matches.max(config.transform_type.min_points());

        let reference_kps = detect_keypoints(&reference_plane, config);
        if reference_kps.len() < required {
            return Err(AlignmentError::InsufficientFeatures {
                image: ArrayRole::Reference,
                found: reference_kps.len(),
                required,
            });
        }
        let source_kps = detect_keypoints(&source_plane, config);
        if source_kps.len() < required {
            return Err(AlignmentError::InsufficientFeatures {
                image: ArrayRole::Source,
                found: source_kps.len(),
                required,
            });
        }

        let matches = match_keypoints(&source_kps, &reference_kps, config.match_ratio);
        if matches.len() < required {
            return Err(AlignmentError::InsufficientMatches {
                found: matches.len(),
                required,
            });
        }

        let (ref_points, source_points): (Vec<_>, Vec<_>) = matches
            .iter()
            .map(|m| {
                (
                    reference_kps[m.reference_idx].position,
                    source_kps[m.source_idx].position,
                )
            })
            .unzip();

        let result = RansacEstimator::new(config.ransac.clone()).estimate(
            &ref_points,
            &source_points,
            config.transform_type,
        )?;

        tracing::debug!(
            reference_keypoints = reference_kps.len(),
            source_keypoints = source_kps.len(),
            matches = matches.len(),
            inliers = result.inliers.len(),
            iterations = result.iterations,
            transform = %result.transform,
            "Feature matching"
        );

        Ok(result.transform)
    }

    fn apply(&self, transform: &Transform, image: ArrayView3<'_, f32>) -> Array3<f32> {
        warp_image(image, transform, &self.warp)
    }
}

//! 2D alignment transforms.
//!
//! A [`Transform`] maps pixel coordinates in the reference frame to pixel
//! coordinates in the image being aligned. Warping samples the source image at
//! the mapped position, so the warped result lines up with the reference.

use std::fmt;

use glam::{DMat3, DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// Maximum per-element deviation from the identity matrix still treated as identity.
const IDENTITY_TOLERANCE: f64 = 1e-9;

/// Supported transformation models with increasing degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransformType {
    /// Translation only (2 DOF: dx, dy)
    #[default]
    Translation,
    /// Translation + Rotation (3 DOF: dx, dy, angle)
    Euclidean,
    /// Translation + Rotation + Uniform Scale (4 DOF)
    Similarity,
    /// Full affine (6 DOF: handles differential scaling and shear)
    Affine,
}

impl TransformType {
    /// Minimum number of point correspondences required to estimate this transform.
    pub fn min_points(&self) -> usize {
        match self {
            TransformType::Translation => 1,
            TransformType::Euclidean => 2,
            TransformType::Similarity => 2,
            TransformType::Affine => 3,
        }
    }

    pub fn degrees_of_freedom(&self) -> usize {
        match self {
            TransformType::Translation => 2,
            TransformType::Euclidean => 3,
            TransformType::Similarity => 4,
            TransformType::Affine => 6,
        }
    }
}

/// Affine 3x3 homogeneous transform.
///
/// ```text
/// | a  b  tx |
/// | c  d  ty |
/// | 0  0  1  |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub matrix: DMat3,
    pub transform_type: TransformType,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation_components();
        let rotation_deg = self.rotation_angle().to_degrees();
        let scale = self.scale_factor();

        match self.transform_type {
            TransformType::Translation => {
                write!(f, "Translation(dx={:.2}, dy={:.2})", t.x, t.y)
            }
            TransformType::Euclidean => write!(
                f,
                "Euclidean(dx={:.2}, dy={:.2}, rot={:.3}°)",
                t.x, t.y, rotation_deg
            ),
            TransformType::Similarity => write!(
                f,
                "Similarity(dx={:.2}, dy={:.2}, rot={:.3}°, scale={:.4})",
                t.x, t.y, rotation_deg, scale
            ),
            TransformType::Affine => write!(
                f,
                "Affine(dx={:.2}, dy={:.2}, rot={:.3}°, scale={:.4})",
                t.x, t.y, rotation_deg, scale
            ),
        }
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            matrix: DMat3::IDENTITY,
            transform_type: TransformType::Translation,
        }
    }

    pub fn translation(t: DVec2) -> Self {
        Self::from_params([1.0, 0.0, t.x, 0.0, 1.0, t.y], TransformType::Translation)
    }

    pub fn euclidean(t: DVec2, angle: f64) -> Self {
        let (sin_a, cos_a) = angle.sin_cos();
        Self::from_params(
            [cos_a, -sin_a, t.x, sin_a, cos_a, t.y],
            TransformType::Euclidean,
        )
    }

    pub fn similarity(t: DVec2, angle: f64, scale: f64) -> Self {
        let (sin_a, cos_a) = angle.sin_cos();
        Self::from_params(
            [
                cos_a * scale,
                -sin_a * scale,
                t.x,
                sin_a * scale,
                cos_a * scale,
                t.y,
            ],
            TransformType::Similarity,
        )
    }

    /// Affine transform from `[a, b, tx, c, d, ty]`.
    pub fn affine(params: [f64; 6]) -> Self {
        Self::from_params(params, TransformType::Affine)
    }

    fn from_params(p: [f64; 6], transform_type: TransformType) -> Self {
        Self {
            matrix: DMat3::from_cols(
                DVec3::new(p[0], p[3], 0.0),
                DVec3::new(p[1], p[4], 0.0),
                DVec3::new(p[2], p[5], 1.0),
            ),
            transform_type,
        }
    }

    /// Map a reference-frame point into the aligned image's frame.
    #[inline]
    pub fn apply(&self, p: DVec2) -> DVec2 {
        self.matrix.transform_point2(p)
    }

    /// `None` for singular matrices.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.matrix.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return None;
        }
        Some(Self {
            matrix: self.matrix.inverse(),
            transform_type: self.transform_type,
        })
    }

    /// `self ∘ other`: applies `other` first.
    pub fn compose(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
            transform_type: self.transform_type.max_by_dof(other.transform_type),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.matrix
            .abs_diff_eq(DMat3::IDENTITY, IDENTITY_TOLERANCE)
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.is_finite()
    }

    pub fn translation_components(&self) -> DVec2 {
        self.matrix.z_axis.truncate()
    }

    pub fn rotation_angle(&self) -> f64 {
        self.matrix.x_axis.y.atan2(self.matrix.x_axis.x)
    }

    /// Geometric mean of the axis scales.
    pub fn scale_factor(&self) -> f64 {
        let det = self.matrix.x_axis.x * self.matrix.y_axis.y
            - self.matrix.y_axis.x * self.matrix.x_axis.y;
        det.abs().sqrt()
    }
}

impl TransformType {
    fn max_by_dof(self, other: TransformType) -> TransformType {
        if other.degrees_of_freedom() > self.degrees_of_freedom() {
            other
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-10;

    #[test]
    fn test_identity() {
        let t = Transform::identity();
        assert!(t.is_identity());
        let p = t.apply(DVec2::new(3.5, -2.0));
        assert_eq!(p, DVec2::new(3.5, -2.0));
    }

    #[test]
    fn test_translation_apply() {
        let t = Transform::translation(DVec2::new(2.0, -1.5));
        let p = t.apply(DVec2::new(1.0, 1.0));
        assert!((p - DVec2::new(3.0, -0.5)).length() < EPS);
        assert!(!t.is_identity());
        assert_eq!(t.translation_components(), DVec2::new(2.0, -1.5));
    }

    #[test]
    fn test_similarity_components() {
        let t = Transform::similarity(DVec2::new(5.0, 6.0), 0.3, 1.2);
        assert!((t.rotation_angle() - 0.3).abs() < EPS);
        assert!((t.scale_factor() - 1.2).abs() < EPS);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = Transform::similarity(DVec2::new(-4.0, 2.0), -0.2, 0.9);
        let inv = t.inverse().unwrap();
        let p = DVec2::new(10.0, 20.0);
        assert!((inv.apply(t.apply(p)) - p).length() < 1e-9);
        assert!(t.compose(&inv).is_identity());
    }

    #[test]
    fn test_singular_has_no_inverse() {
        let t = Transform::affine([0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        assert!(t.inverse().is_none());
    }

    #[test]
    fn test_compose_order() {
        let shift = Transform::translation(DVec2::new(1.0, 0.0));
        let rotate = Transform::euclidean(DVec2::ZERO, std::f64::consts::FRAC_PI_2);

        // Rotate first, then shift.
        let p = shift.compose(&rotate).apply(DVec2::new(1.0, 0.0));
        assert!((p - DVec2::new(1.0, 1.0)).length() < EPS);
        assert_eq!(
            shift.compose(&rotate).transform_type,
            TransformType::Euclidean
        );
    }

    #[test]
    fn test_display() {
        let t = Transform::translation(DVec2::new(1.234, -5.0));
        assert_eq!(t.to_string(), "Translation(dx=1.23, dy=-5.00)");
    }
}

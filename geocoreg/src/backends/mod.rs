//! Built-in registration backends.
//!
//! - [`phase_correlation`]: FFT phase cross-correlation, translation only.
//! - [`feature`]: corner features matched with RANSAC, similarity model.

pub mod feature;
pub mod phase_correlation;

use ndarray::{Array2, ArrayView3, Axis};

use crate::error::{AlignmentError, ArrayRole};

/// Reject empty or mismatched `(y, x, band)` pairs before any estimation.
pub(crate) fn check_shapes(
    source: &ArrayView3<'_, f32>,
    reference: &ArrayView3<'_, f32>,
) -> Result<(), AlignmentError> {
    let source_shape = shape3(source);
    let reference_shape = shape3(reference);
    if source_shape != reference_shape {
        return Err(AlignmentError::ShapeMismatch {
            source_shape,
            reference_shape,
        });
    }
    if source.is_empty() {
        return Err(AlignmentError::EmptyImage);
    }
    Ok(())
}

pub(crate) fn shape3(image: &ArrayView3<'_, f32>) -> [usize; 3] {
    let (h, w, c) = image.dim();
    [h, w, c]
}

/// Mean over the channel axis, giving one `(y, x)` plane.
pub(crate) fn mean_plane(image: &ArrayView3<'_, f32>) -> Array2<f32> {
    // Non-empty images always have at least one channel.
    image
        .mean_axis(Axis(2))
        .unwrap_or_else(|| Array2::zeros((image.dim().0, image.dim().1)))
}

/// Fails with [`AlignmentError::NonFinite`] when the plane holds NaN or
/// infinite values (nodata pixels), and with [`AlignmentError::FlatImage`] when
/// it has no variance.
pub(crate) fn check_variance(plane: &Array2<f32>, image: ArrayRole) -> Result<(), AlignmentError> {
    let non_finite = plane.iter().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        return Err(AlignmentError::NonFinite {
            image,
            count: non_finite,
        });
    }

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in plane.iter() {
        min = min.min(v);
        max = max.max(v);
    }
    if max - min <= f32::EPSILON * max.abs().max(1.0) {
        return Err(AlignmentError::FlatImage { image });
    }
    Ok(())
}

//! Tests for the phase correlation backend.

use ndarray::Array3;

use super::*;
use crate::testing::{shifted_texture, texture};

fn planes(shift_x: isize, shift_y: isize) -> (Array2<f32>, Array2<f32>) {
    let reference = texture(64, 64, 0, 0);
    let target = texture(64, 64, shift_x, shift_y);
    (reference, target)
}

#[test]
fn test_correlate_identical_planes() {
    let (reference, _) = planes(0, 0);
    let correlator = PhaseCorrelator::new(64, 64, PhaseCorrelationConfig::default());
    let result = correlator.correlate(&reference, &reference).unwrap();

    assert!(result.translation.length() < 0.1, "{:?}", result.translation);
    assert!(result.peak_value > 0.5);
}

#[test]
fn test_correlate_recovers_shift_sign() {
    for (sx, sy) in [(5, 0), (0, -3), (3, -7), (-6, 4)] {
        let (reference, target) = planes(sx, sy);
        let correlator = PhaseCorrelator::new(64, 64, PhaseCorrelationConfig::default());
        let result = correlator.correlate(&reference, &target).unwrap();

        assert!(
            (result.translation.x - sx as f64).abs() < 0.5,
            "shift ({sx}, {sy}): dx = {}",
            result.translation.x
        );
        assert!(
            (result.translation.y - sy as f64).abs() < 0.5,
            "shift ({sx}, {sy}): dy = {}",
            result.translation.y
        );
    }
}

#[test]
fn test_subpixel_methods_agree_on_integer_shift() {
    let (reference, target) = planes(2, 1);
    for method in [
        SubpixelMethod::None,
        SubpixelMethod::Parabolic,
        SubpixelMethod::Gaussian,
    ] {
        let config = PhaseCorrelationConfig {
            subpixel_method: method,
            ..Default::default()
        };
        let correlator = PhaseCorrelator::new(64, 64, config);
        let result = correlator.correlate(&reference, &target).unwrap();
        assert!(
            (result.translation - DVec2::new(2.0, 1.0)).length() < 0.5,
            "{method:?}: {:?}",
            result.translation
        );
    }
}

#[test]
fn test_non_square_plane_is_padded() {
    let reference = texture(40, 24, 0, 0);
    let target = texture(40, 24, 2, 3);
    let correlator = PhaseCorrelator::new(40, 24, PhaseCorrelationConfig::default());
    assert_eq!(correlator.fft_size(), 64);

    let result = correlator.correlate(&reference, &target).unwrap();
    assert!((result.translation - DVec2::new(2.0, 3.0)).length() < 0.75);
}

#[test]
fn test_peak_threshold_rejects_unrelated_planes() {
    let reference = texture(64, 64, 0, 0);
    // Unrelated content: transposed texture.
    let target = reference.t().to_owned();
    let config = PhaseCorrelationConfig {
        min_peak_value: 0.9,
        ..Default::default()
    };
    let correlator = PhaseCorrelator::new(64, 64, config);
    let err = correlator.correlate(&reference, &target).unwrap_err();
    assert!(matches!(err, AlignmentError::NoCorrelationPeak { threshold, .. } if threshold > 0.89));
}

#[test]
fn test_correlate_size_mismatch() {
    let correlator = PhaseCorrelator::new(64, 64, PhaseCorrelationConfig::default());
    let small = Array2::<f32>::zeros((32, 32));
    let large = Array2::<f32>::zeros((64, 64));
    assert!(matches!(
        correlator.correlate(&small, &large),
        Err(AlignmentError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_hann_window() {
    let window = hann_window(64);
    assert_eq!(window.len(), 64);
    assert!(window[0] < 0.01);
    assert!((window[32] - 1.0).abs() < 0.01);
}

#[test]
fn test_transpose_inplace() {
    let mut data: Vec<Complex<f32>> = (0..16).map(|i| Complex::new(i as f32, 0.0)).collect();
    transpose_inplace(&mut data, 4);
    assert_eq!(data[1].re, 4.0);
    assert_eq!(data[4].re, 1.0);
}

#[test]
fn test_aligner_estimates_translation_transform() {
    let reference = shifted_texture(48, 48, 2, 0, 0);
    let source = shifted_texture(48, 48, 2, -3, 2);
    let aligner = PhaseCorrelation::default();

    let transform = aligner.estimate(source.view(), reference.view()).unwrap();
    let t = transform.translation_components();
    assert!((t - DVec2::new(-3.0, 2.0)).length() < 0.5, "{transform}");

    // Warping the source with the estimate brings the interior back onto the reference.
    let exact = Transform::translation(DVec2::new(-3.0, 2.0));
    let warped = aligner.apply(&exact, source.view());
    for y in 4..40 {
        for x in 4..40 {
            assert_eq!(warped[[y, x, 1]], reference[[y, x, 1]]);
        }
    }
}

#[test]
fn test_aligner_rejects_flat_images() {
    let flat = Array3::<f32>::from_elem((16, 16, 1), 3.0);
    let textured = shifted_texture(16, 16, 1, 0, 0);
    let aligner = PhaseCorrelation::default();

    assert_eq!(
        aligner.estimate(flat.view(), textured.view()).unwrap_err(),
        AlignmentError::FlatImage {
            image: ArrayRole::Source
        }
    );
    assert_eq!(
        aligner.estimate(textured.view(), flat.view()).unwrap_err(),
        AlignmentError::FlatImage {
            image: ArrayRole::Reference
        }
    );
}

#[test]
fn test_aligner_rejects_shape_mismatch() {
    let a = shifted_texture(16, 16, 2, 0, 0);
    let b = shifted_texture(16, 16, 1, 0, 0);
    let err = PhaseCorrelation::default()
        .estimate(a.view(), b.view())
        .unwrap_err();
    assert!(matches!(err, AlignmentError::ShapeMismatch { .. }));
}

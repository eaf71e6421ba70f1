//! Phase cross-correlation ("pcc") backend.
//!
//! Estimates the translation between two images by:
//! 1. Averaging the registration channels into one plane per image
//! 2. Computing the 2D FFT of both (Hann windowed, zero padded to a power of two)
//! 3. Normalizing the cross-power spectrum
//! 4. Locating the peak of its inverse FFT, refined to sub-pixel accuracy

#[cfg(test)]
mod tests;

use std::sync::Arc;

use glam::DVec2;
use ndarray::{Array2, Array3, ArrayView3};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use super::{check_shapes, check_variance, mean_plane};
use crate::error::{AlignmentError, ArrayRole};
use crate::registrator::Aligner;
use crate::transform::Transform;
use crate::warp::{warp_image, WarpConfig};

/// Configuration for phase correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseCorrelationConfig {
    /// Apply Hann window to reduce edge effects.
    pub use_windowing: bool,
    /// Sub-pixel interpolation method.
    pub subpixel_method: SubpixelMethod,
    /// Minimum correlation peak value to accept.
    pub min_peak_value: f32,
}

impl Default for PhaseCorrelationConfig {
    fn default() -> Self {
        Self {
            use_windowing: true,
            subpixel_method: SubpixelMethod::Parabolic,
            min_peak_value: 0.1,
        }
    }
}

/// Sub-pixel interpolation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubpixelMethod {
    /// Integer peak position only.
    None,
    /// Parabolic fit through the peak and its neighbours (~0.1 pixel).
    #[default]
    Parabolic,
    /// Gaussian fit, sharper on narrow peaks.
    Gaussian,
}

/// Result of phase correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseCorrelationResult {
    /// Shift `d` such that `target(p) ≈ reference(p - d)`.
    pub translation: DVec2,
    /// Peak correlation value (0.0 - 1.0).
    pub peak_value: f64,
    /// Ratio of the main peak to the strongest distant peak, scaled to 0.0 - 1.0.
    pub confidence: f64,
}

/// Phase correlator for translation estimation between `(y, x)` planes.
pub struct PhaseCorrelator {
    config: PhaseCorrelationConfig,
    /// Side of the square FFT grid, a power of two.
    fft_size: usize,
    forward_fft: Arc<dyn Fft<f32>>,
    inverse_fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl PhaseCorrelator {
    /// Create a correlator for planes of the given size.
    pub fn new(width: usize, height: usize, config: PhaseCorrelationConfig) -> Self {
        let fft_size = width.max(height).max(1).next_power_of_two();

        let mut planner = FftPlanner::new();
        let forward_fft = planner.plan_fft_forward(fft_size);
        let inverse_fft = planner.plan_fft_inverse(fft_size);

        let window = if config.use_windowing {
            hann_window(fft_size)
        } else {
            vec![1.0; fft_size]
        };

        Self {
            config,
            fft_size,
            forward_fft,
            inverse_fft,
            window,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Estimate the shift of `target` relative to `reference`.
    pub fn correlate(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
    ) -> Result<PhaseCorrelationResult, AlignmentError> {
        let (height, width) = reference.dim();
        if target.dim() != (height, width) {
            let (th, tw) = target.dim();
            return Err(AlignmentError::ShapeMismatch {
                source_shape: [th, tw, 1],
                reference_shape: [height, width, 1],
            });
        }
        if reference.is_empty() {
            return Err(AlignmentError::EmptyImage);
        }
        if width.max(height) > self.fft_size {
            return Err(AlignmentError::Other(format!(
                "{width}x{height} plane does not fit the {n}x{n} correlator",
                n = self.fft_size
            )));
        }

        let ref_fft = self.fft_2d(self.prepare_image(reference));
        let tar_fft = self.fft_2d(self.prepare_image(target));

        // target * conj(reference) peaks at the shift of target against reference.
        let cross_power = cross_power_spectrum(&tar_fft, &ref_fft);
        let correlation = self.ifft_2d(cross_power);

        let (peak_x, peak_y, peak_value) = self.find_peak(&correlation);
        if peak_value < self.config.min_peak_value as f64 {
            return Err(AlignmentError::NoCorrelationPeak {
                peak: peak_value,
                threshold: self.config.min_peak_value as f64,
            });
        }

        let n = self.fft_size;
        let unwrap = |p: usize| {
            if p > n / 2 {
                p as f64 - n as f64
            } else {
                p as f64
            }
        };
        let coarse = DVec2::new(unwrap(peak_x), unwrap(peak_y));

        let translation = match self.config.subpixel_method {
            SubpixelMethod::None => coarse,
            SubpixelMethod::Parabolic => {
                coarse + self.subpixel_offset(&correlation, peak_x, peak_y, |v| v)
            }
            SubpixelMethod::Gaussian => {
                coarse + self.subpixel_offset(&correlation, peak_x, peak_y, |v| v.max(1e-10).ln())
            }
        };

        let confidence = self.compute_confidence(&correlation, peak_x, peak_y, peak_value);

        Ok(PhaseCorrelationResult {
            translation,
            peak_value,
            confidence,
        })
    }

    /// Mean-subtract, pad to the FFT grid (centered) and window.
    fn prepare_image(&self, image: &Array2<f32>) -> Vec<Complex<f32>> {
        let n = self.fft_size;
        let (height, width) = image.dim();
        let mean = image.mean().unwrap_or(0.0);
        let mut padded = vec![Complex::new(0.0f32, 0.0); n * n];

        let offset_x = (n - width) / 2;
        let offset_y = (n - height) / 2;

        for ((y, x), &v) in image.indexed_iter() {
            let px = x + offset_x;
            let py = y + offset_y;
            let w = self.window[px] * self.window[py];
            padded[py * n + px] = Complex::new((v - mean) * w, 0.0);
        }

        padded
    }

    /// 2D FFT by row-column decomposition.
    fn fft_2d(&self, mut data: Vec<Complex<f32>>) -> Vec<Complex<f32>> {
        let n = self.fft_size;
        self.forward_fft.process(&mut data);
        transpose_inplace(&mut data, n);
        self.forward_fft.process(&mut data);
        transpose_inplace(&mut data, n);
        data
    }

    /// Inverse 2D FFT, normalized, real part.
    fn ifft_2d(&self, mut data: Vec<Complex<f32>>) -> Vec<f32> {
        let n = self.fft_size;
        self.inverse_fft.process(&mut data);
        transpose_inplace(&mut data, n);
        self.inverse_fft.process(&mut data);
        transpose_inplace(&mut data, n);

        let norm = 1.0 / (n * n) as f32;
        data.iter().map(|c| c.re * norm).collect()
    }

    fn find_peak(&self, correlation: &[f32]) -> (usize, usize, f64) {
        let n = self.fft_size;
        let mut max_val = f32::NEG_INFINITY;
        let mut max_idx = 0;
        for (i, &v) in correlation.iter().enumerate() {
            if v > max_val {
                max_val = v;
                max_idx = i;
            }
        }
        (max_idx % n, max_idx / n, max_val as f64)
    }

    /// Fit a 1D curve through the peak and its neighbours along each axis.
    /// `f` maps samples before fitting (identity for parabolic, ln for Gaussian).
    fn subpixel_offset(
        &self,
        correlation: &[f32],
        peak_x: usize,
        peak_y: usize,
        f: impl Fn(f32) -> f32,
    ) -> DVec2 {
        let n = self.fft_size as isize;
        let get_val = |x: isize, y: isize| -> f32 {
            let xx = x.rem_euclid(n) as usize;
            let yy = y.rem_euclid(n) as usize;
            f(correlation[yy * n as usize + xx])
        };

        let px = peak_x as isize;
        let py = peak_y as isize;

        let c = get_val(px, py);
        let l = get_val(px - 1, py);
        let r = get_val(px + 1, py);
        let t = get_val(px, py - 1);
        let b = get_val(px, py + 1);

        let fit = |lo: f32, hi: f32| -> f64 {
            let denom = 2.0 * (lo + hi - 2.0 * c);
            if denom.abs() > 1e-10 {
                ((lo - hi) / denom).clamp(-0.5, 0.5) as f64
            } else {
                0.0
            }
        };

        DVec2::new(fit(l, r), fit(t, b))
    }

    fn compute_confidence(
        &self,
        correlation: &[f32],
        peak_x: usize,
        peak_y: usize,
        peak_val: f64,
    ) -> f64 {
        let n = self.fft_size;
        let min_dist = (n / 8).max(1);
        let mut second_peak = 0.0f32;

        for y in 0..n {
            for x in 0..n {
                let dx = x.abs_diff(peak_x);
                let dy = y.abs_diff(peak_y);
                let dx = dx.min(n - dx);
                let dy = dy.min(n - dy);

                if dx >= min_dist || dy >= min_dist {
                    second_peak = second_peak.max(correlation[y * n + x]);
                }
            }
        }

        if second_peak > 1e-10 {
            ((peak_val as f32 / second_peak).min(10.0) / 10.0) as f64
        } else {
            1.0
        }
    }
}

/// `a * conj(b) / |a * conj(b)|`, zero where the magnitude vanishes.
fn cross_power_spectrum(a: &[Complex<f32>], b: &[Complex<f32>]) -> Vec<Complex<f32>> {
    a.iter()
        .zip(b)
        .map(|(&a, &b)| {
            let product = a * b.conj();
            let magnitude = product.norm();
            if magnitude > 1e-10 {
                product / magnitude
            } else {
                Complex::new(0.0, 0.0)
            }
        })
        .collect()
}

pub fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            0.5 * (1.0 - (2.0 * PI * x).cos())
        })
        .collect()
}

/// In-place square matrix transpose.
fn transpose_inplace(data: &mut [Complex<f32>], n: usize) {
    for i in 0..n {
        for j in (i + 1)..n {
            data.swap(i * n + j, j * n + i);
        }
    }
}

/// Translation-only aligner registered as `"pcc"`.
#[derive(Debug, Clone, Default)]
pub struct PhaseCorrelation {
    pub config: PhaseCorrelationConfig,
    pub warp: WarpConfig,
}

impl PhaseCorrelation {
    pub fn new(config: PhaseCorrelationConfig) -> Self {
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

impl Aligner for PhaseCorrelation {
    fn name(&self) -> &str {
        "pcc"
    }

    fn estimate(
        &self,
        source: ArrayView3<'_, f32>,
        reference: ArrayView3<'_, f32>,
    ) -> Result<Transform, AlignmentError> {
        check_shapes(&source, &reference)?;

        let reference_plane = mean_plane(&reference);
        let source_plane = mean_plane(&source);
        check_variance(&reference_plane, ArrayRole::Reference)?;
        check_variance(&source_plane, ArrayRole::Source)?;

        let (height, width) = reference_plane.dim();
        let correlator = PhaseCorrelator::new(width, height, self.config.clone());
        let result = correlator.correlate(&reference_plane, &source_plane)?;

        tracing::debug!(
            dx = result.translation.x,
            dy = result.translation.y,
            peak = result.peak_value,
            confidence = result.confidence,
            "Phase correlation"
        );

        // source(p) ≈ reference(p - d), so reference pixel p is found at p + d.
        Ok(Transform::translation(result.translation))
    }

    fn apply(&self, transform: &Transform, image: ArrayView3<'_, f32>) -> Array3<f32> {
        warp_image(image, transform, &self.warp)
    }
}

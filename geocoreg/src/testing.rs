//! Fixtures and stub registrators shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array2, Array3, ArrayD, ArrayView3, IxDyn};

use crate::error::{AlignmentError, ContractViolation};
use crate::labeled::LabeledArray;
use crate::registrator::{Aligner, Registrator};
use crate::transform::Transform;

pub fn init_tracing() {
    common::log_setup::init_test_tracing();
}

/// Deterministic value noise in `[0, 1)` for an integer grid position.
fn hash_noise(x: i64, y: i64) -> f32 {
    let mut h = (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    h ^= h >> 31;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 29;
    (h >> 40) as f32 / (1u64 << 24) as f32
}

/// Box-blurred noise, smooth enough for sub-pixel sampling but rich in corners.
fn base_texture(x: i64, y: i64) -> f32 {
    let mut sum = 0.0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            sum += hash_noise(x + dx, y + dy);
        }
    }
    sum / 9.0
}

/// `height x width` plane with `plane(p) = texture(p - shift)`.
pub fn texture(width: usize, height: usize, shift_x: isize, shift_y: isize) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(y, x)| {
        base_texture(x as i64 - shift_x as i64, y as i64 - shift_y as i64)
    })
}

/// `(y, x, band)` image of the shifted texture; band `b` is scaled by `b + 1`.
pub fn shifted_texture(
    width: usize,
    height: usize,
    bands: usize,
    shift_x: isize,
    shift_y: isize,
) -> Array3<f32> {
    let plane = texture(width, height, shift_x, shift_y);
    Array3::from_shape_fn((height, width, bands), |(y, x, b)| {
        plane[[y, x]] * (b + 1) as f32
    })
}

/// Labeled array whose every value encodes its own index, so misplaced writes
/// are detectable: `1000 * t + 100 * y + 10 * x + band` for `(time, y, x, band)`.
pub fn indexed_stack(
    time: usize,
    height: usize,
    width: usize,
    bands: &[&str],
) -> LabeledArray<f32> {
    let data = ArrayD::from_shape_fn(IxDyn(&[time, height, width, bands.len()]), |idx| {
        (1000 * idx[0] + 100 * idx[1] + 10 * idx[2] + idx[3]) as f32
    });
    LabeledArray::new(["time", "y", "x", "band"], data)
        .and_then(|a| a.with_coords("band", bands.iter().copied()))
        .unwrap()
}

/// `(y, x, band)` reference with named bands.
pub fn reference_image(height: usize, width: usize, bands: &[&str]) -> LabeledArray<f32> {
    let data = ArrayD::from_shape_fn(IxDyn(&[height, width, bands.len()]), |idx| {
        (100 * idx[0] + 10 * idx[1] + idx[2]) as f32
    });
    LabeledArray::new(["y", "x", "band"], data)
        .and_then(|a| a.with_coords("band", bands.iter().copied()))
        .unwrap()
}

/// Two-phase registrator that returns every slice unchanged.
#[derive(Debug, Default)]
pub struct IdentityRegistrator {
    registered: bool,
}

impl Registrator for IdentityRegistrator {
    fn register(
        &mut self,
        _source: ArrayView3<'_, f32>,
        _reference: ArrayView3<'_, f32>,
    ) -> Result<(), AlignmentError> {
        self.registered = true;
        Ok(())
    }

    fn warp_image(&mut self, image: ArrayView3<'_, f32>) -> Result<Array3<f32>, ContractViolation> {
        if !std::mem::take(&mut self.registered) {
            return Err(ContractViolation::WarpWithoutRegister);
        }
        Ok(image.to_owned())
    }
}

/// One `register` or `warp_image` call as seen by [`RecordingRegistrator`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Register {
        source_shape: [usize; 3],
        reference_shape: [usize; 3],
        /// First pixel of the source subset, all channels.
        source_pixel: Vec<f32>,
        /// First pixel of the reference subset, all channels.
        reference_pixel: Vec<f32>,
    },
    Warp {
        shape: [usize; 3],
        pixel: Vec<f32>,
    },
}

fn shape(image: &ArrayView3<'_, f32>) -> [usize; 3] {
    let (h, w, c) = image.dim();
    [h, w, c]
}

fn first_pixel(image: &ArrayView3<'_, f32>) -> Vec<f32> {
    (0..image.dim().2).map(|b| image[[0, 0, b]]).collect()
}

/// Identity registrator that records its calls and can fail on a chosen call.
#[derive(Debug, Default)]
pub struct RecordingRegistrator {
    pub calls: Vec<Call>,
    /// Zero-based `register` call that fails.
    pub fail_register_at: Option<usize>,
    registers: usize,
    registered: bool,
}

impl RecordingRegistrator {
    pub fn failing_at(n: usize) -> Self {
        Self {
            fail_register_at: Some(n),
            ..Default::default()
        }
    }

    pub fn register_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Register { .. }))
            .count()
    }
}

impl Registrator for RecordingRegistrator {
    fn register(
        &mut self,
        source: ArrayView3<'_, f32>,
        reference: ArrayView3<'_, f32>,
    ) -> Result<(), AlignmentError> {
        self.calls.push(Call::Register {
            source_shape: shape(&source),
            reference_shape: shape(&reference),
            source_pixel: first_pixel(&source),
            reference_pixel: first_pixel(&reference),
        });
        let n = self.registers;
        self.registers += 1;
        self.registered = false;
        if self.fail_register_at == Some(n) {
            return Err(AlignmentError::Other(format!("stub failure at call {n}")));
        }
        self.registered = true;
        Ok(())
    }

    fn warp_image(&mut self, image: ArrayView3<'_, f32>) -> Result<Array3<f32>, ContractViolation> {
        self.calls.push(Call::Warp {
            shape: shape(&image),
            pixel: first_pixel(&image),
        });
        if !std::mem::take(&mut self.registered) {
            return Err(ContractViolation::WarpWithoutRegister);
        }
        Ok(image.to_owned())
    }
}

/// Registrator that never keeps a transform, so every warp is out of protocol.
#[derive(Debug, Default)]
pub struct ForgetfulRegistrator;

impl Registrator for ForgetfulRegistrator {
    fn register(
        &mut self,
        _source: ArrayView3<'_, f32>,
        _reference: ArrayView3<'_, f32>,
    ) -> Result<(), AlignmentError> {
        Ok(())
    }

    fn warp_image(
        &mut self,
        _image: ArrayView3<'_, f32>,
    ) -> Result<Array3<f32>, ContractViolation> {
        Err(ContractViolation::WarpWithoutRegister)
    }
}

/// Registrator whose warp drops the last row.
#[derive(Debug, Default)]
pub struct CroppingRegistrator;

impl Registrator for CroppingRegistrator {
    fn register(
        &mut self,
        _source: ArrayView3<'_, f32>,
        _reference: ArrayView3<'_, f32>,
    ) -> Result<(), AlignmentError> {
        Ok(())
    }

    fn warp_image(&mut self, image: ArrayView3<'_, f32>) -> Result<Array3<f32>, ContractViolation> {
        let rows = image.dim().0.saturating_sub(1);
        Ok(image.slice(ndarray::s![..rows, .., ..]).to_owned())
    }
}

/// Stateless identity aligner counting its calls.
#[derive(Debug, Default)]
pub struct CountingAligner {
    pub estimates: AtomicUsize,
}

impl CountingAligner {
    pub fn estimate_count(&self) -> usize {
        self.estimates.load(Ordering::SeqCst)
    }
}

impl Aligner for CountingAligner {
    fn name(&self) -> &str {
        "counting"
    }

    fn estimate(
        &self,
        _source: ArrayView3<'_, f32>,
        _reference: ArrayView3<'_, f32>,
    ) -> Result<Transform, AlignmentError> {
        self.estimates.fetch_add(1, Ordering::SeqCst);
        Ok(Transform::identity())
    }

    fn apply(&self, _transform: &Transform, image: ArrayView3<'_, f32>) -> Array3<f32> {
        image.to_owned()
    }
}

//! Registration capability interfaces.
//!
//! [`Aligner`] is the stateless form: `estimate` returns an explicit
//! [`Transform`] and `apply` warps with it. Aligners are `Send + Sync`, so one
//! instance can serve many slices concurrently.
//!
//! [`Registrator`] is the stateful two-phase form: `register` remembers the
//! transform and the following `warp_image` consumes it. [`TwoPhase`] adapts any
//! aligner to it, and callers can supply their own implementations.

use ndarray::{Array3, ArrayView3};

use crate::error::{AlignmentError, ContractViolation};
use crate::transform::Transform;

/// Estimates and applies alignment transforms between `(y, x, band)` images.
pub trait Aligner: Send + Sync {
    /// Registry identifier or a descriptive name.
    fn name(&self) -> &str;

    /// Transform taking reference-frame pixel coordinates to `source` coordinates.
    ///
    /// Both images carry the same channels, in the same order.
    fn estimate(
        &self,
        source: ArrayView3<'_, f32>,
        reference: ArrayView3<'_, f32>,
    ) -> Result<Transform, AlignmentError>;

    /// Warp every channel of `image` with `transform`. Shape is preserved.
    fn apply(&self, transform: &Transform, image: ArrayView3<'_, f32>) -> Array3<f32>;
}

impl<A: Aligner + ?Sized> Aligner for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn estimate(
        &self,
        source: ArrayView3<'_, f32>,
        reference: ArrayView3<'_, f32>,
    ) -> Result<Transform, AlignmentError> {
        (**self).estimate(source, reference)
    }

    fn apply(&self, transform: &Transform, image: ArrayView3<'_, f32>) -> Array3<f32> {
        (**self).apply(transform, image)
    }
}

/// Two-phase registration contract.
///
/// `register` estimates and stores a transform for one slice; `warp_image`
/// applies the stored transform to the full-channel slice and ends the cycle.
/// A failed `register` leaves no transform behind.
pub trait Registrator {
    fn register(
        &mut self,
        source: ArrayView3<'_, f32>,
        reference: ArrayView3<'_, f32>,
    ) -> Result<(), AlignmentError>;

    fn warp_image(&mut self, image: ArrayView3<'_, f32>) -> Result<Array3<f32>, ContractViolation>;
}

/// Stateful [`Registrator`] over a stateless [`Aligner`].
#[derive(Debug, Clone, Default)]
pub struct TwoPhase<A> {
    aligner: A,
    transform: Option<Transform>,
}

impl<A: Aligner> TwoPhase<A> {
    pub fn new(aligner: A) -> Self {
        Self {
            aligner,
            transform: None,
        }
    }

    pub fn aligner(&self) -> &A {
        &self.aligner
    }

    /// Transform from the last successful `register` not yet consumed by a warp.
    pub fn pending_transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub fn into_inner(self) -> A {
        self.aligner
    }
}

impl<A: Aligner> Registrator for TwoPhase<A> {
    fn register(
        &mut self,
        source: ArrayView3<'_, f32>,
        reference: ArrayView3<'_, f32>,
    ) -> Result<(), AlignmentError> {
        self.transform = None;
        let transform = self.aligner.estimate(source, reference)?;
        tracing::debug!(aligner = self.aligner.name(), %transform, "Registered");
        self.transform = Some(transform);
        Ok(())
    }

    fn warp_image(&mut self, image: ArrayView3<'_, f32>) -> Result<Array3<f32>, ContractViolation> {
        let transform = self
            .transform
            .take()
            .ok_or(ContractViolation::WarpWithoutRegister)?;
        Ok(self.aligner.apply(&transform, image))
    }
}

//! Per-slice registration loop.

use ndarray::{Array3, Array4, ArrayView3, ArrayViewMut3, Axis, Ix3};
use rayon::prelude::*;

use super::plan::SlicePlan;
use crate::backends::shape3;
use crate::error::{CoregError, ContractViolation, Result};
use crate::labeled::{LabeledArray, LabeledArrayError};
use crate::registrator::{Aligner, Registrator};

/// Source slices in canonical order plus the reference registration subset.
pub(super) struct SliceStack {
    /// `(slice, y, x, band)`.
    slices: Array4<f32>,
    /// `(y, x, registration band)`.
    reference: Array3<f32>,
}

impl SliceStack {
    pub(super) fn new(
        plan: &SlicePlan,
        source: &LabeledArray<f32>,
        reference: &LabeledArray<f32>,
    ) -> Result<Self, LabeledArrayError> {
        let shape = (plan.num_slices(), plan.height, plan.width, plan.channels);
        let slices = source
            .transpose(&plan.canonical_order)?
            .into_data()
            .into_shape_with_order(shape)
            .map_err(|_| LabeledArrayError::Reshape(vec![shape.0, shape.1, shape.2, shape.3]))?;

        let reference = reference
            .transpose(&plan.image_axes)?
            .into_data()
            .into_dimensionality::<Ix3>()
            .map_err(|_| LabeledArrayError::Reshape(reference.shape().to_vec()))?
            .select(Axis(2), &plan.reference_bands);

        Ok(Self { slices, reference })
    }

    fn output(&self) -> Array4<f32> {
        Array4::zeros(self.slices.raw_dim())
    }
}

/// Run every slice through one registrator, in row-major slice order.
pub(super) fn run_sequential(
    plan: &SlicePlan,
    stack: &SliceStack,
    registrator: &mut dyn Registrator,
) -> Result<Array4<f32>> {
    let mut output = stack.output();
    for (n, (slice, out)) in stack
        .slices
        .axis_iter(Axis(0))
        .zip(output.axis_iter_mut(Axis(0)))
        .enumerate()
    {
        let index = plan.slice_index(n);
        let subset = slice.select(Axis(2), &plan.source_bands);

        registrator
            .register(subset.view(), stack.reference.view())
            .map_err(|source| CoregError::Alignment {
                slice: index.clone(),
                source,
            })?;
        let warped = registrator
            .warp_image(slice)
            .map_err(|violation| CoregError::ContractViolation {
                slice: index.clone(),
                violation,
            })?;
        write_back(slice, warped, out).map_err(|violation| CoregError::ContractViolation {
            slice: index.clone(),
            violation,
        })?;

        tracing::debug!(slice = %index, "Slice aligned");
    }
    Ok(output)
}

/// Run slices concurrently, each through the shared stateless aligner.
///
/// When several slices fail, the error of the first one in slice order is
/// returned.
pub(super) fn run_parallel(
    plan: &SlicePlan,
    stack: &SliceStack,
    aligner: &dyn Aligner,
) -> Result<Array4<f32>> {
    let mut output = stack.output();
    let failures: Vec<(usize, CoregError)> = output
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .filter_map(|(n, out)| {
            let slice = stack.slices.index_axis(Axis(0), n);
            let subset = slice.select(Axis(2), &plan.source_bands);

            let result = aligner
                .estimate(subset.view(), stack.reference.view())
                .map_err(|source| CoregError::Alignment {
                    slice: plan.slice_index(n),
                    source,
                })
                .and_then(|transform| {
                    tracing::debug!(slice = %plan.slice_index(n), %transform, "Slice aligned");
                    let warped = aligner.apply(&transform, slice);
                    write_back(slice, warped, out).map_err(|violation| {
                        CoregError::ContractViolation {
                            slice: plan.slice_index(n),
                            violation,
                        }
                    })
                });
            result.err().map(|err| (n, err))
        })
        .collect();

    match failures.into_iter().min_by_key(|(n, _)| *n) {
        Some((_, err)) => Err(err),
        None => Ok(output),
    }
}

/// Copy a warped slice into its output position after checking its shape.
fn write_back(
    input: ArrayView3<'_, f32>,
    warped: Array3<f32>,
    mut out: ArrayViewMut3<'_, f32>,
) -> Result<(), ContractViolation> {
    let expected = shape3(&input);
    let actual = shape3(&warped.view());
    if expected != actual {
        return Err(ContractViolation::WarpShapeChanged { expected, actual });
    }
    out.assign(&warped);
    Ok(())
}

//! Output assembly: back to the source layout, then chunk once.

use ndarray::{Array4, IxDyn};

use super::plan::SlicePlan;
use crate::chunking::Chunking;
use crate::labeled::{LabeledArray, LabeledArrayError};

/// Label the aligned canonical stack, restore the source axis order and carry
/// over the source coordinates. Chunking, when requested, comes last so it
/// describes the final layout; otherwise the source's own layout is kept.
pub(super) fn assemble(
    plan: &SlicePlan,
    source: &LabeledArray<f32>,
    aligned: Array4<f32>,
    chunking: Option<&Chunking>,
) -> Result<LabeledArray<f32>, LabeledArrayError> {
    let canonical_shape = plan.canonical_shape();
    let data = aligned
        .into_shape_with_order(IxDyn(&canonical_shape))
        .map_err(|_| LabeledArrayError::Reshape(canonical_shape.clone()))?;

    let mut canonical = LabeledArray::new(plan.canonical_order.iter().cloned(), data)?;
    for axis in &plan.canonical_order {
        if let Some(labels) = source.coords(axis) {
            canonical = canonical.with_coords(axis, labels.iter().cloned())?;
        }
    }

    let output = canonical.transpose(&plan.source_order)?;
    match chunking {
        Some(chunking) => output.chunk(chunking),
        None => Ok(output.with_chunk_layout(source.chunks().cloned())),
    }
}

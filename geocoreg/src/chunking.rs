//! Chunk layouts: a storage relayout hint carried by a [`LabeledArray`](crate::LabeledArray).
//!
//! Chunking never changes values. It records how a downstream writer should split
//! the array into blocks: full chunks of the requested size followed by one
//! remainder chunk, with unlisted axes kept whole.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::labeled::LabeledArrayError;

/// Requested chunk size per named axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chunking(BTreeMap<String, usize>);

impl Chunking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, axis: impl Into<String>, size: usize) -> Self {
        self.0.insert(axis.into(), size);
        self
    }

    pub fn get(&self, axis: &str) -> Option<usize> {
        self.0.get(axis).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(axis, &size)| (axis.as_str(), size))
    }

    /// Resolve against concrete axes, validating every requested axis exists.
    pub(crate) fn layout(
        &self,
        dims: &[String],
        shape: &[usize],
    ) -> Result<ChunkLayout, LabeledArrayError> {
        for (axis, size) in self.iter() {
            if !dims.iter().any(|d| d == axis) {
                return Err(LabeledArrayError::UnknownAxis(axis.to_string()));
            }
            if size == 0 {
                return Err(LabeledArrayError::ZeroChunkSize {
                    axis: axis.to_string(),
                });
            }
        }

        let extents = dims
            .iter()
            .zip(shape)
            .map(|(axis, &len)| match self.get(axis) {
                Some(chunk) => split_axis(len, chunk),
                None => vec![len],
            })
            .collect();

        Ok(ChunkLayout { extents })
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for Chunking {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(a, s)| (a.into(), s)).collect())
    }
}

fn split_axis(len: usize, chunk: usize) -> Vec<usize> {
    if len == 0 {
        return vec![0];
    }
    let mut extents = vec![chunk; len / chunk];
    if len % chunk != 0 {
        extents.push(len % chunk);
    }
    extents
}

/// Per-axis chunk extents, in the owning array's axis order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLayout {
    extents: Vec<Vec<usize>>,
}

impl ChunkLayout {
    pub fn extents(&self) -> &[Vec<usize>] {
        &self.extents
    }

    pub fn axis(&self, axis: usize) -> &[usize] {
        &self.extents[axis]
    }

    pub fn num_chunks(&self) -> usize {
        self.extents.iter().map(Vec::len).product()
    }

    /// Index ranges of every chunk, row-major over the chunk grid.
    pub fn regions(&self) -> Vec<Vec<Range<usize>>> {
        let per_axis: Vec<Vec<Range<usize>>> = self
            .extents
            .iter()
            .map(|extents| {
                let mut start = 0;
                extents
                    .iter()
                    .map(|&len| {
                        let range = start..start + len;
                        start += len;
                        range
                    })
                    .collect()
            })
            .collect();

        let mut regions: Vec<Vec<Range<usize>>> = vec![Vec::new()];
        for ranges in &per_axis {
            regions = regions
                .into_iter()
                .flat_map(|prefix| {
                    ranges.iter().map(move |range| {
                        let mut region = prefix.clone();
                        region.push(range.clone());
                        region
                    })
                })
                .collect();
        }
        regions
    }

    pub(crate) fn permuted(&self, perm: &[usize]) -> Self {
        Self {
            extents: perm.iter().map(|&i| self.extents[i].clone()).collect(),
        }
    }

    pub(crate) fn without_axis(&self, axis: usize) -> Self {
        let mut extents = self.extents.clone();
        extents.remove(axis);
        Self { extents }
    }
}

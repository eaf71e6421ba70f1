//! Labeled N-dimensional arrays.
//!
//! A [`LabeledArray`] pairs an `ndarray::ArrayD` with one unique name per axis,
//! optional coordinate labels per axis and an optional [`ChunkLayout`]. Axes are
//! addressed by name everywhere, so callers never depend on positional layout.
//!
//! Every reshaping operation (`transpose`, `isel`, `sel`) returns a new array
//! in standard layout; the receiver is never modified.


use std::borrow::Cow;

use ndarray::{ArrayD, ArrayViewD, Axis};
use thiserror::Error;

use crate::chunking::{ChunkLayout, Chunking};

/// Errors from constructing or reshaping a [`LabeledArray`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LabeledArrayError {
    #[error("{dims} axis names given for an array of rank {ndim}")]
    RankMismatch { dims: usize, ndim: usize },

    #[error("duplicate axis name '{0}'")]
    DuplicateAxis(String),

    #[error("unknown axis '{0}'")]
    UnknownAxis(String),

    #[error("axis '{axis}' has {size} entries but {labels} coordinate labels were given")]
    CoordLength {
        axis: String,
        size: usize,
        labels: usize,
    },

    #[error("{order:?} is not a permutation of the axes {dims:?}")]
    InvalidOrder {
        order: Vec<String>,
        dims: Vec<String>,
    },

    #[error("index {index} is out of bounds for axis '{axis}' of size {size}")]
    IndexOutOfBounds {
        axis: String,
        index: usize,
        size: usize,
    },

    #[error("label '{label}' not found on axis '{axis}'")]
    LabelNotFound { axis: String, label: String },

    #[error("chunk size for axis '{axis}' must be positive")]
    ZeroChunkSize { axis: String },

    #[error("data cannot be viewed with shape {0:?}")]
    Reshape(Vec<usize>),
}

/// N-dimensional array with named axes.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledArray<T> {
    data: ArrayD<T>,
    dims: Vec<String>,
    coords: Vec<Option<Vec<String>>>,
    chunks: Option<ChunkLayout>,
}

impl<T> LabeledArray<T> {
    /// Name the axes of `data`, outermost first.
    pub fn new<S: Into<String>>(
        dims: impl IntoIterator<Item = S>,
        data: ArrayD<T>,
    ) -> Result<Self, LabeledArrayError> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(LabeledArrayError::RankMismatch {
                dims: dims.len(),
                ndim: data.ndim(),
            });
        }
        for (i, name) in dims.iter().enumerate() {
            if dims[..i].contains(name) {
                return Err(LabeledArrayError::DuplicateAxis(name.clone()));
            }
        }

        let coords = vec![None; dims.len()];
        Ok(Self {
            data,
            dims,
            coords,
            chunks: None,
        })
    }

    /// Attach coordinate labels to `axis`, one per index.
    pub fn with_coords<S: Into<String>>(
        mut self,
        axis: &str,
        labels: impl IntoIterator<Item = S>,
    ) -> Result<Self, LabeledArrayError> {
        let idx = self.require_axis(axis)?;
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let size = self.data.len_of(Axis(idx));
        if labels.len() != size {
            return Err(LabeledArrayError::CoordLength {
                axis: axis.to_string(),
                size,
                labels: labels.len(),
            });
        }
        self.coords[idx] = Some(labels);
        Ok(self)
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// `(axis, size)` pairs in axis order.
    pub fn sizes(&self) -> Vec<(&str, usize)> {
        self.dims
            .iter()
            .map(String::as_str)
            .zip(self.data.shape().iter().copied())
            .collect()
    }

    pub fn axis_index(&self, axis: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == axis)
    }

    pub fn has_axis(&self, axis: &str) -> bool {
        self.axis_index(axis).is_some()
    }

    pub fn size(&self, axis: &str) -> Option<usize> {
        self.axis_index(axis).map(|i| self.data.len_of(Axis(i)))
    }

    /// Explicit coordinate labels of `axis`, if any were attached.
    pub fn coords(&self, axis: &str) -> Option<&[String]> {
        self.axis_index(axis)
            .and_then(|i| self.coords[i].as_deref())
    }

    /// Labels of `axis`: the explicit coordinates, or positional indices
    /// (`"0"`, `"1"`, ...) when the axis has none.
    pub fn labels(&self, axis: &str) -> Option<Cow<'_, [String]>> {
        let idx = self.axis_index(axis)?;
        Some(match &self.coords[idx] {
            Some(labels) => Cow::Borrowed(labels.as_slice()),
            None => Cow::Owned(
                (0..self.data.len_of(Axis(idx)))
                    .map(|i| i.to_string())
                    .collect(),
            ),
        })
    }

    /// Positions of `labels` along `axis`, in the order requested.
    pub fn label_positions<S: AsRef<str>>(
        &self,
        axis: &str,
        labels: &[S],
    ) -> Result<Vec<usize>, LabeledArrayError> {
        let available = self
            .labels(axis)
            .ok_or_else(|| LabeledArrayError::UnknownAxis(axis.to_string()))?;
        labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                available
                    .iter()
                    .position(|l| l == label)
                    .ok_or_else(|| LabeledArrayError::LabelNotFound {
                        axis: axis.to_string(),
                        label: label.to_string(),
                    })
            })
            .collect()
    }

    pub fn data(&self) -> &ArrayD<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayD<T> {
        &mut self.data
    }

    pub fn view(&self) -> ArrayViewD<'_, T> {
        self.data.view()
    }

    pub fn into_data(self) -> ArrayD<T> {
        self.data
    }

    pub fn chunks(&self) -> Option<&ChunkLayout> {
        self.chunks.as_ref()
    }

    /// Attach a chunk layout. Values are untouched.
    pub fn chunk(mut self, chunking: &Chunking) -> Result<Self, LabeledArrayError> {
        self.chunks = Some(chunking.layout(&self.dims, self.data.shape())?);
        Ok(self)
    }

    /// Carry over a layout resolved for an array of the same dims and shape.
    pub(crate) fn with_chunk_layout(mut self, layout: Option<ChunkLayout>) -> Self {
        self.chunks = layout;
        self
    }

    fn require_axis(&self, axis: &str) -> Result<usize, LabeledArrayError> {
        self.axis_index(axis)
            .ok_or_else(|| LabeledArrayError::UnknownAxis(axis.to_string()))
    }
}

impl<T: Clone> LabeledArray<T> {
    /// Copy with the axes reordered to `order`, which must name every axis once.
    pub fn transpose<S: AsRef<str>>(&self, order: &[S]) -> Result<Self, LabeledArrayError> {
        let invalid = || LabeledArrayError::InvalidOrder {
            order: order.iter().map(|s| s.as_ref().to_string()).collect(),
            dims: self.dims.clone(),
        };

        if order.len() != self.ndim() {
            return Err(invalid());
        }
        let mut perm = Vec::with_capacity(order.len());
        let mut seen = vec![false; order.len()];
        for name in order {
            let idx = self.axis_index(name.as_ref()).ok_or_else(invalid)?;
            if seen[idx] {
                return Err(invalid());
            }
            seen[idx] = true;
            perm.push(idx);
        }

        let data = self
            .data
            .view()
            .permuted_axes(perm.as_slice())
            .as_standard_layout()
            .into_owned();

        Ok(Self {
            data,
            dims: perm.iter().map(|&i| self.dims[i].clone()).collect(),
            coords: perm.iter().map(|&i| self.coords[i].clone()).collect(),
            chunks: self.chunks.as_ref().map(|c| c.permuted(&perm)),
        })
    }

    /// Copy of the sub-array at `index` along `axis`; the axis is dropped.
    pub fn isel(&self, axis: &str, index: usize) -> Result<Self, LabeledArrayError> {
        let idx = self.require_axis(axis)?;
        let size = self.data.len_of(Axis(idx));
        if index >= size {
            return Err(LabeledArrayError::IndexOutOfBounds {
                axis: axis.to_string(),
                index,
                size,
            });
        }

        let data = self.data.index_axis(Axis(idx), index).to_owned();
        let mut dims = self.dims.clone();
        dims.remove(idx);
        let mut coords = self.coords.clone();
        coords.remove(idx);

        Ok(Self {
            data,
            dims,
            coords,
            chunks: self.chunks.as_ref().map(|c| c.without_axis(idx)),
        })
    }

    /// Copy restricted to `labels` along `axis`, in the order given.
    ///
    /// The chunk layout is dropped since the selection changes the axis length.
    pub fn sel<S: AsRef<str>>(&self, axis: &str, labels: &[S]) -> Result<Self, LabeledArrayError> {
        let idx = self.require_axis(axis)?;
        let positions = self.label_positions(axis, labels)?;
        let data = self.data.select(Axis(idx), &positions);

        let mut coords = self.coords.clone();
        coords[idx] = Some(labels.iter().map(|l| l.as_ref().to_string()).collect());

        Ok(Self {
            data,
            dims: self.dims.clone(),
            coords,
            chunks: None,
        })
    }
}

//! Input validation and slice decomposition.

use ndarray::{Dimension, IxDyn};

use crate::config::CoregOptions;
use crate::error::{ArrayRole, ConfigurationError};
use crate::labeled::LabeledArray;

use super::SliceIndex;

/// Validated layout of one coregistration call.
///
/// Built before any registrator is touched; every configuration error surfaces
/// here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicePlan {
    /// Source axes beyond the image axes, in source order.
    pub extra_axes: Vec<String>,
    pub extra_shape: Vec<usize>,
    /// `extra_axes` followed by vertical, horizontal and channel axes.
    pub canonical_order: Vec<String>,
    /// Source axis order to restore on output.
    pub source_order: Vec<String>,
    /// Image axis names in processing order: vertical, horizontal, channel.
    pub image_axes: [String; 3],
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    /// Registration channel labels.
    pub bands: Vec<String>,
    /// Positions of `bands` on the source channel axis.
    pub source_bands: Vec<usize>,
    /// Positions of `bands` on the reference channel axis.
    pub reference_bands: Vec<usize>,
}

impl SlicePlan {
    pub fn new<T>(
        source: &LabeledArray<T>,
        reference: &LabeledArray<T>,
        options: &CoregOptions,
    ) -> Result<Self, ConfigurationError> {
        let axes = &options.axes;
        let image_axes = axes.image_order();

        for (array, role) in [(source, ArrayRole::Source), (reference, ArrayRole::Reference)] {
            for axis in image_axes {
                if !array.has_axis(axis) {
                    return Err(ConfigurationError::MissingAxis {
                        array: role,
                        axis: axis.to_string(),
                    });
                }
            }
        }

        let reference_extra: Vec<String> = reference
            .dims()
            .iter()
            .filter(|d| !axes.contains(d))
            .cloned()
            .collect();
        if !reference_extra.is_empty() {
            return Err(ConfigurationError::ReferenceExtraAxes {
                expected: image_axes.iter().map(|a| a.to_string()).collect(),
                extra: reference_extra,
            });
        }

        for axis in [&axes.vertical, &axes.horizontal] {
            let source_size = source.size(axis).unwrap_or(0);
            let reference_size = reference.size(axis).unwrap_or(0);
            if source_size != reference_size {
                return Err(ConfigurationError::SpatialSizeMismatch {
                    axis: axis.clone(),
                    source_size,
                    reference_size,
                });
            }
        }

        let bands: Vec<String> = match &options.registration_bands {
            Some(bands) => bands.clone(),
            None => reference
                .labels(&axes.channel)
                .map(|labels| labels.into_owned())
                .unwrap_or_default(),
        };
        if bands.is_empty() {
            return Err(ConfigurationError::EmptyBands);
        }
        let reference_bands =
            band_positions(reference, &axes.channel, &bands, ArrayRole::Reference)?;
        let source_bands = band_positions(source, &axes.channel, &bands, ArrayRole::Source)?;

        let extra_axes: Vec<String> = source
            .dims()
            .iter()
            .filter(|d| !axes.contains(d))
            .cloned()
            .collect();
        let extra_shape: Vec<usize> = extra_axes
            .iter()
            .map(|axis| source.size(axis).unwrap_or(0))
            .collect();

        let canonical_order: Vec<String> = extra_axes
            .iter()
            .cloned()
            .chain(image_axes.iter().map(|a| a.to_string()))
            .collect();

        Ok(Self {
            extra_axes,
            extra_shape,
            canonical_order,
            source_order: source.dims().to_vec(),
            image_axes: image_axes.map(str::to_string),
            height: source.size(&axes.vertical).unwrap_or(0),
            width: source.size(&axes.horizontal).unwrap_or(0),
            channels: source.size(&axes.channel).unwrap_or(0),
            bands,
            source_bands,
            reference_bands,
        })
    }

    /// Number of 2D slices: the product of the extra axis sizes, 1 when there
    /// are none, 0 when any extra axis is empty.
    pub fn num_slices(&self) -> usize {
        self.extra_shape.iter().product()
    }

    pub fn is_degenerate(&self) -> bool {
        self.extra_axes.is_empty()
    }

    /// Index of slice `n` in row-major order over the extra axes.
    pub fn slice_index(&self, n: usize) -> SliceIndex {
        let mut positions = vec![0; self.extra_shape.len()];
        let mut rest = n;
        for (pos, &size) in positions.iter_mut().zip(&self.extra_shape).rev() {
            *pos = rest % size.max(1);
            rest /= size.max(1);
        }
        SliceIndex::new(self.extra_axes.iter().cloned().zip(positions))
    }

    /// All slice indices, row-major (last extra axis fastest).
    pub fn slices(&self) -> impl Iterator<Item = SliceIndex> + '_ {
        ndarray::indices(IxDyn(&self.extra_shape))
            .into_iter()
            .map(|idx| SliceIndex::new(self.extra_axes.iter().cloned().zip(idx.slice().to_vec())))
    }

    /// Canonical shape: extra sizes, then height, width, channels.
    pub fn canonical_shape(&self) -> Vec<usize> {
        let mut shape = self.extra_shape.clone();
        shape.extend([self.height, self.width, self.channels]);
        shape
    }
}

fn band_positions<T>(
    array: &LabeledArray<T>,
    channel_axis: &str,
    bands: &[String],
    role: ArrayRole,
) -> Result<Vec<usize>, ConfigurationError> {
    let available = array.labels(channel_axis).unwrap_or_default();
    bands
        .iter()
        .map(|band| {
            available
                .iter()
                .position(|l| l == band)
                .ok_or_else(|| ConfigurationError::UnknownBand {
                    array: role,
                    band: band.clone(),
                })
        })
        .collect()
}

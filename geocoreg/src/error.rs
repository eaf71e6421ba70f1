//! Error types for coregistration.
//!
//! Three families surface to callers, none of them retried internally:
//! [`ConfigurationError`] for invalid inputs, [`AlignmentError`] when a backend
//! cannot estimate a transform, and [`ContractViolation`] when a registrator is
//! driven out of protocol. [`CoregError`] wraps them for the public entry points.

use std::fmt;

use thiserror::Error;

use crate::coregistration::SliceIndex;
use crate::labeled::LabeledArrayError;

/// Which input array an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayRole {
    Source,
    Reference,
}

impl fmt::Display for ArrayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayRole::Source => write!(f, "source"),
            ArrayRole::Reference => write!(f, "reference"),
        }
    }
}

/// Invalid inputs or settings, detected before any registrator call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{array} is missing required axis '{axis}'")]
    MissingAxis { array: ArrayRole, axis: String },

    #[error("reference must only have the axes {expected:?}, found extra axes {extra:?}")]
    ReferenceExtraAxes {
        expected: Vec<String>,
        extra: Vec<String>,
    },

    #[error("Registrator '{name}' not found. Available registrators: {available:?}")]
    UnknownBackend {
        name: String,
        available: Vec<String>,
    },

    #[error("registration band '{band}' is not present in the {array}")]
    UnknownBand { array: ArrayRole, band: String },

    #[error("registration band subset is empty")]
    EmptyBands,

    #[error("axis '{axis}' has size {source_size} in the source but {reference_size} in the reference")]
    SpatialSizeMismatch {
        axis: String,
        source_size: usize,
        reference_size: usize,
    },

    #[error("time series must have exactly one extra axis '{time_axis}', found {extra:?}")]
    TimeAxis {
        time_axis: String,
        extra: Vec<String>,
    },

    #[error("a caller-supplied registrator instance cannot be shared between parallel workers")]
    SharedInstanceNotParallel,

    #[error(transparent)]
    LabeledArray(#[from] LabeledArrayError),
}

/// Reason for RANSAC failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RansacFailureReason {
    /// No hypothesis produced any inliers.
    NoInliersFound,
    /// Found some inliers but not enough to accept the model.
    InsufficientInliers,
}

impl fmt::Display for RansacFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RansacFailureReason::NoInliersFound => write!(f, "no inliers found"),
            RansacFailureReason::InsufficientInliers => write!(f, "insufficient inliers"),
        }
    }
}

/// A backend could not estimate a transform for one slice.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("Shape mismatch: source {source_shape:?}, reference {reference_shape:?}")]
    ShapeMismatch {
        source_shape: [usize; 3],
        reference_shape: [usize; 3],
    },

    #[error("image has no pixels or no registration channels")]
    EmptyImage,

    #[error("{image} image has no variance")]
    FlatImage { image: ArrayRole },

    #[error("{image} image has {count} NaN or infinite registration pixels")]
    NonFinite { image: ArrayRole, count: usize },

    #[error("correlation peak {peak:.4} is below the threshold {threshold:.4}")]
    NoCorrelationPeak { peak: f64, threshold: f64 },

    #[error("Insufficient features detected in the {image} image: found {found}, need {required}")]
    InsufficientFeatures {
        image: ArrayRole,
        found: usize,
        required: usize,
    },

    #[error("Insufficient feature matches: found {found}, need {required}")]
    InsufficientMatches { found: usize, required: usize },

    #[error("RANSAC failed: {reason} (iterations: {iterations}, best inlier count: {best_inlier_count})")]
    RansacFailed {
        reason: RansacFailureReason,
        iterations: usize,
        best_inlier_count: usize,
    },

    #[error("{0}")]
    Other(String),
}

/// A registrator was driven outside the register-then-warp protocol.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("warp_image called without a preceding successful register")]
    WarpWithoutRegister,

    #[error("warp_image returned shape {actual:?} for an input of shape {expected:?}")]
    WarpShapeChanged {
        expected: [usize; 3],
        actual: [usize; 3],
    },
}

/// Errors returned by [`coregistrate`](crate::coregistrate) and
/// [`coregistrate_timeseries`](crate::coregistrate_timeseries).
#[derive(Debug, Error)]
pub enum CoregError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Alignment failed for slice [{slice}]: {source}")]
    Alignment {
        slice: SliceIndex,
        #[source]
        source: AlignmentError,
    },

    #[error("Registrator contract violated for slice [{slice}]: {violation}")]
    ContractViolation {
        slice: SliceIndex,
        violation: ContractViolation,
    },
}

impl From<LabeledArrayError> for CoregError {
    fn from(err: LabeledArrayError) -> Self {
        CoregError::Configuration(err.into())
    }
}

pub type Result<T, E = CoregError> = std::result::Result<T, E>;

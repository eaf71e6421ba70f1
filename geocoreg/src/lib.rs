//! Geocoreg - coregistration of labeled raster stacks.
//!
//! Aligns every 2D multi-channel slice of an N-dimensional raster (a time
//! series, a stack over orbits and dates, ...) onto one reference image:
//! - Labeled arrays with named axes, coordinates and chunk layouts
//! - Slice decomposition over any extra axes, with the source layout restored
//! - Two-phase registrators: estimate a transform, then warp every channel
//! - Built-in backends: phase cross-correlation (`"pcc"`) and feature matching (`"feature"`)
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use geocoreg::{coregistrate_timeseries, CoregOptions};
//!
//! // `stack` has axes (time, y, x, band), `reference` has (y, x, band).
//! let options = CoregOptions::default().with_registration_band("red");
//! let aligned = coregistrate_timeseries(&stack, &reference, "pcc", None, &options)?;
//! assert_eq!(aligned.dims(), stack.dims());
//! ```

pub mod backends;
pub mod chunking;
pub mod config;
pub mod coregistration;
pub mod error;
pub mod labeled;
pub mod registrator;
pub mod registry;
pub mod transform;
pub mod warp;

#[cfg(test)]
mod testing;

// ============================================================================
// Entry points
// ============================================================================

pub use coregistration::{
    coregistrate, coregistrate_timeseries, RegistratorChoice, SliceIndex, SlicePlan,
};

// ============================================================================
// Data model
// ============================================================================

pub use chunking::{ChunkLayout, Chunking};
pub use config::{AxisNames, CoregOptions, DEFAULT_TIME_AXIS};
pub use labeled::{LabeledArray, LabeledArrayError};

// ============================================================================
// Registrators and backends
// ============================================================================

pub use backends::feature::{FeatureConfig, FeatureMatching, RansacConfig};
pub use backends::phase_correlation::{PhaseCorrelation, PhaseCorrelationConfig, SubpixelMethod};
pub use registrator::{Aligner, Registrator, TwoPhase};
pub use registry::{build, list_available, Backend};
pub use transform::{Transform, TransformType};
pub use warp::{warp_image, InterpolationMethod, WarpConfig};

// ============================================================================
// Errors
// ============================================================================

pub use error::{
    AlignmentError, ArrayRole, ConfigurationError, ContractViolation, CoregError,
    RansacFailureReason, Result,
};

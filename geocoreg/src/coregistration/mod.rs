//! Coregistration of N-dimensional raster stacks against a single reference.
//!
//! Every combination of indices over the source's extra axes (anything other
//! than the horizontal, vertical and channel axes) selects one 2D multi-channel
//! slice. Each slice is registered against the reference on the registration
//! channels, warped on all channels and written back at its own position. The
//! output keeps the source's axis order, coordinates and shape.

mod assemble;
mod driver;
mod plan;


use std::fmt;

use crate::config::{CoregOptions, DEFAULT_TIME_AXIS};
use crate::error::{ConfigurationError, Result};
use crate::labeled::LabeledArray;
use crate::registrator::Registrator;
use crate::registry::Backend;

pub use plan::SlicePlan;

/// Position of one slice: an index per extra axis, in source axis order.
///
/// Empty for inputs without extra axes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SliceIndex(Vec<(String, usize)>);

impl SliceIndex {
    pub fn new(positions: impl IntoIterator<Item = (String, usize)>) -> Self {
        Self(positions.into_iter().collect())
    }

    pub fn from_pairs<S: Into<String>>(positions: impl IntoIterator<Item = (S, usize)>) -> Self {
        Self::new(positions.into_iter().map(|(axis, i)| (axis.into(), i)))
    }

    pub fn positions(&self) -> &[(String, usize)] {
        &self.0
    }

    pub fn get(&self, axis: &str) -> Option<usize> {
        self.0.iter().find(|(a, _)| a == axis).map(|(_, i)| *i)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SliceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, (axis, index)) in self.0.iter().enumerate() {
            if n > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{axis}={index}")?;
        }
        Ok(())
    }
}

/// Which registrator drives a call.
pub enum RegistratorChoice<'a> {
    /// A built-in backend. Each call (or parallel worker) gets a fresh instance.
    Backend(Backend),
    /// A registry identifier, resolved before any slice is processed.
    Named(&'a str),
    /// A caller-owned registrator, driven sequentially.
    Instance(&'a mut dyn Registrator),
}

impl Default for RegistratorChoice<'_> {
    fn default() -> Self {
        RegistratorChoice::Backend(Backend::default())
    }
}

impl fmt::Debug for RegistratorChoice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistratorChoice::Backend(backend) => f.debug_tuple("Backend").field(backend).finish(),
            RegistratorChoice::Named(name) => f.debug_tuple("Named").field(name).finish(),
            RegistratorChoice::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

impl From<Backend> for RegistratorChoice<'_> {
    fn from(backend: Backend) -> Self {
        RegistratorChoice::Backend(backend)
    }
}

impl<'a> From<&'a str> for RegistratorChoice<'a> {
    fn from(name: &'a str) -> Self {
        RegistratorChoice::Named(name)
    }
}

impl<'a> From<&'a mut dyn Registrator> for RegistratorChoice<'a> {
    fn from(registrator: &'a mut dyn Registrator) -> Self {
        RegistratorChoice::Instance(registrator)
    }
}

impl<'a, R: Registrator> From<&'a mut R> for RegistratorChoice<'a> {
    fn from(registrator: &'a mut R) -> Self {
        RegistratorChoice::Instance(registrator)
    }
}

/// Registrator after name lookup.
enum Resolved<'a> {
    Backend(Backend),
    Instance(&'a mut dyn Registrator),
}

impl<'a> RegistratorChoice<'a> {
    fn resolve(self) -> Result<Resolved<'a>, ConfigurationError> {
        Ok(match self {
            RegistratorChoice::Backend(backend) => Resolved::Backend(backend),
            RegistratorChoice::Named(name) => Resolved::Backend(Backend::parse(name)?),
            RegistratorChoice::Instance(instance) => Resolved::Instance(instance),
        })
    }
}

/// Align every slice of `source` onto `reference`.
///
/// `source` must carry the horizontal, vertical and channel axes of
/// `options.axes` plus any number of extra axes; `reference` must carry exactly
/// those three axes with matching spatial sizes. Transforms are estimated on
/// `options.registration_bands` (all reference channels when unset) and applied
/// to every source channel.
///
/// The result has the source's axis order, coordinates and shape. When
/// `options.chunking` is set it is applied once, after all slices are written.
/// The first failing slice aborts the call; no partial result is returned.
pub fn coregistrate<'a>(
    source: &LabeledArray<f32>,
    reference: &LabeledArray<f32>,
    registrator: impl Into<RegistratorChoice<'a>>,
    options: &CoregOptions,
) -> Result<LabeledArray<f32>> {
    run(source, reference, registrator.into(), options, None)
}

/// [`coregistrate`] for a stack whose only extra axis is `time_axis`.
///
/// `None` uses [`DEFAULT_TIME_AXIS`]. Any other set of extra axes is a
/// [`ConfigurationError::TimeAxis`].
pub fn coregistrate_timeseries<'a>(
    source: &LabeledArray<f32>,
    reference: &LabeledArray<f32>,
    registrator: impl Into<RegistratorChoice<'a>>,
    time_axis: Option<&str>,
    options: &CoregOptions,
) -> Result<LabeledArray<f32>> {
    let time_axis = time_axis.unwrap_or(DEFAULT_TIME_AXIS);
    run(source, reference, registrator.into(), options, Some(time_axis))
}

fn run(
    source: &LabeledArray<f32>,
    reference: &LabeledArray<f32>,
    choice: RegistratorChoice<'_>,
    options: &CoregOptions,
    time_axis: Option<&str>,
) -> Result<LabeledArray<f32>> {
    let resolved = choice.resolve()?;
    if options.parallel && matches!(resolved, Resolved::Instance(_)) {
        return Err(ConfigurationError::SharedInstanceNotParallel.into());
    }

    let plan = SlicePlan::new(source, reference, options)?;
    if let Some(time_axis) = time_axis {
        if plan.extra_axes.len() != 1 || plan.extra_axes[0] != time_axis {
            return Err(ConfigurationError::TimeAxis {
                time_axis: time_axis.to_string(),
                extra: plan.extra_axes.clone(),
            }
            .into());
        }
    }
    if let Some(chunking) = &options.chunking {
        // Validate up front so a bad chunk request never costs a registration pass.
        chunking.layout(source.dims(), source.shape())?;
    }

    tracing::info!(
        slices = plan.num_slices(),
        extra_axes = ?plan.extra_axes,
        bands = ?plan.bands,
        parallel = options.parallel,
        "Coregistration started"
    );

    let stack = driver::SliceStack::new(&plan, source, reference)?;
    let aligned = match resolved {
        Resolved::Instance(registrator) => driver::run_sequential(&plan, &stack, registrator)?,
        Resolved::Backend(backend) if options.parallel => {
            let aligner = backend.aligner();
            driver::run_parallel(&plan, &stack, aligner.as_ref())?
        }
        Resolved::Backend(backend) => {
            let mut registrator = backend.registrator();
            driver::run_sequential(&plan, &stack, &mut registrator)?
        }
    };

    let output = assemble::assemble(&plan, source, aligned, options.chunking.as_ref())?;
    tracing::info!(slices = plan.num_slices(), "Coregistration finished");
    Ok(output)
}

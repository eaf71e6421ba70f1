//! Registry of the built-in registration backends.
//!
//! The set is closed: every identifier maps to a [`Backend`] variant.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::backends::feature::FeatureMatching;
use crate::backends::phase_correlation::PhaseCorrelation;
use crate::error::ConfigurationError;
use crate::registrator::{Aligner, TwoPhase};

/// Built-in backends, identified by their registry name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum Backend {
    /// Phase cross-correlation, translation only.
    #[default]
    #[strum(serialize = "pcc")]
    #[serde(rename = "pcc")]
    PhaseCorrelation,
    /// Corner features matched with RANSAC.
    #[strum(serialize = "feature")]
    #[serde(rename = "feature")]
    FeatureMatching,
}

impl Backend {
    /// Look up `name`, listing the valid identifiers on failure.
    pub fn parse(name: &str) -> Result<Self, ConfigurationError> {
        Backend::from_str(name).map_err(|_| ConfigurationError::UnknownBackend {
            name: name.to_string(),
            available: list_available().into_iter().map(String::from).collect(),
        })
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Fresh stateless aligner with default settings.
    pub fn aligner(self) -> Box<dyn Aligner> {
        match self {
            Backend::PhaseCorrelation => Box::new(PhaseCorrelation::default()),
            Backend::FeatureMatching => Box::new(FeatureMatching::default()),
        }
    }

    /// Fresh two-phase registrator with default settings.
    pub fn registrator(self) -> TwoPhase<Box<dyn Aligner>> {
        TwoPhase::new(self.aligner())
    }
}

/// Identifiers accepted by [`build`].
pub fn list_available() -> Vec<&'static str> {
    Backend::iter().map(Backend::name).collect()
}

/// Construct a registrator for `identifier`.
pub fn build(identifier: &str) -> Result<TwoPhase<Box<dyn Aligner>>, ConfigurationError> {
    let backend = Backend::parse(identifier)?;
    tracing::debug!(backend = backend.name(), "Built registrator");
    Ok(backend.registrator())
}

//! Options for a coregistration call.
//!
//! [`CoregOptions`] is plain data with serde support, so it can be built in code
//! with the `with_*` methods or loaded from a YAML/JSON file.

use std::path::Path;

use common::FileFormatResult;
use serde::{Deserialize, Deserializer, Serialize};

use crate::chunking::Chunking;

/// Axis name used by [`coregistrate_timeseries`](crate::coregistrate_timeseries)
/// when none is given.
pub const DEFAULT_TIME_AXIS: &str = "time";

/// Names of the three axes every registration input must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisNames {
    pub horizontal: String,
    pub vertical: String,
    pub channel: String,
}

impl Default for AxisNames {
    fn default() -> Self {
        Self {
            horizontal: "x".to_string(),
            vertical: "y".to_string(),
            channel: "band".to_string(),
        }
    }
}

impl AxisNames {
    pub fn new(
        horizontal: impl Into<String>,
        vertical: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            horizontal: horizontal.into(),
            vertical: vertical.into(),
            channel: channel.into(),
        }
    }

    /// True for the horizontal, vertical and channel axes.
    pub fn contains(&self, axis: &str) -> bool {
        axis == self.horizontal || axis == self.vertical || axis == self.channel
    }

    /// Image axis order used for every slice: vertical, horizontal, channel.
    pub fn image_order(&self) -> [&str; 3] {
        [
            self.vertical.as_str(),
            self.horizontal.as_str(),
            self.channel.as_str(),
        ]
    }
}

/// Settings for [`coregistrate`](crate::coregistrate).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoregOptions {
    /// Channels used to estimate each transform. `None` means every channel of
    /// the reference. The estimated transform is always applied to all channels.
    /// Files may give a single band name or a list.
    #[serde(deserialize_with = "one_or_many")]
    pub registration_bands: Option<Vec<String>>,
    pub axes: AxisNames,
    /// Chunk layout applied to the returned array.
    pub chunking: Option<Chunking>,
    /// Process slices on the rayon pool. Requires a registry backend.
    pub parallel: bool,
}

impl CoregOptions {
    pub fn with_registration_bands<S: Into<String>>(
        mut self,
        bands: impl IntoIterator<Item = S>,
    ) -> Self {
        self.registration_bands = Some(bands.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_registration_band(self, band: impl Into<String>) -> Self {
        self.with_registration_bands([band.into()])
    }

    pub fn with_axes(mut self, axes: AxisNames) -> Self {
        self.axes = axes;
        self
    }

    pub fn with_chunking(mut self, chunking: Chunking) -> Self {
        self.chunking = Some(chunking);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Load options from a `.yaml`/`.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> FileFormatResult<Self> {
        common::file_format::load_from_file(path)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let bands = Option::<OneOrMany>::deserialize(deserializer)?;
    Ok(bands.map(|bands| match bands {
        OneOrMany::One(band) => vec![band],
        OneOrMany::Many(bands) => bands,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SerdeFormat;

    #[test]
    fn test_defaults_match_conventional_axis_names() {
        let options = CoregOptions::default();
        assert_eq!(options.axes.horizontal, "x");
        assert_eq!(options.axes.vertical, "y");
        assert_eq!(options.axes.channel, "band");
        assert_eq!(options.axes.image_order(), ["y", "x", "band"]);
        assert!(options.registration_bands.is_none());
        assert!(options.chunking.is_none());
        assert!(!options.parallel);
    }

    #[test]
    fn test_single_band_builder() {
        let options = CoregOptions::default().with_registration_band("red");
        assert_eq!(options.registration_bands, Some(vec!["red".to_string()]));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml =
            "registration_bands: [red, nir]\naxes:\n  channel: bands\nchunking:\n  time: 1\n";
        let options: CoregOptions =
            common::file_format::deserialize(yaml, SerdeFormat::Yaml).unwrap();

        assert_eq!(
            options.registration_bands,
            Some(vec!["red".to_string(), "nir".to_string()])
        );
        assert_eq!(options.axes.channel, "bands");
        assert_eq!(options.axes.horizontal, "x");
        assert_eq!(options.chunking.unwrap().get("time"), Some(1));
        assert!(!options.parallel);
    }

    #[test]
    fn test_single_registration_band_string() {
        let options: CoregOptions =
            common::file_format::deserialize("registration_bands: red\n", SerdeFormat::Yaml)
                .unwrap();
        assert_eq!(options.registration_bands, Some(vec!["red".to_string()]));

        let options: CoregOptions =
            common::file_format::deserialize(r#"{"registration_bands": null}"#, SerdeFormat::Json)
                .unwrap();
        assert!(options.registration_bands.is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let options = CoregOptions::default()
            .with_axes(AxisNames::new("lon", "lat", "channel"))
            .with_chunking(Chunking::new().with("lat", 128))
            .with_parallel(true);

        let text = common::file_format::serialize(&options, SerdeFormat::Json).unwrap();
        let parsed: CoregOptions =
            common::file_format::deserialize(&text, SerdeFormat::Json).unwrap();
        assert_eq!(parsed, options);
    }

    #[test]
    fn test_axis_names_contains() {
        let axes = AxisNames::default();
        assert!(axes.contains("x"));
        assert!(axes.contains("band"));
        assert!(!axes.contains("time"));
    }
}

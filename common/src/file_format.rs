use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum FileFormatError {
    #[error("Failed to get file extension for file: {0}")]
    MissingFileExtension(String),
    #[error("Unsupported file extension for file: {0}")]
    UnsupportedFileExtension(String),
    #[error("Failed to read file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FileFormatResult<T> = Result<T, FileFormatError>;

pub fn get_file_extension(filename: &str) -> Option<&str> {
    Path::new(filename)
        .extension()
        .and_then(|os_str| os_str.to_str())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerdeFormat {
    Yaml,
    Json,
}

impl SerdeFormat {
    pub fn from_file_name(file_name: &str) -> FileFormatResult<Self> {
        let ext = get_file_extension(file_name)
            .ok_or_else(|| FileFormatError::MissingFileExtension(file_name.to_string()))?;

        if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            Ok(Self::Yaml)
        } else if ext.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(FileFormatError::UnsupportedFileExtension(
                file_name.to_string(),
            ))
        }
    }
}

pub fn serialize<T: Serialize>(value: &T, format: SerdeFormat) -> FileFormatResult<String> {
    match format {
        SerdeFormat::Yaml => Ok(serde_yml::to_string(value)?),
        SerdeFormat::Json => Ok(serde_json::to_string_pretty(value)?),
    }
}

pub fn deserialize<T: DeserializeOwned + 'static>(
    serialized: &str,
    format: SerdeFormat,
) -> FileFormatResult<T> {
    match format {
        SerdeFormat::Yaml => Ok(serde_yml::from_str(serialized)?),
        SerdeFormat::Json => Ok(serde_json::from_str(serialized)?),
    }
}

/// Reads `path` and deserializes it with the format implied by its extension.
pub fn load_from_file<T: DeserializeOwned + 'static>(
    path: impl AsRef<Path>,
) -> FileFormatResult<T> {
    let path = path.as_ref();
    let format = SerdeFormat::from_file_name(&path.to_string_lossy())?;
    let contents = std::fs::read_to_string(path).map_err(|source| FileFormatError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    deserialize(&contents, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        sizes: Vec<usize>,
    }

    #[test]
    fn format_from_file_name() {
        assert_eq!(
            SerdeFormat::from_file_name("options.yaml").unwrap(),
            SerdeFormat::Yaml
        );
        assert_eq!(
            SerdeFormat::from_file_name("options.YML").unwrap(),
            SerdeFormat::Yaml
        );
        assert_eq!(
            SerdeFormat::from_file_name("options.json").unwrap(),
            SerdeFormat::Json
        );
        assert!(matches!(
            SerdeFormat::from_file_name("options"),
            Err(FileFormatError::MissingFileExtension(_))
        ));
        assert!(matches!(
            SerdeFormat::from_file_name("options.toml"),
            Err(FileFormatError::UnsupportedFileExtension(_))
        ));
    }

    #[test]
    fn yaml_and_json_roundtrip() {
        let sample = Sample {
            name: "band".to_string(),
            sizes: vec![3, 4],
        };

        for format in [SerdeFormat::Yaml, SerdeFormat::Json] {
            let text = serialize(&sample, format).unwrap();
            let parsed: Sample = deserialize(&text, format).unwrap();
            assert_eq!(parsed, sample, "format {:?}", format);
        }
    }

    #[test]
    fn load_from_file_reads_yaml() {
        let path = std::env::temp_dir().join(format!(
            "common_file_format_{}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, "name: x\nsizes: [1, 2]\n").unwrap();

        let parsed: Sample = load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(parsed.name, "x");
        assert_eq!(parsed.sizes, vec![1, 2]);
    }

    #[test]
    fn load_from_missing_file_reports_path() {
        let err = load_from_file::<Sample>("/nonexistent/dir/options.json").unwrap_err();
        assert!(matches!(err, FileFormatError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/dir/options.json"));
    }
}

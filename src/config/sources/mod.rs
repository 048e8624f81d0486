//! Concrete [`ConfigSource`](super::ConfigSource) implementations.
//!
//! Provides the file-backed [`FileSource`](file_source::FileSource) for
//! YAML, JSON and TOML (each gated by a feature flag), plus
//! [`parse_config_str`] for format-specific deserialization and
//! [`create_file_source`] for picking a source from a file extension.

pub mod file_source;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::model::Config;
use crate::config::ConfigSource;
use crate::error::BroadcasterError;
use file_source::FileSource;

/// File names tried in the working directory when no `--config` is given.
pub const AUTO_DETECT_CANDIDATES: &[&str] = &[
    "broadcaster.yaml",
    "broadcaster.yml",
    "broadcaster.json",
    "broadcaster.toml",
];

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, BroadcasterError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| BroadcasterError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| BroadcasterError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| BroadcasterError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(BroadcasterError::UnsupportedFormat(other.to_string())),
    }
}

/// Build the file source matching `path`'s extension.
pub fn create_file_source(path: &Path) -> Result<Box<dyn ConfigSource>, BroadcasterError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let path = path.to_path_buf();

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(Box::new(FileSource::new(path, "yaml", |content| {
            serde_yml::from_str::<Config>(content).map_err(Into::into)
        }))),

        #[cfg(feature = "json")]
        "json" => Ok(Box::new(FileSource::new(path, "json", |content| {
            serde_json::from_str::<Config>(content).map_err(Into::into)
        }))),

        #[cfg(feature = "toml")]
        "toml" => Ok(Box::new(FileSource::new(path, "toml", |content| {
            toml::from_str::<Config>(content).map_err(Into::into)
        }))),

        other => Err(BroadcasterError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

//! Caches file on disk.
//!
//! A [`FileSource`] keeps only the path and the parser for its format.
//! Nothing is cached between calls: every [`load`](ConfigSource::load)
//! reads the file again, so the source built at startup is the one a
//! SIGHUP reload goes back to.

use std::path::PathBuf;

use async_trait::async_trait;

use super::sha256_hex;
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::BroadcasterError;

/// Format-specific text to [`Config`] conversion.
pub type Parser = fn(&str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>>;

pub struct FileSource {
    path: PathBuf,
    format: &'static str,
    parser: Parser,
}

impl FileSource {
    #[must_use]
    pub fn new(path: PathBuf, format: &'static str, parser: Parser) -> Self {
        Self {
            path,
            format,
            parser,
        }
    }

    /// A missing file is a config error, anything else is I/O.
    async fn read(&self) -> Result<String, BroadcasterError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BroadcasterError::ConfigFileNotFound {
                    path: self.path.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn parse(&self, content: &str) -> Result<Config, BroadcasterError> {
        let config = (self.parser)(content).map_err(|source| BroadcasterError::ConfigParse {
            path: self.path.display().to_string(),
            source,
        })?;
        validate(&config).map_err(|errors| BroadcasterError::ConfigValidation { errors })?;
        Ok(config)
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        self.format
    }

    /// Read, parse and validate the file as it is on disk right now.
    ///
    /// The version is the digest of the raw bytes, so a reload of an
    /// unchanged file yields the same version.
    async fn load(&self) -> Result<(Config, ConfigVersion), BroadcasterError> {
        let content = self.read().await?;
        let config = self.parse(&content)?;
        let version = ConfigVersion::Hash(sha256_hex(content.as_bytes()));

        tracing::debug!(
            path = %self.path.display(),
            format = self.format,
            groups = config.groups.len(),
            "caches file read"
        );
        Ok((config, version))
    }
}

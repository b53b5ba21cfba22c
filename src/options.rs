//! Map configuration and its TOML loader.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Behaviour switches shared by every map created from one
/// [`crate::HelperData`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapOptions {
    /// Try the legacy ISO-9075 path encoding for path keys and decode legacy
    /// `_xHHHH_` property names into cache keys.
    pub legacy_path_encoding: bool,
    /// Buffer size in bytes used when draining binaries into strings.
    pub stream_buffer_size: usize,
    /// Fetch the session's namespace prefixes once per helper instead of on
    /// every prefixed key.
    pub cache_namespace_prefixes: bool,
    /// Expose `sling:resourceType` as the primary type when it is not set.
    pub synthesize_resource_type: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            legacy_path_encoding: true,
            stream_buffer_size: 2048,
            cache_namespace_prefixes: true,
            synthesize_resource_type: true,
        }
    }
}

impl MapOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the legacy ISO-9075 encodings are honoured.
    pub fn legacy_path_encoding(mut self, enabled: bool) -> Self {
        self.legacy_path_encoding = enabled;
        self
    }

    /// Sets the buffer size for draining binaries; zero keeps the default.
    pub fn stream_buffer_size(mut self, bytes: usize) -> Self {
        if bytes > 0 {
            self.stream_buffer_size = bytes;
        }
        self
    }

    /// Sets whether namespace prefixes are cached.
    pub fn cache_namespace_prefixes(mut self, enabled: bool) -> Self {
        self.cache_namespace_prefixes = enabled;
        self
    }

    /// Sets whether the resource type falls back to the primary type.
    pub fn synthesize_resource_type(mut self, enabled: bool) -> Self {
        self.synthesize_resource_type = enabled;
        self
    }

    /// Parses options from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let options: MapOptions =
            toml::from_str(text).map_err(|source| ConfigError::Syntax { source })?;
        options.validate()
    }

    /// Loads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let options: MapOptions = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        options.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.stream_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                field: "stream_buffer_size",
                reason: "must be greater than zero",
            });
        }
        Ok(self)
    }
}

/// Failure while loading [`MapOptions`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The options file could not be read.
    #[error("failed to read map options {path}: {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// The I/O failure.
        source: std::io::Error,
    },
    /// The options file is not valid TOML for [`MapOptions`].
    #[error("failed to parse map options {path}: {source}")]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// The decoder's error.
        source: toml::de::Error,
    },
    /// An in-memory options string is not valid TOML for [`MapOptions`].
    #[error("failed to parse map options: {source}")]
    Syntax {
        /// The decoder's error.
        source: toml::de::Error,
    },
    /// An option parsed but holds an unusable value.
    #[error("map option '{field}' {reason}")]
    Invalid {
        /// Name of the offending option.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

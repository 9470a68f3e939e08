//! Connection configuration
//!
//! The connection URL lives in a Java-style `.properties` file under the
//! `connection.url` key. `ROSTER_CONNECTION_URL` overrides the file when set.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Properties file read when no other path is given
pub const DEFAULT_PROPERTIES_FILE: &str = "app.properties";

/// Key holding the connection URL
pub const CONNECTION_URL_KEY: &str = "connection.url";

/// Environment variable that takes precedence over the properties file
pub const CONNECTION_URL_ENV: &str = "ROSTER_CONNECTION_URL";

/// Error types for configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Properties file could not be read
    #[error("Failed to read properties file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Required key missing or empty
    #[error("Missing required property: {0}")]
    MissingKey(&'static str),
}

/// Where to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Database URL, e.g. `sqlite://./roster.db?mode=rwc` or `postgres://...`
    pub url: String,
}

impl ConnectionConfig {
    /// Read the URL from the environment override, falling back to `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::env::var(CONNECTION_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Ok(Self {
                url: url.trim().to_string(),
            }),
            _ => Self::from_file(path),
        }
    }

    /// Read the URL from a properties file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        content.parse()
    }
}

impl FromStr for ConnectionConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let url = parse_properties(content)
            .remove(CONNECTION_URL_KEY)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingKey(CONNECTION_URL_KEY))?;

        Ok(Self { url })
    }
}

/// Parse `key=value` / `key: value` lines.
///
/// Lines starting with `#` or `!` are comments. Continuation lines and
/// escape sequences are not supported. Later keys win.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            let (key, value) = line.split_at(split);
            Some((key.trim().to_string(), value[1..].trim().to_string()))
        })
        .collect()
}

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while configuring or composing the cache, and while routing.
///
/// Store operations (`get`/`set`/`delete`) never surface errors: storage
/// failures degrade to a miss and are only logged.
#[derive(Debug, Error)]
pub enum Error {
  #[error("Failed to read configuration file: {0}")]
  ConfigRead(#[from] std::io::Error),

  #[error("Failed to parse configuration: {0}")]
  ConfigParse(String),

  #[error("Invalid configuration value for '{field}': {message}")]
  InvalidConfigValue { field: String, message: String },

  #[error("Cache directory {0:?} does not exist or is not a directory")]
  CacheDirMissing(PathBuf),

  #[error("Invalid backend URL '{backend}': {source}")]
  InvalidBackendUrl {
    backend: String,
    source: url::ParseError,
  },

  /// No backend is configured. Fatal to the request, not retryable here.
  #[error("no backends configured")]
  NoBackends,
}

impl Error {
  pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
    Error::InvalidConfigValue {
      field: field.to_string(),
      message: message.into(),
    }
  }
}

/// A specialized `Result` type for `fibre_proxy_cache` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

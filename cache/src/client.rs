use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::router::{HashRing, Picker};

/// Where a request for one origin should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
  /// The backend proxy chosen for the origin.
  pub backend: String,
  /// The origin to fetch, passed to the backend under [`Route::ORIGIN_PARAM`].
  pub origin: String,
}

impl Route {
  /// Query parameter the backend reads the origin from.
  pub const ORIGIN_PARAM: &'static str = "q";

  /// The URL to send to the backend: the backend URL, path included, with its
  /// query replaced by the escaped origin under [`Route::ORIGIN_PARAM`].
  pub fn forward_url(&self) -> Result<Url> {
    let mut url = Url::parse(&self.backend).map_err(|source| Error::InvalidBackendUrl {
      backend: self.backend.clone(),
      source,
    })?;
    url.set_fragment(None);
    url
      .query_pairs_mut()
      .clear()
      .append_pair(Self::ORIGIN_PARAM, &self.origin);
    Ok(url)
  }
}

/// Client-side sharding: picks the backend proxy for each origin so that the
/// same origin always lands on the same backend cache.
#[derive(Clone)]
pub struct ShardClient {
  picker: Arc<dyn Picker>,
}

impl fmt::Debug for ShardClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardClient").finish_non_exhaustive()
  }
}

impl Default for ShardClient {
  fn default() -> Self {
    Self::with_picker(Arc::new(HashRing::default()))
  }
}

impl ShardClient {
  /// A client backed by a [`HashRing`]. Fails if `config` is invalid.
  pub fn new(config: RouterConfig) -> Result<Self> {
    Ok(Self::with_picker(Arc::new(HashRing::new(config)?)))
  }

  pub fn with_picker(picker: Arc<dyn Picker>) -> Self {
    Self { picker }
  }

  /// Replaces the set of reachable backends.
  pub fn set_backends<I, B>(&self, backends: I)
  where
    I: IntoIterator<Item = B>,
    B: Into<String>,
  {
    self
      .picker
      .set(backends.into_iter().map(Into::into).collect());
  }

  /// Resolves `origin` to its backend.
  ///
  /// Fails with [`Error::NoBackends`] when no backend is configured. The
  /// caller should fail the request rather than retry.
  pub fn route(&self, origin: &str) -> Result<Route> {
    match self.picker.pick(origin) {
      Some(backend) => {
        tracing::trace!(origin, backend = %backend, "routed origin");
        Ok(Route {
          backend,
          origin: origin.to_string(),
        })
      }
      None => {
        tracing::debug!(origin, "no backend available for origin");
        Err(Error::NoBackends)
      }
    }
  }
}

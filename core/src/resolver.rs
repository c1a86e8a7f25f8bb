//! Ordered fall-through over candidate paths.
//!
//! A resource may live under more than one routing prefix depending on the
//! backend deployment. The resolver tries the candidates of one logical
//! operation in order and only moves on when a candidate answers 404. Any
//! other failure means the right endpoint was reached and the operation itself
//! failed, so it is returned immediately.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::http::RequestSpec;
use crate::transport::Transport;

/// Ordered paths for one logical resource. First success wins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CandidateList(Vec<String>);

impl CandidateList {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    /// Append `suffix` (typically `?query`) to every candidate.
    pub fn with_suffix(self, suffix: &str) -> Self {
        if suffix.is_empty() {
            return self;
        }
        Self(self.0.into_iter().map(|p| format!("{p}{suffix}")).collect())
    }

    pub fn paths(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Send `template` to each candidate path in turn.
///
/// Returns the first success. A 404 advances to the next candidate; any other
/// error, including a network failure with no status, is returned at once.
/// When every candidate answered 404 the last 404 is returned, and an empty
/// list yields `ApiError::NoEndpoints`.
pub async fn resolve(
    transport: &Transport,
    candidates: &CandidateList,
    template: &RequestSpec,
) -> Result<Option<Value>, ApiError> {
    let mut last_not_found = None;

    for path in candidates.paths() {
        match transport.send(&template.with_path(path.as_str())).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_not_found() => {
                debug!(%path, "candidate not found, trying next");
                last_not_found = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    match last_not_found {
        Some(err) => {
            warn!(candidates = ?candidates.paths(), "no candidate path matched");
            Err(err)
        }
        None => Err(ApiError::NoEndpoints),
    }
}

//! Core types for the ApiAxle management client.
//!
//! Everything here is transport-agnostic: configuration, the error taxonomy,
//! the [`Transport`] seam, envelope decoding and the statistics vocabulary.
//! The HTTP implementation and the resource accessors live in `axle-client`.

use std::borrow::Cow;

pub mod config;
pub mod envelope;
pub mod error;
pub mod stats;

pub use error::{AxleError, Result};
pub use reqwest::Method;
pub use stats::{Buckets, Granularity, HitType, Stats};

/// Version prefix inserted between the service address and every resource path.
pub const DEFAULT_VERSION_ENDPOINT: &str = "/v1/";

/// Where a local mirror of a remote resource stands relative to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProxyState {
    /// Built locally; the next save creates the resource.
    #[default]
    PendingCreate,
    /// Known to exist on the server; the next save is an update.
    Persisted,
    /// Removed from the server through this proxy; saving is refused.
    Deleted,
}

impl ProxyState {
    pub fn is_pending_create(self) -> bool {
        self == Self::PendingCreate
    }
}

/// Executes one HTTP exchange and returns the raw response body.
///
/// Implementations report non-success statuses as [`AxleError::Api`] so the
/// accessors only ever see bodies from successful responses.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<Vec<u8>>;
}

/// Percent-encode one path segment or query value.
///
/// Everything outside the unreserved set is escaped, so `"a b/c"` becomes
/// `a%20b%2Fc`.
pub fn escape(segment: &str) -> Cow<'_, str> {
    urlencoding::encode(segment)
}

/// Join a service address and a version prefix into the root every resource
/// path is appended to.  The result always ends in `/`.
pub fn base_url(address: &str, version_endpoint: &str) -> String {
    let address = address.trim_end_matches('/');
    let version = version_endpoint.trim_matches('/');
    if version.is_empty() {
        format!("{address}/")
    } else {
        format!("{address}/{version}/")
    }
}

/// Convert an epoch-millisecond timestamp, treating zero as unset.
pub fn millis_to_datetime(millis: f64) -> Option<chrono::DateTime<chrono::Utc>> {
    if millis == 0.0 || !millis.is_finite() {
        return None;
    }
    chrono::DateTime::from_timestamp_millis(millis as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_reserved_characters() {
        assert_eq!(escape("a b/c"), "a%20b%2Fc");
        assert_eq!(escape("plain-id_1.2~"), "plain-id_1.2~");
        assert_eq!(escape("k?x=1&y"), "k%3Fx%3D1%26y");
    }

    #[test]
    fn base_url_normalises_slashes() {
        assert_eq!(
            base_url("http://localhost:3000", "/v1/"),
            "http://localhost:3000/v1/"
        );
        assert_eq!(
            base_url("http://localhost:3000/", "v1"),
            "http://localhost:3000/v1/"
        );
        assert_eq!(base_url("http://api.example", ""), "http://api.example/");
    }

    #[test]
    fn fresh_state_is_pending_create() {
        assert!(ProxyState::default().is_pending_create());
        assert!(!ProxyState::Persisted.is_pending_create());
        assert!(!ProxyState::Deleted.is_pending_create());
    }

    #[test]
    fn zero_millis_is_unset() {
        assert!(millis_to_datetime(0.0).is_none());
        let dt = millis_to_datetime(1_395_849_600_000.0).unwrap();
        assert_eq!(dt.timestamp(), 1_395_849_600);
    }
}

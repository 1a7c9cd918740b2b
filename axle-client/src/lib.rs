//! ApiAxle management API client.
//!
//! Local objects mirror remote resources.  A [`Keyring`] built with
//! [`Keyring::new`] is *pending create*: its first [`save`](Keyring::save)
//! POSTs it to the server.  One obtained from [`get_keyring`] or
//! [`keyrings`] is already persisted.
//!
//! # Architecture
//!
//! - **`http`**: reqwest implementation of [`axle_core::Transport`]
//! - **`keyring`**: keyring accessors (create, fetch, delete, link/unlink, keys, stats, list)
//! - **`key`**: the key entity returned by keyring relations
//! - **`collection`**: decoding of `identifier → fields` result maps
//! - **`stats`**: stats query building and response parsing
//!
//! # Usage
//!
//! ```rust,ignore
//! use axle_client::{Axle, Keyring};
//! use axle_core::config::Config;
//!
//! let axle = Axle::connect(&Config::default())?;
//! let mut ring = Keyring::new(&axle, "partners");
//! ring.save().await?;
//! let key = ring.link_key("acme-key").await?;
//! ```

use std::sync::Arc;

use axle_core::config::{Config, ServiceConfig};
use axle_core::{Method, Result, Transport};
use tracing::debug;

pub mod collection;
pub mod http;
pub mod key;
pub mod keyring;
pub mod stats;

pub use http::HttpTransport;
pub use key::Key;
pub use keyring::{
    Keyring, delete_keyring, get_keyring, keyring_keys, keyring_link_key, keyring_stats,
    keyring_unlink_key, keyrings,
};
pub use stats::StatsQuery;

/// Connection handle: where the service lives and how to reach it.
///
/// Cheap to clone; every proxy carries its own copy so there is no
/// process-wide state.
#[derive(Clone)]
pub struct Axle {
    address: String,
    base: String,
    allow_keyring_update: bool,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Axle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Axle")
            .field("address", &self.address)
            .field("base", &self.base)
            .field("allow_keyring_update", &self.allow_keyring_update)
            .finish()
    }
}

impl Axle {
    /// Build a handle that talks HTTP using the settings in `config`.
    pub fn connect(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.http)?;
        Ok(Self::with_transport(&config.service, Arc::new(transport)))
    }

    pub fn with_transport(service: &ServiceConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            address: service.address.clone(),
            base: axle_core::base_url(&service.address, &service.version_endpoint),
            allow_keyring_update: service.allow_keyring_update,
            transport,
        }
    }

    /// The service address this handle was built with.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn allow_keyring_update(&self) -> bool {
        self.allow_keyring_update
    }

    /// Absolute URL for a path relative to the version prefix.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub(crate) async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        debug!(%method, url, "axle request");
        self.transport.request(method, url, body).await
    }
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use axle_core::config::ServiceConfig;
    use axle_core::{AxleError, Method, Result, Transport};

    use crate::Axle;

    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: Method,
        pub url: String,
        pub body: Option<Vec<u8>>,
    }

    impl Recorded {
        pub fn body_json(&self) -> serde_json::Value {
            serde_json::from_slice(self.body.as_deref().unwrap_or(b"null")).unwrap()
        }
    }

    /// Replays canned response bodies in order and records every request.
    #[derive(Default)]
    pub struct MockTransport {
        responses: Mutex<VecDeque<Result<Vec<u8>>>>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl MockTransport {
        pub fn respond(self, body: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(body.as_bytes().to_vec()));
            self
        }

        pub fn fail(self, err: AxleError) -> Self {
            self.responses.lock().unwrap().push_back(Err(err));
            self
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn request(
            &self,
            method: Method,
            url: &str,
            body: Option<Vec<u8>>,
        ) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push(Recorded {
                method,
                url: url.to_string(),
                body,
            });
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AxleError::Decode("no canned response left".to_string())))
        }
    }

    pub const ADDRESS: &str = "http://axle.test:3000";

    pub fn axle(mock: &Arc<MockTransport>) -> Axle {
        let service = ServiceConfig {
            address: ADDRESS.to_string(),
            ..ServiceConfig::default()
        };
        Axle::with_transport(&service, mock.clone())
    }

    pub fn axle_with_updates(mock: &Arc<MockTransport>) -> Axle {
        let service = ServiceConfig {
            address: ADDRESS.to_string(),
            allow_keyring_update: true,
            ..ServiceConfig::default()
        };
        Axle::with_transport(&service, mock.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path() {
        let mock = Arc::new(testing::MockTransport::default());
        let axle = testing::axle(&mock);
        assert_eq!(axle.url("keyrings"), "http://axle.test:3000/v1/keyrings");
        assert_eq!(axle.address(), "http://axle.test:3000");
        assert!(!axle.allow_keyring_update());
    }

    #[test]
    fn debug_omits_transport() {
        let mock = Arc::new(testing::MockTransport::default());
        let rendered = format!("{:?}", testing::axle(&mock));
        assert!(rendered.contains("axle.test"));
        assert!(!rendered.contains("transport"));
    }
}

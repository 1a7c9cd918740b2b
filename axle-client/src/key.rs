//! The key entity.
//!
//! Keys come back from keyring relations (`linkkey`, `unlinkkey`, `keys`).
//! Only the entity itself lives here; it is always decoded from a server
//! response.

use std::fmt;

use axle_core::{AxleError, ProxyState, Result, escape, millis_to_datetime};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::Axle;

#[derive(Clone)]
pub struct Key {
    identifier: String,
    /// Secret used to sign requests when the API demands signatures.
    pub shared_secret: Option<String>,
    /// Queries allowed per second.
    pub qps: Option<i64>,
    /// Queries allowed per minute.
    pub qpm: Option<i64>,
    /// Queries allowed per day.
    pub qpd: Option<i64>,
    pub disabled: Option<bool>,
    created_at: f64,
    updated_at: f64,
    axle: Axle,
    state: ProxyState,
}

/// Key fields as the server returns them.  The identifier comes from the
/// request or the collection map key, never from the payload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct KeyRecord {
    shared_secret: Option<String>,
    qps: Option<i64>,
    qpm: Option<i64>,
    qpd: Option<i64>,
    disabled: Option<bool>,
    created_at: Option<f64>,
    updated_at: Option<f64>,
}

impl Key {
    /// A local, not yet created key.
    pub fn new(axle: &Axle, identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            shared_secret: None,
            qps: None,
            qpm: None,
            qpd: None,
            disabled: None,
            created_at: 0.0,
            updated_at: 0.0,
            axle: axle.clone(),
            state: ProxyState::PendingCreate,
        }
    }

    /// Build a persisted key from the fields the server returned for it.
    pub(crate) fn from_fields(
        axle: &Axle,
        identifier: String,
        fields: Map<String, Value>,
    ) -> Result<Self> {
        let record: KeyRecord =
            serde_json::from_value(Value::Object(fields)).map_err(AxleError::decode)?;
        let mut key = Self::new(axle, identifier);
        key.apply(record);
        key.state = ProxyState::Persisted;
        Ok(key)
    }

    /// Build a persisted key from a response envelope.
    pub(crate) fn from_response(
        axle: &Axle,
        identifier: &str,
        body: &[u8],
        path: &[&str],
    ) -> Result<Self> {
        let record: KeyRecord = axle_core::envelope::unwrap(body, path)?;
        let mut key = Self::new(axle, identifier);
        key.apply(record);
        key.state = ProxyState::Persisted;
        Ok(key)
    }

    fn apply(&mut self, record: KeyRecord) {
        if record.shared_secret.is_some() {
            self.shared_secret = record.shared_secret;
        }
        if record.qps.is_some() {
            self.qps = record.qps;
        }
        if record.qpm.is_some() {
            self.qpm = record.qpm;
        }
        if record.qpd.is_some() {
            self.qpd = record.qpd;
        }
        if record.disabled.is_some() {
            self.disabled = record.disabled;
        }
        if let Some(created_at) = record.created_at {
            self.created_at = created_at;
        }
        if let Some(updated_at) = record.updated_at {
            self.updated_at = updated_at;
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn state(&self) -> ProxyState {
        self.state
    }

    pub fn is_pending_create(&self) -> bool {
        self.state.is_pending_create()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.created_at)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.updated_at)
    }

    /// Resource URL of this key.
    pub fn url(&self) -> String {
        self.axle.url(&format!("key/{}", escape(&self.identifier)))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("identifier", &self.identifier)
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "[redacted]"))
            .field("qps", &self.qps)
            .field("qpm", &self.qpm)
            .field("qpd", &self.qpd)
            .field("disabled", &self.disabled)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{MockTransport, axle};

    #[test]
    fn new_key_is_pending() {
        let mock = Arc::new(MockTransport::default());
        let key = Key::new(&axle(&mock), "k");
        assert!(key.is_pending_create());
        assert!(key.created_at().is_none());
    }

    #[test]
    fn from_fields_decodes_quotas() {
        let mock = Arc::new(MockTransport::default());
        let fields = serde_json::json!({
            "sharedSecret": "s3cr3t",
            "qps": 2,
            "qpd": 172800,
            "disabled": false,
            "createdAt": 1395849600000u64
        });
        let Value::Object(fields) = fields else {
            unreachable!()
        };
        let key = Key::from_fields(&axle(&mock), "k1".to_string(), fields).unwrap();
        assert_eq!(key.identifier(), "k1");
        assert_eq!(key.shared_secret.as_deref(), Some("s3cr3t"));
        assert_eq!(key.qps, Some(2));
        assert_eq!(key.qpm, None);
        assert_eq!(key.qpd, Some(172_800));
        assert_eq!(key.disabled, Some(false));
        assert_eq!(key.state(), ProxyState::Persisted);
        assert_eq!(key.created_at().unwrap().timestamp(), 1_395_849_600);
    }

    #[test]
    fn url_escapes_identifier() {
        let mock = Arc::new(MockTransport::default());
        let key = Key::new(&axle(&mock), "a b/c");
        assert_eq!(key.url(), "http://axle.test:3000/v1/key/a%20b%2Fc");
    }

    #[test]
    fn debug_redacts_secret() {
        let mock = Arc::new(MockTransport::default());
        let mut key = Key::new(&axle(&mock), "k");
        key.shared_secret = Some("hunter2".to_string());
        let rendered = format!("{key:?}");
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn payload_identifier_is_ignored() {
        let mock = Arc::new(MockTransport::default());
        let body = br#"{"results":{"identifier":"other","qpm":60}}"#;
        let key = Key::from_response(&axle(&mock), "k1", body, axle_core::envelope::RESULTS).unwrap();
        assert_eq!(key.identifier(), "k1");
        assert_eq!(key.qpm, Some(60));
        assert_eq!(key.url(), "http://axle.test:3000/v1/key/k1");
    }
}

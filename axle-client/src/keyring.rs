//! Keyring accessors.
//!
//! Every operation exists twice: as a method on a [`Keyring`] and as a free
//! function taking the [`Axle`] handle and identifiers, for callers that have
//! no local copy of the keyring.

use std::fmt;

use axle_core::envelope::{self, RESULTS, RESULTS_NEW};
use axle_core::{
    AxleError, Granularity, Method, ProxyState, Result, Stats, escape, millis_to_datetime,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::collection::{decode_collection, range_query};
use crate::stats::{StatsQuery, parse_stats};
use crate::{Axle, Key, is_zero};

/// Local mirror of a named group of keys.
#[derive(Clone)]
pub struct Keyring {
    identifier: String,
    /// Creation time in epoch milliseconds; server managed.
    pub created_at: f64,
    /// Last update in epoch milliseconds; stamped on every save.
    pub updated_at: f64,
    axle: Axle,
    state: ProxyState,
}

/// Wire form of a keyring.  The identifier travels in the URL only; an
/// `identifier` field in a response is ignored.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyringRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<f64>,
}

impl Keyring {
    /// A local keyring; the first [`save`](Self::save) creates it remotely.
    pub fn new(axle: &Axle, identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            created_at: 0.0,
            updated_at: 0.0,
            axle: axle.clone(),
            state: ProxyState::PendingCreate,
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

    pub fn axle(&self) -> &Axle {
        &self.axle
    }

    /// Resource URL of this keyring.
    pub fn url(&self) -> String {
        keyring_url(&self.axle, &self.identifier)
    }

    /// JSON body as sent on create or update.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.record()).map_err(AxleError::Encode)
    }

    /// Overwrite local fields from a JSON object such as one produced by
    /// [`to_json`](Self::to_json) or returned by the server.
    pub fn apply_json(&mut self, json: &[u8]) -> Result<()> {
        let record: KeyringRecord = serde_json::from_slice(json).map_err(AxleError::decode)?;
        self.apply(record);
        Ok(())
    }

    fn record(&self) -> KeyringRecord {
        KeyringRecord {
            created_at: (!is_zero(&self.created_at)).then_some(self.created_at),
            updated_at: (!is_zero(&self.updated_at)).then_some(self.updated_at),
        }
    }

    fn apply(&mut self, record: KeyringRecord) {
        if let Some(created_at) = record.created_at {
            self.created_at = created_at;
        }
        if let Some(updated_at) = record.updated_at {
            self.updated_at = updated_at;
        }
    }

    fn from_fields(axle: &Axle, identifier: String, fields: Map<String, Value>) -> Result<Self> {
        let record: KeyringRecord =
            serde_json::from_value(Value::Object(fields)).map_err(AxleError::decode)?;
        let mut keyring = Self::new(axle, identifier);
        keyring.apply(record);
        keyring.state = ProxyState::Persisted;
        Ok(keyring)
    }

    /// Create this keyring on the server, or update it when updates are
    /// enabled in the service config.
    ///
    /// A keyring that is already persisted cannot be saved unless
    /// `allow_keyring_update` is set; obtain existing keyrings with
    /// [`get_keyring`] rather than [`Keyring::new`], otherwise the save
    /// attempts to create a second keyring of the same name.
    pub async fn save(&mut self) -> Result<()> {
        let (method, path) = match self.state {
            ProxyState::PendingCreate => (Method::POST, RESULTS),
            ProxyState::Persisted if self.axle.allow_keyring_update() => (Method::PUT, RESULTS_NEW),
            ProxyState::Persisted => return Err(AxleError::UpdateUnsupported("keyring")),
            ProxyState::Deleted => {
                return Err(AxleError::Deleted(format!("keyring {}", self.identifier)));
            }
        };

        let updated_at = Utc::now().timestamp_millis() as f64;
        let outgoing = KeyringRecord {
            updated_at: Some(updated_at),
            ..self.record()
        };
        let body = serde_json::to_vec(&outgoing).map_err(AxleError::Encode)?;
        let url = self.url();
        let resp = self.axle.send(method, &url, Some(body)).await?;

        let record: KeyringRecord = envelope::unwrap(&resp, path)?;
        self.updated_at = updated_at;
        self.apply(record);
        self.state = ProxyState::Persisted;
        debug!(identifier = %self.identifier, "keyring saved");
        Ok(())
    }

    /// Delete this keyring on the server.  Later saves of this copy fail.
    pub async fn delete(&mut self) -> Result<()> {
        delete_keyring(&self.axle, &self.identifier).await?;
        self.state = ProxyState::Deleted;
        Ok(())
    }

    /// Associate a key with this keyring.
    pub async fn link_key(&self, key_identifier: &str) -> Result<Key> {
        keyring_link_key(&self.axle, &self.identifier, key_identifier).await
    }

    /// Disassociate a key from this keyring.
    pub async fn unlink_key(&self, key_identifier: &str) -> Result<Key> {
        keyring_unlink_key(&self.axle, &self.identifier, key_identifier).await
    }

    /// Keys belonging to this keyring, `from`..`to` by index.
    pub async fn keys(&self, from: u32, to: u32) -> Result<Vec<Key>> {
        keyring_keys(&self.axle, &self.identifier, from, to).await
    }

    pub async fn stats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Stats> {
        let query = StatsQuery::new(from, to, granularity);
        keyring_stats(&self.axle, &self.identifier, &query).await
    }

    /// Stats narrowed to one key of this keyring.
    pub async fn stats_for_key(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        key_identifier: &str,
        granularity: Granularity,
    ) -> Result<Stats> {
        let query = StatsQuery::new(from, to, granularity).for_key(key_identifier);
        keyring_stats(&self.axle, &self.identifier, &query).await
    }

    /// Stats narrowed to one API.
    pub async fn stats_for_api(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        api_identifier: &str,
        granularity: Granularity,
    ) -> Result<Stats> {
        let query = StatsQuery::new(from, to, granularity).for_api(api_identifier);
        keyring_stats(&self.axle, &self.identifier, &query).await
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("identifier", &self.identifier)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("address", &self.axle.address())
            .field("state", &self.state)
            .finish()
    }
}

impl fmt::Display for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(&self.record()) {
            Ok(json) => write!(f, "Keyring - {}: {json}", self.url()),
            Err(_) => f.write_str("<nil>"),
        }
    }
}

fn keyring_url(axle: &Axle, identifier: &str) -> String {
    axle.url(&format!("keyring/{}", escape(identifier)))
}

/// Fetch an existing keyring.
pub async fn get_keyring(axle: &Axle, identifier: &str) -> Result<Keyring> {
    let url = keyring_url(axle, identifier);
    let resp = axle.send(Method::GET, &url, None).await?;

    let record: KeyringRecord = envelope::unwrap(&resp, RESULTS)?;
    let mut keyring = Keyring::new(axle, identifier);
    keyring.apply(record);
    keyring.state = ProxyState::Persisted;
    Ok(keyring)
}

/// Delete a keyring.  Succeeds only on an explicit `{"results": true}`.
pub async fn delete_keyring(axle: &Axle, identifier: &str) -> Result<()> {
    let url = keyring_url(axle, identifier);
    let resp = axle.send(Method::DELETE, &url, None).await?;

    if !envelope::acknowledgement(&resp)? {
        return Err(AxleError::DeleteRejected(url));
    }
    debug!(identifier, "keyring deleted");
    Ok(())
}

/// Associate `key_identifier` with a keyring and return the key.
pub async fn keyring_link_key(
    axle: &Axle,
    keyring_identifier: &str,
    key_identifier: &str,
) -> Result<Key> {
    relate_key(axle, "linkkey", keyring_identifier, key_identifier).await
}

/// Disassociate `key_identifier` from a keyring and return the key.
pub async fn keyring_unlink_key(
    axle: &Axle,
    keyring_identifier: &str,
    key_identifier: &str,
) -> Result<Key> {
    relate_key(axle, "unlinkkey", keyring_identifier, key_identifier).await
}

async fn relate_key(
    axle: &Axle,
    action: &str,
    keyring_identifier: &str,
    key_identifier: &str,
) -> Result<Key> {
    let url = axle.url(&format!(
        "keyring/{}/{action}/{}",
        escape(keyring_identifier),
        escape(key_identifier)
    ));
    let resp = axle.send(Method::PUT, &url, Some(b"{}".to_vec())).await?;
    Key::from_response(axle, key_identifier, &resp, RESULTS)
}

/// Keys belonging to a keyring, `from`..`to` by index.
pub async fn keyring_keys(axle: &Axle, identifier: &str, from: u32, to: u32) -> Result<Vec<Key>> {
    let url = axle.url(&format!(
        "keyring/{}/keys?{}",
        escape(identifier),
        range_query(from, to)
    ));
    let resp = axle.send(Method::GET, &url, None).await?;
    decode_collection(&resp, |id, fields| Key::from_fields(axle, id, fields))
}

/// Hit counts for a keyring.
pub async fn keyring_stats(axle: &Axle, identifier: &str, query: &StatsQuery) -> Result<Stats> {
    let url = axle.url(&format!(
        "keyring/{}/stats?{}",
        escape(identifier),
        query.query_string()
    ));
    let resp = axle.send(Method::GET, &url, None).await?;
    parse_stats(&resp)
}

/// Every keyring on the server, `from`..`to` by index.
pub async fn keyrings(axle: &Axle, from: u32, to: u32) -> Result<Vec<Keyring>> {
    let url = axle.url(&format!("keyrings?{}", range_query(from, to)));
    let resp = axle.send(Method::GET, &url, None).await?;
    let out = decode_collection(&resp, |id, fields| Keyring::from_fields(axle, id, fields))?;
    debug!(count = out.len(), "keyrings listed");
    Ok(out)
}

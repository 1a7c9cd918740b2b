//! Statistics queries and response parsing.

use axle_core::envelope::{self, RESULTS};
use axle_core::{AxleError, Buckets, Granularity, HitType, Result, Stats, escape};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Parameters of a `.../stats` request.
///
/// `for_key` and `for_api` narrow the counts to one related key or API.  The
/// server treats them as alternatives; nothing here stops both being set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub granularity: Granularity,
    pub for_key: Option<String>,
    pub for_api: Option<String>,
}

impl StatsQuery {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>, granularity: Granularity) -> Self {
        Self {
            from,
            to,
            granularity,
            for_key: None,
            for_api: None,
        }
    }

    pub fn for_key(mut self, key: impl Into<String>) -> Self {
        self.for_key = Some(key.into());
        self
    }

    pub fn for_api(mut self, api: impl Into<String>) -> Self {
        self.for_api = Some(api.into());
        self
    }

    /// Query string without the leading `?`.  Times are Unix seconds.
    pub fn query_string(&self) -> String {
        let mut query = format!(
            "from={}&to={}&granularity={}",
            self.from.timestamp(),
            self.to.timestamp(),
            self.granularity
        );
        if let Some(key) = &self.for_key {
            query.push_str("&forkey=");
            query.push_str(&escape(key));
        }
        if let Some(api) = &self.for_api {
            query.push_str("&forapi=");
            query.push_str(&escape(api));
        }
        query
    }
}

/// Parse `{"results": {"<hit type>": {"<unix secs>": {"<status>": count}}}}`.
pub fn parse_stats(body: &[u8]) -> Result<Stats> {
    let results = envelope::descend(body, RESULTS)?;
    let mut stats = Stats::new();

    for (hit, series) in results {
        let hit_type: HitType = hit.parse().map_err(AxleError::Decode)?;
        let Value::Object(series) = series else {
            return Err(AxleError::NotAnObject(hit));
        };
        let by_time = stats.entry(hit_type).or_default();

        for (stamp, buckets) in series {
            let at = stamp
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .ok_or_else(|| AxleError::Decode(format!("invalid {hit} timestamp: {stamp}")))?;
            let Value::Object(buckets) = buckets else {
                return Err(AxleError::NotAnObject(stamp));
            };

            let mut counts = Buckets::with_capacity(buckets.len());
            for (code, count) in buckets {
                let status: u16 = code
                    .parse()
                    .map_err(|_| AxleError::Decode(format!("invalid {hit} bucket: {code}")))?;
                let count = count.as_u64().ok_or(AxleError::TypeMismatch {
                    key: code,
                    expected: "unsigned integer",
                })?;
                counts.insert(status, count);
            }
            by_time.insert(at, counts);
        }
    }

    Ok(stats)
}

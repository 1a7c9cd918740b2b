//! reqwest-backed transport.

use std::time::Duration;

use axle_core::config::HttpConfig;
use axle_core::{AxleError, Method, Result, Transport};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("axle/{}", env!("CARGO_PKG_VERSION")));
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let mut req = self.http.request(method.clone(), url);
        if let Some(body) = body {
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(AxleError::Api {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        debug!(%method, url, status = status.as_u16(), len = bytes.len(), "axle response");
        Ok(bytes.to_vec())
    }
}

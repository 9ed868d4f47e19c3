//! Azure Web PubSub client.
//!
//! Only the "send to all connections in a hub" REST call is implemented.
//! Each call is authorized with a short-lived HS256 token signed by the
//! access key from the connection string, with the request URL as audience.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use tracing::trace;

use super::Broadcaster;
use crate::config::BroadcastConfig;
use crate::error::{BroadcastError, ConfigError};

/// Parsed `Endpoint=...;AccessKey=...;Version=1.0;[Port=...;]` string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// Service base URL including any explicit port, no trailing slash.
    pub endpoint: String,
    pub access_key: String,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut endpoint = None;
        let mut access_key = None;
        let mut port = None;

        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                ConfigError::ConnectionString(format!("segment without '=': {segment}"))
            })?;
            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim().trim_end_matches('/').to_string()),
                "accesskey" => access_key = Some(value.trim().to_string()),
                "port" => port = Some(value.trim().to_string()),
                // Version and anything newer are accepted and ignored.
                _ => {}
            }
        }

        let mut endpoint = endpoint
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ConfigError::ConnectionString("missing Endpoint".into()))?;
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigError::ConnectionString(format!(
                "Endpoint must be an http(s) URL: {endpoint}"
            )));
        }
        let access_key = access_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::ConnectionString("missing AccessKey".into()))?;

        if let Some(port) = port {
            port.parse::<u16>().map_err(|_| {
                ConfigError::ConnectionString(format!("invalid Port: {port}"))
            })?;
            endpoint = format!("{endpoint}:{port}");
        }

        Ok(Self {
            endpoint,
            access_key,
        })
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// REST client bound to a single hub.
pub struct WebPubSubClient {
    client: Client,
    connection: ConnectionString,
    hub: String,
    config: BroadcastConfig,
}

impl WebPubSubClient {
    pub fn new(
        connection: ConnectionString,
        hub: impl Into<String>,
        config: BroadcastConfig,
    ) -> Result<Self, BroadcastError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            connection,
            hub: hub.into(),
            config,
        })
    }

    pub fn hub(&self) -> &str {
        &self.hub
    }

    /// URL of the hub-wide send operation, without the query string.
    fn send_url(&self) -> String {
        format!("{}/api/hubs/{}/:send", self.connection.endpoint, self.hub)
    }

    /// Sign an access token for `audience`.
    fn access_token(&self, audience: &str) -> Result<String, BroadcastError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            aud: audience,
            iat: now,
            exp: now + self.config.token_ttl_secs as i64,
        };
        let key = EncodingKey::from_secret(self.connection.access_key.as_bytes());
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &key)?)
    }
}

#[async_trait]
impl Broadcaster for WebPubSubClient {
    fn name(&self) -> &'static str {
        "webpubsub"
    }

    async fn send_to_all(&self, message: &str, content_type: &str) -> Result<(), BroadcastError> {
        let url = self.send_url();
        let token = self.access_token(&url)?;

        let response = self
            .client
            .post(&url)
            .query(&[("api-version", self.config.api_version.as_str())])
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, content_type)
            .body(message.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BroadcastError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        trace!(hub = %self.hub, bytes = message.len(), "Published to hub");
        Ok(())
    }
}

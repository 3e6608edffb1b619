//! Client configuration.
//!
//! Every option has a default; hosts override from code or from a JSON document
//! (camelCase keys, durations in milliseconds).

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::core::{
    CoordinateOrder, ExponentialBackoffReconnect, TelemetryError, TelemetryResult,
    WebSocketBufferConfig,
};

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    /// Base delay, ms.
    pub delay: u64,
    pub backoff_multiplier: f64,
    /// Cap, ms.
    pub max_delay: u64,
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: 3_000,
            backoff_multiplier: 1.5,
            max_delay: 30_000,
            jitter: false,
        }
    }
}

impl ReconnectConfig {
    pub fn strategy(&self) -> ExponentialBackoffReconnect {
        ExponentialBackoffReconnect::new(
            Duration::from_millis(self.delay),
            Duration::from_millis(self.max_delay),
            self.backoff_multiplier,
            self.max_attempts,
        )
        .with_jitter(self.jitter)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeartbeatConfig {
    /// ms.
    pub interval: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval: 30_000 }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationUpdateConfig {
    /// Periodic flush cadence, ms.
    pub interval: u64,
    pub min_distance_meters: f64,
    /// Freshness floor, ms.
    pub max_silence: u64,
}

impl Default for LocationUpdateConfig {
    fn default() -> Self {
        Self {
            interval: 2_000,
            min_distance_meters: 2.0,
            max_silence: 10_000,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageQueueConfig {
    pub max_size: usize,
}

impl Default for MessageQueueConfig {
    fn default() -> Self {
        Self { max_size: 100 }
    }
}

/// Full client configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// HTTP(S) base of the tracking API; the socket URL is derived from it.
    pub base_url: String,
    pub socket_path: String,
    pub token_param: String,
    pub coordinate_order: CoordinateOrder,
    pub reconnect: ReconnectConfig,
    pub heartbeat: HeartbeatConfig,
    pub location_update: LocationUpdateConfig,
    pub message_queue: MessageQueueConfig,
    #[serde(skip)]
    pub ws_buffers: WebSocketBufferConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            socket_path: "/ws/tracking".to_string(),
            token_param: "token".to_string(),
            coordinate_order: CoordinateOrder::default(),
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            location_update: LocationUpdateConfig::default(),
            message_queue: MessageQueueConfig::default(),
            ws_buffers: WebSocketBufferConfig::default(),
        }
    }
}

impl TelemetryConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn from_json(json: &str) -> TelemetryResult<Self> {
        let config: Self =
            sonic_rs::from_str(json).map_err(|e| TelemetryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TelemetryResult<()> {
        if self.heartbeat.interval == 0 {
            return Err(TelemetryError::Config(
                "heartbeat.interval must be > 0".to_string(),
            ));
        }
        if self.location_update.interval == 0 {
            return Err(TelemetryError::Config(
                "locationUpdate.interval must be > 0".to_string(),
            ));
        }
        if !self.location_update.min_distance_meters.is_finite() {
            return Err(TelemetryError::Config(
                "locationUpdate.minDistanceMeters must be finite".to_string(),
            ));
        }
        self.socket_base()?;
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat.interval)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.location_update.interval)
    }

    pub fn max_silence(&self) -> Duration {
        Duration::from_millis(self.location_update.max_silence)
    }

    fn socket_base(&self) -> TelemetryResult<Url> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| TelemetryError::Config(e.to_string()))?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(TelemetryError::Config(format!(
                    "unsupported base url scheme `{other}`"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| TelemetryError::Config(format!("cannot switch scheme to {scheme}")))?;
        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            self.socket_path.trim_start_matches('/')
        );
        url.set_path(&path);
        Ok(url)
    }

    /// Websocket URL for a session authenticated with `token`.
    pub fn socket_url(&self, token: &str) -> TelemetryResult<String> {
        let mut url = self.socket_base()?;
        url.query_pairs_mut().append_pair(&self.token_param, token);
        Ok(url.into())
    }
}

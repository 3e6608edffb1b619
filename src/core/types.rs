use std::time::Duration;

use thiserror::Error;

use super::telemetry::RouteContext;

/// Convenience result alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Canonical error surface of the telemetry client.
///
/// Only `Authentication`, `MissingRoute` and budget exhaustion are expected to reach the host
/// application; connectivity failures are recovered inside the session.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Send failed, frame re-queued: {0}")]
    SendFailure(String),

    #[error("Invalid location sample: {0}")]
    InvalidSample(String),

    #[error("No stored route context to resume")]
    MissingRoute,

    #[error("Transport error ({context}): {error}")]
    Transport {
        context: &'static str,
        error: String,
    },

    #[error("Parse failed: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Actor error: {0}")]
    Actor(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Connection lifecycle of a telemetry session.
///
/// `Connected` is the only state in which frames are written immediately; every other state
/// routes outbound traffic into the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }
}

/// Transport-independent buffer sizing parameters used for websocket configuration.
#[derive(Clone, Copy, Debug)]
pub struct WebSocketBufferConfig {
    pub write_buffer_bytes: usize,
    pub max_write_buffer_bytes: usize,
    pub max_message_bytes: usize,
    pub max_frame_bytes: usize,
}

impl Default for WebSocketBufferConfig {
    fn default() -> Self {
        // Telemetry frames are small JSON documents; server pushes stay well under 1 MiB.
        Self {
            write_buffer_bytes: 16 << 10,
            max_write_buffer_bytes: 64 << 10,
            max_message_bytes: 1 << 20,
            max_frame_bytes: 1 << 20,
        }
    }
}

/// Introspection snapshot for status indicators.
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryStatus {
    pub connected: bool,
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub pending_message_count: usize,
    /// Queued messages dropped by overflow since the client was created.
    pub messages_evicted: u64,
    pub route: Option<RouteContext>,
    pub heartbeats_sent: u64,
    pub heartbeat_responses: u64,
    /// The latest heartbeat has not been answered yet.
    pub awaiting_heartbeat_response: bool,
    pub last_heartbeat_rtt: Option<Duration>,
}

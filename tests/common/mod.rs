#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sonic_rs::{JsonValueTrait, Value};
use telemetry_ws::testing::{MockServer, MockTransport, StaticCredentials};
use telemetry_ws::{
    ConnectionState, CredentialProvider, LocationSample, TelemetryClient, TelemetryConfig,
    TelemetryStatus,
};

pub const VEHICLE: &str = "bus-12";
pub const ORG: &str = "org-3";
pub const OPERATION: &str = "op-77";
pub const RECV: Duration = Duration::from_secs(1);

pub type TestClient = TelemetryClient<MockTransport>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Defaults with the periodic timers pushed out of the way.
pub fn quiet_config() -> TelemetryConfig {
    let mut config = TelemetryConfig::default();
    config.heartbeat.interval = 3_600_000;
    config.location_update.interval = 3_600_000;
    config
}

pub fn client_with(
    config: TelemetryConfig,
    credentials: Arc<dyn CredentialProvider>,
) -> (TestClient, MockServer) {
    init_tracing();
    let (transport, server) = MockTransport::pair();
    let strategy = config.reconnect.strategy();
    let client = TelemetryClient::with_transport(config, transport, strategy, credentials)
        .expect("valid config");
    (client, server)
}

pub fn client(config: TelemetryConfig) -> (TestClient, MockServer) {
    client_with(config, Arc::new(StaticCredentials::new("tkn")))
}

pub async fn connect(client: &TestClient) {
    client
        .connect(VEHICLE, ORG, OPERATION)
        .await
        .expect("connect");
}

pub async fn status(client: &TestClient) -> TelemetryStatus {
    client.status().await.expect("status")
}

pub async fn wait_for_state(client: &TestClient, state: ConnectionState, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let current = status(client).await.state;
        if current == state {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {state:?}, still {current:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_pending(client: &TestClient, count: usize, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let pending = status(client).await.pending_message_count;
        if pending == count {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {count} pending messages, still {pending}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn moving(latitude: f64, longitude: f64) -> LocationSample {
    LocationSample::new(latitude, longitude, 1_700_000_000_000).with_speed(4.0)
}

pub fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

pub fn f64_field(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(|v| v.as_f64())
}

pub fn u64_field(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(|v| v.as_u64())
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use sonic_rs::{JsonValueTrait, Value};
use telemetry_ws::testing::StaticCredentials;
use telemetry_ws::{
    ConnectionState, InboundKind, OutboundMessage, TelemetryClient, TelemetryConfig,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

#[derive(Debug)]
enum ServerEvent {
    Connected { conn_id: usize, uri: String },
    Text { conn_id: usize, text: String },
    Closed { conn_id: usize, code: Option<u16> },
}

/// Accepts sockets forever; the first connection acknowledges one frame and then closes.
async fn spawn_server() -> (SocketAddr, mpsc::UnboundedReceiver<ServerEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut conn_id = 0usize;
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            conn_id += 1;
            let tx = tx.clone();
            tokio::spawn(async move {
                let (uri_tx, uri_rx) = std::sync::mpsc::channel();
                let mut ws = accept_hdr_async(stream, move |req: &Request, resp: Response| {
                    let _ = uri_tx.send(req.uri().to_string());
                    Ok(resp)
                })
                .await
                .unwrap();
                let uri = uri_rx.recv().unwrap_or_default();
                let _ = tx.send(ServerEvent::Connected { conn_id, uri });

                while let Some(Ok(message)) = ws.next().await {
                    match message {
                        Message::Text(text) => {
                            let _ = tx.send(ServerEvent::Text {
                                conn_id,
                                text: text.as_str().to_string(),
                            });
                            if conn_id == 1 {
                                let _ = ws
                                    .send(Message::text(r#"{"type":"success","message":"stored"}"#))
                                    .await;
                                let _ = ws.close(None).await;
                            }
                        }
                        Message::Close(frame) => {
                            let _ = tx.send(ServerEvent::Closed {
                                conn_id,
                                code: frame.map(|f| u16::from(f.code)),
                            });
                            break;
                        }
                        _ => {}
                    }
                }
            });
        }
    });

    (addr, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("server event")
        .expect("server alive")
}

/// Next event for `conn_id`, skipping the tail of other connections.
async fn next_event_for(
    rx: &mut mpsc::UnboundedReceiver<ServerEvent>,
    conn_id: usize,
) -> ServerEvent {
    loop {
        let event = next_event(rx).await;
        let id = match &event {
            ServerEvent::Connected { conn_id, .. }
            | ServerEvent::Text { conn_id, .. }
            | ServerEvent::Closed { conn_id, .. } => *conn_id,
        };
        if id == conn_id {
            return event;
        }
    }
}

#[tokio::test]
async fn real_socket_round_trip_and_recovery() {
    let (addr, mut events) = spawn_server().await;

    let mut config = TelemetryConfig::default().with_base_url(format!("http://{addr}"));
    config.reconnect.delay = 50;
    config.heartbeat.interval = 3_600_000;
    config.location_update.interval = 3_600_000;

    let client = TelemetryClient::new(config, Arc::new(StaticCredentials::new("driver-token")))
        .unwrap();
    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
    client
        .on(InboundKind::Success, move |frame| {
            let _ = ack_tx.send(frame.message().map(str::to_string));
        })
        .await
        .unwrap();

    client.connect("bus-12", "org-3", "op-77").await.unwrap();
    match next_event(&mut events).await {
        ServerEvent::Connected { conn_id: 1, uri } => {
            assert_eq!(uri, "/ws/tracking?token=driver-token");
        }
        other => panic!("unexpected {other:?}"),
    }

    client
        .send(OutboundMessage::BusStatusUpdate {
            status: "ON_ROUTE".to_string(),
            occupied_seats: 5,
        })
        .await
        .unwrap();
    match next_event(&mut events).await {
        ServerEvent::Text { conn_id: 1, text } => {
            let value: Value = sonic_rs::from_str(&text).unwrap();
            assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("bus_status_update"));
            assert_eq!(value.get("vehicleId").and_then(|v| v.as_str()), Some("bus-12"));
        }
        other => panic!("unexpected {other:?}"),
    }
    let ack = tokio::time::timeout(Duration::from_secs(5), ack_rx.recv())
        .await
        .unwrap();
    assert_eq!(ack, Some(Some("stored".to_string())));

    // The server closed the first socket; the client comes back on its own.
    match next_event_for(&mut events, 2).await {
        ServerEvent::Connected { .. } => {}
        other => panic!("unexpected {other:?}"),
    }
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while client.status().await.unwrap().state != ConnectionState::Connected {
        assert!(tokio::time::Instant::now() < deadline, "never reconnected");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    client.disconnect().await.unwrap();
    match next_event_for(&mut events, 2).await {
        ServerEvent::Closed { code, .. } => assert_eq!(code, Some(1000)),
        other => panic!("unexpected {other:?}"),
    }
}

mod common;

use common::*;
use sonic_rs::Value;
use telemetry_ws::testing::MockConnection;
use telemetry_ws::{ConnectionState, OutboundMessage};

fn status_update(tag: &str) -> OutboundMessage {
    OutboundMessage::BusStatusUpdate {
        status: tag.to_string(),
        occupied_seats: 0,
    }
}

async fn received_tags(conn: &mut MockConnection, count: usize) -> Vec<String> {
    let mut tags = Vec::new();
    for _ in 0..count {
        let frame: Value = conn.recv_json(RECV).await.expect("queued frame");
        let tag = str_field(&frame, "status")
            .or_else(|| str_field(&frame, "description"))
            .unwrap_or_default()
            .to_string();
        tags.push(tag);
    }
    tags
}

#[tokio::test(start_paused = true)]
async fn queued_frames_drain_in_enqueue_order() {
    let (client, mut server) = client(quiet_config());
    for tag in ["a", "b", "c"] {
        client.send(status_update(tag)).await.unwrap();
    }
    assert_eq!(status(&client).await.pending_message_count, 3);

    connect(&client).await;
    let mut conn = server.accept().await.unwrap();

    assert_eq!(received_tags(&mut conn, 3).await, ["a", "b", "c"]);
    assert_eq!(status(&client).await.pending_message_count, 0);
}

#[tokio::test(start_paused = true)]
async fn emergency_jumps_the_queue() {
    let (client, mut server) = client(quiet_config());
    client.send(status_update("a")).await.unwrap();
    client.send(status_update("b")).await.unwrap();
    client.report_emergency("e").await.unwrap();

    connect(&client).await;
    let mut conn = server.accept().await.unwrap();

    assert_eq!(received_tags(&mut conn, 3).await, ["e", "a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn overflow_keeps_most_recent_frames() {
    let mut config = quiet_config();
    config.message_queue.max_size = 3;
    let (client, mut server) = client(config);

    for tag in ["s0", "s1", "s2", "s3", "s4"] {
        client.send(status_update(tag)).await.unwrap();
    }
    let snapshot = status(&client).await;
    assert_eq!(snapshot.pending_message_count, 3);
    assert_eq!(snapshot.messages_evicted, 2);

    connect(&client).await;
    let mut conn = server.accept().await.unwrap();
    assert_eq!(received_tags(&mut conn, 3).await, ["s2", "s3", "s4"]);
    assert!(conn.recv_json(RECV).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_write_falls_back_to_the_queue() {
    let (client, mut server) = client(quiet_config());
    connect(&client).await;
    let mut conn = server.accept().await.unwrap();

    conn.fail_writes(true);
    client.send(status_update("a")).await.unwrap();

    // The rejected write comes back asynchronously.
    wait_for_pending(&client, 1, RECV).await;
    assert_eq!(status(&client).await.state, ConnectionState::Connected);
    assert!(conn.recv_json(RECV).await.is_none());

    conn.fail_writes(false);
    client.send(status_update("b")).await.unwrap();
    assert_eq!(received_tags(&mut conn, 2).await, ["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn disconnect_discards_queued_frames() {
    let (client, mut server) = client(quiet_config());
    client.send(status_update("stale")).await.unwrap();
    client.disconnect().await.unwrap();
    assert_eq!(status(&client).await.pending_message_count, 0);

    connect(&client).await;
    let mut conn = server.accept().await.unwrap();
    assert!(conn.recv_json(RECV).await.is_none());
}

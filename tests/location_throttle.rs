mod common;

use std::time::Duration;

use common::*;
use sonic_rs::JsonValueTrait;
use telemetry_ws::core::meters_to_latitude_degrees;
use telemetry_ws::{BoardingAction, CoordinateOrder, LocationSample, TelemetryConfig};

const LAT: f64 = 0.3476;
const LON: f64 = 32.5825;

#[tokio::test(start_paused = true)]
async fn invalid_coordinates_are_never_transmitted() {
    // Default flush cadence so a stored sample would surface on its own.
    let mut config = TelemetryConfig::default();
    config.heartbeat.interval = 3_600_000;
    let (client, mut server) = client(config);
    connect(&client).await;
    let mut conn = server.accept().await.unwrap();

    client.update_location(moving(0.0, 0.0)).await.unwrap();
    client.update_location(moving(91.0, LON)).await.unwrap();
    client.update_location(moving(LAT, 181.0)).await.unwrap();

    assert!(conn.recv_json(Duration::from_secs(15)).await.is_none());

    client.report_emergency("flat tyre").await.unwrap();
    let frame = conn.recv_json(RECV).await.expect("emergency");
    assert_eq!(str_field(&frame, "type"), Some("emergency"));
    assert!(frame.get("latitude").is_none());
}

#[tokio::test(start_paused = true)]
async fn one_meter_within_ten_seconds_is_suppressed() {
    let (client, mut server) = client(quiet_config());
    connect(&client).await;
    let mut conn = server.accept().await.unwrap();

    client.update_location(moving(LAT, LON)).await.unwrap();
    let first = conn.recv_json(RECV).await.expect("first fix");
    assert_eq!(str_field(&first, "type"), Some("location_update"));

    tokio::time::sleep(Duration::from_secs(3)).await;
    let nudged = LAT + meters_to_latitude_degrees(1.0);
    client.update_location(moving(nudged, LON)).await.unwrap();
    assert!(conn.recv_json(RECV).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn one_meter_after_ten_seconds_is_sent() {
    let (client, mut server) = client(quiet_config());
    connect(&client).await;
    let mut conn = server.accept().await.unwrap();

    client.update_location(moving(LAT, LON)).await.unwrap();
    assert!(conn.recv_json(RECV).await.is_some());

    tokio::time::sleep(Duration::from_secs(11)).await;
    let nudged = LAT + meters_to_latitude_degrees(1.0);
    client.update_location(moving(nudged, LON)).await.unwrap();

    let second = conn.recv_json(RECV).await.expect("freshness floor");
    assert_eq!(f64_field(&second, "latitude"), Some(nudged));
}

#[tokio::test(start_paused = true)]
async fn periodic_flush_reports_a_parked_vehicle() {
    let mut config = TelemetryConfig::default();
    config.heartbeat.interval = 3_600_000;
    let (client, mut server) = client(config);
    connect(&client).await;
    let mut conn = server.accept().await.unwrap();

    let parked = LocationSample::new(LAT, LON, 1_700_000_000_000).with_accuracy(5.0);
    client.update_location(parked).await.unwrap();
    client.update_occupancy(9).await.unwrap();

    let start = tokio::time::Instant::now();
    let first = conn
        .recv_json(Duration::from_secs(3))
        .await
        .expect("first flush");
    assert_eq!(u64_field(&first, "occupiedSeats"), Some(9));
    assert_eq!(f64_field(&first, "accuracy"), Some(5.0));
    let first_at = start.elapsed();

    let second = conn
        .recv_json(Duration::from_secs(15))
        .await
        .expect("freshness flush");
    assert_eq!(str_field(&second, "type"), Some("location_update"));
    assert!(start.elapsed() - first_at > Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn lng_lat_order_swaps_outbound_coordinates() {
    let mut config = quiet_config();
    config.coordinate_order = CoordinateOrder::LngLat;
    let (client, mut server) = client(config);
    connect(&client).await;
    let mut conn = server.accept().await.unwrap();

    client.update_location(moving(LAT, LON)).await.unwrap();
    let frame = conn.recv_json(RECV).await.expect("fix");
    assert_eq!(f64_field(&frame, "latitude"), Some(LON));
    assert_eq!(f64_field(&frame, "longitude"), Some(LAT));
}

#[tokio::test(start_paused = true)]
async fn boarding_adjusts_occupancy_and_saturates() {
    let (client, mut server) = client(quiet_config());
    connect(&client).await;
    let mut conn = server.accept().await.unwrap();

    client.update_occupancy(10).await.unwrap();
    client
        .record_boarding(BoardingAction::Board, 3, Some("stop-4".to_string()))
        .await
        .unwrap();
    let board = conn.recv_json(RECV).await.expect("boarding");
    assert_eq!(str_field(&board, "type"), Some("passengerBoarding"));
    assert_eq!(str_field(&board, "action"), Some("BOARD"));
    assert_eq!(u64_field(&board, "occupiedSeats"), Some(13));
    assert_eq!(str_field(&board, "stopId"), Some("stop-4"));

    client
        .record_boarding(BoardingAction::Alight, 20, None)
        .await
        .unwrap();
    let alight = conn.recv_json(RECV).await.expect("alighting");
    assert_eq!(u64_field(&alight, "occupiedSeats"), Some(0));

    client.update_bus_status("FULL").await.unwrap();
    let status = conn.recv_json(RECV).await.expect("status");
    assert_eq!(str_field(&status, "type"), Some("bus_status_update"));
    assert_eq!(u64_field(&status, "occupiedSeats"), Some(0));
}

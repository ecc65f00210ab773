use reqwest::StatusCode;
use serde_json::json;

use grid_common::rpc::{DemandUpdate, GeneratorKind};

use crate::common::*;

mod common;

#[tokio::test]
async fn ready_once_listening() {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    let response = server.get("/_readiness").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "serving");

    let response = server.get("/_liveness").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn registration_greets_the_generator() {
    let sink = HelloSink::start().await;
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    let response = server
        .post(
            "/generator/register",
            &json!({
                "identity": -17,
                "address": sink.addr.to_string(),
                "kind": "offshore-wind",
                "capacity": 320.0,
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let sink_ref = &sink;
    wait_for_condition(WAIT_TIMEOUT, POLL_INTERVAL, move || async move {
        !sink_ref.received().is_empty()
    })
    .await;

    let hellos = sink.received();
    assert_eq!(hellos.len(), 1);
    assert_eq!(hellos[0].generator_id, -17);
    assert_eq!(hellos[0].tracker_id, 0);
    assert_eq!(hellos[0].tracker_address, "127.0.0.1:32000");
    assert_eq!(hellos[0].kind, GeneratorKind::OffshoreWind);
    assert_eq!(hellos[0].capacity, 320.0);
}

#[tokio::test]
async fn unreachable_generator_does_not_fail_registration() {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    let response = server
        .post(
            "/generator/register",
            &json!({
                "identity": 3,
                "address": "127.0.0.1:9",
                "kind": "nuclear",
                "capacity": 1000.0,
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reports_are_balanced_and_recorded() {
    let history = tempfile::NamedTempFile::new().unwrap();
    let mut config = DEFAULT_CONFIG.clone();
    config.history_path = Some(history.path().to_owned());
    config.host_id = 4;
    let server = ServerHandle::for_config(config).await;

    let server = &server;
    let report = move |identity: i32, output: f64, demand: f64| {
        async move {
            let response = server
                .post(
                    "/generator/state",
                    &json!({"identity": identity, "timestamp": 0, "output": output, "demand": demand}),
                )
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            response.json::<DemandUpdate>().await.unwrap().demand
        }
    };

    assert_eq!(report(2, 100.0, 10.0).await, 10.0);

    let shed = report(1, 100.0, 95.0).await;
    assert!(shed < 95.0);
    assert!((95.0 - shed - 3817.0 * 0.00131).abs() < 1e-9);

    let absorbed = report(2, 100.0, 10.0).await;
    assert!((absorbed - 10.0 - 3817.0 * 0.00131).abs() < 1e-9);

    let mut reader = csv::Reader::from_path(history.path()).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| &row[2] == "4"));
    assert_eq!(&rows[1][0], "1");
}

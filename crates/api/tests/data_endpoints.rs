// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the `/data` endpoints

mod fixtures;

use api::components::catalog;
use axum::http::StatusCode;
use fixtures::{
    seed::{config_with_seed, seed_server},
    start,
};
use serde_json::{Value, json};
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

#[tokio::test]
async fn reseed_then_read_second_page() {
    let mock_server = seed_server(45).await;
    let (addr, _) = start(config_with_seed(&mock_server), &catalog()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/data"))
        .json(&json!({"source": "test"}))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to read response");
    assert_eq!(
        body,
        json!({"status": true, "msg": "All Data has been Inserted.", "data": {}})
    );

    let response = client
        .get(format!("http://{addr}/data?page=2"))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to read response");
    assert_eq!(body["status"], true);
    assert_eq!(body["msg"], "GET request to /data succeeded.");

    let rows = body["data"].as_array().expect("rows");
    assert_eq!(rows.len(), 15);
    assert_eq!(rows[0]["id"], 31);
    assert_eq!(rows[14]["id"], 45);
    assert_eq!(rows[0]["postId"], 7);
}

#[tokio::test]
async fn missing_page_reads_first_page() {
    let mock_server = seed_server(40).await;
    let (addr, _) = start(config_with_seed(&mock_server), &catalog()).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{addr}/data"))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send request");

    let body: Value = client
        .get(format!("http://{addr}/data"))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to read response");

    let rows = body["data"].as_array().expect("rows");
    assert_eq!(rows.len(), 30);
    assert_eq!(rows[0]["id"], 1);
}

#[tokio::test]
async fn reseeding_twice_duplicates_rows() {
    let mock_server = seed_server(10).await;
    let (addr, _) = start(config_with_seed(&mock_server), &catalog()).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let response = client
            .post(format!("http://{addr}/data"))
            .json(&json!({}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let body: Value = client
        .get(format!("http://{addr}/data?page=1"))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to read response");

    assert_eq!(body["data"].as_array().expect("rows").len(), 20);
}

#[tokio::test]
async fn post_without_body_reseeds() {
    let mock_server = seed_server(3).await;
    let (addr, _) = start(config_with_seed(&mock_server), &catalog()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/data"))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to read response");
    assert_eq!(body["msg"], "All Data has been Inserted.");

    let body: Value = client
        .get(format!("http://{addr}/data"))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to read response");
    assert_eq!(body["data"].as_array().expect("rows").len(), 3);
}

#[tokio::test]
async fn post_with_text_body_fails_validation() {
    let mock_server = seed_server(1).await;
    let (addr, _) = start(config_with_seed(&mock_server), &catalog()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/data"))
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to read response");
    assert_eq!(body["errorCode"], "ValidationError");
    assert_eq!(body["errorDetails"]["request"]["path"], "/data");
}

#[tokio::test]
async fn post_with_non_object_body_fails_validation() {
    let mock_server = seed_server(1).await;
    let (addr, _) = start(config_with_seed(&mock_server), &catalog()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/data"))
        .json(&json!([1, 2, 3]))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to read response");
    assert_eq!(body["errorCode"], "ValidationError");
}

#[tokio::test]
async fn malformed_json_is_rejected_with_hint() {
    let mock_server = seed_server(1).await;
    let (addr, _) = start(config_with_seed(&mock_server), &catalog()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/data"))
        .header("content-type", "application/json")
        .body(r#"{"a": 1"#)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to read response");
    assert_eq!(body["errorCode"], "InvalidBody");
}

#[tokio::test]
async fn oversized_json_is_payload_too_large() {
    let mock_server = seed_server(1).await;
    let (addr, _) = start(config_with_seed(&mock_server), &catalog()).await;
    let padding = "x".repeat(1024 * 1024 + 16);

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/data"))
        .json(&json!({ "padding": padding }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json().await.expect("Failed to read response");
    assert_eq!(body["errorCode"], "PayloadTooLarge");
}

#[tokio::test]
async fn non_numeric_page_is_a_bad_request() {
    let mock_server = seed_server(1).await;
    let (addr, _) = start(config_with_seed(&mock_server), &catalog()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/data?page=abc"))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to read response");
    assert_eq!(body["errorCode"], "BadRequest");
    assert_eq!(body["errorDetails"]["request"]["method"], "GET");
}

#[tokio::test]
async fn unreachable_seed_source_is_a_bad_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;
    let (addr, _) = start(config_with_seed(&mock_server), &catalog()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/data"))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to read response");
    assert_eq!(body["errorCode"], "SeedError");
}

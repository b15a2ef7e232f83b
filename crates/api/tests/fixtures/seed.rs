// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Mocked remote seed collection

use api::ServerConfig;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const SEED_PATH: &str = "/comments";

/// A remote collection with ids `1..=count`
pub fn comments(count: i64) -> Value {
    let records: Vec<Value> = (1..=count)
        .map(|id| {
            json!({
                "postId": (id - 1) / 5 + 1,
                "id": id,
                "name": format!("comment {id}"),
                "email": format!("user{id}@example.com"),
                "body": "quia molestiae reprehenderit quasi aspernatur"
            })
        })
        .collect();
    Value::Array(records)
}

/// Mock server answering the seed collection with `count` records
pub async fn seed_server(count: i64) -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(comments(count)))
        .mount(&mock_server)
        .await;
    mock_server
}

/// Testing configuration seeding from `mock_server`
pub fn config_with_seed(mock_server: &MockServer) -> ServerConfig {
    let mut config = ServerConfig::for_testing();
    config.seed.url = format!("{}{SEED_PATH}", mock_server.uri());
    config
}

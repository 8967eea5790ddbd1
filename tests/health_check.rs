//! Integration tests for the liveness probe

use std::net::TcpListener;
use std::sync::Arc;

use bookauth::auth::AuthService;
use bookauth::configuration::{JwtSettings, PasswordSettings};
use bookauth::startup::run;
use bookauth::store::{InMemoryRefreshTokenStore, InMemoryUserStore};

const TEST_HASH_COST: u32 = 4;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let service = AuthService::new(
        Arc::new(InMemoryUserStore::new()),
        Arc::new(InMemoryRefreshTokenStore::new()),
        JwtSettings {
            secret: "health-check-secret-at-least-32-bytes-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 3600,
        },
        PasswordSettings {
            hash_cost: TEST_HASH_COST,
        },
    );
    let server = run(listener, service).expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .header("x-request-id", "probe-1")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(
        response.headers().get("x-request-id").unwrap().to_str().unwrap(),
        "probe-1"
    );
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/does-not-exist", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}

//! Store and end-to-end tests against a real Postgres database.
//!
//! Every test creates its own database from `configuration.yaml` (overridable
//! with `APP__DATABASE__*`) and runs the migrations into it.

use std::net::TcpListener;
use std::sync::Arc;

use bookauth::auth::{AuthService, RefreshTokenRecord};
use bookauth::configuration::{get_configuration, DatabaseSettings, PasswordSettings, Settings};
use bookauth::error::StoreError;
use bookauth::startup::run;
use bookauth::store::{NewUser, PgRefreshTokenStore, PgUserStore, RefreshTokenStore, User, UserStore};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

const TEST_HASH_COST: u32 = 4;

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");
    // Migrate database
    let connection_pool = PgPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn fresh_settings() -> (Settings, PgPool) {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    let pool = configure_database(&configuration.database).await;
    (configuration, pool)
}

async fn stores() -> (PgUserStore, PgRefreshTokenStore) {
    let (_, pool) = fresh_settings().await;
    (PgUserStore::new(pool.clone()), PgRefreshTokenStore::new(pool))
}

async fn create_user(users: &PgUserStore, email: &str) -> User {
    users
        .create(NewUser {
            email: email.to_string(),
            name: "Reader".to_string(),
            password_hash: "hash".to_string(),
        })
        .await
        .expect("Failed to create user")
}

fn record_for(user_id: Uuid, jwt_id: &str) -> RefreshTokenRecord {
    RefreshTokenRecord::issue(user_id, jwt_id.to_string(), Duration::days(1), Utc::now())
}

// --- User Store ---

#[tokio::test]
async fn user_lookup_ignores_email_case() {
    let (users, _) = stores().await;
    let created = create_user(&users, "Reader@Example.com").await;

    let found = users.find_by_email("reader@EXAMPLE.com").await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.email, "Reader@Example.com");
    assert!(users.find_by_id(created.id).await.unwrap().is_some());
    assert!(users.find_by_email("other@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_maps_to_duplicate_error() {
    let (users, _) = stores().await;
    create_user(&users, "reader@example.com").await;

    let clash = users
        .create(NewUser {
            email: "READER@example.com".to_string(),
            name: "Other".to_string(),
            password_hash: "hash".to_string(),
        })
        .await;

    assert!(matches!(clash, Err(StoreError::Duplicate(_))), "{:?}", clash);
}

// --- Refresh Token Store ---

#[tokio::test]
async fn duplicate_refresh_token_maps_to_duplicate_error() {
    let (users, tokens) = stores().await;
    let user = create_user(&users, "reader@example.com").await;
    let record = record_for(user.id, "a");
    tokens.insert(&record).await.unwrap();

    let mut clash = record_for(user.id, "b");
    clash.token = record.token.clone();

    assert!(matches!(tokens.insert(&clash).await, Err(StoreError::Duplicate(_))));
}

#[tokio::test]
async fn latest_lookups_prefer_newest_then_last_inserted() {
    let (users, tokens) = stores().await;
    let user = create_user(&users, "reader@example.com").await;

    let mut older = record_for(user.id, "shared");
    older.created_time = older.created_time - Duration::hours(1);
    let now = Utc::now();
    let first = RefreshTokenRecord::issue(user.id, "shared".to_string(), Duration::days(1), now);
    let second = RefreshTokenRecord::issue(user.id, "shared".to_string(), Duration::days(1), now);

    // Inserted newest-first so insertion order alone cannot pick the answer
    tokens.insert(&first).await.unwrap();
    tokens.insert(&second).await.unwrap();
    tokens.insert(&older).await.unwrap();

    let by_jti = tokens.find_latest_by_jwt_id("shared").await.unwrap().unwrap();
    let by_user = tokens.find_latest_by_user(user.id).await.unwrap().unwrap();
    assert_eq!(by_jti.id, second.id);
    assert_eq!(by_user.id, second.id);
    assert!(tokens.find_latest_by_jwt_id("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn update_overwrites_mutable_fields() {
    let (users, tokens) = stores().await;
    let user = create_user(&users, "reader@example.com").await;
    let mut record = record_for(user.id, "a");
    tokens.insert(&record).await.unwrap();

    record.jwt_id = "b".to_string();
    record.is_used = true;
    tokens.update(&record).await.unwrap();

    let found = tokens.find_by_token(&record.token).await.unwrap().unwrap();
    assert_eq!(found.jwt_id, "b");
    assert!(found.is_used);
    assert!(!found.is_revoked);
}

#[tokio::test]
async fn conditional_updates_apply_once() {
    let (users, tokens) = stores().await;
    let user = create_user(&users, "reader@example.com").await;
    let record = record_for(user.id, "a");
    tokens.insert(&record).await.unwrap();

    assert!(tokens.mark_used(record.id).await.unwrap());
    assert!(!tokens.mark_used(record.id).await.unwrap());

    assert!(tokens.rotate_jwt_id(record.id, "a", "b").await.unwrap());
    assert!(!tokens.rotate_jwt_id(record.id, "a", "c").await.unwrap());

    assert!(tokens.revoke(record.id).await.unwrap());
    assert!(!tokens.revoke(record.id).await.unwrap());
    assert!(!tokens.rotate_jwt_id(record.id, "b", "d").await.unwrap());

    let found = tokens.find_by_token(&record.token).await.unwrap().unwrap();
    assert_eq!(found.jwt_id, "b");
    assert!(found.is_used && found.is_revoked);
}

#[tokio::test]
async fn concurrent_rotations_have_one_winner() {
    let (users, tokens) = stores().await;
    let user = create_user(&users, "reader@example.com").await;
    let record = record_for(user.id, "a");
    tokens.insert(&record).await.unwrap();

    let (left, right) = tokio::join!(
        tokens.rotate_jwt_id(record.id, "a", "left"),
        tokens.rotate_jwt_id(record.id, "a", "right"),
    );
    let (left, right) = (left.unwrap(), right.unwrap());

    assert!(left ^ right, "exactly one rotation must apply");
    let found = tokens.find_by_token(&record.token).await.unwrap().unwrap();
    assert_eq!(found.jwt_id, if left { "left" } else { "right" });
}

// --- Endpoints ---

async fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let (configuration, pool) = fresh_settings().await;
    let service = AuthService::new(
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgRefreshTokenStore::new(pool)),
        configuration.jwt,
        PasswordSettings {
            hash_cost: TEST_HASH_COST,
        },
    );
    let server = run(listener, service).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn session_lifecycle_against_postgres() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let registered: Value = client
        .post(&format!("{}/authentication/register", address))
        .json(&json!({"email": "a@b.com", "password": "Aa1!aa", "name": "Tester"}))
        .send()
        .await
        .expect("Failed to execute request.")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(registered["result"], true);
    let token = registered["token"].as_str().unwrap().to_string();
    let refresh_token = registered["refreshToken"].as_str().unwrap().to_string();

    let refreshed: Value = client
        .post(&format!("{}/authentication/refreshtoken", address))
        .json(&json!({"token": token, "refreshToken": refresh_token}))
        .send()
        .await
        .expect("Failed to execute request.")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(refreshed["refreshToken"], refresh_token.as_str());
    let new_token = refreshed["token"].as_str().unwrap().to_string();

    let me = client
        .get(&format!("{}/api/me", address))
        .bearer_auth(&new_token)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, me.status().as_u16());

    let logout = client
        .post(&format!("{}/authentication/logout", address))
        .json(&json!({"refreshToken": refresh_token}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(logout.text().await.unwrap(), "Logout successful.");

    let me = client
        .get(&format!("{}/api/me", address))
        .bearer_auth(&new_token)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, me.status().as_u16());
}

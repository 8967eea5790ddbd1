use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthService;
use crate::configuration::{Settings, StorageBackend};
use crate::logger::RequestLogger;
use crate::middleware::RequestGate;
use crate::routes::{
    health_check, json_config, login, logout, me, refresh_token, register, INVALID_PARAMETERS,
    INVALID_PAYLOAD,
};
use crate::store::{
    InMemoryRefreshTokenStore, InMemoryUserStore, PgRefreshTokenStore, PgUserStore,
    RefreshTokenStore, UserStore,
};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to connect to Postgres: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Failed to migrate the database: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Wire the configured stores into an `AuthService`.
///
/// The Postgres backend runs pending migrations before returning.
pub async fn build_service(settings: &Settings) -> Result<AuthService, StartupError> {
    let (users, tokens): (Arc<dyn UserStore>, Arc<dyn RefreshTokenStore>) = match settings.storage
    {
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(5))
                .connect_with(settings.database.with_db())
                .await?;
            tracing::info!("Database connection pool created");

            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Database migrations applied");

            (
                Arc::new(PgUserStore::new(pool.clone())),
                Arc::new(PgRefreshTokenStore::new(pool)),
            )
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory stores; all users and tokens are lost on restart");
            (
                Arc::new(InMemoryUserStore::new()),
                Arc::new(InMemoryRefreshTokenStore::new()),
            )
        }
    };

    Ok(AuthService::new(
        users,
        tokens,
        settings.jwt.clone(),
        settings.password.clone(),
    ))
}

pub fn run(listener: TcpListener, service: AuthService) -> Result<Server, std::io::Error> {
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        let gate = RequestGate::new(service.tokens(), service.jwt_settings().clone());

        App::new()
            .wrap(Logger::default())
            .wrap(RequestLogger)
            .app_data(service.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/authentication")
                    .service(
                        web::resource("/register")
                            .app_data(json_config(INVALID_PAYLOAD))
                            .route(web::post().to(register)),
                    )
                    .service(
                        web::resource("/login")
                            .app_data(json_config(INVALID_PAYLOAD))
                            .route(web::post().to(login)),
                    )
                    .service(
                        web::resource("/logout")
                            .app_data(json_config(INVALID_PAYLOAD))
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/refreshtoken")
                            .app_data(json_config(INVALID_PARAMETERS))
                            .route(web::post().to(refresh_token)),
                    ),
            )
            .service(
                web::scope("/api")
                    .wrap(gate)
                    .route("/me", web::get().to(me)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

use std::net::TcpListener;

use bookauth::configuration::get_configuration;
use bookauth::startup::{build_service, run};
use bookauth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    let configuration = get_configuration().map_err(|e| {
        tracing::error!(error = %e, "Failed to read configuration");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    tracing::info!(storage = ?configuration.storage, "Configuration loaded");

    let service = build_service(&configuration).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialise stores");
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string())
    })?;

    let address = configuration.application.address();
    let listener = TcpListener::bind(&address)?;
    tracing::info!(%address, "Server listening");

    run(listener, service)?.await
}

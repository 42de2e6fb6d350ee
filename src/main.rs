use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use officers_log::{configure_routes, AppState, Settings};
use std::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("officers_log=debug,actix_web=info")),
        )
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new().context("failed to load configuration")?;
    info!("Configuration loaded ({} environment)", config.environment);

    let state = AppState::new(config.clone())
        .await
        .context("failed to open the database")?;
    let data = web::Data::new(state.clone());

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address).with_context(|| format!("failed to bind {}", address))?;
    info!("Starting server at http://{}", address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(data.clone())
            .configure(configure_routes)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await?;

    info!("Server stopped, closing database");
    state.shutdown().await?;
    Ok(())
}

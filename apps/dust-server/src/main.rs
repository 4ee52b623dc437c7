use dotenvy::dotenv;
use dust_core::BoxError;
use dust_server::{AppState, config::Config, create_app};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load environment (.env) if present
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting dust server v{}...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let app_state = AppState::open(&config).await?;
    let app = create_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(
        "Listening on {} (base domain {})",
        addr, config.resolver.base_domain
    );

    axum::serve(listener, app).await?;
    Ok(())
}

use std::net::SocketAddr;

use anyhow::Context;
use gatekeeper_api::{build_router, AuthState, Config, JsonBodyLimit, RateLimit};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load config")?;

    tracing::info!(
        environment = %config.common.environment,
        "Starting Gatekeeper API server on port {}",
        config.port
    );

    let auth_state =
        AuthState::from_config(config.homeserver()).context("Failed to build home-server client")?;
    tracing::info!(homeserver = %config.homeserver().url, "Home-server client initialized");

    let limit = RateLimit::new(config.rate_limit());
    if limit.is_enabled() {
        tracing::info!(
            "Rate limiting enabled: {} req/{} ms per client",
            config.rate_limit().max_requests(),
            config.rate_limit().window_ms()
        );
    } else {
        tracing::warn!("Rate limiting DISABLED - set RATE_LIMIT_ENABLED=true to enable it");
    }

    let app = build_router(auth_state, limit, JsonBodyLimit(config.json_body_limit))
        .layer(TraceLayer::new_for_http());

    // Run the server with ConnectInfo to capture client addresses
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

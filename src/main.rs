use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use llm_broadcast_relay::broadcast::{ConnectionString, WebPubSubClient};
use llm_broadcast_relay::config::{Cli, Config, LogFormat, Secrets, HUB_NAME};
use llm_broadcast_relay::server::api::{build_router, AppState};
use llm_broadcast_relay::upstream::AnthropicClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "llm_broadcast_relay=debug,tower_http=debug"
    } else {
        "llm_broadcast_relay=info,tower_http=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init(),
    }

    info!("llm-broadcast-relay v{}", env!("CARGO_PKG_VERSION"));

    // Credentials are mandatory; refuse to start without them. A local .env
    // file may supply them.
    let secrets = Secrets::from_env_file(Path::new(".env"))?;
    let connection = ConnectionString::parse(&secrets.webpubsub_connection_string)?;

    let config = Config::load(&cli.config)?;

    info!(
        base_url = %config.upstream.base_url,
        model = %config.upstream.model,
        max_tokens = config.upstream.max_tokens,
        "Upstream configured"
    );

    let endpoint = connection.endpoint.clone();
    let source = AnthropicClient::new(secrets.anthropic_api_key, config.upstream.clone())?;
    let broadcaster = WebPubSubClient::new(connection, HUB_NAME, config.broadcast.clone())?;

    info!(
        endpoint = %endpoint,
        hub = broadcaster.hub(),
        on_publish_error = ?config.broadcast.on_publish_error,
        "Broadcast configured"
    );

    let state = Arc::new(AppState::new(
        Arc::new(source),
        Arc::new(broadcaster),
        config.broadcast.on_publish_error,
    ));

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = cli.listen;
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

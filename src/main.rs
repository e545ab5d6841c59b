use chat_bridge::config::config_search_paths;
use chat_bridge::{build_router, AppState, Gateway, GatewayConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "chat-bridge",
    about = "OpenAI-compatible chat gateway for messages- and responses-style upstreams",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_bridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = GatewayConfig::find_and_load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    // Fail fast on a missing upstream key or a broken model table.
    let upstream_key = config.resolve_upstream_key()?;
    let proxy_key = config.resolve_proxy_key();

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.upstream_timeout_secs))
        .build()?;

    let gateway = Gateway::new(&config, client, &upstream_key)?;

    info!(version = env!("CARGO_PKG_VERSION"), "chat-bridge starting");
    for route in gateway.registry().routes() {
        info!(
            model = %route.id,
            name = %route.name,
            vendor = route.vendor.as_str(),
            reasoning = ?route.reasoning,
            endpoint = %route.endpoint,
            "route"
        );
    }
    if proxy_key.is_none() {
        info!(
            env = %config.auth.proxy_key_env,
            "no proxy key set; any bearer token is accepted"
        );
    }

    let state = Arc::new(AppState::new(gateway, proxy_key));
    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  POST http://localhost:{}/v1/chat/completions", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}

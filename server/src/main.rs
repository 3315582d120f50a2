use std::net::SocketAddr;
use tokio::net::TcpListener;

use clap::Parser;

use forum_server::config::{generate_config_template, Cli, Config};
use forum_server::{db, routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Handle --generate-config: print template and exit
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Layered precedence: defaults < TOML < env < CLI
    let config = Config::load(&cli)?;

    init_tracing(config.json_logs)?;

    tracing::info!("Forum server v{} starting", env!("CARGO_PKG_VERSION"));

    let db = db::init_db(&config.data_dir)?;
    let app_state = state::AppState::new(db, &config);
    let app = routes::build_router(app_state.clone());

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!(
        open_sessions = app_state.registry.session_count(),
        "Server stopped"
    );
    Ok(())
}

fn init_tracing(json_logs: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => "forum_server=info,tower_http=info".parse()?,
    };
    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

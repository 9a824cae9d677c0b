use clap::Parser;
use papyrus_core::{SearchEngine, Settings};
use papyrus_server::api::create_router;
use papyrus_server::api::handlers::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "papyrus-server", about = "Search engine HTTP facade")]
struct Args {
    /// Path to config.json
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(
                    "papyrus_server=info"
                        .parse()
                        .expect("valid directive literal"),
                )
                .add_directive(
                    "papyrus_core=info"
                        .parse()
                        .expect("valid directive literal"),
                ),
        )
        .init();

    let args = Args::parse();

    if args.port == 0 {
        eprintln!("Error: port must be > 0");
        std::process::exit(1);
    }

    let settings = Settings::load(&args.config).unwrap_or_else(|e| {
        eprintln!("Error: cannot load config {}: {}", args.config.display(), e);
        std::process::exit(1);
    });

    let engine = SearchEngine::open(settings).unwrap_or_else(|e| {
        eprintln!("Error: cannot open search engine: {}", e);
        std::process::exit(1);
    });

    let state = AppState {
        engine: Arc::new(engine),
    };
    let app = create_router(state.clone());

    let addr = format!("{}:{}", args.host, args.port);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %addr,
        documents = state.engine.doc_count(),
        semantic = state.engine.semantic_enabled(),
        "papyrus ready"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down gracefully, draining in-flight requests...");
}

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use riccscanner::api::{create_router, AppState};
use riccscanner::config::Config;
use riccscanner::ocr::OcrProvider;

#[derive(Parser)]
#[command(name = "riccscanner")]
#[command(about = "Snap a photo of a math problem, get the answer")]
#[command(version)]
struct Args {
    /// Address to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "riccscanner=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Initializing OCR provider: {}...", config.ocr.model);
    let ocr = OcrProvider::new(&config.ocr)?;
    if !ocr.is_available() {
        tracing::warn!("OCR unavailable - /solve will answer 503 until it is configured");
    }
    if !config.ocr.preprocess {
        tracing::info!("Image preprocessing disabled, OCR receives the raw upload");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = create_router(AppState::new(config, ocr));

    tracing::info!("RiccScanner starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/", addr);
    tracing::info!("  Solve:        POST http://{}/solve", addr);
    tracing::info!("  OpenAPI spec: http://{}/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server...");
}

use cesium_tiler::config::TilerConfig;
use cesium_tiler::create_pipeline;
use cesium_tiler::services::pipeline::TilingJob;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Convert a directory of 3D models into a downloadable 3D Tiles archive.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of the asset to create
    name: String,

    /// Description of the asset
    description: String,

    /// Directory whose files are uploaded as sources (not recursive)
    input_dir: PathBuf,

    /// Where to write the downloaded ZIP archive
    output_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cesium_tiler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Configuration, validated before any network call
    let config = match TilerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ {}", e);
            return Err(e.into());
        }
    };
    info!(
        "🛠️  API: {}, upload region: {}, poll interval: {:?}",
        config.api_base_url, config.upload_region, config.poll.interval
    );

    let pipeline = create_pipeline(&config)?;

    // 3. Ctrl+C / SIGTERM stop polling
    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });

    let job = TilingJob {
        name: args.name,
        description: args.description,
        input_dir: args.input_dir,
        output_file: args.output_file,
    };

    // 4. Run
    match pipeline.run(&job).await {
        Ok(report) => {
            for failed in report.uploads.failed() {
                if let Err(e) = &failed.result {
                    warn!("⚠️  {} was not uploaded: {}", failed.file_name, e);
                }
            }
            info!(
                "👋 Asset {} / archive {}: {} of {} files uploaded, {} bytes written to {}",
                report.asset_id,
                report.archive_id,
                report.uploads.uploaded(),
                report.uploads.attempted(),
                report.bytes_downloaded,
                report.output_file.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ Run failed at {}: {}", e.stage, e.source);
            Err(e.into())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, cancelling...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, cancelling...");
        },
    }
}

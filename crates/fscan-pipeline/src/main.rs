//! Frame analysis pipeline binary.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fscan_pipeline::{FramePipeline, PipelineConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("fscan_pipeline=info".parse().unwrap())
        .add_directive("fscan_analysis=info".parse().unwrap())
        .add_directive("fscan_media=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting framescan");

    let Some(video_path) = std::env::args().nth(1) else {
        error!("Usage: framescan <video-path>");
        std::process::exit(2);
    };

    // Load configuration
    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    // Create pipeline
    let pipeline = match FramePipeline::from_env(config) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create pipeline: {}", e);
            std::process::exit(1);
        }
    };

    match pipeline.run(&video_path).await {
        Ok(report) => {
            for frame_report in &report.reports {
                info!("{}", frame_report.description);
            }
            info!(
                frames = report.frames,
                batches = report.batches,
                completed = report.completed,
                failed = report.failed,
                "Run complete"
            );
        }
        Err(e) => {
            error!("Error processing video: {}", e);
            std::process::exit(1);
        }
    }
}

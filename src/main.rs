use anyhow::Result;
use clap::Parser;
use leaf_diagnosis::{config::{Config, PixelScale}, web::serve};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "leaf-diagnosis")]
#[command(about = "Plant leaf disease diagnosis service (Healthy / Early Blight / Late Blight)")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8501")]
    bind: String,

    /// Path to the ONNX classification model
    #[arg(long, default_value = "models/plant_disease.onnx")]
    model: String,

    /// ONNX Runtime intra-op threads (defaults to 75% of CPU cores)
    #[arg(long)]
    intra_threads: Option<usize>,

    /// Pixel range fed to the model: "raw" (0-255) or "unit" (0-1)
    #[arg(long, default_value = "raw")]
    pixel_scale: PixelScale,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting leaf diagnosis service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Model: {}", args.model);

    let config = Config::new(
        args.bind,
        args.model,
        args.intra_threads,
        args.pixel_scale,
        args.dev,
    )?;

    serve(config).await?;

    Ok(())
}

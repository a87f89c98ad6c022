//! kopista - capture a camera frame, recognize its text, save the result
//!
//! Model assets (detector network, recognizer network, character
//! dictionary) are fetched once and served from a persistent local store
//! on every later run; the OCR engine is only constructed when all three
//! resolve.

mod assets;
mod capture;
mod config;
mod ocr;
mod output;
mod storage;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::assets::{
    store, AssetLoader, AssetStore, HttpFetcher, LoadedAssets, MemoryStore, ModelWorker,
};
use crate::capture::CapturedFrame;
use crate::config::AppConfig;
use crate::ocr::{PaddleOcrEngine, TextRecognizer};

/// kopista - frame capture OCR with cached model loading
#[derive(Parser, Debug)]
#[command(name = "kopista")]
#[command(about = "Recognize text in a captured camera frame and save it")]
struct Args {
    /// Image file holding the captured frame
    #[arg(short, long)]
    image: PathBuf,

    /// Directory for the saved text (default: config, then current dir)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Save as Markdown instead of plain text
    #[arg(long)]
    markdown: bool,

    /// Resolve model assets on a background worker
    #[arg(long)]
    worker: bool,

    /// Print the recognized text without saving it
    #[arg(long)]
    no_save: bool,

    /// Configuration file (default: platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = load_or_create_config(args.config.as_deref())?;
    config.models.apply_env_overrides();

    info!("kopista starting");

    let assets = load_assets(&config, args.worker).await?;

    let mut engine = PaddleOcrEngine::from_assets(&assets, config.engine.to_options())
        .context("failed to initialize OCR engine")?;

    let frame = CapturedFrame::from_path(&args.image)?;
    info!(
        width = frame.width,
        height = frame.height,
        "frame loaded, running OCR"
    );

    let result = engine.recognize(&frame)?;
    if result.is_empty() {
        info!("no text detected");
        return Ok(());
    }

    let text = result.text();
    info!(
        lines = result.lines.len(),
        confidence = result.average_confidence(),
        "recognition complete"
    );
    println!("{text}");

    if !args.no_save {
        let dir = args
            .output_dir
            .or_else(|| config.output.dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let extension = if args.markdown {
            "md"
        } else {
            config.output.extension.as_str()
        };
        let path = output::save_text(&text, &dir, extension)?;
        info!(path = %path.display(), "recognized text saved");
    }

    Ok(())
}

/// Load the configuration, falling back to defaults. A missing default
/// config file is created so users have something to edit.
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return config::load_config(path)
            .with_context(|| format!("failed to load config: {}", path.display()));
    }

    let path = storage::get_config_dir()?.join("config.toml");
    if path.exists() {
        match config::load_config(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                Ok(AppConfig::default())
            }
        }
    } else {
        let config = AppConfig::default();
        if let Err(e) = config::save_config(&config, &path) {
            warn!(path = %path.display(), error = %e, "could not write default config");
        }
        Ok(config)
    }
}

/// Resolve the three model assets, cache-first, directly or through the
/// background worker.
async fn load_assets(config: &AppConfig, use_worker: bool) -> Result<LoadedAssets> {
    let store: Arc<dyn AssetStore> = if config.cache.enabled {
        let root = match &config.cache.dir {
            Some(dir) => dir.clone(),
            None => storage::default_model_store_dir()?,
        };
        store::open_or_fallback(&root)
    } else {
        Arc::new(MemoryStore::new())
    };

    let fetcher = Arc::new(HttpFetcher::new()?);

    let result = if use_worker {
        let worker = ModelWorker::spawn(store, fetcher);
        let assets = worker.load(config.models.sources()).await;
        worker.shutdown().await;
        assets
    } else {
        let loader = AssetLoader::new(store, fetcher, config.models.sources());
        loader.load().await
    };

    Ok(result.context("failed to load OCR models")?)
}

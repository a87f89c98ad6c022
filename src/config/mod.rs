//! Application Configuration
//!
//! User settings stored in TOML format, with environment overrides for
//! the model URLs.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::assets::{AssetSource, AssetSources};
use crate::ocr::EngineOptions;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Model asset sources
    pub models: ModelSettings,
    /// Cache settings
    pub cache: CacheSettings,
    /// OCR engine settings
    pub engine: EngineSettings,
    /// Output settings
    pub output: OutputSettings,
}

/// Remote locations of the three model assets, with optional content
/// hashes for cache busting when the remote files change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// URL of the text detection model (DBNet)
    pub det_url: String,
    /// URL of the text recognition model (CRNN)
    pub rec_url: String,
    /// URL of the character dictionary
    pub dict_url: String,
    /// Expected SHA-256 of the detection model
    pub det_sha256: Option<String>,
    /// Expected SHA-256 of the recognition model
    pub rec_sha256: Option<String>,
    /// Expected SHA-256 of the dictionary
    pub dict_sha256: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        // PaddleOCR ONNX exports from Hugging Face (monkt/paddleocr-onnx)
        Self {
            det_url:
                "https://huggingface.co/monkt/paddleocr-onnx/resolve/main/detection/v3/det.onnx"
                    .to_string(),
            rec_url:
                "https://huggingface.co/monkt/paddleocr-onnx/resolve/main/languages/english/rec.onnx"
                    .to_string(),
            dict_url:
                "https://huggingface.co/monkt/paddleocr-onnx/resolve/main/languages/english/dict.txt"
                    .to_string(),
            det_sha256: None,
            rec_sha256: None,
            dict_sha256: None,
        }
    }
}

impl ModelSettings {
    /// Override URLs from `KOPISTA_DET_URL`, `KOPISTA_REC_URL` and
    /// `KOPISTA_DICT_URL`, the runtime equivalent of the original's
    /// build-time `VITE_*_URL` variables.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("KOPISTA_DET_URL") {
            self.det_url = url;
        }
        if let Ok(url) = std::env::var("KOPISTA_REC_URL") {
            self.rec_url = url;
        }
        if let Ok(url) = std::env::var("KOPISTA_DICT_URL") {
            self.dict_url = url;
        }
    }

    /// Build the loader's source triple.
    pub fn sources(&self) -> AssetSources {
        AssetSources {
            det: AssetSource {
                url: self.det_url.clone(),
                sha256: self.det_sha256.clone(),
            },
            rec: AssetSource {
                url: self.rec_url.clone(),
                sha256: self.rec_sha256.clone(),
            },
            dict: AssetSource {
                url: self.dict_url.clone(),
                sha256: self.dict_sha256.clone(),
            },
        }
    }
}

/// Persistent model cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache models on disk between runs
    pub enabled: bool,
    /// Override the store directory (default: platform data dir)
    pub dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Insert spaces between recognized characters where the model
    /// predicts them (the original's `optimize.space` knob)
    pub space: bool,
    /// Detection probability threshold (0.0 - 1.0)
    pub det_threshold: f32,
    /// Maximum detection input dimension
    pub det_target_size: u32,
    /// Recognition input height
    pub rec_height: u32,
    /// Maximum recognition input width
    pub rec_max_width: u32,
    /// Intra-op thread count for the ONNX runtime
    pub intra_threads: usize,
}

// The engine owns the default tuning values; settings only mirror them
// into the config file.
impl Default for EngineSettings {
    fn default() -> Self {
        let options = EngineOptions::default();
        Self {
            space: options.space,
            det_threshold: options.det_threshold,
            det_target_size: options.det_target_size,
            rec_height: options.rec_height,
            rec_max_width: options.rec_max_width,
            intra_threads: options.intra_threads,
        }
    }
}

impl EngineSettings {
    pub fn to_options(&self) -> EngineOptions {
        EngineOptions {
            space: self.space,
            det_threshold: self.det_threshold,
            det_target_size: self.det_target_size,
            rec_height: self.rec_height,
            rec_max_width: self.rec_max_width,
            intra_threads: self.intra_threads,
        }
    }
}

/// Recognized-text output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory for saved text files (default: current directory)
    pub dir: Option<PathBuf>,
    /// File extension for saved text ("txt" or "md")
    pub extension: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: None,
            extension: "txt".to_string(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert!(config.models.det_url.ends_with("det.onnx"));
        assert!(config.models.rec_url.ends_with("rec.onnx"));
        assert!(config.models.dict_url.ends_with("dict.txt"));
        assert!(config.models.det_sha256.is_none());

        assert!(config.cache.enabled);
        assert!(config.cache.dir.is_none());

        assert!(!config.engine.space);
        assert!((config.engine.det_threshold - 0.3).abs() < 0.01);
        assert_eq!(config.engine.rec_height, 48);
        assert_eq!(config.engine.intra_threads, 4);

        assert_eq!(config.output.extension, "txt");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.models.det_url, parsed.models.det_url);
        assert_eq!(config.cache.enabled, parsed.cache.enabled);
        assert_eq!(config.engine.rec_max_width, parsed.engine.rec_max_width);
        assert_eq!(config.output.extension, parsed.output.extension);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [models]
            det_url = "http://localhost/det.onnx"

            [engine]
            space = true
            "#,
        )
        .unwrap();

        assert_eq!(parsed.models.det_url, "http://localhost/det.onnx");
        // Unspecified fields keep their defaults.
        assert!(parsed.models.rec_url.ends_with("rec.onnx"));
        assert!(parsed.engine.space);
        assert_eq!(parsed.engine.rec_height, 48);
        assert!(parsed.cache.enabled);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.cache.enabled = false;
        config.output.extension = "md".to_string();

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert!(!loaded.cache.enabled);
        assert_eq!(loaded.output.extension, "md");
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_default_engine_settings_mirror_engine_options() {
        let from_settings = EngineSettings::default().to_options();
        let options = EngineOptions::default();

        assert_eq!(from_settings.space, options.space);
        assert!((from_settings.det_threshold - options.det_threshold).abs() < f32::EPSILON);
        assert_eq!(from_settings.det_target_size, options.det_target_size);
        assert_eq!(from_settings.rec_height, options.rec_height);
        assert_eq!(from_settings.rec_max_width, options.rec_max_width);
        assert_eq!(from_settings.intra_threads, options.intra_threads);
    }

    #[test]
    fn test_sources_carry_hashes() {
        let mut settings = ModelSettings::default();
        settings.rec_sha256 = Some("abc123".to_string());

        let sources = settings.sources();
        assert_eq!(sources.rec.sha256.as_deref(), Some("abc123"));
        assert!(sources.det.sha256.is_none());
        assert_eq!(sources.dict.url, settings.dict_url);
    }
}

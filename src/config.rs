//! Extractor configuration, optionally read from a JSON file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::consts::MIN_SKEW_DEGREES;
use crate::ocr::RecognitionConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Executable used for the version probe.
    pub binary: PathBuf,
    pub tessdata_dir: Option<PathBuf>,
    pub language: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            tessdata_dir: None,
            language: "eng".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Odd window size of the adaptive threshold.
    pub adaptive_block_size: i32,
    pub adaptive_offset: f64,
    pub clahe_clip_limit: f64,
    pub clahe_tile_grid: i32,
    /// Odd Gaussian kernel size.
    pub blur_kernel: i32,
    pub close_kernel: i32,
    pub denoise_strength: f32,
    pub deskew: bool,
    pub min_skew_degrees: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            adaptive_block_size: 11,
            adaptive_offset: 2.0,
            clahe_clip_limit: 2.0,
            clahe_tile_grid: 8,
            blur_kernel: 5,
            close_kernel: 2,
            denoise_strength: 10.0,
            deskew: true,
            min_skew_degrees: MIN_SKEW_DEGREES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub tesseract: TesseractConfig,
    pub recognition_configs: Vec<RecognitionConfig>,
    pub preprocess: PreprocessConfig,
    /// Run the recognition batch on the rayon pool.
    pub parallel: bool,
    /// Recognition batches slower than this are logged as a warning.
    pub slow_recognition_ms: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            tesseract: TesseractConfig::default(),
            recognition_configs: RecognitionConfig::defaults(),
            preprocess: PreprocessConfig::default(),
            parallel: true,
            slow_recognition_ms: 10_000,
        }
    }
}

impl ExtractorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.preprocess;
        anyhow::ensure!(
            p.adaptive_block_size > 1 && p.adaptive_block_size % 2 == 1,
            "adaptive_block_size must be odd and greater than 1"
        );
        anyhow::ensure!(
            p.blur_kernel > 0 && p.blur_kernel % 2 == 1,
            "blur_kernel must be odd and positive"
        );
        anyhow::ensure!(p.close_kernel > 0, "close_kernel must be positive");
        anyhow::ensure!(p.clahe_tile_grid > 0, "clahe_tile_grid must be positive");
        anyhow::ensure!(
            !self.recognition_configs.is_empty(),
            "at least one recognition config is required"
        );
        Ok(())
    }
}

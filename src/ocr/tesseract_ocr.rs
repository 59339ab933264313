// Tesseract-based text recognition

use super::{RecognitionConfig, TextRecognizer};
use crate::config::TesseractConfig;
use anyhow::{Context, Result, anyhow};
use image::{GrayImage, ImageFormat};
use std::{io::Cursor, process::Command};
use tesseract::{OcrEngineMode, PageSegMode, Tesseract};

/// Tesseract engine. A fresh API handle is created per call, so one
/// engine can serve parallel recognition calls.
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    fn page_seg_mode(psm: u8) -> PageSegMode {
        match psm {
            0 => PageSegMode::PsmOsdOnly,
            1 => PageSegMode::PsmAutoOsd,
            2 => PageSegMode::PsmAutoOnly,
            3 => PageSegMode::PsmAuto,
            4 => PageSegMode::PsmSingleColumn,
            5 => PageSegMode::PsmSingleBlockVertText,
            6 => PageSegMode::PsmSingleBlock,
            7 => PageSegMode::PsmSingleLine,
            8 => PageSegMode::PsmSingleWord,
            9 => PageSegMode::PsmCircleWord,
            10 => PageSegMode::PsmSingleChar,
            11 => PageSegMode::PsmSparseText,
            12 => PageSegMode::PsmSparseTextOsd,
            13 => PageSegMode::PsmRawLine,
            _ => PageSegMode::PsmAuto,
        }
    }

    fn engine_mode(oem: u8) -> OcrEngineMode {
        match oem {
            0 => OcrEngineMode::TesseractOnly,
            1 => OcrEngineMode::LstmOnly,
            2 => OcrEngineMode::TesseractLstmCombined,
            _ => OcrEngineMode::Default,
        }
    }

    fn encode_png(img: &GrayImage) -> Result<Vec<u8>> {
        let mut png_bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .context("Failed to encode image as PNG")?;
        Ok(png_bytes)
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, img: &GrayImage, config: &RecognitionConfig) -> Result<String> {
        let png_bytes = Self::encode_png(img)?;
        let datapath = self
            .config
            .tessdata_dir
            .as_deref()
            .map(|dir| dir.to_str().ok_or_else(|| anyhow!("tessdata path is not UTF-8")))
            .transpose()?;

        let mut tess = Tesseract::new_with_oem(
            datapath,
            Some(self.config.language.as_str()),
            Self::engine_mode(config.oem),
        )
        .map_err(|e| anyhow!("Failed to initialize Tesseract: {}", e))?;

        if let Some(whitelist) = &config.char_whitelist {
            tess = tess
                .set_variable("tessedit_char_whitelist", whitelist)
                .map_err(|e| anyhow!("Failed to set character whitelist: {}", e))?;
        }

        tess = tess
            .set_image_from_mem(&png_bytes)
            .map_err(|e| anyhow!("Failed to load image into Tesseract: {}", e))?;
        tess.set_page_seg_mode(Self::page_seg_mode(config.psm));

        tess.get_text()
            .map_err(|e| anyhow!("Tesseract failed: {}", e))
    }

    fn version(&self) -> Result<String> {
        let output = Command::new(&self.config.binary)
            .arg("--version")
            .output()
            .with_context(|| format!("Failed to run {}", self.config.binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract version probe failed: {}", stderr));
        }

        // Older releases print the banner on stderr.
        [&output.stdout, &output.stderr]
            .into_iter()
            .map(|stream| String::from_utf8_lossy(stream).into_owned())
            .find_map(|text| {
                text.lines()
                    .next()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
            })
            .ok_or_else(|| anyhow!("Tesseract printed no version"))
    }
}

// Text recognition trait and the batch adapter over preprocessed variants

use anyhow::Result;
use image::GrayImage;
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::CHAR_WHITELIST;
use crate::error::RecoverableError;
use crate::preprocess::{PreprocessedImage, VariantKind};

pub mod tesseract_ocr;

/// One recognition pass configuration: page segmentation mode, engine
/// mode and an optional restricted alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub psm: u8,
    pub oem: u8,
    #[serde(default)]
    pub char_whitelist: Option<String>,
}

impl RecognitionConfig {
    pub fn new(psm: u8, oem: u8) -> Self {
        Self {
            psm,
            oem,
            char_whitelist: None,
        }
    }

    pub fn with_whitelist(mut self, whitelist: impl Into<String>) -> Self {
        self.char_whitelist = Some(whitelist.into());
        self
    }

    /// Uniform block, single column, and uniform block restricted to the
    /// characters a lab value line can contain.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(6, 3),
            Self::new(4, 3),
            Self::new(6, 3).with_whitelist(CHAR_WHITELIST),
        ]
    }
}

/// Trait for engines that turn a grayscale or binary image into text
pub trait TextRecognizer: Sync {
    fn recognize(&self, img: &GrayImage, config: &RecognitionConfig) -> Result<String>;

    /// Version string of the underlying engine, or an error if it is unavailable.
    fn version(&self) -> Result<String>;
}

/// Text recovered from one (variant, configuration) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextCandidate {
    pub variant: VariantKind,
    pub config: usize,
    pub text: String,
}

impl AsRef<str> for TextCandidate {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Runs `recognizer` once per (image, config) pair and keeps every
/// non-blank result.
///
/// Candidates come back variant-major, then by config index, whether or
/// not the calls ran in parallel. A failing call is logged and skipped.
pub fn recognize_all<R: TextRecognizer>(
    recognizer: &R,
    images: &[PreprocessedImage],
    configs: &[RecognitionConfig],
    parallel: bool,
) -> Vec<TextCandidate> {
    let jobs: Vec<(&PreprocessedImage, usize, &RecognitionConfig)> = images
        .iter()
        .flat_map(|image| {
            configs
                .iter()
                .enumerate()
                .map(move |(index, config)| (image, index, config))
        })
        .collect();

    let run = |(image, index, config): (&PreprocessedImage, usize, &RecognitionConfig)| {
        match recognizer.recognize(&image.image, config) {
            Ok(text) if !text.trim().is_empty() => Some(TextCandidate {
                variant: image.kind,
                config: index,
                text,
            }),
            Ok(_) => {
                debug!("{:?} with config #{} produced no text", image.kind, index);
                None
            }
            Err(source) => {
                warn!(
                    "{}",
                    RecoverableError::RecognitionCall {
                        variant: image.kind,
                        config: index,
                        source,
                    }
                );
                None
            }
        }
    };

    let results: Vec<Option<TextCandidate>> = if parallel {
        jobs.into_par_iter().map(run).collect()
    } else {
        jobs.into_iter().map(run).collect()
    };

    results.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use image::Luma;

    /// Answers with the variant's pixel value and the config's psm.
    struct EchoRecognizer;

    impl TextRecognizer for EchoRecognizer {
        fn recognize(&self, img: &GrayImage, config: &RecognitionConfig) -> Result<String> {
            let shade = img.get_pixel(0, 0)[0];
            match (shade, config.psm) {
                (0, _) => bail!("engine rejected image"),
                (_, 11) => Ok("   \n ".to_string()),
                (shade, psm) => Ok(format!("{shade}/{psm}")),
            }
        }

        fn version(&self) -> Result<String> {
            Ok("echo 1.0".to_string())
        }
    }

    fn image(kind: VariantKind, shade: u8) -> PreprocessedImage {
        PreprocessedImage {
            kind,
            image: GrayImage::from_pixel(4, 4, Luma([shade])),
        }
    }

    fn texts(candidates: &[TextCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_default_configs() {
        let configs = RecognitionConfig::defaults();
        assert_eq!(configs.len(), 3);
        assert_eq!(configs[2].char_whitelist.as_deref(), Some(CHAR_WHITELIST));
        assert!(configs[..2].iter().all(|c| c.char_whitelist.is_none()));
    }

    #[test]
    fn test_order_is_variant_major() {
        let images = [image(VariantKind::Adaptive, 1), image(VariantKind::BlurOtsu, 2)];
        let configs = [RecognitionConfig::new(6, 3), RecognitionConfig::new(4, 3)];

        for parallel in [false, true] {
            let candidates = recognize_all(&EchoRecognizer, &images, &configs, parallel);
            assert_eq!(texts(&candidates), ["1/6", "1/4", "2/6", "2/4"]);
            assert_eq!(candidates[2].variant, VariantKind::BlurOtsu);
            assert_eq!(candidates[3].config, 1);
        }
    }

    #[test]
    fn test_failures_and_blank_output_are_skipped() {
        let images = [
            image(VariantKind::Adaptive, 0),
            image(VariantKind::Clahe, 7),
        ];
        let configs = [RecognitionConfig::new(11, 3), RecognitionConfig::new(6, 3)];

        let candidates = recognize_all(&EchoRecognizer, &images, &configs, true);
        assert_eq!(texts(&candidates), ["7/6"]);
        assert_eq!(candidates[0].variant, VariantKind::Clahe);
    }

    #[test]
    fn test_no_images_no_candidates() {
        let candidates = recognize_all(&EchoRecognizer, &[], &RecognitionConfig::defaults(), true);
        assert!(candidates.is_empty());
    }
}

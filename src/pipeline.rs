use crate::catalog::{self, ParameterSpec};
use crate::config::ExtractorConfig;
use crate::error::ExtractionError;
use crate::matcher;
use crate::ocr::{
    RecognitionConfig, TextCandidate, TextRecognizer, recognize_all,
    tesseract_ocr::TesseractEngine,
};
use crate::preprocess::Preprocessor;
use crate::report::{ExtractionResult, ProcessingInfo, Report};
use image::GrayImage;
use log::{info, warn};
use std::{collections::BTreeMap, time::Duration, time::Instant};

/// Turns one raw report image into a [`Report`].
///
/// Holds no per-request state, so one extractor can serve any number of
/// requests.
pub struct ReportExtractor<R: TextRecognizer> {
    recognizer: R,
    preprocessor: Preprocessor,
    recognition_configs: Vec<RecognitionConfig>,
    catalog: &'static [ParameterSpec],
    parallel: bool,
    slow_recognition: Duration,
}

impl ReportExtractor<TesseractEngine> {
    pub fn with_tesseract(config: ExtractorConfig) -> Self {
        let engine = TesseractEngine::new(config.tesseract.clone());
        Self::new(engine, config)
    }
}

impl<R: TextRecognizer> ReportExtractor<R> {
    pub fn new(recognizer: R, config: ExtractorConfig) -> Self {
        Self {
            recognizer,
            preprocessor: Preprocessor::new(config.preprocess),
            recognition_configs: config.recognition_configs,
            catalog: catalog::catalog(),
            parallel: config.parallel,
            slow_recognition: Duration::from_millis(config.slow_recognition_ms),
        }
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Runs the whole pipeline. All-or-nothing: either every stage ran and
    /// a report comes back, or the request fails without a partial report.
    pub fn extract(&self, image_bytes: &[u8]) -> Result<Report, ExtractionError> {
        let now = Instant::now();

        let gray = decode_grayscale(image_bytes)?;
        let images = self.preprocessor.variants(&gray);
        let preprocess_time = now.elapsed();

        let candidates = recognize_all(
            &self.recognizer,
            &images,
            &self.recognition_configs,
            self.parallel,
        );
        let recognition_time = now.elapsed() - preprocess_time;
        if recognition_time > self.slow_recognition {
            warn!("Recognition took too long: {:?}", recognition_time);
        }

        if candidates.is_empty() {
            return Err(ExtractionError::NoTextExtracted {
                attempts: images.len() * self.recognition_configs.len(),
            });
        }

        let outcome = matcher::match_catalog(self.catalog, &candidates);
        let parameters: BTreeMap<String, ExtractionResult> = outcome
            .readings
            .into_iter()
            .map(|(spec, reading)| {
                (spec.name.to_string(), ExtractionResult::from_reading(spec, reading))
            })
            .collect();
        let matching_time = now.elapsed() - preprocess_time - recognition_time;

        info!(
            "{} image variants, {} text candidates, {} parameters. Preprocess/OCR/Match time: {}/{}/{} ms",
            images.len(),
            candidates.len(),
            parameters.len(),
            preprocess_time.as_millis(),
            recognition_time.as_millis(),
            matching_time.as_millis()
        );

        let processing_info = ProcessingInfo {
            images_processed: images.len(),
            text_candidates: candidates.len(),
            patterns_attempted: outcome.patterns_attempted,
            preprocess_ms: preprocess_time.as_millis() as u64,
            recognition_ms: recognition_time.as_millis() as u64,
            matching_ms: matching_time.as_millis() as u64,
        };

        Ok(Report::build(parameters, processing_info))
    }

    /// Only the recognition half of the pipeline, for inspecting raw OCR output.
    pub fn text_candidates(&self, image_bytes: &[u8]) -> Result<Vec<TextCandidate>, ExtractionError> {
        let gray = decode_grayscale(image_bytes)?;
        let images = self.preprocessor.variants(&gray);
        Ok(recognize_all(
            &self.recognizer,
            &images,
            &self.recognition_configs,
            self.parallel,
        ))
    }
}

pub fn decode_grayscale(image_bytes: &[u8]) -> Result<GrayImage, ExtractionError> {
    Ok(image::load_from_memory(image_bytes)?.to_luma8())
}

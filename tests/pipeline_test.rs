use anyhow::{Result, bail};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use labscan::{
    ExtractionError, ReportExtractor,
    classify::Status,
    config::ExtractorConfig,
    matcher::ConfidenceTier,
    ocr::{RecognitionConfig, TextRecognizer},
    report::ExtractionQuality,
};
use std::io::Cursor;

/// Returns the same text for every image and configuration.
struct ScriptedRecognizer {
    text: &'static str,
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&self, _img: &GrayImage, _config: &RecognitionConfig) -> Result<String> {
        Ok(self.text.to_string())
    }

    fn version(&self) -> Result<String> {
        Ok("scripted 0.1".to_string())
    }
}

struct BrokenRecognizer;

impl TextRecognizer for BrokenRecognizer {
    fn recognize(&self, _img: &GrayImage, _config: &RecognitionConfig) -> Result<String> {
        bail!("engine not installed")
    }

    fn version(&self) -> Result<String> {
        bail!("engine not installed")
    }
}

/// Deskew disabled so the number of variants does not depend on the page.
fn config(parallel: bool) -> ExtractorConfig {
    let mut config = ExtractorConfig::default();
    config.preprocess.deskew = false;
    config.parallel = parallel;
    config
}

fn extractor(text: &'static str) -> ReportExtractor<ScriptedRecognizer> {
    ReportExtractor::new(ScriptedRecognizer { text }, config(true))
}

/// PNG of a light page with a few dark text-like bars.
fn page_png() -> Vec<u8> {
    let page = GrayImage::from_fn(160, 120, |x, y| {
        let in_bar = (10..150).contains(&x) && [20..28, 50..58, 80..88].iter().any(|r| r.contains(&y));
        if in_bar { Luma([30]) } else { Luma([230]) }
    });

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(page)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

const CBC_TEXT: &str = "\
COMPLETE BLOOD COUNT
Hemoglobin (Hb) 9.5 g/dL 12.0 - 15.0
Total WBC Count 7,500 /cumm
Platelet Count 2,50,000 /cumm
MCV 88.1 fL
";

#[test]
fn test_extracts_low_hemoglobin() {
    let report = extractor(CBC_TEXT).extract(&page_png()).unwrap();

    let hb = &report.parameters["Hemoglobin"];
    assert_eq!(hb.value, 9.5);
    assert_eq!(hb.status, Status::Low);
    assert_eq!(hb.confidence, 0.9);
    assert_eq!(hb.confidence_tier, ConfidenceTier::PatternMatch);
    assert_eq!(hb.normal_range, "12-15");

    assert_eq!(report.parameters["WBC Count"].value, 7500.0);
    assert_eq!(report.parameters["Platelet Count"].value, 250000.0);
    assert_eq!(report.parameters["MCV"].status, Status::Normal);

    assert_eq!(report.summary.report_type, "Complete Blood Count");
    assert_eq!(report.summary.abnormal_parameters, 1);
    assert_eq!(report.summary.extraction_quality, ExtractionQuality::High);
}

#[test]
fn test_processing_info_counts_work_done() {
    let report = extractor(CBC_TEXT).extract(&page_png()).unwrap();
    let info = &report.processing_info;

    assert_eq!(info.images_processed, 5);
    assert_eq!(info.text_candidates, 5 * RecognitionConfig::defaults().len());
    assert!(info.patterns_attempted > 0);
}

#[test]
fn test_implausible_value_is_dropped() {
    let report = extractor("WBC Count 999999\nHemoglobin 13.2")
        .extract(&page_png())
        .unwrap();

    assert!(!report.parameters.contains_key("WBC Count"));
    assert_eq!(report.parameters["Hemoglobin"].status, Status::Normal);
}

#[test]
fn test_value_on_following_line_is_context_match() {
    let report = extractor("Hemoglobin level\n11.2 g/dL").extract(&page_png()).unwrap();

    let hb = &report.parameters["Hemoglobin"];
    assert_eq!(hb.value, 11.2);
    assert_eq!(hb.confidence_tier, ConfidenceTier::ContextMatch);
    assert_eq!(hb.confidence, 0.7);
    assert_eq!(report.summary.extraction_quality, ExtractionQuality::Medium);
}

#[test]
fn test_text_without_parameters_gives_empty_report() {
    let report = extractor("Patient name: Jane Doe\nReferred by: Dr. X")
        .extract(&page_png())
        .unwrap();

    assert!(report.parameters.is_empty());
    assert!(report.categories.is_empty());
    assert_eq!(report.summary.report_type, "Medical Report");
    assert_eq!(report.summary.overall_status, "Normal");
}

#[test]
fn test_blank_text_is_an_error() {
    let err = extractor("  \n\t ").extract(&page_png()).unwrap_err();
    match err {
        ExtractionError::NoTextExtracted { attempts } => assert_eq!(attempts, 15),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_failing_engine_is_an_error() {
    let extractor = ReportExtractor::new(BrokenRecognizer, config(false));
    assert!(matches!(
        extractor.extract(&page_png()),
        Err(ExtractionError::NoTextExtracted { .. })
    ));
}

#[test]
fn test_undecodable_bytes() {
    assert!(matches!(
        extractor(CBC_TEXT).extract(b"definitely not an image"),
        Err(ExtractionError::Decode(_))
    ));
    assert!(matches!(
        extractor(CBC_TEXT).extract(&[]),
        Err(ExtractionError::Decode(_))
    ));
}

#[test]
fn test_sequential_and_parallel_agree() {
    let png = page_png();
    let parallel = extractor(CBC_TEXT).extract(&png).unwrap();
    let sequential = ReportExtractor::new(ScriptedRecognizer { text: CBC_TEXT }, config(false))
        .extract(&png)
        .unwrap();

    assert_eq!(parallel.parameters, sequential.parameters);
    assert_eq!(parallel.summary, sequential.summary);
}

#[test]
fn test_text_candidates_are_tagged() {
    let candidates = extractor(CBC_TEXT).text_candidates(&page_png()).unwrap();
    assert_eq!(candidates.len(), 15);
    assert_eq!(candidates[0].config, 0);
    assert_eq!(candidates[14].config, 2);
}

#[test]
fn test_report_json_shape() {
    let report = extractor(CBC_TEXT).extract(&page_png()).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["parameters"]["Hemoglobin"]["status"], "Low");
    assert_eq!(json["categories"]["Blood Counts"]["Hemoglobin"]["unit"], "g/dL");
    assert_eq!(json["categories"]["Red Cell Indices"]["MCV"]["value"], 88.1);
    assert_eq!(json["processing_info"]["images_processed"], 5);
}

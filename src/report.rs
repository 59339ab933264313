//! Classified parameters, their grouping by category, and summary statistics.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::{Category, ParameterSpec};
use crate::classify::{Status, classify, interpret};
use crate::consts::{BLOOD_COUNT_REPORT, GENERIC_REPORT};
use crate::matcher::{ConfidenceTier, Reading};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub value: f64,
    pub unit: &'static str,
    pub normal_range: String,
    pub status: Status,
    pub interpretation: String,
    pub category: Category,
    pub confidence: f64,
    pub confidence_tier: ConfidenceTier,
}

impl ExtractionResult {
    /// Classifies an accepted reading against its catalog entry.
    pub fn from_reading(spec: &ParameterSpec, reading: Reading) -> Self {
        let normal_range = spec.normal_range.to_string();
        let status = classify(reading.value, &normal_range);

        Self {
            value: reading.value,
            unit: spec.unit,
            interpretation: interpret(spec.name, status).into_owned(),
            normal_range,
            status,
            category: spec.category,
            confidence: reading.confidence(),
            confidence_tier: reading.tier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtractionQuality {
    High,
    Medium,
    Low,
}

impl ExtractionQuality {
    pub fn from_confidence(average: f64) -> Self {
        if average > 0.8 {
            ExtractionQuality::High
        } else if average > 0.6 {
            ExtractionQuality::Medium
        } else {
            ExtractionQuality::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_parameters: usize,
    pub abnormal_parameters: usize,
    pub overall_status: String,
    pub report_type: String,
    pub average_confidence: f64,
    pub extraction_quality: ExtractionQuality,
}

/// Diagnostics about how much work one request did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingInfo {
    pub images_processed: usize,
    pub text_candidates: usize,
    pub patterns_attempted: usize,
    pub preprocess_ms: u64,
    pub recognition_ms: u64,
    pub matching_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub parameters: BTreeMap<String, ExtractionResult>,
    pub categories: BTreeMap<Category, BTreeMap<String, ExtractionResult>>,
    pub processing_info: ProcessingInfo,
}

impl Report {
    pub fn build(
        parameters: BTreeMap<String, ExtractionResult>,
        processing_info: ProcessingInfo,
    ) -> Self {
        let mut categories: BTreeMap<Category, BTreeMap<String, ExtractionResult>> =
            BTreeMap::new();
        for (name, result) in &parameters {
            categories
                .entry(result.category)
                .or_default()
                .insert(name.clone(), result.clone());
        }

        Self {
            summary: Summary::of(&parameters),
            parameters,
            categories,
            processing_info,
        }
    }
}

impl Summary {
    pub fn of(parameters: &BTreeMap<String, ExtractionResult>) -> Self {
        let total_parameters = parameters.len();
        let abnormal_parameters = parameters
            .values()
            .filter(|result| result.status.is_abnormal())
            .count();

        let overall_status = if abnormal_parameters == 0 {
            "Normal".to_string()
        } else {
            format!("{abnormal_parameters} parameter(s) abnormal")
        };

        let report_type = if parameters
            .values()
            .any(|result| result.category == Category::BloodCounts)
        {
            BLOOD_COUNT_REPORT
        } else {
            GENERIC_REPORT
        };

        let average_confidence = if total_parameters == 0 {
            0.0
        } else {
            parameters.values().map(|result| result.confidence).sum::<f64>()
                / total_parameters as f64
        };

        Self {
            total_parameters,
            abnormal_parameters,
            overall_status,
            report_type: report_type.to_string(),
            average_confidence,
            extraction_quality: ExtractionQuality::from_confidence(average_confidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find;

    fn result(name: &str, value: f64, tier: ConfidenceTier) -> (String, ExtractionResult) {
        let reading = Reading {
            value,
            tier,
            candidate: 0,
        };
        (
            name.to_string(),
            ExtractionResult::from_reading(find(name).unwrap(), reading),
        )
    }

    #[test]
    fn test_from_reading() {
        let (_, hb) = result("Hemoglobin", 9.5, ConfidenceTier::PatternMatch);
        assert_eq!(hb.status, Status::Low);
        assert_eq!(hb.normal_range, "12-15");
        assert_eq!(hb.unit, "g/dL");
        assert_eq!(hb.confidence, 0.9);
        assert!(hb.interpretation.contains("anemia"));
    }

    #[test]
    fn test_unspecified_range_is_normal() {
        let (_, esr) = result("ESR", 35.0, ConfidenceTier::PatternMatch);
        assert_eq!(esr.status, Status::Normal);
    }

    #[test]
    fn test_summary_counts_abnormal() {
        let parameters: BTreeMap<_, _> = [
            result("Hemoglobin", 13.0, ConfidenceTier::PatternMatch),
            result("WBC Count", 3000.0, ConfidenceTier::PatternMatch),
            result("MCV", 110.0, ConfidenceTier::ContextMatch),
        ]
        .into_iter()
        .collect();

        let report = Report::build(parameters, ProcessingInfo::default());
        assert_eq!(report.summary.total_parameters, 3);
        assert_eq!(report.summary.abnormal_parameters, 2);
        assert_eq!(report.summary.overall_status, "2 parameter(s) abnormal");
        assert_eq!(report.summary.report_type, "Complete Blood Count");
        assert!((report.summary.average_confidence - 2.5 / 3.0).abs() < 1e-12);
        assert_eq!(report.summary.extraction_quality, ExtractionQuality::High);
    }

    #[test]
    fn test_categories_partition_parameters() {
        let parameters: BTreeMap<_, _> = [
            result("Hemoglobin", 13.0, ConfidenceTier::PatternMatch),
            result("MCV", 90.0, ConfidenceTier::PatternMatch),
            result("MCH", 29.0, ConfidenceTier::PatternMatch),
        ]
        .into_iter()
        .collect();

        let report = Report::build(parameters, ProcessingInfo::default());
        assert_eq!(report.categories.len(), 2);
        assert_eq!(report.categories[&Category::RedCellIndices].len(), 2);
        assert!(report.categories[&Category::BloodCounts].contains_key("Hemoglobin"));
        assert_eq!(report.summary.overall_status, "Normal");
    }

    #[test]
    fn test_empty_report() {
        let report = Report::build(BTreeMap::new(), ProcessingInfo::default());
        assert_eq!(report.summary.total_parameters, 0);
        assert_eq!(report.summary.average_confidence, 0.0);
        assert_eq!(report.summary.extraction_quality, ExtractionQuality::Low);
        assert_eq!(report.summary.overall_status, "Normal");
        assert_eq!(report.summary.report_type, "Medical Report");
    }

    #[test]
    fn test_generic_report_type_and_quality_tiers() {
        let parameters: BTreeMap<_, _> =
            [result("ESR", 10.0, ConfidenceTier::ContextMatch)].into_iter().collect();
        let summary = Summary::of(&parameters);
        assert_eq!(summary.report_type, "Medical Report");
        assert_eq!(summary.extraction_quality, ExtractionQuality::Medium);

        assert_eq!(ExtractionQuality::from_confidence(0.8), ExtractionQuality::Medium);
        assert_eq!(ExtractionQuality::from_confidence(0.6), ExtractionQuality::Low);
    }

    #[test]
    fn test_serializes_category_labels() {
        let parameters: BTreeMap<_, _> =
            [result("MCV", 90.0, ConfidenceTier::PatternMatch)].into_iter().collect();
        let json = serde_json::to_value(Report::build(parameters, ProcessingInfo::default()))
            .unwrap();
        assert_eq!(json["categories"]["Red Cell Indices"]["MCV"]["status"], "Normal");
        assert_eq!(json["parameters"]["MCV"]["category"], "Red Cell Indices");
        assert_eq!(json["summary"]["extraction_quality"], "High");
    }
}

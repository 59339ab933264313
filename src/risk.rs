//! Call contract of the hemoglobin risk classifier.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLabel {
    #[serde(rename = "Anemia risk")]
    AnemiaRisk,
    Normal,
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLabel::AnemiaRisk => f.write_str("Anemia risk"),
            RiskLabel::Normal => f.write_str("Normal"),
        }
    }
}

/// A single-feature model over the hemoglobin value (g/dL).
pub trait RiskModel {
    fn predict(&self, hemoglobin: f64) -> RiskLabel;
}

/// Flags hemoglobin strictly below a fixed cut-off.
#[derive(Debug, Clone, Copy)]
pub struct HemoglobinThreshold {
    pub threshold: f64,
}

impl Default for HemoglobinThreshold {
    fn default() -> Self {
        Self { threshold: 10.0 }
    }
}

impl RiskModel for HemoglobinThreshold {
    fn predict(&self, hemoglobin: f64) -> RiskLabel {
        if hemoglobin < self.threshold {
            RiskLabel::AnemiaRisk
        } else {
            RiskLabel::Normal
        }
    }
}

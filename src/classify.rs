//! Normal-range classification and the interpretation table.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Low,
    Normal,
    High,
    Unknown,
}

impl Status {
    pub fn is_abnormal(self) -> bool {
        self != Status::Normal
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Low => "Low",
            Status::Normal => "Normal",
            Status::High => "High",
            Status::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Classifies `value` against a `min-max` range string.
///
/// Both bounds are inclusive. A range without a `-` separator has no
/// meaningful bound to test and yields [`Status::Normal`]; a range whose
/// bounds are not numbers, or a non-finite value, yields [`Status::Unknown`].
pub fn classify(value: f64, normal_range: &str) -> Status {
    let Some((min, max)) = normal_range.split_once('-') else {
        return Status::Normal;
    };
    let (Ok(min), Ok(max)) = (min.trim().parse::<f64>(), max.trim().parse::<f64>()) else {
        return Status::Unknown;
    };
    if !value.is_finite() {
        return Status::Unknown;
    }

    if value < min {
        Status::Low
    } else if value > max {
        Status::High
    } else {
        Status::Normal
    }
}

/// Human-readable reading of a status for one parameter. Total over all
/// inputs: pairs without a dedicated sentence get the generic one.
pub fn interpret(parameter: &str, status: Status) -> Cow<'static, str> {
    let text = match (parameter, status) {
        ("Hemoglobin", Status::Low) => {
            "Low hemoglobin may indicate anemia, blood loss or nutritional deficiency."
        }
        ("Hemoglobin", Status::High) => {
            "High hemoglobin may indicate dehydration, lung disease or polycythemia."
        }
        ("Hemoglobin", Status::Normal) => "Hemoglobin level is within the normal range.",
        ("RBC Count", Status::Low) => "Low red cell count may indicate anemia or blood loss.",
        ("RBC Count", Status::High) => {
            "High red cell count may indicate dehydration or polycythemia."
        }
        ("WBC Count", Status::Low) => {
            "Low white cell count may indicate bone marrow suppression or a viral infection."
        }
        ("WBC Count", Status::High) => {
            "High white cell count may indicate infection, inflammation or stress."
        }
        ("WBC Count", Status::Normal) => "White cell count is within the normal range.",
        ("Platelet Count", Status::Low) => {
            "Low platelet count may increase bleeding risk; seen in dengue and marrow disorders."
        }
        ("Platelet Count", Status::High) => {
            "High platelet count may be reactive to infection, inflammation or iron deficiency."
        }
        ("Platelet Count", Status::Normal) => "Platelet count is within the normal range.",
        ("Hematocrit", Status::Low) => "Low hematocrit is consistent with anemia.",
        ("Hematocrit", Status::High) => "High hematocrit may indicate dehydration.",
        ("MCV", Status::Low) => {
            "Small red cells (microcytosis) suggest iron deficiency or thalassemia trait."
        }
        ("MCV", Status::High) => {
            "Large red cells (macrocytosis) suggest vitamin B12 or folate deficiency."
        }
        ("MCH", Status::Low) => "Low MCH suggests hypochromic red cells, often iron deficiency.",
        ("MCHC", Status::Low) => "Low MCHC suggests hypochromic red cells.",
        ("RDW", Status::High) => {
            "High RDW indicates varied red cell sizes, common in nutritional anemias."
        }
        ("Neutrophils", Status::High) => {
            "Raised neutrophils commonly accompany bacterial infection."
        }
        ("Neutrophils", Status::Low) => "Low neutrophils may reduce resistance to infection.",
        ("Lymphocytes", Status::High) => "Raised lymphocytes commonly accompany viral infection.",
        ("Eosinophils", Status::High) => {
            "Raised eosinophils may indicate allergy or parasitic infection."
        }
        (_, status) => return Cow::Owned(generic(status)),
    };
    Cow::Borrowed(text)
}

fn generic(status: Status) -> String {
    match status {
        Status::Unknown => {
            "Could not be compared with the normal range; consult a clinician.".to_string()
        }
        status => format!("{status} relative to the normal range; consult a clinician."),
    }
}

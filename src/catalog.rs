//! Static catalog of the measurements a report can carry.
//!
//! Entries are declared as plain data in [`ENTRIES`] and compiled into
//! [`ParameterSpec`]s once, the first time [`catalog`] is called.

use std::fmt;
use std::sync::LazyLock;

use log::warn;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::error::RecoverableError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    #[serde(rename = "Blood Counts")]
    BloodCounts,
    #[serde(rename = "Red Cell Indices")]
    RedCellIndices,
    #[serde(rename = "Differential Count")]
    DifferentialCount,
    #[serde(rename = "Other Tests")]
    Other,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::BloodCounts => "Blood Counts",
            Category::RedCellIndices => "Red Cell Indices",
            Category::DifferentialCount => "Differential Count",
            Category::Other => "Other Tests",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Clinically accepted interval, rendered as `min-max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalRange {
    Bounds { min: f64, max: f64 },
    Unspecified,
}

impl fmt::Display for NormalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalRange::Bounds { min, max } => write!(f, "{min}-{max}"),
            NormalRange::Unspecified => f.write_str("unspecified"),
        }
    }
}

/// Physiologically reasonable bounds, inclusive. Anything outside is OCR noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlausibleRange {
    pub min: f64,
    pub max: f64,
}

impl PlausibleRange {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: &'static str,
    /// Priority order; each captures the value in group 1.
    pub patterns: Vec<Regex>,
    /// Lowercase names searched for by the proximity strategy.
    pub aliases: &'static [&'static str],
    /// Lowercase words that, earlier on the same line, mean the label
    /// belongs to a different parameter ("corpuscular hemoglobin" is MCH).
    pub exclusions: &'static [&'static str],
    pub unit: &'static str,
    pub normal_range: NormalRange,
    pub category: Category,
    pub plausible: PlausibleRange,
}

impl ParameterSpec {
    /// Compiles `patterns` case-insensitively. A pattern that does not
    /// compile is logged and left out; the remaining ones keep their order.
    pub fn new(
        name: &'static str,
        patterns: &[&'static str],
        aliases: &'static [&'static str],
        unit: &'static str,
        normal_range: NormalRange,
        category: Category,
        plausible: PlausibleRange,
    ) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|&pattern| {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(regex) => Some(regex),
                    Err(source) => {
                        warn!(
                            "{}",
                            RecoverableError::PatternEval { parameter: name, pattern, source }
                        );
                        None
                    }
                }
            })
            .collect();

        Self {
            name,
            patterns,
            aliases,
            exclusions: &[],
            unit,
            normal_range,
            category,
            plausible,
        }
    }

    pub fn with_exclusions(mut self, exclusions: &'static [&'static str]) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// True if `context` contains one of the exclusion words.
    pub fn excluded(&self, context: &str) -> bool {
        if self.exclusions.is_empty() {
            return false;
        }
        let context = context.to_lowercase();
        self.exclusions.iter().any(|word| context.contains(word))
    }
}

pub struct CatalogEntry {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
    pub aliases: &'static [&'static str],
    pub exclusions: &'static [&'static str],
    pub unit: &'static str,
    pub normal_range: NormalRange,
    pub category: Category,
    pub plausible: PlausibleRange,
}

// Label, optional parenthesised unit and separator between a name and its value.
macro_rules! value_after {
    ($name:literal) => {
        concat!($name, r"\s*(?:\([^)]*\))?\s*[:=\-]?\s*(\d+(?:\.\d+)?)")
    };
}

const fn bounds(min: f64, max: f64) -> NormalRange {
    NormalRange::Bounds { min, max }
}

const fn plausible(min: f64, max: f64) -> PlausibleRange {
    PlausibleRange { min, max }
}

pub const ENTRIES: [CatalogEntry; 15] = [
    CatalogEntry {
        name: "Hemoglobin",
        patterns: &[value_after!(r"\bha?emoglobin"), value_after!(r"\b(?:hgb|hb)\b")],
        aliases: &["hemoglobin", "haemoglobin", "hgb", "hb"],
        exclusions: &["corpuscular", "mean cell"],
        unit: "g/dL",
        normal_range: bounds(12.0, 15.0),
        category: Category::BloodCounts,
        plausible: plausible(3.0, 25.0),
    },
    CatalogEntry {
        name: "RBC Count",
        patterns: &[
            value_after!(r"\b(?:total\s+)?red\s+blood\s+cells?(?:\s+count)?"),
            value_after!(r"\brbc(?:\s+count)?\b"),
        ],
        aliases: &["rbc", "red blood cell"],
        exclusions: &[],
        unit: "million/cumm",
        normal_range: bounds(4.5, 5.5),
        category: Category::BloodCounts,
        plausible: plausible(1.0, 10.0),
    },
    CatalogEntry {
        name: "WBC Count",
        patterns: &[
            value_after!(r"\b(?:total\s+)?(?:leu[ck]ocyte|white\s+blood\s+cells?)(?:\s+count)?"),
            value_after!(r"\b(?:wbc|tlc)(?:\s+count)?\b"),
        ],
        aliases: &["wbc", "tlc", "leukocyte", "leucocyte", "white blood"],
        exclusions: &[],
        unit: "cells/cumm",
        normal_range: bounds(4000.0, 11000.0),
        category: Category::BloodCounts,
        plausible: plausible(1000.0, 50000.0),
    },
    CatalogEntry {
        name: "Platelet Count",
        patterns: &[
            value_after!(r"\bplatelets?(?:\s+count)?"),
            value_after!(r"\bplt(?:\s+count)?\b"),
        ],
        aliases: &["platelet", "plt"],
        exclusions: &[],
        unit: "cells/cumm",
        normal_range: bounds(150000.0, 410000.0),
        category: Category::BloodCounts,
        plausible: plausible(10000.0, 1000000.0),
    },
    CatalogEntry {
        name: "Hematocrit",
        patterns: &[
            value_after!(r"\b(?:ha?ematocrit|packed\s+cell\s+volume)"),
            value_after!(r"\b(?:hct|pcv)\b"),
        ],
        aliases: &["hematocrit", "haematocrit", "packed cell", "hct", "pcv"],
        exclusions: &[],
        unit: "%",
        normal_range: bounds(36.0, 46.0),
        category: Category::BloodCounts,
        plausible: plausible(10.0, 70.0),
    },
    CatalogEntry {
        name: "MCV",
        patterns: &[
            value_after!(r"\bmean\s+corpuscular\s+volume"),
            value_after!(r"\bmcv\b"),
        ],
        aliases: &["mcv", "corpuscular volume"],
        exclusions: &[],
        unit: "fL",
        normal_range: bounds(83.0, 101.0),
        category: Category::RedCellIndices,
        plausible: plausible(50.0, 150.0),
    },
    CatalogEntry {
        name: "MCH",
        patterns: &[
            value_after!(r"\bmean\s+corpuscular\s+ha?emoglobin"),
            value_after!(r"\bmch\b"),
        ],
        aliases: &["mch"],
        exclusions: &["mchc", "concentration"],
        unit: "pg",
        normal_range: bounds(27.0, 32.0),
        category: Category::RedCellIndices,
        plausible: plausible(10.0, 50.0),
    },
    CatalogEntry {
        name: "MCHC",
        patterns: &[
            value_after!(r"\bmean\s+corpuscular\s+ha?emoglobin\s+concentration"),
            value_after!(r"\bmchc\b"),
        ],
        aliases: &["mchc"],
        exclusions: &[],
        unit: "g/dL",
        normal_range: bounds(31.5, 34.5),
        category: Category::RedCellIndices,
        plausible: plausible(20.0, 45.0),
    },
    CatalogEntry {
        name: "RDW",
        patterns: &[
            value_after!(r"\bred\s+(?:cell\s+)?distribution\s+width(?:\s*-?\s*cv)?"),
            value_after!(r"\brdw(?:\s*-?\s*cv)?\b"),
        ],
        aliases: &["rdw", "distribution width"],
        exclusions: &[],
        unit: "%",
        normal_range: bounds(11.6, 14.0),
        category: Category::RedCellIndices,
        plausible: plausible(5.0, 30.0),
    },
    CatalogEntry {
        name: "Neutrophils",
        patterns: &[value_after!(r"\bneutrophils?"), value_after!(r"\b(?:neut|polymorphs?)\b")],
        aliases: &["neutrophil", "polymorph"],
        exclusions: &[],
        unit: "%",
        normal_range: bounds(40.0, 80.0),
        category: Category::DifferentialCount,
        plausible: plausible(0.0, 100.0),
    },
    CatalogEntry {
        name: "Lymphocytes",
        patterns: &[value_after!(r"\blymphocytes?"), value_after!(r"\blymph\b")],
        aliases: &["lymphocyte"],
        exclusions: &[],
        unit: "%",
        normal_range: bounds(20.0, 40.0),
        category: Category::DifferentialCount,
        plausible: plausible(0.0, 100.0),
    },
    CatalogEntry {
        name: "Monocytes",
        patterns: &[value_after!(r"\bmonocytes?"), value_after!(r"\bmono\b")],
        aliases: &["monocyte"],
        exclusions: &[],
        unit: "%",
        normal_range: bounds(2.0, 10.0),
        category: Category::DifferentialCount,
        plausible: plausible(0.0, 100.0),
    },
    CatalogEntry {
        name: "Eosinophils",
        patterns: &[value_after!(r"\beosinophils?"), value_after!(r"\beos\b")],
        aliases: &["eosinophil"],
        exclusions: &[],
        unit: "%",
        normal_range: bounds(1.0, 6.0),
        category: Category::DifferentialCount,
        plausible: plausible(0.0, 100.0),
    },
    CatalogEntry {
        name: "Basophils",
        patterns: &[value_after!(r"\bbasophils?"), value_after!(r"\bbaso\b")],
        aliases: &["basophil"],
        exclusions: &[],
        unit: "%",
        normal_range: bounds(0.0, 2.0),
        category: Category::DifferentialCount,
        plausible: plausible(0.0, 100.0),
    },
    CatalogEntry {
        name: "ESR",
        patterns: &[
            value_after!(r"\berythrocyte\s+sedimentation\s+rate"),
            value_after!(r"\besr\b"),
        ],
        aliases: &["esr", "sedimentation"],
        exclusions: &[],
        unit: "mm/hr",
        normal_range: NormalRange::Unspecified,
        category: Category::Other,
        plausible: plausible(0.0, 150.0),
    },
];

static CATALOG: LazyLock<Vec<ParameterSpec>> = LazyLock::new(|| {
    ENTRIES
        .iter()
        .map(|entry| {
            ParameterSpec::new(
                entry.name,
                entry.patterns,
                entry.aliases,
                entry.unit,
                entry.normal_range,
                entry.category,
                entry.plausible,
            )
            .with_exclusions(entry.exclusions)
        })
        .collect()
});

/// The process-wide, read-only parameter catalog.
pub fn catalog() -> &'static [ParameterSpec] {
    &CATALOG
}

pub fn find(name: &str) -> Option<&'static ParameterSpec> {
    catalog().iter().find(|spec| spec.name == name)
}

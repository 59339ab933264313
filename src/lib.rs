pub mod consts {
    /// Confidence of a reading recovered by a catalog pattern.
    pub const PATTERN_CONFIDENCE: f64 = 0.9;
    /// Confidence of a reading recovered next to an alias.
    pub const CONTEXT_CONFIDENCE: f64 = 0.7;
    /// A winning reading must score strictly above this to be reported.
    pub const ACCEPTANCE_THRESHOLD: f64 = 0.5;
    /// The proximity strategy only runs while the best reading is below this.
    pub const PROXIMITY_CUTOFF: f64 = 0.8;
    /// Lines after an alias line that the proximity strategy also scans.
    pub const PROXIMITY_LOOKAHEAD: usize = 2;

    /// Skew below this magnitude (degrees) is left uncorrected.
    pub const MIN_SKEW_DEGREES: f64 = 0.5;

    /// Alphabet of the restricted recognition configuration.
    pub const CHAR_WHITELIST: &str =
        "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789.()-:/%";

    pub const BLOOD_COUNT_REPORT: &str = "Complete Blood Count";
    pub const GENERIC_REPORT: &str = "Medical Report";
}

pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod matcher;
pub mod ocr;
pub mod pipeline;
pub mod preprocess;
pub mod report;
pub mod risk;

pub use error::{ExtractionError, RecoverableError};
pub use pipeline::ReportExtractor;
pub use report::Report;

//! Error taxonomy of an extraction request.
//!
//! [`ExtractionError`] is fatal: the request yields no report at all.
//! [`RecoverableError`] never leaves the library; it is logged where the
//! failing variant, call, pattern or token is skipped.

use std::num::ParseFloatError;

use thiserror::Error;

use crate::preprocess::VariantKind;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("input is not a decodable image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("no text extracted from image ({attempts} recognition attempts)")]
    NoTextExtracted { attempts: usize },

    #[error("extraction failed: {0:#}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum RecoverableError {
    #[error("preprocessing variant {variant:?} failed: {source}")]
    Preprocess {
        variant: VariantKind,
        source: anyhow::Error,
    },

    #[error("recognition of {variant:?} with config #{config} failed: {source:#}")]
    RecognitionCall {
        variant: VariantKind,
        config: usize,
        source: anyhow::Error,
    },

    #[error("pattern {pattern:?} for {parameter} is invalid: {source}")]
    PatternEval {
        parameter: &'static str,
        pattern: &'static str,
        source: regex::Error,
    },

    #[error("token {token:?} for {parameter} is not a number: {source}")]
    NumericParse {
        parameter: &'static str,
        token: String,
        source: ParseFloatError,
    },
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR collaboration: the text-extractor seam, accuracy metrics against an
// expected text, and (behind the `ocr` feature) an `ocrs`-backed extractor.

pub mod compare;

#[cfg(feature = "ocr")]
pub mod engine;

pub use compare::{TextComparison, compare_text, estimate_confidence};

#[cfg(feature = "ocr")]
pub use engine::{OcrConfig, OcrsTextExtractor};

use inspektor_core::error::Result;
use inspektor_core::types::OcrResult;

use crate::raster::RasterImage;

/// Anything that can read text out of an image.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, image: &dyn RasterImage) -> Result<String>;
}

/// Build the OCR sub-result for extracted `text`.
pub fn score_extraction(text: String, expected: &str) -> OcrResult {
    let comparison = compare_text(expected, &text);
    OcrResult {
        confidence: estimate_confidence(&text),
        extracted_text: text,
        expected_text: expected.to_string(),
        match_score: comparison.match_score,
        wer: comparison.wer,
        cer: comparison.cer,
        ocr_error: None,
    }
}

/// OCR sub-result when no text could be extracted.
pub fn failed_extraction(expected: &str, error: impl Into<String>) -> OcrResult {
    OcrResult {
        expected_text: expected.to_string(),
        ocr_error: Some(error.into()),
        ..Default::default()
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Loading images from disk and turning analyses into JSON reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::ValueEnum;
use image::DynamicImage;
use serde::Serialize;
use tracing::{info, instrument};

use inspektor_analysis::{Assessment, ImageAnalyzer, RasterImage, TextExtractor};
use inspektor_core::{AnalysisOptions, AnalysisResult, InspektorError};
use inspektor_core::error::Result;

/// Analysis profile selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Basic,
    Fast,
    Quality,
    Ocr,
}

impl Mode {
    pub fn options(self) -> AnalysisOptions {
        match self {
            Self::Basic => AnalysisOptions::default(),
            Self::Fast => AnalysisOptions::fast(),
            Self::Quality => AnalysisOptions::quality(),
            Self::Ocr => AnalysisOptions::ocr(),
        }
    }
}

/// One analysed file.
#[derive(Debug, Serialize)]
pub struct Report {
    pub path: PathBuf,
    pub result: AnalysisResult,
    pub assessment: Assessment,
}

/// Stands in for an OCR engine that failed to load; every extraction
/// reports the load failure.
#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
pub struct Unavailable {
    reason: String,
}

#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
impl Unavailable {
    pub fn new(err: InspektorError) -> Self {
        let reason = match err {
            InspektorError::OcrError(reason) => reason,
            other => other.to_string(),
        };
        Self { reason }
    }
}

impl TextExtractor for Unavailable {
    fn extract_text(&self, _image: &dyn RasterImage) -> Result<String> {
        Err(InspektorError::OcrError(self.reason.clone()))
    }
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path)
        .map_err(|err| InspektorError::ImageError(format!("failed to open {}: {}", path.display(), err)))
}

#[instrument(skip(analyzer, options), fields(path = %path.display()))]
pub fn analyze_file(analyzer: &ImageAnalyzer, path: &Path, options: &AnalysisOptions) -> Result<Report> {
    let image = Arc::new(load_image(path)?);
    let result = analyzer.analyze_with_options(image, options)?;
    info!(
        valid = result.quality.is_valid,
        issues = result.issues.len(),
        elapsed_sec = result.processing_time_sec,
        "Analysis complete"
    );

    let assessment = Assessment::from_result(&result);
    Ok(Report {
        path: path.to_path_buf(),
        result,
        assessment,
    })
}

pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

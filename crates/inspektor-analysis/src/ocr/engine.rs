// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text extraction backed by the pure-Rust `ocrs` engine.
//
// # Model Setup
//
// Two model files are required:
//
// - `text-detection.rten` locates text regions.
// - `text-recognition.rten` decodes characters from those regions.
//
// Running `ocrs-cli` once downloads them to `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is where [`OcrConfig::default`] looks.
//
// The `ocrs` and `rten` crates are very slow in debug builds; use release
// builds for real workloads.

use std::path::{Path, PathBuf};

use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument};

use inspektor_core::error::{InspektorError, Result};

use super::TextExtractor;
use crate::raster::RasterImage;

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
pub fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Locations of the two model files.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expects `text-detection.rten` and `text-recognition.rten` in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (role, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(InspektorError::OcrError(format!(
                    "{role} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// [`TextExtractor`] over a loaded `ocrs` engine. Load once, reuse for many
/// images.
pub struct OcrsTextExtractor {
    engine: OcrEngine,
}

impl OcrsTextExtractor {
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: OcrConfig) -> Result<Self> {
        config.validate()?;

        info!("Loading OCR models");
        let detection_model = Model::load_file(&config.detection_model_path).map_err(|err| {
            InspektorError::OcrError(format!(
                "failed to load detection model from {}: {}",
                config.detection_model_path.display(),
                err
            ))
        })?;
        let recognition_model = Model::load_file(&config.recognition_model_path).map_err(|err| {
            InspektorError::OcrError(format!(
                "failed to load recognition model from {}: {}",
                config.recognition_model_path.display(),
                err
            ))
        })?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| InspektorError::OcrError(format!("failed to initialise OCR engine: {}", err)))?;

        info!("OCR engine ready");
        Ok(Self { engine })
    }

    pub fn from_model_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(OcrConfig::from_dir(dir))
    }
}

impl TextExtractor for OcrsTextExtractor {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn extract_text(&self, image: &dyn RasterImage) -> Result<String> {
        let (width, height) = image.dimensions();
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let [r, g, b, _] = image.rgba(x, y);
                rgb.extend_from_slice(&[r, g, b]);
            }
        }

        let source = ImageSource::from_bytes(&rgb, (width, height)).map_err(|err| {
            InspektorError::OcrError(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| InspektorError::OcrError(format!("OCR preprocessing failed: {}", err)))?;
        let text = self
            .engine
            .get_text(&input)
            .map_err(|err| InspektorError::OcrError(format!("OCR text recognition failed: {}", err)))?;

        debug!(lines = text.lines().count(), chars = text.len(), "OCR complete");
        Ok(text)
    }
}

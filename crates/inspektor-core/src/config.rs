// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analysis options, rule thresholds, and engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{InspektorError, Result};

/// Thresholds consumed by the quality rule engine.
///
/// Every number the rules compare against lives here; the engine itself holds
/// no implicit constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    // Sharpness
    pub min_laplacian_variance: f64,
    pub max_laplacian_variance: f64,
    pub min_laplacian_variance_for_ocr: f64,
    /// Below this variance an image is blurry regardless of other indicators.
    pub blur_variance_floor: f64,
    /// Luminance band in which low-variance content may still be sharp
    /// (uniform surfaces).
    pub uniform_luminance_band: (f64, f64),

    // Brightness (0–255)
    pub min_brightness: f64,
    pub max_brightness: f64,

    // Luminance (0–1)
    pub min_luminance: f64,
    pub max_luminance: f64,

    pub min_saturation: f64,

    /// Maximum absolute delta between any two channel means.
    pub max_channel_imbalance: f64,
    /// Maximum relative deviation of a channel mean from the mean of all
    /// channels before white balance is flagged.
    pub white_balance_tolerance: f64,

    /// Degrees.
    pub max_skew_angle: f64,
    /// When skew cannot be measured, report the image as skewed.
    pub treat_undetected_skew_as_skewed: bool,

    // Resolution
    pub min_width: u32,
    pub min_height: u32,
    pub min_total_pixels: u64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_laplacian_variance: 100.0,
            max_laplacian_variance: 2000.0,
            min_laplacian_variance_for_ocr: 500.0,
            blur_variance_floor: 1.0,
            uniform_luminance_band: (0.3, 0.8),
            min_brightness: 80.0,
            max_brightness: 220.0,
            min_luminance: 0.2,
            max_luminance: 0.9,
            min_saturation: 0.05,
            max_channel_imbalance: 0.15,
            white_balance_tolerance: 0.15,
            max_skew_angle: 5.0,
            treat_undetected_skew_as_skewed: false,
            min_width: 800,
            min_height: 1000,
            min_total_pixels: 800_000,
        }
    }
}

impl QualityThresholds {
    fn numeric_fields(&self) -> [(&'static str, f64); 14] {
        [
            ("min_laplacian_variance", self.min_laplacian_variance),
            ("max_laplacian_variance", self.max_laplacian_variance),
            ("min_laplacian_variance_for_ocr", self.min_laplacian_variance_for_ocr),
            ("blur_variance_floor", self.blur_variance_floor),
            ("uniform_luminance_band.0", self.uniform_luminance_band.0),
            ("uniform_luminance_band.1", self.uniform_luminance_band.1),
            ("min_brightness", self.min_brightness),
            ("max_brightness", self.max_brightness),
            ("min_luminance", self.min_luminance),
            ("max_luminance", self.max_luminance),
            ("min_saturation", self.min_saturation),
            ("max_channel_imbalance", self.max_channel_imbalance),
            ("white_balance_tolerance", self.white_balance_tolerance),
            ("max_skew_angle", self.max_skew_angle),
        ]
    }

    /// Reject NaN, infinite, or negative thresholds and inverted ranges.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.numeric_fields() {
            check_non_negative(name, value)?;
        }
        if self.min_brightness > self.max_brightness {
            return Err(InspektorError::InvalidOptions(format!(
                "min_brightness {} exceeds max_brightness {}",
                self.min_brightness, self.max_brightness
            )));
        }
        if self.uniform_luminance_band.0 > self.uniform_luminance_band.1 {
            return Err(InspektorError::InvalidOptions(format!(
                "uniform_luminance_band {:?} is inverted",
                self.uniform_luminance_band
            )));
        }
        Ok(())
    }
}

/// Per-call analysis configuration.
///
/// A plain value: builder methods take `self` and return a modified copy, so
/// applying one to a preset never changes the preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    // Modes
    pub ocr_mode: bool,
    /// Sequential fast path; also disables the heavier optional checks.
    pub fast_mode: bool,
    /// Informational profile tag carried into serialized options. Does not
    /// change which stages run or how they are judged.
    pub quality_mode: bool,

    // Raw-flag thresholds
    /// Laplacian variance at or below which the image is flagged blurry.
    pub blur_threshold: f64,
    /// Average luminance above which the image is flagged overexposed.
    pub overexposure_threshold: f64,
    /// Average saturation above which the image is flagged oversaturated.
    pub oversaturation_threshold: f64,
    /// Luminance ceiling for the `high_luminance` rule.
    pub luminance_threshold: f64,

    // Feature toggles
    pub skip_qr_detection: bool,
    pub skip_white_balance: bool,
    pub skip_contour_detection: bool,
    pub skip_edge_detection: bool,

    // OCR
    pub ocr_expected_text: String,
    /// Informational: recorded for callers and configured extractors. The
    /// bundled `ocrs` extractor reads Latin script and ignores it.
    pub ocr_language: String,
    /// Informational: "fast", "accurate", or "legacy". Not consulted by the
    /// analyzer or the bundled extractor.
    pub ocr_engine_mode: String,

    // Scheduling
    pub use_worker_pool: bool,
    /// Upper bound on stages one call hands to the worker pool; the rest run
    /// on the calling thread. 0 means no limit.
    pub max_workers: usize,

    /// Rule profile.
    pub thresholds: QualityThresholds,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            ocr_mode: false,
            fast_mode: false,
            quality_mode: true,
            blur_threshold: 100.0,
            overexposure_threshold: 0.95,
            oversaturation_threshold: 0.9,
            luminance_threshold: 0.9,
            skip_qr_detection: false,
            skip_white_balance: false,
            skip_contour_detection: false,
            skip_edge_detection: false,
            ocr_expected_text: String::new(),
            ocr_language: String::new(),
            ocr_engine_mode: String::new(),
            use_worker_pool: true,
            max_workers: 0,
            thresholds: QualityThresholds::default(),
        }
    }
}

impl AnalysisOptions {
    /// Document profile: stricter blur detection, no QR scan.
    pub fn ocr() -> Self {
        Self {
            ocr_mode: true,
            quality_mode: true,
            blur_threshold: 300.0,
            skip_qr_detection: true,
            ocr_language: "eng".to_string(),
            ocr_engine_mode: "accurate".to_string(),
            ..Self::default()
        }
    }

    /// Sequential analysis without contours, edges, or white balance.
    pub fn fast() -> Self {
        Self {
            fast_mode: true,
            quality_mode: false,
            skip_contour_detection: true,
            skip_edge_detection: true,
            skip_white_balance: true,
            ..Self::default()
        }
    }

    /// More sensitive exposure and blur detection.
    pub fn quality() -> Self {
        Self {
            quality_mode: true,
            blur_threshold: 400.0,
            overexposure_threshold: 0.9,
            oversaturation_threshold: 0.85,
            ..Self::default()
        }
    }

    pub fn with_ocr(mut self, expected_text: impl Into<String>) -> Self {
        self.ocr_mode = true;
        self.quality_mode = true;
        self.ocr_expected_text = expected_text.into();
        self
    }

    pub fn with_custom_thresholds(mut self, blur: f64, overexposure: f64, oversaturation: f64) -> Self {
        self.blur_threshold = blur;
        self.overexposure_threshold = overexposure;
        self.oversaturation_threshold = oversaturation;
        self
    }

    pub fn with_fast_mode(mut self) -> Self {
        self.fast_mode = true;
        self.quality_mode = false;
        self.skip_contour_detection = true;
        self.skip_edge_detection = true;
        self
    }

    pub fn without_qr_detection(mut self) -> Self {
        self.skip_qr_detection = true;
        self
    }

    pub fn with_worker_pool(mut self, enabled: bool) -> Self {
        self.use_worker_pool = enabled;
        self
    }

    pub fn with_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Rule thresholds for a call: the nested profile with the luminance
    /// ceiling taken from `luminance_threshold`.
    pub fn effective_thresholds(&self) -> QualityThresholds {
        QualityThresholds {
            max_luminance: self.luminance_threshold,
            ..self.thresholds.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_non_negative("blur_threshold", self.blur_threshold)?;
        check_non_negative("overexposure_threshold", self.overexposure_threshold)?;
        check_non_negative("oversaturation_threshold", self.oversaturation_threshold)?;
        check_non_negative("luminance_threshold", self.luminance_threshold)?;
        self.thresholds.validate()
    }
}

/// Engine-wide settings fixed when an analyzer is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads; 0 means host parallelism.
    pub workers: usize,
    /// Queue slots per worker.
    pub queue_capacity_per_worker: usize,
    /// How long `submit` waits for queue capacity.
    pub submit_timeout_ms: u64,
    /// Images larger than this are rejected before any work is done.
    pub max_pixels: u64,
    /// Grayscale storage above this size is not retained for reuse.
    pub max_pooled_gray_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity_per_worker: 4,
            submit_timeout_ms: 100,
            max_pixels: 100_000_000,
            max_pooled_gray_bytes: 64 << 20,
        }
    }
}

impl EngineConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity_per_worker == 0 {
            return Err(InspektorError::Config(
                "queue_capacity_per_worker must be > 0".into(),
            ));
        }
        if self.max_pixels == 0 {
            return Err(InspektorError::Config("max_pixels must be > 0".into()));
        }
        Ok(())
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(InspektorError::InvalidOptions(format!(
            "{name} must be a finite, non-negative number (got {value})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_options() {
        let opts = AnalysisOptions::default();
        assert!(!opts.ocr_mode);
        assert!(!opts.fast_mode);
        assert!(opts.quality_mode);
        assert_eq!(opts.blur_threshold, 100.0);
        assert_eq!(opts.overexposure_threshold, 0.95);
        assert_eq!(opts.oversaturation_threshold, 0.9);
        assert!(opts.use_worker_pool);
        assert_eq!(opts.max_workers, 0);
    }

    #[test]
    fn ocr_preset() {
        let opts = AnalysisOptions::ocr();
        assert!(opts.ocr_mode);
        assert!(opts.quality_mode);
        assert_eq!(opts.blur_threshold, 300.0);
        assert!(opts.skip_qr_detection);
        assert_eq!(opts.ocr_language, "eng");
        assert_eq!(opts.ocr_engine_mode, "accurate");
    }

    #[test]
    fn fast_preset() {
        let opts = AnalysisOptions::fast();
        assert!(opts.fast_mode);
        assert!(!opts.quality_mode);
        assert!(opts.skip_contour_detection);
        assert!(opts.skip_edge_detection);
        assert!(opts.skip_white_balance);
    }

    #[test]
    fn quality_preset() {
        let opts = AnalysisOptions::quality();
        assert_eq!(opts.blur_threshold, 400.0);
        assert_eq!(opts.overexposure_threshold, 0.9);
        assert_eq!(opts.oversaturation_threshold, 0.85);
    }

    #[test]
    fn builders_do_not_touch_the_original() {
        let base = AnalysisOptions::default();
        let snapshot = base.clone();

        let ocr = base.clone().with_ocr("invoice 42");
        let custom = base.clone().with_custom_thresholds(50.0, 0.8, 0.7);
        let fast = base.clone().with_fast_mode();
        let no_qr = base.clone().without_qr_detection();

        assert_eq!(base, snapshot);
        assert!(ocr.ocr_mode);
        assert_eq!(ocr.ocr_expected_text, "invoice 42");
        assert_eq!(custom.blur_threshold, 50.0);
        assert_eq!(custom.overexposure_threshold, 0.8);
        assert_eq!(custom.oversaturation_threshold, 0.7);
        assert!(fast.fast_mode);
        assert!(!fast.quality_mode);
        assert!(no_qr.skip_qr_detection);
        assert!(!base.skip_qr_detection);
    }

    #[test]
    fn effective_thresholds_take_luminance_ceiling() {
        let mut opts = AnalysisOptions::default();
        opts.luminance_threshold = 0.75;
        let thresholds = opts.effective_thresholds();
        assert_eq!(thresholds.max_luminance, 0.75);
        assert_eq!(opts.thresholds.max_luminance, 0.9);
    }

    #[test]
    fn validation_rejects_bad_numbers() {
        let mut opts = AnalysisOptions::default();
        assert!(opts.validate().is_ok());

        opts.blur_threshold = f64::NAN;
        assert!(matches!(opts.validate(), Err(InspektorError::InvalidOptions(_))));

        let mut opts = AnalysisOptions::default();
        opts.thresholds.min_brightness = 250.0;
        assert!(opts.validate().is_err());

        let mut opts = AnalysisOptions::default();
        opts.thresholds.max_skew_angle = -1.0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: AnalysisOptions =
            serde_json::from_str(r#"{"ocr_mode": true, "blur_threshold": 250.0}"#).unwrap();
        assert!(opts.ocr_mode);
        assert_eq!(opts.blur_threshold, 250.0);
        assert_eq!(opts.overexposure_threshold, 0.95);
        assert_eq!(opts.thresholds, QualityThresholds::default());
    }

    #[test]
    fn engine_config_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 3, "submit_timeout_ms": 250}}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.submit_timeout(), Duration::from_millis(250));
        assert_eq!(config.queue_capacity_per_worker, 4);
    }

    #[test]
    fn engine_config_rejects_zero_queue() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"queue_capacity_per_worker": 0}}"#).unwrap();
        assert!(matches!(
            EngineConfig::load(file.path()),
            Err(InspektorError::Config(_))
        ));
    }

    #[test]
    fn engine_config_missing_file_is_io_error() {
        let result = EngineConfig::load("/nonexistent/inspektor/config.json");
        assert!(matches!(result, Err(InspektorError::Io(_))));
    }
}

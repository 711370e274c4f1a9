// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Inspektor analysis engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single analysis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisId(pub Uuid);

impl AnalysisId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Aggregate colour statistics of an image, each normalised to [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Mean HSV value (max channel) over all pixels.
    pub avg_luminance: f64,
    /// Mean HSV saturation over all pixels.
    pub avg_saturation: f64,
    pub avg_r: f64,
    pub avg_g: f64,
    pub avg_b: f64,
}

impl Metrics {
    /// Channel means as `[r, g, b]`.
    pub fn channel_balance(&self) -> [f64; 3] {
        [self.avg_r, self.avg_g, self.avg_b]
    }
}

/// How serious a quality finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks usability of the image.
    Error,
    /// Degrades confidence only.
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        };
        f.write_str(label)
    }
}

/// The check that produced a [`QualityIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Blurriness,
    OverSharpening,
    Overexposure,
    Oversaturation,
    WhiteBalance,
    LowLuminance,
    HighLuminance,
    LowSaturation,
    ChannelImbalance,
    LowResolution,
    TooDark,
    TooBright,
    Skew,
    DocumentEdges,
}

impl IssueKind {
    /// Stable snake_case identifier, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blurriness => "blurriness",
            Self::OverSharpening => "over_sharpening",
            Self::Overexposure => "overexposure",
            Self::Oversaturation => "oversaturation",
            Self::WhiteBalance => "white_balance",
            Self::LowLuminance => "low_luminance",
            Self::HighLuminance => "high_luminance",
            Self::LowSaturation => "low_saturation",
            Self::ChannelImbalance => "channel_imbalance",
            Self::LowResolution => "low_resolution",
            Self::TooDark => "too_dark",
            Self::TooBright => "too_bright",
            Self::Skew => "skew",
            Self::DocumentEdges => "document_edges",
        }
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single classified quality finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// User-facing explanation with a remedy.
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl QualityIssue {
    pub fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity,
            actual_value: None,
            threshold: None,
        }
    }

    pub fn with_actual(mut self, value: f64) -> Self {
        self.actual_value = Some(value);
        self
    }

    pub fn with_threshold(mut self, value: f64) -> Self {
        self.threshold = Some(value);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Quality flags set by the analysis, plus the overall verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quality {
    pub overexposed: bool,
    pub oversaturated: bool,
    #[serde(rename = "incorrect_white_balance")]
    pub incorrect_wb: bool,
    pub blurry: bool,
    /// No raw quality flag set and no error-severity issue present.
    pub is_valid: bool,

    // Document (OCR) profile flags.
    pub is_low_resolution: bool,
    pub is_too_dark: bool,
    pub is_too_bright: bool,
    pub is_skewed: bool,
    pub has_document_edges: bool,
    pub qr_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skew_angle: Option<f64>,
}

/// Result-facing image metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetrics {
    #[serde(rename = "laplacian_variance")]
    pub laplacian_var: f64,
    #[serde(rename = "average_luminance")]
    pub avg_luminance: f64,
    #[serde(rename = "average_saturation")]
    pub avg_saturation: f64,
    pub channel_balance: [f64; 3],
    /// `"{width}x{height}"`.
    pub resolution: String,
    /// Mean grayscale intensity on a 0–255 scale (document profile only).
    pub brightness: f64,
    /// Edge-density proxy for the number of contours (document profile only).
    pub num_contours: usize,
}

/// OCR sub-result. Text extraction itself is delegated to an external
/// collaborator; when none is configured only `expected_text` and
/// `ocr_error` are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub extracted_text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub expected_text: String,
    /// Heuristic confidence, 0–100.
    pub confidence: f64,
    /// 1 − character error rate, clamped to [0, 1].
    pub match_score: f64,
    #[serde(rename = "word_error_rate")]
    pub wer: f64,
    #[serde(rename = "character_error_rate")]
    pub cer: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_error: Option<String>,
}

/// The complete, immutable output of one analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: AnalysisId,
    pub timestamp: DateTime<Utc>,
    pub processing_time_sec: f64,
    pub quality: Quality,
    pub metrics: ImageMetrics,
    /// Structured findings behind `errors`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<QualityIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_result: Option<OcrResult>,
    /// Flattened, user-facing issue messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl AnalysisResult {
    /// Whether any finding has error severity.
    pub fn has_critical_issues(&self) -> bool {
        self.issues.iter().any(QualityIssue::is_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_kind_serializes_snake_case() {
        let json = serde_json::to_string(&IssueKind::OverSharpening).unwrap();
        assert_eq!(json, "\"over_sharpening\"");
        assert_eq!(IssueKind::LowResolution.as_str(), "low_resolution");
    }

    #[test]
    fn quality_issue_omits_absent_values() {
        let issue = QualityIssue::new(IssueKind::Overexposure, Severity::Error, "too bright");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "overexposure");
        assert_eq!(json["severity"], "error");
        assert!(json.get("actual_value").is_none());
        assert!(json.get("threshold").is_none());

        let issue = issue.with_actual(0.97).with_threshold(0.95);
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["actual_value"], 0.97);
        assert_eq!(json["threshold"], 0.95);
    }

    #[test]
    fn quality_uses_wire_names() {
        let quality = Quality {
            incorrect_wb: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&quality).unwrap();
        assert_eq!(json["incorrect_white_balance"], true);
        assert!(json.get("skew_angle").is_none());
    }

    #[test]
    fn critical_issue_detection() {
        let mut result = AnalysisResult {
            id: AnalysisId::new(),
            timestamp: Utc::now(),
            processing_time_sec: 0.0,
            quality: Quality::default(),
            metrics: ImageMetrics::default(),
            issues: vec![QualityIssue::new(
                IssueKind::WhiteBalance,
                Severity::Warning,
                "odd colours",
            )],
            ocr_result: None,
            errors: Vec::new(),
        };
        assert!(!result.has_critical_issues());

        result
            .issues
            .push(QualityIssue::new(IssueKind::Blurriness, Severity::Error, "blurry"));
        assert!(result.has_critical_issues());
    }
}

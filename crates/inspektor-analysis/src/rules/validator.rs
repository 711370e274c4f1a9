// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Threshold rules that turn measured metrics into classified findings.

use tracing::debug;

use inspektor_core::config::QualityThresholds;
use inspektor_core::types::{IssueKind, QualityIssue, Severity};

use super::messages;

/// Everything the rules look at for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleInput {
    pub width: u32,
    pub height: u32,
    pub laplacian_var: f64,
    /// Mean grayscale intensity, 0–255.
    pub brightness: f64,
    pub avg_luminance: f64,
    pub avg_saturation: f64,
    pub channel_balance: [f64; 3],

    pub overexposed: bool,
    pub oversaturated: bool,
    pub incorrect_wb: bool,
    pub is_too_dark: bool,
    pub is_too_bright: bool,
    /// `None` when edge detection was skipped.
    pub has_document_edges: Option<bool>,
    /// `None` when skew could not be measured.
    pub skew_angle: Option<f64>,
}

/// Classifies an image against a [`QualityThresholds`] profile.
#[derive(Debug, Clone, Default)]
pub struct QualityRuleEngine {
    thresholds: QualityThresholds,
}

impl QualityRuleEngine {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// General-purpose photo checks: sharpness, exposure, colour.
    pub fn validate_basic(&self, input: &RuleInput) -> Vec<QualityIssue> {
        let t = &self.thresholds;
        let mut issues = Vec::new();

        if self.is_blurry(input) {
            issues.push(
                QualityIssue::new(IssueKind::Blurriness, Severity::Error, messages::BLURRY)
                    .with_actual(input.laplacian_var)
                    .with_threshold(t.min_laplacian_variance),
            );
        } else if input.laplacian_var >= t.max_laplacian_variance {
            issues.push(
                QualityIssue::new(
                    IssueKind::OverSharpening,
                    Severity::Error,
                    messages::OVER_SHARPENED,
                )
                .with_actual(input.laplacian_var)
                .with_threshold(t.max_laplacian_variance),
            );
        }

        if input.overexposed {
            issues.push(QualityIssue::new(
                IssueKind::Overexposure,
                Severity::Error,
                messages::OVEREXPOSED,
            ));
        }
        if input.oversaturated {
            issues.push(QualityIssue::new(
                IssueKind::Oversaturation,
                Severity::Error,
                messages::OVERSATURATED,
            ));
        }
        if input.incorrect_wb {
            issues.push(QualityIssue::new(
                IssueKind::WhiteBalance,
                Severity::Warning,
                messages::WHITE_BALANCE,
            ));
        }

        if input.avg_luminance <= t.min_luminance {
            issues.push(
                QualityIssue::new(IssueKind::LowLuminance, Severity::Error, messages::LOW_LUMINANCE)
                    .with_actual(input.avg_luminance)
                    .with_threshold(t.min_luminance),
            );
        } else if input.avg_luminance >= t.max_luminance {
            issues.push(
                QualityIssue::new(
                    IssueKind::HighLuminance,
                    Severity::Error,
                    messages::HIGH_LUMINANCE,
                )
                .with_actual(input.avg_luminance)
                .with_threshold(t.max_luminance),
            );
        }

        if input.avg_saturation <= t.min_saturation {
            issues.push(
                QualityIssue::new(
                    IssueKind::LowSaturation,
                    Severity::Warning,
                    messages::LOW_SATURATION,
                )
                .with_actual(input.avg_saturation)
                .with_threshold(t.min_saturation),
            );
        }

        let imbalance = max_channel_delta(&input.channel_balance);
        if imbalance >= t.max_channel_imbalance {
            issues.push(
                QualityIssue::new(
                    IssueKind::ChannelImbalance,
                    Severity::Warning,
                    messages::CHANNEL_IMBALANCE,
                )
                .with_actual(imbalance)
                .with_threshold(t.max_channel_imbalance),
            );
        }

        debug!(issues = issues.len(), "Basic quality rules evaluated");
        issues
    }

    /// Document checks: the basic set with a stricter blur floor, plus
    /// resolution, brightness, skew, and page-edge visibility.
    pub fn validate_ocr(&self, input: &RuleInput) -> Vec<QualityIssue> {
        let t = &self.thresholds;
        let mut issues = self.validate_basic(input);
        let ocr_min = t.min_laplacian_variance_for_ocr;

        match issues.iter().position(|i| i.kind == IssueKind::Blurriness) {
            Some(index) if input.laplacian_var <= ocr_min => {
                issues[index].threshold = Some(ocr_min);
            }
            Some(index) => {
                issues.remove(index);
            }
            None if input.laplacian_var > t.min_laplacian_variance
                && input.laplacian_var <= ocr_min =>
            {
                issues.push(
                    QualityIssue::new(IssueKind::Blurriness, Severity::Error, messages::BLURRY_FOR_OCR)
                        .with_actual(input.laplacian_var)
                        .with_threshold(ocr_min),
                );
            }
            None => {}
        }

        if self.is_low_resolution(input.width, input.height) {
            let total = u64::from(input.width) * u64::from(input.height);
            issues.push(
                QualityIssue::new(IssueKind::LowResolution, Severity::Error, messages::LOW_RESOLUTION)
                    .with_actual(total as f64)
                    .with_threshold(t.min_total_pixels as f64),
            );
        }

        if input.is_too_dark {
            issues.push(
                QualityIssue::new(IssueKind::TooDark, Severity::Error, messages::TOO_DARK)
                    .with_actual(input.brightness)
                    .with_threshold(t.min_brightness),
            );
        }
        if input.is_too_bright {
            issues.push(
                QualityIssue::new(IssueKind::TooBright, Severity::Error, messages::TOO_BRIGHT)
                    .with_actual(input.brightness)
                    .with_threshold(t.max_brightness),
            );
        }

        match input.skew_angle {
            Some(angle) if angle.abs() > t.max_skew_angle => {
                issues.push(
                    QualityIssue::new(IssueKind::Skew, Severity::Warning, messages::SKEWED)
                        .with_actual(angle.abs())
                        .with_threshold(t.max_skew_angle),
                );
            }
            None if t.treat_undetected_skew_as_skewed => {
                issues.push(
                    QualityIssue::new(IssueKind::Skew, Severity::Warning, messages::SKEWED)
                        .with_threshold(t.max_skew_angle),
                );
            }
            _ => {}
        }

        if input.has_document_edges == Some(false) {
            issues.push(QualityIssue::new(
                IssueKind::DocumentEdges,
                Severity::Error,
                messages::DOCUMENT_EDGES,
            ));
        }

        debug!(issues = issues.len(), "OCR quality rules evaluated");
        issues
    }

    /// Resolution gate shared by the rules and the analyzer's raw flag.
    pub fn is_low_resolution(&self, width: u32, height: u32) -> bool {
        let t = &self.thresholds;
        let total = u64::from(width) * u64::from(height);
        total < t.min_total_pixels || width < t.min_width || height < t.min_height
    }

    pub fn is_too_dark(&self, brightness: f64) -> bool {
        brightness < self.thresholds.min_brightness
    }

    pub fn is_too_bright(&self, brightness: f64) -> bool {
        brightness > self.thresholds.max_brightness
    }

    /// Whether a measured skew counts as tilted under this profile.
    pub fn is_skewed(&self, skew_angle: Option<f64>) -> bool {
        match skew_angle {
            Some(angle) => angle.abs() > self.thresholds.max_skew_angle,
            None => self.thresholds.treat_undetected_skew_as_skewed,
        }
    }

    /// Low variance means blur unless the rest of the image looks healthy
    /// (uniform surfaces have little texture but are not out of focus).
    fn is_blurry(&self, input: &RuleInput) -> bool {
        let t = &self.thresholds;
        if input.laplacian_var > t.min_laplacian_variance {
            return false;
        }
        if input.laplacian_var < t.blur_variance_floor {
            return true;
        }

        let (low, high) = t.uniform_luminance_band;
        let luminance_ok = (low..=high).contains(&input.avg_luminance);
        let balanced = channel_spread(&input.channel_balance) <= t.max_channel_imbalance;
        !(luminance_ok && balanced && !input.overexposed && !input.oversaturated)
    }
}

/// Whether any finding has error severity.
pub fn has_critical_issues(issues: &[QualityIssue]) -> bool {
    issues.iter().any(QualityIssue::is_error)
}

/// The user-facing messages of `issues`, in order.
pub fn issues_to_messages(issues: &[QualityIssue]) -> Vec<String> {
    issues.iter().map(|issue| issue.message.clone()).collect()
}

fn channel_spread(channels: &[f64; 3]) -> f64 {
    let max = channels.iter().copied().fold(f64::MIN, f64::max);
    let min = channels.iter().copied().fold(f64::MAX, f64::min);
    max - min
}

fn max_channel_delta(channels: &[f64; 3]) -> f64 {
    let [r, g, b] = *channels;
    (r - g).abs().max((r - b).abs()).max((g - b).abs())
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pooled, mutable accumulator for one analysis. Stage outputs are folded in
// as they arrive; the finished draft is snapshotted into an owned result and
// recycled.

use chrono::{DateTime, Utc};

use inspektor_core::config::AnalysisOptions;
use inspektor_core::types::{AnalysisId, AnalysisResult, ImageMetrics, OcrResult, Quality, QualityIssue};

use super::stage::StageOutput;
use crate::metrics::white_balance_issue;
use crate::pool::Recycle;
use crate::rules::{QualityRuleEngine, RuleInput, has_critical_issues, issues_to_messages};

/// Drafts whose issue lists grew past this many entries are not retained.
pub const MAX_POOLED_DRAFT_ENTRIES: usize = 256;

#[derive(Debug, Default)]
pub struct AnalysisDraft {
    pub quality: Quality,
    pub metrics: ImageMetrics,
    pub issues: Vec<QualityIssue>,
    pub errors: Vec<String>,
    width: u32,
    height: u32,
    /// `None` when edge detection did not run.
    edge_check: Option<bool>,
}

impl Recycle for AnalysisDraft {
    fn recycle(&mut self) {
        let mut resolution = std::mem::take(&mut self.metrics.resolution);
        resolution.clear();
        self.metrics = ImageMetrics {
            resolution,
            ..Default::default()
        };
        self.quality = Quality::default();
        self.issues.clear();
        self.errors.clear();
        self.width = 0;
        self.height = 0;
        self.edge_check = None;
    }

    fn retained_size(&self) -> usize {
        self.issues.capacity() + self.errors.capacity()
    }
}

impl AnalysisDraft {
    pub fn begin(&mut self, width: u32, height: u32) {
        use std::fmt::Write;

        self.width = width;
        self.height = height;
        self.metrics.resolution.clear();
        let _ = write!(self.metrics.resolution, "{width}x{height}");
    }

    /// Fold one stage output in, raising the raw flags it determines.
    pub fn apply(&mut self, output: StageOutput, options: &AnalysisOptions, rules: &QualityRuleEngine) {
        match output {
            StageOutput::Basic(basic) => {
                self.metrics.avg_luminance = basic.avg_luminance;
                self.metrics.avg_saturation = basic.avg_saturation;
                self.metrics.channel_balance = basic.channel_balance();
                self.quality.overexposed = basic.avg_luminance > options.overexposure_threshold;
                self.quality.oversaturated = basic.avg_saturation > options.oversaturation_threshold;
                self.quality.incorrect_wb = !options.skip_white_balance
                    && white_balance_issue(&basic, rules.thresholds().white_balance_tolerance);
            }
            StageOutput::Sharpness(variance) => {
                self.metrics.laplacian_var = variance;
                self.quality.blurry = variance <= options.blur_threshold;
            }
            StageOutput::QrCode(found) => {
                self.quality.qr_detected = found;
            }
            StageOutput::Document(checks) => {
                self.metrics.brightness = checks.brightness;
                self.metrics.num_contours = checks.num_contours.unwrap_or(0);
                self.quality.is_too_dark = rules.is_too_dark(checks.brightness);
                self.quality.is_too_bright = rules.is_too_bright(checks.brightness);
                self.quality.skew_angle = checks.skew_angle;
                self.quality.is_skewed = rules.is_skewed(checks.skew_angle);
                self.quality.has_document_edges = checks.has_document_edges.unwrap_or(false);
                self.edge_check = checks.has_document_edges;
            }
        }
    }

    /// Run the rules and settle `is_valid`.
    pub fn evaluate(&mut self, options: &AnalysisOptions, rules: &QualityRuleEngine) {
        if options.ocr_mode {
            self.quality.is_low_resolution = rules.is_low_resolution(self.width, self.height);
        }

        let input = RuleInput {
            width: self.width,
            height: self.height,
            laplacian_var: self.metrics.laplacian_var,
            brightness: self.metrics.brightness,
            avg_luminance: self.metrics.avg_luminance,
            avg_saturation: self.metrics.avg_saturation,
            channel_balance: self.metrics.channel_balance,
            overexposed: self.quality.overexposed,
            oversaturated: self.quality.oversaturated,
            incorrect_wb: self.quality.incorrect_wb,
            is_too_dark: self.quality.is_too_dark,
            is_too_bright: self.quality.is_too_bright,
            has_document_edges: self.edge_check,
            skew_angle: self.quality.skew_angle,
        };

        let issues = if options.ocr_mode {
            rules.validate_ocr(&input)
        } else {
            rules.validate_basic(&input)
        };
        self.issues.clear();
        self.issues.extend(issues);
        self.errors.clear();
        self.errors.extend(issues_to_messages(&self.issues));

        let q = &self.quality;
        let raw_flag = q.blurry
            || q.overexposed
            || q.oversaturated
            || (options.ocr_mode && (q.is_too_dark || q.is_too_bright));
        self.quality.is_valid = !raw_flag && !has_critical_issues(&self.issues);
    }

    /// Owned copy of the draft as a finished result.
    pub fn snapshot(
        &self,
        timestamp: DateTime<Utc>,
        processing_time_sec: f64,
        ocr_result: Option<OcrResult>,
    ) -> AnalysisResult {
        AnalysisResult {
            id: AnalysisId::new(),
            timestamp,
            processing_time_sec,
            quality: self.quality.clone(),
            metrics: self.metrics.clone(),
            issues: self.issues.clone(),
            ocr_result,
            errors: self.errors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::stage::DocumentChecks;
    use inspektor_core::types::{IssueKind, Metrics};

    fn neutral_metrics() -> Metrics {
        Metrics {
            avg_luminance: 0.55,
            avg_saturation: 0.3,
            avg_r: 0.5,
            avg_g: 0.5,
            avg_b: 0.5,
        }
    }

    #[test]
    fn raw_flags_follow_option_thresholds() {
        let options = AnalysisOptions::default();
        let rules = QualityRuleEngine::new(options.effective_thresholds());
        let mut draft = AnalysisDraft::default();
        draft.begin(1200, 1600);
        draft.apply(
            StageOutput::Basic(Metrics {
                avg_luminance: 0.97,
                avg_saturation: 0.95,
                ..neutral_metrics()
            }),
            &options,
            &rules,
        );
        draft.apply(StageOutput::Sharpness(100.0), &options, &rules);
        draft.evaluate(&options, &rules);

        assert!(draft.quality.overexposed);
        assert!(draft.quality.oversaturated);
        assert!(draft.quality.blurry);
        assert!(!draft.quality.is_valid);
        assert_eq!(draft.metrics.resolution, "1200x1600");
        assert_eq!(draft.errors.len(), draft.issues.len());
    }

    #[test]
    fn skipped_white_balance_never_flags() {
        let options = AnalysisOptions::fast();
        let rules = QualityRuleEngine::new(options.effective_thresholds());
        let mut draft = AnalysisDraft::default();
        draft.apply(
            StageOutput::Basic(Metrics {
                avg_r: 0.9,
                avg_g: 0.4,
                avg_b: 0.3,
                ..neutral_metrics()
            }),
            &options,
            &rules,
        );
        assert!(!draft.quality.incorrect_wb);
    }

    #[test]
    fn healthy_draft_is_valid() {
        let options = AnalysisOptions::default();
        let rules = QualityRuleEngine::new(options.effective_thresholds());
        let mut draft = AnalysisDraft::default();
        draft.begin(1200, 1600);
        draft.apply(StageOutput::Basic(neutral_metrics()), &options, &rules);
        draft.apply(StageOutput::Sharpness(800.0), &options, &rules);
        draft.apply(StageOutput::QrCode(true), &options, &rules);
        draft.evaluate(&options, &rules);

        assert!(draft.quality.is_valid);
        assert!(draft.quality.qr_detected);
        assert!(draft.issues.is_empty());
    }

    #[test]
    fn document_checks_drive_ocr_flags() {
        let options = AnalysisOptions::ocr();
        let rules = QualityRuleEngine::new(options.effective_thresholds());
        let mut draft = AnalysisDraft::default();
        draft.begin(640, 480);
        draft.apply(StageOutput::Basic(neutral_metrics()), &options, &rules);
        draft.apply(StageOutput::Sharpness(800.0), &options, &rules);
        draft.apply(
            StageOutput::Document(DocumentChecks {
                brightness: 40.0,
                skew_angle: Some(8.0),
                num_contours: Some(12),
                has_document_edges: Some(false),
            }),
            &options,
            &rules,
        );
        draft.evaluate(&options, &rules);

        let q = &draft.quality;
        assert!(q.is_low_resolution);
        assert!(q.is_too_dark);
        assert!(q.is_skewed);
        assert!(!q.has_document_edges);
        assert!(!q.is_valid);
        assert_eq!(draft.metrics.num_contours, 12);
        let kinds: Vec<IssueKind> = draft.issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IssueKind::LowResolution,
                IssueKind::TooDark,
                IssueKind::Skew,
                IssueKind::DocumentEdges
            ]
        );
    }

    #[test]
    fn recycle_resets_everything() {
        let options = AnalysisOptions::default();
        let rules = QualityRuleEngine::new(options.effective_thresholds());
        let mut draft = AnalysisDraft::default();
        draft.begin(10, 10);
        draft.apply(StageOutput::Sharpness(0.0), &options, &rules);
        draft.evaluate(&options, &rules);
        assert!(!draft.issues.is_empty());

        draft.recycle();
        assert_eq!(draft.quality, Quality::default());
        assert_eq!(draft.metrics, ImageMetrics::default());
        assert!(draft.issues.is_empty());
        assert!(draft.errors.is_empty());
    }
}

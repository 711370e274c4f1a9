// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Summary scoring of a finished analysis: an overall grade, per-aspect
// sub-scores, and OCR readiness.

use std::fmt;

use serde::Serialize;

use inspektor_core::types::{AnalysisResult, OcrResult};

/// Below this many pixels a not-flagged image still loses readiness points.
const COMFORTABLE_OCR_PIXELS: u64 = 1_200_000;

/// Laplacian variance under which readiness is docked proportionally.
const READINESS_SHARPNESS_KNEE: f64 = 500.0;

/// Assumed footprint of one rendered character, in pixels (12x16).
const CHAR_FOOTPRINT_PIXELS: u64 = 12 * 16;
const MAX_TEXT_DENSITY: f64 = 0.8;
const CHARS_PER_LINE: usize = 70;

/// Letter grade derived from the overall quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score < 50.0 {
            Self::F
        } else if score < 70.0 {
            Self::D
        } else if score < 80.0 {
            Self::C
        } else if score < 90.0 {
            Self::B
        } else {
            Self::A
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(letter)
    }
}

/// Scores derived from extracted text, present only when OCR ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextAssessment {
    /// 0-100.
    pub detection_score: f64,
    /// Approximate fraction of the image covered by text, capped at 0.8.
    pub density: f64,
    pub estimated_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub quality_score: f64,
    pub grade: Grade,
    pub sharpness_score: f64,
    pub exposure_score: f64,
    pub color_score: f64,
    pub ocr_ready: bool,
    pub ocr_readiness_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextAssessment>,
}

impl Assessment {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let (width, height) = parse_resolution(&result.metrics.resolution).unwrap_or((0, 0));
        let quality_score = quality_score(result);

        Self {
            quality_score,
            grade: Grade::from_score(quality_score),
            sharpness_score: sharpness_score(result),
            exposure_score: exposure_score(result),
            color_score: color_score(result),
            ocr_ready: ocr_ready(result),
            ocr_readiness_score: ocr_readiness_score(result, width, height),
            text: result.ocr_result.as_ref().map(|ocr| TextAssessment {
                detection_score: text_detection_score(ocr),
                density: text_density(ocr, width, height),
                estimated_lines: estimate_text_lines(&ocr.extracted_text),
            }),
        }
    }
}

/// `"WxH"` back into dimensions.
pub fn parse_resolution(resolution: &str) -> Option<(u32, u32)> {
    let (w, h) = resolution.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

pub fn quality_score(result: &AnalysisResult) -> f64 {
    let q = &result.quality;
    let mut score = 100.0;
    if q.blurry {
        score -= 30.0;
    }
    if q.overexposed {
        score -= 25.0;
    }
    if q.oversaturated {
        score -= 20.0;
    }
    if q.incorrect_wb {
        score -= 15.0;
    }
    f64::max(score, 0.0)
}

pub fn sharpness_score(result: &AnalysisResult) -> f64 {
    if result.quality.blurry {
        return 0.0;
    }
    match result.metrics.laplacian_var {
        v if v > 1000.0 => 100.0,
        v if v > 500.0 => 80.0,
        v if v > 100.0 => 60.0,
        _ => 30.0,
    }
}

pub fn exposure_score(result: &AnalysisResult) -> f64 {
    let q = &result.quality;
    if q.overexposed || q.is_too_bright {
        return 20.0;
    }
    if q.is_too_dark {
        return 30.0;
    }
    let luminance = result.metrics.avg_luminance;
    if (0.3..=0.7).contains(&luminance) {
        100.0
    } else if (0.2..=0.8).contains(&luminance) {
        80.0
    } else {
        60.0
    }
}

pub fn color_score(result: &AnalysisResult) -> f64 {
    if result.quality.oversaturated {
        return 40.0;
    }
    if result.quality.incorrect_wb {
        return 50.0;
    }
    let saturation = result.metrics.avg_saturation;
    if (0.2..=0.8).contains(&saturation) {
        100.0
    } else if (0.1..=0.9).contains(&saturation) {
        80.0
    } else {
        60.0
    }
}

pub fn ocr_ready(result: &AnalysisResult) -> bool {
    let q = &result.quality;
    !q.blurry && !q.is_too_dark && !q.is_too_bright && !q.is_skewed && !q.is_low_resolution
}

/// 0-100; blur weighs heaviest, then resolution and brightness.
pub fn ocr_readiness_score(result: &AnalysisResult, width: u32, height: u32) -> f64 {
    let q = &result.quality;
    let mut score = 100.0;

    if q.blurry {
        score -= 40.0;
    } else if result.metrics.laplacian_var < READINESS_SHARPNESS_KNEE {
        score -= (READINESS_SHARPNESS_KNEE - result.metrics.laplacian_var) / READINESS_SHARPNESS_KNEE
            * 20.0;
    }

    if q.is_too_dark {
        score -= 25.0;
    } else if q.is_too_bright {
        score -= 20.0;
    }

    if q.is_low_resolution {
        score -= 30.0;
    } else if u64::from(width) * u64::from(height) < COMFORTABLE_OCR_PIXELS {
        score -= 15.0;
    }

    if q.is_skewed {
        score -= 15.0;
    }
    if q.overexposed {
        score -= 20.0;
    }
    if q.oversaturated {
        score -= 10.0;
    }
    if q.incorrect_wb {
        score -= 10.0;
    }

    score.clamp(0.0, 100.0)
}

pub fn text_detection_score(ocr: &OcrResult) -> f64 {
    let length = ocr.extracted_text.len();
    let mut score = ocr.confidence;

    if length > 0 {
        score += 10.0;
    }
    score += match length {
        l if l > 100 => 15.0,
        l if l > 50 => 10.0,
        l if l > 10 => 5.0,
        _ => 0.0,
    };

    if ocr.wer > 0.5 {
        score -= 20.0;
    } else if ocr.wer > 0.3 {
        score -= 10.0;
    }
    if ocr.cer > 0.3 {
        score -= 15.0;
    } else if ocr.cer > 0.2 {
        score -= 8.0;
    }

    score.clamp(0.0, 100.0)
}

pub fn text_density(ocr: &OcrResult, width: u32, height: u32) -> f64 {
    let image_pixels = u64::from(width) * u64::from(height);
    if ocr.extracted_text.is_empty() || image_pixels == 0 {
        return 0.0;
    }
    let text_pixels = ocr.extracted_text.len() as u64 * CHAR_FOOTPRINT_PIXELS;
    f64::min(text_pixels as f64 / image_pixels as f64, MAX_TEXT_DENSITY)
}

/// Newline count, or a length-based guess for single-line text.
pub fn estimate_text_lines(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let lines = 1 + text.matches('\n').count();
    if lines == 1 {
        (text.len() / CHARS_PER_LINE).max(1)
    } else {
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use inspektor_core::types::{AnalysisId, ImageMetrics, Quality};

    fn result(quality: Quality, metrics: ImageMetrics) -> AnalysisResult {
        AnalysisResult {
            id: AnalysisId::new(),
            timestamp: Utc::now(),
            processing_time_sec: 0.01,
            quality,
            metrics,
            issues: Vec::new(),
            ocr_result: None,
            errors: Vec::new(),
        }
    }

    fn healthy_metrics() -> ImageMetrics {
        ImageMetrics {
            laplacian_var: 1200.0,
            avg_luminance: 0.5,
            avg_saturation: 0.4,
            channel_balance: [0.5, 0.5, 0.5],
            resolution: "1200x1600".to_string(),
            brightness: 128.0,
            num_contours: 40,
        }
    }

    #[test]
    fn healthy_image_grades_a() {
        let assessment = Assessment::from_result(&result(Quality::default(), healthy_metrics()));
        assert_eq!(assessment.quality_score, 100.0);
        assert_eq!(assessment.grade, Grade::A);
        assert_eq!(assessment.sharpness_score, 100.0);
        assert_eq!(assessment.exposure_score, 100.0);
        assert_eq!(assessment.color_score, 100.0);
        assert!(assessment.ocr_ready);
        assert_eq!(assessment.ocr_readiness_score, 100.0);
        assert!(assessment.text.is_none());
    }

    #[test]
    fn flags_lower_the_grade() {
        let quality = Quality {
            blurry: true,
            overexposed: true,
            ..Default::default()
        };
        let assessment = Assessment::from_result(&result(quality, healthy_metrics()));
        assert_eq!(assessment.quality_score, 45.0);
        assert_eq!(assessment.grade, Grade::F);
        assert_eq!(assessment.sharpness_score, 0.0);
        assert_eq!(assessment.exposure_score, 20.0);
        assert!(!assessment.ocr_ready);
    }

    #[test]
    fn penalties_stack() {
        let quality = Quality {
            blurry: true,
            overexposed: true,
            oversaturated: true,
            incorrect_wb: true,
            ..Default::default()
        };
        assert_eq!(quality_score(&result(quality, healthy_metrics())), 10.0);
    }

    #[test]
    fn grade_boundaries() {
        assert_eq!(Grade::from_score(90.0), Grade::A);
        assert_eq!(Grade::from_score(89.9), Grade::B);
        assert_eq!(Grade::from_score(70.0), Grade::C);
        assert_eq!(Grade::from_score(50.0), Grade::D);
        assert_eq!(Grade::from_score(49.0), Grade::F);
        assert_eq!(Grade::C.to_string(), "C");
    }

    #[test]
    fn readiness_docks_small_soft_images() {
        let metrics = ImageMetrics {
            laplacian_var: 250.0,
            resolution: "800x600".to_string(),
            ..healthy_metrics()
        };
        // 10 for softness, 15 for sub-1.2MP.
        let score = ocr_readiness_score(&result(Quality::default(), metrics), 800, 600);
        assert!((score - 75.0).abs() < 1e-9);
    }

    #[test]
    fn readiness_clamps_to_zero() {
        let quality = Quality {
            blurry: true,
            is_too_dark: true,
            is_low_resolution: true,
            is_skewed: true,
            overexposed: true,
            ..Default::default()
        };
        assert_eq!(ocr_readiness_score(&result(quality, healthy_metrics()), 10, 10), 0.0);
    }

    #[test]
    fn text_scores_follow_extraction() {
        let ocr = OcrResult {
            extracted_text: "a".repeat(120),
            confidence: 60.0,
            wer: 0.4,
            cer: 0.25,
            ..Default::default()
        };
        // 60 + 10 + 15 - 10 - 8
        assert_eq!(text_detection_score(&ocr), 67.0);
        let density = text_density(&ocr, 100, 100);
        assert_eq!(density, MAX_TEXT_DENSITY);
        assert_eq!(text_density(&ocr, 0, 0), 0.0);
    }

    #[test]
    fn text_assessment_present_with_ocr() {
        let mut analysis = result(Quality::default(), healthy_metrics());
        analysis.ocr_result = Some(OcrResult {
            extracted_text: "line one\nline two\nline three".to_string(),
            confidence: 50.0,
            ..Default::default()
        });
        let text = Assessment::from_result(&analysis).text.unwrap();
        assert_eq!(text.estimated_lines, 3);
        assert!(text.density > 0.0);
    }

    #[test]
    fn line_estimate_uses_length_for_single_lines() {
        assert_eq!(estimate_text_lines(""), 0);
        assert_eq!(estimate_text_lines("short"), 1);
        assert_eq!(estimate_text_lines(&"x".repeat(210)), 3);
    }

    #[test]
    fn resolution_parsing() {
        assert_eq!(parse_resolution("640x480"), Some((640, 480)));
        assert_eq!(parse_resolution("bogus"), None);
        assert_eq!(parse_resolution(""), None);
    }
}

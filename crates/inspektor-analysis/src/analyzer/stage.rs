// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Independent analysis stages and the shared, read-only context they run in.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use image::GrayImage;
use tracing::debug;

use inspektor_core::config::AnalysisOptions;
use inspektor_core::error::{InspektorError, Result};
use inspektor_core::types::Metrics;

use crate::metrics::{EdgeGradients, PixelMetricsEngine};
use crate::pool::worker::panic_message;
use crate::qr::QrPatternDetector;
use crate::raster::RasterImage;

/// One independently schedulable unit of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Colour statistics.
    Basic,
    /// Laplacian variance.
    Sharpness,
    QrCode,
    /// Brightness, skew, contours, and page edges (document profile).
    Document,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Basic => "basic_metrics",
            Self::Sharpness => "laplacian_variance",
            Self::QrCode => "qr_detection",
            Self::Document => "document_checks",
        }
    }

    /// Stages an analysis with `options` runs, in sequential order.
    pub fn plan(options: &AnalysisOptions) -> Vec<Stage> {
        let mut stages = vec![Stage::Basic, Stage::Sharpness];
        if !options.skip_qr_detection {
            stages.push(Stage::QrCode);
        }
        if options.ocr_mode {
            stages.push(Stage::Document);
        }
        stages
    }
}

/// Document-profile measurements. `None` marks a skipped or declined check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentChecks {
    pub brightness: f64,
    pub skew_angle: Option<f64>,
    pub num_contours: Option<usize>,
    pub has_document_edges: Option<bool>,
}

/// The value a stage produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageOutput {
    Basic(Metrics),
    Sharpness(f64),
    QrCode(bool),
    Document(DocumentChecks),
}

impl StageOutput {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Basic(_) => Stage::Basic,
            Self::Sharpness(_) => Stage::Sharpness,
            Self::QrCode(_) => Stage::QrCode,
            Self::Document(_) => Stage::Document,
        }
    }
}

/// Everything a stage reads. Cloning is cheap (reference counts only).
#[derive(Clone)]
pub struct StageContext {
    pub image: Arc<dyn RasterImage>,
    pub gray: Arc<GrayImage>,
    pub engine: Arc<PixelMetricsEngine>,
    pub qr: QrPatternDetector,
    pub skip_contours: bool,
    pub skip_edges: bool,
}

impl StageContext {
    pub fn run(&self, stage: Stage) -> StageOutput {
        debug!(stage = stage.name(), "Running stage");
        match stage {
            Stage::Basic => StageOutput::Basic(self.engine.basic_metrics(self.image.as_ref())),
            Stage::Sharpness => StageOutput::Sharpness(self.engine.laplacian_variance(&self.gray)),
            Stage::QrCode => StageOutput::QrCode(self.qr.detect_in_gray(&self.gray)),
            Stage::Document => StageOutput::Document(self.document_checks()),
        }
    }

    fn document_checks(&self) -> DocumentChecks {
        let gradients = EdgeGradients::compute(&self.gray);
        let num_contours = (!self.skip_contours).then(|| {
            gradients
                .as_ref()
                .map_or(0, |g| self.engine.contours_from_gradients(g))
        });
        DocumentChecks {
            brightness: self.engine.brightness(&self.gray),
            skew_angle: gradients.as_ref().and_then(|g| self.engine.skew_from_gradients(g)),
            num_contours,
            has_document_edges: (!self.skip_edges).then(|| self.engine.has_document_edges(&self.gray)),
        }
    }

    /// Run on the calling thread, turning a panic into
    /// [`InspektorError::StageFailed`].
    pub fn run_guarded(&self, stage: Stage) -> Result<StageOutput> {
        panic::catch_unwind(AssertUnwindSafe(|| self.run(stage))).map_err(|payload| {
            InspektorError::StageFailed {
                stage: stage.name().to_string(),
                reason: panic_message(payload.as_ref()),
            }
        })
    }
}

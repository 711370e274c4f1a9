// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analysis orchestration.
//
// One call: validate input, derive grayscale, fan the independent stages out
// over the worker pool (or run them in order), join, apply the rules, and
// snapshot the pooled draft into an owned result.

mod draft;
mod stage;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use image::GrayImage;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use inspektor_core::config::{AnalysisOptions, EngineConfig};
use inspektor_core::error::{InspektorError, Result};
use inspektor_core::types::{AnalysisResult, OcrResult};

use crate::metrics::PixelMetricsEngine;
use crate::ocr::{TextExtractor, failed_extraction, score_extraction};
use crate::pool::{ObjectPool, PoolStats, ScratchPools, WorkerPool};
use crate::qr::QrPatternDetector;
use crate::raster::{RasterImage, to_grayscale_into};
use crate::rules::QualityRuleEngine;

pub use draft::AnalysisDraft;
pub use stage::{DocumentChecks, Stage, StageContext, StageOutput};

/// Cumulative timing across every analysis this analyzer ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub analyses: u64,
    pub total_processing_time_sec: f64,
    pub average_processing_time_sec: f64,
}

/// The analysis engine. Share one instance across threads; every call is
/// independent.
pub struct ImageAnalyzer {
    config: EngineConfig,
    pool: WorkerPool,
    scratch: Arc<ScratchPools>,
    engine: Arc<PixelMetricsEngine>,
    qr: QrPatternDetector,
    drafts: Arc<ObjectPool<AnalysisDraft>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    stats: Mutex<PerformanceStats>,
}

impl ImageAnalyzer {
    /// Build an analyzer and start its worker pool.
    #[instrument(skip_all, fields(workers = config.workers))]
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let pool = WorkerPool::from_config(&config);
        pool.start();
        let scratch = Arc::new(ScratchPools::from_config(&config));
        let engine = Arc::new(PixelMetricsEngine::new(Arc::clone(&scratch)));

        info!(workers = pool.workers(), max_pixels = config.max_pixels, "Image analyzer ready");
        Ok(Self {
            config,
            pool,
            scratch,
            engine,
            qr: QrPatternDetector::new(),
            drafts: Arc::new(ObjectPool::new(AnalysisDraft::default, draft::MAX_POOLED_DRAFT_ENTRIES)),
            extractor: None,
            stats: Mutex::new(PerformanceStats::default()),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    /// Attach the collaborator used for text extraction in OCR mode.
    pub fn with_text_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze with the default profile, or the document profile when
    /// `is_ocr` is set.
    pub fn analyze<I>(&self, image: Arc<I>, is_ocr: bool) -> Result<AnalysisResult>
    where
        I: RasterImage + 'static,
    {
        let options = if is_ocr {
            AnalysisOptions::ocr()
        } else {
            AnalysisOptions::default()
        };
        self.analyze_with_options(image, &options)
    }

    /// Document profile, scoring extracted text against `expected_text`.
    pub fn analyze_with_ocr<I>(&self, image: Arc<I>, expected_text: &str) -> Result<AnalysisResult>
    where
        I: RasterImage + 'static,
    {
        let options = AnalysisOptions::ocr().with_ocr(expected_text);
        self.analyze_with_options(image, &options)
    }

    #[instrument(skip_all, fields(
        width = image.width(),
        height = image.height(),
        ocr = options.ocr_mode,
        fast = options.fast_mode,
    ))]
    pub fn analyze_with_options<I>(&self, image: Arc<I>, options: &AnalysisOptions) -> Result<AnalysisResult>
    where
        I: RasterImage + 'static,
    {
        let started = Instant::now();
        let timestamp = Utc::now();

        options.validate()?;
        let image: Arc<dyn RasterImage> = image;
        let (width, height) = image.dimensions();
        if image.pixel_count() > self.config.max_pixels {
            return Err(InspektorError::InvalidImage(format!(
                "{width}x{height} exceeds the {} pixel limit",
                self.config.max_pixels
            )));
        }

        let rules = QualityRuleEngine::new(options.effective_thresholds());
        let gray = Arc::new(to_grayscale_into(&*image, self.scratch.gray.take_detached()));
        debug!("Grayscale derived");

        let stages = Stage::plan(options);
        let ctx = StageContext {
            image: Arc::clone(&image),
            gray: Arc::clone(&gray),
            engine: Arc::clone(&self.engine),
            qr: self.qr,
            skip_contours: options.skip_contour_detection,
            skip_edges: options.skip_edge_detection,
        };
        let outputs = if options.use_worker_pool && !options.fast_mode {
            self.run_parallel(&stages, &ctx, options.max_workers)
        } else {
            run_sequential(&stages, &ctx)
        };
        drop(ctx);
        self.recycle_gray(gray);
        let outputs = outputs?;
        debug!(stages = outputs.len(), "Stages joined");

        let mut draft = self.drafts.take();
        draft.begin(width, height);
        for output in outputs {
            draft.apply(output, options, &rules);
        }
        draft.evaluate(options, &rules);

        let ocr_result = if options.ocr_mode {
            self.extract_text(&*image, &options.ocr_expected_text)
        } else {
            None
        };

        let elapsed = started.elapsed();
        let result = draft.snapshot(timestamp, elapsed.as_secs_f64(), ocr_result);
        self.record(elapsed);

        info!(
            id = %result.id,
            valid = result.quality.is_valid,
            issues = result.issues.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Analysis complete"
        );
        Ok(result)
    }

    /// Fan `stages` out over the pool and join them with a per-call result
    /// channel. At most `max_workers` stages (0 = all) go to the pool; the
    /// rest, and any the pool refuses, run here.
    fn run_parallel(&self, stages: &[Stage], ctx: &StageContext, max_workers: usize) -> Result<Vec<StageOutput>> {
        let limit = if max_workers == 0 { stages.len() } else { max_workers };
        let (tx, rx) = crossbeam_channel::unbounded::<StageOutput>();
        let mut dispatched = Vec::with_capacity(stages.len());
        let mut inline = Vec::new();

        for &stage in stages {
            if dispatched.len() >= limit {
                inline.push(stage);
                continue;
            }
            let job_ctx = ctx.clone();
            let job_tx = tx.clone();
            let job = move || {
                let output = job_ctx.run(stage);
                // Release the shared grayscale before the result is observed.
                drop(job_ctx);
                let _ = job_tx.send(output);
            };
            match self.pool.try_submit(Box::new(job)) {
                Ok(()) => dispatched.push(stage),
                Err(err) => {
                    warn!(stage = stage.name(), error = %err, "Stage not accepted by worker pool; running inline");
                    inline.push(stage);
                }
            }
        }
        drop(tx);

        let mut outputs = Vec::with_capacity(stages.len());
        for stage in inline {
            outputs.push(ctx.run_guarded(stage)?);
        }

        // Every job holds a sender; the channel disconnects once all of them
        // have either reported or died.
        while !dispatched.is_empty() {
            let Ok(output) = rx.recv() else {
                break;
            };
            let stage = output.stage();
            dispatched.retain(|pending| *pending != stage);
            outputs.push(output);
        }
        for stage in dispatched {
            warn!(stage = stage.name(), "Stage lost to a worker fault; recomputing inline");
            outputs.push(ctx.run_guarded(stage)?);
        }
        Ok(outputs)
    }

    fn recycle_gray(&self, gray: Arc<GrayImage>) {
        match Arc::try_unwrap(gray) {
            Ok(gray) => self.scratch.gray.give(gray.into_raw()),
            Err(_) => debug!("Grayscale buffer still shared; not recycled"),
        }
    }

    fn extract_text(&self, image: &dyn RasterImage, expected: &str) -> Option<OcrResult> {
        match &self.extractor {
            Some(extractor) => Some(match extractor.extract_text(image) {
                Ok(text) => score_extraction(text, expected),
                Err(err) => {
                    warn!(error = %err, "Text extraction failed");
                    failed_extraction(expected, err.to_string())
                }
            }),
            None if !expected.is_empty() => {
                Some(failed_extraction(expected, "no text extractor configured"))
            }
            None => None,
        }
    }

    fn record(&self, elapsed: Duration) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.analyses += 1;
        stats.total_processing_time_sec += elapsed.as_secs_f64();
        stats.average_processing_time_sec = stats.total_processing_time_sec / stats.analyses as f64;
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Shut the worker pool down. Later analyses run every stage on the
    /// calling thread.
    pub fn close(&self) {
        self.pool.close();
    }
}

fn run_sequential(stages: &[Stage], ctx: &StageContext) -> Result<Vec<StageOutput>> {
    stages.iter().map(|&stage| ctx.run_guarded(stage)).collect()
}

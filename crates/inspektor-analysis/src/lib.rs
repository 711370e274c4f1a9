// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// inspektor-analysis: the image quality analysis engine.
//
// Provides a bounded worker pool with pooled scratch buffers, pixel-level
// metrics (colour, sharpness, brightness, skew, contours, document edges),
// a heuristic QR finder-pattern detector, the threshold-driven quality rules,
// and the analyzer that fans the stages of one analysis out over the pool.

pub mod analyzer;
pub mod assessment;
pub mod metrics;
pub mod ocr;
pub mod pool;
pub mod qr;
pub mod raster;
pub mod rules;

// Re-export the primary types so callers can use `inspektor_analysis::ImageAnalyzer` etc.
pub use analyzer::{ImageAnalyzer, PerformanceStats};
pub use assessment::{Assessment, Grade};
pub use metrics::PixelMetricsEngine;
pub use ocr::TextExtractor;
pub use pool::{PoolStats, ScratchPools, WorkerPool};
pub use qr::QrPatternDetector;
pub use raster::RasterImage;
pub use rules::QualityRuleEngine;

#[cfg(feature = "ocr")]
pub use ocr::OcrsTextExtractor;

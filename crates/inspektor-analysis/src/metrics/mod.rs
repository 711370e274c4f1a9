// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel metrics: colour statistics, sharpness, brightness, and document
// geometry computed over an RGBA raster or its grayscale derivative.
//
// Kernels that touch every pixel split the image into horizontal strips and
// reduce per-strip partial sums on the rayon pool.

mod color;
mod geometry;
mod sharpness;

use std::sync::Arc;

use crate::pool::ScratchPools;

pub use color::white_balance_issue;
pub use geometry::EdgeGradients;

/// Grayscale images with at least this many pixels compute brightness in
/// parallel strips.
pub const PARALLEL_BRIGHTNESS_MIN_PIXELS: usize = 100_000;

/// Sobel magnitude above which a pixel counts as an edge.
pub const EDGE_MAGNITUDE_THRESHOLD: f64 = 50.0;

/// Edge points needed before a skew angle is estimated.
pub const MIN_SKEW_EDGE_POINTS: usize = 10;

/// Edge pixels grouped into one nominal contour.
pub const EDGE_PIXELS_PER_CONTOUR: usize = 10;

/// Inset of the corner samples used by the document-edge check.
pub const DOCUMENT_CORNER_INSET: u32 = 10;

/// Corner/centre intensity difference that marks a document boundary.
pub const DOCUMENT_EDGE_CONTRAST: i32 = 30;

/// Stateless metric kernels over pooled scratch storage.
pub struct PixelMetricsEngine {
    scratch: Arc<ScratchPools>,
    strips: usize,
}

impl PixelMetricsEngine {
    pub fn new(scratch: Arc<ScratchPools>) -> Self {
        Self {
            scratch,
            strips: rayon::current_num_threads().max(1),
        }
    }

    /// Override the number of horizontal strips used by parallel kernels.
    pub fn with_strips(mut self, strips: usize) -> Self {
        self.strips = strips.max(1);
        self
    }

    pub fn scratch(&self) -> &Arc<ScratchPools> {
        &self.scratch
    }

    /// Row ranges `[start, end)` covering `height` in at most `self.strips`
    /// contiguous strips.
    fn strip_ranges(&self, height: usize) -> Vec<(usize, usize)> {
        if height == 0 {
            return Vec::new();
        }
        let strips = self.strips.min(height);
        let rows_per_strip = height.div_ceil(strips);
        (0..strips)
            .map(|i| {
                let start = (i * rows_per_strip).min(height);
                let end = (start + rows_per_strip).min(height);
                (start, end)
            })
            .filter(|(start, end)| start < end)
            .collect()
    }
}

impl Default for PixelMetricsEngine {
    fn default() -> Self {
        Self::new(Arc::new(ScratchPools::default()))
    }
}

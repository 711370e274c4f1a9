// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour statistics: HSV luminance and saturation, channel means, and the
// white-balance check derived from them.

use rayon::prelude::*;
use tracing::{debug, instrument};

use inspektor_core::types::Metrics;

use super::PixelMetricsEngine;
use crate::raster::RasterImage;

#[derive(Debug, Default, Clone, Copy)]
struct ColorSums {
    value: f64,
    saturation: f64,
    r: f64,
    g: f64,
    b: f64,
}

impl ColorSums {
    fn merge(self, other: Self) -> Self {
        Self {
            value: self.value + other.value,
            saturation: self.saturation + other.saturation,
            r: self.r + other.r,
            g: self.g + other.g,
            b: self.b + other.b,
        }
    }
}

impl PixelMetricsEngine {
    /// Mean HSV value, mean HSV saturation, and mean of each channel over
    /// every pixel, all normalised to [0, 1].
    ///
    /// An image with no pixels yields all-zero metrics.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn basic_metrics(&self, image: &dyn RasterImage) -> Metrics {
        let (width, height) = image.dimensions();
        let total = image.pixel_count();
        if total == 0 {
            return Metrics::default();
        }

        let sums = self
            .strip_ranges(height as usize)
            .into_par_iter()
            .map(|(start, end)| {
                let mut sums = ColorSums::default();
                for y in start..end {
                    for x in 0..width {
                        let [r, g, b, _] = image.rgba(x, y as u32);
                        let (r, g, b) = (
                            f64::from(r) / 255.0,
                            f64::from(g) / 255.0,
                            f64::from(b) / 255.0,
                        );
                        let max = r.max(g).max(b);
                        let min = r.min(g).min(b);

                        sums.value += max;
                        if max > 0.0 {
                            sums.saturation += (max - min) / max;
                        }
                        sums.r += r;
                        sums.g += g;
                        sums.b += b;
                    }
                }
                sums
            })
            .reduce(ColorSums::default, ColorSums::merge);

        let n = total as f64;
        let metrics = Metrics {
            avg_luminance: sums.value / n,
            avg_saturation: sums.saturation / n,
            avg_r: sums.r / n,
            avg_g: sums.g / n,
            avg_b: sums.b / n,
        };
        debug!(
            luminance = metrics.avg_luminance,
            saturation = metrics.avg_saturation,
            "Basic metrics computed"
        );
        metrics
    }
}

/// Whether any channel mean deviates from the mean of all three channels by
/// more than `tolerance`, relative to that mean.
///
/// A black image (all means zero) has no measurable cast.
pub fn white_balance_issue(metrics: &Metrics, tolerance: f64) -> bool {
    let channels = metrics.channel_balance();
    let mean = channels.iter().sum::<f64>() / 3.0;
    if mean <= f64::EPSILON {
        return false;
    }
    channels
        .iter()
        .any(|channel| (channel - mean).abs() / mean > tolerance)
}

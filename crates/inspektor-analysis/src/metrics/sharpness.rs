// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Laplacian-variance sharpness and mean grayscale brightness.

use image::GrayImage;
use rayon::prelude::*;
use tracing::{debug, instrument};

use super::{PARALLEL_BRIGHTNESS_MIN_PIXELS, PixelMetricsEngine};

impl PixelMetricsEngine {
    /// Sample variance of the 4-neighbour Laplacian over interior pixels.
    ///
    /// Images smaller than 3x3 have no interior and yield 0.
    #[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
    pub fn laplacian_variance(&self, gray: &GrayImage) -> f64 {
        let (width, height) = gray.dimensions();
        if width < 3 || height < 3 {
            return 0.0;
        }

        let raw = gray.as_raw();
        let stride = width as usize;
        let mut responses = self.scratch.floats.take();
        responses.reserve((width as usize - 2) * (height as usize - 2));

        for y in 1..height as usize - 1 {
            let row = y * stride;
            for x in 1..stride - 1 {
                let i = row + x;
                let response = i32::from(raw[i - stride])
                    + i32::from(raw[i + stride])
                    + i32::from(raw[i - 1])
                    + i32::from(raw[i + 1])
                    - 4 * i32::from(raw[i]);
                responses.push(f64::from(response));
            }
        }

        let variance = sample_variance(&responses);
        debug!(variance, samples = responses.len(), "Laplacian variance computed");
        variance
    }

    /// Mean grayscale intensity on a 0–255 scale; 0 for an empty image.
    pub fn brightness(&self, gray: &GrayImage) -> f64 {
        let raw = gray.as_raw();
        if raw.is_empty() {
            return 0.0;
        }

        let sum: u64 = if raw.len() >= PARALLEL_BRIGHTNESS_MIN_PIXELS {
            let stride = gray.width() as usize;
            self.strip_ranges(gray.height() as usize)
                .into_par_iter()
                .map(|(start, end)| {
                    raw[start * stride..end * stride]
                        .iter()
                        .map(|&v| u64::from(v))
                        .sum::<u64>()
                })
                .sum()
        } else {
            raw.iter().map(|&v| u64::from(v)).sum()
        };

        sum as f64 / raw.len() as f64
    }
}

/// Unbiased (n − 1) variance; 0 for fewer than two samples.
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let squares: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    squares / (n - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::{bisected_gray, solid_gray};
    use image::Luma;

    #[test]
    fn uniform_image_has_zero_variance() {
        let engine = PixelMetricsEngine::default();
        assert_eq!(engine.laplacian_variance(&solid_gray(20, 20, 128)), 0.0);
    }

    #[test]
    fn hard_edge_is_sharp() {
        let engine = PixelMetricsEngine::default();
        let variance = engine.laplacian_variance(&bisected_gray(100, 100));
        assert!(variance > 1000.0, "variance {variance}");
    }

    #[test]
    fn tiny_images_yield_zero() {
        let engine = PixelMetricsEngine::default();
        assert_eq!(engine.laplacian_variance(&solid_gray(2, 50, 0)), 0.0);
        assert_eq!(engine.laplacian_variance(&solid_gray(0, 0, 0)), 0.0);
    }

    #[test]
    fn single_interior_pixel_has_no_variance() {
        let engine = PixelMetricsEngine::default();
        let mut image = solid_gray(3, 3, 0);
        image.put_pixel(1, 1, Luma([255]));
        assert_eq!(engine.laplacian_variance(&image), 0.0);
    }

    #[test]
    fn laplacian_scratch_returns_to_pool() {
        let engine = PixelMetricsEngine::default();
        engine.laplacian_variance(&bisected_gray(16, 16));
        assert_eq!(engine.scratch().floats.idle(), 1);
    }

    #[test]
    fn sample_variance_uses_n_minus_one() {
        assert_eq!(sample_variance(&[]), 0.0);
        assert_eq!(sample_variance(&[5.0]), 0.0);
        assert!((sample_variance(&[1.0, 2.0, 3.0, 4.0]) - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn brightness_is_mean_intensity() {
        let engine = PixelMetricsEngine::default();
        assert_eq!(engine.brightness(&solid_gray(10, 10, 200)), 200.0);
        assert_eq!(engine.brightness(&solid_gray(0, 0, 0)), 0.0);
        assert!((engine.brightness(&bisected_gray(10, 4)) - 127.5).abs() < 1e-9);
    }

    #[test]
    fn large_images_take_the_parallel_path() {
        let engine = PixelMetricsEngine::default().with_strips(4);
        let image = bisected_gray(400, 300);
        assert!(image.as_raw().len() >= PARALLEL_BRIGHTNESS_MIN_PIXELS);
        assert!((engine.brightness(&image) - 127.5).abs() < 1e-9);
    }
}

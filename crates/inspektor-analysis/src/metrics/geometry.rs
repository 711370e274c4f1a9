// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document geometry: Sobel edge points, skew regression, edge-density
// contour estimate, and the corner-versus-centre document boundary check.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use tracing::{debug, instrument};

use super::{
    DOCUMENT_CORNER_INSET, DOCUMENT_EDGE_CONTRAST, EDGE_MAGNITUDE_THRESHOLD,
    EDGE_PIXELS_PER_CONTOUR, MIN_SKEW_EDGE_POINTS, PixelMetricsEngine,
};

/// Sobel gradients of one grayscale image. Computed once per document check
/// and read by both the skew fit and the contour estimate.
pub struct EdgeGradients {
    gx: Image<Luma<i16>>,
    gy: Image<Luma<i16>>,
}

impl EdgeGradients {
    /// `None` below 3x3, where no interior pixel exists.
    pub fn compute(gray: &GrayImage) -> Option<Self> {
        let (width, height) = gray.dimensions();
        if width < 3 || height < 3 {
            return None;
        }
        Some(Self {
            gx: horizontal_sobel(gray),
            gy: vertical_sobel(gray),
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.gx.dimensions()
    }

    /// Call `visit(x, y)` for every interior pixel whose gradient magnitude
    /// exceeds [`EDGE_MAGNITUDE_THRESHOLD`].
    fn for_each_edge_point(&self, mut visit: impl FnMut(u32, u32)) {
        let (width, height) = self.dimensions();
        let threshold_sq = EDGE_MAGNITUDE_THRESHOLD * EDGE_MAGNITUDE_THRESHOLD;

        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let dx = f64::from(self.gx.get_pixel(x, y).0[0]);
                let dy = f64::from(self.gy.get_pixel(x, y).0[0]);
                if dx * dx + dy * dy > threshold_sq {
                    visit(x, y);
                }
            }
        }
    }

    pub fn edge_count(&self) -> usize {
        let mut edges = 0usize;
        self.for_each_edge_point(|_, _| edges += 1);
        edges
    }
}

impl PixelMetricsEngine {
    /// Estimate page skew in degrees, folded into [-45, 45].
    ///
    /// Fits a least-squares line through the edge points. Returns `None` when
    /// fewer than [`MIN_SKEW_EDGE_POINTS`] edges exist, and `Some(0.0)` when
    /// the fit is degenerate (all points share one x coordinate).
    pub fn detect_skew(&self, gray: &GrayImage) -> Option<f64> {
        let gradients = EdgeGradients::compute(gray)?;
        self.skew_from_gradients(&gradients)
    }

    #[instrument(skip_all, fields(width = gradients.dimensions().0, height = gradients.dimensions().1))]
    pub fn skew_from_gradients(&self, gradients: &EdgeGradients) -> Option<f64> {
        let mut coords = self.scratch.matrices.take();
        let [xs, ys] = coords.rows_mut(2) else {
            return None;
        };
        gradients.for_each_edge_point(|x, y| {
            xs.push(f64::from(x));
            ys.push(f64::from(y));
        });

        if xs.len() < MIN_SKEW_EDGE_POINTS {
            debug!(edge_points = xs.len(), "Too few edges to estimate skew");
            return None;
        }

        let angle = regression_angle(xs, ys);
        debug!(angle, edge_points = xs.len(), "Skew estimated");
        Some(angle)
    }

    /// Edge-density proxy for the number of contours: edge pixels divided
    /// by [`EDGE_PIXELS_PER_CONTOUR`].
    pub fn detect_contours(&self, gray: &GrayImage) -> usize {
        EdgeGradients::compute(gray).map_or(0, |gradients| self.contours_from_gradients(&gradients))
    }

    pub fn contours_from_gradients(&self, gradients: &EdgeGradients) -> usize {
        gradients.edge_count() / EDGE_PIXELS_PER_CONTOUR
    }

    /// Whether at least two inset corners differ from the centre by more
    /// than [`DOCUMENT_EDGE_CONTRAST`] intensity levels.
    ///
    /// Corners that fall outside a small image are skipped.
    pub fn has_document_edges(&self, gray: &GrayImage) -> bool {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return false;
        }

        let center = i32::from(gray.get_pixel(width / 2, height / 2).0[0]);
        let inset = DOCUMENT_CORNER_INSET;
        let corners = [
            (Some(inset), Some(inset)),
            (width.checked_sub(inset), Some(inset)),
            (Some(inset), height.checked_sub(inset)),
            (width.checked_sub(inset), height.checked_sub(inset)),
        ];

        let differing = corners
            .into_iter()
            .filter_map(|(x, y)| Some((x?, y?)))
            .filter(|&(x, y)| x < width && y < height)
            .filter(|&(x, y)| {
                (i32::from(gray.get_pixel(x, y).0[0]) - center).abs() > DOCUMENT_EDGE_CONTRAST
            })
            .count();
        differing >= 2
    }
}

/// Slope of the least-squares fit of `ys` on `xs`, as degrees folded into
/// [-45, 45].
fn regression_angle(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() < 2 || xs.len() != ys.len() {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut sum_xy, mut sum_x2) = (0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        sum_xy += dx * (y - mean_y);
        sum_x2 += dx * dx;
    }
    if sum_x2.abs() < 1e-10 {
        return 0.0;
    }

    let angle = (sum_xy / sum_x2).atan().to_degrees();
    if !angle.is_finite() {
        return 0.0;
    }
    fold_angle(angle)
}

fn fold_angle(mut angle: f64) -> f64 {
    while angle > 45.0 {
        angle -= 90.0;
    }
    while angle < -45.0 {
        angle += 90.0;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::{bisected_gray, sloped_line, solid_gray};
    use image::Luma;

    #[test]
    fn uniform_image_has_no_skew_estimate() {
        let engine = PixelMetricsEngine::default();
        assert_eq!(engine.detect_skew(&solid_gray(50, 50, 128)), None);
    }

    #[test]
    fn horizontal_boundary_is_level() {
        let engine = PixelMetricsEngine::default();
        let image = GrayImage::from_fn(100, 100, |_, y| if y < 50 { Luma([0]) } else { Luma([255]) });
        let angle = engine.detect_skew(&image).unwrap();
        assert!(angle.abs() < 0.5, "angle {angle}");
    }

    #[test]
    fn sloped_line_reports_its_angle() {
        let engine = PixelMetricsEngine::default();
        let slope = 0.2_f64;
        let angle = engine.detect_skew(&sloped_line(200, 200, slope)).unwrap();
        let expected = slope.atan().to_degrees();
        assert!((angle - expected).abs() < 2.0, "angle {angle}, expected {expected}");
        assert!((-45.0..=45.0).contains(&angle));
    }

    #[test]
    fn vertical_boundary_is_degenerate_or_level() {
        let engine = PixelMetricsEngine::default();
        let angle = engine.detect_skew(&bisected_gray(100, 100)).unwrap();
        assert!((-45.0..=45.0).contains(&angle));
    }

    #[test]
    fn skew_scratch_returns_to_pool() {
        let engine = PixelMetricsEngine::default();
        engine.detect_skew(&bisected_gray(40, 40));
        assert_eq!(engine.scratch().matrices.idle(), 1);
    }

    #[test]
    fn regression_handles_degenerate_input() {
        assert_eq!(regression_angle(&[], &[]), 0.0);
        assert_eq!(regression_angle(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
        let angle = regression_angle(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]);
        assert!((angle - 45.0).abs() < 1e-9);
    }

    #[test]
    fn fold_keeps_angles_in_range() {
        assert_eq!(fold_angle(60.0), -30.0);
        assert_eq!(fold_angle(-60.0), 30.0);
        assert_eq!(fold_angle(45.0), 45.0);
        assert_eq!(fold_angle(10.0), 10.0);
    }

    #[test]
    fn shared_gradients_match_per_call_results() {
        let engine = PixelMetricsEngine::default();
        let image = sloped_line(120, 120, 0.1);
        let gradients = EdgeGradients::compute(&image).unwrap();

        assert_eq!(engine.skew_from_gradients(&gradients), engine.detect_skew(&image));
        assert_eq!(engine.contours_from_gradients(&gradients), engine.detect_contours(&image));
        assert!(EdgeGradients::compute(&solid_gray(2, 2, 0)).is_none());
    }

    #[test]
    fn contours_follow_edge_density() {
        let engine = PixelMetricsEngine::default();
        assert_eq!(engine.detect_contours(&solid_gray(100, 100, 128)), 0);
        // Two edge columns across 98 interior rows.
        assert_eq!(engine.detect_contours(&bisected_gray(100, 100)), 196 / 10);
    }

    #[test]
    fn framed_document_has_edges() {
        let engine = PixelMetricsEngine::default();
        let page = GrayImage::from_fn(100, 100, |x, y| {
            if (20..80).contains(&x) && (20..80).contains(&y) {
                Luma([240])
            } else {
                Luma([30])
            }
        });
        assert!(engine.has_document_edges(&page));
        assert!(!engine.has_document_edges(&solid_gray(100, 100, 200)));
    }

    #[test]
    fn tiny_images_have_no_document_edges() {
        let engine = PixelMetricsEngine::default();
        assert!(!engine.has_document_edges(&solid_gray(0, 0, 0)));
        let mut tiny = solid_gray(5, 5, 0);
        tiny.put_pixel(2, 2, Luma([255]));
        assert!(!engine.has_document_edges(&tiny));
    }
}

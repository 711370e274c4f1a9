// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR code presence heuristic.
//
// Probes four fixed candidate points for the concentric dark/light rings of a
// finder pattern. No decoding, no localisation; the answer is a boolean.

use image::GrayImage;
use tracing::debug;

use crate::raster::{RasterImage, to_grayscale};

/// Smallest finder-pattern size probed, in pixels.
const MIN_PATTERN_SIZE: u32 = 7;

/// Intensity below which a sample counts as dark.
const DARK_LEVEL: u8 = 128;

/// Probe directions: horizontal, vertical, and both diagonals.
const DIRECTIONS: [(i64, i64); 4] = [(1, 0), (0, 1), (1, 1), (-1, 1)];

/// Expected darkness at the four sample distances r/4, r/2, 3r/4, r.
const EXPECTED_RINGS: [bool; 4] = [true, false, true, false];

/// Samples that must agree for a direction to match.
const MIN_SAMPLE_MATCHES: usize = 3;

/// Directions that must match for a candidate to pass.
const MIN_DIRECTION_MATCHES: usize = 2;

/// Candidates that must pass for a QR code to be reported.
const MIN_CANDIDATE_MATCHES: usize = 2;

/// Stateless finder-pattern probe.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrPatternDetector;

impl QrPatternDetector {
    pub fn new() -> Self {
        Self
    }

    /// Whether `image` looks like it contains a QR code.
    pub fn detect(&self, image: &dyn RasterImage) -> bool {
        self.detect_in_gray(&to_grayscale(image))
    }

    /// Same as [`detect`](Self::detect) over a precomputed grayscale image.
    pub fn detect_in_gray(&self, gray: &GrayImage) -> bool {
        let (width, height) = gray.dimensions();
        let max_size = width.min(height) / 3;
        if max_size < MIN_PATTERN_SIZE {
            return false;
        }

        let candidates = [
            (width / 4, height / 4),
            (3 * width / 4, height / 4),
            (width / 4, 3 * height / 4),
            (width / 2, height / 2),
        ];

        let matched = candidates
            .iter()
            .filter(|&&(x, y)| has_finder_pattern(gray, x, y, max_size))
            .count();
        debug!(matched, "QR finder candidates probed");
        matched >= MIN_CANDIDATE_MATCHES
    }
}

fn has_finder_pattern(gray: &GrayImage, cx: u32, cy: u32, max_size: u32) -> bool {
    (MIN_PATTERN_SIZE..=max_size)
        .step_by(2)
        .any(|size| rings_match(gray, i64::from(cx), i64::from(cy), i64::from(size / 2)))
}

fn rings_match(gray: &GrayImage, cx: i64, cy: i64, radius: i64) -> bool {
    let (width, height) = (i64::from(gray.width()), i64::from(gray.height()));
    if cx - radius < 0 || cx + radius >= width || cy - radius < 0 || cy + radius >= height {
        return false;
    }

    let distances = [radius / 4, radius / 2, 3 * radius / 4, radius];
    let matching_directions = DIRECTIONS
        .iter()
        .filter(|&&(dx, dy)| {
            let matches = distances
                .iter()
                .zip(EXPECTED_RINGS)
                .filter(|&(&d, expect_dark)| {
                    let (x, y) = (cx + d * dx, cy + d * dy);
                    if x < 0 || x >= width || y < 0 || y >= height {
                        return false;
                    }
                    let dark = gray.get_pixel(x as u32, y as u32).0[0] < DARK_LEVEL;
                    dark == expect_dark
                })
                .count();
            matches >= MIN_SAMPLE_MATCHES
        })
        .count();

    matching_directions >= MIN_DIRECTION_MATCHES
}

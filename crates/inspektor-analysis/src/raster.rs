// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Read-only raster access and grayscale derivation.

use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Pixel};
use rayon::prelude::*;

/// Random-access view of an 8-bit image.
///
/// Anything that can answer "what colour is pixel (x, y)" can be analysed;
/// `image` buffers and [`DynamicImage`] implement it out of the box.
pub trait RasterImage: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// RGBA of the pixel at `(x, y)`. Callers stay within bounds.
    fn rgba(&self, x: u32, y: u32) -> [u8; 4];

    fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn pixel_count(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }
}

impl RasterImage for DynamicImage {
    fn width(&self) -> u32 {
        GenericImageView::width(self)
    }

    fn height(&self) -> u32 {
        GenericImageView::height(self)
    }

    fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        GenericImageView::get_pixel(self, x, y).0
    }
}

impl<P> RasterImage for ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    fn width(&self) -> u32 {
        ImageBuffer::width(self)
    }

    fn height(&self) -> u32 {
        ImageBuffer::height(self)
    }

    fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        self.get_pixel(x, y).to_rgba().0
    }
}

/// ITU-R BT.601 luma, rounded to the nearest integer.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    ((weighted + 500) / 1000) as u8
}

/// Derive an 8-bit grayscale image into `storage`, reusing its allocation.
pub fn to_grayscale_into(image: &dyn RasterImage, mut storage: Vec<u8>) -> GrayImage {
    let (width, height) = image.dimensions();
    storage.clear();
    storage.resize(width as usize * height as usize, 0);

    if width > 0 {
        storage
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let [r, g, b, _] = image.rgba(x as u32, y as u32);
                    *out = luma(r, g, b);
                }
            });
    }

    GrayImage::from_raw(width, height, storage).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Derive an 8-bit grayscale image with fresh storage.
pub fn to_grayscale(image: &dyn RasterImage) -> GrayImage {
    to_grayscale_into(image, Vec::new())
}

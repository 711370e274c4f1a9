// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// User-facing finding messages. Each names the problem and the remedy.

pub const BLURRY: &str = "Image is blurry. Please hold the camera steady and try again.";
pub const BLURRY_FOR_OCR: &str =
    "Image is blurry for OCR analysis. Please hold the camera steady and try again.";
pub const OVER_SHARPENED: &str = "Image has too much noise or artificial sharpening. Use natural lighting and avoid digital zoom.";
pub const OVEREXPOSED: &str = "Image has too much light. Move to a less bright area.";
pub const OVERSATURATED: &str = "Colors are too strong. Use normal light while clicking.";
pub const WHITE_BALANCE: &str = "Colors in the photo don't look natural. Use normal lighting.";
pub const LOW_LUMINANCE: &str = "Image is very dull. Use more light.";
pub const HIGH_LUMINANCE: &str = "Image is too bright. Take it in normal light.";
pub const LOW_SATURATION: &str = "Image looks faded. Use proper lighting.";
pub const CHANNEL_IMBALANCE: &str = "Colors look odd. Don't use filters or colored lights.";
pub const LOW_RESOLUTION: &str = "Image is too small or unclear. Please take a clearer photo.";
pub const TOO_DARK: &str = "Image is too dark. Take the photo in more light.";
pub const TOO_BRIGHT: &str = "Image is too bright. Avoid strong sunlight or flash.";
pub const SKEWED: &str = "Image is tilted. Hold the phone straight while clicking.";
pub const DOCUMENT_EDGES: &str =
    "Full paper is not visible. Make sure all corners are inside the photo.";

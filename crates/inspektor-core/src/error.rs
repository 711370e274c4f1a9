// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Inspektor.

use thiserror::Error;

/// Top-level error type for all Inspektor operations.
///
/// Quality findings are never errors: they are reported as
/// [`QualityIssue`](crate::types::QualityIssue) values inside the result.
#[derive(Debug, Error)]
pub enum InspektorError {
    // -- Input --
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("invalid analysis options: {0}")]
    InvalidOptions(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Scheduling --
    #[error("worker pool is closed")]
    PoolClosed,

    #[error("worker pool queue stayed full for {timeout_ms} ms")]
    PoolSaturated { timeout_ms: u64 },

    #[error("analysis stage `{stage}` failed: {reason}")]
    StageFailed { stage: String, reason: String },

    // -- Collaborators --
    #[error("OCR failed: {0}")]
    OcrError(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, InspektorError>;

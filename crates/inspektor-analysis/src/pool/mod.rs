// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Concurrency and memory reuse: the bounded worker pool and the scratch
// buffer pools used by the metric kernels.

pub mod scratch;
pub mod worker;

pub use scratch::{Matrix, ObjectPool, Pooled, Recycle, ScratchPools};
pub use worker::{Job, PoolStats, WorkerPool};

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reusable scratch storage for the metric kernels.
//
// Every buffer is reset before it is handed out again, and buffers that grew
// past a pool's size cap are dropped instead of being retained.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use inspektor_core::config::EngineConfig;

/// Storage that can be cleared for reuse.
pub trait Recycle {
    /// Reset contents; allocated capacity may be kept.
    fn recycle(&mut self);

    /// Retained size in elements, compared against the pool cap.
    fn retained_size(&self) -> usize;
}

impl<T> Recycle for Vec<T> {
    fn recycle(&mut self) {
        self.clear();
    }

    fn retained_size(&self) -> usize {
        self.capacity()
    }
}

/// A small set of equally-typed rows (for example the x and y coordinates
/// of edge points).
#[derive(Debug, Default)]
pub struct Matrix {
    rows: Vec<Vec<f64>>,
}

impl Matrix {
    /// Ensure at least `count` rows exist and return them.
    pub fn rows_mut(&mut self, count: usize) -> &mut [Vec<f64>] {
        if self.rows.len() < count {
            self.rows.resize_with(count, Vec::new);
        }
        &mut self.rows[..count]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }
}

impl Recycle for Matrix {
    fn recycle(&mut self) {
        for row in &mut self.rows {
            row.clear();
        }
    }

    fn retained_size(&self) -> usize {
        self.rows.iter().map(Vec::capacity).sum()
    }
}

/// Free list of recyclable values.
pub struct ObjectPool<T> {
    free: Mutex<Vec<T>>,
    make: fn() -> T,
    max_idle: usize,
    max_retained: usize,
}

impl<T: Recycle> ObjectPool<T> {
    /// `max_retained` caps the size (in elements) of a value that may be
    /// returned to the free list.
    pub fn new(make: fn() -> T, max_retained: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            make,
            max_idle: 16,
            max_retained,
        }
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Borrow a value that returns itself to the pool on drop.
    pub fn take(self: &Arc<Self>) -> Pooled<T> {
        Pooled {
            value: Some(self.take_detached()),
            pool: Arc::clone(self),
        }
    }

    /// Take a value with no drop guard; hand it back with [`give`](Self::give).
    pub fn take_detached(&self) -> T {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(self.make)
    }

    pub fn give(&self, mut value: T) {
        value.recycle();
        if value.retained_size() > self.max_retained {
            return;
        }
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(value);
        }
    }

    /// Number of values waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// RAII handle from [`ObjectPool::take`].
pub struct Pooled<T: Recycle> {
    value: Option<T>,
    pool: Arc<ObjectPool<T>>,
}

impl<T: Recycle> Pooled<T> {
    /// Keep the value and skip returning it to the pool.
    pub fn into_inner(mut self) -> T {
        match self.value.take() {
            Some(value) => value,
            None => (self.pool.make)(),
        }
    }
}

impl<T: Recycle> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `into_inner` and `drop` take the value, and both consume the guard.
        self.value.as_ref().unwrap_or_else(|| unreachable!("pooled value taken"))
    }
}

impl<T: Recycle> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().unwrap_or_else(|| unreachable!("pooled value taken"))
    }
}

impl<T: Recycle> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.give(value);
        }
    }
}

/// Largest float slice retained (elements).
pub const MAX_POOLED_FLOATS: usize = 1 << 20;
/// Largest coordinate matrix retained (elements across all rows).
pub const MAX_POOLED_MATRIX: usize = 1 << 20;

/// The scratch pools shared by one analyzer and its metric engine.
pub struct ScratchPools {
    /// Laplacian responses.
    pub floats: Arc<ObjectPool<Vec<f64>>>,
    /// Edge-point coordinates for skew regression.
    pub matrices: Arc<ObjectPool<Matrix>>,
    /// Grayscale pixel bytes. The cap comes from the engine config.
    pub gray: Arc<ObjectPool<Vec<u8>>>,
}

impl ScratchPools {
    pub fn new(max_gray_bytes: usize) -> Self {
        Self {
            floats: Arc::new(ObjectPool::new(Vec::new, MAX_POOLED_FLOATS)),
            matrices: Arc::new(ObjectPool::new(Matrix::default, MAX_POOLED_MATRIX)),
            gray: Arc::new(ObjectPool::new(Vec::new, max_gray_bytes).with_max_idle(4)),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_pooled_gray_bytes)
    }
}

impl Default for ScratchPools {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycled_buffers_come_back_empty() {
        let pool = Arc::new(ObjectPool::<Vec<f64>>::new(Vec::new, 1024));
        {
            let mut buf = pool.take();
            buf.extend_from_slice(&[1.0, 2.0, 3.0]);
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.take();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 3);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn oversized_buffers_are_dropped() {
        let pool = Arc::new(ObjectPool::<Vec<u8>>::new(Vec::new, 16));
        {
            let mut buf = pool.take();
            buf.resize(1024, 0);
        }
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn idle_list_is_bounded() {
        let pool = ObjectPool::<Vec<u8>>::new(Vec::new, 16).with_max_idle(2);
        for _ in 0..5 {
            pool.give(Vec::with_capacity(4));
        }
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn into_inner_detaches_from_pool() {
        let pool = Arc::new(ObjectPool::<Vec<u8>>::new(Vec::new, 16));
        let mut buf = pool.take();
        buf.push(9);
        let owned = buf.into_inner();
        assert_eq!(owned, vec![9]);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn matrix_rows_are_cleared_but_kept() {
        let pool = Arc::new(ObjectPool::<Matrix>::new(Matrix::default, 1024));
        {
            let mut matrix = pool.take();
            let rows = matrix.rows_mut(2);
            rows[0].push(1.0);
            rows[1].extend_from_slice(&[2.0, 3.0]);
        }
        let matrix = pool.take();
        assert_eq!(matrix.rows().len(), 2);
        assert!(matrix.rows().iter().all(Vec::is_empty));
    }

    #[test]
    fn gray_pool_uses_configured_cap() {
        let pools = ScratchPools::new(8);
        pools.gray.give(vec![0u8; 64]);
        assert_eq!(pools.gray.idle(), 0);
        pools.gray.give(Vec::with_capacity(4));
        assert_eq!(pools.gray.idle(), 1);
    }
}

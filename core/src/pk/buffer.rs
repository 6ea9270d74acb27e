use std::{
    ops::Range,
    sync::atomic::{AtomicU64, Ordering},
};

use super::index::index2;

/// The two supermatrices of the PK file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stream {
    /// Coulomb supermatrix
    J,
    /// Exchange supermatrix
    K,
}

/// A window of both supermatrices held in memory while integrals are binned into it.
///
/// Cells are plain `f64` bit patterns inside atomics, so any number of threads can
/// accumulate into one buffer through a shared reference.
#[derive(Debug)]
pub struct PkBuffer {
    start: usize,
    j: Box<[AtomicU64]>,
    k: Box<[AtomicU64]>,
}

impl PkBuffer {
    pub fn new(size: usize) -> Self {
        let zeroed = || (0..size).map(|_| AtomicU64::new(0)).collect::<Box<[_]>>();

        Self {
            start: 0,
            j: zeroed(),
            k: zeroed(),
        }
    }

    pub fn size(&self) -> usize {
        self.j.len()
    }

    /// Global quartet indices this buffer currently accumulates.
    pub fn window(&self) -> Range<usize> {
        self.start..self.start + self.size()
    }

    pub(crate) fn set_start(&mut self, start: usize) {
        self.start = start;
    }

    fn stream(&self, stream: Stream) -> &[AtomicU64] {
        match stream {
            Stream::J => &self.j,
            Stream::K => &self.k,
        }
    }

    /// Atomically add `value` to the cell at global index `index`. Indices outside the
    /// window are ignored.
    #[inline]
    pub fn add(&self, stream: Stream, index: usize, value: f64) {
        let Some(local) = index.checked_sub(self.start) else {
            return;
        };
        let Some(cell) = self.stream(stream).get(local) else {
            return;
        };

        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let updated = (f64::from_bits(current) + value).to_bits();
            match cell.compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// Value at global index `index`, zero outside of the window.
    pub fn get(&self, stream: Stream, index: usize) -> f64 {
        index
            .checked_sub(self.start)
            .and_then(|local| self.stream(stream).get(local))
            .map(|cell| f64::from_bits(cell.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    /// Halve the self-paired elements (pq|pq) inside the window of both streams, which the
    /// symmetric contraction otherwise counts twice.
    pub(crate) fn halve_diagonal(&mut self) {
        let Range { start, end } = self.window();

        let mut pq = 0;
        loop {
            let index = index2(pq, pq);
            if index >= end {
                break;
            }
            if index >= start {
                for cells in [&mut self.j, &mut self.k] {
                    let cell = cells[index - start].get_mut();
                    *cell = (0.5 * f64::from_bits(*cell)).to_bits();
                }
            }
            pq += 1;
        }
    }

    pub(crate) fn zero(&mut self) {
        for cell in self.j.iter_mut().chain(self.k.iter_mut()) {
            *cell.get_mut() = 0;
        }
    }

    /// Little endian bytes of the cells in `local`, relative to the window start.
    pub(crate) fn bytes(&self, stream: Stream, local: Range<usize>) -> Vec<u8> {
        let cells = &self.stream(stream)[local];

        let mut bytes = Vec::with_capacity(cells.len() * std::mem::size_of::<f64>());
        for cell in cells {
            bytes.extend_from_slice(&f64::from_bits(cell.load(Ordering::Relaxed)).to_le_bytes());
        }
        bytes
    }
}

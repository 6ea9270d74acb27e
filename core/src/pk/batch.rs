use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScfError};

use super::index::{pk_pairs, pk_size};

/// A contiguous range of the supermatrix that is stored as one record per stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// First pair row of the batch
    pub pq_min: usize,
    /// Pair row at which the batch ends
    pub pq_max: usize,
    /// First quartet index of the batch
    pub index_min: usize,
    /// One past the last quartet index of the batch
    pub index_max: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.index_max - self.index_min
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.index_min..self.index_max
    }
}

/// Start of the pair row `pq` in the quartet index space. Row `pq` holds `pq + 1` quartets.
const fn row_start(pq: usize) -> usize {
    pq * (pq + 1) / 2
}

/// Split the supermatrix of `n_basis` functions into batches of about `memory` doubles.
///
/// Batches always end at the boundary of a pair row. Every batch but the last holds at most
/// `memory` doubles, the last one can exceed it by its final row. A trailing batch smaller
/// than a tenth of `memory` is merged into its predecessor.
pub fn plan_batches(n_basis: usize, memory: usize, max_batches: usize) -> Result<Vec<Batch>> {
    let pairs = pk_pairs(n_basis);
    if memory < pairs {
        return Err(ScfError::InsufficientMemory {
            memory,
            required: pairs,
        });
    }

    let mut batches = Vec::new();
    let mut pq_min = 0;
    let mut index_min = 0;
    let mut in_batch = 0;

    for pq in 1..pairs {
        // the previous row is accounted for once we reach the next one
        let previous = pq - 1;
        in_batch += previous + 1;

        if in_batch > memory {
            batches.push(Batch {
                pq_min,
                pq_max: previous,
                index_min,
                index_max: row_start(previous),
            });
            pq_min = previous;
            index_min = row_start(previous);
            in_batch = previous + 1;
        }
    }

    batches.push(Batch {
        pq_min,
        pq_max: pairs,
        index_min,
        index_max: pk_size(n_basis),
    });

    if batches.len() > 1 {
        let last = batches[batches.len() - 1];
        if (last.len() as f64) < 0.1 * memory as f64 {
            batches.pop();
            if let Some(previous) = batches.last_mut() {
                log::debug!("merging trailing batch of {} integrals", last.len());
                previous.pq_max = last.pq_max;
                previous.index_max = last.index_max;
            }
        }
    }

    if batches.len() > max_batches {
        return Err(ScfError::TooManyBatches {
            requested: batches.len(),
            maximum: max_batches,
        });
    }

    for (number, batch) in batches.iter().enumerate() {
        log::debug!(
            "batch {number:>4}: pq {:>6} .. {:>6}, index {:>10} .. {:>10}",
            batch.pq_min,
            batch.pq_max,
            batch.index_min,
            batch.index_max
        );
    }

    Ok(batches)
}

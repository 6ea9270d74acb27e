use std::ops::Range;

use crate::integrals::{ShellQuartet, ShellQuartetSource};

use super::{
    buffer::{PkBuffer, Stream},
    index::index4,
};

/// Accumulates integrals into the J and K supermatrix windows of a [`PkBuffer`].
#[derive(Copy, Clone)]
pub struct IntegralBinner<'a> {
    buffer: &'a PkBuffer,
}

impl<'a> IntegralBinner<'a> {
    pub fn new(buffer: &'a PkBuffer) -> Self {
        Self { buffer }
    }

    /// Bin the integral (ij|kl). Safe to call from many threads at once.
    ///
    /// The Coulomb element goes to (ij|kl), the exchange elements to (ik|jl) and (il|jk).
    /// An exchange element that is reached by two permutations of the integral only gets
    /// half of the value from each.
    #[inline]
    pub fn fill(&self, value: f64, i: usize, j: usize, k: usize, l: usize) {
        self.buffer.add(Stream::J, index4(i, j, k, l), value);

        let k1 = if i == k || j == l { value } else { 0.5 * value };
        self.buffer.add(Stream::K, index4(i, k, j, l), k1);

        // for i == j or k == l the second exchange element coincides with the first
        if i != j && k != l {
            let k2 = if i == l || j == k { value } else { 0.5 * value };
            self.buffer.add(Stream::K, index4(i, l, j, k), k2);
        }
    }
}

/// Whether any integral of `quartet` lands in `window` of either supermatrix.
pub fn is_shell_relevant(
    source: &impl ShellQuartetSource,
    quartet: ShellQuartet,
    window: &Range<usize>,
) -> bool {
    if !source.shell_significant(quartet) {
        return false;
    }

    let ShellQuartet { p, q, r, s } = quartet;
    let low = [p, q, r, s].map(|shell| source.shell_to_basis_function(shell));
    let high = [p, q, r, s].map(|shell| {
        source.shell_to_basis_function(shell) + source.shell_size(shell) - 1
    });

    // index4 grows monotonically with every argument, so the corners bound the quartet
    let slots = |[i, j, k, l]: [usize; 4]| {
        [index4(i, j, k, l), index4(i, k, j, l), index4(i, l, j, k)]
    };
    if slots(low).iter().all(|&index| index >= window.end) {
        return false;
    }
    if slots(high).iter().all(|&index| index < window.start) {
        return false;
    }

    let mut relevant = false;
    source.unique_indices(quartet, |_, i, j, k, l| {
        relevant = relevant
            || window.contains(&index4(i, j, k, l))
            || window.contains(&index4(i, k, j, l))
            || (i != j && k != l && window.contains(&index4(i, l, j, k)));
    });
    relevant
}

/// The unique shell quartets that contribute to `window`, in increasing canonical order.
pub fn task_quartets(source: &impl ShellQuartetSource, window: &Range<usize>) -> Vec<ShellQuartet> {
    let quartets = source
        .unique_shell_quartets()
        .into_iter()
        .filter(|&quartet| is_shell_relevant(source, quartet, window))
        .collect::<Vec<_>>();

    log::debug!(
        "{} shell quartets contribute to indices {} .. {}",
        quartets.len(),
        window.start,
        window.end
    );
    quartets
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::{
        integrals::ShellQuartetSource,
        pk::{
            buffer::{PkBuffer, Stream},
            index::{index4, pk_size},
        },
        testing::SyntheticSource,
    };

    use super::{task_quartets, IntegralBinner};

    #[test]
    fn exchange_weights() {
        let buffer = PkBuffer::new(pk_size(4));
        let binner = IntegralBinner::new(&buffer);

        // all four indices distinct: both exchange elements get half
        binner.fill(1.0, 3, 2, 1, 0);
        assert_relative_eq!(buffer.get(Stream::J, index4(3, 2, 1, 0)), 1.0);
        assert_relative_eq!(buffer.get(Stream::K, index4(3, 1, 2, 0)), 0.5);
        assert_relative_eq!(buffer.get(Stream::K, index4(3, 0, 2, 1)), 0.5);

        // (ij|ij): i == k, so (ii|jj) gets the full value and (ij|ji) half of it
        let buffer = PkBuffer::new(pk_size(4));
        IntegralBinner::new(&buffer).fill(2.0, 1, 0, 1, 0);
        assert_relative_eq!(buffer.get(Stream::K, index4(1, 1, 0, 0)), 2.0);
        assert_relative_eq!(buffer.get(Stream::K, index4(1, 0, 0, 1)), 1.0);

        // (ii|kk) has a single exchange element
        let buffer = PkBuffer::new(pk_size(4));
        IntegralBinner::new(&buffer).fill(4.0, 2, 2, 1, 1);
        assert_relative_eq!(buffer.get(Stream::J, index4(2, 2, 1, 1)), 4.0);
        assert_relative_eq!(buffer.get(Stream::K, index4(2, 1, 2, 1)), 2.0);
    }

    #[test]
    fn relevant_quartets_cover_every_slot() {
        let source = SyntheticSource::new(&[2, 1, 3]);
        let size = pk_size(source.n_basis());

        for window_size in [1, 7, 40] {
            for start in (0..size).step_by(window_size) {
                let window = start..start + window_size;
                let relevant = task_quartets(&source, &window);

                for quartet in source.unique_shell_quartets() {
                    let mut values = Vec::new();
                    source.compute_shell_quartet(quartet, &mut values);

                    let mut scratch = PkBuffer::new(window_size);
                    scratch.set_start(start);
                    let binner = IntegralBinner::new(&scratch);
                    source.unique_integrals(quartet, &values, |value, i, j, k, l| {
                        binner.fill(value, i, j, k, l)
                    });

                    let touched = window.clone().any(|index| {
                        scratch.get(Stream::J, index) != 0.0 || scratch.get(Stream::K, index) != 0.0
                    });
                    if touched {
                        assert!(relevant.contains(&quartet), "{quartet} missing for {window:?}");
                    }
                }
            }
        }
    }
}

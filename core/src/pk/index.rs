//! Triangular addressing of basis function pairs and quartets.

/// Canonical index of the unordered pair (p, q).
#[inline(always)]
pub const fn index2(p: usize, q: usize) -> usize {
    let (max, min) = if p >= q { (p, q) } else { (q, p) };
    max * (max + 1) / 2 + min
}

/// Canonical index of the quartet (pq|rs), invariant under all eight permutations
/// that leave the integral unchanged.
#[inline(always)]
pub const fn index4(i: usize, j: usize, k: usize, l: usize) -> usize {
    index2(index2(i, j), index2(k, l))
}

/// Number of unique basis function pairs
pub const fn pk_pairs(n_basis: usize) -> usize {
    n_basis * (n_basis + 1) / 2
}

/// Number of unique quartets, i.e. the length of one supermatrix
pub const fn pk_size(n_basis: usize) -> usize {
    let pairs = pk_pairs(n_basis);
    pairs * (pairs + 1) / 2
}

/// Walks the unique quartets (ij|kl) with i >= j, k >= l and ij >= kl.
///
/// Quartets come out in increasing order of [`index4`], which therefore enumerates
/// 0, 1, 2, ...
#[derive(Clone, Debug)]
pub struct UniqueQuartets {
    n_basis: usize,
    next: Option<(usize, usize, usize, usize)>,
}

impl UniqueQuartets {
    pub fn new(n_basis: usize) -> Self {
        Self {
            n_basis,
            next: (n_basis > 0).then_some((0, 0, 0, 0)),
        }
    }
}

impl Iterator for UniqueQuartets {
    type Item = (usize, usize, usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let current @ (i, j, k, l) = self.next?;

        let l_max = if k == i { j } else { k };
        self.next = if l < l_max {
            Some((i, j, k, l + 1))
        } else if k < i {
            Some((i, j, k + 1, 0))
        } else if j < i {
            Some((i, j + 1, 0, 0))
        } else if i + 1 < self.n_basis {
            Some((i + 1, 0, 0, 0))
        } else {
            None
        };

        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::{index2, index4, pk_pairs, pk_size, UniqueQuartets};

    #[test]
    fn pair_index() {
        assert_eq!(index2(0, 0), 0);
        assert_eq!(index2(1, 0), 1);
        assert_eq!(index2(1, 1), 2);
        assert_eq!(index2(3, 0), 6);
        assert_eq!(index2(2, 5), index2(5, 2));
        assert_eq!(pk_pairs(4), 10);
        assert_eq!(pk_size(4), 55);
    }

    #[test]
    fn permutational_symmetry() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..1000 {
            let [i, j, k, l] = [(); 4].map(|_| rng.gen_range(0..40));
            let expected = index4(i, j, k, l);

            assert_eq!(index4(j, i, k, l), expected);
            assert_eq!(index4(i, j, l, k), expected);
            assert_eq!(index4(j, i, l, k), expected);
            assert_eq!(index4(k, l, i, j), expected);
            assert_eq!(index4(l, k, i, j), expected);
            assert_eq!(index4(k, l, j, i), expected);
            assert_eq!(index4(l, k, j, i), expected);
        }
    }

    #[test]
    fn unique_quartets_enumerate_the_index_space() {
        for n_basis in 1..8 {
            let mut count = 0;
            for (expected, (i, j, k, l)) in UniqueQuartets::new(n_basis).enumerate() {
                assert!(i >= j && k >= l);
                assert_eq!(index4(i, j, k, l), expected);
                count += 1;
            }
            assert_eq!(count, pk_size(n_basis));
        }

        assert_eq!(UniqueQuartets::new(0).count(), 0);
    }
}

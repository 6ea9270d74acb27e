use std::ops::Index;

use crate::pk::index::index2;

use super::{ShellQuartet, ShellQuartetSource};

/// An integral index used in the two-electron integrals of a basis set.
///
/// The index represents the four indices (x, y, z, w) used to calculate a two-electron integral:
///   int_{x,y,z,w} = int_{xy|zw} = <x y | z w>
///
/// Since two-electron integrals are symmetric under the exchange of x and y, z and w, and the
/// pairs (xy) and (zw), this struct stores its indices in canonical order: x >= y, z >= w and
/// xy >= zw, reducing the total number of unique integrals to store.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct IntegralIndex(usize, usize, usize, usize);

impl IntegralIndex {
    /// Creates a new integral index with the given indices.
    pub(crate) const fn new(index: (usize, usize, usize, usize)) -> Self {
        let (i, j, k, l) = Self::correct_order(index);
        Self(i, j, k, l)
    }

    /// Returns the indices in canonical order.
    #[inline(always)]
    const fn correct_order(
        (i, j, k, l): (usize, usize, usize, usize),
    ) -> (usize, usize, usize, usize) {
        let (i, j) = if i >= j { (i, j) } else { (j, i) };
        let (k, l) = if k >= l { (k, l) } else { (l, k) };

        if index2(i, j) >= index2(k, l) {
            (i, j, k, l)
        } else {
            (k, l, i, j)
        }
    }

    pub fn linear(&self, size: usize) -> usize {
        let &Self(i, j, k, l) = self;
        l * size.pow(3) + k * size.pow(2) + j * size + i
    }
}

impl std::fmt::Display for IntegralIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let &Self(i, j, k, l) = self;
        write!(f, "({} {}|{} {})", i, j, k, l)
    }
}

/// Dense in-memory store of the electron-electron repulsion integrals of a basis.
///
/// Only meant for small bases, e.g. a single atom: storage grows with the fourth power
/// of the number of basis functions.
pub struct ElectronTensor {
    data: Vec<f64>,
    /// side length
    size: usize,
}

impl ElectronTensor {
    /// Collects every significant shell quartet of `source`. Quartets are evaluated in
    /// parallel when the `rayon` feature is enabled.
    pub fn from_source(source: &impl ShellQuartetSource) -> Self {
        let n_basis = source.n_basis();
        let mut data = vec![0.0; n_basis.pow(4)];

        let quartets = source
            .unique_shell_quartets()
            .into_iter()
            .filter(|&quartet| source.shell_significant(quartet))
            .collect::<Vec<_>>();

        let compute = |quartet: ShellQuartet| {
            let mut values = Vec::new();
            source.compute_shell_quartet(quartet, &mut values);
            (quartet, values)
        };

        #[cfg(feature = "rayon")]
        let computed = {
            use rayon::iter::{IntoParallelIterator, ParallelIterator};
            quartets.into_par_iter().map(compute).collect::<Vec<_>>()
        };

        #[cfg(not(feature = "rayon"))]
        let computed = quartets.into_iter().map(compute).collect::<Vec<_>>();

        for (quartet, values) in computed {
            source.unique_integrals(quartet, &values, |value, i, j, k, l| {
                let index = IntegralIndex::new((i, j, k, l));
                log::trace!("ERI {index} = {value:<1.8}");
                data[index.linear(n_basis)] = value;
            });
        }

        Self {
            data,
            size: n_basis,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Index<(usize, usize, usize, usize)> for ElectronTensor {
    type Output = f64;

    fn index(&self, index: (usize, usize, usize, usize)) -> &Self::Output {
        let index = IntegralIndex::new(index);
        let linear = index.linear(self.size);
        &self.data[linear]
    }
}

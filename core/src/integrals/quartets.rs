use crate::{basis::MolecularBasis, pk::index::index2};

use super::{DefaultIntegrator, Integrator};

/// Four shell indices (P Q | R S).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShellQuartet {
    pub p: usize,
    pub q: usize,
    pub r: usize,
    pub s: usize,
}

impl ShellQuartet {
    pub const fn new(p: usize, q: usize, r: usize, s: usize) -> Self {
        Self { p, q, r, s }
    }
}

impl std::fmt::Display for ShellQuartet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {}|{} {})", self.p, self.q, self.r, self.s)
    }
}

/// Producer of two-electron integrals grouped by shell quartets.
///
/// Shells have to be numbered such that the basis functions of shell `n + 1` directly follow
/// the ones of shell `n`.
pub trait ShellQuartetSource: Sync {
    fn n_shells(&self) -> usize;

    fn n_basis(&self) -> usize;

    /// Index of the first basis function of a shell
    fn shell_to_basis_function(&self, shell: usize) -> usize;

    /// Number of basis functions in a shell
    fn shell_size(&self, shell: usize) -> usize;

    /// Whether a quartet can hold integrals above the screening threshold
    fn shell_significant(&self, quartet: ShellQuartet) -> bool;

    /// Compute all integrals of a quartet into `values`, stored row-major over the functions
    /// of P, Q, R and S.
    fn compute_shell_quartet(&self, quartet: ShellQuartet, values: &mut Vec<f64>);

    /// All quartets with P >= Q, R >= S and PQ >= RS, in increasing order of their
    /// canonical index.
    fn unique_shell_quartets(&self) -> Vec<ShellQuartet> {
        let n = self.n_shells();
        let mut quartets = Vec::new();

        for p in 0..n {
            for q in 0..=p {
                for r in 0..=p {
                    let s_max = if r == p { q } else { r };
                    for s in 0..=s_max {
                        quartets.push(ShellQuartet::new(p, q, r, s));
                    }
                }
            }
        }
        quartets
    }

    /// Visit every symmetry unique function quartet (ij|kl) of a shell quartet once, as
    /// `f(position, i, j, k, l)` where `position` indexes the values of
    /// [`ShellQuartetSource::compute_shell_quartet`].
    ///
    /// Only quartets of [`ShellQuartetSource::unique_shell_quartets`] are expected here.
    fn unique_indices(
        &self,
        quartet: ShellQuartet,
        mut f: impl FnMut(usize, usize, usize, usize, usize),
    ) where
        Self: Sized,
    {
        let ShellQuartet { p, q, r, s } = quartet;
        let [size_p, size_q, size_r, size_s] = [p, q, r, s].map(|shell| self.shell_size(shell));
        let [base_p, base_q, base_r, base_s] =
            [p, q, r, s].map(|shell| self.shell_to_basis_function(shell));
        let same_pair = p == r && q == s;

        let mut position = 0;
        for i in base_p..base_p + size_p {
            for j in base_q..base_q + size_q {
                for k in base_r..base_r + size_r {
                    for l in base_s..base_s + size_s {
                        let current = position;
                        position += 1;

                        if (p == q && j > i) || (r == s && l > k) {
                            continue;
                        }
                        if same_pair && index2(k, l) > index2(i, j) {
                            continue;
                        }
                        f(current, i, j, k, l);
                    }
                }
            }
        }
    }

    /// Like [`ShellQuartetSource::unique_indices`], passing the integral value to
    /// `f(value, i, j, k, l)`.
    fn unique_integrals(
        &self,
        quartet: ShellQuartet,
        values: &[f64],
        mut f: impl FnMut(f64, usize, usize, usize, usize),
    ) where
        Self: Sized,
    {
        self.unique_indices(quartet, |position, i, j, k, l| f(values[position], i, j, k, l));
    }
}

/// Integrals over the shells of a [`MolecularBasis`], screened with the Schwarz inequality.
pub struct BasisQuartetSource<'a, I = DefaultIntegrator> {
    basis: &'a MolecularBasis,
    integrator: I,
    cutoff: f64,
    /// sqrt(max |(PQ|PQ)|) for every shell pair, indexed by index2(P, Q)
    schwarz: Vec<f64>,
}

impl<'a> BasisQuartetSource<'a> {
    pub fn new(basis: &'a MolecularBasis, cutoff: f64) -> Self {
        Self::with_integrator(basis, DefaultIntegrator::default(), cutoff)
    }
}

impl<'a, I> BasisQuartetSource<'a, I>
where
    I: Integrator<Function = crate::basis::BasisFunction> + Sync,
{
    pub fn with_integrator(basis: &'a MolecularBasis, integrator: I, cutoff: f64) -> Self {
        let mut source = Self {
            basis,
            integrator,
            cutoff,
            schwarz: Vec::new(),
        };

        if cutoff > 0.0 {
            let n_shells = source.n_shells();
            let mut values = Vec::new();
            let mut schwarz = vec![0.0; n_shells * (n_shells + 1) / 2];

            for p in 0..n_shells {
                for q in 0..=p {
                    source.compute_shell_quartet(ShellQuartet::new(p, q, p, q), &mut values);
                    let size_pq = source.shell_size(p) * source.shell_size(q);

                    // diagonal elements (ab|ab) sit at stride size_pq + 1
                    let max = values
                        .iter()
                        .step_by(size_pq + 1)
                        .fold(0.0_f64, |max, value| max.max(value.abs()));
                    schwarz[index2(p, q)] = max.sqrt();
                }
            }

            log::debug!("schwarz estimates: {schwarz:?}");
            source.schwarz = schwarz;
        }

        source
    }

    pub fn basis(&self) -> &MolecularBasis {
        self.basis
    }
}

impl<I> ShellQuartetSource for BasisQuartetSource<'_, I>
where
    I: Integrator<Function = crate::basis::BasisFunction> + Sync,
{
    fn n_shells(&self) -> usize {
        self.basis.shells().len()
    }

    fn n_basis(&self) -> usize {
        self.basis.n_basis()
    }

    fn shell_to_basis_function(&self, shell: usize) -> usize {
        self.basis.shells()[shell].first_function()
    }

    fn shell_size(&self, shell: usize) -> usize {
        self.basis.shells()[shell].n_functions()
    }

    fn shell_significant(&self, quartet: ShellQuartet) -> bool {
        if self.schwarz.is_empty() {
            return true;
        }

        let ShellQuartet { p, q, r, s } = quartet;
        self.schwarz[index2(p, q)] * self.schwarz[index2(r, s)] >= self.cutoff
    }

    fn compute_shell_quartet(&self, quartet: ShellQuartet, values: &mut Vec<f64>) {
        let shells = self.basis.shells();
        let ShellQuartet { p, q, r, s } = quartet;

        values.clear();
        for a in shells[p].functions() {
            for b in shells[q].functions() {
                for c in shells[r].functions() {
                    for d in shells[s].functions() {
                        values.push(self.integrator.electron_repulsion((a, b, c, d)));
                    }
                }
            }
        }
        log::trace!("computed quartet {quartet}");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::{
        basis::MolecularBasis,
        pk::index::{index4, pk_size},
        testing::{self, SIX_31G},
    };

    use super::{BasisQuartetSource, ShellQuartetSource};

    #[test]
    fn unique_integrals_cover_index_space_once() {
        let molecule = crate::molecule! {
            O => (0.0, 0.0, 0.0),
            H => (0.0, 1.43, 1.1),
            H => (0.0, -1.43, 1.1)
        };
        let basis = MolecularBasis::new(&molecule, &testing::basis_set(SIX_31G)).unwrap();
        let source = BasisQuartetSource::new(&basis, 0.0);

        let mut seen = HashSet::new();
        for quartet in source.unique_shell_quartets() {
            let size = [quartet.p, quartet.q, quartet.r, quartet.s]
                .map(|shell| source.shell_size(shell))
                .iter()
                .product();
            // values are irrelevant for the bookkeeping
            let values = vec![0.0; size];
            source.unique_integrals(quartet, &values, |_, i, j, k, l| {
                assert!(seen.insert(index4(i, j, k, l)), "({i}{j}|{k}{l}) visited twice");
            });
        }

        assert_eq!(seen.len(), pk_size(source.n_basis()));
    }

    #[test]
    fn schwarz_screening_drops_distant_pairs() {
        let molecule = crate::molecule! {
            H => (0.0, 0.0, 0.0),
            H => (0.0, 0.0, 60.0)
        };
        let basis = MolecularBasis::new(&molecule, &testing::basis_set(testing::STO_3G)).unwrap();

        let unscreened = BasisQuartetSource::new(&basis, 0.0);
        let screened = BasisQuartetSource::new(&basis, 1e-10);

        let significant = |source: &BasisQuartetSource| {
            source
                .unique_shell_quartets()
                .into_iter()
                .filter(|&quartet| source.shell_significant(quartet))
                .count()
        };

        assert_eq!(significant(&unscreened), 6);
        // (10|10), (10|00), (11|10) vanish, the Coulomb quartets stay
        assert_eq!(significant(&screened), 3);
    }
}

use std::cmp::Ordering;

use crate::error::{Result, ScfError};

/// Electron counts of a molecule in a given charge and spin state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ElectronConfig {
    pub n_electrons: usize,
    pub multiplicity: u32,
    pub n_alpha: usize,
    pub n_beta: usize,
}

impl ElectronConfig {
    /// Validate charge and multiplicity against the nuclear charge. Without an explicit
    /// multiplicity, odd electron counts become doublets and even ones singlets.
    pub fn new(nuclear_charge: i64, charge: i32, multiplicity: Option<u32>) -> Result<Self> {
        let electrons = nuclear_charge - charge as i64;
        let multiplicity = multiplicity.unwrap_or(if electrons % 2 == 1 { 2 } else { 1 });

        if electrons < 0 || multiplicity == 0 || (multiplicity as i64 - 1) > electrons {
            return Err(ScfError::NotEnoughElectrons {
                multiplicity,
                electrons,
            });
        }
        if multiplicity as i64 % 2 == electrons % 2 {
            return Err(ScfError::ImpossibleMultiplicity {
                multiplicity,
                electrons,
            });
        }

        let n_electrons = electrons as usize;
        let n_beta = (n_electrons + 1 - multiplicity as usize) / 2;
        let n_alpha = n_beta + multiplicity as usize - 1;

        log::info!(
            "{n_electrons} electrons, multiplicity {multiplicity}: {n_alpha} alpha, {n_beta} beta"
        );

        Ok(Self {
            n_electrons,
            multiplicity,
            n_alpha,
            n_beta,
        })
    }
}

/// Occupied orbitals per symmetry block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Occupation {
    pub docc: Vec<usize>,
    pub socc: Vec<usize>,
}

impl Occupation {
    /// Fill the lowest `n_beta` orbitals doubly and the next `n_alpha - n_beta` singly.
    ///
    /// Orbitals of all blocks are ordered by energy, equal energies by block index.
    pub fn aufbau(energies: &[&[f64]], n_alpha: usize, n_beta: usize) -> Self {
        let docc = lowest_per_block(energies, n_beta);
        let occupied = lowest_per_block(energies, n_alpha);
        let socc = occupied
            .iter()
            .zip(&docc)
            .map(|(alpha, beta)| alpha - beta)
            .collect();

        Self { docc, socc }
    }

    /// Aufbau with separate alpha and beta orbital energies, as in UHF.
    pub fn aufbau_unrestricted(
        alpha_energies: &[&[f64]],
        beta_energies: &[&[f64]],
        n_alpha: usize,
        n_beta: usize,
    ) -> Self {
        let docc = lowest_per_block(beta_energies, n_beta);
        let socc = lowest_per_block(alpha_energies, n_alpha)
            .iter()
            .zip(&docc)
            .map(|(alpha, beta)| alpha.saturating_sub(*beta))
            .collect();

        Self { docc, socc }
    }

    /// An occupation given in the input. Blocks must match and fit into the basis.
    pub fn pinned(
        docc: Option<&[usize]>,
        socc: Option<&[usize]>,
        block_sizes: &[usize],
    ) -> Result<Self> {
        let zeros = vec![0; block_sizes.len()];
        let docc = docc.unwrap_or(&zeros).to_vec();
        let socc = socc.unwrap_or(&zeros).to_vec();

        for (name, counts) in [("DOCC", &docc), ("SOCC", &socc)] {
            if counts.len() != block_sizes.len() {
                return Err(ScfError::InvalidOccupation(format!(
                    "{name} has {} entries, there are {} symmetry blocks",
                    counts.len(),
                    block_sizes.len()
                )));
            }
        }

        for (block, (&size, (&d, &s))) in block_sizes.iter().zip(docc.iter().zip(&socc)).enumerate() {
            if d + s > size {
                return Err(ScfError::InvalidOccupation(format!(
                    "block {block} has {size} orbitals, {d} doubly and {s} singly occupied requested"
                )));
            }
        }

        Ok(Self { docc, socc })
    }

    pub fn n_alpha(&self) -> usize {
        self.docc.iter().sum::<usize>() + self.socc.iter().sum::<usize>()
    }

    pub fn n_beta(&self) -> usize {
        self.docc.iter().sum()
    }

    /// Occupied alpha orbitals in each block.
    pub fn alpha(&self) -> Vec<usize> {
        self.docc.iter().zip(&self.socc).map(|(d, s)| d + s).collect()
    }

    /// Occupied beta orbitals in each block.
    pub fn beta(&self) -> Vec<usize> {
        self.docc.clone()
    }
}

/// How many of the `count` lowest orbitals over all blocks fall into each block.
fn lowest_per_block(energies: &[&[f64]], count: usize) -> Vec<usize> {
    let mut orbitals = energies
        .iter()
        .enumerate()
        .flat_map(|(block, values)| values.iter().map(move |&value| (value, block)))
        .collect::<Vec<_>>();

    orbitals.sort_by(|(a, block_a), (b, block_b)| match a.total_cmp(b) {
        Ordering::Equal => block_a.cmp(block_b),
        other => other,
    });

    let mut per_block = vec![0; energies.len()];
    for &(_, block) in orbitals.iter().take(count) {
        per_block[block] += 1;
    }
    per_block
}

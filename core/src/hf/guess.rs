use std::collections::HashMap;

use nalgebra::DMatrix;

use crate::{
    basis::MolecularBasis,
    error::{Result, ScfError},
    integrals::{
        one_electron::{compute_kinetic_matrix, compute_nuclear_matrix, compute_overlap_matrix},
        BasisQuartetSource, DefaultIntegrator, ElectronTensor,
    },
    periodic_table::ElementType,
};

use super::utils;

/// Result of an atomic UHF calculation.
#[derive(Debug, Clone)]
pub struct AtomicGuess {
    /// Spin summed density Dα + Dβ
    pub density: DMatrix<f64>,
    pub energy: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Unrestricted Hartree-Fock for a single atom, used to build superposition of atomic
/// densities guesses.
///
/// Integrals are held in memory and contracted with explicit four index loops, which is
/// fine for the size of atomic bases.
pub struct AtomicGuessSolver<'a> {
    basis: &'a MolecularBasis,
    n_alpha: usize,
    n_beta: usize,
}

impl<'a> AtomicGuessSolver<'a> {
    pub const MAX_ITERATIONS: usize = 50;
    pub const ENERGY_THRESHOLD: f64 = 1e-5;
    pub const DENSITY_THRESHOLD: f64 = 1e-5;
    /// Overlap eigenvalues below this are treated as linear dependencies
    const LINEAR_DEPENDENCE: f64 = 1e-10;

    /// `n_high` is the number of unpaired electrons, nα - nβ.
    pub fn new(basis: &'a MolecularBasis, n_electrons: usize, n_high: usize) -> Result<Self> {
        if basis.atoms().len() != 1 {
            return Err(ScfError::MultipleAtoms {
                atoms: basis.atoms().len(),
            });
        }
        if n_high > n_electrons || (n_electrons - n_high) % 2 != 0 {
            return Err(ScfError::InvalidOccupation(format!(
                "{n_high} unpaired electrons are impossible with {n_electrons} electrons"
            )));
        }

        let n_beta = (n_electrons - n_high) / 2;
        let n_alpha = n_electrons - n_beta;
        if n_alpha > basis.n_basis() {
            return Err(ScfError::InvalidOccupation(format!(
                "{n_alpha} alpha electrons do not fit into {} basis functions",
                basis.n_basis()
            )));
        }

        Ok(Self {
            basis,
            n_alpha,
            n_beta,
        })
    }

    pub fn solve(&self) -> AtomicGuess {
        let integrator = DefaultIntegrator::default();
        let functions = self.basis.functions();
        let n = self.basis.n_basis();

        let overlap = compute_overlap_matrix(functions, &integrator);
        let core_hamiltonian = compute_kinetic_matrix(functions, &integrator)
            + compute_nuclear_matrix(functions, self.basis.atoms(), &integrator);
        let orthogonalizer = utils::symmetric_power(&overlap, -0.5, Self::LINEAR_DEPENDENCE);
        let electron = ElectronTensor::from_source(&BasisQuartetSource::new(self.basis, 0.0));

        let (coefficients, _) = utils::orthogonal_eigs(&core_hamiltonian, &orthogonalizer);
        let mut density_alpha = utils::occupied_density(&coefficients, self.n_alpha);
        let mut density_beta = utils::occupied_density(&coefficients, self.n_beta);
        let mut density = &density_alpha + &density_beta;

        let mut energy = 0.0;

        for iteration in 1..=Self::MAX_ITERATIONS {
            let mut g_alpha = DMatrix::zeros(n, n);
            let mut g_beta = DMatrix::zeros(n, n);
            for (m, v, l, s) in itertools::iproduct!(0..n, 0..n, 0..n, 0..n) {
                let coulomb = electron[(m, v, l, s)];
                let exchange = electron[(m, l, v, s)];
                g_alpha[(m, v)] += density[(l, s)] * coulomb - density_alpha[(l, s)] * exchange;
                g_beta[(m, v)] += density[(l, s)] * coulomb - density_beta[(l, s)] * exchange;
            }

            let fock_alpha = &core_hamiltonian + g_alpha;
            let fock_beta = &core_hamiltonian + g_beta;

            let previous_energy = energy;
            energy = 0.5
                * (density.dot(&core_hamiltonian)
                    + density_alpha.dot(&fock_alpha)
                    + density_beta.dot(&fock_beta));

            let (coefficients_alpha, _) = utils::orthogonal_eigs(&fock_alpha, &orthogonalizer);
            let (coefficients_beta, _) = utils::orthogonal_eigs(&fock_beta, &orthogonalizer);
            density_alpha = utils::occupied_density(&coefficients_alpha, self.n_alpha);
            density_beta = utils::occupied_density(&coefficients_beta, self.n_beta);

            let new_density = &density_alpha + &density_beta;
            let density_rms = ((&new_density - &density).norm_squared() / n as f64).sqrt();
            let energy_change = (energy - previous_energy).abs();
            density = new_density;

            log::debug!(
                "atomic UHF iteration {iteration:<3} energy {energy:.10} dE {energy_change:.3e} drms {density_rms:.3e}"
            );

            if iteration > 1
                && energy_change < Self::ENERGY_THRESHOLD
                && density_rms < Self::DENSITY_THRESHOLD
            {
                return AtomicGuess {
                    density,
                    energy,
                    iterations: iteration,
                    converged: true,
                };
            }
        }

        log::warn!(
            "atomic UHF did not converge in {} iterations, using the last density",
            Self::MAX_ITERATIONS
        );
        AtomicGuess {
            density,
            energy,
            iterations: Self::MAX_ITERATIONS,
            converged: false,
        }
    }
}

/// Superposition of neutral atomic densities, one atomic calculation per element.
///
/// The molecular density is block diagonal over atoms. Each atom gets the ground state
/// spin of its bare element, with Z mod 2 unpaired electrons.
pub fn superposition_of_atomic_densities(basis: &MolecularBasis) -> Result<DMatrix<f64>> {
    let n = basis.n_basis();
    let mut density = DMatrix::zeros(n, n);
    let mut solved: HashMap<ElementType, DMatrix<f64>> = HashMap::new();

    for (index, atom) in basis.atoms().iter().enumerate() {
        let range = basis.atom_function_range(index);
        if range.is_empty() {
            continue;
        }

        let element = atom.element_type();
        if !solved.contains_key(&element) {
            let atomic_basis = basis.for_atom(index);
            let z = atom.nuclear_charge() as usize;
            let guess = AtomicGuessSolver::new(&atomic_basis, z, z % 2)?.solve();

            log::info!(
                "atomic guess for {element:?}: energy {:.10} after {} iterations",
                guess.energy,
                guess.iterations
            );
            solved.insert(element, guess.density);
        }
        let block = &solved[&element];

        density
            .view_mut((range.start, range.start), (range.len(), range.len()))
            .copy_from(block);
    }

    Ok(density)
}

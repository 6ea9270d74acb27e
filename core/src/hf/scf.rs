use nalgebra::{DMatrix, DVector, Vector3};

use crate::{
    basis::MolecularBasis,
    config::{GuessKind, Reference, ScfOptions},
    diis::Diis,
    error::{Result, ScfError},
    integrals::{
        one_electron::{
            compute_dipole_matrices, compute_kinetic_matrix, compute_nuclear_matrix,
            compute_overlap_matrix, compute_quadrupole_matrices,
        },
        BasisQuartetSource, DefaultIntegrator,
    },
    molecule::Molecule,
};

use super::{
    guess::superposition_of_atomic_densities,
    jk::{DirectJk, JkBuilder, PkJk},
    mo::{DensityGrid, MolecularOrbitals},
    occupation::{ElectronConfig, Occupation},
    utils,
};

/// Grid settings used for SAVE_CARTESIAN_GRID, in bohr
const GRID_SPACING: f64 = 0.2;
const GRID_PADDING: f64 = 4.0;

/// Where an [`ScfEngine`] is in its calculation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScfState {
    Init,
    Guess,
    Iterating,
    Converged,
    Failed,
}

/// Whether the thresholds were met. Results are returned either way.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScfStatus {
    Converged,
    NotConverged,
}

/// Orbitals of one spin.
#[derive(Debug, Clone)]
pub struct SpinOrbitals {
    /// Ascending
    pub energies: DVector<f64>,
    /// One orbital per column
    pub coefficients: DMatrix<f64>,
    pub density: DMatrix<f64>,
}

#[derive(Debug, Clone)]
pub struct ScfOutput {
    pub status: ScfStatus,
    pub reference: Reference,
    pub total_energy: f64,
    pub electronic_energy: f64,
    pub nuclear_repulsion: f64,
    pub iterations: usize,
    pub energy_change: f64,
    pub density_rms: f64,
    pub alpha: SpinOrbitals,
    /// Equal to `alpha` for RHF
    pub beta: SpinOrbitals,
    pub occupation: Occupation,
    /// Nuclear plus electronic dipole moment about the origin
    pub dipole: Vector3<f64>,
    /// Cartesian second moments about the origin, nuclear plus electronic, in the order
    /// xx, xy, xz, yy, yz, zz
    pub quadrupole: [f64; 6],
    /// Löwdin atomic charges
    pub charges: Vec<f64>,
    pub density_grid: Option<DensityGrid>,
}

impl ScfOutput {
    pub fn total_density(&self) -> DMatrix<f64> {
        &self.alpha.density + &self.beta.density
    }

    /// Electron density of the occupied orbitals on a grid around the atoms.
    pub fn density_grid(&self, basis: &MolecularBasis, spacing: f64, padding: f64) -> DensityGrid {
        let orbitals = [
            MolecularOrbitals::from_matrix(&self.alpha.coefficients, self.occupation.n_alpha()),
            MolecularOrbitals::from_matrix(&self.beta.coefficients, self.occupation.n_beta()),
        ];
        let centers = basis
            .atoms()
            .iter()
            .map(|atom| *atom.position())
            .collect::<Vec<_>>();

        DensityGrid::sample(basis.functions(), &centers, &orbitals, spacing, padding)
    }
}

/// One electron quantities fixed during the iterations.
struct OneElectron {
    overlap: DMatrix<f64>,
    core_hamiltonian: DMatrix<f64>,
    dipoles: [DMatrix<f64>; 3],
    quadrupoles: [DMatrix<f64>; 6],
    /// S^-1/2
    orthogonalizer: DMatrix<f64>,
    /// S^+1/2
    overlap_root: DMatrix<f64>,
}

/// Hartree-Fock self consistent field driver for RHF and UHF references.
pub struct ScfEngine<'a> {
    molecule: &'a Molecule,
    basis: &'a MolecularBasis,
    options: ScfOptions,
    electrons: ElectronConfig,
    pinned: Option<Occupation>,
    state: ScfState,
    initial_density: Option<[DMatrix<f64>; 2]>,
}

impl<'a> ScfEngine<'a> {
    /// Validate the electronic state. Fails before any integral is computed.
    pub fn new(molecule: &'a Molecule, basis: &'a MolecularBasis, options: ScfOptions) -> Result<Self> {
        let electrons = ElectronConfig::new(
            molecule.total_nuclear_charge(),
            options.charge,
            options.multiplicity,
        )?;

        let pinned = if options.docc.is_some() || options.socc.is_some() {
            let occupation = Occupation::pinned(
                options.docc.as_deref(),
                options.socc.as_deref(),
                &[basis.n_basis()],
            )?;
            log::info!(
                "using pinned occupation DOCC {:?} SOCC {:?}",
                occupation.docc,
                occupation.socc
            );
            Some(occupation)
        } else {
            None
        };

        let (n_alpha, n_beta) = pinned
            .as_ref()
            .map(|occupation| (occupation.n_alpha(), occupation.n_beta()))
            .unwrap_or((electrons.n_alpha, electrons.n_beta));

        if options.reference == Reference::Rhf && n_alpha != n_beta {
            return Err(ScfError::InvalidOccupation(format!(
                "RHF needs paired electrons, got {n_alpha} alpha and {n_beta} beta"
            )));
        }
        if n_alpha > basis.n_basis() {
            return Err(ScfError::InvalidOccupation(format!(
                "{n_alpha} alpha electrons do not fit into {} basis functions",
                basis.n_basis()
            )));
        }
        if options.max_iterations == 0 {
            return Err(ScfError::Config("MAXITER has to be at least 1".into()));
        }
        if options.direct && options.ri_hf {
            log::warn!("DIRECT is ignored together with RI_HF, integrals are stored");
        }

        Ok(Self {
            molecule,
            basis,
            options,
            electrons,
            pinned,
            state: ScfState::Init,
            initial_density: None,
        })
    }

    /// Start from a known alpha and beta density instead of a guess.
    pub fn with_initial_density(mut self, alpha: DMatrix<f64>, beta: DMatrix<f64>) -> Self {
        self.initial_density = Some([alpha, beta]);
        self
    }

    pub fn state(&self) -> ScfState {
        self.state
    }

    pub fn electrons(&self) -> &ElectronConfig {
        &self.electrons
    }

    fn transition(&mut self, next: ScfState) {
        log::debug!("SCF {:?} -> {next:?}", self.state);
        self.state = next;
    }

    pub fn run(&mut self) -> Result<ScfOutput> {
        let output = self.iterate();
        if output.is_err() {
            self.transition(ScfState::Failed);
        }
        output
    }

    fn iterate(&mut self) -> Result<ScfOutput> {
        let basis = self.basis;
        let n = basis.n_basis();
        let restricted = self.options.reference == Reference::Rhf;
        let nuclear_repulsion = self.molecule.nuclear_repulsion();
        log::info!("nuclear repulsion energy: {nuclear_repulsion:.12}");

        let one = self.one_electron();
        let source = BasisQuartetSource::new(basis, self.options.schwarz_cutoff);
        let mut jk: Box<dyn JkBuilder + '_> = if self.options.use_direct() {
            log::info!("two electron integrals are computed directly");
            Box::new(DirectJk::new(&source))
        } else {
            Box::new(PkJk::build(
                &source,
                self.options.pk_config(),
                self.options.pk_file.clone(),
            )?)
        };

        self.transition(ScfState::Guess);
        let mut densities = match self.initial_density.take() {
            Some(densities) => {
                log::info!("starting from the supplied density");
                densities
            }
            None => self.guess(&one)?,
        };
        let mut energy =
            nuclear_repulsion + (&densities[0] + &densities[1]).dot(&one.core_hamiltonian);
        log::info!("guess energy: {energy:.12}");

        self.transition(ScfState::Iterating);
        let mut diis = self
            .options
            .diis_depth()
            .map(|depth| [Diis::new(depth), Diis::new(depth)]);

        let mut status = ScfStatus::NotConverged;
        let mut iterations = 0;
        let mut energy_change = f64::INFINITY;
        let mut density_rms = f64::INFINITY;
        let mut orbitals = None;

        for iteration in 0..self.options.max_iterations {
            let h = &one.core_hamiltonian;
            let focks = if restricted {
                let two_electron = jk.compute(&densities[..1])?;
                let fock = h + 2.0 * &two_electron.coulomb[0] - &two_electron.exchange[0];
                [fock.clone(), fock]
            } else {
                let two_electron = jk.compute(&densities)?;
                let coulomb = &two_electron.coulomb[0] + &two_electron.coulomb[1];
                [
                    h + &coulomb - &two_electron.exchange[0],
                    h + &coulomb - &two_electron.exchange[1],
                ]
            };

            let previous_energy = energy;
            energy = nuclear_repulsion
                + if restricted {
                    densities[0].dot(&(h + &focks[0]))
                } else {
                    0.5 * ((&densities[0] + &densities[1]).dot(h)
                        + densities[0].dot(&focks[0])
                        + densities[1].dot(&focks[1]))
                };

            let focks = match &mut diis {
                Some([alpha, beta]) => {
                    let error = Diis::error(&focks[0], &densities[0], &one.overlap);
                    let fock_alpha = alpha.extrapolate(error, focks[0].clone());
                    if restricted {
                        [fock_alpha.clone(), fock_alpha]
                    } else {
                        let error = Diis::error(&focks[1], &densities[1], &one.overlap);
                        [fock_alpha, beta.extrapolate(error, focks[1].clone())]
                    }
                }
                None => focks,
            };

            let (coefficients_alpha, energies_alpha) =
                utils::orthogonal_eigs(&focks[0], &one.orthogonalizer);
            let (coefficients_beta, energies_beta) = if restricted {
                (coefficients_alpha.clone(), energies_alpha.clone())
            } else {
                utils::orthogonal_eigs(&focks[1], &one.orthogonalizer)
            };

            let occupation = self.occupation(&energies_alpha, &energies_beta);
            let new_densities = [
                utils::occupied_density(&coefficients_alpha, occupation.n_alpha()),
                utils::occupied_density(&coefficients_beta, occupation.n_beta()),
            ];

            energy_change = (energy - previous_energy).abs();
            density_rms = new_densities
                .iter()
                .zip(&densities)
                .map(|(new, old)| ((new - old).norm_squared() / (n * n) as f64).sqrt())
                .fold(0.0, f64::max);
            densities = new_densities;
            iterations = iteration + 1;

            log::info!(
                "iteration {iteration:<4} energy {energy:.12} dE {energy_change:.3e} drms {density_rms:.3e}"
            );

            orbitals = Some((
                occupation,
                [coefficients_alpha, coefficients_beta],
                [energies_alpha, energies_beta],
            ));

            if iteration > 0
                && energy_change < self.options.energy_threshold
                && density_rms < self.options.density_threshold
            {
                status = ScfStatus::Converged;
                break;
            }
        }

        let Some((occupation, [coefficients_alpha, coefficients_beta], [energies_alpha, energies_beta])) =
            orbitals
        else {
            return Err(ScfError::Config("no SCF iteration was run".into()));
        };

        match status {
            ScfStatus::Converged => {
                log::info!("SCF converged after {iterations} iterations: {energy:.12}");
                self.transition(ScfState::Converged);
            }
            ScfStatus::NotConverged => {
                log::warn!(
                    "SCF did not converge in {iterations} iterations, dE {energy_change:.3e} drms {density_rms:.3e}"
                );
                self.transition(ScfState::Failed);
            }
        }

        let [density_alpha, density_beta] = densities;
        let total_density = &density_alpha + &density_beta;
        let dipole = self.molecule.nuclear_dipole()
            + Vector3::from_fn(|axis, _| total_density.dot(&one.dipoles[axis]));
        let charges = self.lowdin_charges(&one, &total_density);
        log::info!("dipole moment: {:.6} {:.6} {:.6}", dipole.x, dipole.y, dipole.z);
        let nuclear_quadrupole = self.molecule.nuclear_quadrupole();
        let quadrupole: [f64; 6] = std::array::from_fn(|component| {
            nuclear_quadrupole[component] + total_density.dot(&one.quadrupoles[component])
        });
        log::info!("quadrupole moment: {quadrupole:.6?}");

        let mut output = ScfOutput {
            status,
            reference: self.options.reference,
            total_energy: energy,
            electronic_energy: energy - nuclear_repulsion,
            nuclear_repulsion,
            iterations,
            energy_change,
            density_rms,
            alpha: SpinOrbitals {
                energies: energies_alpha,
                coefficients: coefficients_alpha,
                density: density_alpha,
            },
            beta: SpinOrbitals {
                energies: energies_beta,
                coefficients: coefficients_beta,
                density: density_beta,
            },
            occupation,
            dipole,
            quadrupole,
            charges,
            density_grid: None,
        };

        if self.options.save_cartesian_grid {
            output.density_grid = Some(output.density_grid(basis, GRID_SPACING, GRID_PADDING));
        }

        Ok(output)
    }

    fn one_electron(&self) -> OneElectron {
        let integrator = DefaultIntegrator::default();
        let functions = self.basis.functions();

        let overlap = compute_overlap_matrix(functions, &integrator);
        let mut core_hamiltonian = compute_kinetic_matrix(functions, &integrator)
            + compute_nuclear_matrix(functions, self.molecule.atoms(), &integrator);
        let dipoles = compute_dipole_matrices(functions, &integrator);
        let quadrupoles = compute_quadrupole_matrices(functions, &integrator);

        if let Some((axis, lambda)) = self.options.perturbation() {
            log::info!("adding {lambda} times the {axis:?} dipole to the core Hamiltonian");
            core_hamiltonian += lambda * &dipoles[axis.index()];
        }

        log::debug!("overlap matrix: {overlap:0.4}");
        log::debug!("core Hamiltonian: {core_hamiltonian:0.4}");

        OneElectron {
            orthogonalizer: utils::symmetric_power(&overlap, -0.5, 0.0),
            overlap_root: utils::symmetric_power(&overlap, 0.5, 0.0),
            overlap,
            core_hamiltonian,
            dipoles,
            quadrupoles,
        }
    }

    /// Alpha and beta densities to start from.
    fn guess(&self, one: &OneElectron) -> Result<[DMatrix<f64>; 2]> {
        match self.options.guess {
            GuessKind::Core => {
                log::info!("core Hamiltonian guess");
                let (coefficients, energies) =
                    utils::orthogonal_eigs(&one.core_hamiltonian, &one.orthogonalizer);
                let occupation = self.occupation(&energies, &energies);
                Ok([
                    utils::occupied_density(&coefficients, occupation.n_alpha()),
                    utils::occupied_density(&coefficients, occupation.n_beta()),
                ])
            }
            GuessKind::Sad => {
                log::info!("superposition of atomic densities guess");
                let half = 0.5 * superposition_of_atomic_densities(self.basis)?;
                Ok([half.clone(), half])
            }
        }
    }

    fn occupation(&self, alpha: &DVector<f64>, beta: &DVector<f64>) -> Occupation {
        if let Some(pinned) = &self.pinned {
            return pinned.clone();
        }

        let ElectronConfig {
            n_alpha, n_beta, ..
        } = self.electrons;
        match self.options.reference {
            Reference::Rhf => Occupation::aufbau(&[alpha.as_slice()], n_alpha, n_beta),
            Reference::Uhf => {
                Occupation::aufbau_unrestricted(&[alpha.as_slice()], &[beta.as_slice()], n_alpha, n_beta)
            }
        }
    }

    /// Z_A minus the electrons of (S^1/2 D S^1/2) on atom A.
    fn lowdin_charges(&self, one: &OneElectron, density: &DMatrix<f64>) -> Vec<f64> {
        let populations = &one.overlap_root * density * &one.overlap_root;

        self.molecule
            .atoms()
            .iter()
            .enumerate()
            .map(|(index, atom)| {
                let electrons = self
                    .basis
                    .atom_function_range(index)
                    .map(|function| populations[(function, function)])
                    .sum::<f64>();
                atom.nuclear_charge() as f64 - electrons
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    //! Reference energies were generated with an independent Hartree-Fock code using the
    //! same integration techniques and Boys function implementation.
    use approx::assert_relative_eq;

    use crate::{
        basis::MolecularBasis,
        config::{GuessKind, Reference, ScfOptions},
        error::ScfError,
        molecule::Molecule,
        pk::PkFile,
        testing::{self, SIX_31G, STO_3G},
    };

    use super::{ScfEngine, ScfOutput, ScfState, ScfStatus};

    fn hydrogen() -> Molecule {
        crate::molecule! {
            H => (0.0, 0.0, 0.0),
            H => (0.0, 0.0, 1.4)
        }
    }

    fn water() -> Molecule {
        crate::molecule! {
            O => (0.0, 0.0, 0.0),
            H => (0.0, 0.75, 0.585),
            H => (0.0, -0.75, 0.585)
        }
    }

    fn run(molecule: &Molecule, basis_set: &str, options: ScfOptions) -> ScfOutput {
        let basis = MolecularBasis::new(molecule, &testing::basis_set(basis_set)).unwrap();
        let mut engine = ScfEngine::new(molecule, &basis, options).unwrap();
        let output = engine.run().unwrap();
        assert_eq!(
            engine.state(),
            match output.status {
                ScfStatus::Converged => ScfState::Converged,
                ScfStatus::NotConverged => ScfState::Failed,
            }
        );
        output
    }

    #[test]
    fn hydrogen_6_31g() {
        let output = run(&hydrogen(), SIX_31G, ScfOptions::default());

        assert_eq!(output.status, ScfStatus::Converged);
        assert!(output.density_rms < 1e-6);
        assert_relative_eq!(output.electronic_energy, -1.8410539726907735, epsilon = 1e-3);
        assert_relative_eq!(output.nuclear_repulsion, 0.7142857142857142, epsilon = 1e-3);

        let energies = &output.alpha.energies;
        assert_relative_eq!(energies[0], -0.595564373728178, epsilon = 1e-3);
        assert_relative_eq!(energies[1], 0.2382503139896246, epsilon = 1e-3);
        assert_relative_eq!(energies[2], 0.7750727506800223, epsilon = 1e-3);
        assert_relative_eq!(energies[3], 1.40316490313582, epsilon = 1e-3);

        // the molecule is symmetric about its center at z = 0.7
        assert_relative_eq!(output.dipole.norm(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(output.charges[0], 0.0, epsilon = 1e-6);
        assert_eq!(output.occupation.docc, vec![1]);
    }

    #[test]
    fn hydrogen_sto_3g() {
        let output = run(&hydrogen(), STO_3G, ScfOptions::default());

        assert_eq!(output.status, ScfStatus::Converged);
        assert!(output.iterations <= 40);
        assert_relative_eq!(output.total_energy, -1.11675, epsilon = 1e-4);
    }

    #[test]
    fn water_6_31g() {
        let output = run(&water(), SIX_31G, ScfOptions::default());

        assert_eq!(output.status, ScfStatus::Converged);
        assert_relative_eq!(output.electronic_energy, -92.0230896544854, epsilon = 1e-3);
        assert_relative_eq!(output.nuclear_repulsion, 17.488049195046216, epsilon = 1e-3);

        let energies = &output.alpha.energies;
        assert_relative_eq!(energies[0], -20.523974864948215, epsilon = 1e-3);
        assert_relative_eq!(energies[4], -0.6254760824539792, epsilon = 1e-3);
        assert_relative_eq!(energies[5], 0.26161301182427255, epsilon = 1e-3);

        // oxygen pulls electrons from the hydrogens
        assert!(output.charges[0] < 0.0);
        assert!(output.charges[1] > 0.0);
        assert_relative_eq!(output.charges.iter().sum::<f64>(), 0.0, epsilon = 1e-8);
    }

    #[test]
    fn unreachable_thresholds_are_reported() {
        let options = ScfOptions {
            max_iterations: 2,
            energy_threshold: 1e-20,
            density_threshold: 1e-20,
            ..Default::default()
        };
        // the H2 density is fixed by symmetry and would converge exactly, water's is not
        let output = run(&water(), STO_3G, options);

        assert_eq!(output.status, ScfStatus::NotConverged);
        assert_eq!(output.iterations, 2);
        assert!(output.energy_change > 0.0);
        assert!(output.density_rms > 0.0);
        assert!(output.total_energy.is_finite());
    }

    #[test]
    fn parity_mismatch_fails_before_integrals() {
        let molecule = hydrogen();
        let basis = MolecularBasis::new(&molecule, &testing::basis_set(STO_3G)).unwrap();
        let options = ScfOptions {
            multiplicity: Some(2),
            ..Default::default()
        };

        assert!(matches!(
            ScfEngine::new(&molecule, &basis, options),
            Err(ScfError::ImpossibleMultiplicity {
                multiplicity: 2,
                electrons: 2
            })
        ));
    }

    #[test]
    fn hydrogen_atom_needs_unrestricted_reference() {
        let molecule = crate::molecule! { H => (0.0, 0.0, 0.0) };
        let basis = MolecularBasis::new(&molecule, &testing::basis_set(STO_3G)).unwrap();

        assert!(matches!(
            ScfEngine::new(&molecule, &basis, ScfOptions::default()),
            Err(ScfError::InvalidOccupation(_))
        ));

        let options = ScfOptions {
            reference: Reference::Uhf,
            ..Default::default()
        };
        let output = run(&molecule, STO_3G, options);
        assert_eq!(output.status, ScfStatus::Converged);
        assert_relative_eq!(output.total_energy, -0.46658185, epsilon = 1e-6);
        assert_eq!(output.occupation.socc, vec![1]);
        assert_relative_eq!(output.beta.density.norm(), 0.0);
    }

    #[test]
    fn unrestricted_closed_shell_matches_restricted() {
        let restricted = run(&water(), STO_3G, ScfOptions::default());
        let unrestricted = run(
            &water(),
            STO_3G,
            ScfOptions {
                reference: Reference::Uhf,
                ..Default::default()
            },
        );

        assert_relative_eq!(restricted.total_energy, unrestricted.total_energy, epsilon = 1e-6);
        assert_relative_eq!(
            restricted.total_density(),
            unrestricted.total_density(),
            epsilon = 1e-4
        );
    }

    #[test]
    fn direct_sharded_and_serial_agree() {
        let serial = run(&water(), STO_3G, ScfOptions::default());
        let direct = run(
            &water(),
            STO_3G,
            ScfOptions {
                direct: true,
                ..Default::default()
            },
        );
        let sharded = run(
            &water(),
            STO_3G,
            ScfOptions {
                pk_workers: 3,
                pk_tasks_per_worker: 5,
                pk_memory: 2000,
                ..Default::default()
            },
        );

        assert_relative_eq!(serial.total_energy, direct.total_energy, epsilon = 1e-10);
        assert_relative_eq!(serial.total_energy, sharded.total_energy, epsilon = 1e-10);
    }

    #[test]
    fn atomic_guess_reaches_the_same_state() {
        let core = run(&water(), STO_3G, ScfOptions::default());
        let sad = run(
            &water(),
            STO_3G,
            ScfOptions {
                guess: GuessKind::Sad,
                ..Default::default()
            },
        );

        assert_eq!(sad.status, ScfStatus::Converged);
        assert_relative_eq!(core.total_energy, sad.total_energy, epsilon = 1e-6);
    }

    #[test]
    fn restart_from_converged_density() {
        let molecule = water();
        let basis = MolecularBasis::new(&molecule, &testing::basis_set(STO_3G)).unwrap();
        let first = ScfEngine::new(&molecule, &basis, ScfOptions::default())
            .unwrap()
            .run()
            .unwrap();

        let restarted = ScfEngine::new(&molecule, &basis, ScfOptions::default())
            .unwrap()
            .with_initial_density(first.alpha.density.clone(), first.beta.density.clone())
            .run()
            .unwrap();

        assert_eq!(restarted.status, ScfStatus::Converged);
        assert!(restarted.iterations <= 3);
        assert_relative_eq!(first.total_energy, restarted.total_energy, epsilon = 1e-6);
    }

    #[test]
    fn dipole_perturbation_polarizes_the_density() {
        let options = ScfOptions {
            perturb_h: true,
            perturb_with: Some("DIPOLE_Z".into()),
            lambda: 0.01,
            ..Default::default()
        };
        let output = run(&hydrogen(), STO_3G, options);

        // -λz lowers the energy of electrons at large z, which makes the electronic dipole
        // along z more negative
        assert_eq!(output.status, ScfStatus::Converged);
        assert!(output.dipole.z < -1e-4);
        assert!(output.charges[0] > 0.0);
    }

    #[test]
    fn pinned_occupation() {
        let pinned = run(
            &hydrogen(),
            STO_3G,
            ScfOptions {
                docc: Some(vec![1]),
                ..Default::default()
            },
        );
        let aufbau = run(&hydrogen(), STO_3G, ScfOptions::default());
        assert_relative_eq!(pinned.total_energy, aufbau.total_energy, epsilon = 1e-10);

        let molecule = hydrogen();
        let basis = MolecularBasis::new(&molecule, &testing::basis_set(STO_3G)).unwrap();
        let options = ScfOptions {
            docc: Some(vec![3]),
            ..Default::default()
        };
        assert!(matches!(
            ScfEngine::new(&molecule, &basis, options),
            Err(ScfError::InvalidOccupation(_))
        ));
    }

    #[test]
    fn density_grid_holds_the_electrons() {
        let options = ScfOptions {
            save_cartesian_grid: true,
            ..Default::default()
        };
        let output = run(&hydrogen(), STO_3G, options);

        let grid = output.density_grid.as_ref().unwrap();
        // RHF stores each spin density once
        assert_relative_eq!(grid.integrate(), 2.0, epsilon = 2e-2);
    }

    #[test]
    fn second_moments_follow_the_geometry() {
        let helium = crate::molecule! { He => (0.0, 0.0, 0.0) };
        let atom = run(&helium, STO_3G, ScfOptions::default());
        let [xx, xy, xz, yy, yz, zz] = atom.quadrupole;
        // only electrons contribute for a nucleus at the origin
        assert!(xx < 0.0);
        assert_relative_eq!(xx, yy, epsilon = 1e-10);
        assert_relative_eq!(xx, zz, epsilon = 1e-10);
        for off_diagonal in [xy, xz, yz] {
            assert_relative_eq!(off_diagonal, 0.0, epsilon = 1e-10);
        }

        let molecule = run(&hydrogen(), STO_3G, ScfOptions::default());
        let [xx, xy, xz, yy, yz, _] = molecule.quadrupole;
        assert_relative_eq!(xx, yy, epsilon = 1e-10);
        for off_diagonal in [xy, xz, yz] {
            assert_relative_eq!(off_diagonal, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn stored_pk_file_is_reused() {
        let path = testing::scratch_path("scf_reuse.pk");
        let options = ScfOptions {
            pk_file: Some(path.clone()),
            ..Default::default()
        };
        let first = run(&water(), STO_3G, options.clone());
        assert!(path.exists());

        // building a new file would fail with this little memory
        let reused = run(
            &water(),
            STO_3G,
            ScfOptions {
                pk_memory: 1,
                ..options.clone()
            },
        );
        assert_relative_eq!(first.total_energy, reused.total_energy, epsilon = 1e-10);

        // a file for a different basis is recomputed
        let other = run(&hydrogen(), STO_3G, options);
        assert_relative_eq!(other.total_energy, -1.11675, epsilon = 1e-4);
        let file = PkFile::open(&path).unwrap();
        assert_eq!(file.n_basis(), 2);
        file.remove().unwrap();
    }
}

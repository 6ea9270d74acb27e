use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pk::{PkConfig, PkStrategy};

/// Which Hartree-Fock reference to run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Reference {
    #[default]
    Rhf,
    Uhf,
}

/// How the starting density is built.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GuessKind {
    /// Diagonalize the core Hamiltonian
    #[default]
    Core,
    /// Superposition of atomic UHF densities
    Sad,
}

/// Cartesian axis of a static dipole perturbation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DipoleAxis {
    X,
    Y,
    Z,
}

impl DipoleAxis {
    pub fn index(self) -> usize {
        match self {
            DipoleAxis::X => 0,
            DipoleAxis::Y => 1,
            DipoleAxis::Z => 2,
        }
    }
}

/// Options of an SCF run. Keys follow the usual upper-case input names, anything left
/// out of an input file takes its default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScfOptions {
    #[serde(rename = "REFERENCE")]
    pub reference: Reference,
    #[serde(rename = "MAXITER")]
    pub max_iterations: usize,
    #[serde(rename = "E_CONVERGENCE")]
    pub energy_threshold: f64,
    #[serde(rename = "D_CONVERGENCE")]
    pub density_threshold: f64,
    /// Doubly occupied orbitals per symmetry block
    #[serde(rename = "DOCC")]
    pub docc: Option<Vec<usize>>,
    /// Singly occupied orbitals per symmetry block
    #[serde(rename = "SOCC")]
    pub socc: Option<Vec<usize>>,
    #[serde(rename = "CHARGE")]
    pub charge: i32,
    /// Inferred from the electron count parity if absent
    #[serde(rename = "MULTP")]
    pub multiplicity: Option<u32>,
    #[serde(rename = "PERTURB_H")]
    pub perturb_h: bool,
    #[serde(rename = "PERTURB_WITH")]
    pub perturb_with: Option<String>,
    #[serde(rename = "LAMBDA")]
    pub lambda: f64,
    #[serde(rename = "DIRECT")]
    pub direct: bool,
    #[serde(rename = "RI_HF")]
    pub ri_hf: bool,
    #[serde(rename = "SCHWARZ_CUTOFF")]
    pub schwarz_cutoff: f64,
    #[serde(rename = "DIIS")]
    pub diis: bool,
    #[serde(rename = "DIIS_VECTORS")]
    pub diis_vectors: usize,
    #[serde(rename = "SAVE_CARTESIAN_GRID")]
    pub save_cartesian_grid: bool,
    #[serde(rename = "GUESS")]
    pub guess: GuessKind,
    /// Memory for PK buffers, in doubles
    #[serde(rename = "PK_MEMORY")]
    pub pk_memory: usize,
    #[serde(rename = "PK_MAX_BATCHES")]
    pub pk_max_batches: usize,
    #[serde(rename = "PK_WORKERS")]
    pub pk_workers: usize,
    #[serde(rename = "PK_TASKS_PER_WORKER")]
    pub pk_tasks_per_worker: usize,
    #[serde(rename = "PK_FILE")]
    pub pk_file: Option<PathBuf>,
}

impl Default for ScfOptions {
    fn default() -> Self {
        Self {
            reference: Reference::Rhf,
            max_iterations: 40,
            energy_threshold: 1e-6,
            density_threshold: 1e-6,
            docc: None,
            socc: None,
            charge: 0,
            multiplicity: None,
            perturb_h: false,
            perturb_with: None,
            lambda: 0.0,
            direct: false,
            ri_hf: false,
            schwarz_cutoff: 0.0,
            diis: true,
            diis_vectors: 4,
            save_cartesian_grid: false,
            guess: GuessKind::Core,
            pk_memory: 32_000_000,
            pk_max_batches: 1000,
            pk_workers: 1,
            pk_tasks_per_worker: 100,
            pk_file: None,
        }
    }
}

impl ScfOptions {
    /// The dipole perturbation to add to the core Hamiltonian, if one was requested.
    pub fn perturbation(&self) -> Option<(DipoleAxis, f64)> {
        if !self.perturb_h {
            return None;
        }

        let Some(perturb_with) = &self.perturb_with else {
            log::warn!("PERTURB_H is true, but PERTURB_WITH not found, applying no perturbation");
            return None;
        };

        let axis = match perturb_with.to_ascii_uppercase().as_str() {
            "DIPOLE_X" => DipoleAxis::X,
            "DIPOLE_Y" => DipoleAxis::Y,
            "DIPOLE_Z" => DipoleAxis::Z,
            other => {
                log::warn!("unknown PERTURB_WITH {other}, applying no perturbation");
                return None;
            }
        };

        Some((axis, self.lambda))
    }

    /// Whether two-electron integrals are recomputed on every iteration.
    pub fn use_direct(&self) -> bool {
        // density fitting always goes through stored integrals
        self.direct && !self.ri_hf
    }

    /// DIIS is only worth it with at least two stored vectors.
    pub fn diis_depth(&self) -> Option<usize> {
        (self.diis && self.diis_vectors >= 2).then_some(self.diis_vectors)
    }

    pub fn pk_config(&self) -> PkConfig {
        let strategy = if self.pk_workers > 1 {
            PkStrategy::Sharded {
                workers: self.pk_workers,
                tasks_per_worker: self.pk_tasks_per_worker.max(1),
            }
        } else {
            PkStrategy::Serial
        };

        PkConfig {
            memory: self.pk_memory,
            max_batches: self.pk_max_batches,
            strategy,
        }
    }
}

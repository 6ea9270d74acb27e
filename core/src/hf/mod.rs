//! Self consistent field Hartree-Fock on top of the PK integral store.

mod guess;
mod jk;
mod mo;
mod occupation;
mod scf;
pub(crate) mod utils;

pub use guess::{superposition_of_atomic_densities, AtomicGuess, AtomicGuessSolver};
pub use jk::{DirectJk, JkBuilder, JkMatrices, PkJk};
pub use mo::DensityGrid;
pub use occupation::{ElectronConfig, Occupation};
pub use scf::{ScfEngine, ScfOutput, ScfState, ScfStatus, SpinOrbitals};

mod basis_set;
mod molecule;
mod options;

pub use basis_set::ConfigBasisSet;
pub use molecule::ConfigMolecule;
pub use options::{DipoleAxis, GuessKind, Reference, ScfOptions};

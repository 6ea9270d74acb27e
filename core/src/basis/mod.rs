mod functions;
mod molecular;
mod set;

pub use functions::{BasisFunction, ContractedGaussian, Gaussian};
pub use molecular::{MolecularBasis, Shell};
pub use set::{AtomicBasis, BasisSet, ElectronShell};

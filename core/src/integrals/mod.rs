use crate::atom::Atom;

pub mod electron_tensor;
pub mod mmd;
pub mod one_electron;
pub mod quartets;
mod utils;

pub use electron_tensor::ElectronTensor;
pub use quartets::{BasisQuartetSource, ShellQuartet, ShellQuartetSource};

pub type DefaultIntegrator = mmd::McMurchieDavidson;

pub trait Integrator {
    type Function;

    /// Calculate the overlap integral between two basis functions.
    fn overlap(&self, functions: (&Self::Function, &Self::Function)) -> f64;

    /// Calculate the kinetic energy integral between two basis functions.
    fn kinetic(&self, functions: (&Self::Function, &Self::Function)) -> f64;

    /// Calculate the nuclear attraction integral between two basis functions and the nuclei of a quantum system.
    fn nuclear(&self, functions: (&Self::Function, &Self::Function), nuclei: &[Atom]) -> f64;

    /// Calculate <a| x^e y^f z^g |b> about the origin for `order = [e, f, g]`.
    fn multipole(&self, functions: (&Self::Function, &Self::Function), order: [i32; 3]) -> f64;

    /// Calculate the electron-electron repulsion integral between four basis functions.
    fn electron_repulsion(
        &self,
        functions: (
            &Self::Function,
            &Self::Function,
            &Self::Function,
            &Self::Function,
        ),
    ) -> f64;
}

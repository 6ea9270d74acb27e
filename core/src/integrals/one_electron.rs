use nalgebra::DMatrix;

use crate::{atom::Atom, basis::BasisFunction, hf::utils};

use super::Integrator;

/// Exponents of the six unique Cartesian second moments: xx, xy, xz, yy, yz, zz.
pub const QUADRUPOLE_ORDERS: [[i32; 3]; 6] = [
    [2, 0, 0],
    [1, 1, 0],
    [1, 0, 1],
    [0, 2, 0],
    [0, 1, 1],
    [0, 0, 2],
];

pub fn compute_overlap_matrix(
    basis: &[BasisFunction],
    integrator: &impl Integrator<Function = BasisFunction>,
) -> DMatrix<f64> {
    utils::symmetric_matrix(basis.len(), |i, j| {
        let overlap_ij = integrator.overlap((&basis[i], &basis[j]));
        log::trace!("overlap ({i}{j}) = {overlap_ij}");
        overlap_ij
    })
}

pub fn compute_kinetic_matrix(
    basis: &[BasisFunction],
    integrator: &impl Integrator<Function = BasisFunction>,
) -> DMatrix<f64> {
    utils::symmetric_matrix(basis.len(), |i, j| {
        let kinetic_ij = integrator.kinetic((&basis[i], &basis[j]));
        log::trace!("kinetic ({i}{j}) = {kinetic_ij}");
        kinetic_ij
    })
}

pub fn compute_nuclear_matrix(
    basis: &[BasisFunction],
    nuclei: &[Atom],
    integrator: &impl Integrator<Function = BasisFunction>,
) -> DMatrix<f64> {
    utils::symmetric_matrix(basis.len(), |i, j| {
        let nuclear_ij = integrator.nuclear((&basis[i], &basis[j]), nuclei);
        log::trace!("nuclear ({i}{j}) = {nuclear_ij}");
        nuclear_ij
    })
}

/// Electronic dipole integrals -<a|r|b> along x, y and z.
pub fn compute_dipole_matrices(
    basis: &[BasisFunction],
    integrator: &impl Integrator<Function = BasisFunction>,
) -> [DMatrix<f64>; 3] {
    [[1, 0, 0], [0, 1, 0], [0, 0, 1]].map(|order| electronic_moment(basis, integrator, order))
}

/// Electronic second moment integrals in the order of [`QUADRUPOLE_ORDERS`].
pub fn compute_quadrupole_matrices(
    basis: &[BasisFunction],
    integrator: &impl Integrator<Function = BasisFunction>,
) -> [DMatrix<f64>; 6] {
    QUADRUPOLE_ORDERS.map(|order| electronic_moment(basis, integrator, order))
}

fn electronic_moment(
    basis: &[BasisFunction],
    integrator: &impl Integrator<Function = BasisFunction>,
    order: [i32; 3],
) -> DMatrix<f64> {
    // electrons carry charge -1
    utils::symmetric_matrix(basis.len(), |i, j| {
        -integrator.multipole((&basis[i], &basis[j]), order)
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::{
        basis::MolecularBasis,
        integrals::DefaultIntegrator,
        testing::{self, STO_3G},
    };

    use super::{compute_dipole_matrices, compute_overlap_matrix, compute_quadrupole_matrices};

    #[test]
    fn hydrogen_molecule_matrices() {
        let molecule = crate::molecule! {
            H => (0.0, 0.0, 0.0),
            H => (0.0, 0.0, 1.4)
        };
        let basis = MolecularBasis::new(&molecule, &testing::basis_set(STO_3G)).unwrap();
        let integrator = DefaultIntegrator::default();

        let overlap = compute_overlap_matrix(basis.functions(), &integrator);
        assert_relative_eq!(overlap[(0, 0)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(overlap[(0, 1)], 0.6593, epsilon = 1e-4);
        assert_relative_eq!(overlap[(0, 1)], overlap[(1, 0)]);

        let [x, _, z] = compute_dipole_matrices(basis.functions(), &integrator);
        assert_relative_eq!(x[(0, 0)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(z[(0, 0)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(z[(1, 1)], -1.4, epsilon = 1e-6);
        // the overlap density sits halfway between the nuclei
        assert_relative_eq!(z[(0, 1)], -0.7 * overlap[(0, 1)], epsilon = 1e-6);

        let quadrupole = compute_quadrupole_matrices(basis.functions(), &integrator);
        assert!(quadrupole[0][(0, 0)] < 0.0);
        assert_relative_eq!(quadrupole[1][(0, 0)], 0.0, epsilon = 1e-12);
    }
}

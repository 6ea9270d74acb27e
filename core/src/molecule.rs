use nalgebra::Vector3;

use crate::atom::Atom;

/// Represents a molecule
#[derive(Debug, Clone)]
pub struct Molecule {
    pub(crate) atoms: Vec<Atom>,
}

impl Molecule {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Sum of the nuclear charges, i.e. the electron count of the neutral molecule.
    pub fn total_nuclear_charge(&self) -> i64 {
        self.atoms
            .iter()
            .map(|atom| atom.nuclear_charge() as i64)
            .sum()
    }

    pub fn nuclear_repulsion(&self) -> f64 {
        let n_atoms = self.atoms.len();

        let mut potential = 0.0;
        for atom_a in 0..n_atoms {
            for atom_b in atom_a + 1..n_atoms {
                potential += (self.atoms[atom_a].nuclear_charge()
                    * self.atoms[atom_b].nuclear_charge()) as f64
                    / (self.atoms[atom_b].position - self.atoms[atom_a].position).norm()
            }
        }
        potential
    }

    /// Nuclear contribution to the dipole moment about the origin.
    pub fn nuclear_dipole(&self) -> Vector3<f64> {
        self.atoms
            .iter()
            .map(|atom| atom.nuclear_charge() as f64 * atom.position)
            .sum()
    }

    /// Nuclear second moments Σ Z_A a_A b_A about the origin, ordered xx, xy, xz, yy, yz, zz.
    pub fn nuclear_quadrupole(&self) -> [f64; 6] {
        [(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)].map(|(a, b)| {
            self.atoms
                .iter()
                .map(|atom| atom.nuclear_charge() as f64 * atom.position[a] * atom.position[b])
                .sum::<f64>()
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use crate::{atom::Atom, periodic_table::ElementType};

    use super::Molecule;

    #[test]
    fn hydrogen_nuclear_terms() {
        let molecule = Molecule::new(vec![
            Atom::new(ElementType::H, Vector3::new(0.0, 0.0, 0.0)),
            Atom::new(ElementType::H, Vector3::new(0.0, 0.0, 1.4)),
        ]);

        assert_relative_eq!(molecule.nuclear_repulsion(), 1.0 / 1.4);
        assert_eq!(molecule.total_nuclear_charge(), 2);
        assert_relative_eq!(molecule.nuclear_dipole(), Vector3::new(0.0, 0.0, 1.4));

        let quadrupole = molecule.nuclear_quadrupole();
        assert_relative_eq!(quadrupole[5], 1.96, epsilon = 1e-12);
        assert!(quadrupole[..5].iter().all(|&component| component == 0.0));
    }
}

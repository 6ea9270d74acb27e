use std::ops::Range;

use crate::{
    atom::Atom,
    error::{Result, ScfError},
    molecule::Molecule,
};

use super::{BasisFunction, BasisSet};

/// A group of basis functions on one center sharing an angular momentum.
#[derive(Debug, Clone)]
pub struct Shell {
    pub(crate) center: usize,
    pub(crate) angular_magnitude: i32,
    pub(crate) first_function: usize,
    pub(crate) functions: Vec<BasisFunction>,
}

impl Shell {
    /// Index of the atom this shell sits on
    pub fn center(&self) -> usize {
        self.center
    }

    pub fn angular_magnitude(&self) -> i32 {
        self.angular_magnitude
    }

    /// Index of the first basis function of this shell in the molecular basis
    pub fn first_function(&self) -> usize {
        self.first_function
    }

    pub fn n_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn functions(&self) -> &[BasisFunction] {
        &self.functions
    }
}

/// The basis of a whole molecule: shells in atom order with contiguous basis function numbering.
#[derive(Debug, Clone)]
pub struct MolecularBasis {
    atoms: Vec<Atom>,
    shells: Vec<Shell>,
    functions: Vec<BasisFunction>,
}

impl MolecularBasis {
    pub fn new(molecule: &Molecule, basis_set: &BasisSet) -> Result<Self> {
        let mut shells = Vec::new();
        let mut functions = Vec::new();

        for (center, atom) in molecule.atoms.iter().enumerate() {
            let atomic_basis = basis_set
                .for_atom(atom)
                .ok_or(ScfError::MissingBasis(atom.element_type))?;

            for electron_shell in atomic_basis.shells() {
                let shell_functions = electron_shell
                    .basis_functions
                    .iter()
                    .map(|contracted| BasisFunction {
                        contracted_gaussian: contracted.clone(),
                        position: atom.position,
                    })
                    .collect::<Vec<_>>();

                shells.push(Shell {
                    center,
                    angular_magnitude: electron_shell.angular_magnitude,
                    first_function: functions.len(),
                    functions: shell_functions.clone(),
                });
                functions.extend(shell_functions);
            }
        }

        log::debug!(
            "molecular basis: {} shells, {} basis functions",
            shells.len(),
            functions.len()
        );

        Ok(Self {
            atoms: molecule.atoms.clone(),
            shells,
            functions,
        })
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn shells(&self) -> &[Shell] {
        &self.shells
    }

    pub fn functions(&self) -> &[BasisFunction] {
        &self.functions
    }

    pub fn n_basis(&self) -> usize {
        self.functions.len()
    }

    /// Range of basis function indices centered on the given atom
    pub fn atom_function_range(&self, atom: usize) -> Range<usize> {
        let mut on_atom = self.shells.iter().filter(|shell| shell.center == atom);

        match on_atom.next() {
            Some(first) => {
                let end = on_atom
                    .last()
                    .map(|last| last.first_function + last.n_functions())
                    .unwrap_or(first.first_function + first.n_functions());
                first.first_function..end
            }
            None => 0..0,
        }
    }

    /// The basis of a single atom of this molecule, renumbered from zero.
    pub fn for_atom(&self, atom: usize) -> MolecularBasis {
        let mut shells = Vec::new();
        let mut functions = Vec::new();

        for shell in self.shells.iter().filter(|shell| shell.center == atom) {
            shells.push(Shell {
                center: 0,
                first_function: functions.len(),
                ..shell.clone()
            });
            functions.extend(shell.functions.iter().cloned());
        }

        MolecularBasis {
            atoms: vec![self.atoms[atom]],
            shells,
            functions,
        }
    }
}

use nalgebra::Vector3;
use serde::Deserialize;

use crate::{atom::Atom, error::ScfError, molecule::Molecule, periodic_table::ElementType};

/// Represents a full molecule in a config file.
/// A molecule is just a list of positioned atoms, coordinates in bohr.
#[derive(Deserialize)]
pub struct ConfigMolecule(Vec<ConfigAtom>);

#[derive(Deserialize)]
struct ConfigAtom {
    element: ElementType,
    position: Vec<f64>,
}

impl TryFrom<ConfigMolecule> for Molecule {
    type Error = ScfError;

    fn try_from(value: ConfigMolecule) -> Result<Self, Self::Error> {
        let ConfigMolecule(config_atoms) = value;

        let mut atoms = Vec::with_capacity(config_atoms.len());

        for atom in config_atoms {
            let &[x, y, z] = atom.position.as_slice() else {
                return Err(ScfError::Config(format!(
                    "{:?} needs x, y, z coordinates, got {}",
                    atom.element,
                    atom.position.len()
                )));
            };

            atoms.push(Atom {
                position: Vector3::new(x, y, z),
                element_type: atom.element,
            });
        }

        Ok(Self { atoms })
    }
}

#[cfg(test)]
mod tests {
    use crate::{molecule::Molecule, periodic_table::ElementType};

    use super::ConfigMolecule;

    #[test]
    fn parses_molecule() {
        let config: ConfigMolecule = serde_json::from_str(
            r#"[{"element": "O", "position": [0.0, 0.0, 0.0]}, {"element": "1", "position": [0.0, 1.4, 1.1]}]"#,
        )
        .unwrap();
        let molecule = Molecule::try_from(config).unwrap();

        assert_eq!(molecule.atoms().len(), 2);
        assert_eq!(molecule.atoms()[1].element_type(), ElementType::H);
    }

    #[test]
    fn rejects_missing_coordinates() {
        let config: ConfigMolecule =
            serde_json::from_str(r#"[{"element": "He", "position": [0.0, 0.0]}]"#).unwrap();
        assert!(Molecule::try_from(config).is_err());
    }
}

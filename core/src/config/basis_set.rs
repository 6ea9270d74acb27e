use std::collections::HashMap;

use serde::Deserialize;
use smallvec::SmallVec;

use crate::{
    basis::{AtomicBasis, BasisSet, ContractedGaussian, ElectronShell, Gaussian},
    error::ScfError,
    periodic_table::ElementType,
};

/// A basis set in the Basis Set Exchange JSON format.
#[derive(Deserialize)]
pub struct ConfigBasisSet {
    elements: HashMap<ElementType, ConfigElectronicConfiguration>,
}

#[derive(Deserialize)]
struct ConfigElectronicConfiguration {
    electron_shells: Vec<ConfigElectronShell>,
}

#[derive(Deserialize)]
struct ConfigElectronShell {
    function_type: String,
    angular_momentum: Vec<i32>,
    exponents: Vec<String>,
    coefficients: Vec<Vec<String>>,
}

impl TryFrom<ConfigBasisSet> for BasisSet {
    type Error = ScfError;

    fn try_from(value: ConfigBasisSet) -> Result<Self, Self::Error> {
        let mut atomic_mapping = HashMap::with_capacity(value.elements.len());

        for (element, configuration) in value.elements {
            let mut element_atomic_basis = AtomicBasis::empty();

            for electron_shell in &configuration.electron_shells {
                if !electron_shell.function_type.starts_with("gto") {
                    return Err(ScfError::Config(format!(
                        "unsupported function type {} for {element:?}",
                        electron_shell.function_type
                    )));
                }

                let exponents = electron_shell
                    .exponents
                    .iter()
                    .map(|exponent| parse_number(exponent))
                    .collect::<Result<Vec<_>, _>>()?;

                // sp shells list one coefficient row per angular momentum
                for (index, &angular_magnitude) in
                    electron_shell.angular_momentum.iter().enumerate()
                {
                    let row = electron_shell
                        .coefficients
                        .get(index)
                        .or_else(|| electron_shell.coefficients.first())
                        .ok_or_else(|| {
                            ScfError::Config(format!("shell of {element:?} has no coefficients"))
                        })?;

                    let mut shell = ElectronShell::new(angular_magnitude);

                    for angular in generate_angular_vectors(angular_magnitude) {
                        let mut primitives = SmallVec::with_capacity(exponents.len());

                        for (&exponent, coefficient) in exponents.iter().zip(row) {
                            let coefficient = parse_number(coefficient)?;
                            let norm = Gaussian::norm(exponent, angular);

                            primitives.push(Gaussian {
                                exponent,
                                coefficient: coefficient * norm,
                                angular,
                            });
                        }

                        shell
                            .basis_functions
                            .push(ContractedGaussian(primitives).normalized());
                    }

                    element_atomic_basis.shells.push(shell);
                }
            }

            atomic_mapping.insert(element, element_atomic_basis);
        }

        Ok(Self::new(atomic_mapping))
    }
}

fn parse_number(value: &str) -> Result<f64, ScfError> {
    // some basis sets use fortran style exponents
    value
        .replace(['D', 'd'], "E")
        .parse::<f64>()
        .map_err(|err| ScfError::Config(format!("invalid number {value}: {err}")))
}

/// Cartesian components (i, j, k) with i + j + k = angular, in xx, xy, xz, yy, yz, zz order.
pub(crate) fn generate_angular_vectors(angular_magnitude: i32) -> Vec<(i32, i32, i32)> {
    let mut angular_vectors = Vec::with_capacity(((angular_magnitude + 1) * (angular_magnitude + 2) / 2) as usize);

    for i in 0..=angular_magnitude {
        let x = angular_magnitude - i;
        for j in 0..=i {
            angular_vectors.push((x, i - j, j));
        }
    }

    angular_vectors
}

#[cfg(test)]
mod tests {
    use super::generate_angular_vectors;

    #[test]
    fn cartesian_ordering() {
        assert_eq!(generate_angular_vectors(0), vec![(0, 0, 0)]);
        assert_eq!(
            generate_angular_vectors(1),
            vec![(1, 0, 0), (0, 1, 0), (0, 0, 1)]
        );
        assert_eq!(
            generate_angular_vectors(2),
            vec![(2, 0, 0), (1, 1, 0), (1, 0, 1), (0, 2, 0), (0, 1, 1), (0, 0, 2)]
        );
    }
}

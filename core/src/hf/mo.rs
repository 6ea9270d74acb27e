use std::{fs::File, io::BufWriter, path::Path};

use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};

use crate::{basis::BasisFunction, error::Result};

/// Occupied molecular orbitals of one spin, sparse in the basis
#[derive(Debug)]
pub(crate) struct MolecularOrbitals {
    orbitals: Vec<MolecularOrbital>,
}

impl MolecularOrbitals {
    /// anything less than this is considered zero
    const ZERO_CUTOFF: f64 = 1e-8;

    /// Keep the first `n_occupied` columns of a coefficient matrix.
    pub(crate) fn from_matrix(coefficient_matrix: &DMatrix<f64>, n_occupied: usize) -> Self {
        let orbitals = coefficient_matrix
            .column_iter()
            .take(n_occupied)
            .map(|column| {
                let (basis_functions, coefficients) = column
                    .iter()
                    .enumerate()
                    .filter(|(_, element)| element.abs() > Self::ZERO_CUTOFF)
                    .unzip::<_, _, Vec<_>, Vec<_>>();
                MolecularOrbital {
                    basis_functions,
                    coefficients,
                }
            })
            .collect();

        Self { orbitals }
    }

    /// Evaluate the n-th lowest energy orbital at a given positon
    pub(crate) fn evaluate_orbital(
        &self,
        basis: &[BasisFunction],
        orbital: usize,
        position: Vector3<f64>,
    ) -> f64 {
        let MolecularOrbital {
            ref basis_functions,
            ref coefficients,
        } = self.orbitals[orbital];

        basis_functions
            .iter()
            .zip(coefficients)
            .map(|(&function, &coefficient)| coefficient * basis[function].evaluate(position))
            .sum()
    }

    /// Sum of |φ|² over all orbitals.
    pub(crate) fn density(&self, basis: &[BasisFunction], position: Vector3<f64>) -> f64 {
        (0..self.orbitals.len())
            .map(|orbital| self.evaluate_orbital(basis, orbital, position).powi(2))
            .sum()
    }
}

type BasisFunctionId = usize;

#[derive(Debug)]
struct MolecularOrbital {
    basis_functions: Vec<BasisFunctionId>,
    coefficients: Vec<f64>,
}

/// Electron density sampled on a regular Cartesian grid, x fastest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityGrid {
    pub origin: [f64; 3],
    pub spacing: f64,
    pub shape: [usize; 3],
    pub values: Vec<f64>,
}

impl DensityGrid {
    /// Sample the density of the given orbital sets on a grid covering the box around
    /// `centers`, extended by `padding` on every side.
    pub(crate) fn sample(
        basis: &[BasisFunction],
        centers: &[Vector3<f64>],
        orbitals: &[MolecularOrbitals],
        spacing: f64,
        padding: f64,
    ) -> Self {
        let lower = centers
            .iter()
            .fold(Vector3::repeat(f64::INFINITY), |low, center| low.inf(center))
            .add_scalar(-padding);
        let upper = centers
            .iter()
            .fold(Vector3::repeat(f64::NEG_INFINITY), |high, center| high.sup(center))
            .add_scalar(padding);

        let shape = [0, 1, 2].map(|axis| ((upper[axis] - lower[axis]) / spacing).round() as usize + 1);

        let mut values = Vec::with_capacity(shape.iter().product());
        for k in 0..shape[2] {
            for j in 0..shape[1] {
                for i in 0..shape[0] {
                    let point = lower + spacing * Vector3::new(i as f64, j as f64, k as f64);
                    values.push(orbitals.iter().map(|set| set.density(basis, point)).sum::<f64>());
                }
            }
        }

        log::debug!("sampled density on a {shape:?} grid with spacing {spacing}");

        Self {
            origin: [lower.x, lower.y, lower.z],
            spacing,
            shape,
            values,
        }
    }

    /// Electron count by simple quadrature.
    pub fn integrate(&self) -> f64 {
        self.values.iter().sum::<f64>() * self.spacing.powi(3)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(serde_json::to_writer(BufWriter::new(file), self)?)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, Vector3};

    use crate::{
        basis::MolecularBasis,
        testing::{self, STO_3G},
    };

    use super::{DensityGrid, MolecularOrbitals};

    #[test]
    fn hydrogen_density_integrates_to_one() {
        let molecule = crate::molecule! { H => (0.0, 0.0, 0.0) };
        let basis = MolecularBasis::new(&molecule, &testing::basis_set(STO_3G)).unwrap();

        let orbitals = MolecularOrbitals::from_matrix(&DMatrix::identity(1, 1), 1);
        let grid = DensityGrid::sample(
            basis.functions(),
            &[Vector3::zeros()],
            &[orbitals],
            0.2,
            6.0,
        );

        assert_eq!(grid.shape, [61, 61, 61]);
        assert_relative_eq!(grid.integrate(), 1.0, epsilon = 1e-2);
    }
}

use nalgebra::{DMatrix, DVector, SymmetricEigen};

#[inline(always)]
/// Create a symmetric, square matrix. Function is only run for upper triangle of the matrix
pub(crate) fn symmetric_matrix(
    n: usize,
    mut func: impl FnMut(usize, usize) -> f64,
) -> DMatrix<f64> {
    let m = DMatrix::from_fn(n, n, |i, j| if i <= j { func(i, j) } else { 0.0 });
    DMatrix::from_fn(n, n, |i, j| if i <= j { m[(i, j)] } else { m[(j, i)] })
}

pub(crate) fn eigs(matrix: DMatrix<f64>) -> (DMatrix<f64>, DVector<f64>) {
    let eigs = SymmetricEigen::new(matrix);
    (eigs.eigenvectors, eigs.eigenvalues)
}

/// Eigenvectors and eigenvalues in ascending order of the eigenvalues.
pub(crate) fn sorted_eigs(matrix: DMatrix<f64>) -> (DMatrix<f64>, DVector<f64>) {
    let (eigenvectors, eigenvalues) = eigs(matrix);

    let mut val_vec_pairs = eigenvalues
        .into_iter()
        .zip(eigenvectors.column_iter())
        .collect::<Vec<_>>();

    // stable, so degenerate orbitals keep the order of the eigensolver
    val_vec_pairs.sort_by(|(a, _), (b, _)| a.total_cmp(b));

    let (values, vectors): (Vec<_>, Vec<_>) = val_vec_pairs.into_iter().unzip();

    (
        DMatrix::from_columns(&vectors),
        DVector::from_column_slice(&values),
    )
}

/// U f(λ) Uᵀ for the eigendecomposition of a symmetric matrix, with f(λ) = λ^power.
///
/// Eigenvalues below `cutoff` are mapped to zero instead, which turns S^-1/2 into a
/// pseudo inverse for linearly dependent bases.
pub(crate) fn symmetric_power(matrix: &DMatrix<f64>, power: f64, cutoff: f64) -> DMatrix<f64> {
    let (u, values) = eigs(matrix.clone());

    let scaled = DMatrix::from_diagonal(&values.map(|value| {
        if value < cutoff {
            0.0
        } else {
            value.powf(power)
        }
    }));
    &u * scaled * u.transpose()
}

/// Solve F C = S C ε through the orthogonalizer X = S^-1/2, returning C = X C' and ε.
pub(crate) fn orthogonal_eigs(
    fock: &DMatrix<f64>,
    orthogonalizer: &DMatrix<f64>,
) -> (DMatrix<f64>, DVector<f64>) {
    let transformed = orthogonalizer.transpose() * fock * orthogonalizer;
    let (transformed_coefficients, energies) = sorted_eigs(transformed);
    (orthogonalizer * transformed_coefficients, energies)
}

/// D = C_occ C_occᵀ over the first `n_occupied` columns.
pub(crate) fn occupied_density(coefficients: &DMatrix<f64>, n_occupied: usize) -> DMatrix<f64> {
    let occupied = coefficients.columns(0, n_occupied);
    &occupied * occupied.transpose()
}

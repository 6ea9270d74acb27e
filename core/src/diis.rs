use nalgebra::{DMatrix, DVector};
use std::collections::VecDeque;

struct Sample {
    error: DMatrix<f64>,
    fock: DMatrix<f64>,
}

/// Pulay extrapolation of Fock matrices from the most recent samples.
pub(crate) struct Diis {
    /// Newest sample first
    previous_samples: VecDeque<Sample>,
    max_vectors: usize,
}

impl Diis {
    pub fn new(max_vectors: usize) -> Self {
        Self {
            previous_samples: VecDeque::with_capacity(max_vectors),
            max_vectors: max_vectors.max(2),
        }
    }

    /// The commutator FDS - SDF, which vanishes at self consistency.
    pub fn error(fock: &DMatrix<f64>, density: &DMatrix<f64>, overlap: &DMatrix<f64>) -> DMatrix<f64> {
        let fds = fock * density * overlap;
        &fds - fds.transpose()
    }

    /// Store a sample and return the extrapolated Fock matrix. Falls back to the newest
    /// Fock matrix while fewer than two samples exist or the DIIS equations are singular.
    pub fn extrapolate(&mut self, error: DMatrix<f64>, fock: DMatrix<f64>) -> DMatrix<f64> {
        self.previous_samples.push_front(Sample { error, fock });
        self.previous_samples.truncate(self.max_vectors);

        let n = self.previous_samples.len();
        let newest = &self.previous_samples[0].fock;
        if n < 2 {
            return newest.clone();
        }

        let matrix = DMatrix::from_fn(n + 1, n + 1, |i, j| match (i, j) {
            (i, j) if i == n && j == n => 0.0,
            (i, j) if i == n || j == n => 1.0,
            _ => self.previous_samples[j]
                .error
                .dot(&self.previous_samples[i].error),
        });

        let b = DVector::from_fn(n + 1, |i, _| if i == n { 1.0 } else { 0.0 });

        let Some(solution) = matrix.qr().solve(&b) else {
            log::debug!("DIIS equations are singular, using the plain Fock matrix");
            return newest.clone();
        };

        solution
            .iter()
            .take(n)
            .zip(&self.previous_samples)
            .map(|(&x, sample)| x * &sample.fock)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    use super::Diis;

    #[test]
    fn error_of_commuting_matrices_vanishes() {
        let fock = DMatrix::from_row_slice(2, 2, &[1.0, 0.2, 0.2, 3.0]);
        let overlap = DMatrix::identity(2, 2);
        assert_relative_eq!(Diis::error(&fock, &fock, &overlap).norm(), 0.0);
    }

    #[test]
    fn extrapolates_to_zero_error() {
        let mut diis = Diis::new(4);

        // errors are linear in the Fock matrices, the combination with zero error is F = 2
        let sample = |x: f64| {
            (
                DMatrix::from_element(1, 1, x - 2.0),
                DMatrix::from_element(1, 1, x),
            )
        };

        let (error, fock) = sample(3.0);
        assert_relative_eq!(diis.extrapolate(error, fock)[(0, 0)], 3.0);
        let (error, fock) = sample(2.5);
        assert_relative_eq!(diis.extrapolate(error, fock)[(0, 0)], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn keeps_at_most_max_vectors() {
        let mut diis = Diis::new(3);
        for x in 0..10 {
            let value = x as f64;
            diis.extrapolate(DMatrix::from_element(1, 1, value), DMatrix::from_element(1, 1, value));
        }
        assert_eq!(diis.previous_samples.len(), 3);
    }
}

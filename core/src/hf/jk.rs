use std::{
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
};

use nalgebra::DMatrix;

use crate::{
    error::Result,
    integrals::{ShellQuartet, ShellQuartetSource},
    pk::{PkConfig, PkFile, PkIntegralEngine},
};

/// Coulomb and exchange matrices, one pair per density.
pub struct JkMatrices {
    pub coulomb: Vec<DMatrix<f64>>,
    pub exchange: Vec<DMatrix<f64>>,
}

/// Builds J = sum_rs (pq|rs) D_rs and K = sum_rs (pr|qs) D_rs for symmetric densities.
pub trait JkBuilder {
    fn compute(&mut self, densities: &[DMatrix<f64>]) -> Result<JkMatrices>;
}

/// Contracts densities with a PK supermatrix file.
pub struct PkJk {
    file: Option<PkFile>,
    keep: bool,
}

impl PkJk {
    /// Compute the supermatrix into `path`. Without a path a scratch file is used and
    /// deleted again on drop.
    ///
    /// An existing file at `path` whose table of contents matches the basis size is
    /// reopened read-only instead of being recomputed.
    pub fn build(
        source: &impl ShellQuartetSource,
        config: PkConfig,
        path: Option<PathBuf>,
    ) -> Result<Self> {
        static SCRATCH_FILES: AtomicUsize = AtomicUsize::new(0);

        if let Some(existing) = path.as_deref().filter(|path| path.exists()) {
            match PkFile::open(existing) {
                Ok(file) if file.n_basis() == source.n_basis() => {
                    log::info!("reusing PK file {}", existing.display());
                    return Ok(Self::from_file(file));
                }
                Ok(file) => log::warn!(
                    "PK file {} was built for {} basis functions, not {}, recomputing",
                    existing.display(),
                    file.n_basis(),
                    source.n_basis()
                ),
                Err(error) => log::warn!(
                    "cannot reuse PK file {}: {error}, recomputing",
                    existing.display()
                ),
            }
        }

        let keep = path.is_some();
        let path = path.unwrap_or_else(|| {
            let number = SCRATCH_FILES.fetch_add(1, Ordering::Relaxed);
            std::env::temp_dir().join(format!("pkscf-{}-{number}.pk", std::process::id()))
        });

        let file = PkIntegralEngine::new(source, config)?.compute(path)?;
        Ok(Self {
            file: Some(file),
            keep,
        })
    }

    /// Use an existing file as is. It is never deleted.
    pub fn from_file(file: PkFile) -> Self {
        Self {
            file: Some(file),
            keep: true,
        }
    }
}

impl JkBuilder for PkJk {
    fn compute(&mut self, densities: &[DMatrix<f64>]) -> Result<JkMatrices> {
        let Some(file) = &self.file else {
            return Ok(JkMatrices {
                coulomb: Vec::new(),
                exchange: Vec::new(),
            });
        };

        Ok(JkMatrices {
            coulomb: file.form_j(densities)?,
            exchange: file.form_k(densities)?,
        })
    }
}

impl Drop for PkJk {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Some(file) = self.file.take() {
            if let Err(error) = file.remove() {
                log::warn!("could not remove scratch PK file: {error}");
            }
        }
    }
}

/// Recomputes every integral on each call.
pub struct DirectJk<'a, S> {
    source: &'a S,
}

impl<'a, S: ShellQuartetSource> DirectJk<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }
}

impl<S: ShellQuartetSource> JkBuilder for DirectJk<'_, S> {
    fn compute(&mut self, densities: &[DMatrix<f64>]) -> Result<JkMatrices> {
        let n = self.source.n_basis();
        let quartets = self
            .source
            .unique_shell_quartets()
            .into_iter()
            .filter(|&quartet| self.source.shell_significant(quartet))
            .collect::<Vec<_>>();

        let zeros = || JkMatrices {
            coulomb: vec![DMatrix::zeros(n, n); densities.len()],
            exchange: vec![DMatrix::zeros(n, n); densities.len()],
        };

        #[cfg(feature = "rayon")]
        let matrices = {
            use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

            quartets
                .par_iter()
                .fold(
                    || (zeros(), Vec::new()),
                    |(mut matrices, mut values), &quartet| {
                        accumulate(self.source, quartet, &mut values, densities, &mut matrices);
                        (matrices, values)
                    },
                )
                .map(|(matrices, _)| matrices)
                .reduce(|| zeros(), |mut a, b| {
                    a.add_assign(&b);
                    a
                })
        };

        #[cfg(not(feature = "rayon"))]
        let matrices = {
            let mut matrices = zeros();
            let mut values = Vec::new();
            for &quartet in &quartets {
                accumulate(self.source, quartet, &mut values, densities, &mut matrices);
            }
            matrices
        };

        Ok(matrices)
    }
}

impl JkMatrices {
    fn add_assign(&mut self, other: &JkMatrices) {
        for (a, b) in self.coulomb.iter_mut().zip(&other.coulomb) {
            *a += b;
        }
        for (a, b) in self.exchange.iter_mut().zip(&other.exchange) {
            *a += b;
        }
    }
}

fn accumulate(
    source: &impl ShellQuartetSource,
    quartet: ShellQuartet,
    values: &mut Vec<f64>,
    densities: &[DMatrix<f64>],
    matrices: &mut JkMatrices,
) {
    source.compute_shell_quartet(quartet, values);
    source.unique_integrals(quartet, values, |value, i, j, k, l| {
        let permutations = [
            (i, j, k, l),
            (j, i, k, l),
            (i, j, l, k),
            (j, i, l, k),
            (k, l, i, j),
            (l, k, i, j),
            (k, l, j, i),
            (l, k, j, i),
        ];

        for (n, &(p, q, r, s)) in permutations.iter().enumerate() {
            // coinciding indices make some permutations the same element
            if permutations[..n].contains(&(p, q, r, s)) {
                continue;
            }

            for ((density, coulomb), exchange) in densities
                .iter()
                .zip(&mut matrices.coulomb)
                .zip(&mut matrices.exchange)
            {
                coulomb[(p, q)] += value * density[(r, s)];
                exchange[(p, r)] += value * density[(q, s)];
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    use crate::{pk::PkConfig, testing::SyntheticSource};

    use super::{DirectJk, JkBuilder, PkJk};

    #[test]
    fn direct_and_pk_agree() {
        let source = SyntheticSource::new(&[2, 1, 2]);
        let density = DMatrix::from_fn(5, 5, |p, q| 0.1 * (p + q) as f64 - 0.05 * (p * q) as f64);

        let direct = DirectJk::new(&source).compute(&[density.clone()]).unwrap();

        let mut pk = PkJk::build(
            &source,
            PkConfig {
                memory: 100,
                ..PkConfig::default()
            },
            Some(crate::testing::scratch_path("direct_and_pk_agree")),
        )
        .unwrap();
        let stored = pk.compute(&[density.clone()]).unwrap();

        for p in 0..5 {
            for q in 0..5 {
                let mut j = 0.0;
                let mut k = 0.0;
                for r in 0..5 {
                    for s in 0..5 {
                        j += source.integral(p, q, r, s) * density[(r, s)];
                        k += source.integral(p, r, q, s) * density[(r, s)];
                    }
                }
                assert_relative_eq!(direct.coulomb[0][(p, q)], j, epsilon = 1e-12);
                assert_relative_eq!(direct.exchange[0][(p, q)], k, epsilon = 1e-12);
            }
        }
        assert_relative_eq!(stored.coulomb[0], direct.coulomb[0], epsilon = 1e-12);
        assert_relative_eq!(stored.exchange[0], direct.exchange[0], epsilon = 1e-12);

        if let Some(file) = pk.file.take() {
            file.remove().unwrap();
        }
    }
}

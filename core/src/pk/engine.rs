use std::{ops::Range, path::Path};

use crate::{
    error::Result,
    integrals::{ShellQuartet, ShellQuartetSource},
};

use super::{
    batch::{plan_batches, Batch},
    binner::{task_quartets, IntegralBinner},
    index::pk_size,
    storage::PkFile,
    writer::AsyncBufferWriter,
};

/// How integral evaluation is spread over threads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PkStrategy {
    /// One buffer pair that all threads accumulate into, one writer
    Serial,
    /// Independent workers, each with its own buffers and writer, owning an interleaved
    /// set of tasks
    Sharded {
        workers: usize,
        tasks_per_worker: usize,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PkConfig {
    /// Memory for integral buffers, in doubles
    pub memory: usize,
    /// Upper limit on the number of batches in the file
    pub max_batches: usize,
    pub strategy: PkStrategy,
}

impl Default for PkConfig {
    fn default() -> Self {
        Self {
            memory: 32_000_000,
            max_batches: 1000,
            strategy: PkStrategy::Serial,
        }
    }
}

/// Identifies a worker of the sharded strategy. Decides which tasks, buffers and writer
/// belong to that worker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WorkerToken(usize);

impl WorkerToken {
    pub fn all(workers: usize) -> impl Iterator<Item = WorkerToken> {
        (0..workers).map(WorkerToken)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Division of the supermatrix into tasks for the sharded strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShardPlan {
    pub workers: usize,
    pub n_tasks: usize,
    /// Quartet indices per task, which is also the size of every worker buffer
    pub task_size: usize,
    pub buffers_per_worker: usize,
    pk_size: usize,
}

impl ShardPlan {
    pub fn new(memory: usize, pk_size: usize, workers: usize, tasks_per_worker: usize) -> Self {
        let workers = workers.max(1);
        let memory_per_worker = memory / (2 * workers);
        let max_buffer = (memory_per_worker / 2).max(1);

        let n_tasks = (pk_size / max_buffer + 1).max(tasks_per_worker * workers);
        let task_size = (pk_size / n_tasks).max(1);
        let n_tasks = pk_size.div_ceil(task_size);
        // no worker needs more buffers than it has tasks
        let buffers_per_worker = (memory_per_worker / task_size)
            .min(n_tasks.div_ceil(workers))
            .max(2);

        Self {
            workers,
            n_tasks,
            task_size,
            buffers_per_worker,
            pk_size,
        }
    }

    pub fn task_window(&self, task: usize) -> Range<usize> {
        let start = task * self.task_size;
        start..(start + self.task_size).min(self.pk_size)
    }

    /// Tasks owned by a worker, in increasing order.
    pub fn tasks(&self, token: WorkerToken) -> impl Iterator<Item = usize> {
        (token.index()..self.n_tasks).step_by(self.workers)
    }
}

/// Computes all two-electron integrals of a [`ShellQuartetSource`] into a [`PkFile`].
pub struct PkIntegralEngine<'a, S> {
    source: &'a S,
    config: PkConfig,
    batches: Vec<Batch>,
}

impl<'a, S: ShellQuartetSource> PkIntegralEngine<'a, S> {
    /// Plan the batches. Fails if the memory cannot hold one row of the supermatrix or
    /// the batch count exceeds its limit.
    pub fn new(source: &'a S, config: PkConfig) -> Result<Self> {
        let n_basis = source.n_basis();
        let batches = plan_batches(n_basis, config.memory, config.max_batches)?;

        log::info!(
            "PK engine: {n_basis} basis functions, {} unique integrals in {} batches",
            pk_size(n_basis),
            batches.len()
        );

        Ok(Self {
            source,
            config,
            batches,
        })
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Create the file at `path` and fill it with the J and K supermatrices.
    ///
    /// A file whose fill fails is deleted again.
    pub fn compute(&self, path: impl AsRef<Path>) -> Result<PkFile> {
        let file = PkFile::create(path, self.source.n_basis(), self.batches.clone())?;
        self.fill(file)
    }

    fn fill(&self, file: PkFile) -> Result<PkFile> {
        let size = pk_size(self.source.n_basis());
        if size == 0 {
            log::warn!("no basis functions, the PK file stays empty");
            return Ok(file);
        }

        let filled = match self.config.strategy {
            PkStrategy::Serial => self.compute_serial(&file),
            PkStrategy::Sharded {
                workers,
                tasks_per_worker,
            } => {
                let plan = ShardPlan::new(self.config.memory, size, workers, tasks_per_worker);
                self.compute_sharded(&file, &plan)
            }
        };

        match filled {
            Ok(()) => Ok(file),
            Err(error) => {
                let path = file.path().to_path_buf();
                if let Err(cleanup) = file.remove() {
                    log::warn!("could not remove incomplete PK file {}: {cleanup}", path.display());
                }
                Err(error)
            }
        }
    }

    fn compute_serial(&self, file: &PkFile) -> Result<()> {
        let size = pk_size(self.source.n_basis());
        // a buffer larger than the supermatrix would only hold zeros
        let buffer_size = (self.config.memory / 4).max(1).min(size);
        let n_buffers = (size - 1) / buffer_size + 1;

        log::info!("serial PK: {n_buffers} buffers of {buffer_size} integrals");

        let mut writer = AsyncBufferWriter::new(file, 2, buffer_size)?;
        for buffer_index in 0..n_buffers {
            let start = buffer_index * buffer_size;
            let window = start..(start + buffer_size).min(size);
            let quartets = task_quartets(self.source, &window);

            let buffer = writer.begin(start)?;
            fill_parallel(self.source, &quartets, IntegralBinner::new(buffer));
            writer.flush(file)?;
        }

        writer.synchronize()
    }

    fn compute_sharded(&self, file: &PkFile, plan: &ShardPlan) -> Result<()> {
        log::info!(
            "sharded PK: {} workers, {} tasks of {} integrals, {} buffers per worker",
            plan.workers,
            plan.n_tasks,
            plan.task_size,
            plan.buffers_per_worker
        );

        #[cfg(feature = "rayon")]
        let result = {
            use rayon::iter::{ParallelBridge, ParallelIterator};

            WorkerToken::all(plan.workers)
                .par_bridge()
                .try_for_each(|token| self.run_worker(token, plan, file))
        };

        #[cfg(not(feature = "rayon"))]
        let result =
            WorkerToken::all(plan.workers).try_for_each(|token| self.run_worker(token, plan, file));

        result
    }

    /// Compute and write every task owned by `token`.
    ///
    /// The relevant quartets of all tasks are collected before any integral is evaluated.
    pub fn run_worker(&self, token: WorkerToken, plan: &ShardPlan, file: &PkFile) -> Result<()> {
        let tasks = plan
            .tasks(token)
            .map(|task| (task, task_quartets(self.source, &plan.task_window(task))))
            .collect::<Vec<_>>();

        let mut writer = AsyncBufferWriter::new(file, plan.buffers_per_worker, plan.task_size)?;
        for (task, quartets) in &tasks {
            let buffer = writer.begin(plan.task_window(*task).start)?;
            fill_sequential(self.source, quartets, IntegralBinner::new(buffer));
            writer.flush(file)?;
        }
        writer.synchronize()?;

        log::debug!("worker {} finished {} tasks", token.index(), tasks.len());
        Ok(())
    }
}

fn fill_sequential(
    source: &impl ShellQuartetSource,
    quartets: &[ShellQuartet],
    binner: IntegralBinner,
) {
    let mut values = Vec::new();
    for &quartet in quartets {
        source.compute_shell_quartet(quartet, &mut values);
        source.unique_integrals(quartet, &values, |value, i, j, k, l| {
            binner.fill(value, i, j, k, l)
        });
    }
}

#[cfg(feature = "rayon")]
fn fill_parallel(
    source: &impl ShellQuartetSource,
    quartets: &[ShellQuartet],
    binner: IntegralBinner,
) {
    use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

    quartets
        .par_iter()
        .for_each_init(Vec::new, |values, &quartet| {
            source.compute_shell_quartet(quartet, values);
            source.unique_integrals(quartet, values, |value, i, j, k, l| {
                binner.fill(value, i, j, k, l)
            });
        });
}

#[cfg(not(feature = "rayon"))]
fn fill_parallel(
    source: &impl ShellQuartetSource,
    quartets: &[ShellQuartet],
    binner: IntegralBinner,
) {
    fill_sequential(source, quartets, binner)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use crate::{
        error::ScfError,
        integrals::ShellQuartetSource,
        pk::{
            buffer::Stream,
            index::{index4, pk_size},
            storage::{label, PkFile},
        },
        testing::{scratch_path, SyntheticSource},
    };

    use super::{PkConfig, PkIntegralEngine, PkStrategy, ShardPlan, WorkerToken};

    fn reference(
        source: &SyntheticSource,
        density: &DMatrix<f64>,
    ) -> (DMatrix<f64>, DMatrix<f64>) {
        let n = source.n_basis();
        let mut j = DMatrix::zeros(n, n);
        let mut k = DMatrix::zeros(n, n);
        for (p, q, r, s) in itertools::iproduct!(0..n, 0..n, 0..n, 0..n) {
            j[(p, q)] += source.integral(p, q, r, s) * density[(r, s)];
            k[(p, q)] += source.integral(p, r, q, s) * density[(r, s)];
        }
        (j, k)
    }

    fn random_density(n: usize, seed: u64) -> DMatrix<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let matrix = DMatrix::from_fn(n, n, |_, _| rng.gen_range(-1.0..1.0));
        &matrix + matrix.transpose()
    }

    #[test]
    fn round_trip_matches_direct_contraction() {
        let source = SyntheticSource::new(&[2, 1, 1]);
        let path = scratch_path("pk_round_trip");

        let config = PkConfig {
            memory: 20,
            max_batches: 100,
            strategy: PkStrategy::Serial,
        };
        let engine = PkIntegralEngine::new(&source, config).unwrap();
        assert!(engine.batches().len() > 1);
        let file = engine.compute(&path).unwrap();

        let densities = [DMatrix::identity(4, 4) * 0.5, random_density(4, 7)];
        let js = file.form_j(&densities).unwrap();
        let ks = file.form_k(&densities).unwrap();

        for ((density, j), k) in densities.iter().zip(&js).zip(&ks) {
            let (j_ref, k_ref) = reference(&source, density);
            assert_relative_eq!(*j, j_ref, epsilon = 1e-12);
            assert_relative_eq!(*k, k_ref, epsilon = 1e-12);
        }

        // reading never changes the file
        assert_eq!(file.form_j(&densities).unwrap(), js);
        assert_eq!(file.form_k(&densities).unwrap(), ks);

        file.remove().unwrap();
    }

    #[test]
    fn sharded_and_serial_agree() {
        let source = SyntheticSource::new(&[1, 3, 2]);
        let density = random_density(source.n_basis(), 11);

        let mut results = Vec::new();
        for (name, strategy) in [
            ("pk_serial", PkStrategy::Serial),
            (
                "pk_sharded",
                PkStrategy::Sharded {
                    workers: 3,
                    tasks_per_worker: 4,
                },
            ),
        ] {
            let config = PkConfig {
                memory: 60,
                max_batches: 100,
                strategy,
            };
            let file = PkIntegralEngine::new(&source, config)
                .unwrap()
                .compute(scratch_path(name))
                .unwrap();

            let j = file.form_j(&[density.clone()]).unwrap().remove(0);
            let k = file.form_k(&[density.clone()]).unwrap().remove(0);
            file.remove().unwrap();
            results.push((j, k));
        }

        let (j_ref, k_ref) = reference(&source, &density);
        for (j, k) in results {
            assert_relative_eq!(j, j_ref, epsilon = 1e-12);
            assert_relative_eq!(k, k_ref, epsilon = 1e-12);
        }
    }

    #[test]
    fn single_self_paired_integral_is_halved() {
        let source = SyntheticSource::with_integrals(&[1, 1, 1], |i, j, k, l| {
            if (i, j, k, l) == (1, 1, 1, 1) {
                0.8
            } else {
                0.0
            }
        });
        let path = scratch_path("pk_halving");
        let config = PkConfig {
            memory: 1000,
            ..PkConfig::default()
        };
        let file = PkIntegralEngine::new(&source, config)
            .unwrap()
            .compute(&path)
            .unwrap();

        let j = file.read_record(&label(Stream::J, 0)).unwrap();
        let k = file.read_record(&label(Stream::K, 0)).unwrap();
        let index = index4(1, 1, 1, 1);
        assert_eq!(j[index], 0.4);
        assert_eq!(k[index], 0.4);
        assert_eq!(j.iter().filter(|&&value| value != 0.0).count(), 1);

        let mut density = DMatrix::zeros(3, 3);
        density[(1, 1)] = 1.0;
        let coulomb = file.form_j(&[density]).unwrap().remove(0);
        assert_relative_eq!(coulomb[(1, 1)], 0.8);

        file.remove().unwrap();
    }

    #[test]
    fn shard_plan() {
        let plan = ShardPlan::new(1000, 55, 2, 3);
        assert_eq!(plan.n_tasks, 7);
        assert_eq!(plan.task_size, 9);
        assert_eq!(plan.buffers_per_worker, 4);

        let first = WorkerToken::all(2).next().unwrap();
        assert_eq!(plan.tasks(first).collect::<Vec<_>>(), vec![0, 2, 4, 6]);
        assert_eq!(plan.task_window(6), 54..55);

        // windows of all workers tile the supermatrix
        let mut covered = WorkerToken::all(2)
            .flat_map(|token| plan.tasks(token).map(|task| plan.task_window(task)))
            .collect::<Vec<_>>();
        covered.sort_by_key(|window| window.start);
        assert_eq!(covered.first().map(|window| window.start), Some(0));
        for pair in covered.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(covered.last().map(|window| window.end), Some(pk_size(4)));
    }

    #[test]
    fn rejects_tiny_memory() {
        let source = SyntheticSource::new(&[3, 3]);
        let config = PkConfig {
            memory: 20,
            ..PkConfig::default()
        };
        assert!(matches!(
            PkIntegralEngine::new(&source, config),
            Err(ScfError::InsufficientMemory {
                memory: 20,
                required: 21
            })
        ));
    }

    #[test]
    fn empty_basis_gives_empty_file() {
        let source = SyntheticSource::new(&[]);
        let path = scratch_path("pk_empty");

        for strategy in [
            PkStrategy::Serial,
            PkStrategy::Sharded {
                workers: 2,
                tasks_per_worker: 3,
            },
        ] {
            let config = PkConfig {
                strategy,
                ..PkConfig::default()
            };
            let file = PkIntegralEngine::new(&source, config)
                .unwrap()
                .compute(&path)
                .unwrap();

            assert_eq!(file.n_basis(), 0);
            assert!(file.batches().iter().all(|batch| batch.is_empty()));
            file.remove().unwrap();
        }
    }

    #[test]
    fn failed_fill_removes_the_file() {
        let source = SyntheticSource::new(&[2, 1]);
        let path = scratch_path("pk_failed_fill");
        let toc = std::path::PathBuf::from(format!("{}.toc.json", path.display()));

        for strategy in [
            PkStrategy::Serial,
            PkStrategy::Sharded {
                workers: 2,
                tasks_per_worker: 2,
            },
        ] {
            let config = PkConfig {
                memory: 100,
                max_batches: 100,
                strategy,
            };
            let engine = PkIntegralEngine::new(&source, config).unwrap();
            let file = PkFile::create(&path, source.n_basis(), engine.batches().to_vec()).unwrap();

            // writers cannot open a data file that is gone
            std::fs::remove_file(&path).unwrap();
            assert!(toc.exists());

            assert!(matches!(engine.fill(file), Err(ScfError::Io(_))));
            assert!(!toc.exists());
            assert!(!path.exists());
        }
    }
}

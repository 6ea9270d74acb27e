use std::{fs::File, io::BufReader, path::PathBuf, time::Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use pkscf_core::{
    basis::{BasisSet, MolecularBasis},
    config::{ConfigBasisSet, ConfigMolecule, GuessKind, Reference, ScfOptions},
    hf::{ScfEngine, ScfStatus},
    integrals::BasisQuartetSource,
    molecule::Molecule,
    pk::{PkConfig, PkIntegralEngine, PkStrategy},
};
use serde::de::DeserializeOwned;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: PkscfCommand,
}

#[derive(Subcommand, Debug)]
enum PkscfCommand {
    /// Run a Hartree-Fock calculation
    Scf {
        /// Basis set in Basis Set Exchange JSON format
        #[arg(long, short)]
        basis_set: PathBuf,
        /// A path to the molecule to perform the calculation on
        #[arg(long, short)]
        molecule: PathBuf,
        /// JSON object of SCF options, e.g. {"REFERENCE": "UHF", "MULTP": 3}
        #[arg(long, short)]
        options: Option<PathBuf>,
        #[arg(long, allow_hyphen_values = true)]
        charge: Option<i32>,
        #[arg(long)]
        multiplicity: Option<u32>,
        /// The maximum number of iterations the SCF loop should attempt
        #[arg(long)]
        max_iterations: Option<usize>,
        /// RHF or UHF
        #[arg(long)]
        reference: Option<String>,
        /// CORE or SAD
        #[arg(long)]
        guess: Option<String>,
        /// Recompute the two-electron integrals on every iteration
        #[arg(long)]
        direct: bool,
        /// Build the PK supermatrix with this many workers
        #[arg(long)]
        pk_workers: Option<usize>,
        /// Where to write the density grid, if SAVE_CARTESIAN_GRID is set
        #[arg(long, default_value = "density_grid.json")]
        grid_output: PathBuf,
    },
    /// Compute the PK supermatrix of a molecule and store it
    Pk {
        #[arg(long, short)]
        basis_set: PathBuf,
        #[arg(long, short)]
        molecule: PathBuf,
        /// The PK data file, its table of contents is written next to it
        #[arg(long)]
        output: PathBuf,
        /// Memory for integral buffers, in doubles
        #[arg(long, default_value_t = 32_000_000)]
        memory: usize,
        #[arg(long, default_value_t = 1000)]
        max_batches: usize,
        #[arg(long, default_value_t = 1)]
        workers: usize,
        #[arg(long, default_value_t = 100)]
        tasks_per_worker: usize,
        #[arg(long, default_value_t = 0.0)]
        schwarz_cutoff: f64,
    },
}

fn load_json<T: DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("could not parse {}", path.display()))
}

fn load_system(basis_set: &PathBuf, molecule: &PathBuf) -> anyhow::Result<(Molecule, MolecularBasis)> {
    let basis_set = BasisSet::try_from(load_json::<ConfigBasisSet>(basis_set)?)?;
    let molecule = Molecule::try_from(load_json::<ConfigMolecule>(molecule)?)?;
    let basis = MolecularBasis::new(&molecule, &basis_set)?;
    log::info!(
        "{} atoms, {} shells, {} basis functions",
        molecule.atoms().len(),
        basis.shells().len(),
        basis.n_basis()
    );
    Ok((molecule, basis))
}

/// Parse an upper-case option value the same way an options file would be parsed.
fn parse_keyword<T: DeserializeOwned>(value: &str) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_ascii_uppercase()))
        .with_context(|| format!("unknown value {value}"))
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();

    match args.command {
        PkscfCommand::Scf {
            basis_set,
            molecule,
            options,
            charge,
            multiplicity,
            max_iterations,
            reference,
            guess,
            direct,
            pk_workers,
            grid_output,
        } => {
            let (molecule, basis) = load_system(&basis_set, &molecule)?;

            let mut options = match options {
                Some(path) => load_json::<ScfOptions>(&path)?,
                None => ScfOptions::default(),
            };
            if let Some(charge) = charge {
                options.charge = charge;
            }
            if multiplicity.is_some() {
                options.multiplicity = multiplicity;
            }
            if let Some(max_iterations) = max_iterations {
                options.max_iterations = max_iterations;
            }
            if let Some(reference) = reference {
                options.reference = parse_keyword::<Reference>(&reference)?;
            }
            if let Some(guess) = guess {
                options.guess = parse_keyword::<GuessKind>(&guess)?;
            }
            if let Some(pk_workers) = pk_workers {
                options.pk_workers = pk_workers;
            }
            options.direct |= direct;

            let start = Instant::now();
            let mut engine = ScfEngine::new(&molecule, &basis, options)?;
            let output = engine.run()?;

            match output.status {
                ScfStatus::Converged => println!(
                    "{:?} converged after {} iterations and {:0.2?}",
                    output.reference,
                    output.iterations,
                    start.elapsed()
                ),
                ScfStatus::NotConverged => println!(
                    "{:?} did not converge after {} iterations (dE {:.3e}, drms {:.3e})",
                    output.reference, output.iterations, output.energy_change, output.density_rms
                ),
            }
            println!("electronic energy: {:.10}", output.electronic_energy);
            println!("nuclear repulsion energy: {:.10}", output.nuclear_repulsion);
            println!("total energy: {:.10}", output.total_energy);
            println!("orbital energies alpha: {:.5}", output.alpha.energies.transpose());
            if output.reference == Reference::Uhf {
                println!("orbital energies beta: {:.5}", output.beta.energies.transpose());
            }
            println!(
                "occupation: DOCC {:?} SOCC {:?}",
                output.occupation.docc, output.occupation.socc
            );
            println!(
                "dipole moment: {:.6} {:.6} {:.6}",
                output.dipole.x, output.dipole.y, output.dipole.z
            );
            println!("second moments (xx xy xz yy yz zz): {:.6?}", output.quadrupole);
            println!("Löwdin charges: {:.4?}", output.charges);

            if let Some(grid) = &output.density_grid {
                grid.save(&grid_output)?;
                println!("density grid written to {}", grid_output.display());
            }
        }
        PkscfCommand::Pk {
            basis_set,
            molecule,
            output,
            memory,
            max_batches,
            workers,
            tasks_per_worker,
            schwarz_cutoff,
        } => {
            let (_, basis) = load_system(&basis_set, &molecule)?;
            let source = BasisQuartetSource::new(&basis, schwarz_cutoff);

            let strategy = if workers > 1 {
                PkStrategy::Sharded {
                    workers,
                    tasks_per_worker,
                }
            } else {
                PkStrategy::Serial
            };
            let config = PkConfig {
                memory,
                max_batches,
                strategy,
            };

            let start = Instant::now();
            let file = PkIntegralEngine::new(&source, config)?.compute(&output)?;
            println!(
                "PK supermatrix for {} basis functions written in {:0.2?}",
                file.n_basis(),
                start.elapsed()
            );
            println!("{:>6} {:>10} {:>10} {:>14} {:>14}", "batch", "pq min", "pq max", "index min", "index max");
            for (number, batch) in file.batches().iter().enumerate() {
                println!(
                    "{number:>6} {:>10} {:>10} {:>14} {:>14}",
                    batch.pq_min, batch.pq_max, batch.index_min, batch.index_max
                );
            }
        }
    }

    Ok(())
}

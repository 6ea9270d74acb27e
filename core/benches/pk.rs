use std::error::Error;

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::DMatrix;
use pkscf_core::{
    basis::MolecularBasis,
    integrals::BasisQuartetSource,
    molecule::Molecule,
    pk::{PkConfig, PkIntegralEngine, PkStrategy},
    testing::{self, SIX_31G, STO_3G},
};

struct Instance {
    name: &'static str,
    basis: MolecularBasis,
}

fn instance(name: &'static str, molecule: &Molecule, basis_set: &str) -> Result<Instance, Box<dyn Error>> {
    Ok(Instance {
        name,
        basis: MolecularBasis::new(molecule, &testing::basis_set(basis_set))?,
    })
}

fn bench_construction(c: &mut Criterion, instances: &[Instance]) {
    let strategies = [
        ("serial", PkStrategy::Serial),
        (
            "sharded",
            PkStrategy::Sharded {
                workers: 4,
                tasks_per_worker: 10,
            },
        ),
    ];

    for instance in instances {
        let source = BasisQuartetSource::new(&instance.basis, 1e-12);
        for (strategy_name, strategy) in strategies {
            let path = testing::scratch_path(&format!("bench-{}-{strategy_name}.pk", instance.name));
            let config = PkConfig {
                memory: 1_000_000,
                strategy,
                ..PkConfig::default()
            };

            c.bench_function(&format!("PK {strategy_name} {}", instance.name), |b| {
                b.iter(|| {
                    PkIntegralEngine::new(&source, config)
                        .and_then(|engine| engine.compute(&path))
                        .map(|file| file.remove())
                })
            });
        }
    }
}

fn bench_jk(c: &mut Criterion, instances: &[Instance]) -> Result<(), Box<dyn Error>> {
    for instance in instances {
        let source = BasisQuartetSource::new(&instance.basis, 1e-12);
        let path = testing::scratch_path(&format!("bench-jk-{}.pk", instance.name));
        let file = PkIntegralEngine::new(&source, PkConfig::default())?.compute(&path)?;

        let n = instance.basis.n_basis();
        let density = DMatrix::from_fn(n, n, |p, q| 1.0 / (1.0 + p as f64 + q as f64));
        let densities = [density];

        c.bench_function(&format!("J {}", instance.name), |b| {
            b.iter(|| file.form_j(&densities))
        });
        c.bench_function(&format!("K {}", instance.name), |b| {
            b.iter(|| file.form_k(&densities))
        });

        file.remove()?;
    }

    Ok(())
}

fn bench_pk(c: &mut Criterion) -> Result<(), Box<dyn Error>> {
    let water = pkscf_core::molecule! {
        O => (0.0, 0.0, 0.0),
        H => (0.0, 1.43, 1.1),
        H => (0.0, -1.43, 1.1)
    };
    let ethylene = pkscf_core::molecule! {
        C => (0.0, 0.0, 1.26),
        C => (0.0, 0.0, -1.26),
        H => (0.0, 1.74, 2.33),
        H => (0.0, -1.74, 2.33),
        H => (0.0, 1.74, -2.33),
        H => (0.0, -1.74, -2.33)
    };

    let instances = [
        instance("water STO-3G", &water, STO_3G)?,
        instance("water 6-31G", &water, SIX_31G)?,
        instance("ethylene STO-3G", &ethylene, STO_3G)?,
    ];

    bench_construction(c, &instances);
    bench_jk(c, &instances)?;

    Ok(())
}

fn bench(c: &mut Criterion) {
    bench_pk(c).unwrap();
}

criterion_group!(benches, bench);
criterion_main!(benches);

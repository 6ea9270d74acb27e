pub mod atom;
pub mod basis;
pub mod config;
mod diis;
pub mod error;
pub mod hf;
pub mod integrals;
pub mod molecule;
pub mod periodic_table;
pub mod pk;

pub use error::{Result, ScfError};

/// Builds a [`molecule::Molecule`] from `Element => (x, y, z)` entries, coordinates in bohr.
#[macro_export]
macro_rules! molecule {
    ($(
        $element:ident => ($x:expr, $y:expr, $z:expr)
    ),* $(,)?) => {
        $crate::molecule::Molecule::new(vec![
            $($crate::atom::Atom::new(
                $crate::periodic_table::ElementType::$element,
                ::nalgebra::Vector3::new($x, $y, $z),
            )),*
        ])
    };
}

/// Shared fixtures for the unit tests and benchmarks.
#[doc(hidden)]
pub mod testing {
    use std::path::PathBuf;

    use crate::{
        basis::BasisSet,
        config::ConfigBasisSet,
        integrals::{ShellQuartet, ShellQuartetSource},
        pk::index::index2,
    };

    pub const STO_3G: &str = r#"{"molssi_bse_schema":{"schema_type":"complete","schema_version":"0.1"},"revision_description":"DatafromGaussian09","revision_date":"2018-06-19","elements":{"1":{"electron_shells":[{"function_type":"gto","region":"","angular_momentum":[0],"exponents":["0.3425250914E+01","0.6239137298E+00","0.1688554040E+00"],"coefficients":[["0.1543289673E+00","0.5353281423E+00","0.4446345422E+00"]]}]},"2":{"electron_shells":[{"function_type":"gto","region":"","angular_momentum":[0],"exponents":["0.6362421394E+01","0.1158922999E+01","0.3136497915E+00"],"coefficients":[["0.1543289673E+00","0.5353281423E+00","0.4446345422E+00"]]}]},"6":{"electron_shells":[{"function_type":"gto","region":"","angular_momentum":[0],"exponents":["0.7161683735E+02","0.1304509632E+02","0.3530512160E+01"],"coefficients":[["0.1543289673E+00","0.5353281423E+00","0.4446345422E+00"]]},{"function_type":"gto","region":"","angular_momentum":[0,1],"exponents":["0.2941249355E+01","0.6834830964E+00","0.2222899159E+00"],"coefficients":[["-0.9996722919E-01","0.3995128261E+00","0.7001154689E+00"],["0.1559162750E+00","0.6076837186E+00","0.3919573931E+00"]]}]},"8":{"electron_shells":[{"function_type":"gto","region":"","angular_momentum":[0],"exponents":["0.1307093214E+03","0.2380886605E+02","0.6443608313E+01"],"coefficients":[["0.1543289673E+00","0.5353281423E+00","0.4446345422E+00"]]},{"function_type":"gto","region":"","angular_momentum":[0,1],"exponents":["0.5033151319E+01","0.1169596125E+01","0.3803889600E+00"],"coefficients":[["-0.9996722919E-01","0.3995128261E+00","0.7001154689E+00"],["0.1559162750E+00","0.6076837186E+00","0.3919573931E+00"]]}]}},"version":"1","function_types":["gto"],"names":["STO-3G"],"tags":[],"family":"sto","description":"STO-3GMinimalBasis(3functions/AO)","role":"orbital","auxiliaries":{},"name":"STO-3G"}"#;

    pub const SIX_31G: &str = r#"{"molssi_bse_schema":{"schema_type":"complete","schema_version":"0.1"},"revision_description":"DatafromGaussian09/GAMESS","revision_date":"2018-06-19","elements":{"1":{"electron_shells":[{"function_type":"gto","region":"valence","angular_momentum":[0],"exponents":["0.1873113696E+02","0.2825394365E+01","0.6401216923E+00"],"coefficients":[["0.3349460434E-01","0.2347269535E+00","0.8137573261E+00"]]},{"function_type":"gto","region":"valence","angular_momentum":[0],"exponents":["0.1612777588E+00"],"coefficients":[["1.0000000"]]}]},"8":{"electron_shells":[{"function_type":"gto","region":"valence","angular_momentum":[0],"exponents":["0.5484671660E+04","0.8252349460E+03","0.1880469580E+03","0.5296450000E+02","0.1689757040E+02","0.5799635340E+01"],"coefficients":[["0.1831074430E-02","0.1395017220E-01","0.6844507810E-01","0.2327143360E+00","0.4701928980E+00","0.3585208530E+00"]]},{"function_type":"gto","region":"valence","angular_momentum":[0,1],"exponents":["0.1553961625E+02","0.3599933586E+01","0.1013761750E+01"],"coefficients":[["-0.1107775495E+00","-0.1480262627E+00","0.1130767015E+01"],["0.7087426823E-01","0.3397528391E+00","0.7271585773E+00"]]},{"function_type":"gto","region":"valence","angular_momentum":[0,1],"exponents":["0.2700058226E+00"],"coefficients":[["0.1000000000E+01"],["0.1000000000E+01"]]}]}},"version":"1","function_types":["gto"],"names":["6-31G"],"tags":[],"family":"pople","description":"6-31Gvalencedouble-zeta","role":"orbital","auxiliaries":{},"name":"6-31G"}"#;

    pub fn basis_set(json: &str) -> BasisSet {
        let config: ConfigBasisSet = serde_json::from_str(json).unwrap();
        BasisSet::try_from(config).unwrap()
    }

    /// A file name under the temp directory that no other test uses.
    pub fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pkscf-{}-{name}", std::process::id()))
    }

    /// Integrals from a closed formula over shells of the given sizes, so PK bookkeeping can
    /// be checked without any Gaussian algebra.
    pub struct SyntheticSource {
        shell_sizes: Vec<usize>,
        offsets: Vec<usize>,
        integral: fn(usize, usize, usize, usize) -> f64,
    }

    impl SyntheticSource {
        pub fn new(shell_sizes: &[usize]) -> Self {
            Self::with_integrals(shell_sizes, |i, j, k, l| {
                let (pq, rs) = (index2(i, j) as f64, index2(k, l) as f64);
                1.0 / (1.0 + pq + rs) + 0.01 * pq * rs
            })
        }

        /// `integral` has to have the 8-fold permutational symmetry of real integrals.
        pub fn with_integrals(
            shell_sizes: &[usize],
            integral: fn(usize, usize, usize, usize) -> f64,
        ) -> Self {
            let offsets = shell_sizes
                .iter()
                .scan(0, |offset, &size| {
                    let first = *offset;
                    *offset += size;
                    Some(first)
                })
                .collect();

            Self {
                shell_sizes: shell_sizes.to_vec(),
                offsets,
                integral,
            }
        }

        pub fn integral(&self, i: usize, j: usize, k: usize, l: usize) -> f64 {
            (self.integral)(i, j, k, l)
        }
    }

    impl ShellQuartetSource for SyntheticSource {
        fn n_shells(&self) -> usize {
            self.shell_sizes.len()
        }

        fn n_basis(&self) -> usize {
            self.shell_sizes.iter().sum()
        }

        fn shell_to_basis_function(&self, shell: usize) -> usize {
            self.offsets[shell]
        }

        fn shell_size(&self, shell: usize) -> usize {
            self.shell_sizes[shell]
        }

        fn shell_significant(&self, _: ShellQuartet) -> bool {
            true
        }

        fn compute_shell_quartet(&self, quartet: ShellQuartet, values: &mut Vec<f64>) {
            let ShellQuartet { p, q, r, s } = quartet;
            let functions = |shell: usize| self.offsets[shell]..self.offsets[shell] + self.shell_sizes[shell];

            values.clear();
            for i in functions(p) {
                for j in functions(q) {
                    for k in functions(r) {
                        for l in functions(s) {
                            values.push(self.integral(i, j, k, l));
                        }
                    }
                }
            }
        }
    }
}

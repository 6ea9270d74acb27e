use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Function of the form K*x^i*y^j*z^k*exp(-alpha*x^2)
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gaussian {
    pub exponent: f64,
    /// The coefficient of this gaussian and optionally the normalization constant
    pub coefficient: f64,
    /// (i, j, k) exponents of polynomial terms
    pub angular: (i32, i32, i32),
}

impl Gaussian {
    pub fn norm(exponent: f64, angular: (i32, i32, i32)) -> f64 {
        let (i, j, k) = angular;

        (std::f64::consts::FRAC_2_PI * exponent)
            .powi(3)
            .sqrt()
            .sqrt()
            * f64::sqrt(
                (8.0 * exponent).powi(i + j + k)
                    / ((i + 1..=2 * i).product::<i32>()
                        * (j + 1..=2 * j).product::<i32>()
                        * (k + 1..=2 * k).product::<i32>()) as f64,
            )
    }

    pub fn angular_magnitude(&self) -> i32 {
        let (i, j, k) = self.angular;
        i + j + k
    }
}

/// Linear combination of many [`Gaussian`]s
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractedGaussian(pub SmallVec<[Gaussian; 6]>);

impl ContractedGaussian {
    /// Overlap of this function with itself when placed on a single center.
    pub fn self_overlap(&self) -> f64 {
        let ContractedGaussian(primitives) = self;

        let mut overlap = 0.0;
        for (a, b) in itertools::iproduct!(primitives, primitives) {
            let p = a.exponent + b.exponent;
            let (i, j, k) = a.angular;

            let polynomial = [i, j, k]
                .into_iter()
                .map(|l| double_factorial(2 * l - 1) / (2.0 * p).powi(l))
                .product::<f64>();

            overlap += a.coefficient
                * b.coefficient
                * polynomial
                * (std::f64::consts::PI / p).powi(3).sqrt();
        }
        overlap
    }

    /// Rescale the contraction coefficients such that the function has unit norm.
    pub fn normalized(self) -> Self {
        let scale = self.self_overlap().sqrt().recip();
        let ContractedGaussian(primitives) = self;

        ContractedGaussian(
            primitives
                .into_iter()
                .map(|primitive| Gaussian {
                    coefficient: primitive.coefficient * scale,
                    ..primitive
                })
                .collect(),
        )
    }

    pub fn angular(&self) -> (i32, i32, i32) {
        self.0.first().map(|g| g.angular).unwrap_or((0, 0, 0))
    }
}

fn double_factorial(n: i32) -> f64 {
    (1..=n).rev().step_by(2).map(|x| x as f64).product()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasisFunction {
    /// The type of basis function this basis function has
    pub contracted_gaussian: ContractedGaussian,
    /// The position of this basis function, in natural units
    pub position: Vector3<f64>,
}

impl BasisFunction {
    /// Evaluate this basis function at a given position
    pub fn evaluate(&self, at: Vector3<f64>) -> f64 {
        let r = at - self.position;
        let r_squared = r.norm_squared();

        let ContractedGaussian(primitives) = &self.contracted_gaussian;
        primitives
            .iter()
            .map(|primitive| {
                let (i, j, k) = primitive.angular;
                primitive.coefficient
                    * r.x.powi(i)
                    * r.y.powi(j)
                    * r.z.powi(k)
                    * (-primitive.exponent * r_squared).exp()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use smallvec::smallvec;

    use super::{ContractedGaussian, Gaussian};

    #[test]
    fn normalized_primitives_have_unit_overlap() {
        for angular in [(0, 0, 0), (1, 0, 0), (0, 2, 0), (1, 1, 0)] {
            let primitive = Gaussian {
                exponent: 0.8,
                coefficient: Gaussian::norm(0.8, angular),
                angular,
            };

            let contracted = ContractedGaussian(smallvec![primitive]);
            assert_relative_eq!(contracted.self_overlap(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn renormalizes_contractions() {
        let contracted = ContractedGaussian(smallvec![
            Gaussian {
                exponent: 3.0,
                coefficient: 0.7,
                angular: (0, 0, 1),
            },
            Gaussian {
                exponent: 0.4,
                coefficient: 0.5,
                angular: (0, 0, 1),
            },
        ]);

        assert_relative_eq!(contracted.normalized().self_overlap(), 1.0, epsilon = 1e-12);
    }
}

//! McMurchie Davidon integration scheme.
//! Reference:
//!
//! [1] Goings, J. Integrals. https://joshuagoings.com/2017/04/28/integrals/
use nalgebra::Vector3;
use smallvec::SmallVec;

use crate::{
    atom::Atom,
    basis::{BasisFunction, ContractedGaussian, Gaussian},
};

use super::{
    utils::{boys_table, coulomb_auxiliary, hermite_expansion},
    Integrator,
};

#[derive(Copy, Clone, Debug, Default)]
pub struct McMurchieDavidson;

impl Integrator for McMurchieDavidson {
    type Function = BasisFunction;

    fn overlap(&self, functions: (&Self::Function, &Self::Function)) -> f64 {
        let (basis_a, basis_b) = functions;
        let ContractedGaussian(data_a) = &basis_a.contracted_gaussian;
        let ContractedGaussian(data_b) = &basis_b.contracted_gaussian;
        let diff = basis_a.position - basis_b.position;

        let mut output = 0.0;
        for (&primitive_a, &primitive_b) in itertools::iproduct!(data_a, data_b) {
            output += primitive_a.coefficient
                * primitive_b.coefficient
                * primitive_overlap(primitive_a, primitive_b, diff);
        }
        output
    }

    fn kinetic(&self, functions: (&Self::Function, &Self::Function)) -> f64 {
        let (basis_a, basis_b) = functions;
        let ContractedGaussian(data_a) = &basis_a.contracted_gaussian;
        let ContractedGaussian(data_b) = &basis_b.contracted_gaussian;
        let diff = basis_a.position - basis_b.position;

        let mut output = 0.0;
        for (&primitive_a, &primitive_b) in itertools::iproduct!(data_a, data_b) {
            output += primitive_a.coefficient
                * primitive_b.coefficient
                * primitive_kinetic(primitive_a, primitive_b, diff);
        }
        output
    }

    fn nuclear(&self, functions: (&Self::Function, &Self::Function), nuclei: &[Atom]) -> f64 {
        let (basis_a, basis_b) = functions;
        let ContractedGaussian(data_a) = &basis_a.contracted_gaussian;
        let ContractedGaussian(data_b) = &basis_b.contracted_gaussian;
        let diff = basis_a.position - basis_b.position;

        let mut output = 0.0;
        for (&primitive_a, &primitive_b) in itertools::iproduct!(data_a, data_b) {
            let product_center = product_center(
                basis_a.position,
                primitive_a.exponent,
                basis_b.position,
                primitive_b.exponent,
            );

            let coefficient = primitive_a.coefficient * primitive_b.coefficient;
            for nucleus in nuclei {
                output += coefficient
                    * primitive_nuclear(primitive_a, primitive_b, diff, product_center, nucleus)
            }
        }

        output
    }

    fn multipole(&self, functions: (&Self::Function, &Self::Function), order: [i32; 3]) -> f64 {
        let (basis_a, basis_b) = functions;
        let ContractedGaussian(data_a) = &basis_a.contracted_gaussian;
        let ContractedGaussian(data_b) = &basis_b.contracted_gaussian;
        let diff = basis_a.position - basis_b.position;

        let mut output = 0.0;
        for (&primitive_a, &primitive_b) in itertools::iproduct!(data_a, data_b) {
            output += primitive_a.coefficient
                * primitive_b.coefficient
                * primitive_multipole(primitive_a, primitive_b, diff, basis_b.position, order);
        }
        output
    }

    fn electron_repulsion(
        &self,
        functions: (
            &Self::Function,
            &Self::Function,
            &Self::Function,
            &Self::Function,
        ),
    ) -> f64 {
        let (basis_a, basis_b, basis_c, basis_d) = functions;
        let ContractedGaussian(data_a) = &basis_a.contracted_gaussian;
        let ContractedGaussian(data_b) = &basis_b.contracted_gaussian;
        let ContractedGaussian(data_c) = &basis_c.contracted_gaussian;
        let ContractedGaussian(data_d) = &basis_d.contracted_gaussian;

        let diff_ab = basis_a.position - basis_b.position;
        let diff_cd = basis_c.position - basis_d.position;

        let mut output = 0.0;
        for (&primitive_a, &primitive_b) in itertools::iproduct!(data_a, data_b) {
            let pair_ab = HermitePair::new(primitive_a, primitive_b, diff_ab);
            let product_center_ab = product_center(
                basis_a.position,
                primitive_a.exponent,
                basis_b.position,
                primitive_b.exponent,
            );

            for (&primitive_c, &primitive_d) in itertools::iproduct!(data_c, data_d) {
                let pair_cd = HermitePair::new(primitive_c, primitive_d, diff_cd);
                let product_center_cd = product_center(
                    basis_c.position,
                    primitive_c.exponent,
                    basis_d.position,
                    primitive_d.exponent,
                );

                output += primitive_a.coefficient
                    * primitive_b.coefficient
                    * primitive_c.coefficient
                    * primitive_d.coefficient
                    * primitive_electron(&pair_ab, &pair_cd, product_center_ab - product_center_cd)
            }
        }

        output
    }
}

/// Hermite expansion coefficients of a primitive product along x, y and z.
struct HermitePair {
    exponent: f64,
    x: SmallVec<[f64; 8]>,
    y: SmallVec<[f64; 8]>,
    z: SmallVec<[f64; 8]>,
}

impl HermitePair {
    fn new(primitive_a: Gaussian, primitive_b: Gaussian, diff: Vector3<f64>) -> Self {
        let Gaussian {
            exponent: a,
            angular: (l1, m1, n1),
            ..
        } = primitive_a;
        let Gaussian {
            exponent: b,
            angular: (l2, m2, n2),
            ..
        } = primitive_b;

        let expand = |i: i32, j: i32, q: f64| {
            (0..=i + j)
                .map(|t| hermite_expansion([i, j, t], q, a, b))
                .collect::<SmallVec<[f64; 8]>>()
        };

        Self {
            exponent: a + b,
            x: expand(l1, l2, diff.x),
            y: expand(m1, m2, diff.y),
            z: expand(n1, n2, diff.z),
        }
    }

    fn max_order(&self) -> usize {
        self.x.len() + self.y.len() + self.z.len() - 3
    }
}

fn primitive_overlap(primitive_a: Gaussian, primitive_b: Gaussian, diff: Vector3<f64>) -> f64 {
    let Gaussian {
        exponent: exp_a,
        angular: (l1, m1, n1),
        ..
    } = primitive_a;

    let Gaussian {
        exponent: exp_b,
        angular: (l2, m2, n2),
        ..
    } = primitive_b;

    hermite_expansion([l1, l2, 0], diff.x, exp_a, exp_b)
        * hermite_expansion([m1, m2, 0], diff.y, exp_a, exp_b)
        * hermite_expansion([n1, n2, 0], diff.z, exp_a, exp_b)
        * (std::f64::consts::PI / (exp_a + exp_b)).powi(3).sqrt()
}

fn primitive_kinetic(primitive_a: Gaussian, primitive_b: Gaussian, diff: Vector3<f64>) -> f64 {
    let Gaussian {
        exponent: b_exp,
        angular: (l, m, n),
        ..
    } = primitive_b;

    let angular_step =
        |i, j, k| primitive_overlap(primitive_a, add_angular(primitive_b, [i, j, k]), diff);

    let term_0 =
        b_exp * (2 * (l + m + n) + 3) as f64 * primitive_overlap(primitive_a, primitive_b, diff);
    let term_1 = -2.0
        * b_exp.powi(2)
        * (angular_step(2, 0, 0) + angular_step(0, 2, 0) + angular_step(0, 0, 2));
    let term_2 = -0.5
        * ((l * (l - 1)) as f64 * angular_step(-2, 0, 0)
            + (m * (m - 1)) as f64 * angular_step(0, -2, 0)
            + (n * (n - 1)) as f64 * angular_step(0, 0, -2));
    term_0 + term_1 + term_2
}

fn primitive_nuclear(
    primitive_a: Gaussian,
    primitive_b: Gaussian,
    // difference of the positions of the two basis functions: a - b
    diff: Vector3<f64>,
    // the product center of the two basis functions
    product_center: Vector3<f64>,
    nucleus: &Atom,
) -> f64 {
    let pair = HermitePair::new(primitive_a, primitive_b, diff);
    let p = pair.exponent;
    let diff_nucleus = product_center - nucleus.position;
    let boys = boys_table(pair.max_order(), p * diff_nucleus.norm_squared());

    let mut sum = 0.0;
    for (t, e1) in pair.x.iter().enumerate() {
        for (u, e2) in pair.y.iter().enumerate() {
            for (v, e3) in pair.z.iter().enumerate() {
                sum += e1
                    * e2
                    * e3
                    * coulomb_auxiliary(t as i32, u as i32, v as i32, 0, p, diff_nucleus, &boys)
            }
        }
    }
    (-nucleus.nuclear_charge() as f64 * std::f64::consts::TAU / p) * sum
}

fn primitive_multipole(
    primitive_a: Gaussian,
    primitive_b: Gaussian,
    diff: Vector3<f64>,
    b_position: Vector3<f64>,
    order: [i32; 3],
) -> f64 {
    let Gaussian {
        exponent: a,
        angular: (l1, m1, n1),
        ..
    } = primitive_a;
    let Gaussian {
        exponent: b,
        angular: (l2, m2, n2),
        ..
    } = primitive_b;

    // x^e = sum_t binom(e, t) (x - B_x)^t B_x^(e - t), and (x - B_x)^t raises the angular
    // momentum of the second function by t
    let moment = |i: i32, j: i32, e: i32, q: f64, center: f64| {
        let mut binomial = 1.0;
        let mut sum = 0.0;
        for t in 0..=e {
            sum += binomial * center.powi(e - t) * hermite_expansion([i, j + t, 0], q, a, b);
            binomial *= (e - t) as f64 / (t + 1) as f64;
        }
        sum
    };

    let [ex, ey, ez] = order;
    moment(l1, l2, ex, diff.x, b_position.x)
        * moment(m1, m2, ey, diff.y, b_position.y)
        * moment(n1, n2, ez, diff.z, b_position.z)
        * (std::f64::consts::PI / (a + b)).powi(3).sqrt()
}

fn primitive_electron(pair_ab: &HermitePair, pair_cd: &HermitePair, diff_product: Vector3<f64>) -> f64 {
    let p = pair_ab.exponent;
    let q = pair_cd.exponent;
    let alpha = p * q / (p + q);

    let boys = boys_table(
        pair_ab.max_order() + pair_cd.max_order(),
        alpha * diff_product.norm_squared(),
    );

    let mut sum = 0.0;
    for (t1, e1) in pair_ab.x.iter().enumerate() {
        for (u1, e2) in pair_ab.y.iter().enumerate() {
            for (v1, e3) in pair_ab.z.iter().enumerate() {
                let bra = e1 * e2 * e3;
                for (t2, e4) in pair_cd.x.iter().enumerate() {
                    for (u2, e5) in pair_cd.y.iter().enumerate() {
                        for (v2, e6) in pair_cd.z.iter().enumerate() {
                            // (-1)^(t2 + u2 + v2)
                            let sign = if (t2 + u2 + v2) % 2 == 0 { 1.0 } else { -1.0 };

                            sum += bra
                                * e4
                                * e5
                                * e6
                                * sign
                                * coulomb_auxiliary(
                                    (t1 + t2) as i32,
                                    (u1 + u2) as i32,
                                    (v1 + v2) as i32,
                                    0,
                                    alpha,
                                    diff_product,
                                    &boys,
                                )
                        }
                    }
                }
            }
        }
    }

    2.0 * std::f64::consts::PI.powi(5).sqrt() * (p * q * (p + q).sqrt()).recip() * sum
}

#[inline(always)]
fn add_angular(gaussian: Gaussian, [i, j, k]: [i32; 3]) -> Gaussian {
    let Gaussian {
        angular: (l, m, n), ..
    } = gaussian;

    Gaussian {
        angular: (l + i, m + j, n + k),
        ..gaussian
    }
}

#[inline(always)]
fn product_center(
    a_pos: Vector3<f64>,
    a_exp: f64,
    b_pos: Vector3<f64>,
    b_exp: f64,
) -> Vector3<f64> {
    (a_exp * a_pos + b_exp * b_pos) / (a_exp + b_exp)
}

//! Hermite Gaussian helpers shared by the McMurchie-Davidson kernels.
//! Reference:
//!
//! [1] Helgaker, Jorgensen, Olsen: Molecular Electronic-Structure Theory, 2000, chapter 9.
use nalgebra::Vector3;
use smallvec::SmallVec;

/// Hermite expansion coefficient E^{ij}_t of the product of two one dimensional
/// Cartesian Gaussians with exponents `a` and `b`, separated by `qx = A_x - B_x`.
pub(crate) fn hermite_expansion([i, j, t]: [i32; 3], qx: f64, a: f64, b: f64) -> f64 {
    if i < 0 || j < 0 || t < 0 || t > i + j {
        return 0.0;
    }

    let p = a + b;
    let q = a * b / p;

    match (i, j, t) {
        (0, 0, 0) => (-q * qx * qx).exp(),
        // lower i
        (i, 0, t) => {
            (2.0 * p).recip() * hermite_expansion([i - 1, 0, t - 1], qx, a, b)
                - (q * qx / a) * hermite_expansion([i - 1, 0, t], qx, a, b)
                + (t + 1) as f64 * hermite_expansion([i - 1, 0, t + 1], qx, a, b)
        }
        // lower j
        (i, j, t) => {
            (2.0 * p).recip() * hermite_expansion([i, j - 1, t - 1], qx, a, b)
                + (q * qx / b) * hermite_expansion([i, j - 1, t], qx, a, b)
                + (t + 1) as f64 * hermite_expansion([i, j - 1, t + 1], qx, a, b)
        }
    }
}

/// Boys function values F_0(x) ..= F_max_order(x).
///
/// Only the highest order is evaluated directly, the rest follows from the stable downward
/// recursion F_{n-1}(x) = (2x F_n(x) + exp(-x)) / (2n - 1).
pub(crate) fn boys_table(max_order: usize, x: f64) -> SmallVec<[f64; 16]> {
    let mut values = SmallVec::from_elem(0.0, max_order + 1);
    values[max_order] = boys::micb25::boys(max_order as u64, x);

    let exp = (-x).exp();
    for n in (1..=max_order).rev() {
        values[n - 1] = (2.0 * x * values[n] + exp) / (2 * n - 1) as f64;
    }
    values
}

/// Hermite Coulomb auxiliary integral R^n_{tuv}(p, P - C).
///
/// `boys` has to hold F_0 .. F_{t+u+v+n} evaluated at p * |P - C|^2.
pub(crate) fn coulomb_auxiliary(
    t: i32,
    u: i32,
    v: i32,
    n: i32,
    p: f64,
    pc: Vector3<f64>,
    boys: &[f64],
) -> f64 {
    if t < 0 || u < 0 || v < 0 {
        return 0.0;
    }

    match (t, u, v) {
        (0, 0, 0) => (-2.0 * p).powi(n) * boys[n as usize],
        (0, 0, v) => {
            (v - 1) as f64 * coulomb_auxiliary(0, 0, v - 2, n + 1, p, pc, boys)
                + pc.z * coulomb_auxiliary(0, 0, v - 1, n + 1, p, pc, boys)
        }
        (0, u, v) => {
            (u - 1) as f64 * coulomb_auxiliary(0, u - 2, v, n + 1, p, pc, boys)
                + pc.y * coulomb_auxiliary(0, u - 1, v, n + 1, p, pc, boys)
        }
        (t, u, v) => {
            (t - 1) as f64 * coulomb_auxiliary(t - 2, u, v, n + 1, p, pc, boys)
                + pc.x * coulomb_auxiliary(t - 1, u, v, n + 1, p, pc, boys)
        }
    }
}

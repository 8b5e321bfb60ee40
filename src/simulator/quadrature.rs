//! Adaptive Gauss–Kronrod quadrature
//!
//! Used to integrate dosing functions. The interval is first split at the
//! known discontinuities of the integrand, then the segment with the largest
//! error estimate is bisected until the total error falls below tolerance.
//!
//! ```text
//! error(segment) = |K15 - G7|
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

/// Kronrod nodes on `[0, 1]`, the last one is the center.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_6,
    0.949_107_912_342_758_5,
    0.864_864_423_359_769_1,
    0.741_531_185_599_394_4,
    0.586_087_235_467_691_1,
    0.405_845_151_377_397_2,
    0.207_784_955_007_898_5,
    0.0,
];

/// Kronrod weights matching [`XGK`].
const WGK: [f64; 8] = [
    0.022_935_322_010_529_22,
    0.063_092_092_629_978_55,
    0.104_790_010_322_250_2,
    0.140_653_259_715_525_9,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_9,
    0.209_482_141_084_727_8,
];

/// Gauss weights for the nodes `XGK[1]`, `XGK[3]`, `XGK[5]` and the center.
const WG: [f64; 4] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_7,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
];

/// Tolerances for [`integrate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadratureOptions {
    pub abs_tol: f64,
    pub rel_tol: f64,
    /// Maximum number of bisections
    pub max_subdivisions: usize,
}

impl Default for QuadratureOptions {
    fn default() -> Self {
        Self {
            abs_tol: 1.49e-8,
            rel_tol: 1.49e-8,
            max_subdivisions: 500,
        }
    }
}

/// Result of [`integrate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrature {
    pub value: f64,
    pub error: f64,
    pub subdivisions: usize,
    /// Whether the error estimate met the tolerance
    pub converged: bool,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

impl Segment {
    fn new<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> Self {
        let (value, error) = kronrod(f, a, b);
        Self { a, b, value, error }
    }
}

// Ordered by error so the heap pops the worst segment first
impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.error.total_cmp(&other.error) == Ordering::Equal
    }
}

impl Eq for Segment {}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error.total_cmp(&other.error)
    }
}

/// 15-point Kronrod estimate and its distance to the embedded 7-point Gauss rule.
fn kronrod<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> (f64, f64) {
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);
    let fc = f(center);
    let mut kronrod = WGK[7] * fc;
    let mut gauss = WG[3] * fc;
    for j in 0..7 {
        let dx = half * XGK[j];
        let pair = f(center - dx) + f(center + dx);
        kronrod += WGK[j] * pair;
        if j % 2 == 1 {
            gauss += WG[j / 2] * pair;
        }
    }
    (kronrod * half, ((kronrod - gauss) * half).abs())
}

/// Integrates `f` over `[a, b]`, splitting first at `breakpoints`.
///
/// Breakpoints outside `(a, b)` are ignored. An empty or reversed interval
/// integrates to zero.
pub fn integrate<F>(
    f: F,
    a: f64,
    b: f64,
    breakpoints: &[f64],
    options: &QuadratureOptions,
) -> Quadrature
where
    F: Fn(f64) -> f64,
{
    if !(b > a) {
        return Quadrature {
            value: 0.0,
            error: 0.0,
            subdivisions: 0,
            converged: true,
        };
    }

    let mut edges = Vec::with_capacity(breakpoints.len() + 2);
    edges.push(a);
    edges.extend(breakpoints.iter().copied().filter(|&t| t > a && t < b));
    edges.push(b);

    let mut heap: BinaryHeap<Segment> = edges
        .windows(2)
        .map(|w| Segment::new(&f, w[0], w[1]))
        .collect();

    let mut subdivisions = 0;
    let converged = loop {
        let value: f64 = heap.iter().map(|s| s.value).sum();
        let error: f64 = heap.iter().map(|s| s.error).sum();
        if error <= options.abs_tol.max(options.rel_tol * value.abs()) {
            break true;
        }
        if subdivisions >= options.max_subdivisions {
            break false;
        }
        let Some(worst) = heap.pop() else {
            break true;
        };
        let mid = 0.5 * (worst.a + worst.b);
        if mid <= worst.a || mid >= worst.b {
            // no room left to bisect
            heap.push(worst);
            break false;
        }
        heap.push(Segment::new(&f, worst.a, mid));
        heap.push(Segment::new(&f, mid, worst.b));
        subdivisions += 1;
    };

    Quadrature {
        value: heap.iter().map(|s| s.value).sum(),
        error: heap.iter().map(|s| s.error).sum(),
        subdivisions,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn polynomials_are_exact() {
        let q = integrate(|x| x * x, 0.0, 1.0, &[], &QuadratureOptions::default());
        assert!(q.converged);
        assert_eq!(q.subdivisions, 0);
        assert_abs_diff_eq!(q.value, 1.0 / 3.0, epsilon = 1e-14);
    }

    #[test]
    fn oscillatory_integrand() {
        let q = integrate(
            |x| (10.0 * x).sin(),
            0.0,
            PI,
            &[],
            &QuadratureOptions::default(),
        );
        assert!(q.converged);
        assert_abs_diff_eq!(q.value, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn step_function_with_breakpoint_is_exact() {
        let step = |x: f64| if x >= 0.3 { 2.0 } else { 0.0 };
        let q = integrate(step, 0.0, 1.0, &[0.3], &QuadratureOptions::default());
        assert!(q.converged);
        assert_abs_diff_eq!(q.value, 1.4, epsilon = 1e-12);
    }

    #[test]
    fn step_function_without_breakpoint_converges_by_bisection() {
        let step = |x: f64| if x >= 0.3 { 2.0 } else { 0.0 };
        let q = integrate(step, 0.0, 1.0, &[], &QuadratureOptions::default());
        assert_abs_diff_eq!(q.value, 1.4, epsilon = 1e-6);
    }

    #[test]
    fn empty_interval_is_zero() {
        let q = integrate(|_| 1.0, 1.0, 1.0, &[], &QuadratureOptions::default());
        assert_eq!(q.value, 0.0);
        assert!(q.converged);
    }
}

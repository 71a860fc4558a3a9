//! Quadrature, interpolation and special functions shared by the halo model.

use std::f64::consts::FRAC_PI_2;

use num_complex::Complex64;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

// ---------------------------------------------------------------------------
// Grids
// ---------------------------------------------------------------------------

/// `n` points from `lo` to `hi` inclusive.
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n).map(|i| lo + step * i as f64).collect()
        }
    }
}

/// `n` log-spaced points from `lo` to `hi` inclusive (both positive).
pub fn geomspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    linspace(lo.ln(), hi.ln(), n).into_iter().map(f64::exp).collect()
}

// ---------------------------------------------------------------------------
// Quadrature
// ---------------------------------------------------------------------------

/// Composite Simpson rule over uniformly spaced samples.
///
/// With an even number of samples the last interval is closed with the
/// trapezoid rule.
pub fn simpson(y: &[f64], dx: f64) -> f64 {
    let n = y.len();
    match n {
        0 | 1 => 0.0,
        2 => 0.5 * dx * (y[0] + y[1]),
        _ if n % 2 == 0 => simpson(&y[..n - 1], dx) + 0.5 * dx * (y[n - 2] + y[n - 1]),
        _ => {
            let mut sum = y[0] + y[n - 1];
            for (i, v) in y.iter().enumerate().take(n - 1).skip(1) {
                sum += if i % 2 == 1 { 4.0 * v } else { 2.0 * v };
            }
            sum * dx / 3.0
        }
    }
}

/// Running trapezoid integral; `out[0] = 0`.
pub fn cumulative_trapezoid(x: &[f64], y: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(x.len());
    let mut acc = 0.0;
    for i in 0..x.len() {
        if i > 0 {
            acc += 0.5 * (x[i] - x[i - 1]) * (y[i] + y[i - 1]);
        }
        out.push(acc);
    }
    out
}

/// Gauss–Legendre nodes and weights on `[-1, 1]`.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let nf = n as f64;

    for i in 0..n.div_ceil(2) {
        let mut z = (std::f64::consts::PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
        let mut pp = 1.0;
        for _ in 0..100 {
            let mut p1 = 1.0;
            let mut p2 = 0.0;
            for j in 1..=n {
                let p3 = p2;
                p2 = p1;
                let jf = j as f64;
                p1 = ((2.0 * jf - 1.0) * z * p2 - (jf - 1.0) * p3) / jf;
            }
            pp = nf * (z * p1 - p2) / (z * z - 1.0);
            let z_prev = z;
            z = z_prev - p1 / pp;
            if (z - z_prev).abs() < 1e-15 {
                break;
            }
        }
        nodes[i] = -z;
        nodes[n - 1 - i] = z;
        let w = 2.0 / ((1.0 - z * z) * pp * pp);
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    (nodes, weights)
}

/// Fixed-order Gauss–Legendre rule mapped onto arbitrary intervals.
#[derive(Debug, Clone)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    pub fn new(order: usize) -> Self {
        let (nodes, weights) = gauss_legendre(order);
        Self { nodes, weights }
    }

    /// Integrate `f` over `[a, b]`.
    pub fn integrate<F: Fn(f64) -> f64>(&self, a: f64, b: f64, f: F) -> f64 {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (b + a);
        self.nodes
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| w * f(mid + half * x))
            .sum::<f64>()
            * half
    }
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

/// Index `i` such that `x[i] <= v < x[i + 1]`, clamped to a valid interval.
pub fn bracket(x: &[f64], v: f64) -> usize {
    let i = x.partition_point(|&xi| xi <= v);
    i.saturating_sub(1).min(x.len().saturating_sub(2))
}

/// Piecewise-linear interpolant over increasing abscissae. Outside the
/// table the end segments are extended linearly.
#[derive(Debug, Clone)]
pub struct Interp1d {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Interp1d {
    /// `x` must be strictly increasing and at least two long.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Option<Self> {
        if x.len() < 2 || x.len() != y.len() || x.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }
        Some(Self { x, y })
    }

    /// Skip validation for tables built from known-increasing grids.
    pub(crate) fn from_sorted(x: Vec<f64>, y: Vec<f64>) -> Self {
        debug_assert!(x.len() >= 2 && x.len() == y.len());
        Self { x, y }
    }

    pub fn eval(&self, v: f64) -> f64 {
        let i = bracket(&self.x, v);
        let t = (v - self.x[i]) / (self.x[i + 1] - self.x[i]);
        self.y[i] + t * (self.y[i + 1] - self.y[i])
    }

    pub fn x_min(&self) -> f64 {
        self.x[0]
    }

    pub fn x_max(&self) -> f64 {
        self.x[self.x.len() - 1]
    }
}

// ---------------------------------------------------------------------------
// Sine and cosine integrals
// ---------------------------------------------------------------------------

/// `(Si(x), Ci(x))` for `x > 0`.
///
/// Power series below 2, complex continued fraction (modified Lentz) above.
pub fn sici(x: f64) -> (f64, f64) {
    const EPS: f64 = 1e-15;
    const FPMIN: f64 = 1e-300;
    const MAXIT: usize = 200;

    let t = x.abs();
    if t == 0.0 {
        return (0.0, f64::NEG_INFINITY);
    }

    let (si, ci) = if t > 2.0 {
        let mut b = Complex64::new(1.0, t);
        let mut c = Complex64::new(1.0 / FPMIN, 0.0);
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 2..MAXIT {
            let a = -(((i - 1) * (i - 1)) as f64);
            b += 2.0;
            d = 1.0 / (a * d + b);
            c = b + a / c;
            let del = c * d;
            h *= del;
            if (del.re - 1.0).abs() + del.im.abs() < EPS {
                break;
            }
        }
        let h = Complex64::new(t.cos(), -t.sin()) * h;
        (FRAC_PI_2 + h.im, -h.re)
    } else {
        let mut sum = 0.0;
        let mut sums = 0.0;
        let mut sumc = 0.0;
        let mut sign = 1.0;
        let mut fact = 1.0;
        let mut odd = true;
        for k in 1..MAXIT {
            let kf = k as f64;
            fact *= t / kf;
            let term = fact / kf;
            sum += sign * term;
            let err = term / sum.abs();
            if odd {
                sign = -sign;
                sums = sum;
                sum = sumc;
            } else {
                sumc = sum;
                sum = sums;
            }
            if err < EPS {
                break;
            }
            odd = !odd;
        }
        (sums, sumc + t.ln() + EULER_GAMMA)
    };

    if x < 0.0 { (-si, ci) } else { (si, ci) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sine_cosine_integral_reference_values() {
        let cases = [
            (0.5, 0.493_107_418_043_066_7, -0.177_784_078_806_612_4),
            (1.0, 0.946_083_070_367_183_0, 0.337_403_922_900_968_1),
            (5.0, 1.549_931_244_944_674_1, -0.190_029_749_656_643_9),
            (10.0, 1.658_347_594_218_874_0, -0.045_456_433_004_455_4),
        ];
        for (x, si, ci) in cases {
            let (s, c) = sici(x);
            assert_relative_eq!(s, si, epsilon = 1e-10);
            assert_relative_eq!(c, ci, epsilon = 1e-10);
        }
    }

    #[test]
    fn sici_is_continuous_at_branch_switch() {
        let (s_lo, c_lo) = sici(2.0 - 1e-9);
        let (s_hi, c_hi) = sici(2.0 + 1e-9);
        assert_relative_eq!(s_lo, s_hi, epsilon = 1e-8);
        assert_relative_eq!(c_lo, c_hi, epsilon = 1e-8);
    }

    #[test]
    fn simpson_is_exact_for_cubics() {
        let x = linspace(0.0, 2.0, 11);
        let y: Vec<f64> = x.iter().map(|v| v * v * v - v).collect();
        assert_relative_eq!(simpson(&y, 0.2), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn gauss_legendre_integrates_polynomials() {
        let gl = GaussLegendre::new(8);
        let v = gl.integrate(0.0, 1.0, |x| x.powi(14));
        assert_relative_eq!(v, 1.0 / 15.0, epsilon = 1e-13);
        let (_, w) = gauss_legendre(5);
        assert_relative_eq!(w.iter().sum::<f64>(), 2.0, epsilon = 1e-14);
    }

    #[test]
    fn interp_extends_end_segments() {
        let f = Interp1d::new(vec![0.0, 1.0, 2.0], vec![0.0, 2.0, 3.0]).unwrap();
        assert_relative_eq!(f.eval(0.5), 1.0);
        assert_relative_eq!(f.eval(3.0), 4.0);
        assert_relative_eq!(f.eval(-1.0), -2.0);
        assert!(Interp1d::new(vec![0.0, 0.0], vec![1.0, 2.0]).is_none());
    }

    #[test]
    fn geomspace_endpoints() {
        let k = geomspace(1e-4, 1e2, 256);
        assert_eq!(k.len(), 256);
        assert_relative_eq!(k[0], 1e-4, max_relative = 1e-12);
        assert_relative_eq!(k[255], 1e2, max_relative = 1e-12);
    }
}

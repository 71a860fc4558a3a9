//! Halo profiles in Fourier space.
//!
//! Two variants are supported and matched exhaustively wherever they are used:
//!
//! * [`HaloProfile::Nfw`] – truncated Navarro–Frenk–White matter profile,
//!   analytic Fourier transform, renormalised by the mean matter density in
//!   the halo model.
//! * [`HaloProfile::Gnfw`] – generalised NFW electron pressure profile
//!   (Arnaud et al. 2010), numerically transformed, not renormalised.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::cosmology::Cosmology;
use super::halos::{Concentration, MassDef};
use super::numerics::{geomspace, sici, GaussLegendre, Interp1d};

// ---------------------------------------------------------------------------
// Profile configuration
// ---------------------------------------------------------------------------

/// Arnaud et al. (2010) pressure profile parameters plus hydrostatic bias.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GnfwParams {
    /// Hydrostatic mass bias b; the profile sees (1 - b) M.
    pub b_hydro: f64,
    #[serde(default = "GnfwParams::default_p0")]
    pub p0: f64,
    #[serde(default = "GnfwParams::default_c500")]
    pub c500: f64,
    #[serde(default = "GnfwParams::default_alpha")]
    pub alpha: f64,
    #[serde(default = "GnfwParams::default_alpha_p")]
    pub alpha_p: f64,
    #[serde(default = "GnfwParams::default_beta")]
    pub beta: f64,
    #[serde(default = "GnfwParams::default_gamma")]
    pub gamma: f64,
    /// Exponent of h/0.7 multiplying `p0`.
    #[serde(default = "GnfwParams::default_p0_hexp")]
    pub p0_hexp: f64,
}

impl GnfwParams {
    fn default_p0() -> f64 {
        6.41
    }
    fn default_c500() -> f64 {
        1.81
    }
    fn default_alpha() -> f64 {
        1.33
    }
    fn default_alpha_p() -> f64 {
        0.12
    }
    fn default_beta() -> f64 {
        4.13
    }
    fn default_gamma() -> f64 {
        0.31
    }
    fn default_p0_hexp() -> f64 {
        -1.0
    }

    /// Planck-calibrated shape with the given hydrostatic bias.
    pub fn with_b_hydro(b_hydro: f64) -> Self {
        Self {
            b_hydro,
            p0: Self::default_p0(),
            c500: Self::default_c500(),
            alpha: Self::default_alpha(),
            alpha_p: Self::default_alpha_p(),
            beta: Self::default_beta(),
            gamma: Self::default_gamma(),
            p0_hexp: Self::default_p0_hexp(),
        }
    }

    /// (1 - b).
    pub fn mass_bias(&self) -> f64 {
        1.0 - self.b_hydro
    }

    /// Dimensionless shape p(x), x = c500 r / R.
    fn shape(&self, x: f64) -> f64 {
        1.0 / (x.powf(self.gamma) * (1.0 + x.powf(self.alpha)).powf((self.beta - self.gamma) / self.alpha))
    }

    /// d ln p / dx.
    fn dlog_shape(&self, x: f64) -> f64 {
        -self.gamma / x - (self.beta - self.gamma) * x.powf(self.alpha - 1.0) / (1.0 + x.powf(self.alpha))
    }

    /// Pressure normalisation in eV cm⁻³ for a halo of (unbiased) mass `m`.
    fn pressure_norm(&self, cosmo: &Cosmology, m: f64, a: f64) -> f64 {
        let h70 = cosmo.h() / 0.7;
        let p0 = self.p0 * h70.powf(self.p0_hexp);
        let pz = cosmo.e_of_a(a).powf(8.0 / 3.0);
        let pm = (self.mass_bias() * m * h70 / 3e14).powf(2.0 / 3.0 + self.alpha_p);
        1.65 * h70 * h70 * p0 * pz * pm
    }
}

/// Halo profile variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaloProfile {
    Nfw {
        #[serde(default)]
        concentration: Concentration,
    },
    Gnfw(GnfwParams),
}

impl HaloProfile {
    /// NFW with the Duffy et al. (2008) concentration.
    pub fn nfw() -> Self {
        HaloProfile::Nfw {
            concentration: Concentration::Duffy08,
        }
    }

    /// GNFW pressure profile with hydrostatic bias `b_hydro`.
    pub fn gnfw(b_hydro: f64) -> Self {
        HaloProfile::Gnfw(GnfwParams::with_b_hydro(b_hydro))
    }

    /// Whether the halo model divides this profile by its large-scale
    /// normalisation (matter-like profiles do, pressure does not).
    pub fn is_normalized(&self) -> bool {
        match self {
            HaloProfile::Nfw { .. } => true,
            HaloProfile::Gnfw(_) => false,
        }
    }

    /// Prepare for repeated Fourier evaluations (tabulates the GNFW transform).
    pub fn prepare(&self) -> PreparedProfile {
        match *self {
            HaloProfile::Nfw { concentration } => PreparedProfile::Nfw { concentration },
            HaloProfile::Gnfw(params) => PreparedProfile::Gnfw {
                params,
                shape_ft: GnfwTransform::new(&params),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Prepared profiles
// ---------------------------------------------------------------------------

/// A profile ready for Fourier evaluation on (k, M) grids.
#[derive(Debug, Clone)]
pub enum PreparedProfile {
    Nfw { concentration: Concentration },
    Gnfw { params: GnfwParams, shape_ft: GnfwTransform },
}

impl PreparedProfile {
    pub fn is_normalized(&self) -> bool {
        match self {
            PreparedProfile::Nfw { .. } => true,
            PreparedProfile::Gnfw { .. } => false,
        }
    }

    /// U(k | M, a) for every `k` in `ks`.
    pub fn fourier(&self, cosmo: &Cosmology, mass_def: &MassDef, ks: &[f64], m: f64, a: f64) -> Vec<f64> {
        match self {
            PreparedProfile::Nfw { concentration } => {
                let r_delta = mass_def.radius(cosmo, m, a);
                let c = concentration.concentration(cosmo, m, a);
                ks.iter().map(|&k| nfw_fourier(k, m, r_delta, c)).collect()
            }
            PreparedProfile::Gnfw { params, shape_ft } => {
                let r_delta = mass_def.radius(cosmo, params.mass_bias() * m, a);
                let scale = r_delta / params.c500;
                let amplitude = params.pressure_norm(cosmo, m, a) * 4.0 * PI * scale.powi(3);
                ks.iter().map(|&k| amplitude * shape_ft.eval(k * scale)).collect()
            }
        }
    }
}

/// Fourier transform of an NFW profile truncated at `r_delta`, normalised so
/// that U(k → 0) = M.
pub fn nfw_fourier(k: f64, m: f64, r_delta: f64, c: f64) -> f64 {
    let r_s = r_delta / c;
    let x = k * r_s;
    let x1 = (1.0 + c) * x;
    let (si_x, ci_x) = sici(x);
    let (si_x1, ci_x1) = sici(x1);
    let norm = (1.0 + c).ln() - c / (1.0 + c);

    let shape = x.sin() * (si_x1 - si_x) - (c * x).sin() / x1 + x.cos() * (ci_x1 - ci_x);
    m * shape / norm
}

// ---------------------------------------------------------------------------
// GNFW shape transform
// ---------------------------------------------------------------------------

const GNFW_Q_MIN: f64 = 1e-3;
const GNFW_Q_MAX: f64 = 1e3;
const GNFW_NQ: usize = 128;
const GNFW_X_MIN: f64 = 1e-6;
const GNFW_X_MAX: f64 = 2e3;
const GNFW_MAX_HALF_PERIODS: f64 = 4000.0;
const GNFW_LOG_NODES: usize = 200;

/// F(q) = ∫ x² p(x) sin(qx)/(qx) dx tabulated in ln q.
#[derive(Debug, Clone)]
pub struct GnfwTransform {
    table: Interp1d,
    /// Large-q slope of F, −(3 − γ).
    tail_slope: f64,
}

impl GnfwTransform {
    pub fn new(params: &GnfwParams) -> Self {
        let gl = GaussLegendre::new(8);
        let qs = geomspace(GNFW_Q_MIN, GNFW_Q_MAX, GNFW_NQ);
        let values: Vec<f64> = qs.iter().map(|&q| sine_transform(params, &gl, q) / q).collect();
        let ln_q: Vec<f64> = qs.iter().map(|q| q.ln()).collect();
        let table = Interp1d::from_sorted(ln_q, values);
        Self {
            table,
            tail_slope: -(3.0 - params.gamma),
        }
    }

    pub fn eval(&self, q: f64) -> f64 {
        if q <= GNFW_Q_MIN {
            self.table.eval(GNFW_Q_MIN.ln())
        } else if q >= GNFW_Q_MAX {
            self.table.eval(GNFW_Q_MAX.ln()) * (q / GNFW_Q_MAX).powf(self.tail_slope)
        } else {
            self.table.eval(q.ln())
        }
    }
}

/// ∫_0^∞ g(x) sin(qx) dx with g(x) = x p(x).
///
/// The range up to `A` is split at log-spaced nodes and at the zeros of
/// sin(qx), each piece integrated with Gauss–Legendre; the remainder beyond
/// `A` uses the two-term integration-by-parts asymptote.
fn sine_transform(params: &GnfwParams, gl: &GaussLegendre, q: f64) -> f64 {
    let g = |x: f64| x * params.shape(x);
    let upper = GNFW_X_MAX.min(GNFW_MAX_HALF_PERIODS * PI / q);

    let mut breaks = geomspace(GNFW_X_MIN, upper, GNFW_LOG_NODES);
    let n_zeros = (q * upper / PI).floor() as usize;
    breaks.extend((1..=n_zeros).map(|n| n as f64 * PI / q).filter(|&x| x > GNFW_X_MIN && x < upper));
    breaks.sort_by(|a, b| a.total_cmp(b));
    breaks.dedup();

    let body: f64 = breaks
        .windows(2)
        .map(|w| gl.integrate(w[0], w[1], |x| g(x) * (q * x).sin()))
        .sum();

    let g_a = g(upper);
    let dg_a = g_a * (1.0 / upper + params.dlog_shape(upper));
    let tail = g_a * (q * upper).cos() / q - dg_a * (q * upper).sin() / (q * q);
    body + tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halo::cosmology::CosmologyParams;
    use approx::assert_relative_eq;

    #[test]
    fn nfw_tends_to_mass_on_large_scales() {
        let u = nfw_fourier(1e-6, 1e14, 1.0, 5.0);
        assert_relative_eq!(u, 1e14, max_relative = 1e-6);
    }

    #[test]
    fn nfw_is_suppressed_inside_the_halo() {
        let m = 1e14;
        let u_small = nfw_fourier(0.1, m, 1.0, 5.0);
        let u_large = nfw_fourier(50.0, m, 1.0, 5.0);
        assert!(u_small < m && u_small > 0.9 * m);
        assert!(u_large.abs() < 0.1 * m);
    }

    #[test]
    fn gnfw_transform_matches_volume_integral_at_small_q() {
        let params = GnfwParams::with_b_hydro(0.2);
        let ft = GnfwTransform::new(&params);
        // ∫ x² p(x) dx by brute force on a log grid
        let gl = GaussLegendre::new(8);
        let nodes = geomspace(1e-6, 1e6, 400);
        let direct: f64 = nodes
            .windows(2)
            .map(|w| gl.integrate(w[0], w[1], |x| x * x * params.shape(x)))
            .sum();
        assert_relative_eq!(ft.eval(1e-4), direct, max_relative = 1e-2);
        assert!(ft.eval(10.0) < ft.eval(1.0));
        assert!(ft.eval(1e4) > 0.0);
    }

    #[test]
    fn normalisation_flags_follow_variant() {
        assert!(HaloProfile::nfw().is_normalized());
        assert!(!HaloProfile::gnfw(0.2).is_normalized());
    }

    #[test]
    fn gnfw_pressure_grows_with_mass() {
        let cosmo = Cosmology::new(CosmologyParams::default()).unwrap();
        let md = MassDef::critical_200();
        let prepared = HaloProfile::gnfw(0.2).prepare();
        let lo = prepared.fourier(&cosmo, &md, &[1e-3], 1e13, 1.0)[0];
        let hi = prepared.fourier(&cosmo, &md, &[1e-3], 1e15, 1.0)[0];
        assert!(lo > 0.0 && hi > lo * 100.0);
    }

    #[test]
    fn profile_json_is_tagged() {
        let p: HaloProfile = serde_json::from_str(r#"{"kind": "gnfw", "b_hydro": 0.3}"#).unwrap();
        assert_eq!(p, HaloProfile::gnfw(0.3));
        let p: HaloProfile = serde_json::from_str(r#"{"kind": "nfw"}"#).unwrap();
        assert_eq!(p, HaloProfile::nfw());
    }
}

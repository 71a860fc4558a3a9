//! Halo ingredients: mass definition, concentration–mass relation, mass
//! function and linear halo bias.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::cosmology::Cosmology;
use super::numerics::bracket;

/// Spherical collapse threshold.
pub const DELTA_C: f64 = 1.686_470_199_841_145;

// ---------------------------------------------------------------------------
// MassDef
// ---------------------------------------------------------------------------

/// Reference density of an overdensity mass definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Density {
    Critical,
    Matter,
}

/// Spherical overdensity mass definition, e.g. 200c.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassDef {
    pub delta: f64,
    pub density: Density,
}

impl MassDef {
    pub const fn new(delta: f64, density: Density) -> Self {
        Self { delta, density }
    }

    /// Δ = 200 with respect to the critical density.
    pub const fn critical_200() -> Self {
        Self::new(200.0, Density::Critical)
    }

    /// Overdensity expressed relative to the mean matter density at `a`.
    pub fn delta_matter(&self, cosmo: &Cosmology, a: f64) -> f64 {
        match self.density {
            Density::Matter => self.delta,
            Density::Critical => self.delta / cosmo.omega_m_of_a(a),
        }
    }

    /// Comoving halo radius of mass `m` at scale factor `a`.
    pub fn radius(&self, cosmo: &Cosmology, m: f64, a: f64) -> f64 {
        let rho = match self.density {
            Density::Critical => cosmo.rho_crit(a),
            Density::Matter => cosmo.rho_m() / a.powi(3),
        };
        (3.0 * m / (4.0 * PI * self.delta * rho)).cbrt() / a
    }
}

// ---------------------------------------------------------------------------
// Concentration
// ---------------------------------------------------------------------------

/// Concentration–mass relations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concentration {
    /// Duffy et al. (2008), full sample, 200c.
    #[default]
    Duffy08,
}

impl Concentration {
    pub fn concentration(&self, cosmo: &Cosmology, m: f64, a: f64) -> f64 {
        match self {
            Concentration::Duffy08 => {
                let m_pivot = 2e12 / cosmo.h();
                5.71 * (m / m_pivot).powf(-0.084) * a.powf(0.47)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tinker et al. (2008) mass function
// ---------------------------------------------------------------------------

const TINKER_LOG_DELTA: [f64; 9] = [
    2.301_029_995_663_981, // 200
    2.477_121_254_719_662, // 300
    2.602_059_991_327_962, // 400
    2.778_151_250_383_644, // 600
    2.903_089_986_991_944, // 800
    3.079_181_246_047_625, // 1200
    3.204_119_982_655_925, // 1600
    3.380_211_241_711_606, // 2400
    3.505_149_978_319_906, // 3200
];
const TINKER_A: [f64; 9] = [0.186, 0.200, 0.212, 0.218, 0.248, 0.255, 0.260, 0.260, 0.260];
const TINKER_SMALL_A: [f64; 9] = [1.47, 1.52, 1.56, 1.61, 1.87, 2.13, 2.30, 2.53, 2.66];
const TINKER_B: [f64; 9] = [2.57, 2.25, 2.05, 1.87, 1.59, 1.51, 1.46, 1.44, 1.41];
const TINKER_C: [f64; 9] = [1.19, 1.27, 1.34, 1.45, 1.58, 1.80, 1.97, 2.24, 2.44];

fn tinker_param(table: &[f64; 9], log_delta: f64) -> f64 {
    let x = log_delta.clamp(TINKER_LOG_DELTA[0], TINKER_LOG_DELTA[8]);
    let i = bracket(&TINKER_LOG_DELTA, x);
    let t = (x - TINKER_LOG_DELTA[i]) / (TINKER_LOG_DELTA[i + 1] - TINKER_LOG_DELTA[i]);
    table[i] + t * (table[i + 1] - table[i])
}

/// Multiplicity function f(σ) of Tinker et al. (2008).
#[derive(Debug, Clone, Copy)]
pub struct MassFuncTinker08 {
    mass_def: MassDef,
}

impl MassFuncTinker08 {
    pub fn new(mass_def: MassDef) -> Self {
        Self { mass_def }
    }

    /// f(σ) at scale factor `a` (σ already includes growth).
    pub fn multiplicity(&self, cosmo: &Cosmology, sigma: f64, a: f64) -> f64 {
        let delta_m = self.mass_def.delta_matter(cosmo, a);
        let log_delta = delta_m.log10();

        let big_a = tinker_param(&TINKER_A, log_delta) * a.powf(0.14);
        let small_a = tinker_param(&TINKER_SMALL_A, log_delta) * a.powf(0.06);
        let alpha = 10f64.powf(-(0.75 / (delta_m / 75.0).log10()).powf(1.2));
        let b = tinker_param(&TINKER_B, log_delta) * a.powf(alpha);
        let c = tinker_param(&TINKER_C, log_delta);

        big_a * ((sigma / b).powf(-small_a) + 1.0) * (-c / (sigma * sigma)).exp()
    }

    /// dn/dlog10 M in Mpc⁻³ given σ(M, a) and d ln σ / d log10 M.
    pub fn dn_dlog10m(&self, cosmo: &Cosmology, m: f64, sigma: f64, dlnsigma_dlog10m: f64, a: f64) -> f64 {
        self.multiplicity(cosmo, sigma, a) * cosmo.rho_m() / m * (-dlnsigma_dlog10m)
    }
}

// ---------------------------------------------------------------------------
// Tinker et al. (2010) halo bias
// ---------------------------------------------------------------------------

/// Linear halo bias of Tinker et al. (2010).
#[derive(Debug, Clone, Copy)]
pub struct HaloBiasTinker10 {
    mass_def: MassDef,
}

impl HaloBiasTinker10 {
    pub fn new(mass_def: MassDef) -> Self {
        Self { mass_def }
    }

    pub fn bias(&self, cosmo: &Cosmology, sigma: f64, a: f64) -> f64 {
        let y = self.mass_def.delta_matter(cosmo, a).log10();
        let damp = (-(4.0 / y).powi(4)).exp();
        let big_a = 1.0 + 0.24 * y * damp;
        let small_a = 0.44 * y - 0.88;
        let big_b = 0.183;
        let small_b = 1.5;
        let big_c = 0.019 + 0.107 * y + 0.19 * damp;
        let small_c = 2.4;

        let nu = DELTA_C / sigma;
        1.0 - big_a * nu.powf(small_a) / (nu.powf(small_a) + DELTA_C.powf(small_a))
            + big_b * nu.powf(small_b)
            + big_c * nu.powf(small_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halo::cosmology::CosmologyParams;
    use approx::assert_relative_eq;

    fn planck() -> Cosmology {
        Cosmology::new(CosmologyParams::default()).unwrap()
    }

    #[test]
    fn mass_def_radius_encloses_mass() {
        let c = planck();
        let md = MassDef::critical_200();
        let m = 1e14;
        let r = md.radius(&c, m, 1.0);
        let enclosed = 4.0 / 3.0 * PI * r.powi(3) * 200.0 * c.rho_crit(1.0);
        assert_relative_eq!(enclosed, m, max_relative = 1e-12);
        // comoving radius grows relative to physical at higher redshift
        assert!(md.radius(&c, m, 0.5) > 0.0);
    }

    #[test]
    fn duffy_concentration_at_pivot() {
        let c = planck();
        let conc = Concentration::Duffy08.concentration(&c, 2e12 / c.h(), 1.0);
        assert_relative_eq!(conc, 5.71, max_relative = 1e-12);
        assert!(Concentration::Duffy08.concentration(&c, 1e15, 1.0) < conc);
    }

    #[test]
    fn bias_grows_with_peak_height() {
        let c = planck();
        let hb = HaloBiasTinker10::new(MassDef::critical_200());
        let low = hb.bias(&c, 3.0, 1.0);
        let high = hb.bias(&c, 0.5, 1.0);
        assert!(low < 1.0);
        assert!(high > 2.0);
    }

    #[test]
    fn tinker_multiplicity_is_positive_and_cut_off() {
        let c = planck();
        let mf = MassFuncTinker08::new(MassDef::critical_200());
        assert!(mf.multiplicity(&c, 1.0, 1.0) > 0.0);
        assert!(mf.multiplicity(&c, 0.2, 1.0) < 1e-10);
    }

    #[test]
    fn tinker_table_interpolates() {
        assert_relative_eq!(tinker_param(&TINKER_A, 200f64.log10()), 0.186, max_relative = 1e-12);
        assert_relative_eq!(tinker_param(&TINKER_A, 1e5f64.log10()), 0.260);
        let mid = tinker_param(&TINKER_B, 250f64.log10());
        assert!(mid < 2.57 && mid > 2.25);
    }
}

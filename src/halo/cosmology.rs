//! Flat ΛCDM background, linear growth and the linear matter power spectrum.
//!
//! Units: distances and radii in comoving Mpc, wavenumbers in Mpc⁻¹, masses in
//! M_sun, densities in M_sun Mpc⁻³ (comoving unless stated otherwise).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::numerics::{cumulative_trapezoid, linspace, simpson, Interp1d};

/// Speed of light in km/s.
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;
/// Critical density today in h² M_sun Mpc⁻³.
pub const RHO_CRIT_H2: f64 = 2.775_366_27e11;
/// Photon density Ω_γ h² for T_CMB = 2.7255 K.
const OMEGA_GAMMA_H2: f64 = 2.472_8e-5;
/// Relativistic neutrino energy per species relative to photons.
const NEUTRINO_FACTOR: f64 = 0.227_107;

const LN_A_MIN: f64 = -9.210_340_371_976_184; // ln(1e-4)
const N_BACKGROUND: usize = 4001;
const LN_K_MIN: f64 = -11.512_925_464_970_229; // ln(1e-5)
const LN_K_MAX: f64 = 9.210_340_371_976_184; // ln(1e4)
const N_SIGMA_K: usize = 4001;

#[derive(Debug, Error, PartialEq)]
pub enum CosmologyError {
    #[error("invalid cosmological parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("background tables could not be built")]
    BadBackground,
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Input parameters of a flat ΛCDM cosmology with massless neutrinos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CosmologyParams {
    pub omega_c: f64,
    pub omega_b: f64,
    pub h: f64,
    pub n_s: f64,
    pub sigma8: f64,
    pub t_cmb: f64,
    pub n_eff: f64,
}

impl Default for CosmologyParams {
    /// Planck 2018 TT,TE,EE+lowE+lensing+BAO.
    fn default() -> Self {
        Self {
            omega_c: 0.2607,
            omega_b: 0.0490,
            h: 0.6766,
            n_s: 0.9665,
            sigma8: 0.8102,
            t_cmb: 2.7255,
            n_eff: 3.046,
        }
    }
}

impl CosmologyParams {
    fn validate(&self) -> Result<(), CosmologyError> {
        let checks = [
            ("omega_c", self.omega_c, self.omega_c >= 0.0),
            ("omega_b", self.omega_b, self.omega_b > 0.0),
            ("h", self.h, self.h > 0.0 && self.h <= 2.0),
            ("n_s", self.n_s, self.n_s > 0.0),
            ("sigma8", self.sigma8, self.sigma8 > 0.0),
            ("t_cmb", self.t_cmb, self.t_cmb > 0.0),
            ("n_eff", self.n_eff, self.n_eff >= 0.0),
        ];
        for (name, value, ok) in checks {
            if !ok || !value.is_finite() {
                return Err(CosmologyError::InvalidParameter { name, value });
            }
        }
        if self.omega_c + self.omega_b >= 1.0 {
            return Err(CosmologyError::InvalidParameter {
                name: "omega_m",
                value: self.omega_c + self.omega_b,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cosmology
// ---------------------------------------------------------------------------

/// A cosmology with precomputed distance, growth and σ(R) tables.
#[derive(Debug, Clone)]
pub struct Cosmology {
    params: CosmologyParams,
    omega_m: f64,
    omega_r: f64,
    omega_l: f64,
    /// χ as a function of ln a.
    chi_of_lna: Interp1d,
    /// ln a as a function of χ.
    lna_of_chi: Interp1d,
    /// D(a) normalised to 1 today, as a function of ln a.
    growth_of_lna: Interp1d,
    /// ln k grid and k³ P_lin(k, a=1) / (2π²) on it, used for σ(R).
    sigma_lnk: Vec<f64>,
    sigma_weight: Vec<f64>,
    /// Amplitude fixing σ8.
    amplitude: f64,
}

impl Cosmology {
    pub fn new(params: CosmologyParams) -> Result<Self, CosmologyError> {
        params.validate()?;

        let omega_m = params.omega_c + params.omega_b;
        let omega_gamma = OMEGA_GAMMA_H2 * (params.t_cmb / 2.7255).powi(4) / (params.h * params.h);
        let omega_r = omega_gamma * (1.0 + NEUTRINO_FACTOR * params.n_eff);
        let omega_l = 1.0 - omega_m - omega_r;

        let hubble_distance = SPEED_OF_LIGHT_KM_S / (100.0 * params.h);

        // χ(a) = c/H0 ∫_a^1 dln a' / (a' E(a')), accumulated from a = 1 downwards
        let lna_desc = linspace(0.0, LN_A_MIN, N_BACKGROUND);
        let inv_ae: Vec<f64> = lna_desc
            .iter()
            .map(|&lna| {
                let a = lna.exp();
                1.0 / (a * e_of_a(omega_m, omega_r, omega_l, a))
            })
            .collect();
        let neg_lna: Vec<f64> = lna_desc.iter().map(|v| -v).collect();
        let chi_desc: Vec<f64> = cumulative_trapezoid(&neg_lna, &inv_ae)
            .into_iter()
            .map(|v| v * hubble_distance)
            .collect();

        let lna_asc: Vec<f64> = lna_desc.iter().rev().copied().collect();
        let chi_asc_by_lna: Vec<f64> = chi_desc.iter().rev().copied().collect();
        let chi_of_lna = Interp1d::new(lna_asc.clone(), chi_asc_by_lna).ok_or(CosmologyError::BadBackground)?;
        let lna_of_chi = Interp1d::new(chi_desc, lna_desc).ok_or(CosmologyError::BadBackground)?;

        // D(a) ∝ E(a) ∫_0^a da' / (a' E(a'))³, matter + Λ only
        let growth_integrand: Vec<f64> = lna_asc
            .iter()
            .map(|&lna| {
                let a = lna.exp();
                let e = e_of_a(omega_m, 0.0, 1.0 - omega_m, a);
                1.0 / (a * a * e.powi(3))
            })
            .collect();
        let a_first = LN_A_MIN.exp();
        let early = 0.4 * a_first.powf(2.5) / omega_m.powf(1.5);
        let growth_raw: Vec<f64> = cumulative_trapezoid(&lna_asc, &growth_integrand)
            .into_iter()
            .zip(&lna_asc)
            .map(|(integral, &lna)| {
                let a = lna.exp();
                e_of_a(omega_m, 0.0, 1.0 - omega_m, a) * (integral + early)
            })
            .collect();
        let today = growth_raw[growth_raw.len() - 1];
        let growth: Vec<f64> = growth_raw.iter().map(|d| d / today).collect();
        let growth_of_lna = Interp1d::new(lna_asc, growth).ok_or(CosmologyError::BadBackground)?;

        let mut cosmo = Self {
            params,
            omega_m,
            omega_r,
            omega_l,
            chi_of_lna,
            lna_of_chi,
            growth_of_lna,
            sigma_lnk: Vec::new(),
            sigma_weight: Vec::new(),
            amplitude: 1.0,
        };

        let sigma_lnk = linspace(LN_K_MIN, LN_K_MAX, N_SIGMA_K);
        let sigma_weight: Vec<f64> = sigma_lnk
            .iter()
            .map(|&lnk| {
                let k = lnk.exp();
                k.powi(3) * cosmo.unnormalised_power(k) / (2.0 * std::f64::consts::PI.powi(2))
            })
            .collect();
        cosmo.sigma_lnk = sigma_lnk;
        cosmo.sigma_weight = sigma_weight;

        let sigma8_raw = cosmo.sigma_r(8.0 / params.h);
        cosmo.amplitude = (params.sigma8 / sigma8_raw).powi(2);
        Ok(cosmo)
    }

    pub fn h(&self) -> f64 {
        self.params.h
    }

    pub fn omega_m(&self) -> f64 {
        self.omega_m
    }

    /// c / H0 in Mpc.
    pub fn hubble_distance(&self) -> f64 {
        SPEED_OF_LIGHT_KM_S / (100.0 * self.params.h)
    }

    /// H(a) / H0.
    pub fn e_of_a(&self, a: f64) -> f64 {
        e_of_a(self.omega_m, self.omega_r, self.omega_l, a)
    }

    /// H(a) / c in Mpc⁻¹.
    pub fn hubble_over_c(&self, a: f64) -> f64 {
        self.e_of_a(a) / self.hubble_distance()
    }

    /// Ω_m(a).
    pub fn omega_m_of_a(&self, a: f64) -> f64 {
        self.omega_m / (a.powi(3) * self.e_of_a(a).powi(2))
    }

    /// Physical critical density at `a`.
    pub fn rho_crit(&self, a: f64) -> f64 {
        RHO_CRIT_H2 * self.params.h.powi(2) * self.e_of_a(a).powi(2)
    }

    /// Comoving mean matter density.
    pub fn rho_m(&self) -> f64 {
        RHO_CRIT_H2 * self.params.h.powi(2) * self.omega_m
    }

    /// Comoving radial distance to scale factor `a`.
    pub fn comoving_distance(&self, a: f64) -> f64 {
        self.chi_of_lna.eval(a.ln())
    }

    /// Scale factor at comoving distance `chi`.
    pub fn scale_factor_of_chi(&self, chi: f64) -> f64 {
        self.lna_of_chi.eval(chi).exp().min(1.0)
    }

    /// Linear growth factor, D(1) = 1.
    pub fn growth_factor(&self, a: f64) -> f64 {
        self.growth_of_lna.eval(a.ln())
    }

    /// Eisenstein & Hu (1998) transfer function without baryon oscillations.
    pub fn transfer(&self, k: f64) -> f64 {
        let h = self.params.h;
        let omh2 = self.omega_m * h * h;
        let obh2 = self.params.omega_b * h * h;
        let fb = self.params.omega_b / self.omega_m;
        let theta = self.params.t_cmb / 2.7;

        let s = 44.5 * (9.83 / omh2).ln() / (1.0 + 10.0 * obh2.powf(0.75)).sqrt();
        let alpha_gamma = 1.0 - 0.328 * (431.0 * omh2).ln() * fb + 0.38 * (22.3 * omh2).ln() * fb * fb;
        let gamma_eff =
            self.omega_m * h * (alpha_gamma + (1.0 - alpha_gamma) / (1.0 + (0.43 * k * s).powi(4)));
        let q = k * theta * theta / (gamma_eff * h);
        let l0 = (2.0 * std::f64::consts::E + 1.8 * q).ln();
        let c0 = 14.2 + 731.0 / (1.0 + 62.5 * q);
        l0 / (l0 + c0 * q * q)
    }

    fn unnormalised_power(&self, k: f64) -> f64 {
        k.powf(self.params.n_s) * self.transfer(k).powi(2)
    }

    /// Linear matter power spectrum in Mpc³.
    pub fn linear_power(&self, k: f64, a: f64) -> f64 {
        let d = self.growth_factor(a);
        self.amplitude * self.unnormalised_power(k) * d * d
    }

    /// RMS linear density contrast today in a top-hat sphere of radius `r`.
    pub fn sigma_r(&self, r: f64) -> f64 {
        let dlnk = self.sigma_lnk[1] - self.sigma_lnk[0];
        let integrand: Vec<f64> = self
            .sigma_lnk
            .iter()
            .zip(&self.sigma_weight)
            .map(|(&lnk, &w)| {
                let win = top_hat_window(lnk.exp() * r);
                w * win * win
            })
            .collect();
        (self.amplitude * simpson(&integrand, dlnk)).sqrt()
    }

    /// Lagrangian radius enclosing mass `m` at the mean matter density.
    pub fn lagrangian_radius(&self, m: f64) -> f64 {
        (3.0 * m / (4.0 * std::f64::consts::PI * self.rho_m())).cbrt()
    }

    /// σ(M) today.
    pub fn sigma_m(&self, m: f64) -> f64 {
        self.sigma_r(self.lagrangian_radius(m))
    }
}

fn e_of_a(omega_m: f64, omega_r: f64, omega_l: f64, a: f64) -> f64 {
    (omega_m / a.powi(3) + omega_r / a.powi(4) + omega_l).sqrt()
}

/// Fourier transform of a unit top-hat sphere.
pub fn top_hat_window(x: f64) -> f64 {
    if x < 1e-3 {
        1.0 - x * x / 10.0
    } else {
        3.0 * (x.sin() - x * x.cos()) / x.powi(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn planck() -> Cosmology {
        Cosmology::new(CosmologyParams::default()).unwrap()
    }

    #[test]
    fn sigma8_is_reproduced() {
        let c = planck();
        assert_relative_eq!(c.sigma_r(8.0 / c.h()), 0.8102, max_relative = 1e-6);
    }

    #[test]
    fn growth_is_normalised_and_increasing() {
        let c = planck();
        assert_relative_eq!(c.growth_factor(1.0), 1.0, max_relative = 1e-10);
        assert!(c.growth_factor(0.5) < c.growth_factor(0.8));
        // matter domination: D ≈ a up to a constant; ΛCDM growth at z=1 is about 0.61
        let d1 = c.growth_factor(0.5);
        assert!(d1 > 0.58 && d1 < 0.64, "D(z=1) = {d1}");
    }

    #[test]
    fn comoving_distance_to_z1() {
        let c = planck();
        let chi = c.comoving_distance(0.5);
        // about 3.4 Gpc for Planck-like parameters
        assert!(chi > 3300.0 && chi < 3500.0, "chi(z=1) = {chi}");
        assert_relative_eq!(c.scale_factor_of_chi(chi), 0.5, max_relative = 1e-4);
        assert_relative_eq!(c.comoving_distance(1.0), 0.0);
    }

    #[test]
    fn rejects_unphysical_parameters() {
        let params = CosmologyParams {
            h: -0.7,
            ..CosmologyParams::default()
        };
        assert_eq!(
            Cosmology::new(params).unwrap_err(),
            CosmologyError::InvalidParameter { name: "h", value: -0.7 }
        );
    }

    #[test]
    fn transfer_function_limits() {
        let c = planck();
        assert_relative_eq!(c.transfer(1e-6), 1.0, max_relative = 1e-3);
        assert!(c.transfer(10.0) < 1e-3);
    }
}

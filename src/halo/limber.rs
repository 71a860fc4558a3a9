//! Limber-approximated angular power spectra of two halo-model tracers.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::calculator::{HaloModelCalculator, Pk2d};
use super::cosmology::Cosmology;
use super::halos::MassDef;
use super::numerics::{geomspace, linspace, simpson};
use super::profiles::HaloProfile;
use super::tracers::Tracer;
use super::HaloModelError;

pub const K_MIN: f64 = 1e-4;
pub const K_MAX: f64 = 1e2;
pub const N_K: usize = 256;
pub const A_MIN: f64 = 0.2;
pub const A_MAX: f64 = 1.0;
pub const N_A: usize = 64;

/// Lowest redshift reached by the line-of-sight integral.
const Z_MIN_LIMBER: f64 = 1e-3;
const N_CHI: usize = 1001;

/// A tracer paired with the halo profile of the field it traces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerProfile {
    pub tracer: Tracer,
    pub profile: HaloProfile,
}

impl TracerProfile {
    pub fn new(tracer: Tracer, profile: HaloProfile) -> Self {
        Self { tracer, profile }
    }
}

/// Fixed halo-model configuration: 200c masses, Duffy (2008)
/// concentrations, Tinker mass function and bias.
#[derive(Debug, Clone)]
pub struct LimberHaloModel {
    cosmo: Cosmology,
    calculator: HaloModelCalculator,
    ks: Vec<f64>,
    scale_factors: Vec<f64>,
}

impl LimberHaloModel {
    pub fn new(cosmo: Cosmology) -> Result<Self, HaloModelError> {
        let calculator = HaloModelCalculator::new(&cosmo, MassDef::critical_200())?;
        Ok(Self {
            cosmo,
            calculator,
            ks: geomspace(K_MIN, K_MAX, N_K),
            scale_factors: linspace(A_MIN, A_MAX, N_A),
        })
    }

    pub fn cosmology(&self) -> &Cosmology {
        &self.cosmo
    }

    /// Halo-model P(k, a) of the two profiles on the standard grids.
    pub fn power_spectrum_2d(&self, p1: &HaloProfile, p2: &HaloProfile) -> Result<Pk2d, HaloModelError> {
        let prep1 = p1.prepare();
        if p1 == p2 {
            // auto spectrum: Fourier profiles are evaluated once
            return self
                .calculator
                .tabulate(&self.cosmo, &self.ks, &self.scale_factors, &prep1, &prep1);
        }
        let prep2 = p2.prepare();
        self.calculator
            .tabulate(&self.cosmo, &self.ks, &self.scale_factors, &prep1, &prep2)
    }

    /// C_ℓ of the two tracers at multipoles `ells`.
    pub fn angular_power(
        &self,
        ells: &[f64],
        first: &TracerProfile,
        second: &TracerProfile,
    ) -> Result<Vec<f64>, HaloModelError> {
        info!("computing {} multipoles", ells.len());
        let pk = self.power_spectrum_2d(&first.profile, &second.profile)?;
        self.angular_power_with(&pk, ells, &first.tracer, &second.tracer)
    }

    /// C_ℓ with a precomputed P(k, a).
    pub fn angular_power_with(
        &self,
        pk: &Pk2d,
        ells: &[f64],
        first: &Tracer,
        second: &Tracer,
    ) -> Result<Vec<f64>, HaloModelError> {
        if ells.iter().any(|l| !l.is_finite() || *l < 0.0) {
            return Err(HaloModelError::BadGrid("multipoles must be finite and non-negative"));
        }
        let k1 = first.kernel(&self.cosmo)?;
        let k2 = second.kernel(&self.cosmo)?;

        let (lo1, hi1) = k1.support();
        let (lo2, hi2) = k2.support();
        let chi_floor = self.cosmo.comoving_distance(1.0 / (1.0 + Z_MIN_LIMBER));
        let chi_lo = lo1.max(lo2).max(chi_floor);
        let chi_hi = hi1.min(hi2);
        if !(chi_hi > chi_lo) {
            return Err(HaloModelError::EmptyOverlap);
        }
        debug!("Limber range chi in [{chi_lo:.2}, {chi_hi:.2}] Mpc");

        // Simpson in ln χ: dχ W1 W2 / χ² = d ln χ W1 W2 / χ
        let ln_chi = linspace(chi_lo.ln(), chi_hi.ln(), N_CHI);
        let dln_chi = ln_chi[1] - ln_chi[0];
        let nodes: Vec<(f64, f64, f64)> = ln_chi
            .iter()
            .map(|&lc| {
                let chi = lc.exp();
                let weight = k1.eval(chi) * k2.eval(chi) / chi;
                (chi, self.cosmo.scale_factor_of_chi(chi), weight)
            })
            .collect();

        let cls = ells
            .iter()
            .map(|&ell| {
                let integrand: Vec<f64> = nodes
                    .iter()
                    .map(|&(chi, a, w)| {
                        if w == 0.0 {
                            0.0
                        } else {
                            w * pk.eval(&self.cosmo, (ell + 0.5) / chi, a)
                        }
                    })
                    .collect();
                simpson(&integrand, dln_chi) * k1.ell_factor(ell) * k2.ell_factor(ell)
            })
            .collect();
        Ok(cls)
    }
}

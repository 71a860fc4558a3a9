//! Halo-model power spectrum and its (k, a) tabulation.

use log::debug;
use ndarray::Array2;

use super::cosmology::Cosmology;
use super::halos::{HaloBiasTinker10, MassDef, MassFuncTinker08};
use super::numerics::{bracket, linspace, simpson};
use super::profiles::PreparedProfile;
use super::HaloModelError;

pub const LOG10_M_MIN: f64 = 6.0;
pub const LOG10_M_MAX: f64 = 17.0;
pub const N_MASS: usize = 128;
/// Wavenumber at which normalised profiles are divided out, Mpc⁻¹.
pub const K_NORM: f64 = 1e-5;
/// Half step in log10 M for d ln σ / d log10 M.
const DLOG10M_SIGMA: f64 = 0.005;

// ---------------------------------------------------------------------------
// HaloModelCalculator
// ---------------------------------------------------------------------------

/// Mass-function weighted integrals over a fixed log10 M grid.
#[derive(Debug, Clone)]
pub struct HaloModelCalculator {
    mass_def: MassDef,
    mass_function: MassFuncTinker08,
    halo_bias: HaloBiasTinker10,
    masses: Vec<f64>,
    dlog10m: f64,
    /// σ(M) today; multiplied by D(a) per redshift.
    sigma0: Vec<f64>,
    dlnsigma_dlog10m: Vec<f64>,
}

/// Mass function, bias and low-mass completion at one scale factor.
#[derive(Debug, Clone)]
pub struct HaloIngredients {
    mf: Vec<f64>,
    bf: Vec<f64>,
    mf0: f64,
    mbf0: f64,
    dlog10m: f64,
}

impl HaloIngredients {
    /// ∫ n(M) f(M) dlog10 M plus the completion term at the lowest mass.
    pub fn integrate_over_mf(&self, f: &[f64]) -> f64 {
        let y: Vec<f64> = self.mf.iter().zip(f).map(|(n, v)| n * v).collect();
        simpson(&y, self.dlog10m) + self.mf0 * f[0]
    }

    /// ∫ n(M) b(M) f(M) dlog10 M plus the completion term at the lowest mass.
    pub fn integrate_over_mbf(&self, f: &[f64]) -> f64 {
        let y: Vec<f64> = self
            .mf
            .iter()
            .zip(&self.bf)
            .zip(f)
            .map(|((n, b), v)| n * b * v)
            .collect();
        simpson(&y, self.dlog10m) + self.mbf0 * f[0]
    }
}

/// One- and two-halo contributions on a k grid.
#[derive(Debug, Clone, PartialEq)]
pub struct HaloPowerTerms {
    pub one_halo: Vec<f64>,
    pub two_halo: Vec<f64>,
}

impl HaloPowerTerms {
    pub fn total(&self) -> Vec<f64> {
        self.one_halo.iter().zip(&self.two_halo).map(|(a, b)| a + b).collect()
    }
}

impl HaloModelCalculator {
    /// Tinker (2008) mass function and Tinker (2010) bias over log10 M ∈ [6, 17].
    pub fn new(cosmo: &Cosmology, mass_def: MassDef) -> Result<Self, HaloModelError> {
        Self::with_mass_grid(cosmo, mass_def, LOG10_M_MIN, LOG10_M_MAX, N_MASS)
    }

    pub fn with_mass_grid(
        cosmo: &Cosmology,
        mass_def: MassDef,
        log10m_min: f64,
        log10m_max: f64,
        n_mass: usize,
    ) -> Result<Self, HaloModelError> {
        if n_mass < 3 || !(log10m_max > log10m_min) {
            return Err(HaloModelError::BadGrid("mass grid needs at least 3 increasing nodes"));
        }
        let log10m = linspace(log10m_min, log10m_max, n_mass);
        let dlog10m = log10m[1] - log10m[0];
        let masses: Vec<f64> = log10m.iter().map(|lm| 10f64.powf(*lm)).collect();
        let sigma0: Vec<f64> = masses.iter().map(|&m| cosmo.sigma_m(m)).collect();
        let dlnsigma_dlog10m: Vec<f64> = log10m
            .iter()
            .map(|lm| {
                let hi = cosmo.sigma_m(10f64.powf(lm + DLOG10M_SIGMA)).ln();
                let lo = cosmo.sigma_m(10f64.powf(lm - DLOG10M_SIGMA)).ln();
                (hi - lo) / (2.0 * DLOG10M_SIGMA)
            })
            .collect();

        Ok(Self {
            mass_def,
            mass_function: MassFuncTinker08::new(mass_def),
            halo_bias: HaloBiasTinker10::new(mass_def),
            masses,
            dlog10m,
            sigma0,
            dlnsigma_dlog10m,
        })
    }

    pub fn mass_def(&self) -> &MassDef {
        &self.mass_def
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn ingredients(&self, cosmo: &Cosmology, a: f64) -> HaloIngredients {
        let growth = cosmo.growth_factor(a);
        let rho_m = cosmo.rho_m();
        let m_min = self.masses[0];

        let mut mf = Vec::with_capacity(self.masses.len());
        let mut bf = Vec::with_capacity(self.masses.len());
        for ((&m, &s0), &dls) in self.masses.iter().zip(&self.sigma0).zip(&self.dlnsigma_dlog10m) {
            let sigma = s0 * growth;
            mf.push(self.mass_function.dn_dlog10m(cosmo, m, sigma, dls, a));
            bf.push(self.halo_bias.bias(cosmo, sigma, a));
        }

        let nm: Vec<f64> = mf.iter().zip(&self.masses).map(|(n, m)| n * m).collect();
        let nbm: Vec<f64> = nm.iter().zip(&bf).map(|(v, b)| v * b).collect();
        let mf0 = (rho_m - simpson(&nm, self.dlog10m)) / m_min;
        let mbf0 = (rho_m - simpson(&nbm, self.dlog10m)) / m_min;

        HaloIngredients {
            mf,
            bf,
            mf0,
            mbf0,
            dlog10m: self.dlog10m,
        }
    }

    /// Large-scale normalisation of `profile`: 1 / I_0^1(K_NORM) when the
    /// profile is normalised, 1 otherwise.
    pub fn profile_norm(&self, cosmo: &Cosmology, ing: &HaloIngredients, profile: &PreparedProfile, a: f64) -> f64 {
        if !profile.is_normalized() {
            return 1.0;
        }
        let u: Vec<f64> = self
            .masses
            .iter()
            .map(|&m| profile.fourier(cosmo, &self.mass_def, &[K_NORM], m, a)[0])
            .collect();
        1.0 / ing.integrate_over_mf(&u)
    }

    /// One- and two-halo terms of the cross spectrum of `p1` and `p2` at `a`.
    pub fn power_terms(
        &self,
        cosmo: &Cosmology,
        ks: &[f64],
        a: f64,
        p1: &PreparedProfile,
        p2: &PreparedProfile,
    ) -> HaloPowerTerms {
        let ing = self.ingredients(cosmo, a);
        let norm = self.profile_norm(cosmo, &ing, p1, a) * self.profile_norm(cosmo, &ing, p2, a);

        // u[m][k]
        let u1: Vec<Vec<f64>> = self
            .masses
            .iter()
            .map(|&m| p1.fourier(cosmo, &self.mass_def, ks, m, a))
            .collect();
        let u2: Vec<Vec<f64>> = if std::ptr::eq(p1, p2) {
            u1.clone()
        } else {
            self.masses
                .iter()
                .map(|&m| p2.fourier(cosmo, &self.mass_def, ks, m, a))
                .collect()
        };

        let mut one_halo = Vec::with_capacity(ks.len());
        let mut two_halo = Vec::with_capacity(ks.len());
        let mut col1 = vec![0.0; self.masses.len()];
        let mut col2 = vec![0.0; self.masses.len()];
        let mut cross = vec![0.0; self.masses.len()];
        for (ik, &k) in ks.iter().enumerate() {
            for im in 0..self.masses.len() {
                col1[im] = u1[im][ik];
                col2[im] = u2[im][ik];
                cross[im] = col1[im] * col2[im];
            }
            let i11_1 = ing.integrate_over_mbf(&col1);
            let i11_2 = ing.integrate_over_mbf(&col2);
            let i02 = ing.integrate_over_mf(&cross);
            two_halo.push(cosmo.linear_power(k, a) * i11_1 * i11_2 * norm);
            one_halo.push(i02 * norm);
        }
        HaloPowerTerms { one_halo, two_halo }
    }

    /// Total halo-model P(k, a).
    pub fn power_spectrum(
        &self,
        cosmo: &Cosmology,
        ks: &[f64],
        a: f64,
        p1: &PreparedProfile,
        p2: &PreparedProfile,
    ) -> Vec<f64> {
        self.power_terms(cosmo, ks, a, p1, p2).total()
    }

    /// Tabulate P(k, a) on `ks` × `scale_factors`.
    pub fn tabulate(
        &self,
        cosmo: &Cosmology,
        ks: &[f64],
        scale_factors: &[f64],
        p1: &PreparedProfile,
        p2: &PreparedProfile,
    ) -> Result<Pk2d, HaloModelError> {
        debug!(
            "tabulating halo-model P(k, a) on {} k x {} a nodes",
            ks.len(),
            scale_factors.len()
        );
        let mut table = Array2::<f64>::zeros((scale_factors.len(), ks.len()));
        for (ia, &a) in scale_factors.iter().enumerate() {
            let pk = self.power_spectrum(cosmo, ks, a, p1, p2);
            for (ik, v) in pk.into_iter().enumerate() {
                table[[ia, ik]] = v;
            }
        }
        Pk2d::new(ks, scale_factors, table, cosmo)
    }
}

// ---------------------------------------------------------------------------
// Pk2d
// ---------------------------------------------------------------------------

/// P(k, a) table. Rows are scale factors, columns wavenumbers.
///
/// Interpolation is bilinear in (ln k, a), on ln P when the whole table is
/// positive. Beyond the k range the edge segments are extended linearly;
/// below the first scale factor the spectrum is scaled by the linear growth
/// squared; above the last it is held fixed.
#[derive(Debug, Clone)]
pub struct Pk2d {
    ln_k: Vec<f64>,
    a: Vec<f64>,
    table: Array2<f64>,
    log_table: bool,
    growth_a_min: f64,
}

impl Pk2d {
    pub fn new(ks: &[f64], scale_factors: &[f64], values: Array2<f64>, cosmo: &Cosmology) -> Result<Self, HaloModelError> {
        let increasing = |v: &[f64]| v.len() >= 2 && v.windows(2).all(|w| w[1] > w[0]);
        if !increasing(ks) || ks[0] <= 0.0 {
            return Err(HaloModelError::BadGrid("k grid must be positive, increasing, at least 2 long"));
        }
        if !increasing(scale_factors) || scale_factors[0] <= 0.0 {
            return Err(HaloModelError::BadGrid("a grid must be positive, increasing, at least 2 long"));
        }
        if values.dim() != (scale_factors.len(), ks.len()) {
            return Err(HaloModelError::BadGrid("P(k, a) table does not match its grids"));
        }

        let log_table = values.iter().all(|&v| v > 0.0);
        let table = if log_table { values.mapv(f64::ln) } else { values };
        Ok(Self {
            ln_k: ks.iter().map(|k| k.ln()).collect(),
            a: scale_factors.to_vec(),
            table,
            log_table,
            growth_a_min: cosmo.growth_factor(scale_factors[0]),
        })
    }

    pub fn a_range(&self) -> (f64, f64) {
        (self.a[0], self.a[self.a.len() - 1])
    }

    pub fn eval(&self, cosmo: &Cosmology, k: f64, a: f64) -> f64 {
        let (a_min, a_max) = self.a_range();
        let a_in = a.clamp(a_min, a_max);

        let lnk = k.ln();
        let i = bracket(&self.ln_k, lnk);
        let t = (lnk - self.ln_k[i]) / (self.ln_k[i + 1] - self.ln_k[i]);
        let j = bracket(&self.a, a_in);
        let u = (a_in - self.a[j]) / (self.a[j + 1] - self.a[j]);

        let row = |jj: usize| self.table[[jj, i]] + t * (self.table[[jj, i + 1]] - self.table[[jj, i]]);
        let v = row(j) + u * (row(j + 1) - row(j));
        let p = if self.log_table { v.exp() } else { v };

        if a < a_min {
            let ratio = cosmo.growth_factor(a) / self.growth_a_min;
            p * ratio * ratio
        } else {
            p
        }
    }
}

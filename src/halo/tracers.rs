//! Line-of-sight kernels W(χ) for the Limber integral.

use serde::{Deserialize, Serialize};

use super::cosmology::Cosmology;
use super::numerics::{bracket, linspace, Interp1d};
use super::HaloModelError;

/// Redshift of the CMB last-scattering surface used by [`Tracer::CmbLensing`].
pub const Z_LAST_SCATTERING: f64 = 1100.0;
/// σ_T / (m_e c²) in cm² eV⁻¹ times 1 Mpc in cm.
pub const TSZ_PREFACTOR: f64 = 4.017_100_79e-6;

const N_KERNEL: usize = 1024;

fn default_bias() -> f64 {
    1.0
}

fn default_z_source() -> f64 {
    Z_LAST_SCATTERING
}

fn default_tsz_z_max() -> f64 {
    6.0
}

/// A projected field observed along the line of sight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tracer {
    /// Galaxy number counts with redshift distribution `nz` sampled at `z`
    /// and a constant linear bias.
    NumberCounts {
        z: Vec<f64>,
        nz: Vec<f64>,
        #[serde(default = "default_bias")]
        bias: f64,
    },
    /// Cosmic shear of sources distributed as `nz`.
    WeakLensing { z: Vec<f64>, nz: Vec<f64> },
    /// CMB lensing convergence.
    CmbLensing {
        #[serde(default = "default_z_source")]
        z_source: f64,
    },
    /// Thermal Sunyaev–Zel'dovich Compton-y.
    ThermalSz {
        #[serde(default = "default_tsz_z_max")]
        z_max: f64,
    },
}

/// ℓ-dependent prefactor applied on top of the Limber integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EllFactor {
    Unity,
    /// sqrt((ℓ+2)!/(ℓ-2)!) / (ℓ+½)².
    Shear,
    /// ℓ(ℓ+1) / (ℓ+½)².
    Convergence,
}

impl EllFactor {
    pub fn eval(&self, ell: f64) -> f64 {
        let l2 = (ell + 0.5) * (ell + 0.5);
        match self {
            EllFactor::Unity => 1.0,
            EllFactor::Shear => {
                if ell < 2.0 {
                    0.0
                } else {
                    ((ell + 2.0) * (ell + 1.0) * ell * (ell - 1.0)).sqrt() / l2
                }
            }
            EllFactor::Convergence => ell * (ell + 1.0) / l2,
        }
    }
}

/// Tabulated W(χ), zero outside its support.
#[derive(Debug, Clone)]
pub struct Kernel {
    chi: Vec<f64>,
    weight: Vec<f64>,
    ell_factor: EllFactor,
}

impl Kernel {
    fn new(chi: Vec<f64>, weight: Vec<f64>, ell_factor: EllFactor) -> Self {
        Self {
            chi,
            weight,
            ell_factor,
        }
    }

    pub fn support(&self) -> (f64, f64) {
        (self.chi[0], self.chi[self.chi.len() - 1])
    }

    pub fn eval(&self, chi: f64) -> f64 {
        let (lo, hi) = self.support();
        if chi < lo || chi > hi {
            return 0.0;
        }
        let i = bracket(&self.chi, chi);
        let t = (chi - self.chi[i]) / (self.chi[i + 1] - self.chi[i]);
        self.weight[i] + t * (self.weight[i + 1] - self.weight[i])
    }

    pub fn ell_factor(&self, ell: f64) -> f64 {
        self.ell_factor.eval(ell)
    }
}

impl Tracer {
    pub fn number_counts(z: Vec<f64>, nz: Vec<f64>, bias: f64) -> Self {
        Tracer::NumberCounts { z, nz, bias }
    }

    pub fn weak_lensing(z: Vec<f64>, nz: Vec<f64>) -> Self {
        Tracer::WeakLensing { z, nz }
    }

    pub fn cmb_lensing() -> Self {
        Tracer::CmbLensing {
            z_source: Z_LAST_SCATTERING,
        }
    }

    pub fn thermal_sz() -> Self {
        Tracer::ThermalSz {
            z_max: default_tsz_z_max(),
        }
    }

    /// Build the radial kernel for `cosmo`.
    pub fn kernel(&self, cosmo: &Cosmology) -> Result<Kernel, HaloModelError> {
        match self {
            Tracer::NumberCounts { z, nz, bias } => number_counts_kernel(cosmo, z, nz, *bias),
            Tracer::WeakLensing { z, nz } => weak_lensing_kernel(cosmo, z, nz),
            Tracer::CmbLensing { z_source } => cmb_lensing_kernel(cosmo, *z_source),
            Tracer::ThermalSz { z_max } => thermal_sz_kernel(cosmo, *z_max),
        }
    }
}

// ---------------------------------------------------------------------------
// Kernels
// ---------------------------------------------------------------------------

fn chi_of_z(cosmo: &Cosmology, z: f64) -> f64 {
    cosmo.comoving_distance(1.0 / (1.0 + z))
}

/// Unit-normalised p(z) as a linear interpolant that is zero outside the
/// sampled range.
struct RedshiftDistribution {
    pz: Interp1d,
}

impl RedshiftDistribution {
    fn new(z: &[f64], nz: &[f64]) -> Result<Self, HaloModelError> {
        if z.len() != nz.len() {
            return Err(HaloModelError::InvalidTracer(format!(
                "{} redshifts but {} n(z) values",
                z.len(),
                nz.len()
            )));
        }
        if z.first().is_some_and(|&z0| z0 < 0.0) {
            return Err(HaloModelError::InvalidTracer("negative redshift".into()));
        }
        if nz.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(HaloModelError::InvalidTracer("n(z) must be finite and non-negative".into()));
        }
        let norm: f64 = z
            .windows(2)
            .zip(nz.windows(2))
            .map(|(zw, nw)| 0.5 * (zw[1] - zw[0]) * (nw[0] + nw[1]))
            .sum();
        if !(norm > 0.0) {
            return Err(HaloModelError::InvalidTracer("n(z) integrates to zero".into()));
        }
        let pz = Interp1d::new(z.to_vec(), nz.iter().map(|v| v / norm).collect()).ok_or_else(|| {
            HaloModelError::InvalidTracer("redshifts must be strictly increasing and at least 2".into())
        })?;
        Ok(Self { pz })
    }

    fn z_range(&self) -> (f64, f64) {
        (self.pz.x_min(), self.pz.x_max())
    }

    fn eval(&self, z: f64) -> f64 {
        let (lo, hi) = self.z_range();
        if z < lo || z > hi {
            0.0
        } else {
            self.pz.eval(z)
        }
    }
}

fn number_counts_kernel(cosmo: &Cosmology, z: &[f64], nz: &[f64], bias: f64) -> Result<Kernel, HaloModelError> {
    let dist = RedshiftDistribution::new(z, nz)?;
    let (z_lo, z_hi) = dist.z_range();
    let zs = linspace(z_lo, z_hi, N_KERNEL);

    let chi = zs.iter().map(|&z| chi_of_z(cosmo, z)).collect();
    let weight = zs
        .iter()
        .map(|&z| bias * dist.eval(z) * cosmo.hubble_over_c(1.0 / (1.0 + z)))
        .collect();
    Ok(Kernel::new(chi, weight, EllFactor::Unity))
}

fn weak_lensing_kernel(cosmo: &Cosmology, z: &[f64], nz: &[f64]) -> Result<Kernel, HaloModelError> {
    let dist = RedshiftDistribution::new(z, nz)?;
    let (_, z_hi) = dist.z_range();
    let zs = linspace(0.0, z_hi, N_KERNEL);
    let dz = zs[1] - zs[0];
    let chi: Vec<f64> = zs.iter().map(|&z| chi_of_z(cosmo, z)).collect();
    let pz: Vec<f64> = zs.iter().map(|&z| dist.eval(z)).collect();

    // lensing efficiency ∫_z^∞ p(z') (1 - χ/χ') dz'
    let efficiency = |i: usize| -> f64 {
        let f = |j: usize| {
            if chi[j] > 0.0 {
                pz[j] * (1.0 - chi[i] / chi[j])
            } else {
                0.0
            }
        };
        (i..N_KERNEL - 1).map(|j| 0.5 * dz * (f(j) + f(j + 1))).sum()
    };

    let prefactor = 1.5 * cosmo.omega_m() / cosmo.hubble_distance().powi(2);
    let weight = zs
        .iter()
        .enumerate()
        .map(|(i, &z)| prefactor * chi[i] * (1.0 + z) * efficiency(i))
        .collect();
    Ok(Kernel::new(chi, weight, EllFactor::Shear))
}

fn cmb_lensing_kernel(cosmo: &Cosmology, z_source: f64) -> Result<Kernel, HaloModelError> {
    if !(z_source > 0.0) {
        return Err(HaloModelError::InvalidTracer(format!("source redshift {z_source}")));
    }
    let chi_s = chi_of_z(cosmo, z_source);
    let chi = linspace(0.0, chi_s, N_KERNEL);
    let prefactor = 1.5 * cosmo.omega_m() / cosmo.hubble_distance().powi(2);
    let weight = chi
        .iter()
        .map(|&x| prefactor * x / cosmo.scale_factor_of_chi(x) * (chi_s - x) / chi_s)
        .collect();
    Ok(Kernel::new(chi, weight, EllFactor::Convergence))
}

fn thermal_sz_kernel(cosmo: &Cosmology, z_max: f64) -> Result<Kernel, HaloModelError> {
    if !(z_max > 0.0) {
        return Err(HaloModelError::InvalidTracer(format!("maximum redshift {z_max}")));
    }
    let chi = linspace(0.0, chi_of_z(cosmo, z_max), N_KERNEL);
    let weight = chi
        .iter()
        .map(|&x| TSZ_PREFACTOR * cosmo.scale_factor_of_chi(x))
        .collect();
    Ok(Kernel::new(chi, weight, EllFactor::Unity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halo::cosmology::CosmologyParams;
    use crate::halo::numerics::simpson;
    use approx::assert_relative_eq;

    fn planck() -> Cosmology {
        Cosmology::new(CosmologyParams::default()).unwrap()
    }

    fn gaussian_nz() -> (Vec<f64>, Vec<f64>) {
        let z = linspace(0.0, 2.0, 201);
        let nz = z.iter().map(|z| (-0.5 * ((z - 0.8) / 0.15f64).powi(2)).exp()).collect();
        (z, nz)
    }

    #[test]
    fn number_counts_kernel_integrates_to_bias() {
        let cosmo = planck();
        let (z, nz) = gaussian_nz();
        let kernel = Tracer::number_counts(z, nz, 1.5).kernel(&cosmo).unwrap();
        let (lo, hi) = kernel.support();
        let chi = linspace(lo, hi, 4001);
        let w: Vec<f64> = chi.iter().map(|&x| kernel.eval(x)).collect();
        assert_relative_eq!(simpson(&w, chi[1] - chi[0]), 1.5, max_relative = 1e-3);
        assert_eq!(kernel.eval(hi * 1.01), 0.0);
    }

    #[test]
    fn lensing_kernels_vanish_at_the_ends() {
        let cosmo = planck();
        let (z, nz) = gaussian_nz();
        let wl = Tracer::weak_lensing(z, nz).kernel(&cosmo).unwrap();
        let (lo, hi) = wl.support();
        assert_eq!(wl.eval(lo), 0.0);
        assert!(wl.eval(hi).abs() < 1e-12);
        assert!(wl.eval(0.3 * hi) > 0.0);

        let cmb = Tracer::cmb_lensing().kernel(&cosmo).unwrap();
        let (lo, hi) = cmb.support();
        assert_eq!(cmb.eval(lo), 0.0);
        assert!(cmb.eval(hi).abs() < 1e-12);
        assert!(hi > 13_000.0 && hi < 14_500.0);
    }

    #[test]
    fn thermal_sz_kernel_is_prefactor_times_a() {
        let cosmo = planck();
        let kernel = Tracer::thermal_sz().kernel(&cosmo).unwrap();
        assert_relative_eq!(kernel.eval(0.0), TSZ_PREFACTOR, max_relative = 1e-6);
        assert!(kernel.eval(kernel.support().1) < TSZ_PREFACTOR / 6.0);
    }

    #[test]
    fn ell_factors() {
        assert_eq!(EllFactor::Shear.eval(1.0), 0.0);
        assert_relative_eq!(EllFactor::Shear.eval(2000.0), 1.0, max_relative = 1e-5);
        assert_relative_eq!(EllFactor::Convergence.eval(2.0), 6.0 / 6.25);
        assert_eq!(EllFactor::Unity.eval(7.0), 1.0);
    }

    #[test]
    fn bad_redshift_distributions_are_rejected() {
        let cosmo = planck();
        let cases = [
            Tracer::number_counts(vec![0.0, 1.0], vec![1.0], 1.0),
            Tracer::number_counts(vec![0.5, 0.5], vec![1.0, 1.0], 1.0),
            Tracer::number_counts(vec![0.0, 1.0], vec![0.0, 0.0], 1.0),
            Tracer::weak_lensing(vec![-0.1, 1.0], vec![1.0, 1.0]),
            Tracer::CmbLensing { z_source: 0.0 },
        ];
        for tracer in cases {
            assert!(matches!(tracer.kernel(&cosmo), Err(HaloModelError::InvalidTracer(_))));
        }
    }

    #[test]
    fn tracer_json_defaults() {
        let t: Tracer = serde_json::from_str(r#"{"kind": "number_counts", "z": [0, 1], "nz": [1, 1]}"#).unwrap();
        assert_eq!(t, Tracer::number_counts(vec![0.0, 1.0], vec![1.0, 1.0], 1.0));
        let t: Tracer = serde_json::from_str(r#"{"kind": "cmb_lensing"}"#).unwrap();
        assert_eq!(t, Tracer::cmb_lensing());
    }
}

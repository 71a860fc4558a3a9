//! End-to-end C_ℓ predictions on the standard grids.

use ndarray::Array2;

use rusty_xcorr::halo::numerics::{geomspace, linspace};
use rusty_xcorr::halo::{Cosmology, CosmologyParams, HaloProfile, LimberHaloModel, Pk2d, Tracer, TracerProfile};

fn counts_at(z0: f64) -> Tracer {
    let z = linspace(z0 - 0.1, z0 + 0.1, 41);
    let nz = z.iter().map(|z| (-(z - z0).powi(2) / (2.0 * 0.03f64.powi(2))).exp()).collect();
    Tracer::number_counts(z, nz, 1.0)
}

#[test]
fn matter_clustering_decreases_with_multipole_and_tracks_linear_theory() {
    let hm = LimberHaloModel::new(Cosmology::new(CosmologyParams::default()).unwrap()).unwrap();
    let tracer = TracerProfile::new(counts_at(0.5), HaloProfile::nfw());
    let ells = [10.0, 100.0, 1000.0];

    let cls = hm.angular_power(&ells, &tracer, &tracer).unwrap();
    assert!(cls.iter().all(|&c| c.is_finite() && c > 0.0), "{cls:?}");
    assert!(cls[0] > cls[1] && cls[1] > cls[2], "{cls:?}");

    // at low ℓ the halo model is the linear spectrum plus a small shot-noise-like term
    let cosmo = hm.cosmology();
    let ks = geomspace(1e-4, 1e2, 256);
    let scale_factors = linspace(0.2, 1.0, 64);
    let linear = Array2::from_shape_fn((scale_factors.len(), ks.len()), |(ia, ik)| {
        cosmo.linear_power(ks[ik], scale_factors[ia])
    });
    let pk_lin = Pk2d::new(&ks, &scale_factors, linear, cosmo).unwrap();
    let cl_lin = hm
        .angular_power_with(&pk_lin, &ells[..1], &tracer.tracer, &tracer.tracer)
        .unwrap();
    let ratio = cls[0] / cl_lin[0];
    assert!((0.95..1.25).contains(&ratio), "halo / linear = {ratio}");
}

#[test]
fn tsz_cross_cmb_lensing_is_positive() {
    let hm = LimberHaloModel::new(Cosmology::new(CosmologyParams::default()).unwrap()).unwrap();
    let y = TracerProfile::new(Tracer::thermal_sz(), HaloProfile::gnfw(0.2));
    let kappa = TracerProfile::new(Tracer::cmb_lensing(), HaloProfile::nfw());

    let cls = hm.angular_power(&[30.0, 300.0, 3000.0], &y, &kappa).unwrap();
    assert!(cls.iter().all(|&c| c.is_finite() && c > 0.0), "{cls:?}");
}

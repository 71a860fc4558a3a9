use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

use super::binning::bin_spectrum;
use super::loader::read_spectrum;
use super::model::{BinEdges, JackknifeEstimate};

#[derive(Debug, Error, PartialEq)]
pub enum JackknifeError {
    #[error("a jackknife covariance needs at least 2 realizations, got {0}")]
    TooFewRealizations(usize),
}

// ---------------------------------------------------------------------------
// File naming
// ---------------------------------------------------------------------------

/// `{prefix}{index}{suffix}`, e.g. `gy_cross_` + `1` + `.cl`.
pub fn jackknife_file_name(prefix: &str, index: usize, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}{index}{suffix}"))
}

// ---------------------------------------------------------------------------
// Ensemble
// ---------------------------------------------------------------------------

/// Read `n_jack` spectra named by [`jackknife_file_name`] and bin each one.
///
/// Returns the shared bin centers and the `n_jack × n_bin` ensemble. A missing
/// or malformed file (or an empty bin in any realization) fails the whole read.
pub fn read_binned_ensemble(
    n_jack: usize,
    prefix: &str,
    suffix: &str,
    edges: &BinEdges,
) -> Result<(Vec<f64>, Array2<f64>)> {
    let mut ensemble = Array2::<f64>::zeros((n_jack, edges.n_bins()));

    for (i, mut row) in ensemble.axis_iter_mut(Axis(0)).enumerate() {
        let path = jackknife_file_name(prefix, i, suffix);
        debug!("reading jackknife realization {i} from {}", path.display());
        let spectrum = read_spectrum(&path)?;
        let binned = bin_spectrum(&spectrum, edges)
            .with_context(|| format!("binning {}", path.display()))?;
        row.assign(&Array1::from(binned.cl));
    }

    Ok((edges.centers(), ensemble))
}

/// Mean and delete-one jackknife covariance of a binned ensemble
/// (realizations along rows, bins along columns).
///
/// The covariance is the unbiased sample covariance scaled by `n_jack`.
pub fn jackknife_covariance(
    ensemble: &Array2<f64>,
) -> Result<(Array1<f64>, Array2<f64>), JackknifeError> {
    let n_jack = ensemble.nrows();
    if n_jack < 2 {
        return Err(JackknifeError::TooFewRealizations(n_jack));
    }

    let mean = ensemble
        .mean_axis(Axis(0))
        .ok_or(JackknifeError::TooFewRealizations(n_jack))?;
    let centered = ensemble - &mean;
    let scale = n_jack as f64 / (n_jack - 1) as f64;
    let cov = centered.t().dot(&centered) * scale;

    // exact symmetry regardless of summation order
    let cov = (&cov + &cov.t()) * 0.5;
    Ok((mean, cov))
}

/// Read, bin and reduce a jackknife ensemble in one go.
pub fn read_jackknife(
    n_jack: usize,
    prefix: &str,
    suffix: &str,
    edges: &BinEdges,
) -> Result<JackknifeEstimate> {
    info!("binning {n_jack} jackknife realizations {prefix}{{i}}{suffix} with edges {edges}");
    let (centers, ensemble) = read_binned_ensemble(n_jack, prefix, suffix, edges)?;
    let (mean, covariance) = jackknife_covariance(&ensemble)?;

    Ok(JackknifeEstimate {
        centers,
        mean: mean.to_vec(),
        covariance,
        n_jack,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn identical_realizations_have_zero_covariance() {
        let ensemble = array![[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]];
        let (mean, cov) = jackknife_covariance(&ensemble).unwrap();
        assert_eq!(mean.to_vec(), vec![1.0, 2.0, 3.0]);
        assert!(cov.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn matches_scaled_sample_covariance() {
        // two bins, three realizations
        let ensemble = array![[1.0, 2.0], [2.0, 4.0], [3.0, 9.0]];
        let (mean, cov) = jackknife_covariance(&ensemble).unwrap();
        assert_relative_eq!(mean[0], 2.0);
        assert_relative_eq!(mean[1], 5.0);
        // sample covariance: var0 = 1, var1 = 13, cov01 = 3.5; scaled by 3
        assert_relative_eq!(cov[[0, 0]], 3.0, epsilon = 1e-12);
        assert_relative_eq!(cov[[1, 1]], 39.0, epsilon = 1e-12);
        assert_relative_eq!(cov[[0, 1]], 10.5, epsilon = 1e-12);
        assert_relative_eq!(cov[[1, 0]], 10.5, epsilon = 1e-12);
    }

    #[test]
    fn single_realization_is_rejected() {
        let ensemble = array![[1.0, 2.0]];
        assert_eq!(
            jackknife_covariance(&ensemble).unwrap_err(),
            JackknifeError::TooFewRealizations(1)
        );
    }

    #[test]
    fn file_names_interpolate_index() {
        assert_eq!(
            jackknife_file_name("gy_cross_", 12, ".cl"),
            PathBuf::from("gy_cross_12.cl")
        );
    }
}

use super::model::{BinEdges, BinnedSpectrum, BinningError, Spectrum};

// ---------------------------------------------------------------------------
// Bin selection: which points fall into (lo, hi]
// ---------------------------------------------------------------------------

/// Return indices of points whose multipole lies in `(lo, hi]`.
///
/// The interval is open on the left, so a point sitting exactly on the
/// first edge never lands in bin 0.
pub fn bin_indices(ell: &[f64], lo: f64, hi: f64) -> Vec<usize> {
    ell.iter()
        .enumerate()
        .filter(|&(_, &l)| lo < l && l <= hi)
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Bin a spectrum: per-bin mean multipole, mean C_ell and standard error of
/// the mean (population standard deviation over sqrt(count)).
///
/// A bin without any multipole is reported as [`BinningError::EmptyBin`]
/// instead of producing a NaN.
pub fn bin_spectrum(
    spectrum: &Spectrum,
    edges: &BinEdges,
) -> Result<BinnedSpectrum, BinningError> {
    let n_bin = edges.n_bins();
    let mut ell_mean = Vec::with_capacity(n_bin);
    let mut cl = Vec::with_capacity(n_bin);
    let mut err = Vec::with_capacity(n_bin);

    for bin in 0..n_bin {
        let (lo, hi) = edges.bounds(bin);
        let selected = bin_indices(spectrum.ell(), lo, hi);
        if selected.is_empty() {
            return Err(BinningError::EmptyBin { bin, lo, hi });
        }

        let count = selected.len() as f64;
        let mean_ell = selected.iter().map(|&i| spectrum.ell()[i]).sum::<f64>() / count;
        let mean_cl = selected.iter().map(|&i| spectrum.cl()[i]).sum::<f64>() / count;
        let variance = selected
            .iter()
            .map(|&i| (spectrum.cl()[i] - mean_cl).powi(2))
            .sum::<f64>()
            / count;

        ell_mean.push(mean_ell);
        cl.push(mean_cl);
        err.push(variance.sqrt() / count.sqrt());
    }

    Ok(BinnedSpectrum {
        centers: edges.centers(),
        ell_mean,
        cl,
        err,
    })
}

/// Convenience wrapper over raw columns.
pub fn bin_c_ell(ell: &[f64], c_ell: &[f64], edges: &BinEdges) -> Result<BinnedSpectrum, BinningError> {
    let spectrum = Spectrum::new(ell.to_vec(), c_ell.to_vec())?;
    bin_spectrum(&spectrum, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn two_bin_scenario() {
        let edges = BinEdges::new(vec![0.0, 10.0, 20.0]).unwrap();
        let binned = bin_c_ell(&[5.0, 5.0, 15.0, 15.0], &[1.0, 3.0, 2.0, 4.0], &edges).unwrap();

        assert_eq!(binned.centers, vec![5.0, 15.0]);
        assert_eq!(binned.cl, vec![2.0, 3.0]);
        assert_eq!(binned.ell_mean, vec![5.0, 15.0]);
        let expected = 1.0 / 2.0_f64.sqrt();
        assert_relative_eq!(binned.err[0], expected, epsilon = 1e-12);
        assert_relative_eq!(binned.err[1], expected, epsilon = 1e-12);
    }

    #[test]
    fn first_edge_is_excluded() {
        let edges = BinEdges::new(vec![0.0, 10.0]).unwrap();
        let binned = bin_c_ell(&[0.0, 10.0], &[100.0, 1.0], &edges).unwrap();
        assert_eq!(binned.cl, vec![1.0]);
        assert_eq!(binned.err, vec![0.0]);
    }

    #[test]
    fn empty_bin_is_an_error() {
        let edges = BinEdges::new(vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        let err = bin_c_ell(&[5.0, 25.0], &[1.0, 2.0], &edges).unwrap_err();
        assert_eq!(
            err,
            BinningError::EmptyBin {
                bin: 1,
                lo: 10.0,
                hi: 20.0
            }
        );
    }

    #[test]
    fn indices_respect_half_open_interval() {
        let ell = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(bin_indices(&ell, 1.0, 3.0), vec![1, 2]);
        assert!(bin_indices(&ell, 4.0, 9.0).is_empty());
    }

    proptest! {
        #[test]
        fn centers_are_data_independent(
            start in -100.0f64..100.0,
            widths in prop::collection::vec(0.5f64..50.0, 1..12),
        ) {
            let mut edges = vec![start];
            for w in &widths {
                let last = *edges.last().unwrap();
                edges.push(last + w);
            }
            let bin_edges = BinEdges::new(edges.clone()).unwrap();
            // one point in the upper edge of every bin so no bin is empty
            let ell: Vec<f64> = edges[1..].to_vec();
            let cl: Vec<f64> = ell.iter().map(|l| l * 2.0).collect();
            let binned = bin_c_ell(&ell, &cl, &bin_edges).unwrap();

            prop_assert_eq!(binned.centers.len(), widths.len());
            for (i, c) in binned.centers.iter().enumerate() {
                prop_assert!((c - 0.5 * (edges[i] + edges[i + 1])).abs() < 1e-9);
            }
        }

        #[test]
        fn single_bin_matches_plain_statistics(
            cl in prop::collection::vec(-1e3f64..1e3, 1..40),
        ) {
            let edges = BinEdges::new(vec![0.0, 1000.0]).unwrap();
            let ell: Vec<f64> = (0..cl.len()).map(|i| 1.0 + i as f64).collect();
            let binned = bin_c_ell(&ell, &cl, &edges).unwrap();

            let n = cl.len() as f64;
            let mean = cl.iter().sum::<f64>() / n;
            let std = (cl.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n).sqrt();
            prop_assert!((binned.cl[0] - mean).abs() <= 1e-9 * (1.0 + mean.abs()));
            prop_assert!((binned.err[0] - std / n.sqrt()).abs() <= 1e-9 * (1.0 + std));
        }
    }
}

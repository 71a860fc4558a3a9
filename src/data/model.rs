use std::fmt;

use ndarray::Array2;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Problems with the inputs to (or the outcome of) binning a spectrum.
#[derive(Debug, Error, PartialEq)]
pub enum BinningError {
    #[error("bin edges must contain at least two values, got {0}")]
    TooFewEdges(usize),

    #[error("bin edges must be finite and strictly increasing (edge {index} = {value})")]
    InvalidEdges { index: usize, value: f64 },

    #[error("ell has {ell} values but C_ell has {cl}")]
    LengthMismatch { ell: usize, cl: usize },

    #[error("bin {bin} ({lo}, {hi}] contains no multipoles")]
    EmptyBin { bin: usize, lo: f64, hi: f64 },
}

// ---------------------------------------------------------------------------
// Spectrum – (ell, C_ell) pairs as written by the estimator
// ---------------------------------------------------------------------------

/// An angular power spectrum sampled at arbitrary multipoles.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    ell: Vec<f64>,
    cl: Vec<f64>,
}

impl Spectrum {
    /// Pair up multipoles and power values. Both columns must have the same length.
    pub fn new(ell: Vec<f64>, cl: Vec<f64>) -> Result<Self, BinningError> {
        if ell.len() != cl.len() {
            return Err(BinningError::LengthMismatch {
                ell: ell.len(),
                cl: cl.len(),
            });
        }
        Ok(Self { ell, cl })
    }

    /// Multipoles (x axis).
    pub fn ell(&self) -> &[f64] {
        &self.ell
    }

    /// Power values (y axis) – same length as `ell`.
    pub fn cl(&self) -> &[f64] {
        &self.cl
    }

    /// Number of (ell, C_ell) points.
    pub fn len(&self) -> usize {
        self.ell.len()
    }

    /// Whether the spectrum has no points.
    pub fn is_empty(&self) -> bool {
        self.ell.is_empty()
    }
}

// ---------------------------------------------------------------------------
// BinEdges – validated multipole boundaries
// ---------------------------------------------------------------------------

/// Strictly increasing multipole boundaries. Bin `i` is `(edges[i], edges[i + 1]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinEdges(Vec<f64>);

impl BinEdges {
    pub fn new(edges: Vec<f64>) -> Result<Self, BinningError> {
        if edges.len() < 2 {
            return Err(BinningError::TooFewEdges(edges.len()));
        }
        for (index, &value) in edges.iter().enumerate() {
            if !value.is_finite() || (index > 0 && value <= edges[index - 1]) {
                return Err(BinningError::InvalidEdges { index, value });
            }
        }
        Ok(Self(edges))
    }

    /// `n_bins` equal-width bins covering `(lo, hi]`.
    pub fn linear(lo: f64, hi: f64, n_bins: usize) -> Result<Self, BinningError> {
        let step = (hi - lo) / n_bins.max(1) as f64;
        Self::new((0..=n_bins).map(|i| lo + step * i as f64).collect())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of bins (one less than the number of edges).
    pub fn n_bins(&self) -> usize {
        self.0.len() - 1
    }

    /// Bin midpoints, independent of where the data actually falls.
    pub fn centers(&self) -> Vec<f64> {
        self.0.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Lower and upper bound of bin `i`.
    pub fn bounds(&self, i: usize) -> (f64, f64) {
        (self.0[i], self.0[i + 1])
    }
}

impl fmt::Display for BinEdges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| format!("{e}")).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// BinnedSpectrum – one row per bin
// ---------------------------------------------------------------------------

/// A spectrum aggregated into multipole bins.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedSpectrum {
    /// Edge midpoints.
    pub centers: Vec<f64>,
    /// Mean multipole of the points that landed in each bin.
    pub ell_mean: Vec<f64>,
    /// Mean C_ell per bin.
    pub cl: Vec<f64>,
    /// Standard error of the mean (population std / sqrt(count)).
    pub err: Vec<f64>,
}

impl BinnedSpectrum {
    pub fn n_bins(&self) -> usize {
        self.centers.len()
    }
}

// ---------------------------------------------------------------------------
// JackknifeEstimate – ensemble mean and covariance
// ---------------------------------------------------------------------------

/// Result of binning a jackknife ensemble.
#[derive(Debug, Clone)]
pub struct JackknifeEstimate {
    /// Bin midpoints shared by every realization.
    pub centers: Vec<f64>,
    /// Column-wise mean of the binned ensemble.
    pub mean: Vec<f64>,
    /// Sample covariance of the ensemble scaled by `n_jack`.
    pub covariance: Array2<f64>,
    /// Number of realizations that went in.
    pub n_jack: usize,
}

impl JackknifeEstimate {
    /// Square roots of the covariance diagonal.
    pub fn errors(&self) -> Vec<f64> {
        self.covariance.diag().iter().map(|v| v.max(0.0).sqrt()).collect()
    }
}

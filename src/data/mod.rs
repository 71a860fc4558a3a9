/// Data layer: spectra, binning, jackknife ensembles and tabular output.
///
/// Architecture:
/// ```text
///  {prefix}{i}{suffix}  (PolSpice .cl text files)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Spectrum
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ binning   │  (edge_i, edge_i+1] selection → BinnedSpectrum
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ jackknife  │  n_jack × n_bin ensemble → mean, covariance × n_jack
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  CSV tables
///   └──────────┘
/// ```

pub mod binning;
pub mod jackknife;
pub mod loader;
pub mod model;
pub mod writer;

//! Angular cross-correlation toolkit.
//!
//! * [`polspice`] runs the PolSpice estimator as a child process.
//! * [`data`] reads its spectra, bins them and reduces jackknife ensembles to
//!   a mean and covariance.
//! * [`halo`] predicts the same cross spectra from the halo model in the
//!   Limber approximation.
//! * [`sky`] cuts HEALPix masks into jackknife regions.
//! * [`config`] holds the JSON run configurations used by the binary.

pub mod config;
pub mod data;
pub mod halo;
pub mod polspice;
pub mod sky;

//! JSON run configurations for the `measure` and `model` subcommands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::halo::{CosmologyParams, TracerProfile};
use crate::polspice::PolSpiceOptions;

// ---------------------------------------------------------------------------
// measure
// ---------------------------------------------------------------------------

/// A PolSpice run.
///
/// ```json
/// {
///   "executable": "/opt/PolSpice/bin/spice",
///   "threads": 20,
///   "options": { "mapfile": "y.fits", "maskfile": "mask.fits", "clfile": "out.cl" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeasureConfig {
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default)]
    pub threads: Option<usize>,
    pub options: PolSpiceOptions,
}

// ---------------------------------------------------------------------------
// model
// ---------------------------------------------------------------------------

/// Multipoles to evaluate: an explicit list, every integer in a range, or
/// `n` log-spaced values over a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EllSpec {
    List(Vec<f64>),
    Range {
        min: f64,
        max: f64,
        #[serde(default)]
        n: Option<usize>,
    },
}

impl EllSpec {
    pub fn values(&self) -> Result<Vec<f64>> {
        match self {
            EllSpec::List(ells) => {
                if ells.is_empty() {
                    bail!("ell list is empty");
                }
                Ok(ells.clone())
            }
            EllSpec::Range { min, max, n } => {
                if !(*min >= 0.0 && max >= min) {
                    bail!("ell range [{min}, {max}] is not valid");
                }
                match n {
                    None => {
                        let lo = min.ceil() as u64;
                        let hi = max.floor() as u64;
                        if hi < lo {
                            bail!("ell range [{min}, {max}] contains no integer multipole");
                        }
                        Ok((lo..=hi).map(|l| l as f64).collect())
                    }
                    Some(0) => bail!("ell range asks for zero multipoles"),
                    Some(1) => Ok(vec![*min]),
                    Some(n) => {
                        if *min <= 0.0 {
                            bail!("log-spaced multipoles need min > 0");
                        }
                        let (a, b) = (min.ln(), max.ln());
                        let step = (b - a) / (*n - 1) as f64;
                        Ok((0..*n).map(|i| (a + step * i as f64).exp()).collect())
                    }
                }
            }
        }
    }
}

/// A theoretical C_ℓ calculation.
///
/// ```json
/// {
///   "cosmology": { "omega_c": 0.26, "sigma8": 0.81 },
///   "ell": { "min": 2, "max": 2000, "n": 50 },
///   "tracers": [
///     { "tracer": { "kind": "thermal_sz" }, "profile": { "kind": "gnfw", "b_hydro": 0.2 } },
///     { "tracer": { "kind": "cmb_lensing" }, "profile": { "kind": "nfw" } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    #[serde(default)]
    pub cosmology: CosmologyParams,
    pub ell: EllSpec,
    pub tracers: [TracerProfile; 2],
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path, what: &str) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {what} config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {what} config {}", path.display()))
}

pub fn load_measure_config(path: &Path) -> Result<MeasureConfig> {
    load_json(path, "measure")
}

pub fn load_model_config(path: &Path) -> Result<ModelConfig> {
    load_json(path, "model")
}

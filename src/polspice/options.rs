use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PolSpiceOptions – every option this crate knows how to pass
// ---------------------------------------------------------------------------

/// Typed PolSpice command line.
///
/// Only options that are set are emitted, in declaration order, as
/// `-name value` pairs. Switches take `YES`/`NO`.
///
/// ```json
/// {
///   "mapfile": "gal_map.fits",
///   "maskfile": "gal_mask.fits",
///   "mapfile2": "y_map.fits",
///   "maskfile2": "y_mask.fits",
///   "beam": 0.0,
///   "beam2": 0.0,
///   "clfile": "gy_cross.cl",
///   "nlmax": 3000,
///   "verbosity": 0
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolSpiceOptions {
    /// First input map.
    pub mapfile: Option<PathBuf>,
    /// Mask of the first map.
    pub maskfile: Option<PathBuf>,
    /// Weight map of the first map.
    pub weightfile: Option<PathBuf>,
    /// Second input map for cross spectra.
    pub mapfile2: Option<PathBuf>,
    pub maskfile2: Option<PathBuf>,
    pub weightfile2: Option<PathBuf>,
    /// Gaussian beam FWHM of the first map in arcmin, deconvolved from C_ell.
    pub beam: Option<f64>,
    pub beam2: Option<f64>,
    /// Output angular power spectrum.
    pub clfile: Option<PathBuf>,
    /// Output correlation function.
    pub corfile: Option<PathBuf>,
    /// Apodization width in degrees.
    pub apodizesigma: Option<f64>,
    /// 0 = Gaussian, 1 = cosine apodization.
    pub apodizetype: Option<u8>,
    /// Largest angle in degrees used for the correlation function.
    pub thetamax: Option<f64>,
    /// Highest multipole computed.
    pub nlmax: Option<u32>,
    /// Decouple E and B modes.
    pub decouple: Option<bool>,
    /// Subtract the best-fit monopole.
    pub subav: Option<bool>,
    /// Subtract the best-fit dipole.
    pub subdipole: Option<bool>,
    /// Correct for the pixel window function.
    pub pixelfile: Option<bool>,
    /// Treat the maps as polarized.
    pub polarization: Option<bool>,
    pub verbosity: Option<u8>,
}

fn yes_no(flag: bool) -> String {
    let word = if flag { "YES" } else { "NO" };
    word.to_string()
}

impl PolSpiceOptions {
    /// Minimal cross-spectrum setup: two maps, two masks, one output file.
    pub fn cross(
        map1: impl Into<PathBuf>,
        mask1: impl Into<PathBuf>,
        map2: impl Into<PathBuf>,
        mask2: impl Into<PathBuf>,
        clfile: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mapfile: Some(map1.into()),
            maskfile: Some(mask1.into()),
            mapfile2: Some(map2.into()),
            maskfile2: Some(mask2.into()),
            clfile: Some(clfile.into()),
            ..Self::default()
        }
    }

    /// `(name, value)` pairs for the options that are set, in declaration order.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        let num = |v: Option<f64>| v.map(|v| v.to_string());

        let entries: [(&'static str, Option<String>); 20] = [
            ("mapfile", path(&self.mapfile)),
            ("maskfile", path(&self.maskfile)),
            ("weightfile", path(&self.weightfile)),
            ("mapfile2", path(&self.mapfile2)),
            ("maskfile2", path(&self.maskfile2)),
            ("weightfile2", path(&self.weightfile2)),
            ("beam", num(self.beam)),
            ("beam2", num(self.beam2)),
            ("clfile", path(&self.clfile)),
            ("corfile", path(&self.corfile)),
            ("apodizesigma", num(self.apodizesigma)),
            ("apodizetype", self.apodizetype.map(|v| v.to_string())),
            ("thetamax", num(self.thetamax)),
            ("nlmax", self.nlmax.map(|v| v.to_string())),
            ("decouple", self.decouple.map(yes_no)),
            ("subav", self.subav.map(yes_no)),
            ("subdipole", self.subdipole.map(yes_no)),
            ("pixelfile", self.pixelfile.map(yes_no)),
            ("polarization", self.polarization.map(yes_no)),
            ("verbosity", self.verbosity.map(|v| v.to_string())),
        ];

        entries
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect()
    }

    /// Flatten to `["-name", "value", ...]`.
    pub fn to_args(&self) -> Vec<String> {
        self.pairs()
            .into_iter()
            .flat_map(|(name, value)| [format!("-{name}"), value])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_declaration_order() {
        let mut opts = PolSpiceOptions::cross("m1.fits", "k1.fits", "m2.fits", "k2.fits", "out.cl");
        opts.nlmax = Some(3000);
        opts.beam = Some(0.0);
        opts.decouple = Some(true);
        opts.verbosity = Some(0);

        assert_eq!(
            opts.to_args(),
            vec![
                "-mapfile", "m1.fits", "-maskfile", "k1.fits", "-mapfile2", "m2.fits",
                "-maskfile2", "k2.fits", "-beam", "0", "-clfile", "out.cl", "-nlmax", "3000",
                "-decouple", "YES", "-verbosity", "0",
            ]
        );
    }

    #[test]
    fn unset_options_are_not_emitted() {
        assert!(PolSpiceOptions::default().to_args().is_empty());
    }

    #[test]
    fn deserializes_from_json_and_rejects_typos() {
        let opts: PolSpiceOptions =
            serde_json::from_str(r#"{"mapfile": "a.fits", "nlmax": 1500, "subav": false}"#).unwrap();
        assert_eq!(opts.nlmax, Some(1500));
        assert_eq!(opts.to_args(), vec!["-mapfile", "a.fits", "-nlmax", "1500", "-subav", "NO"]);

        assert!(serde_json::from_str::<PolSpiceOptions>(r#"{"nlmx": 1500}"#).is_err());
    }
}

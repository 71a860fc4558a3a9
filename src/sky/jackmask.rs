//! Leave-one-region-out masks for jackknife resampling.
//!
//! The sky is cut into the pixels of a coarse HEALPix grid ("superpixels").
//! Every superpixel the base mask touches yields one mask equal to the base
//! mask with that superpixel removed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use super::fits::write_map;
use super::healpix::{check_nside, nest2ring, ring2nest, HealpixError, HealpixMap, Ordering};

/// File name of jackknife mask `index` at resolution `nside`.
pub fn mask_file_name(index: usize, nside: u32) -> String {
    format!("mask_jack{index}_{nside}.fits")
}

/// One jackknife mask.
#[derive(Debug, Clone, PartialEq)]
pub struct JackknifeMask {
    /// Position among the active superpixels.
    pub index: usize,
    /// Removed superpixel, numbered in the base map's ordering at low resolution.
    pub superpixel: usize,
    pub map: HealpixMap,
}

/// Iterator over the jackknife masks of a base mask.
#[derive(Debug, Clone)]
pub struct JackknifeMasks<'a> {
    base: &'a HealpixMap,
    nside_low: u32,
    active: Vec<usize>,
    next: usize,
}

impl<'a> JackknifeMasks<'a> {
    pub fn new(base: &'a HealpixMap, nside_low: u32) -> Result<Self, HealpixError> {
        let nside_low = check_nside(nside_low as u64)?;
        if nside_low > base.nside() {
            return Err(HealpixError::IncompatibleResolution {
                nside: base.nside(),
                nside_low,
            });
        }
        let low = base.ud_grade(nside_low)?;
        let active = low
            .values()
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(j, _)| j)
            .collect();
        Ok(Self {
            base,
            nside_low,
            active,
            next: 0,
        })
    }

    /// Number of masks the iterator yields in total.
    pub fn n_masks(&self) -> usize {
        self.active.len()
    }

    fn mask_for(&self, superpixel: usize) -> HealpixMap {
        let nside = self.base.nside();
        let ordering = self.base.ordering();
        let ratio = (nside / self.nside_low) as usize;
        let children = ratio * ratio;

        let low_nest = match ordering {
            Ordering::Ring => ring2nest(self.nside_low, superpixel),
            Ordering::Nested => superpixel,
        };

        let mut values = self.base.values().to_vec();
        for nest in low_nest * children..(low_nest + 1) * children {
            let pix = match ordering {
                Ordering::Ring => nest2ring(nside, nest),
                Ordering::Nested => nest,
            };
            values[pix] = 0.0;
        }
        self.base.same_grid(values)
    }
}

impl Iterator for JackknifeMasks<'_> {
    type Item = JackknifeMask;

    fn next(&mut self) -> Option<Self::Item> {
        let superpixel = *self.active.get(self.next)?;
        let index = self.next;
        self.next += 1;
        Some(JackknifeMask {
            index,
            superpixel,
            map: self.mask_for(superpixel),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.active.len() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for JackknifeMasks<'_> {}

/// Write every jackknife mask of `base` into `out_dir`, overwriting existing
/// files. Returns the written paths in index order.
pub fn write_jackknife_masks(base: &HealpixMap, nside_low: u32, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).with_context(|| format!("Cannot create {}", out_dir.display()))?;
    let masks = JackknifeMasks::new(base, nside_low)?;
    info!(
        "{} jackknife regions at nside {} for a nside {} mask",
        masks.n_masks(),
        nside_low,
        base.nside()
    );

    let mut written = Vec::with_capacity(masks.n_masks());
    for mask in masks {
        info!("Jack: {}", mask.index);
        let path = out_dir.join(mask_file_name(mask.index, base.nside()));
        write_map(&path, &mask.map).with_context(|| format!("Cannot write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_sky_has_one_mask_per_superpixel() {
        let base = HealpixMap::full_sky(4, Ordering::Ring).unwrap();
        let masks: Vec<_> = JackknifeMasks::new(&base, 1).unwrap().collect();
        assert_eq!(masks.len(), 12);
        for (i, mask) in masks.iter().enumerate() {
            assert_eq!(mask.index, i);
            let zeros = mask.map.values().iter().filter(|&&v| v == 0.0).count();
            assert_eq!(zeros, 16);
        }
    }

    #[test]
    fn removed_pixels_belong_to_the_superpixel() {
        let base = HealpixMap::full_sky(8, Ordering::Ring).unwrap();
        for mask in JackknifeMasks::new(&base, 2).unwrap() {
            let low = mask.map.ud_grade(2).unwrap();
            for (j, v) in low.values().iter().enumerate() {
                if j == mask.superpixel {
                    assert_eq!(*v, 0.0);
                } else {
                    assert_eq!(*v, 1.0);
                }
            }
        }
    }

    #[test]
    fn empty_superpixels_are_skipped() {
        // zero out nested base pixel 0 entirely at nside 1
        let mut values = vec![1.0; 48];
        for v in &mut values[0..4] {
            *v = 0.0;
        }
        let base = HealpixMap::new(2, Ordering::Nested, values).unwrap();
        let masks = JackknifeMasks::new(&base, 1).unwrap();
        assert_eq!(masks.n_masks(), 11);
        let first = masks.into_iter().next().unwrap();
        assert_eq!(first.superpixel, 1);
        assert_eq!(first.index, 0);
    }

    #[test]
    fn low_resolution_must_not_exceed_base() {
        let base = HealpixMap::full_sky(2, Ordering::Ring).unwrap();
        assert_eq!(
            JackknifeMasks::new(&base, 4).unwrap_err(),
            HealpixError::IncompatibleResolution { nside: 2, nside_low: 4 }
        );
        assert!(JackknifeMasks::new(&base, 3).is_err());
    }

    #[test]
    fn file_names() {
        assert_eq!(mask_file_name(7, 1024), "mask_jack7_1024.fits");
    }
}

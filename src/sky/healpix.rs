//! HEALPix pixel indexing and resolution changes.
//!
//! Only what the mask generator needs: NESTED ↔ RING renumbering and
//! `ud_grade`. Both go through the (face, x, y) representation of a pixel.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest supported resolution parameter.
pub const NSIDE_MAX: u32 = 1 << 29;

// Row and column offsets of the twelve base faces.
const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HealpixError {
    #[error("nside must be a power of two between 1 and 2^29, got {0}")]
    InvalidNside(u64),

    #[error("a map with nside {nside} has {expected} pixels, got {found}")]
    LengthMismatch { nside: u32, expected: usize, found: usize },

    #[error("cannot split nside {nside} into superpixels of nside {nside_low}")]
    IncompatibleResolution { nside: u32, nside_low: u32 },
}

/// Pixel numbering scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Ordering {
    #[default]
    Ring,
    Nested,
}

impl Ordering {
    /// Value of the FITS `ORDERING` keyword.
    pub fn as_fits(&self) -> &'static str {
        match self {
            Ordering::Ring => "RING",
            Ordering::Nested => "NESTED",
        }
    }

    pub fn from_fits(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "RING" => Some(Ordering::Ring),
            "NESTED" | "NEST" => Some(Ordering::Nested),
            _ => None,
        }
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_fits())
    }
}

pub fn check_nside(nside: u64) -> Result<u32, HealpixError> {
    if nside == 0 || nside > NSIDE_MAX as u64 || !nside.is_power_of_two() {
        return Err(HealpixError::InvalidNside(nside));
    }
    Ok(nside as u32)
}

pub fn nside2npix(nside: u32) -> usize {
    12 * nside as usize * nside as usize
}

/// Inverse of [`nside2npix`] for valid pixel counts.
pub fn npix2nside(npix: usize) -> Result<u32, HealpixError> {
    let nside = ((npix / 12) as f64).sqrt().round() as u64;
    if nside2npix(nside as u32) != npix {
        return Err(HealpixError::InvalidNside(nside));
    }
    check_nside(nside)
}

// ---------------------------------------------------------------------------
// Pixel renumbering
// ---------------------------------------------------------------------------

fn spread_bits(v: i64) -> i64 {
    let mut out = 0;
    for bit in 0..32 {
        out |= ((v >> bit) & 1) << (2 * bit);
    }
    out
}

fn compress_bits(v: i64) -> i64 {
    let mut out = 0;
    for bit in 0..32 {
        out |= ((v >> (2 * bit)) & 1) << bit;
    }
    out
}

fn isqrt(v: i64) -> i64 {
    let mut r = (v as f64).sqrt() as i64;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}

/// (x, y, face) of a NESTED pixel.
fn nest2xyf(nside: i64, pix: i64) -> (i64, i64, usize) {
    let npface = nside * nside;
    let face = (pix / npface) as usize;
    let p = pix % npface;
    (compress_bits(p), compress_bits(p >> 1), face)
}

fn xyf2nest(nside: i64, ix: i64, iy: i64, face: usize) -> i64 {
    face as i64 * nside * nside + spread_bits(ix) + (spread_bits(iy) << 1)
}

fn xyf2ring(nside: i64, ix: i64, iy: i64, face: usize) -> i64 {
    let nl4 = 4 * nside;
    let npix = 12 * nside * nside;
    let ncap = 2 * nside * (nside - 1);
    let jr = JRLL[face] * nside - ix - iy - 1;

    let (nr, n_before, kshift) = if jr < nside {
        (jr, 2 * jr * (jr - 1), 0)
    } else if jr > 3 * nside {
        let nr = nl4 - jr;
        (nr, npix - 2 * (nr + 1) * nr, 0)
    } else {
        (nside, ncap + (jr - nside) * nl4, (jr - nside) & 1)
    };

    let mut jp = (JPLL[face] * nr + ix - iy + 1 + kshift) / 2;
    if jp > nl4 {
        jp -= nl4;
    } else if jp < 1 {
        jp += nl4;
    }
    n_before + jp - 1
}

fn ring2xyf(nside: i64, pix: i64) -> (i64, i64, usize) {
    let nl2 = 2 * nside;
    let nl4 = 4 * nside;
    let npix = 12 * nside * nside;
    let ncap = 2 * nside * (nside - 1);

    let (iring, iphi, kshift, nr, face) = if pix < ncap {
        let iring = (1 + isqrt(1 + 2 * pix)) >> 1;
        let iphi = pix + 1 - 2 * iring * (iring - 1);
        (iring, iphi, 0, iring, ((iphi - 1) / iring) as usize)
    } else if pix < npix - ncap {
        let ip = pix - ncap;
        let tmp = ip / nl4;
        let iring = tmp + nside;
        let iphi = ip - tmp * nl4 + 1;
        let kshift = (iring + nside) & 1;
        let ire = tmp + 1;
        let irm = nl2 + 2 - ire;
        let ifm = (iphi - (ire >> 1) + nside - 1) / nside;
        let ifp = (iphi - (irm >> 1) + nside - 1) / nside;
        let face = if ifp == ifm {
            ifp | 4
        } else if ifp < ifm {
            ifp
        } else {
            ifm + 8
        };
        (iring, iphi, kshift, nside, face as usize)
    } else {
        let ip = npix - pix;
        let nr = (1 + isqrt(2 * ip - 1)) >> 1;
        let iphi = 4 * nr + 1 - (ip - 2 * nr * (nr - 1));
        (2 * nl2 - nr, iphi, 0, nr, (8 + (iphi - 1) / nr) as usize)
    };

    let irt = iring - JRLL[face] * nside + 1;
    let mut ipt = 2 * iphi - JPLL[face] * nr - kshift - 1;
    if ipt >= nl2 {
        ipt -= 8 * nside;
    }
    ((ipt - irt) >> 1, (-ipt - irt) >> 1, face)
}

/// NESTED index → RING index.
pub fn nest2ring(nside: u32, pix: usize) -> usize {
    let ns = nside as i64;
    let (ix, iy, face) = nest2xyf(ns, pix as i64);
    xyf2ring(ns, ix, iy, face) as usize
}

/// RING index → NESTED index.
pub fn ring2nest(nside: u32, pix: usize) -> usize {
    let ns = nside as i64;
    let (ix, iy, face) = ring2xyf(ns, pix as i64);
    xyf2nest(ns, ix, iy, face) as usize
}

// ---------------------------------------------------------------------------
// HealpixMap
// ---------------------------------------------------------------------------

/// A full-sky map of f64 values.
#[derive(Debug, Clone, PartialEq)]
pub struct HealpixMap {
    nside: u32,
    ordering: Ordering,
    values: Vec<f64>,
}

impl HealpixMap {
    pub fn new(nside: u32, ordering: Ordering, values: Vec<f64>) -> Result<Self, HealpixError> {
        let nside = check_nside(nside as u64)?;
        let expected = nside2npix(nside);
        if values.len() != expected {
            return Err(HealpixError::LengthMismatch {
                nside,
                expected,
                found: values.len(),
            });
        }
        Ok(Self {
            nside,
            ordering,
            values,
        })
    }

    /// A map that is 1 everywhere.
    pub fn full_sky(nside: u32, ordering: Ordering) -> Result<Self, HealpixError> {
        let nside = check_nside(nside as u64)?;
        Self::new(nside, ordering, vec![1.0; nside2npix(nside)])
    }

    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn npix(&self) -> usize {
        self.values.len()
    }

    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// A map on the same grid holding `values`.
    pub(crate) fn same_grid(&self, values: Vec<f64>) -> HealpixMap {
        debug_assert_eq!(values.len(), self.values.len());
        HealpixMap {
            nside: self.nside,
            ordering: self.ordering,
            values,
        }
    }

    /// The same map renumbered to `ordering`.
    pub fn to_ordering(&self, ordering: Ordering) -> HealpixMap {
        if ordering == self.ordering {
            return self.clone();
        }
        let n = self.values.len();
        let values = match ordering {
            Ordering::Nested => (0..n).map(|nest| self.values[nest2ring(self.nside, nest)]).collect(),
            Ordering::Ring => (0..n).map(|ring| self.values[ring2nest(self.nside, ring)]).collect(),
        };
        HealpixMap {
            nside: self.nside,
            ordering,
            values,
        }
    }

    /// Change resolution, keeping the ordering.
    ///
    /// Degrading averages the children of each output pixel; upgrading copies
    /// the parent value into every child.
    pub fn ud_grade(&self, nside_out: u32) -> Result<HealpixMap, HealpixError> {
        let nside_out = check_nside(nside_out as u64)?;
        let nested = self.to_ordering(Ordering::Nested);
        let npix_out = nside2npix(nside_out);

        let values = if nside_out == self.nside {
            nested.values
        } else if nside_out < self.nside {
            let ratio = (self.nside / nside_out) as usize;
            let children = ratio * ratio;
            nested
                .values
                .chunks_exact(children)
                .map(|c| c.iter().sum::<f64>() / children as f64)
                .collect()
        } else {
            let ratio = (nside_out / self.nside) as usize;
            let children = ratio * ratio;
            let mut out = Vec::with_capacity(npix_out);
            for v in &nested.values {
                out.extend(std::iter::repeat(*v).take(children));
            }
            out
        };

        let graded = HealpixMap {
            nside: nside_out,
            ordering: Ordering::Nested,
            values,
        };
        Ok(graded.to_ordering(self.ordering))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nside_validation() {
        assert_eq!(check_nside(32), Ok(32));
        assert_eq!(check_nside(0), Err(HealpixError::InvalidNside(0)));
        assert_eq!(check_nside(12), Err(HealpixError::InvalidNside(12)));
        assert_eq!(npix2nside(12 * 64 * 64), Ok(64));
        assert!(npix2nside(100).is_err());
    }

    #[test]
    fn base_resolution_orderings_coincide() {
        for pix in 0..12 {
            assert_eq!(nest2ring(1, pix), pix);
            assert_eq!(ring2nest(1, pix), pix);
        }
    }

    #[test]
    fn known_nside2_indices() {
        // healpy.nest2ring(2, [0, 1, 2, 3, 47]) == [13, 5, 4, 0, 35]
        let nest = [0, 1, 2, 3, 47];
        let ring = [13, 5, 4, 0, 35];
        for (n, r) in nest.iter().zip(ring) {
            assert_eq!(nest2ring(2, *n), r);
            assert_eq!(ring2nest(2, r), *n);
        }
    }

    #[test]
    fn degrade_averages_and_upgrade_copies() {
        let values: Vec<f64> = (0..48).map(|i| i as f64).collect();
        let map = HealpixMap::new(2, Ordering::Nested, values).unwrap();
        let low = map.ud_grade(1).unwrap();
        assert_eq!(low.values()[0], 1.5);
        assert_eq!(low.values()[11], (44.0 + 45.0 + 46.0 + 47.0) / 4.0);

        let high = low.ud_grade(2).unwrap();
        assert_eq!(&high.values()[0..4], &[1.5; 4]);
    }

    #[test]
    fn ud_grade_keeps_ring_ordering() {
        let map = HealpixMap::full_sky(4, Ordering::Ring).unwrap();
        let low = map.ud_grade(1).unwrap();
        assert_eq!(low.ordering(), Ordering::Ring);
        assert!(low.values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn rejects_wrong_length() {
        let err = HealpixMap::new(2, Ordering::Ring, vec![0.0; 47]).unwrap_err();
        assert_eq!(
            err,
            HealpixError::LengthMismatch {
                nside: 2,
                expected: 48,
                found: 47
            }
        );
    }

    proptest! {
        #[test]
        fn nest_ring_round_trip(order in 0u32..12, frac in 0.0f64..1.0) {
            let nside = 1u32 << order;
            let pix = ((nside2npix(nside) as f64 - 1.0) * frac) as usize;
            prop_assert_eq!(ring2nest(nside, nest2ring(nside, pix)), pix);
            prop_assert_eq!(nest2ring(nside, ring2nest(nside, pix)), pix);
        }
    }
}

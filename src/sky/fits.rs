//! HEALPix maps as FITS binary tables.
//!
//! Maps are written one pixel per row in a single `TEMPERATURE` column of
//! the first extension, with the usual HEALPix header keywords. Reading also
//! accepts vector columns (several pixels per row, as healpy writes them).

use std::os::raw::c_int;
use std::path::{Path, PathBuf};

use fitsio::tables::{ColumnDataType, ColumnDescription};
use fitsio::FitsFile;
use log::debug;
use thiserror::Error;

use super::healpix::{npix2nside, HealpixError, HealpixMap, Ordering};

pub const MAP_COLUMN: &str = "TEMPERATURE";

#[derive(Debug, Error)]
pub enum FitsMapError {
    #[error("FITS I/O error: {0}")]
    Fits(#[from] fitsio::errors::Error),

    #[error("{}: no data column in the first extension", path.display())]
    MissingColumn { path: PathBuf },

    #[error("{}: {reason}", path.display())]
    BadHeader { path: PathBuf, reason: String },

    #[error(transparent)]
    Healpix(#[from] HealpixError),
}

fn bad_header(path: &Path, reason: impl Into<String>) -> FitsMapError {
    FitsMapError::BadHeader {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Element count of a TFORM such as `D`, `1D` or `1024E`.
fn tform_repeat(tform: &str) -> Option<i64> {
    let tform = tform.trim();
    let digits: String = tform.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() == tform.len() {
        return None;
    }
    if digits.is_empty() {
        Some(1)
    } else {
        digits.parse().ok()
    }
}

/// Write `map` to `path`, replacing any existing file.
pub fn write_map(path: &Path, map: &HealpixMap) -> Result<(), FitsMapError> {
    let mut fptr = FitsFile::create(path).overwrite().open()?;
    let column = ColumnDescription::new(MAP_COLUMN)
        .with_type(ColumnDataType::Double)
        .create()?;
    let hdu = fptr.create_table("xtension".to_string(), &[column])?;
    hdu.write_col(&mut fptr, MAP_COLUMN, map.values())?;

    let npix = map.npix() as i64;
    hdu.write_key(&mut fptr, "PIXTYPE", "HEALPIX")?;
    hdu.write_key(&mut fptr, "ORDERING", map.ordering().as_fits())?;
    hdu.write_key(&mut fptr, "NSIDE", map.nside() as i64)?;
    hdu.write_key(&mut fptr, "FIRSTPIX", 0i64)?;
    hdu.write_key(&mut fptr, "LASTPIX", npix - 1)?;
    hdu.write_key(&mut fptr, "INDXSCHM", "IMPLICIT")?;
    hdu.write_key(&mut fptr, "OBJECT", "FULLSKY")?;
    debug!("wrote {} ({} pixels, {})", path.display(), npix, map.ordering());
    Ok(())
}

/// Read the first column of the first extension of `path` as a full-sky map.
pub fn read_map(path: &Path) -> Result<HealpixMap, FitsMapError> {
    let mut fptr = FitsFile::open(path)?;
    let hdu = fptr.hdu(1)?;

    let n_fields = hdu.read_key::<i64>(&mut fptr, "TFIELDS").unwrap_or(0);
    if n_fields < 1 {
        return Err(FitsMapError::MissingColumn {
            path: path.to_path_buf(),
        });
    }

    let ordering_key = hdu
        .read_key::<String>(&mut fptr, "ORDERING")
        .map_err(|_| bad_header(path, "missing ORDERING keyword"))?;
    let ordering = Ordering::from_fits(&ordering_key)
        .ok_or_else(|| bad_header(path, format!("unknown ORDERING '{}'", ordering_key.trim())))?;

    if let Ok(scheme) = hdu.read_key::<String>(&mut fptr, "INDXSCHM") {
        if scheme.trim().eq_ignore_ascii_case("EXPLICIT") {
            return Err(bad_header(path, "partial-sky (EXPLICIT) maps are not supported"));
        }
    }

    let tform = hdu
        .read_key::<String>(&mut fptr, "TFORM1")
        .map_err(|_| bad_header(path, "missing TFORM1 keyword"))?;
    let repeat = tform_repeat(&tform).ok_or_else(|| bad_header(path, format!("bad TFORM1 '{tform}'")))?;
    let n_rows = hdu.read_key::<i64>(&mut fptr, "NAXIS2")?;

    let values = match hdu.read_key::<String>(&mut fptr, "TTYPE1") {
        Ok(name) if repeat == 1 => hdu.read_col::<f64>(&mut fptr, name.trim())?,
        _ => read_vector_column(&mut fptr, repeat * n_rows)?,
    };

    let nside = npix2nside(values.len())?;
    if let Ok(header_nside) = hdu.read_key::<i64>(&mut fptr, "NSIDE") {
        if header_nside != nside as i64 {
            return Err(bad_header(
                path,
                format!("NSIDE = {header_nside} but the map has {} pixels", values.len()),
            ));
        }
    }

    debug!("read {} (nside {}, {})", path.display(), nside, ordering);
    Ok(HealpixMap::new(nside, ordering, values)?)
}

/// Every element of column 1 in the current HDU, flattened row by row.
///
/// fitsio's `read_col` reads one element per row, so it cannot return the
/// whole of a vector column (TFORM repeat > 1).
fn read_vector_column(fptr: &mut FitsFile, n_elem: i64) -> Result<Vec<f64>, FitsMapError> {
    let mut values = vec![0.0f64; n_elem.max(0) as usize];
    let mut any_null: c_int = 0;
    let mut status: c_int = 0;
    // SAFETY: `values` has room for `n_elem` doubles and `fptr` outlives the call.
    unsafe {
        fitsio::sys::ffgcvd(
            fptr.as_raw(),
            1,
            1,
            1,
            n_elem,
            0.0,
            values.as_mut_ptr(),
            &mut any_null,
            &mut status,
        );
    }
    fitsio::errors::check_status(status)?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tform_repeat_counts() {
        assert_eq!(tform_repeat("D"), Some(1));
        assert_eq!(tform_repeat("1D"), Some(1));
        assert_eq!(tform_repeat("1024E"), Some(1024));
        assert_eq!(tform_repeat(" 12 "), None);
    }

    #[test]
    fn map_round_trips_through_fits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.fits");
        let values: Vec<f64> = (0..48).map(|i| i as f64 * 0.5).collect();
        let map = HealpixMap::new(2, Ordering::Nested, values).unwrap();

        write_map(&path, &map).unwrap();
        let back = read_map(&path).unwrap();
        assert_eq!(back, map);

        // overwriting is allowed
        write_map(&path, &map).unwrap();
    }

    #[test]
    fn vector_column_is_read_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector.fits");
        let values: Vec<f64> = (0..48).map(|i| 1.0 + i as f64).collect();
        {
            let mut fptr = FitsFile::create(&path).open().unwrap();
            let column = ColumnDescription::new("SIGNAL")
                .with_type(ColumnDataType::Double)
                .that_repeats(4)
                .create()
                .unwrap();
            let hdu = fptr.create_table("xtension".to_string(), &[column]).unwrap();
            hdu.write_col(&mut fptr, "SIGNAL", &values).unwrap();
            hdu.write_key(&mut fptr, "ORDERING", "RING").unwrap();
            hdu.write_key(&mut fptr, "NSIDE", 2i64).unwrap();
        }

        let map = read_map(&path).unwrap();
        assert_eq!(map.nside(), 2);
        assert_eq!(map.ordering(), Ordering::Ring);
        assert_eq!(map.values(), values.as_slice());
    }

    #[test]
    fn missing_file_is_a_fits_error() {
        let err = read_map(Path::new("/nonexistent/map.fits")).unwrap_err();
        assert!(matches!(err, FitsMapError::Fits(_)));
    }
}

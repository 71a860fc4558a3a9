use std::path::Path;

use anyhow::{Context, Result, bail};
use ndarray::Array2;
use serde::Serialize;

use super::model::{BinnedSpectrum, JackknifeEstimate};

// ---------------------------------------------------------------------------
// Row layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct BinnedRow {
    ell_center: f64,
    ell_mean: f64,
    cl: f64,
    err: f64,
}

#[derive(Debug, Serialize)]
struct JackknifeRow {
    ell_center: f64,
    cl: f64,
    err: f64,
}

#[derive(Debug, Serialize)]
struct TheoryRow {
    ell: f64,
    cl: f64,
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// `ell_center,ell_mean,cl,err` – one row per bin.
pub fn write_binned_csv(path: &Path, binned: &BinnedSpectrum) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for i in 0..binned.n_bins() {
        writer.serialize(BinnedRow {
            ell_center: binned.centers[i],
            ell_mean: binned.ell_mean[i],
            cl: binned.cl[i],
            err: binned.err[i],
        })?;
    }
    writer.flush().context("flushing binned spectrum")?;
    Ok(())
}

/// `ell_center,cl,err` with `err` the square root of the covariance diagonal.
pub fn write_jackknife_csv(path: &Path, estimate: &JackknifeEstimate) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for ((center, cl), err) in estimate
        .centers
        .iter()
        .zip(&estimate.mean)
        .zip(estimate.errors())
    {
        writer.serialize(JackknifeRow {
            ell_center: *center,
            cl: *cl,
            err,
        })?;
    }
    writer.flush().context("flushing jackknife spectrum")?;
    Ok(())
}

/// Dense matrix, no header, one CSV row per matrix row.
pub fn write_matrix_csv(path: &Path, matrix: &Array2<f64>) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in matrix.rows() {
        writer.write_record(row.iter().map(|v| format!("{v:e}")))?;
    }
    writer.flush().context("flushing matrix")?;
    Ok(())
}

/// `ell,cl` for model predictions.
pub fn write_theory_csv(path: &Path, ell: &[f64], cl: &[f64]) -> Result<()> {
    if ell.len() != cl.len() {
        bail!("ell has {} values but C_ell has {}", ell.len(), cl.len());
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for (&ell, &cl) in ell.iter().zip(cl) {
        writer.serialize(TheoryRow { ell, cl })?;
    }
    writer.flush().context("flushing model spectrum")?;
    Ok(())
}

/// Read back a matrix written by [`write_matrix_csv`].
pub fn read_matrix_csv(path: &Path) -> Result<Array2<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut values = Vec::new();
    let mut n_rows = 0;
    let mut n_cols = None;
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        match n_cols {
            None => n_cols = Some(record.len()),
            Some(n) if n != record.len() => {
                bail!("CSV row {row_no}: expected {n} columns, got {}", record.len())
            }
            Some(_) => {}
        }
        for (col, tok) in record.iter().enumerate() {
            let v = tok
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row_no}, column {col}: '{tok}' is not a number"))?;
            values.push(v);
        }
        n_rows += 1;
    }

    Array2::from_shape_vec((n_rows, n_cols.unwrap_or(0)), values)
        .context("reshaping matrix")
}

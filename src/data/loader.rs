use std::path::Path;

use anyhow::{Context, Result, bail};

use super::model::Spectrum;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a two-column angular power spectrum from a text file.
///
/// Layout (PolSpice `clfile` output, also what `np.savetxt` produces):
///
/// ```text
/// # l  TT  [EE BB TE ...]
/// 0    1.2e-9
/// 1    3.4e-9
/// ...
/// ```
///
/// * whitespace-delimited columns, column 0 = ell, column 1 = C_ell
/// * blank lines and lines starting with `#` are skipped
/// * any further columns (polarisation spectra) are ignored
pub fn read_spectrum(path: &Path) -> Result<Spectrum> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading spectrum file {}", path.display()))?;
    parse_spectrum(&text).with_context(|| format!("parsing spectrum file {}", path.display()))
}

/// Parse the text layout described in [`read_spectrum`].
pub fn parse_spectrum(text: &str) -> Result<Spectrum> {
    let mut ell = Vec::new();
    let mut cl = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut columns = trimmed.split_whitespace();
        let l = parse_column(columns.next(), line_no + 1, "ell")?;
        let c = parse_column(columns.next(), line_no + 1, "C_ell")?;
        ell.push(l);
        cl.push(c);
    }

    if ell.is_empty() {
        bail!("no data rows found");
    }

    Ok(Spectrum::new(ell, cl)?)
}

fn parse_column(token: Option<&str>, line: usize, col: &str) -> Result<f64> {
    let tok = token.with_context(|| format!("Line {line}: missing '{col}' column"))?;
    tok.parse::<f64>()
        .with_context(|| format!("Line {line}, {col}: '{tok}' is not a number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_extra_columns() {
        let text = "# l TT EE\n\n0 1.5 9.0\n1   2.5e-3\t7\n";
        let sp = parse_spectrum(text).unwrap();
        assert_eq!(sp.ell(), &[0.0, 1.0]);
        assert_eq!(sp.cl(), &[1.5, 2.5e-3]);
    }

    #[test]
    fn reports_line_of_bad_value() {
        let err = parse_spectrum("0 1.0\n1 abc\n").unwrap_err();
        assert!(format!("{err:#}").contains("Line 2"));
    }

    #[test]
    fn single_column_is_rejected() {
        let err = parse_spectrum("0 1.0\n1\n").unwrap_err();
        assert!(format!("{err:#}").contains("missing 'C_ell'"));
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(parse_spectrum("# only a header\n").is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_spectrum(Path::new("/definitely/not/here.cl")).unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.cl"));
    }
}

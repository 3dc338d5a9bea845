// Cross-section file I/O.
//
// Cross sections are exchanged as headerless CSV with one
// `energy [eV], cross section [m^2]` pair per row, sorted by energy.

use std::path::Path;

use crate::error::SimError;

/// Read a cross-section CSV into (energies, cross sections).
pub fn read_cross_section(path: &Path) -> Result<(Vec<f64>, Vec<f64>), SimError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != 2 {
            return Err(SimError::XsecIo(format!(
                "{}: expected 2 columns, got {}",
                path.display(),
                record.len()
            )));
        }
        let parse = |i: usize| -> Result<f64, SimError> {
            record[i].parse::<f64>().map_err(|_| {
                SimError::XsecIo(format!(
                    "{}: bad number '{}'",
                    path.display(),
                    &record[i]
                ))
            })
        };
        xs.push(parse(0)?);
        ys.push(parse(1)?);
    }
    if xs.is_empty() {
        return Err(SimError::XsecIo(format!("{}: empty file", path.display())));
    }
    Ok((xs, ys))
}

/// Evaluate `f` at the given energies and write the pairs as a
/// cross-section CSV. Companion to [`read_cross_section`], mainly for
/// generating analytic cross sections.
pub fn write_cross_section(
    path: &Path,
    energies: &[f64],
    f: impl Fn(f64) -> f64,
) -> Result<(), SimError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for &e in energies {
        writer.write_record(&[e.to_string(), f(e).to_string()])?;
    }
    writer.flush().map_err(|e| SimError::XsecIo(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn test_write_then_read() {
        let path = temp_file("picsim_xsec_rw.csv");
        let energies = [0.1, 1.0, 10.0, 100.0];
        write_cross_section(&path, &energies, |e| 1.0e-19 / (1.0 + e)).unwrap();
        let (xs, ys) = read_cross_section(&path).unwrap();
        assert_eq!(xs, energies);
        assert!((ys[1] - 0.5e-19).abs() < 1e-30);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_read_rejects_bad_rows() {
        let path = temp_file("picsim_xsec_bad.csv");
        std::fs::write(&path, "1.0,notanumber\n").unwrap();
        assert!(matches!(
            read_cross_section(&path),
            Err(SimError::XsecIo(_))
        ));
        std::fs::write(&path, "").unwrap();
        assert!(read_cross_section(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_read_missing_file() {
        assert!(read_cross_section(Path::new("/nonexistent/xsec.csv")).is_err());
    }
}

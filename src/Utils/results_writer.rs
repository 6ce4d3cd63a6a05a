//! Fixed-width results table.
//!
//! Every row holds `t x v a`, each field printed like C's `%16.4e`: four decimals in the mantissa,
//! an exponent with explicit sign and at least two digits, right-aligned in 16 characters.
use crate::OptimalControl::solution::Trajectory;
use log::info;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const FIELD_WIDTH: usize = 16;
pub const PRECISION: usize = 4;

/// C-style scientific notation: `1.2346e+03`, `-5.0000e-01`, `0.0000e+00`
pub fn format_scientific(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let rust_style = format!("{:.*e}", precision, value);
    match rust_style.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => rust_style,
    }
}

/// one `%16.4e` field
pub fn format_field(value: f64) -> String {
    format!(
        "{:>width$}",
        format_scientific(value, PRECISION),
        width = FIELD_WIDTH
    )
}

/// fields separated by a single space
pub fn format_row(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format_field(*v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes one row `i*h x[i] v[i] a[i]` per node in increasing index order
pub fn write_trajectory<W: Write>(writer: &mut W, trajectory: &Trajectory) -> io::Result<()> {
    for i in 0..trajectory.x.len() {
        writeln!(
            writer,
            "{}",
            format_row(&[
                trajectory.time[i],
                trajectory.x[i],
                trajectory.v[i],
                trajectory.a[i],
            ])
        )?;
    }
    Ok(())
}

/// Writes the results table; the file is flushed and closed on return
pub fn save_results(path: &Path, trajectory: &Trajectory) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_trajectory(&mut writer, trajectory)?;
    writer.flush()?;
    info!(
        "{} rows written to {}",
        trajectory.x.len(),
        path.display()
    );
    Ok(())
}

/// Comma separated copy of the trajectory with a `t,x,v,a` header
pub fn save_csv(path: &Path, trajectory: &Trajectory) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "t,x,v,a")?;
    for i in 0..trajectory.x.len() {
        writeln!(
            writer,
            "{},{},{},{}",
            trajectory.time[i], trajectory.x[i], trajectory.v[i], trajectory.a[i]
        )?;
    }
    writer.flush()?;
    info!("trajectory exported to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn three_node_trajectory() -> Trajectory {
        Trajectory::from_arrays(
            1.0,
            vec![0.0, 2.5, 5.0],
            vec![0.0, 1.0, 0.0],
            vec![1.0, -1.0, -1.0],
        )
        .unwrap()
    }

    #[test]
    fn test_format_scientific() {
        assert_eq!(format_scientific(0.0, 4), "0.0000e+00");
        assert_eq!(format_scientific(1.0, 4), "1.0000e+00");
        assert_eq!(format_scientific(2.5, 4), "2.5000e+00");
        assert_eq!(format_scientific(-1.0, 4), "-1.0000e+00");
        assert_eq!(format_scientific(1234.5678, 4), "1.2346e+03");
        assert_eq!(format_scientific(0.000123, 4), "1.2300e-04");
        assert_eq!(format_scientific(1.5e120, 4), "1.5000e+120");
        assert_eq!(format_scientific(f64::NAN, 4), "nan");
    }

    #[test]
    fn test_field_width() {
        assert_eq!(format_field(0.0), "      0.0000e+00");
        assert_eq!(format_field(-3.0), "     -3.0000e+00");
        assert_eq!(format_field(0.0).len(), FIELD_WIDTH);
    }

    #[test]
    fn test_three_node_table() {
        let mut buffer: Vec<u8> = Vec::new();
        write_trajectory(&mut buffer, &three_node_trajectory()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "      0.0000e+00       0.0000e+00       0.0000e+00       1.0000e+00"
        );
        assert_eq!(
            lines[1],
            "      1.0000e+00       2.5000e+00       1.0000e+00      -1.0000e+00"
        );
        assert_eq!(
            lines[2],
            "      2.0000e+00       5.0000e+00       0.0000e+00      -1.0000e+00"
        );
        for line in lines {
            assert_eq!(line.len(), 4 * FIELD_WIDTH + 3);
        }
    }

    #[test]
    fn test_save_results_and_csv() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("results.txt");
        let csv = dir.path().join("results.csv");
        let trajectory = three_node_trajectory();
        save_results(&results, &trajectory).unwrap();
        save_csv(&csv, &trajectory).unwrap();

        let table = std::fs::read_to_string(&results).unwrap();
        assert_eq!(table.lines().count(), 3);
        let csv_text = std::fs::read_to_string(&csv).unwrap();
        let mut lines = csv_text.lines();
        assert_eq!(lines.next(), Some("t,x,v,a"));
        assert_eq!(lines.next(), Some("0,0,0,1"));
        assert_eq!(csv_text.lines().count(), 4);
    }
}

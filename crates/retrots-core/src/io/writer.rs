use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{RetroError, RetroResult};
use crate::regressors::RegressorTable;

use super::OutputFormat;

/// AFNI NIML envelope around fixed-point rows.
pub fn render_niml(table: &RegressorTable) -> String {
    let mut lines = vec![
        "# <RetroTSout".to_string(),
        format!("# ni_type = \"{}*double\"", table.cols()),
        format!("# ni_dimen = \"{}\"", table.rows()),
        format!("# ColumnLabels = \"{}\"", table.labels().join(" ; ")),
        "# >".to_string(),
    ];
    lines.extend(table.data().rows().into_iter().map(|row| {
        row.iter()
            .map(|v| format!("{v:.4}"))
            .collect::<Vec<_>>()
            .join(" ")
    }));
    lines.push("# </RetroTSout>".to_string());
    lines.join("\n") + "\n"
}

/// Indexed CSV: blank corner cell, labels, then `row,values...`.
pub fn render_csv(table: &RegressorTable) -> String {
    let header = format!(",{}", table.labels().join(","));
    let rows = table.data().rows().into_iter().enumerate().map(|(i, row)| {
        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        format!("{i},{}", values.join(","))
    });
    std::iter::once(header)
        .chain(rows)
        .map(|line| line + "\n")
        .collect()
}

/// Write `contents` to `path` through a temporary sibling file.
fn write_atomic(path: &Path, contents: &[u8]) -> RetroResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| RetroError::io(dir, e))?;
    tmp.write_all(contents).map_err(|e| RetroError::io(tmp.path(), e))?;
    tmp.flush().map_err(|e| RetroError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| RetroError::io(path, e.error))?;
    Ok(())
}

/// Write the table as `{out_dir}/{prefix}.{suffix}` and return the path.
pub fn write_table(
    table: &RegressorTable,
    format: OutputFormat,
    out_dir: &Path,
    prefix: &str,
) -> RetroResult<PathBuf> {
    fs::create_dir_all(out_dir).map_err(|e| RetroError::io(out_dir, e))?;
    let path = out_dir.join(format!("{prefix}.{}", format.file_suffix()));
    let body = match format {
        OutputFormat::Niml => render_niml(table),
        OutputFormat::Csv => render_csv(table),
    };
    write_atomic(&path, body.as_bytes())?;
    info!(
        path = %path.display(),
        rows = table.rows(),
        cols = table.cols(),
        "wrote regressor table"
    );
    Ok(path)
}

/// Record the literal command line next to the outputs.
pub fn write_arguments(out_dir: &Path, args: &[String]) -> RetroResult<PathBuf> {
    fs::create_dir_all(out_dir).map_err(|e| RetroError::io(out_dir, e))?;
    let path = out_dir.join("arguments.txt");
    write_atomic(&path, format!("{}\n", args.join(" ")).as_bytes())?;
    Ok(path)
}

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::{CostReport, ValidationResults};

/// Writes `value` as pretty JSON, replacing `path` only once the write succeeded.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_vec_pretty(value).context("failed to serialize report")?;
    buf.push(b'\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.json".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()));
    {
        let mut f = std::fs::File::create(&tmp)
            .with_context(|| format!("failed to create file: {}", tmp.display()))?;
        f.write_all(&buf)
            .with_context(|| format!("failed to write file: {}", tmp.display()))?;
        f.sync_all().ok();
    }
    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("failed to write report: {}", path.display()));
    }
    Ok(())
}

pub fn read_cost_report(path: &Path) -> Result<CostReport> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read report: {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("malformed cost report: {}", path.display()))
}

pub fn read_validation_results(path: &Path) -> Result<ValidationResults> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read results: {}", path.display()))?;
    serde_json::from_str(&s)
        .with_context(|| format!("malformed validation results: {}", path.display()))
}

/// Writes pretty JSON to stdout, treating a closed pipe as success.
pub fn write_json_stdout<T: Serialize>(value: &T) -> Result<()> {
    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

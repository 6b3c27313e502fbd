//! In-memory sort of the owned partition and the output writer.

use anyhow::{Context, Result};
use record::Record;
use std::ffi::OsString;
use std::fs::{rename, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sorts records by key, comparing bytes as unsigned values.
///
/// The sort is stable, so records with equal keys keep their arrival order.
pub fn sort_records(records: &mut [Record]) {
    records.sort_by(|a, b| a.key().cmp(b.key()));
}

/// `<path>.tmp`, next to the final output.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `records` back to back, with no framing, to `path`.
///
/// The data goes to `<path>.tmp` through a `BufWriter`, is flushed and
/// fsynced, then renamed over `path`. Returns the number of bytes written.
/// An empty slice produces an empty file.
pub fn write_sorted(path: &Path, records: &[Record]) -> Result<u64> {
    let tmp = tmp_path(path);
    let raw = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .with_context(|| format!("failed to create {}", tmp.display()))?;
    let mut file = BufWriter::new(raw);

    let mut written = 0u64;
    for rec in records {
        file.write_all(rec.as_bytes())
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        written += rec.as_bytes().len() as u64;
    }

    file.flush()?;
    file.into_inner()?.sync_all()?;

    rename(&tmp, path)
        .with_context(|| format!("failed to move output into place at {}", path.display()))?;
    Ok(written)
}

/// Sorts the frozen partition and writes it to `path`.
pub fn sort_and_write(path: &Path, mut records: Vec<Record>) -> Result<u64> {
    sort_records(&mut records);
    write_sorted(path, &records)
}

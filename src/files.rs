//! File Safety Module
//!
//! Scrape runs are long and get interrupted, so outputs are never blindly
//! overwritten: names get timestamps, replaced files get backups, and
//! damaged CSV files can be repaired in place.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::{info, warn};

use crate::storage::count_csv_rows;

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `dir/name.ext` becomes `dir/name-YYYYmmdd_HHMMSS.ext`.
pub fn timestamped_filename(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, timestamp(), ext.to_string_lossy()),
        None => format!("{}-{}", stem, timestamp()),
    };
    path.with_file_name(name)
}

/// Pick a path that can be written without clobbering anything.
///
/// Returns the path itself when it is free (creating parent directories),
/// the same path after deleting the old file when `overwrite` is set, a
/// timestamped sibling when `create_unique` is set, and `None` otherwise.
pub fn ensure_file_can_be_created(
    path: &Path,
    create_unique: bool,
    overwrite: bool,
) -> Result<Option<PathBuf>> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }
        return Ok(Some(path.to_path_buf()));
    }

    if overwrite {
        match fs::remove_file(path) {
            Ok(()) => return Ok(Some(path.to_path_buf())),
            Err(e) => warn!("Could not overwrite {:?}: {}", path, e),
        }
    }

    if create_unique {
        return Ok(Some(timestamped_filename(path)));
    }

    Ok(None)
}

/// A CSV file is usable when it parses cleanly and has at least one row.
pub fn validate_csv_file(path: &Path) -> bool {
    if !path.exists() {
        warn!("CSV file {:?} does not exist", path);
        return false;
    }

    match count_csv_rows(path) {
        Ok(0) => {
            warn!("CSV file {:?} is empty (header only)", path);
            false
        }
        Ok(_) => true,
        Err(e) => {
            warn!("CSV file {:?} is not valid: {:#}", path, e);
            false
        }
    }
}

/// Copy `path` to a timestamped `path.bak`. `None` when there is nothing to back up.
pub fn create_backup(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut bak = path.as_os_str().to_owned();
    bak.push(".bak");
    let backup_path = timestamped_filename(Path::new(&bak));
    fs::copy(path, &backup_path)
        .with_context(|| format!("Failed to back up {:?} to {:?}", path, backup_path))?;

    Ok(Some(backup_path))
}

/// Whether both paths name the same existing file, however they are spelled.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Move `src` to `dest`, keeping a `dest.<timestamp>.bak` copy of any file
/// already there when `backup` is set.
pub fn safe_file_move(src: &Path, dest: &Path, backup: bool) -> Result<()> {
    if same_file(src, dest) {
        info!("{:?} is already in place", dest);
        return Ok(());
    }

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }

    if dest.exists() {
        if backup {
            let mut name = dest.as_os_str().to_owned();
            name.push(format!(".{}.bak", timestamp()));
            info!("Creating backup of existing file: {:?}", name);
            fs::copy(dest, &name)
                .with_context(|| format!("Failed to back up {:?}", dest))?;
        }
        fs::remove_file(dest).with_context(|| format!("Failed to remove {:?}", dest))?;
    }

    info!("Moving file: {:?} -> {:?}", src, dest);
    if fs::rename(src, dest).is_err() {
        // rename fails across filesystems
        fs::copy(src, dest).with_context(|| format!("Failed to copy {:?} to {:?}", src, dest))?;
        fs::remove_file(src).with_context(|| format!("Failed to remove {:?}", src))?;
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    Valid,
    Repaired { dropped_rows: usize },
    Failed(String),
}

/// Check a CSV file and try to fix it in place when it does not parse.
///
/// Repair strips NUL bytes, decodes invalid UTF-8 lossily and drops rows
/// whose field count differs from the header. The damaged original is
/// backed up first.
pub fn verify_and_repair_csv(path: &Path) -> RepairOutcome {
    if !path.exists() {
        return RepairOutcome::Failed(format!("{:?} does not exist", path));
    }

    let err = match count_csv_rows(path) {
        Ok(0) => return RepairOutcome::Failed("empty (header only)".to_string()),
        Ok(_) => return RepairOutcome::Valid,
        Err(e) => e,
    };

    warn!("CSV file {:?} has issues: {:#}", path, err);
    info!("Attempting to repair {:?}...", path);

    match repair_csv(path) {
        Ok(outcome) => outcome,
        Err(e) => RepairOutcome::Failed(format!("{:#}", e)),
    }
}

fn repair_csv(path: &Path) -> Result<RepairOutcome> {
    if create_backup(path)?.is_none() {
        return Ok(RepairOutcome::Failed("could not create backup".to_string()));
    }

    let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let mut content = String::from_utf8_lossy(&bytes).replace('\0', "");
    if !content.ends_with('\n') {
        content.push('\n');
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut records = reader.records();

    let header: StringRecord = match records.next() {
        Some(Ok(header)) => header,
        _ => return Ok(RepairOutcome::Failed("file has too few lines to repair".to_string())),
    };

    let mut kept = Vec::new();
    let mut dropped_rows = 0;
    for (line, record) in records.enumerate() {
        match record {
            Ok(record) if record.len() == header.len() => kept.push(record),
            Ok(record) => {
                warn!(
                    "Removing corrupted row {}: {}",
                    line + 2,
                    record.iter().collect::<Vec<_>>().join(",").chars().take(50).collect::<String>()
                );
                dropped_rows += 1;
            }
            Err(_) => dropped_rows += 1,
        }
    }

    let mut fixed_name = path.as_os_str().to_owned();
    fixed_name.push(".fixed");
    let fixed_path = PathBuf::from(fixed_name);

    let mut writer = WriterBuilder::new()
        .from_path(&fixed_path)
        .with_context(|| format!("Failed to create {:?}", fixed_path))?;
    writer.write_record(&header)?;
    for record in &kept {
        writer.write_record(record)?;
    }
    writer.flush()?;
    drop(writer);

    if let Err(e) = count_csv_rows(&fixed_path) {
        let _ = fs::remove_file(&fixed_path);
        return Ok(RepairOutcome::Failed(format!("repaired file still invalid: {:#}", e)));
    }

    fs::rename(&fixed_path, path)
        .with_context(|| format!("Failed to replace {:?} with repaired copy", path))?;
    info!("Successfully repaired {:?}", path);

    Ok(RepairOutcome::Repaired { dropped_rows })
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VerifySummary {
    pub checked: usize,
    pub valid: usize,
    pub repaired: usize,
    pub failed: usize,
}

/// Verify (and repair) every `.csv` file under `dir`.
pub fn verify_directory(dir: &Path) -> Result<VerifySummary> {
    let mut files = Vec::new();
    collect_csv_files(dir, &mut files)?;
    files.sort();

    println!("Found {} CSV files to check", files.len());

    let mut summary = VerifySummary::default();
    for file in &files {
        summary.checked += 1;
        match verify_and_repair_csv(file) {
            RepairOutcome::Valid => {
                println!("✓ {} is valid", file.display());
                summary.valid += 1;
            }
            RepairOutcome::Repaired { dropped_rows } => {
                println!("✓ {} has been repaired ({} rows dropped)", file.display(), dropped_rows);
                summary.repaired += 1;
            }
            RepairOutcome::Failed(reason) => {
                println!("✗ {} could not be verified or repaired: {}", file.display(), reason);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

fn collect_csv_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_csv_files(&path, out)?;
        } else if path.extension().map_or(false, |ext| ext == "csv") {
            out.push(path);
        }
    }
    Ok(())
}

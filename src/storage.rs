use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};

use crate::types::{Scholarship, Sources, CSV_HEADERS};

const SOURCES_FILE: &str = "tracking/sources.yml";

pub fn load_sources(root: &str) -> Result<Sources> {
    let path = PathBuf::from(root).join(SOURCES_FILE);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read sources from {:?}", path))?;

    let sources: Sources = serde_yaml::from_str(&content)
        .with_context(|| "Failed to parse sources YAML")?;

    Ok(sources)
}

/// Read every scholarship row from a CSV file.
///
/// Missing columns become empty strings, unknown columns are ignored and
/// ragged rows are tolerated.
pub fn read_scholarships(path: &Path) -> Result<Vec<Scholarship>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV {:?}", path))?;

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<Scholarship>().enumerate() {
        let row = result
            .with_context(|| format!("Failed to parse row {} of {:?}", index + 1, path))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Write scholarships with the standard header, even when `rows` is empty.
pub fn write_scholarships(path: &Path, rows: &[Scholarship]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create CSV {:?}", path))?;

    writer.write_record(CSV_HEADERS)?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {:?}", path))?;
    }

    writer.flush()?;
    Ok(())
}

/// Count data rows, failing on anything the strict CSV reader rejects.
pub fn count_csv_rows(path: &Path) -> Result<usize> {
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to open CSV {:?}", path))?;

    let mut count = 0;
    for record in reader.records() {
        record.with_context(|| format!("Malformed CSV {:?}", path))?;
        count += 1;
    }
    Ok(count)
}

//! Thin CSV (de)serialization helpers, a small internal utility rather
//! than a subsystem of its own — just enough to round-trip
//! the record shapes in `records.rs`.

use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

pub fn read_records<T: DeserializeOwned>(path: &Path) -> crate::Result<Vec<T>> {
    if !path.exists() {
        return Err(crate::Error::IoMissing(path.display().to_string()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let mut out = Vec::new();
    for result in reader.deserialize() {
        out.push(result?);
    }
    Ok(out)
}

pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_records_with_header<T: DeserializeOwned>(path: &Path) -> crate::Result<Vec<T>> {
    if !path.exists() {
        return Err(crate::Error::IoMissing(path.display().to_string()));
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for result in reader.deserialize() {
        out.push(result?);
    }
    Ok(out)
}

pub fn write_records_with_header<T: Serialize>(path: &Path, records: &[T]) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

//! Export cached collections to a workbook or delimited-text files.
//!
//! A workbook gets one worksheet per geotype (sheet names truncated to the
//! 31-character limit); delimited text gets one `{stem}_{geotype}.{ext}`
//! file per geotype. Destination validation happens before any byte is
//! written.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use serde_json::Value;
use tracing::warn;

use crate::client::{GeoDataClient, Listing};
use crate::error::{Error, Result};
use crate::models::ObjectCollection;

/// Worksheet names are capped by the xlsx format.
const MAX_SHEET_NAME: usize = 31;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Spreadsheet workbook, one worksheet per geotype.
    Workbook,
    /// Delimited text, one file per geotype.
    DelimitedText,
}

impl ExportFormat {
    /// Infer a format from a file extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" => Some(Self::Workbook),
            "csv" => Some(Self::DelimitedText),
            _ => None,
        }
    }
}

/// Options for [`GeoDataClient::export`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Output format; inferred from the destination extension when `None`.
    pub format: Option<ExportFormat>,
    /// Overwrite existing destinations. On by default.
    pub force: bool,
    /// Geotypes to export; all known types when `None`.
    pub geotypes: Option<Vec<String>>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: None,
            force: true,
            geotypes: None,
        }
    }
}

pub(crate) fn export(client: &mut GeoDataClient, path: &Path, options: ExportOptions) -> Result<()> {
    let format = match options.format {
        Some(format) => format,
        None => path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ExportFormat::from_extension)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?,
    };

    let geotypes = match options.geotypes {
        Some(geotypes) => geotypes,
        None => client.list_geotypes()?,
    };

    // Validate every destination before writing anything.
    let targets: Vec<PathBuf> = match format {
        ExportFormat::Workbook => vec![path.to_path_buf()],
        ExportFormat::DelimitedText => geotypes
            .iter()
            .map(|geotype| delimited_target(path, geotype))
            .collect(),
    };
    if !options.force {
        if let Some(existing) = targets.iter().find(|target| target.exists()) {
            return Err(Error::DestinationExists(existing.clone()));
        }
    }

    // Load everything up front; non-tabular geotypes are skipped.
    let mut tabular: Vec<String> = Vec::new();
    for geotype in &geotypes {
        match client.list_objects(geotype)? {
            Listing::Collection(_) => tabular.push(geotype.clone()),
            Listing::Opaque(_) => warn!(geotype, "skipping non-tabular geotype"),
        }
    }

    match format {
        ExportFormat::Workbook => write_workbook(client, path, &tabular),
        ExportFormat::DelimitedText => write_delimited(client, path, &tabular),
    }
}

fn write_workbook(client: &mut GeoDataClient, path: &Path, geotypes: &[String]) -> Result<()> {
    let mut workbook = Workbook::new();
    for geotype in geotypes {
        let collection = client.collection(geotype)?;
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name(geotype))?;

        let columns = collection.column_names();
        for (col, name) in columns.iter().enumerate() {
            worksheet.write_string(0, col as u16, name)?;
        }
        for (i, record) in collection.records.iter().enumerate() {
            let row = i as u32 + 1;
            for (col, name) in columns.iter().enumerate() {
                let col = col as u16;
                if name == "geometry" {
                    if let Some(g) = &record.geometry {
                        worksheet.write_string(row, col, g.to_wkt_string())?;
                    }
                    continue;
                }
                match record.field(name) {
                    Some(Value::String(s)) => {
                        worksheet.write_string(row, col, s)?;
                    }
                    Some(Value::Number(n)) => {
                        worksheet.write_number(row, col, n.as_f64().unwrap_or(0.0))?;
                    }
                    Some(Value::Bool(b)) => {
                        worksheet.write_boolean(row, col, *b)?;
                    }
                    Some(Value::Null) | None => {}
                    Some(other) => {
                        worksheet.write_string(row, col, other.to_string())?;
                    }
                }
            }
        }
    }
    workbook.save(path)?;
    Ok(())
}

fn write_delimited(client: &mut GeoDataClient, path: &Path, geotypes: &[String]) -> Result<()> {
    for geotype in geotypes {
        let collection = client.collection(geotype)?;
        let target = delimited_target(path, geotype);
        write_csv(collection, &target)?;
    }
    Ok(())
}

fn write_csv(collection: &ObjectCollection, target: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(target)?;
    let columns = collection.column_names();
    writer.write_record(&columns)?;
    for record in &collection.records {
        let row: Vec<String> = columns
            .iter()
            .map(|name| {
                if name == "geometry" {
                    return record
                        .geometry
                        .as_ref()
                        .map(|g| g.to_wkt_string())
                        .unwrap_or_default();
                }
                match record.field(name) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                }
            })
            .collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Per-geotype destination for delimited export: `{stem}_{geotype}.{ext}`.
fn delimited_target(path: &Path, geotype: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("export");
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("csv");
    path.with_file_name(format!("{stem}_{geotype}.{extension}"))
}

/// Truncate a geotype name to a legal worksheet name.
fn sheet_name(geotype: &str) -> String {
    geotype.chars().take(MAX_SHEET_NAME).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ExportFormat::from_extension("xlsx"), Some(ExportFormat::Workbook));
        assert_eq!(ExportFormat::from_extension("XLSX"), Some(ExportFormat::Workbook));
        assert_eq!(ExportFormat::from_extension("csv"), Some(ExportFormat::DelimitedText));
        assert_eq!(ExportFormat::from_extension("parquet"), None);
    }

    #[test]
    fn test_delimited_target_naming() {
        let target = delimited_target(Path::new("/tmp/out/fis.csv"), "bridge");
        assert_eq!(target, Path::new("/tmp/out/fis_bridge.csv"));
    }

    #[test]
    fn test_sheet_name_truncated_to_31_chars() {
        let long = "averylonggeotypenamethatkeepsongoing";
        assert_eq!(sheet_name(long).chars().count(), 31);
        assert_eq!(sheet_name("bridge"), "bridge");
    }
}

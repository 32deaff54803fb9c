//! CSV export of the recorded dose history.

use crate::{Entries, Medication, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    date: String,
    medication_id: &'a str,
    medication_name: &'a str,
    dose_index: usize,
    taken: bool,
    timestamp: &'a str,
}

/// Write every recorded dose as CSV, ordered by date, medication id and dose index.
///
/// Doses of medications that have since been deleted keep an empty name.
/// Returns the number of rows written.
pub fn write_csv<W: Write>(writer: W, medications: &[Medication], entries: &Entries) -> Result<usize> {
    let names: HashMap<&str, &str> = medications
        .iter()
        .map(|m| (m.id.as_str(), m.name.as_str()))
        .collect();

    let mut writer = csv::Writer::from_writer(writer);
    let mut count = 0;
    for (date, day) in entries {
        for (medication_id, record) in day.iter() {
            for (dose_index, dose) in record.recorded() {
                writer.serialize(CsvRow {
                    date: date.format("%Y-%m-%d").to_string(),
                    medication_id,
                    medication_name: names.get(medication_id.as_str()).copied().unwrap_or(""),
                    dose_index,
                    taken: dose.taken,
                    timestamp: &dose.timestamp,
                })?;
                count += 1;
            }
        }
    }
    writer.flush()?;
    Ok(count)
}

/// Export to a file, creating parent directories and syncing to disk
pub fn export_csv(path: &Path, medications: &[Medication], entries: &Entries) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(path)?;
    let count = write_csv(&file, medications, entries)?;
    file.sync_all()?;

    tracing::info!("Exported {} doses to {:?}", count, path);
    Ok(count)
}

use std::path::PathBuf;

use harvester_core::{PlaceRecord, SessionSnapshot};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

pub const CSV_HEADERS: [&str; 12] = [
    "Name",
    "Business Type",
    "Address",
    "Phone",
    "Rating",
    "Review Count",
    "Latitude",
    "Longitude",
    "Place ID",
    "Website URL",
    "Summary",
    "Maps URL",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export")]
    Empty,
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer error: {0}")]
    Buffer(String),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub path: PathBuf,
}

/// `locations_YYYYMMDD_HHMM.csv` for the given local timestamp.
pub fn export_filename(stamp: &chrono::NaiveDateTime) -> String {
    format!("locations_{}.csv", stamp.format("%Y%m%d_%H%M"))
}

/// Completed records in collected-URL order, followed by any records whose
/// URL is no longer in the collected list.
pub fn records_in_order(snapshot: &SessionSnapshot) -> Vec<&PlaceRecord> {
    let mut ordered: Vec<&PlaceRecord> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for url in &snapshot.collected_urls {
        if let Some(record) = snapshot.record_for_url(url) {
            if !seen.contains(&record.place_id.as_str()) {
                seen.push(&record.place_id);
                ordered.push(record);
            }
        }
    }
    for (place_id, record) in &snapshot.processed_data {
        if !seen.contains(&place_id.as_str()) {
            seen.push(place_id);
            ordered.push(record);
        }
    }
    ordered
}

pub fn render_csv(records: &[&PlaceRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for record in records {
        writer.write_record(csv_row(record))?;
    }
    writer
        .into_inner()
        .map_err(|err| ExportError::Buffer(err.to_string()))
}

fn csv_row(record: &PlaceRecord) -> [String; 12] {
    let optional = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    [
        record.name.clone(),
        record.business_type.clone(),
        record.address.clone(),
        record.phone.clone(),
        optional(record.rating),
        record.review_count.to_string(),
        optional(record.coordinates.lat),
        optional(record.coordinates.lng),
        record.place_id.clone(),
        record.website.clone(),
        record.summary.clone().unwrap_or_default(),
        record.url.clone(),
    ]
}

/// Write every completed record of `snapshot` to a timestamped CSV file.
pub fn export_csv(
    snapshot: &SessionSnapshot,
    writer: &AtomicFileWriter,
    stamp: &chrono::NaiveDateTime,
) -> Result<ExportSummary, ExportError> {
    let records = records_in_order(snapshot);
    if records.is_empty() {
        return Err(ExportError::Empty);
    }
    let bytes = render_csv(&records)?;
    let path = writer.write(&export_filename(stamp), &bytes)?;
    Ok(ExportSummary {
        rows: records.len(),
        path,
    })
}

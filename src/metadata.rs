//! Loader for the table of human assigned night classifications.

use crate::errors::SodarDataErr;
use chrono::NaiveDate;
use std::path::Path;

/// One human labeled night from the classification table.
///
/// Records are immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRecord {
    /// The calendar date of the night.
    pub date: NaiveDate,
    /// Mesoscale forcing was present.
    pub mesoscale_forcing: bool,
    /// The direction criterion was met.
    pub direction: bool,
    /// A valley jet was present.
    pub valley_jet: bool,
    /// Pulsing was present.
    pub pulsing: bool,
    /// The similarity criterion was met.
    pub similar: bool,
}

const FLAG_COLUMNS: [&str; 5] = [
    "mesoscale_forcing",
    "direction",
    "valley_jet",
    "pulsing",
    "similar",
];

/// Read the classification table into an ordered sequence of records.
///
/// The file must carry a header row naming `year`, `month`, `day`, and the
/// five flag columns; extra columns are ignored. A flag cell is coerced to
/// `true` unless it is the empty string, so a cell holding the text "False"
/// loads as `true`. Any malformed row fails the whole load; no partial
/// sequence is ever returned.
pub fn read_classification_data(
    path: &dyn AsRef<Path>,
) -> Result<Vec<ClassificationRecord>, SodarDataErr> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;

    let headers = reader.headers()?.clone();
    let year_col = column(&headers, "year")?;
    let month_col = column(&headers, "month")?;
    let day_col = column(&headers, "day")?;

    let mut flag_cols = [0usize; 5];
    for (idx, name) in FLAG_COLUMNS.iter().enumerate() {
        flag_cols[idx] = column(&headers, name)?;
    }

    let mut records = vec![];
    for (row_num, row) in reader.records().enumerate() {
        let row = row?;

        let year: i32 = date_part(&row, year_col, "year", row_num)?;
        let month: u32 = date_part(&row, month_col, "month", row_num)?;
        let day: u32 = date_part(&row, day_col, "day", row_num)?;

        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            SodarDataErr::MetadataFormat(format!(
                "row {}: {}-{}-{} is not a calendar date",
                row_num + 1,
                year,
                month,
                day
            ))
        })?;

        records.push(ClassificationRecord {
            date,
            mesoscale_forcing: flag(&row, flag_cols[0]),
            direction: flag(&row, flag_cols[1]),
            valley_jet: flag(&row, flag_cols[2]),
            pulsing: flag(&row, flag_cols[3]),
            similar: flag(&row, flag_cols[4]),
        });
    }

    Ok(records)
}

fn column(headers: &csv::StringRecord, name: &str) -> Result<usize, SodarDataErr> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| SodarDataErr::MetadataFormat(format!("missing required column '{}'", name)))
}

fn date_part<T>(
    row: &csv::StringRecord,
    col: usize,
    name: &str,
    row_num: usize,
) -> Result<T, SodarDataErr>
where
    T: std::str::FromStr,
{
    let cell = row.get(col).unwrap_or("");
    cell.trim().parse().map_err(|_| {
        SodarDataErr::MetadataFormat(format!(
            "row {}: {} is not a number: '{}'",
            row_num + 1,
            name,
            cell
        ))
    })
}

// The coercion the curated table relies on: any non empty cell marks the
// flag as set, whatever its text says.
fn flag(row: &csv::StringRecord, col: usize) -> bool {
    !row.get(col).unwrap_or("").is_empty()
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/

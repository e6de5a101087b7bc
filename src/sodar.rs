//! Interface to the raw per-station sodar archives.
//!
//! Turning raw instrument files into night-indexed arrays happens outside
//! this crate. The pipeline only consumes the capability below, so a station
//! collection can be built from any reader that can answer "all nights for
//! one quantity, keyed by name".

use crate::{errors::SodarDataErr, station::Quantity};
use chrono::NaiveDate;
use ndarray::Array2;
use std::path::Path;

/// Per-night metadata reported by a raw archive reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightMeta {
    /// Short textual night identifier derived from the night's date.
    pub name: String,
}

/// A reader for a station's raw sodar archive.
pub trait SodarArchive {
    /// Fetch all available nights for one quantity.
    ///
    /// Returns an ordered sequence of time by height arrays and a parallel
    /// sequence of per-night metadata used to key the nights by date. An
    /// unreadable archive is an [`SodarDataErr::ArchiveUnavailable`] error,
    /// never an empty result.
    fn night_arrays(
        &self,
        root: &Path,
        quantity: Quantity,
    ) -> Result<(Vec<Array2<f64>>, Vec<NightMeta>), SodarDataErr>;
}

/// The name key a raw archive derives from a night's date.
pub fn night_name(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

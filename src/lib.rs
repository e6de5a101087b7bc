#![deny(missing_docs)]
//! Package to manage cached archives of sodar wind profiler nights and their
//! classification.
//!
//! Nightly recordings from the two ground stations are indexed by date into a
//! per-station store, paired across stations, joined with the human-curated
//! classification table, and persisted so later analysis never re-scans the
//! raw archives. Store files are trusted as long as they exist; rebuilding
//! them is an explicit request, never an automatic diff against the raw data.

//
// Public API
//
pub use crate::classification::{build_or_load, BuildOptions};
pub use crate::codec::{decode, decode_2d, encode};
pub use crate::collection::{MissReason, NightCollection, NightLookup, StationNight};
pub use crate::errors::SodarDataErr;
pub use crate::metadata::{read_classification_data, ClassificationRecord};
pub use crate::pairing::{pair_nights, PairOutcome, PairedNight};
pub use crate::sodar::{night_name, NightMeta, SodarArchive};
pub use crate::station::{Quantity, Station};

//
// Implementation only
//
mod classification;
mod codec;
mod collection;
mod errors;
mod metadata;
mod pairing;
mod sodar;
mod station;

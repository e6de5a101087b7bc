//! Module for errors.
use crate::station::Station;
use std::{error::Error, fmt::Display};

/// Error from the classification pipeline.
#[derive(Debug)]
pub enum SodarDataErr {
    // Inherited errors from std
    /// Error forwarded from std
    IO(::std::io::Error),

    // Other forwarded errors
    /// Database error
    Database(::rusqlite::Error),
    /// Error forwarded from the csv crate
    Csv(::csv::Error),

    // My own errors from this crate
    /// A required station directory is absent.
    MissingStationDirectory(Station),
    /// The classification metadata table could not be loaded.
    MetadataFormat(String),
    /// The raw sodar archive could not be read.
    ArchiveUnavailable(String),
    /// A stored record could not be decoded.
    CorruptRecord(String),
}

impl Display for SodarDataErr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        use crate::errors::SodarDataErr::*;

        match self {
            IO(err) => write!(f, "std lib io error: {}", err),

            Database(err) => write!(f, "database error: {}", err),
            Csv(err) => write!(f, "error forwarded from csv crate: {}", err),

            MissingStationDirectory(station) => {
                write!(f, "missing the {} station directory", station)
            }
            MetadataFormat(msg) => write!(f, "malformed classification metadata: {}", msg),
            ArchiveUnavailable(msg) => write!(f, "raw sodar archive unavailable: {}", msg),
            CorruptRecord(msg) => write!(f, "corrupt store record: {}", msg),
        }
    }
}

impl Error for SodarDataErr {}

impl From<::std::io::Error> for SodarDataErr {
    fn from(err: ::std::io::Error) -> SodarDataErr {
        SodarDataErr::IO(err)
    }
}

impl From<::rusqlite::Error> for SodarDataErr {
    fn from(err: ::rusqlite::Error) -> SodarDataErr {
        SodarDataErr::Database(err)
    }
}

impl From<::csv::Error> for SodarDataErr {
    fn from(err: ::csv::Error) -> SodarDataErr {
        SodarDataErr::Csv(err)
    }
}

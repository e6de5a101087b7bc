//! The top level classification store and the pipeline that fills it.
//!
//! While `<root>/classification.db` exists its rows are the answer; the
//! metadata table, the station stores, and the raw archives are not even
//! consulted. A build only touches the raw archives when neither cache tier
//! exists, so once the classification store is written station staleness is
//! unobservable through this interface. The force-rebuild option is the one
//! way back to the raw data.

use crate::{
    codec::{decode_2d, encode},
    collection::{NightCollection, NightLookup, StationNight},
    errors::SodarDataErr,
    metadata::{read_classification_data, ClassificationRecord},
    pairing::{pair_nights, PairOutcome, PairedNight},
    sodar::SodarArchive,
    station::Station,
};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

const DB_FILE: &str = "classification.db";

/// Options controlling a classification build.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Discard the classification store and both station stores first, so
    /// the build reads the raw archives end to end.
    pub force_rebuild: bool,
}

/// Build the paired night classification for an archive root, or load it
/// from the store a previous build left behind.
///
/// `root` must contain a `McRae` and a `Primet` subdirectory holding the
/// stations' archives; a missing one is a
/// [`SodarDataErr::MissingStationDirectory`] before anything is written.
/// The store is written only after the whole join is assembled in memory, so
/// a failed build never leaves a partially filled classification store.
pub fn build_or_load(
    archive: &dyn SodarArchive,
    root: &dyn AsRef<Path>,
    metadata_path: &dyn AsRef<Path>,
    options: BuildOptions,
) -> Result<Vec<PairedNight>, SodarDataErr> {
    let mcrae_dir = station_dir(root, Station::McRae)?;
    let primet_dir = station_dir(root, Station::Primet)?;

    let db_file = root.as_ref().join(DB_FILE);

    if options.force_rebuild && db_file.exists() {
        log::info!("removing {} for a forced rebuild", db_file.display());
        std::fs::remove_file(&db_file)?;
    }

    if db_file.exists() {
        log::info!("loading the classification from {}", db_file.display());

        let store = ClassificationStore::connect(&db_file)?;
        return store.all_nights();
    }

    log::info!(
        "building the classification for {}",
        root.as_ref().display()
    );

    let meta = read_classification_data(metadata_path)?;
    let requested: Vec<NaiveDate> = meta.iter().map(|record| record.date).collect();

    let mcrae = station_nights(archive, &mcrae_dir, Station::McRae, &requested, options)?;
    let primet = station_nights(archive, &primet_dir, Station::Primet, &requested, options)?;

    let mut paired = Vec::with_capacity(mcrae.len());
    for outcome in pair_nights(&mcrae, &primet, &meta) {
        match outcome {
            PairOutcome::Paired(night) => paired.push(night),
            PairOutcome::NoPartner(date) => {
                log::warn!("no Primet night to pair with the McRae night of {}", date)
            }
            PairOutcome::NoClassification(date) => {
                log::warn!("no classification row for the paired night of {}", date)
            }
        }
    }

    let store = ClassificationStore::create(&db_file)?;
    store.store_nights(&paired)?;

    Ok(paired)
}

fn station_dir(root: &dyn AsRef<Path>, station: Station) -> Result<PathBuf, SodarDataErr> {
    let dir = root.as_ref().join(station.as_static_str());

    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(SodarDataErr::MissingStationDirectory(station))
    }
}

fn station_nights(
    archive: &dyn SodarArchive,
    station_dir: &Path,
    station: Station,
    requested: &[NaiveDate],
    options: BuildOptions,
) -> Result<Vec<StationNight>, SodarDataErr> {
    let lookups = NightCollection::load_or_build(
        archive,
        &station_dir,
        station,
        requested,
        options.force_rebuild,
    )?;

    let mut nights = Vec::with_capacity(lookups.len());
    for lookup in lookups {
        match lookup {
            NightLookup::Found(night) => nights.push(night),
            NightLookup::Missing { date, reason } => {
                log::warn!("the {} archive has no night for {}: {}", station, date, reason)
            }
        }
    }

    Ok(nights)
}

// The persistent table of paired, labeled nights.
struct ClassificationStore {
    db_conn: rusqlite::Connection,
}

impl ClassificationStore {
    fn create(db_file: &Path) -> Result<Self, SodarDataErr> {
        let db_conn = rusqlite::Connection::open_with_flags(
            db_file,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE | rusqlite::OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        db_conn.execute_batch(include_str!("classification/create_classification.sql"))?;

        Ok(ClassificationStore { db_conn })
    }

    fn connect(db_file: &Path) -> Result<Self, SodarDataErr> {
        let db_conn = rusqlite::Connection::open_with_flags(
            db_file,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE,
        )?;

        Self::validate_db_structure(&db_conn)?;

        Ok(ClassificationStore { db_conn })
    }

    /// Validate the database structure is correct.
    fn validate_db_structure(db_conn: &rusqlite::Connection) -> Result<(), SodarDataErr> {
        let num_tables: i64 = db_conn.query_row(
            "SELECT COUNT(name) FROM sqlite_master WHERE type='table'",
            rusqlite::NO_PARAMS,
            |row| row.get(0),
        )?;

        if num_tables != 1 {
            return Err(SodarDataErr::CorruptRecord(
                "classification store does not hold exactly the night table".to_owned(),
            ));
        }

        let mut stmt =
            db_conn.prepare("SELECT name FROM pragma_table_info('night') ORDER BY cid")?;

        let columns: Result<Vec<String>, rusqlite::Error> = stmt
            .query_map(rusqlite::NO_PARAMS, |row| row.get(0))?
            .collect();
        let columns = columns?;

        if columns
            != [
                "id",
                "timestamp",
                "primet_speeds",
                "primet_directions",
                "mcrae_speeds",
                "mcrae_directions",
                "mesoscale_forcing",
                "direction",
                "valley_jet",
                "pulsing",
                "similar",
            ]
        {
            return Err(SodarDataErr::CorruptRecord(format!(
                "classification store has unexpected night columns: {:?}",
                columns
            )));
        }

        Ok(())
    }

    fn all_nights(&self) -> Result<Vec<PairedNight>, SodarDataErr> {
        let mut stmt = self.db_conn.prepare(
            "
                SELECT
                    timestamp,
                    primet_speeds,
                    primet_directions,
                    mcrae_speeds,
                    mcrae_directions,
                    mesoscale_forcing,
                    direction,
                    valley_jet,
                    pulsing,
                    similar
                FROM night ORDER BY id
            ",
        )?;

        let nights: Result<Vec<PairedNight>, SodarDataErr> = stmt
            .query_and_then(rusqlite::NO_PARAMS, Self::parse_row_to_night)?
            .collect();

        nights
    }

    fn parse_row_to_night(row: &rusqlite::Row) -> Result<PairedNight, SodarDataErr> {
        let date: NaiveDate = row.get(0)?;
        let primet_speeds: Vec<u8> = row.get(1)?;
        let primet_directions: Vec<u8> = row.get(2)?;
        let mcrae_speeds: Vec<u8> = row.get(3)?;
        let mcrae_directions: Vec<u8> = row.get(4)?;

        Ok(PairedNight {
            date,
            primet_speeds: decode_2d(&primet_speeds)?,
            primet_directions: decode_2d(&primet_directions)?,
            mcrae_speeds: decode_2d(&mcrae_speeds)?,
            mcrae_directions: decode_2d(&mcrae_directions)?,
            meta: ClassificationRecord {
                date,
                mesoscale_forcing: row.get(5)?,
                direction: row.get(6)?,
                valley_jet: row.get(7)?,
                pulsing: row.get(8)?,
                similar: row.get(9)?,
            },
        })
    }

    fn store_nights(&self, nights: &[PairedNight]) -> Result<(), SodarDataErr> {
        self.db_conn
            .execute("BEGIN TRANSACTION", rusqlite::NO_PARAMS)?;

        {
            let mut stmt = self.db_conn.prepare(
                "
                    INSERT INTO night (
                        timestamp,
                        primet_speeds, primet_directions,
                        mcrae_speeds, mcrae_directions,
                        mesoscale_forcing, direction, valley_jet, pulsing, similar)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ",
            )?;

            for night in nights {
                stmt.execute(&[
                    &night.date as &dyn rusqlite::types::ToSql,
                    &encode(&night.primet_speeds)? as &dyn rusqlite::types::ToSql,
                    &encode(&night.primet_directions)? as &dyn rusqlite::types::ToSql,
                    &encode(&night.mcrae_speeds)? as &dyn rusqlite::types::ToSql,
                    &encode(&night.mcrae_directions)? as &dyn rusqlite::types::ToSql,
                    &night.meta.mesoscale_forcing,
                    &night.meta.direction,
                    &night.meta.valley_jet,
                    &night.meta.pulsing,
                    &night.meta.similar,
                ])?;
            }
        }

        self.db_conn
            .execute("COMMIT TRANSACTION", rusqlite::NO_PARAMS)?;

        Ok(())
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/

//! The per-station store of night indexed measurement arrays.
//!
//! The first build indexes the raw archive once and persists every found
//! night to `<station dir>/collection.db`. From then on the store file is
//! the whole truth: while it exists it is loaded as-is and the raw archive
//! is never consulted. Staleness is the caller's concern, handled through
//! the force-rebuild gate and nothing else.

use crate::{
    codec::{decode_2d, encode},
    errors::SodarDataErr,
    sodar::{night_name, SodarArchive},
    station::{Quantity, Station},
};
use chrono::NaiveDate;
use ndarray::Array2;
use std::{fmt, path::Path};

/// One station's measurements for one night.
#[derive(Debug, Clone, PartialEq)]
pub struct StationNight {
    /// The calendar date identifying the night.
    pub date: NaiveDate,
    /// Wind speeds, time steps by height bins.
    pub speeds: Array2<f64>,
    /// Wind directions in degrees, same shape as the speeds, with `-1.0`
    /// meaning no data.
    pub directions: Array2<f64>,
}

/// Why a requested night could not be assembled from the raw archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// The raw archive has no speed night under the requested date's name key.
    NoSpeedNight,
    /// The raw archive has no direction night under the requested date's name key.
    NoDirectionNight,
    /// The speed and direction arrays found for the night disagree on shape.
    ShapeMismatch,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use MissReason::*;

        match self {
            NoSpeedNight => write!(f, "no speed night in the raw archive"),
            NoDirectionNight => write!(f, "no direction night in the raw archive"),
            ShapeMismatch => write!(f, "speed and direction arrays disagree on shape"),
        }
    }
}

/// The outcome of locating one requested night.
///
/// Misses are values, not errors. The caller decides whether to collect or
/// discard them.
#[derive(Debug, Clone, PartialEq)]
pub enum NightLookup {
    /// The night was assembled from the raw archive, or loaded from the store.
    Found(StationNight),
    /// The night could not be assembled.
    Missing {
        /// The requested date.
        date: NaiveDate,
        /// What kept the night from being assembled.
        reason: MissReason,
    },
}

/// A station's persistent collection of nights.
#[derive(Debug)]
pub struct NightCollection {
    db_conn: rusqlite::Connection,
}

impl NightCollection {
    const DB_FILE: &'static str = "collection.db";

    /// Load a station's nights from its store, building the store from the
    /// raw archive first if there is none.
    ///
    /// An existing store is returned as-is, every row a
    /// [`NightLookup::Found`], without touching the raw archive. Otherwise
    /// the archive is asked for all speed and direction nights, the
    /// `requested` dates are located among them by name key, the found
    /// nights are persisted, and the full list of per-date outcomes is
    /// returned. `force_rebuild` removes an existing store first.
    pub fn load_or_build(
        archive: &dyn SodarArchive,
        station_dir: &dyn AsRef<Path>,
        station: Station,
        requested: &[NaiveDate],
        force_rebuild: bool,
    ) -> Result<Vec<NightLookup>, SodarDataErr> {
        let db_file = station_dir.as_ref().join(NightCollection::DB_FILE);

        if force_rebuild && db_file.exists() {
            log::info!(
                "removing the {} station store for a forced rebuild",
                station
            );
            std::fs::remove_file(&db_file)?;
        }

        if db_file.exists() {
            log::info!("loading {} nights from {}", station, db_file.display());

            let collection = NightCollection::connect(&db_file)?;
            let nights = collection.all_nights()?;

            Ok(nights.into_iter().map(NightLookup::Found).collect())
        } else {
            log::info!(
                "indexing the raw {} archive at {}",
                station,
                station_dir.as_ref().display()
            );

            let lookups = NightCollection::index_archive(archive, station_dir.as_ref(), requested)?;

            let collection = NightCollection::create(&db_file)?;
            collection.store_nights(lookups.iter().filter_map(|lookup| match lookup {
                NightLookup::Found(night) => Some(night),
                NightLookup::Missing { .. } => None,
            }))?;

            Ok(lookups)
        }
    }

    fn index_archive(
        archive: &dyn SodarArchive,
        root: &Path,
        requested: &[NaiveDate],
    ) -> Result<Vec<NightLookup>, SodarDataErr> {
        let (speeds, speed_meta) = archive.night_arrays(root, Quantity::Speed)?;
        let (directions, direction_meta) = archive.night_arrays(root, Quantity::Direction)?;

        let mut lookups = Vec::with_capacity(requested.len());
        for &date in requested {
            let key = night_name(date);
            let speed_idx = speed_meta.iter().position(|meta| meta.name == key);
            let direction_idx = direction_meta.iter().position(|meta| meta.name == key);

            let lookup = match (speed_idx, direction_idx) {
                (None, _) => NightLookup::Missing {
                    date,
                    reason: MissReason::NoSpeedNight,
                },
                (_, None) => NightLookup::Missing {
                    date,
                    reason: MissReason::NoDirectionNight,
                },
                (Some(speed_idx), Some(direction_idx)) => {
                    let speeds = &speeds[speed_idx];
                    let directions = &directions[direction_idx];

                    if speeds.dim() == directions.dim() {
                        NightLookup::Found(StationNight {
                            date,
                            speeds: speeds.clone(),
                            directions: directions.clone(),
                        })
                    } else {
                        NightLookup::Missing {
                            date,
                            reason: MissReason::ShapeMismatch,
                        }
                    }
                }
            };

            lookups.push(lookup);
        }

        Ok(lookups)
    }

    fn create(db_file: &Path) -> Result<Self, SodarDataErr> {
        let db_conn = rusqlite::Connection::open_with_flags(
            db_file,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE | rusqlite::OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        db_conn.execute_batch(include_str!("collection/create_collection.sql"))?;

        Ok(NightCollection { db_conn })
    }

    fn connect(db_file: &Path) -> Result<Self, SodarDataErr> {
        let db_conn = rusqlite::Connection::open_with_flags(
            db_file,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE,
        )?;

        Self::validate_db_structure(&db_conn)?;

        Ok(NightCollection { db_conn })
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
                "station store does not hold exactly the night table".to_owned(),
            ));
        }

        let mut stmt =
            db_conn.prepare("SELECT name FROM pragma_table_info('night') ORDER BY cid")?;

        let columns: Result<Vec<String>, rusqlite::Error> = stmt
            .query_map(rusqlite::NO_PARAMS, |row| row.get(0))?
            .collect();
        let columns = columns?;

        if columns != ["id", "timestamp", "speeds", "directions"] {
            return Err(SodarDataErr::CorruptRecord(format!(
                "station store has unexpected night columns: {:?}",
                columns
            )));
        }

        Ok(())
    }

    fn all_nights(&self) -> Result<Vec<StationNight>, SodarDataErr> {
        let mut stmt = self
            .db_conn
            .prepare("SELECT timestamp, speeds, directions FROM night ORDER BY id")?;

        let nights: Result<Vec<StationNight>, SodarDataErr> = stmt
            .query_and_then(rusqlite::NO_PARAMS, |row| {
                let date: NaiveDate = row.get(0)?;
                let speeds: Vec<u8> = row.get(1)?;
                let directions: Vec<u8> = row.get(2)?;

                Ok(StationNight {
                    date,
                    speeds: decode_2d(&speeds)?,
                    directions: decode_2d(&directions)?,
                })
            })?
            .collect();

        nights
    }

    fn store_nights<'a, I>(&self, nights: I) -> Result<(), SodarDataErr>
    where
        I: Iterator<Item = &'a StationNight>,
    {
        self.db_conn
            .execute("BEGIN TRANSACTION", rusqlite::NO_PARAMS)?;

        {
            let mut stmt = self
                .db_conn
                .prepare("INSERT INTO night (timestamp, speeds, directions) VALUES (?1, ?2, ?3)")?;

            for night in nights {
                stmt.execute(&[
                    &night.date as &dyn rusqlite::types::ToSql,
                    &encode(&night.speeds)? as &dyn rusqlite::types::ToSql,
                    &encode(&night.directions)? as &dyn rusqlite::types::ToSql,
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
#[cfg(test)]
mod unit {
    use super::*;
    use crate::sodar::NightMeta;

    use std::cell::Cell;

    use ndarray::arr2;
    use tempdir::TempDir;

    // A synthetic in-memory archive that counts how often it is read.
    struct TestSodars {
        speed_nights: Vec<(String, Array2<f64>)>,
        direction_nights: Vec<(String, Array2<f64>)>,
        reads: Cell<usize>,
    }

    impl TestSodars {
        fn new(nights: &[(NaiveDate, Array2<f64>, Array2<f64>)]) -> Self {
            TestSodars {
                speed_nights: nights
                    .iter()
                    .map(|(date, speeds, _)| (night_name(*date), speeds.clone()))
                    .collect(),
                direction_nights: nights
                    .iter()
                    .map(|(date, _, directions)| (night_name(*date), directions.clone()))
                    .collect(),
                reads: Cell::new(0),
            }
        }
    }

    impl SodarArchive for TestSodars {
        fn night_arrays(
            &self,
            _root: &Path,
            quantity: Quantity,
        ) -> Result<(Vec<Array2<f64>>, Vec<NightMeta>), SodarDataErr> {
            self.reads.set(self.reads.get() + 1);

            let nights = match quantity {
                Quantity::Speed => &self.speed_nights,
                Quantity::Direction => &self.direction_nights,
            };

            let arrays = nights.iter().map(|(_, array)| array.clone()).collect();
            let meta = nights
                .iter()
                .map(|(name, _)| NightMeta { name: name.clone() })
                .collect();

            Ok((arrays, meta))
        }
    }

    // An archive that must not be consulted.
    struct UnavailableSodars;

    impl SodarArchive for UnavailableSodars {
        fn night_arrays(
            &self,
            _root: &Path,
            _quantity: Quantity,
        ) -> Result<(Vec<Array2<f64>>, Vec<NightMeta>), SodarDataErr> {
            Err(SodarDataErr::ArchiveUnavailable(
                "the store should have answered this".to_owned(),
            ))
        }
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn grid(seed: f64) -> Array2<f64> {
        arr2(&[[seed, seed + 0.5, -1.0], [seed + 1.0, -1.0, 359.9]])
    }

    #[test]
    fn test_build_persists_found_nights() {
        let tmp = TempDir::new("sodar-data-test-collection").expect("Failed to make temp dir.");
        let d1 = date(2013, 7, 1);
        let d2 = date(2013, 7, 2);
        let missing = date(2013, 7, 9);

        let sodars = TestSodars::new(&[
            (d1, grid(1.0), grid(10.0)),
            (d2, grid(2.0), grid(20.0)),
        ]);

        let lookups = NightCollection::load_or_build(
            &sodars,
            &tmp.path(),
            Station::McRae,
            &[d1, d2, missing],
            false,
        )
        .expect("Failed to build collection.");

        assert_eq!(lookups.len(), 3);
        match &lookups[0] {
            NightLookup::Found(night) => {
                assert_eq!(night.date, d1);
                assert_eq!(night.speeds, grid(1.0));
                assert_eq!(night.directions, grid(10.0));
            }
            _ => panic!("expected the first requested date to be found"),
        }
        assert_eq!(
            lookups[2],
            NightLookup::Missing {
                date: missing,
                reason: MissReason::NoSpeedNight
            }
        );

        assert!(tmp.path().join("collection.db").exists());
    }

    #[test]
    fn test_store_load_skips_archive() {
        let tmp = TempDir::new("sodar-data-test-collection").expect("Failed to make temp dir.");
        let d1 = date(2013, 7, 1);
        let d2 = date(2013, 7, 2);

        let sodars = TestSodars::new(&[
            (d1, grid(1.0), grid(10.0)),
            (d2, grid(2.0), grid(20.0)),
        ]);

        NightCollection::load_or_build(&sodars, &tmp.path(), Station::Primet, &[d2, d1], false)
            .expect("Failed to build collection.");
        assert_eq!(sodars.reads.get(), 2);

        // The store answers now. The raw archive is never consulted, so an
        // unavailable one does not matter.
        let reloaded = NightCollection::load_or_build(
            &UnavailableSodars,
            &tmp.path(),
            Station::Primet,
            &[d2, d1],
            false,
        )
        .expect("Failed to load collection from the store.");

        // Insertion order is the returned order.
        assert_eq!(
            reloaded,
            vec![
                NightLookup::Found(StationNight {
                    date: d2,
                    speeds: grid(2.0),
                    directions: grid(20.0),
                }),
                NightLookup::Found(StationNight {
                    date: d1,
                    speeds: grid(1.0),
                    directions: grid(10.0),
                }),
            ]
        );
    }

    #[test]
    fn test_miss_reasons() {
        let tmp = TempDir::new("sodar-data-test-collection").expect("Failed to make temp dir.");
        let speed_only = date(2013, 7, 1);
        let direction_only = date(2013, 7, 2);
        let lopsided = date(2013, 7, 3);

        let mut sodars = TestSodars::new(&[(lopsided, grid(3.0), grid(30.0))]);
        sodars
            .speed_nights
            .push((night_name(speed_only), grid(1.0)));
        sodars
            .direction_nights
            .push((night_name(direction_only), grid(10.0)));
        // Give the lopsided night a direction array of another shape.
        sodars.direction_nights[0].1 = arr2(&[[1.0, 2.0], [3.0, 4.0]]);

        let lookups = NightCollection::load_or_build(
            &sodars,
            &tmp.path(),
            Station::McRae,
            &[speed_only, direction_only, lopsided],
            false,
        )
        .expect("Failed to build collection.");

        assert_eq!(
            lookups,
            vec![
                NightLookup::Missing {
                    date: speed_only,
                    reason: MissReason::NoDirectionNight
                },
                NightLookup::Missing {
                    date: direction_only,
                    reason: MissReason::NoSpeedNight
                },
                NightLookup::Missing {
                    date: lopsided,
                    reason: MissReason::ShapeMismatch
                },
            ]
        );
    }

    #[test]
    fn test_force_rebuild_consults_archive() {
        let tmp = TempDir::new("sodar-data-test-collection").expect("Failed to make temp dir.");
        let d1 = date(2013, 7, 1);

        let sodars = TestSodars::new(&[(d1, grid(1.0), grid(10.0))]);
        NightCollection::load_or_build(&sodars, &tmp.path(), Station::McRae, &[d1], false)
            .expect("Failed to build collection.");

        let changed = TestSodars::new(&[(d1, grid(7.0), grid(70.0))]);
        let lookups =
            NightCollection::load_or_build(&changed, &tmp.path(), Station::McRae, &[d1], true)
                .expect("Failed to force rebuild collection.");

        assert_eq!(changed.reads.get(), 2);
        assert_eq!(
            lookups,
            vec![NightLookup::Found(StationNight {
                date: d1,
                speeds: grid(7.0),
                directions: grid(70.0),
            })]
        );
    }

    #[test]
    fn test_archive_failure_surfaces() {
        let tmp = TempDir::new("sodar-data-test-collection").expect("Failed to make temp dir.");

        let result = NightCollection::load_or_build(
            &UnavailableSodars,
            &tmp.path(),
            Station::McRae,
            &[date(2013, 7, 1)],
            false,
        );

        assert!(matches!(
            result,
            Err(SodarDataErr::ArchiveUnavailable(_))
        ));
    }

    #[test]
    fn test_wrong_schema_is_a_corrupt_record() {
        let tmp = TempDir::new("sodar-data-test-collection").expect("Failed to make temp dir.");
        let db_file = tmp.path().join("collection.db");

        let db_conn = rusqlite::Connection::open(&db_file).expect("Failed to open db.");
        db_conn
            .execute_batch("CREATE TABLE sounding (id INTEGER PRIMARY KEY, data BLOB);")
            .expect("Failed to create table.");
        drop(db_conn);

        let result = NightCollection::load_or_build(
            &UnavailableSodars,
            &tmp.path(),
            Station::McRae,
            &[],
            false,
        );

        assert!(matches!(result, Err(SodarDataErr::CorruptRecord(_))));
    }
}

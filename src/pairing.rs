//! Pairing the two stations' nights and joining them with the
//! classification table.

use crate::{collection::StationNight, metadata::ClassificationRecord};
use chrono::NaiveDate;
use ndarray::Array2;

/// One night paired across both stations and joined with its classification.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedNight {
    /// The calendar date shared by both station records.
    pub date: NaiveDate,
    /// Primet wind speeds.
    pub primet_speeds: Array2<f64>,
    /// Primet wind directions.
    pub primet_directions: Array2<f64>,
    /// McRae wind speeds.
    pub mcrae_speeds: Array2<f64>,
    /// McRae wind directions.
    pub mcrae_directions: Array2<f64>,
    /// The classification assigned to this night.
    pub meta: ClassificationRecord,
}

/// The outcome of attempting to pair one McRae night.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    /// Both stations and the classification table cover the date.
    Paired(PairedNight),
    /// No Primet night shares the McRae night's date.
    NoPartner(NaiveDate),
    /// Both stations cover the date but the classification table does not.
    NoClassification(NaiveDate),
}

/// Join the two stations' nights with the classification table by date.
///
/// For each McRae night in order, the first Primet night with an equal date
/// and then the first classification record with an equal date are taken.
/// A McRae night without a Primet partner or without a classification row
/// yields the matching non-paired outcome instead of disappearing. Each
/// station contributes its own speed and direction arrays.
///
/// The scan is O(n*m), which is fine for the tens of nights a field season
/// produces, and the first-match rule means the output order and any
/// tie-breaking follow the input order exactly.
pub fn pair_nights(
    mcrae: &[StationNight],
    primet: &[StationNight],
    meta: &[ClassificationRecord],
) -> Vec<PairOutcome> {
    mcrae
        .iter()
        .map(|mcrae_night| {
            let partner = match primet.iter().find(|p| p.date == mcrae_night.date) {
                Some(partner) => partner,
                None => return PairOutcome::NoPartner(mcrae_night.date),
            };

            let record = match meta.iter().find(|record| record.date == mcrae_night.date) {
                Some(record) => record,
                None => return PairOutcome::NoClassification(mcrae_night.date),
            };

            PairOutcome::Paired(PairedNight {
                date: mcrae_night.date,
                primet_speeds: partner.speeds.clone(),
                primet_directions: partner.directions.clone(),
                mcrae_speeds: mcrae_night.speeds.clone(),
                mcrae_directions: mcrae_night.directions.clone(),
                meta: record.clone(),
            })
        })
        .collect()
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
#[cfg(test)]
mod unit {
    use super::*;

    use ndarray::arr2;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn grid(seed: f64) -> Array2<f64> {
        arr2(&[[seed, seed + 0.5], [-1.0, seed + 1.0]])
    }

    fn night(date: NaiveDate, seed: f64) -> StationNight {
        StationNight {
            date,
            speeds: grid(seed),
            directions: grid(seed + 100.0),
        }
    }

    fn record(date: NaiveDate, pulsing: bool) -> ClassificationRecord {
        ClassificationRecord {
            date,
            mesoscale_forcing: true,
            direction: false,
            valley_jet: false,
            pulsing,
            similar: true,
        }
    }

    #[test]
    fn test_join_covers_exactly_the_classified_dates() {
        let d1 = date(2013, 7, 1);
        let d2 = date(2013, 7, 2);
        let d3 = date(2013, 7, 3);

        let mcrae = vec![night(d1, 1.0), night(d2, 2.0), night(d3, 3.0)];
        let primet = vec![night(d1, 11.0), night(d2, 12.0), night(d3, 13.0)];
        let meta = vec![record(d1, true), record(d2, false)];

        let outcomes = pair_nights(&mcrae, &primet, &meta);

        assert_eq!(outcomes.len(), 3);

        let paired: Vec<&PairedNight> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                PairOutcome::Paired(night) => Some(night),
                _ => None,
            })
            .collect();

        assert_eq!(paired.len(), 2);
        assert_eq!(paired[0].date, d1);
        assert_eq!(paired[1].date, d2);
        assert!(paired[0].meta.pulsing);
        assert!(!paired[1].meta.pulsing);

        assert_eq!(outcomes[2], PairOutcome::NoClassification(d3));
    }

    #[test]
    fn test_each_station_contributes_its_own_arrays() {
        let d1 = date(2013, 7, 1);

        let outcomes = pair_nights(&[night(d1, 1.0)], &[night(d1, 11.0)], &[record(d1, true)]);

        match &outcomes[0] {
            PairOutcome::Paired(paired) => {
                assert_eq!(paired.mcrae_speeds, grid(1.0));
                assert_eq!(paired.mcrae_directions, grid(101.0));
                assert_eq!(paired.primet_speeds, grid(11.0));
                assert_eq!(paired.primet_directions, grid(111.0));
            }
            _ => panic!("expected the night to pair"),
        }
    }

    #[test]
    fn test_missing_partner_is_reported_not_paired() {
        let d1 = date(2013, 7, 1);
        let d3 = date(2013, 7, 3);

        let mcrae = vec![night(d1, 1.0), night(d3, 3.0)];
        let primet = vec![night(d1, 11.0)];
        let meta = vec![record(d1, true), record(d3, true)];

        let outcomes = pair_nights(&mcrae, &primet, &meta);

        assert!(matches!(outcomes[0], PairOutcome::Paired(_)));
        assert_eq!(outcomes[1], PairOutcome::NoPartner(d3));
    }

    #[test]
    fn test_first_match_wins_on_duplicates() {
        let d1 = date(2013, 7, 1);

        let primet = vec![night(d1, 11.0), night(d1, 12.0)];
        let meta = vec![record(d1, true), record(d1, false)];

        let outcomes = pair_nights(&[night(d1, 1.0)], &primet, &meta);

        match &outcomes[0] {
            PairOutcome::Paired(paired) => {
                assert_eq!(paired.primet_speeds, grid(11.0));
                assert!(paired.meta.pulsing);
            }
            _ => panic!("expected the night to pair"),
        }
    }

    #[test]
    fn test_no_mcrae_nights_no_output() {
        let d1 = date(2013, 7, 1);

        let outcomes = pair_nights(&[], &[night(d1, 11.0)], &[record(d1, true)]);

        assert!(outcomes.is_empty());
    }
}

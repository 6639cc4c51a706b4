use chrono::{Days, NaiveDate};
use market_common::range::RangeWindow;
use market_common::table::{ColumnKey, RawQuoteTable, RawTimestamp};
use market_common::{Instrument, Observation, QuoteSeries, Snapshot, normalize, snapshot};
use proptest::prelude::*;
use strum::IntoEnumIterator;

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()
}

/// Series built from day offsets relative to 2015-01-01; offsets may repeat or be unordered.
fn series_from(points: &[(u64, f64)]) -> QuoteSeries {
    let observations = points
        .iter()
        .map(|(offset, close)| Observation::close(base() + Days::new(*offset), *close))
        .collect();
    QuoteSeries::new("GC=F", observations)
}

fn points() -> impl Strategy<Value = Vec<(u64, f64)>> {
    prop::collection::vec((0u64..4000, 0.01f64..10_000.0), 0..120)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn snapshot_delta_is_last_minus_previous(points in points()) {
        let series = series_from(&points);
        let closes = series.closes();
        match snapshot(&series) {
            Snapshot::Available { latest, previous, delta, .. } => {
                prop_assert!(closes.len() >= 2);
                prop_assert_eq!(latest, closes[closes.len() - 1]);
                prop_assert_eq!(previous, closes[closes.len() - 2]);
                prop_assert_eq!(delta, closes[closes.len() - 1] - closes[closes.len() - 2]);
            }
            Snapshot::NoData { .. } => prop_assert!(closes.len() < 2),
        }
    }

    #[test]
    fn range_filter_is_idempotent_pure_and_bounded(points in points()) {
        let series = series_from(&points);
        let before = series.clone();
        for window in RangeWindow::iter() {
            let once = window.apply(&series);
            prop_assert_eq!(&window.apply(&once), &once);

            if let Some(max_date) = series.max_date() {
                let cutoff = match window.day_offset() {
                    Some(days) => max_date - Days::new(days),
                    None => series.min_date().unwrap(),
                };
                prop_assert!(once.dates().all(|d| d >= cutoff));
                // nothing inside the window was dropped
                prop_assert_eq!(once.len(), series.dates().filter(|d| *d >= cutoff).count());
            } else {
                prop_assert!(once.is_empty());
            }
        }
        prop_assert_eq!(series, before);
    }

    #[test]
    fn series_dates_strictly_increase(points in points()) {
        let series = series_from(&points);
        let dates: Vec<NaiveDate> = series.dates().collect();
        prop_assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn normalize_twice_is_normalize_once(
        rows in prop::collection::vec(
            (0u64..400, prop::option::of(0.0f64..1000.0), prop::option::of(0.0f64..1000.0)),
            0..60,
        )
    ) {
        let index: Vec<RawTimestamp> = rows
            .iter()
            .map(|(offset, _, _)| RawTimestamp::from(base() + Days::new(*offset)))
            .collect();
        let mut table = RawQuoteTable::new(index);
        table.push_column(ColumnKey::pair("Close", "GC=F"), rows.iter().map(|r| r.1).collect());
        table.push_column(ColumnKey::pair("Close", "SI=F"), rows.iter().map(|r| r.2).collect());

        let expected = vec![Instrument::lookup("GC=F"), Instrument::lookup("SI=F")];
        let once = normalize(&table, &expected);
        let twice = normalize(&once.to_raw(), &expected);
        prop_assert_eq!(once.series, twice.series);
    }

    #[test]
    fn calendar_gaps_complement_the_index(points in points()) {
        let series = series_from(&points);
        let gaps = series.calendar_gaps();
        if let (Some(min), Some(max)) = (series.min_date(), series.max_date()) {
            let span = (max - min).num_days() as usize + 1;
            prop_assert_eq!(gaps.len() + series.len(), span);
            prop_assert!(gaps.iter().all(|g| *g > min && *g < max));
        } else {
            prop_assert!(gaps.is_empty());
        }
    }
}

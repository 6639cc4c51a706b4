//! Calendar-gap resolution for candlestick axes.
//!
//! A charting layer that draws a continuous time axis needs to be told which
//! days to compress away (weekends, exchange holidays). This module only
//! computes those dates; it never produces values for them.
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Calendar days between the earliest and latest of `dates` (inclusive) that are
/// not themselves in `dates`, in ascending order.
///
/// Input order does not matter. Empty and single-date input yield no gaps.
pub fn calendar_gaps<I>(dates: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let present: BTreeSet<NaiveDate> = dates.into_iter().collect();
    let (Some(first), Some(last)) = (present.first().copied(), present.last().copied()) else {
        return Vec::new();
    };

    first
        .iter_days()
        .take_while(|day| *day <= last)
        .filter(|day| !present.contains(day))
        .collect()
}

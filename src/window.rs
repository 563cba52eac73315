//! Month-aligned event windows.
//!
//! A window starts on the first day of the event month shifted by `win_start` months and
//! ends on the last day of the end-event month shifted by `win_end` months. Both bounds are
//! inclusive and always fall on whole-month boundaries.

use chrono::{Datelike, Months, NaiveDate};
use polars::prelude::*;

use crate::logging::{QueryPhase, QueryRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

impl MonthWindow {
    /// An inverted window matches no monthly records.
    pub fn is_empty(&self) -> bool {
        self.begin > self.end
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last calendar day of the month containing `date`.
pub fn last_of_month(date: NaiveDate) -> Option<NaiveDate> {
    first_of_month(date)
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

/// Shift `date` by a signed number of months, clamping the day to the target month.
pub fn shift_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let magnitude = Months::new(months.unsigned_abs());
    if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    }
}

/// Compute the inclusive window for one event. Returns `None` only when the shifted
/// bounds fall outside chrono's calendar range.
pub fn month_window(
    start: NaiveDate,
    end: NaiveDate,
    win_start: i32,
    win_end: i32,
) -> Option<MonthWindow> {
    let begin = shift_months(first_of_month(start), win_start)?;
    // Shift from the first of the month so the end lands on a month end, never a
    // clamped day number.
    let end = last_of_month(shift_months(first_of_month(end), win_end)?)?;
    Some(MonthWindow { begin, end })
}

fn dates(frame: &DataFrame, column: &str) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let series = frame.column(column)?.cast(&DataType::Date)?;
    Ok(series.date()?.as_date_iter().collect())
}

/// Append `begin_column` and `end_column` (`Date`) holding each row's window bounds.
///
/// Rows with a null event date, or whose bounds overflow the calendar, get null bounds and
/// therefore match nothing when filtered against.
pub fn attach_windows(
    frame: &DataFrame,
    start_column: &str,
    end_column: &str,
    win_start: i32,
    win_end: i32,
    begin_column: &str,
    window_end_column: &str,
) -> PolarsResult<DataFrame> {
    let starts = dates(frame, start_column)?;
    let ends = dates(frame, end_column)?;

    let (begins, window_ends): (Vec<Option<NaiveDate>>, Vec<Option<NaiveDate>>) = starts
        .into_iter()
        .zip(ends)
        .map(|(start, end)| {
            match start
                .zip(end)
                .and_then(|(start, end)| month_window(start, end, win_start, win_end))
            {
                Some(window) => (Some(window.begin), Some(window.end)),
                None => (None, None),
            }
        })
        .unzip();

    let mut enriched = frame.clone();
    enriched.with_column(Series::new(begin_column, begins))?;
    enriched.with_column(Series::new(window_end_column, window_ends))?;

    QueryRecord::new("WindowCalculator", "attach_windows", QueryPhase::Plan)
        .at(file!(), line!())
        .rows(enriched.height())
        .emit(&format!(
            "Computed month windows [{win_start:+}, {win_end:+}]"
        ));

    Ok(enriched)
}

#![allow(dead_code)]

use anyhow::{Context, bail};
use chrono::NaiveDate;
use polars::prelude::*;

use eventrets::{MemoryStore, TableNames};

pub fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}

/// Three securities. 10002 has no return in February but delists mid-month; 10003 has
/// both an ordinary and a delisting return in March.
pub fn security_months() -> DataFrame {
    df! {
        "permno" => &[10001i64, 10001, 10001, 10001, 10002, 10002, 10003],
        "date" => vec![
            d(2024, 1, 31),
            d(2024, 2, 29),
            d(2024, 3, 28),
            d(2024, 4, 30),
            d(2024, 1, 31),
            d(2024, 2, 29),
            d(2024, 3, 28),
        ],
        "ret" => &[Some(0.01), Some(0.02), Some(-0.01), Some(0.03), Some(0.05), None, Some(0.1)],
    }
    .expect("security month fixture")
}

pub fn delistings() -> DataFrame {
    df! {
        "permno" => &[10002i64, 10003],
        "dlstdt" => vec![d(2024, 2, 15), d(2024, 3, 15)],
        "dlret" => &[-0.3, -0.5],
    }
    .expect("delisting fixture")
}

pub fn benchmark_portfolios() -> DataFrame {
    df! {
        "permno" => &[10001i64, 10001, 10001, 10001],
        "date" => vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 28), d(2024, 4, 30)],
        "decret" => &[0.005, 0.01, 0.0, 0.02],
    }
    .expect("benchmark fixture")
}

pub fn market_index() -> DataFrame {
    df! {
        "date" => vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 28), d(2024, 4, 30)],
        "vwretd" => &[0.01, 0.015, -0.005, 0.02],
    }
    .expect("market index fixture")
}

pub fn raw_store() -> MemoryStore {
    let tables = TableNames::default();
    MemoryStore::new()
        .with_table(tables.security_months, security_months())
        .with_table(tables.delistings, delistings())
        .with_table(tables.benchmark_portfolios, benchmark_portfolios())
        .with_table(tables.market_index, market_index())
}

pub fn events(permnos: &[i64], dates: Vec<NaiveDate>) -> DataFrame {
    df! {
        "permno" => permnos,
        "event_date" => dates,
    }
    .expect("event fixture")
}

pub fn dates(frame: &DataFrame, column: &str) -> anyhow::Result<Vec<Option<NaiveDate>>> {
    let series = frame.column(column)?.cast(&DataType::Date)?;
    Ok(series.date()?.as_date_iter().collect())
}

/// Value of `column` on the result row for (`permno`, `event_date`).
pub fn row_value(
    frame: &DataFrame,
    permno: i64,
    event_date: NaiveDate,
    column: &str,
) -> anyhow::Result<Option<f64>> {
    let ids = frame.column("permno")?.cast(&DataType::Int64)?;
    let event_dates = dates(frame, "event_date")?;
    let values = frame.column(column)?.cast(&DataType::Float64)?;

    let row = ids
        .i64()?
        .into_iter()
        .zip(event_dates)
        .position(|(id, date)| id == Some(permno) && date == Some(event_date))
        .with_context(|| format!("no result row for {permno} on {event_date}"))?;

    match values.f64()?.get(row) {
        Some(value) => Ok(Some(value)),
        None if values.len() > row => Ok(None),
        None => bail!("row {row} out of bounds for {column}"),
    }
}

pub fn sorted_rows(frame: &DataFrame, columns: &[&str]) -> anyhow::Result<Vec<String>> {
    let mut rows = Vec::with_capacity(frame.height());
    for index in 0..frame.height() {
        let mut cells = Vec::with_capacity(columns.len());
        for column in columns {
            cells.push(format!("{}", frame.column(column)?.get(index)?));
        }
        rows.push(cells.join("|"));
    }
    rows.sort();
    Ok(rows)
}

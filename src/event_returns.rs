use polars::prelude::*;
use thiserror::Error;

use crate::config::EventReturnOptions;
use crate::logging::{QueryPhase, QueryRecord};
use crate::source::{
    self, BENCHMARK_RET, MARKET_RET, RET, ReturnSource, null_f64, resolve_return_source,
};
use crate::store::{DataStore, StoreError};
use crate::window::attach_windows;

pub const RAW_RETURN: &str = "ret_raw";
pub const MARKET_EXCESS_RETURN: &str = "ret_mkt";
pub const SIZE_EXCESS_RETURN: &str = "ret_sz";

const SYNTHETIC_END_DATE: &str = "__end_event_date";
const WINDOW_BEGIN: &str = "__window_begin";
const WINDOW_END: &str = "__window_end";
const RETURN_DATE: &str = "__return_date";

#[derive(Debug, Error)]
pub enum EventReturnError {
    #[error("events are missing column `{0}`")]
    MissingColumn(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type EventReturnResult<T> = Result<T, EventReturnError>;

/// Cumulative raw, market-excess and size-excess returns over a month window around each
/// event.
///
/// The return source is chosen by probing `store` for the pre-joined monthly returns
/// table. Output has one row per distinct (id, event date, end event date) with at least
/// one monthly record inside its window; the end date column is only kept when
/// `options.end_event_date_column` is set.
pub fn compute_event_cum_returns(
    events: &DataFrame,
    store: &dyn DataStore,
    options: &EventReturnOptions,
) -> EventReturnResult<DataFrame> {
    let source = resolve_return_source(store, &options.tables);
    compute_event_cum_returns_with(events, store, source.as_ref(), options)
}

/// Same as [`compute_event_cum_returns`] with an explicitly chosen return source.
pub fn compute_event_cum_returns_with(
    events: &DataFrame,
    store: &dyn DataStore,
    source: &dyn ReturnSource,
    options: &EventReturnOptions,
) -> EventReturnResult<DataFrame> {
    let id = options.id_column.as_str();
    let event_date = options.event_date_column.as_str();
    let end_date = options
        .end_event_date_column
        .as_deref()
        .unwrap_or(SYNTHETIC_END_DATE);

    let required = [Some(id), Some(event_date), options.end_event_date_column.as_deref()];
    for column in required.into_iter().flatten() {
        if events.column(column).is_err() {
            QueryRecord::new("EventReturnAggregator", "compute", QueryPhase::Validate)
                .at(file!(), line!())
                .error("missing column")
                .emit(&format!("Events frame lacks column {column}"));
            return Err(EventReturnError::MissingColumn(column.to_string()));
        }
    }

    let end_expr = match &options.end_event_date_column {
        Some(column) => col(column).cast(DataType::Date),
        None => col(event_date).cast(DataType::Date).alias(SYNTHETIC_END_DATE),
    };
    let keyed = events
        .clone()
        .lazy()
        .select([col(id), col(event_date).cast(DataType::Date), end_expr])
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;

    let windowed = attach_windows(
        &keyed,
        event_date,
        end_date,
        options.window_start_months,
        options.window_end_months,
        WINDOW_BEGIN,
        WINDOW_END,
    )?;

    let id_dtype = keyed.column(id)?.dtype().clone();
    let returns = source.monthly_returns(store)?.select([
        col(source::ID).cast(id_dtype),
        col(source::DATE).alias(RETURN_DATE),
        col(RET),
        col(BENCHMARK_RET),
        col(MARKET_RET),
    ]);

    let in_window = col(RETURN_DATE)
        .gt_eq(col(WINDOW_BEGIN))
        .and(col(RETURN_DATE).lt_eq(col(WINDOW_END)));

    let plan = windowed
        .lazy()
        .join(
            returns,
            [col(id)],
            [col(source::ID)],
            JoinArgs::new(JoinType::Inner),
        )
        .filter(in_window)
        .group_by_stable([col(id), col(event_date), col(end_date)])
        .agg([
            cumulative_return(RET).alias(RAW_RETURN),
            (cumulative_return(RET) - cumulative_return(MARKET_RET)).alias(MARKET_EXCESS_RETURN),
            (cumulative_return(RET) - cumulative_return(BENCHMARK_RET)).alias(SIZE_EXCESS_RETURN),
        ]);

    let mut result = plan.collect().inspect_err(|error| {
        QueryRecord::new("EventReturnAggregator", "compute", QueryPhase::Collect)
            .at(file!(), line!())
            .error(error)
            .emit("Query engine failed to collect event returns");
    })?;

    if options.end_event_date_column.is_none() {
        result = result.drop(SYNTHETIC_END_DATE)?;
    }

    if !options.suffix.is_empty() {
        for metric in [RAW_RETURN, MARKET_EXCESS_RETURN, SIZE_EXCESS_RETURN] {
            result.rename(metric, &suffixed_metric(metric, &options.suffix))?;
        }
    }

    QueryRecord::new("EventReturnAggregator", "compute", QueryPhase::Collect)
        .at(file!(), line!())
        .rows(result.height())
        .emit(&format!(
            "Computed cumulative returns for {} events using {} source",
            keyed.height(),
            source.name()
        ));

    Ok(result)
}

/// `ret_raw` with suffix `_m1` becomes `ret_m1_raw`.
pub fn suffixed_metric(metric: &str, suffix: &str) -> String {
    match metric.strip_prefix("ret") {
        Some(rest) => format!("ret{suffix}{rest}"),
        None => format!("{metric}{suffix}"),
    }
}

/// `exp(sum(ln(1 + r))) - 1` over a group, skipping nulls. A group without any non-null
/// value yields null.
fn cumulative_return(column: &str) -> Expr {
    let log_sum = (lit(1.0) + col(column)).log(std::f64::consts::E).sum();
    when(col(column).is_not_null().sum().gt(lit(0)))
        .then(log_sum.exp() - lit(1.0))
        .otherwise(null_f64())
}

/// Compound a sequence of periodic returns through the log-sum, ignoring missing values.
/// Returns `None` when no value is present.
pub fn compound_return(returns: &[Option<f64>]) -> Option<f64> {
    let mut seen = false;
    let mut log_sum = 0.0;
    for value in returns.iter().flatten() {
        seen = true;
        log_sum += value.ln_1p();
    }

    seen.then(|| log_sum.exp() - 1.0)
}

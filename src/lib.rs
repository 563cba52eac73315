//! eventrets computes cumulative returns around corporate events from CRSP-style monthly
//! panel data. Queries are built with polars' lazy API against any [`DataStore`], so the
//! same plan runs over in-memory tables or files on disk.

pub mod config;
pub mod event_returns;
pub mod logging;
pub mod source;
pub mod store;
pub mod window;

pub use config::{ConfigError, EventReturnOptions, TableNames};
pub use event_returns::{
    EventReturnError, EventReturnResult, compound_return, compute_event_cum_returns,
    compute_event_cum_returns_with, suffixed_metric,
};
pub use source::{
    DerivedReturns, MaterializedReturns, ReturnSource, materialize_monthly_returns,
    resolve_return_source,
};
pub use store::{CsvDirectoryStore, DataStore, MemoryStore, StoreError};
pub use window::{MonthWindow, attach_windows, month_window};

pub type Result<T> = anyhow::Result<T>;

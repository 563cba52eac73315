use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read options file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse options: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Logical names of the record sets an event-return query reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub delistings: String,
    pub security_months: String,
    pub benchmark_portfolios: String,
    pub market_index: String,
    /// Pre-joined monthly returns; when present the raw tables are not touched.
    pub monthly_returns: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            delistings: "crsp.msedelist".to_string(),
            security_months: "crsp.msf".to_string(),
            benchmark_portfolios: "crsp.erdport1".to_string(),
            market_index: "crsp.msi".to_string(),
            monthly_returns: "crsp.mrets".to_string(),
        }
    }
}

/// Options for [`crate::compute_event_cum_returns`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventReturnOptions {
    pub id_column: String,
    pub event_date_column: String,
    /// Months added to the first day of the event month to get the window start.
    pub window_start_months: i32,
    /// Months added to the last day of the end-event month to get the window end.
    pub window_end_months: i32,
    pub end_event_date_column: Option<String>,
    /// Inserted after the `ret` prefix of each output metric.
    pub suffix: String,
    pub tables: TableNames,
}

impl Default for EventReturnOptions {
    fn default() -> Self {
        Self {
            id_column: "permno".to_string(),
            event_date_column: "event_date".to_string(),
            window_start_months: 0,
            window_end_months: 0,
            end_event_date_column: None,
            suffix: String::new(),
            tables: TableNames::default(),
        }
    }
}

impl EventReturnOptions {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_event_date_column(mut self, column: impl Into<String>) -> Self {
        self.event_date_column = column.into();
        self
    }

    pub fn with_window(mut self, start_months: i32, end_months: i32) -> Self {
        self.window_start_months = start_months;
        self.window_end_months = end_months;
        self
    }

    pub fn with_end_event_date_column(mut self, column: impl Into<String>) -> Self {
        self.end_event_date_column = Some(column.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }
}

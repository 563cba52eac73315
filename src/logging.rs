use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::Result;

/// Overrides `RUST_LOG` for this crate's records when set.
pub const LOG_ENV: &str = "EVENTRETS_LOG";

static SUBSCRIBER: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Where in an event-return query a record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryPhase {
    Validate,
    Load,
    Plan,
    Collect,
}

/// Structured record for one step of a query, emitted as a JSON field on a tracing event.
#[derive(Debug, Serialize)]
pub struct QueryRecord<'a> {
    pub component: &'a str,
    pub operation: &'a str,
    pub phase: QueryPhase,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> QueryRecord<'a> {
    pub fn new(component: &'a str, operation: &'a str, phase: QueryPhase) -> Self {
        Self {
            component,
            operation,
            phase,
            location: None,
            timestamp: Utc::now(),
            rows: None,
            error: None,
        }
    }

    pub fn at(mut self, file: &str, line: u32) -> Self {
        self.location = Some(format!("{file}:{line}"));
        self
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Records carrying an error go out at `warn`, everything else at `info`.
    pub fn emit(&self, message: &str) {
        let Ok(record) = serde_json::to_string(self) else {
            warn!(target: "eventrets", component = self.component, operation = self.operation, "{message}");
            return;
        };

        if self.error.is_some() {
            warn!(target: "eventrets", record = %record, "{message}");
        } else {
            info!(target: "eventrets", record = %record, "{message}");
        }
    }
}

/// Install a JSON tracing subscriber. Only the first call installs it; later calls report
/// the outcome of that first attempt.
pub fn init_logging() -> Result<()> {
    SUBSCRIBER
        .get_or_init(|| {
            let filter = EnvFilter::try_from_env(LOG_ENV)
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info"));

            fmt()
                .with_env_filter(filter)
                .json()
                .flatten_event(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_target(false)
                .try_init()
                .map_err(|error| error.to_string())
        })
        .clone()
        .map_err(|message| anyhow!(message))
}

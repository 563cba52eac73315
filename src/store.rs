use std::collections::HashMap;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use thiserror::Error;

use crate::logging::{QueryPhase, QueryRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table `{0}` is not available in the backing store")]
    MissingTable(String),
    #[error("failed to load table `{table}`: {source}")]
    Load { table: String, source: PolarsError },
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A queryable source of named record sets.
///
/// `has_table` is a capability probe: callers use it to decide which query plan to build,
/// so it must not fail and should be cheap.
pub trait DataStore {
    fn has_table(&self, name: &str) -> bool;

    fn table(&self, name: &str) -> StoreResult<LazyFrame>;
}

/// Tables registered in memory under their logical names.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: HashMap<String, LazyFrame>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, frame: DataFrame) -> &mut Self {
        self.tables.insert(name.into(), frame.lazy());
        self
    }

    pub fn with_table(mut self, name: impl Into<String>, frame: DataFrame) -> Self {
        self.register(name, frame);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<LazyFrame> {
        self.tables.remove(name)
    }
}

impl DataStore for MemoryStore {
    fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    fn table(&self, name: &str) -> StoreResult<LazyFrame> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::MissingTable(name.to_string()))
    }
}

/// CSV files laid out as `<root>/<schema>/<table>.csv`; a name without a schema maps to
/// `<root>/<table>.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirectoryStore {
    root: PathBuf,
}

impl CsvDirectoryStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        match name.split_once('.') {
            Some((schema, table)) => self.root.join(schema).join(format!("{table}.csv")),
            None => self.root.join(format!("{name}.csv")),
        }
    }
}

impl DataStore for CsvDirectoryStore {
    fn has_table(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    fn table(&self, name: &str) -> StoreResult<LazyFrame> {
        let path = self.path_for(name);
        if !path.is_file() {
            QueryRecord::new("CsvDirectoryStore", "table", QueryPhase::Load)
                .at(file!(), line!())
                .error("missing table")
                .emit(&format!("No file for table {name} at {}", path.display()));
            return Err(StoreError::MissingTable(name.to_string()));
        }

        let frame = LazyCsvReader::new(&path)
            .has_header(true)
            .with_try_parse_dates(true)
            .with_infer_schema_length(Some(2048))
            .finish()
            .map_err(|source| {
                QueryRecord::new("CsvDirectoryStore", "table", QueryPhase::Load)
                    .at(file!(), line!())
                    .error(&source)
                    .emit(&format!("Failed to scan {}", path.display()));
                StoreError::Load {
                    table: name.to_string(),
                    source,
                }
            })?;

        QueryRecord::new("CsvDirectoryStore", "table", QueryPhase::Load)
            .at(file!(), line!())
            .emit(&format!("Scanning table {name} from {}", path.display()));

        Ok(frame)
    }
}

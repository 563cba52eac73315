mod common;

use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;
use tempfile::TempDir;

use common::{d, events, raw_store, row_value};
use eventrets::{
    CsvDirectoryStore, DataStore, EventReturnOptions, StoreError, TableNames,
    compute_event_cum_returns, resolve_return_source,
};

fn write_table(root: &Path, schema: &str, table: &str, contents: &str) -> anyhow::Result<()> {
    let dir = root.join(schema);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(format!("{table}.csv")), contents)?;
    Ok(())
}

fn csv_store() -> anyhow::Result<TempDir> {
    let dir = TempDir::new()?;
    write_table(
        dir.path(),
        "crsp",
        "msf",
        "permno,date,ret\n10001,2024-01-31,0.01\n10001,2024-02-29,0.02\n10001,2024-03-28,-0.01\n10001,2024-04-30,0.03\n10002,2024-01-31,0.05\n10002,2024-02-29,\n10003,2024-03-28,0.1\n",
    )?;
    write_table(
        dir.path(),
        "crsp",
        "msedelist",
        "permno,dlstdt,dlret\n10002,2024-02-15,-0.3\n10003,2024-03-15,-0.5\n",
    )?;
    write_table(
        dir.path(),
        "crsp",
        "erdport1",
        "permno,date,decret\n10001,2024-01-31,0.005\n10001,2024-02-29,0.01\n10001,2024-03-28,0.0\n10001,2024-04-30,0.02\n",
    )?;
    write_table(
        dir.path(),
        "crsp",
        "msi",
        "date,vwretd\n2024-01-31,0.01\n2024-02-29,0.015\n2024-03-28,-0.005\n2024-04-30,0.02\n",
    )?;
    Ok(dir)
}

#[test]
fn logical_names_map_to_schema_directories() {
    let store = CsvDirectoryStore::new("/data");
    assert_eq!(store.path_for("crsp.msf"), Path::new("/data/crsp/msf.csv"));
    assert_eq!(store.path_for("events"), Path::new("/data/events.csv"));
}

#[test]
fn missing_csv_table_is_reported() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = CsvDirectoryStore::new(dir.path());

    assert!(!store.has_table("crsp.msf"));
    let error = store.table("crsp.msf").err().expect("no file on disk");
    assert!(matches!(error, StoreError::MissingTable(name) if name == "crsp.msf"));
    Ok(())
}

#[test]
fn csv_store_matches_in_memory_store() -> anyhow::Result<()> {
    let dir = csv_store()?;
    let store = CsvDirectoryStore::new(dir.path());
    let tables = TableNames::default();

    assert!(store.has_table(&tables.security_months));
    assert!(!store.has_table(&tables.monthly_returns));
    assert_eq!(resolve_return_source(&store, &tables).name(), "derived");

    let frame = events(
        &[10001, 10002, 10003],
        vec![d(2024, 1, 15), d(2024, 2, 10), d(2024, 3, 1)],
    );
    let options = EventReturnOptions::default().with_window(0, 1);
    let from_csv = compute_event_cum_returns(&frame, &store, &options)?;
    let from_memory = compute_event_cum_returns(&frame, &raw_store(), &options)?;

    assert_eq!(from_csv.height(), 3);
    for (permno, event) in [
        (10001, d(2024, 1, 15)),
        (10002, d(2024, 2, 10)),
        (10003, d(2024, 3, 1)),
    ] {
        for metric in ["ret_raw", "ret_mkt"] {
            assert_abs_diff_eq!(
                row_value(&from_csv, permno, event, metric)?.unwrap(),
                row_value(&from_memory, permno, event, metric)?.unwrap(),
                epsilon = 1e-12
            );
        }
    }
    assert_eq!(row_value(&from_csv, 10002, d(2024, 2, 10), "ret_sz")?, None);
    Ok(())
}

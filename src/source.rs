//! Monthly return record sets.
//!
//! Every [`ReturnSource`] yields the same schema:
//!
//! | column   | type    | meaning                                             |
//! |----------|---------|-----------------------------------------------------|
//! | `permno` | id      | entity identifier                                   |
//! | `date`   | Date    | security-month date (delisting date if none)        |
//! | `ret`    | Float64 | ordinary return compounded with any delisting return |
//! | `decret` | Float64 | size-decile benchmark portfolio return (nullable)   |
//! | `vwretd` | Float64 | value-weighted market index return (nullable)       |

use polars::prelude::*;

use crate::config::TableNames;
use crate::logging::{QueryPhase, QueryRecord};
use crate::store::{DataStore, StoreResult};

pub const ID: &str = "permno";
pub const DATE: &str = "date";
pub const RET: &str = "ret";
pub const DELISTING_RET: &str = "dlret";
pub const DELISTING_DATE: &str = "dlstdt";
pub const BENCHMARK_RET: &str = "decret";
pub const MARKET_RET: &str = "vwretd";

const MONTH: &str = "__calendar_month";

/// Strategy for producing the monthly return record set.
pub trait ReturnSource {
    fn name(&self) -> &'static str;

    fn monthly_returns(&self, store: &dyn DataStore) -> StoreResult<LazyFrame>;
}

/// Reads the pre-joined monthly returns table.
#[derive(Debug, Clone)]
pub struct MaterializedReturns {
    tables: TableNames,
}

impl MaterializedReturns {
    pub fn new(tables: TableNames) -> Self {
        Self { tables }
    }
}

impl ReturnSource for MaterializedReturns {
    fn name(&self) -> &'static str {
        "materialized"
    }

    fn monthly_returns(&self, store: &dyn DataStore) -> StoreResult<LazyFrame> {
        let frame = store.table(&self.tables.monthly_returns)?;
        let schema = frame.schema()?;

        let optional = |column: &str| {
            if schema.get(column).is_some() {
                col(column).cast(DataType::Float64)
            } else {
                QueryRecord::new("MaterializedReturns", "monthly_returns", QueryPhase::Plan)
                    .at(file!(), line!())
                    .emit(&format!(
                        "Column {column} absent from {}; treating as null",
                        self.tables.monthly_returns
                    ));
                null_returns(column)
            }
        };

        let benchmark = optional(BENCHMARK_RET);
        let market = optional(MARKET_RET);

        Ok(frame.select([
            col(ID),
            col(DATE).cast(DataType::Date),
            col(RET).cast(DataType::Float64),
            benchmark,
            market,
        ]))
    }
}

/// Builds monthly returns from the security-month, delisting, benchmark and market index
/// tables.
#[derive(Debug, Clone)]
pub struct DerivedReturns {
    tables: TableNames,
}

impl DerivedReturns {
    pub fn new(tables: TableNames) -> Self {
        Self { tables }
    }
}

impl ReturnSource for DerivedReturns {
    fn name(&self) -> &'static str {
        "derived"
    }

    fn monthly_returns(&self, store: &dyn DataStore) -> StoreResult<LazyFrame> {
        let security_months = store.table(&self.tables.security_months)?;
        let id_dtype = security_months
            .schema()?
            .get(ID)
            .cloned()
            .ok_or_else(|| polars_err!(ColumnNotFound: "{} in {}", ID, self.tables.security_months))?;

        let security_months = security_months
            .select([
                col(ID),
                col(DATE).cast(DataType::Date),
                col(RET).cast(DataType::Float64),
            ])
            .with_column(calendar_month(DATE));

        // At most one delisting per security and calendar month.
        let delistings = optional_table(store, &self.tables.delistings)?.map(|frame| {
            frame
                .select([
                    col(ID).cast(id_dtype.clone()),
                    col(DELISTING_DATE).cast(DataType::Date),
                    col(DELISTING_RET).cast(DataType::Float64),
                ])
                .with_column(calendar_month(DELISTING_DATE))
                .unique_stable(
                    Some(vec![ID.to_string(), MONTH.to_string()]),
                    UniqueKeepStrategy::First,
                )
        });

        // A month survives when either the ordinary or the delisting return exists.
        let keys = match &delistings {
            Some(delistings) => concat(
                [
                    security_months.clone().select(entity_month()),
                    delistings.clone().select(entity_month()),
                ],
                UnionArgs::default(),
            )?
            .unique_stable(None, UniqueKeepStrategy::First),
            None => security_months.clone().select(entity_month()),
        };

        let mut frame = keys.join(
            security_months,
            entity_month(),
            entity_month(),
            JoinArgs::new(JoinType::Left),
        );

        frame = match delistings {
            Some(delistings) => frame
                .join(
                    delistings,
                    entity_month(),
                    entity_month(),
                    JoinArgs::new(JoinType::Left),
                )
                .with_column(col(DATE).fill_null(col(DELISTING_DATE)).alias(DATE)),
            None => frame.with_column(null_returns(DELISTING_RET)),
        };

        let combined = (lit(1.0) + col(RET).fill_null(lit(0.0)))
            * (lit(1.0) + col(DELISTING_RET).fill_null(lit(0.0)))
            - lit(1.0);
        frame = frame.with_column(
            when(col(RET).is_null().and(col(DELISTING_RET).is_null()))
                .then(null_f64())
                .otherwise(combined)
                .alias(RET),
        );

        frame = match optional_table(store, &self.tables.benchmark_portfolios)? {
            Some(benchmarks) => frame.join(
                benchmarks.select([
                    col(ID).cast(id_dtype),
                    col(DATE).cast(DataType::Date),
                    col(BENCHMARK_RET).cast(DataType::Float64),
                ]),
                [col(ID), col(DATE)],
                [col(ID), col(DATE)],
                JoinArgs::new(JoinType::Left),
            ),
            None => frame.with_column(null_returns(BENCHMARK_RET)),
        };

        frame = match optional_table(store, &self.tables.market_index)? {
            Some(index) => frame.join(
                index.select([
                    col(DATE).cast(DataType::Date),
                    col(MARKET_RET).cast(DataType::Float64),
                ]),
                [col(DATE)],
                [col(DATE)],
                JoinArgs::new(JoinType::Left),
            ),
            None => frame.with_column(null_returns(MARKET_RET)),
        };

        Ok(frame.select([
            col(ID),
            col(DATE),
            col(RET),
            col(BENCHMARK_RET),
            col(MARKET_RET),
        ]))
    }
}

/// `year * 12 + month`, a join key shared by every date in one calendar month.
fn calendar_month(date_column: &str) -> Expr {
    (col(date_column).dt().year().cast(DataType::Int32) * lit(12)
        + col(date_column).dt().month().cast(DataType::Int32))
    .alias(MONTH)
}

fn entity_month() -> [Expr; 2] {
    [col(ID), col(MONTH)]
}

pub(crate) fn null_f64() -> Expr {
    lit(NULL).cast(DataType::Float64)
}

fn null_returns(column: &str) -> Expr {
    null_f64().alias(column)
}

fn optional_table(store: &dyn DataStore, name: &str) -> StoreResult<Option<LazyFrame>> {
    if store.has_table(name) {
        return store.table(name).map(Some);
    }

    QueryRecord::new("DerivedReturns", "optional_table", QueryPhase::Plan)
        .at(file!(), line!())
        .emit(&format!("Table {name} not available; its returns will be null"));
    Ok(None)
}

/// Pick the return source the store can serve: the pre-joined table when it exists,
/// otherwise derivation from the raw tables.
pub fn resolve_return_source(store: &dyn DataStore, tables: &TableNames) -> Box<dyn ReturnSource> {
    let source: Box<dyn ReturnSource> = if store.has_table(&tables.monthly_returns) {
        Box::new(MaterializedReturns::new(tables.clone()))
    } else {
        Box::new(DerivedReturns::new(tables.clone()))
    };

    QueryRecord::new("ReturnSourceResolver", "resolve_return_source", QueryPhase::Plan)
        .at(file!(), line!())
        .emit(&format!("Selected {} monthly return source", source.name()));

    source
}

/// Derive the monthly return record set and collect it, e.g. to register it as the
/// pre-joined table.
pub fn materialize_monthly_returns(
    store: &dyn DataStore,
    tables: &TableNames,
) -> StoreResult<DataFrame> {
    let frame = DerivedReturns::new(tables.clone())
        .monthly_returns(store)?
        .collect()?;

    QueryRecord::new("DerivedReturns", "materialize_monthly_returns", QueryPhase::Collect)
        .at(file!(), line!())
        .rows(frame.height())
        .emit("Materialized monthly return records");

    Ok(frame)
}

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{ColumnType, Value};
use sea_orm::{DbErr, QueryResult};

use kleio_core::{KleioError, KleioResult};

/// Binds a Rust time representation to its SQL column type and row codec.
///
/// The coordinator is parameterised with one implementation at construction
/// and stays monomorphic afterwards. Provided implementations: `i64`
/// (numeric timestamps, e.g. epoch seconds) and `chrono::DateTime<Utc>`.
pub trait TimeValue: Clone + PartialOrd + Send + Sync + 'static {
    fn column_type() -> ColumnType;

    fn to_sql(&self) -> Value;

    fn from_row_opt(row: &QueryResult, column: &str) -> KleioResult<Option<Self>>;

    fn from_row(row: &QueryResult, column: &str) -> KleioResult<Self> {
        Self::from_row_opt(row, column)?
            .ok_or_else(|| KleioError::storage(format!("column '{column}' is unexpectedly null")))
    }
}

impl TimeValue for i64 {
    fn column_type() -> ColumnType {
        ColumnType::BigInteger
    }

    fn to_sql(&self) -> Value {
        (*self).into()
    }

    fn from_row_opt(row: &QueryResult, column: &str) -> KleioResult<Option<Self>> {
        row.try_get::<Option<i64>>("", column)
            .map_err(|err| KleioError::storage(DbErr::from(err).to_string()))
    }
}

impl TimeValue for DateTime<Utc> {
    fn column_type() -> ColumnType {
        ColumnType::TimestampWithTimeZone
    }

    fn to_sql(&self) -> Value {
        (*self).into()
    }

    fn from_row_opt(row: &QueryResult, column: &str) -> KleioResult<Option<Self>> {
        row.try_get::<Option<DateTime<Utc>>>("", column)
            .map_err(|err| KleioError::storage(DbErr::from(err).to_string()))
    }
}

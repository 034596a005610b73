use sea_orm::{
    ConnectionTrait, DatabaseBackend, DbErr, DeriveIden, QueryResult, Statement, StatementBuilder,
};

use kleio_core::{KleioError, KleioResult};

/// Central lookup table: one row per data IRI, mapping it to its series,
/// its data table and its value column.
#[derive(DeriveIden, Clone, Copy)]
pub enum Lookup {
    #[sea_orm(iden = "dbTable")]
    Table,
    #[sea_orm(iden = "dataIRI")]
    DataIri,
    #[sea_orm(iden = "timeseriesIRI")]
    TimeseriesIri,
    #[sea_orm(iden = "tableName")]
    TableName,
    #[sea_orm(iden = "columnName")]
    ColumnName,
}

/// Name of the time column in every data table.
pub const TIME_COLUMN: &str = "time";

pub(crate) fn db_err(err: DbErr) -> KleioError {
    KleioError::storage(err.to_string())
}

pub(crate) fn build_stmt<S: StatementBuilder>(backend: DatabaseBackend, stmt: &S) -> Statement {
    StatementBuilder::build(stmt, &backend)
}

pub(crate) async fn exec<C, S>(conn: &C, stmt: &S) -> KleioResult<()>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    conn.execute(build_stmt(conn.get_database_backend(), stmt))
        .await
        .map_err(db_err)?;
    Ok(())
}

pub(crate) async fn query_all<C, S>(conn: &C, stmt: &S) -> KleioResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    conn.query_all(build_stmt(conn.get_database_backend(), stmt))
        .await
        .map_err(db_err)
}

pub(crate) async fn query_one<C, S>(conn: &C, stmt: &S) -> KleioResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    conn.query_one(build_stmt(conn.get_database_backend(), stmt))
        .await
        .map_err(db_err)
}

pub(crate) fn read_string(row: &QueryResult, column: &str) -> KleioResult<String> {
    row.try_get::<String>("", column)
        .map_err(|err| KleioError::storage(DbErr::from(err).to_string()))
}

use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use oxrdf::NamedNode;
use sea_orm::sea_query::{
    Alias, ColumnDef, ColumnType, Expr, ExprTrait, Func, Order, Query, SimpleExpr, Table,
    Value as SqlValue,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    QueryResult, Statement,
};
use uuid::Uuid;

use kleio_core::{DataType, DataValue, KleioError, KleioResult, StoreConfig, TimeSeries};

use crate::db::{db_err, exec, query_all, query_one, read_string, Lookup, TIME_COLUMN};
use crate::time::TimeValue;

/// Maintains the central lookup table plus one data table per time-series.
///
/// Callers own the connection: every method borrows it for the duration of
/// the call and never closes or retains it.
#[async_trait]
pub trait SeriesStorage<T: TimeValue>: Send + Sync {
    /// Create a fresh data table for the given data IRIs and register them
    /// in the central lookup table (created on first use).
    async fn init_table(
        &self,
        data_iris: &[NamedNode],
        data_types: &[DataType],
        series: &NamedNode,
        srid: Option<i32>,
        conn: &DatabaseConnection,
    ) -> KleioResult<()>;

    /// Append rows for each batch. All data IRIs of one batch must resolve
    /// to the same data table.
    async fn add(&self, batches: &[TimeSeries<T>], conn: &DatabaseConnection) -> KleioResult<()>;

    /// Rows for the given data IRIs sorted ascending by time. Bounds are
    /// inclusive when given and open when `None`.
    async fn series_within_bounds(
        &self,
        data_iris: &[NamedNode],
        lower: Option<&T>,
        upper: Option<&T>,
        conn: &DatabaseConnection,
    ) -> KleioResult<TimeSeries<T>>;

    /// The newest row of the data IRI's column (possibly empty).
    async fn latest(&self, data_iri: &NamedNode, conn: &DatabaseConnection)
        -> KleioResult<TimeSeries<T>>;

    /// The oldest row of the data IRI's column (possibly empty).
    async fn oldest(&self, data_iri: &NamedNode, conn: &DatabaseConnection)
        -> KleioResult<TimeSeries<T>>;

    async fn average(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<f64>;

    async fn max_value(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<f64>;

    async fn min_value(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<f64>;

    async fn max_time(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<Option<T>>;

    async fn min_time(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<Option<T>>;

    /// Delete rows with `lower <= time <= upper` for the table backing the
    /// data IRI.
    async fn delete_rows(
        &self,
        data_iri: &NamedNode,
        lower: &T,
        upper: &T,
        conn: &DatabaseConnection,
    ) -> KleioResult<()>;

    /// Drop the column of one data IRI (or the whole table when it is the
    /// last one) and remove its lookup row.
    async fn delete_series(&self, data_iri: &NamedNode, conn: &DatabaseConnection)
        -> KleioResult<()>;

    /// Drop the whole data table backing the data IRI and every lookup row
    /// pointing to it.
    async fn delete_table(&self, data_iri: &NamedNode, conn: &DatabaseConnection)
        -> KleioResult<()>;

    /// Drop every data table and the lookup table itself.
    async fn delete_all(&self, conn: &DatabaseConnection) -> KleioResult<()>;

    /// Whether the data IRI is registered in the lookup table.
    async fn has_data(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<bool>;

    /// Whether any lookup row references the series.
    async fn has_series(&self, series: &NamedNode, conn: &DatabaseConnection) -> KleioResult<bool>;

    /// Configured relational database URL, if any.
    fn rdb_url(&self) -> Option<&str>;
}

/// `SeriesStorage` over a relational database reached through sea-orm.
///
/// The URL/user/password fields exist for legacy configuration only; new
/// code passes an externally owned connection into every call and may leave
/// them unset (except the URL, which the coordinator records as `hasRDB`).
#[derive(Clone, Debug, Default)]
pub struct RdbSeriesStore<T> {
    rdb_url: Option<String>,
    rdb_user: Option<String>,
    rdb_password: Option<String>,
    _time: PhantomData<T>,
}

impl<T: TimeValue> RdbSeriesStore<T> {
    pub fn new() -> Self {
        Self {
            rdb_url: None,
            rdb_user: None,
            rdb_password: None,
            _time: PhantomData,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            rdb_url: config.db_url.clone(),
            rdb_user: config.db_user.clone(),
            rdb_password: config.db_password.clone(),
            _time: PhantomData,
        }
    }

    pub fn set_rdb_url(&mut self, url: impl Into<String>) {
        self.rdb_url = Some(url.into());
    }

    pub fn set_rdb_user(&mut self, user: impl Into<String>) {
        self.rdb_user = Some(user.into());
    }

    pub fn set_rdb_password(&mut self, password: impl Into<String>) {
        self.rdb_password = Some(password.into());
    }

    /// Open a fresh connection from the configured URL and credentials.
    /// Prefer passing an externally owned connection into the storage
    /// methods; this exists for the legacy configuration path.
    pub async fn connect(&self) -> KleioResult<DatabaseConnection> {
        let url = self.connection_url()?;
        Database::connect(ConnectOptions::new(url)).await.map_err(db_err)
    }

    fn connection_url(&self) -> KleioResult<String> {
        let url = self
            .rdb_url
            .as_deref()
            .ok_or_else(|| KleioError::config("no relational database URL configured"))?;
        Ok(inject_credentials(
            url,
            self.rdb_user.as_deref(),
            self.rdb_password.as_deref(),
        ))
    }
}

#[async_trait]
impl<T: TimeValue> SeriesStorage<T> for RdbSeriesStore<T> {
    async fn init_table(
        &self,
        data_iris: &[NamedNode],
        data_types: &[DataType],
        series: &NamedNode,
        srid: Option<i32>,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        if data_iris.len() != data_types.len() {
            return Err(KleioError::precondition(format!(
                "{} data IRIs but {} data classes",
                data_iris.len(),
                data_types.len()
            )));
        }
        if let Some(srid) = srid {
            log::debug!("srid {srid} given; scalar data classes do not use it");
        }
        ensure_lookup_table(conn).await?;

        let duplicates = Query::select()
            .column(Lookup::DataIri)
            .from(Lookup::Table)
            .and_where(Expr::col(Lookup::DataIri).is_in(data_iris.iter().map(NamedNode::as_str)))
            .to_owned();
        if let Some(row) = query_one(conn, &duplicates).await? {
            let taken = read_string(&row, "dataIRI")?;
            return Err(KleioError::precondition(format!(
                "<{taken}> already has a time series instance"
            )));
        }

        let table_name = fresh_table_name();
        let column_names: Vec<String> = (1..=data_iris.len())
            .map(|index| format!("column{index}"))
            .collect();

        let mut create = Table::create();
        create.table(Alias::new(&table_name));
        create.col(ColumnDef::new_with_type(Alias::new(TIME_COLUMN), T::column_type()).not_null());
        for (column, data_type) in column_names.iter().zip(data_types) {
            create.col(ColumnDef::new_with_type(
                Alias::new(column),
                sql_column_type(*data_type),
            ));
        }
        exec(conn, &create).await?;

        let mut insert = Query::insert();
        insert.into_table(Lookup::Table).columns([
            Lookup::DataIri,
            Lookup::TimeseriesIri,
            Lookup::TableName,
            Lookup::ColumnName,
        ]);
        for (data_iri, column) in data_iris.iter().zip(&column_names) {
            insert.values_panic([
                data_iri.as_str().into(),
                series.as_str().into(),
                table_name.as_str().into(),
                column.as_str().into(),
            ]);
        }
        exec(conn, &insert).await?;
        log::debug!(
            "created data table {table_name} with {} columns for {series}",
            data_iris.len()
        );
        Ok(())
    }

    async fn add(&self, batches: &[TimeSeries<T>], conn: &DatabaseConnection) -> KleioResult<()> {
        for batch in batches {
            if batch.is_empty() {
                continue;
            }
            let data_iris: Vec<NamedNode> = batch.data_iris().into_iter().cloned().collect();
            let (table_name, columns) = resolve_columns(conn, &data_iris).await?;
            let declared = column_types(conn, &table_name).await?;

            let mut insert = Query::insert();
            insert.into_table(Alias::new(&table_name));
            let mut idens = vec![Alias::new(TIME_COLUMN)];
            idens.extend(columns.iter().map(Alias::new));
            insert.columns(idens);

            for (index, time) in batch.times().iter().enumerate() {
                let mut row: Vec<SimpleExpr> = Vec::with_capacity(columns.len() + 1);
                row.push(time.to_sql().into());
                for ((data_iri, values), column) in batch.columns().iter().zip(&columns) {
                    let value = &values[index];
                    let column_type = declared.get(column).copied();
                    if let (Some(actual), Some(expected)) = (value.data_type(), column_type) {
                        if actual != expected {
                            return Err(KleioError::precondition(format!(
                                "value of class {actual:?} for <{}> does not match declared class {expected:?}",
                                data_iri.as_str()
                            )));
                        }
                    }
                    row.push(sql_value(value, column_type).into());
                }
                insert.values_panic(row);
            }
            exec(conn, &insert).await?;
        }
        Ok(())
    }

    async fn series_within_bounds(
        &self,
        data_iris: &[NamedNode],
        lower: Option<&T>,
        upper: Option<&T>,
        conn: &DatabaseConnection,
    ) -> KleioResult<TimeSeries<T>> {
        let (table_name, columns) = resolve_columns(conn, data_iris).await?;
        let declared = column_types(conn, &table_name).await?;

        let mut select = Query::select();
        select
            .column(Alias::new(TIME_COLUMN))
            .from(Alias::new(&table_name))
            .order_by(Alias::new(TIME_COLUMN), Order::Asc);
        for column in &columns {
            select.column(Alias::new(column));
        }
        if let Some(lower) = lower {
            select.and_where(Expr::col(Alias::new(TIME_COLUMN)).gte(lower.to_sql()));
        }
        if let Some(upper) = upper {
            select.and_where(Expr::col(Alias::new(TIME_COLUMN)).lte(upper.to_sql()));
        }

        let mut series = TimeSeries::empty(data_iris.to_vec());
        for row in query_all(conn, &select).await? {
            let time = T::from_row(&row, TIME_COLUMN)?;
            let mut values = Vec::with_capacity(columns.len());
            for column in &columns {
                values.push(read_data_value(&row, column, declared.get(column).copied())?);
            }
            series.push_row(time, values)?;
        }
        Ok(series)
    }

    async fn latest(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<TimeSeries<T>> {
        edge_row(data_iri, Order::Desc, conn).await
    }

    async fn oldest(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<TimeSeries<T>> {
        edge_row(data_iri, Order::Asc, conn).await
    }

    async fn average(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<f64> {
        numeric_aggregate(data_iri, Aggregate::Average, conn).await
    }

    async fn max_value(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<f64> {
        numeric_aggregate(data_iri, Aggregate::Max, conn).await
    }

    async fn min_value(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<f64> {
        numeric_aggregate(data_iri, Aggregate::Min, conn).await
    }

    async fn max_time(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<Option<T>> {
        time_aggregate(data_iri, Aggregate::Max, conn).await
    }

    async fn min_time(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<Option<T>> {
        time_aggregate(data_iri, Aggregate::Min, conn).await
    }

    async fn delete_rows(
        &self,
        data_iri: &NamedNode,
        lower: &T,
        upper: &T,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        let (table_name, _) = resolve_columns(conn, std::slice::from_ref(data_iri)).await?;
        let delete = Query::delete()
            .from_table(Alias::new(&table_name))
            .and_where(Expr::col(Alias::new(TIME_COLUMN)).gte(lower.to_sql()))
            .and_where(Expr::col(Alias::new(TIME_COLUMN)).lte(upper.to_sql()))
            .to_owned();
        exec(conn, &delete).await
    }

    async fn delete_series(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        let (table_name, columns) = resolve_columns(conn, std::slice::from_ref(data_iri)).await?;
        let column = &columns[0];

        let siblings = Query::select()
            .expr_as(Func::count(Expr::col(Lookup::DataIri)), Alias::new("val"))
            .from(Lookup::Table)
            .and_where(Expr::col(Lookup::TableName).eq(table_name.as_str()))
            .to_owned();
        let row = query_one(conn, &siblings)
            .await?
            .ok_or_else(|| KleioError::storage("lookup table count returned no row"))?;
        let count: i64 = row
            .try_get("", "val")
            .map_err(|err| KleioError::storage(DbErr::from(err).to_string()))?;

        if count > 1 {
            let alter = Table::alter()
                .table(Alias::new(&table_name))
                .drop_column(Alias::new(column))
                .to_owned();
            exec(conn, &alter).await?;
        } else {
            let drop = Table::drop().table(Alias::new(&table_name)).to_owned();
            exec(conn, &drop).await?;
        }

        let delete = Query::delete()
            .from_table(Lookup::Table)
            .and_where(Expr::col(Lookup::DataIri).eq(data_iri.as_str()))
            .to_owned();
        exec(conn, &delete).await
    }

    async fn delete_table(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        let (table_name, _) = resolve_columns(conn, std::slice::from_ref(data_iri)).await?;
        let drop = Table::drop()
            .table(Alias::new(&table_name))
            .if_exists()
            .to_owned();
        exec(conn, &drop).await?;
        let delete = Query::delete()
            .from_table(Lookup::Table)
            .and_where(Expr::col(Lookup::TableName).eq(table_name.as_str()))
            .to_owned();
        exec(conn, &delete).await
    }

    async fn delete_all(&self, conn: &DatabaseConnection) -> KleioResult<()> {
        if !lookup_table_exists(conn).await {
            return Ok(());
        }
        let tables = Query::select()
            .column(Lookup::TableName)
            .distinct()
            .from(Lookup::Table)
            .to_owned();
        for row in query_all(conn, &tables).await? {
            let table_name = read_string(&row, "tableName")?;
            let drop = Table::drop()
                .table(Alias::new(&table_name))
                .if_exists()
                .to_owned();
            exec(conn, &drop).await?;
        }
        let drop_lookup = Table::drop().table(Lookup::Table).if_exists().to_owned();
        exec(conn, &drop_lookup).await
    }

    async fn has_data(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<bool> {
        if !lookup_table_exists(conn).await {
            return Ok(false);
        }
        Ok(lookup_row(conn, data_iri).await?.is_some())
    }

    async fn has_series(&self, series: &NamedNode, conn: &DatabaseConnection) -> KleioResult<bool> {
        if !lookup_table_exists(conn).await {
            return Ok(false);
        }
        let select = Query::select()
            .column(Lookup::DataIri)
            .from(Lookup::Table)
            .and_where(Expr::col(Lookup::TimeseriesIri).eq(series.as_str()))
            .limit(1)
            .to_owned();
        Ok(query_one(conn, &select).await?.is_some())
    }

    fn rdb_url(&self) -> Option<&str> {
        self.rdb_url.as_deref()
    }
}

enum Aggregate {
    Average,
    Max,
    Min,
}

struct LookupRow {
    table_name: String,
    column_name: String,
}

fn fresh_table_name() -> String {
    format!("ts{}", Uuid::new_v4().simple())
}

fn sql_column_type(data_type: DataType) -> ColumnType {
    match data_type {
        DataType::Double => ColumnType::Double,
        DataType::Integer => ColumnType::BigInteger,
        DataType::Text => ColumnType::Text,
        DataType::Boolean => ColumnType::Boolean,
    }
}

fn sql_value(value: &DataValue, column_type: Option<DataType>) -> SqlValue {
    match value {
        DataValue::Double(value) => (*value).into(),
        DataValue::Integer(value) => (*value).into(),
        DataValue::Text(value) => value.as_str().into(),
        DataValue::Boolean(value) => (*value).into(),
        DataValue::Null => match column_type {
            Some(DataType::Double) => SqlValue::Double(None),
            Some(DataType::Integer) => SqlValue::BigInt(None),
            Some(DataType::Boolean) => SqlValue::Bool(None),
            _ => SqlValue::String(None),
        },
    }
}

fn read_data_value(
    row: &QueryResult,
    column: &str,
    column_type: Option<DataType>,
) -> KleioResult<DataValue> {
    fn get<V: sea_orm::TryGetable>(row: &QueryResult, column: &str) -> KleioResult<Option<V>> {
        row.try_get::<Option<V>>("", column)
            .map_err(|err| KleioError::storage(DbErr::from(err).to_string()))
    }

    match column_type {
        Some(DataType::Integer) => Ok(get::<i64>(row, column)?
            .map(DataValue::Integer)
            .unwrap_or(DataValue::Null)),
        Some(DataType::Double) => Ok(get::<f64>(row, column)?
            .map(DataValue::Double)
            .unwrap_or(DataValue::Null)),
        Some(DataType::Boolean) => Ok(get::<bool>(row, column)?
            .map(DataValue::Boolean)
            .unwrap_or(DataValue::Null)),
        Some(DataType::Text) => Ok(get::<String>(row, column)?
            .map(DataValue::Text)
            .unwrap_or(DataValue::Null)),
        None => {
            if let Ok(value) = get::<i64>(row, column) {
                return Ok(value.map(DataValue::Integer).unwrap_or(DataValue::Null));
            }
            if let Ok(value) = get::<f64>(row, column) {
                return Ok(value.map(DataValue::Double).unwrap_or(DataValue::Null));
            }
            if let Ok(value) = get::<bool>(row, column) {
                return Ok(value.map(DataValue::Boolean).unwrap_or(DataValue::Null));
            }
            if let Ok(value) = get::<String>(row, column) {
                return Ok(value.map(DataValue::Text).unwrap_or(DataValue::Null));
            }
            Err(KleioError::storage(format!(
                "column '{column}' holds a value of an unsupported class"
            )))
        }
    }
}

async fn ensure_lookup_table(conn: &DatabaseConnection) -> KleioResult<()> {
    let mut create = Table::create();
    create
        .table(Lookup::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Lookup::DataIri)
                .string_len(768)
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(Lookup::TimeseriesIri).text().not_null())
        .col(ColumnDef::new(Lookup::TableName).text().not_null())
        .col(ColumnDef::new(Lookup::ColumnName).text().not_null());
    exec(conn, &create).await
}

async fn lookup_table_exists(conn: &DatabaseConnection) -> bool {
    let probe = Query::select()
        .column(Lookup::DataIri)
        .from(Lookup::Table)
        .limit(1)
        .to_owned();
    query_all(conn, &probe).await.is_ok()
}

async fn lookup_row(
    conn: &DatabaseConnection,
    data_iri: &NamedNode,
) -> KleioResult<Option<LookupRow>> {
    let select = Query::select()
        .columns([Lookup::TableName, Lookup::ColumnName])
        .from(Lookup::Table)
        .and_where(Expr::col(Lookup::DataIri).eq(data_iri.as_str()))
        .to_owned();
    match query_one(conn, &select).await? {
        Some(row) => Ok(Some(LookupRow {
            table_name: read_string(&row, "tableName")?,
            column_name: read_string(&row, "columnName")?,
        })),
        None => Ok(None),
    }
}

/// Resolve every data IRI through the lookup table and check they all live
/// in the same data table. Returns the table plus the column per data IRI
/// in input order.
async fn resolve_columns(
    conn: &DatabaseConnection,
    data_iris: &[NamedNode],
) -> KleioResult<(String, Vec<String>)> {
    if data_iris.is_empty() {
        return Err(KleioError::precondition("no data IRIs given"));
    }
    if !lookup_table_exists(conn).await {
        return Err(KleioError::precondition(
            "central lookup table has not been initialised yet",
        ));
    }
    let mut table_name: Option<String> = None;
    let mut columns = Vec::with_capacity(data_iris.len());
    for data_iri in data_iris {
        let row = lookup_row(conn, data_iri).await?.ok_or_else(|| {
            KleioError::precondition(format!(
                "<{}> does not have a time series instance",
                data_iri.as_str()
            ))
        })?;
        match &table_name {
            None => table_name = Some(row.table_name),
            Some(existing) if *existing != row.table_name => {
                return Err(KleioError::precondition(
                    "provided data IRIs are not stored in the same table",
                ));
            }
            Some(_) => {}
        }
        columns.push(row.column_name);
    }
    Ok((table_name.expect("at least one data IRI"), columns))
}

/// Declared class per value column, read back from the database catalog.
async fn column_types(
    conn: &DatabaseConnection,
    table_name: &str,
) -> KleioResult<HashMap<String, DataType>> {
    let backend = conn.get_database_backend();
    let statement = match backend {
        DatabaseBackend::Sqlite => Statement::from_string(
            backend,
            format!("PRAGMA table_info('{table_name}')"),
        ),
        DatabaseBackend::Postgres => Statement::from_string(
            backend,
            format!(
                "SELECT column_name AS name, data_type AS type FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = '{table_name}'"
            ),
        ),
        _ => Statement::from_string(
            backend,
            format!(
                "SELECT column_name AS name, data_type AS type FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = '{table_name}'"
            ),
        ),
    };
    let rows = conn.query_all(statement).await.map_err(db_err)?;
    let mut types = HashMap::new();
    for row in rows {
        let name = read_string(&row, "name")?;
        let declared = read_string(&row, "type")?;
        if let Some(data_type) = parse_sql_type(&declared) {
            types.insert(name, data_type);
        }
    }
    Ok(types)
}

fn parse_sql_type(declared: &str) -> Option<DataType> {
    let declared = declared.to_ascii_lowercase();
    if declared.contains("bool") {
        Some(DataType::Boolean)
    } else if declared.contains("int") {
        Some(DataType::Integer)
    } else if ["double", "real", "float", "numeric", "decimal"]
        .iter()
        .any(|fragment| declared.contains(fragment))
    {
        Some(DataType::Double)
    } else if declared.contains("char") || declared.contains("text") {
        Some(DataType::Text)
    } else {
        None
    }
}

async fn edge_row<T: TimeValue>(
    data_iri: &NamedNode,
    order: Order,
    conn: &DatabaseConnection,
) -> KleioResult<TimeSeries<T>> {
    let (table_name, columns) = resolve_columns(conn, std::slice::from_ref(data_iri)).await?;
    let declared = column_types(conn, &table_name).await?;
    let column = &columns[0];
    let select = Query::select()
        .column(Alias::new(TIME_COLUMN))
        .column(Alias::new(column))
        .from(Alias::new(&table_name))
        .order_by(Alias::new(TIME_COLUMN), order)
        .limit(1)
        .to_owned();
    let mut series = TimeSeries::empty(vec![data_iri.clone()]);
    if let Some(row) = query_one(conn, &select).await? {
        let time = T::from_row(&row, TIME_COLUMN)?;
        let value = read_data_value(&row, column, declared.get(column).copied())?;
        series.push_row(time, vec![value])?;
    }
    Ok(series)
}

async fn numeric_aggregate(
    data_iri: &NamedNode,
    aggregate: Aggregate,
    conn: &DatabaseConnection,
) -> KleioResult<f64> {
    let (table_name, columns) = resolve_columns(conn, std::slice::from_ref(data_iri)).await?;
    let cast_type = match conn.get_database_backend() {
        DatabaseBackend::Postgres => "double precision",
        DatabaseBackend::MySql => "double",
        _ => "real",
    };
    let value = Expr::col(Alias::new(&columns[0])).cast_as(Alias::new(cast_type));
    let function = match aggregate {
        Aggregate::Average => Func::avg(value),
        Aggregate::Max => Func::max(value),
        Aggregate::Min => Func::min(value),
    };
    let select = Query::select()
        .expr_as(function, Alias::new("val"))
        .from(Alias::new(&table_name))
        .to_owned();
    let row = query_one(conn, &select)
        .await?
        .ok_or_else(|| KleioError::storage("aggregate query returned no row"))?;
    row.try_get::<Option<f64>>("", "val")
        .map_err(|err| KleioError::storage(DbErr::from(err).to_string()))?
        .ok_or_else(|| {
            KleioError::storage(format!(
                "time series for <{}> has no data to aggregate",
                data_iri.as_str()
            ))
        })
}

async fn time_aggregate<T: TimeValue>(
    data_iri: &NamedNode,
    aggregate: Aggregate,
    conn: &DatabaseConnection,
) -> KleioResult<Option<T>> {
    let (table_name, _) = resolve_columns(conn, std::slice::from_ref(data_iri)).await?;
    let time = Expr::col(Alias::new(TIME_COLUMN));
    let function = match aggregate {
        Aggregate::Max => Func::max(time),
        _ => Func::min(time),
    };
    let select = Query::select()
        .expr_as(function, Alias::new("val"))
        .from(Alias::new(&table_name))
        .to_owned();
    match query_one(conn, &select).await? {
        Some(row) => T::from_row_opt(&row, "val"),
        None => Ok(None),
    }
}

fn inject_credentials(url: &str, user: Option<&str>, password: Option<&str>) -> String {
    let Some(user) = user else {
        return url.to_string();
    };
    if url.contains('@') {
        return url.to_string();
    }
    match url.split_once("://") {
        Some((scheme, rest)) => match password {
            Some(password) => format!("{scheme}://{user}:{password}@{rest}"),
            None => format!("{scheme}://{user}@{rest}"),
        },
        None => url.to_string(),
    }
}

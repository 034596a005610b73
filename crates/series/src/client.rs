use std::marker::PhantomData;

use oxrdf::NamedNode;
use sea_orm::DatabaseConnection;

use kleio_core::{DataType, KleioError, KleioResult, SparqlClient, TimeSeries};

use crate::metadata::SeriesMetadataClient;
use crate::storage::{RdbSeriesStore, SeriesStorage};
use crate::time::TimeValue;
use crate::vocab;

/// Coordinates the time-series metadata in the triple store with the sample
/// storage in the relational database.
///
/// Every composite mutation follows the same skeleton: snapshot what the
/// metadata holds, write the metadata first (one atomic update, cheap to
/// undo), then mutate storage; when the storage step fails the metadata
/// write is compensated, and a failed compensation surfaces as
/// `InconsistentState` naming the orphaned identifier.
///
/// The client never owns a SQL connection: callers pass one into each
/// mutating call and keep it; the legacy URL/user/password configuration on
/// the storage client exists for callers that want [`connect`] to open one
/// per call.
///
/// [`connect`]: RdbSeriesStore::connect
pub struct TimeSeriesClient<T, C, S = RdbSeriesStore<T>> {
    metadata: SeriesMetadataClient<C>,
    storage: S,
    _time: PhantomData<T>,
}

impl<T, C, S> TimeSeriesClient<T, C, S>
where
    T: TimeValue,
    C: SparqlClient,
    S: SeriesStorage<T>,
{
    pub fn new(kb: C, storage: S) -> Self {
        Self {
            metadata: SeriesMetadataClient::new(kb),
            storage,
            _time: PhantomData,
        }
    }

    pub fn metadata(&self) -> &SeriesMetadataClient<C> {
        &self.metadata
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Create a new time-series for the given data IRIs: metadata first,
    /// then the backing table. Returns the minted series IRI.
    pub async fn init_time_series(
        &self,
        data_iris: &[NamedNode],
        data_types: &[DataType],
        time_unit: Option<&NamedNode>,
        srid: Option<i32>,
        conn: &DatabaseConnection,
    ) -> KleioResult<NamedNode> {
        let series = vocab::fresh_series_iri();
        let db_url = self.require_db_url()?;

        self.metadata
            .init(&series, data_iris, &db_url, time_unit)
            .await
            .map_err(|err| KleioError::create(series.as_str(), err))?;

        if let Err(storage_err) = self
            .storage
            .init_table(data_iris, data_types, &series, srid, conn)
            .await
        {
            log::warn!("storage init for {series} failed, removing metadata again");
            return match self.metadata.remove(&series).await {
                Ok(()) => Err(KleioError::create(series.as_str(), storage_err)),
                Err(rollback_err) => Err(KleioError::inconsistent(
                    series.as_str(),
                    format!(
                        "storage initialisation failed and metadata rollback also failed \
                         ({rollback_err}); the triple store holds orphaned triples"
                    ),
                )),
            };
        }
        log::info!("initialised time series {series} with {} columns", data_iris.len());
        Ok(series)
    }

    /// Batched init: metadata for all series lands in one update, storage
    /// tables are created sequentially. A storage failure compensates only
    /// the series it belongs to; earlier series stay well-formed.
    pub async fn bulk_init_time_series(
        &self,
        data_iris: &[Vec<NamedNode>],
        data_types: &[Vec<DataType>],
        time_units: &[Option<NamedNode>],
        srid: Option<i32>,
        conn: &DatabaseConnection,
    ) -> KleioResult<Vec<NamedNode>> {
        if data_iris.len() != data_types.len() || data_iris.len() != time_units.len() {
            return Err(KleioError::precondition(format!(
                "bulk init with {} data IRI lists, {} class lists and {} time units",
                data_iris.len(),
                data_types.len(),
                time_units.len()
            )));
        }
        let db_url = self.require_db_url()?;
        let series_list: Vec<NamedNode> =
            (0..data_iris.len()).map(|_| vocab::fresh_series_iri()).collect();

        self.metadata
            .bulk_init(&series_list, data_iris, &db_url, time_units)
            .await
            .map_err(|err| KleioError::create("bulk init", err))?;

        for (index, series) in series_list.iter().enumerate() {
            if let Err(storage_err) = self
                .storage
                .init_table(&data_iris[index], &data_types[index], series, srid, conn)
                .await
            {
                log::warn!("storage init for {series} failed, removing its metadata again");
                return match self.metadata.remove(series).await {
                    Ok(()) => Err(KleioError::create(series.as_str(), storage_err)),
                    Err(rollback_err) => Err(KleioError::inconsistent(
                        series.as_str(),
                        format!(
                            "storage initialisation failed and metadata rollback also failed \
                             ({rollback_err}); the triple store holds orphaned triples"
                        ),
                    )),
                };
            }
        }
        Ok(series_list)
    }

    /// Append one batch of samples to an already initialised series.
    pub async fn add_time_series_data(
        &self,
        series: &TimeSeries<T>,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        self.storage.add(std::slice::from_ref(series), conn).await
    }

    /// Append batches for several series over a single connection.
    pub async fn bulk_add_time_series_data(
        &self,
        batches: &[TimeSeries<T>],
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        self.storage.add(batches, conn).await
    }

    /// Delete recorded history between the two bounds (inclusive) for the
    /// table backing the data IRI.
    pub async fn delete_time_series_history(
        &self,
        data_iri: &NamedNode,
        lower: &T,
        upper: &T,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        self.storage.delete_rows(data_iri, lower, upper, conn).await
    }

    /// Delete the time-series of one data IRI. When it is the only data IRI
    /// of its series the whole series is deleted instead.
    pub async fn delete_individual_time_series(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        let series = self.metadata.series_of(data_iri).await?.ok_or_else(|| {
            KleioError::precondition(format!(
                "<{}> is not associated with any time series",
                data_iri.as_str()
            ))
        })?;

        if self.metadata.associated_data(&series).await?.len() == 1 {
            return self.delete_time_series(&series, conn).await;
        }

        self.metadata
            .remove_association(data_iri)
            .await
            .map_err(|err| KleioError::delete(data_iri.as_str(), err))?;

        if let Err(storage_err) = self.storage.delete_series(data_iri, conn).await {
            log::warn!("storage delete for {data_iri} failed, restoring its association");
            return match self.metadata.insert_association(data_iri, &series).await {
                Ok(()) => Err(KleioError::delete(data_iri.as_str(), storage_err)),
                Err(rollback_err) => Err(KleioError::inconsistent(
                    data_iri.as_str(),
                    format!(
                        "storage deletion failed and metadata restore also failed \
                         ({rollback_err}); the relational store holds orphaned rows"
                    ),
                )),
            };
        }
        Ok(())
    }

    /// Delete a whole series and every data association from both stores.
    pub async fn delete_time_series(
        &self,
        series: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        if !self.metadata.exists(series).await? {
            return Err(KleioError::precondition(format!(
                "time series <{}> does not exist",
                series.as_str()
            )));
        }

        // Snapshot for re-instantiation in case the storage step fails.
        let data_iris = self.metadata.associated_data(series).await?;
        let time_unit = self.metadata.time_unit(series).await?;
        let db_url = self.metadata.db_url(series).await?.unwrap_or_default();

        self.metadata
            .remove(series)
            .await
            .map_err(|err| KleioError::delete(series.as_str(), err))?;

        let Some(first) = data_iris.first() else {
            return Ok(());
        };
        if let Err(storage_err) = self.storage.delete_table(first, conn).await {
            log::warn!("storage delete for {series} failed, restoring its metadata");
            return match self
                .metadata
                .init(series, &data_iris, &db_url, time_unit.as_ref())
                .await
            {
                Ok(()) => Err(KleioError::delete(series.as_str(), storage_err)),
                Err(rollback_err) => Err(KleioError::inconsistent(
                    series.as_str(),
                    format!(
                        "storage deletion failed and metadata restore also failed \
                         ({rollback_err}); the relational store holds orphaned rows"
                    ),
                )),
            };
        }
        Ok(())
    }

    /// Delete every series from both stores. Best effort: no compensation
    /// is attempted, failures surface as delete errors.
    pub async fn delete_all(&self, conn: &DatabaseConnection) -> KleioResult<()> {
        self.metadata
            .remove_all()
            .await
            .map_err(|err| KleioError::delete("all time series metadata", err))?;
        self.storage
            .delete_all(conn)
            .await
            .map_err(|err| KleioError::delete("all time series storage", err))
    }

    pub async fn time_series_within_bounds(
        &self,
        data_iris: &[NamedNode],
        lower: Option<&T>,
        upper: Option<&T>,
        conn: &DatabaseConnection,
    ) -> KleioResult<TimeSeries<T>> {
        self.storage
            .series_within_bounds(data_iris, lower, upper, conn)
            .await
    }

    /// Entire recorded history for the data IRIs, ascending by time.
    pub async fn time_series(
        &self,
        data_iris: &[NamedNode],
        conn: &DatabaseConnection,
    ) -> KleioResult<TimeSeries<T>> {
        self.storage
            .series_within_bounds(data_iris, None, None, conn)
            .await
    }

    pub async fn latest_data(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<TimeSeries<T>> {
        self.storage.latest(data_iri, conn).await
    }

    pub async fn oldest_data(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<TimeSeries<T>> {
        self.storage.oldest(data_iri, conn).await
    }

    pub async fn average(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<f64> {
        self.storage.average(data_iri, conn).await
    }

    pub async fn max_value(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<f64> {
        self.storage.max_value(data_iri, conn).await
    }

    pub async fn min_value(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<f64> {
        self.storage.min_value(data_iri, conn).await
    }

    pub async fn max_time(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<Option<T>> {
        self.storage.max_time(data_iri, conn).await
    }

    pub async fn min_time(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<Option<T>> {
        self.storage.min_time(data_iri, conn).await
    }

    pub async fn time_series_exists(&self, series: &NamedNode) -> KleioResult<bool> {
        self.metadata.exists(series).await
    }

    pub async fn data_has_time_series(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<bool> {
        self.storage.has_data(data_iri, conn).await
    }

    pub async fn time_unit_exists(&self, series: &NamedNode) -> KleioResult<bool> {
        self.metadata.has_time_unit(series).await
    }

    pub async fn count_time_series(&self) -> KleioResult<u64> {
        self.metadata.count().await
    }

    pub async fn time_series_iri(&self, data_iri: &NamedNode) -> KleioResult<Option<NamedNode>> {
        self.metadata.series_of(data_iri).await
    }

    pub async fn db_url(&self, series: &NamedNode) -> KleioResult<Option<String>> {
        self.metadata.db_url(series).await
    }

    pub async fn time_unit(&self, series: &NamedNode) -> KleioResult<Option<NamedNode>> {
        self.metadata.time_unit(series).await
    }

    pub async fn associated_data(&self, series: &NamedNode) -> KleioResult<Vec<NamedNode>> {
        self.metadata.associated_data(series).await
    }

    pub async fn all_time_series(&self) -> KleioResult<Vec<NamedNode>> {
        self.metadata.list_all().await
    }

    fn require_db_url(&self) -> KleioResult<String> {
        self.storage
            .rdb_url()
            .map(str::to_string)
            .ok_or_else(|| {
                KleioError::config("no relational database URL configured for the storage client")
            })
    }
}

impl<T, C> TimeSeriesClient<T, C, RdbSeriesStore<T>>
where
    T: TimeValue,
    C: SparqlClient,
{
    /// Legacy configuration pass-through for callers that let the client
    /// open connections itself.
    pub fn set_rdb_credentials(
        &mut self,
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) {
        self.storage.set_rdb_url(url);
        self.storage.set_rdb_user(user);
        self.storage.set_rdb_password(password);
    }

    /// Open a connection from the configured URL and credentials.
    pub async fn connect(&self) -> KleioResult<DatabaseConnection> {
        self.storage.connect().await
    }
}

use async_trait::async_trait;
use kleio_core::{DataType, DataValue, KleioError, KleioResult, TimeSeries};
use kleio_series::{RdbSeriesStore, SeriesStorage, TimeSeriesClient};
use kleio_testkit::{memory_db, FlakySparqlClient, MemorySparqlClient};
use oxrdf::NamedNode;
use sea_orm::DatabaseConnection;
use std::sync::atomic::{AtomicBool, Ordering};

fn iri(value: &str) -> NamedNode {
    NamedNode::new(value).expect("valid iri")
}

fn doubles(values: &[f64]) -> Vec<DataValue> {
    values.iter().map(|value| DataValue::Double(*value)).collect()
}

fn storage() -> RdbSeriesStore<i64> {
    let mut storage = RdbSeriesStore::new();
    storage.set_rdb_url("jdbc:postgresql:timeseries");
    storage
}

/// Storage wrapper whose init/delete steps can be switched to fail, used to
/// drive the coordinator's compensation paths.
struct FaultyStorage {
    inner: RdbSeriesStore<i64>,
    fail_init: AtomicBool,
    fail_delete_table: AtomicBool,
    fail_delete_series: AtomicBool,
}

impl FaultyStorage {
    fn new() -> Self {
        Self {
            inner: storage(),
            fail_init: AtomicBool::new(false),
            fail_delete_table: AtomicBool::new(false),
            fail_delete_series: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SeriesStorage<i64> for FaultyStorage {
    async fn init_table(
        &self,
        data_iris: &[NamedNode],
        data_types: &[DataType],
        series: &NamedNode,
        srid: Option<i32>,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(KleioError::storage("injected table creation failure"));
        }
        self.inner
            .init_table(data_iris, data_types, series, srid, conn)
            .await
    }

    async fn add(&self, batches: &[TimeSeries<i64>], conn: &DatabaseConnection) -> KleioResult<()> {
        self.inner.add(batches, conn).await
    }

    async fn series_within_bounds(
        &self,
        data_iris: &[NamedNode],
        lower: Option<&i64>,
        upper: Option<&i64>,
        conn: &DatabaseConnection,
    ) -> KleioResult<TimeSeries<i64>> {
        self.inner
            .series_within_bounds(data_iris, lower, upper, conn)
            .await
    }

    async fn latest(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<TimeSeries<i64>> {
        self.inner.latest(data_iri, conn).await
    }

    async fn oldest(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<TimeSeries<i64>> {
        self.inner.oldest(data_iri, conn).await
    }

    async fn average(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<f64> {
        self.inner.average(data_iri, conn).await
    }

    async fn max_value(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<f64> {
        self.inner.max_value(data_iri, conn).await
    }

    async fn min_value(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<f64> {
        self.inner.min_value(data_iri, conn).await
    }

    async fn max_time(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<Option<i64>> {
        self.inner.max_time(data_iri, conn).await
    }

    async fn min_time(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<Option<i64>> {
        self.inner.min_time(data_iri, conn).await
    }

    async fn delete_rows(
        &self,
        data_iri: &NamedNode,
        lower: &i64,
        upper: &i64,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        self.inner.delete_rows(data_iri, lower, upper, conn).await
    }

    async fn delete_series(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        if self.fail_delete_series.load(Ordering::SeqCst) {
            return Err(KleioError::storage("injected column drop failure"));
        }
        self.inner.delete_series(data_iri, conn).await
    }

    async fn delete_table(
        &self,
        data_iri: &NamedNode,
        conn: &DatabaseConnection,
    ) -> KleioResult<()> {
        if self.fail_delete_table.load(Ordering::SeqCst) {
            return Err(KleioError::storage("injected table drop failure"));
        }
        self.inner.delete_table(data_iri, conn).await
    }

    async fn delete_all(&self, conn: &DatabaseConnection) -> KleioResult<()> {
        self.inner.delete_all(conn).await
    }

    async fn has_data(&self, data_iri: &NamedNode, conn: &DatabaseConnection) -> KleioResult<bool> {
        self.inner.has_data(data_iri, conn).await
    }

    async fn has_series(&self, series: &NamedNode, conn: &DatabaseConnection) -> KleioResult<bool> {
        self.inner.has_series(series, conn).await
    }

    fn rdb_url(&self) -> Option<&str> {
        self.inner.rdb_url()
    }
}

#[tokio::test]
async fn init_creates_both_sides_and_appends_round_trip() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let client = TimeSeriesClient::<i64, _, _>::new(&kb, storage());
    let conn = memory_db().await;
    let data_a = iri("http://a");
    let data_b = iri("http://b");
    let unit = iri("http://s");

    let series = client
        .init_time_series(
            &[data_a.clone(), data_b.clone()],
            &[DataType::Double, DataType::Integer],
            Some(&unit),
            None,
            &conn,
        )
        .await?;

    assert!(client.time_series_exists(&series).await?);
    assert!(client.storage().has_series(&series, &conn).await?);
    assert_eq!(client.associated_data(&series).await?.len(), 2);
    assert_eq!(client.time_unit(&series).await?, Some(unit));
    assert_eq!(
        client.db_url(&series).await?,
        Some("jdbc:postgresql:timeseries".to_string())
    );

    let t0 = 1_000;
    let batch = TimeSeries::new(
        vec![t0, t0 + 1, t0 + 2],
        vec![
            (data_a.clone(), doubles(&[1.0, 2.0, 3.0])),
            (
                data_b.clone(),
                vec![
                    DataValue::Integer(10),
                    DataValue::Integer(20),
                    DataValue::Integer(30),
                ],
            ),
        ],
    )?;
    client.add_time_series_data(&batch, &conn).await?;

    let result = client
        .time_series(&[data_a.clone(), data_b.clone()], &conn)
        .await?;
    assert_eq!(result, batch);

    let window = client
        .time_series_within_bounds(
            std::slice::from_ref(&data_a),
            Some(&(t0 + 1)),
            Some(&(t0 + 1)),
            &conn,
        )
        .await?;
    assert_eq!(window.times(), &[t0 + 1]);
    assert_eq!(
        window.values(&data_a).expect("column"),
        &doubles(&[2.0])[..]
    );
    Ok(())
}

#[tokio::test]
async fn init_without_configured_db_url_is_a_config_error() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let client = TimeSeriesClient::<i64, _, _>::new(&kb, RdbSeriesStore::<i64>::new());
    let conn = memory_db().await;
    let result = client
        .init_time_series(&[iri("http://a")], &[DataType::Double], None, None, &conn)
        .await;
    assert!(matches!(result, Err(KleioError::Config { .. })));
    Ok(())
}

#[tokio::test]
async fn failed_storage_init_rolls_back_metadata() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let faulty = FaultyStorage::new();
    faulty.fail_init.store(true, Ordering::SeqCst);
    let client = TimeSeriesClient::<i64, _, _>::new(&kb, faulty);
    let conn = memory_db().await;

    let result = client
        .init_time_series(&[iri("http://a")], &[DataType::Double], None, None, &conn)
        .await;
    let Err(KleioError::Create { identifier, source }) = result else {
        panic!("expected a create error");
    };
    assert!(matches!(*source, KleioError::Storage { .. }));

    // The compensating rollback removed the metadata again.
    let orphan = NamedNode::new(identifier).expect("identifier is the series iri");
    assert!(!client.time_series_exists(&orphan).await?);
    assert_eq!(client.count_time_series().await?, 0);
    Ok(())
}

#[tokio::test]
async fn failed_rollback_after_failed_init_is_inconsistent_state() -> KleioResult<()> {
    let kb = FlakySparqlClient::new(MemorySparqlClient::new());
    let faulty = FaultyStorage::new();
    faulty.fail_init.store(true, Ordering::SeqCst);
    let client = TimeSeriesClient::<i64, _, _>::new(&kb, faulty);
    let conn = memory_db().await;

    // The metadata write goes through, then every further update (the
    // rollback included) is rejected.
    kb.fail_updates_after(1);
    let result = client
        .init_time_series(&[iri("http://a")], &[DataType::Double], None, None, &conn)
        .await;
    assert!(matches!(result, Err(KleioError::InconsistentState { .. })));
    Ok(())
}

#[tokio::test]
async fn delete_removes_both_sides() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let client = TimeSeriesClient::<i64, _, _>::new(&kb, storage());
    let conn = memory_db().await;

    let series = client
        .init_time_series(
            &[iri("http://a"), iri("http://b")],
            &[DataType::Double, DataType::Double],
            None,
            None,
            &conn,
        )
        .await?;
    client.delete_time_series(&series, &conn).await?;

    assert!(!client.time_series_exists(&series).await?);
    assert!(!client.storage().has_series(&series, &conn).await?);

    let again = client.delete_time_series(&series, &conn).await;
    assert!(matches!(again, Err(KleioError::Precondition { .. })));
    Ok(())
}

#[tokio::test]
async fn failed_storage_delete_restores_metadata() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let faulty = FaultyStorage::new();
    let client = TimeSeriesClient::<i64, _, _>::new(&kb, faulty);
    let conn = memory_db().await;
    let data = iri("http://a");
    let unit = iri("http://s");

    let series = client
        .init_time_series(
            std::slice::from_ref(&data),
            &[DataType::Double],
            Some(&unit),
            None,
            &conn,
        )
        .await?;

    client
        .storage()
        .fail_delete_table
        .store(true, Ordering::SeqCst);
    let result = client.delete_time_series(&series, &conn).await;
    let Err(KleioError::Delete { source, .. }) = result else {
        panic!("expected a delete error");
    };
    assert!(matches!(*source, KleioError::Storage { .. }));

    // Metadata is back, including the snapshot of associations and unit.
    assert!(client.time_series_exists(&series).await?);
    assert_eq!(client.associated_data(&series).await?, vec![data]);
    assert_eq!(client.time_unit(&series).await?, Some(unit));
    Ok(())
}

#[tokio::test]
async fn failed_delete_compensation_names_the_series() -> KleioResult<()> {
    let kb = FlakySparqlClient::new(MemorySparqlClient::new());
    let faulty = FaultyStorage::new();
    let client = TimeSeriesClient::<i64, _, _>::new(&kb, faulty);
    let conn = memory_db().await;

    let series = client
        .init_time_series(&[iri("http://a")], &[DataType::Double], None, None, &conn)
        .await?;

    client
        .storage()
        .fail_delete_table
        .store(true, Ordering::SeqCst);
    // Allow the metadata removal, then reject the compensating re-insert.
    kb.fail_updates_after(1);

    let result = client.delete_time_series(&series, &conn).await;
    let Err(KleioError::InconsistentState { identifier, .. }) = result else {
        panic!("expected inconsistent state");
    };
    assert_eq!(identifier, series.as_str());
    Ok(())
}

#[tokio::test]
async fn delete_individual_keeps_the_rest_of_the_series() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let client = TimeSeriesClient::<i64, _, _>::new(&kb, storage());
    let conn = memory_db().await;
    let data_a = iri("http://a");
    let data_b = iri("http://b");

    let series = client
        .init_time_series(
            &[data_a.clone(), data_b.clone()],
            &[DataType::Double, DataType::Double],
            None,
            None,
            &conn,
        )
        .await?;

    client.delete_individual_time_series(&data_a, &conn).await?;
    assert!(client.time_series_exists(&series).await?);
    assert_eq!(client.time_series_iri(&data_a).await?, None);
    assert!(!client.data_has_time_series(&data_a, &conn).await?);
    assert!(client.data_has_time_series(&data_b, &conn).await?);

    // The last data IRI takes the whole series with it.
    client.delete_individual_time_series(&data_b, &conn).await?;
    assert!(!client.time_series_exists(&series).await?);
    assert!(!client.storage().has_series(&series, &conn).await?);

    let unknown = client.delete_individual_time_series(&data_a, &conn).await;
    assert!(matches!(unknown, Err(KleioError::Precondition { .. })));
    Ok(())
}

#[tokio::test]
async fn failed_column_drop_restores_the_association() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let faulty = FaultyStorage::new();
    let client = TimeSeriesClient::<i64, _, _>::new(&kb, faulty);
    let conn = memory_db().await;
    let data_a = iri("http://a");
    let data_b = iri("http://b");

    let series = client
        .init_time_series(
            &[data_a.clone(), data_b.clone()],
            &[DataType::Double, DataType::Double],
            None,
            None,
            &conn,
        )
        .await?;

    client
        .storage()
        .fail_delete_series
        .store(true, Ordering::SeqCst);
    let result = client.delete_individual_time_series(&data_a, &conn).await;
    assert!(matches!(result, Err(KleioError::Delete { .. })));

    // The association was re-inserted by the compensation.
    assert_eq!(client.time_series_iri(&data_a).await?, Some(series));
    Ok(())
}

#[tokio::test]
async fn bulk_init_compensates_only_the_failing_series() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let client = TimeSeriesClient::<i64, _, _>::new(&kb, storage());
    let conn = memory_db().await;
    let data_a = iri("http://a");

    // The second entry reuses the first one's data IRI, so its storage
    // init fails on the duplicate.
    let result = client
        .bulk_init_time_series(
            &[vec![data_a.clone()], vec![data_a.clone()]],
            &[vec![DataType::Double], vec![DataType::Double]],
            &[None, None],
            None,
            &conn,
        )
        .await;
    assert!(matches!(result, Err(KleioError::Create { .. })));

    // The first series survived intact in both stores.
    assert_eq!(client.count_time_series().await?, 1);
    let series = client
        .time_series_iri(&data_a)
        .await?
        .expect("first series still associated");
    assert!(client.time_series_exists(&series).await?);
    assert!(client.storage().has_series(&series, &conn).await?);
    Ok(())
}

#[tokio::test]
async fn bulk_init_happy_path_and_delete_all() -> KleioResult<()> {
    let kb = MemorySparqlClient::new();
    let client = TimeSeriesClient::<i64, _, _>::new(&kb, storage());
    let conn = memory_db().await;
    let data_a = iri("http://a");
    let data_b = iri("http://b");

    let series = client
        .bulk_init_time_series(
            &[vec![data_a.clone()], vec![data_b.clone()]],
            &[vec![DataType::Double], vec![DataType::Integer]],
            &[None, None],
            None,
            &conn,
        )
        .await?;
    assert_eq!(series.len(), 2);
    assert_eq!(client.count_time_series().await?, 2);
    assert!(client.data_has_time_series(&data_a, &conn).await?);

    client.delete_all(&conn).await?;
    assert_eq!(client.count_time_series().await?, 0);
    assert!(!client.data_has_time_series(&data_a, &conn).await?);
    assert!(!client.data_has_time_series(&data_b, &conn).await?);
    Ok(())
}

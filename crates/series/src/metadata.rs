use std::fmt::Write as _;

use oxrdf::NamedNode;

use kleio_core::{escape_literal, KleioError, KleioResult, SparqlClient};

use crate::vocab::{HAS_RDB, HAS_TIME_SERIES, HAS_TIME_UNIT, TIME_SERIES};

/// Formulates the SPARQL reads and writes describing time-series entities.
///
/// Every mutating operation is a single SPARQL update; the gateway
/// guarantees atomicity per call, so no two-step metadata write exists.
#[derive(Clone, Debug)]
pub struct SeriesMetadataClient<C> {
    kb: C,
}

impl<C: SparqlClient> SeriesMetadataClient<C> {
    pub fn new(kb: C) -> Self {
        Self { kb }
    }

    /// Record a series, its backing database URL, its data associations and
    /// the optional time unit in one atomic update.
    pub async fn init(
        &self,
        series: &NamedNode,
        data_iris: &[NamedNode],
        db_url: &str,
        time_unit: Option<&NamedNode>,
    ) -> KleioResult<()> {
        let mut triples = String::new();
        push_series_triples(&mut triples, series, data_iris, db_url, time_unit);
        self.kb.update(&format!("INSERT DATA {{\n{triples}}}")).await
    }

    /// The batched form of [`init`](Self::init): all series land in one
    /// update.
    pub async fn bulk_init(
        &self,
        series_list: &[NamedNode],
        data_iris: &[Vec<NamedNode>],
        db_url: &str,
        time_units: &[Option<NamedNode>],
    ) -> KleioResult<()> {
        if series_list.len() != data_iris.len() || series_list.len() != time_units.len() {
            return Err(KleioError::precondition(format!(
                "bulk init with {} series, {} data IRI lists and {} time units",
                series_list.len(),
                data_iris.len(),
                time_units.len()
            )));
        }
        let mut triples = String::new();
        for ((series, data), unit) in series_list.iter().zip(data_iris).zip(time_units) {
            push_series_triples(&mut triples, series, data, db_url, unit.as_ref());
        }
        self.kb.update(&format!("INSERT DATA {{\n{triples}}}")).await
    }

    pub async fn exists(&self, series: &NamedNode) -> KleioResult<bool> {
        self.kb
            .ask(&format!("ASK {{ {series} a <{TIME_SERIES}> }}"))
            .await
    }

    /// Delete every triple in which the series appears as subject or
    /// object. A no-op when the series is absent.
    pub async fn remove(&self, series: &NamedNode) -> KleioResult<()> {
        if !self.exists(series).await? {
            return Ok(());
        }
        self.kb
            .update(&format!(
                "DELETE WHERE {{ {series} ?p ?o }} ;\nDELETE WHERE {{ ?s ?p {series} }}"
            ))
            .await
    }

    /// Remove every series currently recorded.
    pub async fn remove_all(&self) -> KleioResult<()> {
        for series in self.list_all().await? {
            self.remove(&series).await?;
        }
        Ok(())
    }

    /// Drop the single association triple of one data IRI.
    pub async fn remove_association(&self, data_iri: &NamedNode) -> KleioResult<()> {
        self.kb
            .update(&format!(
                "DELETE WHERE {{ {data_iri} <{HAS_TIME_SERIES}> ?series }}"
            ))
            .await
    }

    /// Inverse of [`remove_association`](Self::remove_association), used for
    /// compensation.
    pub async fn insert_association(
        &self,
        data_iri: &NamedNode,
        series: &NamedNode,
    ) -> KleioResult<()> {
        self.kb
            .update(&format!(
                "INSERT DATA {{ {data_iri} <{HAS_TIME_SERIES}> {series} . }}"
            ))
            .await
    }

    /// Data IRIs attached to the series; empty when the series is absent.
    pub async fn associated_data(&self, series: &NamedNode) -> KleioResult<Vec<NamedNode>> {
        let rows = self
            .kb
            .select(&format!(
                "SELECT ?data WHERE {{ ?data <{HAS_TIME_SERIES}> {series} }}"
            ))
            .await?;
        rows.iter().map(|row| row.named_node("data")).collect()
    }

    pub async fn series_of(&self, data_iri: &NamedNode) -> KleioResult<Option<NamedNode>> {
        let rows = self
            .kb
            .select(&format!(
                "SELECT ?series WHERE {{ {data_iri} <{HAS_TIME_SERIES}> ?series }}"
            ))
            .await?;
        rows.first().map(|row| row.named_node("series")).transpose()
    }

    pub async fn db_url(&self, series: &NamedNode) -> KleioResult<Option<String>> {
        let rows = self
            .kb
            .select(&format!("SELECT ?url WHERE {{ {series} <{HAS_RDB}> ?url }}"))
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("url"))
            .map(str::to_string))
    }

    pub async fn time_unit(&self, series: &NamedNode) -> KleioResult<Option<NamedNode>> {
        let rows = self
            .kb
            .select(&format!(
                "SELECT ?unit WHERE {{ {series} <{HAS_TIME_UNIT}> ?unit }}"
            ))
            .await?;
        rows.first().map(|row| row.named_node("unit")).transpose()
    }

    pub async fn has_time_unit(&self, series: &NamedNode) -> KleioResult<bool> {
        self.kb
            .ask(&format!("ASK {{ {series} <{HAS_TIME_UNIT}> ?unit }}"))
            .await
    }

    pub async fn count(&self) -> KleioResult<u64> {
        let rows = self
            .kb
            .select(&format!(
                "SELECT (COUNT(?series) AS ?count) WHERE {{ ?series a <{TIME_SERIES}> }}"
            ))
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| KleioError::metadata_read("count query returned no row"))?;
        Ok(row.integer("count")?.max(0) as u64)
    }

    pub async fn list_all(&self) -> KleioResult<Vec<NamedNode>> {
        let rows = self
            .kb
            .select(&format!(
                "SELECT ?series WHERE {{ ?series a <{TIME_SERIES}> }}"
            ))
            .await?;
        rows.iter().map(|row| row.named_node("series")).collect()
    }
}

fn push_series_triples(
    out: &mut String,
    series: &NamedNode,
    data_iris: &[NamedNode],
    db_url: &str,
    time_unit: Option<&NamedNode>,
) {
    let _ = writeln!(out, "  {series} a <{TIME_SERIES}> .");
    let _ = writeln!(out, "  {series} <{HAS_RDB}> {} .", escape_literal(db_url));
    for data_iri in data_iris {
        let _ = writeln!(out, "  {data_iri} <{HAS_TIME_SERIES}> {series} .");
    }
    if let Some(unit) = time_unit {
        let _ = writeln!(out, "  {series} <{HAS_TIME_UNIT}> {unit} .");
    }
}

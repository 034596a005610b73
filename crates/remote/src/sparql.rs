use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use kleio_core::{Binding, KleioError, KleioResult, SparqlClient, StoreConfig};

/// SPARQL 1.1 protocol client against a remote query and update endpoint.
///
/// Queries are POSTed as `query=` form parameters with results requested as
/// `application/sparql-results+json`; updates are POSTed as `update=` form
/// parameters. The store guarantees atomicity per update request.
#[derive(Clone, Debug)]
pub struct RemoteSparqlClient {
    http: reqwest::Client,
    query_endpoint: String,
    update_endpoint: String,
}

impl RemoteSparqlClient {
    pub fn new(query_endpoint: impl Into<String>, update_endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            query_endpoint: query_endpoint.into(),
            update_endpoint: update_endpoint.into(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> KleioResult<Self> {
        Ok(Self::new(
            config.require_query_endpoint()?,
            config.require_update_endpoint()?,
        ))
    }

    pub fn query_endpoint(&self) -> &str {
        &self.query_endpoint
    }

    pub fn update_endpoint(&self) -> &str {
        &self.update_endpoint
    }

    async fn run_query(&self, query: &str) -> KleioResult<String> {
        let response = self
            .http
            .post(&self.query_endpoint)
            .header("Accept", "application/sparql-results+json")
            .form(&[("query", query)])
            .send()
            .await
            .map_err(|err| {
                KleioError::metadata_read(format!(
                    "query to {} failed: {err}",
                    self.query_endpoint
                ))
            })?;
        let status = response.status();
        let body = response.text().await.map_err(|err| {
            KleioError::metadata_read(format!("reading query response failed: {err}"))
        })?;
        if !status.is_success() {
            return Err(KleioError::metadata_read(format!(
                "query endpoint {} returned {status}: {}",
                self.query_endpoint,
                truncate(&body)
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl SparqlClient for RemoteSparqlClient {
    async fn select(&self, query: &str) -> KleioResult<Vec<Binding>> {
        let body = self.run_query(query).await?;
        parse_select(&body)
    }

    async fn ask(&self, query: &str) -> KleioResult<bool> {
        let body = self.run_query(query).await?;
        parse_ask(&body)
    }

    async fn update(&self, update: &str) -> KleioResult<()> {
        let response = self
            .http
            .post(&self.update_endpoint)
            .form(&[("update", update)])
            .send()
            .await
            .map_err(|err| {
                KleioError::metadata_write(format!(
                    "update to {} failed: {err}",
                    self.update_endpoint
                ))
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KleioError::metadata_write(format!(
                "update endpoint {} returned {status}: {}",
                self.update_endpoint,
                truncate(&body)
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct SelectDocument {
    results: SelectResults,
}

#[derive(Deserialize)]
struct SelectResults {
    bindings: Vec<HashMap<String, BoundTerm>>,
}

#[derive(Deserialize)]
struct BoundTerm {
    value: String,
}

#[derive(Deserialize)]
struct AskDocument {
    boolean: bool,
}

fn parse_select(body: &str) -> KleioResult<Vec<Binding>> {
    let document: SelectDocument = serde_json::from_str(body)
        .map_err(|err| KleioError::metadata_read(format!("malformed SELECT results: {err}")))?;
    Ok(document
        .results
        .bindings
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(variable, term)| (variable, term.value))
                .collect()
        })
        .collect())
}

fn parse_ask(body: &str) -> KleioResult<bool> {
    let document: AskDocument = serde_json::from_str(body)
        .map_err(|err| KleioError::metadata_read(format!("malformed ASK result: {err}")))?;
    Ok(document.boolean)
}

fn truncate(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

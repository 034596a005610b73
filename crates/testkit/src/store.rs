use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use oxigraph::model::Term;
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use kleio_core::{Binding, KleioError, KleioResult, SparqlClient};

/// `SparqlClient` over a purely in-memory oxigraph store. Full SPARQL 1.1
/// query/update semantics with per-call atomic updates, like a real
/// endpoint.
pub struct MemorySparqlClient {
    store: Store,
}

impl MemorySparqlClient {
    pub fn new() -> Self {
        Self {
            store: Store::new().expect("in-memory store"),
        }
    }
}

impl Default for MemorySparqlClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SparqlClient for MemorySparqlClient {
    async fn select(&self, query: &str) -> KleioResult<Vec<Binding>> {
        let results = self
            .store
            .query(query)
            .map_err(|err| KleioError::metadata_read(err.to_string()))?;
        let QueryResults::Solutions(solutions) = results else {
            return Err(KleioError::metadata_read("query did not produce solutions"));
        };
        let mut rows = Vec::new();
        for solution in solutions {
            let solution = solution.map_err(|err| KleioError::metadata_read(err.to_string()))?;
            let mut binding = Binding::new();
            for (variable, term) in solution.iter() {
                binding.insert(variable.as_str(), term_value(term));
            }
            rows.push(binding);
        }
        Ok(rows)
    }

    async fn ask(&self, query: &str) -> KleioResult<bool> {
        let results = self
            .store
            .query(query)
            .map_err(|err| KleioError::metadata_read(err.to_string()))?;
        let QueryResults::Boolean(value) = results else {
            return Err(KleioError::metadata_read("query did not produce a boolean"));
        };
        Ok(value)
    }

    async fn update(&self, update: &str) -> KleioResult<()> {
        self.store
            .update(update)
            .map_err(|err| KleioError::metadata_write(err.to_string()))
    }
}

fn term_value(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_string(),
        Term::Literal(literal) => literal.value().to_string(),
        other => other.to_string(),
    }
}

/// Wrapper that lets a test script update failures: after the configured
/// number of further updates, every update is rejected. Reads always pass
/// through.
pub struct FlakySparqlClient<C> {
    inner: C,
    allowed_updates: AtomicI64,
}

impl<C> FlakySparqlClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            allowed_updates: AtomicI64::new(i64::MAX),
        }
    }

    /// Let `remaining` more updates succeed, then reject all further ones.
    pub fn fail_updates_after(&self, remaining: i64) {
        self.allowed_updates.store(remaining, Ordering::SeqCst);
    }

    pub fn allow_all_updates(&self) {
        self.allowed_updates.store(i64::MAX, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: SparqlClient> SparqlClient for FlakySparqlClient<C> {
    async fn select(&self, query: &str) -> KleioResult<Vec<Binding>> {
        self.inner.select(query).await
    }

    async fn ask(&self, query: &str) -> KleioResult<bool> {
        self.inner.ask(query).await
    }

    async fn update(&self, update: &str) -> KleioResult<()> {
        if self.allowed_updates.fetch_sub(1, Ordering::SeqCst) <= 0 {
            return Err(KleioError::metadata_write("injected update failure"));
        }
        self.inner.update(update).await
    }
}

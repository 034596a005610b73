use std::collections::HashMap;

use async_trait::async_trait;
use oxrdf::NamedNode;

use crate::{KleioError, KleioResult};

/// One result row of a SELECT query: variable name to the plain lexical
/// value of the bound term (IRIs without angle brackets, literals without
/// quotes).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Binding(HashMap<String, String>);

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, variable: impl Into<String>, value: impl Into<String>) {
        self.0.insert(variable.into(), value.into());
    }

    pub fn get(&self, variable: &str) -> Option<&str> {
        self.0.get(variable).map(String::as_str)
    }

    pub fn string(&self, variable: &str) -> KleioResult<&str> {
        self.get(variable)
            .ok_or_else(|| KleioError::metadata_read(format!("variable ?{variable} is unbound")))
    }

    pub fn named_node(&self, variable: &str) -> KleioResult<NamedNode> {
        let value = self.string(variable)?;
        NamedNode::new(value).map_err(|err| {
            KleioError::metadata_read(format!("?{variable} is not an IRI ({value}): {err}"))
        })
    }

    pub fn integer(&self, variable: &str) -> KleioResult<i64> {
        let value = self.string(variable)?;
        value.parse().map_err(|err| {
            KleioError::metadata_read(format!("?{variable} is not an integer ({value}): {err}"))
        })
    }
}

impl FromIterator<(String, String)> for Binding {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Query/update transport to a triple store. Updates are atomic per call:
/// the whole request takes effect or none of it does.
#[async_trait]
pub trait SparqlClient: Send + Sync {
    async fn select(&self, query: &str) -> KleioResult<Vec<Binding>>;

    async fn ask(&self, query: &str) -> KleioResult<bool>;

    async fn update(&self, update: &str) -> KleioResult<()>;
}

#[async_trait]
impl<C: SparqlClient> SparqlClient for &C {
    async fn select(&self, query: &str) -> KleioResult<Vec<Binding>> {
        (**self).select(query).await
    }

    async fn ask(&self, query: &str) -> KleioResult<bool> {
        (**self).ask(query).await
    }

    async fn update(&self, update: &str) -> KleioResult<()> {
        (**self).update(update).await
    }
}

/// Quote a string as a SPARQL literal, escaping the characters that would
/// terminate or corrupt it.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape_literal(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(escape_literal("line\nbreak"), "\"line\\nbreak\"");
    }

    #[test]
    fn binding_accessors() {
        let mut binding = Binding::new();
        binding.insert("ts", "http://example.org/ts1");
        binding.insert("count", "42");
        assert_eq!(
            binding.named_node("ts").expect("iri").as_str(),
            "http://example.org/ts1"
        );
        assert_eq!(binding.integer("count").expect("int"), 42);
        assert!(matches!(
            binding.named_node("missing"),
            Err(KleioError::MetadataRead { .. })
        ));
        assert!(matches!(
            binding.integer("ts"),
            Err(KleioError::MetadataRead { .. })
        ));
    }
}

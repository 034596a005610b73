use oxrdf::NamedNode;
use uuid::Uuid;

/// OntoTimeSeries vocabulary and the instance namespace used when minting
/// fresh series identifiers.
pub const NS_ONTOLOGY: &str =
    "http://www.theworldavatar.com/ontology/ontotimeseries/OntoTimeSeries.owl#";
pub const NS_KB: &str = "http://www.theworldavatar.com/kb/ontotimeseries/";

pub const TIME_SERIES: &str =
    "http://www.theworldavatar.com/ontology/ontotimeseries/OntoTimeSeries.owl#TimeSeries";
pub const HAS_TIME_SERIES: &str =
    "http://www.theworldavatar.com/ontology/ontotimeseries/OntoTimeSeries.owl#hasTimeSeries";
pub const HAS_RDB: &str =
    "http://www.theworldavatar.com/ontology/ontotimeseries/OntoTimeSeries.owl#hasRDB";
pub const HAS_TIME_UNIT: &str =
    "http://www.theworldavatar.com/ontology/ontotimeseries/OntoTimeSeries.owl#hasTimeUnit";

/// Mint a fresh series IRI in the instance namespace.
pub fn fresh_series_iri() -> NamedNode {
    NamedNode::new(format!("{NS_KB}Timeseries_{}", Uuid::new_v4()))
        .expect("minted series IRI is a valid IRI")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_iris_are_unique_and_namespaced() {
        let a = fresh_series_iri();
        let b = fresh_series_iri();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(NS_KB));
    }
}

use std::time::{SystemTime, UNIX_EPOCH};

use oxrdf::NamedNode;
use uuid::Uuid;

/// OntoDerived, OntoAgent and W3C time vocabulary.
pub const NS_DERIVED: &str =
    "http://www.theworldavatar.com/ontology/ontoderived/ontoderived.owl#";

pub const DERIVED_QUANTITY: &str =
    "http://www.theworldavatar.com/ontology/ontoderived/ontoderived.owl#DerivedQuantity";
pub const DERIVED_QUANTITY_WITH_TIME_SERIES: &str =
    "http://www.theworldavatar.com/ontology/ontoderived/ontoderived.owl#DerivedQuantityWithTimeSeries";
pub const IS_DERIVED_FROM: &str =
    "http://www.theworldavatar.com/ontology/ontoderived/ontoderived.owl#isDerivedFrom";
pub const IS_DERIVED_USING: &str =
    "http://www.theworldavatar.com/ontology/ontoderived/ontoderived.owl#isDerivedUsing";
pub const BELONGS_TO: &str =
    "http://www.theworldavatar.com/ontology/ontoderived/ontoderived.owl#belongsTo";

pub const SERVICE: &str = "http://www.theworldavatar.com/ontology/ontoagent/MSM.owl#Service";
pub const HAS_HTTP_URL: &str =
    "http://www.theworldavatar.com/ontology/ontoagent/MSM.owl#hasHttpUrl";

pub const TIME_POSITION: &str = "http://www.w3.org/2006/time#TimePosition";
pub const HAS_TIME: &str = "http://www.w3.org/2006/time#hasTime";
pub const NUMERIC_POSITION: &str = "http://www.w3.org/2006/time#numericPosition";

/// Mint a fresh time-position IRI. Uses a UUID so concurrent writers cannot
/// collide.
pub fn fresh_time_iri() -> NamedNode {
    NamedNode::new(format!("{NS_DERIVED}time_{}", Uuid::new_v4()))
        .expect("minted time-position IRI is a valid IRI")
}

/// Current wall clock as integer seconds since the Unix epoch.
pub fn epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_time_iris_are_unique() {
        assert_ne!(fresh_time_iri(), fresh_time_iri());
    }

    #[test]
    fn epoch_seconds_is_past_2020() {
        assert!(epoch_seconds() > 1_577_836_800);
    }
}

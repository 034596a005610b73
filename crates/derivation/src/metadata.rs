use std::fmt::Write as _;

use oxrdf::NamedNode;

use kleio_core::{escape_literal, KleioError, KleioResult, SparqlClient};

use crate::vocab::{
    epoch_seconds, fresh_time_iri, BELONGS_TO, DERIVED_QUANTITY,
    DERIVED_QUANTITY_WITH_TIME_SERIES, HAS_HTTP_URL, HAS_TIME, IS_DERIVED_FROM, IS_DERIVED_USING,
    NUMERIC_POSITION, SERVICE, TIME_POSITION,
};

/// Formulates the SPARQL describing derived nodes: their agent, their
/// inputs, their outputs and their time position.
#[derive(Clone, Debug)]
pub struct DerivationMetadataClient<C> {
    kb: C,
}

impl<C: SparqlClient> DerivationMetadataClient<C> {
    pub fn new(kb: C) -> Self {
        Self { kb }
    }

    /// Record a derived node whose outputs are replaced on every refresh.
    /// `time` defaults to the current wall clock. Fails when the node was
    /// already initialised.
    pub async fn init_derived(
        &self,
        node: &NamedNode,
        agent: &NamedNode,
        agent_url: &str,
        inputs: &[NamedNode],
        time: Option<i64>,
    ) -> KleioResult<()> {
        self.init_with_class(node, DERIVED_QUANTITY, agent, agent_url, inputs, time)
            .await
    }

    /// Record a derived node whose agent appends samples to an existing
    /// time-series instead of replacing outputs.
    pub async fn init_derived_with_time_series(
        &self,
        node: &NamedNode,
        agent: &NamedNode,
        agent_url: &str,
        inputs: &[NamedNode],
        time: Option<i64>,
    ) -> KleioResult<()> {
        self.init_with_class(
            node,
            DERIVED_QUANTITY_WITH_TIME_SERIES,
            agent,
            agent_url,
            inputs,
            time,
        )
        .await
    }

    async fn init_with_class(
        &self,
        node: &NamedNode,
        class: &str,
        agent: &NamedNode,
        agent_url: &str,
        inputs: &[NamedNode],
        time: Option<i64>,
    ) -> KleioResult<()> {
        if self.is_initialised(node).await? {
            return Err(KleioError::precondition(format!(
                "derived node <{}> is already initialised",
                node.as_str()
            )));
        }
        let time_iri = fresh_time_iri();
        let timestamp = time.unwrap_or_else(epoch_seconds);
        let mut triples = String::new();
        let _ = writeln!(triples, "  {node} a <{class}> .");
        let _ = writeln!(triples, "  {node} <{IS_DERIVED_USING}> {agent} .");
        let _ = writeln!(triples, "  {agent} a <{SERVICE}> .");
        let _ = writeln!(
            triples,
            "  {agent} <{HAS_HTTP_URL}> {} .",
            escape_literal(agent_url)
        );
        let _ = writeln!(triples, "  {node} <{HAS_TIME}> {time_iri} .");
        let _ = writeln!(triples, "  {time_iri} a <{TIME_POSITION}> .");
        let _ = writeln!(triples, "  {time_iri} <{NUMERIC_POSITION}> {timestamp} .");
        for input in inputs {
            let _ = writeln!(triples, "  {node} <{IS_DERIVED_FROM}> {input} .");
        }
        self.kb.update(&format!("INSERT DATA {{\n{triples}}}")).await
    }

    pub async fn is_initialised(&self, node: &NamedNode) -> KleioResult<bool> {
        self.kb
            .ask(&format!(
                "ASK {{ {{ {node} a <{DERIVED_QUANTITY}> }} UNION {{ {node} a <{DERIVED_QUANTITY_WITH_TIME_SERIES}> }} }}"
            ))
            .await
    }

    /// Mark entities as outputs of the node.
    pub async fn attach_outputs(
        &self,
        entities: &[NamedNode],
        node: &NamedNode,
    ) -> KleioResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let mut triples = String::new();
        for entity in entities {
            let _ = writeln!(triples, "  {entity} <{BELONGS_TO}> {node} .");
        }
        self.kb.update(&format!("INSERT DATA {{\n{triples}}}")).await
    }

    /// Attach a fresh time position to a plain input. `time` defaults to the
    /// current wall clock.
    pub async fn add_time_instance(&self, entity: &NamedNode, time: Option<i64>) -> KleioResult<()> {
        let time_iri = fresh_time_iri();
        let timestamp = time.unwrap_or_else(epoch_seconds);
        self.kb
            .update(&format!(
                "INSERT DATA {{\n  {entity} <{HAS_TIME}> {time_iri} .\n  {time_iri} a <{TIME_POSITION}> .\n  {time_iri} <{NUMERIC_POSITION}> {timestamp} .\n}}"
            ))
            .await
    }

    pub async fn agent_url(&self, node: &NamedNode) -> KleioResult<String> {
        let rows = self
            .kb
            .select(&format!(
                "SELECT ?url WHERE {{ {node} <{IS_DERIVED_USING}> ?agent . ?agent <{HAS_HTTP_URL}> ?url }}"
            ))
            .await?;
        let row = rows.first().ok_or_else(|| {
            KleioError::metadata_read(format!("no agent URL recorded for <{}>", node.as_str()))
        })?;
        Ok(row.string("url")?.to_string())
    }

    /// Direct inputs of the node, in triple-store order.
    pub async fn inputs(&self, node: &NamedNode) -> KleioResult<Vec<NamedNode>> {
        let rows = self
            .kb
            .select(&format!(
                "SELECT ?input WHERE {{ {node} <{IS_DERIVED_FROM}> ?input }}"
            ))
            .await?;
        rows.iter().map(|row| row.named_node("input")).collect()
    }

    /// Direct inputs plus, for inputs that are outputs of another derived
    /// node, that owning node. This is the neighbour set walked during
    /// traversal.
    pub async fn inputs_and_owning_derived(&self, node: &NamedNode) -> KleioResult<Vec<NamedNode>> {
        let rows = self
            .kb
            .select(&format!(
                "SELECT DISTINCT ?x WHERE {{\n  {{ {node} <{IS_DERIVED_FROM}> ?x }}\n  UNION\n  {{ {node} <{IS_DERIVED_FROM}> ?input . ?input <{BELONGS_TO}> ?x }}\n}}"
            ))
            .await?;
        rows.iter().map(|row| row.named_node("x")).collect()
    }

    /// Numeric time position of any instance. Errors when the instance has
    /// no readable timestamp.
    pub async fn timestamp(&self, instance: &NamedNode) -> KleioResult<i64> {
        let rows = self
            .kb
            .select(&format!(
                "SELECT ?timestamp WHERE {{ {instance} <{HAS_TIME}> ?time . ?time <{NUMERIC_POSITION}> ?timestamp }}"
            ))
            .await?;
        let row = rows.first().ok_or_else(|| {
            KleioError::metadata_read(format!("no timestamp recorded for <{}>", instance.as_str()))
        })?;
        row.integer("timestamp")
    }

    /// Replace the instance's numeric position in one atomic update. `time`
    /// defaults to the current wall clock.
    pub async fn update_timestamp(&self, instance: &NamedNode, time: Option<i64>) -> KleioResult<()> {
        let timestamp = time.unwrap_or_else(epoch_seconds);
        self.kb
            .update(&format!(
                "DELETE {{ ?time <{NUMERIC_POSITION}> ?old }}\nINSERT {{ ?time <{NUMERIC_POSITION}> {timestamp} }}\nWHERE {{ {instance} <{HAS_TIME}> ?time . ?time <{NUMERIC_POSITION}> ?old }}"
            ))
            .await
    }

    /// Current outputs of the node (`?x belongsTo node`).
    pub async fn derived_entities(&self, node: &NamedNode) -> KleioResult<Vec<NamedNode>> {
        let rows = self
            .kb
            .select(&format!(
                "SELECT ?entity WHERE {{ ?entity <{BELONGS_TO}> {node} }}"
            ))
            .await?;
        rows.iter().map(|row| row.named_node("entity")).collect()
    }

    /// For each entity, every downstream derived node referencing it as an
    /// input, paired with the entity's rdf:type.
    pub async fn derived_from_entities(
        &self,
        entities: &[NamedNode],
    ) -> KleioResult<Vec<(NamedNode, NamedNode)>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let mut values = String::new();
        for entity in entities {
            let _ = write!(values, "{entity} ");
        }
        let rows = self
            .kb
            .select(&format!(
                "SELECT ?derived ?type WHERE {{\n  VALUES ?entity {{ {values}}}\n  ?derived <{IS_DERIVED_FROM}> ?entity .\n  ?entity a ?type .\n}}"
            ))
            .await?;
        rows.iter()
            .map(|row| Ok((row.named_node("derived")?, row.named_node("type")?)))
            .collect()
    }

    /// The rdf:type of an entity. Errors when untyped.
    pub async fn instance_class(&self, entity: &NamedNode) -> KleioResult<NamedNode> {
        let rows = self
            .kb
            .select(&format!("SELECT ?class WHERE {{ {entity} a ?class }}"))
            .await?;
        let row = rows.first().ok_or_else(|| {
            KleioError::metadata_read(format!("<{}> has no rdf:type", entity.as_str()))
        })?;
        row.named_node("class")
    }

    pub async fn is_derived_with_time_series(&self, node: &NamedNode) -> KleioResult<bool> {
        self.kb
            .ask(&format!(
                "ASK {{ {node} a <{DERIVED_QUANTITY_WITH_TIME_SERIES}> }}"
            ))
            .await
    }

    /// Record that the downstream derived node is now derived from the new
    /// entity.
    pub async fn reconnect_input(
        &self,
        new_entity: &NamedNode,
        downstream: &NamedNode,
    ) -> KleioResult<()> {
        self.kb
            .update(&format!(
                "INSERT DATA {{ {downstream} <{IS_DERIVED_FROM}> {new_entity} . }}"
            ))
            .await
    }

    /// Delete every triple mentioning any of the entities, on either side,
    /// in one atomic update.
    pub async fn delete_instances(&self, entities: &[NamedNode]) -> KleioResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let operations: Vec<String> = entities
            .iter()
            .flat_map(|entity| {
                [
                    format!("DELETE WHERE {{ {entity} ?p ?o }}"),
                    format!("DELETE WHERE {{ ?s ?p {entity} }}"),
                ]
            })
            .collect();
        self.kb.update(&operations.join(" ;\n")).await
    }
}

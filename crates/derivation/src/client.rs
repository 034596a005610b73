use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use oxrdf::NamedNode;

use kleio_core::{AgentClient, KleioError, KleioResult, SparqlClient};

use crate::metadata::DerivationMetadataClient;

/// Brings derived nodes up to date.
///
/// `update` recursively refreshes every stale predecessor before the node
/// itself; a refresh calls the node's agent, replaces its outputs (except
/// for time-series derived nodes), reconnects downstream consumers by
/// rdf:type and finally advances the node's timestamp. Progress is best
/// effort: an agent failure aborts the walk but already refreshed
/// predecessors stay refreshed.
pub struct DerivationClient<C, A> {
    meta: DerivationMetadataClient<C>,
    agent: A,
}

impl<C: SparqlClient, A: AgentClient> DerivationClient<C, A> {
    pub fn new(kb: C, agent: A) -> Self {
        Self {
            meta: DerivationMetadataClient::new(kb),
            agent,
        }
    }

    pub fn metadata(&self) -> &DerivationMetadataClient<C> {
        &self.meta
    }

    /// Make the node current with respect to the `isDerivedFrom` closure.
    pub async fn update(&self, node: &NamedNode) -> KleioResult<()> {
        let mut visited = HashSet::new();
        self.update_node(node.clone(), &mut visited).await
    }

    /// Traversal-only check: true when the closure of the node is acyclic
    /// and every visited derived node plus every input carries a readable
    /// timestamp. Never mutates the store.
    pub async fn validate(&self, node: &NamedNode) -> bool {
        let mut visited = HashSet::new();
        match self.validate_node(node.clone(), &mut visited).await {
            Ok(()) => true,
            Err(err) => {
                log::warn!("validation of {node} failed: {err}");
                false
            }
        }
    }

    fn update_node<'a>(
        &'a self,
        node: NamedNode,
        visited: &'a mut HashSet<NamedNode>,
    ) -> Pin<Box<dyn Future<Output = KleioResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let neighbours = self.meta.inputs_and_owning_derived(&node).await?;
            for neighbour in neighbours {
                if visited.contains(&neighbour) {
                    return Err(KleioError::circular(format!(
                        "{neighbour} reached again while updating it"
                    )));
                }
                visited.insert(node.clone());
                self.update_node(neighbour, visited).await?;
            }

            let inputs = self.meta.inputs(&node).await?;
            if inputs.is_empty() {
                // A plain input, nothing to recompute.
                return Ok(());
            }

            if !self.out_of_date(&node, &inputs).await? {
                log::debug!("{node} is up to date");
                return Ok(());
            }

            let agent_url = self.meta.agent_url(&node).await?;
            log::info!("refreshing {node} via {agent_url}");
            let outputs = self.agent.call(&agent_url, &inputs).await?;

            if !self.meta.is_derived_with_time_series(&node).await? {
                self.reconcile_outputs(&node, &outputs).await?;
            }
            self.meta.update_timestamp(&node, None).await
        })
    }

    fn validate_node<'a>(
        &'a self,
        node: NamedNode,
        visited: &'a mut HashSet<NamedNode>,
    ) -> Pin<Box<dyn Future<Output = KleioResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let neighbours = self.meta.inputs_and_owning_derived(&node).await?;
            for neighbour in neighbours {
                if visited.contains(&neighbour) {
                    return Err(KleioError::circular(format!(
                        "{neighbour} reached again while validating it"
                    )));
                }
                visited.insert(node.clone());
                self.validate_node(neighbour, visited).await?;
            }

            let inputs = self.meta.inputs(&node).await?;
            if !inputs.is_empty() {
                self.meta.timestamp(&node).await?;
                for input in &inputs {
                    self.meta.timestamp(input).await?;
                }
            }
            Ok(())
        })
    }

    /// Out of date iff any input carries a strictly newer timestamp; equal
    /// timestamps are current.
    async fn out_of_date(&self, node: &NamedNode, inputs: &[NamedNode]) -> KleioResult<bool> {
        let node_timestamp = self.meta.timestamp(node).await?;
        for input in inputs {
            if self.meta.timestamp(input).await? > node_timestamp {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Replace the node's outputs with the agent's and repair downstream
    /// `isDerivedFrom` edges by matching rdf:types: exactly one new entity
    /// per referenced type, otherwise the reconciliation fails.
    async fn reconcile_outputs(
        &self,
        node: &NamedNode,
        outputs: &[NamedNode],
    ) -> KleioResult<()> {
        let old_entities = self.meta.derived_entities(node).await?;
        let downstream = self.meta.derived_from_entities(&old_entities).await?;

        self.meta.delete_instances(&old_entities).await?;
        self.meta.attach_outputs(outputs, node).await?;

        if downstream.is_empty() {
            return Ok(());
        }
        let mut classes = Vec::with_capacity(outputs.len());
        for output in outputs {
            classes.push((output, self.meta.instance_class(output).await?));
        }
        for (derived, entity_type) in &downstream {
            let mut candidates = classes.iter().filter(|(_, class)| class == entity_type);
            let Some((replacement, _)) = candidates.next() else {
                return Err(KleioError::reconnection(format!(
                    "no new entity has type {entity_type} to reconnect to {derived}"
                )));
            };
            if candidates.next().is_some() {
                return Err(KleioError::reconnection(format!(
                    "several new entities share type {entity_type}; cannot reconnect {derived}"
                )));
            }
            self.meta.reconnect_input(*replacement, derived).await?;
        }
        Ok(())
    }
}

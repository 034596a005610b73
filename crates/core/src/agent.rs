use async_trait::async_trait;
use oxrdf::NamedNode;

use crate::KleioResult;

/// Synchronous call to the remote HTTP service that materialises a derived
/// node. Takes the node's input IRIs in triple-store order and returns the
/// IRIs of the freshly created outputs in the order the agent produced them.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn call(&self, url: &str, inputs: &[NamedNode]) -> KleioResult<Vec<NamedNode>>;
}

#[async_trait]
impl<A: AgentClient> AgentClient for &A {
    async fn call(&self, url: &str, inputs: &[NamedNode]) -> KleioResult<Vec<NamedNode>> {
        (**self).call(url, inputs).await
    }
}

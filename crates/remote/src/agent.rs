use async_trait::async_trait;
use oxrdf::NamedNode;
use serde::{Deserialize, Serialize};

use kleio_core::{AgentClient, KleioError, KleioResult};

/// Wire request sent to a derivation agent. Input ordering follows the
/// triple store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentRequest {
    pub derived_agent_input: Vec<String>,
}

/// Wire reply from a derivation agent: the IRIs of the freshly created
/// outputs, in agent order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentResponse {
    pub derived_agent_output: Vec<String>,
}

/// Calls derivation agents over HTTP. Some deployed agents accept the JSON
/// body on GET; this client POSTs the same JSON since several HTTP stacks
/// refuse GET bodies. The JSON shape is the contract.
#[derive(Clone, Debug, Default)]
pub struct HttpAgentClient {
    http: reqwest::Client,
}

impl HttpAgentClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn call(&self, url: &str, inputs: &[NamedNode]) -> KleioResult<Vec<NamedNode>> {
        let request = AgentRequest {
            derived_agent_input: inputs.iter().map(|iri| iri.as_str().to_string()).collect(),
        };
        log::debug!("calling agent {url} with {} inputs", inputs.len());
        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|err| KleioError::agent(format!("request to {url} failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(KleioError::agent(format!("agent {url} returned {status}")));
        }
        let reply: AgentResponse = response
            .json()
            .await
            .map_err(|err| KleioError::agent(format!("malformed reply from {url}: {err}")))?;
        reply
            .derived_agent_output
            .into_iter()
            .map(|iri| {
                NamedNode::new(&iri).map_err(|err| {
                    KleioError::agent(format!("agent {url} returned invalid IRI '{iri}': {err}"))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape() {
        let request = AgentRequest {
            derived_agent_input: vec!["http://a".into(), "http://b".into()],
        };
        let json = serde_json::to_string(&request).expect("serialize");
        assert_eq!(json, r#"{"derived_agent_input":["http://a","http://b"]}"#);
    }

    #[test]
    fn response_preserves_order() {
        let reply: AgentResponse =
            serde_json::from_str(r#"{"derived_agent_output":["http://x","http://y"]}"#)
                .expect("parse");
        assert_eq!(reply.derived_agent_output, vec!["http://x", "http://y"]);
    }
}

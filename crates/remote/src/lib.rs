//! Thin HTTP implementations of the kleio gateway traits.

pub mod agent;
pub mod sparql;

pub use agent::{AgentRequest, AgentResponse, HttpAgentClient};
pub use sparql::RemoteSparqlClient;

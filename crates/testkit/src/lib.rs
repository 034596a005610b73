//! Test support for the kleio crates: an in-memory SPARQL gateway backed by
//! oxigraph, fault-injecting wrappers and a scripted agent stub. Dev-only.

pub mod agent;
pub mod db;
pub mod store;

pub use agent::StubAgent;
pub use db::memory_db;
pub use store::{FlakySparqlClient, MemorySparqlClient};

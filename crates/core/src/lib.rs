//! Shared building blocks for the kleio stack: error taxonomy, gateway
//! traits, typed sample values and the properties-file configuration.

pub mod agent;
pub mod config;
pub mod error;
pub mod series;
pub mod sparql;
pub mod value;

pub use agent::AgentClient;
pub use config::StoreConfig;
pub use error::{KleioError, KleioResult};
pub use series::TimeSeries;
pub use sparql::{escape_literal, Binding, SparqlClient};
pub use value::{DataType, DataValue};

pub use oxrdf::NamedNode;

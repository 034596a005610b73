//! Derived quantities: entities in the triple store whose values are
//! recomputed by remote HTTP agents whenever one of their declared inputs
//! carries a newer timestamp. The [`DerivationClient`] walks the dependency
//! graph recursively, rejects cycles and reconciles replaced outputs with
//! their downstream consumers.

pub mod client;
pub mod metadata;
pub mod vocab;

pub use client::DerivationClient;
pub use metadata::DerivationMetadataClient;

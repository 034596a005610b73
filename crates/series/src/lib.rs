//! Lifecycle management for named time-series whose metadata lives in a
//! triple store and whose samples live in a relational database. The
//! [`TimeSeriesClient`] keeps the two stores consistent with compensating
//! rollback; the metadata and storage modules can also be used on their own.

pub mod client;
pub mod db;
pub mod metadata;
pub mod storage;
pub mod time;
pub mod vocab;

pub use client::TimeSeriesClient;
pub use metadata::SeriesMetadataClient;
pub use storage::{RdbSeriesStore, SeriesStorage};
pub use time::TimeValue;

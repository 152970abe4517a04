//! Sync layer: register sources, the HTTP client, and the run orchestrator.

mod error;
mod orchestrator;
mod source;

#[cfg(feature = "http")]
pub mod http;

pub use error::SyncError;
pub use orchestrator::Synchronizer;
pub use source::{InterestQuery, RegisterSource, StaticSource};

#[cfg(feature = "http")]
pub use http::RegisterClient;

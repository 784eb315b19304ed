//! External search collaborators
//!
//! The pipeline only sees [`SearchApi`]: an engine name, a flat parameter
//! object and the parameters that must be present. [`SerpApiClient`] is the
//! live implementation; the `stocks` and `news` modules wrap it per engine
//! and turn raw responses into text for the supervisor.

pub mod news;
pub mod serpapi;
pub mod stocks;

pub use serpapi::SerpApiClient;

use crate::error::Result;
use crate::extract::StructuredObject;
use async_trait::async_trait;
use serde_json::Value;

/// Flat parameter object, usually straight out of the extractor
pub type SearchParams = StructuredObject;

#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Fails with an API error when a credential or a required parameter is missing.
    async fn call(&self, engine: &str, params: &SearchParams, required: &[&str]) -> Result<Value>;
}

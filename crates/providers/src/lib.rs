//! Language-model provider implementations for codevox.
//!
//! One provider instance is built per request from the credential the
//! caller supplied with that request. The [`ProviderFactory`] trait is the
//! seam the gateway and CLI use; tests substitute a factory producing
//! scripted providers.

pub mod openai_compat;

use std::sync::Arc;

use codevox_core::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Builds a provider for one request from that request's credential.
///
/// Credentials are never cached or pooled across requests: each `build`
/// call produces an independent instance scoped to one invocation.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, api_key: &str) -> Arc<dyn Provider>;
}

/// Factory for OpenAI-compatible endpoints.
pub struct OpenAiCompatFactory {
    base_url: String,
}

impl OpenAiCompatFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl ProviderFactory for OpenAiCompatFactory {
    fn build(&self, api_key: &str) -> Arc<dyn Provider> {
        Arc::new(OpenAiCompatProvider::new("openai", &self.base_url, api_key))
    }
}

//! codegate-providers — reviewer backends.
//!
//! Implements the `LlmProvider` trait for Anthropic and OpenAI-compatible
//! APIs, plus a scriptable mock, and loads the TOML configuration that
//! selects between them.

pub mod anthropic;
pub mod config;
mod http;
pub mod mock;
pub mod openai;

pub use codegate_core::error::ProviderError;
pub use config::{create_provider, load_config, load_config_from, CodegateConfig, ProviderConfig};

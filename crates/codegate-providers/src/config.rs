//! Configuration loading and provider factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use codegate_core::engine::{EvaluatorConfig, DEFAULT_MAX_CODE_CHARS};
use codegate_core::traits::LlmProvider;

use crate::anthropic::AnthropicProvider;
use crate::mock::MockProvider;
use crate::openai::OpenAiProvider;

/// Configuration for a single reviewer backend.
///
/// Debug output masks API keys.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    /// Canned responses, no network.
    Mock {
        #[serde(default)]
        response: Option<String>,
        #[serde(default)]
        delay_ms: u64,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Mock { response, delay_ms } => f
                .debug_struct("Mock")
                .field("response", &response.as_ref().map(|r| r.len()))
                .field("delay_ms", delay_ms)
                .finish(),
        }
    }
}

/// Top-level codegate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegateConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Budget for one reviewer call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Submission size cap in characters.
    #[serde(default = "default_max_code_chars")]
    pub max_code_chars: usize,
    /// Max concurrent evaluations.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Where progress and history are stored.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_max_code_chars() -> usize {
    DEFAULT_MAX_CODE_CHARS
}
fn default_parallelism() -> usize {
    4
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./.codegate")
}

impl Default for CodegateConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_code_chars: default_max_code_chars(),
            parallelism: default_parallelism(),
            data_dir: default_data_dir(),
        }
    }
}

impl CodegateConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Evaluator settings for `model`, or the default model when `None`.
    pub fn to_evaluator_config(&self, model: Option<&str>) -> EvaluatorConfig {
        EvaluatorConfig {
            model: model.unwrap_or(&self.default_model).to_string(),
            timeout: self.timeout(),
            max_code_chars: self.max_code_chars,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            parallelism: self.parallelism.max(1),
            system_prompt_override: None,
        }
    }

    /// Build the named provider, or the default one when `None`.
    pub fn provider(&self, name: Option<&str>) -> Result<Arc<dyn LlmProvider>> {
        let name = name.unwrap_or(&self.default_provider);
        let config = self.providers.get(name).with_context(|| {
            format!(
                "provider '{name}' is not configured. Add it to codegate.toml or set CODEGATE_{}_KEY",
                name.to_uppercase()
            )
        })?;
        create_provider(config, self.timeout())
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_provider_config(config: ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(&api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
            org_id: org_id.as_deref().map(resolve_env_vars),
        },
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(&api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
        },
        mock @ ProviderConfig::Mock { .. } => mock,
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `codegate.toml` in the current directory
/// 2. `~/.config/codegate/config.toml`
///
/// Environment variable overrides: `CODEGATE_ANTHROPIC_KEY`, `CODEGATE_OPENAI_KEY`.
pub fn load_config() -> Result<CodegateConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<CodegateConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("codegate.toml");
            if local.exists() {
                Some(local)
            } else {
                global_config_dir()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|p| p.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            parse_config(&path)?
        }
        None => CodegateConfig::default(),
    };

    apply_env_overrides(&mut config);

    config.providers = config
        .providers
        .into_iter()
        .map(|(name, provider)| (name, resolve_provider_config(provider)))
        .collect();

    Ok(config)
}

fn parse_config(path: &Path) -> Result<CodegateConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse config: {}", path.display()))
}

fn apply_env_overrides(config: &mut CodegateConfig) {
    if let Ok(key) = std::env::var("CODEGATE_ANTHROPIC_KEY") {
        match config.providers.get_mut("anthropic") {
            Some(ProviderConfig::Anthropic { api_key, .. }) => *api_key = key,
            _ => {
                config.providers.insert(
                    "anthropic".into(),
                    ProviderConfig::Anthropic {
                        api_key: key,
                        base_url: None,
                    },
                );
            }
        }
    }

    if let Ok(key) = std::env::var("CODEGATE_OPENAI_KEY") {
        match config.providers.get_mut("openai") {
            Some(ProviderConfig::OpenAI { api_key, .. }) => *api_key = key,
            _ => {
                config.providers.insert(
                    "openai".into(),
                    ProviderConfig::OpenAI {
                        api_key: key,
                        base_url: None,
                        org_id: None,
                    },
                );
            }
        }
    }
}

fn global_config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("codegate"))
}

/// Create a provider instance from its configuration.
pub fn create_provider(config: &ProviderConfig, timeout: Duration) -> Result<Arc<dyn LlmProvider>> {
    Ok(match config {
        ProviderConfig::Anthropic { api_key, base_url } => {
            Arc::new(AnthropicProvider::new(api_key, base_url.clone(), timeout)?)
        }
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => Arc::new(OpenAiProvider::new(
            api_key,
            base_url.clone(),
            org_id.clone(),
            timeout,
        )?),
        ProviderConfig::Mock { response, delay_ms } => {
            let mock = match response {
                Some(text) => MockProvider::with_fixed_response(text),
                None => MockProvider::new(HashMap::new()),
            };
            Arc::new(mock.with_delay(Duration::from_millis(*delay_ms)))
        }
    })
}

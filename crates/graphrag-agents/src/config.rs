//! Environment-driven configuration.
//!
//! Precedence for every setting:
//! 1) env var (when set and non-empty)
//! 2) built-in default

use crate::error::ConfigError;
use std::time::Duration;

pub const SCHEMA_TTL_SECS_ENV: &str = "GRAPHRAG_SCHEMA_TTL_SECS";
pub const FALLBACK_LIMIT_ENV: &str = "GRAPHRAG_FALLBACK_LIMIT";
pub const LLM_TEMPERATURE_ENV: &str = "GRAPHRAG_LLM_TEMPERATURE";

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";

const DEFAULT_SCHEMA_TTL_SECS: u64 = 3600;
const DEFAULT_FALLBACK_LIMIT: usize = 25;
const MAX_FALLBACK_LIMIT: usize = 1000;
const DEFAULT_LLM_TEMPERATURE: f32 = 0.2;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// How long a loaded schema stays fresh.
    pub schema_ttl: Duration,
    /// `LIMIT` used by fallback queries.
    pub fallback_limit: usize,
    /// Sampling temperature for query decomposition.
    pub llm_temperature: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            schema_ttl: Duration::from_secs(DEFAULT_SCHEMA_TTL_SECS),
            fallback_limit: DEFAULT_FALLBACK_LIMIT,
            llm_temperature: DEFAULT_LLM_TEMPERATURE,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name))
    }

    /// Build from an arbitrary variable lookup (the process environment in
    /// [`from_env`](Self::from_env)).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<String, std::env::VarError>,
    {
        let read = |name: &'static str| -> Result<Option<String>, ConfigError> {
            match lookup(name) {
                Ok(v) if v.trim().is_empty() => Ok(None),
                Ok(v) => Ok(Some(v.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Ok(None),
                Err(source) => Err(ConfigError::Unreadable { name, source }),
            }
        };

        let schema_ttl = match read(SCHEMA_TTL_SECS_ENV)? {
            Some(v) => Duration::from_secs(v.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: SCHEMA_TTL_SECS_ENV,
                value: v.clone(),
                expected: "integer seconds",
            })?),
            None => Duration::from_secs(DEFAULT_SCHEMA_TTL_SECS),
        };

        let fallback_limit = match read(FALLBACK_LIMIT_ENV)? {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| ConfigError::Invalid {
                    name: FALLBACK_LIMIT_ENV,
                    value: v.clone(),
                    expected: "integer row limit",
                })?
                .clamp(1, MAX_FALLBACK_LIMIT),
            None => DEFAULT_FALLBACK_LIMIT,
        };

        let llm_temperature = match read(LLM_TEMPERATURE_ENV)? {
            Some(v) => {
                let t = v.parse::<f32>().map_err(|_| ConfigError::Invalid {
                    name: LLM_TEMPERATURE_ENV,
                    value: v.clone(),
                    expected: "number between 0 and 2",
                })?;
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::Invalid {
                        name: LLM_TEMPERATURE_ENV,
                        value: v,
                        expected: "number between 0 and 2",
                    });
                }
                t
            }
            None => DEFAULT_LLM_TEMPERATURE,
        };

        Ok(Self {
            schema_ttl,
            fallback_limit,
            llm_temperature,
        })
    }
}

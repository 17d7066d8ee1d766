use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::environment::EnvironmentTier;
use crate::errors::ConfigurationError;
use crate::policy::gates::get_gate;
use crate::policy::hooks::{default_cost_per_1k_tokens, DEFAULT_RATE_LIMIT_PER_MINUTE, DEFAULT_SENSITIVE_KEYS};

pub const DEFAULT_CONFIG_FILE: &str = "ano.toml";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppConfig {
    pub environment: EnvironmentTier,
    pub llm: LlmConfig,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
    pub features: BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PolicyConfig {
    /// Explicit gate list; `None` means the preset for the active tier.
    pub gates: Option<Vec<String>>,
    pub rate_limit_per_minute: u32,
    pub cost_per_1k_tokens: Decimal,
    pub sensitive_keys: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub environment: Option<EnvironmentTier>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub llm_model: Option<String>,
    pub policy_gates: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: EnvironmentTier::Development,
            llm: LlmConfig { model: "offline-advisor".to_string(), max_tokens: 4096, temperature: 0.7 },
            policy: PolicyConfig {
                gates: None,
                rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
                cost_per_1k_tokens: default_cost_per_1k_tokens(),
                sensitive_keys: DEFAULT_SENSITIVE_KEYS.iter().map(|key| key.to_string()).collect(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            features: BTreeSet::new(),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let explicit_path = options.config_path.clone().or_else(|| read_env("ANO_CONFIG_FILE").map(PathBuf::from));
        let maybe_path = resolve_config_path(explicit_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = explicit_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn has_feature(&self, flag: &str) -> bool {
        self.features.contains(flag)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(environment) = patch.environment {
            self.environment = environment.parse()?;
        }
        if let Some(features) = patch.features {
            self.features = features.into_iter().collect();
        }

        if let Some(llm) = patch.llm {
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(policy) = patch.policy {
            if let Some(gates) = policy.gates {
                self.policy.gates = Some(gates);
            }
            if let Some(rate_limit) = policy.rate_limit_per_minute {
                self.policy.rate_limit_per_minute = rate_limit;
            }
            if let Some(cost) = policy.cost_per_1k_tokens {
                self.policy.cost_per_1k_tokens = cost;
            }
            if let Some(sensitive_keys) = policy.sensitive_keys {
                self.policy.sensitive_keys = sensitive_keys;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ANO_ENV") {
            self.environment = value.parse()?;
        }
        if let Some(value) = read_env("ANO_FEATURES") {
            self.features = split_list(&value).into_iter().collect();
        }

        if let Some(value) = read_env("ANO_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("ANO_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_env("ANO_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("ANO_LLM_TEMPERATURE") {
            self.llm.temperature = parse_env("ANO_LLM_TEMPERATURE", &value)?;
        }

        if let Some(value) = read_env("ANO_POLICY_GATES") {
            self.policy.gates = Some(split_list(&value));
        }
        if let Some(value) = read_env("ANO_RATE_LIMIT_PER_MINUTE") {
            self.policy.rate_limit_per_minute = parse_env("ANO_RATE_LIMIT_PER_MINUTE", &value)?;
        }
        if let Some(value) = read_env("ANO_COST_PER_1K_TOKENS") {
            self.policy.cost_per_1k_tokens = parse_env("ANO_COST_PER_1K_TOKENS", &value)?;
        }

        let log_level = read_env("ANO_LOGGING_LEVEL").or_else(|| read_env("ANO_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("ANO_LOGGING_FORMAT").or_else(|| read_env("ANO_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(environment) = overrides.environment {
            self.environment = environment;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(policy_gates) = overrides.policy_gates {
            self.policy.gates = Some(policy_gates);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_policy(&self.policy)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation("llm.max_tokens must be greater than zero".to_string()));
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation("llm.temperature must be in range 0.0..=2.0".to_string()));
    }
    Ok(())
}

fn validate_policy(policy: &PolicyConfig) -> Result<(), ConfigError> {
    if let Some(gates) = &policy.gates {
        for gate in gates {
            get_gate(gate)?;
        }
    }
    if policy.rate_limit_per_minute == 0 {
        return Err(ConfigError::Validation(
            "policy.rate_limit_per_minute must be greater than zero".to_string(),
        ));
    }
    if policy.cost_per_1k_tokens < Decimal::ZERO {
        return Err(ConfigError::Validation(
            "policy.cost_per_1k_tokens must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_string).collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    environment: Option<String>,
    features: Option<Vec<String>>,
    llm: Option<LlmPatch>,
    policy: Option<PolicyPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    gates: Option<Vec<String>>,
    rate_limit_per_minute: Option<u32>,
    cost_per_1k_tokens: Option<Decimal>,
    sensitive_keys: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ano_core::config::{AppConfig, DEFAULT_CONFIG_FILE};
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

const FIELDS: [(&str, &[&str]); 11] = [
    ("environment", &["ANO_ENV"]),
    ("features", &["ANO_FEATURES"]),
    ("llm.model", &["ANO_LLM_MODEL"]),
    ("llm.max_tokens", &["ANO_LLM_MAX_TOKENS"]),
    ("llm.temperature", &["ANO_LLM_TEMPERATURE"]),
    ("policy.gates", &["ANO_POLICY_GATES"]),
    ("policy.rate_limit_per_minute", &["ANO_RATE_LIMIT_PER_MINUTE"]),
    ("policy.cost_per_1k_tokens", &["ANO_COST_PER_1K_TOKENS"]),
    ("policy.sensitive_keys", &[]),
    ("logging.level", &["ANO_LOGGING_LEVEL", "ANO_LOG_LEVEL"]),
    ("logging.format", &["ANO_LOGGING_FORMAT", "ANO_LOG_FORMAT"]),
];

#[derive(Debug, Serialize)]
struct ConfigReport<'a> {
    command: &'static str,
    status: &'static str,
    precedence: &'static str,
    config_file: Option<String>,
    config: &'a AppConfig,
    sources: BTreeMap<&'static str, String>,
}

/// Effective configuration with the layer each value came from.
pub fn run(config: &AppConfig, explicit_path: Option<&Path>) -> CommandResult {
    let config_file_path = detect_config_path(explicit_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let sources = FIELDS
        .iter()
        .map(|(key_path, env_keys)| {
            (*key_path, field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref()))
        })
        .collect();

    let report = ConfigReport {
        command: "config",
        status: "ok",
        precedence: "overrides > env > file > default",
        config_file: config_file_path.map(|path| path.display().to_string()),
        config,
        sources,
    };
    CommandResult::report(0, &report)
}

fn detect_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    let explicit = explicit_path
        .map(Path::to_path_buf)
        .or_else(|| env::var_os("ANO_CONFIG_FILE").map(PathBuf::from));
    if let Some(path) = explicit {
        return path.exists().then_some(path);
    }

    let root = PathBuf::from(DEFAULT_CONFIG_FILE);
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config").join(DEFAULT_CONFIG_FILE);
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

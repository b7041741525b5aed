use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;
use dealroom_core::config::{AppConfig, LoadOptions};

const FIELDS: &[(&str, &[&str])] = &[
    ("database.url", &["DEALROOM_DATABASE_URL"]),
    ("database.max_connections", &["DEALROOM_DATABASE_MAX_CONNECTIONS"]),
    ("database.timeout_secs", &["DEALROOM_DATABASE_TIMEOUT_SECS"]),
    (
        "negotiation.decline_reason_min_chars",
        &["DEALROOM_NEGOTIATION_DECLINE_REASON_MIN_CHARS"],
    ),
    ("negotiation.currency", &["DEALROOM_NEGOTIATION_CURRENCY"]),
    ("logging.level", &["DEALROOM_LOGGING_LEVEL"]),
    ("logging.format", &["DEALROOM_LOGGING_FORMAT"]),
];

#[derive(Debug, Serialize)]
struct ConfigReport {
    effective: AppConfig,
    sources: BTreeMap<&'static str, String>,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let sources = FIELDS
        .iter()
        .map(|(key_path, env_keys)| {
            (
                *key_path,
                field_source(
                    key_path,
                    env_keys,
                    config_file_doc.as_ref(),
                    config_file_path.as_deref(),
                ),
            )
        })
        .collect();

    CommandResult::success_with(
        "config",
        "effective config (source precedence: env > file > default)",
        ConfigReport { effective: config, sources },
    )
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("dealroom.toml"), PathBuf::from("config/dealroom.toml")]
        .into_iter()
        .find(|path| path.exists())
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
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
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

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::contains_path;

    #[test]
    fn nested_keys_are_found_in_file_documents() {
        let doc = "[negotiation]\ncurrency = \"EUR\"\n".parse::<Value>().expect("toml");

        assert!(contains_path(&doc, "negotiation.currency"));
        assert!(!contains_path(&doc, "negotiation.decline_reason_min_chars"));
        assert!(!contains_path(&doc, "database.url"));
    }
}

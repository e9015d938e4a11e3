use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Loads, validates, and path-resolves a configuration file. Relative paths
/// are taken relative to the file's directory.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config = load_config_from_str(&content)?;
    if let Some(base) = path.parent() {
        config.resolve_relative_to(base);
    }
    Ok(config)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub(crate) fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if let Some(ext) = config
        .uploads
        .allowed_extensions
        .iter()
        .find(|e| !e.starts_with('.'))
    {
        return Err(ConfigError::Validation {
            message: format!("Upload extension '{}' must start with '.'", ext),
        });
    }

    let metontiime = &config.analysts.metontiime;
    if metontiime.threads == 0 {
        return Err(ConfigError::Validation {
            message: "analysts.metontiime.threads must be at least 1".to_string(),
        });
    }
    if metontiime.timeout_secs == Some(0) {
        return Err(ConfigError::Validation {
            message: "analysts.metontiime.timeout_secs must be greater than 0".to_string(),
        });
    }
    for (field, value) in [
        ("sequences_fasta", &metontiime.sequences_fasta),
        ("taxonomy_tsv", &metontiime.taxonomy_tsv),
    ] {
        if value.contains('/') || value.contains('\\') {
            return Err(ConfigError::Validation {
                message: format!(
                    "analysts.metontiime.{} must be a file name inside database_dir",
                    field
                ),
            });
        }
    }

    Ok(())
}

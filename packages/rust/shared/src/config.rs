//! Application configuration for Dossier.
//!
//! User config lives at `~/.dossier/dossier.toml`.
//! CLI flags override config file values, which override defaults.
//! The loaded [`AppConfig`] is passed into adapter constructors at wiring
//! time; adapters never read the environment themselves.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DossierError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dossier.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dossier";

// ---------------------------------------------------------------------------
// Config structs (matching dossier.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Sanctions/watchlist search API.
    #[serde(default)]
    pub sanctions: SanctionsConfig,

    /// Web search used for birth-data dork queries.
    #[serde(default)]
    pub dork_search: DorkSearchConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the trigger endpoint listens on.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the libSQL database holding the audit trail and findings.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "osint_agi.db".into()
}

/// `[sanctions]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanctionsConfig {
    /// Fuzzy name search endpoint.
    #[serde(default = "default_sanctions_url")]
    pub api_url: String,

    /// Maximum records requested per lookup.
    #[serde(default = "default_sanctions_limit")]
    pub limit: u32,

    /// Timeout for the single remote call, in seconds.
    #[serde(default = "default_sanctions_timeout")]
    pub timeout_secs: u64,

    /// Name of the env var holding an API key, if the endpoint needs one
    /// (never store the key itself).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Default for SanctionsConfig {
    fn default() -> Self {
        Self {
            api_url: default_sanctions_url(),
            limit: default_sanctions_limit(),
            timeout_secs: default_sanctions_timeout(),
            api_key_env: None,
        }
    }
}

fn default_sanctions_url() -> String {
    "https://api.sanctions.network/rpc/search_sanctions".into()
}
fn default_sanctions_limit() -> u32 {
    5
}
fn default_sanctions_timeout() -> u64 {
    15
}

/// `[dork_search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DorkSearchConfig {
    /// HTML search endpoint queried with `?q=<query>`.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Maximum URLs kept per template.
    #[serde(default = "default_results_per_template")]
    pub results_per_template: usize,

    /// Search language/region hint.
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Pause between consecutive searches, in ms.
    #[serde(default = "default_inter_call_delay")]
    pub inter_call_delay_ms: u64,

    /// Timeout for each search call, in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for DorkSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            results_per_template: default_results_per_template(),
            lang: default_lang(),
            inter_call_delay_ms: default_inter_call_delay(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".into()
}
fn default_results_per_template() -> usize {
    5
}
fn default_lang() -> String {
    "it".into()
}
fn default_inter_call_delay() -> u64 {
    1000
}
fn default_search_timeout() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dossier/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DossierError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dossier/dossier.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DossierError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DossierError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DossierError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DossierError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DossierError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key named by `api_key_env`, if one is configured.
///
/// A configured but unset (or empty) variable is an error.
pub fn resolve_api_key(api_key_env: Option<&str>) -> Result<Option<String>> {
    let Some(var_name) = api_key_env else {
        return Ok(None);
    };
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(Some(val)),
        _ => Err(DossierError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("db_path"));
        assert!(toml_str.contains("api.sanctions.network"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.sanctions.limit, 5);
        assert_eq!(parsed.sanctions.timeout_secs, 15);
        assert_eq!(parsed.dork_search.inter_call_delay_ms, 1000);
        assert_eq!(parsed.server.bind, "0.0.0.0:5000");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[sanctions]
api_url = "http://localhost:9999/search"
api_key_env = "DOSSIER_SANCTIONS_KEY"

[dork_search]
lang = "en"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.sanctions.api_url, "http://localhost:9999/search");
        assert_eq!(config.sanctions.limit, 5);
        assert_eq!(config.sanctions.api_key_env.as_deref(), Some("DOSSIER_SANCTIONS_KEY"));
        assert_eq!(config.dork_search.lang, "en");
        assert_eq!(config.dork_search.results_per_template, 5);
        assert_eq!(config.storage.db_path, "osint_agi.db");
    }

    #[test]
    fn api_key_resolution() {
        assert!(resolve_api_key(None).expect("no key configured").is_none());

        // Use a unique env var name to avoid interfering with other tests
        let result = resolve_api_key(Some("DOSSIER_TEST_NONEXISTENT_KEY_12345"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}

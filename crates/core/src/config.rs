//! Configuration management for the docfields CLI.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.docfields/config.yaml)
//!
//! Configuration is workspace-centric: the history database and the config
//! file both live under `.docfields/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Default token budget for a single document chunk, excluding prompt
/// overhead. Matches the context headroom left after the instruction
/// template and generation allowance.
pub const DEFAULT_TOKEN_BUDGET: usize = 3500;

/// Default per-call timeout for the completion service, in seconds.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;

/// Default number of retries for transient completion-service failures.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Main application configuration.
///
/// This struct holds all global configuration options that affect
/// CLI behavior across commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docfields/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Default LLM provider (e.g., "openai", "ollama")
    pub provider: String,

    /// Default model identifier. Also selects the tokenizer vocabulary.
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Token budget for a single document chunk
    pub token_budget: usize,

    /// Per-call timeout for the completion service, in seconds
    pub call_timeout_secs: u64,

    /// Retries for transient completion-service failures
    pub max_retries: u32,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmSettings>,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSettings>,
    workspace: Option<WorkspaceConfig>,
    extraction: Option<ExtractionConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExtractionConfig {
    #[serde(rename = "tokenBudget")]
    token_budget: Option<usize>,
    #[serde(rename = "callTimeoutSecs")]
    call_timeout_secs: Option<u64>,
    #[serde(rename = "maxRetries")]
    max_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            token_budget: DEFAULT_TOKEN_BUDGET,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `DOCFIELDS_WORKSPACE`: Override workspace path
    /// - `DOCFIELDS_CONFIG`: Path to config file
    /// - `DOCFIELDS_PROVIDER`: LLM provider
    /// - `DOCFIELDS_MODEL`: Model identifier
    /// - `DOCFIELDS_API_KEY`: API key
    /// - `DOCFIELDS_TOKEN_BUDGET`: Chunk token budget
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        // Load from environment variables
        if let Ok(workspace) = std::env::var("DOCFIELDS_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("DOCFIELDS_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        // Validate workspace exists
        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        // Load from YAML config file if it exists
        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.workspace.join(".docfields/config.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DOCFIELDS_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCFIELDS_MODEL") {
            config.model = model;
        }

        if let Ok(budget) = std::env::var("DOCFIELDS_TOKEN_BUDGET") {
            config.token_budget = budget.parse().map_err(|_| {
                AppError::Config(format!("Invalid DOCFIELDS_TOKEN_BUDGET: {}", budget))
            })?;
        }

        config.api_key = std::env::var("DOCFIELDS_API_KEY").ok();
        config.log_level = std::env::var("RUST_LOG").ok();

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        config.validate_budget()?;

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        // Merge workspace settings
        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        // Merge extraction settings
        if let Some(extraction) = config_file.extraction {
            if let Some(budget) = extraction.token_budget {
                result.token_budget = budget;
            }
            if let Some(timeout) = extraction.call_timeout_secs {
                result.call_timeout_secs = timeout;
            }
            if let Some(retries) = extraction.max_retries {
                result.max_retries = retries;
            }
        }

        // Merge logging settings
        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        // Merge LLM settings
        if let Some(llm) = config_file.llm {
            // Set active provider from YAML
            result.provider = llm.active_provider.clone();

            // Set model from active provider config
            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = match provider_config {
                    ProviderConfig::OpenAI { model, .. } => model.clone(),
                    ProviderConfig::Ollama { model, .. } => model.clone(),
                };
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// This method merges command-line flags with the loaded configuration,
    /// giving precedence to CLI flags over environment variables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        token_budget: Option<usize>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(token_budget) = token_budget {
            self.token_budget = token_budget;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .docfields directory.
    pub fn docfields_dir(&self) -> PathBuf {
        self.workspace.join(".docfields")
    }

    /// Get the path to the history database.
    pub fn history_db_path(&self) -> PathBuf {
        self.docfields_dir().join("history.db")
    }

    /// Ensure the .docfields directory exists.
    pub fn ensure_docfields_dir(&self) -> AppResult<()> {
        let dir = self.docfields_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docfields directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get the active provider configuration.
    pub fn get_provider_config(&self, provider: &str) -> AppResult<Option<ProviderConfig>> {
        if let Some(ref llm) = self.llm {
            Ok(llm.providers.get(provider).cloned())
        } else {
            Ok(None)
        }
    }

    /// Resolve API key from environment variable.
    pub fn resolve_api_key(&self, provider: &str) -> AppResult<Option<String>> {
        // Check explicit DOCFIELDS_API_KEY first
        if let Some(ref key) = self.api_key {
            return Ok(Some(key.clone()));
        }

        // Try provider-specific config
        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) =
            self.get_provider_config(provider)?
        {
            if let Ok(key) = std::env::var(&api_key_env) {
                return Ok(Some(key));
            }
        }

        Ok(None)
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;
        let known_providers = ["openai", "ollama"];

        if !known_providers.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                known_providers.join(", ")
            )));
        }

        self.validate_budget()?;

        // Validate provider-specific requirements
        if let Some(provider_config) = self.get_provider_config(provider)? {
            match provider_config {
                ProviderConfig::OpenAI { api_key_env, .. } => {
                    if self.api_key.is_none() && std::env::var(&api_key_env).is_err() {
                        return Err(AppError::Config(format!(
                            "API key not found in environment variable: {}",
                            api_key_env
                        )));
                    }
                }
                ProviderConfig::Ollama { .. } => {
                    // Ollama doesn't require API keys
                }
            }
        }

        Ok(())
    }

    fn validate_budget(&self) -> AppResult<()> {
        if self.token_budget == 0 {
            return Err(AppError::Config(
                "Token budget must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.token_budget, DEFAULT_TOKEN_BUDGET);
        assert!(!config.verbose);
        assert!(!config.no_color);
    }

    #[test]
    fn test_docfields_dir() {
        let config = AppConfig::default();
        let dir = config.docfields_dir();
        assert!(dir.ends_with(".docfields"));
        assert!(config.history_db_path().ends_with(".docfields/history.db"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o".to_string()),
            Some(1000),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o");
        assert_eq!(overridden.token_budget, 1000);
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let mut config = AppConfig::default();
        config.provider = "ollama".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_budget() {
        let mut config = AppConfig::default();
        config.token_budget = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_yaml_extraction_section() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
extraction:
  tokenBudget: 1200
  maxRetries: 5
"#,
        )
        .unwrap();

        let mut config = AppConfig::default();
        let merged = config.merge_yaml(&path).unwrap();
        assert_eq!(merged.token_budget, 1200);
        assert_eq!(merged.max_retries, 5);
        assert_eq!(merged.call_timeout_secs, DEFAULT_CALL_TIMEOUT_SECS);
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::PipeSightError;

pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
pub const ENV_API_VERSION: &str = "AZURE_API_VERSION";
pub const ENV_ASSISTANT_ID: &str = "AZURE_ASSISTANT_ID";
pub const ENV_USE_MOCK: &str = "PIPESIGHT_USE_MOCK_DATA";

/// Configuration file structure for PipeSight.
///
/// Built once at startup from the config file, the environment and CLI flags,
/// then handed to the orchestrator. Nothing reads credentials from ambient
/// state after that.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Chat completion endpoint settings
    #[serde(default)]
    pub ai: AiConfig,

    /// Where plans and runs come from
    #[serde(default)]
    pub data_source: DataSourceConfig,

    /// Analyzer and orchestration behavior
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AiConfig {
    /// Azure OpenAI resource endpoint
    pub endpoint: Option<String>,

    /// API key sent in the `api-key` header
    pub api_key: Option<String>,

    /// Model deployment name
    pub deployment: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Persistent assistant resource, used before direct completions when set
    pub assistant_id: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Transport-level retries for 429, 5xx and network errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries; attempt `n` waits `n` times this long
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DataSourceConfig {
    /// Serve the built-in fixtures instead of a live CI server
    #[serde(default = "default_true")]
    pub use_mock: bool,

    /// JSON export to read plans and runs from; takes precedence over mock data
    pub fixtures: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalysisConfig {
    /// Abort the whole run on the first pipeline failure
    #[serde(default)]
    pub fail_fast: bool,

    /// Direct completion attempts per pipeline
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_top_errors")]
    pub top_errors: usize,

    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: default_api_version(),
            assistant_id: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            use_mock: true,
            fixtures: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            max_attempts: default_max_attempts(),
            top_errors: default_top_errors(),
            max_recommendations: default_max_recommendations(),
        }
    }
}

fn default_api_version() -> String {
    "2024-02-01".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_polls() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_top_errors() -> usize {
    5
}

fn default_max_recommendations() -> usize {
    5
}

impl AiConfig {
    /// Names of required settings that are unset, as environment variable names.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        [
            (ENV_ENDPOINT, &self.endpoint),
            (ENV_API_KEY, &self.api_key),
            (ENV_DEPLOYMENT, &self.deployment),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path (must exist)
    /// 2. ./pipesight.toml
    /// 3. ./pipesight.json
    /// 4. ./pipesight.yaml
    /// 5. ./pipesight.yml
    /// 6. `<user config dir>/pipesight/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "pipesight.toml",
            "pipesight.json",
            "pipesight.yaml",
            "pipesight.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        let user_config = dirs::config_dir().map(|dir| dir.join("pipesight").join("config.toml"));
        if let Some(user_config) = user_config {
            if user_config.exists() {
                return Self::load_from_path(&user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Overlay settings from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay settings from an arbitrary variable lookup. Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(endpoint) = get(ENV_ENDPOINT) {
            self.ai.endpoint = Some(endpoint);
        }
        if let Some(api_key) = get(ENV_API_KEY) {
            self.ai.api_key = Some(api_key);
        }
        if let Some(deployment) = get(ENV_DEPLOYMENT) {
            self.ai.deployment = Some(deployment);
        }
        if let Some(api_version) = get(ENV_API_VERSION) {
            self.ai.api_version = api_version;
        }
        if let Some(assistant_id) = get(ENV_ASSISTANT_ID) {
            self.ai.assistant_id = Some(assistant_id);
        }
        if let Some(use_mock) = get(ENV_USE_MOCK) {
            self.data_source.use_mock =
                matches!(use_mock.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    /// Check everything the run needs before any pipeline is touched.
    ///
    /// # Errors
    ///
    /// Returns `PipeSightError::Config` listing every missing AI setting, or
    /// describing an endpoint that is not a valid URL.
    pub fn validate(&self) -> crate::error::Result<()> {
        let missing = self.ai.missing_settings();
        if !missing.is_empty() {
            return Err(PipeSightError::Config(format!(
                "missing required settings: {} (set them in the environment, a .env file or the [ai] config section)",
                missing.join(", ")
            )));
        }

        if let Some(endpoint) = &self.ai.endpoint {
            Url::parse(endpoint).map_err(|e| {
                PipeSightError::Config(format!("Invalid endpoint URL '{endpoint}': {e}"))
            })?;
        }

        if self.analysis.max_attempts == 0 {
            return Err(PipeSightError::Config(
                "analysis.max-attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

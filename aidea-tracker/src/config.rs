//! Tracker configuration
//!
//! Everything the tracker needs is collected into one [`TrackerConfig`] at
//! startup and handed to constructors. Sources, highest priority first:
//! command line, environment, `aidea-tracker.toml`, compiled defaults.

use aidea_common::config::{env_non_empty, load_toml_or_default, resolve_data_folder};
use aidea_common::{Error, Project, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::categorizer::AcceptedGrades;

pub const CONFIG_FILE_NAME: &str = "aidea-tracker.toml";
pub const DEFAULT_PORT: u16 = 5730;
pub const DEFAULT_FILE_PREFIX: &str = "aidea_activity_tracking";
pub const DEFAULT_ACCEPTED_GRADES: &str = "A,B";
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Env var overriding the data folder
pub const DATA_DIR_ENV: &str = "AIDEA_DATA_DIR";

/// Vector backend (Weaviate) settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeaviateConfig {
    pub host: String,
    pub port: u16,
    /// `http` or `https`
    pub protocol: String,
    /// Collection (class) holding rules
    pub class: String,
    /// Ollama endpoint as seen from inside the Weaviate container
    pub ollama_endpoint: String,
    pub embed_model: String,
    pub generative_model: String,
}

impl Default for WeaviateConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            protocol: "http".to_string(),
            class: "ActivityRules".to_string(),
            ollama_endpoint: "http://host.docker.internal:11434".to_string(),
            embed_model: "all-minilm".to_string(),
            generative_model: "gemma3".to_string(),
        }
    }
}

impl WeaviateConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Text generation (Ollama) settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Full URL of the generate endpoint
    pub endpoint: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "gemma3".to_string(),
        }
    }
}

/// On-disk shape of `aidea-tracker.toml`; every key optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub file_prefix: Option<String>,
    pub auto_categorize_grades: Option<String>,
    pub search_limit: Option<usize>,
    pub upstream_timeout_secs: Option<u64>,
    pub jira_tempo_endpoint: Option<String>,
    pub weaviate: WeaviateConfig,
    pub ollama: OllamaConfig,
    pub projects: Vec<Project>,
}

/// Values taken from the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Resolved configuration handed to the tracker
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub file_prefix: String,
    pub accepted_grades: AcceptedGrades,
    /// Nearest-neighbor candidates requested per search
    pub search_limit: usize,
    /// Bound on every call to an external backend
    pub upstream_timeout: Duration,
    /// Tempo worklog endpoint; exports are refused when unset
    pub tempo_endpoint: Option<String>,
    pub weaviate: WeaviateConfig,
    pub ollama: OllamaConfig,
    pub projects: Vec<Project>,
}

impl TrackerConfig {
    /// Build the configuration from a config file path (if any), the process
    /// environment and CLI overrides.
    pub fn load(config_path: Option<&Path>, cli: CliOverrides) -> Result<Self> {
        let toml_config: TomlConfig = load_toml_or_default(config_path)?;
        Self::resolve(toml_config, cli)
    }

    /// Layer environment and CLI values over a parsed TOML config
    pub fn resolve(toml_config: TomlConfig, cli: CliOverrides) -> Result<Self> {
        let TomlConfig {
            port,
            bind,
            data_dir,
            file_prefix,
            auto_categorize_grades,
            search_limit,
            upstream_timeout_secs,
            jira_tempo_endpoint,
            mut weaviate,
            mut ollama,
            mut projects,
        } = toml_config;

        let port = match cli.port {
            Some(p) => p,
            None => match env_non_empty("TRACKER_PORT") {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| Error::Config(format!("TRACKER_PORT is not a port: {}", raw)))?,
                None => port.unwrap_or(DEFAULT_PORT),
            },
        };

        let bind = cli
            .bind
            .or(bind)
            .unwrap_or_else(|| "127.0.0.1".to_string());

        let data_dir = resolve_data_folder(cli.data_dir.as_deref(), DATA_DIR_ENV, data_dir.as_deref());

        let grades_raw = env_non_empty("AUTO_CATEGORIZE_GRADES")
            .or(auto_categorize_grades)
            .unwrap_or_else(|| DEFAULT_ACCEPTED_GRADES.to_string());
        let accepted_grades = AcceptedGrades::parse(&grades_raw)?;

        let timeout_secs = match env_non_empty("UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("UPSTREAM_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            None => upstream_timeout_secs.unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(Error::Config("upstream timeout must be at least 1 second".to_string()));
        }

        let search_limit = search_limit.unwrap_or(DEFAULT_SEARCH_LIMIT).max(1);

        apply_weaviate_env(&mut weaviate)?;
        apply_ollama_env(&mut ollama);

        let env_projects = projects_from_env();
        if !env_projects.is_empty() {
            if !projects.is_empty() {
                warn!("Projects found in both TOML and environment, using environment");
            }
            projects = env_projects;
        }

        let tempo_endpoint = env_non_empty("JIRA_TEMPO_ENDPOINT").or(jira_tempo_endpoint);

        let config = Self {
            bind,
            port,
            data_dir,
            file_prefix: file_prefix.unwrap_or_else(|| DEFAULT_FILE_PREFIX.to_string()),
            accepted_grades,
            search_limit,
            upstream_timeout: Duration::from_secs(timeout_secs),
            tempo_endpoint,
            weaviate,
            ollama,
            projects,
        };

        info!(
            accepted_grades = %config.accepted_grades,
            search_limit = config.search_limit,
            timeout_secs = timeout_secs,
            projects = config.projects.len(),
            "Configuration resolved"
        );

        Ok(config)
    }
}

fn apply_weaviate_env(weaviate: &mut WeaviateConfig) -> Result<()> {
    if let Some(v) = env_non_empty("WEAVIATE_HOST") {
        weaviate.host = v;
    }
    if let Some(v) = env_non_empty("WEAVIATE_PORT") {
        weaviate.port = v
            .parse()
            .map_err(|_| Error::Config(format!("WEAVIATE_PORT is not a port: {}", v)))?;
    }
    if let Some(v) = env_non_empty("WEAVIATE_PROTOCOL") {
        weaviate.protocol = v;
    }
    if let Some(v) = env_non_empty("WEAVIATE_CLASS") {
        weaviate.class = v;
    }
    if let Some(v) = env_non_empty("WEAVIATE_OLLAMA_ENDPOINT") {
        weaviate.ollama_endpoint = v;
    }
    if let Some(v) = env_non_empty("WEAVIATE_OLLAMA_EMBED_MODEL") {
        weaviate.embed_model = v;
    }
    if let Some(v) = env_non_empty("WEAVIATE_OLLAMA_GEN_MODEL") {
        weaviate.generative_model = v;
    }
    Ok(())
}

fn apply_ollama_env(ollama: &mut OllamaConfig) {
    if let Some(v) = env_non_empty("OLLAMA_GEN_ENDPOINT") {
        ollama.endpoint = v;
    }
    if let Some(v) = env_non_empty("OLLAMA_GEN_MODEL") {
        ollama.model = v;
    }
}

/// `PROJECT_1_NAME`, `PROJECT_1_TASK`, `PROJECT_1_JIRA`, ... until the first gap
fn projects_from_env() -> Vec<Project> {
    let mut projects = Vec::new();
    for i in 1.. {
        let Some(project_name) = env_non_empty(&format!("PROJECT_{}_NAME", i)) else {
            break;
        };
        projects.push(Project {
            project_name,
            task: env_non_empty(&format!("PROJECT_{}_TASK", i)).unwrap_or_default(),
            jira: env_non_empty(&format!("PROJECT_{}_JIRA", i)).unwrap_or_default(),
        });
    }
    projects
}

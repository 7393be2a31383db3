//! Configuration loading.
//!
//! The configuration is a single JSON object stored under the data directory
//! (`~/.rusty-nlsh/config.json` by default). A missing file is replaced by the
//! defaults, written atomically. `MODEL_PATH` overrides the model path and
//! `RUSTY_NLSH_CONFIG` overrides the file location.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::pipeline::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::security::TrashInterceptor;

pub const MODEL_PATH_ENV: &str = "MODEL_PATH";
pub const CONFIG_PATH_ENV: &str = "RUSTY_NLSH_CONFIG";

const DEFAULT_MODEL_PATH: &str = "./models/codellama-7b-instruct.Q4_K_M.gguf";
const DEFAULT_API_BASE: &str = "http://localhost:8080/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model_path: PathBuf,
    /// OpenAI-compatible endpoint serving the model.
    pub api_base: String,
    /// Defaults to the model file stem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    pub audit_log: PathBuf,
    pub trash_dir: PathBuf,
    /// History lines passed to the translator.
    pub history_limit: usize,
    pub confidence_threshold: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            api_base: DEFAULT_API_BASE.to_string(),
            model_name: None,
            audit_log: data_dir().join("audit_log.jsonl"),
            trash_dir: TrashInterceptor::default_root(),
            history_limit: 20,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl Config {
    /// Name sent to the model endpoint.
    pub fn model_name(&self) -> String {
        self.model_name.clone().unwrap_or_else(|| {
            self.model_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "local-model".to_string())
        })
    }

    /// Apply environment overrides on top of the file contents.
    pub fn apply_env(mut self) -> Self {
        if let Some(path) = std::env::var_os(MODEL_PATH_ENV).filter(|p| !p.is_empty()) {
            self.model_path = PathBuf::from(path);
        }
        self
    }
}

/// `~/.rusty-nlsh`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rusty-nlsh")
}

pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join("config.json"))
}

/// Load `path`, writing the defaults there first if it does not exist.
/// Environment overrides are not applied here.
pub fn load_or_init(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        let config = Config::default();
        save(path, &config)?;
        tracing::info!("Wrote default configuration to {}", path.display());
        return Ok(config);
    }
    load(path)
}

pub fn load(path: &Path) -> anyhow::Result<Config> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config =
        serde_json::from_str(&raw).with_context(|| format!("Invalid config JSON at {}", path.display()))?;
    Ok(config)
}

pub fn save(path: &Path, config: &Config) -> anyhow::Result<()> {
    let data = serde_json::to_vec_pretty(config).context("Failed to serialize config")?;
    write_atomic(path, &data)
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    Ok(())
}

fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    ensure_parent_dir(path)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data).with_context(|| format!("Failed to write temp file: {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| {
        format!(
            "Failed to replace {} with {}",
            path.display(),
            tmp.display()
        )
    })?;
    Ok(())
}

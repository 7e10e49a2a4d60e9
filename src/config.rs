use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf};

const APP_NAME: &str = "termi";
const DEFAULT_MODEL: &str = "gemma2:2b";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_LMSTUDIO_URL: &str = "http://localhost:1234";
const DEFAULT_LLAMACPP_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub backends: Vec<String>,
    pub ollama_url: String,
    pub lmstudio_url: String,
    pub llamacpp_url: String,
    pub temperature: f32,
    pub num_ctx: u32,
    pub num_predict: u32,
    pub timeout_secs: u64,
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub stream: bool,
    pub safety_confirm: bool,
    pub shell: String,
    pub context_lines: usize,
    pub history_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub theme: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub behavior: BehaviorConfig,
    pub output: OutputConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            backends: vec!["ollama".to_string()],
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            lmstudio_url: DEFAULT_LMSTUDIO_URL.to_string(),
            llamacpp_url: DEFAULT_LLAMACPP_URL.to_string(),
            temperature: 0.1,
            num_ctx: 4096,
            num_predict: 512,
            timeout_secs: 180,
            probe_timeout_ms: 300,
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            stream: true,
            safety_confirm: true,
            shell: env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string()),
            context_lines: 50,
            history_limit: 500,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            theme: "monokai".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub safety_confirm: Option<bool>,
    pub stream: Option<bool>,
}

pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

pub fn get_prompt_history_path() -> PathBuf {
    get_config_dir().join("prompt_history")
}

pub fn load_config(overrides: &Overrides) -> Config {
    let mut config = load_file(&get_config_path());
    apply_env(&mut config, |key| env::var(key).ok());
    apply_overrides(&mut config, overrides);
    config
}

pub fn load_file(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring invalid config {}: {}", path.display(), e);
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!("cannot read config {}: {}", path.display(), e);
            Config::default()
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes")
}

pub fn apply_env<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("TERMI_MODEL") {
        config.llm.model = v;
    }
    if let Some(v) = lookup("OLLAMA_URL") {
        config.llm.ollama_url = v;
    }
    if let Some(v) = lookup("LMSTUDIO_URL") {
        config.llm.lmstudio_url = v;
    }
    if let Some(v) = lookup("LLAMACPP_URL") {
        config.llm.llamacpp_url = v;
    }
    if let Some(v) = lookup("TERMI_THEME") {
        config.output.theme = v;
    }
    if let Some(v) = lookup("TERMI_SHELL") {
        config.behavior.shell = v;
    }
    if let Some(v) = lookup("TERMI_STREAM") {
        config.behavior.stream = parse_bool(&v);
    }
    if let Some(v) = lookup("TERMI_SAFETY") {
        config.behavior.safety_confirm = parse_bool(&v);
    }
}

pub fn apply_overrides(config: &mut Config, overrides: &Overrides) {
    if let Some(model) = &overrides.model {
        config.llm.model = model.clone();
    }
    if let Some(safety) = overrides.safety_confirm {
        config.behavior.safety_confirm = safety;
    }
    if let Some(stream) = overrides.stream {
        config.behavior.stream = stream;
    }
}

pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn write_default_config() -> Result<PathBuf> {
    let path = get_config_path();
    if !path.exists() {
        save_config(&Config::default(), &path)?;
    }
    Ok(path)
}

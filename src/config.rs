use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, friendly assistant.";
pub const CONFIG_FILE_NAME: &str = "config.yml";

/// Provider picked at startup when it is configured.
const PREFERRED_PROVIDER: &str = "openai";

fn default_temperature() -> f64 {
    0.7
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// Provider name to provider settings, as written in `config.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Config {
    pub fn load(path: &Path) -> AppResult<Self> {
        let data = fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_yaml::from_str(&data).map_err(|source| AppError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        tracing::info!(path = %path.display(), providers = config.providers.len(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml_str(data: &str) -> AppResult<Self> {
        let config: Config = serde_yaml::from_str(data)
            .map_err(|e| AppError::ConfigInvalid(format!("malformed YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.providers.is_empty() {
            return Err(AppError::ConfigInvalid("no providers configured".into()));
        }
        if let Some((name, _)) = self.providers.iter().find(|(_, p)| p.models.is_empty()) {
            return Err(AppError::ConfigInvalid(format!(
                "provider '{name}' has no models"
            )));
        }
        Ok(())
    }

    pub fn get_all_providers(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn get_provider_config(&self, name: &str) -> AppResult<&ProviderConfig> {
        self.providers
            .get(name)
            .ok_or_else(|| AppError::ProviderNotFound(name.to_string()))
    }

    pub fn get_models_for_provider(&self, name: &str) -> AppResult<&[ModelConfig]> {
        self.get_provider_config(name).map(|p| p.models.as_slice())
    }

    /// Index of the provider to activate at startup.
    pub fn initial_provider_index(&self) -> usize {
        self.providers
            .keys()
            .position(|name| name == PREFERRED_PROVIDER)
            .unwrap_or(0)
    }

    fn example() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            "example-provider".to_string(),
            ProviderConfig {
                endpoint: "https://api.example.com/v1".to_string(),
                api_key: "YOUR_API_KEY_HERE".to_string(),
                models: vec![ModelConfig {
                    name: "default-model".to_string(),
                    temperature: default_temperature(),
                    system_prompt: default_system_prompt(),
                }],
            },
        );
        Self { providers }
    }
}

pub fn project_dirs() -> AppResult<ProjectDirs> {
    ProjectDirs::from("", "", "atlas")
        .ok_or_else(|| AppError::ConfigInvalid("cannot determine home directory".into()))
}

pub fn default_config_path() -> AppResult<PathBuf> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE_NAME))
}

pub fn default_history_dir() -> AppResult<PathBuf> {
    Ok(project_dirs()?.config_dir().join("chat-history"))
}

pub fn default_log_path() -> AppResult<PathBuf> {
    Ok(project_dirs()?.config_dir().join("atlas.log"))
}

/// Writes an example config to `path` if nothing is there yet.
///
/// Returns `true` when a new file was created.
pub fn ensure_config_exists(path: &Path) -> AppResult<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| AppError::ConfigRead {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let data = serde_yaml::to_string(&Config::example())
        .map_err(|e| AppError::ConfigInvalid(format!("could not render default config: {e}")))?;
    fs::write(path, data).map_err(|source| AppError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    // The file holds API keys.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| {
            AppError::ConfigRead {
                path: path.to_path_buf(),
                source,
            }
        })?;
    }
    tracing::info!(path = %path.display(), "wrote default config");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
openai:
  endpoint: https://api.openai.com/v1
  api_key: sk-test
  models:
    - name: gpt-4o-mini
      temperature: 0.2
      system_prompt: Be brief.
    - name: gpt-4o
groq:
  endpoint: https://api.groq.com/openai/v1
  api_key: gsk-test
  models:
    - name: llama-3.1-8b-instant
"#;

    #[test]
    fn parses_inline_provider_map() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.get_all_providers(), vec!["groq", "openai"]);

        let models = config.get_models_for_provider("openai").unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].temperature, 0.2);
        assert_eq!(models[0].system_prompt, "Be brief.");
        assert_eq!(models[1].temperature, 0.7);
        assert_eq!(models[1].system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn prefers_openai_at_startup() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.initial_provider_index(), 1);
    }

    #[test]
    fn unknown_provider_is_reported() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        let err = config.get_provider_config("mistral").unwrap_err();
        assert!(matches!(err, AppError::ProviderNotFound(name) if name == "mistral"));
    }

    #[test]
    fn provider_without_models_is_invalid() {
        let err = Config::from_yaml_str("local:\n  endpoint: http://localhost:11434/v1\n")
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn writes_default_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        assert!(ensure_config_exists(&path).unwrap());
        assert!(!ensure_config_exists(&path).unwrap());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.get_all_providers(), vec!["example-provider"]);
    }
}

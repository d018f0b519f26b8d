//! Configuration management for story-factory.
//!
//! Loads `config.yaml` from standard locations and the two API credentials
//! from the environment or a `secrets.yaml` file next to it.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Name of the required text-generation credential.
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
/// Name of the optional speech-synthesis credential.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },
    #[error("missing {0} in secrets")]
    MissingCredential(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Sessions idle for longer than this are dropped.
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8501,
            session_ttl_secs: 6 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: "tts-1".into(),
            base_url: "https://api.openai.com/v1".into(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub title: String,
    pub default_font_size: u32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "The Story Factory".into(),
            default_font_size: 18,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub path: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            path: "secrets.yaml".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub speech: SpeechConfig,
    pub ui: UiConfig,
    pub secrets: SecretsConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/story-factory/config.yaml
    /// 3. /etc/story-factory/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/story-factory/config.yaml")),
                Some(PathBuf::from("/etc/story-factory/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match Self::from_file(&config_path) {
            Ok(config) => {
                info!("Loaded config from {}", config_path.display());
                config
            }
            Err(e) => {
                warn!("{e}, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The two API credentials. Either may be absent; only the Google key is
/// required for the app to be usable.
#[derive(Clone, Default)]
pub struct Secrets {
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "***"))
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Secrets {
    /// Environment variables win over the secrets file. A missing,
    /// unreadable or malformed file is skipped with a warning.
    pub fn load(path: &Path) -> Self {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    fn load_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Self {
        let file = if path.exists() {
            match Self::read_file(path) {
                Ok(map) => {
                    info!("Loaded secrets from {}", path.display());
                    map
                }
                Err(e) => {
                    warn!("{e}, using environment only");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Self::from_sources(env, &file)
    }

    fn read_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_sources(
        env: impl Fn(&str) -> Option<String>,
        file: &HashMap<String, String>,
    ) -> Self {
        let non_blank = |v: String| {
            let v = v.trim().to_string();
            (!v.is_empty()).then_some(v)
        };
        let lookup = |name: &str| {
            env(name)
                .and_then(non_blank)
                .or_else(|| file.get(name).cloned().and_then(non_blank))
        };

        Self {
            google_api_key: lookup(GOOGLE_API_KEY),
            openai_api_key: lookup(OPENAI_API_KEY),
        }
    }

    pub fn google_api_key(&self) -> Result<&str, ConfigError> {
        self.google_api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential(GOOGLE_API_KEY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "server:\n  port: 9000\ngemini:\n  model: gemini-2.0-flash\n";
        let config: Config = serde_yml::from_str(yaml).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.speech.model, "tts-1");
        assert_eq!(config.ui.default_font_size, 18);
    }

    #[test]
    fn test_load_missing_path_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.yaml")));
        assert_eq!(config.server.port, 8501);
    }

    #[test]
    fn test_from_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server: [not, a, map").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides_secrets_file() {
        let mut file = HashMap::new();
        file.insert(GOOGLE_API_KEY.to_string(), "from-file".to_string());
        file.insert(OPENAI_API_KEY.to_string(), "openai-file".to_string());

        let secrets = Secrets::from_sources(
            |name| (name == GOOGLE_API_KEY).then(|| "from-env".to_string()),
            &file,
        );
        assert_eq!(secrets.google_api_key.as_deref(), Some("from-env"));
        assert_eq!(secrets.openai_api_key.as_deref(), Some("openai-file"));
    }

    #[test]
    fn test_blank_credentials_count_as_missing() {
        let mut file = HashMap::new();
        file.insert(GOOGLE_API_KEY.to_string(), "   ".to_string());

        let secrets = Secrets::from_sources(|_| None, &file);
        assert!(secrets.google_api_key.is_none());
        assert!(matches!(
            secrets.google_api_key(),
            Err(ConfigError::MissingCredential(GOOGLE_API_KEY))
        ));
        assert!(secrets.openai_api_key.is_none());
    }

    #[test]
    fn test_secrets_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.yaml");
        std::fs::write(&path, "GOOGLE_API_KEY: abc\n").unwrap();

        let secrets = Secrets::load_with(&path, |_| None);
        assert_eq!(secrets.google_api_key().unwrap(), "abc");
    }

    #[test]
    fn test_broken_secrets_file_falls_back_to_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.yaml");
        std::fs::write(&path, "GOOGLE_API_KEY: [broken\n").unwrap();
        assert!(matches!(
            Secrets::read_file(&path),
            Err(ConfigError::Parse { .. })
        ));

        let secrets = Secrets::load_with(&path, |name| {
            (name == GOOGLE_API_KEY).then(|| "env-key".to_string())
        });
        assert_eq!(secrets.google_api_key().unwrap(), "env-key");
        assert!(secrets.openai_api_key.is_none());

        let secrets = Secrets::load_with(&path, |_| None);
        assert!(secrets.google_api_key().is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let secrets = Secrets {
            google_api_key: Some("very-secret".into()),
            openai_api_key: None,
        };
        assert!(!format!("{secrets:?}").contains("very-secret"));
    }
}

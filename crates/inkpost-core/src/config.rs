//! Configuration management for inkpost.
//!
//! Loads configuration from ${INKPOST_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Env var that overrides `[backend] base_url`.
pub const BACKEND_URL_ENV: &str = "INKPOST_BACKEND_URL";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
/// To update, edit default_config.toml directly or run
/// `cargo run -p xtask -- update-default-config`.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for inkpost configuration and data files.
    //!
    //! INKPOST_HOME resolution order:
    //! 1. INKPOST_HOME environment variable (if set)
    //! 2. ~/.config/inkpost (default)

    use std::path::PathBuf;

    /// Returns the inkpost home directory.
    ///
    /// Checks INKPOST_HOME env var first, falls back to ~/.config/inkpost,
    /// and to a relative `.inkpost` when no home directory is known.
    pub fn inkpost_home() -> PathBuf {
        if let Ok(home) = std::env::var("INKPOST_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".inkpost"),
            |h| h.join(".config").join("inkpost"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        inkpost_home().join("config.toml")
    }

    /// Returns the path to the persisted session.
    pub fn session_path() -> PathBuf {
        inkpost_home().join("session.json")
    }

    /// Returns the directory that holds log files.
    pub fn logs_dir() -> PathBuf {
        inkpost_home().join("logs")
    }
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the blog API (scheme + host, no trailing path).
    pub base_url: String,
    /// Command-line override; wins over the environment and `base_url`.
    #[serde(skip)]
    pub override_url: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: Config::DEFAULT_BACKEND_URL.to_string(),
            override_url: None,
        }
    }
}

/// Google identity provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// OAuth client ID. Sign-in is unavailable while unset.
    pub client_id: Option<String>,
    /// OAuth client secret (desktop clients ship one; it is not confidential).
    pub client_secret: Option<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// Loopback port for the OAuth redirect.
    pub redirect_port: u16,
    /// How long to wait for the browser redirect before asking for a pasted code.
    pub callback_timeout_secs: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            redirect_port: 8085,
            callback_timeout_secs: 120,
        }
    }
}

impl GoogleConfig {
    /// Returns the client ID if set and non-empty.
    pub fn effective_client_id(&self) -> Option<&str> {
        self.client_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the client secret if set and non-empty.
    pub fn effective_client_secret(&self) -> Option<&str> {
        self.client_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

/// Post listing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostsConfig {
    /// Number of posts shown under "Recent articles".
    pub recent_limit: u32,
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self { recent_limit: 3 }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when INKPOST_LOG is unset.
    pub level: String,
    /// Mirror log events to stderr.
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            stderr: false,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub google: GoogleConfig,
    pub posts: PostsConfig,
    pub log: LogConfig,
}

impl Config {
    const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the backend base URL with precedence:
    /// command-line override > env > config > default.
    ///
    /// Read at call time so a changed environment is picked up by the next
    /// request.
    ///
    /// # Errors
    /// Returns an error if the chosen value is not a valid URL.
    pub fn backend_url(&self) -> Result<String> {
        let from_env = std::env::var(BACKEND_URL_ENV).ok();
        let candidate = [
            self.backend.override_url.as_deref(),
            from_env.as_deref(),
            Some(self.backend.base_url.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(Self::DEFAULT_BACKEND_URL);

        url::Url::parse(candidate)
            .with_context(|| format!("Invalid backend base URL: {candidate}"))?;
        Ok(candidate.trim_end_matches('/').to_string())
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// Used by the xtask `update-default-config` task to keep
    /// `default_config.toml` in sync with `Config::default()`. Comments come
    /// from the embedded template; values come from the defaults.
    ///
    /// # Errors
    /// Returns an error if serialization or template parsing fails.
    pub fn generate() -> Result<String> {
        use toml_edit::DocumentMut;

        let generated_toml = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?;

        let mut doc: DocumentMut = default_config_template()
            .parse()
            .context("Failed to parse default config template")?;
        let generated_doc: DocumentMut = generated_toml
            .parse()
            .context("Failed to parse generated config")?;

        merge_items(doc.as_table_mut(), generated_doc.as_table());

        Ok(doc.to_string())
    }

    /// Writes config content via temp file + rename, creating parent dirs.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:3000");
        assert_eq!(config.posts.recent_limit, 3);
        assert_eq!(config.google.effective_client_id(), None);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            "[google]\nclient_id = \"abc.apps.googleusercontent.com\"\n",
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(
            config.google.effective_client_id(),
            Some("abc.apps.googleusercontent.com")
        );
        assert_eq!(config.google.redirect_port, 8085);
        assert_eq!(config.posts.recent_limit, 3);
    }

    #[test]
    fn test_init_creates_config_with_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        assert!(config_path.exists());
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("base_url = \"http://localhost:3000\""));
        assert!(contents.contains("# client_id ="));

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.posts.recent_limit, 3);
    }

    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "").unwrap();

        assert!(Config::init(&config_path).is_err());
    }

    #[test]
    fn test_generate_keeps_template_comments() {
        let generated = Config::generate().unwrap();
        assert!(generated.contains("# inkpost configuration"));
        assert!(generated.contains("recent_limit = 3"));
    }

    #[test]
    fn test_client_id_whitespace_is_unset() {
        let config = GoogleConfig {
            client_id: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_client_id(), None);
    }

    #[test]
    fn test_backend_url_rejects_garbage() {
        let config = Config {
            backend: BackendConfig {
                base_url: "not a url".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        // Only meaningful when the env override is absent.
        if std::env::var(BACKEND_URL_ENV).is_err() {
            assert!(config.backend_url().is_err());
        }
    }

    #[test]
    fn test_backend_url_strips_trailing_slash() {
        let config = Config {
            backend: BackendConfig {
                base_url: "https://blog.example.com/".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        if std::env::var(BACKEND_URL_ENV).is_err() {
            assert_eq!(config.backend_url().unwrap(), "https://blog.example.com");
        }
    }

    #[test]
    fn test_backend_url_override_wins() {
        let config = Config {
            backend: BackendConfig {
                base_url: "https://blog.example.com".to_string(),
                override_url: Some(" http://127.0.0.1:4000/ ".to_string()),
            },
            ..Default::default()
        };
        assert_eq!(config.backend_url().unwrap(), "http://127.0.0.1:4000");
    }
}

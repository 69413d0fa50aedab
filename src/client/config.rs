use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};

/// Default API URL
const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

/// Directory name under the platform config/data dirs
const APP_DIR: &str = "panel";

/// Durable session file name
const SESSION_FILE: &str = "session.json";

/// Client configuration wrapper.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: env_overrides(AppConfig::default()),
        }
    }
}

impl Config {
    /// Create a new configuration from the environment
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        let app = builder.build()?;
        Ok(Self { app })
    }

    /// Load `config.toml` from `path` (or the platform config dir), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        let file = match path {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "Loading configuration file");
                AppConfig::from_toml_str(&std::fs::read_to_string(&path)?)?
            }
            _ => AppConfig::default(),
        };
        let app = env_overrides(file);
        app.validate()?;
        Ok(Self { app })
    }

    /// Replace the API base URL, e.g. from a command-line flag.
    pub fn with_api_base_url(self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let app = self.app.merge(AppConfig {
            api_base_url: Some(url.into()),
            ..AppConfig::default()
        });
        app.validate()?;
        Ok(Self { app })
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url().trim_end_matches('/'), path)
    }

    pub fn api_base_url(&self) -> &str {
        self.app.api_base_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Secret sent as `x-vercel-protection-bypass` on every request
    pub fn bypass_token(&self) -> Option<&str> {
        self.app.bypass_token.as_deref()
    }

    pub fn password_reset_redirect(&self) -> Option<&str> {
        self.app.password_reset_redirect.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.app.timeout()
    }

    /// File backing the durable session store
    pub fn session_file(&self) -> PathBuf {
        self.app
            .data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR)))
            .unwrap_or_else(|| PathBuf::from(".").join(format!(".{APP_DIR}")))
            .join(SESSION_FILE)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

fn env_overrides(app: AppConfig) -> AppConfig {
    let env = AppConfig {
        api_base_url: std::env::var("PANEL_API_URL").ok(),
        bypass_token: std::env::var("PANEL_BYPASS_TOKEN").ok().filter(|v| !v.is_empty()),
        password_reset_redirect: std::env::var("PANEL_RESET_REDIRECT").ok(),
        data_dir: std::env::var("PANEL_DATA_DIR").ok().map(PathBuf::from),
        timeout_secs: None,
    };
    app.merge(env)
}

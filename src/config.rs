use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const APP_DIR: &str = "eve_mail_backup";

/// Narrower than this and html2text gives up on nested lists and links.
pub const MIN_WRAP_WIDTH: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config dir available")]
    NoConfigDir,
    #[error("could not read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config already exists at {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("client_secret not set; add it to the config file or set EVE_CLIENT_SECRET")]
    MissingClientSecret,
    #[error("invalid {field} '{value}': {reason}")]
    Invalid {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the run needs, resolved once at startup.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub login_url: String,
    pub api_base_url: String,
    pub output_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub callback_timeout_secs: u64,
    pub wrap_width: usize,
    pub max_pages: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: "8dbb2e13b13c475fb1e51207b5e75df4".to_string(),
            client_secret: None,
            redirect_uri: "http://localhost:12525/callback".to_string(),
            scope: "esi-mail.read_mail.v1".to_string(),
            login_url: "https://login.eveonline.com".to_string(),
            api_base_url: "https://esi.evetech.net/latest".to_string(),
            output_dir: PathBuf::from("eve-mail"),
            request_timeout_secs: 30,
            callback_timeout_secs: 55,
            wrap_width: 80,
            max_pages: None,
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    /// Override credentials from `EVE_CLIENT_ID` / `EVE_CLIENT_SECRET`.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("EVE_CLIENT_ID").filter(|s| !s.trim().is_empty()) {
            self.client_id = id.trim().to_string();
        }
        if let Some(secret) = lookup("EVE_CLIENT_SECRET").filter(|s| !s.trim().is_empty()) {
            self.client_secret = Some(secret.trim().to_string());
        }
    }

    pub fn client_secret(&self) -> Result<&str, ConfigError> {
        self.client_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingClientSecret)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client_secret()?;
        for (field, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("login_url", &self.login_url),
            ("api_base_url", &self.api_base_url),
        ] {
            Url::parse(value).map_err(|e| ConfigError::Invalid {
                field,
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                value: "0".into(),
                reason: "must be at least one second".into(),
            });
        }
        if self.callback_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "callback_timeout_secs",
                value: "0".into(),
                reason: "must be at least one second".into(),
            });
        }
        if self.wrap_width < MIN_WRAP_WIDTH {
            return Err(ConfigError::Invalid {
                field: "wrap_width",
                value: self.wrap_width.to_string(),
                reason: format!("must be at least {MIN_WRAP_WIDTH} columns"),
            });
        }
        Ok(())
    }
}

fn config_dir() -> Result<PathBuf, ConfigError> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::NoConfigDir)?
        .join(APP_DIR))
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load config from `path`, or from the default location if it exists.
///
/// An explicit path must exist. A missing default file yields the built-in
/// defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(p) => read_config(p),
        None => {
            let p = default_config_path()?;
            if p.exists() {
                read_config(&p)
            } else {
                log::debug!("no config at {}, using defaults", p.display());
                Ok(Config::default())
            }
        }
    }
}

pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&s).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Create a template config for users to edit. Never overwrites.
pub fn write_template(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let sample = Config {
        client_secret: Some("YOUR_CLIENT_SECRET".to_string()),
        ..Config::default()
    };
    let tom = toml::to_string_pretty(&sample)?;
    fs::write(path, tom).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

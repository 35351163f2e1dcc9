use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub endpoint: String,
    #[serde(default = "default_generate_path")]
    pub generate_path: String,
    /// Only the connect phase is bounded; a stalled body is read indefinitely
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

pub(crate) fn default_generate_path() -> String {
    "/generate".to_string()
}

pub(crate) const fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000".to_string(),
            generate_path: default_generate_path(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_directory")]
    pub directory: String,
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

pub(crate) fn default_log_directory() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_show_reasoning")]
    pub show_reasoning: bool,
    /// Print the retrieved legal passages under each answer
    #[serde(default)]
    pub show_sources: bool,
}

pub(crate) const fn default_show_reasoning() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_reasoning: default_show_reasoning(),
            show_sources: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(crate::LegalxError::Io)?;

        let config: AppConfig =
            toml::from_str(&content).map_err(crate::LegalxError::TomlParsing)?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default config file path
    ///
    /// Unlike a server, the client is usable without any file: when neither
    /// `config.toml` nor `config.example.toml` exists the built-in defaults
    /// point at a backend on `127.0.0.1:8000`.
    pub fn load() -> crate::Result<Self> {
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            tracing::warn!("Using config.example.toml. Create config.toml to customize the client.");
            Self::from_file("config.example.toml")
        } else {
            tracing::debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from an explicit path if given, otherwise from the default locations
    pub fn load_from(path: Option<&Path>) -> crate::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::load(),
        }
    }

    /// Reject configurations that cannot produce a request URL
    pub fn validate(&self) -> crate::Result<()> {
        self.generate_url()?;
        if self.backend.connect_timeout_secs == 0 {
            return Err(crate::LegalxError::ConfigError(
                "backend.connect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Full URL of the generate route
    pub fn generate_url(&self) -> crate::Result<Url> {
        let base = Url::parse(&self.backend.endpoint)?;
        if base.cannot_be_a_base() {
            return Err(crate::LegalxError::ConfigError(format!(
                "backend.endpoint is not a base URL: {}",
                self.backend.endpoint
            )));
        }
        Ok(base.join(&self.backend.generate_path)?)
    }

    /// Get backend endpoint
    pub fn endpoint(&self) -> &str {
        &self.backend.endpoint
    }

    /// Get connect timeout in seconds
    pub fn connect_timeout_secs(&self) -> u64 {
        self.backend.connect_timeout_secs
    }

    /// Get log level
    pub fn log_level(&self) -> &str {
        &self.logging.level
    }

    /// Get log directory
    pub fn log_directory(&self) -> &str {
        &self.logging.directory
    }

    /// Check if reasoning is rendered
    pub fn show_reasoning(&self) -> bool {
        self.display.show_reasoning
    }

    /// Check if context sources are rendered
    pub fn show_sources(&self) -> bool {
        self.display.show_sources
    }
}

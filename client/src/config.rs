use serde::{Deserialize, Serialize};
use shared::{BackendKind, PreprocessSpec};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "config/client.yaml";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid url for {backend}: {reason}")]
    InvalidUrl { backend: BackendKind, reason: String },
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResizeConfig {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub path: String,
    pub preprocess: ResizeConfig,
}

impl BackendConfig {
    fn defaults_for(backend: BackendKind) -> Self {
        let spec = backend.default_preprocess();
        Self {
            path: backend.default_path().to_string(),
            preprocess: ResizeConfig {
                width: spec.target_width,
                height: spec.target_height,
                quality: spec.quality,
            },
        }
    }
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("leafscan")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub backends: HashMap<BackendKind, BackendConfig>,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            backends: HashMap::new(),
            work_dir: default_work_dir(),
        }
    }
}

impl AppConfig {
    /// Reads `path` if given, otherwise `config/client.yaml` when present, then
    /// applies `LEAFSCAN_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                log::info!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading config from {}", path.display());
        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(config_str)?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("LEAFSCAN_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Some(timeout) = lookup("LEAFSCAN_TIMEOUT_SECS") {
            self.api.timeout_secs = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                key: "LEAFSCAN_TIMEOUT_SECS".into(),
                value: timeout.clone(),
            })?;
        }
        if let Some(work_dir) = lookup("LEAFSCAN_WORK_DIR") {
            self.work_dir = PathBuf::from(work_dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.timeout_secs".into(),
                value: "0".into(),
            });
        }
        for backend in BackendKind::all() {
            self.endpoint(backend)?;
            let spec = self.preprocess(backend);
            if !spec.is_valid() {
                return Err(ConfigError::InvalidValue {
                    key: format!("backends.{}.preprocess", backend),
                    value: format!("{:?}", spec),
                });
            }
        }
        Ok(())
    }

    pub fn backend(&self, backend: BackendKind) -> BackendConfig {
        self.backends
            .get(&backend)
            .cloned()
            .unwrap_or_else(|| BackendConfig::defaults_for(backend))
    }

    pub fn endpoint(&self, backend: BackendKind) -> Result<Url, ConfigError> {
        let invalid = |reason: url::ParseError| ConfigError::InvalidUrl {
            backend,
            reason: reason.to_string(),
        };
        let base = Url::parse(&self.api.base_url).map_err(invalid)?;
        base.join(&self.backend(backend).path).map_err(invalid)
    }

    pub fn preprocess(&self, backend: BackendKind) -> PreprocessSpec {
        let resize = self.backend(backend).preprocess;
        PreprocessSpec::jpeg(resize.width, resize.height, resize.quality)
    }

    pub fn preprocess_specs(&self) -> HashMap<BackendKind, PreprocessSpec> {
        BackendKind::all()
            .into_iter()
            .map(|backend| (backend, self.preprocess(backend)))
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}

use crate::error::AppError;
use crate::intake::camera::FacingMode;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "neurobin.toml";
pub const ENV_PREFIX: &str = "NEUROBIN";
pub const FALLBACK_API_KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub classifier: ClassifierSettings,
    pub normalizer: NormalizerSettings,
    pub camera: CameraSettings,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Treat labels outside the six known categories as a malformed response.
    pub strict_labels: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct NormalizerSettings {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: f32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub facing_mode: FacingMode,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            timeout_secs: 30,
            strict_labels: false,
        }
    }
}

// The credential must never reach the logs.
impl fmt::Debug for ClassifierSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierSettings")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("strict_labels", &self.strict_labels)
            .finish()
    }
}

impl ClassifierSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            max_width: 512,
            max_height: 512,
            quality: 0.9,
        }
    }
}

impl NormalizerSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(AppError::Config(
                "Normalizer bounds must be greater than 0".to_string(),
            ));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(AppError::Config(
                "Normalizer quality must be within (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

impl Settings {
    /// Loads defaults, then `path` (or `neurobin.toml` if present), then the
    /// `NEUROBIN__*` environment.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        Self::load_with_env(path, std::env::vars().collect())
    }

    pub fn load_with_env(
        path: Option<&Path>,
        env: HashMap<String, String>,
    ) -> Result<Self, AppError> {
        let mut builder = Config::builder();
        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let fallback_key = env.get(FALLBACK_API_KEY_VAR).cloned();
        let prefixed: config::Map<String, String> = env
            .into_iter()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(prefixed)),
            )
            .build()?
            .try_deserialize()?;

        let settings = settings.with_fallback_key(fallback_key);
        settings.validate()?;
        tracing::debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    fn with_fallback_key(mut self, fallback_key: Option<String>) -> Self {
        let missing = self
            .classifier
            .api_key
            .as_deref()
            .map(|key| key.trim().is_empty())
            .unwrap_or(true);
        if missing {
            self.classifier.api_key = fallback_key.filter(|key| !key.trim().is_empty());
        }
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.normalizer.validate()?;
        if self.classifier.timeout_secs == 0 {
            return Err(AppError::Config(
                "Classifier timeout must be greater than 0".to_string(),
            ));
        }
        if self.classifier.endpoint.trim().is_empty() {
            return Err(AppError::Config(
                "Classifier endpoint must not be empty".to_string(),
            ));
        }
        if self.classifier.model.trim().is_empty() {
            return Err(AppError::Config(
                "Classifier model must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn require_api_key(&self) -> Result<&str, AppError> {
        self.classifier.api_key.as_deref().ok_or_else(|| {
            AppError::Config(format!(
                "No API key configured; set {}__CLASSIFIER__API_KEY or {}",
                ENV_PREFIX, FALLBACK_API_KEY_VAR
            ))
        })
    }
}

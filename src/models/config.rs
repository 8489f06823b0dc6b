//! Configuration model loaded from external sources.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `MATCHER_*` environment variables (nested keys separated by `__`, e.g.
//! `MATCHER_MATCHER__TEXT_THRESHOLD=0.7`).

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::embedders::local::{ImageModel, TextModel};
use crate::{IMAGE_SIMILARITY_THRESHOLD, TEXT_SIMILARITY_THRESHOLD};

/// Tolerance applied when checking that combined weights sum to one.
const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
/// Basic configuration shared across handlers.
pub struct ServerConfig {
    pub zmq_address: String,
    pub matcher: MatcherConfig,
    pub embedders: EmbedderConfig,
    pub images: ImageSourceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            zmq_address: "tcp://127.0.0.1:5556".to_string(),
            matcher: MatcherConfig::default(),
            embedders: EmbedderConfig::default(),
            images: ImageSourceConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load the configuration from `path` (optional) and the environment.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`ServerConfig::load`], reading `MATCHER_*` variables from `env`
    /// instead of the process environment when it is given.
    pub fn load_with_env(
        path: &str,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("MATCHER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let server_config: ServerConfig = settings.try_deserialize()?;
        server_config.validate()?;
        Ok(server_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.matcher.validate()?;
        self.images.validate()?;
        if self.embedders.text_models.is_empty() {
            return Err(ConfigError::Invalid(
                "embedders.text_models must name at least one model".to_string(),
            ));
        }
        Ok(())
    }
}

/// What to do when the image stage produces no features at all.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageFallback {
    /// Decide on the text gate alone.
    #[default]
    TextOnly,
    /// Treat the candidate as unrelated.
    Reject,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct CombinedWeights {
    pub text: f32,
    pub image: f32,
}

impl Default for CombinedWeights {
    fn default() -> Self {
        Self {
            text: 0.6,
            image: 0.4,
        }
    }
}

/// Scoring parameters. Which optional fields are set selects the behavior:
/// `image_threshold` enables the image gate, `combined_weights` turns a double
/// pass into a weighted combined score.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatcherConfig {
    pub exact_match_enabled: bool,
    pub text_threshold: f32,
    pub image_threshold: Option<f32>,
    pub combined_weights: Option<CombinedWeights>,
    pub token_overlap_ratio: Option<f32>,
    pub image_fallback: ImageFallback,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            exact_match_enabled: true,
            text_threshold: TEXT_SIMILARITY_THRESHOLD,
            image_threshold: None,
            combined_weights: None,
            token_overlap_ratio: None,
            image_fallback: ImageFallback::default(),
        }
    }
}

impl MatcherConfig {
    /// Text-only scoring at the given threshold.
    pub fn text_only(text_threshold: f32) -> Self {
        Self {
            text_threshold,
            ..Default::default()
        }
    }

    /// Two-stage text and image gate with the observed 0.6/0.4 weighting.
    pub fn with_images(text_threshold: f32) -> Self {
        Self {
            text_threshold,
            image_threshold: Some(IMAGE_SIMILARITY_THRESHOLD),
            combined_weights: Some(CombinedWeights::default()),
            ..Default::default()
        }
    }

    pub fn images_enabled(&self) -> bool {
        self.image_threshold.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_threshold("matcher.text_threshold", self.text_threshold)?;
        if let Some(threshold) = self.image_threshold {
            check_threshold("matcher.image_threshold", threshold)?;
        }
        if let Some(ratio) = self.token_overlap_ratio
            && (ratio.is_nan() || ratio <= 0.0 || ratio > 1.0)
        {
            return Err(ConfigError::Invalid(format!(
                "matcher.token_overlap_ratio must be within (0, 1], got {ratio}"
            )));
        }
        if let Some(weights) = self.combined_weights {
            if self.image_threshold.is_none() {
                return Err(ConfigError::Invalid(
                    "matcher.combined_weights requires matcher.image_threshold".to_string(),
                ));
            }
            let finite = weights.text.is_finite() && weights.image.is_finite();
            if !finite || weights.text < 0.0 || weights.image < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "matcher.combined_weights must be non-negative, got {weights:?}"
                )));
            }
            if (weights.text + weights.image - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(ConfigError::Invalid(format!(
                    "matcher.combined_weights must sum to 1, got {}",
                    weights.text + weights.image
                )));
            }
        }
        Ok(())
    }
}

fn check_threshold(name: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (-1.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be within [-1, 1], got {value}"
        )))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// Text models tried in order until one initializes.
    pub text_models: Vec<TextModel>,
    /// Image models tried in order; only loaded when the image gate is enabled.
    pub image_models: Vec<ImageModel>,
    pub cache_dir: Option<PathBuf>,
    pub batch_size: Option<usize>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            text_models: vec![TextModel::MultilingualE5Large, TextModel::MultilingualE5Small],
            image_models: vec![ImageModel::ClipVitB32, ImageModel::Resnet50],
            cache_dir: None,
            batch_size: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ImageSourceConfig {
    /// Base used to resolve root-relative image paths.
    pub base_url: String,
    pub fetch_concurrency: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Upper bound of images fetched per product or keyword.
    pub max_images: usize,
}

impl Default for ImageSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ssadagu.kr".to_string(),
            fetch_concurrency: 5,
            timeout_secs: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            max_images: 5,
        }
    }
}

impl ImageSourceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "images.fetch_concurrency must be positive".to_string(),
            ));
        }
        if self.max_images == 0 {
            return Err(ConfigError::Invalid(
                "images.max_images must be positive".to_string(),
            ));
        }
        url::Url::parse(&self.base_url).map_err(|error| {
            ConfigError::Invalid(format!("images.base_url is not a valid URL: {error}"))
        })?;
        Ok(())
    }
}

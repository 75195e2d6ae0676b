use crate::core::errors::ConfigError;
use serde::Serialize;
use std::env;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Compute device preference for model-backed stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Gpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Gpu => "gpu",
        }
    }
}

/// API credentials for one backend service.
///
/// Serialized into the engine fingerprint, so changing any field yields a
/// fresh backend instance.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    /// Service endpoint / region URL where the API needs one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Credentials {
    pub fn from_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: None,
        }
    }
}

/// Sampling/context parameters for LLM-class engines.
///
/// Part of the fingerprint for LLM identifiers only.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LlmParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for LlmParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            max_tokens: 4096,
        }
    }
}

/// Detection stage configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub model: String,
    pub device: Device,
    pub confidence_threshold: f32,
    /// Inference endpoint serving the detection model
    pub inference_url: String,
    /// Source script reads right-to-left (affects region ordering)
    pub rtl_source: bool,
}

/// OCR stage configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub model: String,
    pub device: Device,
    /// Percentage by which region crops are expanded before recognition
    pub expansion_percentage: u32,
    pub credentials: Option<Credentials>,
    /// Inference endpoint serving the local OCR models
    pub inference_url: String,
}

/// Translation stage configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub model: String,
    /// Uppercase every translation after the backend call
    pub uppercase: bool,
    pub credentials: Option<Credentials>,
    /// Base URL override for `Custom` OpenAI-compatible engines
    pub custom_base_url: Option<String>,
    pub llm: LlmParams,
}

/// Inpainting stage configuration
#[derive(Debug, Clone)]
pub struct InpaintingConfig {
    pub model: String,
    /// Inference endpoint serving the inpainting models
    pub inference_url: String,
}

/// Rendering stage configuration
#[derive(Debug, Clone)]
pub struct RenderingConfig {
    pub font_dir: String,
    pub font_family: String,
    pub font_color: String,
    pub min_font_size: f32,
    pub max_font_size: f32,
    /// Fixed decrement applied during the font-size search
    pub font_size_step: f32,
    pub line_spacing: f32,
    pub outline: bool,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub detection: DetectionConfig,
    pub ocr: OcrConfig,
    pub translation: TranslationConfig,
    pub inpainting: InpaintingConfig,
    pub rendering: RenderingConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let device = match env::var("DEVICE").ok().as_deref() {
            Some("gpu") | Some("cuda") => Device::Gpu,
            _ => Device::Cpu,
        };

        let ocr_credentials = env::var("OCR_API_KEY").ok().map(|key| Credentials {
            api_key: key,
            endpoint: env::var("OCR_API_ENDPOINT").ok(),
        });

        let translation_credentials =
            env::var("TRANSLATION_API_KEY").ok().map(|key| Credentials {
                api_key: key,
                endpoint: env::var("TRANSLATION_API_ENDPOINT").ok(),
            });

        Ok(Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8000),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            detection: DetectionConfig {
                model: env::var("DETECTION_MODEL").unwrap_or_else(|_| "RT-DETR-v2".to_string()),
                device,
                confidence_threshold: env::var("CONFIDENCE_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.3),
                inference_url: env::var("DETECTION_INFERENCE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8191/detect".to_string()),
                rtl_source: env::var("RTL_SOURCE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            ocr: OcrConfig {
                model: env::var("OCR_MODEL").unwrap_or_else(|_| "Default".to_string()),
                device,
                expansion_percentage: env::var("OCR_EXPANSION_PERCENTAGE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
                credentials: ocr_credentials,
                inference_url: env::var("OCR_INFERENCE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8192/ocr".to_string()),
            },
            translation: TranslationConfig {
                model: env::var("TRANSLATION_MODEL")
                    .unwrap_or_else(|_| "GPT-4.1-mini".to_string()),
                uppercase: env::var("TRANSLATION_UPPERCASE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
                credentials: translation_credentials,
                custom_base_url: env::var("TRANSLATION_CUSTOM_BASE_URL").ok(),
                llm: LlmParams {
                    temperature: env::var("LLM_TEMPERATURE")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(1.0),
                    top_p: env::var("LLM_TOP_P")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(0.95),
                    max_tokens: env::var("LLM_MAX_TOKENS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(4096),
                },
            },
            inpainting: InpaintingConfig {
                model: env::var("INPAINTING_MODEL").unwrap_or_else(|_| "LaMa".to_string()),
                inference_url: env::var("INPAINTING_INFERENCE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8193/inpaint".to_string()),
            },
            rendering: RenderingConfig {
                font_dir: env::var("FONT_DIR").unwrap_or_else(|_| "fonts".to_string()),
                font_family: env::var("FONT_FAMILY")
                    .unwrap_or_else(|_| "Anime Ace".to_string()),
                font_color: env::var("FONT_COLOR").unwrap_or_else(|_| "#000000".to_string()),
                min_font_size: env::var("MIN_FONT_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10.0),
                max_font_size: env::var("MAX_FONT_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(40.0),
                font_size_step: env::var("FONT_SIZE_STEP")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.75),
                line_spacing: env::var("LINE_SPACING")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1.2),
                outline: env::var("TEXT_OUTLINE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(ConfigError::InvalidConfidenceThreshold(
                self.detection.confidence_threshold,
            ));
        }

        if self.detection.inference_url.is_empty() {
            return Err(ConfigError::InvalidDetectionConfig(
                "DETECTION_INFERENCE_URL must not be empty".to_string(),
            ));
        }

        if self.rendering.min_font_size <= 0.0
            || self.rendering.max_font_size < self.rendering.min_font_size
        {
            return Err(ConfigError::InvalidRenderingConfig(format!(
                "font size range [{}, {}] is invalid",
                self.rendering.min_font_size, self.rendering.max_font_size
            )));
        }

        if self.rendering.font_size_step <= 0.0 {
            return Err(ConfigError::InvalidRenderingConfig(format!(
                "font_size_step must be > 0, got {}",
                self.rendering.font_size_step
            )));
        }

        if self.translation.llm.max_tokens == 0 {
            return Err(ConfigError::InvalidTranslationConfig(
                "LLM_MAX_TOKENS must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_font_range() {
        let mut config = Config::load_from_env().unwrap();
        config.rendering.min_font_size = 20.0;
        config.rendering.max_font_size = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::load_from_env().unwrap();
        assert!(config.validate().is_ok());
    }
}

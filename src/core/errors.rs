// Error types for the pipeline stages
//
// One enum per stage, thiserror throughout. Stage errors chain into
// PipelineError at the controller boundary; usage errors (calling a stage
// whose prerequisite never ran) are rejected before any backend is touched
// and carry their own variant.

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Confidence threshold must be in [0.0, 1.0], got {0}")]
    InvalidConfidenceThreshold(f32),

    #[error("Invalid detection config: {0}")]
    InvalidDetectionConfig(String),

    #[error("Invalid rendering config: {0}")]
    InvalidRenderingConfig(String),

    #[error("Invalid translation config: {0}")]
    InvalidTranslationConfig(String),

    #[error("Environment variable parsing failed: {0}")]
    EnvVarError(String),
}

/// Detection stage errors (structural: abort the session)
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Detection request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Detection backend returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Detection backend initialization failed: {0}")]
    InitFailed(String),

    #[error("Image encoding failed: {0}")]
    ImageEncode(#[from] image::ImageError),
}

/// OCR stage errors (suppressed at the adapter boundary)
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("OCR backend returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("OCR backend initialization failed: {0}")]
    InitFailed(String),

    #[error("Missing credentials for {0}")]
    MissingCredentials(&'static str),

    #[error("Image encoding failed: {0}")]
    ImageEncode(#[from] image::ImageError),
}

/// Translation stage errors (suppressed at the adapter boundary)
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Translation request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Translation backend returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Translation backend initialization failed: {0}")]
    InitFailed(String),

    #[error("Missing credentials for {0}")]
    MissingCredentials(&'static str),

    #[error("Image encoding failed: {0}")]
    ImageEncode(#[from] image::ImageError),
}

/// Inpainting stage errors (structural: abort the session)
#[derive(Debug, Error)]
pub enum InpaintError {
    #[error("Inpainting request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Inpainting backend returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Inpainting backend initialization failed: {0}")]
    InitFailed(String),

    #[error("Mask dimensions {mask_w}x{mask_h} do not match image {image_w}x{image_h}")]
    MaskMismatch {
        mask_w: u32,
        mask_h: u32,
        image_w: u32,
        image_h: u32,
    },

    #[error("Image decoding failed: {0}")]
    ImageDecode(#[from] image::ImageError),
}

/// Rendering stage errors (structural: abort the session)
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No usable font in {0}")]
    NoFonts(String),

    #[error("Invalid region bounds: {0}")]
    InvalidBounds(String),
}

/// Pipeline orchestration errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Usage error: a stage was requested before its prerequisite completed.
    /// Rejected before any backend call; never retried automatically.
    #[error("stage `{requested}` requires `{required}` to have completed first")]
    PrerequisiteMissing {
        requested: &'static str,
        required: &'static str,
    },

    #[error("Detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Inpainting failed: {0}")]
    Inpaint(#[from] InpaintError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),
}

// Convenience type aliases for Results
pub type DetectionResult<T> = Result<T, DetectionError>;
pub type OcrResult<T> = Result<T, OcrError>;
pub type TranslationResult<T> = Result<T, TranslationError>;
pub type InpaintResult<T> = Result<T, InpaintError>;
pub type RenderResult<T> = Result<T, RenderError>;
pub type PipelineResult<T> = Result<T, PipelineError>;

// Library exports for the comic panel translation pipeline

pub mod core;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{
    config::{Config, Device},
    errors::{
        ConfigError, DetectionError, InpaintError, OcrError, PipelineError, RenderError,
        TranslationError,
    },
    types::{
        PipelineOutput, PipelineSession, PipelineStatus, ProcessResponse, TextBlockData,
        TextRegion,
    },
};

pub use crate::orchestration::PipelineController;
pub use crate::services::engines::{EngineCache, EngineCaches};
pub use crate::services::rendering::TextRenderer;

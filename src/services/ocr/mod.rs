// OCR stage: fill `text` on every detected region.
//
// The adapter stamps a language code on each region, resolves the configured
// identifier to a backend kind (language-specific local engines for the
// "Default" sentinel), and binds the backend through the engine cache.
// Backend failures are logged and suppressed: the region collection is
// returned unchanged so a full-pipeline run can still reach later stages.

pub mod cloud;
pub mod llm;
pub mod local;

use async_trait::async_trait;
use image::RgbaImage;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::config::OcrConfig;
use crate::core::errors::OcrResult;
use crate::core::types::TextRegion;
use crate::services::engines::fingerprint::ocr_fingerprint;
use crate::services::engines::resolve::{resolve_ocr, OcrKind};
use crate::services::engines::EngineCaches;
use crate::utils::lang::language_code;

/// Contract every OCR backend satisfies: fill `text` for every region.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    async fn process(&self, image: &RgbaImage, regions: &mut Vec<TextRegion>) -> OcrResult<()>;
}

/// OCR stage adapter
pub struct OcrAdapter {
    config: OcrConfig,
    caches: Arc<EngineCaches>,
    bound: RwLock<Option<(String, Arc<dyn OcrBackend>)>>,
}

impl OcrAdapter {
    pub fn new(config: OcrConfig, caches: Arc<EngineCaches>) -> Self {
        Self {
            config,
            caches,
            bound: RwLock::new(None),
        }
    }

    /// Resolve and bind the backend for this source language. Idempotent;
    /// re-binds only when the fingerprint changed (model, language or
    /// credentials). Initialization failures are surfaced and not cached.
    pub async fn initialize(&self, source_lang_english: &str) -> OcrResult<Arc<dyn OcrBackend>> {
        let fingerprint = ocr_fingerprint(
            &self.config.model,
            source_lang_english,
            self.config.credentials.as_ref(),
            None,
        );

        if let Some((bound_fp, backend)) = self.bound.read().as_ref() {
            if *bound_fp == fingerprint {
                return Ok(Arc::clone(backend));
            }
        }

        let kind = resolve_ocr(&self.config.model, source_lang_english);
        let config = self.config.clone();
        let backend = self
            .caches
            .ocr
            .get_or_create(&fingerprint, || async move {
                debug!(model = %config.model, ?kind, "creating OCR backend");
                build_backend(kind, &config)
            })
            .await?;

        *self.bound.write() = Some((fingerprint, Arc::clone(&backend)));
        Ok(backend)
    }

    /// Recognize text in every region. Stamps `source_lang` codes first, then
    /// asks the backend to fill `text`; on any backend error the collection
    /// is returned with only the language stamps applied.
    #[instrument(skip(self, image, regions), fields(regions = regions.len()))]
    pub async fn recognize(
        &self,
        image: &RgbaImage,
        regions: &mut Vec<TextRegion>,
        source_lang_english: &str,
    ) {
        let code = language_code(source_lang_english);
        for region in regions.iter_mut() {
            region.source_lang = code.to_string();
        }

        let backend = match self.initialize(source_lang_english).await {
            Ok(backend) => backend,
            Err(e) => {
                warn!("OCR backend unavailable: {e}");
                return;
            }
        };

        if let Err(e) = backend.process(image, regions).await {
            warn!("OCR processing error: {e}");
        }
    }
}

fn build_backend(kind: OcrKind, config: &OcrConfig) -> OcrResult<Arc<dyn OcrBackend>> {
    let backend: Arc<dyn OcrBackend> = match kind {
        OcrKind::Microsoft => Arc::new(cloud::MicrosoftOcr::new(config)?),
        OcrKind::GoogleVision => Arc::new(cloud::GoogleVisionOcr::new(config)?),
        OcrKind::Gpt => Arc::new(llm::LlmOcr::gpt(config)?),
        OcrKind::Gemini => Arc::new(llm::LlmOcr::gemini(config)?),
        OcrKind::MangaOcr => Arc::new(local::LocalModelOcr::new(local::LocalOcrModel::MangaOcr, config)),
        OcrKind::Pororo => Arc::new(local::LocalModelOcr::new(local::LocalOcrModel::Pororo, config)),
        OcrKind::PaddleOcr => {
            Arc::new(local::LocalModelOcr::new(local::LocalOcrModel::PaddleOcr, config))
        }
        OcrKind::Doctr => Arc::new(local::LocalModelOcr::new(local::LocalOcrModel::Doctr, config)),
    };
    Ok(backend)
}

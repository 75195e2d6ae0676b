// Translation stage: fill `translation` on every region.
//
// Engines come in two capability variants, fixed at construction time:
// traditional MT consumes region text only, LLM engines also take the panel
// image and free-text context. The adapter dispatches on the variant — no
// runtime type inspection. Backend failures are logged and suppressed so a
// full-pipeline run can continue with whatever translations exist.

pub mod llm;
pub mod traditional;

use async_trait::async_trait;
use image::RgbaImage;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::config::TranslationConfig;
use crate::core::errors::TranslationResult;
use crate::core::types::TextRegion;
use crate::services::engines::fingerprint::translation_fingerprint;
use crate::services::engines::resolve::{
    is_llm_identifier, resolve_translator, LlmKind, TraditionalKind, TranslatorKind,
};
use crate::services::engines::EngineCaches;
use crate::utils::lang::language_code;

/// Text-only machine translation
#[async_trait]
pub trait TextTranslation: Send + Sync {
    async fn translate(&self, regions: &mut Vec<TextRegion>) -> TranslationResult<()>;
}

/// Context-aware translation: may also consume the panel image and
/// caller-supplied extra context
#[async_trait]
pub trait ContextAwareTranslation: Send + Sync {
    async fn translate(
        &self,
        regions: &mut Vec<TextRegion>,
        image: Option<&RgbaImage>,
        extra_context: &str,
    ) -> TranslationResult<()>;
}

/// A bound translation engine. The variant is decided by identifier
/// resolution when the engine is built, and the cache stores the whole
/// value, so capability dispatch costs one match.
pub enum Translator {
    Text(Arc<dyn TextTranslation>),
    ContextAware(Arc<dyn ContextAwareTranslation>),
}

/// Translation stage adapter
pub struct TranslationAdapter {
    config: TranslationConfig,
    caches: Arc<EngineCaches>,
    bound: RwLock<Option<(String, Arc<Translator>)>>,
}

impl TranslationAdapter {
    pub fn new(config: TranslationConfig, caches: Arc<EngineCaches>) -> Self {
        Self {
            config,
            caches,
            bound: RwLock::new(None),
        }
    }

    /// Resolve and bind the engine for this language pair. Idempotent;
    /// re-binds only when the fingerprint changed. LLM identifiers fold
    /// sampling parameters into the fingerprint, so a temperature change
    /// also yields a fresh engine.
    pub async fn initialize(
        &self,
        source_lang_english: &str,
        target_lang_english: &str,
    ) -> TranslationResult<Arc<Translator>> {
        let llm_params = is_llm_identifier(&self.config.model).then_some(&self.config.llm);
        let fingerprint = translation_fingerprint(
            &self.config.model,
            source_lang_english,
            target_lang_english,
            self.config.credentials.as_ref(),
            llm_params,
        );

        if let Some((bound_fp, translator)) = self.bound.read().as_ref() {
            if *bound_fp == fingerprint {
                return Ok(Arc::clone(translator));
            }
        }

        let kind = resolve_translator(&self.config.model);
        let config = self.config.clone();
        let source = source_lang_english.to_string();
        let target = target_lang_english.to_string();
        let translator = self
            .caches
            .translation
            .get_or_create(&fingerprint, || async move {
                debug!(model = %config.model, ?kind, "creating translation engine");
                build_translator(kind, &config, &source, &target).map(Arc::new)
            })
            .await?;

        *self.bound.write() = Some((fingerprint, Arc::clone(&translator)));
        Ok(translator)
    }

    /// Translate every region. Stamps `target_lang` codes, dispatches on the
    /// engine's capability variant, and applies the uppercase transform when
    /// this adapter's active configuration requests it — after the backend
    /// call, whether or not it succeeded.
    #[instrument(skip(self, regions, image, extra_context), fields(regions = regions.len()))]
    pub async fn translate(
        &self,
        regions: &mut Vec<TextRegion>,
        image: Option<&RgbaImage>,
        source_lang_english: &str,
        target_lang_english: &str,
        extra_context: &str,
    ) {
        let code = language_code(target_lang_english);
        for region in regions.iter_mut() {
            region.target_lang = code.to_string();
        }

        match self.initialize(source_lang_english, target_lang_english).await {
            Ok(translator) => {
                let result = match translator.as_ref() {
                    Translator::Text(engine) => engine.translate(regions).await,
                    Translator::ContextAware(engine) => {
                        engine.translate(regions, image, extra_context).await
                    }
                };
                if let Err(e) = result {
                    warn!("translation processing error: {e}");
                }
            }
            Err(e) => warn!("translation backend unavailable: {e}"),
        }

        if self.config.uppercase {
            for region in regions.iter_mut() {
                region.translation = region.translation.to_uppercase();
            }
        }
    }
}

fn build_translator(
    kind: TranslatorKind,
    config: &TranslationConfig,
    source_lang_english: &str,
    target_lang_english: &str,
) -> TranslationResult<Translator> {
    match kind {
        TranslatorKind::Traditional(traditional) => {
            let engine: Arc<dyn TextTranslation> = match traditional {
                TraditionalKind::Google => Arc::new(traditional::GoogleTranslate::new(
                    config,
                    source_lang_english,
                    target_lang_english,
                )?),
                TraditionalKind::Microsoft => Arc::new(traditional::MicrosoftTranslator::new(
                    config,
                    source_lang_english,
                    target_lang_english,
                )?),
                TraditionalKind::DeepL => Arc::new(traditional::DeepLTranslate::new(
                    config,
                    source_lang_english,
                    target_lang_english,
                )?),
                TraditionalKind::Yandex => Arc::new(traditional::YandexTranslate::new(
                    config,
                    source_lang_english,
                    target_lang_english,
                )?),
            };
            Ok(Translator::Text(engine))
        }
        TranslatorKind::Llm(llm_kind) => {
            let engine: Arc<dyn ContextAwareTranslation> = match llm_kind {
                LlmKind::Gpt => Arc::new(llm::OpenAiCompatTranslator::gpt(
                    config,
                    source_lang_english,
                    target_lang_english,
                )?),
                LlmKind::Deepseek => Arc::new(llm::OpenAiCompatTranslator::deepseek(
                    config,
                    source_lang_english,
                    target_lang_english,
                )?),
                LlmKind::Custom => Arc::new(llm::OpenAiCompatTranslator::custom(
                    config,
                    source_lang_english,
                    target_lang_english,
                )?),
                LlmKind::Claude => Arc::new(llm::ClaudeTranslator::new(
                    config,
                    source_lang_english,
                    target_lang_english,
                )?),
                LlmKind::Gemini => Arc::new(llm::GeminiTranslator::new(
                    config,
                    source_lang_english,
                    target_lang_english,
                )?),
            };
            Ok(Translator::ContextAware(engine))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LlmParams;
    use crate::core::errors::TranslationError;

    fn test_config(model: &str, uppercase: bool) -> TranslationConfig {
        TranslationConfig {
            model: model.to_string(),
            uppercase,
            credentials: None,
            custom_base_url: None,
            llm: LlmParams::default(),
        }
    }

    struct EchoTranslator;

    #[async_trait]
    impl ContextAwareTranslation for EchoTranslator {
        async fn translate(
            &self,
            regions: &mut Vec<TextRegion>,
            _image: Option<&RgbaImage>,
            _extra_context: &str,
        ) -> TranslationResult<()> {
            for region in regions.iter_mut() {
                region.translation = format!("tr:{}", region.text);
            }
            Ok(())
        }
    }

    async fn seeded_adapter(uppercase: bool) -> TranslationAdapter {
        let caches = Arc::new(EngineCaches::new());
        let config = test_config("GPT-4.1-mini", uppercase);
        let fingerprint = translation_fingerprint(
            "GPT-4.1-mini",
            "Japanese",
            "English",
            None,
            Some(&config.llm),
        );
        caches
            .translation
            .get_or_create(&fingerprint, || async {
                Ok::<_, TranslationError>(Arc::new(Translator::ContextAware(Arc::new(
                    EchoTranslator,
                ))))
            })
            .await
            .unwrap();
        TranslationAdapter::new(config, caches)
    }

    #[tokio::test]
    async fn test_translate_fills_translations_and_target_lang() {
        let adapter = seeded_adapter(false).await;
        let mut regions = vec![TextRegion::new([0.0, 0.0, 10.0, 10.0], 0.0)];
        regions[0].text = "こんにちは".to_string();

        adapter
            .translate(&mut regions, None, "Japanese", "English", "")
            .await;

        assert_eq!(regions[0].translation, "tr:こんにちは");
        assert_eq!(regions[0].target_lang, "en");
    }

    #[tokio::test]
    async fn test_uppercase_applies_after_backend_call() {
        let adapter = seeded_adapter(true).await;
        let mut regions = vec![TextRegion::new([0.0, 0.0, 10.0, 10.0], 0.0)];
        regions[0].text = "hello".to_string();

        adapter
            .translate(&mut regions, None, "Japanese", "English", "")
            .await;

        assert_eq!(regions[0].translation, "TR:HELLO");
    }

    #[tokio::test]
    async fn test_geometry_untouched_by_translation() {
        let adapter = seeded_adapter(false).await;
        let mut regions = vec![TextRegion::new([3.5, 7.25, 99.0, 44.5], 12.0)];
        let (xyxy, angle) = (regions[0].xyxy, regions[0].angle);

        adapter
            .translate(&mut regions, None, "Japanese", "English", "")
            .await;

        assert_eq!(regions[0].xyxy, xyxy);
        assert_eq!(regions[0].angle, angle);
    }
}

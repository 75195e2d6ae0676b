// Pipeline controller: detect → ocr → translate → inpaint → render.
//
// One controller serves every session; sessions are independent and share
// only the engine caches injected at construction. Each stage checks its
// prerequisite on the session before touching a backend: violating the
// stage order is a usage error, distinct from a backend failure. Recognize
// and Translate suppress backend failures (the pipeline continues with
// whatever text exists); Detect, Inpaint and Render failures are structural
// and become the session's terminal error state.

use image::RgbaImage;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::core::config::{Config, Device};
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::types::{PipelineOutput, PipelineSession, PipelineStatus};
use crate::services::detection::DetectionAdapter;
use crate::services::engines::EngineCaches;
use crate::services::inpainting::InpaintAdapter;
use crate::services::ocr::OcrAdapter;
use crate::services::rendering::TextRenderer;
use crate::services::translation::TranslationAdapter;

pub struct PipelineController {
    detection: DetectionAdapter,
    ocr: OcrAdapter,
    translation: TranslationAdapter,
    inpainting: InpaintAdapter,
    renderer: Arc<TextRenderer>,
}

impl PipelineController {
    pub fn new(config: &Config, caches: Arc<EngineCaches>) -> Self {
        Self {
            detection: DetectionAdapter::new(config.detection.clone(), Arc::clone(&caches)),
            ocr: OcrAdapter::new(config.ocr.clone(), Arc::clone(&caches)),
            translation: TranslationAdapter::new(config.translation.clone(), Arc::clone(&caches)),
            inpainting: InpaintAdapter::new(config.inpainting.clone(), Arc::clone(&caches)),
            renderer: Arc::new(TextRenderer::new(config.rendering.clone())),
        }
    }

    /// Reject a stage call whose prerequisite has not completed. Checked
    /// before any backend work; the session is left untouched.
    fn require(
        session: &PipelineSession,
        required: PipelineStatus,
        requested: &'static str,
    ) -> PipelineResult<()> {
        let satisfied = matches!(
            session.status,
            Some(status) if status != PipelineStatus::Error && status >= required
        );
        if satisfied {
            Ok(())
        } else {
            Err(PipelineError::PrerequisiteMissing {
                requested,
                required: required.as_str(),
            })
        }
    }

    /// Detect text regions. Entry point of the stage order: no prerequisite.
    #[instrument(skip(self, session))]
    pub async fn detect(&self, session: &mut PipelineSession) -> PipelineResult<()> {
        match self.detection.detect(&session.image).await {
            Ok(regions) => {
                session.regions = regions;
                session.advance(PipelineStatus::Detected);
                Ok(())
            }
            Err(e) => {
                session.record_error(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Recognize text in the detected regions. Backend failures are logged
    /// inside the adapter and leave the regions unchanged; the stage still
    /// completes.
    #[instrument(skip(self, session))]
    pub async fn recognize(
        &self,
        session: &mut PipelineSession,
        source_lang: &str,
    ) -> PipelineResult<()> {
        Self::require(session, PipelineStatus::Detected, "ocr")?;

        self.ocr
            .recognize(&session.image, &mut session.regions, source_lang)
            .await;
        session.advance(PipelineStatus::OcrCompleted);
        Ok(())
    }

    /// Translate the recognized text. Backend failures are suppressed like
    /// Recognize; the uppercase policy is the translation adapter's.
    #[instrument(skip(self, session, extra_context))]
    pub async fn translate(
        &self,
        session: &mut PipelineSession,
        source_lang: &str,
        target_lang: &str,
        extra_context: &str,
    ) -> PipelineResult<()> {
        Self::require(session, PipelineStatus::OcrCompleted, "translate")?;

        self.translation
            .translate(
                &mut session.regions,
                Some(&session.image),
                source_lang,
                target_lang,
                extra_context,
            )
            .await;
        session.advance(PipelineStatus::Translated);
        Ok(())
    }

    /// Erase the original glyphs. Structural: a backend failure ends the
    /// session in the error state.
    #[instrument(skip(self, session))]
    pub async fn inpaint(
        &self,
        session: &mut PipelineSession,
        use_gpu: bool,
    ) -> PipelineResult<()> {
        Self::require(session, PipelineStatus::Translated, "inpaint")?;

        let device = if use_gpu { Device::Gpu } else { Device::Cpu };
        match self
            .inpainting
            .inpaint(&session.image, &session.regions, device)
            .await
        {
            Ok(inpainted) => {
                session.inpainted = Some(inpainted);
                session.advance(PipelineStatus::Inpainted);
                Ok(())
            }
            Err(e) => {
                session.record_error(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Draw the translations onto the inpainted image.
    #[instrument(skip(self, session))]
    pub fn render(&self, session: &mut PipelineSession) -> PipelineResult<()> {
        Self::require(session, PipelineStatus::Inpainted, "render")?;

        let mut canvas = session
            .inpainted
            .clone()
            .unwrap_or_else(|| session.image.clone());

        match self.renderer.render_regions(&mut canvas, &session.regions) {
            Ok(()) => {
                session.rendered = Some(canvas);
                session.advance(PipelineStatus::Rendered);
                Ok(())
            }
            Err(e) => {
                session.record_error(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Run the five stages in order on an existing session.
    pub async fn run_session(
        &self,
        session: &mut PipelineSession,
        source_lang: &str,
        target_lang: &str,
        extra_context: &str,
        use_gpu: bool,
    ) -> PipelineResult<()> {
        self.detect(session).await?;
        self.recognize(session, source_lang).await?;
        self.translate(session, source_lang, target_lang, extra_context)
            .await?;
        self.inpaint(session, use_gpu).await?;
        self.render(session)?;
        Ok(())
    }

    /// One-shot full pipeline over a fresh session.
    #[instrument(skip(self, image, extra_context), fields(w = image.width(), h = image.height()))]
    pub async fn run_full_pipeline(
        &self,
        image: RgbaImage,
        source_lang: &str,
        target_lang: &str,
        extra_context: &str,
        use_gpu: bool,
    ) -> PipelineResult<PipelineOutput> {
        let mut session = PipelineSession::new(image);
        self.run_session(&mut session, source_lang, target_lang, extra_context, use_gpu)
            .await?;

        info!(
            "pipeline complete: {} regions, status {}",
            session.regions.len(),
            session.status_str()
        );

        let inpainted_image = session
            .inpainted
            .take()
            .unwrap_or_else(|| session.image.clone());
        let final_image = session.rendered.take().unwrap_or_else(|| inpainted_image.clone());

        Ok(PipelineOutput {
            inpainted_image,
            final_image,
            regions: std::mem::take(&mut session.regions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::GrayImage;

    use crate::core::config::*;
    use crate::core::errors::*;
    use crate::core::types::TextRegion;
    use crate::services::detection::DetectionBackend;
    use crate::services::engines::fingerprint;
    use crate::services::inpainting::{InpaintBackend, InpaintStrategy};
    use crate::services::ocr::OcrBackend;
    use crate::services::translation::{ContextAwareTranslation, Translator};

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                log_level: tracing::Level::WARN,
            },
            detection: DetectionConfig {
                model: "RT-DETR-v2".to_string(),
                device: Device::Cpu,
                confidence_threshold: 0.3,
                inference_url: "http://127.0.0.1:1/detect".to_string(),
                rtl_source: true,
            },
            ocr: OcrConfig {
                model: "Default".to_string(),
                device: Device::Cpu,
                expansion_percentage: 5,
                credentials: None,
                inference_url: "http://127.0.0.1:1/ocr".to_string(),
            },
            translation: TranslationConfig {
                model: "GPT-4.1-mini".to_string(),
                uppercase: false,
                credentials: None,
                custom_base_url: None,
                llm: LlmParams::default(),
            },
            inpainting: InpaintingConfig {
                model: "LaMa".to_string(),
                inference_url: "http://127.0.0.1:1/inpaint".to_string(),
            },
            rendering: RenderingConfig {
                font_dir: "/nonexistent-fonts".to_string(),
                font_family: "Anime Ace".to_string(),
                font_color: "#000000".to_string(),
                min_font_size: 10.0,
                max_font_size: 40.0,
                font_size_step: 0.75,
                line_spacing: 1.2,
                outline: false,
            },
        }
    }

    struct FixedDetector(Vec<TextRegion>);

    #[async_trait]
    impl DetectionBackend for FixedDetector {
        async fn detect(&self, _image: &RgbaImage) -> DetectionResult<Vec<TextRegion>> {
            Ok(self.0.clone())
        }
    }

    struct FixedOcr;

    #[async_trait]
    impl OcrBackend for FixedOcr {
        async fn process(
            &self,
            _image: &RgbaImage,
            regions: &mut Vec<TextRegion>,
        ) -> OcrResult<()> {
            for region in regions.iter_mut() {
                region.text = "こんにちは".to_string();
            }
            Ok(())
        }
    }

    struct FixedTranslator;

    #[async_trait]
    impl ContextAwareTranslation for FixedTranslator {
        async fn translate(
            &self,
            regions: &mut Vec<TextRegion>,
            _image: Option<&RgbaImage>,
            _extra_context: &str,
        ) -> TranslationResult<()> {
            for region in regions.iter_mut() {
                region.translation = "Hello there, friend".to_string();
            }
            Ok(())
        }
    }

    struct IdentityInpaint;

    #[async_trait]
    impl InpaintBackend for IdentityInpaint {
        async fn inpaint(
            &self,
            image: &RgbaImage,
            _mask: &GrayImage,
            _strategy: &InpaintStrategy,
            _device: Device,
        ) -> InpaintResult<RgbaImage> {
            Ok(image.clone())
        }
    }

    /// Seed every stage cache with a mock under the fingerprint the adapters
    /// will compute, so no network backend is ever constructed.
    async fn seeded_caches(config: &Config, detected: Vec<TextRegion>) -> Arc<EngineCaches> {
        let caches = Arc::new(EngineCaches::new());

        let det_fp = fingerprint::detection_fingerprint(&config.detection.model);
        caches
            .detection
            .get_or_create(&det_fp, || async {
                Ok::<_, DetectionError>(
                    Arc::new(FixedDetector(detected)) as Arc<dyn DetectionBackend>
                )
            })
            .await
            .unwrap();

        let ocr_fp = fingerprint::ocr_fingerprint(&config.ocr.model, "Japanese", None, None);
        caches
            .ocr
            .get_or_create(&ocr_fp, || async {
                Ok::<_, OcrError>(Arc::new(FixedOcr) as Arc<dyn OcrBackend>)
            })
            .await
            .unwrap();

        let tr_fp = fingerprint::translation_fingerprint(
            &config.translation.model,
            "Japanese",
            "English",
            None,
            Some(&config.translation.llm),
        );
        caches
            .translation
            .get_or_create(&tr_fp, || async {
                Ok::<_, TranslationError>(Arc::new(Translator::ContextAware(Arc::new(
                    FixedTranslator,
                ))))
            })
            .await
            .unwrap();

        let inp_fp = fingerprint::inpainting_fingerprint(&config.inpainting.model);
        caches
            .inpainting
            .get_or_create(&inp_fp, || async {
                Ok::<_, InpaintError>(Arc::new(IdentityInpaint) as Arc<dyn InpaintBackend>)
            })
            .await
            .unwrap();

        caches
    }

    #[tokio::test]
    async fn test_zero_regions_completes_with_inpainted_output() {
        let config = test_config();
        let caches = seeded_caches(&config, Vec::new()).await;
        let controller = PipelineController::new(&config, caches);

        let image = RgbaImage::from_pixel(32, 32, image::Rgba([120, 130, 140, 255]));
        let output = controller
            .run_full_pipeline(image.clone(), "Japanese", "English", "", false)
            .await
            .unwrap();

        assert!(output.regions.is_empty());
        assert_eq!(output.inpainted_image.as_raw(), image.as_raw());
        // No text drawn: the final image is the inpainted image
        assert_eq!(output.final_image.as_raw(), output.inpainted_image.as_raw());
    }

    #[tokio::test]
    async fn test_zero_regions_session_reaches_rendered() {
        let config = test_config();
        let caches = seeded_caches(&config, Vec::new()).await;
        let controller = PipelineController::new(&config, caches);

        let mut session = PipelineSession::new(RgbaImage::new(16, 16));
        controller
            .run_session(&mut session, "Japanese", "English", "", false)
            .await
            .unwrap();
        assert_eq!(session.status, Some(PipelineStatus::Rendered));
    }

    #[tokio::test]
    async fn test_translate_before_detect_is_a_usage_error() {
        let config = test_config();
        let caches = seeded_caches(&config, Vec::new()).await;
        let controller = PipelineController::new(&config, caches);

        let mut session = PipelineSession::new(RgbaImage::new(16, 16));
        let result = controller
            .translate(&mut session, "Japanese", "English", "")
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::PrerequisiteMissing { requested: "translate", .. })
        ));
        // Rejected before any backend call: status untouched
        assert_eq!(session.status, None);
        assert!(session.regions.is_empty());
    }

    #[tokio::test]
    async fn test_inpaint_before_translate_is_a_usage_error() {
        let config = test_config();
        let caches = seeded_caches(&config, Vec::new()).await;
        let controller = PipelineController::new(&config, caches);

        let mut session = PipelineSession::new(RgbaImage::new(16, 16));
        controller.detect(&mut session).await.unwrap();

        let result = controller.inpaint(&mut session, false).await;
        assert!(matches!(
            result,
            Err(PipelineError::PrerequisiteMissing { requested: "inpaint", .. })
        ));
        assert_eq!(session.status, Some(PipelineStatus::Detected));
    }

    #[tokio::test]
    async fn test_geometry_is_bit_identical_through_ocr_and_translate() {
        let config = test_config();
        let detected = vec![
            TextRegion::new([10.0, 10.0, 110.0, 40.0], 0.0),
            TextRegion::new([12.5, 80.25, 90.75, 120.5], 7.5),
        ];
        let caches = seeded_caches(&config, detected.clone()).await;
        let controller = PipelineController::new(&config, caches);

        let mut session = PipelineSession::new(RgbaImage::new(128, 128));
        controller.detect(&mut session).await.unwrap();
        let before: Vec<([f32; 4], f32)> =
            session.regions.iter().map(|r| (r.xyxy, r.angle)).collect();

        controller.recognize(&mut session, "Japanese").await.unwrap();
        controller
            .translate(&mut session, "Japanese", "English", "")
            .await
            .unwrap();

        let after: Vec<([f32; 4], f32)> =
            session.regions.iter().map(|r| (r.xyxy, r.angle)).collect();
        assert_eq!(before, after);

        // And the stages actually ran
        assert!(session.regions.iter().all(|r| r.text == "こんにちは"));
        assert!(session
            .regions
            .iter()
            .all(|r| r.translation == "Hello there, friend"));
    }

    #[tokio::test]
    async fn test_full_pipeline_with_regions_reaches_rendered() {
        let config = test_config();
        let detected = vec![TextRegion::new([10.0, 10.0, 110.0, 40.0], 0.0)];
        let caches = seeded_caches(&config, detected).await;
        let controller = PipelineController::new(&config, caches);

        let mut session = PipelineSession::new(RgbaImage::new(128, 64));
        controller
            .run_session(&mut session, "Japanese", "English", "", false)
            .await
            .unwrap();

        assert_eq!(session.status, Some(PipelineStatus::Rendered));
        assert!(session.inpainted.is_some());
        assert!(session.rendered.is_some());
    }
}

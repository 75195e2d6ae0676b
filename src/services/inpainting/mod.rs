// Inpainting stage: erase the original glyphs.
//
// The adapter derives a removal mask from region geometry, hands
// image + mask + strategy to the model backend, and normalizes the repainted
// buffer to RGBA8 before it re-enters the session. Inpainting failures are
// structural and abort the image's session.

pub mod mask;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use image::{DynamicImage, GrayImage, RgbaImage};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::config::{Device, InpaintingConfig};
use crate::core::errors::{InpaintError, InpaintResult};
use crate::core::types::TextRegion;
use crate::services::engines::fingerprint::inpainting_fingerprint;
use crate::services::engines::resolve::{resolve_inpainter, InpainterKind};
use crate::services::engines::EngineCaches;
use crate::services::http;
use crate::utils::image_ops;

/// How high-resolution inputs are handled by the inpainting model
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HdStrategy {
    Original,
    Resize,
    Crop,
}

/// Strategy configuration handed to the backend alongside image and mask
#[derive(Debug, Clone, serde::Serialize)]
pub struct InpaintStrategy {
    pub hd_strategy: HdStrategy,
    pub resize_limit: u32,
    pub crop_margin: u32,
}

impl Default for InpaintStrategy {
    fn default() -> Self {
        Self {
            hd_strategy: HdStrategy::Original,
            resize_limit: 2048,
            crop_margin: 128,
        }
    }
}

/// Contract every inpainting backend satisfies
#[async_trait]
pub trait InpaintBackend: Send + Sync {
    async fn inpaint(
        &self,
        image: &RgbaImage,
        mask: &GrayImage,
        strategy: &InpaintStrategy,
        device: Device,
    ) -> InpaintResult<RgbaImage>;
}

#[derive(Debug, Deserialize)]
struct InpaintResponse {
    image: String,
}

/// HTTP client for the LaMa / AOT-GAN inference endpoint
pub struct InpaintClient {
    client: reqwest::Client,
    endpoint: String,
    model: &'static str,
}

impl InpaintClient {
    pub fn new(kind: InpainterKind, config: &InpaintingConfig) -> Self {
        Self {
            client: http::build_client(300),
            endpoint: config.inference_url.clone(),
            model: match kind {
                InpainterKind::Lama => "lama",
                InpainterKind::AotGan => "aot-gan",
            },
        }
    }
}

#[async_trait]
impl InpaintBackend for InpaintClient {
    async fn inpaint(
        &self,
        image: &RgbaImage,
        mask: &GrayImage,
        strategy: &InpaintStrategy,
        device: Device,
    ) -> InpaintResult<RgbaImage> {
        let png = image_ops::encode_png(image)
            .map_err(|e| InpaintError::InvalidResponse(e.to_string()))?;

        let mut mask_png = Vec::new();
        DynamicImage::ImageLuma8(mask.clone())
            .write_to(&mut std::io::Cursor::new(&mut mask_png), image::ImageFormat::Png)?;

        let body = json!({
            "model": self.model,
            "device": device.as_str(),
            "image": general_purpose::STANDARD.encode(&png),
            "mask": general_purpose::STANDARD.encode(&mask_png),
            "strategy": strategy,
        });

        let text = http::post_json_with_retries(&self.client, &self.endpoint, &body, &[]).await?;
        let response: InpaintResponse =
            serde_json::from_str(&text).map_err(|e| InpaintError::InvalidResponse(e.to_string()))?;

        let bytes = general_purpose::STANDARD
            .decode(response.image.as_bytes())
            .map_err(|e| InpaintError::InvalidResponse(e.to_string()))?;
        let repainted = image::load_from_memory(&bytes)?;

        Ok(image_ops::normalize_to_rgba8(repainted))
    }
}

/// Inpainting stage adapter
pub struct InpaintAdapter {
    config: InpaintingConfig,
    caches: Arc<EngineCaches>,
    bound: RwLock<Option<(String, Arc<dyn InpaintBackend>)>>,
}

impl InpaintAdapter {
    pub fn new(config: InpaintingConfig, caches: Arc<EngineCaches>) -> Self {
        Self {
            config,
            caches,
            bound: RwLock::new(None),
        }
    }

    /// Idempotent: re-binds only when the resolved fingerprint changed.
    pub async fn initialize(&self) -> InpaintResult<Arc<dyn InpaintBackend>> {
        let fingerprint = inpainting_fingerprint(&self.config.model);

        if let Some((bound_fp, backend)) = self.bound.read().as_ref() {
            if *bound_fp == fingerprint {
                return Ok(Arc::clone(backend));
            }
        }

        let kind = resolve_inpainter(&self.config.model);
        let config = self.config.clone();
        let backend = self
            .caches
            .inpainting
            .get_or_create(&fingerprint, || async move {
                debug!(model = %config.model, ?kind, "creating inpainting backend");
                let backend: Arc<dyn InpaintBackend> = Arc::new(InpaintClient::new(kind, &config));
                Ok::<_, InpaintError>(backend)
            })
            .await?;

        *self.bound.write() = Some((fingerprint, Arc::clone(&backend)));
        Ok(backend)
    }

    /// Erase the original text: build the mask from region geometry, run the
    /// model, normalize the result. A session with no regions short-circuits
    /// to a copy of the input so nothing is erased and no backend is called.
    #[instrument(skip(self, image, regions), fields(regions = regions.len(), device = ?device))]
    pub async fn inpaint(
        &self,
        image: &RgbaImage,
        regions: &[TextRegion],
        device: Device,
    ) -> InpaintResult<RgbaImage> {
        if regions.is_empty() {
            debug!("no regions to erase, returning input unchanged");
            return Ok(image.clone());
        }

        let backend = self.initialize().await?;
        let mask = mask::build_mask(image.width(), image.height(), regions);
        let strategy = InpaintStrategy::default();

        backend.inpaint(image, &mask, &strategy, device).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct IdentityBackend;

    #[async_trait]
    impl InpaintBackend for IdentityBackend {
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

    fn test_config() -> InpaintingConfig {
        InpaintingConfig {
            model: "LaMa".to_string(),
            inference_url: "http://127.0.0.1:8193/inpaint".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_regions_short_circuit_without_backend() {
        // No backend is seeded: the call must still succeed
        let caches = Arc::new(EngineCaches::new());
        let adapter = InpaintAdapter::new(test_config(), caches);
        let image = RgbaImage::from_pixel(16, 16, image::Rgba([9, 9, 9, 255]));

        let result = adapter.inpaint(&image, &[], Device::Cpu).await.unwrap();
        assert_eq!(result.as_raw(), image.as_raw());
    }

    #[tokio::test]
    async fn test_inpaint_runs_backend_when_regions_exist() {
        let caches = Arc::new(EngineCaches::new());
        caches
            .inpainting
            .get_or_create("LaMa", || async {
                Ok::<_, InpaintError>(Arc::new(IdentityBackend) as Arc<dyn InpaintBackend>)
            })
            .await
            .unwrap();

        let adapter = InpaintAdapter::new(test_config(), caches);
        let image = RgbaImage::new(16, 16);
        let regions = vec![TextRegion::new([2.0, 2.0, 10.0, 10.0], 0.0)];

        let result = adapter.inpaint(&image, &regions, Device::Gpu).await.unwrap();
        assert_eq!(result.dimensions(), (16, 16));
    }
}

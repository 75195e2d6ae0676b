// Detection stage: find text regions in a panel image.
//
// The RT-DETR-v2 network runs behind an inference endpoint; this module owns
// the backend contract, the HTTP client for that endpoint, and the adapter
// that binds a backend through the engine cache and fixes the region order.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use image::RgbaImage;
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::config::DetectionConfig;
use crate::core::errors::{DetectionError, DetectionResult};
use crate::core::types::TextRegion;
use crate::services::engines::fingerprint::detection_fingerprint;
use crate::services::engines::resolve::{resolve_detector, DetectorKind};
use crate::services::engines::EngineCaches;
use crate::services::http;
use crate::utils::image_ops;

/// Contract every detection backend satisfies.
///
/// Returns geometry-only regions in an order that is stable for repeated
/// calls on the same image.
#[async_trait]
pub trait DetectionBackend: Send + Sync {
    async fn detect(&self, image: &RgbaImage) -> DetectionResult<Vec<TextRegion>>;
}

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    detections: Vec<DetectionBox>,
}

#[derive(Debug, Deserialize)]
struct DetectionBox {
    xyxy: [f32; 4],
    #[serde(default)]
    angle: f32,
    #[serde(default = "full_confidence")]
    score: f32,
}

fn full_confidence() -> f32 {
    1.0
}

/// HTTP client for the RT-DETR-v2 inference endpoint
pub struct RtDetrV2Backend {
    client: reqwest::Client,
    endpoint: String,
    confidence_threshold: f32,
    device: &'static str,
}

impl RtDetrV2Backend {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            client: http::build_client(60),
            endpoint: config.inference_url.clone(),
            confidence_threshold: config.confidence_threshold,
            device: config.device.as_str(),
        }
    }
}

#[async_trait]
impl DetectionBackend for RtDetrV2Backend {
    async fn detect(&self, image: &RgbaImage) -> DetectionResult<Vec<TextRegion>> {
        let png = image_ops::encode_png(image)
            .map_err(|e| DetectionError::InvalidResponse(e.to_string()))?;

        let body = serde_json::json!({
            "image": general_purpose::STANDARD.encode(&png),
            "confidence_threshold": self.confidence_threshold,
            "device": self.device,
        });

        let text = http::post_json_with_retries(&self.client, &self.endpoint, &body, &[]).await?;

        let response: DetectionResponse = serde_json::from_str(&text)
            .map_err(|e| DetectionError::InvalidResponse(e.to_string()))?;

        let regions = response
            .detections
            .into_iter()
            .filter(|d| d.score >= self.confidence_threshold)
            .map(|d| TextRegion::new(d.xyxy, d.angle))
            .collect();

        Ok(regions)
    }
}

/// Sort regions top-to-bottom in reading order. Regions whose vertical
/// centers fall into the same band (sized off the median region height) are
/// ordered horizontally, right-to-left for RTL source scripts.
pub fn sort_regions(regions: &mut [TextRegion], rtl: bool) {
    if regions.len() < 2 {
        return;
    }

    let mut heights: Vec<f32> = regions.iter().map(|r| r.height()).collect();
    heights.sort_by(f32::total_cmp);
    let band = (heights[heights.len() / 2] * 0.75).max(1.0);

    regions.sort_by(|a, b| {
        let (ax, ay) = a.center();
        let (bx, by) = b.center();
        let a_row = (ay / band).floor();
        let b_row = (by / band).floor();
        a_row.total_cmp(&b_row).then_with(|| {
            if rtl {
                bx.total_cmp(&ax)
            } else {
                ax.total_cmp(&bx)
            }
        })
    });
}

/// Detection stage adapter: resolves and caches the backend, then fixes a
/// stable reading order on the detected regions. Detection failures are
/// structural and abort the image's session.
pub struct DetectionAdapter {
    config: DetectionConfig,
    caches: Arc<EngineCaches>,
    bound: RwLock<Option<(String, Arc<dyn DetectionBackend>)>>,
}

impl DetectionAdapter {
    pub fn new(config: DetectionConfig, caches: Arc<EngineCaches>) -> Self {
        Self {
            config,
            caches,
            bound: RwLock::new(None),
        }
    }

    /// Idempotent: re-binds only when the resolved fingerprint changed.
    pub async fn initialize(&self) -> DetectionResult<Arc<dyn DetectionBackend>> {
        let fingerprint = detection_fingerprint(&self.config.model);

        if let Some((bound_fp, backend)) = self.bound.read().as_ref() {
            if *bound_fp == fingerprint {
                return Ok(Arc::clone(backend));
            }
        }

        let kind = resolve_detector(&self.config.model);
        let config = self.config.clone();
        let backend = self
            .caches
            .detection
            .get_or_create(&fingerprint, || async move {
                debug!(model = %config.model, ?kind, "creating detection backend");
                let backend: Arc<dyn DetectionBackend> = match kind {
                    DetectorKind::RtDetrV2 => Arc::new(RtDetrV2Backend::new(&config)),
                };
                Ok::<_, DetectionError>(backend)
            })
            .await?;

        *self.bound.write() = Some((fingerprint, Arc::clone(&backend)));
        Ok(backend)
    }

    /// Detect text regions; output order is stable for repeated calls.
    #[instrument(skip(self, image), fields(w = image.width(), h = image.height()))]
    pub async fn detect(&self, image: &RgbaImage) -> DetectionResult<Vec<TextRegion>> {
        let backend = self.initialize().await?;
        let mut regions = backend.detect(image).await?;
        sort_regions(&mut regions, self.config.rtl_source);
        debug!("detected {} text regions", regions.len());
        Ok(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(xyxy: [f32; 4]) -> TextRegion {
        TextRegion::new(xyxy, 0.0)
    }

    #[test]
    fn test_sort_is_top_to_bottom() {
        let mut regions = vec![
            region([0.0, 200.0, 50.0, 240.0]),
            region([0.0, 10.0, 50.0, 50.0]),
            region([0.0, 100.0, 50.0, 140.0]),
        ];
        sort_regions(&mut regions, false);
        let ys: Vec<f32> = regions.iter().map(|r| r.xyxy[1]).collect();
        assert_eq!(ys, vec![10.0, 100.0, 200.0]);
    }

    #[test]
    fn test_same_band_orders_right_to_left_for_rtl() {
        let mut regions = vec![
            region([10.0, 20.0, 60.0, 60.0]),
            region([200.0, 22.0, 250.0, 62.0]),
        ];
        sort_regions(&mut regions, true);
        assert_eq!(regions[0].xyxy[0], 200.0);

        sort_regions(&mut regions, false);
        assert_eq!(regions[0].xyxy[0], 10.0);
    }

    #[test]
    fn test_sort_is_stable_for_repeated_calls() {
        let mut a = vec![
            region([5.0, 5.0, 50.0, 40.0]),
            region([120.0, 6.0, 180.0, 44.0]),
            region([20.0, 300.0, 90.0, 360.0]),
        ];
        let mut b = a.clone();
        sort_regions(&mut a, true);
        sort_regions(&mut b, true);
        sort_regions(&mut b, true);
        let xy = |rs: &[TextRegion]| rs.iter().map(|r| r.xyxy).collect::<Vec<_>>();
        assert_eq!(xy(&a), xy(&b));
    }
}

// Local-model OCR served by an inference sidecar.
//
// The language-specific engines (manga-ocr, Pororo, PaddleOCR) and the
// language-agnostic docTR fallback run out of process; this client ships all
// region crops in one request and maps the returned texts back in order.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use image::RgbaImage;
use serde::Deserialize;

use super::OcrBackend;
use crate::core::config::OcrConfig;
use crate::core::errors::{OcrError, OcrResult};
use crate::core::types::TextRegion;
use crate::services::http;
use crate::utils::image_ops;

#[derive(Debug, Clone, Copy)]
pub enum LocalOcrModel {
    MangaOcr,
    Pororo,
    PaddleOcr,
    Doctr,
}

impl LocalOcrModel {
    fn as_str(&self) -> &'static str {
        match self {
            LocalOcrModel::MangaOcr => "manga-ocr",
            LocalOcrModel::Pororo => "pororo",
            LocalOcrModel::PaddleOcr => "paddle-ocr",
            LocalOcrModel::Doctr => "doctr",
        }
    }
}

#[derive(Debug, Deserialize)]
struct LocalOcrResponse {
    texts: Vec<String>,
}

pub struct LocalModelOcr {
    client: reqwest::Client,
    endpoint: String,
    model: LocalOcrModel,
    device: &'static str,
    expansion_percentage: u32,
}

impl LocalModelOcr {
    pub fn new(model: LocalOcrModel, config: &OcrConfig) -> Self {
        Self {
            client: http::build_client(120),
            endpoint: config.inference_url.clone(),
            model,
            device: config.device.as_str(),
            expansion_percentage: config.expansion_percentage,
        }
    }
}

#[async_trait]
impl OcrBackend for LocalModelOcr {
    async fn process(&self, image: &RgbaImage, regions: &mut Vec<TextRegion>) -> OcrResult<()> {
        if regions.is_empty() {
            return Ok(());
        }

        let mut crops = Vec::with_capacity(regions.len());
        for region in regions.iter() {
            let crop = image_ops::crop_region(image, region, self.expansion_percentage);
            let png =
                image_ops::encode_png(&crop).map_err(|e| OcrError::InvalidResponse(e.to_string()))?;
            crops.push(general_purpose::STANDARD.encode(&png));
        }

        let body = serde_json::json!({
            "model": self.model.as_str(),
            "device": self.device,
            "images": crops,
        });

        let text = http::post_json_with_retries(&self.client, &self.endpoint, &body, &[]).await?;
        let response: LocalOcrResponse =
            serde_json::from_str(&text).map_err(|e| OcrError::InvalidResponse(e.to_string()))?;

        if response.texts.len() != regions.len() {
            return Err(OcrError::InvalidResponse(format!(
                "expected {} texts, got {}",
                regions.len(),
                response.texts.len()
            )));
        }

        for (region, text) in regions.iter_mut().zip(response.texts) {
            region.text = text;
        }
        Ok(())
    }
}

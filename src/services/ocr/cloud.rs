// Cloud OCR backends: Azure Read and Google Cloud Vision

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use image::RgbaImage;
use tracing::debug;

use super::OcrBackend;
use crate::core::config::OcrConfig;
use crate::core::errors::{OcrError, OcrResult};
use crate::core::types::TextRegion;
use crate::services::http;
use crate::utils::image_ops;

const AZURE_READ_PATH: &str = "/computervision/imageanalysis:analyze?features=read&api-version=2023-10-01";
const GOOGLE_VISION_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Azure AI Vision Read OCR
pub struct MicrosoftOcr {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    expansion_percentage: u32,
}

impl MicrosoftOcr {
    pub fn new(config: &OcrConfig) -> OcrResult<Self> {
        let credentials = config
            .credentials
            .as_ref()
            .ok_or(OcrError::MissingCredentials("Microsoft OCR"))?;
        let endpoint = credentials
            .endpoint
            .as_ref()
            .ok_or(OcrError::MissingCredentials("Microsoft OCR endpoint"))?;

        Ok(Self {
            client: http::build_client(30),
            api_key: credentials.api_key.clone(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            expansion_percentage: config.expansion_percentage,
        })
    }

    async fn read_crop(&self, crop: &RgbaImage) -> OcrResult<String> {
        let png = image_ops::encode_png(crop).map_err(|e| OcrError::InvalidResponse(e.to_string()))?;
        let url = format!("{}{}", self.endpoint, AZURE_READ_PATH);

        let response = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(png)
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        let mut lines = Vec::new();
        if let Some(blocks) = body["readResult"]["blocks"].as_array() {
            for block in blocks {
                if let Some(block_lines) = block["lines"].as_array() {
                    for line in block_lines {
                        if let Some(text) = line["text"].as_str() {
                            lines.push(text.to_string());
                        }
                    }
                }
            }
        }
        Ok(lines.join(" "))
    }
}

#[async_trait]
impl OcrBackend for MicrosoftOcr {
    async fn process(&self, image: &RgbaImage, regions: &mut Vec<TextRegion>) -> OcrResult<()> {
        for region in regions.iter_mut() {
            let crop = image_ops::crop_region(image, region, self.expansion_percentage);
            region.text = self.read_crop(&crop).await?;
        }
        debug!("Azure Read filled {} regions", regions.len());
        Ok(())
    }
}

/// Google Cloud Vision text detection; all region crops go out in a single
/// annotate request.
pub struct GoogleVisionOcr {
    client: reqwest::Client,
    api_key: String,
    expansion_percentage: u32,
}

impl GoogleVisionOcr {
    pub fn new(config: &OcrConfig) -> OcrResult<Self> {
        let credentials = config
            .credentials
            .as_ref()
            .ok_or(OcrError::MissingCredentials("Google Cloud Vision"))?;

        Ok(Self {
            client: http::build_client(30),
            api_key: credentials.api_key.clone(),
            expansion_percentage: config.expansion_percentage,
        })
    }
}

#[async_trait]
impl OcrBackend for GoogleVisionOcr {
    async fn process(&self, image: &RgbaImage, regions: &mut Vec<TextRegion>) -> OcrResult<()> {
        if regions.is_empty() {
            return Ok(());
        }

        let mut requests = Vec::with_capacity(regions.len());
        for region in regions.iter() {
            let crop = image_ops::crop_region(image, region, self.expansion_percentage);
            let png =
                image_ops::encode_png(&crop).map_err(|e| OcrError::InvalidResponse(e.to_string()))?;
            requests.push(serde_json::json!({
                "image": { "content": general_purpose::STANDARD.encode(&png) },
                "features": [{ "type": "TEXT_DETECTION" }],
            }));
        }

        let url = format!("{}?key={}", GOOGLE_VISION_URL, self.api_key);
        let body = serde_json::json!({ "requests": requests });
        let text = http::post_json_with_retries(&self.client, &url, &body, &[]).await?;
        let parsed: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| OcrError::InvalidResponse(e.to_string()))?;

        let responses = parsed["responses"]
            .as_array()
            .ok_or_else(|| OcrError::InvalidResponse("missing responses array".to_string()))?;

        for (region, response) in regions.iter_mut().zip(responses) {
            region.text = response["fullTextAnnotation"]["text"]
                .as_str()
                .unwrap_or_default()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
        }
        Ok(())
    }
}

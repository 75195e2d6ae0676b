// LLM-backed OCR: vision-capable chat models reading one region crop at a
// time. The prompt asks for a verbatim transcription, no translation.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use image::RgbaImage;
use serde_json::json;

use super::OcrBackend;
use crate::core::config::OcrConfig;
use crate::core::errors::{OcrError, OcrResult};
use crate::core::types::TextRegion;
use crate::services::http;
use crate::utils::image_ops;
use crate::utils::lang::api_model_name;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const OCR_PROMPT: &str = "Write out the text in this image. Do NOT translate. \
     Preserve the original language. Return only the text, nothing else. \
     If there is no text, return an empty string.";

enum Provider {
    Gpt,
    Gemini,
}

/// OCR through a vision-capable LLM (GPT or Gemini family)
pub struct LlmOcr {
    client: reqwest::Client,
    provider: Provider,
    api_key: String,
    model: String,
    expansion_percentage: u32,
}

impl LlmOcr {
    pub fn gpt(config: &OcrConfig) -> OcrResult<Self> {
        Self::new(Provider::Gpt, "GPT-4.1-mini", config)
    }

    pub fn gemini(config: &OcrConfig) -> OcrResult<Self> {
        Self::new(Provider::Gemini, "Gemini-2.0-Flash", config)
    }

    fn new(provider: Provider, default_model: &str, config: &OcrConfig) -> OcrResult<Self> {
        let credentials = config
            .credentials
            .as_ref()
            .ok_or(OcrError::MissingCredentials("LLM OCR"))?;

        // The configured identifier names the engine family; "Default" means
        // the family default model was chosen by language resolution.
        let identifier = if config.model == "Default" {
            default_model
        } else {
            config.model.as_str()
        };

        Ok(Self {
            client: http::build_client(60),
            provider,
            api_key: credentials.api_key.clone(),
            model: api_model_name(identifier).to_string(),
            expansion_percentage: config.expansion_percentage,
        })
    }

    async fn read_crop(&self, crop: &RgbaImage) -> OcrResult<String> {
        let png = image_ops::encode_png(crop).map_err(|e| OcrError::InvalidResponse(e.to_string()))?;
        let b64 = general_purpose::STANDARD.encode(&png);

        match self.provider {
            Provider::Gpt => {
                let body = json!({
                    "model": self.model,
                    "messages": [{
                        "role": "user",
                        "content": [
                            { "type": "text", "text": OCR_PROMPT },
                            { "type": "image_url",
                              "image_url": { "url": format!("data:image/png;base64,{}", b64) } }
                        ]
                    }],
                    "max_tokens": 512,
                });
                let auth = format!("Bearer {}", self.api_key);
                let text = http::post_json_with_retries(
                    &self.client,
                    OPENAI_CHAT_URL,
                    &body,
                    &[("Authorization", auth.as_str())],
                )
                .await?;
                let parsed: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| OcrError::InvalidResponse(e.to_string()))?;
                Ok(parsed["choices"][0]["message"]["content"]
                    .as_str()
                    .unwrap_or_default()
                    .trim()
                    .to_string())
            }
            Provider::Gemini => {
                let url = format!(
                    "{}/{}:generateContent?key={}",
                    GEMINI_BASE_URL, self.model, self.api_key
                );
                let body = json!({
                    "contents": [{
                        "parts": [
                            { "inline_data": { "mime_type": "image/png", "data": b64 } },
                            { "text": OCR_PROMPT }
                        ]
                    }]
                });
                let text = http::post_json_with_retries(&self.client, &url, &body, &[]).await?;
                let parsed: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| OcrError::InvalidResponse(e.to_string()))?;
                Ok(parsed["candidates"][0]["content"]["parts"][0]["text"]
                    .as_str()
                    .unwrap_or_default()
                    .trim()
                    .to_string())
            }
        }
    }
}

#[async_trait]
impl OcrBackend for LlmOcr {
    async fn process(&self, image: &RgbaImage, regions: &mut Vec<TextRegion>) -> OcrResult<()> {
        for region in regions.iter_mut() {
            let crop = image_ops::crop_region(image, region, self.expansion_percentage);
            region.text = self.read_crop(&crop).await?;
        }
        Ok(())
    }
}

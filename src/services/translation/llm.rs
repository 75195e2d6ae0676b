// LLM translation engines.
//
// All LLM translators share one prompt contract: the region texts go out as
// a numbered list, the model returns a JSON object with a `translations`
// array in the same order. Vision-capable engines also attach the panel
// image so the model can use visual context; Deepseek is text-only but still
// consumes the extra context, so it stays in the context-aware variant.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use image::RgbaImage;
use serde_json::json;

use super::ContextAwareTranslation;
use crate::core::config::{LlmParams, TranslationConfig};
use crate::core::errors::{TranslationError, TranslationResult};
use crate::core::types::TextRegion;
use crate::services::http;
use crate::utils::image_ops;
use crate::utils::lang::api_model_name;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

fn system_prompt(source: &str, target: &str) -> String {
    format!(
        "You are an expert comic translator. Translate each numbered text from {} to {}. \
         Keep the tone conversational and concise enough to fit a speech bubble. \
         Return a JSON object with a 'translations' array holding one string per \
         numbered input, in the same order. Return only JSON.",
        source, target
    )
}

fn user_prompt(regions: &[TextRegion], extra_context: &str) -> String {
    let mut prompt = String::new();
    if !extra_context.trim().is_empty() {
        prompt.push_str("Context: ");
        prompt.push_str(extra_context.trim());
        prompt.push_str("\n\n");
    }
    for (i, region) in regions.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, region.text));
    }
    prompt
}

/// Parse the model's reply: a JSON object with a `translations` array, or a
/// bare array, optionally wrapped in a Markdown code fence.
fn parse_translations(reply: &str, expected: usize) -> TranslationResult<Vec<String>> {
    let trimmed = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

    let array = value["translations"]
        .as_array()
        .or_else(|| value.as_array())
        .ok_or_else(|| TranslationError::InvalidResponse("missing translations array".into()))?;

    if array.len() != expected {
        return Err(TranslationError::InvalidResponse(format!(
            "expected {} translations, got {}",
            expected,
            array.len()
        )));
    }

    Ok(array
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect())
}

fn apply(regions: &mut [TextRegion], translations: Vec<String>) {
    for (region, translation) in regions.iter_mut().zip(translations) {
        region.translation = translation;
    }
}

fn encode_image(image: &RgbaImage) -> TranslationResult<String> {
    let png = image_ops::encode_png(image)
        .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;
    Ok(general_purpose::STANDARD.encode(&png))
}

fn require_key(config: &TranslationConfig, service: &'static str) -> TranslationResult<String> {
    config
        .credentials
        .as_ref()
        .map(|c| c.api_key.clone())
        .ok_or(TranslationError::MissingCredentials(service))
}

/// OpenAI-compatible chat completion translator: GPT, Deepseek (text-only)
/// and custom deployments behind a caller-supplied base URL.
pub struct OpenAiCompatTranslator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    params: LlmParams,
    supports_images: bool,
    source: String,
    target: String,
}

impl OpenAiCompatTranslator {
    pub fn gpt(
        config: &TranslationConfig,
        source_lang_english: &str,
        target_lang_english: &str,
    ) -> TranslationResult<Self> {
        Self::build(config, OPENAI_BASE_URL, true, source_lang_english, target_lang_english)
    }

    pub fn deepseek(
        config: &TranslationConfig,
        source_lang_english: &str,
        target_lang_english: &str,
    ) -> TranslationResult<Self> {
        Self::build(config, DEEPSEEK_BASE_URL, false, source_lang_english, target_lang_english)
    }

    pub fn custom(
        config: &TranslationConfig,
        source_lang_english: &str,
        target_lang_english: &str,
    ) -> TranslationResult<Self> {
        let base_url = config
            .custom_base_url
            .as_deref()
            .ok_or(TranslationError::MissingCredentials("Custom base URL"))?
            .trim_end_matches('/')
            .to_string();
        Self::build(config, &base_url, true, source_lang_english, target_lang_english)
    }

    fn build(
        config: &TranslationConfig,
        base_url: &str,
        supports_images: bool,
        source_lang_english: &str,
        target_lang_english: &str,
    ) -> TranslationResult<Self> {
        Ok(Self {
            client: http::build_client(120),
            api_key: require_key(config, "LLM translation")?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: api_model_name(&config.model).to_string(),
            params: config.llm.clone(),
            supports_images,
            source: source_lang_english.to_string(),
            target: target_lang_english.to_string(),
        })
    }
}

#[async_trait]
impl ContextAwareTranslation for OpenAiCompatTranslator {
    async fn translate(
        &self,
        regions: &mut Vec<TextRegion>,
        image: Option<&RgbaImage>,
        extra_context: &str,
    ) -> TranslationResult<()> {
        if regions.is_empty() {
            return Ok(());
        }

        let mut content = vec![json!({ "type": "text", "text": user_prompt(regions, extra_context) })];
        if self.supports_images {
            if let Some(image) = image {
                content.push(json!({
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/png;base64,{}", encode_image(image)?) },
                }));
            }
        }

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt(&self.source, &self.target) },
                { "role": "user", "content": content },
            ],
            "temperature": self.params.temperature,
            "top_p": self.params.top_p,
            "max_tokens": self.params.max_tokens,
            "response_format": { "type": "json_object" },
        });

        let url = format!("{}/chat/completions", self.base_url);
        let auth = format!("Bearer {}", self.api_key);
        let text = http::post_json_with_retries(
            &self.client,
            &url,
            &body,
            &[("Authorization", auth.as_str())],
        )
        .await?;

        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;
        let reply = parsed["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| TranslationError::InvalidResponse("missing message content".into()))?;

        let region_count = regions.len();
        apply(regions, parse_translations(reply, region_count)?);
        Ok(())
    }
}

/// Anthropic messages API translator
pub struct ClaudeTranslator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    params: LlmParams,
    source: String,
    target: String,
}

impl ClaudeTranslator {
    pub fn new(
        config: &TranslationConfig,
        source_lang_english: &str,
        target_lang_english: &str,
    ) -> TranslationResult<Self> {
        Ok(Self {
            client: http::build_client(120),
            api_key: require_key(config, "Claude")?,
            model: api_model_name(&config.model).to_string(),
            params: config.llm.clone(),
            source: source_lang_english.to_string(),
            target: target_lang_english.to_string(),
        })
    }
}

#[async_trait]
impl ContextAwareTranslation for ClaudeTranslator {
    async fn translate(
        &self,
        regions: &mut Vec<TextRegion>,
        image: Option<&RgbaImage>,
        extra_context: &str,
    ) -> TranslationResult<()> {
        if regions.is_empty() {
            return Ok(());
        }

        let mut content = Vec::new();
        if let Some(image) = image {
            content.push(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": "image/png",
                    "data": encode_image(image)?,
                },
            }));
        }
        content.push(json!({ "type": "text", "text": user_prompt(regions, extra_context) }));

        let body = json!({
            "model": self.model,
            "max_tokens": self.params.max_tokens,
            "temperature": self.params.temperature,
            "top_p": self.params.top_p,
            "system": system_prompt(&self.source, &self.target),
            "messages": [{ "role": "user", "content": content }],
        });

        let text = http::post_json_with_retries(
            &self.client,
            ANTHROPIC_URL,
            &body,
            &[
                ("x-api-key", self.api_key.as_str()),
                ("anthropic-version", ANTHROPIC_VERSION),
            ],
        )
        .await?;

        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;
        let reply = parsed["content"][0]["text"]
            .as_str()
            .ok_or_else(|| TranslationError::InvalidResponse("missing content text".into()))?;

        let region_count = regions.len();
        apply(regions, parse_translations(reply, region_count)?);
        Ok(())
    }
}

/// Gemini generateContent translator; asks for a JSON response with an
/// explicit schema so the reply needs no fence stripping.
pub struct GeminiTranslator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    params: LlmParams,
    source: String,
    target: String,
}

impl GeminiTranslator {
    pub fn new(
        config: &TranslationConfig,
        source_lang_english: &str,
        target_lang_english: &str,
    ) -> TranslationResult<Self> {
        Ok(Self {
            client: http::build_client(120),
            api_key: require_key(config, "Gemini")?,
            model: api_model_name(&config.model).to_string(),
            params: config.llm.clone(),
            source: source_lang_english.to_string(),
            target: target_lang_english.to_string(),
        })
    }
}

#[async_trait]
impl ContextAwareTranslation for GeminiTranslator {
    async fn translate(
        &self,
        regions: &mut Vec<TextRegion>,
        image: Option<&RgbaImage>,
        extra_context: &str,
    ) -> TranslationResult<()> {
        if regions.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::new();
        if let Some(image) = image {
            parts.push(json!({
                "inline_data": { "mime_type": "image/png", "data": encode_image(image)? },
            }));
        }
        parts.push(json!({
            "text": format!(
                "{}\n\n{}",
                system_prompt(&self.source, &self.target),
                user_prompt(regions, extra_context)
            ),
        }));

        let body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": self.params.temperature,
                "topP": self.params.top_p,
                "maxOutputTokens": self.params.max_tokens,
                "response_mime_type": "application/json",
                "response_schema": {
                    "type": "object",
                    "properties": {
                        "translations": {
                            "type": "array",
                            "items": { "type": "string" }
                        }
                    },
                    "required": ["translations"]
                },
            },
        });

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_BASE_URL, self.model, self.api_key
        );
        let text = http::post_json_with_retries(&self.client, &url, &body, &[]).await?;

        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;
        let reply = parsed["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| TranslationError::InvalidResponse("missing text in response".into()))?;

        let region_count = regions.len();
        apply(regions, parse_translations(reply, region_count)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_translations_object_form() {
        let reply = r#"{"translations": ["Hello", "Goodbye"]}"#;
        assert_eq!(
            parse_translations(reply, 2).unwrap(),
            vec!["Hello".to_string(), "Goodbye".to_string()]
        );
    }

    #[test]
    fn test_parse_translations_strips_code_fence() {
        let reply = "```json\n{\"translations\": [\"Hi\"]}\n```";
        assert_eq!(parse_translations(reply, 1).unwrap(), vec!["Hi".to_string()]);
    }

    #[test]
    fn test_parse_translations_count_mismatch_is_an_error() {
        let reply = r#"{"translations": ["only one"]}"#;
        assert!(parse_translations(reply, 2).is_err());
    }

    #[test]
    fn test_user_prompt_numbers_regions_in_order() {
        let mut a = TextRegion::new([0.0, 0.0, 1.0, 1.0], 0.0);
        a.text = "一".to_string();
        let mut b = TextRegion::new([0.0, 2.0, 1.0, 3.0], 0.0);
        b.text = "二".to_string();

        let prompt = user_prompt(&[a, b], "ninja manga");
        assert!(prompt.starts_with("Context: ninja manga"));
        assert!(prompt.contains("1. 一\n"));
        assert!(prompt.contains("2. 二\n"));
    }
}

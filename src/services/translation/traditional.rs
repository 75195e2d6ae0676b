// Traditional machine-translation engines: text in, text out.
//
// Each client is constructed for one language pair and translates the whole
// region collection in a single request where the API allows it.

use async_trait::async_trait;

use super::TextTranslation;
use crate::core::config::TranslationConfig;
use crate::core::errors::{TranslationError, TranslationResult};
use crate::core::types::TextRegion;
use crate::services::http;
use crate::utils::lang::language_code;

const GOOGLE_URL: &str = "https://translation.googleapis.com/language/translate/v2";
const MICROSOFT_URL: &str = "https://api.cognitive.microsofttranslator.com/translate";
const DEEPL_URL: &str = "https://api.deepl.com/v2/translate";
const YANDEX_URL: &str = "https://translate.api.cloud.yandex.net/translate/v2/translate";

fn require_key(
    config: &TranslationConfig,
    service: &'static str,
) -> TranslationResult<String> {
    config
        .credentials
        .as_ref()
        .map(|c| c.api_key.clone())
        .ok_or(TranslationError::MissingCredentials(service))
}

fn texts_of(regions: &[TextRegion]) -> Vec<&str> {
    regions.iter().map(|r| r.text.as_str()).collect()
}

/// Google Cloud Translation v2
pub struct GoogleTranslate {
    client: reqwest::Client,
    api_key: String,
    source: &'static str,
    target: &'static str,
}

impl GoogleTranslate {
    pub fn new(
        config: &TranslationConfig,
        source_lang_english: &str,
        target_lang_english: &str,
    ) -> TranslationResult<Self> {
        Ok(Self {
            client: http::build_client(30),
            api_key: require_key(config, "Google Translate")?,
            source: language_code(source_lang_english),
            target: language_code(target_lang_english),
        })
    }
}

#[async_trait]
impl TextTranslation for GoogleTranslate {
    async fn translate(&self, regions: &mut Vec<TextRegion>) -> TranslationResult<()> {
        if regions.is_empty() {
            return Ok(());
        }

        let url = format!("{}?key={}", GOOGLE_URL, self.api_key);
        let body = serde_json::json!({
            "q": texts_of(regions),
            "source": self.source,
            "target": self.target,
            "format": "text",
        });

        let text = http::post_json_with_retries(&self.client, &url, &body, &[]).await?;
        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;
        let translations = parsed["data"]["translations"]
            .as_array()
            .ok_or_else(|| TranslationError::InvalidResponse("missing translations".into()))?;

        for (region, item) in regions.iter_mut().zip(translations) {
            region.translation = item["translatedText"].as_str().unwrap_or_default().to_string();
        }
        Ok(())
    }
}

/// Microsoft Translator v3
pub struct MicrosoftTranslator {
    client: reqwest::Client,
    api_key: String,
    source: &'static str,
    target: &'static str,
}

impl MicrosoftTranslator {
    pub fn new(
        config: &TranslationConfig,
        source_lang_english: &str,
        target_lang_english: &str,
    ) -> TranslationResult<Self> {
        Ok(Self {
            client: http::build_client(30),
            api_key: require_key(config, "Microsoft Translator")?,
            source: language_code(source_lang_english),
            target: language_code(target_lang_english),
        })
    }
}

#[async_trait]
impl TextTranslation for MicrosoftTranslator {
    async fn translate(&self, regions: &mut Vec<TextRegion>) -> TranslationResult<()> {
        if regions.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}?api-version=3.0&from={}&to={}",
            MICROSOFT_URL, self.source, self.target
        );
        let body = serde_json::Value::Array(
            regions
                .iter()
                .map(|r| serde_json::json!({ "Text": r.text }))
                .collect(),
        );

        let text = http::post_json_with_retries(
            &self.client,
            &url,
            &body,
            &[("Ocp-Apim-Subscription-Key", self.api_key.as_str())],
        )
        .await?;
        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;
        let items = parsed
            .as_array()
            .ok_or_else(|| TranslationError::InvalidResponse("expected array".into()))?;

        for (region, item) in regions.iter_mut().zip(items) {
            region.translation = item["translations"][0]["text"]
                .as_str()
                .unwrap_or_default()
                .to_string();
        }
        Ok(())
    }
}

/// DeepL v2
pub struct DeepLTranslate {
    client: reqwest::Client,
    api_key: String,
    source: String,
    target: String,
}

impl DeepLTranslate {
    pub fn new(
        config: &TranslationConfig,
        source_lang_english: &str,
        target_lang_english: &str,
    ) -> TranslationResult<Self> {
        Ok(Self {
            client: http::build_client(30),
            api_key: require_key(config, "DeepL")?,
            // DeepL wants uppercase codes
            source: language_code(source_lang_english).to_uppercase(),
            target: language_code(target_lang_english).to_uppercase(),
        })
    }
}

#[async_trait]
impl TextTranslation for DeepLTranslate {
    async fn translate(&self, regions: &mut Vec<TextRegion>) -> TranslationResult<()> {
        if regions.is_empty() {
            return Ok(());
        }

        let body = serde_json::json!({
            "text": texts_of(regions),
            "source_lang": self.source,
            "target_lang": self.target,
        });
        let auth = format!("DeepL-Auth-Key {}", self.api_key);

        let text = http::post_json_with_retries(
            &self.client,
            DEEPL_URL,
            &body,
            &[("Authorization", auth.as_str())],
        )
        .await?;
        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;
        let translations = parsed["translations"]
            .as_array()
            .ok_or_else(|| TranslationError::InvalidResponse("missing translations".into()))?;

        for (region, item) in regions.iter_mut().zip(translations) {
            region.translation = item["text"].as_str().unwrap_or_default().to_string();
        }
        Ok(())
    }
}

/// Yandex Translate v2
pub struct YandexTranslate {
    client: reqwest::Client,
    api_key: String,
    source: &'static str,
    target: &'static str,
}

impl YandexTranslate {
    pub fn new(
        config: &TranslationConfig,
        source_lang_english: &str,
        target_lang_english: &str,
    ) -> TranslationResult<Self> {
        Ok(Self {
            client: http::build_client(30),
            api_key: require_key(config, "Yandex")?,
            source: language_code(source_lang_english),
            target: language_code(target_lang_english),
        })
    }
}

#[async_trait]
impl TextTranslation for YandexTranslate {
    async fn translate(&self, regions: &mut Vec<TextRegion>) -> TranslationResult<()> {
        if regions.is_empty() {
            return Ok(());
        }

        let body = serde_json::json!({
            "texts": texts_of(regions),
            "sourceLanguageCode": self.source,
            "targetLanguageCode": self.target,
        });
        let auth = format!("Api-Key {}", self.api_key);

        let text = http::post_json_with_retries(
            &self.client,
            YANDEX_URL,
            &body,
            &[("Authorization", auth.as_str())],
        )
        .await?;
        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;
        let translations = parsed["translations"]
            .as_array()
            .ok_or_else(|| TranslationError::InvalidResponse("missing translations".into()))?;

        for (region, item) in regions.iter_mut().zip(translations) {
            region.translation = item["text"].as_str().unwrap_or_default().to_string();
        }
        Ok(())
    }
}

// Cache fingerprints for backend engines.
//
// The base key concatenates the model identifier with the language pair
// (OCR: source only, translation: source and target). Dynamic fields that
// change backend behavior — credentials always, sampling parameters for
// LLM-class engines — are serialized as canonical JSON (recursively sorted
// keys) and appended as an xxh3 digest. Requests that differ only in
// irrelevant fields therefore share one key, while any credential or
// sampling change yields a fresh engine.

use serde_json::Value;
use xxhash_rust::xxh3::xxh3_64;

use crate::core::config::{Credentials, LlmParams};

pub fn detection_fingerprint(model: &str) -> String {
    model.to_string()
}

pub fn inpainting_fingerprint(model: &str) -> String {
    model.to_string()
}

pub fn ocr_fingerprint(
    model: &str,
    source_lang: &str,
    credentials: Option<&Credentials>,
    llm: Option<&LlmParams>,
) -> String {
    with_extras(format!("{}_{}", model, source_lang), credentials, llm)
}

pub fn translation_fingerprint(
    model: &str,
    source_lang: &str,
    target_lang: &str,
    credentials: Option<&Credentials>,
    llm: Option<&LlmParams>,
) -> String {
    with_extras(
        format!("{}_{}_{}", model, source_lang, target_lang),
        credentials,
        llm,
    )
}

fn with_extras(base: String, credentials: Option<&Credentials>, llm: Option<&LlmParams>) -> String {
    let mut extras = serde_json::Map::new();

    if let Some(creds) = credentials {
        if let Ok(value) = serde_json::to_value(creds) {
            extras.insert("credentials".to_string(), value);
        }
    }
    if let Some(params) = llm {
        if let Ok(value) = serde_json::to_value(params) {
            extras.insert("llm".to_string(), value);
        }
    }

    if extras.is_empty() {
        return base;
    }

    let canonical = canonical_json(&Value::Object(extras));
    format!("{}_{:016x}", base, xxh3_64(canonical.as_bytes()))
}

/// Serialize with recursively sorted object keys so the digest is stable
/// across field declaration order.
fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_key_without_extras() {
        assert_eq!(ocr_fingerprint("Default", "ja", None, None), "Default_ja");
        assert_eq!(
            translation_fingerprint("DeepL", "ja", "en", None, None),
            "DeepL_ja_en"
        );
    }

    #[test]
    fn test_identical_configs_share_a_key() {
        let creds = Credentials::from_key("sk-abc");
        let a = translation_fingerprint("GPT-4.1-mini", "ja", "en", Some(&creds), None);
        let b = translation_fingerprint("GPT-4.1-mini", "ja", "en", Some(&creds), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_credential_change_yields_new_key() {
        let a = translation_fingerprint(
            "GPT-4.1-mini",
            "ja",
            "en",
            Some(&Credentials::from_key("sk-abc")),
            None,
        );
        let b = translation_fingerprint(
            "GPT-4.1-mini",
            "ja",
            "en",
            Some(&Credentials::from_key("sk-def")),
            None,
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_language_pair_is_part_of_the_key() {
        let a = translation_fingerprint("DeepL", "ja", "en", None, None);
        let b = translation_fingerprint("DeepL", "ja", "fr", None, None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical_json_is_order_independent() {
        let a: Value = serde_json::json!({"b": 1, "a": {"y": 2, "x": 3}});
        let b: Value = serde_json::json!({"a": {"x": 3, "y": 2}, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }
}

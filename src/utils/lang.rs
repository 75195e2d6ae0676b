// Static language and model-identifier tables.
//
// Both are simple lookups with a pass-through default: an unknown language
// name maps to "en" when stamping regions, and an unknown model identifier
// resolves to itself.

/// English language name → ISO-ish code used on `TextRegion.source_lang` /
/// `target_lang`. Unmapped names default to `"en"`.
pub fn language_code(language: &str) -> &'static str {
    match language {
        "Korean" => "ko",
        "Japanese" => "ja",
        "Chinese" => "zh",
        "Simplified Chinese" => "zh-CN",
        "Traditional Chinese" => "zh-TW",
        "English" => "en",
        "Russian" => "ru",
        "French" => "fr",
        "German" => "de",
        "Dutch" => "nl",
        "Spanish" => "es",
        "Italian" => "it",
        "Turkish" => "tr",
        "Polish" => "pl",
        "Portuguese" => "pt",
        "Brazilian Portuguese" => "pt-br",
        "Thai" => "th",
        "Vietnamese" => "vi",
        "Indonesian" => "id",
        _ => "en",
    }
}

/// UI-facing model identifier → API model name. Identifiers with no entry
/// pass through unchanged (e.g. a raw API model name typed directly).
pub fn api_model_name(identifier: &str) -> &str {
    match identifier {
        "GPT-4.1" => "gpt-4.1",
        "GPT-4.1-mini" => "gpt-4.1-mini",
        "Claude-3.7-Sonnet" => "claude-3-7-sonnet-20250219",
        "Claude-3.5-Haiku" => "claude-3-5-haiku-20241022",
        "Gemini-2.5-Flash" => "gemini-2.5-flash",
        "Gemini-2.5-Pro" => "gemini-2.5-pro",
        "Gemini-2.0-Flash" => "gemini-2.0-flash",
        "Deepseek-v3" => "deepseek-chat",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_code_lookup() {
        assert_eq!(language_code("Japanese"), "ja");
        assert_eq!(language_code("Brazilian Portuguese"), "pt-br");
        // Unmapped names default to English
        assert_eq!(language_code("Klingon"), "en");
    }

    #[test]
    fn test_model_name_passthrough() {
        assert_eq!(api_model_name("GPT-4.1-mini"), "gpt-4.1-mini");
        assert_eq!(api_model_name("my-local-model"), "my-local-model");
    }
}

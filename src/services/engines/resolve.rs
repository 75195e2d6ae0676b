// Model-identifier resolution.
//
// Every stage resolves its configured identifier to a closed set of backend
// kinds: exact identifiers first, then substring families (several model
// names sharing one adapter), then a configured default. OCR additionally
// resolves the "Default" sentinel by source language.

/// Detection backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    RtDetrV2,
}

/// OCR backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrKind {
    Microsoft,
    GoogleVision,
    Gpt,
    Gemini,
    MangaOcr,
    Pororo,
    PaddleOcr,
    Doctr,
}

/// Traditional (text-only) translation engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraditionalKind {
    Google,
    Microsoft,
    DeepL,
    Yandex,
}

/// LLM (context-aware) translation families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmKind {
    Gpt,
    Claude,
    Gemini,
    Deepseek,
    Custom,
}

/// Translation backend kinds, split by capability: traditional engines
/// consume text only, LLM engines also take the panel image and extra
/// context. The split is decided here, at resolution time, never by
/// inspecting the backend at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatorKind {
    Traditional(TraditionalKind),
    Llm(LlmKind),
}

/// Inpainting backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InpainterKind {
    Lama,
    AotGan,
}

pub fn resolve_detector(model: &str) -> DetectorKind {
    match model {
        "RT-DETR-v2" | "RT-DETR-V2" => DetectorKind::RtDetrV2,
        _ => DetectorKind::RtDetrV2,
    }
}

/// Resolve an OCR identifier. The `Default` sentinel picks a
/// language-specific local engine, falling back to the language-agnostic
/// docTR engine when no language-specific backend exists.
pub fn resolve_ocr(model: &str, source_lang_english: &str) -> OcrKind {
    match model {
        "Microsoft OCR" => OcrKind::Microsoft,
        "Google Cloud Vision" => OcrKind::GoogleVision,
        "GPT-4.1-mini" => OcrKind::Gpt,
        "Gemini-2.0-Flash" => OcrKind::Gemini,
        "Default" => match source_lang_english {
            "Japanese" => OcrKind::MangaOcr,
            "Korean" => OcrKind::Pororo,
            "Chinese" | "Simplified Chinese" | "Traditional Chinese" => OcrKind::PaddleOcr,
            "Russian" => OcrKind::Gpt,
            _ => OcrKind::Doctr,
        },
        _ => OcrKind::Doctr,
    }
}

/// Resolve a translation identifier: exact traditional names, then LLM
/// family substrings, defaulting to the GPT family.
pub fn resolve_translator(model: &str) -> TranslatorKind {
    match model {
        "Google Translate" => return TranslatorKind::Traditional(TraditionalKind::Google),
        "Microsoft Translator" => return TranslatorKind::Traditional(TraditionalKind::Microsoft),
        "DeepL" => return TranslatorKind::Traditional(TraditionalKind::DeepL),
        "Yandex" => return TranslatorKind::Traditional(TraditionalKind::Yandex),
        _ => {}
    }

    for (family, kind) in [
        ("GPT", LlmKind::Gpt),
        ("Claude", LlmKind::Claude),
        ("Gemini", LlmKind::Gemini),
        ("Deepseek", LlmKind::Deepseek),
        ("Custom", LlmKind::Custom),
    ] {
        if model.contains(family) {
            return TranslatorKind::Llm(kind);
        }
    }

    TranslatorKind::Llm(LlmKind::Gpt)
}

/// Whether an identifier resolves to an LLM-class engine; such engines fold
/// their sampling parameters into the cache fingerprint.
pub fn is_llm_identifier(model: &str) -> bool {
    matches!(resolve_translator(model), TranslatorKind::Llm(_))
}

pub fn resolve_inpainter(model: &str) -> InpainterKind {
    match model {
        "AOT" | "AOT-GAN" => InpainterKind::AotGan,
        _ => InpainterKind::Lama,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_ocr_identifiers() {
        assert_eq!(resolve_ocr("Microsoft OCR", "Japanese"), OcrKind::Microsoft);
        assert_eq!(
            resolve_ocr("Google Cloud Vision", "Korean"),
            OcrKind::GoogleVision
        );
    }

    #[test]
    fn test_default_ocr_is_language_specific() {
        assert_eq!(resolve_ocr("Default", "Japanese"), OcrKind::MangaOcr);
        assert_eq!(resolve_ocr("Default", "Korean"), OcrKind::Pororo);
        assert_eq!(resolve_ocr("Default", "Chinese"), OcrKind::PaddleOcr);
        assert_eq!(resolve_ocr("Default", "Russian"), OcrKind::Gpt);
        // No language-specific backend: language-agnostic fallback
        assert_eq!(resolve_ocr("Default", "French"), OcrKind::Doctr);
    }

    #[test]
    fn test_unknown_ocr_identifier_falls_back() {
        assert_eq!(resolve_ocr("SomethingElse", "Japanese"), OcrKind::Doctr);
    }

    #[test]
    fn test_translator_family_substring_match() {
        assert_eq!(
            resolve_translator("GPT-4.1-mini"),
            TranslatorKind::Llm(LlmKind::Gpt)
        );
        assert_eq!(
            resolve_translator("Claude-3.7-Sonnet"),
            TranslatorKind::Llm(LlmKind::Claude)
        );
        assert_eq!(
            resolve_translator("Deepseek-v3"),
            TranslatorKind::Llm(LlmKind::Deepseek)
        );
    }

    #[test]
    fn test_traditional_translators_match_exactly() {
        assert_eq!(
            resolve_translator("DeepL"),
            TranslatorKind::Traditional(TraditionalKind::DeepL)
        );
        assert!(!is_llm_identifier("Google Translate"));
        assert!(is_llm_identifier("GPT-4.1"));
    }

    #[test]
    fn test_unmatched_translator_defaults_to_gpt() {
        assert_eq!(
            resolve_translator("mystery-model"),
            TranslatorKind::Llm(LlmKind::Gpt)
        );
    }
}

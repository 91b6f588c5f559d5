/// Convert language code to full language name for clearer prompts
pub fn language_code_to_name(code: &str) -> String {
    let name = match code.trim().to_lowercase().as_str() {
        "ja" => "Japanese",
        "en" => "English",
        "zh" | "zh-cn" | "zh-hans" => "Simplified Chinese",
        "zh-tw" | "zh-hant" => "Traditional Chinese",
        "ko" => "Korean",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "nl" => "Dutch",
        "pl" => "Polish",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "id" => "Indonesian",
        "uk" => "Ukrainian",
        "sv" => "Swedish",
        _ => return code.trim().to_string(),
    };
    name.to_string()
}

/// Name for a tesseract traineddata code such as "jpn" or "chi_sim"
pub fn tesseract_code_to_name(code: &str) -> String {
    let iso = match code.trim() {
        "jpn" | "jpn_vert" => "ja",
        "eng" => "en",
        "chi_sim" | "chi_sim_vert" => "zh",
        "chi_tra" | "chi_tra_vert" => "zh-tw",
        "kor" => "ko",
        "fra" => "fr",
        "deu" => "de",
        "spa" => "es",
        "ita" => "it",
        "por" => "pt",
        "rus" => "ru",
        other => other,
    };
    language_code_to_name(iso)
}

/// Rough guess at the language of OCR output: "ja", "en" or None.
///
/// Kana and CJK punctuation above 30% means Japanese; otherwise ASCII above
/// 50% means English.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let total = text.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return None;
    }

    let japanese = text
        .chars()
        .filter(|c| ('\u{3001}'..='\u{30FE}').contains(c))
        .count();
    let ascii = text
        .chars()
        .filter(|c| !c.is_whitespace() && c.is_ascii())
        .count();

    let japanese_ratio = japanese as f64 / total as f64;
    let ascii_ratio = ascii as f64 / total as f64;

    if japanese_ratio > 0.3 {
        Some("ja")
    } else if ascii_ratio > 0.5 {
        Some("en")
    } else {
        None
    }
}

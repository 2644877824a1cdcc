/// Language codes offered for recognition, synthesis and translation.
pub const SUPPORTED_LANGUAGES: [&str; 6] = ["en-US", "te-IN", "hi-IN", "fr-FR", "es-ES", "de-DE"];

/// Primary subtag of a BCP-47 code: `"te-IN"` -> `"te"`.
pub fn primary_subtag(code: &str) -> &str {
    code.split(['-', '_']).next().unwrap_or(code)
}

/// English display name for a language code, keyed on the primary subtag.
/// Unknown subtags are returned as-is.
pub fn display_name(code: &str) -> String {
    let primary = primary_subtag(code);
    let name = match primary.to_ascii_lowercase().as_str() {
        "en" => "English",
        "te" => "Telugu",
        "hi" => "Hindi",
        "fr" => "French",
        "es" => "Spanish",
        "de" => "German",
        "ta" => "Tamil",
        "ja" => "Japanese",
        _ => return primary.to_string(),
    };
    name.to_string()
}

/// The supported spelling of `code`, matched case-insensitively.
pub fn canonical_language(code: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|supported| supported.eq_ignore_ascii_case(code.trim()))
}

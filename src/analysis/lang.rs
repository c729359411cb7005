//! Pure, character-class-based output-language detection (spec.md §4.6,
//! §9 design note: "keep it as a small, pure function with the same
//! tie-breaks documented here, not reach for a third-party detector").

use crate::store::AnalysisLang;

/// Letters that only occur in Ukrainian (not Russian), used as a strong
/// signal before falling back to a raw Cyrillic-vs-Latin letter count.
const UKRAINIAN_ONLY_LETTERS: &[char] = &['і', 'ї', 'є', 'ґ', 'І', 'Ї', 'Є', 'Ґ'];

/// Detect the output language for analysis/Q&A text.
///
/// `override_lang` (explicit user/config choice) always wins. Otherwise:
/// 1. Any Ukrainian-only letter present ⇒ `Uk`.
/// 2. Else compare Cyrillic vs Latin letter counts; Cyrillic-majority ⇒ `Uk`.
/// 3. Else `En`.
pub fn detect_language(text: &str, override_lang: Option<AnalysisLang>) -> AnalysisLang {
    if let Some(lang) = override_lang {
        return lang;
    }

    if text.chars().any(|c| UKRAINIAN_ONLY_LETTERS.contains(&c)) {
        return AnalysisLang::Uk;
    }

    let (mut cyrillic, mut latin) = (0u32, 0u32);
    for c in text.chars() {
        if c.is_alphabetic() {
            if ('\u{0400}'..='\u{04FF}').contains(&c) {
                cyrillic += 1;
            } else if c.is_ascii_alphabetic() {
                latin += 1;
            }
        }
    }

    if cyrillic > latin {
        AnalysisLang::Uk
    } else {
        AnalysisLang::En
    }
}

/// Localized short strings used across C5/C6 when no grounded answer is
/// available.
pub fn insufficient_message(lang: AnalysisLang) -> &'static str {
    match lang {
        AnalysisLang::Uk => "Недостатньо інформації в транскрипті, щоб впевнено відповісти.",
        AnalysisLang::En => "There isn't enough information in the transcript to answer reliably.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ukrainian_only_letter_forces_uk() {
        assert_eq!(detect_language("це і приклад", None), AnalysisLang::Uk);
    }

    #[test]
    fn majority_latin_is_en() {
        assert_eq!(detect_language("this is clearly english text", None), AnalysisLang::En);
    }

    #[test]
    fn override_always_wins() {
        assert_eq!(detect_language("this is english", Some(AnalysisLang::Uk)), AnalysisLang::Uk);
    }

    #[test]
    fn majority_cyrillic_without_unique_letters_is_uk() {
        // Uses only letters shared with Russian, so rule 2 (count) decides.
        assert_eq!(detect_language("привет как дела", None), AnalysisLang::Uk);
    }
}

//! Structure detection for imported paragraphs.

use super::patterns::SECTION_HEADER_RES;
use crate::manuscript::SectionType;

/// Whether a paragraph's text starts a new top-level section.
///
/// Matching is case-insensitive and anchored at the start of the trimmed text.
pub fn is_chapter_header(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    SECTION_HEADER_RES.iter().any(|re| re.is_match(&lowered))
}

/// Classify a section by the keywords in its title.
///
/// The first keyword found wins, so "Prologue to the Epilogue" is a prologue.
pub fn classify_type(title: &str) -> SectionType {
    const KEYWORDS: &[(&str, SectionType)] = &[
        ("prologue", SectionType::Prologue),
        ("epilogue", SectionType::Epilogue),
        ("preface", SectionType::Preface),
        ("introduction", SectionType::Introduction),
        ("dedication", SectionType::Dedication),
        ("acknowledgment", SectionType::Acknowledgments),
        ("appendix", SectionType::Afterword),
    ];

    let lowered = title.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, ty)| *ty)
        .unwrap_or(SectionType::Chapter)
}

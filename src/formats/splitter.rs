//! Delimiter-based splitting of plain text into titled sections.

use super::patterns::{SPLIT_CHAPTER_RE, SPLIT_HEADING_RE, SPLIT_PART_RE};
use crate::manuscript::SplitSection;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Which delimiter lines start a new section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// `Chapter N` lines.
    #[default]
    Chapter,
    /// `Part N` lines.
    Part,
    /// Markdown `#`, `##` or `###` lines.
    Heading,
}

impl SplitStrategy {
    /// Resolve a strategy name; anything unrecognised splits by chapter.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "part" => SplitStrategy::Part,
            "heading" => SplitStrategy::Heading,
            _ => SplitStrategy::Chapter,
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            SplitStrategy::Chapter => &*SPLIT_CHAPTER_RE,
            SplitStrategy::Part => &*SPLIT_PART_RE,
            SplitStrategy::Heading => &*SPLIT_HEADING_RE,
        }
    }
}

/// Split text at delimiter lines.
///
/// Each delimiter becomes the title of the section that follows it, and text
/// before the first delimiter is titled "Introduction". Sections without
/// content are dropped. Text with no delimiter at all, or with nothing but
/// empty sections, comes back whole as "Chapter 1".
pub fn smart_split(content: &str, strategy: SplitStrategy) -> Vec<SplitSection> {
    let mut sections = Vec::new();
    let mut title = "Introduction";
    let mut cursor = 0;
    let mut matched = false;

    for delimiter in strategy.pattern().find_iter(content) {
        matched = true;
        push_section(&mut sections, title, &content[cursor..delimiter.start()]);
        title = delimiter.as_str().trim();
        cursor = delimiter.end();
    }

    if matched {
        push_section(&mut sections, title, &content[cursor..]);
    }

    if sections.is_empty() {
        return vec![SplitSection::new("Chapter 1", content)];
    }

    sections
}

fn push_section(sections: &mut Vec<SplitSection>, title: &str, body: &str) {
    let body = body.trim();
    if !body.is_empty() {
        sections.push(SplitSection::new(title, body));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_by_chapter() {
        let text = "Chapter 1: Start\n\nHello world.\n\nChapter 2: Next\n\nBye.";
        let sections = smart_split(text, SplitStrategy::Chapter);
        assert_eq!(
            sections,
            vec![
                SplitSection::new("Chapter 1: Start", "Hello world."),
                SplitSection::new("Chapter 2: Next", "Bye."),
            ]
        );
    }

    #[test]
    fn test_preamble_becomes_introduction() {
        let text = "Some front matter.\nCHAPTER 1\nBody";
        let sections = smart_split(text, SplitStrategy::Chapter);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0], SplitSection::new("Introduction", "Some front matter."));
        assert_eq!(sections[1], SplitSection::new("CHAPTER 1", "Body"));
    }

    #[test]
    fn test_delimiter_does_not_swallow_next_line() {
        let sections = smart_split("Chapter 3\nFirst line.", SplitStrategy::Chapter);
        assert_eq!(sections, vec![SplitSection::new("Chapter 3", "First line.")]);
    }

    #[test]
    fn test_no_delimiters_returns_whole_input() {
        let text = "  just some prose\n\nwith paragraphs  ";
        for strategy in [SplitStrategy::Chapter, SplitStrategy::Part, SplitStrategy::Heading] {
            assert_eq!(smart_split(text, strategy), vec![SplitSection::new("Chapter 1", text)]);
        }
    }

    #[test]
    fn test_only_empty_sections_falls_back() {
        let text = "Chapter 1\n\nChapter 2\n";
        assert_eq!(
            smart_split(text, SplitStrategy::Chapter),
            vec![SplitSection::new("Chapter 1", text)]
        );
    }

    #[test]
    fn test_split_by_part_and_heading() {
        let parts = smart_split("Part 1\nA\nPart 2\nB", SplitStrategy::Part);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].title, "Part 2");

        let headings = smart_split("# One\nalpha\n## Two\nbeta", SplitStrategy::Heading);
        assert_eq!(
            headings,
            vec![
                SplitSection::new("# One", "alpha"),
                SplitSection::new("## Two", "beta"),
            ]
        );
    }

    #[test]
    fn test_strategy_from_name() {
        assert_eq!(SplitStrategy::from_name("PART"), SplitStrategy::Part);
        assert_eq!(SplitStrategy::from_name("heading"), SplitStrategy::Heading);
        assert_eq!(SplitStrategy::from_name("anything"), SplitStrategy::Chapter);
    }
}

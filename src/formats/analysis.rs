//! Heuristic structure analysis of manuscript content.

use super::patterns::{ANALYZE_CHAPTER_RE, ANALYZE_HEADING_RE, ANALYZE_PART_RE};
use serde::Serialize;

/// Kind of writing suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    /// Add chapter divisions.
    Structure,
    /// Readability or progress note.
    Improvement,
    /// Prompt to the writer.
    Question,
}

/// A suggestion shown to the writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Suggestion kind.
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    /// Human-readable message.
    pub message: String,
}

/// A line that looks like a chapter, part or heading marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedHeader {
    /// Zero-based line index.
    pub line: usize,
    /// Trimmed line text.
    pub text: String,
    /// Marker name: "Chapter", "Part" or "Heading".
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Result of analyzing a piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentAnalysis {
    /// Header-like lines, in line order.
    pub detected_headers: Vec<DetectedHeader>,
    /// Lines carrying a chapter marker, which would open a chapter when the
    /// content is split.
    pub potential_chapters: Vec<String>,
    /// Suggestions derived from the counts.
    pub suggestions: Vec<Suggestion>,
    /// Whitespace-delimited word count.
    pub word_count: usize,
    /// `<p>` count, or blank-line separated blocks for plain text.
    pub paragraph_count: usize,
}

/// Analyze content for header-like lines and readability issues.
pub fn analyze_content_structure(content: &str) -> ContentAnalysis {
    let word_count = content.split_whitespace().count();
    let paragraph_count = match content.matches("<p>").count() {
        0 => content.matches("\n\n").count() + 1,
        n => n,
    };

    let mut detected_headers = Vec::new();
    for (line_index, line) in content.split('\n').enumerate() {
        let lowered = line.trim().to_lowercase();
        let markers = [
            (ANALYZE_CHAPTER_RE.is_match(&lowered), "Chapter"),
            (ANALYZE_PART_RE.is_match(&lowered), "Part"),
            (ANALYZE_HEADING_RE.is_match(&lowered), "Heading"),
        ];
        for (_, kind) in markers.iter().filter(|(hit, _)| *hit) {
            detected_headers.push(DetectedHeader {
                line: line_index,
                text: line.trim().to_string(),
                kind: *kind,
            });
        }
    }

    let potential_chapters = detected_headers
        .iter()
        .filter(|h| h.kind == "Chapter")
        .map(|h| h.text.clone())
        .collect();

    let mut suggestions = Vec::new();
    if word_count > 5000 && detected_headers.is_empty() {
        suggestions.push(Suggestion {
            kind: SuggestionKind::Structure,
            message: "Your content is long but has no chapter breaks. Consider adding chapter divisions for better readability.".to_string(),
        });
    }

    if (paragraph_count as f64) < word_count as f64 / 500.0 {
        suggestions.push(Suggestion {
            kind: SuggestionKind::Improvement,
            message: "Your paragraphs seem long. Consider breaking them up for easier reading."
                .to_string(),
        });
    }

    ContentAnalysis {
        detected_headers,
        potential_chapters,
        suggestions,
        word_count,
        paragraph_count,
    }
}

/// Outcome of the writing-assistant analysis of an editor buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisOutcome {
    /// The single suggestion to surface, if any.
    pub suggestion: Option<Suggestion>,
    /// Full analysis, when it was needed to reach the suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ContentAnalysis>,
}

/// Pick one suggestion for the current editor content.
pub fn suggest_for_content(content: &str) -> AnalysisOutcome {
    if content.is_empty() {
        return AnalysisOutcome {
            suggestion: None,
            analysis: None,
        };
    }

    let analysis = analyze_content_structure(content);
    if let Some(first) = analysis.suggestions.first().cloned() {
        return AnalysisOutcome {
            suggestion: Some(first),
            analysis: Some(analysis),
        };
    }

    let word_count = analysis.word_count;
    if word_count < 100 {
        return AnalysisOutcome {
            suggestion: Some(Suggestion {
                kind: SuggestionKind::Question,
                message: "Just getting started? Would you like some opening line suggestions?"
                    .to_string(),
            }),
            analysis: None,
        };
    }

    if word_count > 1000 && word_count % 500 < 50 {
        return AnalysisOutcome {
            suggestion: Some(Suggestion {
                kind: SuggestionKind::Improvement,
                message: format!(
                    "Great progress! You've written {} words. Want me to review your flow?",
                    word_count
                ),
            }),
            analysis: None,
        };
    }

    AnalysisOutcome {
        suggestion: None,
        analysis: Some(analysis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_headers_per_line() {
        let analysis = analyze_content_structure("Chapter IV\ntext\n## Notes\nPart 2 of chapter 3");
        let kinds: Vec<_> = analysis
            .detected_headers
            .iter()
            .map(|h| (h.line, h.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![(0, "Chapter"), (2, "Heading"), (3, "Chapter"), (3, "Part")]
        );
        assert_eq!(analysis.detected_headers[1].text, "## Notes");
        assert_eq!(
            analysis.potential_chapters,
            vec!["Chapter IV", "Part 2 of chapter 3"]
        );
    }

    #[test]
    fn test_no_markers_no_potential_chapters() {
        let analysis = analyze_content_structure("<p>Just prose.</p>");
        assert!(analysis.potential_chapters.is_empty());
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["potential_chapters"], serde_json::json!([]));
    }

    #[test]
    fn test_paragraph_count() {
        assert_eq!(analyze_content_structure("<p>a</p><p>b</p>").paragraph_count, 2);
        assert_eq!(analyze_content_structure("a\n\nb\n\nc").paragraph_count, 3);
        assert_eq!(analyze_content_structure("a").paragraph_count, 1);
    }

    #[test]
    fn test_long_unstructured_content_suggestions() {
        let content = "word ".repeat(6000);
        let analysis = analyze_content_structure(&content);
        let kinds: Vec<_> = analysis.suggestions.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SuggestionKind::Structure, SuggestionKind::Improvement]
        );
    }

    #[test]
    fn test_suggest_for_content() {
        assert_eq!(suggest_for_content("").suggestion, None);

        let short = suggest_for_content("A short opening.");
        assert_eq!(short.suggestion.map(|s| s.kind), Some(SuggestionKind::Question));
        assert!(short.analysis.is_none());

        // Five paragraphs of 300 words plus the trailing "</p>" token.
        let paragraph = "<p>".to_string() + &"word ".repeat(300) + "</p>";
        let progress = suggest_for_content(&paragraph.repeat(5));
        let suggestion = progress.suggestion.unwrap();
        assert_eq!(suggestion.kind, SuggestionKind::Improvement);
        assert!(suggestion.message.contains("1501 words"));

        let middle = "<p>".to_string() + &"word ".repeat(100) + "</p>";
        let outcome = suggest_for_content(&middle.repeat(3));
        assert!(outcome.suggestion.is_none());
        assert!(outcome.analysis.is_some());
    }
}

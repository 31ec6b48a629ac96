use super::Exporter;
use crate::db::{Book, Chapter};
use crate::error::Result;
use crate::formats::markup::plain_text;

/// Default wrap column.
pub const DEFAULT_WIDTH: usize = 80;

/// Plain text with underlined titles, word-wrapped at a fixed column.
pub struct TextExporter {
    width: usize,
}

impl Default for TextExporter {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
        }
    }
}

impl TextExporter {
    /// Render the book as text.
    pub fn render(&self, book: &Book, chapters: &[Chapter]) -> String {
        let mut text = format!(
            "{}\n{}\n\n",
            book.title.to_uppercase(),
            "=".repeat(book.title.chars().count())
        );
        if !book.description.is_empty() {
            text.push_str(&format!("{}\n\n", book.description));
        }
        text.push_str(&"-".repeat(50));
        text.push_str("\n\n");

        for chapter in chapters {
            text.push_str(&format!(
                "\n{}\n{}\n\n",
                chapter.title.to_uppercase(),
                "-".repeat(chapter.title.chars().count())
            ));
            for line in wrap(&plain_text(&chapter.content), self.width) {
                text.push_str(&line);
                text.push('\n');
            }
            text.push('\n');
        }

        text
    }
}

impl Exporter for TextExporter {
    fn export(&self, book: &Book, chapters: &[Chapter]) -> Result<Vec<u8>> {
        Ok(self.render(book, chapters).into_bytes())
    }
}

/// Greedy word wrap.
///
/// A word joins the current line unless `line + 1 + word` would exceed
/// `width`; a word longer than `width` sits alone on its own line.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if line_len + word_len + 1 > width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            line.push_str(word);
            line_len = word_len;
        } else {
            if !line.is_empty() {
                line.push(' ');
                line_len += 1;
            }
            line.push_str(word);
            line_len += word_len;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures;

    #[test]
    fn test_wrap_boundary() {
        // 15 words of four letters plus spaces is 74 columns.
        let base = vec!["abcd"; 15].join(" ");
        assert_eq!(base.len(), 74);

        // 74 + 1 + 5 = 80 stays on one line.
        let exact = format!("{} efghi", base);
        assert_eq!(wrap(&exact, 80), vec![exact.clone()]);

        // 74 + 1 + 6 = 81 wraps.
        let over = format!("{} efghij", base);
        assert_eq!(wrap(&over, 80), vec![base.clone(), "efghij".to_string()]);
    }

    #[test]
    fn test_wrap_long_word_alone() {
        let long = "x".repeat(90);
        let text = format!("short {} tail", long);
        assert_eq!(
            wrap(&text, 80),
            vec!["short".to_string(), long, "tail".to_string()]
        );
        assert_eq!(wrap(&"y".repeat(85), 80), vec!["y".repeat(85)]);
        assert!(wrap("", 80).is_empty());
    }

    #[test]
    fn test_render_layout() {
        let book = fixtures::book("Night", "A story.");
        let chapters = vec![fixtures::chapter(
            0,
            "Dusk",
            "<p>Fish &amp; chips</p><p>&lt;tea&gt;</p>",
        )];
        let text = TextExporter::default().render(&book, &chapters);

        let expected = format!(
            "NIGHT\n=====\n\nA story.\n\n{}\n\n\nDUSK\n----\n\nFish & chips <tea>\n\n",
            "-".repeat(50)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_word_count_survives_export() {
        let book = fixtures::book("B", "");
        let chapters = vec![
            fixtures::chapter(0, "One", "<p>alpha&nbsp;beta</p><p>gamma</p>"),
            fixtures::chapter(1, "Two", "<h2>delta</h2><p>epsilon <strong>zeta</strong></p>"),
        ];
        let stored: i64 = chapters.iter().map(|c| c.word_count).sum();

        let exported: usize = chapters
            .iter()
            .flat_map(|c| wrap(&plain_text(&c.content), 80))
            .map(|line| line.split_whitespace().count())
            .sum();
        assert_eq!(stored, 6);
        assert_eq!(exported as i64, stored);

        // The rendered body carries the same words.
        let text = TextExporter::default().render(&book, &chapters);
        assert!(text.contains("alpha beta gamma\n"));
        assert!(text.contains("delta epsilon zeta\n"));
    }
}

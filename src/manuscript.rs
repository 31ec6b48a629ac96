//! Manuscript model shared by the import and export pipelines.

pub mod section;

pub use section::{Section, SectionType, SplitSection};

use crate::formats::markup;

/// Count the words of stored chapter HTML.
///
/// Tags are stripped and entities decoded first, so the count matches what
/// the plain-text export renders.
pub fn count_words(html: &str) -> i64 {
    markup::plain_text(html).split_whitespace().count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_words_ignores_markup() {
        assert_eq!(count_words("<p>one two three</p>"), 3);
        assert_eq!(count_words("<p>caf&eacute; &amp; bar</p>"), 3);
        assert_eq!(count_words("a&nbsp;b"), 2);
        assert_eq!(count_words(""), 0);
    }
}

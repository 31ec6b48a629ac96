//! Import-side document processing: structure detection, .docx parsing,
//! plain-text splitting, markup cleanup and content analysis.

pub mod analysis;
pub mod detector;
pub mod docx;
pub mod markup;
pub(crate) mod patterns;
pub mod splitter;

pub use analysis::{AnalysisOutcome, ContentAnalysis, analyze_content_structure, suggest_for_content};
pub use detector::{classify_type, is_chapter_header};
pub use docx::parse_docx;
pub use splitter::{SplitStrategy, smart_split};

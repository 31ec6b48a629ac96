//! Sections produced by the import pipeline.

use serde::{Deserialize, Serialize};

/// Classification of a section of a manuscript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    /// Regular chapter.
    #[default]
    Chapter,
    /// Opening section before the first chapter.
    Prologue,
    /// Closing section after the last chapter.
    Epilogue,
    /// Author's preface.
    Preface,
    /// Introduction.
    Introduction,
    /// Dedication page.
    Dedication,
    /// Acknowledgments page.
    Acknowledgments,
    /// Afterword or appendix material.
    Afterword,
}

impl SectionType {
    /// Stored name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Chapter => "chapter",
            SectionType::Prologue => "prologue",
            SectionType::Epilogue => "epilogue",
            SectionType::Preface => "preface",
            SectionType::Introduction => "introduction",
            SectionType::Dedication => "dedication",
            SectionType::Acknowledgments => "acknowledgments",
            SectionType::Afterword => "afterword",
        }
    }

    /// Parse a stored name. Unknown names read back as `Chapter`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "prologue" => SectionType::Prologue,
            "epilogue" => SectionType::Epilogue,
            "preface" => SectionType::Preface,
            "introduction" => SectionType::Introduction,
            "dedication" => SectionType::Dedication,
            "acknowledgments" => SectionType::Acknowledgments,
            "afterword" => SectionType::Afterword,
            _ => SectionType::Chapter,
        }
    }
}

/// A typed section parsed from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section title.
    pub title: String,
    /// Section classification.
    #[serde(rename = "type")]
    pub section_type: SectionType,
    /// HTML content.
    pub content: String,
}

impl Section {
    /// Create a section.
    pub fn new(
        title: impl Into<String>,
        section_type: SectionType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            section_type,
            content: content.into(),
        }
    }
}

/// A titled chunk of plain text produced by the content splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSection {
    /// Delimiter line (or synthetic title).
    pub title: String,
    /// Text between this delimiter and the next.
    pub content: String,
}

impl SplitSection {
    /// Create a split section.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_type_names_round_trip() {
        for ty in [
            SectionType::Chapter,
            SectionType::Prologue,
            SectionType::Epilogue,
            SectionType::Preface,
            SectionType::Introduction,
            SectionType::Dedication,
            SectionType::Acknowledgments,
            SectionType::Afterword,
        ] {
            assert_eq!(SectionType::from_name(ty.as_str()), ty);
        }
        assert_eq!(SectionType::from_name("bogus"), SectionType::Chapter);
    }

    #[test]
    fn test_section_serializes_type_field() {
        let section = Section::new("Prologue", SectionType::Prologue, "<p>x</p>");
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json["type"], "prologue");
        assert_eq!(json["title"], "Prologue");
    }
}

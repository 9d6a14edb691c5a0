use crate::book::Chapter;
use crate::content_source::SourceChapter;
use crate::parsing::markup::plain_text;
use log::debug;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Phrases that mark a table of contents or publisher front matter.
const METADATA_PHRASES: &[&str] = &[
    "table of contents",
    "all rights reserved",
    "copyright ©",
    "copyright (c)",
    "isbn",
    "published by",
    "first published",
    "library of congress",
    "cataloging-in-publication",
];

/// Source path / identifier fragments that mark front matter files.
const METADATA_PATH_MARKERS: &[&str] = &["cover", "title", "copyright", "header"];

/// More links than this and the chapter is treated as a navigation page.
pub const NAVIGATION_LINK_THRESHOLD: usize = 10;

static CHAPTER_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)chapter[\s_\-.]*(\d+)").expect("Failed to compile chapter id regex")
});
static BARE_CHAPTER_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*chapter\s*\d+\s*\.?\s*$").expect("Failed to compile chapter title regex")
});
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<a[\s>]").expect("Failed to compile link regex"));

/// Running chapter-number state for one pass over a chapter list.
///
/// Numbers parsed from identifiers are recorded as used; sequential numbers
/// skip anything already used. Metadata chapters never touch this state.
#[derive(Debug, Clone)]
pub struct ChapterNumbering {
    next_sequential: u32,
    used: HashSet<u32>,
}

impl ChapterNumbering {
    pub fn new() -> Self {
        Self {
            next_sequential: 1,
            used: HashSet::new(),
        }
    }

    pub fn assign(&mut self, explicit: Option<u32>) -> u32 {
        if let Some(number) = explicit {
            self.used.insert(number);
            return number;
        }
        while self.used.contains(&self.next_sequential) {
            self.next_sequential += 1;
        }
        let number = self.next_sequential;
        self.used.insert(number);
        self.next_sequential += 1;
        number
    }
}

impl Default for ChapterNumbering {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifies normalized chapters in reading order.
///
/// One classifier must see the whole chapter list, in order, so that
/// sequential chapter numbers come out right.
pub struct ChapterClassifier {
    numbering: ChapterNumbering,
}

impl ChapterClassifier {
    pub fn new() -> Self {
        Self {
            numbering: ChapterNumbering::new(),
        }
    }

    pub fn classify(
        &mut self,
        source: &SourceChapter,
        normalized_content: String,
        source_index: usize,
    ) -> Chapter {
        let is_metadata = is_metadata_chapter(
            &normalized_content,
            &source.path,
            &source.identifier,
        );

        let chapter_number = if is_metadata {
            None
        } else {
            let explicit = chapter_number_from_identifier(&source.identifier);
            Some(self.numbering.assign(explicit))
        };

        let title = source.label.as_deref().and_then(display_title);

        debug!(
            "Classified chapter {source_index} ({}): metadata={is_metadata}, number={chapter_number:?}, title={title:?}",
            source.identifier
        );

        Chapter {
            title,
            content: normalized_content,
            is_metadata,
            chapter_number,
            source_index,
        }
    }
}

impl Default for ChapterClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Front matter / table-of-contents detection.
pub fn is_metadata_chapter(normalized_content: &str, path: &str, identifier: &str) -> bool {
    let text = plain_text(normalized_content).to_lowercase();
    if let Some(phrase) = METADATA_PHRASES.iter().find(|p| text.contains(*p)) {
        debug!("Metadata phrase {phrase:?} found in {identifier}");
        return true;
    }

    let path = path.to_lowercase();
    let identifier = identifier.to_lowercase();
    if METADATA_PATH_MARKERS
        .iter()
        .any(|marker| path.contains(marker) || identifier.contains(marker))
    {
        return true;
    }

    LINK_RE.find_iter(normalized_content).count() > NAVIGATION_LINK_THRESHOLD
}

/// Parses `chapter` + digits out of a source identifier.
pub fn chapter_number_from_identifier(identifier: &str) -> Option<u32> {
    CHAPTER_ID_RE
        .captures(identifier)
        .and_then(|caps| caps[1].parse().ok())
}

/// The label as a display title, unless it is empty or a bare "Chapter N".
pub fn display_title(label: &str) -> Option<String> {
    let label = label.trim();
    if label.is_empty() || BARE_CHAPTER_TITLE_RE.is_match(label) {
        None
    } else {
        Some(label.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(identifier: &str, path: &str, label: Option<&str>) -> SourceChapter {
        SourceChapter {
            label: label.map(str::to_string),
            identifier: identifier.to_string(),
            path: path.to_string(),
            markup: String::new(),
        }
    }

    #[test]
    fn test_table_of_contents_is_metadata() {
        let content = "<h1>Table of Contents</h1><p>Chapter 1</p>";
        assert!(is_metadata_chapter(content, "text/toc.xhtml", "toc"));
    }

    #[test]
    fn test_copyright_page_is_metadata() {
        let content = "<p>Copyright © 2020 Someone. All rights reserved.</p>";
        assert!(is_metadata_chapter(content, "text/p1.xhtml", "p1"));
    }

    #[test]
    fn test_path_markers_mark_metadata() {
        assert!(is_metadata_chapter("<p>Story</p>", "OEBPS/cover.xhtml", "item1"));
        assert!(is_metadata_chapter("<p>Story</p>", "OEBPS/a.xhtml", "titlepage"));
        assert!(!is_metadata_chapter("<p>Story</p>", "OEBPS/ch01.xhtml", "ch01"));
    }

    #[test]
    fn test_many_links_mark_navigation_page() {
        let links: String = (0..11)
            .map(|i| format!("<p><a href=\"c{i}.xhtml\">Part {i}</a></p>"))
            .collect();
        assert!(is_metadata_chapter(&links, "a.xhtml", "a"));

        let ten: String = (0..10)
            .map(|i| format!("<p><a href=\"c{i}.xhtml\">Part {i}</a></p>"))
            .collect();
        assert!(!is_metadata_chapter(&ten, "a.xhtml", "a"));
    }

    #[test]
    fn test_chapter_number_from_identifier() {
        assert_eq!(chapter_number_from_identifier("chapter-7"), Some(7));
        assert_eq!(chapter_number_from_identifier("Chapter_012"), Some(12));
        assert_eq!(chapter_number_from_identifier("ch07"), None);
        assert_eq!(chapter_number_from_identifier("intro"), None);
    }

    #[test]
    fn test_bare_chapter_labels_are_suppressed() {
        assert_eq!(display_title("Chapter 3"), None);
        assert_eq!(display_title("  chapter12. "), None);
        assert_eq!(display_title(""), None);
        assert_eq!(
            display_title("Chapter 3: The Storm"),
            Some("Chapter 3: The Storm".to_string())
        );
        assert_eq!(display_title("Prologue"), Some("Prologue".to_string()));
    }

    #[test]
    fn test_sequential_numbering_skips_metadata() {
        let mut classifier = ChapterClassifier::new();
        let cover = classifier.classify(&source("cover", "cover.xhtml", None), "<p>x</p>".into(), 0);
        let first = classifier.classify(&source("a", "a.xhtml", None), "<p>x</p>".into(), 1);
        let second = classifier.classify(&source("b", "b.xhtml", None), "<p>x</p>".into(), 2);

        assert!(cover.is_metadata);
        assert_eq!(cover.chapter_number, None);
        assert_eq!(first.chapter_number, Some(1));
        assert_eq!(second.chapter_number, Some(2));
    }

    #[test]
    fn test_sequential_numbering_skips_identifier_numbers() {
        let mut classifier = ChapterClassifier::new();
        let explicit = classifier.classify(&source("chapter-1", "a.xhtml", None), "<p>x</p>".into(), 0);
        let next = classifier.classify(&source("b", "b.xhtml", None), "<p>x</p>".into(), 1);
        assert_eq!(explicit.chapter_number, Some(1));
        assert_eq!(next.chapter_number, Some(2));
    }

    #[test]
    fn test_label_becomes_title() {
        let mut classifier = ChapterClassifier::new();
        let chapter = classifier.classify(
            &source("s1", "s1.xhtml", Some("The Beginning")),
            "<p>x</p>".into(),
            0,
        );
        assert_eq!(chapter.title.as_deref(), Some("The Beginning"));
    }
}

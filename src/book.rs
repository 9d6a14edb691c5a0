use crate::chapter_classifier::ChapterClassifier;
use crate::chapter_index::ChapterIndex;
use crate::chunker::{ChunkOutput, Chunker, Page};
use crate::content_source::{ContentSource, SourceChapter};
use crate::error::Result;
use crate::parsing::markup_normalizer::MarkupNormalizer;
use crate::reflow::{MatchStrategy, PositionMapper};
use log::{info, warn};

/// A classified, normalized chapter: the chunker's input unit.
///
/// Built once per source chapter and kept by the caller so density changes
/// can re-chunk without touching the source again.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    /// Source label, unless it was empty or a bare "Chapter N".
    pub title: Option<String>,
    /// Page markup produced by the normalizer.
    pub content: String,
    pub is_metadata: bool,
    pub chapter_number: Option<u32>,
    /// Position of the chapter in the source's reading order.
    pub source_index: usize,
}

impl Chapter {
    /// Title shown on the chapter's first page and in the chapter index.
    pub fn display_title(&self) -> Option<String> {
        self.title
            .clone()
            .or_else(|| self.chapter_number.map(|n| format!("Chapter {n}")))
    }
}

/// Normalizes and classifies source chapters in reading order.
///
/// A chapter whose markup cannot be read is logged and skipped; the rest
/// still go through.
pub fn prepare_chapters(sources: &[SourceChapter]) -> Vec<Chapter> {
    let normalizer = MarkupNormalizer::new();
    let mut classifier = ChapterClassifier::new();
    let mut chapters = Vec::with_capacity(sources.len());

    for (index, source) in sources.iter().enumerate() {
        match normalizer.normalize_html(&source.markup) {
            Ok(content) => chapters.push(classifier.classify(source, content, index)),
            Err(e) => warn!("Skipping chapter {index} ({}): {e}", source.identifier),
        }
    }
    chapters
}

/// Reads every chapter from a content source and prepares it.
pub fn load_chapters(source: &mut dyn ContentSource) -> anyhow::Result<Vec<Chapter>> {
    let sources = source.chapters()?;
    let chapters = prepare_chapters(&sources);
    info!(
        "Prepared {} chapters ({} metadata)",
        chapters.len(),
        chapters.iter().filter(|c| c.is_metadata).count()
    );
    Ok(chapters)
}

/// Chapters together with one chunking run over them.
///
/// Pages and chapter index are only ever replaced together, as a new `Book`.
#[derive(Debug, Clone)]
pub struct Book {
    chapters: Vec<Chapter>,
    pages: Vec<Page>,
    chapter_index: ChapterIndex,
    max_chunk_size: usize,
}

impl Book {
    pub fn build(chapters: Vec<Chapter>, max_chunk_size: usize) -> Result<Self> {
        let ChunkOutput {
            pages,
            chapter_index,
        } = Chunker::new(max_chunk_size).chunk(&chapters)?;
        Ok(Self {
            chapters,
            pages,
            chapter_index,
            max_chunk_size,
        })
    }

    /// Re-chunks at a new size and maps `current_index` into the new pages.
    pub fn rechunk(
        &self,
        current_index: usize,
        max_chunk_size: usize,
        mapper: &PositionMapper,
    ) -> Result<(Book, usize, MatchStrategy)> {
        let remapped = mapper.remap(&self.chapters, &self.pages, current_index, max_chunk_size)?;
        let book = Book {
            chapters: self.chapters.clone(),
            pages: remapped.pages,
            chapter_index: remapped.chapter_index,
            max_chunk_size,
        };
        Ok((book, remapped.new_index, remapped.strategy))
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn chapter_index(&self) -> &ChapterIndex {
        &self.chapter_index
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PagerError;

    fn source(identifier: &str, label: Option<&str>, markup: &str) -> SourceChapter {
        SourceChapter {
            label: label.map(str::to_string),
            identifier: identifier.to_string(),
            path: format!("OEBPS/{identifier}.xhtml"),
            markup: markup.to_string(),
        }
    }

    #[test]
    fn test_prepare_chapters_normalizes_and_classifies() {
        let sources = vec![
            source("cover", None, "<div><img src=\"c.jpg\"/></div>"),
            source("s1", Some("Chapter 1"), "<section><p>It <b>began</b>.</p></section>"),
            source("s2", Some("Interlude"), "<p>Later.</p>"),
        ];
        let chapters = prepare_chapters(&sources);

        assert_eq!(chapters.len(), 3);
        assert!(chapters[0].is_metadata);
        assert_eq!(chapters[0].content, "");
        assert_eq!(chapters[1].content, "<p>It <strong>began</strong>.</p>");
        assert_eq!(chapters[1].title, None);
        assert_eq!(chapters[1].display_title().as_deref(), Some("Chapter 1"));
        assert_eq!(chapters[2].chapter_number, Some(2));
        assert_eq!(chapters[2].display_title().as_deref(), Some("Interlude"));
        assert_eq!(chapters[2].source_index, 2);
    }

    #[test]
    fn test_build_fails_without_content() {
        let chapters = prepare_chapters(&[source("a", None, "<p> </p>")]);
        let err = Book::build(chapters, 500).unwrap_err();
        assert_eq!(err, PagerError::NoExtractableContent);
    }

    #[test]
    fn test_rechunk_keeps_chapters_and_replaces_pages() {
        let text = "A sentence that is long enough to matter. ".repeat(20);
        let chapters = prepare_chapters(&[source("a", None, &format!("<p>{text}</p>"))]);
        let book = Book::build(chapters, 800).unwrap();
        let (smaller, index, _) = book.rechunk(0, 300, &PositionMapper::default()).unwrap();

        assert_eq!(smaller.chapters(), book.chapters());
        assert!(smaller.pages().len() > book.pages().len());
        assert_eq!(smaller.max_chunk_size(), 300);
        assert_eq!(index, 0);
    }
}

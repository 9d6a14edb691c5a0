//! Re-chunking at a new density while keeping the reader in place.
//!
//! The old position is matched against the new pages in three tiers, first
//! success wins:
//!
//! 1. an exact text anchor taken from the first block of the current page
//!    long enough to carry one,
//! 2. the relative position inside the current page's chapter,
//! 3. the relative position inside the whole book.

use crate::book::Chapter;
use crate::chapter_index::ChapterIndex;
use crate::chunker::{Chunker, Page};
use crate::error::Result;
use crate::parsing::markup::{flatten_blocks, text_len};
use crate::parsing::sentences::sentence_ends;
use log::debug;
use serde::{Deserialize, Serialize};

pub const MIN_SNIPPET_CHARS: usize = 50;
pub const MAX_SNIPPET_CHARS: usize = 200;

/// Anchor snippet bounds, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetConfig {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            min_chars: MIN_SNIPPET_CHARS,
            max_chars: MAX_SNIPPET_CHARS,
        }
    }
}

/// Which tier produced the new index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ExactText,
    ChapterRelative,
    BookRelative,
}

#[derive(Debug, Clone)]
pub struct Remapped {
    pub pages: Vec<Page>,
    pub chapter_index: ChapterIndex,
    pub new_index: usize,
    pub strategy: MatchStrategy,
}

#[derive(Debug, Clone, Default)]
pub struct PositionMapper {
    snippet: SnippetConfig,
}

impl PositionMapper {
    pub fn new(snippet: SnippetConfig) -> Self {
        Self { snippet }
    }

    /// Re-chunks `chapters` at `new_max_chunk_size` and finds where
    /// `old_index` in `old_pages` now lives.
    pub fn remap(
        &self,
        chapters: &[Chapter],
        old_pages: &[Page],
        old_index: usize,
        new_max_chunk_size: usize,
    ) -> Result<Remapped> {
        let output = Chunker::new(new_max_chunk_size).chunk(chapters)?;
        let (new_index, strategy) = self.map_position(old_pages, old_index, &output.pages);
        debug!(
            "Remapped page {old_index}/{} -> {new_index}/{} via {strategy:?}",
            old_pages.len(),
            output.pages.len()
        );
        Ok(Remapped {
            pages: output.pages,
            chapter_index: output.chapter_index,
            new_index,
            strategy,
        })
    }

    /// Maps a position between two page lists. Never fails: an empty new
    /// list maps to 0.
    pub fn map_position(
        &self,
        old_pages: &[Page],
        old_index: usize,
        new_pages: &[Page],
    ) -> (usize, MatchStrategy) {
        if new_pages.is_empty() || old_pages.is_empty() {
            return (0, MatchStrategy::BookRelative);
        }
        let old_index = old_index.min(old_pages.len() - 1);
        let current = &old_pages[old_index];

        if let Some(snippet) = self.page_anchor(current) {
            if let Some(index) = new_pages
                .iter()
                .position(|page| page.plain_text().contains(&snippet))
            {
                return (index, MatchStrategy::ExactText);
            }
            debug!("Anchor snippet not found in new pages, falling back");
        }

        if let Some(index) = chapter_relative(old_pages, old_index, new_pages) {
            return (index, MatchStrategy::ChapterRelative);
        }

        let fraction = old_index as f64 / old_pages.len() as f64;
        let index = (fraction * new_pages.len() as f64).round() as usize;
        (index.min(new_pages.len() - 1), MatchStrategy::BookRelative)
    }

    /// Anchor for `page`, taken from its first block with at least
    /// `min_chars` of text. Never spans a block boundary, since the new
    /// chunking may put two blocks on different pages.
    pub fn page_anchor(&self, page: &Page) -> Option<String> {
        match flatten_blocks(&page.text) {
            Ok(blocks) => blocks
                .iter()
                .find_map(|block| self.anchor_snippet(&block.text)),
            Err(e) => {
                debug!("Page {} could not be flattened for anchoring: {e}", page.id);
                self.anchor_snippet(&page.plain_text())
            }
        }
    }

    /// The text a reader is "on": a prefix of `text` ending at the first
    /// sentence end that leaves at least `min_chars`, or the first
    /// `max_chars` when no such sentence end exists.
    ///
    /// Text shorter than `min_chars` has no anchor.
    pub fn anchor_snippet(&self, text: &str) -> Option<String> {
        if text_len(text) < self.snippet.min_chars {
            return None;
        }
        let prefix: String = text.chars().take(self.snippet.max_chars).collect();
        let aligned = sentence_ends(&prefix)
            .into_iter()
            .find(|&end| text_len(&prefix[..end]) >= self.snippet.min_chars);
        Some(match aligned {
            Some(end) => prefix[..end].to_string(),
            None => prefix,
        })
    }
}

fn chapter_relative(old_pages: &[Page], old_index: usize, new_pages: &[Page]) -> Option<usize> {
    let chapter = old_pages[old_index].source_chapter_index;
    let old_chapter: Vec<usize> = pages_of_chapter(old_pages, chapter);
    let new_chapter: Vec<usize> = pages_of_chapter(new_pages, chapter);
    if new_chapter.is_empty() {
        return None;
    }
    let rank = old_chapter.iter().position(|&index| index == old_index)?;
    let fraction = if old_chapter.len() > 1 {
        rank as f64 / (old_chapter.len() - 1) as f64
    } else {
        0.0
    };
    let pick = (fraction * (new_chapter.len() - 1) as f64).round() as usize;
    Some(new_chapter[pick.min(new_chapter.len() - 1)])
}

fn pages_of_chapter(pages: &[Page], chapter: usize) -> Vec<usize> {
    pages
        .iter()
        .enumerate()
        .filter(|(_, page)| page.source_chapter_index == chapter)
        .map(|(index, _)| index)
        .collect()
}

/// Convenience wrapper using the default snippet bounds.
pub fn remap(
    chapters: &[Chapter],
    old_pages: &[Page],
    old_index: usize,
    new_max_chunk_size: usize,
) -> Result<Remapped> {
    PositionMapper::default().remap(chapters, old_pages, old_index, new_max_chunk_size)
}

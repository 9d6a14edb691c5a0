use crate::book::Chapter;
use crate::chapter_index::{ChapterEntry, ChapterIndex};
use crate::error::{PagerError, Result};
use crate::parsing::markup::{MarkupBlock, display_text, flatten_blocks, plain_text, text_len};
use crate::parsing::sentences::split_sentences;
use log::{debug, info, warn};
use serde::Serialize;

/// A size-bounded unit of chapter text, shown one per screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// 1-based, sequential within one chunking run only.
    pub id: usize,
    /// Present only on the first page of a chapter.
    pub title: Option<String>,
    pub source_chapter_index: usize,
    pub chapter_number: Option<u32>,
    pub chapter_display_title: Option<String>,
    /// Page markup.
    pub text: String,
}

impl Page {
    /// De-tagged text, the form page sizes are measured on.
    pub fn plain_text(&self) -> String {
        plain_text(&self.text)
    }

    /// De-tagged text with a space between blocks, for showing to a reader.
    pub fn display_text(&self) -> String {
        display_text(&self.text)
    }
}

#[derive(Debug, Clone)]
pub struct ChunkOutput {
    pub pages: Vec<Page>,
    pub chapter_index: ChapterIndex,
}

#[derive(Default)]
struct PageBuffer {
    markup: String,
}

impl PageBuffer {
    /// De-tagged length of the page with `block` appended. Measured on the
    /// joined markup: whitespace at a block's edge can survive the join.
    fn len_with(&self, block: &MarkupBlock) -> usize {
        if self.is_empty() {
            return block.text_len();
        }
        text_len(&plain_text(&format!("{}{}", self.markup, block.markup)))
    }

    fn push(&mut self, block: &MarkupBlock) {
        self.markup.push_str(&block.markup);
    }

    fn is_empty(&self) -> bool {
        self.markup.is_empty()
    }
}

/// Packs chapter blocks into pages of at most `max_chunk_size` de-tagged
/// characters.
///
/// Blocks are packed greedily in order. A block larger than the bound is cut
/// into sentence fragments first and word fragments second, each re-wrapped
/// in the block's own opening tag. The only page allowed over the bound is
/// one holding a single word longer than the bound.
pub struct Chunker {
    max_chunk_size: usize,
}

impl Chunker {
    pub fn new(max_chunk_size: usize) -> Self {
        if max_chunk_size == 0 {
            warn!("max_chunk_size of 0 requested, using 1");
        }
        Self {
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn chunk(&self, chapters: &[Chapter]) -> Result<ChunkOutput> {
        let mut pages = Vec::new();
        let mut entries = Vec::new();

        for chapter in chapters {
            let first_page = pages.len();
            self.chunk_chapter(chapter, &mut pages);
            if pages.len() == first_page || chapter.is_metadata {
                continue;
            }
            entries.push(ChapterEntry {
                display_title: chapter.display_title().unwrap_or_default(),
                start_page_index: first_page,
                end_page_index: pages.len() - 1,
                chapter_number: chapter.chapter_number,
            });
        }

        if pages.is_empty() {
            return Err(PagerError::NoExtractableContent);
        }

        let chapter_index = ChapterIndex::from_entries(entries);
        info!(
            "Chunked {} chapters into {} pages at {} chars ({} indexed chapters)",
            chapters.len(),
            pages.len(),
            self.max_chunk_size,
            chapter_index.entries.len()
        );
        Ok(ChunkOutput {
            pages,
            chapter_index,
        })
    }

    fn chunk_chapter(&self, chapter: &Chapter, pages: &mut Vec<Page>) {
        if plain_text(&chapter.content).is_empty() {
            debug!("Chapter {} has no text, skipping", chapter.source_index);
            return;
        }
        let blocks = match flatten_blocks(&chapter.content) {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!("Chapter {} could not be flattened: {e}", chapter.source_index);
                return;
            }
        };

        let first_page = pages.len();
        let mut buffer = PageBuffer::default();
        for block in blocks {
            let fragments = if block.text_len() > self.max_chunk_size {
                self.split_block(&block)
            } else {
                vec![block]
            };
            for fragment in &fragments {
                if buffer.len_with(fragment) > self.max_chunk_size && !buffer.is_empty() {
                    self.emit_page(chapter, std::mem::take(&mut buffer), first_page, pages);
                }
                buffer.push(fragment);
            }
        }
        if !buffer.is_empty() {
            self.emit_page(chapter, buffer, first_page, pages);
        }

        debug!(
            "Chapter {} -> pages {}..{}",
            chapter.source_index,
            first_page,
            pages.len()
        );
    }

    fn emit_page(
        &self,
        chapter: &Chapter,
        buffer: PageBuffer,
        first_page: usize,
        pages: &mut Vec<Page>,
    ) {
        let display_title = chapter.display_title();
        let title = if pages.len() == first_page {
            display_title.clone()
        } else {
            None
        };
        pages.push(Page {
            id: pages.len() + 1,
            title,
            source_chapter_index: chapter.source_index,
            chapter_number: chapter.chapter_number,
            chapter_display_title: display_title,
            text: buffer.markup,
        });
    }

    /// Cuts an oversized block into same-tag fragments within the bound.
    pub fn split_block(&self, block: &MarkupBlock) -> Vec<MarkupBlock> {
        let mut fragments = Vec::new();
        for packed in pack(split_sentences(&block.text), self.max_chunk_size) {
            if text_len(&packed) > self.max_chunk_size {
                fragments.extend(pack(
                    packed.split_whitespace().collect(),
                    self.max_chunk_size,
                ));
            } else {
                fragments.push(packed);
            }
        }
        fragments
            .iter()
            .map(|text| MarkupBlock::from_text(&block.tag, &block.open_tag, text))
            .collect()
    }
}

/// Greedily joins pieces with single spaces into strings of at most `max`
/// characters. A piece longer than `max` ends up alone.
fn pack(pieces: Vec<&str>, max: usize) -> Vec<String> {
    let mut packed = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for piece in pieces {
        let piece_len = text_len(piece);
        if !current.is_empty() && current_len + 1 + piece_len > max {
            packed.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(piece);
        current_len += piece_len;
    }
    if !current.is_empty() {
        packed.push(current);
    }
    packed
}

/// Convenience wrapper over [`Chunker::chunk`].
pub fn chunk(chapters: &[Chapter], max_chunk_size: usize) -> Result<ChunkOutput> {
    Chunker::new(max_chunk_size).chunk(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unpunctuated text of exactly `len` characters.
    fn filler(len: usize) -> String {
        (0..len).map(|i| if i % 10 == 5 { ' ' } else { 'x' }).collect()
    }

    fn chapter(index: usize, content: String) -> Chapter {
        Chapter {
            title: None,
            content,
            is_metadata: false,
            chapter_number: Some(index as u32 + 1),
            source_index: index,
        }
    }

    #[test]
    fn test_flush_only_when_buffer_non_empty() {
        let content = format!(
            "<p>{}</p><p>{}</p><p>{}</p>",
            filler(100),
            filler(450),
            filler(50)
        );
        let mut intro = chapter(0, content);
        intro.title = Some("intro".to_string());
        let output = chunk(&[intro], 500).unwrap();

        assert_eq!(output.pages.len(), 2);
        assert_eq!(output.pages[0].plain_text().chars().count(), 100);
        assert_eq!(output.pages[1].plain_text().chars().count(), 500);
        assert_eq!(output.pages[0].title.as_deref(), Some("intro"));
        assert_eq!(output.pages[1].title, None);
        assert_eq!(output.pages[1].chapter_display_title.as_deref(), Some("intro"));
        assert_eq!(output.pages[0].id, 1);
        assert_eq!(output.pages[1].id, 2);
    }

    #[test]
    fn test_oversized_block_splits_by_sentence() {
        let sentence = "Each of these sentences is short enough.";
        let text = vec![sentence; 10].join(" ");
        let output = chunk(&[chapter(0, format!("<p class=\"body\">{text}</p>"))], 100).unwrap();

        for page in &output.pages {
            assert!(page.plain_text().chars().count() <= 100);
            assert!(page.text.starts_with("<p class=\"body\">"));
        }
        assert!(output.pages[0].plain_text().ends_with('.'));
    }

    #[test]
    fn test_run_on_sentence_falls_back_to_words() {
        let text = vec!["word"; 100].join(" ");
        let output = chunk(&[chapter(0, format!("<p>{text}</p>"))], 42).unwrap();

        assert!(output.pages.len() > 1);
        for page in &output.pages {
            let plain = page.plain_text();
            assert!(plain.chars().count() <= 42, "page too long: {plain}");
            assert!(plain.starts_with("word") && plain.ends_with("word"));
        }
    }

    #[test]
    fn test_single_long_word_is_emitted_unsplit() {
        let long_word = "x".repeat(30);
        let content = format!("<p>short {long_word} tail</p>");
        let output = chunk(&[chapter(0, content)], 10).unwrap();

        let texts: Vec<String> = output.pages.iter().map(Page::plain_text).collect();
        assert_eq!(texts, vec!["short".to_string(), long_word, "tail".to_string()]);
    }

    #[test]
    fn test_empty_chapters_are_skipped() {
        let chapters = vec![
            chapter(0, String::new()),
            chapter(1, "<p>Real text.</p>".to_string()),
        ];
        let output = chunk(&chapters, 500).unwrap();
        assert_eq!(output.pages.len(), 1);
        assert_eq!(output.pages[0].source_chapter_index, 1);
        assert_eq!(output.chapter_index.entries.len(), 1);
    }

    #[test]
    fn test_no_pages_is_an_error() {
        let chapters = vec![chapter(0, "<p> </p>".to_string()), chapter(1, String::new())];
        assert_eq!(
            chunk(&chapters, 500).unwrap_err(),
            PagerError::NoExtractableContent
        );
    }

    #[test]
    fn test_metadata_chapters_are_paged_but_not_indexed() {
        let mut toc = chapter(0, "<p>Table of Contents</p>".to_string());
        toc.is_metadata = true;
        toc.chapter_number = None;
        let chapters = vec![toc, chapter(1, "<p>Story.</p>".to_string())];
        let output = chunk(&chapters, 500).unwrap();

        assert_eq!(output.pages.len(), 2);
        assert_eq!(output.chapter_index.entries.len(), 1);
        assert_eq!(output.chapter_index.entries[0].start_page_index, 1);
        assert_eq!(output.pages[0].title, None);
    }

    #[test]
    fn test_chapter_index_ranges() {
        let chapters = vec![
            chapter(0, format!("<p>{}</p><p>{}</p>", filler(80), filler(80))),
            chapter(1, format!("<p>{}</p>", filler(50))),
        ];
        let output = chunk(&chapters, 100).unwrap();
        let ranges: Vec<(usize, usize)> = output
            .chapter_index
            .entries
            .iter()
            .map(|e| (e.start_page_index, e.end_page_index))
            .collect();
        assert_eq!(ranges, vec![(0, 1), (2, 2)]);
        assert_eq!(output.chapter_index.total_chapters, 2);
        assert_eq!(output.chapter_index.entries[0].display_title, "Chapter 1");
    }

    #[test]
    fn test_whitespace_at_inline_edge_counts_toward_the_bound() {
        let content = "<p>aaaa <em>b </em></p><p>cccc</p>".to_string();
        let output = chunk(&[chapter(0, content)], 10).unwrap();

        let texts: Vec<String> = output.pages.iter().map(Page::plain_text).collect();
        assert_eq!(texts, vec!["aaaa b".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn test_display_text_separates_paragraphs() {
        let content = "<p>The flats.</p><p>Entry two.</p>".to_string();
        let output = chunk(&[chapter(0, content)], 500).unwrap();
        assert_eq!(output.pages[0].plain_text(), "The flats.Entry two.");
        assert_eq!(output.pages[0].display_text(), "The flats. Entry two.");
    }

    #[test]
    fn test_index_title_comes_from_the_chapter() {
        let mut numbered = chapter(6, "<p>Seven.</p>".to_string());
        numbered.chapter_number = Some(7);
        let mut untitled = chapter(1, "<p>Loose.</p>".to_string());
        untitled.chapter_number = None;
        let output = chunk(&[untitled, numbered], 500).unwrap();

        let titles: Vec<&str> = output
            .chapter_index
            .entries
            .iter()
            .map(|e| e.display_title.as_str())
            .collect();
        assert_eq!(titles, vec!["", "Chapter 7"]);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        assert_eq!(Chunker::new(0).max_chunk_size(), 1);
    }

    #[test]
    fn test_pack_joins_with_single_spaces() {
        assert_eq!(pack(vec!["ab", "cd", "ef"], 5), vec!["ab cd", "ef"]);
        assert_eq!(pack(vec!["abcdefg", "h"], 5), vec!["abcdefg", "h"]);
    }
}

use crate::book::{Book, Chapter};
use crate::bookmark::Bookmarks;
use crate::chapter_index::ChapterIndex;
use crate::chunker::{Chunker, Page};
use crate::density::Density;
use crate::error::Result;
use crate::pagination::PaginationMachine;
use crate::reflow::{MatchStrategy, PositionMapper};
use crate::settings::Settings;
use log::{info, warn};
use std::time::Duration;

/// One open book: its pages at the active density plus the page-flip state.
///
/// Density changes build a complete new `Book` first and only then swap it
/// in, so a failed re-chunk leaves the session exactly as it was.
pub struct ReaderSession {
    book_id: String,
    book: Book,
    pager: PaginationMachine,
    density: Density,
    mapper: PositionMapper,
}

impl ReaderSession {
    pub fn open(
        book_id: impl Into<String>,
        chapters: Vec<Chapter>,
        density: Density,
        bulk_load: bool,
    ) -> Result<Self> {
        let settings = Settings {
            density,
            bulk_load,
            ..Settings::default()
        };
        Self::with_settings(book_id, chapters, &settings)
    }

    pub fn with_settings(
        book_id: impl Into<String>,
        chapters: Vec<Chapter>,
        settings: &Settings,
    ) -> Result<Self> {
        let book_id = book_id.into();
        let size = settings.density.initial_chunk_size(settings.bulk_load);
        let book = Book::build(chapters, size)?;
        info!(
            "Opened {book_id} at {} ({size} chars): {} pages",
            settings.density,
            book.pages().len()
        );
        let pager = PaginationMachine::new(book.pages().len(), 0).with_timing(
            settings.swipe_threshold,
            Duration::from_millis(settings.transition_ms),
        );
        Ok(Self {
            book_id,
            book,
            pager,
            density: settings.density,
            mapper: PositionMapper::new(settings.snippet),
        })
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn density(&self) -> Density {
        self.density
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn pages(&self) -> &[Page] {
        self.book.pages()
    }

    pub fn chapter_index(&self) -> &ChapterIndex {
        self.book.chapter_index()
    }

    pub fn pager(&self) -> &PaginationMachine {
        &self.pager
    }

    pub fn pager_mut(&mut self) -> &mut PaginationMachine {
        &mut self.pager
    }

    pub fn current_index(&self) -> usize {
        self.pager.current_index()
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.book.page(self.pager.current_index())
    }

    /// "Chapter 3 of 12" for the current page, if it belongs to an indexed
    /// chapter.
    pub fn position_label(&self) -> Option<String> {
        self.book
            .chapter_index()
            .position_label(self.pager.current_index())
    }

    /// Parses a density key and reflows to it.
    ///
    /// An unknown key is rejected with `InvalidDensity` before anything is
    /// touched.
    pub fn set_density(&mut self, key: &str) -> Result<MatchStrategy> {
        let density: Density = key.parse()?;
        self.apply_density(density)
    }

    pub fn apply_density(&mut self, density: Density) -> Result<MatchStrategy> {
        // The position being preserved is where the reader lands, not where
        // an animation started.
        self.pager.finish_transition();
        let current = self.pager.current_index();

        let (book, new_index, strategy) =
            self.book
                .rechunk(current, density.max_chunk_size(), &self.mapper)?;

        info!(
            "Density {} -> {density}: page {current} -> {new_index} ({strategy:?})",
            self.density
        );
        self.book = book;
        self.density = density;
        self.pager.replace_pages(self.book.pages().len(), new_index);
        Ok(strategy)
    }

    /// Moves to the bookmarked position for this book, mapping it across
    /// chunk sizes when it was recorded at a different one. Returns the page
    /// landed on, or `None` without a bookmark.
    pub fn restore(&mut self, bookmarks: &Bookmarks) -> Option<usize> {
        let mark = bookmarks.get_bookmark(&self.book_id)?;
        let recorded_size = mark.recorded_chunk_size();

        let index = if recorded_size == self.book.max_chunk_size() {
            mark.page_index
        } else {
            match Chunker::new(recorded_size).chunk(self.book.chapters()) {
                Ok(old) => {
                    self.mapper
                        .map_position(&old.pages, mark.page_index, self.book.pages())
                        .0
                }
                Err(e) => {
                    warn!("Could not rebuild bookmarked pages for {}: {e}", self.book_id);
                    return None;
                }
            }
        };

        self.pager.replace_pages(self.book.pages().len(), index);
        Some(self.pager.current_index())
    }

    pub fn record_position(&self, bookmarks: &mut Bookmarks) {
        bookmarks.update_bookmark(
            &self.book_id,
            self.pager.current_index(),
            self.density,
            self.book.max_chunk_size(),
            self.book.pages().len(),
        );
    }
}

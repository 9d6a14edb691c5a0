// Export modules for use in tests and the CLI
pub mod book;
pub mod bookmark;
pub mod chapter_classifier;
pub mod chapter_index;
pub mod chunker;
pub mod content_source;
pub mod density;
pub mod error;
pub mod pagination;
pub mod parsing;
pub mod reflow;
pub mod session;
pub mod settings;

pub use book::{Book, Chapter, load_chapters, prepare_chapters};
pub use chapter_index::{ChapterEntry, ChapterIndex};
pub use chunker::{ChunkOutput, Chunker, Page, chunk};
pub use content_source::{ContentSource, SourceChapter};
pub use density::Density;
pub use error::{NavRejection, PagerError};
pub use pagination::{NavOutcome, PaginationCursor, PaginationMachine, PaginationState};
pub use reflow::{MatchStrategy, PositionMapper, Remapped, SnippetConfig, remap};
pub use session::ReaderSession;

//! Error types shared by the chunking pipeline and the reader glue.

/// Errors surfaced by the chunking and density-selection operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PagerError {
    /// Every chapter normalized to empty text; nothing can be paged.
    #[error("no extractable content: every chapter normalized to empty text")]
    NoExtractableContent,

    /// The density key is not one of `less`, `medium` or `more`.
    #[error("unrecognized density `{0}` (expected less, medium or more)")]
    InvalidDensity(String),

    /// A chapter's markup could not be read into a tree.
    #[error("failed to parse chapter markup: {0}")]
    Parse(String),
}

/// Why a navigation request was turned into a no-op.
///
/// These never escape as `Err`: the pagination machine reports them through
/// [`crate::pagination::NavOutcome::Ignored`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NavRejection {
    #[error("requested page is out of range")]
    OutOfRangePage,
    #[error("a page transition is already in progress")]
    TransitionInProgress,
}

pub type Result<T> = std::result::Result<T, PagerError>;

use crate::error::PagerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chunk size used when a whole book is paged on first open.
pub const BULK_LOAD_CHUNK_SIZE: usize = 400;

/// Named page-size presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    /// Short pages.
    Less,
    #[default]
    Medium,
    /// Long pages.
    More,
}

impl Density {
    pub const ALL: [Density; 3] = [Density::Less, Density::Medium, Density::More];

    pub fn max_chunk_size(self) -> usize {
        match self {
            Density::Less => 300,
            Density::Medium => 500,
            Density::More => 800,
        }
    }

    /// Size for the first chunking of a book; bulk loads of the default
    /// density use a slightly smaller page.
    pub fn initial_chunk_size(self, bulk_load: bool) -> usize {
        match self {
            Density::Medium if bulk_load => BULK_LOAD_CHUNK_SIZE,
            _ => self.max_chunk_size(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Density::Less => "less",
            Density::Medium => "medium",
            Density::More => "more",
        }
    }
}

impl fmt::Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Density {
    type Err = PagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "less" => Ok(Density::Less),
            "medium" => Ok(Density::Medium),
            "more" => Ok(Density::More),
            _ => Err(PagerError::InvalidDensity(s.to_string())),
        }
    }
}

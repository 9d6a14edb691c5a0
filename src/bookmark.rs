use crate::density::Density;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Last reading position in one book.
///
/// The page index only makes sense at the density it was recorded with;
/// restoring at another density goes through the position mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub page_index: usize,
    pub density: Density,
    /// Chunk size the pages were built with, when it differs from the
    /// density's own (bulk loads).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub total_pages: usize,
    pub last_read: chrono::DateTime<chrono::Utc>,
}

impl Bookmark {
    /// The chunk size `page_index` refers to.
    pub fn recorded_chunk_size(&self) -> usize {
        self.chunk_size
            .unwrap_or_else(|| self.density.max_chunk_size())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Bookmarks {
    books: HashMap<String, Bookmark>,
    #[serde(skip)]
    file_path: Option<PathBuf>,
}

/// Stable key for a book: the md5 of its bytes, in hex.
pub fn book_identifier(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

impl Bookmarks {
    pub fn ephemeral() -> Self {
        Self {
            books: HashMap::new(),
            file_path: None,
        }
    }

    pub fn with_file(file_path: &Path) -> Self {
        Self {
            books: HashMap::new(),
            file_path: Some(file_path.to_path_buf()),
        }
    }

    pub fn load_or_ephemeral(file_path: Option<&Path>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load bookmarks from {path:?}: {e}");
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &Path) -> anyhow::Result<Self> {
        if file_path.exists() {
            let content = fs::read_to_string(file_path)?;
            let mut bookmarks: Self = serde_json::from_str(&content)?;
            bookmarks.file_path = Some(file_path.to_path_buf());
            Ok(bookmarks)
        } else {
            Ok(Self::with_file(file_path))
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get_bookmark(&self, book_id: &str) -> Option<&Bookmark> {
        self.books.get(book_id)
    }

    pub fn get_most_recent(&self) -> Option<(String, &Bookmark)> {
        self.books
            .iter()
            .max_by_key(|(_, bookmark)| bookmark.last_read)
            .map(|(id, bookmark)| (id.clone(), bookmark))
    }

    /// Records a position and writes the store through, if it has a file.
    pub fn update_bookmark(
        &mut self,
        book_id: &str,
        page_index: usize,
        density: Density,
        chunk_size: usize,
        total_pages: usize,
    ) {
        self.books.insert(
            book_id.to_string(),
            Bookmark {
                page_index,
                density,
                chunk_size: (chunk_size != density.max_chunk_size()).then_some(chunk_size),
                total_pages,
                last_read: chrono::Utc::now(),
            },
        );
        if self.file_path.is_some() {
            if let Err(e) = self.save() {
                log::error!("Failed to save bookmark: {e}");
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bookmark)> {
        self.books.iter()
    }
}

use serde::Serialize;

/// Page range of one content chapter within a chunking run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterEntry {
    pub display_title: String,
    pub start_page_index: usize,
    /// Inclusive.
    pub end_page_index: usize,
    pub chapter_number: Option<u32>,
}

impl ChapterEntry {
    pub fn contains(&self, page_index: usize) -> bool {
        (self.start_page_index..=self.end_page_index).contains(&page_index)
    }

    pub fn page_count(&self) -> usize {
        self.end_page_index - self.start_page_index + 1
    }
}

/// Derived chapter metadata, rebuilt with every chunking run.
///
/// `total_chapters` is the highest chapter number seen, not the entry count:
/// numbers parsed from identifiers can be sparse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChapterIndex {
    pub entries: Vec<ChapterEntry>,
    pub total_chapters: usize,
}

impl ChapterIndex {
    pub fn from_entries(entries: Vec<ChapterEntry>) -> Self {
        let total_chapters = entries
            .iter()
            .filter_map(|entry| entry.chapter_number)
            .max()
            .map(|n| n as usize)
            .unwrap_or(entries.len());
        Self {
            entries,
            total_chapters,
        }
    }

    pub fn entry_for_page(&self, page_index: usize) -> Option<&ChapterEntry> {
        self.entries.iter().find(|entry| entry.contains(page_index))
    }

    /// "Chapter 3 of 12" style label for the chapter holding `page_index`.
    pub fn position_label(&self, page_index: usize) -> Option<String> {
        let entry = self.entry_for_page(page_index)?;
        let number = entry.chapter_number?;
        Some(format!("Chapter {number} of {}", self.total_chapters))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(start: usize, end: usize, number: Option<u32>) -> ChapterEntry {
        ChapterEntry {
            display_title: format!("Entry {start}"),
            start_page_index: start,
            end_page_index: end,
            chapter_number: number,
        }
    }

    #[test]
    fn test_total_chapters_is_max_number_not_count() {
        let index = ChapterIndex::from_entries(vec![
            entry(0, 1, Some(3)),
            entry(2, 2, Some(5)),
            entry(3, 6, Some(7)),
        ]);
        assert_eq!(index.total_chapters, 7);
    }

    #[test]
    fn test_total_chapters_falls_back_to_entry_count() {
        let index = ChapterIndex::from_entries(vec![entry(0, 0, None), entry(1, 2, None)]);
        assert_eq!(index.total_chapters, 2);
        assert_eq!(ChapterIndex::from_entries(Vec::new()).total_chapters, 0);
    }

    #[test]
    fn test_entry_lookup_and_label() {
        let index = ChapterIndex::from_entries(vec![entry(1, 3, Some(1)), entry(4, 4, Some(2))]);
        assert_eq!(index.entry_for_page(0), None);
        assert_eq!(index.entry_for_page(3).map(|e| e.chapter_number), Some(Some(1)));
        assert_eq!(index.position_label(4).as_deref(), Some("Chapter 2 of 2"));
        assert_eq!(index.entries[0].page_count(), 3);
    }
}

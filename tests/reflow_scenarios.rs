use bookpager::{Chapter, Density, MatchStrategy, PositionMapper, chunk, remap};

/// Three chapters of distinct, numbered sentences grouped into paragraphs.
fn novel() -> Vec<Chapter> {
    (0..3)
        .map(|c| {
            let content = (0..8)
                .map(|p| {
                    let sentences: Vec<String> = (0..6)
                        .map(|s| {
                            format!("Sentence {s} of paragraph {p} in chapter {c} describes the harbor at dawn.")
                        })
                        .collect();
                    format!("<p>{}</p>", sentences.join(" "))
                })
                .collect();
            Chapter {
                title: Some(format!("Harbor {}", c + 1)),
                content,
                is_metadata: false,
                chapter_number: Some(c as u32 + 1),
                source_index: c,
            }
        })
        .collect()
}

#[test]
fn test_medium_to_less_lands_on_anchored_text() {
    let chapters = novel();
    let medium = chunk(&chapters, Density::Medium.max_chunk_size()).unwrap();
    let old_index = medium.pages.len() / 2;
    let snippet = PositionMapper::default()
        .page_anchor(&medium.pages[old_index])
        .unwrap();

    let less = remap(
        &chapters,
        &medium.pages,
        old_index,
        Density::Less.max_chunk_size(),
    )
    .unwrap();

    assert_eq!(less.strategy, MatchStrategy::ExactText);
    assert!(less.pages.len() > medium.pages.len());
    assert!(
        less.pages[less.new_index].plain_text().contains(&snippet),
        "page {} does not contain {snippet:?}",
        less.new_index
    );
}

/// One chapter of six single-sentence paragraphs of about 150 characters.
fn short_paragraphs() -> Vec<Chapter> {
    let content = (0..6)
        .map(|p| {
            let words = format!(
                "Paragraph {p} follows the keeper up the lighthouse stairs, {}",
                "one more step ".repeat(10)
            );
            let sentence: String = words.chars().take(149).collect();
            format!("<p>{}.</p>", sentence.trim_end())
        })
        .collect();
    vec![Chapter {
        title: Some("Light".to_string()),
        content,
        is_metadata: false,
        chapter_number: Some(1),
        source_index: 0,
    }]
}

#[test]
fn test_page_opening_with_short_paragraph_keeps_exact_anchor() {
    let chapters = short_paragraphs();
    let wide = chunk(&chapters, 500).unwrap().pages;
    assert_eq!(wide.len(), 2);
    assert!(wide[1].plain_text().starts_with("Paragraph 3"));

    let narrow = remap(&chapters, &wide, 1, 300).unwrap();
    assert_eq!(narrow.strategy, MatchStrategy::ExactText);
    assert!(narrow.pages[narrow.new_index].plain_text().starts_with("Paragraph 2"));
    assert!(narrow.pages[narrow.new_index].plain_text().contains("Paragraph 3"));
    assert_eq!(narrow.new_index, 1);
}

#[test]
fn test_same_size_remap_is_stable() {
    let chapters = novel();
    let pages = chunk(&chapters, 500).unwrap().pages;
    for index in 0..pages.len() {
        let remapped = remap(&chapters, &pages, index, 500).unwrap();
        assert_eq!(remapped.new_index, index, "page {index} moved");
        assert_eq!(remapped.pages, pages);
    }
}

#[test]
fn test_round_trip_through_another_density_returns_home() {
    let chapters = novel();
    let more = chunk(&chapters, Density::More.max_chunk_size()).unwrap().pages;
    for index in 0..more.len() {
        let less = remap(&chapters, &more, index, Density::Less.max_chunk_size()).unwrap();
        let back = remap(
            &chapters,
            &less.pages,
            less.new_index,
            Density::More.max_chunk_size(),
        )
        .unwrap();
        assert_eq!(back.new_index, index, "page {index} drifted");
    }
}

#[test]
fn test_remapped_page_stays_in_same_chapter() {
    let chapters = novel();
    let less = chunk(&chapters, 300).unwrap().pages;
    for (index, page) in less.iter().enumerate() {
        let more = remap(&chapters, &less, index, 800).unwrap();
        assert_eq!(
            more.pages[more.new_index].source_chapter_index,
            page.source_chapter_index
        );
    }
}

#[test]
fn test_chapter_index_is_rebuilt_with_pages() {
    let chapters = novel();
    let medium = chunk(&chapters, 500).unwrap();
    let less = remap(&chapters, &medium.pages, 0, 300).unwrap();

    assert_eq!(less.chapter_index.entries.len(), 3);
    assert_eq!(
        less.chapter_index.entries.last().unwrap().end_page_index,
        less.pages.len() - 1
    );
    assert_ne!(less.chapter_index, medium.chapter_index);
}

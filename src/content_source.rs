//! Content sources: where chapter markup comes from.
//!
//! Container parsing stays inside the `epub` crate; this module only walks the
//! spine in reading order and hands each document's markup to the pipeline.

use anyhow::{Context, Result};
use epub::doc::{EpubDoc, NavPoint};
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::io::BufReader;
use std::path::Path;

/// One chapter as delivered by a content source, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceChapter {
    /// Label from the source's navigation, if any.
    pub label: Option<String>,
    pub identifier: String,
    pub path: String,
    pub markup: String,
}

/// Supplies the ordered chapter list of one document.
pub trait ContentSource {
    fn chapters(&mut self) -> Result<Vec<SourceChapter>>;
}

impl ContentSource for Vec<SourceChapter> {
    fn chapters(&mut self) -> Result<Vec<SourceChapter>> {
        Ok(self.clone())
    }
}

pub struct EpubSource {
    doc: EpubDoc<BufReader<fs::File>>,
    path: String,
}

impl EpubSource {
    pub fn open(path: &str) -> Result<Self> {
        info!("Opening EPUB: {path}");
        let doc = EpubDoc::new(path).with_context(|| format!("Failed to open EPUB at {path}"))?;
        Ok(Self {
            doc,
            path: path.to_string(),
        })
    }

    pub fn title(&self) -> Option<String> {
        self.doc.mdata("title").map(|item| item.value.clone())
    }

    /// Flattens the navigation tree into resource path → label.
    fn toc_labels(&self) -> HashMap<String, String> {
        fn walk(points: &[NavPoint], labels: &mut HashMap<String, String>) {
            for point in points {
                let content = point.content.to_string_lossy();
                let path = strip_fragment(&content).to_string();
                labels.entry(path).or_insert_with(|| point.label.trim().to_string());
                walk(&point.children, labels);
            }
        }
        let mut labels = HashMap::new();
        walk(&self.doc.toc, &mut labels);
        labels
    }
}

impl ContentSource for EpubSource {
    fn chapters(&mut self) -> Result<Vec<SourceChapter>> {
        let labels = self.toc_labels();
        let spine: Vec<String> = self.doc.spine.iter().map(|item| item.idref.clone()).collect();
        let mut chapters = Vec::with_capacity(spine.len());

        for (index, idref) in spine.iter().enumerate() {
            if !self.doc.set_current_chapter(index) {
                warn!("{}: spine item {index} ({idref}) is not reachable", self.path);
                continue;
            }
            let Some((markup, _mime)) = self.doc.get_current_str() else {
                warn!("{}: no content for spine item {index} ({idref})", self.path);
                continue;
            };
            let resource_path = self
                .doc
                .resources
                .get(idref)
                .map(|resource| resource.path.to_string_lossy().to_string())
                .unwrap_or_default();

            chapters.push(SourceChapter {
                label: find_label(&labels, &resource_path),
                identifier: idref.clone(),
                path: resource_path,
                markup,
            });
        }

        info!("{}: {} spine documents read", self.path, chapters.len());
        Ok(chapters)
    }
}

/// A standalone HTML/XHTML file read as a single chapter.
pub struct HtmlFileSource {
    path: String,
}

impl HtmlFileSource {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }
}

impl ContentSource for HtmlFileSource {
    fn chapters(&mut self) -> Result<Vec<SourceChapter>> {
        let markup = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read HTML file {}", self.path))?;
        let identifier = Path::new(&self.path)
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Ok(vec![SourceChapter {
            label: None,
            identifier,
            path: self.path.clone(),
            markup,
        }])
    }
}

pub fn is_html_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "html" | "htm" | "xhtml"))
        .unwrap_or(false)
}

/// Opens the right source for a path based on its extension.
pub fn open_source(path: &str) -> Result<Box<dyn ContentSource>> {
    if is_html_path(path) {
        Ok(Box::new(HtmlFileSource::new(path)))
    } else {
        Ok(Box::new(EpubSource::open(path)?))
    }
}

fn strip_fragment(href: &str) -> &str {
    href.split('#').next().unwrap_or(href)
}

fn find_label(labels: &HashMap<String, String>, resource_path: &str) -> Option<String> {
    if let Some(label) = labels.get(resource_path) {
        return Some(label.clone());
    }
    // Navigation paths may be relative to a different base than the manifest.
    let file_name = Path::new(resource_path).file_name()?;
    labels
        .iter()
        .find(|(path, _)| Path::new(path).file_name() == Some(file_name))
        .map(|(_, label)| label.clone())
}

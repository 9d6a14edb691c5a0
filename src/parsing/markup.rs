//! Helpers over the restricted page markup.
//!
//! Page markup only ever uses `p, br, h1..h6, em, strong, span, a, div`, with
//! `style`/`class` kept on paragraph-level tags and spans, and `href` kept on
//! links. Everything the chunker and the reflow mapper measure is the
//! *de-tagged* text produced by [`plain_text`].

use crate::error::{PagerError, Result};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Failed to compile tag regex"));
static BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("Failed to compile line break regex"));
static BLOCK_BOUNDARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:p|div|h[1-6])(?:\s[^>]*)?>").expect("Failed to compile block boundary regex")
});
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z][a-zA-Z0-9]*);")
        .expect("Failed to compile entity regex")
});
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"));

/// Parses an HTML/XHTML string into an rcdom tree.
pub fn parse_html(markup: &str) -> Result<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut markup.as_bytes())
        .map_err(|e| PagerError::Parse(e.to_string()))
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Collapses every whitespace run to a single space. Edges are kept.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").into_owned()
}

/// Decodes numeric and common named entities in a single pass.
///
/// Unknown named entities are left untouched.
pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| match decode_entity(&caps[1]) {
            Some(decoded) => decoded,
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    if let Some(dec) = entity.strip_prefix('#') {
        return dec
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    let decoded = match entity {
        "nbsp" => " ",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "ldquo" => "\u{201C}",
        "rdquo" => "\u{201D}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        _ => return None,
    };
    Some(decoded.to_string())
}

/// De-tags markup: line breaks become spaces, every other tag disappears,
/// entities are decoded and whitespace is collapsed and trimmed.
///
/// Block boundaries contribute nothing: this is the text page sizes are
/// measured on. Use [`display_text`] for anything a reader sees.
pub fn plain_text(markup: &str) -> String {
    let spaced = BREAK_RE.replace_all(markup, " ");
    let stripped = TAG_RE.replace_all(&spaced, "");
    let decoded = decode_entities(&stripped);
    collapse_whitespace(&decoded).trim().to_string()
}

/// Like [`plain_text`], but block boundaries read as a single space so
/// adjacent paragraphs do not run together.
pub fn display_text(markup: &str) -> String {
    plain_text(&BLOCK_BOUNDARY_RE.replace_all(markup, " "))
}

/// Length in characters, the unit every size bound is expressed in.
pub fn text_len(text: &str) -> usize {
    text.chars().count()
}

pub fn is_heading_tag(tag: &str) -> bool {
    matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Paragraph-level tags: text lives directly inside them.
pub fn is_paragraph_tag(tag: &str) -> bool {
    tag == "p" || is_heading_tag(tag)
}

pub fn is_block_tag(tag: &str) -> bool {
    tag == "div" || is_paragraph_tag(tag)
}

/// Whether `attr` survives on `tag` in page markup.
pub fn is_kept_attribute(tag: &str, attr: &str) -> bool {
    match attr {
        "href" => tag == "a",
        "style" | "class" => tag == "div" || tag == "span" || is_paragraph_tag(tag),
        _ => false,
    }
}

pub fn kept_attributes(tag: &str, attrs: &[html5ever::Attribute]) -> Vec<(String, String)> {
    attrs
        .iter()
        .filter(|attr| is_kept_attribute(tag, attr.name.local.as_ref()))
        .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
        .collect()
}

pub fn open_tag(tag: &str, attrs: &[(String, String)]) -> String {
    let mut out = String::with_capacity(tag.len() + 2);
    out.push('<');
    out.push_str(tag);
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
    out
}

/// Writes an rcdom subtree back out as page markup.
///
/// Input is expected to already be within the page vocabulary; attributes
/// outside the kept set are dropped on the way out.
pub fn serialize_node(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.as_ref();
            out.push_str(&open_tag(tag, &kept_attributes(tag, &attrs.borrow())));
            if tag == "br" {
                return;
            }
            for child in node.children.borrow().iter() {
                serialize_node(child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeData::Text { contents } => out.push_str(&escape_text(&contents.borrow())),
        _ => {
            for child in node.children.borrow().iter() {
                serialize_node(child, out);
            }
        }
    }
}

pub fn find_element(node: &Handle, tag: &str) -> Option<Handle> {
    if let NodeData::Element { name, .. } = &node.data {
        if name.local.as_ref() == tag {
            return Some(node.clone());
        }
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}

fn has_block_descendant(node: &Handle) -> bool {
    node.children.borrow().iter().any(|child| match &child.data {
        NodeData::Element { name, .. } => {
            is_block_tag(name.local.as_ref()) || has_block_descendant(child)
        }
        _ => false,
    })
}

/// One top-level block of a chapter, as the chunker packs it.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupBlock {
    pub tag: String,
    /// Opening tag with its kept attributes, reused when the block is split.
    pub open_tag: String,
    pub markup: String,
    /// De-tagged text.
    pub text: String,
}

impl MarkupBlock {
    fn from_markup(tag: &str, open_tag: String, markup: String) -> Self {
        let text = plain_text(&markup);
        Self {
            tag: tag.to_string(),
            open_tag,
            markup,
            text,
        }
    }

    /// Wraps plain text in `open_tag ... </tag>`.
    pub fn from_text(tag: &str, open_tag: &str, text: &str) -> Self {
        Self {
            tag: tag.to_string(),
            open_tag: open_tag.to_string(),
            markup: format!("{open_tag}{}</{tag}>", escape_text(text)),
            text: text.to_string(),
        }
    }

    pub fn text_len(&self) -> usize {
        text_len(&self.text)
    }
}

/// Flattens chapter markup into its ordered top-level blocks.
///
/// Paragraphs, headings and block-wrappers without block children are
/// blocks; every other element holding blocks is descended into. Loose
/// inline runs between blocks become synthetic paragraphs. If nothing
/// block-shaped is found, the whole de-tagged content becomes one paragraph.
pub fn flatten_blocks(markup: &str) -> Result<Vec<MarkupBlock>> {
    let dom = parse_html(markup)?;
    let mut blocks = Vec::new();
    if let Some(body) = find_element(&dom.document, "body") {
        let mut pending = String::new();
        collect_blocks(&body, &mut blocks, &mut pending);
        flush_inline(&mut pending, &mut blocks);
    }

    if blocks.is_empty() {
        let text = plain_text(markup);
        if !text.is_empty() {
            blocks.push(MarkupBlock::from_text("p", "<p>", &text));
        }
    }
    Ok(blocks)
}

fn collect_blocks(node: &Handle, blocks: &mut Vec<MarkupBlock>, pending: &mut String) {
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => pending.push_str(&escape_text(&contents.borrow())),
            NodeData::Element { name, attrs, .. } => {
                let tag = name.local.as_ref();
                let nested_blocks = has_block_descendant(child);
                if is_paragraph_tag(tag) || (tag == "div" && !nested_blocks) {
                    flush_inline(pending, blocks);
                    let open = open_tag(tag, &kept_attributes(tag, &attrs.borrow()));
                    let mut markup = String::new();
                    serialize_node(child, &mut markup);
                    let block = MarkupBlock::from_markup(tag, open, markup);
                    if !block.text.is_empty() {
                        blocks.push(block);
                    }
                } else if nested_blocks {
                    flush_inline(pending, blocks);
                    collect_blocks(child, blocks, pending);
                    flush_inline(pending, blocks);
                } else {
                    serialize_node(child, pending);
                }
            }
            _ => {}
        }
    }
}

fn flush_inline(pending: &mut String, blocks: &mut Vec<MarkupBlock>) {
    if pending.is_empty() {
        return;
    }
    let inner = std::mem::take(pending);
    let inner = inner.trim();
    if !plain_text(inner).is_empty() {
        blocks.push(MarkupBlock::from_markup(
            "p",
            "<p>".to_string(),
            format!("<p>{inner}</p>"),
        ));
    }
}

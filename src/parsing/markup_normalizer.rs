use crate::error::Result;
use crate::parsing::markup::{
    collapse_whitespace, escape_text, kept_attributes, open_tag, parse_html, plain_text,
};
use markup5ever_rcdom::{Handle, NodeData};

/// Reduces a chapter's source tree to page markup.
///
/// The output uses only `p, br, h1..h6, em, strong, span, a, div`, and every
/// piece of text ends up inside a paragraph-level tag.
///
/// # Rules
///
/// - `script`, `style`, `nav`, `header`, `footer` and `head` are dropped with
///   their descendants.
/// - `p` and headings are kept iff their content is non-empty after trimming.
/// - `div` is kept as a block-wrapper; loose text and inline children inside
///   it are resegmented into synthetic paragraphs, split at line breaks and
///   at nested block boundaries.
/// - `b`/`i` become `strong`/`em`; list items, table cells, captions and
///   `pre` become paragraphs.
/// - `section`, `article`, `main` and any other unknown container are
///   transparent.
///
/// # Usage
///
/// ```rust,no_run
/// use bookpager::parsing::markup_normalizer::MarkupNormalizer;
/// # fn main() -> bookpager::error::Result<()> {
/// let normalizer = MarkupNormalizer::new();
/// let markup = normalizer.normalize_html("<section><p>Hello <b>world</b></p></section>")?;
/// assert_eq!(markup, "<p>Hello <strong>world</strong></p>");
/// # Ok(())
/// # }
/// ```
pub struct MarkupNormalizer;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    Dropped,
    LineBreak,
    /// Emitted as the given paragraph-level tag.
    Paragraph(&'static str),
    Wrapper,
    /// Emitted as the given inline tag.
    Inline(&'static str),
    Transparent,
}

fn element_role(tag: &str) -> Role {
    match tag {
        "script" | "style" | "nav" | "header" | "footer" | "head" | "noscript" | "svg"
        | "math" | "img" => Role::Dropped,
        "br" => Role::LineBreak,
        "p" => Role::Paragraph("p"),
        "h1" => Role::Paragraph("h1"),
        "h2" => Role::Paragraph("h2"),
        "h3" => Role::Paragraph("h3"),
        "h4" => Role::Paragraph("h4"),
        "h5" => Role::Paragraph("h5"),
        "h6" => Role::Paragraph("h6"),
        "li" | "dt" | "dd" | "td" | "th" | "caption" | "figcaption" | "pre" | "blockquote" => {
            Role::Paragraph("p")
        }
        "div" => Role::Wrapper,
        "em" | "i" => Role::Inline("em"),
        "strong" | "b" => Role::Inline("strong"),
        "span" => Role::Inline("span"),
        "a" => Role::Inline("a"),
        _ => Role::Transparent,
    }
}

/// Output of walking one container in block context.
enum Piece {
    Inline(String),
    Break,
    Block(String),
}

impl MarkupNormalizer {
    pub fn new() -> Self {
        MarkupNormalizer
    }

    /// Parses an HTML/XHTML chapter document and normalizes it.
    pub fn normalize_html(&self, html: &str) -> Result<String> {
        let dom = parse_html(html)?;
        Ok(self.normalize(&dom.document))
    }

    /// Normalizes an already-parsed tree rooted at `root`.
    pub fn normalize(&self, root: &Handle) -> String {
        let mut pieces = Vec::new();
        self.visit_flow(root, &mut pieces);
        self.segment(pieces).concat()
    }

    /// Walks children of `node` in block context.
    fn visit_flow(&self, node: &Handle, pieces: &mut Vec<Piece>) {
        for child in node.children.borrow().iter() {
            match &child.data {
                NodeData::Text { contents } => {
                    let text = collapse_whitespace(&contents.borrow());
                    if !text.is_empty() {
                        pieces.push(Piece::Inline(escape_text(&text)));
                    }
                }
                NodeData::Element { name, attrs, .. } => {
                    let tag = name.local.as_ref();
                    match element_role(tag) {
                        Role::Dropped => {}
                        Role::LineBreak => pieces.push(Piece::Break),
                        Role::Paragraph(out_tag) if !self.has_block_descendant(child) => {
                            let inner = self.inline_markup(child);
                            let inner = trim_paragraph(&inner);
                            if !plain_text(inner).is_empty() {
                                let open = open_tag(out_tag, &kept_attributes(out_tag, &attrs.borrow()));
                                pieces.push(Piece::Block(format!("{open}{inner}</{out_tag}>")));
                            }
                        }
                        Role::Wrapper => {
                            let mut inner = Vec::new();
                            self.visit_flow(child, &mut inner);
                            let body = self.segment(inner).concat();
                            if !body.is_empty() {
                                let open = open_tag("div", &kept_attributes("div", &attrs.borrow()));
                                pieces.push(Piece::Block(format!("{open}{body}</div>")));
                            }
                        }
                        Role::Inline(out_tag) if !self.has_block_descendant(child) => {
                            let inner = self.inline_markup(child);
                            if !inner.is_empty() {
                                pieces.push(Piece::Inline(self.wrap_inline(
                                    out_tag,
                                    &attrs.borrow(),
                                    inner,
                                )));
                            }
                        }
                        // Paragraph/inline elements holding blocks, and
                        // every unknown container, only contribute content.
                        _ => self.visit_flow(child, pieces),
                    }
                }
                _ => self.visit_flow(child, pieces),
            }
        }
    }

    /// Groups loose inline runs into synthetic paragraphs.
    fn segment(&self, pieces: Vec<Piece>) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut run = String::new();
        for piece in pieces {
            match piece {
                Piece::Inline(markup) => run.push_str(&markup),
                Piece::Break => push_synthetic_paragraph(&mut run, &mut blocks),
                Piece::Block(markup) => {
                    push_synthetic_paragraph(&mut run, &mut blocks);
                    blocks.push(markup);
                }
            }
        }
        push_synthetic_paragraph(&mut run, &mut blocks);
        blocks
    }

    /// Normalizes the content of `node` in inline context.
    fn inline_markup(&self, node: &Handle) -> String {
        let mut out = String::new();
        for child in node.children.borrow().iter() {
            match &child.data {
                NodeData::Text { contents } => {
                    out.push_str(&escape_text(&collapse_whitespace(&contents.borrow())));
                }
                NodeData::Element { name, attrs, .. } => {
                    let tag = name.local.as_ref();
                    match element_role(tag) {
                        Role::Dropped => {}
                        Role::LineBreak => out.push_str("<br>"),
                        Role::Inline(out_tag) => {
                            let inner = self.inline_markup(child);
                            if !inner.is_empty() {
                                out.push_str(&self.wrap_inline(out_tag, &attrs.borrow(), inner));
                            }
                        }
                        Role::Paragraph(_) | Role::Wrapper => {
                            push_separated(&mut out, &self.inline_markup(child));
                        }
                        Role::Transparent => out.push_str(&self.inline_markup(child)),
                    }
                }
                _ => out.push_str(&self.inline_markup(child)),
            }
        }
        out
    }

    /// Wraps inline content in its tag, or passes whitespace-only content
    /// through bare so word separation survives.
    fn wrap_inline(&self, tag: &str, attrs: &[html5ever::Attribute], inner: String) -> String {
        if plain_text(&inner).is_empty() {
            return if inner.trim().is_empty() && !inner.is_empty() {
                " ".to_string()
            } else {
                inner
            };
        }
        // Edge whitespace moves outside the tag so paragraph trimming sees it.
        let lead = if inner.starts_with(char::is_whitespace) { " " } else { "" };
        let trail = if inner.ends_with(char::is_whitespace) { " " } else { "" };
        let open = open_tag(tag, &kept_attributes(tag, attrs));
        format!("{lead}{open}{}</{tag}>{trail}", inner.trim())
    }

    fn has_block_descendant(&self, node: &Handle) -> bool {
        node.children.borrow().iter().any(|child| match &child.data {
            NodeData::Element { name, .. } => match element_role(name.local.as_ref()) {
                Role::Paragraph(_) | Role::Wrapper => true,
                Role::Dropped => false,
                _ => self.has_block_descendant(child),
            },
            _ => false,
        })
    }
}

impl Default for MarkupNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn push_synthetic_paragraph(run: &mut String, blocks: &mut Vec<String>) {
    if run.is_empty() {
        return;
    }
    let content = std::mem::take(run);
    let content = trim_paragraph(&content);
    if !plain_text(content).is_empty() {
        blocks.push(format!("<p>{content}</p>"));
    }
}

/// Trims whitespace and dangling line breaks off both ends.
fn trim_paragraph(markup: &str) -> &str {
    let mut trimmed = markup.trim();
    loop {
        let before = trimmed.len();
        trimmed = trimmed.strip_prefix("<br>").unwrap_or(trimmed);
        trimmed = trimmed.strip_suffix("<br>").unwrap_or(trimmed).trim();
        if trimmed.len() == before {
            return trimmed;
        }
    }
}

fn push_separated(out: &mut String, inner: &str) {
    let inner = inner.trim();
    if inner.is_empty() {
        return;
    }
    if !out.is_empty() && !out.ends_with(' ') {
        out.push(' ');
    }
    out.push_str(inner);
    out.push(' ');
}

//! Block layout for the raster backend

use crate::Viewport;
use scraper::{Html, Selector};

/// Width and height of one glyph cell at scale 1.
pub const CELL: u32 = 8;

const PAGE_MARGIN: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxModel {
    pub margin: u32,
    pub border: u32,
    pub padding: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub rect: Rect,
    pub box_model: BoxModel,
}

impl LayoutBox {
    pub fn content_width(&self) -> u32 {
        let total = self.box_model.margin + self.box_model.border + self.box_model.padding;
        self.rect.width.saturating_sub(total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Title,
    Heading,
    Paragraph,
    ListItem,
    Preformatted,
}

impl ElementType {
    fn scale(self) -> u32 {
        match self {
            ElementType::Title => 2,
            _ => 1,
        }
    }

    fn padding(self) -> u32 {
        match self {
            ElementType::Title => 8,
            ElementType::Heading => 6,
            ElementType::ListItem => 2,
            _ => 4,
        }
    }

    fn indent(self) -> u32 {
        match self {
            ElementType::ListItem => 2 * CELL,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub lb: LayoutBox,
    pub text: String,
    pub elem_type: ElementType,
    pub scale: u32,
}

/// Greedy word wrap; words longer than a line are split.
pub fn wrap_text(text: &str, chars_per_line: usize) -> Vec<String> {
    let chars_per_line = chars_per_line.max(1);
    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > chars_per_line {
            if !cur.is_empty() {
                lines.push(std::mem::take(&mut cur));
            }
            let rest = word.split_off(chars_per_line);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let cur_len = cur.chars().count();
        if !cur.is_empty() && cur_len + word.len() + 1 > chars_per_line {
            lines.push(std::mem::take(&mut cur));
        }
        if !cur.is_empty() {
            cur.push(' ');
        }
        cur.extend(word);
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}

fn classify(tag: &str) -> Option<ElementType> {
    match tag {
        "h2" | "h3" | "h4" | "h5" | "h6" => Some(ElementType::Heading),
        "p" | "td" | "th" | "blockquote" | "dd" | "dt" => Some(ElementType::Paragraph),
        "li" => Some(ElementType::ListItem),
        "pre" => Some(ElementType::Preformatted),
        _ => None,
    }
}

/// Compute a vertical block layout for `document` within `viewport`.
///
/// The first `<h1>` (or `<title>`) becomes a scale-2 title box; headings,
/// paragraphs, list items, table cells and `<pre>` blocks follow in document
/// order. Layout stops once the viewport is full.
pub fn layout_document(document: &Html, viewport: Viewport) -> Vec<LayoutNode> {
    let mut y = PAGE_MARGIN;
    let page_width = viewport.width;
    let mut nodes = Vec::new();

    // Title: prefer <h1> then <title>
    let title_text = first_text(document, "h1")
        .filter(|t| !t.trim().is_empty())
        .or_else(|| first_text(document, "title"))
        .unwrap_or_default();

    if !title_text.trim().is_empty() {
        push_block(&mut nodes, &mut y, page_width, ElementType::Title, &title_text);
    }

    let block_sel = match Selector::parse("h2, h3, h4, h5, h6, p, li, pre, td, th, blockquote, dd, dt") {
        Ok(sel) => sel,
        Err(_) => return nodes,
    };
    for el in document.select(&block_sel) {
        if y >= viewport.height {
            break;
        }
        let Some(kind) = classify(el.value().name()) else {
            continue;
        };
        let txt = el.text().collect::<String>();
        if txt.trim().is_empty() {
            continue;
        }
        push_block(&mut nodes, &mut y, page_width, kind, &txt);
    }

    nodes
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .map(|n| n.text().collect::<String>())
}

fn push_block(nodes: &mut Vec<LayoutNode>, y: &mut u32, page_width: u32, kind: ElementType, text: &str) {
    let scale = kind.scale();
    let padding = kind.padding();
    let margin = padding;
    let x = PAGE_MARGIN + kind.indent();
    let width = page_width.saturating_sub(x + PAGE_MARGIN);
    let content_w = width.saturating_sub(padding * 2);
    let chars_per_line = (content_w / (CELL * scale)).max(1) as usize;

    let lines = if kind == ElementType::Preformatted {
        text.lines()
            .flat_map(|l| wrap_text(l, chars_per_line).into_iter().take(1))
            .collect::<Vec<_>>()
    } else {
        wrap_text(text, chars_per_line)
    };
    let lines_count = (lines.len() as u32).max(1);
    let box_h = lines_count * CELL * scale + padding * 2;

    nodes.push(LayoutNode {
        lb: LayoutBox {
            rect: Rect {
                x: x as i32,
                y: *y as i32,
                width,
                height: box_h,
            },
            box_model: BoxModel {
                margin,
                border: 0,
                padding,
            },
        },
        text: lines.join("\n"),
        elem_type: kind,
        scale,
    });
    *y += box_h + margin;
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn layout_document_places_title_and_paragraphs() {
        let html = "<html><head><title>Test Title</title></head><body><h1>Heading</h1><p>Hello world</p><p>More text</p></body></html>";
        let doc = Html::parse_document(html);
        let v = crate::Viewport { width: 200, height: 200 };
        let nodes = layout_document(&doc, v);
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].elem_type, ElementType::Title);
        assert_eq!(nodes[0].text, "Heading");
        assert_eq!(nodes[1].elem_type, ElementType::Paragraph);
        assert!(nodes[1].lb.rect.y > nodes[0].lb.rect.y);
        assert!(nodes[1].lb.content_width() > 0);
    }

    #[test]
    fn falls_back_to_title_and_lists() {
        let html = "<title>Router login</title><ul><li>one</li><li>two</li></ul>";
        let nodes = layout_document(&Html::parse_document(html), crate::Viewport::default());
        assert_eq!(nodes[0].text, "Router login");
        assert_eq!(nodes[1].elem_type, ElementType::ListItem);
        assert!(nodes[1].lb.rect.x > nodes[0].lb.rect.x);
    }

    #[test]
    fn layout_stops_at_viewport_bottom() {
        let html = "<p>x</p>".repeat(500);
        let v = crate::Viewport { width: 100, height: 60 };
        let nodes = layout_document(&Html::parse_document(&html), v);
        assert!(nodes.len() < 10);
    }

    #[test]
    fn wrap_splits_long_words() {
        assert_eq!(wrap_text("hello world", 5), vec!["hello", "world"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("a b c", 80), vec!["a b c"]);
        assert!(wrap_text("   ", 10).is_empty());
    }
}

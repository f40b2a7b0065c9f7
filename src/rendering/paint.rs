//! Paint command list produced from a layout

use super::layout::{ElementType, LayoutNode};
use crate::Viewport;

pub const WHITE: (u8, u8, u8, u8) = (255, 255, 255, 255);
pub const BLACK: (u8, u8, u8, u8) = (0, 0, 0, 255);
const TITLE_BAND: (u8, u8, u8, u8) = (226, 230, 236, 255);
const HEADING_RULE: (u8, u8, u8, u8) = (160, 160, 160, 255);
const PRE_BACKGROUND: (u8, u8, u8, u8) = (244, 244, 244, 255);

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: (u8, u8, u8, u8),
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        scale: u32,
    },
}

/// Turn layout nodes into paint commands, background first.
pub fn paint_layout(nodes: &[LayoutNode], viewport: Viewport) -> Vec<PaintCommand> {
    let mut cmds = vec![PaintCommand::SolidRect {
        x: 0,
        y: 0,
        width: viewport.width,
        height: viewport.height,
        rgba: WHITE,
    }];

    for node in nodes {
        let r = &node.lb.rect;
        match node.elem_type {
            ElementType::Title => cmds.push(PaintCommand::SolidRect {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
                rgba: TITLE_BAND,
            }),
            ElementType::Heading => cmds.push(PaintCommand::SolidRect {
                x: r.x,
                y: r.y + r.height as i32 - 1,
                width: r.width,
                height: 1,
                rgba: HEADING_RULE,
            }),
            ElementType::Preformatted => cmds.push(PaintCommand::SolidRect {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
                rgba: PRE_BACKGROUND,
            }),
            ElementType::ListItem => cmds.push(PaintCommand::SolidRect {
                x: r.x - 10,
                y: r.y + node.lb.box_model.padding as i32 + 2,
                width: 4,
                height: 4,
                rgba: BLACK,
            }),
            ElementType::Paragraph => {}
        }

        let pad = node.lb.box_model.padding as i32;
        cmds.push(PaintCommand::Text {
            x: r.x + pad,
            y: r.y + pad,
            text: node.text.clone(),
            scale: node.scale,
        });
    }

    cmds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::layout::layout_document;
    use scraper::Html;

    #[test]
    fn background_comes_first_and_text_follows_boxes() {
        let doc = Html::parse_document("<h1>Admin</h1><p>Welcome</p>");
        let v = Viewport { width: 320, height: 200 };
        let cmds = paint_layout(&layout_document(&doc, v), v);

        match &cmds[0] {
            PaintCommand::SolidRect { width, height, rgba, .. } => {
                assert_eq!((*width, *height), (320, 200));
                assert_eq!(*rgba, WHITE);
            }
            other => panic!("unexpected first command {:?}", other),
        }
        let texts: Vec<_> = cmds
            .iter()
            .filter_map(|c| match c {
                PaintCommand::Text { text, scale, .. } => Some((text.as_str(), *scale)),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec![("Admin", 2), ("Welcome", 1)]);
    }
}

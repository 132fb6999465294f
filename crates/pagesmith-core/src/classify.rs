//! Structural classifier: assigns each IR node a role.
//!
//! Roles are decided by ordered heuristics where tag semantics always win
//! over DOM shape: content tags never become structural containers even
//! when they have children, and the display/width fallbacks only apply to
//! generic containers whose semantics are ambiguous (plain `div` soup).

use crate::config::ClassifierConfig;
use crate::ir::IrNode;
use crate::style::parse_px;

/// The role a node plays in the output hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Top-level layout band.
    Section,
    /// Layout cell inside a section.
    Column,
    /// Leaf content.
    Widget,
}

/// Tags that always classify as widgets, regardless of children or shape.
const CONTENT_TAGS: &[&str] = &[
    "p", "span", "a", "h1", "h2", "h3", "h4", "h5", "h6", "img", "button", "input", "textarea",
    "select", "label", "strong", "em", "b", "i", "u", "ul", "ol", "li", "blockquote", "pre",
    "code", "figure", "figcaption", "video", "audio", "svg", "iframe", "table", "form",
];

/// Major layout tags that always classify as sections.
const SECTION_TAGS: &[&str] = &["body", "section", "header", "footer", "main", "article", "aside"];

/// Generic containers subject to the shape heuristics.
const CONTAINER_TAGS: &[&str] = &["div", "nav"];

/// Tags whose presence as a child marks the parent as a layout block.
const STRUCTURAL_TAGS: &[&str] = &[
    "div", "nav", "section", "header", "footer", "main", "article", "aside",
];

/// True for tags that always classify as widgets.
#[must_use]
pub fn is_content_tag(tag: &str) -> bool {
    CONTENT_TAGS.contains(&tag)
}

/// True for major layout tags that always classify as sections.
#[must_use]
pub fn is_section_tag(tag: &str) -> bool {
    SECTION_TAGS.contains(&tag)
}

/// Assigns a role to `node` given the role of its classified parent.
///
/// Ordered precedence, first match wins:
/// 1. content tags are widgets, unconditionally;
/// 2. major layout tags are sections;
/// 3. generic containers become columns when the parent is a section, or
///    when their children are majority content tags, contain structural
///    children, the node lays out as flex/grid, or its resolved width
///    exceeds [`ClassifierConfig::container_min_width_px`];
/// 4. everything else is a widget.
#[must_use]
pub fn classify(node: &IrNode, parent: Option<Role>, config: &ClassifierConfig) -> Role {
    let tag = node.tag.as_str();

    if is_content_tag(tag) {
        return Role::Widget;
    }

    if is_section_tag(tag) {
        return Role::Section;
    }

    if CONTAINER_TAGS.contains(&tag) {
        if parent == Some(Role::Section) {
            return Role::Column;
        }
        if looks_like_layout_block(node, config) {
            return Role::Column;
        }
        return Role::Widget;
    }

    Role::Widget
}

fn looks_like_layout_block(node: &IrNode, config: &ClassifierConfig) -> bool {
    if !node.children.is_empty() {
        let content_children = node
            .children
            .iter()
            .filter(|child| is_content_tag(&child.tag))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let ratio = content_children as f32 / node.children.len() as f32;
        if ratio >= config.content_majority_ratio {
            return true;
        }

        if node
            .children
            .iter()
            .any(|child| STRUCTURAL_TAGS.contains(&child.tag.as_str()))
        {
            return true;
        }
    }

    if let Some(display) = node.layout.display.as_deref() {
        let display = display.trim();
        if display.contains("flex") || display.contains("grid") {
            return true;
        }
    }

    if let Some(width) = node.layout.width.as_deref() {
        if let Some(px) = parse_px(width) {
            if px > config.container_min_width_px {
                return true;
            }
        }
    }

    false
}

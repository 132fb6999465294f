//! Intermediate representation of a scraped page.
//!
//! The scraper (an external collaborator) hands over a loosely shaped node
//! tree; any field may be missing. Normalization turns that into a
//! fully-populated [`IrNode`] tree with defaulted layout values so the
//! classifier and widget builder can assume a complete shape. It fails
//! silently — substituting empty defaults rather than raising — because
//! scrape data is inherently partial and no normalization failure should
//! abort the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Page-level scrape payload: document metadata plus the root node.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScrapedPage {
    /// Document title.
    pub title: String,
    /// URL the page was captured from.
    pub url: String,
    /// Document language tag.
    pub lang: String,
    /// Root of the captured node tree.
    pub root: RawNode,
}

/// One raw node as produced by the scraper. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNode {
    /// Element tag name, any casing.
    pub tag_name: String,
    /// Element attributes.
    pub attributes: HashMap<String, String>,
    /// Resolved visual properties at capture time.
    pub layout: StyleSnapshot,
    /// Visible text content.
    pub text_content: String,
    /// Serialized inner markup, when the scraper captured it.
    pub inner_html: String,
    /// Child nodes in source order.
    pub children: Vec<RawNode>,
}

/// Resolved visual properties captured for a node.
///
/// Margin and padding arrive either as a CSS shorthand string or as an
/// already-structured 4-sided object; both spellings deserialize into
/// [`BoxSpacing`]. Absent properties stay `None` and are omitted from the
/// generated widget settings rather than defaulted to a guessed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleSnapshot {
    /// Foreground color.
    pub color: Option<String>,
    /// Background color.
    pub background_color: Option<String>,
    /// Font family stack.
    pub font_family: Option<String>,
    /// Font size with unit, e.g. `"16px"`.
    pub font_size: Option<String>,
    /// Font weight keyword or number.
    pub font_weight: Option<String>,
    /// Line height value.
    pub line_height: Option<String>,
    /// Margin, shorthand or 4-sided.
    pub margin: Option<BoxSpacing>,
    /// Padding, shorthand or 4-sided.
    pub padding: Option<BoxSpacing>,
    /// Combined border shorthand, e.g. `"1px solid #ccc"`.
    pub border: Option<String>,
    /// Border radius value.
    pub border_radius: Option<String>,
    /// Box shadow shorthand.
    pub box_shadow: Option<String>,
    /// Text alignment keyword.
    pub text_align: Option<String>,
    /// Resolved `display` value.
    pub display: Option<String>,
    /// Resolved width, e.g. `"640px"`.
    pub width: Option<String>,
    /// Resolved height.
    pub height: Option<String>,
}

/// Margin/padding as captured: either a CSS shorthand string or an
/// explicit 4-sided object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoxSpacing {
    /// CSS shorthand, 1-4 values, e.g. `"10px 20px"`.
    Shorthand(String),
    /// Explicit per-side values.
    Sides {
        /// Top value.
        #[serde(default)]
        top: Option<String>,
        /// Right value.
        #[serde(default)]
        right: Option<String>,
        /// Bottom value.
        #[serde(default)]
        bottom: Option<String>,
        /// Left value.
        #[serde(default)]
        left: Option<String>,
    },
}

/// Fully-populated IR node. Immutable once built for a conversion pass.
#[derive(Debug, Clone, Default)]
pub struct IrNode {
    /// Lowercased tag name; empty for unknown nodes.
    pub tag: String,
    /// Element attributes.
    pub attributes: HashMap<String, String>,
    /// Resolved visual properties.
    pub layout: StyleSnapshot,
    /// Children in source order.
    pub children: Vec<IrNode>,
    /// Trimmed visible text.
    pub text: String,
    /// Inner markup when captured, otherwise empty.
    pub html: String,
}

impl IrNode {
    /// Returns an attribute value, if present.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The `class` attribute, or the empty string.
    #[must_use]
    pub fn class_attr(&self) -> &str {
        self.attr("class").unwrap_or("")
    }

    /// True when the node carries no tag, text, markup, or children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tag.is_empty() && self.text.is_empty() && self.html.is_empty() && self.children.is_empty()
    }
}

/// Normalizes a raw scraped tree into a fully-populated IR tree.
///
/// Walks at most `max_depth` levels; children past the bound are dropped
/// so author-supplied markup can never cause unbounded recursion.
#[must_use]
pub fn normalize(raw: &RawNode, max_depth: usize) -> IrNode {
    normalize_at(raw, 0, max_depth)
}

fn normalize_at(raw: &RawNode, depth: usize, max_depth: usize) -> IrNode {
    let children = if depth < max_depth {
        raw.children
            .iter()
            .map(|child| normalize_at(child, depth + 1, max_depth))
            .collect()
    } else {
        Vec::new()
    };

    IrNode {
        tag: raw.tag_name.trim().to_ascii_lowercase(),
        attributes: raw.attributes.clone(),
        layout: raw.layout.clone(),
        children,
        text: raw.text_content.trim().to_string(),
        html: raw.inner_html.trim().to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn normalize_defaults_missing_fields() {
        let raw: RawNode = serde_json::from_str(r#"{"tagName": "DIV"}"#).unwrap();
        let node = normalize(&raw, 50);

        assert_eq!(node.tag, "div");
        assert!(node.text.is_empty());
        assert!(node.children.is_empty());
        assert_eq!(node.layout, StyleSnapshot::default());
    }

    #[test]
    fn normalize_preserves_child_order() {
        let raw: RawNode = serde_json::from_str(
            r#"{
                "tagName": "div",
                "children": [
                    {"tagName": "h1", "textContent": "First"},
                    {"tagName": "p", "textContent": "Second"}
                ]
            }"#,
        )
        .unwrap();

        let node = normalize(&raw, 50);
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].tag, "h1");
        assert_eq!(node.children[1].text, "Second");
    }

    #[test]
    fn normalize_enforces_depth_bound() {
        // Build a 10-deep chain, normalize with a bound of 3.
        let mut raw = RawNode {
            tag_name: "span".to_string(),
            ..RawNode::default()
        };
        for _ in 0..10 {
            raw = RawNode {
                tag_name: "div".to_string(),
                children: vec![raw],
                ..RawNode::default()
            };
        }

        let node = normalize(&raw, 3);
        let mut depth = 0;
        let mut cursor = &node;
        while let Some(child) = cursor.children.first() {
            cursor = child;
            depth += 1;
        }
        assert_eq!(depth, 3);
    }

    #[test]
    fn spacing_accepts_shorthand_and_sides() {
        let shorthand: StyleSnapshot =
            serde_json::from_str(r#"{"padding": "10px 20px"}"#).unwrap();
        assert_eq!(
            shorthand.padding,
            Some(BoxSpacing::Shorthand("10px 20px".to_string()))
        );

        let sides: StyleSnapshot =
            serde_json::from_str(r#"{"margin": {"top": "1px", "left": "4px"}}"#).unwrap();
        match sides.margin {
            Some(BoxSpacing::Sides { top, left, right, bottom }) => {
                assert_eq!(top.as_deref(), Some("1px"));
                assert_eq!(left.as_deref(), Some("4px"));
                assert!(right.is_none());
                assert!(bottom.is_none());
            },
            other => panic!("expected sides, got {other:?}"),
        }
    }

    #[test]
    fn scraped_page_tolerates_missing_metadata() {
        let page: ScrapedPage =
            serde_json::from_str(r#"{"root": {"tagName": "body"}}"#).unwrap();
        assert!(page.title.is_empty());
        assert_eq!(page.root.tag_name, "body");
    }

    #[test]
    fn empty_node_detection() {
        let node = normalize(&RawNode::default(), 50);
        assert!(node.is_empty());

        let with_text = normalize(
            &RawNode {
                text_content: "hello".to_string(),
                ..RawNode::default()
            },
            50,
        );
        assert!(!with_text.is_empty());
    }
}

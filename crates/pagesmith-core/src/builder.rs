//! Widget builder: turns classified IR nodes into the template tree.
//!
//! The builder owns the per-conversion state (duplicate-image cache and
//! widget counters) so concurrent conversions stay isolated; a fresh
//! [`TreeBuilder`] is constructed for every conversion pass.

use crate::assets::AssetUrlMap;
use crate::classify::{Role, classify};
use crate::config::ClassifierConfig;
use crate::ir::IrNode;
use crate::style::{
    apply_box_styles, apply_typography, is_transparent, padding_sides_px, parse_px,
};
use crate::types::{ElType, TemplateNode, TemplateStats};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use uuid::Uuid;

/// Class-attribute words that mark a link as navigation.
const NAV_CLASS_WORDS: &[&str] = &[
    "nav",
    "menu",
    "navigation",
    "navbar",
    "header-link",
    "footer-link",
];

/// Class-attribute words that mark an element as a call-to-action.
const CTA_CLASS_WORDS: &[&str] = &["btn", "button", "cta", "action"];

/// Link texts commonly used for site navigation.
const NAV_TEXT_PHRASES: &[&str] = &[
    "home", "about", "about us", "contact", "contact us", "pricing", "login", "log in",
    "sign in", "sign up", "blog", "services", "features", "faq", "docs", "careers",
    "portfolio", "team",
];

/// Relative paths commonly used for site navigation.
const NAV_PATHS: &[&str] = &[
    "/", "/home", "/about", "/contact", "/pricing", "/login", "/blog", "/services",
    "/features",
];

/// Generates an opaque 8-char alphanumeric node id.
#[must_use]
pub(crate) fn new_node_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Result of one tree-building pass: root sections plus counters.
#[derive(Debug)]
pub struct BuiltContent {
    /// Root sections in source order; never empty.
    pub sections: Vec<TemplateNode>,
    /// Conversion counters.
    pub stats: TemplateStats,
}

/// Per-conversion tree builder.
///
/// Holds the conversion-scoped duplicate-image cache explicitly rather
/// than on any shared state, so it is reset for every conversion by
/// construction.
pub struct TreeBuilder<'a> {
    config: &'a ClassifierConfig,
    assets: &'a AssetUrlMap,
    seen_images: HashSet<String>,
    widget_count: usize,
}

impl<'a> TreeBuilder<'a> {
    /// Creates a builder for one conversion pass.
    #[must_use]
    pub fn new(config: &'a ClassifierConfig, assets: &'a AssetUrlMap) -> Self {
        Self {
            config,
            assets,
            seen_images: HashSet::new(),
            widget_count: 0,
        }
    }

    /// Builds the full section list from a normalized root.
    ///
    /// The exported root is always a non-empty section list: a non-section
    /// top level is wrapped in a synthetic section/column pair, and a
    /// section that produces no columns receives one default column with a
    /// fallback text widget.
    #[must_use]
    pub fn build(mut self, root: &IrNode) -> BuiltContent {
        let mut sections = Vec::new();

        if classify(root, None, self.config) == Role::Section {
            // Children that are sections themselves become separate root
            // sections; runs of other children in between are grouped into
            // synthetic sections so source order survives.
            let mut pending: Vec<&IrNode> = Vec::new();
            for child in &root.children {
                if classify(child, Some(Role::Section), self.config) == Role::Section {
                    self.flush_group(&mut pending, &mut sections);
                    sections.push(self.build_section(child));
                } else {
                    pending.push(child);
                }
            }

            if sections.is_empty() {
                // No section children at all; the root itself is the one
                // section and keeps its own styling.
                pending.clear();
                sections.push(self.build_section(root));
            } else {
                self.flush_group(&mut pending, &mut sections);
            }
        } else {
            sections.push(self.synthetic_section(&[root]));
        }

        let stats = TemplateStats {
            sections: sections.len(),
            widgets: self.widget_count,
            images: self.seen_images.len(),
        };
        BuiltContent { sections, stats }
    }

    fn flush_group(&mut self, pending: &mut Vec<&IrNode>, sections: &mut Vec<TemplateNode>) {
        if pending.is_empty() {
            return;
        }
        let group: Vec<&IrNode> = pending.drain(..).collect();
        sections.push(self.synthetic_section(&group));
    }

    fn build_section(&mut self, node: &IrNode) -> TemplateNode {
        let mut settings = Map::new();
        if let Some(background) = node.layout.background_color.as_deref() {
            if !is_transparent(background) {
                settings.insert("background_background".into(), json!("classic"));
                settings.insert("background_color".into(), json!(background));
            }
        }

        let mut columns = Vec::new();
        let mut loose: Vec<&IrNode> = Vec::new();
        for child in &node.children {
            match classify(child, Some(Role::Section), self.config) {
                Role::Widget => loose.push(child),
                // Nested structural nodes flatten into columns; the output
                // hierarchy is strictly three levels deep.
                Role::Column | Role::Section => {
                    self.flush_loose(&mut loose, &mut columns);
                    columns.push(self.build_column(child));
                },
            }
        }
        self.flush_loose(&mut loose, &mut columns);

        if columns.is_empty() {
            columns.push(self.fallback_column(node));
        }
        size_columns(&mut columns);

        TemplateNode {
            id: new_node_id(),
            el_type: ElType::Section,
            settings,
            widget_type: None,
            elements: columns,
        }
    }

    /// Wraps a run of loose widget-role children in a synthesized column.
    fn flush_loose(&mut self, loose: &mut Vec<&IrNode>, columns: &mut Vec<TemplateNode>) {
        if loose.is_empty() {
            return;
        }
        let widgets: Vec<TemplateNode> =
            loose.drain(..).map(|child| self.build_widget(child)).collect();
        columns.push(column_node(widgets));
    }

    fn build_column(&mut self, node: &IrNode) -> TemplateNode {
        let mut widgets = Vec::new();
        for child in &node.children {
            match classify(child, Some(Role::Column), self.config) {
                Role::Widget => widgets.push(self.build_widget(child)),
                // Non-widget children of a column collapse into a default
                // text widget carrying their text.
                Role::Column | Role::Section => widgets.push(self.text_widget(child)),
            }
        }

        let mut column = column_node(widgets);
        if let Some(background) = node.layout.background_color.as_deref() {
            if !is_transparent(background) {
                column
                    .settings
                    .insert("background_color".into(), json!(background));
            }
        }
        column
    }

    fn fallback_column(&mut self, section: &IrNode) -> TemplateNode {
        column_node(vec![self.text_widget(section)])
    }

    fn synthetic_section(&mut self, nodes: &[&IrNode]) -> TemplateNode {
        let widgets: Vec<TemplateNode> = nodes
            .iter()
            .map(|node| {
                if classify(node, Some(Role::Column), self.config) == Role::Widget {
                    self.build_widget(node)
                } else {
                    self.text_widget(node)
                }
            })
            .collect();
        let mut columns = vec![column_node(widgets)];
        size_columns(&mut columns);

        TemplateNode {
            id: new_node_id(),
            el_type: ElType::Section,
            settings: Map::new(),
            widget_type: None,
            elements: columns,
        }
    }

    /// Builds one widget from a widget-classified node, dispatching on tag.
    pub fn build_widget(&mut self, node: &IrNode) -> TemplateNode {
        match node.tag.as_str() {
            "img" => self.image_widget(node),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.heading_widget(node),
            "a" => self.link_widget(node),
            "button" => self.button_widget(node, None),
            "input" if is_submit_input(node) => {
                let label = node.attr("value").unwrap_or("Submit").to_string();
                self.button_widget_with_text(node, None, label)
            },
            _ => self.text_widget(node),
        }
    }

    fn image_widget(&mut self, node: &IrNode) -> TemplateNode {
        let src = node
            .attr("src")
            .or_else(|| node.attr("data-src"))
            .unwrap_or("")
            .to_string();

        // A resolver miss keeps the remote URL; degraded, not failed.
        let url = self
            .assets
            .resolve(&src)
            .map_or_else(|| src.clone(), ToString::to_string);

        if !src.is_empty() {
            self.seen_images.insert(src);
        }

        let mut settings = Map::new();
        settings.insert("image".into(), json!({ "url": url }));
        if let Some(alt) = node.attr("alt") {
            if !alt.is_empty() {
                settings.insert("caption".into(), json!(alt));
            }
        }
        apply_box_styles(&mut settings, &node.layout);

        self.widget("image", settings)
    }

    fn heading_widget(&mut self, node: &IrNode) -> TemplateNode {
        let mut settings = Map::new();
        settings.insert("title".into(), json!(node.text));
        settings.insert("header_size".into(), json!(node.tag));
        if let Some(color) = node.layout.color.as_deref() {
            settings.insert("title_color".into(), json!(color));
        }
        apply_typography(&mut settings, &node.layout);
        apply_box_styles(&mut settings, &node.layout);

        self.widget("heading", settings)
    }

    fn link_widget(&mut self, node: &IrNode) -> TemplateNode {
        let href = node.attr("href").unwrap_or("").trim().to_string();
        let nav = is_navigation_link(node, &href);
        let button = is_button_like(node, self.config);

        if nav && !button {
            // Demoted navigation link: plain text, href dropped.
            return self.text_widget(node);
        }

        let link = if href.is_empty() { None } else { Some(href) };
        self.button_widget(node, link)
    }

    fn button_widget(&mut self, node: &IrNode, link: Option<String>) -> TemplateNode {
        let href = link.or_else(|| {
            node.attr("href")
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(ToString::to_string)
        });
        self.button_widget_with_text(node, href, node.text.clone())
    }

    fn button_widget_with_text(
        &mut self,
        node: &IrNode,
        link: Option<String>,
        text: String,
    ) -> TemplateNode {
        let mut settings = Map::new();
        settings.insert("text".into(), json!(text));
        if let Some(url) = link {
            settings.insert("link".into(), json!({ "url": url }));
        }
        if let Some(color) = node.layout.color.as_deref() {
            settings.insert("button_text_color".into(), json!(color));
        }
        if let Some(background) = node.layout.background_color.as_deref() {
            if !is_transparent(background) {
                settings.insert("button_background_color".into(), json!(background));
            }
        }
        apply_typography(&mut settings, &node.layout);
        apply_box_styles(&mut settings, &node.layout);

        self.widget("button", settings)
    }

    fn text_widget(&mut self, node: &IrNode) -> TemplateNode {
        let editor = if node.html.is_empty() {
            format!("<p>{}</p>", node.text)
        } else {
            node.html.clone()
        };

        let mut settings = Map::new();
        settings.insert("editor".into(), json!(editor));
        if let Some(color) = node.layout.color.as_deref() {
            settings.insert("text_color".into(), json!(color));
        }
        apply_typography(&mut settings, &node.layout);
        apply_box_styles(&mut settings, &node.layout);

        self.widget("text-editor", settings)
    }

    fn widget(&mut self, kind: &str, settings: Map<String, Value>) -> TemplateNode {
        self.widget_count += 1;
        TemplateNode {
            id: new_node_id(),
            el_type: ElType::Widget,
            settings,
            widget_type: Some(kind.to_string()),
            elements: vec![],
        }
    }
}

fn column_node(widgets: Vec<TemplateNode>) -> TemplateNode {
    TemplateNode {
        id: new_node_id(),
        el_type: ElType::Column,
        settings: Map::new(),
        widget_type: None,
        elements: widgets,
    }
}

/// Distributes `_column_size` evenly across a section's columns.
fn size_columns(columns: &mut [TemplateNode]) {
    if columns.is_empty() {
        return;
    }
    let share = 100 / columns.len().max(1);
    for column in columns.iter_mut() {
        column.settings.insert("_column_size".into(), json!(share));
    }
}

fn is_submit_input(node: &IrNode) -> bool {
    matches!(node.attr("type"), Some("submit" | "button"))
}

/// Whole-word match of `words` against a class attribute.
///
/// Class tokens are compared whole and as hyphen/underscore segments, so
/// `cta-button` matches `button` but `attribution` does not.
fn class_contains_word(class: &str, words: &[&str]) -> bool {
    for token in class.split_whitespace() {
        let token = token.to_ascii_lowercase();
        if words.contains(&token.as_str()) {
            return true;
        }
        if token
            .split(['-', '_'])
            .any(|segment| words.contains(&segment))
        {
            return true;
        }
    }
    false
}

/// Navigation detector for anchor elements.
fn is_navigation_link(node: &IrNode, href: &str) -> bool {
    let href_lower = href.to_ascii_lowercase();
    if href.is_empty() || href == "#" || href_lower.starts_with("javascript:") {
        return true;
    }

    if class_contains_word(node.class_attr(), NAV_CLASS_WORDS) {
        return true;
    }

    let text = node.text.trim().to_ascii_lowercase();
    NAV_TEXT_PHRASES.contains(&text.as_str()) && has_nav_url_shape(&href_lower)
}

/// True for hash links, relative URLs, and absolute URLs whose path is a
/// common navigation path.
fn has_nav_url_shape(href: &str) -> bool {
    if href.starts_with('#') {
        return true;
    }
    match url::Url::parse(href) {
        Ok(parsed) => NAV_PATHS.contains(&parsed.path().trim_end_matches('/'))
            || parsed.path() == "/",
        // No scheme: a relative URL.
        Err(_) => true,
    }
}

/// Button-like detector: CTA class word, actual button element, or strong
/// visual button affordance (non-transparent background plus rounding or
/// uniform padding) — color alone is not enough.
fn is_button_like(node: &IrNode, config: &ClassifierConfig) -> bool {
    if class_contains_word(node.class_attr(), CTA_CLASS_WORDS) {
        return true;
    }

    if node.tag == "button" || is_submit_input(node) {
        return true;
    }

    let Some(background) = node.layout.background_color.as_deref() else {
        return false;
    };
    if is_transparent(background) {
        return false;
    }

    let rounded = node
        .layout
        .border_radius
        .as_deref()
        .and_then(parse_px)
        .is_some_and(|radius| radius >= config.button_min_radius_px);
    if rounded {
        return true;
    }

    node.layout
        .padding
        .as_ref()
        .and_then(padding_sides_px)
        .is_some_and(|sides| {
            sides
                .iter()
                .all(|side| *side >= f64::from(config.button_min_padding_px))
        })
}

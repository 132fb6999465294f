//! Conversion orchestration: scraped page in, validated template out.
//!
//! A conversion either returns a template that already passed the schema
//! gate or a typed error — it never returns a template known to be
//! invalid. Conversions are single-threaded and stateless across calls;
//! all per-call state lives in the [`crate::builder::TreeBuilder`]
//! constructed for each pass.

use crate::assets::AssetUrlMap;
use crate::builder::TreeBuilder;
use crate::config::Config;
use crate::ir::{ScrapedPage, normalize};
use crate::types::{TEMPLATE_VERSION, Template, TemplateMetadata};
use crate::validate::validate;
use crate::{Error, Result};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

/// Converts scraped pages into validated page-builder templates.
pub struct Converter {
    config: Config,
}

impl Converter {
    /// Creates a converter with the given configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Creates a converter with default thresholds.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Runs the full pipeline: normalize, classify, build, validate.
    ///
    /// `assets` is the URL rewrite map built from the page's asset
    /// session; pass an empty map to keep all asset references remote.
    pub fn convert(&self, page: &ScrapedPage, assets: &AssetUrlMap) -> Result<Template> {
        let ir = normalize(&page.root, self.config.classifier.max_tree_depth);
        if ir.is_empty() {
            return Err(Error::ScrapeInput(
                "scraped root node has no tag, text, or children".to_string(),
            ));
        }

        let built = TreeBuilder::new(&self.config.classifier, assets).build(&ir);
        debug!(
            sections = built.stats.sections,
            widgets = built.stats.widgets,
            images = built.stats.images,
            "built template tree"
        );

        let title = if page.title.trim().is_empty() {
            "Untitled page".to_string()
        } else {
            page.title.trim().to_string()
        };

        let mut page_settings = serde_json::Map::new();
        page_settings.insert("template".into(), json!("elementor_canvas"));

        let template = Template {
            version: TEMPLATE_VERSION.to_string(),
            title,
            kind: "page".to_string(),
            content: built.sections,
            page_settings,
            metadata: TemplateMetadata {
                created_at: Utc::now().to_rfc3339(),
                source_url: page.url.clone(),
                generator: concat!("pagesmith/", env!("CARGO_PKG_VERSION")).to_string(),
                elementor_version: "3.18.0".to_string(),
                stats: built.stats,
            },
        };

        let report = validate(&template);
        if !report.is_valid() {
            return Err(Error::SchemaValidation {
                violations: report.violations,
            });
        }

        info!(
            source = %page.url,
            sections = template.metadata.stats.sections,
            widgets = template.metadata.stats.widgets,
            "conversion complete"
        );
        Ok(template)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn page(json: &str) -> ScrapedPage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn empty_input_is_fatal() {
        let converter = Converter::with_defaults();
        let result = converter.convert(&page(r#"{"root": {}}"#), &AssetUrlMap::default());
        assert!(matches!(result, Err(Error::ScrapeInput(_))));
    }

    #[test]
    fn minimal_page_produces_validated_template() {
        let converter = Converter::with_defaults();
        let template = converter
            .convert(
                &page(
                    r#"{
                        "title": "Landing",
                        "url": "https://example.com",
                        "root": {"tagName": "body", "children": [
                            {"tagName": "section", "children": [
                                {"tagName": "h1", "textContent": "Welcome"}
                            ]}
                        ]}
                    }"#,
                ),
                &AssetUrlMap::default(),
            )
            .unwrap();

        assert_eq!(template.version, "0.4");
        assert_eq!(template.kind, "page");
        assert_eq!(template.title, "Landing");
        assert!(!template.content.is_empty());
        assert_eq!(
            template.page_settings["template"],
            serde_json::json!("elementor_canvas")
        );
        assert!(template.metadata.generator.starts_with("pagesmith/"));
    }

    #[test]
    fn text_only_input_still_emits_one_section() {
        // Zero extractable structure: converter must still emit
        // section/column/fallback-text-widget.
        let converter = Converter::with_defaults();
        let template = converter
            .convert(
                &page(r#"{"root": {"tagName": "div", "textContent": "just words"}}"#),
                &AssetUrlMap::default(),
            )
            .unwrap();

        assert_eq!(template.content.len(), 1);
        let section = &template.content[0];
        let column = &section.elements[0];
        let widget = &column.elements[0];
        assert_eq!(widget.widget_type.as_deref(), Some("text-editor"));
    }

    #[test]
    fn untitled_pages_get_a_fallback_title() {
        let converter = Converter::with_defaults();
        let template = converter
            .convert(
                &page(r#"{"root": {"tagName": "p", "textContent": "x"}}"#),
                &AssetUrlMap::default(),
            )
            .unwrap();
        assert_eq!(template.title, "Untitled page");
    }

    #[test]
    fn exported_hierarchy_is_strict() {
        let converter = Converter::with_defaults();
        let template = converter
            .convert(
                &page(
                    r#"{
                        "root": {"tagName": "body", "children": [
                            {"tagName": "section", "children": [
                                {"tagName": "div", "children": [
                                    {"tagName": "p", "textContent": "a"},
                                    {"tagName": "img", "attributes": {"src": "/x.png"}}
                                ]},
                                {"tagName": "div", "children": [
                                    {"tagName": "h2", "textContent": "b"}
                                ]}
                            ]}
                        ]}
                    }"#,
                ),
                &AssetUrlMap::default(),
            )
            .unwrap();

        for section in &template.content {
            assert_eq!(section.el_type, crate::types::ElType::Section);
            for column in &section.elements {
                assert_eq!(column.el_type, crate::types::ElType::Column);
                for widget in &column.elements {
                    assert_eq!(widget.el_type, crate::types::ElType::Widget);
                    assert!(widget.elements.is_empty());
                }
            }
        }
    }
}

//! Terminal schema gate for produced templates.
//!
//! Every template leaving the pipeline passes through [`validate`]; on
//! failure the caller receives the full structured violation list and the
//! template bytes are never released. This is the pipeline's only hard
//! failure path for output correctness — everything upstream degrades
//! gracefully instead.

use crate::types::{ElType, Template, TemplateNode};

/// Widget kinds the exported schema accepts.
const KNOWN_WIDGET_TYPES: &[&str] = &["heading", "image", "button", "text-editor"];

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// One entry per failed check; empty means the template is valid.
    pub violations: Vec<String>,
}

impl ValidationReport {
    /// True when no violations were recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Validates a template against the export contract.
///
/// Checks required top-level fields, the strict section → column → widget
/// nesting, per-widget required settings keys, and id shape. Validation
/// never mutates the template, so re-validating a valid template is
/// trivially idempotent.
#[must_use]
pub fn validate(template: &Template) -> ValidationReport {
    let mut report = ValidationReport::default();

    if template.version.is_empty() {
        report.violations.push("version is empty".to_string());
    }
    if template.kind != "page" {
        report
            .violations
            .push(format!("type must be \"page\", found \"{}\"", template.kind));
    }
    if template.content.is_empty() {
        report.violations.push("content is empty".to_string());
    }
    if !template
        .page_settings
        .get("template")
        .is_some_and(|v| v.is_string())
    {
        report
            .violations
            .push("page_settings.template is missing".to_string());
    }

    for (index, section) in template.content.iter().enumerate() {
        let path = format!("content[{index}]");
        if section.el_type != ElType::Section {
            report
                .violations
                .push(format!("{path}: root node is not a section"));
        }
        check_node(section, &path, &mut report);
    }

    report
}

fn check_node(node: &TemplateNode, path: &str, report: &mut ValidationReport) {
    if node.id.len() != 8 || !node.id.chars().all(|c| c.is_ascii_alphanumeric()) {
        report
            .violations
            .push(format!("{path}: id \"{}\" is not 8 alphanumeric chars", node.id));
    }

    match node.el_type {
        ElType::Section => {
            if node.widget_type.is_some() {
                report
                    .violations
                    .push(format!("{path}: section carries a widgetType"));
            }
            if node.elements.is_empty() {
                report.violations.push(format!("{path}: section has no columns"));
            }
            for (index, child) in node.elements.iter().enumerate() {
                let child_path = format!("{path}.elements[{index}]");
                if child.el_type != ElType::Column {
                    report
                        .violations
                        .push(format!("{child_path}: section child is not a column"));
                }
                check_node(child, &child_path, report);
            }
        },
        ElType::Column => {
            if node.widget_type.is_some() {
                report
                    .violations
                    .push(format!("{path}: column carries a widgetType"));
            }
            for (index, child) in node.elements.iter().enumerate() {
                let child_path = format!("{path}.elements[{index}]");
                if child.el_type != ElType::Widget {
                    report
                        .violations
                        .push(format!("{child_path}: column child is not a widget"));
                }
                check_node(child, &child_path, report);
            }
        },
        ElType::Widget => {
            if !node.elements.is_empty() {
                report
                    .violations
                    .push(format!("{path}: widget has non-empty elements"));
            }
            match node.widget_type.as_deref() {
                None => report
                    .violations
                    .push(format!("{path}: widget is missing widgetType")),
                Some(kind) if !KNOWN_WIDGET_TYPES.contains(&kind) => report
                    .violations
                    .push(format!("{path}: unknown widgetType \"{kind}\"")),
                Some(kind) => check_widget_settings(node, kind, path, report),
            }
        },
    }
}

fn check_widget_settings(
    node: &TemplateNode,
    kind: &str,
    path: &str,
    report: &mut ValidationReport,
) {
    let required: &[&str] = match kind {
        "heading" => &["title", "header_size"],
        "image" => &["image"],
        "button" => &["text"],
        "text-editor" => &["editor"],
        _ => &[],
    };
    for key in required {
        if !node.settings.contains_key(*key) {
            report
                .violations
                .push(format!("{path}: {kind} widget is missing settings.{key}"));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{TemplateMetadata, TemplateStats};
    use serde_json::json;

    fn widget(kind: &str, settings: serde_json::Map<String, serde_json::Value>) -> TemplateNode {
        TemplateNode {
            id: "a1b2c3d4".to_string(),
            el_type: ElType::Widget,
            settings,
            widget_type: Some(kind.to_string()),
            elements: vec![],
        }
    }

    fn valid_template() -> Template {
        let mut heading_settings = serde_json::Map::new();
        heading_settings.insert("title".into(), json!("Hi"));
        heading_settings.insert("header_size".into(), json!("h1"));

        let column = TemplateNode {
            id: "b2c3d4e5".to_string(),
            el_type: ElType::Column,
            settings: serde_json::Map::new(),
            widget_type: None,
            elements: vec![widget("heading", heading_settings)],
        };
        let section = TemplateNode {
            id: "c3d4e5f6".to_string(),
            el_type: ElType::Section,
            settings: serde_json::Map::new(),
            widget_type: None,
            elements: vec![column],
        };

        let mut page_settings = serde_json::Map::new();
        page_settings.insert("template".into(), json!("elementor_canvas"));

        Template {
            version: "0.4".to_string(),
            title: "Test".to_string(),
            kind: "page".to_string(),
            content: vec![section],
            page_settings,
            metadata: TemplateMetadata {
                created_at: "2026-01-01T00:00:00Z".to_string(),
                source_url: "https://example.com".to_string(),
                generator: "pagesmith".to_string(),
                elementor_version: "3.18.0".to_string(),
                stats: TemplateStats {
                    sections: 1,
                    widgets: 1,
                    images: 0,
                },
            },
        }
    }

    #[test]
    fn valid_template_passes() {
        let report = validate(&valid_template());
        assert!(report.is_valid(), "violations: {:?}", report.violations);
    }

    #[test]
    fn validation_is_idempotent() {
        let template = valid_template();
        assert!(validate(&template).is_valid());
        assert!(validate(&template).is_valid());
    }

    #[test]
    fn empty_content_is_a_violation() {
        let mut template = valid_template();
        template.content.clear();
        let report = validate(&template);
        assert!(!report.is_valid());
        assert!(report.violations.iter().any(|v| v.contains("content is empty")));
    }

    #[test]
    fn widget_under_section_is_a_violation() {
        let mut template = valid_template();
        let mut settings = serde_json::Map::new();
        settings.insert("editor".into(), json!("<p>x</p>"));
        template.content[0].elements.push(widget("text-editor", settings));

        let report = validate(&template);
        assert!(report
            .violations
            .iter()
            .any(|v| v.contains("section child is not a column")));
    }

    #[test]
    fn widget_with_children_is_a_violation() {
        let mut template = valid_template();
        let mut settings = serde_json::Map::new();
        settings.insert("editor".into(), json!("<p>x</p>"));
        let child = widget("text-editor", settings.clone());
        let mut bad = widget("text-editor", settings);
        bad.elements.push(child);
        template.content[0].elements[0].elements.push(bad);

        let report = validate(&template);
        assert!(report
            .violations
            .iter()
            .any(|v| v.contains("non-empty elements")));
    }

    #[test]
    fn missing_required_settings_are_reported() {
        let mut template = valid_template();
        template.content[0].elements[0].elements[0]
            .settings
            .remove("title");

        let report = validate(&template);
        assert!(report
            .violations
            .iter()
            .any(|v| v.contains("missing settings.title")));
    }

    #[test]
    fn unknown_widget_type_is_a_violation() {
        let mut template = valid_template();
        template.content[0].elements[0].elements[0].widget_type = Some("carousel".to_string());

        let report = validate(&template);
        assert!(report.violations.iter().any(|v| v.contains("carousel")));
    }

    #[test]
    fn bad_id_shape_is_a_violation() {
        let mut template = valid_template();
        template.content[0].id = "nope".to_string();
        let report = validate(&template);
        assert!(report.violations.iter().any(|v| v.contains("8 alphanumeric")));
    }
}

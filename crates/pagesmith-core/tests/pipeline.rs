//! End-to-end pipeline tests: scraped JSON in, validated template and kit
//! archive out, with assets flowing through a real on-disk session.

#![allow(clippy::unwrap_used)]

use pagesmith_core::{
    export_kit, to_template_bytes, validate, AssetType, AssetUrlMap, Converter, ElType,
    ScrapedPage, SessionStore,
};
use std::sync::Arc;
use tempfile::TempDir;

const SCRAPED_PAGE: &str = r##"{
    "title": "Acme Landing",
    "url": "https://acme.test/",
    "lang": "en",
    "root": {
        "tagName": "BODY",
        "children": [
            {
                "tagName": "SECTION",
                "layout": {
                    "backgroundColor": "rgb(250, 250, 250)",
                    "padding": "48px"
                },
                "children": [
                    {
                        "tagName": "H1",
                        "textContent": "Welcome to Acme",
                        "layout": { "color": "#222222", "fontSize": "42px" }
                    },
                    {
                        "tagName": "IMG",
                        "attributes": { "src": "https://acme.test/img/hero.png" }
                    },
                    {
                        "tagName": "A",
                        "textContent": "Get started",
                        "attributes": { "href": "/signup", "class": "btn btn-primary" },
                        "layout": {
                            "backgroundColor": "#0066ff",
                            "borderRadius": "6px",
                            "padding": "12px 24px"
                        }
                    }
                ]
            },
            {
                "tagName": "SECTION",
                "children": [
                    { "tagName": "P", "textContent": "Trusted by teams everywhere." }
                ]
            }
        ]
    }
}"##;

fn store_with_hero() -> (Arc<SessionStore>, uuid::Uuid, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SessionStore::with_root(temp_dir.path().to_path_buf()).unwrap());
    let session = store.create_session().unwrap();
    store
        .save_asset(
            session.session_id,
            AssetType::Image,
            "hero.png",
            &[9u8; 512],
            "https://acme.test/img/hero.png",
            "https://acme.test/img/hero.png",
        )
        .unwrap();
    (store, session.session_id, temp_dir)
}

#[test]
fn scraped_json_becomes_valid_template() {
    let page: ScrapedPage = serde_json::from_str(SCRAPED_PAGE).unwrap();
    let (store, session_id, _temp_dir) = store_with_hero();
    let assets = AssetUrlMap::from_session(&store.load_metadata(session_id).unwrap());

    let template = Converter::with_defaults().convert(&page, &assets).unwrap();

    assert_eq!(template.title, "Acme Landing");
    assert_eq!(template.kind, "page");
    assert_eq!(template.content.len(), 2);
    assert!(validate(&template).is_valid());

    // Every level of the tree is the expected element type.
    for section in &template.content {
        assert_eq!(section.el_type, ElType::Section);
        for column in &section.elements {
            assert_eq!(column.el_type, ElType::Column);
            for widget in &column.elements {
                assert_eq!(widget.el_type, ElType::Widget);
                assert!(widget.widget_type.is_some());
            }
        }
    }
}

#[test]
fn image_widgets_point_at_session_assets() {
    let page: ScrapedPage = serde_json::from_str(SCRAPED_PAGE).unwrap();
    let (store, session_id, _temp_dir) = store_with_hero();
    let assets = AssetUrlMap::from_session(&store.load_metadata(session_id).unwrap());

    let template = Converter::with_defaults().convert(&page, &assets).unwrap();
    let json = serde_json::to_string(&template).unwrap();

    let expected = format!("/assets/{session_id}/images/hero.png");
    assert!(json.contains(&expected));
    assert!(!json.contains("https://acme.test/img/hero.png"));
    assert_eq!(template.metadata.stats.images, 1);
}

#[test]
fn cta_link_becomes_button_widget() {
    let page: ScrapedPage = serde_json::from_str(SCRAPED_PAGE).unwrap();
    let template = Converter::with_defaults()
        .convert(&page, &AssetUrlMap::default())
        .unwrap();
    let json = serde_json::to_string(&template).unwrap();
    assert!(json.contains("\"widgetType\":\"button\""));
    assert!(json.contains("Get started"));
}

#[test]
fn template_exports_through_kit_archive() {
    let page: ScrapedPage = serde_json::from_str(SCRAPED_PAGE).unwrap();
    let (store, session_id, _temp_dir) = store_with_hero();
    let assets = AssetUrlMap::from_session(&store.load_metadata(session_id).unwrap());
    let template = Converter::with_defaults().convert(&page, &assets).unwrap();

    let bytes = to_template_bytes(&template).unwrap();
    let reparsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(reparsed["version"], "0.4");

    let archive = export_kit(&template, &store, session_id).unwrap();
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
    assert!(zip.by_name("template.json").is_ok());
    assert!(zip.by_name("assets/images/hero.png").is_ok());
}

#[test]
fn contentless_page_gets_fallback_template() {
    // A tagged root with nothing extractable still yields a valid
    // one-section template, never an empty `content` array.
    let page: ScrapedPage = serde_json::from_str(
        r#"{ "title": "Empty", "url": "https://acme.test/", "root": { "tagName": "BODY" } }"#,
    )
    .unwrap();
    let template = Converter::with_defaults()
        .convert(&page, &AssetUrlMap::default())
        .unwrap();

    assert_eq!(template.content.len(), 1);
    let section = &template.content[0];
    assert_eq!(section.el_type, ElType::Section);
    assert_eq!(section.elements.len(), 1);
    let column = &section.elements[0];
    assert_eq!(column.el_type, ElType::Column);
    assert_eq!(column.elements.len(), 1);
    assert_eq!(column.elements[0].widget_type.as_deref(), Some("text-editor"));
    assert!(validate(&template).is_valid());
}

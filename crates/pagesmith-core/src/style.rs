//! Centralized style translation from captured CSS values to typed widget
//! settings.
//!
//! Every mapper here is a pure function of the captured value: applying a
//! translation twice produces identical settings. Missing style fields are
//! simply omitted — never defaulted to a guessed value — so the generated
//! settings never misrepresent the source page.

use crate::ir::{BoxSpacing, StyleSnapshot};
use serde_json::{Map, Value, json};

/// Parses a pixel length like `"640px"` or `"640"` into a number.
#[must_use]
pub(crate) fn parse_px(value: &str) -> Option<f32> {
    let trimmed = value.trim().trim_end_matches("px").trim();
    trimmed.parse::<f32>().ok()
}

/// Splits a CSS length into numeric value and unit, defaulting the unit to
/// `px` for bare numbers.
#[must_use]
fn split_size(value: &str) -> Option<(f64, String)> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let split_at = trimmed
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.' && *c != '-' && *c != '+')
        .map_or(trimmed.len(), |(i, _)| i);

    let number: f64 = trimmed[..split_at].parse().ok()?;
    let unit = trimmed[split_at..].trim();
    let unit = if unit.is_empty() { "px" } else { unit };
    Some((number, unit.to_string()))
}

/// Builds a `{size, unit}` object from a CSS length, e.g. for font sizes.
#[must_use]
pub fn size_setting(value: &str) -> Option<Value> {
    let (size, unit) = split_size(value)?;
    Some(json!({ "size": size, "unit": unit }))
}

/// True for background colors that carry no visual weight.
#[must_use]
pub fn is_transparent(color: &str) -> bool {
    let c = color.trim().to_ascii_lowercase().replace(' ', "");
    c.is_empty() || c == "transparent" || c == "rgba(0,0,0,0)" || c == "none"
}

/// Expands CSS 1/2/3/4-value shorthand into `[top, right, bottom, left]`.
fn expand_shorthand(values: &[(f64, String)]) -> Option<[(f64, String); 4]> {
    let get = |i: usize| values.get(i).cloned();
    match values.len() {
        1 => {
            let v = get(0)?;
            Some([v.clone(), v.clone(), v.clone(), v])
        },
        2 => {
            let v = get(0)?;
            let h = get(1)?;
            Some([v.clone(), h.clone(), v, h])
        },
        3 => {
            let t = get(0)?;
            let h = get(1)?;
            let b = get(2)?;
            Some([t, h.clone(), b, h])
        },
        4 => Some([get(0)?, get(1)?, get(2)?, get(3)?]),
        _ => None,
    }
}

fn sides_object(sides: [(f64, String); 4]) -> Value {
    let unit = sides[0].1.clone();
    let linked = sides.iter().all(|(v, _)| (*v - sides[0].0).abs() < f64::EPSILON);
    json!({
        "unit": unit,
        "top": sides[0].0,
        "right": sides[1].0,
        "bottom": sides[2].0,
        "left": sides[3].0,
        "isLinked": linked,
    })
}

/// Translates margin/padding into the uniform
/// `{unit, top, right, bottom, left, isLinked}` shape.
///
/// Accepts either a CSS shorthand string (1-4 values) or an
/// already-structured 4-sided object; unparsable input yields `None`.
#[must_use]
pub fn spacing_setting(spacing: &BoxSpacing) -> Option<Value> {
    match spacing {
        BoxSpacing::Shorthand(raw) => {
            let values: Vec<(f64, String)> =
                raw.split_whitespace().filter_map(split_size).collect();
            if values.is_empty() || values.len() != raw.split_whitespace().count() {
                return None;
            }
            expand_shorthand(&values).map(sides_object)
        },
        BoxSpacing::Sides {
            top,
            right,
            bottom,
            left,
        } => {
            let side = |v: &Option<String>| {
                v.as_deref()
                    .and_then(split_size)
                    .unwrap_or((0.0, "px".to_string()))
            };
            Some(sides_object([side(top), side(right), side(bottom), side(left)]))
        },
    }
}

/// Four per-side padding values in px, when all four parse.
///
/// Used by the button affordance check, which requires padding on every
/// side rather than any single one.
#[must_use]
pub fn padding_sides_px(spacing: &BoxSpacing) -> Option<[f64; 4]> {
    let value = spacing_setting(spacing)?;
    Some([
        value.get("top")?.as_f64()?,
        value.get("right")?.as_f64()?,
        value.get("bottom")?.as_f64()?,
        value.get("left")?.as_f64()?,
    ])
}

/// Parses width and color out of a combined border string like
/// `"1px solid #e5e5e5"`.
#[must_use]
pub fn parse_border(border: &str) -> Option<(f64, Option<String>)> {
    let mut width: Option<f64> = None;
    let mut color: Option<String> = None;

    for token in border.split_whitespace() {
        if width.is_none() && token.ends_with("px") {
            if let Some((value, _)) = split_size(token) {
                width = Some(value);
                continue;
            }
        }
        if color.is_none() && (token.starts_with('#') || token.starts_with("rgb")) {
            color = Some(extract_color(border).unwrap_or_else(|| token.to_string()));
        }
    }

    width.map(|w| (w, color))
}

/// Extracts the first color token (hex or rgb/rgba with spaces intact).
fn extract_color(value: &str) -> Option<String> {
    if let Some(start) = value.find("rgb") {
        let rest = &value[start..];
        let end = rest.find(')')?;
        return Some(rest[..=end].to_string());
    }
    if let Some(start) = value.find('#') {
        let rest = &value[start..];
        let end = rest
            .char_indices()
            .skip(1)
            .find(|(_, c)| !c.is_ascii_hexdigit())
            .map_or(rest.len(), |(i, _)| i);
        return Some(rest[..end].to_string());
    }
    None
}

/// Translates a box-shadow shorthand into the fixed settings block
/// `{horizontal, vertical, blur, spread, color}`.
#[must_use]
pub fn box_shadow_setting(shadow: &str) -> Option<Value> {
    let color = extract_color(shadow);

    // Strip the color before reading offsets so rgb() components are not
    // mistaken for lengths.
    let stripped = color
        .as_deref()
        .map_or_else(|| shadow.to_string(), |c| shadow.replace(c, ""));

    let lengths: Vec<f64> = stripped
        .split_whitespace()
        .filter_map(|token| split_size(token).map(|(v, _)| v))
        .collect();
    if lengths.is_empty() {
        return None;
    }

    let at = |i: usize| lengths.get(i).copied().unwrap_or(0.0);
    Some(json!({
        "horizontal": at(0),
        "vertical": at(1),
        "blur": at(2),
        "spread": at(3),
        "color": color.unwrap_or_else(|| "rgba(0,0,0,0.5)".to_string()),
    }))
}

/// Adds typography settings (`typography_*` keys) derived from the layout.
///
/// Emits nothing when the layout carries no typographic fields.
pub fn apply_typography(settings: &mut Map<String, Value>, layout: &StyleSnapshot) {
    let mut any = false;

    if let Some(family) = layout.font_family.as_deref() {
        let family = family.split(',').next().unwrap_or(family).trim().trim_matches('"');
        if !family.is_empty() {
            settings.insert("typography_font_family".into(), json!(family));
            any = true;
        }
    }
    if let Some(size) = layout.font_size.as_deref().and_then(size_setting) {
        settings.insert("typography_font_size".into(), size);
        any = true;
    }
    if let Some(weight) = layout.font_weight.as_deref() {
        if !weight.trim().is_empty() {
            settings.insert("typography_font_weight".into(), json!(weight.trim()));
            any = true;
        }
    }
    if let Some(height) = layout.line_height.as_deref().and_then(size_setting) {
        settings.insert("typography_line_height".into(), height);
        any = true;
    }

    if any {
        settings.insert("typography_typography".into(), json!("custom"));
    }
}

/// Adds spacing, border, radius, shadow, and alignment settings shared by
/// every widget kind. Color keys are widget-specific and applied by the
/// builder.
pub fn apply_box_styles(settings: &mut Map<String, Value>, layout: &StyleSnapshot) {
    if let Some(margin) = layout.margin.as_ref().and_then(spacing_setting) {
        settings.insert("_margin".into(), margin);
    }
    if let Some(padding) = layout.padding.as_ref().and_then(spacing_setting) {
        settings.insert("_padding".into(), padding);
    }

    if let Some((width, color)) = layout.border.as_deref().and_then(parse_border) {
        settings.insert("border_border".into(), json!("solid"));
        settings.insert(
            "border_width".into(),
            json!({
                "unit": "px",
                "top": width,
                "right": width,
                "bottom": width,
                "left": width,
                "isLinked": true,
            }),
        );
        if let Some(color) = color {
            settings.insert("border_color".into(), json!(color));
        }
    }

    if let Some(radius) = layout.border_radius.as_deref() {
        let values: Vec<(f64, String)> =
            radius.split_whitespace().filter_map(split_size).collect();
        if let Some(sides) = expand_shorthand(&values) {
            settings.insert("border_radius".into(), sides_object(sides));
        }
    }

    if let Some(shadow) = layout.box_shadow.as_deref().and_then(box_shadow_setting) {
        settings.insert("box_shadow_box_shadow_type".into(), json!("yes"));
        settings.insert("box_shadow_box_shadow".into(), shadow);
    }

    if let Some(align) = layout.text_align.as_deref() {
        let align = align.trim();
        if matches!(align, "left" | "right" | "center" | "justify") {
            settings.insert("align".into(), json!(align));
        }
    }
}

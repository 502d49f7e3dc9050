//! Rendering of the material-choice modal content.
//!
//! Material fields come from the authorization endpoint and are treated as
//! untrusted text. Hosts that render HTML must use `material_list_html`, which
//! escapes every field and only emits real links for http(s) URLs.

use printauth_core::MaterialOption;

/// Shown when the endpoint offers no materials for the tool.
pub const NO_MATERIALS_TEXT: &str =
    "No specific materials listed for purchase for this tool. You may use your own.";

/// Escape text for use in HTML element content and quoted attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '`' => out.push_str("&#x60;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn welcome_line(welcome_name: &str) -> String {
    format!("Welcome {welcome_name}!")
}

/// HTML fragment for the material list.
pub fn material_list_html(materials: &[MaterialOption]) -> String {
    if materials.is_empty() {
        return format!("<p><em>{NO_MATERIALS_TEXT}</em></p>");
    }

    let mut html = String::from("<strong>Materials for Purchase:</strong><ul>");
    for material in materials {
        let href = material.purchase_href();
        let target = if material.opens_new_tab() {
            r#" target="_blank" rel="noopener noreferrer""#
        } else {
            ""
        };
        html.push_str(&format!(
            r#"<li><a href="{}"{}>{} - {} - ${}</a></li>"#,
            escape_html(href),
            target,
            escape_html(&material.label),
            escape_html(&material.unit),
            escape_html(&material.cost),
        ));
    }
    html.push_str("</ul>");
    html
}

/// Plain-text material list for terminals. Control characters are dropped so
/// untrusted fields cannot move the cursor or recolor the screen.
pub fn material_list_text(materials: &[MaterialOption]) -> String {
    if materials.is_empty() {
        return NO_MATERIALS_TEXT.to_string();
    }

    let mut text = String::from("Materials for Purchase:");
    for material in materials {
        text.push_str(&format!(
            "\n  - {} - {} - ${}",
            strip_control(&material.label),
            strip_control(&material.unit),
            strip_control(&material.cost),
        ));
        if material.opens_new_tab() {
            text.push_str(&format!(" ({})", strip_control(material.purchase_href())));
        }
    }
    text
}

fn strip_control(input: &str) -> String {
    input.chars().filter(|c| !c.is_control()).collect()
}

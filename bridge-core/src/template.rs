//! Mustache-style `{{name}}` template expansion for MQTT topic/payload strings.
//!
//! Ported from `original_source/src/packet_processor.cpp`'s use of inja: every matched
//! field's [`crate::catalog::FieldValue::Display`] rendering is bound under its field name
//! and substituted into the packet's topic/payload templates.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateRenderError {
    #[error("unknown template field '{0}'")]
    UnknownField(String),
    #[error("unterminated '{{{{' tag")]
    UnterminatedTag,
}

/// Render `template`, replacing each `{{name}}` tag with `bindings[name]`. Whitespace
/// immediately inside the braces (`{{ name }}`) is ignored. Field names not present in
/// `bindings` are a hard error rather than an empty substitution.
pub fn render(template: &str, bindings: &HashMap<String, String>) -> Result<String, TemplateRenderError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open.find("}}").ok_or(TemplateRenderError::UnterminatedTag)?;
        let name = after_open[..end].trim();
        let value = bindings
            .get(name)
            .ok_or_else(|| TemplateRenderError::UnknownField(name.to_string()))?;
        out.push_str(value);
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Render both the topic and payload of `template` against the same field bindings.
pub fn render_pair(
    topic: &str,
    payload: &str,
    bindings: &HashMap<String, String>,
) -> Result<(String, String), TemplateRenderError> {
    Ok((render(topic, bindings)?, render(payload, bindings)?))
}

//! TOML-described frame trees and expected edit scripts.
//!
//! ```toml
//! [[case]]
//! name = "text update"
//! old = [{ seq = 0, text = "a" }]
//! new = [{ seq = 0, text = "b" }]
//! edits = ["text @0 <- #0"]
//! ```
//!
//! A node is exactly one of `element`, `text`, `markup` or `region = true`.
//! Elements take `key`, `attributes` and `children`; regions take `children`.

use render_tree::{AttributeValue, Frame, FrameKind};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone, Debug, Deserialize)]
pub struct FixtureFile {
    #[serde(rename = "case", default)]
    pub cases: Vec<DiffCase>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DiffCase {
    pub name: String,
    #[serde(default)]
    pub old: Vec<NodeSpec>,
    #[serde(default)]
    pub new: Vec<NodeSpec>,
    pub edits: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AttributeSpec {
    pub seq: u32,
    pub name: String,
    pub value: toml::Value,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub seq: u32,
    pub element: Option<String>,
    /// Sibling key of an element.
    pub key: Option<String>,
    pub text: Option<String>,
    pub markup: Option<String>,
    #[serde(default)]
    pub region: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("invalid fixture toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("node at sequence {seq} must be exactly one of element, text, markup, region")]
    AmbiguousNode { seq: u32 },
    #[error("unsupported attribute value for {name}")]
    UnsupportedValue { name: String },
}

pub fn parse_fixture_file(source: &str) -> Result<FixtureFile, FixtureError> {
    Ok(toml::from_str(source)?)
}

/// Flattens node specs into a frame sequence with subtree lengths filled in.
pub fn frames_from_specs(specs: &[NodeSpec]) -> Result<Vec<Frame>, FixtureError> {
    let mut frames = Vec::new();
    for spec in specs {
        push_node(spec, &mut frames)?;
    }
    Ok(frames)
}

fn push_node(spec: &NodeSpec, frames: &mut Vec<Frame>) -> Result<(), FixtureError> {
    let kinds = usize::from(spec.element.is_some())
        + usize::from(spec.text.is_some())
        + usize::from(spec.markup.is_some())
        + usize::from(spec.region);
    if kinds != 1 {
        return Err(FixtureError::AmbiguousNode { seq: spec.seq });
    }
    if let Some(text) = &spec.text {
        frames.push(Frame::text(spec.seq, text));
        return Ok(());
    }
    if let Some(markup) = &spec.markup {
        frames.push(Frame::markup(spec.seq, markup));
        return Ok(());
    }
    let start = frames.len();
    match &spec.element {
        Some(name) => {
            let element = Frame::element(spec.seq, name, 0);
            frames.push(match &spec.key {
                Some(key) => element.with_key(key),
                None => element,
            });
            for attribute in &spec.attributes {
                frames.push(Frame::attribute(
                    attribute.seq,
                    &attribute.name,
                    attribute_value(attribute)?,
                ));
            }
        }
        None => frames.push(Frame::region(spec.seq, 0)),
    }
    for child in &spec.children {
        push_node(child, frames)?;
    }
    let length = frames.len() - start;
    match &mut frames[start].kind {
        FrameKind::Element { subtree_length, .. } | FrameKind::Region { subtree_length } => {
            *subtree_length = length;
        }
        _ => {}
    }
    Ok(())
}

fn attribute_value(spec: &AttributeSpec) -> Result<AttributeValue, FixtureError> {
    match &spec.value {
        toml::Value::String(text) => Ok(AttributeValue::Text(Arc::from(text.as_str()))),
        toml::Value::Boolean(value) => Ok(AttributeValue::Bool(*value)),
        toml::Value::Integer(value) => Ok(AttributeValue::Int(*value)),
        toml::Value::Float(value) => Ok(AttributeValue::Float(*value)),
        _ => Err(FixtureError::UnsupportedValue {
            name: spec.name.clone(),
        }),
    }
}

//! Deterministic line snapshots of render output.
//!
//! Equivalence rules:
//! - Regions are transparent; their children are listed as siblings.
//! - Reference captures produce no line.
//! - Attributes are listed sorted by name; for duplicate names the last wins.
//! - Handler and object attribute values are shown by kind only.
//! - Components show as `<#TypeName>`; their content follows indented when known.

use crate::{diff_lines, escape_text};
use render_tree::frame::attribute_run_end;
use render_tree::{AttributeValue, Frame, FrameKind};
use std::collections::BTreeMap;

pub fn format_value(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Text(text) => format!("\"{}\"", escape_text(text)),
        AttributeValue::Bool(value) => value.to_string(),
        AttributeValue::Int(value) => value.to_string(),
        AttributeValue::Float(value) => value.to_string(),
        AttributeValue::Handler(_) => "handler".to_string(),
        AttributeValue::Object(_) => "object".to_string(),
    }
}

pub(crate) fn element_line<'a>(
    depth: usize,
    name: &str,
    attributes: impl IntoIterator<Item = (&'a str, String)>,
) -> String {
    let sorted: BTreeMap<&str, String> = attributes.into_iter().collect();
    let mut line = format!("{}<{name}", "  ".repeat(depth));
    for (name, value) in sorted {
        line.push_str(&format!(" {name}={value}"));
    }
    line.push('>');
    line
}

pub(crate) fn text_line(depth: usize, text: &str) -> String {
    format!("{}\"{}\"", "  ".repeat(depth), escape_text(text))
}

pub(crate) fn markup_line(depth: usize, markup: &str) -> String {
    format!("{}markup \"{}\"", "  ".repeat(depth), escape_text(markup))
}

pub(crate) fn component_line(depth: usize, name: &str) -> String {
    format!("{}<#{name}>", "  ".repeat(depth))
}

/// Snapshot of what a display should hold after rendering `frames`.
pub fn snapshot_frames(frames: &[Frame]) -> Vec<String> {
    let mut lines = Vec::new();
    walk_frames(frames, 0, frames.len(), 0, &mut lines);
    lines
}

fn walk_frames(frames: &[Frame], start: usize, end: usize, depth: usize, lines: &mut Vec<String>) {
    let mut index = start;
    while index < end {
        let frame = &frames[index];
        let length = frame.subtree_length().max(1);
        match &frame.kind {
            FrameKind::Element { name, .. } => {
                let children = attribute_run_end(frames, index);
                let attributes = frames[index + 1..children]
                    .iter()
                    .filter_map(|attr| match &attr.kind {
                        FrameKind::Attribute { name, value, .. } => {
                            Some((&**name, format_value(value)))
                        }
                        _ => None,
                    });
                lines.push(element_line(depth, name, attributes));
                walk_frames(frames, children, index + length, depth + 1, lines);
            }
            FrameKind::Text(text) => lines.push(text_line(depth, text)),
            FrameKind::Markup(markup) => lines.push(markup_line(depth, markup)),
            FrameKind::Component { component_type, .. } => {
                lines.push(component_line(depth, component_type.name()));
            }
            FrameKind::Region { .. } => {
                walk_frames(frames, index + 1, index + length, depth, lines)
            }
            FrameKind::Attribute { .. }
            | FrameKind::ElementReferenceCapture { .. }
            | FrameKind::ComponentReferenceCapture { .. } => {}
        }
        index += length;
    }
}

pub fn assert_lines_eq(expected: &[String], actual: &[String], context: &str) {
    if expected != actual {
        panic!("{context}: snapshot mismatch\n{}", diff_lines(expected, actual));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_are_flattened_and_attributes_sorted() {
        let frames = vec![
            Frame::element(0, "div", 6),
            Frame::attribute(1, "title", "t"),
            Frame::attribute(2, "id", "a"),
            Frame::region(3, 3),
            Frame::text(4, "one"),
            Frame::markup(5, "<i>two</i>"),
        ];
        assert_eq!(
            snapshot_frames(&frames),
            vec![
                "<div id=\"a\" title=\"t\">".to_string(),
                "  \"one\"".to_string(),
                "  markup \"<i>two</i>\"".to_string(),
            ]
        );
    }
}

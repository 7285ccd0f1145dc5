use crate::frame::{Frame, FrameKind};
use std::fmt::Write;

/// Indented one-line-per-frame outline, capped at `cap` lines.
pub fn outline_frames(frames: &[Frame], cap: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut closes: Vec<usize> = Vec::new();
    for (index, frame) in frames.iter().enumerate() {
        while closes.last().is_some_and(|&end| end <= index) {
            closes.pop();
        }
        if out.len() >= cap {
            out.push("…".to_string());
            break;
        }
        let mut line = "  ".repeat(closes.len());
        let _ = write!(&mut line, "[{}] ", frame.sequence);
        match &frame.kind {
            FrameKind::Element { name, key, .. } => {
                let _ = write!(&mut line, "<{name}>");
                if let Some(key) = key {
                    let _ = write!(&mut line, " key={key:?}");
                }
            }
            FrameKind::Text(text) => {
                let _ = write!(&mut line, "{text:?}");
            }
            FrameKind::Markup(markup) => {
                let _ = write!(&mut line, "markup {markup:?}");
            }
            FrameKind::Attribute {
                name,
                value,
                event_handler_id,
            } => {
                let _ = write!(&mut line, "@{name}={value:?}");
                if let Some(id) = event_handler_id {
                    let _ = write!(&mut line, " ({id})");
                }
            }
            FrameKind::Component {
                component_type,
                component_id,
                key,
                ..
            } => {
                let _ = write!(&mut line, "component {component_type:?}");
                if let Some(id) = component_id {
                    let _ = write!(&mut line, " ({id})");
                }
                if let Some(key) = key {
                    let _ = write!(&mut line, " key={key:?}");
                }
            }
            FrameKind::Region { .. } => line.push_str("region"),
            FrameKind::ElementReferenceCapture { reference_id, .. } => {
                let _ = write!(&mut line, "element-ref {reference_id:?}");
            }
            FrameKind::ComponentReferenceCapture { .. } => line.push_str("component-ref"),
        }
        out.push(line);
        let length = frame.subtree_length();
        if length > 1 {
            closes.push(index + length);
        }
    }
    out
}

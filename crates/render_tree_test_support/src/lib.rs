//! Test helpers: a reference display that replays render batches, a
//! renderer-free diff host, line snapshots and TOML diff fixtures.

pub mod display;
pub mod fixtures;
pub mod host;
pub mod snapshot;

pub use display::{DisplayError, DisplayTree};
pub use host::{CountingHost, REPLAY_ROOT, Replay};
pub use snapshot::{assert_lines_eq, snapshot_frames};

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            ch if ch < ' ' => out.push_str(&format!("\\u{{{:02X}}}", ch as u32)),
            _ => out.push(ch),
        }
    }
    out
}

/// Human-readable report of the first differing line, with two lines of context.
pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    use std::fmt::Write;
    const MISSING: &str = "<missing>";
    let mut out = String::new();
    let max = expected.len().max(actual.len());
    let line = |lines: &[String], i: usize| {
        lines
            .get(i)
            .map(String::as_str)
            .unwrap_or(MISSING)
            .to_string()
    };
    match (0..max).find(|&i| line(expected, i) != line(actual, i)) {
        Some(i) => {
            let start = i.saturating_sub(2);
            let end = (i + 3).min(max);
            let _ = writeln!(&mut out, "first mismatch at line {}:", i + 1);
            for row in start..end {
                let marker = if row == i { ">" } else { " " };
                let (want, got) = (line(expected, row), line(actual, row));
                let _ = writeln!(&mut out, "{marker} {:>4}  expected: {want}", row + 1);
                let _ = writeln!(&mut out, "{marker} {:>4}    actual: {got}", row + 1);
            }
        }
        None => {
            let _ = writeln!(&mut out, "no differing line");
        }
    }
    let _ = writeln!(
        &mut out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}

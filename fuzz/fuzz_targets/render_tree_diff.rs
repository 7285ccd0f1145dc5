#![no_main]

//! Builds two render trees from the input bytes, diffs the second against
//! the first and checks the display ends up holding exactly the second.

use libfuzzer_sys::fuzz_target;
use render_tree::{Frame, RenderTreeBuilder};
use render_tree_test_support::{Replay, snapshot_frames};

const NAMES: [&str; 3] = ["div", "span", "li"];
const ATTRIBUTES: [&str; 3] = ["id", "class", "title"];
const TEXTS: [&str; 3] = ["a", "b", ""];
const KEYS: [&str; 3] = ["x", "y", "z"];

#[derive(Clone, Copy, PartialEq)]
enum Scope {
    Element,
    Region,
}

/// Reads opcode/argument byte pairs until `0xff` or the end of the input.
fn build(bytes: &mut impl Iterator<Item = u8>) -> Option<Vec<Frame>> {
    let mut builder = RenderTreeBuilder::new();
    let mut open = Vec::new();
    let mut in_head = false;
    while let Some(op) = bytes.next() {
        if op == 0xff {
            break;
        }
        let arg = bytes.next().unwrap_or(0);
        let sequence = u32::from(arg % 8);
        let pick = usize::from(arg / 8) % 3;
        match op % 7 {
            0 => {
                builder.open_element(sequence, NAMES[pick]);
                open.push(Scope::Element);
                in_head = true;
                continue;
            }
            1 if open.last() == Some(&Scope::Element) => {
                builder.close_element();
                open.pop();
            }
            2 if in_head => {
                builder.add_attribute(sequence, ATTRIBUTES[pick], TEXTS[usize::from(arg) % 3]);
                continue;
            }
            3 => builder.add_text(sequence, TEXTS[pick]),
            4 => {
                builder.open_region(sequence);
                open.push(Scope::Region);
            }
            5 if open.last() == Some(&Scope::Region) => {
                builder.close_region();
                open.pop();
            }
            6 if in_head => {
                // Repeated sibling keys make the tree malformed; it is skipped.
                builder.set_key(KEYS[pick]);
                continue;
            }
            _ => {}
        }
        in_head = false;
    }
    while let Some(scope) = open.pop() {
        match scope {
            Scope::Element => builder.close_element(),
            Scope::Region => builder.close_region(),
        }
    }
    if builder.error().is_some() {
        return None;
    }
    Some(builder.frames().to_vec())
}

fuzz_target!(|data: &[u8]| {
    let mut bytes = data.iter().copied();
    let Some(first) = build(&mut bytes) else {
        return;
    };
    let Some(second) = build(&mut bytes) else {
        return;
    };

    let mut replay = Replay::new();
    for frames in [first, second] {
        let expected = snapshot_frames(&frames);
        if let Err(err) = replay.render(frames) {
            panic!("display rejected the diff: {err}");
        }
        assert_eq!(replay.snapshot().ok(), Some(expected));
    }
});

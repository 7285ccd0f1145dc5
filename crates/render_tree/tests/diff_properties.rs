//! Replaying any diff onto a display holding the previous render must leave
//! exactly what the new frames describe.

use proptest::prelude::*;
use render_tree::{AttributeValue, Frame, FrameKind, RenderTreeEdit};
use render_tree_test_support::{Replay, snapshot_frames};

#[derive(Clone, Debug)]
enum Node {
    Element {
        seq: u32,
        name: &'static str,
        attributes: Vec<(u32, &'static str, AttributeValue)>,
        children: Vec<Node>,
    },
    Text(u32, String),
    Markup(u32, String),
    Region(u32, Vec<Node>),
}

fn attribute() -> impl Strategy<Value = (u32, &'static str, AttributeValue)> {
    let value = prop_oneof![
        "[xy]{0,2}".prop_map(|text| AttributeValue::from(text)),
        any::<bool>().prop_map(AttributeValue::Bool),
        (0i64..3).prop_map(AttributeValue::Int),
    ];
    (0u32..4, prop::sample::select(vec!["id", "class", "title"]), value)
}

fn node() -> impl Strategy<Value = Node> {
    // Small sequence and text alphabets so old and new trees overlap often.
    let leaf = prop_oneof![
        (0u32..6, "[a-c]{0,2}").prop_map(|(seq, text)| Node::Text(seq, text)),
        (0u32..6, "[a-c]{1,2}").prop_map(|(seq, markup)| Node::Markup(seq, markup)),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            (
                0u32..6,
                prop::sample::select(vec!["div", "span", "li"]),
                prop::collection::vec(attribute(), 0..3),
                prop::collection::vec(inner.clone(), 0..4),
            )
                .prop_map(|(seq, name, attributes, children)| Node::Element {
                    seq,
                    name,
                    attributes,
                    children,
                }),
            (0u32..6, prop::collection::vec(inner, 0..3))
                .prop_map(|(seq, children)| Node::Region(seq, children)),
        ]
    })
}

fn tree() -> impl Strategy<Value = Vec<Node>> {
    prop::collection::vec(node(), 0..5)
}

fn flatten(nodes: &[Node]) -> Vec<Frame> {
    let mut frames = Vec::new();
    for node in nodes {
        push(node, &mut frames);
    }
    frames
}

fn push(node: &Node, frames: &mut Vec<Frame>) {
    let start = frames.len();
    match node {
        Node::Text(seq, text) => {
            frames.push(Frame::text(*seq, text));
            return;
        }
        Node::Markup(seq, markup) => {
            frames.push(Frame::markup(*seq, markup));
            return;
        }
        Node::Element {
            seq,
            name,
            attributes,
            children,
        } => {
            frames.push(Frame::element(*seq, name, 0));
            for (seq, name, value) in attributes {
                frames.push(Frame::attribute(*seq, name, value.clone()));
            }
            for child in children {
                push(child, frames);
            }
        }
        Node::Region(seq, children) => {
            frames.push(Frame::region(*seq, 0));
            for child in children {
                push(child, frames);
            }
        }
    }
    let length = frames.len() - start;
    if let FrameKind::Element { subtree_length, .. } | FrameKind::Region { subtree_length } =
        &mut frames[start].kind
    {
        *subtree_length = length;
    }
}

const KEYS: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn keys() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(KEYS.to_vec(), 0..=KEYS.len()).prop_shuffle()
}

/// A `ul` of keyed `li` items whose text is the key, optionally headed by an
/// unkeyed caption sharing the list's sibling range.
fn keyed_list(keys: &[&str], caption: bool) -> Vec<Frame> {
    let mut frames = vec![Frame::element(0, "ul", 0)];
    if caption {
        frames.push(Frame::text(1, "items"));
    }
    for key in keys {
        frames.push(Frame::element(2, "li", 2).with_key(key));
        frames.push(Frame::text(3, key));
    }
    let length = frames.len();
    if let FrameKind::Element { subtree_length, .. } = &mut frames[0].kind {
        *subtree_length = length;
    }
    frames
}

fn is_move_only(edit: &RenderTreeEdit) -> bool {
    matches!(
        edit,
        RenderTreeEdit::StepIn { .. }
            | RenderTreeEdit::StepOut
            | RenderTreeEdit::PermutationListEntry { .. }
            | RenderTreeEdit::PermutationListEnd
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn replayed_diffs_reproduce_every_render(renders in prop::collection::vec(tree(), 1..4)) {
        let mut replay = Replay::new();
        for (step, nodes) in renders.iter().enumerate() {
            let frames = flatten(nodes);
            let expected = snapshot_frames(&frames);
            let applied = replay.render(frames);
            prop_assert!(applied.is_ok(), "render {step} rejected by display: {applied:?}");
            let actual = replay.snapshot();
            prop_assert_eq!(actual, Ok(expected), "render {}", step);
        }
    }

    #[test]
    fn rerendering_the_same_tree_emits_nothing(nodes in tree()) {
        let mut replay = Replay::new();
        let first = replay.render(flatten(&nodes));
        prop_assert!(first.is_ok());
        let second = replay.render(flatten(&nodes));
        prop_assert_eq!(second, Ok(Vec::new()));
    }

    #[test]
    fn keyed_lists_replay_through_inserts_removals_and_moves(
        renders in prop::collection::vec((keys(), any::<bool>()), 1..5)
    ) {
        let mut replay = Replay::new();
        for (step, (keys, caption)) in renders.iter().enumerate() {
            let frames = keyed_list(keys, *caption);
            let expected = snapshot_frames(&frames);
            let applied = replay.render(frames);
            prop_assert!(applied.is_ok(), "render {step} rejected by display: {applied:?}");
            prop_assert_eq!(replay.snapshot(), Ok(expected), "render {}", step);
        }
    }

    #[test]
    fn reordering_keyed_items_only_moves_them(
        (before, after) in keys()
            .prop_flat_map(|keys| (Just(keys.clone()), Just(keys).prop_shuffle()))
    ) {
        let mut replay = Replay::new();
        prop_assert!(replay.render(keyed_list(&before, true)).is_ok());
        let edits = replay.render(keyed_list(&after, true));
        prop_assert!(edits.is_ok());
        let edits = edits.unwrap_or_default();
        prop_assert!(edits.iter().all(is_move_only), "{edits:?}");
        prop_assert_eq!(replay.snapshot(), Ok(snapshot_frames(&keyed_list(&after, true))));
    }
}

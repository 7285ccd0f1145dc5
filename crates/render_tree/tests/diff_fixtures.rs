use render_tree_test_support::fixtures::{frames_from_specs, parse_fixture_file};
use render_tree_test_support::{Replay, assert_lines_eq, snapshot_frames};

const CASES: &str = include_str!("fixtures/diff_cases.toml");

#[test]
fn fixture_cases_produce_expected_edit_scripts() {
    let file = parse_fixture_file(CASES).expect("fixture file parses");
    assert!(!file.cases.is_empty());
    for case in &file.cases {
        let old = frames_from_specs(&case.old).expect("old frames");
        let new = frames_from_specs(&case.new).expect("new frames");
        let expected_snapshot = snapshot_frames(&new);

        let mut replay = Replay::new();
        replay.render(old).expect("initial render applies");
        let edits = replay.render(new).expect("update applies");
        let actual: Vec<String> = edits.iter().map(ToString::to_string).collect();
        assert_lines_eq(&case.edits, &actual, &format!("{}: edits", case.name));
        assert_lines_eq(
            &expected_snapshot,
            &replay.snapshot().expect("root attached"),
            &format!("{}: display", case.name),
        );
    }
}

#[test]
fn rerendering_identical_fixtures_is_silent() {
    let file = parse_fixture_file(CASES).expect("fixture file parses");
    for case in &file.cases {
        let mut replay = Replay::new();
        replay
            .render(frames_from_specs(&case.new).expect("frames"))
            .expect("initial render applies");
        let edits = replay
            .render(frames_from_specs(&case.new).expect("frames"))
            .expect("rerender applies");
        assert!(edits.is_empty(), "{}: unexpected edits {edits:?}", case.name);
    }
}

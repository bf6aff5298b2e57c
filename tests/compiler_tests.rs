/// Compiler integration tests: authored fixtures through to compiled chapters and cases.

use narrative_compiler::core::compiler::Compiler;
use narrative_compiler::core::diagnostics::{Diagnostic, RecordRef};
use narrative_compiler::core::manifest::ChapterDocument;
use narrative_compiler::core::source::SourceSet;
use narrative_compiler::schema::case::{Difficulty, Unlock};
use narrative_compiler::schema::node::{Next, NodeKind, Pov};
use pretty_assertions::assert_eq;
use std::path::Path;

fn load(dir: &str) -> SourceSet {
    SourceSet::load_from_dir(Path::new(dir)).unwrap()
}

#[test]
fn fixture_chapters_get_deterministic_ids() {
    let compilation = Compiler::new("english").compile_all(&load("tests/fixtures/content"));
    assert!(compilation.report.is_empty(), "{}", compilation.report.summary());
    assert_eq!(compilation.chapters.len(), 2);

    let ids: Vec<&str> = compilation.chapters[0]
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(
        ids,
        vec![
            "CH1_START",
            "CH1_002",
            "CH1_ALEX_001",
            "CH1_ALEX_002",
            "CH1_JORDAN_001",
            "CH1_JORDAN_002",
            "CH1_INVESTIGATION",
            "CH1_END",
        ]
    );
    assert_eq!(compilation.chapters[0].entry, "CH1_START");
}

#[test]
fn perspective_choice_fans_out_and_tracks_converge() {
    let compilation = Compiler::new("english").compile_all(&load("tests/fixtures/content"));
    let chapter = &compilation.chapters[0];

    let choice = chapter.node("CH1_002").unwrap();
    assert_eq!(choice.kind, NodeKind::Choice);
    let Next::Choice(options) = &choice.next else {
        panic!("expected a choice, got {:?}", choice.next);
    };
    let targets: Vec<&str> = options.iter().map(|o| o.target.as_str()).collect();
    assert_eq!(targets, vec!["CH1_ALEX_001", "CH1_JORDAN_001"]);
    assert_eq!(options[0].text["french"], "Suivre Alex");

    for last in ["CH1_ALEX_002", "CH1_JORDAN_002"] {
        assert_eq!(
            chapter.node(last).unwrap().next,
            Next::Node("CH1_INVESTIGATION".to_string())
        );
    }
    assert_eq!(
        chapter.node("CH1_ALEX_001").unwrap().pov,
        Pov::Track("alex".to_string())
    );
    assert_eq!(chapter.tracks[1].nodes, vec!["CH1_JORDAN_001", "CH1_JORDAN_002"]);
    assert!(chapter.node("CH1_START").unwrap().has_tag("opening"));
}

#[test]
fn chapter_ends_link_forward_then_terminate() {
    let compilation = Compiler::new("english").compile_all(&load("tests/fixtures/content"));
    assert_eq!(
        compilation.chapters[0].node("CH1_END").unwrap().next,
        Next::CrossChapter(2)
    );
    assert_eq!(
        compilation.chapters[1].node("CH2_END").unwrap().next,
        Next::Terminal
    );
}

#[test]
fn configured_final_chapter_overrides_highest_number() {
    let compilation = Compiler::new("english")
        .final_chapter(5)
        .compile_all(&load("tests/fixtures/content"));
    assert_eq!(
        compilation.chapters[1].node("CH2_END").unwrap().next,
        Next::CrossChapter(3)
    );
}

#[test]
fn fixture_case_compiles() {
    let compilation = Compiler::new("english").compile_all(&load("tests/fixtures/content"));
    let case = &compilation.cases[0];
    assert_eq!(case.case_id, "CASE_001");
    assert_eq!(case.difficulty, Difficulty::Easy);
    assert_eq!(case.questions[0].id, "Q001");
    assert_eq!(case.questions[0].unlocks, vec![Unlock::Question("Q002".to_string())]);
    assert_eq!(case.questions[2].unlocks, vec![Unlock::Solution]);
    assert_eq!(case.estimated_time.as_deref(), Some("5 min"));
}

#[test]
fn compiling_twice_is_byte_identical() {
    let sources = load("tests/fixtures/content");
    let first = Compiler::new("english").compile_all(&sources);
    let second = Compiler::new("english").compile_all(&sources);
    assert_eq!(first.chapters, second.chapters);
    assert_eq!(first.cases, second.cases);

    for (a, b) in first.chapters.iter().zip(&second.chapters) {
        assert_eq!(
            ChapterDocument::new(a).to_json_pretty().unwrap(),
            ChapterDocument::new(b).to_json_pretty().unwrap()
        );
    }
}

#[test]
fn malformed_records_are_dropped_individually() {
    let sources = load("tests/fixtures/malformed");
    assert_eq!(sources.rejected.len(), 1);

    let compilation = Compiler::new("english").compile_all(&sources);
    assert!(compilation.chapters.is_empty());
    assert_eq!(compilation.cases.len(), 1);

    let diagnostics = &compilation.report.diagnostics;
    assert_eq!(diagnostics.len(), 3);
    assert!(diagnostics.iter().all(Diagnostic::is_error));
    assert!(matches!(
        &diagnostics[0],
        Diagnostic::MalformedContent { record: RecordRef::File { path }, .. } if path.ends_with("chapter_2.ron")
    ));
    assert!(diagnostics.contains(&Diagnostic::malformed(
        RecordRef::chapter_node(1, "CH1_START"),
        "kind",
        "unknown kind 'cutscene'",
    )));
    assert!(diagnostics.contains(&Diagnostic::malformed(
        RecordRef::chapter_node(1, "CH1_002"),
        "text",
        "missing 'english' text",
    )));
}

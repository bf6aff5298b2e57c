/// Link validator: whole-graph integrity checks over compiled content.
///
/// Read-only and exhaustive: every chapter and case is checked and every
/// problem collected, so an author sees the full list in one run.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::core::diagnostics::{Diagnostic, Report};
use crate::core::ids;
use crate::schema::case::{PuzzleCase, Unlock};
use crate::schema::chapter::Chapter;
use crate::schema::node::{Next, Node, NodeKind};

/// Validate a complete, merged set of chapters and cases.
///
/// Chapters are checked in number order; the highest-numbered chapter is
/// the final one and is the only one allowed to reach the terminal sentinel.
pub fn validate(chapters: &[Chapter], cases: &[PuzzleCase]) -> Report {
    let mut report = Report::new();

    let mut ordered: Vec<&Chapter> = chapters.iter().collect();
    ordered.sort_by_key(|c| c.number);
    let numbers: FxHashSet<u32> = ordered.iter().map(|c| c.number).collect();
    let final_chapter = ordered.last().map(|c| c.number).unwrap_or(0);

    for chapter in ordered {
        let diagnostics = validate_chapter(chapter, &numbers, final_chapter);
        debug!(chapter = chapter.number, problems = diagnostics.len(), "validated chapter");
        report.extend(diagnostics);
    }

    let mut ordered_cases: Vec<&PuzzleCase> = cases.iter().collect();
    ordered_cases.sort_by_key(|c| c.number);
    for case in ordered_cases {
        let diagnostics = validate_case(case);
        debug!(case = %case.case_id, problems = diagnostics.len(), "validated case");
        report.extend(diagnostics);
    }

    info!(
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "validation finished"
    );
    report
}

/// Check one chapter's links, convergence structure and reachability.
///
/// `chapters` holds every chapter number in the compile set.
pub fn validate_chapter(
    chapter: &Chapter,
    chapters: &FxHashSet<u32>,
    final_chapter: u32,
) -> Vec<Diagnostic> {
    let n = chapter.number;
    let mut diagnostics = Vec::new();
    let index: FxHashMap<&str, &Node> = chapter.nodes.iter().map(|node| (node.id.as_str(), node)).collect();

    let has_entry = index.contains_key(chapter.entry.as_str());
    if !has_entry {
        diagnostics.push(Diagnostic::MissingEntryNode {
            chapter: n,
            entry: chapter.entry.clone(),
        });
    }

    for node in &chapter.nodes {
        let broken = broken_targets(node, n, &index, chapters, final_chapter);
        let link_ok = broken.is_empty();
        for target in broken {
            diagnostics.push(Diagnostic::BrokenLink {
                chapter: n,
                node_id: node.id.clone(),
                target,
            });
        }

        if node.kind == NodeKind::ChapterEnd && link_ok {
            let expected = if n == final_chapter {
                Next::Terminal
            } else {
                Next::CrossChapter(n + 1)
            };
            if node.next != expected {
                diagnostics.push(Diagnostic::ChapterEndMismatch {
                    chapter: n,
                    node_id: node.id.clone(),
                    expected: expected.targets().join(", "),
                });
            }
        }
    }

    diagnostics.extend(check_convergence(chapter, &index));

    if has_entry {
        let reachable = reachable_from(&index, chapter.entry.as_str());
        for node in &chapter.nodes {
            if !reachable.contains(node.id.as_str()) {
                diagnostics.push(Diagnostic::UnreachableNode {
                    chapter: n,
                    node_id: node.id.clone(),
                });
            }
        }
    }

    diagnostics
}

/// Targets of `node` that resolve to nothing valid, rendered as ids.
fn broken_targets(
    node: &Node,
    chapter: u32,
    index: &FxHashMap<&str, &Node>,
    chapters: &FxHashSet<u32>,
    final_chapter: u32,
) -> Vec<String> {
    match &node.next {
        Next::Node(id) => {
            if index.contains_key(id.as_str()) {
                Vec::new()
            } else {
                vec![id.clone()]
            }
        }
        Next::Choice(options) => options
            .iter()
            .filter(|o| !index.contains_key(o.target.as_str()))
            .map(|o| o.target.clone())
            .collect(),
        // Forward by exactly one, into a chapter that exists.
        Next::CrossChapter(target) => {
            if *target == chapter + 1 && chapters.contains(target) {
                Vec::new()
            } else {
                vec![ids::entry_id(*target)]
            }
        }
        Next::Terminal => {
            if chapter == final_chapter {
                Vec::new()
            } else {
                node.next.targets()
            }
        }
    }
}

/// Every non-`all` track must reach the single investigation node, and the
/// investigation node must reach the single chapter end.
fn check_convergence(chapter: &Chapter, index: &FxHashMap<&str, &Node>) -> Vec<Diagnostic> {
    let n = chapter.number;
    let mut diagnostics = Vec::new();

    let investigations: Vec<&Node> = chapter.nodes_of_kind(NodeKind::Investigation).collect();
    let endings: Vec<&Node> = chapter.nodes_of_kind(NodeKind::ChapterEnd).collect();
    for (kind, found) in [
        (NodeKind::Investigation, investigations.len()),
        (NodeKind::ChapterEnd, endings.len()),
    ] {
        if found != 1 {
            diagnostics.push(Diagnostic::MissingConvergence {
                chapter: n,
                node_kind: kind,
                found,
            });
        }
    }
    let ([investigation], [ending]) = (investigations.as_slice(), endings.as_slice()) else {
        return diagnostics;
    };

    for track in &chapter.tracks {
        let Some(first) = track.first() else {
            continue;
        };
        if !reachable_from(index, first).contains(investigation.id.as_str()) {
            diagnostics.push(Diagnostic::NoConvergencePath {
                chapter: n,
                from: first.to_string(),
                to: investigation.id.clone(),
            });
        }
    }

    if !reachable_from(index, &investigation.id).contains(ending.id.as_str()) {
        diagnostics.push(Diagnostic::NoConvergencePath {
            chapter: n,
            from: investigation.id.clone(),
            to: ending.id.clone(),
        });
    }

    diagnostics
}

/// Ids reachable from `start` within one chapter, `start` included if it
/// exists. Depth-first with a visited set; cycles are fine.
fn reachable_from<'a>(index: &FxHashMap<&'a str, &'a Node>, start: &str) -> FxHashSet<&'a str> {
    let mut visited = FxHashSet::default();
    let Some((&start, _)) = index.get_key_value(start) else {
        return visited;
    };
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(node) = index.get(id) {
            for target in node.local_targets() {
                if let Some((&target, _)) = index.get_key_value(target) {
                    if !visited.contains(target) {
                        stack.push(target);
                    }
                }
            }
        }
    }
    visited
}

/// Check a case's unlock relation: known targets, no cycles, and every
/// question eventually leading to `SOLUTION`.
///
/// When a cycle is found, solution reachability is not computed.
pub fn validate_case(case: &PuzzleCase) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let known: FxHashSet<&str> = case.questions.iter().map(|q| q.id.as_str()).collect();

    let mut edges: FxHashMap<&str, Vec<&Unlock>> = FxHashMap::default();
    for question in &case.questions {
        let mut targets = Vec::new();
        for unlock in &question.unlocks {
            match unlock {
                Unlock::Question(target) if !known.contains(target.as_str()) => {
                    diagnostics.push(Diagnostic::UnknownUnlock {
                        case_id: case.case_id.clone(),
                        question_id: question.id.clone(),
                        target: target.clone(),
                    });
                }
                _ => targets.push(unlock),
            }
        }
        edges.insert(question.id.as_str(), targets);
    }

    let cycles = find_cycles(case, &edges);
    if !cycles.is_empty() {
        for cycle in cycles {
            diagnostics.push(Diagnostic::CyclicUnlock {
                case_id: case.case_id.clone(),
                cycle,
            });
        }
        return diagnostics;
    }

    let solvable = solvable_questions(case, &edges);
    for question in &case.questions {
        if !solvable.get(question.id.as_str()).copied().unwrap_or(false) {
            diagnostics.push(Diagnostic::SolutionUnreachable {
                case_id: case.case_id.clone(),
                question_id: question.id.clone(),
            });
        }
    }

    diagnostics
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Every cycle closed by a back edge during a depth-first walk, each
/// rendered as `[a, b, ..., a]`.
///
/// The walk starts from the root questions; questions still unvisited
/// afterwards sit on or behind a cycle no root leads into.
fn find_cycles<'a>(
    case: &'a PuzzleCase,
    edges: &FxHashMap<&'a str, Vec<&'a Unlock>>,
) -> Vec<Vec<String>> {
    let mut marks: FxHashMap<&'a str, Mark> = FxHashMap::default();
    let mut cycles = Vec::new();

    let starts = case.root_questions().into_iter().chain(case.questions.iter());
    for start in starts {
        let start = start.id.as_str();
        if marks.contains_key(start) {
            continue;
        }
        marks.insert(start, Mark::InProgress);
        // Current path, each question paired with its next unlock to visit.
        let mut path: Vec<(&'a str, usize)> = vec![(start, 0)];
        while let Some(frame) = path.last_mut() {
            let (id, position) = *frame;
            let unlocks = edges.get(id).map(Vec::as_slice).unwrap_or_default();
            let Some(&unlock) = unlocks.get(position) else {
                marks.insert(id, Mark::Done);
                path.pop();
                continue;
            };
            frame.1 += 1;
            let Unlock::Question(target) = unlock else {
                continue;
            };
            let target = target.as_str();
            match marks.get(target) {
                Some(Mark::InProgress) => {
                    let begin = path.iter().position(|(p, _)| *p == target).unwrap_or(0);
                    let mut cycle: Vec<String> = path[begin..].iter().map(|(p, _)| p.to_string()).collect();
                    cycle.push(target.to_string());
                    cycles.push(cycle);
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(target, Mark::InProgress);
                    path.push((target, 0));
                }
            }
        }
    }
    cycles
}

/// For each question, whether `SOLUTION` is reachable from it. Only called
/// on acyclic relations; evaluated children-first with an explicit stack.
fn solvable_questions<'a>(
    case: &'a PuzzleCase,
    edges: &FxHashMap<&'a str, Vec<&'a Unlock>>,
) -> FxHashMap<&'a str, bool> {
    let mut solved: FxHashMap<&'a str, bool> = FxHashMap::default();
    for question in &case.questions {
        let mut stack = vec![question.id.as_str()];
        while let Some(&id) = stack.last() {
            if solved.contains_key(id) {
                stack.pop();
                continue;
            }
            let mut reaches = false;
            let mut pending = false;
            for &unlock in edges.get(id).map(Vec::as_slice).unwrap_or_default() {
                match unlock {
                    Unlock::Solution => reaches = true,
                    Unlock::Question(target) => match solved.get(target.as_str()) {
                        Some(&known) => reaches |= known,
                        None => {
                            stack.push(target.as_str());
                            pending = true;
                        }
                    },
                }
            }
            if !pending {
                solved.insert(id, reaches);
                stack.pop();
            }
        }
    }
    solved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::case::{Answer, Difficulty, Question};
    use crate::schema::chapter::Track;
    use crate::schema::node::{ChoiceOption, LocalizedText, Pov};
    use std::collections::BTreeSet;

    fn node(id: &str, kind: NodeKind, next: Next, pov: Pov) -> Node {
        Node {
            id: id.to_string(),
            kind,
            speaker: None,
            text: LocalizedText::from([("english".to_string(), id.to_string())]),
            next,
            pov,
            tags: BTreeSet::new(),
        }
    }

    fn to(id: &str) -> Next {
        Next::Node(id.to_string())
    }

    fn linear_chapter(n: u32, end_next: Next) -> Chapter {
        let p = |s: &str| format!("CH{}_{}", n, s);
        Chapter::new(
            n,
            LocalizedText::new(),
            p("START"),
            vec![Track {
                pov: "emperor".to_string(),
                nodes: vec![p("002"), p("003")],
            }],
            vec![
                node(&p("START"), NodeKind::Dialogue, to(&p("002")), Pov::All),
                node(&p("002"), NodeKind::Dialogue, to(&p("003")), Pov::Track("emperor".to_string())),
                node(&p("003"), NodeKind::Dialogue, to(&p("INVESTIGATION")), Pov::Track("emperor".to_string())),
                node(&p("INVESTIGATION"), NodeKind::Investigation, to(&p("END")), Pov::All),
                node(&p("END"), NodeKind::ChapterEnd, end_next, Pov::All),
            ],
        )
        .unwrap()
    }

    fn set(numbers: &[u32]) -> FxHashSet<u32> {
        numbers.iter().copied().collect()
    }

    #[test]
    fn linear_chapter_is_valid() {
        let report = validate(&[linear_chapter(1, Next::Terminal)], &[]);
        assert!(report.is_valid(), "{:?}", report);
    }

    #[test]
    fn broken_link_reported_once() {
        let mut chapter = linear_chapter(2, Next::Terminal);
        chapter.nodes[1].next = to("CH2_999");
        let diagnostics = validate_chapter(&chapter, &set(&[2]), 2);
        let broken: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::BrokenLink { .. }))
            .collect();
        assert_eq!(
            broken,
            vec![&Diagnostic::BrokenLink {
                chapter: 2,
                node_id: "CH2_002".to_string(),
                target: "CH2_999".to_string(),
            }]
        );
    }

    #[test]
    fn cross_chapter_must_advance_by_one() {
        let chapters = set(&[1, 2, 3]);
        for target in [1, 3] {
            let chapter = linear_chapter(1, Next::CrossChapter(target));
            let diagnostics = validate_chapter(&chapter, &chapters, 3);
            assert!(diagnostics.contains(&Diagnostic::BrokenLink {
                chapter: 1,
                node_id: "CH1_END".to_string(),
                target: format!("CH{}_START", target),
            }));
            // A broken ending is not also reported as a mismatch.
            assert!(!diagnostics
                .iter()
                .any(|d| matches!(d, Diagnostic::ChapterEndMismatch { .. })));
        }
        let ok = validate_chapter(&linear_chapter(1, Next::CrossChapter(2)), &chapters, 3);
        assert!(ok.is_empty(), "{:?}", ok);
    }

    #[test]
    fn cross_chapter_into_missing_chapter_is_broken() {
        let diagnostics = validate_chapter(&linear_chapter(1, Next::CrossChapter(2)), &set(&[1, 3]), 3);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn terminal_only_from_final_chapter() {
        let diagnostics = validate_chapter(&linear_chapter(1, Next::Terminal), &set(&[1, 2]), 2);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::BrokenLink {
                chapter: 1,
                node_id: "CH1_END".to_string(),
                target: "ENDING".to_string(),
            }]
        );
    }

    #[test]
    fn ending_that_loops_back_is_a_mismatch() {
        let diagnostics = validate_chapter(&linear_chapter(1, to("CH1_START")), &set(&[1]), 1);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::ChapterEndMismatch {
                chapter: 1,
                node_id: "CH1_END".to_string(),
                expected: "ENDING".to_string(),
            }]
        );
    }

    #[test]
    fn missing_entry_skips_reachability() {
        let mut chapter = linear_chapter(1, Next::Terminal);
        chapter.entry = "CH1_OPENING".to_string();
        let diagnostics = validate_chapter(&chapter, &set(&[1]), 1);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::MissingEntryNode {
                chapter: 1,
                entry: "CH1_OPENING".to_string(),
            }]
        );
    }

    #[test]
    fn orphan_is_unreachable_but_not_fatal() {
        let mut chapter = linear_chapter(1, Next::Terminal);
        chapter.nodes.push(node("CH1_ORPHAN", NodeKind::Dialogue, to("CH1_END"), Pov::All));
        let report = validate(&[chapter], &[]);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::UnreachableNode {
                chapter: 1,
                node_id: "CH1_ORPHAN".to_string(),
            }]
        );
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn revisiting_nodes_terminates() {
        let mut chapter = linear_chapter(1, Next::Terminal);
        chapter.nodes[2].next = Next::Choice(vec![
            ChoiceOption {
                text: LocalizedText::new(),
                target: "CH1_002".to_string(),
            },
            ChoiceOption {
                text: LocalizedText::new(),
                target: "CH1_INVESTIGATION".to_string(),
            },
        ]);
        assert!(validate(&[chapter], &[]).is_valid());
    }

    #[test]
    fn track_without_path_to_investigation() {
        let mut chapter = linear_chapter(1, Next::Terminal);
        chapter.nodes[2].next = to("CH1_002");
        let diagnostics = validate_chapter(&chapter, &set(&[1]), 1);
        assert!(diagnostics.contains(&Diagnostic::NoConvergencePath {
            chapter: 1,
            from: "CH1_002".to_string(),
            to: "CH1_INVESTIGATION".to_string(),
        }));
    }

    #[test]
    fn second_investigation_node_is_reported() {
        let mut chapter = linear_chapter(1, Next::Terminal);
        chapter.nodes[2].kind = NodeKind::Investigation;
        let diagnostics = validate_chapter(&chapter, &set(&[1]), 1);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::MissingConvergence {
                chapter: 1,
                node_kind: NodeKind::Investigation,
                found: 2,
            }]
        );
    }

    fn question(id: &str, unlocks: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            text: LocalizedText::new(),
            answer: Answer::No,
            unlocks: unlocks.iter().map(|u| Unlock::from(u.to_string())).collect(),
        }
    }

    fn case(questions: Vec<Question>) -> PuzzleCase {
        PuzzleCase {
            number: 1,
            case_id: "CASE_001".to_string(),
            title: LocalizedText::new(),
            difficulty: Difficulty::Medium,
            scenario: LocalizedText::new(),
            questions,
            solution: LocalizedText::new(),
            hints: Vec::new(),
            estimated_time: None,
        }
    }

    #[test]
    fn solvable_case_is_valid() {
        let c = case(vec![
            question("Q001", &["Q002", "Q003"]),
            question("Q002", &["Q004"]),
            question("Q003", &["SOLUTION"]),
            question("Q004", &["SOLUTION"]),
        ]);
        assert!(validate_case(&c).is_empty());
    }

    #[test]
    fn cycle_reported_without_reachability() {
        let c = case(vec![question("Q001", &["Q002"]), question("Q002", &["Q001"])]);
        assert_eq!(
            validate_case(&c),
            vec![Diagnostic::CyclicUnlock {
                case_id: "CASE_001".to_string(),
                cycle: vec!["Q001".to_string(), "Q002".to_string(), "Q001".to_string()],
            }]
        );
    }

    #[test]
    fn dead_end_question_cannot_reach_solution() {
        let c = case(vec![
            question("Q001", &["Q002", "Q003"]),
            question("Q002", &["SOLUTION"]),
            question("Q003", &[]),
        ]);
        assert_eq!(
            validate_case(&c),
            vec![Diagnostic::SolutionUnreachable {
                case_id: "CASE_001".to_string(),
                question_id: "Q003".to_string(),
            }]
        );
    }

    #[test]
    fn long_unlock_chains_do_not_exhaust_the_stack() {
        const LEN: usize = 50_000;
        let ids: Vec<String> = (0..LEN).map(|i| format!("Q{i}")).collect();
        let chain = |last: &str| -> Vec<Question> {
            (0..LEN)
                .map(|i| match ids.get(i + 1) {
                    Some(next) => question(&ids[i], &[next.as_str()]),
                    None => question(&ids[i], &[last]),
                })
                .collect()
        };

        assert!(validate_case(&case(chain("SOLUTION"))).is_empty());

        let looped = validate_case(&case(chain("Q0")));
        assert_eq!(looped.len(), 1);
        let Diagnostic::CyclicUnlock { cycle, .. } = &looped[0] else {
            panic!("expected a cycle, got {:?}", looped[0]);
        };
        assert_eq!(cycle.len(), LEN + 1);
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn unknown_unlock_target() {
        let c = case(vec![question("Q001", &["Q009", "SOLUTION"])]);
        assert_eq!(
            validate_case(&c),
            vec![Diagnostic::UnknownUnlock {
                case_id: "CASE_001".to_string(),
                question_id: "Q001".to_string(),
                target: "Q009".to_string(),
            }]
        );
    }
}

/// Graph compiler: authored records → Content Record Model.
///
/// Assigns deterministic ids, fills in default linkage between prologue,
/// perspective tracks, investigation and chapter end, and checks each
/// node is individually well-formed. Reachability is left to the validator.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::diagnostics::{Diagnostic, RecordRef, Report};
use crate::core::ids::{self, Slot};
use crate::core::source::{RawCase, RawChapter, RawNext, RawNode, SourceSet};
use crate::schema::case::{Answer, Difficulty, PuzzleCase, Question, Unlock};
use crate::schema::chapter::{Chapter, Track};
use crate::schema::node::{ChoiceOption, LocalizedText, Next, Node, NodeKind, Pov};

/// Everything one compile run produced. Records with malformed content are
/// absent from `chapters`/`cases` and explained in `report`.
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    pub chapters: Vec<Chapter>,
    pub cases: Vec<PuzzleCase>,
    pub report: Report,
}

/// Compiles chapters and cases against a reference language.
#[derive(Debug, Clone)]
pub struct Compiler {
    reference_language: String,
    final_chapter: Option<u32>,
}

/// Position of a raw node within its chapter layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Prologue,
    Track,
    Investigation,
    Ending,
}

/// A raw node with its assigned id and default linkage.
struct Placed<'r> {
    raw: &'r RawNode,
    id: String,
    section: Section,
    pov: Pov,
    default_next: Next,
}

impl Compiler {
    pub fn new(reference_language: &str) -> Self {
        Self {
            reference_language: reference_language.to_string(),
            final_chapter: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            reference_language: config.reference_language.clone(),
            final_chapter: config.final_chapter,
        }
    }

    /// Chapter whose ending leads to the terminal sentinel.
    pub fn final_chapter(mut self, number: u32) -> Self {
        self.final_chapter = Some(number);
        self
    }

    pub fn reference_language(&self) -> &str {
        &self.reference_language
    }

    /// Compile every record of a source set.
    ///
    /// Chapters and cases compile on scoped worker threads; results are
    /// merged in number order, so output never depends on scheduling.
    pub fn compile_all(&self, sources: &SourceSet) -> Compilation {
        let mut report = Report::new();
        report.extend(sources.rejected.iter().cloned());

        let raw_chapters = dedupe_by_number(
            &sources.chapters,
            |c| c.number,
            |n| Diagnostic::malformed(RecordRef::chapter(n), "number", "duplicate chapter number"),
            &mut report,
        );
        let raw_cases = dedupe_by_number(
            &sources.cases,
            |c| c.number,
            |n| Diagnostic::malformed(RecordRef::case(n), "number", "duplicate case number"),
            &mut report,
        );

        let final_chapter = self
            .final_chapter
            .or_else(|| raw_chapters.iter().map(|c| c.number).max());
        let compiler = Compiler {
            reference_language: self.reference_language.clone(),
            final_chapter,
        };
        let compiler = &compiler;

        let (chapter_results, case_results) = std::thread::scope(|scope| {
            let chapter_handles: Vec<_> = raw_chapters
                .iter()
                .map(|raw| scope.spawn(move || compiler.compile_chapter(raw)))
                .collect();
            let case_handles: Vec<_> = raw_cases
                .iter()
                .map(|raw| scope.spawn(move || compiler.compile_case(raw)))
                .collect();

            let chapters: Vec<_> = chapter_handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect();
            let cases: Vec<_> = case_handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect();
            (chapters, cases)
        });

        let mut compilation = Compilation::default();
        for result in chapter_results {
            match result {
                Ok(chapter) => compilation.chapters.push(chapter),
                Err(diagnostics) => report.extend(diagnostics),
            }
        }
        for result in case_results {
            match result {
                Ok(case) => compilation.cases.push(case),
                Err(diagnostics) => report.extend(diagnostics),
            }
        }
        compilation.report = report;

        info!(
            chapters = compilation.chapters.len(),
            cases = compilation.cases.len(),
            diagnostics = compilation.report.len(),
            "compilation finished"
        );
        compilation
    }

    /// Compile one chapter, or return every problem found in it.
    pub fn compile_chapter(&self, raw: &RawChapter) -> Result<Chapter, Vec<Diagnostic>> {
        let n = raw.number;
        let mut errors = Vec::new();

        if !raw.title.contains_key(&self.reference_language) {
            errors.push(self.missing_text(RecordRef::chapter(n), "title"));
        }
        if raw.prologue.is_empty() {
            errors.push(Diagnostic::malformed(
                RecordRef::chapter(n),
                "prologue",
                "at least one opening node is required",
            ));
        }
        let mut povs = BTreeSet::new();
        for (t, track) in raw.tracks.iter().enumerate() {
            if !povs.insert(track.pov.as_str()) {
                errors.push(Diagnostic::malformed(
                    RecordRef::chapter(n),
                    &format!("tracks[{}].pov", t),
                    format!("perspective '{}' already has a track", track.pov),
                ));
            }
            if track.pov.trim().is_empty() || track.pov == "all" {
                errors.push(Diagnostic::malformed(
                    RecordRef::chapter(n),
                    &format!("tracks[{}].pov", t),
                    "a track needs a perspective name other than 'all'",
                ));
            }
            if track.nodes.is_empty() {
                errors.push(Diagnostic::malformed(
                    RecordRef::chapter(n),
                    &format!("tracks[{}].nodes", t),
                    format!("track '{}' has no nodes", track.pov),
                ));
            }
        }
        let investigation = match &raw.investigation {
            Some(node) => Some(node),
            None => {
                errors.push(Diagnostic::malformed(RecordRef::chapter(n), "investigation", "missing"));
                None
            }
        };
        let ending = match &raw.ending {
            Some(node) => Some(node),
            None => {
                errors.push(Diagnostic::malformed(RecordRef::chapter(n), "ending", "missing"));
                None
            }
        };
        let (Some(investigation), Some(ending)) = (investigation, ending) else {
            return Err(self.reject_chapter(n, errors));
        };
        if raw.prologue.is_empty() || raw.tracks.iter().any(|t| t.nodes.is_empty()) {
            return Err(self.reject_chapter(n, errors));
        }

        let placed = self.place_chapter(raw, investigation, ending);

        let mut nodes = Vec::with_capacity(placed.len());
        for p in &placed {
            match self.build_node(n, p) {
                Ok(node) => nodes.push(node),
                Err(mut node_errors) => errors.append(&mut node_errors),
            }
        }
        if !errors.is_empty() {
            return Err(self.reject_chapter(n, errors));
        }

        let tracks = raw
            .tracks
            .iter()
            .map(|track| Track {
                pov: track.pov.clone(),
                nodes: placed
                    .iter()
                    .filter(|p| p.section == Section::Track && p.pov == Pov::Track(track.pov.clone()))
                    .map(|p| p.id.clone())
                    .collect(),
            })
            .collect();

        match Chapter::new(n, raw.title.clone(), ids::entry_id(n), tracks, nodes) {
            Ok(chapter) => {
                debug!(chapter = n, nodes = chapter.node_count(), "compiled chapter");
                Ok(chapter)
            }
            Err(e) => Err(self.reject_chapter(
                n,
                vec![Diagnostic::malformed(RecordRef::chapter(n), "id", e.to_string())],
            )),
        }
    }

    /// Compile one puzzle case, or return every problem found in it.
    pub fn compile_case(&self, raw: &RawCase) -> Result<PuzzleCase, Vec<Diagnostic>> {
        let n = raw.number;
        let record = RecordRef::case(n);
        let mut errors = Vec::new();

        for (field, text) in [
            ("title", &raw.title),
            ("scenario", &raw.scenario),
            ("solution", &raw.solution),
        ] {
            if !text.contains_key(&self.reference_language) {
                errors.push(self.missing_text(record.clone(), field));
            }
        }
        for (i, hint) in raw.hints.iter().enumerate() {
            if !hint.contains_key(&self.reference_language) {
                errors.push(self.missing_text(record.clone(), &format!("hints[{}]", i)));
            }
        }

        let difficulty = match raw.difficulty.as_deref() {
            None => Difficulty::default(),
            Some(name) => Difficulty::parse(name).unwrap_or_else(|| {
                errors.push(Diagnostic::malformed(
                    record.clone(),
                    "difficulty",
                    format!("unknown difficulty '{}'", name),
                ));
                Difficulty::default()
            }),
        };

        if raw.questions.is_empty() {
            errors.push(Diagnostic::malformed(
                record.clone(),
                "questions",
                "at least one question is required",
            ));
        }

        let mut questions = Vec::with_capacity(raw.questions.len());
        for (i, q) in raw.questions.iter().enumerate() {
            let id = q.id.clone().unwrap_or_else(|| ids::question_id(i));
            let question_ref = RecordRef::case_question(n, id.clone());
            if !q.text.contains_key(&self.reference_language) {
                errors.push(self.missing_text(question_ref.clone(), "text"));
            }
            let answer = match q.answer.as_deref() {
                None => {
                    errors.push(Diagnostic::malformed(question_ref, "answer", "missing"));
                    continue;
                }
                Some(name) => match Answer::parse(name) {
                    Some(answer) => answer,
                    None => {
                        errors.push(Diagnostic::malformed(
                            question_ref,
                            "answer",
                            format!("unknown answer '{}'", name),
                        ));
                        continue;
                    }
                },
            };
            questions.push(Question {
                id,
                text: q.text.clone(),
                answer,
                unlocks: q.unlocks.iter().cloned().map(Unlock::from).collect(),
            });
        }

        if !errors.is_empty() {
            return Err(self.reject_case(n, errors));
        }

        let case = PuzzleCase {
            number: n,
            case_id: raw.case_id.clone().unwrap_or_else(|| ids::case_id(n)),
            title: raw.title.clone(),
            difficulty,
            scenario: raw.scenario.clone(),
            questions,
            solution: raw.solution.clone(),
            hints: raw.hints.clone(),
            estimated_time: raw.estimated_time.clone(),
        };
        if let Err(e) = case.check_questions() {
            return Err(self.reject_case(
                n,
                vec![Diagnostic::malformed(record, "questions", e.to_string())],
            ));
        }

        debug!(case = %case.case_id, questions = case.questions.len(), "compiled case");
        Ok(case)
    }

    /// Assign ids and default linkage to every raw node, in authoring order.
    fn place_chapter<'r>(
        &self,
        raw: &'r RawChapter,
        investigation: &'r RawNode,
        ending: &'r RawNode,
    ) -> Vec<Placed<'r>> {
        let n = raw.number;
        let id_of = |node: &RawNode, slot: Slot<'_>| {
            node.id.clone().unwrap_or_else(|| ids::node_id(n, slot))
        };

        let prologue_ids: Vec<String> = raw
            .prologue
            .iter()
            .enumerate()
            .map(|(i, node)| id_of(node, Slot::Prologue(i)))
            .collect();
        let track_ids: Vec<Vec<String>> = raw
            .tracks
            .iter()
            .map(|track| {
                track
                    .nodes
                    .iter()
                    .enumerate()
                    .map(|(i, node)| {
                        id_of(
                            node,
                            Slot::Track {
                                pov: &track.pov,
                                position: i,
                            },
                        )
                    })
                    .collect()
            })
            .collect();
        let investigation_id = id_of(investigation, Slot::Investigation);
        let ending_id = id_of(ending, Slot::End);

        // A trailing choice without authored options becomes the
        // perspective selector: one option per track.
        let branches = !raw.tracks.is_empty()
            && raw.prologue.last().is_some_and(|last| {
                last.kind.as_deref() == Some("choice") && last.options.is_empty()
            });

        let after_track = |t: usize| -> Next {
            if branches {
                return Next::Node(investigation_id.clone());
            }
            match track_ids.get(t + 1).and_then(|ids| ids.first()) {
                Some(first) => Next::Node(first.clone()),
                None => Next::Node(investigation_id.clone()),
            }
        };

        let mut placed = Vec::new();

        for (i, node) in raw.prologue.iter().enumerate() {
            let default_next = if let Some(next_id) = prologue_ids.get(i + 1) {
                Next::Node(next_id.clone())
            } else if branches {
                Next::Choice(
                    raw.tracks
                        .iter()
                        .zip(&track_ids)
                        .map(|(track, ids)| ChoiceOption {
                            text: self.track_label(track.pov.as_str(), &track.label),
                            target: ids[0].clone(),
                        })
                        .collect(),
                )
            } else {
                match track_ids.first().and_then(|ids| ids.first()) {
                    Some(first) => Next::Node(first.clone()),
                    None => Next::Node(investigation_id.clone()),
                }
            };
            placed.push(Placed {
                raw: node,
                id: prologue_ids[i].clone(),
                section: Section::Prologue,
                pov: Pov::All,
                default_next,
            });
        }

        for (t, track) in raw.tracks.iter().enumerate() {
            for (i, node) in track.nodes.iter().enumerate() {
                let default_next = match track_ids[t].get(i + 1) {
                    Some(next_id) => Next::Node(next_id.clone()),
                    None => after_track(t),
                };
                placed.push(Placed {
                    raw: node,
                    id: track_ids[t][i].clone(),
                    section: Section::Track,
                    pov: Pov::Track(track.pov.clone()),
                    default_next,
                });
            }
        }

        placed.push(Placed {
            raw: investigation,
            id: investigation_id.clone(),
            section: Section::Investigation,
            pov: Pov::All,
            default_next: Next::Node(ending_id.clone()),
        });

        let is_final = self.final_chapter.map_or(true, |last| n >= last);
        placed.push(Placed {
            raw: ending,
            id: ending_id,
            section: Section::Ending,
            pov: Pov::All,
            default_next: if is_final {
                Next::Terminal
            } else {
                Next::CrossChapter(n + 1)
            },
        });

        placed
    }

    fn build_node(&self, chapter: u32, p: &Placed<'_>) -> Result<Node, Vec<Diagnostic>> {
        let record = || RecordRef::chapter_node(chapter, p.id.clone());
        let mut errors = Vec::new();

        let kind = match p.raw.kind.as_deref() {
            None => {
                errors.push(Diagnostic::malformed(record(), "kind", "missing"));
                None
            }
            Some(name) => match NodeKind::parse(name) {
                Some(kind) => Some(kind),
                None => {
                    errors.push(Diagnostic::malformed(
                        record(),
                        "kind",
                        format!("unknown kind '{}'", name),
                    ));
                    None
                }
            },
        };

        if let Some(kind) = kind {
            let expected = match p.section {
                Section::Investigation => Some(NodeKind::Investigation),
                Section::Ending => Some(NodeKind::ChapterEnd),
                Section::Prologue | Section::Track => None,
            };
            let misplaced = match expected {
                Some(expected) => kind != expected,
                None => matches!(kind, NodeKind::Investigation | NodeKind::ChapterEnd),
            };
            if misplaced {
                errors.push(Diagnostic::malformed(
                    record(),
                    "kind",
                    format!("'{}' is not allowed in this position", kind.name()),
                ));
            }
            if p.raw.speaker.is_some() && kind != NodeKind::Dialogue {
                errors.push(Diagnostic::malformed(
                    record(),
                    "speaker",
                    "only dialogue nodes have a speaker",
                ));
            }
        }

        if !p.raw.text.contains_key(&self.reference_language) {
            errors.push(self.missing_text(record(), "text"));
        }

        let next = match kind {
            Some(NodeKind::Choice) => {
                if p.raw.next.is_some() {
                    errors.push(Diagnostic::malformed(
                        record(),
                        "next",
                        "choice nodes link through their options",
                    ));
                }
                if !p.raw.options.is_empty() {
                    let mut options = Vec::with_capacity(p.raw.options.len());
                    for (i, option) in p.raw.options.iter().enumerate() {
                        if !option.text.contains_key(&self.reference_language) {
                            errors.push(self.missing_text(record(), &format!("options[{}].text", i)));
                        }
                        options.push(ChoiceOption {
                            text: option.text.clone(),
                            target: option.target.clone(),
                        });
                    }
                    Some(Next::Choice(options))
                } else if matches!(p.default_next, Next::Choice(_)) {
                    Some(p.default_next.clone())
                } else {
                    errors.push(Diagnostic::malformed(
                        record(),
                        "options",
                        "choice node has no options",
                    ));
                    None
                }
            }
            Some(_) => {
                if !p.raw.options.is_empty() {
                    errors.push(Diagnostic::malformed(
                        record(),
                        "options",
                        "only choice nodes carry options",
                    ));
                }
                Some(match &p.raw.next {
                    Some(raw_next) => convert_next(raw_next),
                    None => p.default_next.clone(),
                })
            }
            None => None,
        };

        match (kind, next) {
            (Some(kind), Some(next)) if errors.is_empty() => Ok(Node {
                id: p.id.clone(),
                kind,
                speaker: p.raw.speaker.clone(),
                text: p.raw.text.clone(),
                next,
                pov: p.pov.clone(),
                tags: p.raw.tags.iter().cloned().collect::<BTreeSet<_>>(),
            }),
            _ => Err(errors),
        }
    }

    fn track_label(&self, pov: &str, label: &LocalizedText) -> LocalizedText {
        if label.contains_key(&self.reference_language) {
            label.clone()
        } else {
            LocalizedText::from([(self.reference_language.clone(), pov.to_string())])
        }
    }

    fn missing_text(&self, record: RecordRef, field: &str) -> Diagnostic {
        Diagnostic::malformed(
            record,
            field,
            format!("missing '{}' text", self.reference_language),
        )
    }

    fn reject_chapter(&self, number: u32, errors: Vec<Diagnostic>) -> Vec<Diagnostic> {
        warn!(chapter = number, problems = errors.len(), "chapter rejected as malformed");
        errors
    }

    fn reject_case(&self, number: u32, errors: Vec<Diagnostic>) -> Vec<Diagnostic> {
        warn!(case = number, problems = errors.len(), "case rejected as malformed");
        errors
    }
}

fn convert_next(raw: &RawNext) -> Next {
    match raw {
        RawNext::Node(id) => Next::Node(id.clone()),
        RawNext::Chapter(n) => Next::CrossChapter(*n),
        RawNext::Ending => Next::Terminal,
    }
}

/// Sort records by number, keeping the first of any duplicate and
/// reporting the rest.
fn dedupe_by_number<'a, T>(
    records: &'a [T],
    number: impl Fn(&T) -> u32,
    duplicate: impl Fn(u32) -> Diagnostic,
    report: &mut Report,
) -> Vec<&'a T> {
    let mut sorted: Vec<&T> = records.iter().collect();
    sorted.sort_by_key(|r| number(*r));
    let mut kept: Vec<&T> = Vec::with_capacity(sorted.len());
    for record in sorted {
        if kept.last().is_some_and(|prev| number(*prev) == number(record)) {
            report.push(duplicate(number(record)));
        } else {
            kept.push(record);
        }
    }
    kept
}

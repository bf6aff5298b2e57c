/// Runtime documents and the content manifest.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::core::diagnostics::Report;
use crate::schema::case::{Difficulty, PuzzleCase, Question};
use crate::schema::chapter::{Chapter, Track};
use crate::schema::node::{LocalizedText, Node};

pub const MANIFEST_VERSION: &str = "1.0";
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("refusing to aggregate content with {0} error diagnostic(s)")]
    InvalidContent(usize),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn chapter_file(number: u32) -> String {
    format!("main/chapter_{}.json", number)
}

pub fn case_file(number: u32) -> String {
    format!("side/case_{}.json", number)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMetadata {
    pub node_count: usize,
    pub track_count: usize,
    pub compiler_version: String,
}

/// One compiled chapter as shipped to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDocument {
    pub chapter: u32,
    pub title: LocalizedText,
    pub entry: String,
    pub tracks: Vec<Track>,
    pub nodes: BTreeMap<String, Node>,
    pub metadata: ChapterMetadata,
}

impl ChapterDocument {
    pub fn new(chapter: &Chapter) -> Self {
        Self {
            chapter: chapter.number,
            title: chapter.title.clone(),
            entry: chapter.entry.clone(),
            tracks: chapter.tracks.clone(),
            nodes: chapter
                .nodes
                .iter()
                .map(|node| (node.id.clone(), node.clone()))
                .collect(),
            metadata: ChapterMetadata {
                node_count: chapter.node_count(),
                track_count: chapter.tracks.len(),
                compiler_version: COMPILER_VERSION.to_string(),
            },
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub question_count: usize,
    pub hint_count: usize,
    pub compiler_version: String,
}

/// One compiled puzzle case as shipped to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDocument {
    pub case_id: String,
    pub title: LocalizedText,
    pub difficulty: Difficulty,
    pub scenario: LocalizedText,
    pub questions: Vec<Question>,
    pub solution: LocalizedText,
    pub hints: Vec<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    pub metadata: CaseMetadata,
}

impl CaseDocument {
    pub fn new(case: &PuzzleCase) -> Self {
        Self {
            case_id: case.case_id.clone(),
            title: case.title.clone(),
            difficulty: case.difficulty,
            scenario: case.scenario.clone(),
            questions: case.questions.clone(),
            solution: case.solution.clone(),
            hints: case.hints.clone(),
            estimated_time: case.estimated_time.clone(),
            metadata: CaseMetadata {
                question_count: case.questions.len(),
                hint_count: case.hints.len(),
                compiler_version: COMPILER_VERSION.to_string(),
            },
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCounts {
    pub main_chapters: usize,
    pub side_cases: usize,
    pub total_nodes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterEntry {
    pub chapter: u32,
    pub file: String,
    pub nodes: usize,
    /// Languages present in the text of every node of the chapter.
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseEntry {
    pub case_id: String,
    pub file: String,
    pub difficulty: Difficulty,
}

/// Summary of a validated content set, consumed by packaging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub content: ContentCounts,
    pub chapters: Vec<ChapterEntry>,
    pub cases: Vec<CaseEntry>,
}

impl Manifest {
    /// Aggregate statistics. Content must already be valid: any
    /// error-severity diagnostic in `report` is refused.
    pub fn build(
        chapters: &[Chapter],
        cases: &[PuzzleCase],
        report: &Report,
    ) -> Result<Manifest, ManifestError> {
        let errors = report.errors().count();
        if errors > 0 {
            return Err(ManifestError::InvalidContent(errors));
        }

        let mut chapter_entries: Vec<ChapterEntry> = chapters
            .iter()
            .map(|chapter| ChapterEntry {
                chapter: chapter.number,
                file: chapter_file(chapter.number),
                nodes: chapter.node_count(),
                languages: covered_languages(&chapter.nodes),
            })
            .collect();
        chapter_entries.sort_by_key(|entry| entry.chapter);

        let mut sorted_cases: Vec<&PuzzleCase> = cases.iter().collect();
        sorted_cases.sort_by_key(|case| case.number);
        let case_entries = sorted_cases
            .into_iter()
            .map(|case| CaseEntry {
                case_id: case.case_id.clone(),
                file: case_file(case.number),
                difficulty: case.difficulty,
            })
            .collect();

        Ok(Manifest {
            version: MANIFEST_VERSION.to_string(),
            content: ContentCounts {
                main_chapters: chapters.len(),
                side_cases: cases.len(),
                total_nodes: chapters.iter().map(Chapter::node_count).sum(),
            },
            chapters: chapter_entries,
            cases: case_entries,
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Intersection of the text languages of `nodes`, sorted.
fn covered_languages(nodes: &[Node]) -> Vec<String> {
    let mut iter = nodes.iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };
    let mut languages: BTreeSet<&str> = first.text.keys().map(String::as_str).collect();
    for node in iter {
        languages.retain(|lang| node.text.contains_key(*lang));
    }
    languages.into_iter().map(str::to_string).collect()
}

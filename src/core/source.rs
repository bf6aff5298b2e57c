/// Authored source records and their loading from RON files.
///
/// Fields the compiler must check are optional here so that an omitted
/// field surfaces as a malformed-content diagnostic naming the field,
/// rather than as an opaque deserialization failure.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::diagnostics::{Diagnostic, RecordRef};
use crate::schema::node::LocalizedText;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("source directory not found: {0}")]
    MissingDir(PathBuf),
}

/// An authored link, already tagged by its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawNext {
    /// A node in the same chapter.
    Node(String),
    /// The entry node of chapter `n`.
    Chapter(u32),
    /// End of the narrative.
    Ending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOption {
    #[serde(default)]
    pub text: LocalizedText,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub text: LocalizedText,
    /// Overrides the default authoring-order linkage.
    #[serde(default)]
    pub next: Option<RawNext>,
    #[serde(default)]
    pub options: Vec<RawOption>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTrack {
    pub pov: String,
    /// Option text when the chapter opens with a perspective choice.
    #[serde(default)]
    pub label: LocalizedText,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "Chapter")]
pub struct RawChapter {
    pub number: u32,
    #[serde(default)]
    pub title: LocalizedText,
    #[serde(default)]
    pub prologue: Vec<RawNode>,
    #[serde(default)]
    pub tracks: Vec<RawTrack>,
    #[serde(default)]
    pub investigation: Option<RawNode>,
    #[serde(default)]
    pub ending: Option<RawNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuestion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: LocalizedText,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub unlocks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "Case")]
pub struct RawCase {
    pub number: u32,
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub title: LocalizedText,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub scenario: LocalizedText,
    #[serde(default)]
    pub questions: Vec<RawQuestion>,
    #[serde(default)]
    pub solution: LocalizedText,
    #[serde(default)]
    pub hints: Vec<LocalizedText>,
    #[serde(default)]
    pub estimated_time: Option<String>,
}

impl RawChapter {
    pub fn parse_ron(input: &str) -> Result<RawChapter, SourceError> {
        Ok(ron::from_str(input)?)
    }

    pub fn load_from_ron(path: &Path) -> Result<RawChapter, SourceError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }
}

impl RawCase {
    pub fn parse_ron(input: &str) -> Result<RawCase, SourceError> {
        Ok(ron::from_str(input)?)
    }

    pub fn load_from_ron(path: &Path) -> Result<RawCase, SourceError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }
}

/// Every authored record of one compile run, fully in memory.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    pub chapters: Vec<RawChapter>,
    pub cases: Vec<RawCase>,
    /// Files that failed to parse, one diagnostic each.
    pub rejected: Vec<Diagnostic>,
}

impl SourceSet {
    /// Load `main/*.ron` as chapters and `side/*.ron` as cases.
    ///
    /// Files are visited in path order. A file that fails to parse is
    /// recorded in `rejected` and does not stop the others from loading.
    pub fn load_from_dir(dir: &Path) -> Result<SourceSet, SourceError> {
        if !dir.is_dir() {
            return Err(SourceError::MissingDir(dir.to_path_buf()));
        }

        let mut set = SourceSet::default();

        let main = dir.join("main");
        if main.is_dir() {
            for path in ron_files_in(&main)? {
                match RawChapter::load_from_ron(&path) {
                    Ok(chapter) => {
                        debug!(path = %path.display(), number = chapter.number, "loaded chapter source");
                        set.chapters.push(chapter);
                    }
                    Err(e) => set.reject(&path, e),
                }
            }
        }

        let side = dir.join("side");
        if side.is_dir() {
            for path in ron_files_in(&side)? {
                match RawCase::load_from_ron(&path) {
                    Ok(case) => {
                        debug!(path = %path.display(), number = case.number, "loaded case source");
                        set.cases.push(case);
                    }
                    Err(e) => set.reject(&path, e),
                }
            }
        }

        Ok(set)
    }

    fn reject(&mut self, path: &Path, error: SourceError) {
        warn!(path = %path.display(), error = %error, "rejected source file");
        self.rejected.push(Diagnostic::malformed(
            RecordRef::File {
                path: path.display().to_string(),
            },
            "file",
            error.to_string(),
        ));
    }
}

/// All `.ron` files directly inside `dir`, sorted by path.
fn ron_files_in(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_chapter() {
        let chapter = RawChapter::parse_ron(
            r#"Chapter(
                number: 1,
                title: {"english": "Chapter 1"},
                prologue: [(kind: Some("dialogue"), text: {"english": "Begin."})],
                investigation: Some((kind: Some("investigation"), text: {"english": "Compare."})),
                ending: Some((kind: Some("chapter_end"), text: {"english": "Fin."})),
            )"#,
        )
        .unwrap();
        assert_eq!(chapter.number, 1);
        assert_eq!(chapter.prologue.len(), 1);
        assert!(chapter.tracks.is_empty());
        assert!(chapter.ending.is_some());
    }

    #[test]
    fn parse_tagged_next() {
        let node: RawNode = ron::from_str(
            r#"(kind: Some("dialogue"), text: {"english": "Onward."}, next: Some(Chapter(3)))"#,
        )
        .unwrap();
        assert_eq!(node.next, Some(RawNext::Chapter(3)));

        let node: RawNode = ron::from_str(r#"(next: Some(Node("CH1_010")))"#).unwrap();
        assert_eq!(node.next, Some(RawNext::Node("CH1_010".to_string())));
        assert!(node.kind.is_none());
    }

    #[test]
    fn parse_case() {
        let case = RawCase::parse_ron(
            r#"Case(
                number: 2,
                difficulty: Some("hard"),
                questions: [(text: {"english": "Was it night?"}, answer: Some("no"), unlocks: ["SOLUTION"])],
            )"#,
        )
        .unwrap();
        assert_eq!(case.number, 2);
        assert_eq!(case.difficulty.as_deref(), Some("hard"));
        assert_eq!(case.questions[0].unlocks, vec!["SOLUTION".to_string()]);
    }

    #[test]
    fn syntax_error_is_an_error() {
        assert!(matches!(
            RawChapter::parse_ron("Chapter(number: )"),
            Err(SourceError::Ron(_))
        ));
    }

    #[test]
    fn missing_dir_is_an_error() {
        let result = SourceSet::load_from_dir(Path::new("tests/fixtures/does_not_exist"));
        assert!(matches!(result, Err(SourceError::MissingDir(_))));
    }
}

/// Typed diagnostics shared by the compiler, validator, and localization audit.

use serde::Serialize;
use std::fmt;

use crate::schema::node::NodeKind;

/// The authored record a malformed-content diagnostic points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordRef {
    Chapter { number: u32, node: Option<String> },
    Case { number: u32, question: Option<String> },
    /// A source file that could not be parsed at all.
    File { path: String },
}

impl RecordRef {
    pub fn chapter(number: u32) -> Self {
        Self::Chapter { number, node: None }
    }

    pub fn chapter_node(number: u32, node: impl Into<String>) -> Self {
        Self::Chapter {
            number,
            node: Some(node.into()),
        }
    }

    pub fn case(number: u32) -> Self {
        Self::Case {
            number,
            question: None,
        }
    }

    pub fn case_question(number: u32, question: impl Into<String>) -> Self {
        Self::Case {
            number,
            question: Some(question.into()),
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chapter { number, node: None } => write!(f, "chapter {}", number),
            Self::Chapter {
                number,
                node: Some(node),
            } => write!(f, "chapter {}, node {}", number, node),
            Self::Case {
                number,
                question: None,
            } => write!(f, "case {}", number),
            Self::Case {
                number,
                question: Some(question),
            } => write!(f, "case {}, question {}", number, question),
            Self::File { path } => write!(f, "{}", path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// A single content problem. Collected, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    MalformedContent {
        record: RecordRef,
        field: String,
        reason: String,
    },
    BrokenLink {
        chapter: u32,
        node_id: String,
        target: String,
    },
    UnreachableNode {
        chapter: u32,
        node_id: String,
    },
    MissingEntryNode {
        chapter: u32,
        entry: String,
    },
    MissingConvergence {
        chapter: u32,
        node_kind: NodeKind,
        found: usize,
    },
    NoConvergencePath {
        chapter: u32,
        from: String,
        to: String,
    },
    ChapterEndMismatch {
        chapter: u32,
        node_id: String,
        expected: String,
    },
    CyclicUnlock {
        case_id: String,
        cycle: Vec<String>,
    },
    UnknownUnlock {
        case_id: String,
        question_id: String,
        target: String,
    },
    SolutionUnreachable {
        case_id: String,
        question_id: String,
    },
    MissingTranslationKey {
        surface: String,
        language: String,
        key: String,
    },
}

impl Diagnostic {
    pub fn malformed(record: RecordRef, field: &str, reason: impl Into<String>) -> Self {
        Self::MalformedContent {
            record,
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Dead content and translation gaps are reported but do not fail a run.
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnreachableNode { .. } | Self::MissingTranslationKey { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedContent {
                record,
                field,
                reason,
            } => write!(f, "{}: field '{}' {}", record, field, reason),
            Self::BrokenLink {
                chapter,
                node_id,
                target,
            } => write!(f, "Chapter {}, {} -> {} (no such node)", chapter, node_id, target),
            Self::UnreachableNode { chapter, node_id } => {
                write!(f, "Chapter {}, {} is unreachable from the entry node", chapter, node_id)
            }
            Self::MissingEntryNode { chapter, entry } => {
                write!(f, "Chapter {}: missing entry node {}", chapter, entry)
            }
            Self::MissingConvergence {
                chapter,
                node_kind,
                found,
            } => write!(
                f,
                "Chapter {}: expected exactly one '{}' node, found {}",
                chapter,
                node_kind.name(),
                found
            ),
            Self::NoConvergencePath { chapter, from, to } => {
                write!(f, "Chapter {}: no path from {} to {}", chapter, from, to)
            }
            Self::ChapterEndMismatch {
                chapter,
                node_id,
                expected,
            } => write!(
                f,
                "Chapter {}, {} must lead to {}",
                chapter, node_id, expected
            ),
            Self::CyclicUnlock { case_id, cycle } => {
                write!(f, "{}: cyclic unlock {}", case_id, cycle.join(" -> "))
            }
            Self::UnknownUnlock {
                case_id,
                question_id,
                target,
            } => write!(
                f,
                "{}, {} unlocks unknown question {}",
                case_id, question_id, target
            ),
            Self::SolutionUnreachable {
                case_id,
                question_id,
            } => write!(f, "{}, {} never leads to SOLUTION", case_id, question_id),
            Self::MissingTranslationKey {
                surface,
                language,
                key,
            } => write!(f, "{} [{}]: missing key '{}'", surface, language, key),
        }
    }
}

/// An ordered diagnostic list for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn merge(&mut self, other: Report) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// No diagnostics of any severity.
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Process exit code: 1 if any error-severity diagnostic is present.
    pub fn exit_code(&self) -> i32 {
        if self.has_errors() {
            1
        } else {
            0
        }
    }

    /// Human-readable report, warnings first then errors.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        if self.diagnostics.is_empty() {
            out.push_str("All checks passed!\n");
        }
        for warning in self.warnings() {
            out.push_str(&format!("WARNING: {}\n", warning));
        }
        for error in self.errors() {
            out.push_str(&format!("ERROR: {}\n", error));
        }
        out.push_str(&format!(
            "\nSummary: {} errors, {} warnings\n",
            self.errors().count(),
            self.warnings().count()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken() -> Diagnostic {
        Diagnostic::BrokenLink {
            chapter: 2,
            node_id: "CH2_004".to_string(),
            target: "CH2_999".to_string(),
        }
    }

    fn unreachable() -> Diagnostic {
        Diagnostic::UnreachableNode {
            chapter: 1,
            node_id: "CH1_ORPHAN".to_string(),
        }
    }

    #[test]
    fn severity_split() {
        assert_eq!(broken().severity(), Severity::Error);
        assert_eq!(unreachable().severity(), Severity::Warning);
        let missing = Diagnostic::MissingTranslationKey {
            surface: "ui".to_string(),
            language: "latam".to_string(),
            key: "menu.save".to_string(),
        };
        assert!(!missing.is_error());
    }

    #[test]
    fn warnings_only_report_exits_zero() {
        let mut report = Report::new();
        report.push(unreachable());
        assert!(!report.is_valid());
        assert!(!report.has_errors());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn errors_exit_nonzero() {
        let mut report = Report::new();
        report.extend([unreachable(), broken()]);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.errors().count(), 1);
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(broken().to_string(), "Chapter 2, CH2_004 -> CH2_999 (no such node)");
        let malformed = Diagnostic::malformed(
            RecordRef::chapter_node(3, "CH3_002"),
            "kind",
            "unknown kind 'cutscene'",
        );
        assert_eq!(
            malformed.to_string(),
            "chapter 3, node CH3_002: field 'kind' unknown kind 'cutscene'"
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(broken()).unwrap();
        assert_eq!(json["kind"], "broken_link");
        assert_eq!(json["node_id"], "CH2_004");
    }

    #[test]
    fn summary_lists_everything() {
        let mut report = Report::new();
        report.extend([broken(), unreachable()]);
        let summary = report.summary();
        assert!(summary.contains("WARNING: Chapter 1, CH1_ORPHAN"));
        assert!(summary.contains("ERROR: Chapter 2, CH2_004"));
        assert!(summary.contains("Summary: 1 errors, 1 warnings"));
    }
}

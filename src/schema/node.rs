use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Language code → string. Ordered so serialized output is stable.
pub type LocalizedText = BTreeMap<String, String>;

/// Reserved target marking the end of the whole narrative.
pub const TERMINAL_SENTINEL: &str = "ENDING";

/// The role a node plays in its chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Dialogue,
    Investigation,
    ChapterEnd,
    Choice,
}

impl NodeKind {
    /// Parse the authored lower-case kind name.
    pub fn parse(name: &str) -> Option<NodeKind> {
        match name {
            "dialogue" => Some(Self::Dialogue),
            "investigation" => Some(Self::Investigation),
            "chapter_end" => Some(Self::ChapterEnd),
            "choice" => Some(Self::Choice),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dialogue => "dialogue",
            Self::Investigation => "investigation",
            Self::ChapterEnd => "chapter_end",
            Self::Choice => "choice",
        }
    }
}

/// Which perspective a node is seen from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pov {
    /// Perspective-independent: prologue, investigation, chapter end.
    All,
    Track(String),
}

impl Pov {
    pub fn name(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Track(name) => name,
        }
    }
}

/// One selectable option of a `choice` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub text: LocalizedText,
    pub target: String,
}

/// Outgoing linkage of a node, decided once at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Next {
    /// Another node in the same chapter.
    Node(String),
    /// The entry node of chapter `n`.
    CrossChapter(u32),
    Choice(Vec<ChoiceOption>),
    /// End of the entire narrative.
    Terminal,
}

impl Next {
    /// Every target this linkage points at, rendered as node-id strings
    /// (`CH{n}_START` for cross-chapter links, `ENDING` for the terminal).
    pub fn targets(&self) -> Vec<String> {
        match self {
            Self::Node(id) => vec![id.clone()],
            Self::CrossChapter(n) => vec![crate::core::ids::entry_id(*n)],
            Self::Choice(options) => options.iter().map(|o| o.target.clone()).collect(),
            Self::Terminal => vec![TERMINAL_SENTINEL.to_string()],
        }
    }
}

/// The smallest narrative unit.
///
/// Construction performs no linkage checks: whether `next` resolves is a
/// whole-graph property checked by the validator once every node is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub text: LocalizedText,
    pub next: Next,
    pub pov: Pov,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Node {
    /// Returns true if this node has the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Ids of nodes in the same chapter this node links to directly.
    /// Cross-chapter and terminal links are excluded.
    pub fn local_targets(&self) -> Vec<&str> {
        match &self.next {
            Next::Node(id) => vec![id.as_str()],
            Next::Choice(options) => options.iter().map(|o| o.target.as_str()).collect(),
            Next::CrossChapter(_) | Next::Terminal => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(en: &str) -> LocalizedText {
        LocalizedText::from([("english".to_string(), en.to_string())])
    }

    fn make_choice() -> Node {
        Node {
            id: "CH1_START".to_string(),
            kind: NodeKind::Choice,
            speaker: None,
            text: text("Whose eyes do you see through?"),
            next: Next::Choice(vec![
                ChoiceOption {
                    text: text("The emperor"),
                    target: "CH1_EMPEROR_001".to_string(),
                },
                ChoiceOption {
                    text: text("The consort"),
                    target: "CH1_CONSORT_001".to_string(),
                },
            ]),
            pov: Pov::All,
            tags: ["intro".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn kind_parse_known_names() {
        assert_eq!(NodeKind::parse("dialogue"), Some(NodeKind::Dialogue));
        assert_eq!(NodeKind::parse("investigation"), Some(NodeKind::Investigation));
        assert_eq!(NodeKind::parse("chapter_end"), Some(NodeKind::ChapterEnd));
        assert_eq!(NodeKind::parse("choice"), Some(NodeKind::Choice));
    }

    #[test]
    fn kind_parse_rejects_unknown() {
        assert_eq!(NodeKind::parse("cutscene"), None);
        assert_eq!(NodeKind::parse("Dialogue"), None);
    }

    #[test]
    fn rendered_targets() {
        assert_eq!(Next::Terminal.targets(), vec!["ENDING".to_string()]);
        assert_eq!(Next::CrossChapter(4).targets(), vec!["CH4_START".to_string()]);
        assert_eq!(
            make_choice().next.targets(),
            vec!["CH1_EMPEROR_001".to_string(), "CH1_CONSORT_001".to_string()]
        );
    }

    #[test]
    fn local_targets_skip_sentinels() {
        let mut node = make_choice();
        assert_eq!(node.local_targets(), vec!["CH1_EMPEROR_001", "CH1_CONSORT_001"]);
        node.next = Next::CrossChapter(2);
        assert!(node.local_targets().is_empty());
        node.next = Next::Terminal;
        assert!(node.local_targets().is_empty());
    }

    #[test]
    fn tags_and_pov() {
        let node = make_choice();
        assert!(node.has_tag("intro"));
        assert!(!node.has_tag("outro"));
        assert_eq!(node.pov.name(), "all");
        assert_eq!(Pov::Track("consort".to_string()).name(), "consort");
    }
}

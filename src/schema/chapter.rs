use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::node::{LocalizedText, Node, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),
    #[error("duplicate question id '{0}'")]
    DuplicateQuestion(String),
}

/// The ordered node ids seen from one perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub pov: String,
    pub nodes: Vec<String>,
}

impl Track {
    pub fn first(&self) -> Option<&str> {
        self.nodes.first().map(String::as_str)
    }
}

/// An ordered container of nodes with a designated entry node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub number: u32,
    pub title: LocalizedText,
    pub entry: String,
    /// Perspective tracks in authoring order.
    pub tracks: Vec<Track>,
    /// Nodes in authoring order.
    pub nodes: Vec<Node>,
}

impl Chapter {
    /// Build a chapter, rejecting duplicate node ids.
    ///
    /// The entry node is not required to exist here; a missing entry is a
    /// graph-level diagnostic reported by the validator.
    pub fn new(
        number: u32,
        title: LocalizedText,
        entry: String,
        tracks: Vec<Track>,
        nodes: Vec<Node>,
    ) -> Result<Chapter, ModelError> {
        let mut seen = FxHashSet::default();
        for node in &nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(ModelError::DuplicateNode(node.id.clone()));
            }
        }
        Ok(Chapter {
            number,
            title,
            entry,
            tracks,
            nodes,
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// All nodes of the given kind, in authoring order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

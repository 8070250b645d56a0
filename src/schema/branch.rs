use serde::{Deserialize, Serialize};
use std::fmt;

use super::character::{CharacterId, RelationshipDelta};
use crate::core::config::CategoryMix;

/// Newtype wrapper for branch node IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an option leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionTarget {
    Node(NodeId),
    /// Terminal ending marker, e.g. `Ending("exile")`.
    Ending(String),
}

/// A relationship change attached to an option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDelta {
    pub character: CharacterId,
    pub delta: RelationshipDelta,
}

/// A player-selectable choice at a branch node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchOption {
    pub label: String,
    pub target: OptionTarget,
    #[serde(default)]
    pub deltas: Vec<CharacterDelta>,
}

/// A narrative decision point. Nodes without options are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchNode {
    pub id: NodeId,
    pub text: String,
    #[serde(default)]
    pub options: Vec<BranchOption>,
    /// Paragraph category weights used while this node is active.
    #[serde(default)]
    pub mix: Option<CategoryMix>,
}

impl BranchNode {
    pub fn is_terminal(&self) -> bool {
        self.options.is_empty()
    }
}

/// Result of taking an option: either another node or a story ending.
/// Reaching an ending is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    Node(NodeId),
    Ending(String),
}

/// Branching narrative graph — nodes are states, options are transitions.
///
/// Cycles are allowed (hubs the player can revisit); only nodes without
/// options end a path through the story.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::relationship::{RelationshipError, RelationshipStore};
use crate::schema::branch::{BranchNode, BranchOption, NodeId, OptionTarget, Transition};
use crate::schema::character::{CharacterId, CharacterState};

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("invalid option {index} at node '{node}' ({available} available)")]
    InvalidOption {
        node: NodeId,
        index: usize,
        available: usize,
    },
    #[error("option '{label}' at node '{node}' targets missing node '{target}'")]
    DanglingTarget {
        node: NodeId,
        label: String,
        target: NodeId,
    },
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),
    #[error("option '{label}' at node '{node}' changes unknown character '{character}'")]
    UnknownCharacter {
        node: NodeId,
        label: String,
        character: CharacterId,
    },
    #[error("relationship error: {0}")]
    Relationship(#[from] RelationshipError),
}

/// What `choose` did: where the story goes next and the character states
/// produced by the option's deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOutcome {
    pub next: Transition,
    pub applied: Vec<CharacterState>,
}

#[derive(Debug, Clone)]
pub struct NarrativeGraph {
    nodes: FxHashMap<NodeId, BranchNode>,
    order: Vec<NodeId>,
    root: NodeId,
}

impl NarrativeGraph {
    /// Build and validate a graph.
    pub fn new(root: NodeId, nodes: Vec<BranchNode>) -> Result<NarrativeGraph, GraphError> {
        let mut map = FxHashMap::default();
        let mut order = Vec::with_capacity(nodes.len());
        for node in nodes {
            if map.contains_key(&node.id) {
                return Err(GraphError::DuplicateNode(node.id));
            }
            order.push(node.id.clone());
            map.insert(node.id.clone(), node);
        }
        let graph = NarrativeGraph {
            nodes: map,
            order,
            root,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Every option target must exist and the root must be a known node.
    pub fn validate(&self) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&self.root) {
            return Err(GraphError::UnknownNode(self.root.clone()));
        }
        for node in self.nodes() {
            for option in &node.options {
                if let OptionTarget::Node(target) = &option.target {
                    if !self.nodes.contains_key(target) {
                        return Err(GraphError::DanglingTarget {
                            node: node.id.clone(),
                            label: option.label.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Check that every option delta names a character in `store`.
    pub fn validate_characters(&self, store: &RelationshipStore) -> Result<(), GraphError> {
        for node in self.nodes() {
            for option in &node.options {
                if let Some(missing) = option.deltas.iter().find(|d| !store.contains(&d.character)) {
                    return Err(GraphError::UnknownCharacter {
                        node: node.id.clone(),
                        label: option.label.clone(),
                        character: missing.character.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &BranchNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Result<&BranchNode, GraphError> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))
    }

    /// Options available at `id`. Terminal nodes yield an empty slice.
    pub fn options(&self, id: &NodeId) -> Result<&[BranchOption], GraphError> {
        Ok(&self.node(id)?.options)
    }

    pub fn is_terminal(&self, id: &NodeId) -> Result<bool, GraphError> {
        Ok(self.node(id)?.is_terminal())
    }

    /// Move directly to a node, as requested by a world event.
    pub fn enter(&self, id: &NodeId) -> Result<NodeId, GraphError> {
        Ok(self.node(id)?.id.clone())
    }

    /// Take option `option_index` at `current`. The option's deltas are
    /// applied to `store` before the transition is returned. Nothing is
    /// applied if the option or any of its characters is invalid.
    pub fn choose(
        &self,
        current: &NodeId,
        option_index: usize,
        store: &mut RelationshipStore,
    ) -> Result<ChoiceOutcome, GraphError> {
        let node = self.node(current)?;
        let option = node
            .options
            .get(option_index)
            .ok_or_else(|| GraphError::InvalidOption {
                node: current.clone(),
                index: option_index,
                available: node.options.len(),
            })?;

        if let Some(missing) = option.deltas.iter().find(|d| !store.contains(&d.character)) {
            return Err(RelationshipError::UnknownCharacter(missing.character.clone()).into());
        }

        let mut applied = Vec::with_capacity(option.deltas.len());
        for change in &option.deltas {
            applied.push(store.apply_delta(&change.character, &change.delta)?);
        }

        let next = match &option.target {
            OptionTarget::Node(target) => Transition::Node(self.enter(target)?),
            OptionTarget::Ending(ending) => Transition::Ending(ending.clone()),
        };
        tracing::debug!(from = %current, option = %option.label, next = ?next, "branch chosen");

        Ok(ChoiceOutcome { next, applied })
    }
}

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Newtype wrapper for character IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub String);

impl CharacterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The bounded relational scores tracked for every character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub trust: i32,
    pub friendship: i32,
    pub romance: i32,
    pub loyalty: i32,
}

impl Default for Scores {
    fn default() -> Self {
        Self {
            trust: 50,
            friendship: 50,
            romance: 0,
            loyalty: 50,
        }
    }
}

/// Limits applied whenever a character state is updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLimits {
    pub min: i32,
    pub max: i32,
    /// Maximum number of memory tokens kept per character.
    pub memory_limit: usize,
}

impl Default for ScoreLimits {
    fn default() -> Self {
        Self {
            min: 0,
            max: 100,
            memory_limit: 16,
        }
    }
}

/// A requested change to a character's relational state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelationshipDelta {
    #[serde(default)]
    pub trust: i32,
    #[serde(default)]
    pub friendship: i32,
    #[serde(default)]
    pub romance: i32,
    #[serde(default)]
    pub loyalty: i32,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub memory: Option<String>,
}

impl RelationshipDelta {
    pub fn trust(amount: i32) -> Self {
        Self {
            trust: amount,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trust == 0
            && self.friendship == 0
            && self.romance == 0
            && self.loyalty == 0
            && self.flags.is_empty()
            && self.memory.is_none()
    }
}

/// Per-character relationship record. Created at session start for every
/// known character and never destroyed during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterState {
    pub id: CharacterId,
    pub name: String,
    /// Static personality descriptor.
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub scores: Scores,
    #[serde(default)]
    pub flags: FxHashSet<String>,
    #[serde(default)]
    pub memories: VecDeque<String>,
}

impl CharacterState {
    pub fn new(id: CharacterId, name: impl Into<String>, personality: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            personality: personality.into(),
            scores: Scores::default(),
            flags: FxHashSet::default(),
            memories: VecDeque::new(),
        }
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Returns a copy of this state with `delta` applied. Scores clamp to
    /// the limits, flags are idempotent and memories evict the oldest entry
    /// once `memory_limit` is reached.
    pub fn with_delta(&self, delta: &RelationshipDelta, limits: &ScoreLimits) -> CharacterState {
        let clamp = |value: i32, change: i32| value.saturating_add(change).clamp(limits.min, limits.max);

        let mut next = self.clone();
        next.scores = Scores {
            trust: clamp(self.scores.trust, delta.trust),
            friendship: clamp(self.scores.friendship, delta.friendship),
            romance: clamp(self.scores.romance, delta.romance),
            loyalty: clamp(self.scores.loyalty, delta.loyalty),
        };

        for flag in &delta.flags {
            next.flags.insert(flag.clone());
        }

        if let Some(memory) = &delta.memory {
            if limits.memory_limit > 0 {
                while next.memories.len() >= limits.memory_limit {
                    next.memories.pop_front();
                }
                next.memories.push_back(memory.clone());
            }
        }

        next
    }
}

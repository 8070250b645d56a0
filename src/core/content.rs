/// Content packs — the RON description of every pool, the title grammar,
/// quests, world events, characters and the branching graph.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::core::pool::{ContentPool, PoolRegistry};
use crate::core::template::TemplateError;
use crate::schema::branch::{BranchNode, NodeId};
use crate::schema::character::{CharacterId, CharacterState, Scores};
use crate::schema::event::{EventCategory, EventEffect};
use crate::schema::fragment::{Category, PoolId, ReusePolicy};
use crate::schema::quest::QuestKind;

const BUILTIN_PACK: &str = include_str!("../../genre_data/wayfarer.ron");

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("template error in pool '{pool}': {source}")]
    Template {
        pool: PoolId,
        #[source]
        source: TemplateError,
    },
    #[error("invalid content pack: {0}")]
    Invalid(String),
}

/// A pool declaration. Fragments are `entries` followed by the expansion
/// of `composite`, with exact duplicates dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub id: PoolId,
    pub category: Category,
    /// Defaults to unbounded for value pools and title parts, bounded
    /// for everything else.
    #[serde(default)]
    pub reuse: Option<ReusePolicy>,
    #[serde(default)]
    pub entries: Vec<String>,
    /// Part lists whose cartesian product yields further fragments, each
    /// part joined by a single space.
    #[serde(default)]
    pub composite: Vec<Vec<String>>,
    /// Cap on the number of composite fragments kept.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl PoolSpec {
    pub fn reuse_policy(&self) -> ReusePolicy {
        self.reuse.unwrap_or(match self.category {
            Category::Value | Category::TitlePart => ReusePolicy::Unbounded,
            _ => ReusePolicy::Bounded,
        })
    }

    pub fn texts(&self) -> Vec<String> {
        dedup(
            self.entries
                .iter()
                .cloned()
                .chain(expand_composite(&self.composite, self.limit)),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleSpec {
    pub patterns: Vec<String>,
    pub subject: PoolId,
    pub verb: PoolId,
    pub modifier: PoolId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestSpec {
    pub kind: QuestKind,
    pub text: String,
    /// Slot name to value pool.
    pub slots: BTreeMap<String, PoolId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    pub text: String,
    #[serde(default)]
    pub effects: Vec<EventEffect>,
}

/// One event category. Entries come first in the pool, so their effects
/// line up with fragment ids; composite fragments carry no effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    pub category: EventCategory,
    pub odds: f64,
    #[serde(default)]
    pub entries: Vec<EventEntry>,
    #[serde(default)]
    pub composite: Vec<Vec<String>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl EventSpec {
    /// Fragment texts and the effects of each, in pool order.
    pub fn fragments(&self) -> (Vec<String>, Vec<Vec<EventEffect>>) {
        let mut seen = FxHashSet::default();
        let mut texts = Vec::new();
        let mut effects = Vec::new();
        for entry in &self.entries {
            if seen.insert(entry.text.clone()) {
                texts.push(entry.text.clone());
                effects.push(entry.effects.clone());
            }
        }
        for text in expand_composite(&self.composite, self.limit) {
            if seen.insert(text.clone()) {
                texts.push(text);
            }
        }
        (texts, effects)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSpec {
    pub id: CharacterId,
    pub name: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub scores: Scores,
    #[serde(default)]
    pub flags: Vec<String>,
}

impl CharacterSpec {
    pub fn to_state(&self) -> CharacterState {
        let mut state = CharacterState::new(self.id.clone(), self.name.clone(), self.personality.clone());
        state.scores = self.scores;
        state.flags = self.flags.iter().cloned().collect();
        state
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub root: NodeId,
    pub nodes: Vec<BranchNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPack {
    pub name: String,
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
    pub title: TitleSpec,
    /// Pools backing the slots used by paragraph and event fragments.
    #[serde(default)]
    pub paragraph_slots: BTreeMap<String, PoolId>,
    #[serde(default)]
    pub quests: Vec<QuestSpec>,
    #[serde(default)]
    pub events: Vec<EventSpec>,
    #[serde(default)]
    pub characters: Vec<CharacterSpec>,
    pub graph: GraphSpec,
}

impl ContentPack {
    pub fn load_from_ron(path: &Path) -> Result<ContentPack, ContentError> {
        let contents = std::fs::read_to_string(path)?;
        let pack = Self::parse_ron(&contents)?;
        tracing::info!(path = %path.display(), name = %pack.name, pools = pack.pools.len(), "content pack loaded");
        Ok(pack)
    }

    pub fn parse_ron(input: &str) -> Result<ContentPack, ContentError> {
        Ok(ron::from_str(input)?)
    }

    /// The pack shipped with the crate.
    pub fn builtin() -> Result<ContentPack, ContentError> {
        Self::parse_ron(BUILTIN_PACK)
    }

    /// Build every declared pool, event pools included, into `registry`.
    pub fn install_pools(&self, registry: &mut PoolRegistry) -> Result<(), ContentError> {
        let mut seen = FxHashSet::default();
        for spec in &self.pools {
            if !seen.insert(spec.id.clone()) {
                return Err(ContentError::Invalid(format!("pool '{}' declared twice", spec.id)));
            }
            if matches!(spec.category, Category::Event(_)) {
                return Err(ContentError::Invalid(format!(
                    "pool '{}' is an event pool; declare it under events",
                    spec.id
                )));
            }
            let pool = ContentPool::new(spec.id.clone(), spec.category, spec.reuse_policy(), spec.texts())
                .map_err(|source| ContentError::Template {
                    pool: spec.id.clone(),
                    source,
                })?;
            registry.insert(pool);
        }

        let mut categories = FxHashSet::default();
        for spec in &self.events {
            if !categories.insert(spec.category) {
                return Err(ContentError::Invalid(format!(
                    "event category '{}' declared twice",
                    spec.category.name()
                )));
            }
            let id = PoolId::for_event(spec.category);
            let (texts, _) = spec.fragments();
            let pool = ContentPool::new(id.clone(), Category::Event(spec.category), ReusePolicy::Bounded, texts)
                .map_err(|source| ContentError::Template { pool: id, source })?;
            registry.insert(pool);
        }
        Ok(())
    }

    pub fn character_states(&self) -> Vec<CharacterState> {
        self.characters.iter().map(CharacterSpec::to_state).collect()
    }
}

/// Cartesian product of `parts` in lexicographic order, each combination
/// joined by a space. Empty when there are no parts or any part list is
/// empty.
pub fn expand_composite(parts: &[Vec<String>], limit: Option<usize>) -> Vec<String> {
    if parts.is_empty() || parts.iter().any(Vec::is_empty) {
        return Vec::new();
    }
    let total: usize = parts.iter().map(Vec::len).product();
    let count = limit.map_or(total, |l| l.min(total));
    let mut out = Vec::with_capacity(count);
    let mut index = vec![0usize; parts.len()];
    for _ in 0..count {
        let text = parts
            .iter()
            .zip(&index)
            .map(|(list, &i)| list[i].as_str())
            .collect::<Vec<_>>()
            .join(" ");
        out.push(text);
        // Odometer increment, last part fastest.
        for slot in (0..parts.len()).rev() {
            index[slot] += 1;
            if index[slot] < parts[slot].len() {
                break;
            }
            index[slot] = 0;
        }
    }
    out
}

fn dedup(texts: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = FxHashSet::default();
    texts.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

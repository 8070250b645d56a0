/// Character relationship store — owns every `CharacterState` for the session.
use std::collections::BTreeMap;
use thiserror::Error;

use crate::schema::character::{CharacterId, CharacterState, RelationshipDelta, ScoreLimits};

#[derive(Debug, Error)]
pub enum RelationshipError {
    #[error("unknown character: {0}")]
    UnknownCharacter(CharacterId),
}

#[derive(Debug, Clone, Default)]
pub struct RelationshipStore {
    characters: BTreeMap<CharacterId, CharacterState>,
    limits: ScoreLimits,
}

impl RelationshipStore {
    pub fn new(limits: ScoreLimits) -> Self {
        Self {
            characters: BTreeMap::new(),
            limits,
        }
    }

    pub fn limits(&self) -> &ScoreLimits {
        &self.limits
    }

    /// Register a character. Scores are clamped into range on the way in.
    pub fn register(&mut self, state: CharacterState) {
        let state = state.with_delta(&RelationshipDelta::default(), &self.limits);
        self.characters.insert(state.id.clone(), state);
    }

    pub fn contains(&self, id: &CharacterId) -> bool {
        self.characters.contains_key(id)
    }

    pub fn get(&self, id: &CharacterId) -> Result<CharacterState, RelationshipError> {
        self.state(id).cloned()
    }

    /// Borrowing form of `get`.
    pub fn state(&self, id: &CharacterId) -> Result<&CharacterState, RelationshipError> {
        self.characters
            .get(id)
            .ok_or_else(|| RelationshipError::UnknownCharacter(id.clone()))
    }

    /// Apply `delta` to a character and return the new state.
    pub fn apply_delta(
        &mut self,
        id: &CharacterId,
        delta: &RelationshipDelta,
    ) -> Result<CharacterState, RelationshipError> {
        let next = self.state(id)?.with_delta(delta, &self.limits);
        tracing::debug!(
            character = %id,
            trust = next.scores.trust,
            friendship = next.scores.friendship,
            romance = next.scores.romance,
            loyalty = next.scores.loyalty,
            "relationship updated"
        );
        self.characters.insert(id.clone(), next.clone());
        Ok(next)
    }

    /// Characters in id order.
    pub fn characters(&self) -> impl Iterator<Item = &CharacterState> {
        self.characters.values()
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Replace stored states with saved ones. Unknown ids are registered.
    pub fn restore(&mut self, states: impl IntoIterator<Item = CharacterState>) {
        for state in states {
            self.register(state);
        }
    }
}

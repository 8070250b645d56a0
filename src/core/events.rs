/// World event engine — rolls independent per-category odds and draws the
/// event text from that category's pool.

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;

use crate::core::context::ChapterContext;
use crate::core::pool::{PoolError, PoolRegistry};
use crate::schema::event::{EventCategory, EventEffect, WorldEvent};
use crate::schema::fragment::{FragmentId, PoolId};

/// Odds and pool for one event category.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTrigger {
    pub category: EventCategory,
    /// Chance per chapter, within `0.0..=1.0`.
    pub odds: f64,
    pub pool: PoolId,
}

#[derive(Debug, Clone, Default)]
pub struct WorldEventEngine {
    triggers: Vec<EventTrigger>,
    /// Effects by (category, fragment). Fragments without an entry have none.
    effects: FxHashMap<(EventCategory, FragmentId), Vec<EventEffect>>,
}

impl WorldEventEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a category. Its pool must already be in `registry`; `effects`
    /// is indexed by fragment position in that pool. Odds are clamped into
    /// `0.0..=1.0`. Registering a category twice replaces it.
    pub fn register(
        &mut self,
        category: EventCategory,
        odds: f64,
        effects: Vec<Vec<EventEffect>>,
        registry: &PoolRegistry,
    ) -> Result<(), PoolError> {
        let pool = PoolId::for_event(category);
        if !registry.contains(&pool) {
            return Err(PoolError::UnknownPool(pool));
        }
        let odds = if odds.is_finite() { odds.clamp(0.0, 1.0) } else { 0.0 };

        self.triggers.retain(|t| t.category != category);
        self.effects.retain(|(c, _), _| *c != category);
        for (i, list) in effects.into_iter().enumerate() {
            if !list.is_empty() {
                self.effects.insert((category, FragmentId(i as u32)), list);
            }
        }
        self.triggers.push(EventTrigger {
            category,
            odds,
            pool,
        });
        self.triggers.sort_by_key(|t| t.category);
        Ok(())
    }

    pub fn triggers(&self) -> &[EventTrigger] {
        &self.triggers
    }

    pub fn effects(&self, category: EventCategory, fragment: FragmentId) -> &[EventEffect] {
        self.effects
            .get(&(category, fragment))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every effect attached to any event, for validation.
    pub fn all_effects(&self) -> impl Iterator<Item = &EventEffect> {
        self.effects.values().flatten()
    }

    /// Roll the categories not yet rolled this chapter, in a shuffled
    /// order, and return the first that fires. A category is rolled at
    /// most once per chapter, so it fires at most once.
    ///
    /// A category whose pool has nothing left for this chapter is skipped.
    pub fn maybe_trigger_event(
        &self,
        registry: &mut PoolRegistry,
        ctx: &mut ChapterContext,
    ) -> Result<Option<WorldEvent>, PoolError> {
        let mut pending: Vec<&EventTrigger> = self
            .triggers
            .iter()
            .filter(|t| !ctx.rolled_events.contains(&t.category))
            .collect();
        pending.shuffle(&mut ctx.selection.rng);

        for trigger in pending {
            ctx.rolled_events.push(trigger.category);
            if !ctx.selection.rng.gen_bool(trigger.odds) {
                continue;
            }
            let fragment = match registry.select(&trigger.pool, &mut ctx.selection) {
                Ok(fragment) => fragment,
                Err(PoolError::Exhausted { pool, ceiling }) => {
                    tracing::debug!(pool = %pool, ceiling, "event pool spent, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            ctx.active_events.push(trigger.category);
            tracing::trace!(category = trigger.category.name(), fragment = fragment.id.0, "world event");
            return Ok(Some(WorldEvent {
                category: trigger.category,
                fragment: fragment.id,
                text: fragment.text,
                effects: self.effects(trigger.category, fragment.id).to_vec(),
            }));
        }
        Ok(None)
    }
}

/// Quest template engine — fills quest templates with values drawn from
/// each placeholder's pool.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::pool::{PoolError, PoolRegistry, SelectionContext};
use crate::core::template::{Template, TemplateError};
use crate::schema::fragment::PoolId;
use crate::schema::quest::{QuestInstance, QuestKind};

#[derive(Debug, Error)]
pub enum QuestError {
    #[error("unknown quest type: {0}")]
    UnknownQuestType(QuestKind),
    #[error("quest '{kind}' uses slot '{slot}' with no value pool")]
    UnboundSlot { kind: QuestKind, slot: String },
    #[error("pool '{pool}' holds {available} values but quest '{kind}' needs {needed} distinct ones")]
    InsufficientValues {
        kind: QuestKind,
        pool: PoolId,
        needed: usize,
        available: usize,
    },
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
}

/// A quest kind with its template and the pool backing each slot.
#[derive(Debug, Clone)]
pub struct QuestTemplate {
    pub kind: QuestKind,
    pub template: Template,
    pub slots: BTreeMap<String, PoolId>,
}

impl QuestTemplate {
    /// Parse `text` and check that every slot it uses has a pool.
    pub fn new(
        kind: QuestKind,
        text: &str,
        slots: BTreeMap<String, PoolId>,
    ) -> Result<QuestTemplate, QuestError> {
        let template = Template::parse(text)?;
        if let Some(slot) = template.slots().into_iter().find(|s| !slots.contains_key(*s)) {
            return Err(QuestError::UnboundSlot {
                kind,
                slot: slot.to_string(),
            });
        }
        Ok(QuestTemplate {
            kind,
            template,
            slots,
        })
    }

    /// Number of distinct slots drawing from each pool.
    fn demand(&self) -> BTreeMap<&PoolId, usize> {
        let mut demand = BTreeMap::new();
        for slot in self.template.slots() {
            if let Some(pool) = self.slots.get(slot) {
                *demand.entry(pool).or_insert(0) += 1;
            }
        }
        demand
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuestEngine {
    templates: FxHashMap<QuestKind, QuestTemplate>,
}

impl QuestEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template. Each bound pool must exist and hold at least as
    /// many values as there are distinct slots drawing from it.
    pub fn register(
        &mut self,
        template: QuestTemplate,
        registry: &PoolRegistry,
    ) -> Result<(), QuestError> {
        for (pool, needed) in template.demand() {
            let available = registry
                .get(pool)
                .ok_or_else(|| PoolError::UnknownPool(pool.clone()))?
                .len();
            if available < needed {
                return Err(QuestError::InsufficientValues {
                    kind: template.kind.clone(),
                    pool: pool.clone(),
                    needed,
                    available,
                });
            }
        }
        self.templates.insert(template.kind.clone(), template);
        Ok(())
    }

    /// Registered kinds, sorted for stable iteration.
    pub fn kinds(&self) -> Vec<&QuestKind> {
        let mut kinds: Vec<&QuestKind> = self.templates.keys().collect();
        kinds.sort();
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn template(&self, kind: &QuestKind) -> Option<&QuestTemplate> {
        self.templates.get(kind)
    }

    /// Fill the template for `kind`. Each distinct slot is drawn exactly
    /// once and that value is used at every occurrence.
    pub fn generate_quest(
        &self,
        kind: &QuestKind,
        registry: &mut PoolRegistry,
        ctx: &mut SelectionContext,
    ) -> Result<QuestInstance, QuestError> {
        let template = self
            .templates
            .get(kind)
            .ok_or_else(|| QuestError::UnknownQuestType(kind.clone()))?;

        let mut bindings = BTreeMap::new();
        for slot in template.template.slots() {
            let pool = template
                .slots
                .get(slot)
                .ok_or_else(|| QuestError::UnboundSlot {
                    kind: kind.clone(),
                    slot: slot.to_string(),
                })?;
            // The chapter context excludes values already drawn, so two
            // slots sharing a pool never receive the same value.
            let value = registry.select(pool, ctx)?;
            bindings.insert(slot.to_string(), value.text);
        }

        let text = template.template.render(&bindings)?;
        Ok(QuestInstance {
            kind: kind.clone(),
            text,
            bindings,
        })
    }
}

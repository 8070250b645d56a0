/// Chapter title grammar: a pattern filled with a subject, a verb and a
/// modifier drawn from their own pools.

use rand::Rng;
use std::collections::BTreeMap;

use crate::core::context::CorpusContext;
use crate::core::pipeline::EngineError;
use crate::core::pool::{Fragment, PoolError, PoolRegistry, SelectionContext};
use crate::core::template::{Template, TemplateError};
use crate::schema::fragment::{FragmentId, PoolId};

pub const SUBJECT: &str = "SUBJECT";
pub const VERB: &str = "VERB";
pub const MODIFIER: &str = "MODIFIER";

/// The (subject, verb, modifier) parts a title was built from.
pub type TitleCombo = (FragmentId, FragmentId, FragmentId);

#[derive(Debug, Clone)]
pub struct TitleGrammar {
    patterns: Vec<Template>,
    subject: PoolId,
    verb: PoolId,
    modifier: PoolId,
    last_combo: Option<TitleCombo>,
}

impl TitleGrammar {
    /// Patterns may only use the `{SUBJECT}`, `{VERB}` and `{MODIFIER}` slots.
    pub fn new(
        patterns: &[String],
        subject: PoolId,
        verb: PoolId,
        modifier: PoolId,
    ) -> Result<TitleGrammar, TemplateError> {
        let mut parsed = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let template = Template::parse(pattern)?;
            if let Some(bad) = template
                .slots()
                .into_iter()
                .find(|s| ![SUBJECT, VERB, MODIFIER].contains(s))
            {
                return Err(TemplateError::UnboundSlot(bad.to_string()));
            }
            parsed.push(template);
        }
        if parsed.is_empty() {
            parsed.push(Template::parse("{SUBJECT} {VERB} {MODIFIER}")?);
        }
        Ok(TitleGrammar {
            patterns: parsed,
            subject,
            verb,
            modifier,
            last_combo: None,
        })
    }

    pub fn pools(&self) -> [&PoolId; 3] {
        [&self.subject, &self.verb, &self.modifier]
    }

    pub fn last_combo(&self) -> Option<TitleCombo> {
        self.last_combo
    }

    /// Restore the previous combination, e.g. after loading a snapshot.
    pub fn set_last_combo(&mut self, combo: Option<TitleCombo>) {
        self.last_combo = combo;
    }

    /// Generate a title. The combination used by the previous title is
    /// never repeated back to back, and titles already in the corpus are
    /// avoided for up to `attempts` draws. Each rejected candidate sets
    /// aside one of its parts for the rest of the chapter, rotating
    /// through subject, verb and modifier, so the next draw differs.
    pub fn generate(
        &mut self,
        registry: &mut PoolRegistry,
        ctx: &mut SelectionContext,
        corpus: &CorpusContext,
        attempts: u32,
    ) -> Result<String, EngineError> {
        let attempts = attempts.max(1);
        let mut fallback: Option<(String, TitleCombo)> = None;

        for attempt in 0..attempts {
            let Some([subject, verb, modifier]) = self.draw_parts(registry, ctx)? else {
                tracing::trace!(attempt, "title parts spent for this chapter");
                break;
            };
            let combo = (subject.id, verb.id, modifier.id);

            let pattern = &self.patterns[ctx.rng.gen_range(0..self.patterns.len())];
            let bindings = BTreeMap::from([
                (SUBJECT.to_string(), subject.text),
                (VERB.to_string(), verb.text),
                (MODIFIER.to_string(), modifier.text),
            ]);
            let title = pattern.render(&bindings)?;

            let repeats_last = self.last_combo == Some(combo);
            let seen = corpus.has_title(&title);
            if !repeats_last && !seen {
                self.last_combo = Some(combo);
                return Ok(title);
            }

            tracing::trace!(attempt, repeats_last, seen, "rejected title candidate");
            let set_aside = attempt as usize % 3;
            for (k, (pool, id)) in self.parts(combo).into_iter().enumerate() {
                if k == set_aside {
                    registry.retire(pool, id, ctx)?;
                } else {
                    registry.release(pool, id, ctx)?;
                }
            }
            if !repeats_last && fallback.is_none() {
                fallback = Some((title, combo));
            }
        }

        match fallback {
            Some((title, combo)) => {
                tracing::debug!(title = %title, "reusing a title already in the corpus");
                for (pool, id) in self.parts(combo) {
                    registry.claim(pool, id, ctx)?;
                }
                self.last_combo = Some(combo);
                Ok(title)
            }
            None => Err(EngineError::TitleExhausted { attempts }),
        }
    }

    /// Draw a subject, verb and modifier. `None` when any of the pools has
    /// nothing left for this chapter; parts already drawn are released.
    fn draw_parts(
        &self,
        registry: &mut PoolRegistry,
        ctx: &mut SelectionContext,
    ) -> Result<Option<[Fragment; 3]>, PoolError> {
        let mut drawn: Vec<Fragment> = Vec::with_capacity(3);
        for pool in self.pools() {
            match registry.select(pool, ctx) {
                Ok(fragment) => drawn.push(fragment),
                Err(PoolError::Exhausted { .. }) => {
                    for part in &drawn {
                        registry.release(&part.pool, part.id, ctx)?;
                    }
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(drawn.try_into().ok())
    }

    fn parts(&self, combo: TitleCombo) -> [(&PoolId, FragmentId); 3] {
        [
            (&self.subject, combo.0),
            (&self.verb, combo.1),
            (&self.modifier, combo.2),
        ]
    }
}

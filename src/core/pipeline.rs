/// The chapter assembly pipeline: title, weighted paragraphs, quests and
/// world events composed into a `Chapter` that respects the corpus
/// invariants.
///
/// Wires together the pool registry, title grammar, quest and event
/// engines, relationship store and narrative graph.

use chrono::Utc;
use rand::Rng;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::core::config::{CategoryMix, ConfigError, EngineConfig};
use crate::core::content::{ContentError, ContentPack};
use crate::core::context::{chapter_signature, ChapterContext, CorpusContext};
use crate::core::events::WorldEventEngine;
use crate::core::graph::{ChoiceOutcome, GraphError, NarrativeGraph};
use crate::core::persistence::Snapshot;
use crate::core::pool::{PoolError, PoolRegistry, PoolReport, SelectionLimits};
use crate::core::quest::{QuestEngine, QuestError, QuestTemplate};
use crate::core::relationship::{RelationshipError, RelationshipStore};
use crate::core::scheduler::ChapterSource;
use crate::core::template::{Template, TemplateError};
use crate::core::title::TitleGrammar;
use crate::schema::branch::{BranchOption, NodeId, Transition};
use crate::schema::chapter::{count_words, Chapter};
use crate::schema::event::EventEffect;
use crate::schema::fragment::{Category, FragmentId, PoolId};
use crate::schema::quest::QuestKind;

/// Prime stride between the RNG seeds of consecutive chapters.
const SEED_STRIDE: u64 = 7919;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("quest error: {0}")]
    Quest(#[from] QuestError),
    #[error("relationship error: {0}")]
    Relationship(#[from] RelationshipError),
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("content error: {0}")]
    Content(#[from] ContentError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("chapter {sequence} duplicates an earlier chapter after {attempts} redraws")]
    DuplicateChapter { sequence: u64, attempts: u32 },
    #[error("chapter {sequence} has {words} words, below the minimum of {minimum}")]
    ChapterTooShort {
        sequence: u64,
        words: usize,
        minimum: usize,
    },
    #[error("no paragraph pool for category '{}'", .0.name())]
    MissingParagraphPool(Category),
    #[error("no usable title after {attempts} attempts")]
    TitleExhausted { attempts: u32 },
    #[error("the story has ended ('{0}')")]
    StoryEnded(String),
}

/// Per-chapter assembly rules, derived from the configuration and the
/// active branch node.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleContext {
    pub mix: CategoryMix,
    /// Inclusive range of drawn body paragraphs.
    pub paragraphs: (usize, usize),
    pub min_word_count: usize,
    pub quest_chance: f64,
    pub max_events: usize,
    pub max_topup: usize,
    pub max_duplicate_retries: u32,
    pub title_attempts: u32,
}

impl RuleContext {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            mix: config.category_mix,
            paragraphs: config.paragraphs_per_chapter,
            min_word_count: config.min_word_count,
            quest_chance: config.quest_chance,
            max_events: config.max_events_per_chapter,
            max_topup: config.max_topup_paragraphs,
            max_duplicate_retries: config.max_duplicate_retries,
            title_attempts: config.title_attempts,
        }
    }

    pub fn with_mix(mut self, mix: CategoryMix) -> Self {
        self.mix = mix;
        self
    }
}

/// A body paragraph and where it came from, kept so it can be redrawn.
#[derive(Debug, Clone)]
struct Drawn {
    pool: PoolId,
    fragment: FragmentId,
    rank: u8,
    text: String,
}

/// The top-level engine. Built via `StoryEngine::builder()`.
pub struct StoryEngine {
    config: EngineConfig,
    pack_name: String,
    registry: PoolRegistry,
    titles: TitleGrammar,
    quests: QuestEngine,
    events: WorldEventEngine,
    graph: NarrativeGraph,
    relationships: RelationshipStore,
    paragraph_slots: BTreeMap<String, PoolId>,
    paragraph_pools: FxHashMap<Category, Vec<PoolId>>,
    corpus: CorpusContext,
    seed: u64,
    next_sequence: u64,
    current_node: NodeId,
    ending: Option<String>,
}

/// Builder for constructing a `StoryEngine`.
pub struct StoryEngineBuilder {
    seed: u64,
    config: Option<EngineConfig>,
    config_path: Option<String>,
    content: Option<ContentPack>,
    content_path: Option<String>,
}

impl StoryEngine {
    pub fn builder() -> StoryEngineBuilder {
        StoryEngineBuilder {
            seed: 0,
            config: None,
            config_path: None,
            content: None,
            content_path: None,
        }
    }

    /// Produce the next chapter at the current branch node. Sequence
    /// numbers start at 1 and only advance when a chapter is produced.
    pub fn next_chapter(&mut self) -> Result<Chapter, EngineError> {
        let sequence = self.next_sequence;
        let node = self.current_node.clone();
        let rules = self.rules_for(&node);
        let chapter = self.assemble_chapter(sequence, &node, &rules)?;
        self.next_sequence += 1;
        Ok(chapter)
    }

    /// Rules for a chapter at `node`, honoring the node's category mix.
    pub fn rules_for(&self, node: &NodeId) -> RuleContext {
        let rules = RuleContext::from_config(&self.config);
        match self.graph.node(node).ok().and_then(|n| n.mix) {
            Some(mix) => rules.with_mix(mix),
            None => rules,
        }
    }

    /// Compose one chapter. On failure every draw the chapter made is
    /// undone and the previous title combination is put back, so a failed
    /// chapter leaves no trace and retrying it produces what a clean engine
    /// would.
    pub fn assemble_chapter(
        &mut self,
        sequence: u64,
        active_branch: &NodeId,
        rules: &RuleContext,
    ) -> Result<Chapter, EngineError> {
        let mut ctx = ChapterContext::new(sequence, self.chapter_seed(sequence));
        let last_combo = self.titles.last_combo();
        match self.compose(&mut ctx, active_branch, rules) {
            Ok(chapter) => Ok(chapter),
            Err(e) => {
                self.registry.rollback(&mut ctx.selection);
                self.titles.set_last_combo(last_combo);
                Err(e)
            }
        }
    }

    fn compose(
        &mut self,
        ctx: &mut ChapterContext,
        active_branch: &NodeId,
        rules: &RuleContext,
    ) -> Result<Chapter, EngineError> {
        let sequence = ctx.sequence;

        // 1. Title
        let title = self.titles.generate(
            &mut self.registry,
            &mut ctx.selection,
            &self.corpus,
            rules.title_attempts,
        )?;

        // 2. Weighted paragraph categories
        let min = rules.paragraphs.0.max(1);
        let max = rules.paragraphs.1.max(min);
        let count = ctx.selection.rng.gen_range(min..=max);
        let categories = rules.mix.draw(count, &mut ctx.selection.rng);
        let mut body: Vec<Drawn> = Vec::with_capacity(count);
        for category in categories {
            let drawn = loop {
                let drawn = self.draw_paragraph(category, ctx)?;
                if !body.iter().any(|d| d.text == drawn.text) {
                    break drawn;
                }
                // Two fragments rendered to the same text.
                self.registry.retire(&drawn.pool, drawn.fragment, &mut ctx.selection)?;
            };
            body.push(drawn);
        }
        // The last paragraph drawn is the one redrawn on a duplicate.
        let last_drawn = body.len() - 1;

        // 3. Quest and world events
        let mut inserts = Vec::new();
        let mut quest = None;
        if !self.quests.is_empty() && ctx.selection.rng.gen_bool(rules.quest_chance.clamp(0.0, 1.0)) {
            let kinds = self.quests.kinds();
            let kind: QuestKind = kinds[ctx.selection.rng.gen_range(0..kinds.len())].clone();
            let instance = self
                .quests
                .generate_quest(&kind, &mut self.registry, &mut ctx.selection)?;
            if body.iter().any(|d| d.text == instance.text) {
                tracing::debug!(sequence, quest = kind.name(), "quest text repeats a paragraph, skipping");
            } else {
                inserts.push(instance.text);
                quest = Some(kind);
            }
        }

        let mut effects: Vec<EventEffect> = Vec::new();
        for _ in 0..rules.max_events {
            let Some(event) = self.events.maybe_trigger_event(&mut self.registry, ctx)? else {
                break;
            };
            let template = self
                .registry
                .get(&PoolId::for_event(event.category))
                .and_then(|p| p.fragment(event.fragment))
                .map(|f| f.template.clone())
                .ok_or_else(|| PoolError::UnknownFragment {
                    pool: PoolId::for_event(event.category),
                    fragment: event.fragment,
                })?;
            let text = render(&mut self.registry, &self.paragraph_slots, ctx, &template)?;
            if body.iter().any(|d| d.text == text) || inserts.contains(&text) {
                tracing::debug!(sequence, category = event.category.name(), "event text repeats a paragraph, skipping");
                let pool = PoolId::for_event(event.category);
                self.registry.retire(&pool, event.fragment, &mut ctx.selection)?;
                ctx.active_events.retain(|c| *c != event.category);
                continue;
            }
            // Events open the chapter's middle, ahead of any quest.
            inserts.insert(inserts.len().saturating_sub(usize::from(quest.is_some())), text);
            effects.extend(event.effects);
        }

        // 4. Order by category rank. Stable, so equal ranks keep draw order.
        let mut order: Vec<usize> = (0..body.len()).collect();
        order.sort_by_key(|&i| body[i].rank);

        // 5-6. Word count top-up and corpus duplicate check
        let mut topups: Vec<String> = Vec::new();
        let mut attempts = 0u32;
        let paragraphs = loop {
            let mut paragraphs = layout(&body, &order, &inserts, &topups);
            self.top_up(ctx, rules, &mut paragraphs, &mut topups)?;

            if !self.corpus.contains(&chapter_signature(&title, &paragraphs)) {
                break paragraphs;
            }
            if attempts >= rules.max_duplicate_retries {
                return Err(EngineError::DuplicateChapter { sequence, attempts });
            }
            attempts += 1;
            tracing::warn!(sequence, attempt = attempts, "duplicate chapter, redrawing last paragraph");
            if !self.redraw(&mut body[last_drawn], &paragraphs, ctx)? {
                return Err(EngineError::DuplicateChapter { sequence, attempts });
            }
        };

        // 7. Record and apply world event effects
        let word_count = count_words(&paragraphs);
        self.corpus.record(&title, &paragraphs);
        for effect in &effects {
            self.apply_effect(effect)?;
        }

        tracing::debug!(
            sequence,
            title = %title,
            paragraphs = paragraphs.len(),
            words = word_count,
            quest = quest.as_ref().map(QuestKind::name),
            events = ctx.active_events.len(),
            "chapter assembled"
        );

        Ok(Chapter {
            sequence,
            title,
            paragraphs,
            word_count,
            generated_at: Utc::now(),
            branch: active_branch.clone(),
            quest,
            events: ctx.active_events.clone(),
        })
    }

    /// Draw a paragraph of `category`. When that category's pools are all
    /// spent for this chapter, the other paragraph categories are tried
    /// in rank order.
    fn draw_paragraph(&mut self, category: Category, ctx: &mut ChapterContext) -> Result<Drawn, EngineError> {
        let mut fallbacks: Vec<Category> = Category::PARAGRAPH
            .iter()
            .copied()
            .filter(|c| *c != category)
            .collect();
        fallbacks.sort_by_key(Category::rank);

        let mut spent = None;
        for candidate in std::iter::once(category).chain(fallbacks) {
            let Some(pools) = self.paragraph_pools.get(&candidate) else {
                continue;
            };
            let start = ctx.selection.rng.gen_range(0..pools.len());
            for k in 0..pools.len() {
                let pool = &pools[(start + k) % pools.len()];
                match self.registry.select(pool, &mut ctx.selection) {
                    Ok(fragment) => {
                        if candidate != category {
                            tracing::warn!(
                                wanted = category.name(),
                                used = candidate.name(),
                                "paragraph pools spent, falling back"
                            );
                        }
                        let text = render(&mut self.registry, &self.paragraph_slots, ctx, &fragment.template)?;
                        return Ok(Drawn {
                            pool: pool.clone(),
                            fragment: fragment.id,
                            rank: candidate.rank(),
                            text,
                        });
                    }
                    Err(e @ PoolError::Exhausted { .. }) => spent = Some(e),
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Err(spent.map_or(EngineError::MissingParagraphPool(category), EngineError::from))
    }

    /// Replace a drawn paragraph with another fragment from the same pool
    /// whose text is not already among `current`. Returns false when the
    /// pool has nothing left for this chapter.
    fn redraw(
        &mut self,
        drawn: &mut Drawn,
        current: &[String],
        ctx: &mut ChapterContext,
    ) -> Result<bool, EngineError> {
        loop {
            let replacement = match self.registry.select(&drawn.pool, &mut ctx.selection) {
                Ok(fragment) => fragment,
                Err(PoolError::Exhausted { .. }) => return Ok(false),
                Err(e) => return Err(e.into()),
            };
            let text = render(&mut self.registry, &self.paragraph_slots, ctx, &replacement.template)?;
            if current.contains(&text) {
                self.registry.retire(&drawn.pool, replacement.id, &mut ctx.selection)?;
                continue;
            }
            self.registry.retire(&drawn.pool, drawn.fragment, &mut ctx.selection)?;
            drawn.text = text;
            drawn.fragment = replacement.id;
            return Ok(true);
        }
    }

    /// Append generic, then social, paragraphs until the minimum word
    /// count is met. Paragraphs already drawn by earlier passes are kept.
    fn top_up(
        &mut self,
        ctx: &mut ChapterContext,
        rules: &RuleContext,
        paragraphs: &mut Vec<String>,
        topups: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        let sources: Vec<PoolId> = [Category::Generic, Category::Social]
            .iter()
            .filter_map(|c| self.paragraph_pools.get(c))
            .flatten()
            .cloned()
            .collect();

        let mut next = 0;
        let mut spent = 0;
        loop {
            let words = count_words(paragraphs);
            if words >= rules.min_word_count {
                return Ok(());
            }
            if topups.len() >= rules.max_topup || sources.is_empty() || spent >= sources.len() {
                return Err(EngineError::ChapterTooShort {
                    sequence: ctx.sequence,
                    words,
                    minimum: rules.min_word_count,
                });
            }
            let pool = &sources[next % sources.len()];
            next += 1;
            match self.registry.select(pool, &mut ctx.selection) {
                Ok(fragment) => {
                    spent = 0;
                    let text = render(&mut self.registry, &self.paragraph_slots, ctx, &fragment.template)?;
                    if paragraphs.contains(&text) {
                        self.registry.retire(pool, fragment.id, &mut ctx.selection)?;
                        continue;
                    }
                    tracing::trace!(sequence = ctx.sequence, pool = %pool, "top-up paragraph");
                    paragraphs.push(text.clone());
                    topups.push(text);
                }
                Err(PoolError::Exhausted { .. }) => spent += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn apply_effect(&mut self, effect: &EventEffect) -> Result<(), EngineError> {
        match effect {
            EventEffect::Relationship { character, delta } => {
                self.relationships.apply_delta(character, delta)?;
            }
            EventEffect::Branch { node } => {
                if self.ending.is_none() {
                    self.current_node = self.graph.enter(node)?;
                    tracing::debug!(node = %node, "world event moved the story");
                }
            }
        }
        Ok(())
    }

    /// Take option `option_index` at the current node.
    pub fn choose(&mut self, option_index: usize) -> Result<ChoiceOutcome, EngineError> {
        if let Some(ending) = &self.ending {
            return Err(EngineError::StoryEnded(ending.clone()));
        }
        let outcome = self
            .graph
            .choose(&self.current_node, option_index, &mut self.relationships)?;
        match &outcome.next {
            Transition::Node(node) => self.current_node = node.clone(),
            Transition::Ending(ending) => {
                tracing::info!(ending = %ending, "story reached an ending");
                self.ending = Some(ending.clone());
            }
        }
        Ok(outcome)
    }

    /// Options a renderer may offer. Empty at terminal nodes and once an
    /// ending has been reached.
    pub fn current_options(&self) -> &[BranchOption] {
        if self.ending.is_some() {
            return &[];
        }
        self.graph
            .options(&self.current_node)
            .unwrap_or(&[])
    }

    pub fn chapter_seed(&self, sequence: u64) -> u64 {
        self.seed.wrapping_add(sequence.wrapping_mul(SEED_STRIDE))
    }

    /// Capture engine state together with the chapters produced so far.
    pub fn snapshot(&self, chapters: Vec<Chapter>) -> Snapshot {
        Snapshot {
            pack: self.pack_name.clone(),
            seed: self.seed,
            next_sequence: self.next_sequence,
            current_node: self.current_node.clone(),
            ending: self.ending.clone(),
            title_combo: self.titles.last_combo(),
            characters: self.relationships.characters().cloned().collect(),
            pool_usage: self.registry.usage_snapshot(),
            chapters,
            saved_at: Utc::now(),
        }
    }

    /// Restore state saved by `snapshot`. The duplicate-signature set and
    /// title ledger are rebuilt from the saved chapters. Returns the chapters.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<Vec<Chapter>, EngineError> {
        self.graph.node(&snapshot.current_node)?;
        if snapshot.pack != self.pack_name {
            tracing::warn!(saved = %snapshot.pack, loaded = %self.pack_name, "snapshot was taken with another content pack");
        }
        self.seed = snapshot.seed;
        self.next_sequence = snapshot.next_sequence;
        self.current_node = snapshot.current_node;
        self.ending = snapshot.ending;
        self.titles.set_last_combo(snapshot.title_combo);
        self.relationships.restore(snapshot.characters);
        self.registry.restore_usage(&snapshot.pool_usage);
        self.corpus = CorpusContext::from_chapters(&snapshot.chapters);
        tracing::info!(
            chapters = snapshot.chapters.len(),
            next_sequence = self.next_sequence,
            node = %self.current_node,
            "engine restored"
        );
        Ok(snapshot.chapters)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pack_name(&self) -> &str {
        &self.pack_name
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    pub fn pool_report(&self) -> Vec<PoolReport> {
        self.registry.report()
    }

    pub fn quests(&self) -> &QuestEngine {
        &self.quests
    }

    pub fn events(&self) -> &WorldEventEngine {
        &self.events
    }

    pub fn graph(&self) -> &NarrativeGraph {
        &self.graph
    }

    pub fn relationships(&self) -> &RelationshipStore {
        &self.relationships
    }

    pub fn corpus(&self) -> &CorpusContext {
        &self.corpus
    }

    pub fn current_node(&self) -> &NodeId {
        &self.current_node
    }

    pub fn ending(&self) -> Option<&str> {
        self.ending.as_deref()
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl ChapterSource for StoryEngine {
    fn next_chapter(&mut self) -> Result<Chapter, EngineError> {
        StoryEngine::next_chapter(self)
    }
}

/// Fill a fragment's slots from the chapter bindings, drawing any slot not
/// yet bound from its pool. Values are substituted literally.
fn render(
    registry: &mut PoolRegistry,
    slots: &BTreeMap<String, PoolId>,
    ctx: &mut ChapterContext,
    template: &Template,
) -> Result<String, EngineError> {
    for slot in template.slots() {
        if ctx.bindings.contains_key(slot) {
            continue;
        }
        let pool = slots
            .get(slot)
            .ok_or_else(|| TemplateError::UnboundSlot(slot.to_string()))?;
        let value = registry.select(pool, &mut ctx.selection)?;
        ctx.bindings.insert(slot.to_string(), value.text);
    }
    Ok(template.render(&ctx.bindings)?)
}

/// Opening paragraph, then quest and event paragraphs, then the rest of
/// the body, then top-ups. Every source is drawn distinct from the others,
/// so no paragraph repeats.
fn layout(body: &[Drawn], order: &[usize], inserts: &[String], topups: &[String]) -> Vec<String> {
    let mut ordered = order.iter().map(|&i| body[i].text.clone());
    let opening = ordered.next();
    let paragraphs: Vec<String> = opening
        .into_iter()
        .chain(inserts.iter().cloned())
        .chain(ordered)
        .chain(topups.iter().cloned())
        .collect();
    debug_assert!(
        paragraphs.iter().enumerate().all(|(i, p)| !paragraphs[..i].contains(p)),
        "repeated paragraph in layout"
    );
    paragraphs
}

impl StoryEngineBuilder {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Provide a configuration directly.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the configuration from a RON file. Ignored when `config` is set.
    pub fn config_path(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    /// Provide a content pack directly (for testing without files).
    pub fn content(mut self, pack: ContentPack) -> Self {
        self.content = Some(pack);
        self
    }

    /// Load the content pack from a RON file. Ignored when `content` is set.
    pub fn content_path(mut self, path: &str) -> Self {
        self.content_path = Some(path.to_string());
        self
    }

    pub fn build(self) -> Result<StoryEngine, EngineError> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => EngineConfig::load_from_ron(Path::new(&path))?,
            (None, None) => EngineConfig::default(),
        };
        config.validate()?;

        let pack = match (self.content, self.content_path) {
            (Some(pack), _) => pack,
            (None, Some(path)) => ContentPack::load_from_ron(Path::new(&path))?,
            (None, None) => ContentPack::builtin()?,
        };

        // Pools
        let mut registry = PoolRegistry::new(SelectionLimits::from_config(&config));
        pack.install_pools(&mut registry)?;

        let mut paragraph_pools: FxHashMap<Category, Vec<PoolId>> = FxHashMap::default();
        for pool in registry.pools().filter(|p| p.category.is_paragraph()) {
            paragraph_pools.entry(pool.category).or_default().push(pool.id.clone());
        }
        for pool in pack.paragraph_slots.values() {
            if !registry.contains(pool) {
                return Err(PoolError::UnknownPool(pool.clone()).into());
            }
        }
        for pool in registry.pools() {
            if !(pool.category.is_paragraph() || matches!(pool.category, Category::Event(_))) {
                continue;
            }
            for fragment in pool.fragments() {
                if let Some(slot) = fragment
                    .template
                    .slots()
                    .into_iter()
                    .find(|s| !pack.paragraph_slots.contains_key(*s))
                {
                    return Err(TemplateError::UnboundSlot(slot.to_string()).into());
                }
            }
        }

        // Title grammar
        let title = &pack.title;
        for pool in [&title.subject, &title.verb, &title.modifier] {
            if !registry.contains(pool) {
                return Err(PoolError::UnknownPool(pool.clone()).into());
            }
        }
        let titles = TitleGrammar::new(
            &title.patterns,
            title.subject.clone(),
            title.verb.clone(),
            title.modifier.clone(),
        )?;

        // Quests and events
        let mut quests = QuestEngine::new();
        for spec in &pack.quests {
            let template = QuestTemplate::new(spec.kind.clone(), &spec.text, spec.slots.clone())?;
            quests.register(template, &registry)?;
        }
        let mut events = WorldEventEngine::new();
        for spec in &pack.events {
            let (_, effects) = spec.fragments();
            events.register(spec.category, spec.odds, effects, &registry)?;
        }

        // Characters and graph
        let mut relationships = RelationshipStore::new(config.relationship);
        for state in pack.character_states() {
            relationships.register(state);
        }
        let graph = NarrativeGraph::new(pack.graph.root.clone(), pack.graph.nodes.clone())?;
        graph.validate_characters(&relationships)?;
        for effect in events.all_effects() {
            match effect {
                EventEffect::Relationship { character, .. } => {
                    relationships.state(character)?;
                }
                EventEffect::Branch { node } => {
                    graph.node(node)?;
                }
            }
        }

        // Every category a mix can ask for needs a pool.
        let mixes = std::iter::once(config.category_mix).chain(graph.nodes().filter_map(|n| n.mix));
        for mix in mixes {
            if let Some(missing) = Category::PARAGRAPH
                .iter()
                .find(|c| mix.weight(**c) > 0 && !paragraph_pools.contains_key(*c))
            {
                return Err(EngineError::MissingParagraphPool(*missing));
            }
        }

        tracing::info!(
            pack = %pack.name,
            pools = registry.pools().count(),
            quests = quests.kinds().len(),
            events = events.triggers().len(),
            characters = relationships.len(),
            nodes = graph.len(),
            seed = self.seed,
            "story engine ready"
        );

        let current_node = graph.root().clone();
        Ok(StoryEngine {
            config,
            pack_name: pack.name,
            registry,
            titles,
            quests,
            events,
            graph,
            relationships,
            paragraph_slots: pack.paragraph_slots,
            paragraph_pools,
            corpus: CorpusContext::new(),
            seed: self.seed,
            next_sequence: 1,
            current_node,
            ending: None,
        })
    }
}

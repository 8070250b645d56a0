//! Engine configuration. Every tuning value is supplied from outside the
//! engine, either through the builder or a RON file.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::schema::character::ScoreLimits;
use crate::schema::fragment::Category;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Maximum number of chapters a single bounded fragment may appear in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReuseCeiling {
    /// Absolute number of uses per fragment.
    Fixed(u32),
    /// `ceil(target_corpus_size / pool_size) * ratio`.
    Proportional { ratio: u32 },
}

impl ReuseCeiling {
    pub fn for_pool(&self, target_corpus_size: u64, pool_size: usize) -> u32 {
        match *self {
            Self::Fixed(n) => n,
            Self::Proportional { ratio } => {
                fair_share(target_corpus_size, pool_size).saturating_mul(ratio)
            }
        }
    }
}

impl Default for ReuseCeiling {
    fn default() -> Self {
        Self::Fixed(20)
    }
}

/// Expected uses per fragment when `target_corpus_size` draws are spread
/// evenly over `pool_size` fragments, rounded up.
pub fn fair_share(target_corpus_size: u64, pool_size: usize) -> u32 {
    if pool_size == 0 {
        return 0;
    }
    let share = target_corpus_size.div_ceil(pool_size as u64);
    u32::try_from(share).unwrap_or(u32::MAX)
}

/// Relative weights of the paragraph categories in a chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMix {
    #[serde(default)]
    pub combat: u32,
    #[serde(default)]
    pub exploration: u32,
    #[serde(default)]
    pub dialogue: u32,
    #[serde(default)]
    pub introspection: u32,
    #[serde(default)]
    pub social: u32,
    #[serde(default)]
    pub generic: u32,
}

impl Default for CategoryMix {
    fn default() -> Self {
        Self {
            combat: 2,
            exploration: 2,
            dialogue: 2,
            introspection: 1,
            social: 1,
            generic: 1,
        }
    }
}

impl CategoryMix {
    pub fn weight(&self, category: Category) -> u32 {
        match category {
            Category::Combat => self.combat,
            Category::Exploration => self.exploration,
            Category::Dialogue => self.dialogue,
            Category::Introspection => self.introspection,
            Category::Social => self.social,
            Category::Generic => self.generic,
            _ => 0,
        }
    }

    /// Draw `count` paragraph categories by weight. A mix with no weight
    /// at all falls back to generic paragraphs.
    pub fn draw<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<Category> {
        let weights: Vec<u32> = Category::PARAGRAPH.iter().map(|c| self.weight(*c)).collect();
        match WeightedIndex::new(&weights) {
            Ok(dist) => (0..count)
                .map(|_| Category::PARAGRAPH[dist.sample(rng)])
                .collect(),
            Err(_) => vec![Category::Generic; count],
        }
    }
}

/// Scheduler pacing defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub chapters_per_interval: u32,
    pub interval_ms: u64,
    /// Upper bound on chapters produced in a single tick.
    pub frame_cap: u32,
    pub unlimited: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            chapters_per_interval: 1,
            interval_ms: 1000,
            frame_cap: 25,
            unlimited: false,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Corpus size the pools are expected to sustain.
    pub target_corpus_size: u64,
    pub min_word_count: usize,
    pub reuse_ceiling: ReuseCeiling,
    /// Extra uses above fair share before the selector starts widening.
    pub fair_share_tolerance: u32,
    /// Inclusive range of drawn body paragraphs per chapter.
    pub paragraphs_per_chapter: (usize, usize),
    pub category_mix: CategoryMix,
    /// Probability that a chapter carries a quest paragraph.
    pub quest_chance: f64,
    pub max_events_per_chapter: usize,
    pub max_duplicate_retries: u32,
    pub max_topup_paragraphs: usize,
    /// Attempts at finding a title not already present in the corpus.
    pub title_attempts: u32,
    pub relationship: ScoreLimits,
    pub scheduler: SchedulerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_corpus_size: 5000,
            min_word_count: 200,
            reuse_ceiling: ReuseCeiling::default(),
            fair_share_tolerance: 2,
            paragraphs_per_chapter: (4, 6),
            category_mix: CategoryMix::default(),
            quest_chance: 0.35,
            max_events_per_chapter: 2,
            max_duplicate_retries: 8,
            max_topup_paragraphs: 12,
            title_attempts: 12,
            relationship: ScoreLimits::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a RON file. Missing fields take defaults.
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_corpus_size == 0 {
            return Err(ConfigError::Invalid("target_corpus_size must be at least 1".to_string()));
        }
        match self.reuse_ceiling {
            ReuseCeiling::Fixed(0) => {
                return Err(ConfigError::Invalid("reuse_ceiling Fixed must allow at least 1 use".to_string()));
            }
            ReuseCeiling::Proportional { ratio: 0 } => {
                return Err(ConfigError::Invalid("reuse_ceiling ratio must be at least 1".to_string()));
            }
            _ => {}
        }
        let (min, max) = self.paragraphs_per_chapter;
        if min == 0 || min > max {
            return Err(ConfigError::Invalid(format!(
                "paragraphs_per_chapter must be a non-empty range starting at 1 or more, got {}..={}",
                min, max
            )));
        }
        if self.relationship.min > self.relationship.max {
            return Err(ConfigError::Invalid(format!(
                "relationship score range {}..={} is empty",
                self.relationship.min, self.relationship.max
            )));
        }
        if !(0.0..=1.0).contains(&self.quest_chance) {
            return Err(ConfigError::Invalid(format!(
                "quest_chance must be within 0..=1, got {}",
                self.quest_chance
            )));
        }
        if !self.scheduler.unlimited && self.scheduler.interval_ms == 0 {
            return Err(ConfigError::Invalid("scheduler.interval_ms must be at least 1".to_string()));
        }
        if self.scheduler.frame_cap == 0 {
            return Err(ConfigError::Invalid("scheduler.frame_cap must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn fair_share_rounds_up() {
        assert_eq!(fair_share(5000, 300), 17);
        assert_eq!(fair_share(5000, 250), 20);
        assert_eq!(fair_share(10, 0), 0);
    }

    #[test]
    fn ceilings() {
        assert_eq!(ReuseCeiling::Fixed(20).for_pool(5000, 10), 20);
        assert_eq!(
            ReuseCeiling::Proportional { ratio: 2 }.for_pool(5000, 1000),
            10
        );
    }

    #[test]
    fn partial_ron_uses_defaults() {
        let config = EngineConfig::parse_ron(
            "(min_word_count: 150, reuse_ceiling: Proportional(ratio: 3))",
        )
        .unwrap();
        assert_eq!(config.min_word_count, 150);
        assert_eq!(config.reuse_ceiling, ReuseCeiling::Proportional { ratio: 3 });
        assert_eq!(config.target_corpus_size, 5000);
        assert_eq!(config.scheduler.frame_cap, 25);
    }

    #[test]
    fn invalid_ranges_rejected() {
        assert!(EngineConfig::parse_ron("(paragraphs_per_chapter: (5, 2))").is_err());
        assert!(EngineConfig::parse_ron("(quest_chance: 1.5)").is_err());
    }

    #[test]
    fn zero_ceilings_rejected() {
        for input in [
            "(target_corpus_size: 0)",
            "(reuse_ceiling: Fixed(0))",
            "(reuse_ceiling: Proportional(ratio: 0))",
        ] {
            assert!(
                matches!(EngineConfig::parse_ron(input), Err(ConfigError::Invalid(_))),
                "{} was accepted",
                input
            );
        }
        assert!(EngineConfig::parse_ron("(reuse_ceiling: Proportional(ratio: 1))").is_ok());
    }

    #[test]
    fn mix_draw_respects_zero_weights() {
        let mix = CategoryMix {
            combat: 1,
            exploration: 0,
            dialogue: 0,
            introspection: 0,
            social: 0,
            generic: 0,
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert!(mix.draw(20, &mut rng).iter().all(|c| *c == Category::Combat));
    }

    #[test]
    fn empty_mix_falls_back_to_generic() {
        let mix = CategoryMix {
            combat: 0,
            exploration: 0,
            dialogue: 0,
            introspection: 0,
            social: 0,
            generic: 0,
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(mix.draw(3, &mut rng), vec![Category::Generic; 3]);
    }
}

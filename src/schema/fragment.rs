use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::EventCategory;

/// Newtype wrapper for content pool identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub String);

impl PoolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The pool that backs world events of the given category.
    pub fn for_event(category: EventCategory) -> Self {
        Self(format!("event.{}", category.name()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index of a fragment within its owning pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(pub u32);

/// The category a pool belongs to. Every fragment inherits the category
/// of the pool that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Combat,
    Exploration,
    Dialogue,
    Introspection,
    Social,
    Generic,
    /// Subject, verb and modifier parts of chapter titles.
    TitlePart,
    /// Placeholder values substituted into templates (names, places, ...).
    Value,
    Event(EventCategory),
}

impl Category {
    /// Categories that produce chapter body paragraphs.
    pub const PARAGRAPH: [Category; 6] = [
        Category::Exploration,
        Category::Social,
        Category::Dialogue,
        Category::Combat,
        Category::Introspection,
        Category::Generic,
    ];

    pub fn is_paragraph(&self) -> bool {
        Self::PARAGRAPH.contains(self)
    }

    /// Position of this category when ordering paragraphs inside a chapter.
    /// Scene-setting comes first, reflection and filler last.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Exploration => 0,
            Self::Event(_) => 1,
            Self::Social => 2,
            Self::Dialogue => 3,
            Self::Combat => 4,
            Self::Introspection => 5,
            Self::Generic => 6,
            Self::TitlePart | Self::Value => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Combat => "combat",
            Self::Exploration => "exploration",
            Self::Dialogue => "dialogue",
            Self::Introspection => "introspection",
            Self::Social => "social",
            Self::Generic => "generic",
            Self::TitlePart => "title_part",
            Self::Value => "value",
            Self::Event(_) => "event",
        }
    }
}

/// How strictly a pool's fragments are rationed across a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReusePolicy {
    /// The hard reuse ceiling applies; selection fails once every
    /// fragment has reached it.
    #[default]
    Bounded,
    /// No ceiling. Fair-share and recency preferences still apply.
    Unbounded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_categories() {
        assert!(Category::Combat.is_paragraph());
        assert!(Category::Generic.is_paragraph());
        assert!(!Category::Value.is_paragraph());
        assert!(!Category::Event(EventCategory::Conflict).is_paragraph());
    }

    #[test]
    fn exploration_opens_generic_closes() {
        let mut cats = vec![
            Category::Generic,
            Category::Combat,
            Category::Exploration,
            Category::Introspection,
        ];
        cats.sort_by_key(|c| c.rank());
        assert_eq!(cats.first(), Some(&Category::Exploration));
        assert_eq!(cats.last(), Some(&Category::Generic));
    }

    #[test]
    fn event_pool_ids() {
        assert_eq!(
            PoolId::for_event(EventCategory::Supernatural).as_str(),
            "event.supernatural"
        );
    }

    #[test]
    fn pool_id_is_a_plain_string_in_ron() {
        let id = PoolId::new("paragraph.combat");
        assert_eq!(ron::to_string(&id).unwrap(), "\"paragraph.combat\"");
    }
}

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::branch::NodeId;
use super::event::EventCategory;
use super::quest::QuestKind;

/// A generated chapter. Produced by the pipeline and owned by whichever
/// consumer renders or persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub sequence: u64,
    pub title: String,
    pub paragraphs: Vec<String>,
    pub word_count: usize,
    pub generated_at: DateTime<Utc>,
    /// Branch node that was active while the chapter was assembled.
    pub branch: NodeId,
    #[serde(default)]
    pub quest: Option<QuestKind>,
    #[serde(default)]
    pub events: Vec<EventCategory>,
}

impl Chapter {
    /// True when no paragraph text appears twice.
    pub fn has_unique_paragraphs(&self) -> bool {
        let mut seen = FxHashSet::default();
        self.paragraphs.iter().all(|p| seen.insert(p.as_str()))
    }
}

/// Number of whitespace-separated words across all paragraphs.
pub fn count_words<S: AsRef<str>>(paragraphs: &[S]) -> usize {
    paragraphs
        .iter()
        .map(|p| p.as_ref().split_whitespace().count())
        .sum()
}

/// Narrative context — corpus-wide duplicate tracking and per-chapter
/// working state.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

use crate::core::pool::SelectionContext;
use crate::schema::chapter::Chapter;
use crate::schema::event::EventCategory;

/// Separates the title from the paragraphs inside a signature.
const TITLE_SEPARATOR: char = '\u{1f}';
/// Separates consecutive paragraphs inside a signature.
const PARAGRAPH_SEPARATOR: char = '\u{1e}';

/// Exact (title, paragraphs) identity of a chapter.
pub fn chapter_signature<S: AsRef<str>>(title: &str, paragraphs: &[S]) -> String {
    let mut signature = String::with_capacity(
        title.len() + paragraphs.iter().map(|p| p.as_ref().len() + 1).sum::<usize>() + 1,
    );
    signature.push_str(title);
    signature.push(TITLE_SEPARATOR);
    for paragraph in paragraphs {
        signature.push_str(paragraph.as_ref());
        signature.push(PARAGRAPH_SEPARATOR);
    }
    signature
}

/// Everything the engine remembers about the corpus produced so far:
/// the signature of every chapter and how often each title was used.
#[derive(Debug, Clone, Default)]
pub struct CorpusContext {
    signatures: FxHashSet<String>,
    titles: FxHashMap<String, u32>,
    chapters: u64,
}

impl CorpusContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from previously generated chapters.
    pub fn from_chapters<'a>(chapters: impl IntoIterator<Item = &'a Chapter>) -> Self {
        let mut corpus = Self::new();
        for chapter in chapters {
            corpus.record(&chapter.title, &chapter.paragraphs);
        }
        corpus
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.signatures.contains(signature)
    }

    pub fn has_title(&self, title: &str) -> bool {
        self.titles.contains_key(title)
    }

    /// Record a chapter. Returns false when an identical chapter was
    /// already recorded.
    pub fn record<S: AsRef<str>>(&mut self, title: &str, paragraphs: &[S]) -> bool {
        *self.titles.entry(title.to_string()).or_default() += 1;
        self.chapters += 1;
        self.signatures.insert(chapter_signature(title, paragraphs))
    }

    pub fn chapters(&self) -> u64 {
        self.chapters
    }

    pub fn title_count(&self, title: &str) -> u32 {
        self.titles.get(title).copied().unwrap_or(0)
    }

    /// Titles used more than once, most repeated first.
    pub fn duplicate_titles(&self) -> Vec<(String, u32)> {
        let mut dupes: Vec<(String, u32)> = self
            .titles
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(title, count)| (title.clone(), *count))
            .collect();
        dupes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        dupes
    }
}

/// Working state for the chapter currently being assembled.
pub struct ChapterContext {
    pub sequence: u64,
    pub selection: SelectionContext,
    /// Slot values bound for this chapter. Each slot is drawn once and
    /// reused at every occurrence.
    pub bindings: BTreeMap<String, String>,
    /// Event categories already rolled for this chapter.
    pub rolled_events: Vec<EventCategory>,
    /// Event categories that fired in this chapter.
    pub active_events: Vec<EventCategory>,
}

impl ChapterContext {
    pub fn new(sequence: u64, seed: u64) -> Self {
        Self {
            sequence,
            selection: SelectionContext::new(sequence, seed),
            bindings: BTreeMap::new(),
            rolled_events: Vec::new(),
            active_events: Vec::new(),
        }
    }
}

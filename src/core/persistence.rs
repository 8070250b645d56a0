/// Persistence — engine snapshots and the stores that hold them.
///
/// The engine never touches storage itself: hosts take a `Snapshot` from
/// `StoryEngine::snapshot` and hand it to a `SnapshotStore`.

use chrono::{DateTime, Utc};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::pool::FragmentUsage;
use crate::core::title::TitleCombo;
use crate::schema::branch::NodeId;
use crate::schema::chapter::Chapter;
use crate::schema::character::CharacterState;
use crate::schema::fragment::PoolId;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    Serialize(#[from] ron::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("save failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<PersistenceError>,
    },
}

/// Everything needed to continue a story where it left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Name of the content pack the snapshot was taken with.
    pub pack: String,
    pub seed: u64,
    pub next_sequence: u64,
    pub current_node: NodeId,
    #[serde(default)]
    pub ending: Option<String>,
    #[serde(default)]
    pub title_combo: Option<TitleCombo>,
    pub characters: Vec<CharacterState>,
    pub pool_usage: BTreeMap<PoolId, Vec<FragmentUsage>>,
    pub chapters: Vec<Chapter>,
    pub saved_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn to_ron(&self) -> Result<String, PersistenceError> {
        Ok(ron::ser::to_string_pretty(self, PrettyConfig::default())?)
    }

    pub fn from_ron(input: &str) -> Result<Snapshot, PersistenceError> {
        Ok(ron::from_str(input)?)
    }
}

pub trait SnapshotStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), PersistenceError>;
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError>;
}

/// Stores one snapshot as a RON file. Writes go to a sibling temporary
/// file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct RonFileStore {
    path: PathBuf,
}

impl RonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for RonFileStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let contents = snapshot.to_ron()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("ron.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), chapters = snapshot.chapters.len(), "snapshot saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(Some(Snapshot::from_ron(&contents)?))
    }
}

/// Keeps the serialized snapshot in memory. Can be told to fail the next
/// few saves, standing in for an unreliable host store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Option<String>,
    failures: u32,
    saves: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: u32) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    /// Successful saves so far.
    pub fn saves(&self) -> u32 {
        self.saves
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(PersistenceError::Unavailable("memory store refused the write".to_string()));
        }
        self.data = Some(snapshot.to_ron()?);
        self.saves += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        self.data.as_deref().map(Snapshot::from_ron).transpose()
    }
}

/// Save with up to `attempts` tries. Serialization errors are not retried.
pub fn save_with_retry<S: SnapshotStore + ?Sized>(
    store: &mut S,
    snapshot: &Snapshot,
    attempts: u32,
) -> Result<(), PersistenceError> {
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match store.save(snapshot) {
            Ok(()) => return Ok(()),
            Err(e @ PersistenceError::Serialize(_)) => return Err(e),
            Err(e) if attempt >= attempts => {
                return Err(PersistenceError::RetriesExhausted {
                    attempts,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                tracing::warn!(attempt, max = attempts, error = %e, "snapshot save failed, retrying");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::character::CharacterId;
    use crate::schema::fragment::FragmentId;
    use crate::schema::quest::QuestKind;

    fn snapshot() -> Snapshot {
        let mut mira = CharacterState::new(CharacterId::new("mira"), "Mira", "wry");
        mira.flags.insert("owes_a_favor".to_string());
        mira.memories.push_back("the ford".to_string());
        Snapshot {
            pack: "test".to_string(),
            seed: 42,
            next_sequence: 3,
            current_node: NodeId::new("camp"),
            ending: None,
            title_combo: Some((FragmentId(1), FragmentId(0), FragmentId(2))),
            characters: vec![mira],
            pool_usage: BTreeMap::from([(
                PoolId::new("paragraph.combat"),
                vec![
                    FragmentUsage {
                        uses: 2,
                        last_chapter: Some(2),
                    },
                    FragmentUsage::default(),
                ],
            )]),
            chapters: vec![Chapter {
                sequence: 1,
                title: "The Wolf Waits".to_string(),
                paragraphs: vec!["One.".to_string(), "Two.".to_string()],
                word_count: 2,
                generated_at: Utc::now(),
                branch: NodeId::new("camp"),
                quest: Some(QuestKind::Custom("smuggling".to_string())),
                events: Vec::new(),
            }],
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn memory_store_keeps_latest() {
        let mut store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());
        let saved = snapshot();
        store.save(&saved).unwrap();
        assert_eq!(store.load().unwrap(), Some(saved));
    }

    #[test]
    fn retry_recovers_from_transient_failures() {
        let mut store = MemoryStore::failing(2);
        save_with_retry(&mut store, &snapshot(), 3).unwrap();
        assert_eq!(store.saves(), 1);
    }

    #[test]
    fn retry_gives_up() {
        let mut store = MemoryStore::failing(5);
        match save_with_retry(&mut store, &snapshot(), 3) {
            Err(PersistenceError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, PersistenceError::Unavailable(_)));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("storyloom-snapshot-{}", std::process::id()));
        let mut store = RonFileStore::new(dir.join("save.ron"));
        assert!(store.load().unwrap().is_none());

        let saved = snapshot();
        store.save(&saved).unwrap();
        assert_eq!(store.load().unwrap(), Some(saved));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("storyloom-corrupt-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("save.ron");
        std::fs::write(&path, "(not a snapshot").unwrap();
        assert!(matches!(
            RonFileStore::new(&path).load(),
            Err(PersistenceError::Ron(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

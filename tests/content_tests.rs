/// Content integration tests — loading packs and configs from disk and
/// rejecting packs that would fail at generation time.

use std::path::Path;

use storyloom::core::config::{EngineConfig, ReuseCeiling};
use storyloom::core::content::{ContentError, ContentPack};
use storyloom::core::graph::GraphError;
use storyloom::core::pipeline::{EngineError, StoryEngine};
use storyloom::core::template::TemplateError;
use storyloom::schema::branch::OptionTarget;
use storyloom::schema::event::EventCategory;
use storyloom::schema::fragment::{Category, ReusePolicy};

const PACK_PATH: &str = "genre_data/wayfarer.ron";
const CONFIG_PATH: &str = "genre_data/engine.ron";

#[test]
fn shipped_files_match_builtins() {
    let from_disk = ContentPack::load_from_ron(Path::new(PACK_PATH)).unwrap();
    assert_eq!(from_disk, ContentPack::builtin().unwrap());

    let config = EngineConfig::load_from_ron(Path::new(CONFIG_PATH)).unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.reuse_ceiling, ReuseCeiling::Fixed(20));
}

#[test]
fn engine_builds_from_paths() {
    let mut engine = StoryEngine::builder()
        .seed(3)
        .config_path(CONFIG_PATH)
        .content_path(PACK_PATH)
        .build()
        .unwrap();
    assert_eq!(engine.pack_name(), "wayfarer");
    assert_eq!(engine.quests().kinds().len(), 7);
    assert_eq!(engine.events().triggers().len(), EventCategory::ALL.len());
    assert_eq!(engine.relationships().len(), 4);
    let chapter = engine.next_chapter().unwrap();
    assert!(chapter.word_count >= 200);
}

#[test]
fn builtin_pool_policies() {
    let engine = StoryEngine::builder().build().unwrap();
    for report in engine.pool_report() {
        match report.category {
            Category::Value | Category::TitlePart => {
                assert_eq!(report.reuse, ReusePolicy::Unbounded, "{}", report.pool);
                assert_eq!(report.ceiling, None);
            }
            _ => {
                assert_eq!(report.reuse, ReusePolicy::Bounded, "{}", report.pool);
                assert_eq!(report.ceiling, Some(20));
            }
        }
    }
}

#[test]
fn builtin_graph_has_endings_and_a_terminal_node() {
    let pack = ContentPack::builtin().unwrap();
    let endings: Vec<&str> = pack
        .graph
        .nodes
        .iter()
        .flat_map(|n| &n.options)
        .filter_map(|o| match &o.target {
            OptionTarget::Ending(e) => Some(e.as_str()),
            OptionTarget::Node(_) => None,
        })
        .collect();
    assert_eq!(endings.len(), 2);
    assert!(pack.graph.nodes.iter().any(|n| n.is_terminal()));
}

#[test]
fn missing_pack_file_is_an_io_error() {
    let result = StoryEngine::builder().content_path("genre_data/nowhere.ron").build();
    assert!(matches!(result, Err(EngineError::Content(ContentError::Io(_)))));
}

#[test]
fn unbound_paragraph_slot_is_rejected() {
    let mut pack = ContentPack::builtin().unwrap();
    pack.paragraph_slots.remove("WEATHER");
    let result = StoryEngine::builder().content(pack).build();
    assert!(matches!(
        result,
        Err(EngineError::Template(TemplateError::UnboundSlot(ref slot))) if slot == "WEATHER"
    ));
}

#[test]
fn dangling_option_target_is_rejected() {
    let mut pack = ContentPack::builtin().unwrap();
    pack.graph.nodes.retain(|n| n.id.as_str() != "court");
    let result = StoryEngine::builder().content(pack).build();
    assert!(matches!(
        result,
        Err(EngineError::Graph(GraphError::DanglingTarget { .. }))
    ));
}

#[test]
fn unknown_character_in_options_is_rejected() {
    let mut pack = ContentPack::builtin().unwrap();
    pack.characters.retain(|c| c.id.as_str() != "tobin");
    assert!(StoryEngine::builder().content(pack).build().is_err());
}

#[test]
fn malformed_config_is_rejected() {
    assert!(EngineConfig::parse_ron("(paragraphs_per_chapter: (5, 2))").is_err());
    assert!(EngineConfig::parse_ron("(quest_chance: 1.5)").is_err());
    let config = EngineConfig::parse_ron("(min_word_count: 120)").unwrap();
    assert_eq!(config.min_word_count, 120);
    assert_eq!(config.target_corpus_size, 5000);
}

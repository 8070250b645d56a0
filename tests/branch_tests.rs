/// Branching integration tests — choices on the built-in graph and their
/// effect on characters and later chapters.

use storyloom::core::graph::GraphError;
use storyloom::core::pipeline::{EngineError, StoryEngine};
use storyloom::schema::branch::{NodeId, Transition};
use storyloom::schema::character::CharacterId;

fn engine() -> StoryEngine {
    StoryEngine::builder().seed(11).build().unwrap()
}

#[test]
fn story_starts_at_the_crossroads() {
    let engine = engine();
    assert_eq!(engine.current_node(), &NodeId::new("crossroads"));
    assert_eq!(engine.current_options().len(), 3);
    assert!(engine.ending().is_none());
}

#[test]
fn trust_is_clamped_at_the_maximum() {
    let mut engine = engine();
    let mira = CharacterId::new("mira");
    assert_eq!(engine.relationships().state(&mira).unwrap().scores.trust, 60);

    // Crossroads -> camp raises Mira's trust by 5; camp -> crossroads leaves it.
    for _ in 0..10 {
        let outcome = engine.choose(0).unwrap();
        assert_eq!(outcome.next, Transition::Node(NodeId::new("camp")));
        engine.choose(0).unwrap();
    }
    let state = engine.relationships().state(&mira).unwrap();
    assert_eq!(state.scores.trust, 100);
    assert_eq!(state.scores.friendship, 100);
    assert!(state.memories.iter().any(|m| m == "a long night by the fire"));
}

#[test]
fn ending_stops_choices_but_not_chapters() {
    let mut engine = engine();
    engine.choose(2).unwrap(); // hills
    engine.choose(0).unwrap(); // watchtower
    let outcome = engine.choose(1).unwrap();
    assert_eq!(outcome.next, Transition::Ending("gone_west".to_string()));
    assert_eq!(engine.ending(), Some("gone_west"));
    assert!(engine.current_options().is_empty());

    assert!(matches!(engine.choose(0), Err(EngineError::StoryEnded(ref e)) if e == "gone_west"));

    let chapter = engine.next_chapter().unwrap();
    assert_eq!(chapter.branch, NodeId::new("watchtower"));
}

#[test]
fn terminal_node_has_no_options() {
    let mut engine = engine();
    engine.choose(2).unwrap();
    engine.choose(0).unwrap();
    engine.choose(2).unwrap();
    assert_eq!(engine.current_node(), &NodeId::new("quiet_end"));
    assert!(engine.current_options().is_empty());
    assert!(engine.ending().is_none());
    assert!(matches!(
        engine.choose(0),
        Err(EngineError::Graph(GraphError::InvalidOption { available: 0, .. }))
    ));
    assert!(engine.next_chapter().is_ok());
}

#[test]
fn invalid_choice_changes_nothing() {
    let mut engine = engine();
    let before: Vec<_> = engine.relationships().characters().cloned().collect();
    assert!(engine.choose(9).is_err());
    let after: Vec<_> = engine.relationships().characters().cloned().collect();
    assert_eq!(before, after);
    assert_eq!(engine.current_node(), &NodeId::new("crossroads"));
}

#[test]
fn chapters_carry_the_active_node() {
    let mut engine = engine();
    engine.choose(1).unwrap(); // river
    let chapter = engine.next_chapter().unwrap();
    assert_eq!(chapter.branch, NodeId::new("river"));
}

use serde::{Deserialize, Serialize};

use super::branch::NodeId;
use super::character::{CharacterId, RelationshipDelta};
use super::fragment::FragmentId;

/// World event taxonomy. Each category has its own fragment pool and
/// its own independent trigger odds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventCategory {
    Supernatural,
    Conflict,
    Discovery,
    Environmental,
    Political,
}

impl EventCategory {
    pub const ALL: [EventCategory; 5] = [
        EventCategory::Supernatural,
        EventCategory::Conflict,
        EventCategory::Discovery,
        EventCategory::Environmental,
        EventCategory::Political,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Supernatural => "supernatural",
            Self::Conflict => "conflict",
            Self::Discovery => "discovery",
            Self::Environmental => "environmental",
            Self::Political => "political",
        }
    }
}

/// A mechanical consequence carried by a world event. Effects are
/// requests: the pipeline applies them through the relationship store
/// and the narrative graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventEffect {
    Relationship {
        character: CharacterId,
        delta: RelationshipDelta,
    },
    Branch {
        node: NodeId,
    },
}

/// An instantiated world event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldEvent {
    pub category: EventCategory,
    pub fragment: FragmentId,
    pub text: String,
    pub effects: Vec<EventEffect>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names() {
        assert_eq!(EventCategory::Supernatural.name(), "supernatural");
        assert_eq!(EventCategory::Political.name(), "political");
        assert_eq!(EventCategory::ALL.len(), 5);
    }

    #[test]
    fn effects_parse_from_ron() {
        let effects: Vec<EventEffect> = ron::from_str(
            r#"[
                Relationship(character: "mira", delta: (trust: -10, memory: Some("saw the omen"))),
                Branch(node: "crossroads"),
            ]"#,
        )
        .unwrap();
        assert_eq!(effects.len(), 2);
        match &effects[0] {
            EventEffect::Relationship { character, delta } => {
                assert_eq!(character.as_str(), "mira");
                assert_eq!(delta.trust, -10);
                assert_eq!(delta.memory.as_deref(), Some("saw the omen"));
            }
            other => panic!("unexpected effect {:?}", other),
        }
        assert!(matches!(&effects[1], EventEffect::Branch { node } if node.as_str() == "crossroads"));
    }
}

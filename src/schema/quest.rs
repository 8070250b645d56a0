use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The quest taxonomy. Content packs may register custom kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QuestKind {
    Escort,
    Rescue,
    Delivery,
    Crafting,
    Diplomacy,
    Stealth,
    Custom(String),
}

impl QuestKind {
    pub fn name(&self) -> &str {
        match self {
            Self::Escort => "escort",
            Self::Rescue => "rescue",
            Self::Delivery => "delivery",
            Self::Crafting => "crafting",
            Self::Diplomacy => "diplomacy",
            Self::Stealth => "stealth",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for QuestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Standard placeholder names used by quest templates.
pub mod slots {
    pub const NPC: &str = "NPC";
    pub const RECIPIENT: &str = "RECIPIENT";
    pub const MATERIALS: &str = "MATERIALS";
    pub const FACTION: &str = "FACTION";
    pub const TOPIC: &str = "TOPIC";
    pub const OBJECTIVE: &str = "OBJECTIVE";
    pub const ESCAPE_ROUTE: &str = "ESCAPE_ROUTE";
}

/// A filled quest: the rendered text plus the slot values it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestInstance {
    pub kind: QuestKind,
    pub text: String,
    pub bindings: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(QuestKind::Escort.name(), "escort");
        assert_eq!(QuestKind::Custom("pilgrimage".to_string()).name(), "pilgrimage");
        assert_eq!(QuestKind::Stealth.to_string(), "stealth");
    }

    #[test]
    fn custom_kind_from_ron() {
        let kind: QuestKind = ron::from_str(r#"Custom("pilgrimage")"#).unwrap();
        assert!(matches!(kind, QuestKind::Custom(ref name) if name == "pilgrimage"));
    }
}

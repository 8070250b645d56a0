/// Fragment and quest templates — parsing into literal segments and named
/// slots, and rendering against an explicit slot→value mapping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(String),
    #[error("no value bound for slot '{0}'")]
    UnboundSlot(String),
}

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateSegment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// Named placeholder: `{NPC}`.
    Slot(String),
}

/// A parsed template: a sequence of segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub segments: Vec<TemplateSegment>,
}

impl Template {
    /// Parse a template string into a sequence of segments.
    ///
    /// Syntax:
    /// - `{NAME}` → `Slot` (letters, digits and underscores)
    /// - `{{` / `}}` → literal `{` / `}`
    /// - Everything else → `Literal`
    pub fn parse(input: &str) -> Result<Template, TemplateError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            if chars[i] == '{' {
                // Escaped brace
                if i + 1 < len && chars[i + 1] == '{' {
                    literal_buf.push('{');
                    i += 2;
                    continue;
                }

                if !literal_buf.is_empty() {
                    segments.push(TemplateSegment::Literal(std::mem::take(&mut literal_buf)));
                }

                let start = i + 1;
                let mut end = start;
                while end < len && chars[end] != '}' {
                    if chars[end] == '{' {
                        return Err(TemplateError::Parse(
                            "nested braces are not allowed".to_string(),
                        ));
                    }
                    end += 1;
                }

                if end >= len {
                    return Err(TemplateError::Parse("unclosed brace".to_string()));
                }

                let name: String = chars[start..end].iter().collect();
                segments.push(TemplateSegment::Slot(Self::parse_slot_name(&name)?));
                i = end + 1;
            } else if chars[i] == '}' {
                if i + 1 < len && chars[i + 1] == '}' {
                    literal_buf.push('}');
                    i += 2;
                    continue;
                }
                return Err(TemplateError::Parse(
                    "unmatched closing brace".to_string(),
                ));
            } else {
                literal_buf.push(chars[i]);
                i += 1;
            }
        }

        if !literal_buf.is_empty() {
            segments.push(TemplateSegment::Literal(literal_buf));
        }

        Ok(Template { segments })
    }

    fn parse_slot_name(name: &str) -> Result<String, TemplateError> {
        if name.is_empty() {
            return Err(TemplateError::Parse("empty braces".to_string()));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(TemplateError::Parse(format!(
                "invalid slot name '{}': expected letters, digits or '_'",
                name
            )));
        }
        Ok(name.to_string())
    }

    /// Distinct slot names in order of first appearance.
    pub fn slots(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let TemplateSegment::Slot(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    pub fn has_slots(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, TemplateSegment::Slot(_)))
    }

    /// Render by substituting each slot with its bound value. Values are
    /// inserted verbatim: braces inside a value are never expanded again.
    pub fn render(&self, bindings: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::Slot(name) => {
                    let value = bindings
                        .get(name)
                        .ok_or_else(|| TemplateError::UnboundSlot(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_literal_only() {
        let t = Template::parse("The road was quiet.").unwrap();
        assert_eq!(
            t.segments,
            vec![TemplateSegment::Literal("The road was quiet.".to_string())]
        );
        assert!(!t.has_slots());
    }

    #[test]
    fn parse_slot() {
        let t = Template::parse("Escort {NPC} to the gate.").unwrap();
        assert_eq!(t.segments.len(), 3);
        assert_eq!(t.segments[1], TemplateSegment::Slot("NPC".to_string()));
    }

    #[test]
    fn parse_escaped_braces() {
        let t = Template::parse("Use {{braces}} here.").unwrap();
        assert_eq!(
            t.segments,
            vec![TemplateSegment::Literal("Use {braces} here.".to_string())]
        );
    }

    #[test]
    fn parse_errors() {
        assert!(Template::parse("Bad {} here").is_err());
        assert!(Template::parse("Bad {outer{inner}} here").is_err());
        assert!(Template::parse("Bad {unclosed here").is_err());
        assert!(Template::parse("Bad } here").is_err());
        assert!(Template::parse("Bad {two words} here").is_err());
    }

    #[test]
    fn slots_are_distinct_in_first_appearance_order() {
        let t = Template::parse("{NPC} asks {RECIPIENT} about {NPC}'s debt.").unwrap();
        assert_eq!(t.slots(), vec!["NPC", "RECIPIENT"]);
    }

    #[test]
    fn repeated_slot_renders_same_value() {
        let t = Template::parse("{NPC} waits. Later, {NPC} leaves.").unwrap();
        let out = t.render(&bind(&[("NPC", "Oswin")])).unwrap();
        assert_eq!(out, "Oswin waits. Later, Oswin leaves.");
    }

    #[test]
    fn values_are_not_expanded_again() {
        let t = Template::parse("Bring {MATERIALS}.").unwrap();
        let out = t.render(&bind(&[("MATERIALS", "{NPC}'s iron")])).unwrap();
        assert_eq!(out, "Bring {NPC}'s iron.");
    }

    #[test]
    fn unbound_slot_errors() {
        let t = Template::parse("Find {OBJECTIVE}.").unwrap();
        assert!(matches!(
            t.render(&BTreeMap::new()),
            Err(TemplateError::UnboundSlot(name)) if name == "OBJECTIVE"
        ));
    }
}

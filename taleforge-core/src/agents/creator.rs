//! Entity generation on demand.

use super::{generate_json, Agent, GenerateError, Generator, Prompt};
use crate::resolver::EntityKind;
use crate::value::{as_list, as_text, text_field};
use serde_json::Value;

/// A generated entity, before it has been fitted into the world.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatorReply {
    pub kind: Option<EntityKind>,
    pub id: Option<String>,
    pub item_name: Option<String>,
    pub data: Value,
    /// Words the entity should answer to. Only the dreamer fills these in.
    pub keywords: Vec<String>,
}

impl CreatorReply {
    /// Read one entity object. Returns `None` for anything that is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let data = match value.get("data") {
            Some(data) if data.is_object() => data.clone(),
            // Some replies put the fields at the top level.
            _ => value.clone(),
        };
        Some(Self {
            kind: text_field(value, "type").and_then(|t| kind_from(&t)),
            id: text_field(value, "id"),
            item_name: text_field(value, "item_name"),
            data,
            keywords: value
                .get("keywords")
                .map(as_list)
                .unwrap_or_default()
                .into_iter()
                .filter_map(as_text)
                .collect(),
        })
    }

    /// The entity's proper name, wherever the reply put it.
    pub fn name(&self) -> Option<String> {
        match self.kind {
            Some(EntityKind::Item) => self
                .item_name
                .clone()
                .or_else(|| text_field(&self.data, "name")),
            _ => text_field(&self.data, "name").or_else(|| self.item_name.clone()),
        }
    }
}

fn kind_from(text: &str) -> Option<EntityKind> {
    match text.trim().to_lowercase().as_str() {
        "location" | "place" | "area" => Some(EntityKind::Location),
        "npc" | "character" | "person" | "creature" => Some(EntityKind::Npc),
        "item" | "object" | "thing" => Some(EntityKind::Item),
        _ => None,
    }
}

/// Build the creation prompt.
pub fn prompt(target: &str, location_name: &str, genre: &str, kind: Option<EntityKind>) -> Prompt {
    let kind_line = match kind {
        Some(kind) => format!("REQUESTED KIND: {}\n", kind.name()),
        None => String::new(),
    };
    let user = format!(
        "CURRENT GENRE: {genre}\nCONTEXT: Player is at {location_name}.\n{kind_line}TARGET: Player wants to go to or interact with '{target}'."
    );
    Prompt::json(Agent::Creator, include_str!("prompts/creator.txt"), user)
}

/// Generate an entity for `target`.
pub async fn create(
    generator: &dyn Generator,
    target: &str,
    location_name: &str,
    genre: &str,
    kind: Option<EntityKind>,
) -> Result<CreatorReply, GenerateError> {
    let value = generate_json(generator, &prompt(target, location_name, genre, kind)).await?;
    CreatorReply::from_value(&value)
        .ok_or_else(|| GenerateError::parse(Agent::Creator, "expected an entity object"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_reads_nested_data() {
        let reply = CreatorReply::from_value(&json!({
            "type": "Location",
            "id": "gen_lighthouse",
            "data": {"name": "The Old Lighthouse", "exits": ["A cliff path"]}
        }))
        .unwrap();

        assert_eq!(reply.kind, Some(EntityKind::Location));
        assert_eq!(reply.id.as_deref(), Some("gen_lighthouse"));
        assert_eq!(reply.name().as_deref(), Some("The Old Lighthouse"));
    }

    #[test]
    fn test_item_name_preferred_for_items() {
        let reply = CreatorReply::from_value(&json!({
            "type": "item",
            "item_name": "Rusty Blade",
            "keywords": ["sword", "blade", ""]
        }))
        .unwrap();

        assert_eq!(reply.name().as_deref(), Some("Rusty Blade"));
        assert_eq!(reply.keywords, vec!["sword", "blade"]);
    }

    #[test]
    fn test_flat_reply_and_unknown_type() {
        let reply = CreatorReply::from_value(&json!({"type": "vibe", "name": "Gloom"})).unwrap();
        assert_eq!(reply.kind, None);
        assert_eq!(reply.name().as_deref(), Some("Gloom"));
        assert!(CreatorReply::from_value(&json!("a sword")).is_none());
    }

    #[test]
    fn test_prompt_carries_genre_and_kind() {
        let prompt = prompt("the docks", "The Rusty Tankard", "Noir", Some(EntityKind::Npc));
        assert!(prompt.user.contains("CURRENT GENRE: Noir"));
        assert!(prompt.user.contains("REQUESTED KIND: npc"));
        assert!(prompt.user.contains("'the docks'"));
    }
}

//! Entities and lore introduced by the narrative.

use super::{generate_json, Agent, GenerateError, Generator, Prompt};
use crate::delta::{DiscoveredLocation, DiscoveredNpc, Discoveries};
use crate::state::{Item, ItemOrigin, LoreEntry, NpcStatus, WorldState};
use crate::value::{as_list, as_text, text_field};
use serde_json::Value;

/// Build the scribe prompt. Known names are listed so the model can skip them.
pub fn prompt(state: &WorldState, story_text: &str) -> Prompt {
    let items: Vec<String> = state
        .player
        .inventory
        .iter()
        .map(|i| i.name.to_lowercase())
        .collect();
    let npcs: Vec<String> = state.npcs.values().map(|n| n.name.to_lowercase()).collect();
    let locations: Vec<String> = state
        .locations
        .values()
        .map(|l| l.name.to_lowercase())
        .collect();

    let user = format!(
        "EXISTING ENTITIES (Ignore): items {items:?}, npcs {npcs:?}, locations {locations:?}\n\n\
         STORY TEXT TO SCAN:\n\"{story_text}\""
    );
    Prompt::json(Agent::Scribe, include_str!("prompts/scribe.txt"), user)
}

/// Scan narrative text for new entities and lore.
pub async fn scan(
    generator: &dyn Generator,
    state: &WorldState,
    story_text: &str,
) -> Result<Discoveries, GenerateError> {
    let value = generate_json(generator, &prompt(state, story_text)).await?;
    if !value.is_object() {
        return Err(GenerateError::parse(Agent::Scribe, "expected a JSON object"));
    }
    Ok(read_report(&value))
}

/// Read a scribe report. NPCs that are only mentioned are left out.
pub fn read_report(value: &Value) -> Discoveries {
    let list = |key: &str| value.get(key).map(as_list).unwrap_or_default();

    let items = list("new_items")
        .into_iter()
        .filter_map(|v| Item::coerce(v, ItemOrigin::Noticed))
        .collect();

    let npcs = list("new_npcs")
        .into_iter()
        .filter(|v| is_physical(v))
        .filter_map(|v| match v {
            Value::Object(_) => Some(DiscoveredNpc {
                name: text_field(v, "name")?,
                description: text_field(v, "description").unwrap_or_default(),
                status: text_field(v, "status")
                    .map(NpcStatus::from)
                    .unwrap_or_default(),
            }),
            Value::String(_) => Some(DiscoveredNpc {
                name: as_text(v)?,
                description: String::new(),
                status: NpcStatus::Alive,
            }),
            _ => None,
        })
        .collect();

    let locations = list("new_locations")
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(_) => Some(DiscoveredLocation {
                name: text_field(v, "name")?,
                description: text_field(v, "description").unwrap_or_default(),
            }),
            Value::String(_) => Some(DiscoveredLocation {
                name: as_text(v)?,
                description: String::new(),
            }),
            _ => None,
        })
        .collect();

    let lore = list("new_lore")
        .into_iter()
        .filter_map(|v| {
            let topic = text_field(v, "topic")?;
            let entry = text_field(v, "entry")?;
            Some(LoreEntry::new(topic, entry))
        })
        .collect();

    Discoveries {
        items,
        npcs,
        locations,
        lore,
    }
}

fn is_physical(npc: &Value) -> bool {
    match text_field(npc, "presence") {
        Some(presence) => presence.eq_ignore_ascii_case("physical"),
        None => true,
    }
}

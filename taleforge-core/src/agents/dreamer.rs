//! Speculative entity generation for the shadow queue.

use super::creator::CreatorReply;
use super::{generate_json, Agent, GenerateError, Generator, Prompt};
use crate::state::WorldState;
use serde_json::Value;

/// Build the dreaming prompt, asking for up to `wanted` entities.
pub fn prompt(state: &WorldState, wanted: usize) -> Prompt {
    let description = state
        .current_location()
        .map(|loc| loc.description.as_str())
        .unwrap_or_default();
    let user = format!(
        "Location: {} ({description})\nMood: {}\nGenerate {wanted} potential entities.",
        state.current_location_name(),
        state.story_state.narrative_direction,
    );
    Prompt::json(Agent::Dreamer, include_str!("prompts/dreamer.txt"), user)
}

/// Dream up to `wanted` entities. Entries that are not entity objects are dropped.
pub async fn dream(
    generator: &dyn Generator,
    state: &WorldState,
    wanted: usize,
) -> Result<Vec<CreatorReply>, GenerateError> {
    if wanted == 0 {
        return Ok(Vec::new());
    }
    let value = generate_json(generator, &prompt(state, wanted)).await?;
    Ok(read_replies(&value, wanted))
}

fn read_replies(value: &Value, wanted: usize) -> Vec<CreatorReply> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("entities") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => std::slice::from_ref(value),
        },
        _ => &[],
    };
    items
        .iter()
        .filter_map(CreatorReply::from_value)
        .take(wanted)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::EntityKind;
    use serde_json::json;

    #[test]
    fn test_read_list_and_wrapped_forms() {
        let list = json!([
            {"type": "npc", "keywords": ["guard"], "data": {"name": "Nervous Guard"}},
            "not an entity",
            {"type": "item", "item_name": "Rusty Blade"}
        ]);
        let replies = read_replies(&list, 5);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1].kind, Some(EntityKind::Item));

        let wrapped = json!({"entities": [{"type": "npc", "data": {"name": "A"}}, {"type": "npc", "data": {"name": "B"}}]});
        assert_eq!(read_replies(&wrapped, 1).len(), 1);

        let single = json!({"type": "npc", "data": {"name": "Lone"}});
        assert_eq!(read_replies(&single, 3).len(), 1);
        assert!(read_replies(&json!(7), 3).is_empty());
    }

    #[test]
    fn test_prompt_mentions_mood() {
        let state = WorldState::genesis();
        let prompt = prompt(&state, 2);
        assert!(prompt.user.contains("The Rusty Tankard"));
        assert!(prompt.user.contains(&state.story_state.narrative_direction));
        assert!(prompt.user.contains("Generate 2"));
    }
}

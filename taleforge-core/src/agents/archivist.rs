//! Logical delta computation.

use super::{generate_json, name_list, Agent, GenerateError, Generator, Prompt};
use crate::delta::{ActionResult, Delta};
use crate::state::WorldState;

/// The fallback delta: the action simply worked and nothing changed.
pub fn fallback() -> Delta {
    Delta {
        action_result: Some(ActionResult::Success),
        ..Delta::empty()
    }
}

/// Build the archivist prompt, showing the last `journal_context` lore entries.
pub fn prompt(state: &WorldState, action: &str, journal_context: usize) -> Prompt {
    let location = state.current_location();
    let ground = name_list(
        location
            .into_iter()
            .flat_map(|loc| loc.items.iter().map(|i| i.name.as_str())),
    );
    let inventory = name_list(state.player.inventory.iter().map(|i| i.name.as_str()));

    let journal = &state.player.journal;
    let recent = &journal[journal.len().saturating_sub(journal_context)..];
    let journal_lines: Vec<String> = recent
        .iter()
        .map(|e| format!("{}: {}", e.topic, e.entry))
        .collect();
    let knowledge = if journal_lines.is_empty() {
        "(nothing yet)".to_string()
    } else {
        journal_lines.join("; ")
    };

    let npcs: Vec<String> = state
        .npcs_at(&state.current_location_id)
        .map(|(id, npc)| format!("{} (id: {id}, {})", npc.name, String::from(npc.attitude)))
        .collect();
    let npcs = name_list(npcs.iter().map(String::as_str));

    let user = format!(
        "INPUT CONTEXT:\n\
         - Location: {}\n\
         - Items on Ground: {ground}\n\
         - People Here: {npcs}\n\
         - Player HP: {}/{}\n\
         - Player Inventory: {inventory}\n\
         - Player Knowledge (Journal): {knowledge}\n\
         - Current Objective: {}\n\n\
         PLAYER ACTION: \"{action}\"",
        state.current_location_name(),
        state.player.hp,
        state.player.max_hp,
        state.story_state.current_objective,
    );

    Prompt::json(Agent::Archivist, include_str!("prompts/archivist.txt"), user)
}

/// Compute the delta for an action.
pub async fn compute_delta(
    generator: &dyn Generator,
    state: &WorldState,
    action: &str,
    journal_context: usize,
) -> Result<Delta, GenerateError> {
    let value = generate_json(generator, &prompt(state, action, journal_context)).await?;
    if !value.is_object() {
        return Err(GenerateError::parse(Agent::Archivist, "expected a JSON object"));
    }
    Ok(Delta::from_value(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LoreEntry;

    #[test]
    fn test_prompt_shows_recent_journal_only() {
        let mut state = WorldState::genesis();
        for n in 0..8 {
            state
                .player
                .learn(LoreEntry::new(format!("Topic {n}"), format!("Fact {n}")));
        }

        let prompt = prompt(&state, "I ask about the bells", 5);
        assert!(!prompt.user.contains("Topic 2:"));
        assert!(prompt.user.contains("Topic 3: Fact 3"));
        assert!(prompt.user.contains("Topic 7: Fact 7"));
        assert!(prompt.user.contains("Empty Mug"));
        assert!(prompt.user.contains("Torch"));
        assert!(prompt.user.contains("Barkeep (id: barkeep, neutral)"));
    }

    #[test]
    fn test_fallback_is_successful_and_empty() {
        let delta = fallback();
        assert!(delta.is_empty());
        assert_eq!(delta.outcome(), ActionResult::Success);
    }
}

//! Player-facing prose.

use super::{generate_text, name_list, Agent, GenerateError, Generator, Prompt};
use crate::state::WorldState;

/// Shown when the narrator cannot be reached.
pub const FALLBACK: &str = "The world holds its breath. What do you do?";

/// Build the narration prompt.
///
/// `outcome` is the archivist's account of what happened; `preamble` carries
/// anything the pipeline already told the player this turn (travel lines).
pub fn prompt(state: &WorldState, action: &str, outcome: &str, preamble: &str) -> Prompt {
    let story = &state.story_state;
    let location = state.current_location();
    let description = location
        .map(|loc| loc.description.as_str())
        .unwrap_or_default();
    let exits = name_list(
        location
            .into_iter()
            .flat_map(|loc| loc.exits.iter().map(String::as_str)),
    );
    let ground = name_list(
        location
            .into_iter()
            .flat_map(|loc| loc.items.iter().map(|i| i.name.as_str())),
    );
    let people = name_list(
        state
            .npcs_at(&state.current_location_id)
            .map(|(_, npc)| npc.name.as_str()),
    );
    let inventory = name_list(state.player.inventory.iter().map(|i| i.name.as_str()));

    let mut user = format!(
        "Current Tension: {}/10\n\
         Director's Instruction: \"{}\"\n\n\
         SCENE: {} ({description})\n\
         EXITS: {exits}\n\
         ON THE GROUND: {ground}\n\
         PEOPLE HERE: {people}\n\
         PLAYER: {} (HP {}/{}), carrying {inventory}\n\n\
         PLAYER ACTION:\n\"{action}\"\n\n\
         RESULT OF ACTION:\n{outcome}",
        story.global_tension,
        story.narrative_direction,
        state.current_location_name(),
        state.player.name,
        state.player.hp,
        state.player.max_hp,
    );
    if !preamble.trim().is_empty() {
        user.push_str(&format!("\n\nALREADY SHOWN TO THE PLAYER:\n{preamble}"));
    }

    Prompt::text(Agent::Narrator, include_str!("prompts/narrator.txt"), user)
}

/// Narrate the turn.
pub async fn narrate(
    generator: &dyn Generator,
    state: &WorldState,
    action: &str,
    outcome: &str,
    preamble: &str,
) -> Result<String, GenerateError> {
    generate_text(generator, &prompt(state, action, outcome, preamble)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_reflects_state() {
        let mut state = WorldState::genesis();
        state.story_state.global_tension = 8;

        let prompt = prompt(&state, "I draw my blade", "Outcome: Success", "");
        assert!(prompt.user.contains("Current Tension: 8/10"));
        assert!(prompt.user.contains("PEOPLE HERE: Barkeep"));
        assert!(prompt.user.contains("ON THE GROUND: Empty Mug"));
        assert!(!prompt.user.contains("ALREADY SHOWN"));
        assert!(!prompt.expects_json);
    }

    #[test]
    fn test_prompt_includes_preamble() {
        let state = WorldState::genesis();
        let prompt = prompt(&state, "go north", "Outcome: Success", "**Travel:** You head north...");
        assert!(prompt.user.contains("ALREADY SHOWN TO THE PLAYER:\n**Travel:**"));
    }
}

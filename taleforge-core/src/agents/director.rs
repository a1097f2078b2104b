//! Pacing and objective updates.

use super::{generate_json, Agent, GenerateError, Generator, Prompt};
use crate::delta::StoryPatch;
use crate::state::WorldState;

/// Build the director prompt from the story so far and what just happened.
pub fn prompt(state: &WorldState, action: &str, outcome: &str) -> Prompt {
    let story = serde_json::to_string(&state.story_state).unwrap_or_default();
    let user = format!(
        "CURRENT STORY STATE:\n{story}\n\nPLAYER ACTION:\n\"{action}\"\n\nWHAT JUST HAPPENED:\n{outcome}"
    );
    Prompt::json(Agent::Director, include_str!("prompts/director.txt"), user)
}

/// Ask the director for a story-state patch.
///
/// A reply with no usable story fields is a parse failure; the caller keeps
/// the story state as it is.
pub async fn direct(
    generator: &dyn Generator,
    state: &WorldState,
    action: &str,
    outcome: &str,
) -> Result<StoryPatch, GenerateError> {
    let value = generate_json(generator, &prompt(state, action, outcome)).await?;
    // Some replies nest the fields under the delta key.
    let body = value.get("story_state").unwrap_or(&value);
    StoryPatch::read(body)
        .ok_or_else(|| GenerateError::parse(Agent::Director, "no story fields in reply"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_story_state() {
        let state = WorldState::genesis();
        let prompt = prompt(&state, "I punch the king", "Outcome: Success");
        assert!(prompt.user.contains("\"global_tension\":2"));
        assert!(prompt.user.contains("I punch the king"));
        assert!(prompt.expects_json);
    }
}

//! Movement and target detection.

use super::{generate_json, generate_text, name_list, Agent, GenerateError, Generator, Prompt};
use crate::state::WorldState;
use crate::value::{as_flag, text_field};
use serde::Serialize;
use serde_json::Value;

/// Travel event used when the event call fails.
pub const QUIET_JOURNEY: &str = "The journey is long and quiet.";

/// How far a movement goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TravelType {
    #[default]
    Local,
    Journey,
}

/// What the cartographer made of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct MapUpdate {
    pub is_movement: bool,
    pub destination_name: Option<String>,
    pub target_name: Option<String>,
    pub travel_type: TravelType,
    pub travel_description: Option<String>,
}

impl MapUpdate {
    /// The fallback: the player stays put and names nothing.
    pub fn stationary() -> Self {
        Self::default()
    }

    /// Read a reply, tolerating missing or loosely-typed fields.
    pub fn from_value(value: &Value) -> Result<Self, GenerateError> {
        if !value.is_object() {
            return Err(GenerateError::parse(
                Agent::Cartographer,
                "expected a JSON object",
            ));
        }

        let travel_type = match text_field(value, "travel_type") {
            Some(t) if t.eq_ignore_ascii_case("journey") => TravelType::Journey,
            _ => TravelType::Local,
        };

        Ok(Self {
            is_movement: value
                .get("is_movement")
                .and_then(as_flag)
                .unwrap_or(false),
            destination_name: text_field(value, "destination_name"),
            target_name: text_field(value, "target_name"),
            travel_type,
            travel_description: text_field(value, "travel_description"),
        })
    }

    pub fn is_journey(&self) -> bool {
        self.is_movement && self.travel_type == TravelType::Journey
    }
}

/// Build the detection prompt.
pub fn prompt(state: &WorldState, action: &str) -> Prompt {
    let exits = name_list(
        state
            .current_location()
            .into_iter()
            .flat_map(|loc| loc.exits.iter().map(String::as_str)),
    );
    let people = name_list(
        state
            .npcs_at(&state.current_location_id)
            .map(|(_, npc)| npc.name.as_str()),
    );

    let user = format!(
        "CURRENT LOCATION: {} (ID: {})\nKNOWN EXITS: {exits}\nPEOPLE HERE: {people}\n\nPLAYER ACTION: \"{action}\"",
        state.current_location_name(),
        state.current_location_id,
    );

    Prompt::json(
        Agent::Cartographer,
        include_str!("prompts/cartographer.txt"),
        user,
    )
}

/// Decide whether the action is movement and what it refers to.
pub async fn detect(
    generator: &dyn Generator,
    state: &WorldState,
    action: &str,
) -> Result<MapUpdate, GenerateError> {
    let value = generate_json(generator, &prompt(state, action)).await?;
    MapUpdate::from_value(&value)
}

/// One sentence of something happening along a long route.
pub async fn travel_event(
    generator: &dyn Generator,
    route: &str,
) -> Result<String, GenerateError> {
    let prompt = Prompt::text(
        Agent::Cartographer,
        include_str!("prompts/travel_event.txt"),
        format!("ROUTE: {route}"),
    );
    generate_text(generator, &prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_movement() {
        let update = MapUpdate::from_value(&json!({
            "is_movement": true,
            "destination_name": "The Old Lighthouse",
            "travel_type": "Journey",
            "travel_description": "Fog rolls over the cliffs."
        }))
        .unwrap();

        assert!(update.is_movement);
        assert!(update.is_journey());
        assert_eq!(update.destination_name.as_deref(), Some("The Old Lighthouse"));
        assert_eq!(update.target_name, None);
    }

    #[test]
    fn test_parse_tolerates_loose_fields() {
        let update = MapUpdate::from_value(&json!({
            "is_movement": "no",
            "destination_name": "null",
            "target_name": "hooded stranger"
        }))
        .unwrap();

        assert!(!update.is_movement);
        assert_eq!(update.destination_name, None);
        assert_eq!(update.target_name.as_deref(), Some("hooded stranger"));
        assert_eq!(update.travel_type, TravelType::Local);
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(MapUpdate::from_value(&json!(["north"])).is_err());
    }

    #[test]
    fn test_prompt_mentions_location_and_action() {
        let state = WorldState::genesis();
        let prompt = prompt(&state, "I leave");
        assert!(prompt.expects_json);
        assert!(prompt.user.contains("The Rusty Tankard"));
        assert!(prompt.user.contains("Barkeep"));
        assert!(prompt.user.contains("\"I leave\""));
    }
}

//! The world-state document.
//!
//! A session owns exactly one [`WorldState`]. It is loaded at the start of
//! every turn, mutated only by the reconciler and the forge side effects, and
//! written back wholesale at the pipeline checkpoints.
//!
//! Save files carry no schema version, so every field deserializes with a
//! default and legacy shapes (bare-string items, capitalised enum values) are
//! normalized on the way in.

use crate::value::as_list;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Id of the starting location in the genesis world.
pub const START_LOCATION_ID: &str = "loc_start";

/// Genre assumed when the story state does not name one.
pub const DEFAULT_GENRE: &str = "High Fantasy";

/// Placeholder the resolver receives in place of vague movement words.
pub const SURROUNDING_AREA: &str = "the surrounding area";

// ============================================================================
// Items
// ============================================================================

/// Where an item came from, which decides its default description and state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOrigin {
    /// Added to the inventory by a delta.
    Acquired,
    /// Dropped on or found on the ground of a location.
    Ground,
    /// Picked out of the narrative by the scribe.
    Noticed,
    /// Ambient dressing spawned when a location is populated.
    Scenery,
}

impl ItemOrigin {
    fn defaults(self) -> (&'static str, &'static str) {
        match self {
            ItemOrigin::Acquired => ("Acquired item.", "normal"),
            ItemOrigin::Ground => ("On the ground.", "ground"),
            ItemOrigin::Noticed => ("Obtained.", "acquired"),
            ItemOrigin::Scenery => ("Part of the scene.", "ground"),
        }
    }
}

/// An item in an inventory or lying in a location.
///
/// Older saves store items as bare names; those are read into the object
/// shape so nothing downstream has to care. Stored lists go through
/// [`Item::coerce`], so entries it rejects are dropped on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub name: String,
    pub description: String,
    pub state: String,
}

impl Item {
    /// Create an item with the defaults for its origin.
    pub fn new(name: impl Into<String>, origin: ItemOrigin) -> Self {
        let (description, state) = origin.defaults();
        Self {
            name: name.into(),
            description: description.to_string(),
            state: state.to_string(),
        }
    }

    /// Coerce a loosely-shaped JSON value into an item.
    ///
    /// Accepts a bare string or an object with at least a `name`; missing
    /// fields take the origin defaults. Anything else yields `None`.
    pub fn coerce(value: &Value, origin: ItemOrigin) -> Option<Self> {
        match value {
            Value::String(name) => {
                let name = name.trim();
                (!name.is_empty()).then(|| Item::new(name, origin))
            }
            Value::Object(map) => {
                let name = map
                    .get("name")
                    .or_else(|| map.get("item_name"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|n| !n.is_empty())?;
                let mut item = Item::new(name, origin);
                if let Some(description) = map.get("description").and_then(Value::as_str) {
                    item.description = description.to_string();
                }
                if let Some(state) = map.get("state").and_then(Value::as_str) {
                    item.state = state.to_string();
                }
                Some(item)
            }
            _ => None,
        }
    }

    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Item::coerce(&value, ItemOrigin::Acquired)
            .ok_or_else(|| de::Error::custom(format!("not an item: {value}")))
    }
}

/// Read a stored item list, skipping entries that are not items.
fn item_list<'de, D: Deserializer<'de>>(
    deserializer: D,
    origin: ItemOrigin,
) -> Result<Vec<Item>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let items = as_list(&value)
        .into_iter()
        .filter_map(|entry| {
            let item = Item::coerce(entry, origin);
            if item.is_none() {
                tracing::warn!(entry = %entry, "dropping unreadable item from save");
            }
            item
        })
        .collect();
    Ok(items)
}

fn inventory_items<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Item>, D::Error> {
    item_list(deserializer, ItemOrigin::Acquired)
}

fn ground_items<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Item>, D::Error> {
    item_list(deserializer, ItemOrigin::Ground)
}

/// Remove the first item whose name matches, case-insensitively.
///
/// Only one entry is removed even when several share the name.
pub fn remove_first_named(items: &mut Vec<Item>, name: &str) -> Option<Item> {
    let index = items.iter().position(|item| item.is_named(name))?;
    Some(items.remove(index))
}

// ============================================================================
// Player
// ============================================================================

/// A piece of lore the player has learned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoreEntry {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub entry: String,
}

impl LoreEntry {
    pub fn new(topic: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            entry: entry.into(),
        }
    }
}

/// The player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    #[serde(deserialize_with = "inventory_items")]
    pub inventory: Vec<Item>,
    pub journal: Vec<LoreEntry>,
    /// Free-form fields written by agents (gold, title, ...).
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            name: "Traveler".to_string(),
            hp: 20,
            max_hp: 20,
            inventory: Vec::new(),
            journal: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }
}

impl Player {
    /// HP as a fraction of max HP, clamped to [0.0, 1.0] for display.
    ///
    /// The stored hp is never clamped; only this view is.
    pub fn hp_ratio(&self) -> f32 {
        if self.max_hp <= 0 {
            return 0.0;
        }
        (self.hp as f32 / self.max_hp as f32).clamp(0.0, 1.0)
    }

    /// Check whether the inventory holds an item with this name.
    pub fn has_item(&self, name: &str) -> bool {
        self.inventory.iter().any(|item| item.is_named(name))
    }

    /// Check whether the journal already has an entry for this topic.
    pub fn knows_topic(&self, topic: &str) -> bool {
        self.journal
            .iter()
            .any(|entry| entry.topic.trim().eq_ignore_ascii_case(topic.trim()))
    }

    /// Add a lore entry unless its topic is already recorded.
    ///
    /// Returns `true` if the entry was added. Existing entries are never
    /// overwritten.
    pub fn learn(&mut self, entry: LoreEntry) -> bool {
        if entry.topic.trim().is_empty() || self.knows_topic(&entry.topic) {
            return false;
        }
        self.journal.push(entry);
        true
    }
}

// ============================================================================
// Locations and NPCs
// ============================================================================

/// A place in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Location {
    pub name: String,
    pub description: String,
    pub exits: Vec<String>,
    #[serde(deserialize_with = "ground_items")]
    pub items: Vec<Item>,
}

impl Location {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            exits: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Case-insensitive exit lookup.
    pub fn has_exit(&self, exit: &str) -> bool {
        self.exits
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(exit.trim()))
    }

    /// Add an exit unless it is already listed or names this location.
    pub fn add_exit(&mut self, exit: impl Into<String>) -> bool {
        let exit = exit.into();
        if exit.trim().is_empty() || self.is_self_reference(&exit) || self.has_exit(&exit) {
            return false;
        }
        self.exits.push(exit);
        true
    }

    /// Whether an exit string points back at this very location.
    pub fn is_self_reference(&self, exit: &str) -> bool {
        exit.trim().eq_ignore_ascii_case(self.name.trim())
    }

    /// Drop exits that name this location. Returns how many were removed.
    pub fn strip_self_exits(&mut self) -> usize {
        let before = self.exits.len();
        let name = self.name.clone();
        self.exits
            .retain(|exit| !exit.trim().eq_ignore_ascii_case(name.trim()));
        before - self.exits.len()
    }
}

/// Life status of an NPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum NpcStatus {
    #[default]
    Alive,
    Dead,
    /// Any other status an agent came up with ("unconscious", "fled", ...).
    Other(String),
}

impl From<String> for NpcStatus {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "alive" | "" => NpcStatus::Alive,
            "dead" => NpcStatus::Dead,
            other => NpcStatus::Other(other.to_string()),
        }
    }
}

impl From<NpcStatus> for String {
    fn from(status: NpcStatus) -> Self {
        match status {
            NpcStatus::Alive => "alive".to_string(),
            NpcStatus::Dead => "dead".to_string(),
            NpcStatus::Other(other) => other,
        }
    }
}

/// How an NPC feels about the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Attitude {
    #[default]
    Neutral,
    Friendly,
    Hostile,
    Unknown,
}

impl From<String> for Attitude {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "neutral" => Attitude::Neutral,
            "friendly" => Attitude::Friendly,
            "hostile" => Attitude::Hostile,
            _ => Attitude::Unknown,
        }
    }
}

impl From<Attitude> for String {
    fn from(attitude: Attitude) -> Self {
        match attitude {
            Attitude::Neutral => "neutral",
            Attitude::Friendly => "friendly",
            Attitude::Hostile => "hostile",
            Attitude::Unknown => "unknown",
        }
        .to_string()
    }
}

/// A non-player character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Npc {
    pub name: String,
    pub location_id: String,
    pub status: NpcStatus,
    pub attitude: Attitude,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<i32>,
    pub description: String,
}

impl Npc {
    pub fn new(name: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location_id: location_id.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_hp(mut self, hp: i32) -> Self {
        self.hp = Some(hp);
        self.max_hp = Some(hp);
        self
    }
}

// ============================================================================
// Story
// ============================================================================

/// Narrative arc metadata maintained by the director.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryState {
    pub current_act: i32,
    pub global_tension: i32,
    pub genre: String,
    pub current_objective: String,
    pub narrative_direction: String,
}

impl Default for StoryState {
    fn default() -> Self {
        Self {
            current_act: 1,
            global_tension: 2,
            genre: String::new(),
            current_objective: "Explore the world and find your path.".to_string(),
            narrative_direction: "The world is open. React to the player's curiosity."
                .to_string(),
        }
    }
}

impl StoryState {
    /// Lowest tension value.
    pub const MIN_TENSION: i32 = 1;
    /// Highest tension value.
    pub const MAX_TENSION: i32 = 10;

    /// Set tension, clamped to the valid range.
    pub fn set_tension(&mut self, tension: i32) {
        self.global_tension = tension.clamp(Self::MIN_TENSION, Self::MAX_TENSION);
    }

    /// Shift tension by `change`, clamped to the valid range.
    pub fn adjust_tension(&mut self, change: i32) {
        self.set_tension(self.global_tension.saturating_add(change));
    }

    /// The genre, or `fallback` when none has been established.
    pub fn genre_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        let genre = self.genre.trim();
        if genre.is_empty() || genre.eq_ignore_ascii_case("adaptive") {
            fallback
        } else {
            genre
        }
    }
}

/// Status of a world event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum EventStatus {
    #[default]
    Active,
    Resolved,
}

impl From<String> for EventStatus {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "resolved" | "done" | "complete" | "completed" => EventStatus::Resolved,
            _ => EventStatus::Active,
        }
    }
}

impl From<EventStatus> for String {
    fn from(status: EventStatus) -> Self {
        match status {
            EventStatus::Active => "active",
            EventStatus::Resolved => "resolved",
        }
        .to_string()
    }
}

/// Something happening in the world independent of the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorldEvent {
    pub name: String,
    pub description: String,
    pub status: EventStatus,
}

// ============================================================================
// The document
// ============================================================================

/// The root world-state document of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorldState {
    pub player: Player,
    pub current_location_id: String,
    pub locations: BTreeMap<String, Location>,
    pub npcs: BTreeMap<String, Npc>,
    pub world_flags: BTreeMap<String, Value>,
    pub story_state: StoryState,
    pub world_events: Vec<WorldEvent>,
}

impl WorldState {
    /// The hard-coded starting world.
    pub fn genesis() -> Self {
        let mut tavern = Location::new(
            "The Rusty Tankard",
            "A dim tavern that smells of stale ale and woodsmoke.",
        );
        tavern.items.push(Item::new("Empty Mug", ItemOrigin::Ground));

        let barkeep = Npc::new("Barkeep", START_LOCATION_ID)
            .with_description("A broad-shouldered man polishing the same glass for an hour.")
            .with_hp(15);

        let mut state = Self {
            current_location_id: START_LOCATION_ID.to_string(),
            ..Default::default()
        };
        state.player.inventory.push(Item::new("Torch", ItemOrigin::Acquired));
        state.locations.insert(START_LOCATION_ID.to_string(), tavern);
        state.npcs.insert("barkeep".to_string(), barkeep);
        state
            .world_flags
            .insert("game_started".to_string(), Value::Bool(true));
        state
    }

    /// The location the player is standing in.
    pub fn current_location(&self) -> Option<&Location> {
        self.locations.get(&self.current_location_id)
    }

    /// Mutable access to the location the player is standing in.
    pub fn current_location_mut(&mut self) -> Option<&mut Location> {
        self.locations.get_mut(&self.current_location_id)
    }

    /// Name of the current location, or its id if it has vanished.
    pub fn current_location_name(&self) -> &str {
        self.current_location()
            .map(|loc| loc.name.as_str())
            .unwrap_or(self.current_location_id.as_str())
    }

    /// NPCs whose `location_id` is the given location.
    pub fn npcs_at<'a>(&'a self, location_id: &'a str) -> impl Iterator<Item = (&'a String, &'a Npc)> {
        self.npcs
            .iter()
            .filter(move |(_, npc)| npc.location_id == location_id)
    }

    /// Find a location id by case-insensitive name.
    pub fn location_id_by_name(&self, name: &str) -> Option<&str> {
        self.locations
            .iter()
            .find(|(_, loc)| loc.name.trim().eq_ignore_ascii_case(name.trim()))
            .map(|(id, _)| id.as_str())
    }

    /// Check whether an NPC with this name exists anywhere.
    pub fn has_npc_named(&self, name: &str) -> bool {
        self.npcs
            .values()
            .any(|npc| npc.name.trim().eq_ignore_ascii_case(name.trim()))
    }

    /// Produce an id with `prefix` that is not yet used by a location or NPC.
    pub fn fresh_id(&self, prefix: &str, name: &str) -> String {
        let slug = slugify(name);
        let base = if slug.is_empty() {
            format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
        } else {
            format!("{prefix}_{slug}")
        };
        if !self.id_in_use(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.id_in_use(candidate))
            .unwrap_or(base)
    }

    /// Whether an id names an existing location or NPC.
    pub fn id_in_use(&self, id: &str) -> bool {
        self.locations.contains_key(id) || self.npcs.contains_key(id)
    }

    /// Fix dangling references left behind by older saves or bad agent output.
    ///
    /// Returns a note for every repair made.
    pub fn repair(&mut self) -> Vec<String> {
        let mut notes = Vec::new();

        if self.locations.is_empty() {
            let genesis = WorldState::genesis();
            self.locations.extend(genesis.locations);
            notes.push("no locations; restored the starting location".to_string());
        }

        if !self.locations.contains_key(&self.current_location_id) {
            let fallback = if self.locations.contains_key(START_LOCATION_ID) {
                START_LOCATION_ID.to_string()
            } else {
                self.locations.keys().next().cloned().unwrap_or_default()
            };
            notes.push(format!(
                "current location '{}' missing; moved player to '{fallback}'",
                self.current_location_id
            ));
            self.current_location_id = fallback;
        }

        let current = self.current_location_id.clone();
        for (id, npc) in self.npcs.iter_mut() {
            if !self.locations.contains_key(&npc.location_id) {
                notes.push(format!(
                    "npc '{id}' pointed at unknown location '{}'; re-homed to '{current}'",
                    npc.location_id
                ));
                npc.location_id = current.clone();
            }
        }

        for (id, location) in self.locations.iter_mut() {
            let stripped = location.strip_self_exits();
            if stripped > 0 {
                notes.push(format!("location '{id}' listed itself as an exit"));
            }
        }

        notes
    }
}

/// Lowercase, underscore-separated identifier fragment.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_genesis_is_consistent() {
        let mut state = WorldState::genesis();
        assert_eq!(state.current_location_id, START_LOCATION_ID);
        assert!(state.current_location().is_some());
        assert!(state.repair().is_empty());
    }

    #[test]
    fn test_legacy_string_items_load_as_objects() {
        let state: WorldState = serde_json::from_value(json!({
            "player": {"name": "Ash", "hp": 20, "max_hp": 20, "inventory": ["Torch", {"name": "Rope"}]}
        }))
        .unwrap();

        let inventory = &state.player.inventory;
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory[0].name, "Torch");
        assert_eq!(inventory[0].state, "normal");
        assert_eq!(inventory[1].name, "Rope");
        assert_eq!(inventory[1].description, "Acquired item.");
    }

    #[test]
    fn test_unreadable_items_are_dropped_on_load() {
        let state: WorldState = serde_json::from_value(json!({
            "player": {"inventory": [null, 7, {}, {"name": "A", "item_name": "B"}, "  "]},
            "locations": {
                "loc_start": {"name": "Cellar", "items": [{"description": "nameless"}, "Crate"]}
            }
        }))
        .unwrap();

        let names: Vec<&str> = state.player.inventory.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["A"]);

        let ground = &state.locations["loc_start"].items;
        assert_eq!(ground.len(), 1);
        assert_eq!(ground[0].name, "Crate");
        assert_eq!(ground[0].state, "ground");
    }

    #[test]
    fn test_null_item_lists_read_as_empty() {
        let state: WorldState = serde_json::from_value(json!({
            "player": {"inventory": null},
            "locations": {"loc_start": {"name": "Cellar", "items": "Lantern"}}
        }))
        .unwrap();
        assert!(state.player.inventory.is_empty());
        assert_eq!(state.locations["loc_start"].items[0].name, "Lantern");
    }

    #[test]
    fn test_lone_item_is_rejected_when_unreadable() {
        assert!(serde_json::from_value::<Item>(json!({"name": "Rope"})).is_ok());
        assert!(serde_json::from_value::<Item>(json!(null)).is_err());
    }

    #[test]
    fn test_missing_top_level_keys_default() {
        let state: WorldState = serde_json::from_value(json!({})).unwrap();
        assert_eq!(state.player.hp, 20);
        assert!(state.locations.is_empty());
        assert_eq!(state.story_state.global_tension, 2);
    }

    #[test]
    fn test_item_coerce() {
        let item = Item::coerce(&json!("Torch"), ItemOrigin::Ground).unwrap();
        assert_eq!(item.description, "On the ground.");
        assert_eq!(item.state, "ground");

        let item = Item::coerce(
            &json!({"name": "Torch", "state": "lit"}),
            ItemOrigin::Acquired,
        )
        .unwrap();
        assert_eq!(item.state, "lit");
        assert_eq!(item.description, "Acquired item.");

        assert!(Item::coerce(&json!({"description": "nameless"}), ItemOrigin::Acquired).is_none());
        assert!(Item::coerce(&json!(42), ItemOrigin::Acquired).is_none());
        assert!(Item::coerce(&json!("   "), ItemOrigin::Acquired).is_none());
    }

    #[test]
    fn test_remove_first_named_removes_one() {
        let mut items = vec![
            Item::new("Torch", ItemOrigin::Acquired),
            Item::new("torch", ItemOrigin::Ground),
        ];
        let removed = remove_first_named(&mut items, "TORCH").unwrap();
        assert_eq!(removed.state, "normal");
        assert_eq!(items.len(), 1);
        assert!(remove_first_named(&mut items, "Lantern").is_none());
    }

    #[test]
    fn test_hp_ratio_clamped() {
        let mut player = Player::default();
        player.hp = 40;
        assert_eq!(player.hp_ratio(), 1.0);
        player.hp = -5;
        assert_eq!(player.hp_ratio(), 0.0);
        player.hp = 10;
        assert!((player.hp_ratio() - 0.5).abs() < f32::EPSILON);
        player.max_hp = 0;
        assert_eq!(player.hp_ratio(), 0.0);
    }

    #[test]
    fn test_journal_dedup_by_topic() {
        let mut player = Player::default();
        assert!(player.learn(LoreEntry::new("The Code", "0451")));
        assert!(!player.learn(LoreEntry::new("The Code", "1234")));
        assert!(!player.learn(LoreEntry::new("the code ", "0451")));
        assert_eq!(player.journal.len(), 1);
        assert_eq!(player.journal[0].entry, "0451");
    }

    #[test]
    fn test_location_exits_refuse_self_and_duplicates() {
        let mut loc = Location::new("Mistwood Forest", "");
        assert!(!loc.add_exit("mistwood forest"));
        assert!(loc.add_exit("The Old Road"));
        assert!(!loc.add_exit("the old road"));
        assert_eq!(loc.exits, vec!["The Old Road"]);
    }

    #[test]
    fn test_tension_clamps() {
        let mut story = StoryState::default();
        story.set_tension(9);
        story.adjust_tension(5);
        story.adjust_tension(5);
        assert_eq!(story.global_tension, 10);
        story.adjust_tension(-50);
        assert_eq!(story.global_tension, 1);
    }

    #[test]
    fn test_enum_values_normalize() {
        let npc: Npc = serde_json::from_value(json!({
            "name": "Guard", "status": "Unconscious", "attitude": "HOSTILE"
        }))
        .unwrap();
        assert_eq!(npc.status, NpcStatus::Other("unconscious".to_string()));
        assert_eq!(npc.attitude, Attitude::Hostile);

        let npc: Npc = serde_json::from_value(json!({"name": "Cat", "attitude": "curious"})).unwrap();
        assert_eq!(npc.attitude, Attitude::Unknown);
        assert_eq!(npc.status, NpcStatus::Alive);
    }

    #[test]
    fn test_repair_fixes_dangling_references() {
        let mut state = WorldState::genesis();
        state.current_location_id = "loc_gone".to_string();
        state
            .npcs
            .insert("ghost".to_string(), Npc::new("Ghost", "loc_nowhere"));
        state
            .locations
            .get_mut(START_LOCATION_ID)
            .unwrap()
            .exits
            .push("THE RUSTY TANKARD".to_string());

        let notes = state.repair();

        assert_eq!(notes.len(), 3);
        assert_eq!(state.current_location_id, START_LOCATION_ID);
        assert_eq!(state.npcs["ghost"].location_id, START_LOCATION_ID);
        assert!(state.current_location().unwrap().exits.is_empty());
    }

    #[test]
    fn test_fresh_id_avoids_collisions() {
        let mut state = WorldState::genesis();
        assert_eq!(state.fresh_id("npc", "Barkeep"), "npc_barkeep");
        state
            .npcs
            .insert("npc_barkeep".to_string(), Npc::new("Barkeep", START_LOCATION_ID));
        assert_eq!(state.fresh_id("npc", "Barkeep"), "npc_barkeep_2");
        assert!(state.fresh_id("loc", "!!!").starts_with("loc_"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Old Lighthouse"), "the_old_lighthouse");
        assert_eq!(slugify("  Bob's  Bar! "), "bob_s_bar");
        assert_eq!(slugify("???"), "");
    }
}

//! Deltas: transient patches proposed by agents.
//!
//! The archivist is asked for one shape and answers in several. Rather than
//! deserializing into a fixed record, a reply is read key by key into a list
//! of [`DeltaOp`] variants, one per recognized shape. Keys that are absent,
//! unknown or malformed contribute nothing.
//!
//! Recognized keys:
//!
//! | key | variant |
//! |-----|---------|
//! | `player` | [`DeltaOp::Player`] (direct field overwrite) |
//! | `player_update` | [`DeltaOp::PlayerUpdate`] (`hp` overwrites) |
//! | `player_delta` | [`DeltaOp::PlayerDelta`] (`hp_change` is additive) |
//! | `location_delta` | [`DeltaOp::Location`] (current location's ground) |
//! | `npcs`, `npc_updates` | [`DeltaOp::Npcs`] (existing NPCs only) |
//! | `world_flags` | [`DeltaOp::WorldFlags`] |
//! | `quest_update` | [`DeltaOp::Quest`] |
//! | `story_state` | [`DeltaOp::Story`] |
//! | `world_events` | [`DeltaOp::WorldEvents`] (upsert by name) |

use crate::state::{Attitude, EventStatus, Item, ItemOrigin, LoreEntry, NpcStatus};
use crate::value::{as_int, as_list, as_text, int_field, text_field};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Patch payloads
// ============================================================================

/// Items to add to and remove from one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ItemChanges {
    pub add: Vec<Item>,
    /// Names; each removes the first case-insensitive match only.
    pub remove: Vec<String>,
}

impl ItemChanges {
    fn read(value: &Value, add_key: &str, remove_key: &str, origin: ItemOrigin) -> Self {
        let add = value
            .get(add_key)
            .map(as_list)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| Item::coerce(v, origin))
            .collect();
        let remove = value
            .get(remove_key)
            .map(as_list)
            .unwrap_or_default()
            .into_iter()
            .filter_map(item_name)
            .collect();
        Self { add, remove }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Name of an item given as a bare string or an object.
fn item_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) => text_field(value, "name").or_else(|| text_field(value, "item_name")),
        other => as_text(other),
    }
}

/// Partial update of an existing NPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct NpcPatch {
    pub name: Option<String>,
    pub location_id: Option<String>,
    pub status: Option<NpcStatus>,
    pub attitude: Option<Attitude>,
    pub hp: Option<i32>,
    pub hp_change: Option<i32>,
    pub max_hp: Option<i32>,
    pub description: Option<String>,
}

impl NpcPatch {
    fn read(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let patch = Self {
            name: text_field(value, "name"),
            location_id: text_field(value, "location_id"),
            status: text_field(value, "status").map(NpcStatus::from),
            attitude: text_field(value, "attitude").map(Attitude::from),
            hp: int_field(value, "hp"),
            hp_change: int_field(value, "hp_change"),
            max_hp: int_field(value, "max_hp"),
            description: text_field(value, "description"),
        };
        (patch != Self::default()).then_some(patch)
    }
}

/// Objective and tension changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct QuestUpdate {
    /// Replaces the current objective when present.
    pub new_objective: Option<String>,
    /// Added to the global tension, which stays within its range.
    pub tension_change: Option<i32>,
}

impl QuestUpdate {
    fn read(value: &Value) -> Option<Self> {
        let update = Self {
            new_objective: text_field(value, "new_objective"),
            tension_change: int_field(value, "tension_change").filter(|c| *c != 0),
        };
        (update != Self::default()).then_some(update)
    }
}

/// Direct patch of the story state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct StoryPatch {
    pub current_act: Option<i32>,
    pub global_tension: Option<i32>,
    pub tension_change: Option<i32>,
    pub genre: Option<String>,
    pub current_objective: Option<String>,
    pub narrative_direction: Option<String>,
}

impl StoryPatch {
    /// Read a story patch from an object. Returns `None` if nothing usable
    /// is present.
    pub fn read(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let patch = Self {
            current_act: int_field(value, "current_act"),
            global_tension: int_field(value, "global_tension"),
            tension_change: int_field(value, "tension_change").filter(|c| *c != 0),
            genre: text_field(value, "genre"),
            current_objective: text_field(value, "current_objective"),
            narrative_direction: text_field(value, "narrative_direction"),
        };
        (!patch.is_empty()).then_some(patch)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Insert or update of a world event, matched by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldEventPatch {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<EventStatus>,
}

impl WorldEventPatch {
    fn read(value: &Value) -> Option<Self> {
        match value {
            Value::Object(_) => Some(Self {
                name: text_field(value, "name")?,
                description: text_field(value, "description"),
                status: text_field(value, "status").map(EventStatus::from),
            }),
            other => Some(Self {
                name: as_text(other)?,
                description: None,
                status: None,
            }),
        }
    }
}

/// An NPC the scribe found in the narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredNpc {
    pub name: String,
    pub description: String,
    pub status: NpcStatus,
}

/// A place the scribe found in the narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredLocation {
    pub name: String,
    pub description: String,
}

/// Everything the narrative introduced. Applied add-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Discoveries {
    pub items: Vec<Item>,
    pub npcs: Vec<DiscoveredNpc>,
    pub locations: Vec<DiscoveredLocation>,
    pub lore: Vec<LoreEntry>,
}

impl Discoveries {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
            && self.npcs.is_empty()
            && self.locations.is_empty()
            && self.lore.is_empty()
    }
}

// ============================================================================
// Delta
// ============================================================================

/// One recognized delta shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DeltaOp {
    /// Overwrite player fields by name.
    Player { fields: BTreeMap<String, Value> },
    /// Absolute hp plus inventory changes.
    PlayerUpdate {
        hp: Option<i32>,
        inventory: ItemChanges,
    },
    /// Relative hp plus inventory changes.
    PlayerDelta {
        hp_change: i32,
        inventory: ItemChanges,
    },
    /// Ground items of the current location.
    Location { ground: ItemChanges },
    /// Patches keyed by NPC id.
    Npcs { patches: BTreeMap<String, NpcPatch> },
    WorldFlags { flags: BTreeMap<String, Value> },
    Quest(QuestUpdate),
    Story(StoryPatch),
    WorldEvents { events: Vec<WorldEventPatch> },
    Discoveries(Discoveries),
}

impl DeltaOp {
    /// The delta key this shape is read from.
    pub fn shape(&self) -> &'static str {
        match self {
            DeltaOp::Player { .. } => "player",
            DeltaOp::PlayerUpdate { .. } => "player_update",
            DeltaOp::PlayerDelta { .. } => "player_delta",
            DeltaOp::Location { .. } => "location_delta",
            DeltaOp::Npcs { .. } => "npcs",
            DeltaOp::WorldFlags { .. } => "world_flags",
            DeltaOp::Quest(_) => "quest_update",
            DeltaOp::Story(_) => "story_state",
            DeltaOp::WorldEvents { .. } => "world_events",
            DeltaOp::Discoveries(_) => "discoveries",
        }
    }
}

/// Outcome category reported by the archivist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(into = "String")]
pub enum ActionResult {
    #[default]
    Success,
    Failure,
    MixedSuccess,
    Other(String),
}

impl From<String> for ActionResult {
    fn from(value: String) -> Self {
        let normalized: String = value
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match normalized.as_str() {
            "success" => ActionResult::Success,
            "failure" | "fail" => ActionResult::Failure,
            "mixedsuccess" | "mixed" | "partialsuccess" => ActionResult::MixedSuccess,
            _ => ActionResult::Other(value.trim().to_string()),
        }
    }
}

impl From<ActionResult> for String {
    fn from(result: ActionResult) -> Self {
        result.to_string()
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionResult::Success => f.write_str("Success"),
            ActionResult::Failure => f.write_str("Failure"),
            ActionResult::MixedSuccess => f.write_str("Mixed Success"),
            ActionResult::Other(other) => f.write_str(other),
        }
    }
}

/// A parsed delta: the recognized shapes plus the archivist's annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Delta {
    pub ops: Vec<DeltaOp>,
    pub action_result: Option<ActionResult>,
    pub narrative_cue: Option<String>,
}

type ShapeReader = fn(&Value) -> Option<DeltaOp>;

const SHAPES: &[(&str, ShapeReader)] = &[
    ("player", read_player),
    ("player_update", read_player_update),
    ("player_delta", read_player_delta),
    ("location_delta", read_location_delta),
    ("npcs", read_npcs),
    ("npc_updates", read_npcs),
    ("world_flags", read_world_flags),
    ("quest_update", read_quest),
    ("story_state", read_story),
    ("world_events", read_world_events),
];

impl Delta {
    /// A delta that changes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_ops(ops: Vec<DeltaOp>) -> Self {
        Self {
            ops,
            ..Default::default()
        }
    }

    /// Read every recognized shape out of an agent reply.
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            tracing::warn!("delta is not a JSON object; treating as empty");
            return Self::empty();
        };

        let mut delta = Self::empty();
        for (key, read) in SHAPES {
            let Some(raw) = map.get(*key) else { continue };
            if raw.is_null() {
                continue;
            }
            match read(raw) {
                Some(op) => delta.ops.push(op),
                None if raw.is_object() || raw.is_array() => {
                    tracing::debug!(shape = *key, "delta shape carried no changes")
                }
                None => tracing::warn!(shape = *key, "ignoring malformed delta shape"),
            }
        }

        delta.action_result = text_field(value, "action_result").map(ActionResult::from);
        delta.narrative_cue = text_field(value, "narrative_cue");
        delta
    }

    /// Whether applying this delta would touch nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The outcome, assuming success when none was reported.
    pub fn outcome(&self) -> ActionResult {
        self.action_result.clone().unwrap_or_default()
    }

    /// One line per change, for prompts and logs.
    pub fn describe(&self) -> String {
        let mut lines = vec![format!("Outcome: {}", self.outcome())];
        for op in &self.ops {
            lines.push(describe_op(op));
        }
        if let Some(cue) = &self.narrative_cue {
            lines.push(format!("Cue: {cue}"));
        }
        lines.join("\n")
    }
}

fn describe_items(label: &str, changes: &ItemChanges) -> String {
    let mut parts = Vec::new();
    if !changes.add.is_empty() {
        let names: Vec<&str> = changes.add.iter().map(|i| i.name.as_str()).collect();
        parts.push(format!("{label} gains {}", names.join(", ")));
    }
    if !changes.remove.is_empty() {
        parts.push(format!("{label} loses {}", changes.remove.join(", ")));
    }
    parts.join("; ")
}

fn describe_op(op: &DeltaOp) -> String {
    match op {
        DeltaOp::Player { fields } => {
            let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
            format!("Player fields set: {}", keys.join(", "))
        }
        DeltaOp::PlayerUpdate { hp, inventory } => {
            let mut parts = Vec::new();
            if let Some(hp) = hp {
                parts.push(format!("Player hp set to {hp}"));
            }
            if !inventory.is_empty() {
                parts.push(describe_items("Inventory", inventory));
            }
            parts.join("; ")
        }
        DeltaOp::PlayerDelta {
            hp_change,
            inventory,
        } => {
            let mut parts = Vec::new();
            if *hp_change != 0 {
                parts.push(format!("Player hp {hp_change:+}"));
            }
            if !inventory.is_empty() {
                parts.push(describe_items("Inventory", inventory));
            }
            parts.join("; ")
        }
        DeltaOp::Location { ground } => describe_items("Ground", ground),
        DeltaOp::Npcs { patches } => {
            let ids: Vec<&str> = patches.keys().map(String::as_str).collect();
            format!("NPCs changed: {}", ids.join(", "))
        }
        DeltaOp::WorldFlags { flags } => {
            let keys: Vec<&str> = flags.keys().map(String::as_str).collect();
            format!("Flags set: {}", keys.join(", "))
        }
        DeltaOp::Quest(update) => {
            let mut parts = Vec::new();
            if let Some(objective) = &update.new_objective {
                parts.push(format!("New objective: {objective}"));
            }
            if let Some(change) = update.tension_change {
                parts.push(format!("Tension {change:+}"));
            }
            parts.join("; ")
        }
        DeltaOp::Story(_) => "Story direction updated".to_string(),
        DeltaOp::WorldEvents { events } => {
            let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
            format!("World events: {}", names.join(", "))
        }
        DeltaOp::Discoveries(found) => format!(
            "Discovered {} items, {} people, {} places, {} lore entries",
            found.items.len(),
            found.npcs.len(),
            found.locations.len(),
            found.lore.len()
        ),
    }
}

// ============================================================================
// Shape readers
// ============================================================================

fn read_player(value: &Value) -> Option<DeltaOp> {
    let map = value.as_object()?;
    let fields: BTreeMap<String, Value> = map
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    (!fields.is_empty()).then_some(DeltaOp::Player { fields })
}

fn read_player_update(value: &Value) -> Option<DeltaOp> {
    value.as_object()?;
    let hp = value.get("hp").and_then(as_int);
    let inventory = ItemChanges::read(value, "inventory_add", "inventory_remove", ItemOrigin::Acquired);
    (hp.is_some() || !inventory.is_empty()).then_some(DeltaOp::PlayerUpdate { hp, inventory })
}

fn read_player_delta(value: &Value) -> Option<DeltaOp> {
    value.as_object()?;
    let hp_change = int_field(value, "hp_change").unwrap_or(0);
    let inventory = ItemChanges::read(value, "inventory_add", "inventory_remove", ItemOrigin::Acquired);
    (hp_change != 0 || !inventory.is_empty()).then_some(DeltaOp::PlayerDelta {
        hp_change,
        inventory,
    })
}

fn read_location_delta(value: &Value) -> Option<DeltaOp> {
    value.as_object()?;
    let ground = ItemChanges::read(value, "ground_items_add", "ground_items_remove", ItemOrigin::Ground);
    (!ground.is_empty()).then_some(DeltaOp::Location { ground })
}

fn read_npcs(value: &Value) -> Option<DeltaOp> {
    let map = value.as_object()?;
    let patches: BTreeMap<String, NpcPatch> = map
        .iter()
        .filter_map(|(id, patch)| Some((id.clone(), NpcPatch::read(patch)?)))
        .collect();
    (!patches.is_empty()).then_some(DeltaOp::Npcs { patches })
}

fn read_world_flags(value: &Value) -> Option<DeltaOp> {
    let map = value.as_object()?;
    let flags: BTreeMap<String, Value> = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    (!flags.is_empty()).then_some(DeltaOp::WorldFlags { flags })
}

fn read_quest(value: &Value) -> Option<DeltaOp> {
    value.as_object()?;
    QuestUpdate::read(value).map(DeltaOp::Quest)
}

fn read_story(value: &Value) -> Option<DeltaOp> {
    StoryPatch::read(value).map(DeltaOp::Story)
}

fn read_world_events(value: &Value) -> Option<DeltaOp> {
    let events: Vec<WorldEventPatch> = as_list(value)
        .into_iter()
        .filter_map(WorldEventPatch::read)
        .collect();
    (!events.is_empty()).then_some(DeltaOp::WorldEvents { events })
}

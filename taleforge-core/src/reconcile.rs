//! Applying deltas to the world state.
//!
//! Each [`DeltaOp`] variant has its own merge function. Variants are applied
//! in the order they appear and never fail: a patch that refers to something
//! that does not exist is skipped and noted in the report.
//!
//! Two rules hold for every path through here:
//!
//! - NPCs are never created by a patch. Only forging and the scribe's
//!   add-only discoveries introduce new ones.
//! - `player.hp` is never clamped. Display code uses
//!   [`Player::hp_ratio`](crate::state::Player::hp_ratio).

use crate::delta::{
    Delta, DeltaOp, Discoveries, ItemChanges, NpcPatch, QuestUpdate, StoryPatch, WorldEventPatch,
};
use crate::forge::link_location;
use crate::state::{
    remove_first_named, Attitude, Item, ItemOrigin, Location, LoreEntry, Npc, Player, WorldEvent,
    WorldState,
};
use crate::value::{as_int, as_list, as_text};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Description given to NPCs the scribe picks up without one.
pub const NOTED_NPC_DESCRIPTION: &str = "Noticed in passing.";

/// What a reconciliation changed and what it had to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub changes: Vec<String>,
    pub skipped: Vec<String>,
}

impl ReconcileReport {
    /// Whether nothing was changed.
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    fn note_change(&mut self, note: impl Into<String>) {
        self.changes.push(note.into());
    }

    fn note_skip(&mut self, note: impl Into<String>) {
        let note = note.into();
        tracing::debug!(note = %note, "delta entry skipped");
        self.skipped.push(note);
    }
}

/// Apply a delta and return the updated document.
pub fn reconcile(mut state: WorldState, delta: &Delta) -> WorldState {
    apply(&mut state, delta);
    state
}

/// Apply a delta in place.
pub fn apply(state: &mut WorldState, delta: &Delta) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for op in &delta.ops {
        match op {
            DeltaOp::Player { fields } => apply_player_fields(&mut state.player, fields, &mut report),
            DeltaOp::PlayerUpdate { hp, inventory } => {
                if let Some(hp) = hp {
                    state.player.hp = *hp;
                    report.note_change(format!("player hp set to {hp}"));
                }
                apply_items(&mut state.player.inventory, inventory, "inventory", &mut report);
            }
            DeltaOp::PlayerDelta {
                hp_change,
                inventory,
            } => {
                if *hp_change != 0 {
                    state.player.hp = state.player.hp.saturating_add(*hp_change);
                    report.note_change(format!("player hp {hp_change:+} to {}", state.player.hp));
                }
                apply_items(&mut state.player.inventory, inventory, "inventory", &mut report);
            }
            DeltaOp::Location { ground } => {
                let location_id = state.current_location_id.clone();
                match state.current_location_mut() {
                    Some(location) => {
                        apply_items(&mut location.items, ground, &location_id, &mut report)
                    }
                    None => report.note_skip(format!(
                        "ground items for missing location '{location_id}'"
                    )),
                }
            }
            DeltaOp::Npcs { patches } => {
                for (id, patch) in patches {
                    apply_npc_patch(state, id, patch, &mut report);
                }
            }
            DeltaOp::WorldFlags { flags } => apply_flags(state, flags, &mut report),
            DeltaOp::Quest(update) => apply_quest(state, update, &mut report),
            DeltaOp::Story(patch) => apply_story(state, patch, &mut report),
            DeltaOp::WorldEvents { events } => apply_events(&mut state.world_events, events, &mut report),
            DeltaOp::Discoveries(found) => apply_discoveries(state, found, &mut report),
        }
    }

    report
}

fn apply_items(items: &mut Vec<Item>, changes: &ItemChanges, holder: &str, report: &mut ReconcileReport) {
    for item in &changes.add {
        items.push(item.clone());
        report.note_change(format!("{holder} +{}", item.name));
    }
    for name in &changes.remove {
        match remove_first_named(items, name) {
            Some(removed) => report.note_change(format!("{holder} -{}", removed.name)),
            None => report.note_skip(format!("{holder} has no '{name}' to remove")),
        }
    }
}

fn apply_player_fields(player: &mut Player, fields: &BTreeMap<String, Value>, report: &mut ReconcileReport) {
    for (key, value) in fields {
        match key.as_str() {
            "name" => match as_text(value) {
                Some(name) => {
                    player.name = name;
                    report.note_change("player name");
                }
                None => report.note_skip("player name was not text"),
            },
            "hp" | "max_hp" => match as_int(value) {
                Some(n) => {
                    if key == "hp" {
                        player.hp = n;
                    } else {
                        player.max_hp = n;
                    }
                    report.note_change(format!("player {key} set to {n}"));
                }
                None => report.note_skip(format!("player {key} was not a number")),
            },
            "inventory" => {
                player.inventory = as_list(value)
                    .into_iter()
                    .filter_map(|v| Item::coerce(v, ItemOrigin::Acquired))
                    .collect();
                report.note_change("player inventory replaced");
            }
            // Journal entries are only ever added; existing topics win.
            "journal" => {
                for entry in as_list(value) {
                    match serde_json::from_value::<LoreEntry>(entry.clone()) {
                        Ok(entry) => learn(player, entry, report),
                        Err(_) => report.note_skip("journal entry was not {topic, entry}"),
                    }
                }
            }
            _ => {
                player.attributes.insert(key.clone(), value.clone());
                report.note_change(format!("player {key}"));
            }
        }
    }
}

fn learn(player: &mut Player, entry: LoreEntry, report: &mut ReconcileReport) {
    let topic = entry.topic.clone();
    if player.learn(entry) {
        report.note_change(format!("journal +{topic}"));
    } else {
        report.note_skip(format!("journal already has '{topic}'"));
    }
}

fn apply_npc_patch(state: &mut WorldState, id: &str, patch: &NpcPatch, report: &mut ReconcileReport) {
    let location_id = match &patch.location_id {
        Some(loc) if state.locations.contains_key(loc) => Some(loc.clone()),
        Some(loc) => {
            report.note_skip(format!("npc '{id}' cannot move to unknown location '{loc}'"));
            None
        }
        None => None,
    };

    let Some(npc) = state.npcs.get_mut(id) else {
        report.note_skip(format!("no npc '{id}'; patches never create npcs"));
        return;
    };

    if let Some(name) = &patch.name {
        npc.name = name.clone();
    }
    if let Some(location_id) = location_id {
        npc.location_id = location_id;
    }
    if let Some(status) = &patch.status {
        npc.status = status.clone();
    }
    if let Some(attitude) = patch.attitude {
        npc.attitude = attitude;
    }
    if let Some(max_hp) = patch.max_hp {
        npc.max_hp = Some(max_hp);
    }
    if let Some(hp) = patch.hp {
        npc.hp = Some(hp);
    }
    if let Some(change) = patch.hp_change {
        let base = npc.hp.or(npc.max_hp).unwrap_or(0);
        npc.hp = Some(base.saturating_add(change));
    }
    if let Some(description) = &patch.description {
        npc.description = description.clone();
    }
    report.note_change(format!("npc '{id}' updated"));
}

fn apply_flags(state: &mut WorldState, flags: &BTreeMap<String, Value>, report: &mut ReconcileReport) {
    for (flag, value) in flags {
        if value.is_null() {
            if state.world_flags.remove(flag).is_some() {
                report.note_change(format!("flag '{flag}' cleared"));
            }
        } else {
            state.world_flags.insert(flag.clone(), value.clone());
            report.note_change(format!("flag '{flag}' = {value}"));
        }
    }
}

fn apply_quest(state: &mut WorldState, update: &QuestUpdate, report: &mut ReconcileReport) {
    let story = &mut state.story_state;
    if let Some(objective) = &update.new_objective {
        story.current_objective = objective.clone();
        report.note_change(format!("objective: {objective}"));
    }
    if let Some(change) = update.tension_change {
        story.adjust_tension(change);
        report.note_change(format!("tension {change:+} to {}", story.global_tension));
    }
}

fn apply_story(state: &mut WorldState, patch: &StoryPatch, report: &mut ReconcileReport) {
    let story = &mut state.story_state;
    if let Some(act) = patch.current_act {
        story.current_act = act.max(1);
        report.note_change(format!("act {}", story.current_act));
    }
    if let Some(tension) = patch.global_tension {
        story.set_tension(tension);
        report.note_change(format!("tension set to {}", story.global_tension));
    }
    if let Some(change) = patch.tension_change {
        story.adjust_tension(change);
        report.note_change(format!("tension {change:+} to {}", story.global_tension));
    }
    if let Some(genre) = &patch.genre {
        story.genre = genre.clone();
        report.note_change(format!("genre: {genre}"));
    }
    if let Some(objective) = &patch.current_objective {
        story.current_objective = objective.clone();
        report.note_change(format!("objective: {objective}"));
    }
    if let Some(direction) = &patch.narrative_direction {
        story.narrative_direction = direction.clone();
        report.note_change("narrative direction");
    }
}

fn apply_events(events: &mut Vec<WorldEvent>, patches: &[WorldEventPatch], report: &mut ReconcileReport) {
    for patch in patches {
        let existing = events
            .iter_mut()
            .find(|e| e.name.trim().eq_ignore_ascii_case(patch.name.trim()));
        match existing {
            Some(event) => {
                if let Some(description) = &patch.description {
                    event.description = description.clone();
                }
                if let Some(status) = patch.status {
                    event.status = status;
                }
                report.note_change(format!("event '{}' updated", event.name));
            }
            None => {
                events.push(WorldEvent {
                    name: patch.name.clone(),
                    description: patch.description.clone().unwrap_or_default(),
                    status: patch.status.unwrap_or_default(),
                });
                report.note_change(format!("event '{}' began", patch.name));
            }
        }
    }
}

fn apply_discoveries(state: &mut WorldState, found: &Discoveries, report: &mut ReconcileReport) {
    for item in &found.items {
        if state.player.has_item(&item.name) {
            report.note_skip(format!("already carrying '{}'", item.name));
            continue;
        }
        state.player.inventory.push(item.clone());
        report.note_change(format!("inventory +{}", item.name));
    }

    for discovered in &found.npcs {
        if state.has_npc_named(&discovered.name) {
            report.note_skip(format!("npc '{}' already known", discovered.name));
            continue;
        }
        let id = state.fresh_id("scribe_npc", &discovered.name);
        let description = if discovered.description.trim().is_empty() {
            NOTED_NPC_DESCRIPTION.to_string()
        } else {
            discovered.description.clone()
        };
        let npc = Npc {
            status: discovered.status.clone(),
            attitude: Attitude::Unknown,
            ..Npc::new(&discovered.name, &state.current_location_id)
        }
        .with_description(description);
        state.npcs.insert(id.clone(), npc);
        report.note_change(format!("npc '{id}' noticed"));
    }

    for discovered in &found.locations {
        if state.location_id_by_name(&discovered.name).is_some() {
            report.note_skip(format!("location '{}' already known", discovered.name));
            continue;
        }
        let id = state.fresh_id("loc_scribe", &discovered.name);
        let origin = state.current_location_id.clone();
        link_location(
            state,
            &origin,
            &id,
            Location::new(&discovered.name, &discovered.description),
            false,
        );
        report.note_change(format!("location '{id}' noticed"));
    }

    for entry in &found.lore {
        learn(&mut state.player, entry.clone(), report);
    }
}

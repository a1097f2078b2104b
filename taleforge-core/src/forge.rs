//! Forging: bringing referenced-but-missing entities into existence.
//!
//! [`EntityForge`] only produces a [`NewEntity`]. Putting it into the world
//! is the caller's job: locations go through [`link_location`], NPCs are
//! inserted under their id, and items are placed wherever the caller decides.

use crate::agents::creator::{self, CreatorReply};
use crate::agents::Generator;
use crate::resolver::{EntityKind, EntityResolver};
use crate::shadow::{ShadowEntry, ShadowQueue};
use crate::state::{
    slugify, Attitude, Item, ItemOrigin, Location, Npc, NpcStatus, WorldState, DEFAULT_GENRE,
};
use crate::value::{as_list, as_text, int_field, text_field};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Phrase marking an exit that leads back the way the player came.
const BACK_REFERENCE: &str = "back to";

/// A freshly forged entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NewEntity {
    Location { id: String, location: Location },
    Npc { id: String, npc: Npc },
    Item { item: Item },
}

impl NewEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            NewEntity::Location { .. } => EntityKind::Location,
            NewEntity::Npc { .. } => EntityKind::Npc,
            NewEntity::Item { .. } => EntityKind::Item,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NewEntity::Location { location, .. } => &location.name,
            NewEntity::Npc { npc, .. } => &npc.name,
            NewEntity::Item { item } => &item.name,
        }
    }

    /// Id for locations and NPCs. Items have none.
    pub fn id(&self) -> Option<&str> {
        match self {
            NewEntity::Location { id, .. } | NewEntity::Npc { id, .. } => Some(id),
            NewEntity::Item { .. } => None,
        }
    }
}

/// Where a forged entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForgeSource {
    ShadowQueue,
    Generated,
}

/// Result of a forge attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ForgeOutcome {
    Forged {
        entity: NewEntity,
        source: ForgeSource,
    },
    /// Generation failed or returned nothing usable. The caller carries on
    /// without the entity.
    Failed { target: String, reason: String },
}

impl ForgeOutcome {
    pub fn entity(&self) -> Option<&NewEntity> {
        match self {
            ForgeOutcome::Forged { entity, .. } => Some(entity),
            ForgeOutcome::Failed { .. } => None,
        }
    }
}

/// Synthesizes new entities through the creator agent.
pub struct EntityForge {
    generator: Arc<dyn Generator>,
    default_genre: String,
    matcher: EntityResolver,
}

impl EntityForge {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            default_genre: DEFAULT_GENRE.to_string(),
            matcher: EntityResolver::new(),
        }
    }

    /// Genre assumed when the story has not established one.
    pub fn with_default_genre(mut self, genre: impl Into<String>) -> Self {
        self.default_genre = genre.into();
        self
    }

    /// Matching strategies used against the shadow queue.
    pub fn with_matcher(mut self, matcher: EntityResolver) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn matcher(&self) -> &EntityResolver {
        &self.matcher
    }

    /// Forge whatever `target` turns out to be.
    pub async fn forge(
        &self,
        target: &str,
        current_location_id: &str,
        state: &WorldState,
        shadow: Option<&mut ShadowQueue>,
    ) -> ForgeOutcome {
        self.forge_kind(target, current_location_id, state, shadow, None)
            .await
    }

    /// Forge `target`, asking for a particular kind of entity.
    pub async fn forge_kind(
        &self,
        target: &str,
        current_location_id: &str,
        state: &WorldState,
        shadow: Option<&mut ShadowQueue>,
        kind: Option<EntityKind>,
    ) -> ForgeOutcome {
        if let Some(queue) = shadow {
            if let Some(entity) = queue.take_match(target, &self.matcher, kind) {
                let entity = settle(entity, current_location_id, state, true);
                tracing::info!(query = target, entity = entity.name(), "forged from shadow queue");
                return ForgeOutcome::Forged {
                    entity,
                    source: ForgeSource::ShadowQueue,
                };
            }
        }

        let genre = state.story_state.genre_or(&self.default_genre);
        let location_name = state
            .locations
            .get(current_location_id)
            .map(|loc| loc.name.as_str())
            .unwrap_or(current_location_id);

        let reply = match creator::create(
            self.generator.as_ref(),
            target,
            location_name,
            genre,
            kind,
        )
        .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(query = target, error = %e, "forge failed");
                return ForgeOutcome::Failed {
                    target: target.to_string(),
                    reason: e.to_string(),
                };
            }
        };

        match entity_from_reply(&reply, target, current_location_id, state, kind) {
            Some(entity) => {
                tracing::info!(query = target, entity = entity.name(), kind = entity.kind().name(), "forged");
                ForgeOutcome::Forged {
                    entity,
                    source: ForgeSource::Generated,
                }
            }
            None => {
                tracing::warn!(query = target, "creator reply did not describe an entity");
                ForgeOutcome::Failed {
                    target: target.to_string(),
                    reason: "unrecognized entity type".to_string(),
                }
            }
        }
    }
}

/// Turn dreamer replies into shadow queue entries.
pub fn shadow_entries(
    replies: &[CreatorReply],
    current_location_id: &str,
    state: &WorldState,
) -> Vec<ShadowEntry> {
    replies
        .iter()
        .filter_map(|reply| {
            let target = reply.name()?;
            let entity = entity_from_reply(reply, &target, current_location_id, state, None)?;
            Some(ShadowEntry::new(entity, reply.keywords.clone()))
        })
        .collect()
}

/// Build an entity from a creator reply.
///
/// `kind` is used when the reply does not say what it made. Returns `None`
/// when the kind cannot be determined.
pub fn entity_from_reply(
    reply: &CreatorReply,
    target: &str,
    current_location_id: &str,
    state: &WorldState,
    kind: Option<EntityKind>,
) -> Option<NewEntity> {
    let kind = reply.kind.or(kind).or_else(|| {
        if reply.item_name.is_some() {
            Some(EntityKind::Item)
        } else if reply.data.get("exits").is_some() || reply.data.get("suggested_exits").is_some() {
            Some(EntityKind::Location)
        } else {
            None
        }
    })?;

    let name = reply.name().unwrap_or_else(|| target.trim().to_string());
    let data = &reply.data;

    let entity = match kind {
        EntityKind::Location => {
            let mut location = Location::new(&name, text_field(data, "description").unwrap_or_default());
            location.exits = data
                .get("exits")
                .or_else(|| data.get("suggested_exits"))
                .map(as_list)
                .unwrap_or_default()
                .into_iter()
                .filter_map(exit_text)
                .collect();
            location.items = data
                .get("items")
                .map(as_list)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|v| Item::coerce(v, ItemOrigin::Ground))
                .collect();
            NewEntity::Location {
                id: assign_id(reply.id.as_deref(), "loc", &name, state),
                location,
            }
        }
        EntityKind::Npc => {
            let mut npc = Npc::new(&name, current_location_id);
            if let Some(location_id) = text_field(data, "location_id") {
                npc.location_id = location_id;
            }
            npc.description = text_field(data, "description").unwrap_or_default();
            npc.attitude = text_field(data, "attitude")
                .map(Attitude::from)
                .unwrap_or(Attitude::Neutral);
            npc.status = text_field(data, "status")
                .map(NpcStatus::from)
                .unwrap_or(NpcStatus::Alive);
            npc.hp = int_field(data, "hp");
            npc.max_hp = int_field(data, "max_hp").or(npc.hp);
            NewEntity::Npc {
                id: assign_id(reply.id.as_deref(), "npc", &name, state),
                npc,
            }
        }
        EntityKind::Item => {
            let mut item = Item::new(&name, ItemOrigin::Ground);
            if let Some(description) = text_field(data, "description") {
                item.description = description;
            }
            if let Some(item_state) = text_field(data, "state") {
                item.state = item_state;
            }
            NewEntity::Item { item }
        }
    };

    Some(settle(entity, current_location_id, state, false))
}

fn exit_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) => text_field(value, "name").or_else(|| text_field(value, "description")),
        other => as_text(other),
    }
}

/// Pick an id with the right prefix that is free in `state`.
///
/// A suggested id keeps its wording (`gen_lighthouse` becomes
/// `loc_gen_lighthouse`); without one the name is used.
fn assign_id(suggested: Option<&str>, prefix: &str, name: &str, state: &WorldState) -> String {
    let slug = suggested.map(slugify).unwrap_or_default();
    let rest = slug
        .strip_prefix(prefix)
        .and_then(|s| s.strip_prefix('_'))
        .unwrap_or(&slug);
    if rest.is_empty() {
        state.fresh_id(&format!("{prefix}_gen"), name)
    } else {
        state.fresh_id(prefix, rest)
    }
}

/// Make an entity consistent with the world it is about to join.
///
/// Ids taken since the entity was made are replaced. NPCs pointing at a
/// location that does not exist stand in the current one; with
/// `rehome_npc` they are moved there regardless.
fn settle(entity: NewEntity, current_location_id: &str, state: &WorldState, rehome_npc: bool) -> NewEntity {
    match entity {
        NewEntity::Location { id, location } => NewEntity::Location {
            id: assign_id(Some(&id), "loc", &location.name, state),
            location,
        },
        NewEntity::Npc { id, mut npc } => {
            if rehome_npc || !state.locations.contains_key(&npc.location_id) {
                npc.location_id = current_location_id.to_string();
            }
            NewEntity::Npc {
                id: assign_id(Some(&id), "npc", &npc.name, state),
                npc,
            }
        }
        item @ NewEntity::Item { .. } => item,
    }
}

/// Insert a new location and wire it to where the player came from.
///
/// Exits naming the location itself (or its id) and exits that already
/// point "back to" somewhere are dropped from the new location. The origin
/// gains an exit named after the new location and the new location gains
/// `Back to <origin>`. Repeating the call adds nothing twice. With
/// `move_player` the player ends up in the new location.
pub fn link_location(
    state: &mut WorldState,
    origin_id: &str,
    new_id: &str,
    mut location: Location,
    move_player: bool,
) {
    if !state.locations.contains_key(new_id) {
        let own_name = location.name.trim().to_lowercase();
        location.exits.retain(|exit| {
            let exit = exit.trim().to_lowercase();
            exit != own_name && exit != new_id.to_lowercase() && !exit.contains(BACK_REFERENCE)
        });
        state.locations.insert(new_id.to_string(), location);
    }

    if origin_id != new_id {
        let origin_name = state.locations.get(origin_id).map(|loc| loc.name.clone());
        let new_name = state.locations.get(new_id).map(|loc| loc.name.clone());

        if let (Some(origin_name), Some(new_name)) = (origin_name, new_name) {
            if let Some(origin) = state.locations.get_mut(origin_id) {
                origin.add_exit(new_name);
            }
            if let Some(new_location) = state.locations.get_mut(new_id) {
                new_location.add_exit(format!("Back to {origin_name}"));
            }
        }
    }

    if move_player {
        state.current_location_id = new_id.to_string();
    }
}

//! Entity resolution.
//!
//! Decides whether a free-text reference ("the stranger", "the docks") names
//! something already in the world. Matching runs in tiers: every candidate is
//! tried against the first strategy before any candidate is tried against the
//! next, so an exact hit always beats a looser one.
//!
//! A miss is the ordinary outcome that drives forging, not an error.

use crate::state::{WorldState, SURROUNDING_AREA};

/// Words that describe leaving rather than naming a destination.
const VAGUE_MOVEMENT_WORDS: &[&str] = &["outside", "exit", "door", "leave", "out"];

/// Words ignored by [`KeywordSetMatch`].
const STOP_WORDS: &[&str] = &["the", "a", "an", "of", "to", "at", "in", "on", "and"];

/// A way of deciding whether a query names a candidate.
pub trait MatchStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether `query` refers to `candidate`.
    fn matches(&self, query: &str, candidate: &str) -> bool;
}

/// Case-insensitive equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl MatchStrategy for ExactMatch {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn matches(&self, query: &str, candidate: &str) -> bool {
        let (query, candidate) = (query.trim(), candidate.trim());
        !query.is_empty() && query.to_lowercase() == candidate.to_lowercase()
    }
}

/// Case-insensitive containment in either direction.
///
/// The contained side must be at least [`SubstringMatch::MIN_LEN`]
/// characters, so single letters and articles match nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatch;

impl SubstringMatch {
    pub const MIN_LEN: usize = 3;
}

impl MatchStrategy for SubstringMatch {
    fn name(&self) -> &'static str {
        "substring"
    }

    fn matches(&self, query: &str, candidate: &str) -> bool {
        let query = query.trim().to_lowercase();
        let candidate = candidate.trim().to_lowercase();
        if query.chars().count().min(candidate.chars().count()) < Self::MIN_LEN {
            return false;
        }
        query.contains(&candidate) || candidate.contains(&query)
    }
}

/// Every significant word of the candidate appears in the query.
///
/// Looser than substring matching; not part of the default tiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordSetMatch;

impl KeywordSetMatch {
    fn words(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
            .collect()
    }
}

impl MatchStrategy for KeywordSetMatch {
    fn name(&self) -> &'static str {
        "keyword-set"
    }

    fn matches(&self, query: &str, candidate: &str) -> bool {
        let wanted = Self::words(candidate);
        if wanted.is_empty() {
            return false;
        }
        let have = Self::words(query);
        wanted.iter().all(|w| have.contains(w))
    }
}

/// What kind of thing a reference resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Location,
    Npc,
    Item,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Location => "location",
            EntityKind::Npc => "npc",
            EntityKind::Item => "item",
        }
    }
}

/// Who is holding a resolved item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemHolder {
    Inventory,
    Location(String),
}

/// An existing entity a reference resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Location { id: String, name: String },
    Npc { id: String, name: String },
    Item { name: String, holder: ItemHolder },
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Location { .. } => EntityKind::Location,
            EntityRef::Npc { .. } => EntityKind::Npc,
            EntityRef::Item { .. } => EntityKind::Item,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EntityRef::Location { name, .. }
            | EntityRef::Npc { name, .. }
            | EntityRef::Item { name, .. } => name,
        }
    }
}

/// Outcome of resolving a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(EntityRef),
    /// Nothing in the world answers to this name.
    Miss { requested_name: String },
}

impl Resolution {
    pub fn is_miss(&self) -> bool {
        matches!(self, Resolution::Miss { .. })
    }

    pub fn found(&self) -> Option<&EntityRef> {
        match self {
            Resolution::Found(entity) => Some(entity),
            Resolution::Miss { .. } => None,
        }
    }
}

/// Matches free-text references against the world.
pub struct EntityResolver {
    tiers: Vec<Box<dyn MatchStrategy>>,
}

impl Default for EntityResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityResolver {
    /// Exact match first, then substring containment.
    pub fn new() -> Self {
        Self {
            tiers: vec![Box::new(ExactMatch), Box::new(SubstringMatch)],
        }
    }

    /// Use a custom list of strategies, tried in order.
    pub fn with_tiers(tiers: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { tiers }
    }

    /// Names of the active strategies, in order.
    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Resolve a reference against every kind of entity.
    pub fn resolve(&self, name: &str, state: &WorldState) -> Resolution {
        self.resolve_among(
            name,
            state,
            &[EntityKind::Location, EntityKind::Npc, EntityKind::Item],
        )
    }

    /// Resolve a reference, considering only the given kinds.
    pub fn resolve_among(&self, name: &str, state: &WorldState, kinds: &[EntityKind]) -> Resolution {
        let candidates = candidates(state, kinds);

        for tier in &self.tiers {
            if let Some(found) = candidates
                .iter()
                .find(|(label, _)| tier.matches(name, label))
            {
                tracing::debug!(query = name, matched = found.0, tier = tier.name(), "resolved reference");
                return Resolution::Found(found.1.clone());
            }
        }

        Resolution::Miss {
            requested_name: name.trim().to_string(),
        }
    }

    /// Index of the first candidate label list that matches, tier by tier.
    ///
    /// Each element of `labels` is the set of strings one candidate answers
    /// to (its name plus keywords). Used by the shadow queue.
    pub fn first_match<S: AsRef<str>>(&self, query: &str, labels: &[Vec<S>]) -> Option<usize> {
        self.tiers.iter().find_map(|tier| {
            labels
                .iter()
                .position(|set| set.iter().any(|label| tier.matches(query, label.as_ref())))
        })
    }
}

/// Rewrite vague movement words into the generic placeholder.
///
/// "outside", "the door", "exit" never name a real place; the resolver gets
/// [`SURROUNDING_AREA`] instead. Anything else comes back trimmed.
pub fn normalize_target(raw: &str) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase();
    let bare = lowered.strip_prefix("the ").unwrap_or(&lowered).trim();

    if bare.is_empty() || VAGUE_MOVEMENT_WORDS.contains(&bare) {
        SURROUNDING_AREA.to_string()
    } else {
        trimmed.to_string()
    }
}

fn candidates(state: &WorldState, kinds: &[EntityKind]) -> Vec<(String, EntityRef)> {
    let mut out = Vec::new();

    if kinds.contains(&EntityKind::Location) {
        for (id, loc) in &state.locations {
            out.push((
                loc.name.clone(),
                EntityRef::Location {
                    id: id.clone(),
                    name: loc.name.clone(),
                },
            ));
        }
    }

    if kinds.contains(&EntityKind::Npc) {
        for (id, npc) in &state.npcs {
            out.push((
                npc.name.clone(),
                EntityRef::Npc {
                    id: id.clone(),
                    name: npc.name.clone(),
                },
            ));
        }
    }

    if kinds.contains(&EntityKind::Item) {
        for item in &state.player.inventory {
            out.push((
                item.name.clone(),
                EntityRef::Item {
                    name: item.name.clone(),
                    holder: ItemHolder::Inventory,
                },
            ));
        }
        // Items in the current room before items elsewhere.
        let mut locations: Vec<_> = state.locations.iter().collect();
        locations.sort_by_key(|(id, _)| **id != state.current_location_id);
        for (id, loc) in locations {
            for item in &loc.items {
                out.push((
                    item.name.clone(),
                    EntityRef::Item {
                        name: item.name.clone(),
                        holder: ItemHolder::Location(id.clone()),
                    },
                ));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Item, ItemOrigin, Location, Npc, START_LOCATION_ID};

    fn world() -> WorldState {
        let mut state = WorldState::genesis();
        state
            .locations
            .insert("loc_docks".to_string(), Location::new("The Docks", "Salt and tar."));
        state.npcs.insert(
            "stranger".to_string(),
            Npc::new("Hooded Stranger", START_LOCATION_ID),
        );
        state
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let state = world();
        let resolution = EntityResolver::new().resolve("the docks", &state);
        assert_eq!(
            resolution,
            Resolution::Found(EntityRef::Location {
                id: "loc_docks".to_string(),
                name: "The Docks".to_string(),
            })
        );
    }

    #[test]
    fn test_substring_match_both_directions() {
        let state = world();
        let resolver = EntityResolver::new();

        let found = resolver.resolve("stranger", &state);
        assert_eq!(found.found().map(|e| e.name()), Some("Hooded Stranger"));

        let found = resolver.resolve("walk over to the docks by the water", &state);
        assert_eq!(found.found().map(|e| e.kind()), Some(EntityKind::Location));
    }

    #[test]
    fn test_exact_tier_beats_substring_tier() {
        let mut state = world();
        state
            .locations
            .insert("loc_docks_east".to_string(), Location::new("The Docks East", ""));
        let found = EntityResolver::new().resolve("The Docks", &state);
        assert!(matches!(found, Resolution::Found(EntityRef::Location { ref id, .. }) if id == "loc_docks"));
    }

    #[test]
    fn test_miss_carries_requested_name() {
        let state = world();
        let resolution = EntityResolver::new().resolve("  the old lighthouse ", &state);
        assert_eq!(
            resolution,
            Resolution::Miss {
                requested_name: "the old lighthouse".to_string()
            }
        );
        assert!(EntityResolver::new().resolve("", &state).is_miss());
    }

    #[test]
    fn test_items_resolve_with_holder() {
        let mut state = world();
        state
            .locations
            .get_mut("loc_docks")
            .unwrap()
            .items
            .push(Item::new("Fishing Net", ItemOrigin::Ground));

        let resolver = EntityResolver::new();
        let torch = resolver.resolve("torch", &state);
        assert_eq!(
            torch.found(),
            Some(&EntityRef::Item {
                name: "Torch".to_string(),
                holder: ItemHolder::Inventory
            })
        );

        let net = resolver.resolve("net", &state);
        assert_eq!(
            net.found(),
            Some(&EntityRef::Item {
                name: "Fishing Net".to_string(),
                holder: ItemHolder::Location("loc_docks".to_string())
            })
        );
    }

    #[test]
    fn test_resolve_among_filters_kinds() {
        let state = world();
        let resolution =
            EntityResolver::new().resolve_among("stranger", &state, &[EntityKind::Location]);
        assert!(resolution.is_miss());
    }

    #[test]
    fn test_custom_tiers() {
        let state = world();
        let exact_only = EntityResolver::with_tiers(vec![Box::new(ExactMatch)]);
        assert!(exact_only.resolve("stranger", &state).is_miss());
        assert_eq!(exact_only.tier_names(), vec!["exact"]);
    }

    #[test]
    fn test_keyword_set_match() {
        let strategy = KeywordSetMatch;
        assert!(strategy.matches("I head for the lighthouse, the old one", "The Old Lighthouse"));
        assert!(!strategy.matches("the lighthouse", "The Old Lighthouse"));
        assert!(!strategy.matches("anything", "the"));
    }

    #[test]
    fn test_first_match_prefers_earlier_tier() {
        let resolver = EntityResolver::new();
        let labels = vec![
            vec!["Rusty Blade".to_string(), "sword".to_string()],
            vec!["Sword".to_string()],
        ];
        assert_eq!(resolver.first_match("sword", &labels), Some(0));
        assert_eq!(resolver.first_match("blade", &labels), Some(0));
        assert_eq!(resolver.first_match("shield", &labels), None);
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("outside"), SURROUNDING_AREA);
        assert_eq!(normalize_target("The Door."), SURROUNDING_AREA);
        assert_eq!(normalize_target("  "), SURROUNDING_AREA);
        assert_eq!(normalize_target(" the old lighthouse "), "the old lighthouse");
        assert_eq!(normalize_target("outside the walls"), "outside the walls");
    }
}

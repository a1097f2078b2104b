//! The turn pipeline.
//!
//! A turn runs five stages in a fixed order:
//!
//! 1. **Resolve**: the cartographer decides whether the action is movement
//!    or names something. Anything missing from the world is forged and
//!    placed, and the state is saved.
//! 2. **Delta**: the archivist works out the mechanical outcome.
//! 3. **Reconcile**: the delta and the director's story patch are merged,
//!    and the state is saved.
//! 4. **Narrate**: the narrator writes what the player sees.
//! 5. **Sync**: the scribe folds entities and lore introduced by the prose
//!    back into the world, and the state is saved.
//!
//! Every collaborator call has a fallback, so a turn always produces a
//! narrative. Save failures are logged and flagged on the outcome; the
//! in-memory state stays authoritative.

use crate::agents::{archivist, cartographer, director, dreamer, narrator, scribe, Generator};
use crate::agents::cartographer::MapUpdate;
use crate::delta::{Delta, DeltaOp, Discoveries, StoryPatch};
use crate::forge::{link_location, shadow_entries, EntityForge, ForgeOutcome, NewEntity};
use crate::reconcile::{self, ReconcileReport};
use crate::resolver::{normalize_target, EntityKind, EntityResolver, EntityRef, Resolution};
use crate::shadow::ShadowQueue;
use crate::speech::{self, Synthesizer, Voice};
use crate::state::{Item, ItemOrigin, WorldState, DEFAULT_GENRE};
use crate::store::StateStore;
use serde::Serialize;
use std::sync::Arc;

/// Most entities the dreamer is asked for in one go.
const DREAM_BATCH: usize = 3;

/// Configuration for a [`TurnPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model to use for every agent.
    pub model: Option<String>,

    /// Maximum tokens per agent reply.
    pub max_tokens: usize,

    /// Temperature for prose. Structured agents always run at zero.
    pub temperature: Option<f32>,

    /// Genre assumed until the story establishes one.
    pub default_genre: String,

    /// Give newly entered, empty locations an item and an inhabitant.
    pub populate_new_locations: bool,

    /// Pre-generate entities into the shadow queue after each turn.
    pub dream_ahead: bool,

    /// Recent journal entries shown to the archivist.
    pub journal_context: usize,

    /// Capacity of the shadow queue.
    pub shadow_queue_limit: usize,

    /// Voice used when a synthesizer is attached.
    pub voice: Voice,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            temperature: Some(0.8),
            default_genre: DEFAULT_GENRE.to_string(),
            populate_new_locations: true,
            dream_ahead: false,
            journal_context: 5,
            shadow_queue_limit: 5,
            voice: Voice::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the prose temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_default_genre(mut self, genre: impl Into<String>) -> Self {
        self.default_genre = genre.into();
        self
    }

    pub fn with_population(mut self, enabled: bool) -> Self {
        self.populate_new_locations = enabled;
        self
    }

    pub fn with_dreaming(mut self, enabled: bool) -> Self {
        self.dream_ahead = enabled;
        self
    }

    pub fn with_journal_context(mut self, entries: usize) -> Self {
        self.journal_context = entries;
        self
    }

    pub fn with_shadow_queue_limit(mut self, limit: usize) -> Self {
        self.shadow_queue_limit = limit;
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = voice;
        self
    }
}

/// Everything that happened during a turn, for debugging views.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnLog {
    pub action: String,
    pub map: Option<MapUpdate>,
    pub forged: Vec<NewEntity>,
    pub delta: Option<Delta>,
    pub reconcile: ReconcileReport,
    pub story: Option<StoryPatch>,
    pub discoveries: Option<Discoveries>,
    /// Stages that fell back to their default, with the reason.
    pub fallbacks: Vec<String>,
    /// Checkpoints whose save failed.
    pub persist_errors: Vec<String>,
    pub notes: Vec<String>,
}

impl TurnLog {
    fn fallback(&mut self, stage: &str, reason: impl std::fmt::Display) {
        tracing::warn!(stage, reason = %reason, "stage fell back to default");
        self.fallbacks.push(format!("{stage}: {reason}"));
    }
}

/// The result of a turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text for the player: travel lines followed by the narration.
    pub narrative: String,
    /// The world after the turn.
    pub state: WorldState,
    pub log: TurnLog,
    /// The last save of the turn failed; a restart would lose progress.
    pub unsaved: bool,
    /// Narration audio, when a synthesizer is attached and succeeded.
    pub audio: Option<Vec<u8>>,
}

/// Runs turns against a generator and a store.
pub struct TurnPipeline {
    generator: Arc<dyn Generator>,
    store: Arc<dyn StateStore>,
    forge: EntityForge,
    config: PipelineConfig,
    shadow: Option<ShadowQueue>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
}

impl TurnPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        store: Arc<dyn StateStore>,
        config: PipelineConfig,
    ) -> Self {
        let forge =
            EntityForge::new(generator.clone()).with_default_genre(config.default_genre.clone());
        let shadow = config
            .dream_ahead
            .then(|| ShadowQueue::new(config.shadow_queue_limit));
        Self {
            generator,
            store,
            forge,
            config,
            shadow,
            synthesizer: None,
        }
    }

    /// Use a pre-filled shadow queue.
    pub fn with_shadow_queue(mut self, queue: ShadowQueue) -> Self {
        self.shadow = Some(queue);
        self
    }

    /// Attach a speech synthesizer.
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Replace the matching strategies used for resolution and the shadow queue.
    pub fn with_matcher(mut self, matcher: EntityResolver) -> Self {
        self.forge = self.forge.with_matcher(matcher);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn shadow_queue(&self) -> Option<&ShadowQueue> {
        self.shadow.as_ref()
    }

    /// Run one turn. Never fails: every stage has a fallback.
    pub async fn run_turn(&mut self, mut state: WorldState, action: &str) -> TurnOutcome {
        let action = action.trim();
        let mut log = TurnLog {
            action: action.to_string(),
            ..Default::default()
        };
        let mut preamble: Vec<String> = Vec::new();

        tracing::info!(action, location = %state.current_location_id, "turn started");

        // 1. Resolve
        let map = match cartographer::detect(self.generator.as_ref(), &state, action).await {
            Ok(map) => map,
            Err(e) => {
                log.fallback("cartographer", e);
                MapUpdate::stationary()
            }
        };

        let touched = match (map.is_movement, &map.destination_name, &map.target_name) {
            (true, Some(destination), _) => {
                self.travel(&mut state, destination, &map, &mut preamble, &mut log)
                    .await
            }
            (_, _, Some(target)) => self.bring_into_scene(&mut state, target, &mut log).await,
            _ => false,
        };
        log.map = Some(map);
        if touched {
            self.persist(&state, "resolve", &mut log).await;
        }

        // 2. Delta
        let delta = match archivist::compute_delta(
            self.generator.as_ref(),
            &state,
            action,
            self.config.journal_context,
        )
        .await
        {
            Ok(delta) => delta,
            Err(e) => {
                log.fallback("archivist", e);
                archivist::fallback()
            }
        };

        // 3. Reconcile
        log.reconcile = reconcile::apply(&mut state, &delta);
        let outcome = delta.describe();
        log.delta = Some(delta);

        match director::direct(self.generator.as_ref(), &state, action, &outcome).await {
            Ok(patch) => {
                let report = reconcile::apply(
                    &mut state,
                    &Delta::from_ops(vec![DeltaOp::Story(patch.clone())]),
                );
                merge_report(&mut log.reconcile, report);
                log.story = Some(patch);
            }
            Err(e) => log.fallback("director", e),
        }
        let mut saved = self.persist(&state, "reconcile", &mut log).await;

        // 4. Narrate
        let story = match narrator::narrate(
            self.generator.as_ref(),
            &state,
            action,
            &outcome,
            &preamble.join("\n\n"),
        )
        .await
        {
            Ok(story) => Some(story),
            Err(e) => {
                log.fallback("narrator", e);
                None
            }
        };

        // 5. Sync
        if let Some(story) = &story {
            match scribe::scan(self.generator.as_ref(), &state, story).await {
                Ok(found) if found.is_empty() => {}
                Ok(found) => {
                    let report = reconcile::apply(
                        &mut state,
                        &Delta::from_ops(vec![DeltaOp::Discoveries(found.clone())]),
                    );
                    merge_report(&mut log.reconcile, report);
                    log.discoveries = Some(found);
                    saved = self.persist(&state, "sync", &mut log).await;
                }
                Err(e) => log.fallback("scribe", e),
            }
        }

        preamble.push(story.unwrap_or_else(|| narrator::FALLBACK.to_string()));
        let narrative = preamble.join("\n\n");

        if self.config.dream_ahead {
            self.dream(&state, &mut log).await;
        }

        let audio = match &self.synthesizer {
            Some(synthesizer) => {
                speech::speak(synthesizer.as_ref(), &narrative, self.config.voice).await
            }
            None => None,
        };

        let unsaved = !saved;
        if unsaved {
            tracing::error!(store = %self.store.describe(), "turn finished with unsaved progress");
        }
        tracing::info!(
            location = %state.current_location_id,
            hp = state.player.hp,
            tension = state.story_state.global_tension,
            "turn finished"
        );

        TurnOutcome {
            narrative,
            state,
            log,
            unsaved,
            audio,
        }
    }

    /// Move towards `destination`, forging it if it does not exist.
    async fn travel(
        &mut self,
        state: &mut WorldState,
        destination: &str,
        map: &MapUpdate,
        preamble: &mut Vec<String>,
        log: &mut TurnLog,
    ) -> bool {
        let target = normalize_target(destination);
        let origin_id = state.current_location_id.clone();
        let origin_name = state.current_location_name().to_string();

        let arrived = match self.resolve_location(state, &target) {
            Some(id) if id == origin_id => {
                log.notes.push(format!("already at {origin_name}"));
                return false;
            }
            Some(id) => {
                state.current_location_id = id.clone();
                id
            }
            None => {
                let outcome = self
                    .forge
                    .forge_kind(
                        &target,
                        &origin_id,
                        state,
                        self.shadow.as_mut(),
                        Some(EntityKind::Location),
                    )
                    .await;
                match outcome {
                    ForgeOutcome::Forged {
                        entity: NewEntity::Location { id, location },
                        ..
                    } => {
                        log.forged.push(NewEntity::Location {
                            id: id.clone(),
                            location: location.clone(),
                        });
                        link_location(state, &origin_id, &id, location, true);
                        id
                    }
                    ForgeOutcome::Forged { entity, .. } => {
                        // Asked for a place, got something else: keep it here.
                        log.notes.push(format!(
                            "'{target}' turned out to be a {}, not a place",
                            entity.kind().name()
                        ));
                        log.forged.push(entity.clone());
                        place(state, entity, &origin_id);
                        return true;
                    }
                    ForgeOutcome::Failed { reason, .. } => {
                        log.notes.push(format!("could not reach '{target}': {reason}"));
                        return false;
                    }
                }
            }
        };

        let arrived_name = state.current_location_name().to_string();
        tracing::info!(from = %origin_id, to = %arrived, "player moved");
        preamble.push(format!("**Travel:** You head towards {arrived_name}..."));

        if map.is_journey() {
            let route = map
                .travel_description
                .clone()
                .unwrap_or_else(|| format!("the road from {origin_name} to {arrived_name}"));
            let event = match cartographer::travel_event(self.generator.as_ref(), &route).await {
                Ok(event) => event,
                Err(e) => {
                    log.fallback("travel event", e);
                    cartographer::QUIET_JOURNEY.to_string()
                }
            };
            preamble.push(format!("**Event:** {event}"));
        }

        if self.config.populate_new_locations {
            self.populate(state, &arrived, log).await;
        }
        true
    }

    /// Give an empty location an item on the ground and an inhabitant.
    async fn populate(&mut self, state: &mut WorldState, location_id: &str, log: &mut TurnLog) {
        let Some(location) = state.locations.get(location_id) else {
            return;
        };
        let name = location.name.clone();
        let needs_item = location.items.is_empty();
        let needs_npc = state.npcs_at(location_id).next().is_none();

        if needs_item {
            let target = format!("Common items found in {name}");
            let outcome = self
                .forge
                .forge_kind(&target, location_id, state, None, Some(EntityKind::Item))
                .await;
            if let ForgeOutcome::Forged {
                entity: NewEntity::Item { item },
                ..
            } = outcome
            {
                let item = Item::new(item.name, ItemOrigin::Scenery);
                log.forged.push(NewEntity::Item { item: item.clone() });
                if let Some(location) = state.locations.get_mut(location_id) {
                    location.items.push(item);
                }
            }
        }

        if needs_npc {
            let target = format!("A typical inhabitant of {name}");
            let outcome = self
                .forge
                .forge_kind(&target, location_id, state, None, Some(EntityKind::Npc))
                .await;
            if let ForgeOutcome::Forged {
                entity: entity @ NewEntity::Npc { .. },
                ..
            } = outcome
            {
                log.forged.push(entity.clone());
                place(state, entity, location_id);
            }
        }
    }

    /// Make sure a non-movement target exists, forging it if needed.
    async fn bring_into_scene(
        &mut self,
        state: &mut WorldState,
        target: &str,
        log: &mut TurnLog,
    ) -> bool {
        let target = target.trim();
        if target.is_empty() {
            return false;
        }

        if let Resolution::Found(found) = self.forge.matcher().resolve(target, state) {
            tracing::debug!(query = target, entity = found.name(), "target resolved");
            return false;
        }

        let here = state.current_location_id.clone();
        match self
            .forge
            .forge(target, &here, state, self.shadow.as_mut())
            .await
        {
            ForgeOutcome::Forged { entity, .. } => {
                log.forged.push(entity.clone());
                place(state, entity, &here);
                true
            }
            ForgeOutcome::Failed { reason, .. } => {
                log.notes.push(format!("nothing answers to '{target}' yet: {reason}"));
                false
            }
        }
    }

    fn resolve_location(&self, state: &WorldState, target: &str) -> Option<String> {
        match self
            .forge
            .matcher()
            .resolve_among(target, state, &[EntityKind::Location])
        {
            Resolution::Found(EntityRef::Location { id, .. }) => Some(id),
            _ => None,
        }
    }

    /// Top up the shadow queue.
    async fn dream(&mut self, state: &WorldState, log: &mut TurnLog) {
        let Some(queue) = self.shadow.as_mut() else {
            return;
        };
        let wanted = queue.room().min(DREAM_BATCH);
        if wanted == 0 {
            return;
        }

        match dreamer::dream(self.generator.as_ref(), state, wanted).await {
            Ok(replies) => {
                let entries = shadow_entries(&replies, &state.current_location_id, state);
                let mut queued = 0;
                for entry in entries {
                    if queue.push(entry) {
                        queued += 1;
                    }
                }
                tracing::debug!(queued, size = queue.len(), "shadow queue topped up");
            }
            Err(e) => log.fallback("dreamer", e),
        }
    }

    /// Save the state. Returns `false` (after logging) if the save failed.
    async fn persist(&self, state: &WorldState, checkpoint: &str, log: &mut TurnLog) -> bool {
        match self.store.save(state).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    checkpoint,
                    store = %self.store.describe(),
                    error = %e,
                    "failed to persist world state; progress is only in memory"
                );
                log.persist_errors.push(format!("{checkpoint}: {e}"));
                false
            }
        }
    }
}

/// Put a forged entity into the world at `location_id` without moving the player.
fn place(state: &mut WorldState, entity: NewEntity, location_id: &str) {
    match entity {
        NewEntity::Location { id, location } => {
            link_location(state, location_id, &id, location, false)
        }
        NewEntity::Npc { id, mut npc } => {
            if !state.locations.contains_key(&npc.location_id) {
                npc.location_id = location_id.to_string();
            }
            state.npcs.entry(id).or_insert(npc);
        }
        NewEntity::Item { item } => {
            if let Some(location) = state.locations.get_mut(location_id) {
                location.items.push(item);
            }
        }
    }
}

fn merge_report(into: &mut ReconcileReport, report: ReconcileReport) {
    into.changes.extend(report.changes);
    into.skipped.extend(report.skipped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Agent;
    use crate::state::START_LOCATION_ID;
    use crate::store::MemoryStore;
    use crate::testing::ScriptedGenerator;
    use serde_json::json;

    fn pipeline(generator: &Arc<ScriptedGenerator>, config: PipelineConfig) -> TurnPipeline {
        TurnPipeline::new(generator.clone(), Arc::new(MemoryStore::new()), config)
    }

    #[tokio::test]
    async fn test_silent_generator_still_narrates() {
        let generator = Arc::new(ScriptedGenerator::new());
        let mut pipeline = pipeline(&generator, PipelineConfig::new());

        let outcome = pipeline.run_turn(WorldState::genesis(), "I wait").await;

        assert_eq!(outcome.narrative, narrator::FALLBACK);
        assert_eq!(outcome.state, WorldState::genesis());
        assert!(!outcome.unsaved);
        let stages: Vec<&str> = outcome
            .log
            .fallbacks
            .iter()
            .map(|f| f.split(':').next().unwrap_or_default())
            .collect();
        assert_eq!(stages, vec!["cartographer", "archivist", "director", "narrator"]);
        assert_eq!(generator.calls(Agent::Scribe), 0);
    }

    #[tokio::test]
    async fn test_journey_gets_travel_event_and_population() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.reply(
            Agent::Cartographer,
            json!({"is_movement": true, "destination_name": "Port Vell", "travel_type": "journey"}).to_string(),
        );
        generator.reply(Agent::Cartographer, "A gull steals your bread.");
        generator.reply(
            Agent::Creator,
            json!({"type": "location", "id": "loc_port", "data": {"name": "Port Vell", "description": "Salt and tar."}})
                .to_string(),
        );
        generator.reply(Agent::Creator, json!({"type": "item", "item_name": "Coil of Rope"}).to_string());
        generator.reply(
            Agent::Creator,
            json!({"type": "npc", "id": "npc_dockhand", "data": {"name": "Dockhand"}}).to_string(),
        );
        generator.reply(Agent::Narrator, "Ships creak at anchor. What do you do?");

        let mut pipeline = pipeline(&generator, PipelineConfig::new());
        let outcome = pipeline.run_turn(WorldState::genesis(), "I ride to Port Vell").await;

        let state = &outcome.state;
        assert_eq!(state.current_location_id, "loc_port");
        assert_eq!(state.locations["loc_port"].items[0].name, "Coil of Rope");
        assert_eq!(state.locations["loc_port"].items[0].description, "Part of the scene.");
        assert_eq!(state.npcs["npc_dockhand"].location_id, "loc_port");
        assert!(outcome.narrative.starts_with("**Travel:** You head towards Port Vell..."));
        assert!(outcome.narrative.contains("**Event:** A gull steals your bread."));
        assert!(outcome.narrative.ends_with("What do you do?"));
    }

    #[tokio::test]
    async fn test_journey_event_falls_back() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.reply(
            Agent::Cartographer,
            json!({"is_movement": true, "destination_name": "Port Vell", "travel_type": "journey"}).to_string(),
        );
        generator.reply(
            Agent::Creator,
            json!({"type": "location", "data": {"name": "Port Vell"}}).to_string(),
        );

        let config = PipelineConfig::new().with_population(false);
        let mut pipeline = pipeline(&generator, config);
        let outcome = pipeline.run_turn(WorldState::genesis(), "I ride to Port Vell").await;

        assert!(outcome
            .narrative
            .contains(&format!("**Event:** {}", cartographer::QUIET_JOURNEY)));
        assert_eq!(generator.calls(Agent::Creator), 1);
    }

    #[tokio::test]
    async fn test_moving_to_known_place_forges_nothing() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.reply(
            Agent::Cartographer,
            json!({"is_movement": true, "destination_name": "rusty tankard"}).to_string(),
        );

        let mut state = WorldState::genesis();
        link_location(
            &mut state,
            START_LOCATION_ID,
            "loc_yard",
            crate::state::Location::new("The Yard", ""),
            true,
        );

        let mut pipeline = pipeline(&generator, PipelineConfig::new());
        let outcome = pipeline.run_turn(state, "back inside").await;

        assert_eq!(outcome.state.current_location_id, START_LOCATION_ID);
        assert_eq!(generator.calls(Agent::Creator), 0);
        assert!(outcome.narrative.contains("You head towards The Rusty Tankard"));
    }

    #[tokio::test]
    async fn test_named_npc_is_forged_into_scene() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.reply(
            Agent::Cartographer,
            json!({"is_movement": false, "target_name": "the bard"}).to_string(),
        );
        generator.reply(
            Agent::Creator,
            json!({"type": "npc", "id": "npc_bard", "data": {"name": "Lute-Playing Bard", "attitude": "friendly"}})
                .to_string(),
        );

        let mut pipeline = pipeline(&generator, PipelineConfig::new());
        let outcome = pipeline.run_turn(WorldState::genesis(), "I talk to the bard").await;

        let bard = &outcome.state.npcs["npc_bard"];
        assert_eq!(bard.location_id, START_LOCATION_ID);
        assert_eq!(bard.attitude, crate::state::Attitude::Friendly);
        assert_eq!(outcome.log.forged.len(), 1);
    }

    #[tokio::test]
    async fn test_known_target_forges_nothing() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.reply(
            Agent::Cartographer,
            json!({"is_movement": false, "target_name": "barkeep"}).to_string(),
        );

        let mut pipeline = pipeline(&generator, PipelineConfig::new());
        pipeline.run_turn(WorldState::genesis(), "I wave at the barkeep").await;

        assert_eq!(generator.calls(Agent::Creator), 0);
    }

    #[tokio::test]
    async fn test_dreaming_fills_queue() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.reply(
            Agent::Dreamer,
            json!([
                {"type": "npc", "keywords": ["guard"], "data": {"name": "Nervous Guard"}},
                {"type": "item", "item_name": "Rusty Blade", "keywords": ["sword"]}
            ])
            .to_string(),
        );

        let config = PipelineConfig::new().with_dreaming(true).with_shadow_queue_limit(2);
        let mut pipeline = pipeline(&generator, config);
        pipeline.run_turn(WorldState::genesis(), "I listen").await;
        assert_eq!(pipeline.shadow_queue().map(ShadowQueue::len), Some(2));

        // Full queue: no further dreaming.
        pipeline.run_turn(WorldState::genesis(), "I listen").await;
        assert_eq!(generator.calls(Agent::Dreamer), 1);
    }

    #[tokio::test]
    async fn test_matcher_can_be_swapped() {
        use crate::resolver::ExactMatch;

        let generator = Arc::new(ScriptedGenerator::new());
        for _ in 0..2 {
            generator.reply(
                Agent::Cartographer,
                json!({"is_movement": false, "target_name": "the barkeep"}).to_string(),
            );
        }

        // Default tiers: "the barkeep" finds Barkeep by containment.
        let mut loose = pipeline(&generator, PipelineConfig::new());
        loose.run_turn(WorldState::genesis(), "I nod to the barkeep").await;
        assert_eq!(generator.calls(Agent::Creator), 0);

        // Exact matching only: the same words miss and a forge is attempted.
        let mut strict = pipeline(&generator, PipelineConfig::new())
            .with_matcher(EntityResolver::with_tiers(vec![Box::new(ExactMatch)]));
        let outcome = strict.run_turn(WorldState::genesis(), "I nod to the barkeep").await;
        assert_eq!(generator.calls(Agent::Creator), 1);
        assert!(outcome
            .log
            .notes
            .iter()
            .any(|n| n.starts_with("nothing answers to 'the barkeep'")));
    }

    #[derive(Default)]
    struct RecordingSynthesizer {
        voices: std::sync::Mutex<Vec<Voice>>,
    }

    #[async_trait::async_trait]
    impl Synthesizer for RecordingSynthesizer {
        async fn synthesize(
            &self,
            text: &str,
            voice: Voice,
        ) -> Result<Vec<u8>, crate::speech::SpeechError> {
            self.voices
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(voice);
            Ok(text.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn test_narration_spoken_in_configured_voice() {
        let generator = Arc::new(ScriptedGenerator::new());
        let synthesizer = Arc::new(RecordingSynthesizer::default());

        let mut pipeline = pipeline(&generator, PipelineConfig::new().with_voice(Voice::Kore))
            .with_synthesizer(synthesizer.clone());
        let outcome = pipeline.run_turn(WorldState::genesis(), "I wait").await;

        assert_eq!(outcome.audio, Some(narrator::FALLBACK.as_bytes().to_vec()));
        assert_eq!(*synthesizer.voices.lock().unwrap(), vec![Voice::Kore]);
    }
}

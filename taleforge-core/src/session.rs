//! Session - the primary public API for play.
//!
//! A session owns the pipeline and the store and keeps the last known world.
//! Every turn starts from the stored document, so edits made to the save
//! file between turns are picked up. When the last save failed, the
//! in-memory copy is used instead so no progress is dropped.

use crate::agents::{ClaudeGenerator, Generator};
use crate::pipeline::{PipelineConfig, TurnLog, TurnOutcome, TurnPipeline};
use crate::state::WorldState;
use crate::store::{JsonFileStore, PersistError, StateStore};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Default save file name.
pub const DEFAULT_SAVE_PATH: &str = "world_state.json";

/// Errors from session setup and explicit saves.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Client error: {0}")]
    Client(#[from] claude::Error),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Configuration for creating a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Where the world-state document lives.
    pub save_path: PathBuf,

    /// Pipeline and model settings.
    pub pipeline: PipelineConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from(DEFAULT_SAVE_PATH),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(save_path: impl Into<PathBuf>) -> Self {
        Self {
            save_path: save_path.into(),
            ..Default::default()
        }
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// A snapshot of the player's situation, for status lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub location: String,
    pub hp: i32,
    pub max_hp: i32,
    /// HP ratio clamped to [0.0, 1.0].
    pub health: f32,
    pub act: i32,
    pub tension: i32,
    pub objective: String,
    pub inventory: Vec<String>,
    pub journal_entries: usize,
    pub turns: usize,
    pub unsaved: bool,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Location: {}", self.location)?;
        writeln!(
            f,
            "HP: {}/{} ({:.0}%)",
            self.hp,
            self.max_hp,
            self.health * 100.0
        )?;
        writeln!(f, "Act {} | Tension {}/10", self.act, self.tension)?;
        writeln!(f, "Objective: {}", self.objective)?;
        if self.inventory.is_empty() {
            writeln!(f, "Inventory: (empty)")?;
        } else {
            writeln!(f, "Inventory: {}", self.inventory.join(", "))?;
        }
        write!(f, "Journal: {} entries | Turns: {}", self.journal_entries, self.turns)?;
        if self.unsaved {
            write!(f, "\nWARNING: progress is not saved")?;
        }
        Ok(())
    }
}

/// A game session.
pub struct Session {
    pipeline: TurnPipeline,
    store: Arc<dyn StateStore>,
    state: WorldState,
    unsaved: bool,
    turns: usize,
    last_log: Option<TurnLog>,
}

impl Session {
    /// Create a session backed by Claude and a JSON save file.
    ///
    /// Requires `ANTHROPIC_API_KEY` environment variable to be set.
    pub async fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let mut generator =
            ClaudeGenerator::from_env()?.with_max_tokens(config.pipeline.max_tokens);
        if let Some(model) = &config.pipeline.model {
            generator = generator.with_model(model);
        }
        if let Some(temperature) = config.pipeline.temperature {
            generator = generator.with_temperature(temperature);
        }

        let store = Arc::new(JsonFileStore::new(config.save_path));
        Self::with_parts(Arc::new(generator), store, config.pipeline).await
    }

    /// Create a session from explicit collaborators.
    ///
    /// Loads the stored world, or writes the genesis world if there is none.
    pub async fn with_parts(
        generator: Arc<dyn Generator>,
        store: Arc<dyn StateStore>,
        config: PipelineConfig,
    ) -> Result<Self, SessionError> {
        let pipeline = TurnPipeline::new(generator, store.clone(), config);
        Self::with_pipeline(pipeline, store).await
    }

    /// Create a session around an already configured pipeline.
    pub async fn with_pipeline(
        pipeline: TurnPipeline,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, SessionError> {
        let (state, unsaved) = match store.load().await? {
            Some(mut state) => {
                log_repairs(&mut state);
                (state, false)
            }
            None => {
                tracing::info!(store = %store.describe(), "no saved world; starting fresh");
                let state = WorldState::genesis();
                let unsaved = match store.save(&state).await {
                    Ok(()) => false,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to save the new world");
                        true
                    }
                };
                (state, unsaved)
            }
        };

        Ok(Self {
            pipeline,
            store,
            state,
            unsaved,
            turns: 0,
            last_log: None,
        })
    }

    /// Opening text describing where the player stands.
    pub fn start(&self) -> String {
        let state = &self.state;
        let description = state
            .current_location()
            .map(|loc| loc.description.as_str())
            .unwrap_or_default();
        let mut text = format!("**{}**\n\n{description}", state.current_location_name());

        let people: Vec<&str> = state
            .npcs_at(&state.current_location_id)
            .map(|(_, npc)| npc.name.as_str())
            .collect();
        if !people.is_empty() {
            text.push_str(&format!("\n\nHere: {}", people.join(", ")));
        }
        text.push_str(&format!(
            "\n\nObjective: {}\n\nWhat do you do?",
            state.story_state.current_objective
        ));
        text
    }

    /// Run one turn.
    pub async fn turn(&mut self, action: &str) -> TurnOutcome {
        let mut state = self.load_for_turn().await;
        log_repairs(&mut state);

        let outcome = self.pipeline.run_turn(state, action).await;

        self.state = outcome.state.clone();
        self.unsaved = outcome.unsaved;
        self.turns += 1;
        self.last_log = Some(outcome.log.clone());
        outcome
    }

    async fn load_for_turn(&self) -> WorldState {
        if self.unsaved {
            tracing::warn!("last save failed; continuing from memory");
            return self.state.clone();
        }
        match self.store.load().await {
            Ok(Some(state)) => state,
            Ok(None) => self.state.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "could not reload world; continuing from memory");
                self.state.clone()
            }
        }
    }

    /// Write the current world to the store.
    pub async fn save(&mut self) -> Result<(), SessionError> {
        self.store.save(&self.state).await?;
        self.unsaved = false;
        Ok(())
    }

    pub fn status(&self) -> Status {
        let state = &self.state;
        Status {
            location: state.current_location_name().to_string(),
            hp: state.player.hp,
            max_hp: state.player.max_hp,
            health: state.player.hp_ratio(),
            act: state.story_state.current_act,
            tension: state.story_state.global_tension,
            objective: state.story_state.current_objective.clone(),
            inventory: state
                .player
                .inventory
                .iter()
                .map(|i| i.name.clone())
                .collect(),
            journal_entries: state.player.journal.len(),
            turns: self.turns,
            unsaved: self.unsaved,
        }
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Whether progress exists only in memory.
    pub fn is_unsaved(&self) -> bool {
        self.unsaved
    }

    /// Log of the most recent turn.
    pub fn last_log(&self) -> Option<&TurnLog> {
        self.last_log.as_ref()
    }

    pub fn store_location(&self) -> String {
        self.store.describe()
    }
}

fn log_repairs(state: &mut WorldState) {
    for note in state.repair() {
        tracing::warn!(repair = %note, "repaired world state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Agent;
    use crate::state::START_LOCATION_ID;
    use crate::testing::{MemoryStore, ScriptedGenerator};
    use serde_json::json;

    #[tokio::test]
    async fn test_new_session_saves_genesis() {
        let store = Arc::new(MemoryStore::new());
        let session = Session::with_parts(
            Arc::new(ScriptedGenerator::new()),
            store.clone(),
            PipelineConfig::new(),
        )
        .await
        .unwrap();

        assert_eq!(store.save_count(), 1);
        assert_eq!(session.state().current_location_id, START_LOCATION_ID);
        assert!(session.start().contains("The Rusty Tankard"));
        assert!(session.start().ends_with("What do you do?"));
    }

    #[tokio::test]
    async fn test_loaded_world_is_repaired() {
        let mut broken = WorldState::genesis();
        broken.current_location_id = "loc_lost".to_string();
        let store = Arc::new(MemoryStore::with_state(broken));

        let session = Session::with_parts(
            Arc::new(ScriptedGenerator::new()),
            store,
            PipelineConfig::new(),
        )
        .await
        .unwrap();

        assert_eq!(session.state().current_location_id, START_LOCATION_ID);
    }

    #[tokio::test]
    async fn test_turn_picks_up_external_edits() {
        let generator = Arc::new(ScriptedGenerator::new());
        let store = Arc::new(MemoryStore::new());
        let mut session = Session::with_parts(generator.clone(), store.clone(), PipelineConfig::new())
            .await
            .unwrap();

        let mut edited = WorldState::genesis();
        edited.player.hp = 3;
        store.save(&edited).await.unwrap();

        generator.reply(Agent::Archivist, json!({"player_delta": {"hp_change": 1}}).to_string());
        let outcome = session.turn("I bandage myself").await;
        assert_eq!(outcome.state.player.hp, 4);
        assert_eq!(session.status().turns, 1);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_memory_copy() {
        let generator = Arc::new(ScriptedGenerator::new());
        let store = Arc::new(MemoryStore::new());
        let mut session = Session::with_parts(generator.clone(), store.clone(), PipelineConfig::new())
            .await
            .unwrap();

        store.set_failing(true);
        generator.reply(Agent::Archivist, json!({"player_delta": {"hp_change": -5}}).to_string());
        let outcome = session.turn("I fall down the stairs").await;
        assert!(outcome.unsaved);
        assert!(session.status().to_string().contains("WARNING"));

        // The store still has the old world; the next turn must not use it.
        generator.reply(Agent::Archivist, json!({"player_delta": {"hp_change": -1}}).to_string());
        let outcome = session.turn("I limp on").await;
        assert_eq!(outcome.state.player.hp, 14);

        store.set_failing(false);
        session.save().await.unwrap();
        assert!(!session.is_unsaved());
        assert_eq!(store.snapshot().await.unwrap().player.hp, 14);
    }
}

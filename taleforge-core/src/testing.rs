//! Testing utilities.
//!
//! This module provides tools for running turns without a model:
//! - `ScriptedGenerator` returns canned replies per agent, in order
//! - `MemoryStore` keeps the document in memory and can be made to fail
//! - `TestHarness` wires both into a pipeline and tracks the world
//! - Assertion helpers for checking world state

use crate::agents::{Agent, GenerateError, Generator, Prompt};
use crate::pipeline::{PipelineConfig, TurnOutcome, TurnPipeline};
use crate::state::WorldState;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use crate::store::MemoryStore;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail(String),
}

/// A generator that returns scripted replies.
///
/// Each agent has its own queue. An agent with nothing queued fails with
/// [`GenerateError::Unavailable`], which sends the pipeline down that
/// stage's fallback.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    queues: Mutex<HashMap<Agent, VecDeque<Scripted>>>,
    prompts: Mutex<Vec<Prompt>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, agent: Agent, scripted: Scripted) -> &Self {
        lock(&self.queues).entry(agent).or_default().push_back(scripted);
        self
    }

    /// Queue a raw text reply for `agent`.
    pub fn reply(&self, agent: Agent, text: impl Into<String>) -> &Self {
        self.push(agent, Scripted::Reply(text.into()))
    }

    /// Queue a JSON reply for `agent`.
    pub fn reply_json(&self, agent: Agent, value: &Value) -> &Self {
        self.push(agent, Scripted::Reply(value.to_string()))
    }

    /// Queue a failure for `agent`.
    pub fn fail(&self, agent: Agent, reason: impl Into<String>) -> &Self {
        self.push(agent, Scripted::Fail(reason.into()))
    }

    /// Number of calls made to `agent`, failed ones included.
    pub fn calls(&self, agent: Agent) -> usize {
        lock(&self.prompts)
            .iter()
            .filter(|p| p.agent == agent)
            .count()
    }

    /// Every prompt sent to `agent`, oldest first.
    pub fn prompts(&self, agent: Agent) -> Vec<Prompt> {
        lock(&self.prompts)
            .iter()
            .filter(|p| p.agent == agent)
            .cloned()
            .collect()
    }

    /// Replies still queued for `agent`.
    pub fn remaining(&self, agent: Agent) -> usize {
        lock(&self.queues).get(&agent).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerateError> {
        lock(&self.prompts).push(prompt.clone());
        let next = lock(&self.queues)
            .get_mut(&prompt.agent)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(reason)) => Err(GenerateError::Unavailable(reason)),
            None => Err(GenerateError::Unavailable(format!(
                "no scripted reply for {}",
                prompt.agent
            ))),
        }
    }
}

/// Test harness for running scripted turns.
pub struct TestHarness {
    /// The scripted model.
    pub generator: Arc<ScriptedGenerator>,
    /// Where the pipeline saves.
    pub store: Arc<MemoryStore>,
    pub pipeline: TurnPipeline,
    /// The world as of the last turn.
    pub state: WorldState,
}

impl TestHarness {
    /// Create a harness on the genesis world.
    ///
    /// Location population is off so scripts only need the replies the test
    /// is about.
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::new().with_population(false))
    }

    /// Create a harness with a custom pipeline configuration.
    pub fn with_config(config: PipelineConfig) -> Self {
        let generator = Arc::new(ScriptedGenerator::new());
        let store = Arc::new(MemoryStore::new());
        let pipeline = TurnPipeline::new(generator.clone(), store.clone(), config);
        Self {
            generator,
            store,
            pipeline,
            state: WorldState::genesis(),
        }
    }

    /// Start from a different world.
    pub fn with_state(mut self, state: WorldState) -> Self {
        self.state = state;
        self
    }

    /// Queue a reply.
    pub fn script(&mut self, agent: Agent, reply: impl Into<String>) -> &mut Self {
        self.generator.reply(agent, reply);
        self
    }

    /// Queue a JSON reply.
    pub fn script_json(&mut self, agent: Agent, value: Value) -> &mut Self {
        self.generator.reply_json(agent, &value);
        self
    }

    /// Run a turn and keep the resulting world.
    pub async fn turn(&mut self, action: &str) -> TurnOutcome {
        let outcome = self.pipeline.run_turn(self.state.clone(), action).await;
        self.state = outcome.state.clone();
        outcome
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert player HP.
#[track_caller]
pub fn assert_hp(state: &WorldState, hp: i32) {
    assert_eq!(
        state.player.hp, hp,
        "Expected HP {hp}, got {}",
        state.player.hp
    );
}

/// Assert the player stands in the given location.
#[track_caller]
pub fn assert_at_location(state: &WorldState, location_id: &str) {
    assert_eq!(
        state.current_location_id, location_id,
        "Expected player at '{location_id}', got '{}'",
        state.current_location_id
    );
}

/// Assert a location lists an exit (case-insensitive).
#[track_caller]
pub fn assert_exit(state: &WorldState, location_id: &str, exit: &str) {
    let Some(location) = state.locations.get(location_id) else {
        panic!("Expected location '{location_id}' to exist");
    };
    assert!(
        location.has_exit(exit),
        "Expected '{location_id}' to have exit '{exit}', exits are {:?}",
        location.exits
    );
}

/// Assert no location lists itself as an exit.
#[track_caller]
pub fn assert_no_self_exits(state: &WorldState) {
    for (id, location) in &state.locations {
        assert!(
            !location.exits.iter().any(|e| location.is_self_reference(e)),
            "Location '{id}' lists itself as an exit: {:?}",
            location.exits
        );
    }
}

/// Assert the player carries an item.
#[track_caller]
pub fn assert_has_item(state: &WorldState, name: &str) {
    assert!(
        state.player.has_item(name),
        "Expected '{name}' in inventory, have {:?}",
        state
            .player
            .inventory
            .iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>()
    );
}

/// Assert the journal has exactly one entry for a topic.
#[track_caller]
pub fn assert_journal_once(state: &WorldState, topic: &str) {
    let count = state
        .player
        .journal
        .iter()
        .filter(|e| e.topic.eq_ignore_ascii_case(topic))
        .count();
    assert_eq!(count, 1, "Expected one journal entry for '{topic}', found {count}");
}

/// Assert story tension.
#[track_caller]
pub fn assert_tension(state: &WorldState, tension: i32) {
    assert_eq!(
        state.story_state.global_tension, tension,
        "Expected tension {tension}, got {}",
        state.story_state.global_tension
    );
}

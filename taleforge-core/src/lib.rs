//! World-state pipeline for AI-driven text roleplaying.
//!
//! This crate provides:
//! - A single world-state document with tolerant loading and self-repair
//! - Agents (cartographer, archivist, director, narrator, scribe, creator,
//!   dreamer) behind a pluggable [`Generator`]
//! - A reconciler that merges loosely-shaped agent deltas into the world
//! - On-demand entity forging with an optional pre-generated shadow queue
//! - A fixed five-stage turn pipeline with save checkpoints
//!
//! # Quick Start
//!
//! ```ignore
//! use taleforge_core::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = Session::new(SessionConfig::new("world_state.json")).await?;
//!
//!     println!("{}", session.start());
//!     let outcome = session.turn("I go to the old lighthouse").await;
//!     println!("{}", outcome.narrative);
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod delta;
pub mod forge;
pub mod pipeline;
pub mod reconcile;
pub mod resolver;
pub mod session;
pub mod shadow;
pub mod speech;
pub mod state;
pub mod store;
pub mod testing;
pub mod value;

// Primary public API
pub use agents::{Agent, ClaudeGenerator, GenerateError, Generator, Prompt};
pub use delta::{Delta, DeltaOp};
pub use forge::{EntityForge, ForgeOutcome, NewEntity};
pub use pipeline::{PipelineConfig, TurnLog, TurnOutcome, TurnPipeline};
pub use reconcile::{reconcile, ReconcileReport};
pub use resolver::{EntityResolver, MatchStrategy, Resolution};
pub use session::{Session, SessionConfig, SessionError, Status};
pub use shadow::{ShadowEntry, ShadowQueue};
pub use speech::{SpeechError, Synthesizer, Voice};
pub use state::WorldState;
pub use store::{JsonFileStore, MemoryStore, PersistError, StateStore};
pub use testing::{ScriptedGenerator, TestHarness};

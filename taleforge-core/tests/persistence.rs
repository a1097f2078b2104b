//! Sessions over a real save file.

use serde_json::json;
use std::sync::Arc;
use taleforge_core::state::START_LOCATION_ID;
use taleforge_core::testing::*;
use taleforge_core::{Agent, JsonFileStore, PipelineConfig, Session, StateStore};
use tempfile::TempDir;

#[tokio::test]
async fn test_legacy_save_file_loads_and_heals() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("world_state.json");

    // Bare-string items, a missing story_state, a dangling location and an
    // NPC standing nowhere.
    let legacy = json!({
        "player": {"name": "Ash", "hp": 12, "max_hp": 20, "inventory": ["Torch", "torch"], "gold": 30},
        "current_location_id": "loc_burned_down",
        "locations": {
            "loc_start": {"name": "The Rusty Tankard", "description": "Dim.", "exits": ["The Rusty Tankard", "Cellar"]}
        },
        "npcs": {
            "barkeep": {"name": "Barkeep", "location_id": "loc_gone", "status": "Alive", "attitude": "Neutral"}
        }
    });
    std::fs::write(&path, legacy.to_string()).unwrap();

    let store = Arc::new(JsonFileStore::new(&path));
    let session = Session::with_parts(
        Arc::new(ScriptedGenerator::new()),
        store,
        PipelineConfig::new(),
    )
    .await
    .expect("session should load the legacy file");

    let state = session.state();
    assert_at_location(state, START_LOCATION_ID);
    assert_eq!(state.npcs["barkeep"].location_id, START_LOCATION_ID);
    assert_no_self_exits(state);
    assert_exit(state, START_LOCATION_ID, "Cellar");
    assert_eq!(state.player.inventory.len(), 2);
    assert_eq!(state.player.inventory[1].description, "Acquired item.");
    assert_eq!(state.player.attributes["gold"], json!(30));
    assert_eq!(state.story_state.global_tension, 2);
}

#[tokio::test]
async fn test_turns_persist_to_disk() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("saves").join("tale.json");

    let generator = Arc::new(ScriptedGenerator::new());
    let store = Arc::new(JsonFileStore::new(&path));
    let mut session = Session::with_parts(generator.clone(), store.clone(), PipelineConfig::new())
        .await
        .unwrap();
    assert!(path.exists(), "genesis world should be written on start");

    generator.reply(
        Agent::Archivist,
        json!({"player_delta": {"hp_change": -4}, "world_flags": {"bell_rung": true}}).to_string(),
    );
    session.turn("I ring the bell").await;

    let reopened = JsonFileStore::new(&path)
        .load()
        .await
        .unwrap()
        .expect("world on disk");
    assert_hp(&reopened, 16);
    assert_eq!(reopened.world_flags["bell_rung"], json!(true));
    assert_eq!(&reopened, session.state());

    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, vec!["tale.json"]);
}

#[tokio::test]
async fn test_corrupt_save_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("world_state.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let result = Session::with_parts(
        Arc::new(ScriptedGenerator::new()),
        Arc::new(JsonFileStore::new(&path)),
        PipelineConfig::new(),
    )
    .await;

    assert!(result.is_err());
}

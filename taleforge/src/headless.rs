//! Line-oriented play loop.
//!
//! Free text is a player action. Lines starting with `#` are commands.
//! Output lines are tagged (`[DM]`, `[STATUS]`, `[ERROR]`, ...) so the loop
//! can be driven by scripts as well as people.

use taleforge_core::store::session_save_path;
use taleforge_core::{PipelineConfig, Session, SessionConfig, SessionError};
use std::io::{self, BufRead, Write};

/// Run the play loop on stdin/stdout until `#quit` or end of input.
pub async fn run_headless(config: SessionConfig) -> Result<(), SessionError> {
    let mut session = Session::new(config).await?;

    println!("=== Taleforge ===");
    println!("World: {}", session.store_location());
    if session.is_unsaved() {
        println!("[WARNING] The new world could not be saved.");
    }
    println!();
    print_commands();
    println!();
    println!("{}", session.start());
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            match command.split_whitespace().next() {
                Some("quit") | Some("exit") => {
                    if session.is_unsaved() {
                        println!("[WARNING] Leaving with unsaved progress.");
                    }
                    println!("Goodbye!");
                    break;
                }
                Some("save") => match session.save().await {
                    Ok(()) => println!("[SAVED] World saved to {}", session.store_location()),
                    Err(e) => println!("[ERROR] Save failed: {e}"),
                },
                Some("status") => {
                    println!("[STATUS]");
                    for row in session.status().to_string().lines() {
                        println!("  {row}");
                    }
                }
                Some("log") => match session.last_log() {
                    Some(log) => match serde_json::to_string_pretty(log) {
                        Ok(json) => println!("[LOG]\n{json}"),
                        Err(e) => println!("[ERROR] Could not render log: {e}"),
                    },
                    None => println!("[LOG] No turns yet."),
                },
                Some("help") => {
                    println!("[HELP]");
                    print_commands();
                }
                _ => {
                    println!("[ERROR] Unknown command. Type #help for help.");
                }
            }
            stdout.flush().ok();
            continue;
        }

        print!("[PROCESSING]");
        stdout.flush().ok();

        let outcome = session.turn(line).await;

        print!("\r            \r");
        stdout.flush().ok();

        println!("[DM]");
        for para in outcome.narrative.split("\n\n") {
            println!("{para}");
        }
        println!();

        for note in &outcome.log.notes {
            println!("[NOTE] {note}");
        }
        if outcome.unsaved {
            println!(
                "[WARNING] Progress is not saved; a restart now would lose it. Try #save."
            );
        }
        stdout.flush().ok();
    }

    Ok(())
}

fn print_commands() {
    println!("Commands:");
    println!("  #quit    - Exit the game");
    println!("  #save    - Save the world now");
    println!("  #status  - Show where you are and how you fare");
    println!("  #log     - Show what the agents did last turn");
    println!("  #help    - Show this help");
    println!("  (anything else is sent as your action)");
}

/// Directory for worlds started with `--session`.
const SAVES_DIR: &str = "saves";

/// Build the session configuration from command line arguments.
pub fn parse_config_from_args(args: &[String]) -> Result<SessionConfig, String> {
    let mut config = SessionConfig::default();
    let mut pipeline = PipelineConfig::default();

    // args[0] is the program name
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--save" => {
                config.save_path = value_of(args, i, "--save")?.into();
                i += 1;
            }
            "--session" => {
                config.save_path = session_save_path(SAVES_DIR, value_of(args, i, "--session")?);
                i += 1;
            }
            "--model" => {
                pipeline = pipeline.with_model(value_of(args, i, "--model")?);
                i += 1;
            }
            "--genre" => {
                pipeline = pipeline.with_default_genre(value_of(args, i, "--genre")?);
                i += 1;
            }
            "--dream" => pipeline = pipeline.with_dreaming(true),
            "--no-populate" => pipeline = pipeline.with_population(false),
            other => return Err(format!("unknown argument '{other}'")),
        }
        i += 1;
    }

    Ok(config.with_pipeline(pipeline))
}

fn value_of<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(String::as_str)
        .filter(|v| !v.starts_with("--"))
        .ok_or_else(|| format!("{flag} needs a value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("taleforge")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = parse_config_from_args(&args(&[])).unwrap();
        assert_eq!(config.save_path, PathBuf::from("world_state.json"));
        assert!(config.pipeline.populate_new_locations);
        assert!(!config.pipeline.dream_ahead);
        assert_eq!(config.pipeline.model, None);
    }

    #[test]
    fn test_all_flags() {
        let config = parse_config_from_args(&args(&[
            "--save",
            "noir.json",
            "--model",
            "claude-test",
            "--genre",
            "Noir Mystery",
            "--dream",
            "--no-populate",
        ]))
        .unwrap();

        assert_eq!(config.save_path, PathBuf::from("noir.json"));
        assert_eq!(config.pipeline.model.as_deref(), Some("claude-test"));
        assert_eq!(config.pipeline.default_genre, "Noir Mystery");
        assert!(config.pipeline.dream_ahead);
        assert!(!config.pipeline.populate_new_locations);
    }

    #[test]
    fn test_named_session_lives_under_saves() {
        let config = parse_config_from_args(&args(&["--session", "Noir Run"])).unwrap();
        assert_eq!(config.save_path, PathBuf::from("saves").join("Noir_Run.json"));
    }

    #[test]
    fn test_missing_value_is_an_error() {
        assert!(parse_config_from_args(&args(&["--save"])).is_err());
        assert!(parse_config_from_args(&args(&["--model", "--dream"])).is_err());
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        let err = parse_config_from_args(&args(&["--headless"])).unwrap_err();
        assert!(err.contains("--headless"));
    }
}

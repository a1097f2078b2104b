//! Taleforge: an AI-driven text adventure in a persistent world.
//!
//! ```bash
//! cargo run -p taleforge -- --save my_world.json --dream
//! ```

mod headless;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // Check for API key
    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export ANTHROPIC_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let config = match headless::parse_config_from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Run with --help for usage.");
            std::process::exit(2);
        }
    };

    headless::run_headless(config).await.map_err(|e| e.into())
}

/// Log to stderr, quiet unless RUST_LOG asks for more.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_help() {
    println!("Taleforge - a persistent world told by AI agents");
    println!();
    println!("USAGE:");
    println!("  taleforge [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help          Show this help message");
    println!("  --save <PATH>       World save file (default: world_state.json)");
    println!("  --session <NAME>    Use saves/<NAME>.json as the world save file");
    println!("  --model <NAME>      Model to use for every agent");
    println!("  --genre <GENRE>     Genre when the world has none (default: High Fantasy)");
    println!("  --dream             Pre-generate entities between turns");
    println!("  --no-populate       Do not furnish newly reached locations");
    println!();
    println!("ENVIRONMENT:");
    println!("  ANTHROPIC_API_KEY   Required; may be set in a .env file");
    println!("  RUST_LOG            Log filter, e.g. taleforge_core=debug (default: warn)");
    println!();
    println!("EXAMPLES:");
    println!("  taleforge                              # Play, saving to world_state.json");
    println!("  taleforge --save noir.json --genre \"Noir Mystery\"");
}

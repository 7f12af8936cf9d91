use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::{format_clock, GameState, TeamState, DEFAULT_INITIAL_SECONDS};
use storage::{Storage, GAME_DOCUMENT};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/scoreboard.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Writes a fresh game document. The server picks it up on its next start.
    Seed {
        #[arg(long, default_value = "Home")]
        team1: String,
        #[arg(long, default_value = "#ffffff")]
        color1: String,
        #[arg(long, default_value = "Away")]
        team2: String,
        #[arg(long, default_value = "#ffcc00")]
        color2: String,
        #[arg(long, default_value_t = DEFAULT_INITIAL_SECONDS / 60)]
        minutes: u32,
    },
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Seed {
            team1,
            color1,
            team2,
            color2,
            minutes,
        } => {
            let state = GameState::new(
                TeamState::named(team1, color1),
                TeamState::named(team2, color2),
                minutes.saturating_mul(60),
            );
            let version = storage
                .load_document(GAME_DOCUMENT)
                .await?
                .map(|stored| stored.version + 1)
                .unwrap_or(1);
            storage
                .save_document(GAME_DOCUMENT, version, &serde_json::to_value(&state)?)
                .await?;
            println!(
                "seeded {GAME_DOCUMENT} version={version}: {} vs {} ({})",
                state.team1.name,
                state.team2.name,
                format_clock(state.timer.initial_seconds)
            );
        }
        Command::Show => {
            let Some(stored) = storage.load_document(GAME_DOCUMENT).await? else {
                println!("{GAME_DOCUMENT} has not been seeded");
                return Ok(());
            };
            let state: GameState = serde_json::from_value(stored.body)
                .context("stored game document is not a valid game state")?;
            println!(
                "version={} updated_at={}",
                stored.version,
                stored.updated_at.to_rfc3339()
            );
            println!(
                "{} {} - {} {}  fouls {}/{}",
                state.team1.name,
                state.team1.score,
                state.team2.score,
                state.team2.name,
                state.team1.fouls,
                state.team2.fouls
            );
            println!(
                "clock {} running={} sides_switched={}",
                state.clock(),
                state.timer.running,
                state.sides_switched
            );
        }
    }

    Ok(())
}

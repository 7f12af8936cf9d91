mod commands;
mod config;
mod terminal;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{
    BuzzerPolicy, CommandOutcome, LocalSharedState, RemoteSharedState, Session, SessionHooks,
    SessionOptions, SharedState,
};
use server_api::DocumentStore;
use shared::domain::{GameState, Role};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::{
    commands::{parse_line, Command, Target, HELP},
    config::load_settings,
    terminal::{LoggedWakeLock, TerminalBell, TerminalRender},
};

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the scoreboard server.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    role: Option<Role>,
    /// Run against an in-process store seeded with a default game.
    #[arg(long)]
    local: bool,
    #[arg(long)]
    buzzer_policy: Option<BuzzerPolicy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(role) = args.role {
        settings.role = role;
    }
    if let Some(policy) = args.buzzer_policy {
        settings.buzzer_policy = policy;
    }

    let store: Arc<dyn SharedState> = if args.local {
        info!("using in-process game state");
        Arc::new(LocalSharedState::new(DocumentStore::seeded(
            &GameState::default(),
        )?))
    } else {
        info!(server_url = %settings.server_url, "using remote game state");
        Arc::new(RemoteSharedState::new(&settings.server_url)?)
    };

    let options = SessionOptions {
        buzzer_policy: settings.buzzer_policy,
        ..SessionOptions::for_role(settings.role)
    };
    let session = Session::start(
        store,
        options,
        SessionHooks {
            render: Arc::new(TerminalRender),
            buzzer: Arc::new(TerminalBell),
            wake_lock: Arc::new(LoggedWakeLock),
        },
    );
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match parse_line(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => run_command(&session, command).await,
            Ok(None) => {}
            Err(err) => println!("{err}"),
        }
    }

    info!("scoreboard shutting down");
    Ok(())
}

async fn run_command(session: &Session, command: Command) {
    let dispatcher = session.dispatcher();
    let outcome = match command {
        Command::Action { action, target } => match target {
            Some(Target::Side(side)) => dispatcher.send_command_for_side(action, side).await,
            Some(Target::Team(team)) => dispatcher.send_command(action, Some(team)).await,
            None => dispatcher.send_command(action, None).await,
        },
        Command::SetTeam { side, name, color } => dispatcher.set_team(side, &name, &color).await,
        Command::Duration { minutes, seconds } => {
            dispatcher.set_timer_duration(minutes, seconds).await
        }
        Command::Key(key) => match session.on_key(key).await {
            Some(outcome) => outcome,
            None => return,
        },
        Command::Visibility(visibility) => {
            session.on_visibility_change(visibility);
            return;
        }
        Command::Help => {
            println!("{HELP}");
            return;
        }
        Command::Quit => return,
    };

    match outcome {
        CommandOutcome::Applied { .. } => {}
        CommandOutcome::Skipped(reason) => println!("not sent: {reason:?}"),
        CommandOutcome::Failed { error, .. } => println!("failed: {error}"),
    }
}

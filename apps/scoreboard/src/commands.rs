use anyhow::{anyhow, bail, Result};
use client_core::{parse_duration_input, Key, Visibility};
use shared::{
    domain::{Side, TeamId},
    protocol::Action,
};

pub const HELP: &str = "\
commands:
  inc-score|dec-score|inc-foul|dec-foul <team1|team2|left|right>
  start-timer | stop-timer | reset-timer | switch-sides
  set-team <left|right> <name> <color>
  duration <minutes> <seconds>
  space | hide | show | help | quit";

/// Where a team-scoped action lands: a logical team, or whichever team is
/// currently drawn on a side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Team(TeamId),
    Side(Side),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Action {
        action: Action,
        target: Option<Target>,
    },
    SetTeam {
        side: Side,
        name: String,
        color: String,
    },
    Duration {
        minutes: u32,
        seconds: u32,
    },
    Key(Key),
    Visibility(Visibility),
    Help,
    Quit,
}

/// Parses one stdin line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match head.to_ascii_lowercase().as_str() {
        "space" => Command::Key(Key::Space),
        "hide" => Command::Visibility(Visibility::Hidden),
        "show" => Command::Visibility(Visibility::Visible),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "duration" => Command::Duration {
            minutes: rest.first().map(|v| parse_duration_input(v)).unwrap_or(0),
            seconds: rest.get(1).map(|v| parse_duration_input(v)).unwrap_or(0),
        },
        "set-team" | "setteam" => {
            let [side, name, color, ..] = rest.as_slice() else {
                bail!("usage: set-team <left|right> <name> <color>");
            };
            Command::SetTeam {
                side: side.parse()?,
                name: (*name).to_string(),
                color: (*color).to_string(),
            }
        }
        _ => {
            let action: Action = head.parse()?;
            let target = if action.is_team_scoped() {
                let raw = rest
                    .first()
                    .ok_or_else(|| anyhow!("{action} needs a team or side"))?;
                Some(parse_target(raw)?)
            } else {
                None
            };
            Command::Action { action, target }
        }
    };
    Ok(Some(command))
}

fn parse_target(raw: &str) -> Result<Target> {
    if let Ok(team) = raw.parse::<TeamId>() {
        return Ok(Target::Team(team));
    }
    raw.parse::<Side>()
        .map(Target::Side)
        .map_err(|_| anyhow!("unknown team or side '{raw}'"))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;

//! Operator commands read from stdin while the dashboard is watching.

use anyhow::{anyhow, bail, Result};
use shared::domain::{VehicleId, VehicleStatus};

pub const HELP: &str = "\
commands:
  status <vehicle> <available|in_ride|maintenance>
  driver <vehicle> [name]     edit the driver draft (empty clears the draft)
  save <vehicle>              assign the drafted driver
  clear <vehicle>             unassign the driver
  refresh                     refetch the vehicle list now
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    SetStatus {
        vehicle_id: VehicleId,
        status: VehicleStatus,
    },
    EditDraft {
        vehicle_id: VehicleId,
        text: String,
    },
    SaveDriver {
        vehicle_id: VehicleId,
    },
    ClearDriver {
        vehicle_id: VehicleId,
    },
    Refresh,
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<OperatorCommand>> {
    let line = line.trim();
    let Some((verb, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "status" => {
            let (vehicle_id, rest) = vehicle_arg(verb, rest)?;
            let raw = rest.trim();
            if raw.is_empty() {
                bail!("usage: status <vehicle> <available|in_ride|maintenance>");
            }
            OperatorCommand::SetStatus {
                vehicle_id,
                status: raw.parse()?,
            }
        }
        "driver" => {
            let (vehicle_id, rest) = vehicle_arg(verb, rest)?;
            OperatorCommand::EditDraft {
                vehicle_id,
                text: rest.strip_prefix(' ').unwrap_or(rest).to_string(),
            }
        }
        "save" => OperatorCommand::SaveDriver {
            vehicle_id: vehicle_arg(verb, rest)?.0,
        },
        "clear" => OperatorCommand::ClearDriver {
            vehicle_id: vehicle_arg(verb, rest)?.0,
        },
        "refresh" | "r" => OperatorCommand::Refresh,
        "help" | "?" => OperatorCommand::Help,
        "quit" | "exit" | "q" => OperatorCommand::Quit,
        other => bail!("unknown command '{other}', type 'help'"),
    };
    Ok(Some(command))
}

fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    Some(match input.find(char::is_whitespace) {
        Some(end) => (&input[..end], &input[end..]),
        None => (input, ""),
    })
}

fn vehicle_arg<'a>(verb: &str, rest: &'a str) -> Result<(VehicleId, &'a str)> {
    let (id, rest) = split_word(rest).ok_or_else(|| anyhow!("usage: {verb} <vehicle> ..."))?;
    Ok((VehicleId::new(id), rest))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;

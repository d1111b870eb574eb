//! Administrative command surface.
//!
//! One command per line, case-insensitive, with a few short aliases.

use std::str::FromStr;

use thiserror::Error;

/// Commands an operator can send to a running supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start (or restart after failure) the connection.
    Connect,
    /// Stop and go idle.
    Disconnect,
    /// Stop and start again with the same credentials.
    Reset,
    /// Print the current state.
    Status,
    /// Simulate link loss (host simulation only).
    DropLink,
    /// Show available commands.
    Help,
    /// Stop and exit the driver loop.
    Quit,
}

/// Error parsing a command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0} (try 'help')")]
    Unknown(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let word = line.trim();
        if word.is_empty() {
            return Err(CommandError::Empty);
        }

        match word.to_ascii_lowercase().as_str() {
            "connect" | "start" => Ok(Command::Connect),
            "disconnect" | "stop" => Ok(Command::Disconnect),
            "reset" | "restart" => Ok(Command::Reset),
            "status" | "s" => Ok(Command::Status),
            "drop" => Ok(Command::DropLink),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(word.to_string())),
        }
    }
}

impl Command {
    pub const HELP: &'static str =
        "commands: connect | disconnect | reset | status | drop | help | quit";
}

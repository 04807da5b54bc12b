//! Control console.
//!
//! Text stand-in for the graphical control panel. Lines typed on stdin are
//! parsed into [`ControlCommand`]s that the frame loop applies.
//!
//! # Usage
//! ```ignore
//! let mut console = ControlConsole::new();
//! if let Some(cmd) = console.parse("spawn_rate 3")? {
//!     for line in visualizer.exec_command(cmd).await {
//!         println!("{line}");
//!     }
//! }
//! ```

use anyhow::{bail, Context};

/// Commands understood by the visualizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Re-initialize the server and reload everything.
    Reset,
    /// Spawn new vehicles every `n` steps.
    SpawnRate(u32),
    /// Toggle erratic-driver mode on the server.
    ErraticMode(bool),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "Commands: reset | spawn_rate <n> | erratic on|off | status | help | quit";

/// Parses console lines and keeps a bounded history.
pub struct ControlConsole {
    history: Vec<String>,
    max_history: usize,
}

impl Default for ControlConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlConsole {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            max_history: 100,
        }
    }

    /// Parses one line. Blank lines and `//` comments yield `Ok(None)`.
    pub fn parse(&mut self, line: &str) -> anyhow::Result<Option<ControlCommand>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            return Ok(None);
        }

        self.history.push(line.to_string());
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }

        let tokens = parse_command_line(line);
        let Some((name, args)) = tokens.split_first() else {
            return Ok(None);
        };

        let cmd = match name.to_ascii_lowercase().as_str() {
            "reset" => ControlCommand::Reset,
            "spawn_rate" | "spawnrate" => {
                let Some(raw) = args.first() else {
                    bail!("usage: spawn_rate <n>");
                };
                let rate: u32 = raw
                    .parse()
                    .with_context(|| format!("spawn_rate expects a whole number, got {raw:?}"))?;
                if rate == 0 {
                    bail!("spawn_rate must be at least 1");
                }
                ControlCommand::SpawnRate(rate)
            }
            "erratic" | "borrachito" => match args.first().map(|s| s.to_ascii_lowercase()).as_deref() {
                Some("on" | "1" | "true") => ControlCommand::ErraticMode(true),
                Some("off" | "0" | "false") => ControlCommand::ErraticMode(false),
                _ => bail!("usage: erratic on|off"),
            },
            "status" => ControlCommand::Status,
            "help" | "?" => ControlCommand::Help,
            "quit" | "exit" => ControlCommand::Quit,
            other => bail!("unknown command: {other} ({HELP})"),
        };
        Ok(Some(cmd))
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }
}

/// Parses a command line into tokens, respecting quotes.
fn parse_command_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => {
                current.push(c);
            }
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

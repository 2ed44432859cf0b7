// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator command loop

use std::io::{BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;

use crate::core::error::{InventoryError, InventoryResult};
use crate::core::lifecycle::{LifecycleController, Notice};

pub const MENU: &str = "Commands: [start] [stop] [clear] [state] [exit]";
pub const PROMPT: &str = ">> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Clear,
    State,
    Exit,
}

impl FromStr for Command {
    type Err = InventoryError;

    /// Case-insensitive, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "clear" => Ok(Command::Clear),
            "state" => Ok(Command::State),
            "exit" => Ok(Command::Exit),
            _ => Err(InventoryError::UnknownCommand(s.trim().to_string())),
        }
    }
}

/// Reads commands line by line and routes them to the controller
#[derive(Debug)]
pub struct CommandDispatcher {
    controller: Arc<LifecycleController>,
}

impl CommandDispatcher {
    pub fn new(controller: Arc<LifecycleController>) -> Self {
        Self { controller }
    }

    pub fn execute(&self, command: Command) -> Notice {
        log::debug!("[CommandDispatcher] Executing {:?}", command);
        match command {
            Command::Start => self.controller.start(),
            Command::Stop => self.controller.stop(),
            Command::Clear => self.controller.clear(),
            Command::State => self.controller.query_state(),
            Command::Exit => self.controller.shutdown(),
        }
    }

    /// Run until `exit` or end of input. Both stop and disconnect the reader.
    ///
    /// Only I/O errors on `input` or `output` end the loop early.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> InventoryResult<()> {
        let mut line = String::new();
        loop {
            writeln!(output)?;
            writeln!(output, "{}", MENU)?;
            write!(output, "{}", PROMPT)?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                log::info!("[CommandDispatcher] End of input, shutting down");
                writeln!(output)?;
                self.finish(&mut output)?;
                return Ok(());
            }

            match line.parse::<Command>() {
                Ok(Command::Exit) => {
                    self.finish(&mut output)?;
                    return Ok(());
                }
                Ok(command) => writeln!(output, "{}", self.execute(command))?,
                Err(e) => {
                    log::debug!("[CommandDispatcher] {}", e);
                    writeln!(output, "Unknown command.")?;
                }
            }
        }
    }

    fn finish<W: Write>(&self, output: &mut W) -> InventoryResult<()> {
        let notice = self.execute(Command::Exit);
        if notice != Notice::NotConnected {
            writeln!(output, "{}", notice)?;
        }
        output.flush()?;
        Ok(())
    }
}

//! Control-topic commands.

use regbridge_framework::{Lifecycle, MessageHandler};
use tracing::{debug, info};

/// A recognized control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stop the bridge.
    Quit,
}

impl Command {
    /// Parse a control payload. Surrounding whitespace is ignored; matching is case-sensitive.
    pub fn parse(payload: &str) -> Option<Self> {
        match payload.trim() {
            "quit" => Some(Command::Quit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Quit => "quit",
        }
    }
}

/// Maps control messages onto lifecycle actions.
///
/// Runs on the sink's delivery context, so it only flips lifecycle state;
/// whoever waits on the lifecycle does the actual teardown.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    lifecycle: Lifecycle,
}

impl CommandHandler {
    pub fn new(lifecycle: Lifecycle) -> Self {
        Self { lifecycle }
    }

    /// Apply a parsed command. Returns whether it changed anything.
    pub fn execute(&self, command: Command) -> bool {
        match command {
            Command::Quit => {
                let accepted = self.lifecycle.request_stop();
                if accepted {
                    info!("Quit command received, stopping");
                } else {
                    debug!(state = %self.lifecycle.state(), "Quit ignored");
                }
                accepted
            }
        }
    }
}

impl MessageHandler for CommandHandler {
    fn on_message(&self, topic: &str, payload: &str) {
        match Command::parse(payload) {
            Some(command) => {
                debug!(%topic, command = command.as_str(), "Control command");
                self.execute(command);
            }
            None => debug!(%topic, %payload, "Ignoring unknown command"),
        }
    }
}

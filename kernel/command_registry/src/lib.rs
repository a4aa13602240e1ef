//! The shared registry of named commands.
//!
//! Modules register their commands here as they initialize; the interactive
//! consoles look commands up by name to execute them. Priorities decide
//! which registration wins when two modules claim the same name; they say
//! nothing about execution order.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::{collections::BTreeMap, string::String, sync::Arc};

use diagnostics::Error;

/// A registered command's entry point.
pub trait CommandHandler {
    fn execute(&self, args: &[&str]) -> Result<(), Error>;
}

struct RegisteredCommand {
    priority: i32,
    handler: Arc<dyn CommandHandler>,
}

/// The command table, keyed by name.
///
/// One winner is kept per name: a new registration replaces the incumbent
/// unless the incumbent's priority is strictly higher, so re-registering at
/// equal priority shadows the older entry.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    pub fn new() -> CommandRegistry {
        CommandRegistry::default()
    }

    pub fn register(&mut self, name: &str, priority: i32, handler: Arc<dyn CommandHandler>) {
        if let Some(incumbent) = self.commands.get(name) {
            if incumbent.priority > priority {
                return;
            }
        }
        self.commands
            .insert(String::from(name), RegisteredCommand { priority, handler });
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.commands
            .get(name)
            .map(|command| Arc::clone(&command.handler))
    }

    /// Removes the command `name`; returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.commands.remove(name).is_some()
    }
}

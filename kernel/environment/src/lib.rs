//! Environment variables for the boot process.
//!
//! A variable is created the first time it is assigned, exported, or given a
//! write hook, and lives for the rest of the process. Hooks let a variable
//! normalize whatever is assigned to it: the hook sees the attempted value
//! and returns the value actually stored.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::{boxed::Box, string::String};
use hashbrown::HashMap;

/// A transformation applied to a variable's value at assignment time,
/// before storage. Hooks are pure: they see only the attempted value.
pub trait WriteHook {
    fn rewrite(&self, new_value: &str) -> String;
}

struct Variable {
    value: String,
    exported: bool,
    hook: Option<Box<dyn WriteHook>>,
}

impl Variable {
    fn empty() -> Variable {
        Variable {
            value: String::new(),
            exported: false,
            hook: None,
        }
    }
}

/// A structure that contains the environment state of the boot process.
#[derive(Default)]
pub struct Environment {
    variables: HashMap<String, Variable>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment::default()
    }

    /// Returns the value of the environment variable with the given `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(|var| var.value.as_str())
    }

    /// Assigns `value` to the variable `name`, creating it if absent.
    ///
    /// If the variable has a write hook, the hook's rewrite of `value` is
    /// what gets stored.
    pub fn set(&mut self, name: &str, value: &str) {
        let var = self
            .variables
            .entry(String::from(name))
            .or_insert_with(Variable::empty);
        var.value = match &var.hook {
            Some(hook) => hook.rewrite(value),
            None => String::from(value),
        };
    }

    /// Removes the variable `name`, along with its hook and export flag.
    pub fn unset(&mut self, name: &str) {
        self.variables.remove(name);
    }

    /// Marks `name` as visible beyond the local scope, creating an empty
    /// variable if absent.
    pub fn export(&mut self, name: &str) {
        self.variables
            .entry(String::from(name))
            .or_insert_with(Variable::empty)
            .exported = true;
    }

    pub fn is_exported(&self, name: &str) -> bool {
        self.variables.get(name).map_or(false, |var| var.exported)
    }

    /// Installs `hook` on the variable `name`, creating an empty variable if
    /// absent. The current value is left as-is; the hook applies to future
    /// assignments only.
    pub fn register_write_hook(&mut self, name: &str, hook: Box<dyn WriteHook>) {
        self.variables
            .entry(String::from(name))
            .or_insert_with(Variable::empty)
            .hook = Some(hook);
    }
}

//! The single pending-error slot shared by every stage of the boot process.
//!
//! Early boot does not thread error values through deep call chains: a failed
//! operation parks one [`Error`] in the [`Diagnostics`] slot, and well-defined
//! points in the bootstrap sequence print and clear whatever is pending.
//! Exactly one error is pending at a time; a later failure replaces an
//! earlier one that nothing printed.
//!
//! This is the user-visible channel. Developer tracing goes through the
//! `log` facade instead and may be wired to a different device entirely.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::string::String;
use core::fmt;

use console_io::TextOutput;

/// Classification of a pending error, mirroring the loader's error numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    BadModule,
    OutOfMemory,
    FileNotFound,
    UnknownCommand,
    BadArgument,
    UnknownDevice,
    Io,
}

/// An error destined for the diagnostics slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Error {
        Error {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// The pending-error slot.
#[derive(Default)]
pub struct Diagnostics {
    pending: Option<Error>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    /// Parks `error` in the slot, replacing any unprinted predecessor.
    pub fn set(&mut self, error: Error) {
        self.pending = Some(error);
    }

    /// Drops the pending error without printing it.
    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&Error> {
        self.pending.as_ref()
    }

    /// Prints the pending error, if any, and leaves it in the slot.
    pub fn print_and_keep(&self, output: &mut dyn TextOutput) {
        if let Some(error) = &self.pending {
            output.write_str(&alloc::format!("error: {}.\n", error));
        }
    }

    /// Prints the pending error, if any, and empties the slot.
    pub fn print_and_clear(&mut self, output: &mut dyn TextOutput) {
        self.print_and_keep(output);
        self.pending = None;
    }
}

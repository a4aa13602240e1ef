//! The minimal, always-available interactive fallback console.
//!
//! Rescue mode is the boot process's terminal state: whatever happened
//! before, the user ends up at a prompt that can still execute commands.
//! [`run`] never returns. There is no surrounding operating system to exit
//! into, so the read-eval loop *is* the rest of the program; this is not a
//! missing exit.
//!
//! The console itself is thin: it owns the prompts and the pending-error
//! display, and hands every non-empty line to the shared command-line
//! collaborator, supplying a callback for continuation lines (e.g. after an
//! unterminated quote).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::string::String;
use log::debug;

use console_io::{KeyInput, TextOutput};
use diagnostics::{Diagnostics, Error};
use line_editor::LineEditor;

/// Prompt for a fresh command line.
pub const RESCUE_PROMPT: &str = "grub rescue> ";

/// Prompt for a continuation line requested by the parser.
pub const CONTINUATION_PROMPT: &str = "> ";

/// The shared command-line parsing/execution collaborator.
pub trait LineExecutor {
    /// Parses and executes one command line. When the line is syntactically
    /// incomplete, the executor calls `continuation` for further input.
    fn execute_line(
        &mut self,
        line: &str,
        continuation: &mut dyn FnMut() -> String,
        diag: &mut Diagnostics,
    ) -> Result<(), Error>;
}

/// Enters the rescue console and never returns.
pub fn run(
    executor: &mut dyn LineExecutor,
    input: &mut dyn KeyInput,
    output: &mut dyn TextOutput,
    diag: &mut Diagnostics,
) -> ! {
    debug!("entering rescue mode");
    output.write_str("Entering rescue mode...\n");
    let mut editor = LineEditor::new();
    loop {
        iteration(&mut editor, executor, input, output, diag);
    }
}

/// One pass of the read-eval loop: show the pending error, prompt, read,
/// and execute. Empty lines are discarded without touching the executor.
fn iteration(
    editor: &mut LineEditor,
    executor: &mut dyn LineExecutor,
    input: &mut dyn KeyInput,
    output: &mut dyn TextOutput,
    diag: &mut Diagnostics,
) {
    diag.print_and_clear(output);
    output.write_str(RESCUE_PROMPT);
    let line = editor.read_line(input, output);
    if line.is_empty() {
        return;
    }
    let mut continuation = || {
        output.write_str(CONTINUATION_PROMPT);
        editor.read_line(input, output)
    };
    if let Err(error) = executor.execute_line(&line, &mut continuation, diag) {
        diag.set(error);
    }
}

//! Collects one line of input from a raw, single-key-at-a-time console.
//!
//! This is the input path of the rescue console, which runs before any
//! terminal stack exists: keys arrive one byte at a time from a blocking
//! source, and editing amounts to appending printable characters and
//! erasing the last one. Reading a line never fails; an interrupted or
//! empty line simply yields an empty string.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::string::String;

use console_io::{KeyInput, TextOutput};

/// Usable characters per line, excluding the terminator.
pub const MAX_LINE_LEN: usize = 255;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// A reusable fixed-capacity line collector.
pub struct LineEditor {
    buffer: String,
}

impl Default for LineEditor {
    fn default() -> LineEditor {
        LineEditor::new()
    }
}

impl LineEditor {
    pub fn new() -> LineEditor {
        LineEditor {
            buffer: String::with_capacity(MAX_LINE_LEN),
        }
    }

    /// Reads keys until a carriage return or line feed arrives, then
    /// returns the collected text as a freshly owned string. The internal
    /// buffer is left empty, ready for the next call.
    ///
    /// Printable keys are echoed as they are buffered; once the buffer is
    /// full, further printable keys are consumed silently. Erase keys
    /// (BS or DEL, since terminals disagree about which one the key sends)
    /// remove the last buffered character and emit the visual erase
    /// sequence, and are no-ops on an empty buffer.
    pub fn read_line(&mut self, input: &mut dyn KeyInput, output: &mut dyn TextOutput) -> String {
        loop {
            let key = input.read_key();
            match key {
                b'\r' | b'\n' => break,
                BACKSPACE | DELETE => {
                    if self.buffer.pop().is_some() {
                        output.write_str("\x08 \x08");
                    }
                }
                0x20..=0x7e => {
                    if self.buffer.len() < MAX_LINE_LEN {
                        self.buffer.push(key as char);
                        let mut echo = [0u8; 4];
                        output.write_str((key as char).encode_utf8(&mut echo));
                    }
                }
                _ => {}
            }
        }
        output.write_str("\n");
        output.flush();
        core::mem::take(&mut self.buffer)
    }
}

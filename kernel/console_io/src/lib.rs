//! The raw console seam used during the earliest stage of boot.
//!
//! Nothing resembling a terminal stack exists when the bootstrap core runs,
//! so these two traits *are* the console: a blocking single-key input source
//! and an infallible text sink. Platform code implements them on top of
//! whatever the hardware offers, e.g. a UART or a firmware text protocol.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

/// Blocking single-key input.
pub trait KeyInput {
    /// Waits until a key is available and returns its byte value.
    ///
    /// This is the only suspension point in the whole bootstrap core;
    /// conceptually it busy-polls the hardware, since there is nothing else
    /// to schedule at this stage of boot.
    fn read_key(&mut self) -> u8;
}

/// Infallible text output.
///
/// Output failures are not observable this early in boot (there is nowhere
/// to report them), so the sink simply does its best.
pub trait TextOutput {
    fn write_str(&mut self, s: &str);

    /// Pushes any buffered output out to the device.
    /// The default is a no-op, for unbuffered sinks.
    fn flush(&mut self) {}
}

//! A basic logger backend for system-wide logging during boot.
//!
//! This enables every crate in the workspace to use the `log` crate's macros.
//! Records are written to a raw console sink supplied at initialization time,
//! typically a serial port, which may or may not be the same device the
//! interactive console uses; that choice belongs to the platform code.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::boxed::Box;
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

use console_io::TextOutput;

struct SinkLogger {
    sink: Mutex<Option<Box<dyn TextOutput + Send>>>,
}

impl Log for SinkLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Some(sink) = self.sink.lock().as_mut() {
            sink.write_str(&alloc::format!("{} - {}\n", record.level(), record.args()));
        }
    }

    fn flush(&self) {
        if let Some(sink) = self.sink.lock().as_mut() {
            sink.flush();
        }
    }
}

// The `log` facade requires a `&'static` backend; this static is the one
// process-global singleton in the workspace, and its lifetime matches the
// single boot process it serves.
static LOGGER: SinkLogger = SinkLogger {
    sink: Mutex::new(None),
};

/// Installs `sink` as the destination for all `log` macro output.
///
/// Bootstrapping code should call this as early as possible; records logged
/// before initialization are dropped.
pub fn init(sink: Box<dyn TextOutput + Send>) -> Result<(), log::SetLoggerError> {
    *LOGGER.sink.lock() = Some(sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(LevelFilter::Trace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::sync::Arc;

    struct SharedCapture(Arc<Mutex<String>>);

    impl TextOutput for SharedCapture {
        fn write_str(&mut self, s: &str) {
            self.0.lock().push_str(s);
        }
    }

    #[test]
    fn test_records_reach_the_sink() {
        let captured = Arc::new(Mutex::new(String::new()));
        init(Box::new(SharedCapture(Arc::clone(&captured)))).unwrap();

        log::info!("hello from boot");
        log::warn!("low on {}", "memory");

        let text = captured.lock().clone();
        assert!(text.contains("INFO - hello from boot\n"));
        assert!(text.contains("WARN - low on memory\n"));
    }
}

//! The main bootstrap sequence of the boot loader's kernel.
//!
//! This crate contains the logic that runs immediately after minimal
//! hardware bring-up: it loads the modules embedded in the boot image,
//! resolves where on storage the configuration and remaining modules live,
//! and then drives the execution-mode state machine, which makes a single
//! attempt at the full-featured normal mode before falling back to the
//! rescue console.
//!
//! Whatever fails along the way, the sequence is guaranteed to reach an
//! interactive prompt; the only exception is an embedded module that fails
//! to load, which is fatal because later modules may structurally depend on
//! it.
//!
//! Every registry and collaborator is owned by the platform embedder and
//! passed in by reference; nothing here is ambient global state.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use log::{error, info, warn};

use boot_location::FirmwareLocator;
use boot_modules::{ModuleManifest, RecordTag};
use command_registry::CommandRegistry;
use console_io::{KeyInput, TextOutput};
use diagnostics::{Diagnostics, Error};
use environment::Environment;
use rescue::LineExecutor;

/// The name under which the full-featured mode's module and entry command
/// are looked up.
const NORMAL: &str = "normal";

/// The phase the boot process is in.
///
/// `Bootstrap` is transient and entered exactly once at process start;
/// `Normal` is attempted exactly once; `Rescue` is terminal and never
/// exits. A Normal-mode failure and a Normal-mode graceful exit are
/// indistinguishable here; both fall through to `Rescue`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    Bootstrap,
    Normal,
    Rescue,
}

/// The dynamic module loader (an external collaborator).
///
/// Either operation may succeed while leaving a non-fatal warning in the
/// diagnostics slot, e.g. when a module prints a complaint during its own
/// initialization.
pub trait ModuleLoader {
    /// Loads a module from an in-memory image.
    fn load_from_memory(&mut self, image: &[u8], diag: &mut Diagnostics) -> Result<(), Error>;

    /// Loads a module by name; may consult storage once `root` and
    /// `prefix` are available.
    fn load_by_name(&mut self, name: &str, diag: &mut Diagnostics) -> Result<(), Error>;
}

/// The script-execution collaborator, used for the embedded configuration.
pub trait ScriptExecutor {
    fn execute(&mut self, script: &str, diag: &mut Diagnostics) -> Result<(), Error>;
}

/// The bootstrap sequence and everything it needs, wired up by the
/// platform embedder.
pub struct Bootstrap<'a> {
    pub env: &'a mut Environment,
    pub commands: &'a mut CommandRegistry,
    pub diag: &'a mut Diagnostics,
    pub modules: &'a mut dyn ModuleLoader,
    pub scripts: &'a mut dyn ScriptExecutor,
    pub command_line: &'a mut dyn LineExecutor,
    pub firmware: &'a mut dyn FirmwareLocator,
    pub input: &'a mut dyn KeyInput,
    pub output: &'a mut dyn TextOutput,
}

impl Bootstrap<'_> {
    /// Runs the boot process to its terminal state. Never returns: the
    /// rescue console loops forever, and a fatal module failure halts.
    pub fn run(mut self, manifest: &ModuleManifest<'_>) -> ! {
        let mut mode = ExecutionMode::Bootstrap;
        loop {
            mode = match mode {
                ExecutionMode::Bootstrap => {
                    if self.bootstrap(manifest).is_err() {
                        self.abort();
                    }
                    ExecutionMode::Normal
                }
                ExecutionMode::Normal => {
                    self.enter_normal_mode();
                    ExecutionMode::Rescue
                }
                ExecutionMode::Rescue => break,
            };
        }
        rescue::run(self.command_line, self.input, self.output, self.diag)
    }

    /// The one-time bootstrap phase. `Err` means a fatal module failure.
    fn bootstrap(&mut self, manifest: &ModuleManifest<'_>) -> Result<(), ()> {
        self.output.write_str("Welcome to GRUB!\n\n");

        self.load_embedded_modules(manifest)?;

        // Setting the root device early is a convenience for everything
        // that runs afterwards, embedded config included.
        let prefix_text = embedded_prefix(manifest);
        boot_location::set_prefix_and_root(
            self.env,
            prefix_text,
            self.firmware,
            self.diag,
            self.output,
        );
        self.env.export("root");
        self.env.export("prefix");

        self.run_embedded_config(manifest);
        Ok(())
    }

    /// Hands every embedded module image to the loader, in manifest order.
    ///
    /// A load failure is fatal and stops the walk: later modules may
    /// structurally require the failed one. A module that loads but leaves
    /// a warning pending gets the warning printed and cleared, and the walk
    /// continues.
    fn load_embedded_modules(&mut self, manifest: &ModuleManifest<'_>) -> Result<(), ()> {
        for record in manifest.records() {
            if record.tag != RecordTag::Elf {
                continue;
            }
            if let Err(e) = self.modules.load_from_memory(record.payload, self.diag) {
                error!("embedded module failed to load: {}", e);
                self.diag.set(e);
                return Err(());
            }
            if self.diag.is_pending() {
                self.diag.print_and_clear(self.output);
            }
        }
        Ok(())
    }

    /// Executes the first embedded configuration script, if any.
    ///
    /// Only the first one is ever honored; any further config records in
    /// the image are ignored. An execution error is parked in the
    /// diagnostics slot and surfaces at the next unconditional print.
    fn run_embedded_config(&mut self, manifest: &ModuleManifest<'_>) {
        for record in manifest.records() {
            if record.tag != RecordTag::Config {
                continue;
            }
            match record.text() {
                Some(script) => {
                    info!("executing embedded config ({} bytes)", script.len());
                    if let Err(e) = self.scripts.execute(script, self.diag) {
                        self.diag.set(e);
                    }
                }
                None => warn!("embedded config is not text; ignoring it"),
            }
            break;
        }
    }

    /// Attempts the full-featured mode: load the `normal` module by name,
    /// then invoke the `normal` command if some module registered it.
    ///
    /// Falls through in every case: the caller transitions to rescue
    /// whether the command was absent, failed, or ran and returned.
    fn enter_normal_mode(&mut self) {
        if let Err(e) = self.modules.load_by_name(NORMAL, self.diag) {
            self.diag.set(e);
        }
        self.diag.print_and_clear(self.output);

        match self.commands.find(NORMAL) {
            Some(handler) => {
                if let Err(e) = handler.execute(&[]) {
                    self.diag.set(e);
                }
            }
            None => info!("no `{}` command registered; falling back to rescue", NORMAL),
        }
    }

    /// The fatal path: show what went wrong and halt.
    fn abort(&mut self) -> ! {
        self.diag.print_and_keep(self.output);
        self.output.write_str("\nAborted. Press any key to exit.\n");
        self.output.flush();
        self.input.read_key();
        halt()
    }
}

/// Returns the build-time boot-location text, if the image embeds one.
/// When an image carries several, the last one wins.
fn embedded_prefix<'m>(manifest: &ModuleManifest<'m>) -> Option<&'m str> {
    let mut prefix = None;
    for record in manifest.records() {
        if record.tag != RecordTag::Prefix {
            continue;
        }
        match record.text() {
            Some(text) => prefix = Some(text),
            None => warn!("embedded boot-location record is not text; ignoring it"),
        }
    }
    prefix
}

/// There is no operating system to return to.
fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use boot_location::BootLocation;
    use boot_modules::RECORD_HEADER_SIZE;
    use command_registry::CommandHandler;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use diagnostics::ErrorCode;

    // -- manifest construction helpers --

    fn record(tag: u32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&tag.to_ne_bytes());
        bytes.extend_from_slice(&((RECORD_HEADER_SIZE + payload.len()) as u32).to_ne_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    fn manifest_blob(records: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = records.iter().flatten().copied().collect();
        let mut blob = Vec::new();
        blob.extend_from_slice(&boot_modules::MODULE_MAGIC.to_ne_bytes());
        blob.extend_from_slice(&12u32.to_ne_bytes());
        blob.extend_from_slice(&((12 + body.len()) as u32).to_ne_bytes());
        blob.extend_from_slice(&body);
        blob
    }

    // -- collaborator mocks --

    /// Records loaded images/names; fails on a designated image and can
    /// leave a warning pending after a designated image.
    #[derive(Default)]
    struct Loader {
        images: Vec<Vec<u8>>,
        names: Vec<String>,
        fail_on_image: Option<Vec<u8>>,
        warn_after_image: Option<Vec<u8>>,
        fail_by_name: bool,
        warn_by_name: bool,
    }

    impl ModuleLoader for Loader {
        fn load_from_memory(&mut self, image: &[u8], diag: &mut Diagnostics) -> Result<(), Error> {
            self.images.push(image.to_vec());
            if self.fail_on_image.as_deref() == Some(image) {
                return Err(Error::new(ErrorCode::BadModule, "relocation failed"));
            }
            if self.warn_after_image.as_deref() == Some(image) {
                diag.set(Error::new(ErrorCode::BadArgument, "module grumbled"));
            }
            Ok(())
        }

        fn load_by_name(&mut self, name: &str, diag: &mut Diagnostics) -> Result<(), Error> {
            self.names.push(String::from(name));
            if self.fail_by_name {
                return Err(Error::new(ErrorCode::FileNotFound, "normal.mod not found"));
            }
            if self.warn_by_name {
                diag.set(Error::new(ErrorCode::BadArgument, "deprecated option"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Scripts {
        executed: Vec<String>,
    }

    impl ScriptExecutor for Scripts {
        fn execute(&mut self, script: &str, _diag: &mut Diagnostics) -> Result<(), Error> {
            self.executed.push(String::from(script));
            Ok(())
        }
    }

    #[derive(Default)]
    struct NoCommandLine;

    impl LineExecutor for NoCommandLine {
        fn execute_line(
            &mut self,
            _line: &str,
            _continuation: &mut dyn FnMut() -> String,
            _diag: &mut Diagnostics,
        ) -> Result<(), Error> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Firmware {
        device: Option<String>,
        path: Option<String>,
    }

    impl FirmwareLocator for Firmware {
        fn guess(&mut self, _diag: &mut Diagnostics) -> BootLocation {
            BootLocation {
                device: self.device.clone(),
                path: self.path.clone(),
            }
        }
    }

    struct NoKeys;

    impl KeyInput for NoKeys {
        fn read_key(&mut self) -> u8 {
            panic!("bootstrap stages must not read keys");
        }
    }

    struct Capture(String);

    impl TextOutput for Capture {
        fn write_str(&mut self, s: &str) {
            self.0.push_str(s);
        }
    }

    /// Everything a `Bootstrap` borrows, so tests can assemble one tersely.
    #[derive(Default)]
    struct World {
        env: Environment,
        commands: CommandRegistry,
        diag: Diagnostics,
        loader: Loader,
        scripts: Scripts,
        command_line: NoCommandLine,
        firmware: Firmware,
    }

    impl World {
        fn bootstrap<'a>(&'a mut self, input: &'a mut NoKeys, out: &'a mut Capture) -> Bootstrap<'a> {
            Bootstrap {
                env: &mut self.env,
                commands: &mut self.commands,
                diag: &mut self.diag,
                modules: &mut self.loader,
                scripts: &mut self.scripts,
                command_line: &mut self.command_line,
                firmware: &mut self.firmware,
                input,
                output: out,
            }
        }
    }

    #[test]
    fn test_failed_module_aborts_later_records() {
        let blob = manifest_blob(&[record(0, b"first"), record(0, b"second")]);
        let manifest = ModuleManifest::parse(&blob);
        let mut world = World {
            loader: Loader {
                fail_on_image: Some(b"first".to_vec()),
                ..Loader::default()
            },
            ..World::default()
        };
        let (mut keys, mut out) = (NoKeys, Capture(String::new()));
        let mut boot = world.bootstrap(&mut keys, &mut out);

        assert!(boot.load_embedded_modules(&manifest).is_err());
        assert!(boot.diag.is_pending());
        drop(boot);
        // The second record was never handed to the loader.
        assert_eq!(world.loader.images, vec![b"first".to_vec()]);
    }

    #[test]
    fn test_module_warning_is_printed_and_loading_continues() {
        let blob = manifest_blob(&[record(0, b"grumbler"), record(0, b"quiet")]);
        let manifest = ModuleManifest::parse(&blob);
        let mut world = World {
            loader: Loader {
                warn_after_image: Some(b"grumbler".to_vec()),
                ..Loader::default()
            },
            ..World::default()
        };
        let (mut keys, mut out) = (NoKeys, Capture(String::new()));
        let mut boot = world.bootstrap(&mut keys, &mut out);

        assert!(boot.load_embedded_modules(&manifest).is_ok());
        assert!(!boot.diag.is_pending());
        drop(boot);
        assert_eq!(world.loader.images.len(), 2);
        assert_eq!(out.0, "error: module grumbled.\n");
    }

    #[test]
    fn test_non_elf_records_are_skipped_by_the_module_pass() {
        let blob = manifest_blob(&[
            record(2, b"set x=1\0"),
            record(1, b"memdisk image"),
            record(0, b"module"),
        ]);
        let manifest = ModuleManifest::parse(&blob);
        let mut world = World::default();
        let (mut keys, mut out) = (NoKeys, Capture(String::new()));
        let mut boot = world.bootstrap(&mut keys, &mut out);

        assert!(boot.load_embedded_modules(&manifest).is_ok());
        drop(boot);
        assert_eq!(world.loader.images, vec![b"module".to_vec()]);
    }

    #[test]
    fn test_only_the_first_config_is_executed() {
        let blob = manifest_blob(&[
            record(2, b"set timeout=5\0"),
            record(0, b"module"),
            record(2, b"set timeout=99\0"),
        ]);
        let manifest = ModuleManifest::parse(&blob);
        let mut world = World::default();
        let (mut keys, mut out) = (NoKeys, Capture(String::new()));
        let mut boot = world.bootstrap(&mut keys, &mut out);

        boot.run_embedded_config(&manifest);
        drop(boot);
        assert_eq!(world.scripts.executed, vec![String::from("set timeout=5")]);
    }

    #[test]
    fn test_last_prefix_record_wins() {
        let blob = manifest_blob(&[
            record(3, b"(hd0,1)/old\0"),
            record(3, b"(hd0,2)/new\0"),
        ]);
        let manifest = ModuleManifest::parse(&blob);
        assert_eq!(embedded_prefix(&manifest), Some("(hd0,2)/new"));
    }

    #[test]
    fn test_bootstrap_phase_sets_and_exports_root_and_prefix() {
        let blob = manifest_blob(&[record(0, b"module"), record(3, b"(hd0,1)/boot/grub\0")]);
        let manifest = ModuleManifest::parse(&blob);
        let mut world = World::default();
        let (mut keys, mut out) = (NoKeys, Capture(String::new()));
        let mut boot = world.bootstrap(&mut keys, &mut out);

        assert!(boot.bootstrap(&manifest).is_ok());
        drop(boot);
        assert_eq!(world.env.get("root"), Some("hd0,1"));
        assert_eq!(world.env.get("prefix"), Some("(hd0,1)/boot/grub"));
        assert!(world.env.is_exported("root"));
        assert!(world.env.is_exported("prefix"));
        assert!(out.0.starts_with("Welcome to GRUB!\n\n"));
    }

    #[test]
    fn test_failed_normal_load_still_tries_the_command_and_prints_once() {
        let mut world = World {
            loader: Loader {
                fail_by_name: true,
                ..Loader::default()
            },
            ..World::default()
        };
        let (mut keys, mut out) = (NoKeys, Capture(String::new()));
        let mut boot = world.bootstrap(&mut keys, &mut out);

        boot.enter_normal_mode();
        assert!(!boot.diag.is_pending());
        drop(boot);
        assert_eq!(world.loader.names, vec![String::from("normal")]);
        assert_eq!(out.0, "error: normal.mod not found.\n");
    }

    #[test]
    fn test_normal_load_warning_is_printed_and_mode_continues() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let mut world = World {
            loader: Loader {
                warn_by_name: true,
                ..Loader::default()
            },
            ..World::default()
        };
        world.commands.register(
            "normal",
            0,
            Arc::new(CountingCommand(Arc::clone(&invocations))),
        );
        let (mut keys, mut out) = (NoKeys, Capture(String::new()));
        let mut boot = world.bootstrap(&mut keys, &mut out);

        boot.enter_normal_mode();
        drop(boot);
        // The warning surfaced once and did not stop the command lookup.
        assert_eq!(out.0, "error: deprecated option.\n");
        assert_eq!(invocations.load(Ordering::Relaxed), 1);
    }

    struct CountingCommand(Arc<AtomicUsize>);

    impl CommandHandler for CountingCommand {
        fn execute(&self, args: &[&str]) -> Result<(), Error> {
            assert!(args.is_empty());
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[test]
    fn test_normal_command_is_invoked_with_no_arguments() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let mut world = World::default();
        world.commands.register(
            "normal",
            0,
            Arc::new(CountingCommand(Arc::clone(&invocations))),
        );
        let (mut keys, mut out) = (NoKeys, Capture(String::new()));
        let mut boot = world.bootstrap(&mut keys, &mut out);

        boot.enter_normal_mode();
        drop(boot);
        assert_eq!(invocations.load(Ordering::Relaxed), 1);
        // Nothing failed: the unconditional print printed nothing.
        assert_eq!(out.0, "");
    }

    struct FailingCommand;

    impl CommandHandler for FailingCommand {
        fn execute(&self, _args: &[&str]) -> Result<(), Error> {
            Err(Error::new(ErrorCode::Io, "normal mode collapsed"))
        }
    }

    #[test]
    fn test_normal_command_error_is_parked_for_the_rescue_loop() {
        let mut world = World::default();
        world.commands.register("normal", 0, Arc::new(FailingCommand));
        let (mut keys, mut out) = (NoKeys, Capture(String::new()));
        let mut boot = world.bootstrap(&mut keys, &mut out);

        boot.enter_normal_mode();
        assert_eq!(
            boot.diag.pending().map(|e| e.message.as_str()),
            Some("normal mode collapsed")
        );
    }
}

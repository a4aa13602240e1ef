//! Resolution of the `root` and `prefix` environment variables.
//!
//! Two sources describe where on storage the configuration and remaining
//! modules live, and neither is authoritative on its own: the image builder
//! may have embedded a boot-location string at build time, and the firmware
//! can take a best-effort guess at the device it booted from. The embedded
//! string wins wherever it is specific, and the firmware guess fills the
//! gaps, most notably when the build embedded only a partition (`,1`) and
//! the drive has to come from firmware.
//!
//! The resolution runs once. Every failure here is recoverable: in the
//! worst case neither variable gets set and the interactive console is left
//! to sort it out.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::{
    boxed::Box,
    format,
    string::{String, ToString},
};
use log::debug;

use console_io::TextOutput;
use diagnostics::Diagnostics;
use environment::{Environment, WriteHook};

/// A `(device, path)` pair naming where configuration and modules live.
/// Either half may be unknown.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BootLocation {
    pub device: Option<String>,
    pub path: Option<String>,
}

/// The firmware's best-effort guess at the location the system booted from.
pub trait FirmwareLocator {
    /// May leave either field absent, and may record a recoverable error in
    /// `diag`; the caller prints and clears it when resolution finishes.
    fn guess(&mut self, diag: &mut Diagnostics) -> BootLocation;
}

/// Write hook for `root`: values assigned in the conventional `(device)`
/// syntax are stored bare, with exactly one surrounding pair stripped.
pub struct StripSurroundingParens;

impl WriteHook for StripSurroundingParens {
    fn rewrite(&self, new_value: &str) -> String {
        let bytes = new_value.as_bytes();
        if bytes.len() >= 2 && bytes[0] == b'(' && bytes[bytes.len() - 1] == b')' {
            new_value[1..new_value.len() - 1].to_string()
        } else {
            new_value.to_string()
        }
    }
}

/// Computes and stores `root` and `prefix`.
///
/// `embedded_prefix` is the text of the build-time boot-location record, if
/// the image carried one. The firmware is consulted only when that text is
/// missing a device, names a bare partition, or is missing a path. If no
/// device survives the merge, neither variable is set: a path with no
/// device is not independently useful.
pub fn set_prefix_and_root(
    env: &mut Environment,
    embedded_prefix: Option<&str>,
    firmware: &mut dyn FirmwareLocator,
    diag: &mut Diagnostics,
    output: &mut dyn TextOutput,
) {
    env.register_write_hook("root", Box::new(StripSurroundingParens));

    let BootLocation {
        mut device,
        mut path,
    } = embedded_prefix.map(parse_embedded).unwrap_or_default();

    let incomplete = path.is_none()
        || match &device {
            None => true,
            Some(d) => d.is_empty() || d.starts_with(','),
        };
    let BootLocation {
        device: fw_device,
        path: fw_path,
    } = if incomplete {
        firmware.guess(diag)
    } else {
        BootLocation::default()
    };

    device = match (device, fw_device) {
        // Nothing embedded: adopt the firmware device verbatim.
        (None, fw_device) => fw_device,
        // A bare partition was embedded; the drive comes from firmware.
        (Some(partition), Some(fw_device))
            if partition.is_empty() || partition.starts_with(',') =>
        {
            Some(format!("{}{}", drive_portion(&fw_device), partition))
        }
        (device, _) => device,
    };
    if path.is_none() {
        path = fw_path;
    }

    if let Some(device) = device {
        let prefix = format!("({}){}", device, path.as_deref().unwrap_or(""));
        debug!("root resolved to `{}`, prefix to `{}`", device, prefix);
        env.set("prefix", &prefix);
        env.set("root", &device);
    } else {
        debug!("no boot device resolved; leaving root and prefix unset");
    }

    diag.print_and_clear(output);
}

/// Splits the embedded boot-location text into its device and path halves.
///
/// A leading `(` opens a device name closed by the *rightmost* `)`; text
/// after that paren is the path. Without that bracketing the whole text is
/// the path. An empty path half counts as absent.
fn parse_embedded(text: &str) -> BootLocation {
    let mut device = None;
    let mut rest = text;
    if text.starts_with('(') {
        if let Some(rparen) = text.rfind(')') {
            device = Some(text[1..rparen].to_string());
            rest = &text[rparen + 1..];
        }
    }
    BootLocation {
        device,
        path: (!rest.is_empty()).then(|| rest.to_string()),
    }
}

/// Returns the drive half of a firmware device name: everything up to the
/// first `,` that is not escaped as `\,`, or the whole name if there is no
/// separator.
fn drive_portion(device: &str) -> &str {
    let bytes = device.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() && bytes[i + 1] == b',' {
            i += 2;
            continue;
        }
        if bytes[i] == b',' {
            return &device[..i];
        }
        i += 1;
    }
    device
}

//! Read-only access to the packed module manifest embedded in the boot image.
//!
//! The image builder appends a contiguous blob to the kernel: a small
//! descriptor followed by back-to-back records, each an 8-byte header
//! (type tag and total size, both native-endian `u32`) and a payload.
//! The records carry the pre-loaded module images, the embedded
//! configuration script, and the build-time boot-location string.
//!
//! Records are never mutated, copied, or individually freed; every payload
//! is a borrowed slice into the blob, which outlives the bootstrap core.
//! An absent or unrecognized descriptor is a *valid* manifest containing no
//! records, not an error.

#![cfg_attr(not(test), no_std)]

/// Magic number identifying the manifest descriptor.
pub const MODULE_MAGIC: u32 = 0x676d_696d;

/// Descriptor layout: `{ magic: u32, offset: u32, size: u32 }`.
const DESCRIPTOR_SIZE: usize = 12;

/// Record header layout: `{ tag: u32, total_size: u32 }`.
pub const RECORD_HEADER_SIZE: usize = 8;

/// The type tag of a manifest record.
///
/// Only `Elf`, `Config`, and `Prefix` drive the bootstrap sequence; every
/// other tag is inert here and skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordTag {
    /// A loadable module image.
    Elf,
    /// An embedded memory disk.
    Memdisk,
    /// Embedded configuration script text.
    Config,
    /// The build-time boot-location string.
    Prefix,
    /// Any tag this core does not recognize.
    Other(u32),
}

impl RecordTag {
    fn from_raw(raw: u32) -> RecordTag {
        match raw {
            0 => RecordTag::Elf,
            1 => RecordTag::Memdisk,
            2 => RecordTag::Config,
            3 => RecordTag::Prefix,
            other => RecordTag::Other(other),
        }
    }
}

/// One record within the manifest.
#[derive(Clone, Copy, Debug)]
pub struct ModuleRecord<'a> {
    pub tag: RecordTag,
    /// The record contents, excluding the header.
    pub payload: &'a [u8],
}

impl<'a> ModuleRecord<'a> {
    /// Interprets the payload as NUL-terminated text.
    ///
    /// Returns `None` if the bytes before the terminator are not UTF-8.
    pub fn text(&self) -> Option<&'a str> {
        let end = self
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.payload.len());
        core::str::from_utf8(&self.payload[..end]).ok()
    }
}

/// A validated view of the manifest blob's record region.
#[derive(Clone, Copy)]
pub struct ModuleManifest<'a> {
    region: &'a [u8],
}

impl<'a> ModuleManifest<'a> {
    /// A manifest containing no records.
    pub fn empty() -> ModuleManifest<'static> {
        ModuleManifest { region: &[] }
    }

    /// Parses the descriptor at the start of `blob`.
    ///
    /// The record region's end offset is computed once, here, from the
    /// descriptor's size field. A blob whose magic does not match, or whose
    /// descriptor fields do not fit the blob, yields an empty manifest.
    pub fn parse(blob: &'a [u8]) -> ModuleManifest<'a> {
        let Some(magic) = read_u32(blob, 0) else {
            return ModuleManifest { region: &[] };
        };
        if magic != MODULE_MAGIC {
            return ModuleManifest { region: &[] };
        }
        let (Some(offset), Some(size)) = (read_u32(blob, 4), read_u32(blob, 8)) else {
            return ModuleManifest { region: &[] };
        };
        let (offset, size) = (offset as usize, size as usize);
        if offset < DESCRIPTOR_SIZE || offset > size || size > blob.len() {
            return ModuleManifest { region: &[] };
        }
        ModuleManifest {
            region: &blob[offset..size],
        }
    }

    /// Iterates over the records in their on-image order.
    pub fn records(&self) -> Records<'a> {
        Records {
            remaining: self.region,
        }
    }
}

/// Cursor over the record region.
///
/// Iteration ends early if a record's declared size is shorter than its
/// header or would overrun the region.
pub struct Records<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for Records<'a> {
    type Item = ModuleRecord<'a>;

    fn next(&mut self) -> Option<ModuleRecord<'a>> {
        let tag = read_u32(self.remaining, 0)?;
        let total_size = read_u32(self.remaining, 4)? as usize;
        if total_size < RECORD_HEADER_SIZE || total_size > self.remaining.len() {
            return None;
        }
        let payload = &self.remaining[RECORD_HEADER_SIZE..total_size];
        self.remaining = &self.remaining[total_size..];
        Some(ModuleRecord {
            tag: RecordTag::from_raw(tag),
            payload,
        })
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let chunk = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

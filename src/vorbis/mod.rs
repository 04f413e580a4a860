//! Vorbis comment codec, shared by the Ogg and FLAC containers.
//!
//! A comment block is a sequence of little-endian length-prefixed records:
//!
//! ```text
//! [vendor len][vendor][field count N][len][KEY=value] ... x N [framing bit?]
//! ```
//!
//! Records of 500 bytes or more are treated as embedded pictures, either
//! `METADATA_BLOCK_PICTURE` (base64 picture block) or the deprecated
//! `COVERART` (base64 raw image).
//!
//! The two containers disagree on a few details, captured by [`CodecOptions`]:
//!
//! | | Ogg | FLAC |
//! |---|---|---|
//! | pictures inside the comment block | yes | no (separate `PICTURE` blocks) |
//! | trailing framing bit | yes | no |
//! | core signature on the zone | yes | no |

mod mapping;
pub mod picture_block;
mod reader;
mod writer;

pub use mapping::{FIELD_MAPPING, field_for_key, key_for_field, mapped_fields};
pub use picture_block::PictureBlock;

use crate::config::Config;
use crate::tag::{Field, TagData};
use crate::zone::Zone;

/// Records at least this long are decoded as embedded pictures.
pub const LARGE_FIELD_THRESHOLD: i32 = 500;

pub const PICTURE_KEY: &str = "METADATA_BLOCK_PICTURE";
pub const COVERART_KEY: &str = "COVERART";
pub const VENDOR_KEY: &str = "VENDOR";

/// Written when the tag carries no vendor string of its own.
pub const VENDOR_DEFAULT_FLAC: &str = "reference libFLAC 1.2.1 20070917";

/// Zero-padding appended after the fields when padding is enabled.
pub const PADDING_SIZE: usize = 2048;

/// `Xiph.Org libVorbis I 20150105 (??]` vendor, zero fields, framing bit.
pub const CORE_SIGNATURE: &[u8] = b"\x22\x00\x00\x00Xiph.Org libVorbis I 20150105 (??]\x00\x00\x00\x00\x01";

/// Container-specific behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Write pictures as `METADATA_BLOCK_PICTURE` fields.
    pub interleave_pictures: bool,
    /// End the block with a framing byte set to 1.
    pub framing_bit: bool,
    /// Tag the zone with [`CORE_SIGNATURE`].
    pub core_signature: bool,
}

impl CodecOptions {
    pub fn ogg() -> Self {
        Self {
            interleave_pictures: true,
            framing_bit: true,
            core_signature: true,
        }
    }

    pub fn flac() -> Self {
        Self {
            interleave_pictures: false,
            framing_bit: false,
            core_signature: false,
        }
    }
}

/// What to keep while reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Keep unmapped keys (and the vendor string) as additional fields.
    pub read_all_fields: bool,
    /// Decode embedded picture bytes.
    pub read_pictures: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            read_all_fields: true,
            read_pictures: true,
        }
    }
}

impl From<&Config> for ReadOptions {
    fn from(config: &Config) -> Self {
        Self {
            read_all_fields: config.read.read_all_fields,
            read_pictures: config.read.read_pictures,
        }
    }
}

/// Outcome of [`VorbisTag::read`].
#[derive(Debug, Clone)]
pub struct ReadResult {
    pub tag: TagData,
    /// `false` when the block only holds the mandatory vendor string.
    pub exists: bool,
    /// Declared number of fields after the vendor string.
    pub field_count: u32,
    /// Byte range consumed by the block.
    pub zone: Zone,
}

/// A Vorbis comment codec for one container variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VorbisTag {
    pub options: CodecOptions,
    /// Append [`PADDING_SIZE`] zero bytes after the fields.
    pub enable_padding: bool,
}

impl VorbisTag {
    pub fn new(options: CodecOptions, enable_padding: bool) -> Self {
        Self {
            options,
            enable_padding,
        }
    }

    /// Edits that remove every field and picture of `existing`, keeping the
    /// vendor string.
    pub fn deletion_tag(existing: &TagData) -> TagData {
        let fields: Vec<Field> = mapped_fields();
        TagData::deletion_of(existing, &fields, VENDOR_KEY)
    }
}

pub(crate) fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Characters outside Latin-1 are replaced by `?`.
pub(crate) fn latin1_encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

//! FLAC container adapter.
//!
//! A FLAC stream is `fLaC` followed by metadata blocks, each behind a 4-byte
//! header `[last:1][type:7][length:24 BE]`, then the audio frames. The Vorbis
//! comment lives in its own `VORBIS_COMMENT` block: the `comment` zone covers
//! that block's body and the 24-bit length in its header is a size field, so a
//! rewrite only touches those bytes.
//!
//! Pictures live in separate `PICTURE` blocks. They are decoded on read but
//! never rewritten.
//!
//! # Example
//!
//! ```rust,no_run
//! use vorbis_tag::config::Config;
//! use vorbis_tag::flac::write_flac;
//! use vorbis_tag::tag::{Field, TagData};
//!
//! let mut edits = TagData::new();
//! edits.set(Field::Title, "Windowlicker");
//! write_flac("track.flac".as_ref(), &edits, &Config::default()).unwrap();
//! ```

use anyhow::Context;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use crate::config::Config;
use crate::error::{Result, TagError};
use crate::tag::{TagData, TagType};
use crate::vorbis::{CodecOptions, PictureBlock, ReadOptions, VorbisTag};
use crate::zone::{SizeField, SizeWidth, Zone, ZoneStructure};

pub const FLAC_MARKER: &[u8] = b"fLaC";

/// Zone holding the Vorbis comment block body.
pub const COMMENT_ZONE: &str = "comment";

/// First byte of the STREAMINFO header, rewritten when a new comment block
/// takes over the last-block flag.
const STREAMINFO_HEADER_ZONE: &str = "streaminfo_header";

const BLOCK_HEADER_LEN: usize = 4;
const LAST_BLOCK_FLAG: u8 = 0x80;
const MAX_BLOCK_LEN: usize = 0x00FF_FFFF;

/// Metadata block types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    CueSheet,
    Picture,
    Reserved(u8),
}

impl BlockType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::StreamInfo,
            1 => Self::Padding,
            2 => Self::Application,
            3 => Self::SeekTable,
            4 => Self::VorbisComment,
            5 => Self::CueSheet,
            6 => Self::Picture,
            other => Self::Reserved(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::StreamInfo => 0,
            Self::Padding => 1,
            Self::Application => 2,
            Self::SeekTable => 3,
            Self::VorbisComment => 4,
            Self::CueSheet => 5,
            Self::Picture => 6,
            Self::Reserved(code) => code,
        }
    }
}

/// A metadata block header and where its body sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Absolute offset of the 4-byte header.
    pub offset: usize,
    pub is_last: bool,
    pub block_type: BlockType,
    /// Body length, header excluded.
    pub length: usize,
}

impl BlockHeader {
    pub fn body_offset(&self) -> usize {
        self.offset + BLOCK_HEADER_LEN
    }

    pub fn end(&self) -> usize {
        self.body_offset() + self.length
    }
}

/// Metadata read from a FLAC stream.
#[derive(Debug, Clone)]
pub struct FlacTag {
    pub tag: TagData,
    /// `true` when a comment block declares at least one field.
    pub exists: bool,
    /// Offset of the `fLaC` marker, non-zero after an ID3v2 prefix.
    pub marker_offset: usize,
    pub streaminfo: BlockHeader,
    pub blocks: Vec<BlockHeader>,
    pub zones: ZoneStructure,
}

impl FlacTag {
    pub fn comment_block(&self) -> Option<&BlockHeader> {
        self.blocks.iter().find(|b| b.block_type == BlockType::VorbisComment)
    }

    /// Offset of the first audio frame.
    pub fn audio_offset(&self) -> usize {
        self.blocks.last().map_or(self.streaminfo.end(), BlockHeader::end)
    }
}

/// Walk the metadata blocks of `source` and decode the comment and picture
/// blocks.
pub fn parse(source: &[u8], options: &ReadOptions) -> Result<FlacTag> {
    let marker_offset = id3v2_len(source);
    if source.get(marker_offset..marker_offset + FLAC_MARKER.len()) != Some(FLAC_MARKER) {
        return Err(TagError::UnsupportedContainer("missing fLaC marker".into()));
    }

    let blocks = read_block_headers(source, marker_offset + FLAC_MARKER.len())?;
    let streaminfo = match blocks.first() {
        Some(block) if block.block_type == BlockType::StreamInfo => *block,
        _ => return Err(TagError::MalformedTag("first metadata block is not STREAMINFO".into())),
    };

    let codec = VorbisTag::new(CodecOptions::flac(), false);
    let mut tag = TagData::new();
    let mut exists = false;
    let mut zones = ZoneStructure::new();

    for block in &blocks {
        let body = &source[block.body_offset()..block.end()];
        match block.block_type {
            BlockType::VorbisComment if zones.zone(COMMENT_ZONE).is_none() => {
                let result = codec.read(&mut Cursor::new(body), options)?;
                exists = result.exists;
                tag.fields = result.tag.fields;
                tag.additional_fields = result.tag.additional_fields;
                tag.pictures.extend(result.tag.pictures);

                zones.add_zone(Zone::new(COMMENT_ZONE, block.body_offset() as u64, block.length as u64, &[]));
                zones.add_size_field(SizeField {
                    offset: block.offset as u64 + 1,
                    width: SizeWidth::U24Be,
                    value: block.length as u64,
                    zone: COMMENT_ZONE.into(),
                });
            }
            BlockType::VorbisComment => {
                log::warn!("Ignoring extra VORBIS_COMMENT block @{}", block.offset);
            }
            BlockType::Picture if options.read_pictures => match PictureBlock::decode(body) {
                Ok((header, data)) => {
                    let position = tag.next_picture_position(header.pic_type, TagType::Native);
                    tag.pictures
                        .push(header.into_picture(data.to_vec(), TagType::Native, position));
                }
                Err(e) => log::warn!("Skipping PICTURE block @{}: {e}", block.offset),
            },
            _ => {}
        }
    }

    if zones.zone(COMMENT_ZONE).is_none() {
        // New comment block goes right after STREAMINFO
        zones.add_zone(Zone::new(COMMENT_ZONE, streaminfo.end() as u64, 0, &[]));
        if streaminfo.is_last {
            zones.add_zone(Zone::new(STREAMINFO_HEADER_ZONE, streaminfo.offset as u64, 1, &[]));
        }
    }

    log::debug!(
        "FLAC: {} metadata blocks, {} fields, {} pictures",
        blocks.len(),
        tag.fields.len(),
        tag.pictures.len()
    );

    Ok(FlacTag {
        tag,
        exists,
        marker_offset,
        streaminfo,
        blocks,
        zones,
    })
}

/// Apply `edits` to the comment block of `source` and return the new stream.
///
/// Everything outside the comment block is copied verbatim. A comment block is
/// created after STREAMINFO when the stream has none.
pub fn rewrite_flac(source: &[u8], edits: &TagData, enable_padding: bool) -> Result<Vec<u8>> {
    let prior = parse(
        source,
        &ReadOptions {
            read_all_fields: true,
            read_pictures: false,
        },
    )?;
    let body = VorbisTag::new(CodecOptions::flac(), enable_padding).write(edits, &prior.tag)?;

    let mut replacements = BTreeMap::new();
    if prior.comment_block().is_some() {
        replacements.insert(COMMENT_ZONE.to_string(), body);
    } else {
        if body.len() > MAX_BLOCK_LEN {
            return Err(TagError::SizeOverflow {
                zone: COMMENT_ZONE.into(),
                size: body.len() as u64,
            });
        }

        let streaminfo = prior.streaminfo;
        let flag = if streaminfo.is_last { LAST_BLOCK_FLAG } else { 0 };
        let mut block = Vec::with_capacity(BLOCK_HEADER_LEN + body.len());
        block.push(flag | BlockType::VorbisComment.code());
        block.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
        block.extend_from_slice(&body);
        replacements.insert(COMMENT_ZONE.to_string(), block);

        if streaminfo.is_last {
            let header = source[streaminfo.offset] & !LAST_BLOCK_FLAG;
            replacements.insert(STREAMINFO_HEADER_ZONE.to_string(), vec![header]);
        }
        log::debug!("Inserting VORBIS_COMMENT block after STREAMINFO");
    }

    prior.zones.rewrite(source, &replacements)
}

/// Read the metadata of a FLAC file.
pub fn read_flac(path: &Path, options: &ReadOptions) -> anyhow::Result<FlacTag> {
    let source = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let tag = parse(&source, options)
        .with_context(|| format!("Failed to parse FLAC metadata in {}", path.display()))?;
    Ok(tag)
}

/// Merge `edits` into the comment block of a FLAC file in place.
pub fn write_flac(path: &Path, edits: &TagData, config: &Config) -> anyhow::Result<()> {
    let source = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let output = rewrite_flac(&source, edits, config.write.enable_padding)
        .with_context(|| format!("Failed to rewrite tag of {}", path.display()))?;
    std::fs::write(path, &output).with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!(
        "Tag written to {} ({} -> {} bytes)",
        path.display(),
        source.len(),
        output.len()
    );
    Ok(())
}

/// Remove every field of a FLAC file's comment block, keeping the vendor.
pub fn clear_flac(path: &Path, config: &Config) -> anyhow::Result<()> {
    let current = read_flac(path, &ReadOptions::default())?;
    let edits = VorbisTag::deletion_tag(&current.tag);
    write_flac(path, &edits, config)
}

/// Length of a leading ID3v2 tag, header and footer included.
fn id3v2_len(source: &[u8]) -> usize {
    if source.len() < 10 || &source[0..3] != b"ID3" {
        return 0;
    }
    // 4 x 7-bit syncsafe
    let size = source[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | usize::from(b & 0x7F));
    let footer = if source[5] & 0x10 != 0 { 10 } else { 0 };
    10 + size + footer
}

fn read_block_headers(source: &[u8], mut pos: usize) -> Result<Vec<BlockHeader>> {
    let mut blocks = Vec::new();

    loop {
        let header = source.get(pos..pos + BLOCK_HEADER_LEN).ok_or_else(|| {
            TagError::MalformedTag(format!("metadata block header @{pos} past end of stream"))
        })?;
        let block = BlockHeader {
            offset: pos,
            is_last: header[0] & LAST_BLOCK_FLAG != 0,
            block_type: BlockType::from_code(header[0] & !LAST_BLOCK_FLAG),
            length: u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize,
        };
        if block.end() > source.len() {
            return Err(TagError::MalformedTag(format!(
                "{:?} block @{pos} declares {} bytes past end of stream",
                block.block_type, block.length
            )));
        }

        blocks.push(block);
        if block.is_last {
            return Ok(blocks);
        }
        pos = block.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{AdditionalField, Field, Picture, PictureType};
    use crate::vorbis::{PADDING_SIZE, VENDOR_KEY, picture_block};

    const AUDIO: &[u8] = b"\xFF\xF8\x69\x08audio frames follow";

    fn block(last: bool, block_type: BlockType, body: &[u8]) -> Vec<u8> {
        let flag = if last { LAST_BLOCK_FLAG } else { 0 };
        let mut out = vec![flag | block_type.code()];
        out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
        out.extend_from_slice(body);
        out
    }

    fn streaminfo(last: bool) -> Vec<u8> {
        block(last, BlockType::StreamInfo, &[0x11; 34])
    }

    fn comment(last: bool, tag: &TagData) -> Vec<u8> {
        let body = VorbisTag::new(CodecOptions::flac(), false)
            .write(tag, &TagData::new())
            .unwrap();
        block(last, BlockType::VorbisComment, &body)
    }

    fn flac(blocks: &[Vec<u8>]) -> Vec<u8> {
        let mut out = FLAC_MARKER.to_vec();
        for b in blocks {
            out.extend_from_slice(b);
        }
        out.extend_from_slice(AUDIO);
        out
    }

    fn titled(title: &str) -> TagData {
        let mut tag = TagData::new();
        tag.set(Field::Title, title);
        tag
    }

    fn types(tag: &FlacTag) -> Vec<BlockType> {
        tag.blocks.iter().map(|b| b.block_type).collect()
    }

    // ── parse ────────────────────────────────────────────────────────

    #[test]
    fn parse_reads_comment_and_picture_blocks() {
        let pic = Picture {
            mime_type: "image/jpeg".into(),
            description: "cover".into(),
            ..Picture::new(PictureType::Front, vec![0xAB; 32])
        };
        let source = flac(&[
            streaminfo(false),
            comment(false, &titled("Song")),
            block(false, BlockType::Picture, &picture_block::encode(&pic)),
            block(true, BlockType::Padding, &[0; 16]),
        ]);

        let tag = parse(&source, &ReadOptions::default()).unwrap();
        assert!(tag.exists);
        assert_eq!(tag.tag.get(Field::Title), Some("Song"));
        assert_eq!(tag.tag.pictures.len(), 1);
        assert_eq!(tag.tag.pictures[0].pic_type, PictureType::Front);
        assert_eq!(tag.tag.pictures[0].description, "cover");
        assert_eq!(tag.tag.pictures[0].data, vec![0xAB; 32]);
        assert_eq!(&source[tag.audio_offset()..], AUDIO);

        let zone = tag.zones.zone(COMMENT_ZONE).unwrap();
        assert_eq!(zone.offset, 4 + 4 + 34 + 4);
        assert_eq!(tag.zones.size_fields()[0].offset, 4 + 4 + 34 + 1);
    }

    #[test]
    fn pictures_skipped_when_disabled() {
        let pic = Picture::new(PictureType::Front, vec![1; 8]);
        let source = flac(&[
            streaminfo(false),
            block(true, BlockType::Picture, &picture_block::encode(&pic)),
        ]);
        let options = ReadOptions {
            read_all_fields: true,
            read_pictures: false,
        };
        assert!(parse(&source, &options).unwrap().tag.pictures.is_empty());
    }

    #[test]
    fn broken_picture_block_is_skipped() {
        let source = flac(&[streaminfo(false), block(true, BlockType::Picture, &[0, 0, 0, 3, 0, 0])]);
        let tag = parse(&source, &ReadOptions::default()).unwrap();
        assert!(tag.tag.pictures.is_empty());
    }

    #[test]
    fn not_flac_is_unsupported() {
        let err = parse(b"RIFF\x00\x00\x00\x00WAVE", &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, TagError::UnsupportedContainer(_)));
    }

    #[test]
    fn truncated_metadata_is_malformed() {
        let mut source = FLAC_MARKER.to_vec();
        source.extend_from_slice(&[0x00, 0x00, 0x00, 0x22, 0x11, 0x11]);
        let err = parse(&source, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, TagError::MalformedTag(_)));
    }

    #[test]
    fn first_block_must_be_streaminfo() {
        let source = flac(&[block(true, BlockType::Padding, &[0; 4])]);
        let err = parse(&source, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, TagError::MalformedTag(_)));
    }

    #[test]
    fn id3v2_prefix_is_skipped() {
        let mut source = b"ID3\x04\x00\x00\x00\x00\x00\x05".to_vec();
        source.extend_from_slice(&[0; 5]);
        source.extend_from_slice(&flac(&[streaminfo(true)]));

        let tag = parse(&source, &ReadOptions::default()).unwrap();
        assert_eq!(tag.marker_offset, 15);

        let output = rewrite_flac(&source, &titled("x"), false).unwrap();
        assert_eq!(&output[..15], &source[..15]);
        let reread = parse(&output, &ReadOptions::default()).unwrap();
        assert_eq!(reread.tag.get(Field::Title), Some("x"));
    }

    // ── rewrite ──────────────────────────────────────────────────────

    #[test]
    fn rewrite_patches_block_length_and_keeps_audio() {
        let source = flac(&[
            streaminfo(false),
            comment(false, &titled("Old")),
            block(true, BlockType::Padding, &[0; 16]),
        ]);

        let output = rewrite_flac(&source, &titled("A much longer title"), false).unwrap();
        let tag = parse(&output, &ReadOptions::default()).unwrap();

        assert_eq!(tag.tag.get(Field::Title), Some("A much longer title"));
        assert_eq!(&output[..42], &source[..42]);
        assert_eq!(&output[tag.audio_offset()..], AUDIO);
        assert_eq!(
            types(&tag),
            vec![BlockType::StreamInfo, BlockType::VorbisComment, BlockType::Padding]
        );
        assert_eq!(output.len(), source.len() + "A much longer title".len() - "Old".len());
    }

    #[test]
    fn rewrite_keeps_unmapped_fields() {
        let mut prior = titled("Song");
        prior.add_additional(AdditionalField::new(TagType::Native, "REPLAYGAIN_TRACK_GAIN", "-6.2 dB"));
        let source = flac(&[streaminfo(false), comment(true, &prior)]);

        let mut edits = TagData::new();
        edits.set(Field::Artist, "Band");
        let output = rewrite_flac(&source, &edits, false).unwrap();
        let tag = parse(&output, &ReadOptions::default()).unwrap();

        assert_eq!(tag.tag.get(Field::Title), Some("Song"));
        assert_eq!(tag.tag.get(Field::Artist), Some("Band"));
        assert_eq!(
            tag.tag.additional(TagType::Native, "REPLAYGAIN_TRACK_GAIN"),
            Some("-6.2 dB")
        );
    }

    #[test]
    fn comment_inserted_after_last_streaminfo() {
        let source = flac(&[streaminfo(true)]);
        let output = rewrite_flac(&source, &titled("New"), false).unwrap();

        assert_eq!(output[4] & LAST_BLOCK_FLAG, 0);
        let tag = parse(&output, &ReadOptions::default()).unwrap();
        assert_eq!(types(&tag), vec![BlockType::StreamInfo, BlockType::VorbisComment]);
        assert!(tag.blocks[1].is_last);
        assert_eq!(tag.tag.get(Field::Title), Some("New"));
        assert_eq!(&output[tag.audio_offset()..], AUDIO);
    }

    #[test]
    fn comment_inserted_before_other_blocks() {
        let source = flac(&[streaminfo(false), block(true, BlockType::Padding, &[0; 8])]);
        let output = rewrite_flac(&source, &titled("New"), false).unwrap();

        let tag = parse(&output, &ReadOptions::default()).unwrap();
        assert_eq!(
            types(&tag),
            vec![BlockType::StreamInfo, BlockType::VorbisComment, BlockType::Padding]
        );
        assert!(!tag.blocks[1].is_last);
        assert!(tag.blocks[2].is_last);
    }

    #[test]
    fn padding_does_not_accumulate() {
        let source = flac(&[streaminfo(false), comment(true, &titled("Song"))]);
        let once = rewrite_flac(&source, &TagData::new(), true).unwrap();
        let twice = rewrite_flac(&once, &TagData::new(), true).unwrap();

        assert_eq!(once.len(), source.len() + PADDING_SIZE);
        assert_eq!(once, twice);
    }

    // ── files ────────────────────────────────────────────────────────

    #[test]
    fn write_and_clear_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.flac");
        let mut prior = titled("Song");
        prior.add_additional(AdditionalField::new(TagType::Native, VENDOR_KEY, "encoder"));
        std::fs::write(&path, flac(&[streaminfo(false), comment(true, &prior)])).unwrap();

        let config = Config::default();
        write_flac(&path, &titled("Renamed"), &config).unwrap();
        let tag = read_flac(&path, &ReadOptions::default()).unwrap();
        assert_eq!(tag.tag.get(Field::Title), Some("Renamed"));

        clear_flac(&path, &config).unwrap();
        let tag = read_flac(&path, &ReadOptions::default()).unwrap();
        assert!(!tag.exists);
        assert!(tag.tag.fields.is_empty());
        assert_eq!(tag.tag.additional(TagType::Native, VENDOR_KEY), Some("encoder"));

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.ends_with(AUDIO));
    }

    #[test]
    fn read_missing_file_has_context() {
        let err = read_flac(Path::new("/nonexistent/track.flac"), &ReadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}

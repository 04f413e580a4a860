use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use image::ImageFormat;
use std::io::{Read, Seek, SeekFrom};

use super::{
    CORE_SIGNATURE, COVERART_KEY, LARGE_FIELD_THRESHOLD, PICTURE_KEY, PictureBlock, ReadOptions, ReadResult,
    VENDOR_KEY, VorbisTag, field_for_key,
};
use crate::error::{Result, TagError, eof_as_malformed};
use crate::tag::{AdditionalField, Picture, PictureType, TagData, TagType, sniff_format};
use crate::zone::{DEFAULT_ZONE, Zone};

/// Keys of large records are searched for `=` this many bytes at a time.
const KEY_CHUNK: usize = 20;

/// Pictures are framed in fixed-size blocks, so payloads may carry stray
/// padding or non-canonical trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

impl VorbisTag {
    /// Read a comment block starting at the current position of `source`.
    ///
    /// The returned zone spans the vendor string through the last record
    /// (plus the framing byte when this variant uses one).
    pub fn read<R: Read + Seek>(&self, source: &mut R, options: &ReadOptions) -> Result<ReadResult> {
        let initial_pos = source.stream_position()?;
        let stream_end = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(initial_pos))?;

        let mut tag = TagData::new();
        let mut index: u32 = 0;
        let mut field_count: u32 = 0;

        loop {
            let size = read_i32_le(source, "record length")?;
            let record_start = source.stream_position()?;
            let record_end = u64::try_from(size)
                .ok()
                .map(|len| record_start + len)
                .filter(|end| *end <= stream_end)
                .ok_or_else(|| {
                    TagError::MalformedTag(format!(
                        "record {index} at offset {record_start} declares {size} bytes, stream ends at {stream_end}"
                    ))
                })?;

            if size < LARGE_FIELD_THRESHOLD {
                read_text_record(source, size as usize, index, &mut tag, options)?;
            } else {
                read_extended_record(source, size as u64, &mut tag, options)?;
            }
            source.seek(SeekFrom::Start(record_end))?;

            if index == 0 {
                field_count = read_u32_le(source, "field count")?;
            }

            index += 1;
            if index > field_count {
                break;
            }
        }

        if self.options.framing_bit {
            consume_framing_bit(source, stream_end)?;
        }

        let end_pos = source.stream_position()?;
        let signature: &[u8] = if self.options.core_signature { CORE_SIGNATURE } else { &[] };
        let zone = Zone::new(DEFAULT_ZONE, initial_pos, end_pos - initial_pos, signature);

        log::debug!(
            "Read Vorbis comment: {field_count} declared fields, {} bytes at offset {initial_pos}",
            zone.length
        );

        Ok(ReadResult {
            tag,
            // The vendor string alone does not make a tag
            exists: field_count > 0,
            field_count,
            zone,
        })
    }
}

fn read_text_record<R: Read>(
    source: &mut R,
    size: usize,
    index: u32,
    tag: &mut TagData,
    options: &ReadOptions,
) -> Result<()> {
    let mut buf = vec![0u8; size];
    source
        .read_exact(&mut buf)
        .map_err(|e| eof_as_malformed(e, "text record"))?;
    let text = String::from_utf8_lossy(&buf);
    let text = text.trim();

    match text.split_once('=') {
        Some((key, value)) => set_meta_field(tag, key, value.trim(), options.read_all_fields),
        // First record is the mandatory vendor string
        None if index == 0 => set_meta_field(tag, VENDOR_KEY, text, options.read_all_fields),
        None => log::debug!("Record {index} has no '=', skipped: {text:?}"),
    }
    Ok(())
}

/// Route a key/value pair to a canonical field or to the additional fields.
fn set_meta_field(tag: &mut TagData, key: &str, value: &str, read_all_fields: bool) {
    let key = key.to_uppercase();

    match field_for_key(&key) {
        Some(field) => tag.set(field, value),
        None if read_all_fields => tag.add_additional(AdditionalField::new(TagType::Native, key, value)),
        None => {}
    }
}

fn read_extended_record<R: Read + Seek>(
    source: &mut R,
    size: u64,
    tag: &mut TagData,
    options: &ReadOptions,
) -> Result<()> {
    let Some(key) = read_extended_key(source, size)? else {
        log::debug!("Large record of {size} bytes has no key, skipped");
        return Ok(());
    };

    let is_picture = key.eq_ignore_ascii_case(PICTURE_KEY.as_bytes());
    let is_coverart = key.eq_ignore_ascii_case(COVERART_KEY.as_bytes());
    if !is_picture && !is_coverart {
        log::debug!("Large record '{}' is not a picture, skipped", String::from_utf8_lossy(&key));
        return Ok(());
    }
    if !options.read_pictures {
        return Ok(());
    }

    let encoded = read_base64_payload(source, size, key.len())?;
    let decoded = if is_picture {
        decode_block_picture(&encoded, tag)
    } else {
        decode_coverart(&encoded, tag)
    };

    match decoded {
        Ok(picture) => tag.pictures.push(picture),
        Err(e) => log::warn!("Skipping embedded picture: {e}"),
    }
    Ok(())
}

/// Scan for the `=` separating the key from the payload and leave `source`
/// just after it. Returns `None` when the record holds no `=`.
fn read_extended_key<R: Read + Seek>(source: &mut R, size: u64) -> Result<Option<Vec<u8>>> {
    let mut key = Vec::new();
    let mut chunk = [0u8; KEY_CHUNK];
    let mut consumed = 0u64;

    while consumed < size {
        let n = (size - consumed).min(KEY_CHUNK as u64) as usize;
        source
            .read_exact(&mut chunk[..n])
            .map_err(|e| eof_as_malformed(e, "field key"))?;
        consumed += n as u64;

        if let Some(eq) = chunk[..n].iter().position(|&b| b == b'=') {
            key.extend_from_slice(&chunk[..eq]);
            source.seek(SeekFrom::Current(-((n - eq - 1) as i64)))?;
            return Ok(Some(key));
        }
        key.extend_from_slice(&chunk[..n]);
    }

    Ok(None)
}

/// Read the base64 payload following `KEY=`, trimmed to a multiple of 4
/// bytes, with zero bytes turned into `=` padding.
fn read_base64_payload<R: Read>(source: &mut R, size: u64, key_len: usize) -> Result<Vec<u8>> {
    let len = (size as usize).saturating_sub(1 + key_len);
    let len = len - len % 4;

    let mut encoded = vec![0u8; len];
    source
        .read_exact(&mut encoded)
        .map_err(|e| eof_as_malformed(e, "picture payload"))?;

    // Zero is outside the base64 alphabet
    for byte in encoded.iter_mut().filter(|b| **b == 0) {
        *byte = b'=';
    }
    Ok(encoded)
}

fn decode_base64(encoded: &[u8]) -> Result<Vec<u8>> {
    LENIENT_BASE64
        .decode(encoded)
        .map_err(|e| TagError::UnsupportedPictureEncoding(format!("invalid base64: {e}")))
}

fn decode_block_picture(encoded: &[u8], tag: &TagData) -> Result<Picture> {
    let bytes = decode_base64(encoded)?;
    let (block, data) = PictureBlock::decode(&bytes)?;
    let data = data.to_vec();
    let position = tag.next_picture_position(block.pic_type, TagType::Native);
    Ok(block.into_picture(data, TagType::Native, position))
}

/// Deprecated `COVERART`: raw image bytes with no picture block header.
fn decode_coverart(encoded: &[u8], tag: &TagData) -> Result<Picture> {
    let data = decode_base64(encoded)?;
    let format = sniff_format(&data).unwrap_or_else(|| {
        log::debug!("COVERART image format not recognized, assuming PNG");
        ImageFormat::Png
    });
    let position = tag.next_picture_position(PictureType::Generic, TagType::Native);

    Ok(Picture {
        mime_type: format.to_mime_type().to_string(),
        position,
        ..Picture::new(PictureType::Generic, data)
    })
}

fn consume_framing_bit<R: Read + Seek>(source: &mut R, stream_end: u64) -> Result<()> {
    if source.stream_position()? >= stream_end {
        return Ok(());
    }
    let mut bit = [0u8; 1];
    source.read_exact(&mut bit)?;
    if bit[0] != 1 {
        source.seek(SeekFrom::Current(-1))?;
    }
    Ok(())
}

fn read_i32_le<R: Read>(source: &mut R, what: &str) -> Result<i32> {
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf).map_err(|e| eof_as_malformed(e, what))?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u32_le<R: Read>(source: &mut R, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf).map_err(|e| eof_as_malformed(e, what))?;
    Ok(u32::from_le_bytes(buf))
}

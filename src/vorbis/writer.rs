use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::io::{self, Cursor, Seek, SeekFrom, Write};

use super::{
    FIELD_MAPPING, PADDING_SIZE, PICTURE_KEY, VENDOR_DEFAULT_FLAC, VENDOR_KEY, VorbisTag, latin1_encode,
    picture_block,
};
use crate::error::Result;
use crate::tag::{Picture, TagData, TagType};

impl VorbisTag {
    /// Merge `edits` onto `prior` and serialize the result as a comment block.
    pub fn write(&self, edits: &TagData, prior: &TagData) -> Result<Vec<u8>> {
        let merged = TagData::merge(prior, edits);
        let mut out = Cursor::new(Vec::new());
        let count = self.write_to(&mut out, &merged)?;
        log::debug!("Serialized {count} Vorbis comment fields ({} bytes)", out.get_ref().len());
        Ok(out.into_inner())
    }

    /// Serialize `tag` at the current position of `w` and return the number
    /// of fields written after the vendor string.
    pub fn write_to<W: Write + Seek>(&self, w: &mut W, tag: &TagData) -> io::Result<u32> {
        // Mandatory even when the tag never had one
        let vendor = tag
            .additional(TagType::Native, VENDOR_KEY)
            .unwrap_or(VENDOR_DEFAULT_FLAC);
        w.write_all(&(vendor.len() as u32).to_le_bytes())?;
        w.write_all(vendor.as_bytes())?;

        let counter_pos = w.stream_position()?;
        w.write_all(&0u32.to_le_bytes())?;

        let counter = self.write_frames(w, tag)?;

        if self.options.framing_bit {
            w.write_all(&[1])?;
        }
        if self.enable_padding {
            w.write_all(&[0u8; PADDING_SIZE])?;
        }

        let final_pos = w.stream_position()?;
        w.seek(SeekFrom::Start(counter_pos))?;
        w.write_all(&counter.to_le_bytes())?;
        w.seek(SeekFrom::Start(final_pos))?;

        Ok(counter)
    }

    /// Mapped fields, then additional fields, then pictures when interleaving.
    ///
    /// A picture record shorter than [`super::LARGE_FIELD_THRESHOLD`] bytes is still
    /// written, but readers take it for a text field: it reads back as a
    /// `METADATA_BLOCK_PICTURE` additional field, not as a picture.
    fn write_frames<W: Write + Seek>(&self, w: &mut W, tag: &TagData) -> io::Result<u32> {
        let mut count = 0;

        for (key, field) in FIELD_MAPPING {
            match tag.fields.get(field) {
                Some(value) if !value.is_empty() => {
                    write_record(w, key, value.as_bytes())?;
                    count += 1;
                }
                _ => {}
            }
        }

        for field in &tag.additional_fields {
            if field.tag_type == TagType::Native && !field.marked_for_deletion && field.native_key != VENDOR_KEY {
                write_record(w, &field.native_key, field.value.as_bytes())?;
                count += 1;
            }
        }

        if self.options.interleave_pictures {
            for picture in tag.pictures.iter().filter(|p| is_writable(p)) {
                let block = picture_block::encode(picture);
                write_record(w, PICTURE_KEY, STANDARD.encode(block).as_bytes())?;
                count += 1;
            }
        }

        Ok(count)
    }
}

/// Canonical pictures, or pictures from this tag's own namespace, that are
/// not marked for deletion.
fn is_writable(picture: &Picture) -> bool {
    (picture.pic_type.is_supported() || picture.tag_type == TagType::Native) && !picture.marked_for_deletion
}

/// `[size: u32 LE][KEY=][body]`, size back-patched once the body is written.
fn write_record<W: Write + Seek>(w: &mut W, key: &str, body: &[u8]) -> io::Result<()> {
    let size_pos = w.stream_position()?;
    w.write_all(&0u32.to_le_bytes())?;

    w.write_all(&latin1_encode(key))?;
    w.write_all(b"=")?;
    w.write_all(body)?;

    let end_pos = w.stream_position()?;
    w.seek(SeekFrom::Start(size_pos))?;
    w.write_all(&((end_pos - size_pos - 4) as u32).to_le_bytes())?;
    w.seek(SeekFrom::Start(end_pos))?;
    Ok(())
}

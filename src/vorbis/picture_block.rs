//! FLAC `METADATA_BLOCK_PICTURE` layout.
//!
//! ```text
//! [type][mime len][mime][desc len][desc][width][height][depth][palette][data len][data]
//! ```
//!
//! Every integer is a 32-bit big-endian value, unlike the little-endian
//! record lengths of the surrounding comment block. The same layout is used
//! by FLAC `PICTURE` metadata blocks.

use image::ImageFormat;
use std::io::{Cursor, Read};

use super::{latin1_decode, latin1_encode};
use crate::error::{Result, TagError};
use crate::tag::{ImageProperties, Picture, PictureType, TagType, sniff_format};

/// Size of the fixed-width integers in a picture block.
const FIXED_FIELDS_LEN: usize = 8 * 4;

/// A decoded picture block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureBlock {
    pub native_code: i32,
    pub pic_type: PictureType,
    pub mime_type: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub color_depth: u32,
    pub palette_size: u32,
    pub data_length: u32,
    /// Offset of the image bytes from the start of the block.
    pub data_offset: usize,
}

impl PictureBlock {
    /// Read the block header, leaving `source` positioned on the image bytes.
    pub fn read_header<R: Read>(source: &mut R) -> Result<Self> {
        let native_code = read_i32_be(source)?;
        let mime_len = read_len(source, "MIME type")?;
        let mime_type = latin1_decode(&read_vec(source, mime_len)?);
        let desc_len = read_len(source, "description")?;
        let description = String::from_utf8_lossy(&read_vec(source, desc_len)?).into_owned();

        Ok(Self {
            native_code,
            pic_type: PictureType::from_code(native_code),
            mime_type,
            description,
            width: read_i32_be(source)? as u32,
            height: read_i32_be(source)? as u32,
            color_depth: read_i32_be(source)? as u32,
            palette_size: read_i32_be(source)? as u32,
            data_length: read_i32_be(source)? as u32,
            data_offset: FIXED_FIELDS_LEN + mime_len + desc_len,
        })
    }

    /// Parse a complete block held in memory and return the header with the
    /// image bytes.
    pub fn decode(bytes: &[u8]) -> Result<(Self, &[u8])> {
        let block = Self::read_header(&mut Cursor::new(bytes))?;
        let end = block.data_offset + block.data_length as usize;
        let data = bytes.get(block.data_offset..end).ok_or_else(|| {
            TagError::UnsupportedPictureEncoding(format!(
                "picture data declares {} bytes, {} available",
                block.data_length,
                bytes.len().saturating_sub(block.data_offset)
            ))
        })?;
        Ok((block, data))
    }

    pub fn into_picture(self, data: Vec<u8>, tag_type: TagType, position: usize) -> Picture {
        Picture {
            pic_type: self.pic_type,
            tag_type,
            mime_type: self.mime_type,
            description: self.description,
            width: self.width,
            height: self.height,
            color_depth: self.color_depth,
            palette_size: self.palette_size,
            data,
            position,
            marked_for_deletion: false,
        }
    }
}

/// Serialize `picture` as a picture block.
///
/// Dimensions and color depth come from the image header when it can be
/// parsed, otherwise from the descriptor. The palette size is only written
/// for GIF images.
pub fn encode(picture: &Picture) -> Vec<u8> {
    let props = ImageProperties::probe(&picture.data);

    let mime_type = if picture.mime_type.is_empty() {
        props
            .map(|p| p.format)
            .or_else(|| sniff_format(&picture.data))
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_default()
    } else {
        picture.mime_type.clone()
    };
    let (width, height, color_depth) = props
        .map(|p| (p.width, p.height, p.color_depth))
        .unwrap_or((picture.width, picture.height, picture.color_depth));
    let is_gif = props.map(|p| p.format).or_else(|| picture.format()) == Some(ImageFormat::Gif);
    let palette_size = match (is_gif, props) {
        (true, Some(p)) => p.palette_size,
        (true, None) => picture.palette_size,
        (false, _) => 0,
    };

    let mime = latin1_encode(&mime_type);
    let description = picture.description.as_bytes();

    let mut out = Vec::with_capacity(FIXED_FIELDS_LEN + mime.len() + description.len() + picture.data.len());
    out.extend_from_slice(&picture.pic_type.code().to_be_bytes());
    out.extend_from_slice(&(mime.len() as u32).to_be_bytes());
    out.extend_from_slice(&mime);
    out.extend_from_slice(&(description.len() as u32).to_be_bytes());
    out.extend_from_slice(description);
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&color_depth.to_be_bytes());
    out.extend_from_slice(&palette_size.to_be_bytes());
    out.extend_from_slice(&(picture.data.len() as u32).to_be_bytes());
    out.extend_from_slice(&picture.data);
    out
}

fn read_i32_be<R: Read>(source: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    source
        .read_exact(&mut buf)
        .map_err(|e| TagError::UnsupportedPictureEncoding(format!("truncated picture block: {e}")))?;
    Ok(i32::from_be_bytes(buf))
}

fn read_len<R: Read>(source: &mut R, what: &str) -> Result<usize> {
    let len = read_i32_be(source)?;
    usize::try_from(len)
        .map_err(|_| TagError::UnsupportedPictureEncoding(format!("negative {what} length {len}")))
}

fn read_vec<R: Read>(source: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    source.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(TagError::UnsupportedPictureEncoding(format!(
            "picture block string declares {len} bytes, {} available",
            buf.len()
        )));
    }
    Ok(buf)
}

use image::{ImageDecoder, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::TagType;

/// Canonical picture type, following the ID3v2 APIC type-code table.
///
/// Codes outside the table are kept verbatim in [`PictureType::Unsupported`]
/// so they can be written back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PictureType {
    Generic,
    Icon,
    OtherIcon,
    Front,
    Back,
    Leaflet,
    Media,
    LeadArtist,
    Artist,
    Conductor,
    Band,
    Composer,
    Lyricist,
    RecordingLocation,
    DuringRecording,
    DuringPerformance,
    ScreenCapture,
    BrightFish,
    Illustration,
    BandLogo,
    PublisherLogo,
    /// A native code with no canonical counterpart.
    Unsupported(i32),
}

// Indexed by native type code.
const TYPE_CODES: [PictureType; 21] = [
    PictureType::Generic,
    PictureType::Icon,
    PictureType::OtherIcon,
    PictureType::Front,
    PictureType::Back,
    PictureType::Leaflet,
    PictureType::Media,
    PictureType::LeadArtist,
    PictureType::Artist,
    PictureType::Conductor,
    PictureType::Band,
    PictureType::Composer,
    PictureType::Lyricist,
    PictureType::RecordingLocation,
    PictureType::DuringRecording,
    PictureType::DuringPerformance,
    PictureType::ScreenCapture,
    PictureType::BrightFish,
    PictureType::Illustration,
    PictureType::BandLogo,
    PictureType::PublisherLogo,
];

impl PictureType {
    /// Decode a native picture type code.
    pub fn from_code(code: i32) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|i| TYPE_CODES.get(i).copied())
            .unwrap_or(Self::Unsupported(code))
    }

    /// Native picture type code.
    pub fn code(self) -> i32 {
        match self {
            Self::Unsupported(code) => code,
            other => TYPE_CODES
                .iter()
                .position(|t| *t == other)
                .map(|i| i as i32)
                .unwrap_or(0),
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

/// One embedded picture.
///
/// `position` is 1-based among pictures of the same type, in encounter order.
/// The raw bytes are not serialized; `--json` output reports their length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Picture {
    pub pic_type: PictureType,
    pub tag_type: TagType,
    pub mime_type: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub color_depth: u32,
    pub palette_size: u32,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub position: usize,
    pub marked_for_deletion: bool,
}

impl Picture {
    /// Build a native picture from raw image bytes, filling MIME type and
    /// properties from the image header when it can be recognized.
    pub fn new(pic_type: PictureType, data: Vec<u8>) -> Self {
        let props = ImageProperties::probe(&data);
        let mime_type = sniff_format(&data)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_default();

        Self {
            pic_type,
            tag_type: TagType::Native,
            mime_type,
            description: String::new(),
            width: props.map(|p| p.width).unwrap_or(0),
            height: props.map(|p| p.height).unwrap_or(0),
            color_depth: props.map(|p| p.color_depth).unwrap_or(0),
            palette_size: props.map(|p| p.palette_size).unwrap_or(0),
            data,
            position: 1,
            marked_for_deletion: false,
        }
    }

    /// A placeholder that removes the picture of `pic_type` at `position` when merged.
    pub fn deletion_marker(pic_type: PictureType, position: usize) -> Self {
        Self {
            position,
            marked_for_deletion: true,
            ..Self::new(pic_type, Vec::new())
        }
    }

    /// Image format from the MIME type, falling back to the image header.
    pub fn format(&self) -> Option<ImageFormat> {
        ImageFormat::from_mime_type(&self.mime_type).or_else(|| sniff_format(&self.data))
    }
}

/// Header-derived properties of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProperties {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub color_depth: u32,
    /// Number of palette entries; only GIF carries one.
    pub palette_size: u32,
}

impl ImageProperties {
    /// Read dimensions and color depth from the image header. Returns `None`
    /// when the format is unknown or the header cannot be parsed.
    pub fn probe(data: &[u8]) -> Option<Self> {
        let format = sniff_format(data)?;
        let decoder = ImageReader::with_format(Cursor::new(data), format)
            .into_decoder()
            .ok()?;
        let (width, height) = decoder.dimensions();
        let color_depth = u32::from(decoder.color_type().bits_per_pixel());
        let palette_size = if format == ImageFormat::Gif {
            gif_palette_size(data)
        } else {
            0
        };

        Some(Self {
            format,
            width,
            height,
            color_depth,
            palette_size,
        })
    }
}

/// Detect the image format from its magic bytes.
pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    image::guess_format(data).ok()
}

/// Global color table size from the GIF logical screen descriptor.
fn gif_palette_size(data: &[u8]) -> u32 {
    // Packed byte: bit 7 = table present, bits 0-2 = log2(size) - 1
    match data.get(10) {
        Some(&packed) if packed & 0x80 != 0 => 2 << (packed & 0x07),
        _ => 0,
    }
}

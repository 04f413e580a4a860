//! Zone-based structural rewriting.
//!
//! A [`Zone`] is a named byte range of a source file owned by the tag engine.
//! [`ZoneStructure::rewrite`] splices replacement bytes into each zone and
//! copies everything else verbatim, so audio frames and container markers
//! outside the zones are never touched.
//!
//! Containers usually store the length of a metadata block in a header that
//! sits outside the block itself. Those headers are registered as
//! [`SizeField`]s and patched by the size delta of the zone they count.

use std::collections::BTreeMap;

use crate::error::{Result, TagError};

/// Zone name used when a container has a single tag block.
pub const DEFAULT_ZONE: &str = "default";

/// A replaceable byte range of the source stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub name: String,
    /// Absolute offset in the source stream.
    pub offset: u64,
    pub length: u64,
    /// Content of this zone when it holds the variant's untouched default
    /// block. Empty when the variant has none.
    pub core_signature: Vec<u8>,
}

impl Zone {
    pub fn new(name: impl Into<String>, offset: u64, length: u64, core_signature: &[u8]) -> Self {
        Self {
            name: name.into(),
            offset,
            length,
            core_signature: core_signature.to_vec(),
        }
    }

    /// Saturates at `u64::MAX`; [`ZoneStructure::rewrite`] rejects such zones.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// `true` when the zone's bytes in `source` are exactly the core signature,
    /// i.e. the block was never customized.
    pub fn matches_core_signature(&self, source: &[u8]) -> bool {
        if self.core_signature.is_empty() {
            return false;
        }
        slice_of(source, self.offset, self.length)
            .map(|bytes| bytes == self.core_signature.as_slice())
            .unwrap_or(false)
    }
}

/// Encoding of a header size descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeWidth {
    /// 24-bit big-endian (FLAC metadata block header).
    U24Be,
    U32Be,
    U32Le,
}

impl SizeWidth {
    fn byte_len(self) -> usize {
        match self {
            Self::U24Be => 3,
            Self::U32Be | Self::U32Le => 4,
        }
    }

    fn max(self) -> u64 {
        match self {
            Self::U24Be => 0x00FF_FFFF,
            Self::U32Be | Self::U32Le => u64::from(u32::MAX),
        }
    }

    fn encode(self, value: u32) -> Vec<u8> {
        match self {
            Self::U24Be => value.to_be_bytes()[1..].to_vec(),
            Self::U32Be => value.to_be_bytes().to_vec(),
            Self::U32Le => value.to_le_bytes().to_vec(),
        }
    }
}

/// An integer outside every zone that stores a length depending on `zone`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeField {
    pub offset: u64,
    pub width: SizeWidth,
    /// Value currently stored in the source.
    pub value: u64,
    pub zone: String,
}

/// The zones and size descriptors registered while reading a file.
#[derive(Debug, Clone, Default)]
pub struct ZoneStructure {
    zones: Vec<Zone>,
    size_fields: Vec<SizeField>,
}

impl ZoneStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone. A zone with the same name is replaced.
    pub fn add_zone(&mut self, zone: Zone) {
        self.zones.retain(|z| z.name != zone.name);
        self.zones.push(zone);
    }

    pub fn add_size_field(&mut self, field: SizeField) {
        self.size_fields.push(field);
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.name == name)
    }

    pub fn size_fields(&self) -> &[SizeField] {
        &self.size_fields
    }

    /// Build a copy of `source` where each zone named in `replacements` is
    /// replaced by the given bytes and every size field follows the new
    /// length of its zone. Zones without a replacement are copied as is.
    pub fn rewrite(&self, source: &[u8], replacements: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>> {
        let mut zones: Vec<&Zone> = self.zones.iter().collect();
        zones.sort_by_key(|z| z.offset);
        self.validate(source, &zones)?;

        for name in replacements.keys() {
            if self.zone(name).is_none() {
                return Err(TagError::MalformedTag(format!("no zone named '{name}'")));
            }
        }

        let mut out = Vec::with_capacity(source.len());
        let mut deltas: BTreeMap<&str, i64> = BTreeMap::new();
        let mut pos = 0usize;

        for zone in &zones {
            let start = zone.offset as usize;
            let end = zone.end() as usize;
            out.extend_from_slice(&source[pos..start]);

            match replacements.get(&zone.name) {
                Some(bytes) => {
                    log::debug!(
                        "Zone '{}' @{}: {} -> {} bytes",
                        zone.name,
                        zone.offset,
                        zone.length,
                        bytes.len()
                    );
                    out.extend_from_slice(bytes);
                    deltas.insert(zone.name.as_str(), bytes.len() as i64 - zone.length as i64);
                }
                None => {
                    out.extend_from_slice(&source[start..end]);
                    deltas.insert(zone.name.as_str(), 0);
                }
            }
            pos = end;
        }
        out.extend_from_slice(&source[pos..]);

        for field in &self.size_fields {
            let shift: i64 = zones
                .iter()
                .filter(|z| z.end() <= field.offset)
                .map(|z| deltas.get(z.name.as_str()).copied().unwrap_or(0))
                .sum();
            let delta = deltas
                .get(field.zone.as_str())
                .copied()
                .ok_or_else(|| TagError::MalformedTag(format!("size field refers to unknown zone '{}'", field.zone)))?;

            let new_value = field.value as i64 + delta;
            if new_value < 0 || new_value as u64 > field.width.max() {
                return Err(TagError::SizeOverflow {
                    zone: field.zone.clone(),
                    size: new_value.max(0) as u64,
                });
            }

            let at = (field.offset as i64 + shift) as usize;
            let encoded = field.width.encode(new_value as u32);
            out[at..at + encoded.len()].copy_from_slice(&encoded);
        }

        Ok(out)
    }

    fn validate(&self, source: &[u8], sorted: &[&Zone]) -> Result<()> {
        let len = source.len() as u64;
        let mut prev_end = 0u64;

        for zone in sorted {
            let end = zone
                .offset
                .checked_add(zone.length)
                .filter(|end| *end <= len)
                .ok_or_else(|| {
                    TagError::MalformedTag(format!(
                        "zone '{}' at {} ({} bytes) exceeds source length {len}",
                        zone.name, zone.offset, zone.length
                    ))
                })?;
            if zone.offset < prev_end {
                return Err(TagError::MalformedTag(format!("zone '{}' overlaps another zone", zone.name)));
            }
            prev_end = end;
        }

        for field in &self.size_fields {
            let field_end = field.offset.saturating_add(field.width.byte_len() as u64);
            if field_end > len {
                return Err(TagError::MalformedTag(format!(
                    "size field @{} exceeds source length {len}",
                    field.offset
                )));
            }
            if sorted.iter().any(|z| field.offset < z.end() && field_end > z.offset) {
                return Err(TagError::MalformedTag(format!(
                    "size field @{} lies inside a zone",
                    field.offset
                )));
            }
        }

        Ok(())
    }
}

fn slice_of(source: &[u8], offset: u64, length: u64) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(length).ok()?)?;
    source.get(start..end)
}

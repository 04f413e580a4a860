//! Canonical, format-agnostic tag model.
//!
//! [`TagData`] holds three things:
//!
//! - well-known [`Field`]s mapped from native keys,
//! - [`AdditionalField`]s for native keys with no canonical mapping,
//! - embedded [`Picture`]s.
//!
//! Absence of a field means "not set". An empty value means "explicitly
//! cleared": it overrides the prior value on [`TagData::merge`] and is omitted
//! when written. Additional fields and pictures are deleted by marking, never
//! by writing an empty frame.

mod picture;

pub use picture::{ImageProperties, Picture, PictureType, sniff_format};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known tag fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    GeneralDescription,
    Title,
    Artist,
    Album,
    RecordingDate,
    Genre,
    Composer,
    TrackNumber,
    DiscNumber,
    Comment,
    AlbumArtist,
    Conductor,
    Rating,
    Copyright,
    Publisher,
}

/// Namespace a field or picture was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagType {
    Id3v1,
    Id3v2,
    Ape,
    /// The container's own comment tag (Vorbis comment for Ogg/FLAC).
    Native,
}

/// A native key/value pair with no canonical mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalField {
    pub tag_type: TagType,
    pub native_key: String,
    pub value: String,
    pub marked_for_deletion: bool,
}

impl AdditionalField {
    pub fn new(tag_type: TagType, native_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag_type,
            native_key: native_key.into(),
            value: value.into(),
            marked_for_deletion: false,
        }
    }

    fn same_key(&self, other: &Self) -> bool {
        self.tag_type == other.tag_type && self.native_key == other.native_key
    }
}

/// In-memory tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagData {
    pub fields: BTreeMap<Field, String>,
    pub additional_fields: Vec<AdditionalField>,
    pub pictures: Vec<Picture>,
}

impl TagData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Set a canonical field, overwriting any previous value.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    /// Look up a live (not deletion-marked) additional field.
    pub fn additional(&self, tag_type: TagType, native_key: &str) -> Option<&str> {
        self.additional_fields
            .iter()
            .find(|f| f.tag_type == tag_type && f.native_key == native_key && !f.marked_for_deletion)
            .map(|f| f.value.as_str())
    }

    /// Add an additional field. An existing entry with the same key is
    /// removed and the new one is appended at the end.
    pub fn add_additional(&mut self, field: AdditionalField) {
        self.additional_fields.retain(|f| !f.same_key(&field));
        self.additional_fields.push(field);
    }

    /// 1-based position for the next picture of `pic_type` read from `tag_type`.
    pub fn next_picture_position(&self, pic_type: PictureType, tag_type: TagType) -> usize {
        let taken = self
            .pictures
            .iter()
            .filter(|p| p.pic_type == pic_type && (pic_type.is_supported() || p.tag_type == tag_type))
            .count();
        taken + 1
    }

    /// Apply `edits` on top of `prior` and return the result.
    ///
    /// - fields from `edits` overwrite, empty values included
    /// - additional fields replace by key and move to the end
    /// - pictures match on type and position: a deletion marker marks the prior
    ///   picture deleted, anything else replaces it, unmatched ones are appended
    pub fn merge(prior: &TagData, edits: &TagData) -> TagData {
        let mut merged = prior.clone();

        for (field, value) in &edits.fields {
            merged.fields.insert(*field, value.clone());
        }

        for field in &edits.additional_fields {
            merged.add_additional(field.clone());
        }

        for pic in &edits.pictures {
            let existing = merged
                .pictures
                .iter_mut()
                .find(|p| p.pic_type == pic.pic_type && p.position == pic.position);

            match existing {
                Some(current) if pic.marked_for_deletion => current.marked_for_deletion = true,
                Some(current) => *current = pic.clone(),
                None if pic.marked_for_deletion => {
                    log::debug!("No {:?} picture at position {} to delete", pic.pic_type, pic.position);
                }
                None => merged.pictures.push(pic.clone()),
            }
        }

        merged
    }

    /// Edits that clear everything `existing` holds.
    ///
    /// Mapped fields become empty; additional fields (except `keep_key`, used
    /// for the mandatory vendor string) and pictures are marked for deletion.
    pub fn deletion_of(existing: &TagData, fields: &[Field], keep_key: &str) -> TagData {
        let mut tag = TagData::new();

        for field in fields {
            tag.set(*field, "");
        }

        for field in &existing.additional_fields {
            if field.native_key != keep_key {
                tag.additional_fields.push(AdditionalField {
                    marked_for_deletion: true,
                    ..field.clone()
                });
            }
        }

        for pic in &existing.pictures {
            tag.pictures.push(Picture::deletion_marker(pic.pic_type, pic.position));
        }

        tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picture(pic_type: PictureType, position: usize, data: &[u8]) -> Picture {
        Picture {
            position,
            ..Picture::new(pic_type, data.to_vec())
        }
    }

    // ── fields ───────────────────────────────────────────────────────

    #[test]
    fn set_overwrites_field() {
        let mut tag = TagData::new();
        tag.set(Field::Artist, "Foo");
        tag.set(Field::Artist, "Bar");
        assert_eq!(tag.get(Field::Artist), Some("Bar"));
        assert_eq!(tag.fields.len(), 1);
    }

    #[test]
    fn additional_field_replaced_and_reappended() {
        let mut tag = TagData::new();
        tag.add_additional(AdditionalField::new(TagType::Native, "MOOD", "calm"));
        tag.add_additional(AdditionalField::new(TagType::Native, "LABEL", "Warp"));
        tag.add_additional(AdditionalField::new(TagType::Native, "MOOD", "angry"));

        assert_eq!(tag.additional_fields.len(), 2);
        assert_eq!(tag.additional_fields[0].native_key, "LABEL");
        assert_eq!(tag.additional_fields[1].value, "angry");
        assert_eq!(tag.additional(TagType::Native, "MOOD"), Some("angry"));
    }

    #[test]
    fn additional_keys_are_scoped_by_tag_type() {
        let mut tag = TagData::new();
        tag.add_additional(AdditionalField::new(TagType::Native, "MOOD", "calm"));
        tag.add_additional(AdditionalField::new(TagType::Ape, "MOOD", "loud"));
        assert_eq!(tag.additional_fields.len(), 2);
    }

    // ── merge ────────────────────────────────────────────────────────

    #[test]
    fn merge_overlays_fields() {
        let mut prior = TagData::new();
        prior.set(Field::Title, "Old");
        prior.set(Field::Album, "Kept");

        let mut edits = TagData::new();
        edits.set(Field::Title, "New");
        edits.set(Field::Genre, "");

        let merged = TagData::merge(&prior, &edits);
        assert_eq!(merged.get(Field::Title), Some("New"));
        assert_eq!(merged.get(Field::Album), Some("Kept"));
        assert_eq!(merged.get(Field::Genre), Some(""));
        // prior is untouched
        assert_eq!(prior.get(Field::Title), Some("Old"));
    }

    #[test]
    fn merge_marks_additional_deleted() {
        let mut prior = TagData::new();
        prior.add_additional(AdditionalField::new(TagType::Native, "MOOD", "calm"));

        let mut edits = TagData::new();
        edits.add_additional(AdditionalField {
            marked_for_deletion: true,
            ..AdditionalField::new(TagType::Native, "MOOD", "")
        });

        let merged = TagData::merge(&prior, &edits);
        assert_eq!(merged.additional_fields.len(), 1);
        assert!(merged.additional_fields[0].marked_for_deletion);
        assert_eq!(merged.additional(TagType::Native, "MOOD"), None);
    }

    #[test]
    fn merge_pictures_replace_delete_append() {
        let mut prior = TagData::new();
        prior.pictures.push(picture(PictureType::Front, 1, b"front"));
        prior.pictures.push(picture(PictureType::Back, 1, b"back"));

        let mut edits = TagData::new();
        edits.pictures.push(picture(PictureType::Front, 1, b"new front"));
        edits.pictures.push(Picture::deletion_marker(PictureType::Back, 1));
        edits.pictures.push(picture(PictureType::Media, 1, b"cd"));

        let merged = TagData::merge(&prior, &edits);
        assert_eq!(merged.pictures.len(), 3);
        assert_eq!(merged.pictures[0].data, b"new front");
        assert!(merged.pictures[1].marked_for_deletion);
        assert_eq!(merged.pictures[2].pic_type, PictureType::Media);
    }

    #[test]
    fn merge_ignores_deletion_of_missing_picture() {
        let mut edits = TagData::new();
        edits.pictures.push(Picture::deletion_marker(PictureType::Front, 1));
        let merged = TagData::merge(&TagData::new(), &edits);
        assert!(merged.pictures.is_empty());
    }

    // ── deletion / positions ─────────────────────────────────────────

    #[test]
    fn deletion_of_clears_everything_but_vendor() {
        let mut existing = TagData::new();
        existing.set(Field::Title, "T");
        existing.add_additional(AdditionalField::new(TagType::Native, "VENDOR", "libFLAC"));
        existing.add_additional(AdditionalField::new(TagType::Native, "MOOD", "calm"));
        existing.pictures.push(picture(PictureType::Front, 1, b"x"));

        let deletion = TagData::deletion_of(&existing, &[Field::Title, Field::Artist], "VENDOR");
        assert_eq!(deletion.get(Field::Title), Some(""));
        assert_eq!(deletion.get(Field::Artist), Some(""));
        assert_eq!(deletion.additional_fields.len(), 1);
        assert_eq!(deletion.additional_fields[0].native_key, "MOOD");
        assert!(deletion.additional_fields[0].marked_for_deletion);
        assert!(deletion.pictures[0].marked_for_deletion);

        let merged = TagData::merge(&existing, &deletion);
        assert_eq!(merged.additional(TagType::Native, "VENDOR"), Some("libFLAC"));
        assert_eq!(merged.additional(TagType::Native, "MOOD"), None);
    }

    #[test]
    fn picture_positions_count_per_type() {
        let mut tag = TagData::new();
        assert_eq!(tag.next_picture_position(PictureType::Front, TagType::Native), 1);
        tag.pictures.push(picture(PictureType::Front, 1, b"a"));
        tag.pictures.push(picture(PictureType::Back, 1, b"b"));
        assert_eq!(tag.next_picture_position(PictureType::Front, TagType::Native), 2);
        assert_eq!(tag.next_picture_position(PictureType::Back, TagType::Native), 2);
        assert_eq!(tag.next_picture_position(PictureType::Unsupported(42), TagType::Native), 1);
    }
}

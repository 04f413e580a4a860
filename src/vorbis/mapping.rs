use crate::tag::Field;

/// Native Vorbis comment keys mapped to canonical fields, in write order.
pub const FIELD_MAPPING: &[(&str, Field)] = &[
    ("DESCRIPTION", Field::GeneralDescription),
    ("ARTIST", Field::Artist),
    ("TITLE", Field::Title),
    ("ALBUM", Field::Album),
    ("DATE", Field::RecordingDate),
    ("GENRE", Field::Genre),
    ("COMPOSER", Field::Composer),
    ("TRACKNUMBER", Field::TrackNumber),
    ("DISCNUMBER", Field::DiscNumber),
    ("COMMENT", Field::Comment),
    ("ALBUMARTIST", Field::AlbumArtist),
    ("CONDUCTOR", Field::Conductor),
    ("RATING", Field::Rating),
    ("COPYRIGHT", Field::Copyright),
    ("PUBLISHER", Field::Publisher),
];

/// Canonical field for an upper-cased native key.
pub fn field_for_key(key: &str) -> Option<Field> {
    FIELD_MAPPING
        .iter()
        .find(|(native, _)| *native == key)
        .map(|(_, field)| *field)
}

pub fn key_for_field(field: Field) -> Option<&'static str> {
    FIELD_MAPPING
        .iter()
        .find(|(_, f)| *f == field)
        .map(|(native, _)| *native)
}

/// All fields this codec maps.
pub fn mapped_fields() -> Vec<Field> {
    FIELD_MAPPING.iter().map(|(_, field)| *field).collect()
}

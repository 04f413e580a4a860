use std::fs;
use std::io::Cursor;

use tempfile::TempDir;
use vorbis_tag::config::Config;
use vorbis_tag::flac::{self, BlockType};
use vorbis_tag::pipeline::{self, Action};
use vorbis_tag::tag::{AdditionalField, Field, Picture, PictureType, TagData, TagType};
use vorbis_tag::vorbis::{CodecOptions, ReadOptions, VorbisTag, picture_block};

const AUDIO: &[u8] = b"\xFF\xF8\x69\x08\x00\x00\x01\x02\x03 frames, never touched";

fn header(last: bool, block_type: BlockType, len: usize) -> Vec<u8> {
    let mut out = vec![if last { 0x80 } else { 0 } | block_type.code()];
    out.extend_from_slice(&(len as u32).to_be_bytes()[1..]);
    out
}

/// STREAMINFO, a PICTURE block and PADDING, no comment block.
fn untagged_flac() -> Vec<u8> {
    let picture = Picture {
        mime_type: "image/png".into(),
        ..Picture::new(PictureType::Front, vec![0x5A; 128])
    };
    let picture = picture_block::encode(&picture);

    let mut bytes = b"fLaC".to_vec();
    bytes.extend(header(false, BlockType::StreamInfo, 34));
    bytes.extend_from_slice(&[0x12; 34]);
    bytes.extend(header(false, BlockType::Picture, picture.len()));
    bytes.extend_from_slice(&picture);
    bytes.extend(header(true, BlockType::Padding, 64));
    bytes.extend_from_slice(&[0; 64]);
    bytes.extend_from_slice(AUDIO);
    bytes
}

#[test]
fn tag_untagged_file_then_edit_and_clear() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("track.flac");
    fs::write(&path, untagged_flac()).unwrap();

    let mut config = Config::default();
    config.output.backup_originals = false;

    let edits = pipeline::build_edits(
        &[
            "TITLE=Xtal".into(),
            "ARTIST=Aphex Twin".into(),
            "REPLAYGAIN_TRACK_GAIN=-7.1 dB".into(),
        ],
        &[],
    )
    .unwrap();
    let result = pipeline::process_file(&path, &Action::Update(edits), &config);
    assert!(result.error.is_none(), "{:?}", result.error);

    let tag = flac::read_flac(&path, &ReadOptions::default()).unwrap();
    assert!(tag.exists);
    assert_eq!(tag.tag.get(Field::Title), Some("Xtal"));
    assert_eq!(tag.tag.get(Field::Artist), Some("Aphex Twin"));
    assert_eq!(
        tag.tag.additional(TagType::Native, "REPLAYGAIN_TRACK_GAIN"),
        Some("-7.1 dB")
    );
    assert_eq!(tag.tag.pictures.len(), 1);
    assert_eq!(tag.tag.pictures[0].data, vec![0x5A; 128]);

    let types: Vec<_> = tag.blocks.iter().map(|b| b.block_type).collect();
    assert_eq!(
        types,
        vec![BlockType::StreamInfo, BlockType::VorbisComment, BlockType::Picture, BlockType::Padding]
    );

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[tag.audio_offset()..], AUDIO);

    // Second edit goes through the existing block
    let edits = pipeline::build_edits(&["ALBUM=Selected Ambient Works 85-92".into()], &["ARTIST".into()]).unwrap();
    let result = pipeline::process_file(&path, &Action::Update(edits), &config);
    assert!(result.error.is_none());

    let tag = flac::read_flac(&path, &ReadOptions::default()).unwrap();
    assert_eq!(tag.tag.get(Field::Title), Some("Xtal"));
    assert_eq!(tag.tag.get(Field::Artist), None);
    assert_eq!(tag.tag.get(Field::Album), Some("Selected Ambient Works 85-92"));
    assert!(fs::read(&path).unwrap().ends_with(AUDIO));

    let result = pipeline::process_file(&path, &Action::Clear, &config);
    assert!(result.error.is_none());
    let tag = flac::read_flac(&path, &ReadOptions::default()).unwrap();
    assert!(!tag.exists);
    assert!(tag.tag.fields.is_empty());
    assert_eq!(tag.tag.additional(TagType::Native, "REPLAYGAIN_TRACK_GAIN"), None);
    // PICTURE blocks live outside the comment
    assert_eq!(tag.tag.pictures.len(), 1);
}

#[test]
fn ogg_comment_round_trip_with_pictures() {
    let codec = VorbisTag::new(CodecOptions::ogg(), false);

    let mut tag = TagData::new();
    tag.set(Field::Title, "Flim");
    tag.set(Field::TrackNumber, "7");
    tag.add_additional(AdditionalField::new(TagType::Native, "MOOD", "wistful"));
    tag.add_additional(AdditionalField::new(TagType::Native, "LABEL", "Warp"));
    tag.pictures.push(Picture {
        mime_type: "image/jpeg".into(),
        description: "front".into(),
        ..Picture::new(PictureType::Front, vec![0xC3; 600])
    });
    tag.pictures.push(Picture {
        mime_type: "image/jpeg".into(),
        position: 2,
        ..Picture::new(PictureType::Front, vec![0x3C; 700])
    });

    let bytes = codec.write(&tag, &TagData::new()).unwrap();
    let read = codec.read(&mut Cursor::new(&bytes), &ReadOptions::default()).unwrap();

    assert!(read.exists);
    assert_eq!(read.field_count, 6);
    assert_eq!(read.zone.length, bytes.len() as u64);
    assert_eq!(read.tag.fields, tag.fields);

    let additional: Vec<_> = read
        .tag
        .additional_fields
        .iter()
        .filter(|f| f.native_key != "VENDOR")
        .map(|f| (f.native_key.as_str(), f.value.as_str()))
        .collect();
    assert_eq!(additional, vec![("MOOD", "wistful"), ("LABEL", "Warp")]);

    assert_eq!(read.tag.pictures.len(), 2);
    assert_eq!(read.tag.pictures[0].description, "front");
    assert_eq!(read.tag.pictures[0].data, vec![0xC3; 600]);
    assert_eq!(read.tag.pictures[1].position, 2);
    assert_eq!(read.tag.pictures[1].data, vec![0x3C; 700]);

    // Rewriting what was read is stable
    let again = codec.write(&TagData::new(), &read.tag).unwrap();
    assert_eq!(again, bytes);
}

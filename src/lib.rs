//! # vorbis-tag
//!
//! Vorbis comment reader and writer for Ogg and FLAC audio files, with
//! embedded picture support and in-place structural rewriting.
//!
//! ## Quick Start
//!
//! The simplest way to use the library is through the pipeline module, which
//! handles the full read → merge → write flow for FLAC files:
//!
//! ```rust,no_run
//! use vorbis_tag::config::Config;
//! use vorbis_tag::pipeline::{Action, build_edits, collect_audio_files, process_file};
//! use std::path::PathBuf;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let edits = build_edits(&["ALBUM=Selected Ambient Works".into()], &["COMMENT".into()])?;
//!
//!     for path in &collect_audio_files(&[PathBuf::from("./music")]) {
//!         let result = process_file(path, &Action::Update(edits.clone()), &config);
//!         if let Some(ref err) = result.error {
//!             eprintln!("Error processing {}: {err}", path.display());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The codec works on any `Read + Seek` stream positioned on a comment block:
//!
//! ```rust
//! use std::io::Cursor;
//! use vorbis_tag::tag::{Field, TagData};
//! use vorbis_tag::vorbis::{CodecOptions, ReadOptions, VorbisTag};
//!
//! let codec = VorbisTag::new(CodecOptions::ogg(), false);
//!
//! let mut edits = TagData::new();
//! edits.set(Field::Artist, "Aphex Twin");
//! let block = codec.write(&edits, &TagData::new()).unwrap();
//!
//! let read = codec.read(&mut Cursor::new(&block), &ReadOptions::default()).unwrap();
//! assert!(read.exists);
//! assert_eq!(read.tag.get(Field::Artist), Some("Aphex Twin"));
//! assert_eq!(read.zone.length, block.len() as u64);
//! ```
//!
//! ## Containers
//!
//! | Container | Pictures | Framing bit | Rewrite |
//! |-----------|----------|-------------|---------|
//! | Ogg Vorbis | `METADATA_BLOCK_PICTURE` fields | yes | codec only |
//! | FLAC (`.flac`) | separate `PICTURE` blocks (read only) | no | [`flac`] adapter |
//!
//! ## Modules
//!
//! - [`tag`]: Format-agnostic tag model (fields, additional fields, pictures)
//! - [`vorbis`]: Vorbis comment codec and picture block layout
//! - [`zone`]: Zone-based structural rewriting
//! - [`flac`]: FLAC metadata block walker and file-level read/write
//! - [`config`]: Configuration types and loading/saving
//! - [`pipeline`]: Batch processing, file collection and backups
//! - [`error`]: Codec error type

pub mod config;
pub mod error;
pub mod flac;
pub mod pipeline;
pub mod tag;
pub mod vorbis;
pub mod zone;

//! voice_stamp: speaks time announcements into long audio tracks.
//!
//! A job reads the track's metadata, plans a title announcement plus a tick
//! every few minutes, renders each one to speech, pads the clips so every
//! tick lands on its minute, matches the speech loudness to the music and
//! mixes the two into a new MP3 carrying the source tags.
//!
//! The CLI in `main.rs` is a thin layer over [`job::Job`]. External programs
//! sit behind the traits in [`tools`] so the whole pipeline runs headless in
//! tests.

pub mod assembler;
pub mod config;
pub mod error;
pub mod job;
pub mod loudness;
pub mod mixer;
pub mod output;
pub mod process;
pub mod schedule;
pub mod speech;
pub mod template;
pub mod text;
pub mod tools;
pub mod track;
pub mod workspace;

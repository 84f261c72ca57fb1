use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::{Accessor, Tag, TagExt, TagType};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, VoiceStampError};
use crate::template::{Placeholder, Placeholders};
use crate::tools::MetadataProvider;

/// LAME VBR quality used when the source bitrate is unknown.
const DEFAULT_ENCODING_QUALITY: u8 = 2;

/// Average bitrates (kbps) of LAME's VBR presets V0..V8, best first.
const LAME_VBR_BITRATES: [u32; 9] = [245, 225, 190, 175, 165, 130, 115, 100, 85];

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub comment: String,
    pub track_number: Option<u32>,
    pub duration: Duration,
    /// Source audio bitrate in kbps, if the container reports one.
    pub bitrate: Option<u32>,
}

impl Track {
    /// A track with no tags, titled after its file name.
    pub fn untagged(path: impl Into<PathBuf>, duration: Duration) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Track {
            path,
            title,
            artist: String::new(),
            album: String::new(),
            genre: String::new(),
            comment: String::new(),
            track_number: None,
            duration,
            bitrate: None,
        }
    }

    /// Create a Track by reading metadata from an audio file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let path = path
            .canonicalize()
            .map_err(|e| VoiceStampError::metadata(path, format!("invalid path: {e}")))?;

        let tagged_file = lofty::read_from_path(&path)
            .map_err(|e| VoiceStampError::metadata(&path, e.to_string()))?;

        let properties = tagged_file.properties();
        let mut track = Track::untagged(path.clone(), properties.duration());
        track.bitrate = properties.audio_bitrate();

        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
        if let Some(tag) = tag {
            if let Some(title) = tag.title() {
                track.title = title.to_string();
            }
            track.artist = tag.artist().map(|s| s.to_string()).unwrap_or_default();
            track.album = tag.album().map(|s| s.to_string()).unwrap_or_default();
            track.genre = tag.genre().map(|s| s.to_string()).unwrap_or_default();
            track.comment = tag.comment().map(|s| s.to_string()).unwrap_or_default();
            track.track_number = tag.track();
        }

        Ok(track)
    }

    /// Whole minutes of audio, truncated.
    pub fn duration_minutes(&self) -> u32 {
        (self.duration.as_secs() / 60) as u32
    }

    /// Format duration as MM:SS.
    pub fn duration_display(&self) -> String {
        let secs = self.duration.as_secs();
        format!("{}:{:02}", secs / 60, secs % 60)
    }

    /// LAME `-q:a` value (0 best .. 9 worst) that roughly preserves the source bitrate.
    pub fn encoding_quality(&self) -> u8 {
        match self.bitrate {
            None | Some(0) => DEFAULT_ENCODING_QUALITY,
            Some(kbps) => LAME_VBR_BITRATES
                .iter()
                .position(|&preset| kbps >= preset)
                .unwrap_or(LAME_VBR_BITRATES.len()) as u8,
        }
    }

    /// Template values describing this track.
    pub fn placeholders(&self) -> Placeholders {
        let file_name = self
            .path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Placeholders::new()
            .with(Placeholder::Title, &self.title)
            .with(Placeholder::Artist, &self.artist)
            .with(Placeholder::Album, &self.album)
            .with(Placeholder::Genre, &self.genre)
            .with(Placeholder::Comment, &self.comment)
            .with(
                Placeholder::TrackNumber,
                self.track_number.map(|n| n.to_string()).unwrap_or_default(),
            )
            .with(Placeholder::FileName, file_name)
    }
}

/// Reads tracks and copies their descriptive tags with `lofty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyMetadata;

impl MetadataProvider for LoftyMetadata {
    fn read(&self, path: &Path) -> Result<Track> {
        Track::from_path(path)
    }

    fn write_tags(&self, track: &Track, target: &Path) -> Result<()> {
        let mut tag = Tag::new(TagType::Id3v2);
        if !track.title.is_empty() {
            tag.set_title(track.title.clone());
        }
        if !track.artist.is_empty() {
            tag.set_artist(track.artist.clone());
        }
        if !track.album.is_empty() {
            tag.set_album(track.album.clone());
        }
        if !track.genre.is_empty() {
            tag.set_genre(track.genre.clone());
        }
        if !track.comment.is_empty() {
            tag.set_comment(track.comment.clone());
        }
        if let Some(n) = track.track_number {
            tag.set_track(n);
        }

        tag.save_to_path(target, WriteOptions::default())
            .map_err(|e| VoiceStampError::metadata(target, format!("cannot write tags: {e}")))
    }
}

//! Capabilities the pipeline consumes from the outside world.
//!
//! The job only talks to these traits. `Toolchain::system` wires up the real
//! programs; tests substitute in-process fakes.

use std::path::{Path, PathBuf};

use crate::config::ToolPaths;
use crate::error::{Result, ToolError, VoiceStampError};
use crate::loudness::{NormalizeAudio, Sox};
use crate::mixer::Ffmpeg;
use crate::process::ToolRunner;
use crate::speech::Espeak;
use crate::track::{LoftyMetadata, Track};

/// Reads track metadata and copies descriptive tags onto produced files.
pub trait MetadataProvider {
    fn read(&self, path: &Path) -> Result<Track>;
    fn write_tags(&self, track: &Track, target: &Path) -> Result<()>;
}

/// Text-to-speech into a WAV file.
pub trait SpeechSynthesizer {
    /// Speak `text` at `speed` words per minute into `out`.
    fn synthesize(&self, text: &str, speed: u32, out: &Path) -> std::result::Result<(), ToolError>;

    /// Sample rate of a clip produced by `synthesize`.
    fn sample_rate(&self, clip: &Path) -> Result<u32> {
        probe_sample_rate(clip)
    }
}

/// Produces a `key: value` statistics report for an audio file.
pub trait AudioStats {
    fn report(&self, file: &Path) -> std::result::Result<String, ToolError>;
}

/// Rescales a WAV file in place so its RMS amplitude matches `target`.
pub trait GainNormalizer {
    fn normalize(&self, file: &Path, target: f64) -> std::result::Result<(), ToolError>;
}

/// One invocation of a filter-graph capable encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRequest {
    /// Inputs, addressed in the graph as `[0]`, `[1]`, ...
    pub inputs: Vec<PathBuf>,
    /// Graph description; `None` for a plain transcode.
    pub filter: Option<String>,
    /// Encoder options placed before the output path.
    pub output_args: Vec<String>,
    pub output: PathBuf,
}

pub trait FilterGraph {
    fn run(&self, request: &GraphRequest) -> std::result::Result<(), ToolError>;
}

/// Every capability a job needs.
pub struct Toolchain {
    pub metadata: Box<dyn MetadataProvider>,
    pub synthesizer: Box<dyn SpeechSynthesizer>,
    pub stats: Box<dyn AudioStats>,
    pub normalizer: Box<dyn GainNormalizer>,
    pub graph: Box<dyn FilterGraph>,
}

impl Toolchain {
    /// The real programs: lofty, espeak, sox, normalize-audio and ffmpeg.
    pub fn system(paths: &ToolPaths, runner: ToolRunner) -> Self {
        Toolchain {
            metadata: Box::new(LoftyMetadata),
            synthesizer: Box::new(Espeak::new(&paths.espeak, runner)),
            stats: Box::new(Sox::new(&paths.sox, runner)),
            normalizer: Box::new(NormalizeAudio::new(&paths.normalize, runner)),
            graph: Box::new(Ffmpeg::new(&paths.ffmpeg, runner)),
        }
    }
}

/// Read the sample rate from an audio file's header.
pub fn probe_sample_rate(path: &Path) -> Result<u32> {
    use lofty::file::AudioFile;

    let file = lofty::read_from_path(path)
        .map_err(|e| VoiceStampError::metadata(path, e.to_string()))?;
    file.properties()
        .sample_rate()
        .filter(|&rate| rate > 0)
        .ok_or_else(|| VoiceStampError::metadata(path, "no sample rate in header"))
}

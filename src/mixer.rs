//! ffmpeg invocations: source conversion, speech concatenation and the final mix.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use crate::error::{Result, ToolError, VoiceStampError};
use crate::process::ToolRunner;
use crate::tools::{FilterGraph, GraphRequest};

// ── ffmpeg argument builder ──────────────────────────────────────────────────

/// Build the complete ffmpeg argument list for `request`.
/// Returns a list ready for `Command::new("ffmpeg").args(...)`.
pub fn build_ffmpeg_args(request: &GraphRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];

    for input in &request.inputs {
        args.push("-i".into());
        args.push(input.as_os_str().to_owned());
    }

    if let Some(filter) = &request.filter {
        args.push("-filter_complex".into());
        args.push(filter.into());
    }

    args.extend(request.output_args.iter().map(OsString::from));
    args.push(request.output.as_os_str().to_owned());
    args
}

/// ffmpeg as the filter-graph capability.
pub struct Ffmpeg {
    binary: String,
    runner: ToolRunner,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<String>, runner: ToolRunner) -> Self {
        Ffmpeg {
            binary: binary.into(),
            runner,
        }
    }
}

impl FilterGraph for Ffmpeg {
    fn run(&self, request: &GraphRequest) -> std::result::Result<(), ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(build_ffmpeg_args(request));
        self.runner.run(cmd).map(|_| ())
    }
}

// ── Requests ─────────────────────────────────────────────────────────────────

/// Decode `source` to 16-bit PCM WAV.
pub fn conversion_request(source: &Path, out: &Path) -> GraphRequest {
    GraphRequest {
        inputs: vec![source.to_path_buf()],
        filter: None,
        output_args: vec!["-acodec".into(), "pcm_s16le".into()],
        output: out.to_path_buf(),
    }
}

/// Merge music and speech into a stereo MP3 at LAME VBR `quality` (0 best – 9 worst).
pub fn mix_request(music: &Path, speech: &Path, quality: u8, out: &Path) -> GraphRequest {
    GraphRequest {
        inputs: vec![music.to_path_buf(), speech.to_path_buf()],
        filter: Some("amerge".into()),
        output_args: vec![
            "-ac".into(),
            "2".into(),
            "-c:a".into(),
            "libmp3lame".into(),
            "-q:a".into(),
            quality.min(9).to_string(),
        ],
        output: out.to_path_buf(),
    }
}

pub struct Mixer<'a> {
    graph: &'a dyn FilterGraph,
}

impl<'a> Mixer<'a> {
    pub fn new(graph: &'a dyn FilterGraph) -> Self {
        Mixer { graph }
    }

    /// Convert the source track into the working WAV representation.
    pub fn convert(&self, source: &Path, out: &Path) -> Result<()> {
        self.graph
            .run(&conversion_request(source, out))
            .map_err(|e| {
                VoiceStampError::from_tool(e, |source_err| VoiceStampError::Conversion {
                    path: source.to_path_buf(),
                    source: source_err,
                })
            })
    }

    /// Mix music and speech into the encoded output file.
    pub fn mix(&self, music: &Path, speech: &Path, quality: u8, out: &Path) -> Result<()> {
        self.graph
            .run(&mix_request(music, speech, quality, out))
            .map_err(|e| VoiceStampError::from_tool(e, |source| VoiceStampError::Mix { source }))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

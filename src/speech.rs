//! Speech rendering: one synthesizer call per schedule segment.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, ToolError, VoiceStampError};
use crate::process::ToolRunner;
use crate::schedule::{Schedule, Segment};
use crate::tools::SpeechSynthesizer;

/// `espeak` writing WAV output.
pub struct Espeak {
    binary: String,
    runner: ToolRunner,
}

impl Espeak {
    pub fn new(binary: impl Into<String>, runner: ToolRunner) -> Self {
        Espeak {
            binary: binary.into(),
            runner,
        }
    }

    fn command(&self, text: &str, speed: u32, out: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-s")
            .arg(speed.to_string())
            // -z: no trailing sentence pause, the assembler pads anyway
            .arg("-z")
            .arg("-w")
            .arg(out)
            .arg(text);
        cmd
    }
}

impl SpeechSynthesizer for Espeak {
    fn synthesize(&self, text: &str, speed: u32, out: &Path) -> std::result::Result<(), ToolError> {
        self.runner.run(self.command(text, speed, out)).map(|_| ())
    }
}

pub struct SpeechRenderer<'a> {
    synthesizer: &'a dyn SpeechSynthesizer,
    speed: u32,
}

impl<'a> SpeechRenderer<'a> {
    pub fn new(synthesizer: &'a dyn SpeechSynthesizer, speed: u32) -> Self {
        SpeechRenderer { synthesizer, speed }
    }

    /// Where segment `index` is rendered inside `dir`.
    pub fn clip_path(dir: &Path, index: usize) -> PathBuf {
        dir.join(format!("{index}.wav"))
    }

    pub fn render(&self, segment: &Segment, dir: &Path) -> Result<PathBuf> {
        let out = Self::clip_path(dir, segment.index);
        log::debug!("speaking segment {}: \"{}\"", segment.index, segment.text);
        self.synthesizer
            .synthesize(&segment.text, self.speed, &out)
            .map_err(|e| {
                VoiceStampError::from_tool(e, |source| VoiceStampError::Render {
                    text: segment.text.clone(),
                    source,
                })
            })?;
        Ok(out)
    }

    /// Render every segment in schedule order; stops at the first failure.
    pub fn render_all(&self, schedule: &Schedule, dir: &Path) -> Result<Vec<PathBuf>> {
        schedule
            .segments
            .iter()
            .map(|segment| self.render(segment, dir))
            .collect()
    }
}

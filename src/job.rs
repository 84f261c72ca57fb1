//! Voice stamping job: the state machine that drives one track through the
//! pipeline.
//!
//! ```text
//! Init → Validated ─┬─ DryRunReported ──────────────────────────────┐
//!                   └─ WorkspacePrepared → Rendering → Assembling →  │
//!                      Converting → Measuring → Rescaling → Mixing → │
//!                      Publishing ───────────────────────────────────┴→ Cleaned → Done
//! any failure ─────────────────────────────────────────────────────────→ Cleaned → Failed
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use crate::assembler::SpeechAssembler;
use crate::config::JobConfig;
use crate::error::{Result, VoiceStampError};
use crate::loudness::LoudnessMatcher;
use crate::mixer::Mixer;
use crate::output::{StagedOutput, resolve_output_path};
use crate::schedule::Schedule;
use crate::speech::SpeechRenderer;
use crate::template::{Placeholder, Placeholders};
use crate::tools::Toolchain;
use crate::track::Track;
use crate::workspace::Workspace;

const SPEECH_FILE: &str = "speech.wav";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Init,
    Validated,
    WorkspacePrepared,
    DryRunReported,
    Rendering,
    Assembling,
    Converting,
    Measuring,
    Rescaling,
    Mixing,
    Publishing,
    Cleaned,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a dry run would have done.
#[derive(Debug, Clone, PartialEq)]
pub struct DryRunReport {
    pub duration_minutes: u32,
    pub tick_count: usize,
    pub title: String,
    pub output: PathBuf,
    pub output_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The mix was written to this path.
    Published(PathBuf),
    DryRun(DryRunReport),
}

/// Runs voice stamping jobs with one configuration and one toolchain.
///
/// A `Job` can be reused for several tracks; each call to [`Job::run`] owns
/// its own workspace and shares nothing with other runs.
pub struct Job<'a> {
    config: &'a JobConfig,
    tools: &'a Toolchain,
    workspace_root: Option<PathBuf>,
    history: Vec<JobState>,
}

impl<'a> Job<'a> {
    pub fn new(config: &'a JobConfig, tools: &'a Toolchain) -> Self {
        Job {
            config,
            tools,
            workspace_root: None,
            history: Vec::new(),
        }
    }

    /// Create workspaces under `root` instead of the system temp dir.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// States visited by the most recent run, in order.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    /// Process one track, reporting failures instead of returning them.
    ///
    /// Returns `Ok(true)` on success and `Ok(false)` on a reported failure.
    /// With `debug` set the structured error is returned instead.
    pub fn voice_stamp(&mut self, source: &Path) -> Result<bool> {
        log::info!("Processing \"{}\"", source.display());
        match self.run(source) {
            Ok(JobOutcome::Published(path)) => {
                log::info!("Done: \"{}\"", path.display());
                Ok(true)
            }
            Ok(JobOutcome::DryRun(_)) => Ok(true),
            Err(e) if self.config.debug => Err(e),
            Err(e) => {
                log::error!("*** {}", e);
                Ok(false)
            }
        }
    }

    /// Process one track. Cleanup has already happened when this returns.
    pub fn run(&mut self, source: &Path) -> Result<JobOutcome> {
        self.history.clear();
        self.enter(JobState::Init);

        let mut workspace = None;
        let result = self.execute(source, &mut workspace);

        self.cleanup(workspace);
        self.enter(if result.is_ok() {
            JobState::Done
        } else {
            JobState::Failed
        });
        result
    }

    fn enter(&mut self, state: JobState) {
        log::debug!("job state: {}", state);
        self.history.push(state);
    }

    fn execute(
        &mut self,
        source: &Path,
        workspace: &mut Option<Workspace>,
    ) -> Result<JobOutcome> {
        let track = self.tools.metadata.read(source)?;
        let schedule = self
            .config
            .schedule_builder()
            .build(track.duration_minutes(), &self.placeholders(&track))?;
        self.enter(JobState::Validated);

        let destination = resolve_output_path(
            source,
            self.config.file_out.as_deref(),
            &self.config.file_out_format,
        );

        if self.config.dry_run_mode {
            let report = DryRunReport {
                duration_minutes: track.duration_minutes(),
                tick_count: schedule.tick_count(),
                title: schedule.title().text.clone(),
                output_exists: destination.exists(),
                output: destination,
            };
            log_dry_run(&report);
            self.enter(JobState::DryRunReported);
            return Ok(JobOutcome::DryRun(report));
        }

        if destination.exists() && !self.config.force_overwrite {
            return Err(VoiceStampError::validation(format!(
                "Target \"{}\" already exists. Use -f to force overwrite.",
                destination.display()
            )));
        }

        let ws = workspace.insert(Workspace::create(
            self.workspace_root.as_deref(),
            self.config.no_cleanup,
        )?);
        self.enter(JobState::WorkspacePrepared);

        let published = self.produce(source, &track, &schedule, ws, &destination)?;
        Ok(JobOutcome::Published(published))
    }

    fn placeholders(&self, track: &Track) -> Placeholders {
        let mut values = track.placeholders();
        values.insert(Placeholder::ConfigName, self.config.name.clone());
        values
    }

    fn produce(
        &mut self,
        source: &Path,
        track: &Track,
        schedule: &Schedule,
        ws: &Workspace,
        destination: &Path,
    ) -> Result<PathBuf> {
        let tools = self.tools;

        self.enter(JobState::Rendering);
        let clips = SpeechRenderer::new(tools.synthesizer.as_ref(), self.config.speech_speed)
            .render_all(schedule, ws.path())?;

        self.enter(JobState::Assembling);
        let sample_rate = self.speech_sample_rate(&clips)?;
        let speech = ws.file(SPEECH_FILE);
        SpeechAssembler::new(tools.graph.as_ref()).assemble(
            &clips,
            schedule,
            sample_rate,
            &speech,
        )?;

        self.enter(JobState::Converting);
        let mixer = Mixer::new(tools.graph.as_ref());
        let music = ws.file(&music_file_name(source));
        mixer.convert(source, &music)?;

        self.enter(JobState::Measuring);
        let matcher = LoudnessMatcher::new(tools.stats.as_ref(), tools.normalizer.as_ref());
        let rms = matcher.measure(&music)?;

        self.enter(JobState::Rescaling);
        matcher.rescale(&speech, rms * self.config.speech_volume_factor)?;

        self.enter(JobState::Mixing);
        log::info!("Writing: \"{}\"", destination.display());
        let staged = StagedOutput::create(destination)?;
        let mixed = mixer
            .mix(&music, &speech, track.encoding_quality(), staged.path())
            .and_then(|()| {
                self.enter(JobState::Publishing);
                tools.metadata.write_tags(track, staged.path())
            });

        match mixed {
            Ok(()) => staged.publish(),
            Err(e) => {
                if let Err(discard) = staged.discard() {
                    log::warn!("could not remove staging file: {}", discard);
                }
                Err(e)
            }
        }
    }

    /// Rate of the first clip. Clips at a different rate would drift, so say so.
    fn speech_sample_rate(&self, clips: &[PathBuf]) -> Result<u32> {
        let synthesizer = self.tools.synthesizer.as_ref();
        let first = clips
            .first()
            .ok_or_else(|| VoiceStampError::validation("no speech segments rendered"))?;
        let rate = synthesizer.sample_rate(first)?;

        for clip in &clips[1..] {
            match synthesizer.sample_rate(clip) {
                Ok(other) if other != rate => log::warn!(
                    "{} is {} Hz but padding assumes {} Hz; announcements may drift",
                    clip.display(),
                    other,
                    rate
                ),
                Ok(_) => {}
                Err(e) => log::warn!("cannot check sample rate of {}: {}", clip.display(), e),
            }
        }
        Ok(rate)
    }

    fn cleanup(&mut self, workspace: Option<Workspace>) {
        if let Some(ws) = workspace {
            if let Err(e) = ws.release() {
                log::warn!("cleanup failed: {}", e);
            }
        }
        self.enter(JobState::Cleaned);
    }
}

/// Working WAV name for the source, e.g. `set.mp3` → `set.mp3.wav`.
fn music_file_name(source: &Path) -> String {
    let base = source
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "music".to_string());
    format!("{base}.wav")
}

fn log_dry_run(report: &DryRunReport) {
    log::info!(
        "  Duration: {} mins, tick count: {}",
        report.duration_minutes,
        report.tick_count
    );
    log::info!("  Voice title: \"{}\"", report.title);
    let flag = if report.output_exists {
        "  *** TARGET FILE ALREADY EXISTS ***"
    } else {
        ""
    };
    log::info!("  Output file: \"{}\"{}", report.output.display(), flag);
}

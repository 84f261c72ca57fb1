//! Headless integration tests for voice stamping jobs.
//!
//! These tests drive `Job` end-to-end against in-process fake capabilities,
//! so no external programs (espeak, sox, ffmpeg, ...) are needed.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use tempfile::TempDir;
use voice_stamp::config::JobConfig;
use voice_stamp::error::{Result, ToolError, VoiceStampError};
use voice_stamp::job::{Job, JobOutcome, JobState};
use voice_stamp::tools::{
    AudioStats, FilterGraph, GainNormalizer, GraphRequest, MetadataProvider, SpeechSynthesizer,
    Toolchain,
};
use voice_stamp::track::Track;

const SAMPLE_RATE: u32 = 22050;
const MUSIC_RMS: f64 = 0.2;

// ── Fakes ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Calls {
    reads: usize,
    spoken: Vec<String>,
    graphs: Vec<GraphRequest>,
    measured: Vec<PathBuf>,
    normalized: Vec<(PathBuf, f64)>,
    tagged: Vec<PathBuf>,
}

type Log = Rc<RefCell<Calls>>;

struct FakeMetadata {
    log: Log,
    minutes: u64,
}

impl MetadataProvider for FakeMetadata {
    fn read(&self, path: &Path) -> Result<Track> {
        self.log.borrow_mut().reads += 1;
        let mut track = Track::untagged(path, Duration::from_secs(self.minutes * 60));
        track.artist = "DJ Test".to_string();
        Ok(track)
    }

    fn write_tags(&self, _track: &Track, target: &Path) -> Result<()> {
        self.log.borrow_mut().tagged.push(target.to_path_buf());
        Ok(())
    }
}

struct FakeSpeech {
    log: Log,
    fail_on: Option<&'static str>,
}

impl SpeechSynthesizer for FakeSpeech {
    fn synthesize(
        &self,
        text: &str,
        _speed: u32,
        out: &Path,
    ) -> std::result::Result<(), ToolError> {
        if self.fail_on == Some(text) {
            return Err(ToolError::exit("espeak", 1, "voice not found"));
        }
        self.log.borrow_mut().spoken.push(text.to_string());
        fs::write(out, b"RIFF").map_err(|e| ToolError::launch("espeak", e))
    }

    fn sample_rate(&self, _clip: &Path) -> Result<u32> {
        Ok(SAMPLE_RATE)
    }
}

struct FakeStats {
    log: Log,
    fail: bool,
}

impl AudioStats for FakeStats {
    fn report(&self, file: &Path) -> std::result::Result<String, ToolError> {
        self.log.borrow_mut().measured.push(file.to_path_buf());
        if self.fail {
            return Err(ToolError::exit("sox", 2, "can't open input file"));
        }
        Ok(format!(
            "Samples read:      2646000\nRMS     amplitude:     {:.6}\n",
            MUSIC_RMS
        ))
    }
}

struct FakeNormalizer {
    log: Log,
}

impl GainNormalizer for FakeNormalizer {
    fn normalize(&self, file: &Path, target: f64) -> std::result::Result<(), ToolError> {
        self.log
            .borrow_mut()
            .normalized
            .push((file.to_path_buf(), target));
        Ok(())
    }
}

struct FakeGraph {
    log: Log,
    fail_mix: bool,
}

impl FilterGraph for FakeGraph {
    fn run(&self, request: &GraphRequest) -> std::result::Result<(), ToolError> {
        self.log.borrow_mut().graphs.push(request.clone());
        if self.fail_mix && request.filter.as_deref() == Some("amerge") {
            // A real encoder leaves a partial file behind.
            let _ = fs::write(&request.output, b"partial");
            return Err(ToolError::exit("ffmpeg", 1, "encoder exploded"));
        }
        fs::write(&request.output, b"mixed").map_err(|e| ToolError::launch("ffmpeg", e))
    }
}

// ── Harness ───────────────────────────────────────────────────────────────

struct Harness {
    dir: TempDir,
    log: Log,
    minutes: u64,
    fail_mix: bool,
    fail_stats: bool,
    fail_on: Option<&'static str>,
}

impl Harness {
    fn new(minutes: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("set.mp3"), b"source").unwrap();
        fs::create_dir(dir.path().join("work")).unwrap();
        Harness {
            dir,
            log: Rc::new(RefCell::new(Calls::default())),
            minutes,
            fail_mix: false,
            fail_stats: false,
            fail_on: None,
        }
    }

    fn source(&self) -> PathBuf {
        self.dir.path().join("set.mp3")
    }

    fn destination(&self) -> PathBuf {
        self.dir.path().join("set (voicestamped).mp3")
    }

    fn work_root(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    fn work_entries(&self) -> usize {
        fs::read_dir(self.work_root()).unwrap().count()
    }

    /// Staging files left next to the destination.
    fn staging_leftovers(&self) -> Vec<PathBuf> {
        fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(".voicestamp-"))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn toolchain(&self) -> Toolchain {
        Toolchain {
            metadata: Box::new(FakeMetadata {
                log: self.log.clone(),
                minutes: self.minutes,
            }),
            synthesizer: Box::new(FakeSpeech {
                log: self.log.clone(),
                fail_on: self.fail_on,
            }),
            stats: Box::new(FakeStats {
                log: self.log.clone(),
                fail: self.fail_stats,
            }),
            normalizer: Box::new(FakeNormalizer {
                log: self.log.clone(),
            }),
            graph: Box::new(FakeGraph {
                log: self.log.clone(),
                fail_mix: self.fail_mix,
            }),
        }
    }

    /// Run one job and return its result along with the visited states.
    fn run(&self, config: &JobConfig) -> (Result<JobOutcome>, Vec<JobState>) {
        let tools = self.toolchain();
        let mut job = Job::new(config, &tools).with_workspace_root(self.work_root());
        let result = job.run(&self.source());
        (result, job.history().to_vec())
    }
}

fn config_30() -> JobConfig {
    JobConfig {
        tick_interval: 30,
        tick_offset: 5,
        ..JobConfig::default()
    }
}

// ── Full pipeline ─────────────────────────────────────────────────────────

#[test]
fn stamps_a_125_minute_track() {
    let h = Harness::new(125);
    let (result, history) = h.run(&config_30());

    assert_eq!(result.unwrap(), JobOutcome::Published(h.destination()));
    assert_eq!(fs::read(h.destination()).unwrap(), b"mixed");

    let calls = h.log.borrow();
    assert_eq!(
        calls.spoken,
        ["set", "5 minutes", "35 minutes", "65 minutes", "95 minutes"]
    );

    // assemble, convert, mix
    assert_eq!(calls.graphs.len(), 3);
    let assembly = &calls.graphs[0];
    assert_eq!(assembly.inputs.len(), 5);
    let filter = assembly.filter.as_deref().unwrap();
    let title_len = u64::from(SAMPLE_RATE) * 60 * 5;
    let tick_len = u64::from(SAMPLE_RATE) * 60 * 30;
    assert!(filter.starts_with(&format!(
        "[0]apad=whole_len={title_len},atrim=end_sample={title_len}[g0]"
    )));
    assert!(filter.contains(&format!(
        "[4]apad=whole_len={tick_len},atrim=end_sample={tick_len}[g4]"
    )));
    assert!(filter.ends_with("[g0][g1][g2][g3][g4]concat=n=5:v=0:a=1"));

    let conversion = &calls.graphs[1];
    assert_eq!(conversion.inputs, [h.source()]);
    assert!(conversion.output.ends_with("set.mp3.wav"));

    let mix = &calls.graphs[2];
    assert_eq!(mix.inputs, [conversion.output.clone(), assembly.output.clone()]);

    // music measured, speech rescaled to it
    assert_eq!(calls.measured, [conversion.output.clone()]);
    assert_eq!(calls.normalized.len(), 1);
    assert_eq!(calls.normalized[0].0, assembly.output);
    assert!((calls.normalized[0].1 - MUSIC_RMS).abs() < 1e-9);

    // tags go onto the staged file, which is then renamed away
    assert_eq!(calls.tagged, [mix.output.clone()]);
    assert_ne!(mix.output, h.destination());
    assert!(!mix.output.exists());

    assert_eq!(h.work_entries(), 0);
    assert!(h.staging_leftovers().is_empty());
    assert_eq!(
        history,
        [
            JobState::Init,
            JobState::Validated,
            JobState::WorkspacePrepared,
            JobState::Rendering,
            JobState::Assembling,
            JobState::Converting,
            JobState::Measuring,
            JobState::Rescaling,
            JobState::Mixing,
            JobState::Publishing,
            JobState::Cleaned,
            JobState::Done,
        ]
    );
}

#[test]
fn staging_file_lives_next_to_destination() {
    let h = Harness::new(40);
    let (result, _) = h.run(&config_30());
    result.unwrap();

    let calls = h.log.borrow();
    let mix = calls.graphs.last().unwrap();
    assert_eq!(mix.output.parent(), h.destination().parent());
}

#[test]
fn volume_factor_scales_speech_target() {
    let h = Harness::new(40);
    let config = JobConfig {
        speech_volume_factor: 0.5,
        ..config_30()
    };
    h.run(&config).0.unwrap();
    let calls = h.log.borrow();
    assert!((calls.normalized[0].1 - MUSIC_RMS * 0.5).abs() < 1e-9);
}

#[test]
fn empty_tick_format_speaks_only_the_title() {
    let h = Harness::new(125);
    let config = JobConfig {
        tick_format: String::new(),
        ..config_30()
    };
    h.run(&config).0.unwrap();

    let calls = h.log.borrow();
    assert_eq!(calls.spoken, ["set"]);
    assert_eq!(calls.graphs[0].inputs.len(), 1);
}

#[test]
fn title_uses_track_and_config_placeholders() {
    let h = Harness::new(40);
    let config = JobConfig {
        name: "running".to_string(),
        title_format: "{config_name} - {title} by {artist}".to_string(),
        tick_add: 60,
        ..config_30()
    };
    h.run(&config).0.unwrap();

    let calls = h.log.borrow();
    // the dash becomes a pause
    assert_eq!(calls.spoken[0], "running , set by DJ Test");
    assert_eq!(calls.spoken[1], "65 minutes");
}

#[test]
fn explicit_output_directory() {
    let h = Harness::new(40);
    let out_dir = h.dir.path().join("out");
    fs::create_dir(&out_dir).unwrap();
    let config = JobConfig {
        file_out: Some(out_dir.clone()),
        ..config_30()
    };
    let outcome = h.run(&config).0.unwrap();
    let expected = out_dir.join("set (voicestamped).mp3");
    assert_eq!(outcome, JobOutcome::Published(expected.clone()));
    assert!(expected.exists());
    assert!(!h.destination().exists());
}

#[cfg(unix)]
#[test]
fn published_file_has_regular_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let h = Harness::new(40);
    h.run(&config_30()).0.unwrap();

    let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
    // the source was created like any other file
    assert_eq!(mode(&h.destination()), mode(&h.source()));
}

// ── Validation ────────────────────────────────────────────────────────────

#[test]
fn too_short_track_is_rejected_before_anything_runs() {
    let h = Harness::new(5);
    let (result, history) = h.run(&config_30());

    let err = result.unwrap_err();
    assert!(matches!(err, VoiceStampError::Validation(_)));
    assert!(err.to_string().contains("Track too short (min. 6, current len 5)"));

    let calls = h.log.borrow();
    assert_eq!(calls.reads, 1);
    assert!(calls.spoken.is_empty());
    assert!(calls.graphs.is_empty());
    assert_eq!(h.work_entries(), 0);
    assert_eq!(history, [JobState::Init, JobState::Cleaned, JobState::Failed]);
}

#[test]
fn huge_tick_offset_is_rejected() {
    let h = Harness::new(125);
    let config = JobConfig {
        tick_offset: u32::MAX,
        ..config_30()
    };
    let (result, _) = h.run(&config);
    assert!(matches!(result.unwrap_err(), VoiceStampError::Validation(_)));
    assert!(h.log.borrow().spoken.is_empty());
    assert_eq!(h.work_entries(), 0);
}

#[test]
fn huge_tick_add_is_rejected() {
    let h = Harness::new(125);
    let config = JobConfig {
        tick_add: u32::MAX,
        ..config_30()
    };
    let (result, _) = h.run(&config);
    assert!(matches!(result.unwrap_err(), VoiceStampError::Validation(_)));
    assert!(h.log.borrow().spoken.is_empty());
    assert_eq!(h.work_entries(), 0);
}

#[test]
fn existing_destination_without_force_creates_no_workspace() {
    let h = Harness::new(125);
    fs::write(h.destination(), b"old").unwrap();

    let (result, history) = h.run(&config_30());
    let err = result.unwrap_err();
    assert!(matches!(err, VoiceStampError::Validation(_)));
    assert!(err.to_string().contains("Use -f to force overwrite"));

    assert_eq!(fs::read(h.destination()).unwrap(), b"old");
    assert!(h.log.borrow().graphs.is_empty());
    assert_eq!(h.work_entries(), 0);
    assert!(!history.contains(&JobState::WorkspacePrepared));
}

#[test]
fn force_overwrites_existing_destination() {
    let h = Harness::new(125);
    fs::write(h.destination(), b"old").unwrap();
    let config = JobConfig {
        force_overwrite: true,
        ..config_30()
    };
    h.run(&config).0.unwrap();
    assert_eq!(fs::read(h.destination()).unwrap(), b"mixed");
    assert!(h.staging_leftovers().is_empty());
}

// ── Dry run ───────────────────────────────────────────────────────────────

#[test]
fn dry_run_invokes_nothing() {
    let h = Harness::new(125);
    fs::write(h.destination(), b"old").unwrap();
    let config = JobConfig {
        dry_run_mode: true,
        ..config_30()
    };

    let (result, history) = h.run(&config);
    match result.unwrap() {
        JobOutcome::DryRun(report) => {
            assert_eq!(report.duration_minutes, 125);
            assert_eq!(report.tick_count, 4);
            assert_eq!(report.title, "set");
            assert_eq!(report.output, h.destination());
            assert!(report.output_exists);
        }
        other => panic!("expected a dry run report, got {other:?}"),
    }

    let calls = h.log.borrow();
    assert!(calls.spoken.is_empty());
    assert!(calls.graphs.is_empty());
    assert!(calls.measured.is_empty());
    assert!(calls.normalized.is_empty());
    assert!(calls.tagged.is_empty());
    assert_eq!(fs::read(h.destination()).unwrap(), b"old");
    assert_eq!(h.work_entries(), 0);
    assert_eq!(
        history,
        [
            JobState::Init,
            JobState::Validated,
            JobState::DryRunReported,
            JobState::Cleaned,
            JobState::Done,
        ]
    );
}

// ── Failures and cleanup ──────────────────────────────────────────────────

#[test]
fn mix_failure_leaves_destination_untouched() {
    let mut h = Harness::new(125);
    h.fail_mix = true;
    fs::write(h.destination(), b"old").unwrap();
    let config = JobConfig {
        force_overwrite: true,
        ..config_30()
    };

    let (result, history) = h.run(&config);
    let err = result.unwrap_err();
    assert!(matches!(err, VoiceStampError::Mix { .. }));
    assert!(err.to_string().contains("encoder exploded"));

    assert_eq!(fs::read(h.destination()).unwrap(), b"old");
    assert!(h.staging_leftovers().is_empty());
    assert_eq!(h.work_entries(), 0);
    assert!(h.log.borrow().tagged.is_empty());
    assert!(!history.contains(&JobState::Publishing));
    assert_eq!(history[history.len() - 2..], [JobState::Cleaned, JobState::Failed]);
}

#[test]
fn measurement_failure_cleans_up() {
    let mut h = Harness::new(125);
    h.fail_stats = true;
    fs::write(h.destination(), b"old").unwrap();
    let config = JobConfig {
        force_overwrite: true,
        ..config_30()
    };

    let (result, history) = h.run(&config);
    let err = result.unwrap_err();
    assert!(matches!(err, VoiceStampError::Measurement { .. }));
    assert!(err.to_string().contains("can't open input file"));

    assert_eq!(fs::read(h.destination()).unwrap(), b"old");
    assert_eq!(h.work_entries(), 0);
    assert!(h.staging_leftovers().is_empty());
    assert!(h.log.borrow().normalized.is_empty());
    assert!(!history.contains(&JobState::Rescaling));
    assert_eq!(history.last(), Some(&JobState::Failed));
}

#[test]
fn render_failure_is_reported() {
    let mut h = Harness::new(125);
    h.fail_on = Some("35 minutes");
    let config = config_30();
    let tools = h.toolchain();
    let mut job = Job::new(&config, &tools).with_workspace_root(h.work_root());

    assert!(!job.voice_stamp(&h.source()).unwrap());
    assert_eq!(h.log.borrow().spoken, ["set", "5 minutes"]);
    assert!(h.log.borrow().graphs.is_empty());
    assert_eq!(h.work_entries(), 0);
    assert!(!h.destination().exists());
    assert_eq!(job.history().last(), Some(&JobState::Failed));
}

#[test]
fn debug_mode_returns_the_error() {
    let mut h = Harness::new(125);
    h.fail_on = Some("35 minutes");
    let config = JobConfig {
        debug: true,
        ..config_30()
    };
    let tools = h.toolchain();
    let mut job = Job::new(&config, &tools).with_workspace_root(h.work_root());

    match job.voice_stamp(&h.source()).unwrap_err() {
        VoiceStampError::Render { text, .. } => assert_eq!(text, "35 minutes"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.work_entries(), 0);
}

#[test]
fn no_cleanup_keeps_workspace() {
    let h = Harness::new(40);
    let config = JobConfig {
        no_cleanup: true,
        ..config_30()
    };
    h.run(&config).0.unwrap();

    let kept: Vec<PathBuf> = fs::read_dir(h.work_root())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(kept.len(), 1);
    assert!(kept[0].join("speech.wav").exists());
    assert!(kept[0].join("0.wav").exists());
    assert!(h.staging_leftovers().is_empty());
}

#[test]
fn jobs_are_independent() {
    let h = Harness::new(40);
    let config = JobConfig {
        force_overwrite: true,
        ..config_30()
    };
    let tools = h.toolchain();
    let mut job = Job::new(&config, &tools).with_workspace_root(h.work_root());

    assert!(job.voice_stamp(&h.source()).unwrap());
    assert!(job.voice_stamp(&h.source()).unwrap());
    assert_eq!(h.log.borrow().reads, 2);
    assert_eq!(h.work_entries(), 0);
}

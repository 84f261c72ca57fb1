use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, VoiceStampError};
use crate::schedule::ScheduleBuilder;

pub const SPEECH_SPEED_MIN: u32 = 80;
pub const SPEECH_SPEED_MAX: u32 = 450;
/// Upper bound for minute-valued options (about ten weeks).
pub const MINUTES_MAX: u32 = 100_000;

const CONFIG_DIR: &str = "voicestamp";
const CONFIG_FILE: &str = "config.toml";

/// Binaries used for each external capability. Bare names are looked up on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub espeak: String,
    pub ffmpeg: String,
    pub sox: String,
    pub normalize: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        ToolPaths {
            espeak: "espeak".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            sox: "sox".to_string(),
            normalize: "normalize-audio".to_string(),
        }
    }
}

/// Options governing a voice stamping run. Read-only while a job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Minutes between spoken ticks.
    pub tick_interval: u32,
    /// Minute of the first tick.
    pub tick_offset: u32,
    /// Added to every spoken minute value.
    pub tick_add: u32,
    /// Words per minute.
    pub speech_speed: u32,
    /// Speech loudness relative to the music's RMS amplitude.
    pub speech_volume_factor: f64,
    pub title_format: String,
    /// Empty disables tick announcements.
    pub tick_format: String,
    pub file_out_format: String,
    /// Kill a tool that runs longer than this. 0 waits forever.
    pub tool_timeout_secs: u64,
    pub tools: ToolPaths,

    /// Name of the loaded config file, exposed as `{config_name}`.
    #[serde(skip)]
    pub name: String,
    /// Output file or directory.
    #[serde(skip)]
    pub file_out: Option<PathBuf>,
    #[serde(skip)]
    pub force_overwrite: bool,
    #[serde(skip)]
    pub dry_run_mode: bool,
    /// Return structured errors to the caller instead of reporting them.
    #[serde(skip)]
    pub debug: bool,
    /// Keep the workspace on disk after the job.
    #[serde(skip)]
    pub no_cleanup: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        JobConfig {
            tick_interval: 5,
            tick_offset: 5,
            tick_add: 0,
            speech_speed: 150,
            speech_volume_factor: 1.0,
            title_format: "{title}".to_string(),
            tick_format: "{minutes} minutes".to_string(),
            file_out_format: "{name} (voicestamped).{ext}".to_string(),
            tool_timeout_secs: 0,
            tools: ToolPaths::default(),
            name: String::new(),
            file_out: None,
            force_overwrite: false,
            dry_run_mode: false,
            debug: false,
            no_cleanup: false,
        }
    }
}

impl JobConfig {
    /// Default config file: `<config dir>/voicestamp/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load a config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VoiceStampError::config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        let mut config: JobConfig = toml::from_str(&content).map_err(|e| {
            VoiceStampError::config(format!("cannot parse '{}': {}", path.display(), e))
        })?;
        config.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(config)
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::load(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Write the persistent options to `path` as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                VoiceStampError::config(format!("cannot create '{}': {}", parent.display(), e))
            })?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| VoiceStampError::config(format!("serialize error: {e}")))?;
        fs::write(path, content).map_err(|e| {
            VoiceStampError::config(format!("cannot write '{}': {}", path.display(), e))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval == 0 {
            return Err(VoiceStampError::config("tick_interval must be greater than 0"));
        }
        for (name, value) in [
            ("tick_interval", self.tick_interval),
            ("tick_offset", self.tick_offset),
            ("tick_add", self.tick_add),
        ] {
            if value > MINUTES_MAX {
                return Err(VoiceStampError::config(format!(
                    "{name} must be at most {MINUTES_MAX} minutes, got {value}"
                )));
            }
        }
        if !(SPEECH_SPEED_MIN..=SPEECH_SPEED_MAX).contains(&self.speech_speed) {
            return Err(VoiceStampError::config(format!(
                "speech_speed must be between {} and {}, got {}",
                SPEECH_SPEED_MIN, SPEECH_SPEED_MAX, self.speech_speed
            )));
        }
        if !self.speech_volume_factor.is_finite() || self.speech_volume_factor < 0.0 {
            return Err(VoiceStampError::config(format!(
                "speech_volume_factor must be a non-negative number, got {}",
                self.speech_volume_factor
            )));
        }
        if self.file_out_format.trim().is_empty() {
            return Err(VoiceStampError::config("file_out_format must not be empty"));
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0).then(|| Duration::from_secs(self.tool_timeout_secs))
    }

    pub fn schedule_builder(&self) -> ScheduleBuilder<'_> {
        ScheduleBuilder {
            tick_offset: self.tick_offset,
            tick_interval: self.tick_interval,
            tick_add: self.tick_add,
            title_format: &self.title_format,
            tick_format: &self.tick_format,
        }
    }
}

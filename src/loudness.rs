//! Loudness matching: measure the music, rescale the speech to follow it.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use crate::error::{Result, ToolError, VoiceStampError};
use crate::process::ToolRunner;
use crate::tools::{AudioStats, GainNormalizer};

/// Report key holding the RMS amplitude (after key normalization).
const RMS_AMPLITUDE_KEY: &str = "rms_amplitude";

/// Normalization targets above full scale are meaningless.
const MAX_TARGET_AMPLITUDE: f64 = 1.0;

/// `sox <file> -n stat`; the report is printed on stderr.
pub struct Sox {
    binary: String,
    runner: ToolRunner,
}

impl Sox {
    pub fn new(binary: impl Into<String>, runner: ToolRunner) -> Self {
        Sox {
            binary: binary.into(),
            runner,
        }
    }
}

impl AudioStats for Sox {
    fn report(&self, file: &Path) -> std::result::Result<String, ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(file).args(["-n", "stat"]);
        self.runner.run(cmd).map(|out| out.stderr)
    }
}

/// `normalize-audio -a <amplitude> <file>`, rewrites the file in place.
pub struct NormalizeAudio {
    binary: String,
    runner: ToolRunner,
}

impl NormalizeAudio {
    pub fn new(binary: impl Into<String>, runner: ToolRunner) -> Self {
        NormalizeAudio {
            binary: binary.into(),
            runner,
        }
    }
}

impl GainNormalizer for NormalizeAudio {
    fn normalize(&self, file: &Path, target: f64) -> std::result::Result<(), ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-a").arg(format!("{target:.6}")).arg(file);
        self.runner.run(cmd).map(|_| ())
    }
}

/// Parse a `Key Name:   value` report into `key_name -> value`.
///
/// Keys are lower-cased with inner whitespace runs replaced by `_`.
/// Lines without a colon are ignored.
pub fn parse_report(report: &str) -> HashMap<String, String> {
    report
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| {
            let key = key
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_")
                .to_lowercase();
            (key, value.trim().to_string())
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Clamp a normalization target into `[0, 1]`.
pub fn cap_target(target: f64) -> f64 {
    target.clamp(0.0, MAX_TARGET_AMPLITUDE)
}

pub struct LoudnessMatcher<'a> {
    stats: &'a dyn AudioStats,
    normalizer: &'a dyn GainNormalizer,
}

impl<'a> LoudnessMatcher<'a> {
    pub fn new(stats: &'a dyn AudioStats, normalizer: &'a dyn GainNormalizer) -> Self {
        LoudnessMatcher { stats, normalizer }
    }

    /// RMS amplitude of `clip`.
    pub fn measure(&self, clip: &Path) -> Result<f64> {
        let report = self.stats.report(clip).map_err(|e| {
            VoiceStampError::from_tool(e, |source| VoiceStampError::Measurement {
                path: clip.to_path_buf(),
                message: source.to_string(),
            })
        })?;

        let fields = parse_report(&report);
        let raw = fields.get(RMS_AMPLITUDE_KEY).ok_or_else(|| VoiceStampError::Measurement {
            path: clip.to_path_buf(),
            message: "report has no RMS amplitude".to_string(),
        })?;
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| VoiceStampError::Measurement {
                path: clip.to_path_buf(),
                message: format!("unusable RMS amplitude '{raw}'"),
            })
    }

    /// Rescale `clip` in place toward `target` (capped at full scale).
    pub fn rescale(&self, clip: &Path, target: f64) -> Result<()> {
        let target = cap_target(target);
        log::debug!("rescaling {} to RMS {:.6}", clip.display(), target);
        self.normalizer.normalize(clip, target).map_err(|e| {
            VoiceStampError::from_tool(e, |source| VoiceStampError::Rescale { source })
        })
    }

    /// Measure `reference`, then rescale `clip` to `reference × factor`.
    /// Returns the target that was applied.
    pub fn match_to(&self, reference: &Path, clip: &Path, factor: f64) -> Result<f64> {
        let rms = self.measure(reference)?;
        let target = cap_target(rms * factor);
        log::debug!("reference RMS {:.6}, factor {}, target {:.6}", rms, factor, target);
        self.rescale(clip, target)?;
        Ok(target)
    }
}

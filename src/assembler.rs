//! Joins per-segment clips into one speech track aligned with the schedule.
//!
//! Every clip is padded with silence (and trimmed, should speech run long)
//! to exactly the number of samples between its instant and the next one,
//! then the clips are concatenated in schedule order.

use std::path::{Path, PathBuf};

use crate::error::{Result, VoiceStampError};
use crate::schedule::Schedule;
use crate::tools::{FilterGraph, GraphRequest};

/// Sample count a segment spanning `minutes` occupies at `sample_rate`.
pub fn max_samples(sample_rate: u32, minutes: u32) -> u64 {
    u64::from(sample_rate) * 60 * u64::from(minutes)
}

/// Per-segment sample bounds, in schedule order.
pub fn padding_bounds(sample_rate: u32, schedule: &Schedule) -> Vec<u64> {
    schedule
        .segments
        .iter()
        .map(|s| max_samples(sample_rate, s.bound_minutes))
        .collect()
}

/// Build the pad + concat graph for clips `[0]..[n-1]`.
///
/// A zero bound leaves the clip at its natural length.
pub fn concat_filter(bounds: &[u64]) -> String {
    let mut chains: Vec<String> = bounds
        .iter()
        .enumerate()
        .map(|(idx, &len)| {
            if len > 0 {
                format!("[{idx}]apad=whole_len={len},atrim=end_sample={len}[g{idx}]")
            } else {
                format!("[{idx}]apad=whole_len=0[g{idx}]")
            }
        })
        .collect();

    let labels: String = (0..bounds.len()).map(|idx| format!("[g{idx}]")).collect();
    chains.push(format!("{labels}concat=n={}:v=0:a=1", bounds.len()));
    chains.join(";")
}

pub struct SpeechAssembler<'a> {
    graph: &'a dyn FilterGraph,
}

impl<'a> SpeechAssembler<'a> {
    pub fn new(graph: &'a dyn FilterGraph) -> Self {
        SpeechAssembler { graph }
    }

    /// The encoder invocation that writes the joined track to `out`.
    pub fn request(
        clips: &[PathBuf],
        schedule: &Schedule,
        sample_rate: u32,
        out: &Path,
    ) -> GraphRequest {
        GraphRequest {
            inputs: clips.to_vec(),
            filter: Some(concat_filter(&padding_bounds(sample_rate, schedule))),
            output_args: Vec::new(),
            output: out.to_path_buf(),
        }
    }

    /// Pad and concatenate `clips` (one per schedule segment) into `out`.
    ///
    /// `sample_rate` is the rate of the first clip; all clips are assumed to share it.
    pub fn assemble(
        &self,
        clips: &[PathBuf],
        schedule: &Schedule,
        sample_rate: u32,
        out: &Path,
    ) -> Result<()> {
        if clips.len() != schedule.segments.len() {
            return Err(VoiceStampError::validation(format!(
                "{} clips rendered for {} segments",
                clips.len(),
                schedule.segments.len()
            )));
        }
        let request = Self::request(clips, schedule, sample_rate, out);
        log::debug!("speech graph: {}", request.filter.as_deref().unwrap_or(""));
        self.graph.run(&request).map_err(|e| {
            VoiceStampError::from_tool(e, |source| VoiceStampError::Assembly { source })
        })
    }
}

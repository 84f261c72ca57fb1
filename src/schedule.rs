//! Announcement schedule: the spoken title followed by one tick per interval.

use crate::error::{Result, VoiceStampError};
use crate::template::{Placeholder, Placeholders};
use crate::text;

/// What a segment announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Title,
    /// Elapsed-time announcement at `instant` minutes into the track.
    Tick { instant: u32 },
}

/// One phrase to synthesize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 0 is the title, ticks follow in instant order.
    pub index: usize,
    pub kind: SegmentKind,
    /// Text after `text::prepare`.
    pub text: String,
    /// Minutes of audio this segment occupies before the next one starts.
    pub bound_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub segments: Vec<Segment>,
}

impl Schedule {
    pub fn title(&self) -> &Segment {
        &self.segments[0]
    }

    pub fn ticks(&self) -> &[Segment] {
        &self.segments[1..]
    }

    pub fn tick_count(&self) -> usize {
        self.segments.len() - 1
    }

    /// Tick instants in minutes, strictly increasing.
    pub fn instants(&self) -> Vec<u32> {
        self.segments
            .iter()
            .filter_map(|s| match s.kind {
                SegmentKind::Tick { instant } => Some(instant),
                SegmentKind::Title => None,
            })
            .collect()
    }
}

/// Builds a [`Schedule`] from the timing options of a job.
#[derive(Debug, Clone)]
pub struct ScheduleBuilder<'a> {
    pub tick_offset: u32,
    pub tick_interval: u32,
    /// Added to the spoken minute value, not to the instant.
    pub tick_add: u32,
    pub title_format: &'a str,
    pub tick_format: &'a str,
}

impl ScheduleBuilder<'_> {
    /// Minimum track length (minutes) for a schedule to make sense.
    pub fn min_duration(&self) -> u32 {
        self.tick_offset.saturating_add(1)
    }

    /// Check the track is long enough and the interval is usable.
    pub fn validate(&self, duration_minutes: u32) -> Result<()> {
        if self.tick_interval == 0 {
            return Err(VoiceStampError::validation(
                "tick interval must be at least 1 minute",
            ));
        }
        if self.tick_offset == u32::MAX || duration_minutes < self.min_duration() {
            return Err(VoiceStampError::validation(format!(
                "Track too short (min. {}, current len {})",
                self.min_duration(),
                duration_minutes
            )));
        }
        Ok(())
    }

    /// Build the schedule. `extras` holds the track placeholders plus anything
    /// job-level (e.g. `config_name`); `minutes` is filled in per tick.
    pub fn build(&self, duration_minutes: u32, extras: &Placeholders) -> Result<Schedule> {
        self.validate(duration_minutes)?;

        let mut segments = vec![Segment {
            index: 0,
            kind: SegmentKind::Title,
            text: text::prepare(&extras.render(self.title_format)),
            bound_minutes: self.tick_offset,
        }];

        if !self.tick_format.is_empty() {
            let mut values = extras.clone();
            for instant in tick_instants(duration_minutes, self.tick_offset, self.tick_interval) {
                let minutes = instant.checked_add(self.tick_add).ok_or_else(|| {
                    VoiceStampError::validation(format!(
                        "tick add {} overflows the minute value at {}",
                        self.tick_add, instant
                    ))
                })?;
                values.insert(Placeholder::Minutes, minutes.to_string());
                segments.push(Segment {
                    index: segments.len(),
                    kind: SegmentKind::Tick { instant },
                    text: text::prepare(&values.render(self.tick_format)),
                    bound_minutes: self.tick_interval,
                });
            }
        }

        Ok(Schedule { segments })
    }
}

/// `offset, offset + interval, ...` strictly below `duration`.
pub fn tick_instants(duration: u32, offset: u32, interval: u32) -> Vec<u32> {
    if interval == 0 {
        return Vec::new();
    }
    (offset..duration).step_by(interval as usize).collect()
}

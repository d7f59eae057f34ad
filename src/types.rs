use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// One record of an input shard.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRow {
    pub transcript: String,
    pub audio_bytes: Vec<u8>,
}

/// Mono waveform in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            samples,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate_hz as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedWord {
    pub word: String,
    /// Sample interval is [start_sample, end_sample) at the alignment sample rate.
    pub start_sample: u64,
    pub end_sample: u64,
    /// Audio covered by this word, at the alignment sample rate.
    pub audio: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub sample_rate_hz: u32,
    pub words: Vec<AlignedWord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCodes {
    pub word: String,
    /// Seconds, rounded to two decimals.
    pub duration: f64,
    pub codes: Vec<u32>,
}

/// Word-timed codec representation of one utterance. Also the on-disk
/// speaker profile format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerExample {
    pub text: String,
    pub words: Vec<WordCodes>,
    #[serde(default)]
    pub language: String,
}

impl SpeakerExample {
    /// Codes of every word in order.
    pub fn flat_codes(&self) -> Vec<u32> {
        self.words
            .iter()
            .flat_map(|w| w.codes.iter().copied())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPromptRecord {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipReason {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Processed,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShardOutcome {
    pub path: PathBuf,
    /// False when the shard could not be opened or decoded as a table.
    pub opened: bool,
    pub rows_processed: usize,
    pub rows_skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub value: usize,
    pub io: usize,
    pub other: usize,
}

impl SkipCounts {
    pub fn record(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::Value => self.value += 1,
            FailureKind::Io => self.io += 1,
            FailureKind::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.value + self.io + self.other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub shards_discovered: usize,
    pub shards_skipped: usize,
    pub rows_processed: usize,
    pub rows_skipped: SkipCounts,
    pub records_written: usize,
    pub shards_written: Vec<PathBuf>,
    /// Flushes whose output write failed; their records were kept and retried.
    pub flush_failures: usize,
}

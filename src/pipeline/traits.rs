use std::path::Path;

use crate::config::DEFAULT_CODEC_FRAME_RATE_HZ;
use crate::error::DatasetError;
use crate::shard::table::RowResult;
use crate::types::{Alignment, AudioBuffer, SpeakerExample, TrainingPromptRecord};

/// Word-level forced alignment of a known transcript.
pub trait Aligner: Send + Sync {
    fn align(&self, audio: &AudioBuffer, transcript: &str) -> Result<Alignment, DatasetError>;
}

/// Discrete audio codec producing a fixed number of tokens per second.
pub trait AudioCodec: Send + Sync {
    /// Sample rate `encode` expects.
    fn sample_rate_hz(&self) -> u32;

    /// Tokens emitted per second of audio.
    fn frame_rate_hz(&self) -> u32 {
        DEFAULT_CODEC_FRAME_RATE_HZ
    }

    fn convert(&self, waveform: &[f32], source_rate_hz: u32) -> Result<Vec<f32>, DatasetError>;

    fn encode(&self, waveform: &[f32]) -> Result<Vec<u32>, DatasetError>;
}

pub trait PromptFormatter: Send + Sync {
    fn format(&self, example: &SpeakerExample) -> Result<String, DatasetError>;
}

pub trait ShardReader: Send + Sync {
    fn read_rows(&self, path: &Path) -> Result<Vec<RowResult>, DatasetError>;
}

pub trait ShardWriter: Send + Sync {
    fn write_shard(&self, path: &Path, records: &[TrainingPromptRecord]) -> Result<(), DatasetError>;
}

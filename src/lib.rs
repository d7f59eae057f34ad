pub mod audio;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod shard;
pub mod speaker;
pub mod types;

pub use config::{DatasetBuilderConfig, DEFAULT_CODEC_FRAME_RATE_HZ};
pub use error::{DatasetError, FailureKind};
pub use model::{GenerationConfig, ModelConfig, SpeechModel};
pub use pipeline::builder::DatasetPipelineBuilder;
pub use pipeline::defaults::{PromptTokens, TimedCodePromptFormatter};
pub use pipeline::runtime::DatasetBuilder;
pub use pipeline::traits::{Aligner, AudioCodec, PromptFormatter, ShardReader, ShardWriter};
pub use speaker::{load_speaker, save_speaker};
pub use types::{
    AlignedWord, Alignment, AudioBuffer, InputRow, RowOutcome, RunSummary, ShardOutcome,
    SkipCounts, SkipReason, SpeakerExample, TrainingPromptRecord, WordCodes,
};

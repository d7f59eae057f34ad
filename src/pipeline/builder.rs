use crate::config::DatasetBuilderConfig;
use crate::error::DatasetError;
use crate::pipeline::defaults::{ParquetShardReader, ParquetShardWriter, TimedCodePromptFormatter};
use crate::pipeline::runtime::{DatasetBuilder, DatasetBuilderParts};
use crate::pipeline::traits::{Aligner, AudioCodec, PromptFormatter, ShardReader, ShardWriter};
use crate::shard::InputColumns;

/// Assembles a [`DatasetBuilder`]. The aligner and codec have no defaults;
/// the formatter and shard I/O default to the word-timed prompt layout and
/// Parquet.
pub struct DatasetPipelineBuilder {
    config: DatasetBuilderConfig,
    aligner: Option<Box<dyn Aligner>>,
    codec: Option<Box<dyn AudioCodec>>,
    formatter: Option<Box<dyn PromptFormatter>>,
    shard_reader: Option<Box<dyn ShardReader>>,
    shard_writer: Option<Box<dyn ShardWriter>>,
}

impl DatasetPipelineBuilder {
    pub fn new(config: DatasetBuilderConfig) -> Self {
        Self {
            config,
            aligner: None,
            codec: None,
            formatter: None,
            shard_reader: None,
            shard_writer: None,
        }
    }

    pub fn with_aligner(mut self, aligner: Box<dyn Aligner>) -> Self {
        self.aligner = Some(aligner);
        self
    }

    pub fn with_codec(mut self, codec: Box<dyn AudioCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_formatter(mut self, formatter: Box<dyn PromptFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn with_shard_reader(mut self, shard_reader: Box<dyn ShardReader>) -> Self {
        self.shard_reader = Some(shard_reader);
        self
    }

    pub fn with_shard_writer(mut self, shard_writer: Box<dyn ShardWriter>) -> Self {
        self.shard_writer = Some(shard_writer);
        self
    }

    pub fn build(self) -> Result<DatasetBuilder, DatasetError> {
        self.config.validate()?;
        let aligner = self
            .aligner
            .ok_or_else(|| DatasetError::invalid_input("an aligner is required"))?;
        let codec = self
            .codec
            .ok_or_else(|| DatasetError::invalid_input("an audio codec is required"))?;

        let columns = InputColumns {
            transcript: self.config.transcript_column.clone(),
            audio: self.config.audio_column.clone(),
            audio_bytes_field: self.config.audio_bytes_field.clone(),
        };
        tracing::debug!(
            tokenizer_path = self.config.tokenizer_path.as_str(),
            flush_threshold = self.config.flush_threshold,
            codec_frame_rate_hz = codec.frame_rate_hz(),
            codec_sample_rate_hz = codec.sample_rate_hz(),
            "dataset builder configured"
        );

        Ok(DatasetBuilder::from_parts(DatasetBuilderParts {
            config: self.config,
            aligner,
            codec,
            formatter: self
                .formatter
                .unwrap_or_else(|| Box::new(TimedCodePromptFormatter::default())),
            shard_reader: self
                .shard_reader
                .unwrap_or_else(|| Box::new(ParquetShardReader::new(columns))),
            shard_writer: self
                .shard_writer
                .unwrap_or_else(|| Box::new(ParquetShardWriter)),
        }))
    }
}

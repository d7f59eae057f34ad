use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::audio::{concat_word_audio, decode_audio_bytes};
use crate::config::DatasetBuilderConfig;
use crate::error::{DatasetError, FailureKind};
use crate::pipeline::traits::{Aligner, AudioCodec, PromptFormatter, ShardReader, ShardWriter};
use crate::shard::discover_shards;
use crate::shard::table::RowResult;
use crate::types::{
    AlignedWord, AudioBuffer, RowOutcome, RunSummary, ShardOutcome, SkipCounts, SkipReason,
    SpeakerExample, TrainingPromptRecord, WordCodes,
};

/// Turns input shards of (transcript, audio) rows into output shards of
/// training prompts, flushing every `flush_threshold` processed rows.
pub struct DatasetBuilder {
    config: DatasetBuilderConfig,
    aligner: Box<dyn Aligner>,
    codec: Box<dyn AudioCodec>,
    formatter: Box<dyn PromptFormatter>,
    shard_reader: Box<dyn ShardReader>,
    shard_writer: Box<dyn ShardWriter>,
    shard_paths: Vec<PathBuf>,
    processed_count: usize,
    buffer: Vec<TrainingPromptRecord>,
    next_shard_id: usize,
    shards_skipped: usize,
    skip_counts: SkipCounts,
    records_written: usize,
    shards_written: Vec<PathBuf>,
    flush_failures: usize,
}

pub(crate) struct DatasetBuilderParts {
    pub config: DatasetBuilderConfig,
    pub aligner: Box<dyn Aligner>,
    pub codec: Box<dyn AudioCodec>,
    pub formatter: Box<dyn PromptFormatter>,
    pub shard_reader: Box<dyn ShardReader>,
    pub shard_writer: Box<dyn ShardWriter>,
}

impl DatasetBuilder {
    pub(crate) fn from_parts(parts: DatasetBuilderParts) -> Self {
        Self {
            config: parts.config,
            aligner: parts.aligner,
            codec: parts.codec,
            formatter: parts.formatter,
            shard_reader: parts.shard_reader,
            shard_writer: parts.shard_writer,
            shard_paths: Vec::new(),
            processed_count: 0,
            buffer: Vec::new(),
            next_shard_id: 0,
            shards_skipped: 0,
            skip_counts: SkipCounts::default(),
            records_written: 0,
            shards_written: Vec::new(),
            flush_failures: 0,
        }
    }

    pub fn config(&self) -> &DatasetBuilderConfig {
        &self.config
    }

    pub fn shard_paths(&self) -> &[PathBuf] {
        &self.shard_paths
    }

    pub fn processed_count(&self) -> usize {
        self.processed_count
    }

    pub fn buffered(&self) -> &[TrainingPromptRecord] {
        &self.buffer
    }

    pub fn next_shard_id(&self) -> usize {
        self.next_shard_id
    }

    pub fn flush_failures(&self) -> usize {
        self.flush_failures
    }

    /// Refreshes the list of input shards from the configured directory.
    pub fn discover(&mut self) -> &[PathBuf] {
        self.shard_paths = discover_shards(&self.config.input_dir, &self.config.input_extensions);
        tracing::info!(
            input_dir = %self.config.input_dir.display(),
            shard_count = self.shard_paths.len(),
            "discovered input shards"
        );
        &self.shard_paths
    }

    /// Aligns `audio` to `transcript`, encodes the aligned speech and assigns
    /// each word the codes of its time span.
    pub fn build_example(
        &self,
        audio: &AudioBuffer,
        transcript: &str,
    ) -> Result<SpeakerExample, DatasetError> {
        if transcript.trim().is_empty() {
            return Err(DatasetError::invalid_input("Transcript text is empty"));
        }

        let alignment = self.aligner.align(audio, transcript)?;
        if alignment.words.is_empty() {
            return Err(DatasetError::collaborator(
                "forced alignment",
                "aligner returned no words",
            ));
        }
        if alignment.sample_rate_hz == 0 {
            return Err(DatasetError::collaborator(
                "forced alignment",
                "aligner reported a zero sample rate",
            ));
        }
        let frame_rate_hz = self.codec.frame_rate_hz();
        if frame_rate_hz == 0 {
            return Err(DatasetError::collaborator(
                "codec encode",
                "codec reported a zero frame rate",
            ));
        }

        let waveform = concat_word_audio(&alignment.words);
        let converted = self.codec.convert(&waveform, alignment.sample_rate_hz)?;
        let codes = self.codec.encode(&converted)?;

        let words = split_codes_by_word(
            &alignment.words,
            alignment.sample_rate_hz,
            frame_rate_hz,
            &codes,
            self.config.sentinel_token,
        );
        Ok(SpeakerExample {
            text: transcript.to_string(),
            words,
            language: self.config.language.clone(),
        })
    }

    /// Runs one row through decode, alignment, encoding and formatting.
    /// A failed row leaves the buffer and processed count untouched.
    pub fn process_row(&mut self, row: RowResult) -> RowOutcome {
        match self.try_process_row(row) {
            Ok(record) => {
                self.buffer.push(record);
                self.processed_count += 1;
                RowOutcome::Processed
            }
            Err(err) => {
                let kind = err.failure_kind();
                self.skip_counts.record(kind);
                RowOutcome::Skipped(SkipReason {
                    kind,
                    message: err.to_string(),
                })
            }
        }
    }

    fn try_process_row(&self, row: RowResult) -> Result<TrainingPromptRecord, DatasetError> {
        let row = row?;
        let audio = decode_audio_bytes(&row.audio_bytes)?;
        let example = self.build_example(&audio, &row.transcript)?;
        let prompt = self.formatter.format(&example)?;
        Ok(TrainingPromptRecord { prompt })
    }

    /// Processes every row of one input shard. A shard that cannot be opened
    /// is logged and skipped.
    pub fn process_shard(&mut self, path: &Path) -> ShardOutcome {
        let mut outcome = ShardOutcome {
            path: path.to_path_buf(),
            ..ShardOutcome::default()
        };
        let rows = match self.shard_reader.read_rows(path) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(
                    path = %path.display(),
                    error = %err,
                    "failed to open input shard; skipping"
                );
                self.shards_skipped += 1;
                return outcome;
            }
        };
        outcome.opened = true;

        for (row_idx, row) in rows.into_iter().enumerate() {
            match self.process_row(row) {
                RowOutcome::Processed => {
                    outcome.rows_processed += 1;
                    self.maybe_flush();
                }
                RowOutcome::Skipped(reason) => {
                    outcome.rows_skipped += 1;
                    log_skipped_row(path, row_idx, &reason);
                }
            }
        }
        tracing::debug!(
            path = %path.display(),
            rows_processed = outcome.rows_processed,
            rows_skipped = outcome.rows_skipped,
            "input shard done"
        );
        outcome
    }

    /// Flushes when the processed count hits a multiple of the threshold.
    /// A failed write is logged and counted; the records stay buffered for
    /// the next flush.
    pub fn maybe_flush(&mut self) -> Option<PathBuf> {
        if self.processed_count % self.config.flush_threshold != 0 {
            return None;
        }
        match self.flush() {
            Ok(path) => path,
            Err(err) => {
                self.flush_failures += 1;
                tracing::error!(
                    severity = "critical",
                    output_dir = %self.config.output_dir.display(),
                    buffered = self.buffer.len(),
                    error = %err,
                    "failed to write output shard; keeping records for the next flush"
                );
                None
            }
        }
    }

    /// Writes the buffer as the next numbered output shard. No-op when the
    /// buffer is empty. On a write failure the buffer is kept.
    pub fn flush(&mut self) -> Result<Option<PathBuf>, DatasetError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| DatasetError::io("create output directory", e))?;

        let path = self.output_shard_path(self.next_shard_id);
        self.shard_writer.write_shard(&path, &self.buffer)?;
        tracing::info!(
            path = %path.display(),
            records = self.buffer.len(),
            shard_id = self.next_shard_id,
            "wrote output shard"
        );

        self.records_written += self.buffer.len();
        self.buffer.clear();
        self.next_shard_id += 1;
        self.shards_written.push(path.clone());
        Ok(Some(path))
    }

    fn output_shard_path(&self, shard_id: usize) -> PathBuf {
        let ext = self.config.output_extension.trim_start_matches('.');
        self.config.output_dir.join(format!("{shard_id:06}.{ext}"))
    }

    /// Discovers input shards, processes each one and flushes the remainder.
    /// Only a failure of that last flush is returned, since nothing is left
    /// to retry it.
    pub fn run(&mut self) -> Result<RunSummary, DatasetError> {
        let started_at = Utc::now();
        let paths = self.discover().to_vec();
        for path in &paths {
            self.process_shard(path);
        }
        if let Err(err) = self.flush() {
            self.flush_failures += 1;
            tracing::error!(
                severity = "critical",
                output_dir = %self.config.output_dir.display(),
                lost_records = self.buffer.len(),
                flush_failures = self.flush_failures,
                error = %err,
                "final flush failed"
            );
            return Err(err);
        }

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            shards_discovered: paths.len(),
            shards_skipped: self.shards_skipped,
            rows_processed: self.processed_count,
            rows_skipped: self.skip_counts.clone(),
            records_written: self.records_written,
            shards_written: self.shards_written.clone(),
            flush_failures: self.flush_failures,
        };
        tracing::info!(
            shards_discovered = summary.shards_discovered,
            shards_skipped = summary.shards_skipped,
            rows_processed = summary.rows_processed,
            rows_skipped = summary.rows_skipped.total(),
            shards_written = summary.shards_written.len(),
            flush_failures = summary.flush_failures,
            "dataset build finished"
        );
        Ok(summary)
    }
}

fn log_skipped_row(path: &Path, row_idx: usize, reason: &SkipReason) {
    match reason.kind {
        FailureKind::Value => tracing::warn!(
            path = %path.display(),
            row = row_idx,
            error = reason.message.as_str(),
            "skipping row with invalid value"
        ),
        FailureKind::Io => tracing::error!(
            path = %path.display(),
            row = row_idx,
            error = reason.message.as_str(),
            "skipping row after I/O error"
        ),
        FailureKind::Other => tracing::error!(
            severity = "critical",
            path = %path.display(),
            row = row_idx,
            error = reason.message.as_str(),
            "skipping row after unexpected error"
        ),
    }
}

/// Codec frame index of a sample position, rounding half to even.
fn frame_index(sample: u64, sample_rate_hz: u32, frame_rate_hz: u32) -> usize {
    ((sample as f64 / sample_rate_hz as f64) * frame_rate_hz as f64).round_ties_even() as usize
}

fn round_centis(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Partitions `codes` across `words` with a cursor that always moves to the
/// current word's end frame. Spans that come out empty, including when two
/// boundaries round to the same frame, get `[sentinel]`.
pub(crate) fn split_codes_by_word(
    words: &[AlignedWord],
    sample_rate_hz: u32,
    frame_rate_hz: u32,
    codes: &[u32],
    sentinel: u32,
) -> Vec<WordCodes> {
    let mut out = Vec::with_capacity(words.len());
    let mut start = 0usize;
    for word in words {
        let end = frame_index(word.end_sample, sample_rate_hz, frame_rate_hz);
        let lo = start.min(codes.len());
        let hi = end.min(codes.len());
        let mut span = if lo < hi {
            codes[lo..hi].to_vec()
        } else {
            Vec::new()
        };
        start = end;

        if span.is_empty() {
            tracing::debug!(
                word = word.word.as_str(),
                end_frame = end,
                "word span has no codes; using sentinel"
            );
            span.push(sentinel);
        }
        out.push(WordCodes {
            word: word.word.clone(),
            duration: round_centis(span.len() as f64 / frame_rate_hz as f64),
            codes: span,
        });
    }
    out
}

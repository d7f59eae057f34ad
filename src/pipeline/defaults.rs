use std::fmt::Write as _;
use std::path::Path;

use crate::error::DatasetError;
use crate::pipeline::traits::{PromptFormatter, ShardReader, ShardWriter};
use crate::shard::table::{read_input_rows, write_prompt_shard, InputColumns, RowResult};
use crate::types::{SpeakerExample, TrainingPromptRecord};

/// Special tokens of the word-timed prompt layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTokens {
    pub bos: String,
    pub eos: String,
    pub text_start: String,
    pub text_end: String,
    pub audio_start: String,
    pub audio_end: String,
    pub code_start: String,
    pub code_end: String,
    pub space: String,
}

impl Default for PromptTokens {
    fn default() -> Self {
        Self {
            bos: "<|im_start|>".to_string(),
            eos: "<|im_end|>".to_string(),
            text_start: "<|text_start|>".to_string(),
            text_end: "<|text_end|>".to_string(),
            audio_start: "<|audio_start|>".to_string(),
            audio_end: "<|audio_end|>".to_string(),
            code_start: "<|code_start|>".to_string(),
            code_end: "<|code_end|>".to_string(),
            space: "<|space|>".to_string(),
        }
    }
}

/// Renders the transcript followed by one line per word carrying its
/// duration token and codec codes.
#[derive(Debug, Clone, Default)]
pub struct TimedCodePromptFormatter {
    tokens: PromptTokens,
}

impl TimedCodePromptFormatter {
    pub fn new(tokens: PromptTokens) -> Self {
        Self { tokens }
    }
}

impl PromptFormatter for TimedCodePromptFormatter {
    fn format(&self, example: &SpeakerExample) -> Result<String, DatasetError> {
        if example.words.is_empty() {
            return Err(DatasetError::invalid_input(
                "speaker example has no aligned words",
            ));
        }
        let t = &self.tokens;
        let text = example
            .text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(&t.space);

        let mut prompt = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(prompt, "{}", t.bos);
        let _ = writeln!(prompt, "{}{}{}", t.text_start, text, t.text_end);
        let _ = writeln!(prompt, "{}", t.audio_start);
        for word in &example.words {
            let _ = write!(
                prompt,
                "{}<|t_{:.2}|>{}",
                word.word, word.duration, t.code_start
            );
            for code in &word.codes {
                let _ = write!(prompt, "<|{code}|>");
            }
            let _ = writeln!(prompt, "{}", t.code_end);
        }
        let _ = writeln!(prompt, "{}", t.audio_end);
        prompt.push_str(&t.eos);
        Ok(prompt)
    }
}

pub struct ParquetShardReader {
    columns: InputColumns,
}

impl ParquetShardReader {
    pub fn new(columns: InputColumns) -> Self {
        Self { columns }
    }
}

impl ShardReader for ParquetShardReader {
    fn read_rows(&self, path: &Path) -> Result<Vec<RowResult>, DatasetError> {
        read_input_rows(path, &self.columns)
    }
}

pub struct ParquetShardWriter;

impl ShardWriter for ParquetShardWriter {
    fn write_shard(&self, path: &Path, records: &[TrainingPromptRecord]) -> Result<(), DatasetError> {
        write_prompt_shard(path, records)
    }
}

//! Interface of the external speech model that consumes prompt shards for
//! training and produces audio at inference time.

use std::path::Path;

use serde::Deserialize;

use crate::error::DatasetError;
use crate::types::{AudioBuffer, SpeakerExample, TrainingPromptRecord};

const SENTENCE_DELIMITERS: &[char] = &[
    '.', '?', '!', ';', ':', '\n', '\r', '\t', '。', '？', '！', '…',
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_path: String,
    pub language: String,
    pub tokenizer_path: Option<String>,
    /// Languages the model was trained on. `change_language` only accepts
    /// these, so an empty list rejects every switch.
    pub languages: Vec<String>,
    pub max_seq_length: usize,
    /// `None` lets the model pick an accelerator when one is present.
    pub device: Option<String>,
}

impl ModelConfig {
    pub const DEFAULT_MAX_SEQ_LENGTH: usize = 4096;

    pub fn check_generation_max_length(&self, max_length: usize) -> Result<(), DatasetError> {
        if max_length == 0 {
            return Err(DatasetError::invalid_input("max_length must be specified"));
        }
        if max_length > self.max_seq_length {
            return Err(DatasetError::invalid_input(format!(
                "Requested max_length ({max_length}) exceeds the current max_seq_length ({})",
                self.max_seq_length
            )));
        }
        Ok(())
    }

    pub fn change_language(&mut self, language: &str) -> Result<(), DatasetError> {
        let language = language.trim().to_lowercase();
        if !self.languages.contains(&language) {
            return Err(DatasetError::invalid_input(format!(
                "Language {language} is not supported by the current model"
            )));
        }
        self.language = language;
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            language: "en".to_string(),
            tokenizer_path: None,
            languages: Vec::new(),
            max_seq_length: Self::DEFAULT_MAX_SEQ_LENGTH,
            device: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub repetition_penalty: f32,
    pub max_length: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            repetition_penalty: 1.1,
            max_length: ModelConfig::DEFAULT_MAX_SEQ_LENGTH,
        }
    }
}

pub trait SpeechModel {
    fn config(&self) -> &ModelConfig;

    /// One optimization step over `batch`; returns the step loss.
    fn train(&mut self, batch: &[TrainingPromptRecord]) -> Result<f32, DatasetError>;

    fn save_checkpoint(&self, path: &Path) -> Result<(), DatasetError>;

    fn generate(
        &self,
        text: &str,
        speaker: Option<&SpeakerExample>,
        config: &GenerationConfig,
    ) -> Result<AudioBuffer, DatasetError>;
}

/// Generates audio after checking `config.max_length` against the model.
pub fn generate_checked(
    model: &dyn SpeechModel,
    text: &str,
    speaker: Option<&SpeakerExample>,
    config: &GenerationConfig,
) -> Result<AudioBuffer, DatasetError> {
    model
        .config()
        .check_generation_max_length(config.max_length)?;
    model.generate(text, speaker, config)
}

/// Splits text into trimmed, non-empty sentences.
pub fn split_text(text: &str) -> Vec<String> {
    text.split(SENTENCE_DELIMITERS)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Generates one clip per sentence of `text`.
pub fn generate_segments(
    model: &dyn SpeechModel,
    text: &str,
    speaker: Option<&SpeakerExample>,
    config: &GenerationConfig,
) -> Result<Vec<AudioBuffer>, DatasetError> {
    let segments = split_text(text);
    tracing::info!(
        chars = text.chars().count(),
        segments = segments.len(),
        "split text for generation"
    );
    segments
        .iter()
        .map(|segment| generate_checked(model, segment, speaker, config))
        .collect()
}

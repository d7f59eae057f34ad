use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DatasetError;

/// Frame rate assumed for codecs that do not declare their own.
pub const DEFAULT_CODEC_FRAME_RATE_HZ: u32 = 75;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetBuilderConfig {
    /// Tokenizer / model reference handed to the prompt formatter.
    pub tokenizer_path: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Number of processed rows between output shard flushes.
    pub flush_threshold: usize,
    /// Filename suffixes that mark an input shard (matched with `ends_with`).
    pub input_extensions: Vec<String>,
    /// Extension of written output shards, without the leading dot.
    pub output_extension: String,
    pub language: String,
    /// Substituted when a word's frame span contains no codes.
    pub sentinel_token: u32,
    pub transcript_column: String,
    pub audio_column: String,
    pub audio_bytes_field: String,
}

impl DatasetBuilderConfig {
    pub const DEFAULT_FLUSH_THRESHOLD: usize = 1000;
    pub const DEFAULT_SENTINEL_TOKEN: u32 = 1;

    pub fn new(
        tokenizer_path: impl Into<String>,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tokenizer_path: tokenizer_path.into(),
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.flush_threshold = flush_threshold;
        self
    }

    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| DatasetError::io("read dataset config", e))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| DatasetError::json("parse dataset config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.flush_threshold == 0 {
            return Err(DatasetError::invalid_input(
                "flush_threshold must be at least 1",
            ));
        }
        if self.input_extensions.is_empty()
            || self.input_extensions.iter().any(|ext| ext.is_empty())
        {
            return Err(DatasetError::invalid_input(
                "input_extensions must contain at least one non-empty suffix",
            ));
        }
        if self.output_extension.trim_start_matches('.').is_empty() {
            return Err(DatasetError::invalid_input(
                "output_extension must not be empty",
            ));
        }
        Ok(())
    }
}

impl Default for DatasetBuilderConfig {
    fn default() -> Self {
        Self {
            tokenizer_path: String::new(),
            input_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            flush_threshold: Self::DEFAULT_FLUSH_THRESHOLD,
            input_extensions: vec![".parquet".to_string()],
            output_extension: "parquet".to_string(),
            language: "en".to_string(),
            sentinel_token: Self::DEFAULT_SENTINEL_TOKEN,
            transcript_column: "transcript".to_string(),
            audio_column: "audio".to_string(),
            audio_bytes_field: "bytes".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_config_default() {
        let config = DatasetBuilderConfig::default();
        assert!(config.tokenizer_path.is_empty());
        assert_eq!(config.flush_threshold, 1000);
        assert_eq!(config.input_extensions, vec![".parquet".to_string()]);
        assert_eq!(config.output_extension, "parquet");
        assert_eq!(config.sentinel_token, 1);
        assert_eq!(config.transcript_column, "transcript");
        assert_eq!(config.audio_column, "audio");
        assert_eq!(config.audio_bytes_field, "bytes");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{
            "tokenizer_path": "tok/",
            "input_dir": "data/in",
            "output_dir": "data/out",
            "flush_threshold": 250
        }"#;
        let config: DatasetBuilderConfig = serde_json::from_str(json).expect("valid config json");
        assert_eq!(config.tokenizer_path, "tok/");
        assert_eq!(config.input_dir, PathBuf::from("data/in"));
        assert_eq!(config.flush_threshold, 250);
        assert_eq!(config.language, "en");
        assert_eq!(config.sentinel_token, 1);
    }

    #[test]
    fn validate_rejects_zero_threshold_and_empty_suffixes() {
        let config = DatasetBuilderConfig::new("tok", "in", "out").with_flush_threshold(0);
        assert!(matches!(
            config.validate(),
            Err(DatasetError::InvalidInput { .. })
        ));

        let mut config = DatasetBuilderConfig::new("tok", "in", "out");
        config.input_extensions.clear();
        assert!(config.validate().is_err());

        let mut config = DatasetBuilderConfig::new("tok", "in", "out");
        config.output_extension = ".".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dataset.json");
        std::fs::write(&path, r#"{"flush_threshold": 0}"#).expect("write config");
        assert!(DatasetBuilderConfig::load(&path).is_err());

        std::fs::write(&path, r#"{"output_dir": "shards", "language": "ja"}"#)
            .expect("write config");
        let config = DatasetBuilderConfig::load(&path).expect("load config");
        assert_eq!(config.output_dir, PathBuf::from("shards"));
        assert_eq!(config.language, "ja");

        assert!(DatasetBuilderConfig::load(&dir.path().join("missing.json")).is_err());
    }
}

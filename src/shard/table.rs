//! Parquet tables: input shards of (transcript, audio) rows and output
//! shards of training prompts.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use ::parquet::arrow::ArrowWriter;
use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef, GenericBinaryArray, GenericStringArray, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};

use crate::error::DatasetError;
use crate::types::{InputRow, TrainingPromptRecord};

pub const PROMPT_COLUMN: &str = "prompt";

pub type RowResult = Result<InputRow, DatasetError>;

/// Column layout of an input shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputColumns {
    pub transcript: String,
    /// Either a binary column or a struct holding `audio_bytes_field`.
    pub audio: String,
    pub audio_bytes_field: String,
}

impl Default for InputColumns {
    fn default() -> Self {
        Self {
            transcript: "transcript".to_string(),
            audio: "audio".to_string(),
            audio_bytes_field: "bytes".to_string(),
        }
    }
}

enum TextColumn<'a> {
    Small(&'a GenericStringArray<i32>),
    Large(&'a GenericStringArray<i64>),
}

impl TextColumn<'_> {
    fn get(&self, idx: usize) -> Option<&str> {
        match self {
            Self::Small(a) => (!a.is_null(idx)).then(|| a.value(idx)),
            Self::Large(a) => (!a.is_null(idx)).then(|| a.value(idx)),
        }
    }
}

enum BytesColumn<'a> {
    Small(&'a GenericBinaryArray<i32>),
    Large(&'a GenericBinaryArray<i64>),
}

impl BytesColumn<'_> {
    fn get(&self, idx: usize) -> Option<&[u8]> {
        match self {
            Self::Small(a) => (!a.is_null(idx)).then(|| a.value(idx)),
            Self::Large(a) => (!a.is_null(idx)).then(|| a.value(idx)),
        }
    }
}

/// Reads every row of an input shard in file order.
///
/// The outer error means the file is not a readable table with the expected
/// columns. Inner errors are per-row value problems (null fields).
pub fn read_input_rows(path: &Path, columns: &InputColumns) -> Result<Vec<RowResult>, DatasetError> {
    let file = File::open(path).map_err(|e| DatasetError::io("open input shard", e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| DatasetError::parquet("read input shard metadata", e))?
        .build()
        .map_err(|e| DatasetError::parquet("build input shard reader", e))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| DatasetError::arrow("decode input record batch", e))?;
        rows.extend(rows_from_batch(&batch, columns)?);
    }
    Ok(rows)
}

fn rows_from_batch(batch: &RecordBatch, columns: &InputColumns) -> Result<Vec<RowResult>, DatasetError> {
    let transcript_col = batch
        .column_by_name(&columns.transcript)
        .ok_or_else(|| missing_column(&columns.transcript))?;
    let transcripts = text_column(transcript_col).ok_or_else(|| {
        DatasetError::invalid_input(format!(
            "column '{}' is {}, expected a string column",
            columns.transcript,
            transcript_col.data_type()
        ))
    })?;

    let audio_col = batch
        .column_by_name(&columns.audio)
        .ok_or_else(|| missing_column(&columns.audio))?;
    let (audio_struct, bytes_col) = match audio_col.as_struct_opt() {
        Some(audio_struct) => {
            let field = audio_struct
                .column_by_name(&columns.audio_bytes_field)
                .ok_or_else(|| {
                    missing_column(&format!("{}.{}", columns.audio, columns.audio_bytes_field))
                })?;
            (Some(audio_struct), field)
        }
        None => (None, audio_col),
    };
    let audio_bytes = bytes_column(bytes_col).ok_or_else(|| {
        DatasetError::invalid_input(format!(
            "audio bytes column is {}, expected a binary column",
            bytes_col.data_type()
        ))
    })?;

    let rows = (0..batch.num_rows())
        .map(|idx| -> RowResult {
            let transcript = transcripts.get(idx).ok_or_else(|| {
                DatasetError::invalid_input(format!("row {idx}: transcript is null"))
            })?;
            if audio_struct.is_some_and(|s| s.is_null(idx)) {
                return Err(DatasetError::invalid_input(format!(
                    "row {idx}: audio is null"
                )));
            }
            let bytes = audio_bytes.get(idx).ok_or_else(|| {
                DatasetError::invalid_input(format!("row {idx}: audio bytes are null"))
            })?;
            Ok(InputRow {
                transcript: transcript.to_string(),
                audio_bytes: bytes.to_vec(),
            })
        })
        .collect();
    Ok(rows)
}

fn text_column(array: &ArrayRef) -> Option<TextColumn<'_>> {
    array
        .as_string_opt::<i32>()
        .map(TextColumn::Small)
        .or_else(|| array.as_string_opt::<i64>().map(TextColumn::Large))
}

fn bytes_column(array: &ArrayRef) -> Option<BytesColumn<'_>> {
    array
        .as_binary_opt::<i32>()
        .map(BytesColumn::Small)
        .or_else(|| array.as_binary_opt::<i64>().map(BytesColumn::Large))
}

fn missing_column(name: &str) -> DatasetError {
    DatasetError::invalid_input(format!("input shard has no column '{name}'"))
}

fn prompt_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![Field::new(
        PROMPT_COLUMN,
        DataType::Utf8,
        false,
    )]))
}

/// Writes `records` as one Parquet file with a single `prompt` column.
///
/// Data goes to a sibling `.partial` file first and is renamed into place,
/// so `path` either holds a complete shard or does not exist.
pub fn write_prompt_shard(path: &Path, records: &[TrainingPromptRecord]) -> Result<(), DatasetError> {
    let schema = prompt_schema();
    let prompts = StringArray::from_iter_values(records.iter().map(|r| r.prompt.as_str()));
    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(prompts) as ArrayRef])
        .map_err(|e| DatasetError::arrow("build prompt record batch", e))?;

    let partial = partial_path(path);
    let written = write_batch(&partial, schema, &batch)
        .and_then(|()| fs::rename(&partial, path).map_err(|e| DatasetError::io("publish output shard", e)));
    if written.is_err() {
        let _ = fs::remove_file(&partial);
    }
    written
}

fn write_batch(path: &Path, schema: Arc<Schema>, batch: &RecordBatch) -> Result<(), DatasetError> {
    let file = File::create(path).map_err(|e| DatasetError::io("create output shard", e))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)
        .map_err(|e| DatasetError::parquet("open output shard writer", e))?;
    writer
        .write(batch)
        .map_err(|e| DatasetError::parquet("write output shard", e))?;
    writer
        .close()
        .map_err(|e| DatasetError::parquet("finalize output shard", e))?;
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

pub fn read_prompt_shard(path: &Path) -> Result<Vec<TrainingPromptRecord>, DatasetError> {
    let file = File::open(path).map_err(|e| DatasetError::io("open prompt shard", e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| DatasetError::parquet("read prompt shard metadata", e))?
        .build()
        .map_err(|e| DatasetError::parquet("build prompt shard reader", e))?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| DatasetError::arrow("decode prompt record batch", e))?;
        let column = batch
            .column_by_name(PROMPT_COLUMN)
            .ok_or_else(|| missing_column(PROMPT_COLUMN))?;
        let prompts = text_column(column).ok_or_else(|| {
            DatasetError::invalid_input(format!("column '{PROMPT_COLUMN}' is not a string column"))
        })?;
        for idx in 0..batch.num_rows() {
            let prompt = prompts.get(idx).ok_or_else(|| {
                DatasetError::invalid_input(format!("row {idx}: prompt is null"))
            })?;
            records.push(TrainingPromptRecord {
                prompt: prompt.to_string(),
            });
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use arrow_array::{BinaryArray, StructArray};

    use super::*;

    fn write_input(path: &Path, transcripts: Vec<Option<&str>>, audio: Vec<Option<&[u8]>>) {
        let bytes: ArrayRef = Arc::new(BinaryArray::from_opt_vec(audio));
        let audio = StructArray::from(vec![(
            Arc::new(Field::new("bytes", DataType::Binary, true)),
            bytes,
        )]);
        let batch = RecordBatch::try_from_iter(vec![
            ("transcript", Arc::new(StringArray::from(transcripts)) as ArrayRef),
            ("audio", Arc::new(audio) as ArrayRef),
        ])
        .expect("input batch");
        let file = File::create(path).expect("create input");
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).expect("writer");
        writer.write(&batch).expect("write input");
        writer.close().expect("close input");
    }

    #[test]
    fn reads_struct_audio_rows_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("train-0.parquet");
        write_input(
            &path,
            vec![Some("first"), None, Some("third")],
            vec![Some(b"aa".as_slice()), Some(b"bb".as_slice()), None],
        );

        let rows = read_input_rows(&path, &InputColumns::default()).expect("read rows");
        assert_eq!(rows.len(), 3);
        let first = rows[0].as_ref().expect("first row");
        assert_eq!(first.transcript, "first");
        assert_eq!(first.audio_bytes, b"aa".to_vec());
        assert!(matches!(rows[1], Err(DatasetError::InvalidInput { .. })));
        assert!(matches!(rows[2], Err(DatasetError::InvalidInput { .. })));
    }

    #[test]
    fn missing_columns_fail_the_whole_shard() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("train-0.parquet");
        write_input(&path, vec![Some("only")], vec![Some(b"aa".as_slice())]);

        let columns = InputColumns {
            transcript: "text".to_string(),
            ..InputColumns::default()
        };
        assert!(read_input_rows(&path, &columns).is_err());

        let columns = InputColumns {
            audio_bytes_field: "array".to_string(),
            ..InputColumns::default()
        };
        assert!(read_input_rows(&path, &columns).is_err());
    }

    #[test]
    fn non_parquet_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.parquet");
        fs::write(&path, b"definitely not parquet").expect("write");
        assert!(matches!(
            read_input_rows(&path, &InputColumns::default()),
            Err(DatasetError::Parquet { .. })
        ));
    }

    #[test]
    fn prompt_shard_write_then_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("000000.parquet");
        let records = vec![
            TrainingPromptRecord {
                prompt: "one".to_string(),
            },
            TrainingPromptRecord {
                prompt: "two".to_string(),
            },
        ];
        write_prompt_shard(&path, &records).expect("write shard");
        assert!(!partial_path(&path).exists());
        assert_eq!(read_prompt_shard(&path).expect("read shard"), records);
    }

    #[test]
    fn failed_publish_leaves_no_partial_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A non-empty directory in the way makes the final rename fail.
        let path = dir.path().join("000000.parquet");
        fs::create_dir_all(path.join("occupied")).expect("blocking dir");
        let records = vec![TrainingPromptRecord {
            prompt: "one".to_string(),
        }];

        let err = write_prompt_shard(&path, &records).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
        assert!(!partial_path(&path).exists());
    }
}

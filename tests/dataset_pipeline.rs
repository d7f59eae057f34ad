use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{ArrayRef, BinaryArray, RecordBatch, StringArray, StructArray};
use arrow_schema::{DataType, Field};
use parquet::arrow::ArrowWriter;
use speech_prompt_dataset::shard::read_prompt_shard;
use speech_prompt_dataset::{
    AlignedWord, Aligner, Alignment, AudioBuffer, AudioCodec, DatasetBuilder,
    DatasetBuilderConfig, DatasetError, DatasetPipelineBuilder,
};

/// Splits the decoded audio evenly across the transcript's words.
struct EvenSplitAligner;

impl Aligner for EvenSplitAligner {
    fn align(&self, audio: &AudioBuffer, transcript: &str) -> Result<Alignment, DatasetError> {
        let words: Vec<&str> = transcript.split_whitespace().collect();
        let per_word = audio.samples.len() / words.len();
        let aligned = words
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let start = i * per_word;
                let end = start + per_word;
                AlignedWord {
                    word: w.to_string(),
                    start_sample: start as u64,
                    end_sample: end as u64,
                    audio: audio.samples[start..end].to_vec(),
                }
            })
            .collect();
        Ok(Alignment {
            sample_rate_hz: audio.sample_rate_hz,
            words: aligned,
        })
    }
}

/// 24 kHz codec with a 75 Hz frame rate (320 samples per code).
struct FrameCounterCodec;

impl AudioCodec for FrameCounterCodec {
    fn sample_rate_hz(&self) -> u32 {
        24_000
    }

    fn convert(&self, waveform: &[f32], source_rate_hz: u32) -> Result<Vec<f32>, DatasetError> {
        let ratio = self.sample_rate_hz() as f64 / source_rate_hz as f64;
        let len = (waveform.len() as f64 * ratio).round() as usize;
        Ok((0..len)
            .map(|i| waveform[((i as f64 / ratio) as usize).min(waveform.len() - 1)])
            .collect())
    }

    fn encode(&self, waveform: &[f32]) -> Result<Vec<u32>, DatasetError> {
        Ok((0..(waveform.len() / 320) as u32).collect())
    }
}

fn wav_bytes(seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for i in 0..(16_000.0 * seconds) as usize {
            let v = ((i as f32 * 0.05).sin() * 8_000.0) as i16;
            writer.write_sample(v).expect("sample");
        }
        writer.finalize().expect("finalize");
    }
    cursor.into_inner()
}

fn write_input_shard(path: &Path, rows: &[(&str, Vec<u8>)]) {
    let transcripts = StringArray::from(rows.iter().map(|(t, _)| *t).collect::<Vec<_>>());
    let bytes: ArrayRef = Arc::new(BinaryArray::from(
        rows.iter().map(|(_, b)| b.as_slice()).collect::<Vec<_>>(),
    ));
    let audio = StructArray::from(vec![(
        Arc::new(Field::new("bytes", DataType::Binary, true)),
        bytes,
    )]);
    let batch = RecordBatch::try_from_iter(vec![
        ("transcript", Arc::new(transcripts) as ArrayRef),
        ("audio", Arc::new(audio) as ArrayRef),
    ])
    .expect("batch");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create input dir");
    }
    let file = File::create(path).expect("create shard");
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).expect("writer");
    writer.write(&batch).expect("write");
    writer.close().expect("close");
}

fn builder(input: &Path, output: &Path, threshold: usize) -> DatasetBuilder {
    let config = DatasetBuilderConfig::new("tokenizer", input, output).with_flush_threshold(threshold);
    DatasetPipelineBuilder::new(config)
        .with_aligner(Box::new(EvenSplitAligner))
        .with_codec(Box::new(FrameCounterCodec))
        .build()
        .expect("build dataset builder")
}

fn shard_sizes(paths: &[PathBuf]) -> Vec<usize> {
    paths
        .iter()
        .map(|p| read_prompt_shard(p).expect("read output shard").len())
        .collect()
}

#[test]
fn two_rows_with_threshold_one_make_two_shards() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    write_input_shard(
        &input.join("train-00000.parquet"),
        &[("hello world", wav_bytes(0.5)), ("good night", wav_bytes(0.4))],
    );

    let summary = builder(&input, &output, 1).run().expect("run");

    assert_eq!(summary.rows_processed, 2);
    assert_eq!(
        summary.shards_written,
        vec![output.join("000000.parquet"), output.join("000001.parquet")]
    );
    assert_eq!(shard_sizes(&summary.shards_written), vec![1, 1]);

    let first = read_prompt_shard(&output.join("000000.parquet")).expect("read");
    assert!(first[0].prompt.contains("hello<|space|>world"));
    assert!(first[0].prompt.contains("<|code_start|><|0|><|1|>"));
}

#[test]
fn unparseable_audio_row_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    write_input_shard(
        &input.join("a.parquet"),
        &[
            ("first row", wav_bytes(0.3)),
            ("broken row", b"\x00\x01 not audio".to_vec()),
            ("third row", wav_bytes(0.3)),
        ],
    );

    let summary = builder(&input, &output, 1000).run().expect("run");

    assert_eq!(summary.rows_processed, 2);
    assert_eq!(summary.rows_skipped.other, 1);
    assert_eq!(summary.rows_skipped.total(), 1);
    assert_eq!(summary.records_written, 2);
    let records = read_prompt_shard(&output.join("000000.parquet")).expect("read");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.prompt.contains("broken")));
}

#[test]
fn empty_input_directory_writes_no_shards() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in");
    std::fs::create_dir_all(&input).expect("create input");
    std::fs::write(input.join("README.txt"), "no shards here").expect("write");
    let output = dir.path().join("out");

    let summary = builder(&input, &output, 10).run().expect("run");

    assert_eq!(summary.shards_discovered, 0);
    assert!(summary.shards_written.is_empty());
    assert!(!output.exists());
}

#[test]
fn corrupt_shard_does_not_stop_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    write_input_shard(&input.join("good.parquet"), &[("fine words", wav_bytes(0.3))]);
    std::fs::write(input.join("bad.parquet"), b"PAR1 truncated").expect("write corrupt");

    let summary = builder(&input, &output, 10).run().expect("run");

    assert_eq!(summary.shards_discovered, 2);
    assert_eq!(summary.shards_skipped, 1);
    assert_eq!(summary.rows_processed, 1);
    assert_eq!(shard_sizes(&summary.shards_written), vec![1]);
}

#[test]
fn full_shards_hold_threshold_records_and_last_holds_remainder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    let rows: Vec<(&str, Vec<u8>)> = (0..4).map(|_| ("one two", wav_bytes(0.2))).collect();
    write_input_shard(&input.join("part-0").join("x.parquet"), &rows);
    let rows: Vec<(&str, Vec<u8>)> = (0..3).map(|_| ("three four", wav_bytes(0.2))).collect();
    write_input_shard(&input.join("part-1").join("y.parquet"), &rows);

    let summary = builder(&input, &output, 3).run().expect("run");

    assert_eq!(summary.rows_processed, 7);
    assert_eq!(shard_sizes(&summary.shards_written), vec![3, 3, 1]);
    assert_eq!(summary.records_written, 7);
}

#[test]
fn output_path_that_is_a_file_keeps_every_row_buffered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    std::fs::write(&output, b"not a directory").expect("write blocking file");
    write_input_shard(
        &input.join("a.parquet"),
        &[("first row", wav_bytes(0.3)), ("second row", wav_bytes(0.3))],
    );
    write_input_shard(&input.join("b.parquet"), &[("third row", wav_bytes(0.3))]);

    let mut builder = builder(&input, &output, 1);
    let err = builder.run().unwrap_err();

    assert!(matches!(err, DatasetError::Io { .. }));
    assert_eq!(builder.processed_count(), 3);
    assert_eq!(builder.buffered().len(), 3);
    assert_eq!(builder.flush_failures(), 4);
    assert_eq!(builder.next_shard_id(), 0);
}

#[test]
fn rerun_into_the_same_output_replaces_shards() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("out");

    let first_input = dir.path().join("first");
    write_input_shard(&first_input.join("a.parquet"), &[("old words", wav_bytes(0.3))]);
    builder(&first_input, &output, 10).run().expect("first run");

    let second_input = dir.path().join("second");
    write_input_shard(
        &second_input.join("a.parquet"),
        &[("new words", wav_bytes(0.3)), ("fresh text", wav_bytes(0.3))],
    );
    let summary = builder(&second_input, &output, 10).run().expect("second run");

    assert_eq!(summary.shards_written, vec![output.join("000000.parquet")]);
    let records = read_prompt_shard(&output.join("000000.parquet")).expect("read");
    assert_eq!(records.len(), 2);
    assert!(records[0].prompt.contains("new<|space|>words"));
    assert!(records[1].prompt.contains("fresh<|space|>text"));
    assert!(records.iter().all(|r| !r.prompt.contains("old")));

    let names: Vec<String> = std::fs::read_dir(&output)
        .expect("list output")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["000000.parquet".to_string()]);
}

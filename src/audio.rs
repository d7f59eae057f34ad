//! Decoding of raw audio bytes stored in input shards.

use std::io::{Cursor, Read};

use claxon::FlacReader;
use hound::{SampleFormat, WavReader};

use crate::error::DatasetError;
use crate::types::{AlignedWord, AudioBuffer};

const WAV_MAGIC: &[u8; 4] = b"RIFF";
const FLAC_MAGIC: &[u8; 4] = b"fLaC";

/// Decodes an in-memory WAV or FLAC file into a mono waveform.
/// Multi-channel input is averaged per frame.
pub fn decode_audio_bytes(bytes: &[u8]) -> Result<AudioBuffer, DatasetError> {
    if bytes.is_empty() {
        return Err(DatasetError::invalid_input("audio bytes are empty"));
    }
    if bytes.starts_with(WAV_MAGIC) {
        decode_wav(Cursor::new(bytes))
    } else if bytes.starts_with(FLAC_MAGIC) {
        decode_flac(Cursor::new(bytes))
    } else {
        Err(DatasetError::audio(
            "sniff container",
            "unrecognized audio header (expected WAV or FLAC)",
        ))
    }
}

fn decode_wav<R: Read>(reader: R) -> Result<AudioBuffer, DatasetError> {
    let mut reader = WavReader::new(reader).map_err(|e| DatasetError::audio("open WAV", e))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(DatasetError::audio("open WAV", "zero channels"));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| DatasetError::audio("read WAV samples", e))?,
        SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample as i32);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| DatasetError::audio("read WAV samples", e))?
        }
    };

    Ok(AudioBuffer::new(
        downmix(&interleaved, channels),
        spec.sample_rate,
    ))
}

fn decode_flac<R: Read>(reader: R) -> Result<AudioBuffer, DatasetError> {
    let mut reader = FlacReader::new(reader).map_err(|e| DatasetError::audio("open FLAC", e))?;
    let streaminfo = reader.streaminfo();
    let channels = streaminfo.channels as usize;
    let sample_rate_hz = streaminfo.sample_rate;
    if channels == 0 {
        return Err(DatasetError::audio("open FLAC", "zero channels"));
    }
    let scale = int_scale(streaminfo.bits_per_sample as i32);

    let interleaved: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<Result<_, _>>()
        .map_err(|e| DatasetError::audio("read FLAC samples", e))?;

    Ok(AudioBuffer::new(
        downmix(&interleaved, channels),
        sample_rate_hz,
    ))
}

fn int_scale(bits_per_sample: i32) -> f32 {
    if bits_per_sample > 1 {
        ((1_i64 << (bits_per_sample - 1)) - 1) as f32
    } else {
        1.0
    }
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Joins the per-word audio of an alignment into one contiguous waveform.
pub fn concat_word_audio(words: &[AlignedWord]) -> Vec<f32> {
    let total = words.iter().map(|w| w.audio.len()).sum();
    let mut out = Vec::with_capacity(total);
    for word in words {
        out.extend_from_slice(&word.audio);
    }
    out
}

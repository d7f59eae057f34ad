use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::Path;

use crate::error::DatasetError;
use crate::types::SpeakerExample;

/// Saves a speaker profile as pretty-printed JSON.
pub fn save_speaker(path: &Path, speaker: &SpeakerExample) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DatasetError::io("create speaker directory", e))?;
    }
    let mut file = File::create(path).map_err(|e| DatasetError::io("create speaker file", e))?;
    serde_json::to_writer_pretty(&mut file, speaker)
        .map_err(|e| DatasetError::json("serialize speaker", e))?;
    file.write_all(b"\n")
        .map_err(|e| DatasetError::io("finalize speaker file", e))?;
    Ok(())
}

pub fn load_speaker(path: &Path) -> Result<SpeakerExample, DatasetError> {
    let file = File::open(path).map_err(|e| DatasetError::io("open speaker file", e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| DatasetError::json("parse speaker file", e))
}

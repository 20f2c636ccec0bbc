//! JSON Lines recordings of inertial samples.
//!
//! One [`Sample`] per line. Recordings let a session be replayed through the
//! pipeline deterministically, since scheduling runs on sample time rather
//! than wall-clock time.

use crate::collector::types::Sample;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors reading or writing a recording.
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Read all samples from a JSON Lines recording.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn read_recording(path: &Path) -> Result<Vec<Sample>, RecordingError> {
    let reader = BufReader::new(File::open(path)?);
    let mut samples = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let sample: Sample = serde_json::from_str(trimmed).map_err(|e| RecordingError::Parse {
            line: index + 1,
            message: e.to_string(),
        })?;
        samples.push(sample);
    }

    Ok(samples)
}

/// Write samples as a JSON Lines recording, creating parent directories.
pub fn write_recording(path: &Path, samples: &[Sample]) -> Result<(), RecordingError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for sample in samples {
        let line =
            serde_json::to_string(sample).map_err(|e| RecordingError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("walk.jsonl");

        let samples = vec![
            Sample::accel(0.00, 0.0, 0.1, 9.8),
            Sample::accel(0.02, 0.0, 0.2, 9.7).with_gyro(0.0, 0.1, 0.0),
        ];
        write_recording(&path, &samples).unwrap();

        let read = read_recording(&path).unwrap();
        assert_eq!(read, samples);
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.jsonl");
        std::fs::write(
            &path,
            "# device: test\n\n{\"timestamp\":0.0,\"ax\":0,\"ay\":0,\"az\":1}\n",
        )
        .unwrap();

        let read = read_recording(&path).unwrap();
        assert_eq!(read.len(), 1);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(
            &path,
            "{\"timestamp\":0.0,\"ax\":0,\"ay\":0,\"az\":1}\nnot json\n",
        )
        .unwrap();

        match read_recording(&path) {
            Err(RecordingError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}

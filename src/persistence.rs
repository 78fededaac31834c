use crate::error::StoreError;
use crate::types::Sample;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only durability log.
///
/// One UTF-8 line per acknowledged insert, each line a JSON-encoded [`Sample`]
/// (see [`encode_line`]). The writer flushes after every record; there are no
/// checksums, no segmentation, and the file is never truncated or rewritten,
/// so the log grows without bound for the lifetime of an installation.
/// Eviction frees memory, not disk.
#[derive(Debug)]
pub struct AppendLog {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
}

impl AppendLog {
    /// Opens the log at `path` for appending, creating it if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(StoreError::Io)?;
        Ok(AppendLog {
            writer: Some(BufWriter::new(file)),
            path,
        })
    }

    /// Reads every record from the log at `path`, in write order.
    ///
    /// A missing file yields an empty set. Any line that does not decode back
    /// to a sample aborts the replay with [`StoreError::Corruption`] naming
    /// the offending line; partial replay would silently lose data.
    pub fn replay<P: AsRef<Path>>(path: P) -> Result<Vec<Sample>, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut samples = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let sample = decode_line(&line).map_err(|e| StoreError::Corruption {
                path: path.to_path_buf(),
                line: n + 1,
                details: e.to_string(),
            })?;
            samples.push(sample);
        }
        Ok(samples)
    }

    /// Appends one encoded record line and flushes it. Returns the number of
    /// bytes written (line plus newline).
    pub fn append(&mut self, line: &str) -> Result<usize, StoreError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| StoreError::Internal("append log already closed".to_string()))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(line.len() + 1)
    }

    /// Flushes and closes the log file. Further appends fail.
    pub fn close(&mut self) -> Result<(), StoreError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Serializes a sample into its canonical log line (no trailing newline).
pub fn encode_line(sample: &Sample) -> Result<String, StoreError> {
    serde_json::to_string(sample).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Parses one log line back into a sample.
pub fn decode_line(line: &str) -> Result<Sample, serde_json::Error> {
    serde_json::from_str(line)
}

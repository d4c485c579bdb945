//! Per-call WAV recording
//!
//! Inbound and outbound audio are appended to one mono 8 kHz file in the
//! order they pass through the engine.

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;

type Writer = WavWriter<BufWriter<File>>;

pub struct CallRecording {
    path: PathBuf,
    writer: Mutex<Option<Writer>>,
}

impl fmt::Debug for CallRecording {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallRecording")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl CallRecording {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(&path, spec)?;
        debug!("Recording call audio to {}", path.display());
        Ok(Self {
            path,
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append samples. A write failure stops the recording, not the call.
    pub fn append(&self, samples: &[i16]) {
        let mut guard = self.writer.lock();
        let Some(writer) = guard.as_mut() else {
            return;
        };
        for &sample in samples {
            if let Err(e) = writer.write_sample(sample) {
                warn!("Recording to {} failed, stopping: {}", self.path.display(), e);
                *guard = None;
                return;
            }
        }
    }

    /// Write the header and close the file
    pub fn finalize(&self) -> Result<PathBuf> {
        if let Some(writer) = self.writer.lock().take() {
            writer.finalize()?;
        }
        Ok(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_are_concatenated() {
        let dir = tempfile::tempdir().unwrap();
        let recording = CallRecording::create(dir.path().join("calls/one.wav"), 8000).unwrap();
        recording.append(&[1, 2, 3]);
        recording.append(&[-4, -5]);
        let path = recording.finalize().unwrap();
        // Appending after finalize is a no-op
        recording.append(&[9]);

        let reader = hound::WavReader::open(path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, 2, 3, -4, -5]);
    }

    #[test]
    fn test_debug_shows_path() {
        let dir = tempfile::tempdir().unwrap();
        let recording = CallRecording::create(dir.path().join("two.wav"), 8000).unwrap();
        let shown = format!("{recording:?}");
        assert!(shown.starts_with("CallRecording"));
        assert!(shown.contains("two.wav"));
    }
}

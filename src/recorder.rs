// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Rotating per-sensor record files
//!
//! The [`Recorder`] keeps one append-only CSV stream per sensor. Streams are
//! opened lazily on the first record for a sensor, start with a header row,
//! and are rotated together: [`Recorder::rotate`] closes every open stream
//! and reopens it under the next rotation index, so per-day files stay
//! aligned across sensors.
//!
//! A storage fault only affects the sensor it happened on. The failed stream
//! is dropped and the next record for that sensor tries to open it again.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::protocol::SensorId;

/// Default file name pattern; `{index}` is the rotation index, `{sensor}` the id
pub const DEFAULT_FILE_PATTERN: &str = "day{index}-sensor{sensor}.csv";

/// Failures collected while touching several streams
pub type StreamFailures = Vec<(SensorId, StorageError)>;

/// Where record files go and how they are named
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    /// Directory holding the files
    pub directory: PathBuf,
    /// File name pattern
    pub file_pattern: String,
}

impl RecordLayout {
    /// Create a layout with the default file pattern
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
        }
    }

    /// Use a custom file name pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = pattern.into();
        self
    }

    /// Path of the file for `sensor` in rotation `index`
    pub fn path_for(&self, sensor: SensorId, index: u32) -> PathBuf {
        let name = self
            .file_pattern
            .replace("{index}", &index.to_string())
            .replace("{sensor}", &sensor.to_string());
        self.directory.join(name)
    }
}

/// One open record stream
struct SensorStream {
    path: PathBuf,
    writer: csv::Writer<File>,
    rotation: u32,
    header_written: bool,
    records: u64,
}

impl SensorStream {
    fn open(path: PathBuf, rotation: u32, header: &[String]) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StorageError::Open {
                path: path.clone(),
                source,
            })?;
        let is_fresh = file
            .metadata()
            .map(|m| m.len() == 0)
            .map_err(|source| StorageError::Open {
                path: path.clone(),
                source,
            })?;

        let mut stream = Self {
            writer: csv::WriterBuilder::new().from_writer(file),
            path,
            rotation,
            header_written: false,
            records: 0,
        };

        if is_fresh {
            stream.write_durable(header)?;
            stream.header_written = true;
        }

        Ok(stream)
    }

    fn write_durable<I, T>(&mut self, fields: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(fields)
            .map_err(|source| StorageError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.writer.flush().map_err(|e| StorageError::Write {
            path: self.path.clone(),
            source: e.into(),
        })?;
        self.writer
            .get_ref()
            .sync_data()
            .map_err(|source| StorageError::Sync {
                path: self.path.clone(),
                source,
            })
    }

    fn close(mut self) -> Result<(), StorageError> {
        self.writer.flush().map_err(|e| StorageError::Write {
            path: self.path.clone(),
            source: e.into(),
        })
    }
}

impl std::fmt::Debug for SensorStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorStream")
            .field("path", &self.path)
            .field("rotation", &self.rotation)
            .field("header_written", &self.header_written)
            .field("records", &self.records)
            .finish()
    }
}

/// Per-sensor rotating record writer
#[derive(Debug)]
pub struct Recorder {
    layout: RecordLayout,
    header: Vec<String>,
    streams: BTreeMap<SensorId, SensorStream>,
    rotation: u32,
    headers_written: u64,
}

impl Recorder {
    /// Create a recorder; no file is touched until the first record
    pub fn new(layout: RecordLayout, header: Vec<String>) -> Self {
        Self {
            layout,
            header,
            streams: BTreeMap::new(),
            rotation: 1,
            headers_written: 0,
        }
    }

    /// Append one record for `sensor`, opening its stream if needed
    ///
    /// The record is flushed and synced to the device before returning.
    pub fn record<I, T>(&mut self, sensor: SensorId, fields: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        if !self.streams.contains_key(&sensor) {
            let stream = self.open_stream(sensor)?;
            self.streams.insert(sensor, stream);
        }

        let result = match self.streams.get_mut(&sensor) {
            Some(stream) => stream.write_durable(fields).map(|()| stream.records += 1),
            None => Ok(()),
        };

        if result.is_err() {
            self.streams.remove(&sensor);
        }
        result
    }

    /// Close every open stream and reopen it under the next rotation index
    ///
    /// Returns the streams that could not be reopened; they are dropped and
    /// reopened lazily on their next record.
    pub fn rotate(&mut self) -> StreamFailures {
        self.rotate_to(self.rotation + 1)
    }

    /// Rotate to a specific index
    pub fn rotate_to(&mut self, index: u32) -> StreamFailures {
        self.rotation = index;
        let mut failures = Vec::new();

        let sensors: Vec<SensorId> = self.streams.keys().copied().collect();
        for sensor in sensors {
            if let Some(old) = self.streams.remove(&sensor) {
                if let Err(e) = old.close() {
                    failures.push((sensor, e));
                }
            }
            match self.open_stream(sensor) {
                Ok(stream) => {
                    self.streams.insert(sensor, stream);
                }
                Err(e) => failures.push((sensor, e)),
            }
        }

        failures
    }

    /// Close every open stream
    pub fn close_all(&mut self) -> StreamFailures {
        let streams = std::mem::take(&mut self.streams);
        streams
            .into_iter()
            .filter_map(|(sensor, stream)| stream.close().err().map(|e| (sensor, e)))
            .collect()
    }

    fn open_stream(&mut self, sensor: SensorId) -> Result<SensorStream, StorageError> {
        let path = self.layout.path_for(sensor, self.rotation);
        let stream = SensorStream::open(path, self.rotation, &self.header)?;
        if stream.header_written {
            self.headers_written += 1;
            log::debug!("opened record stream {}", stream.path.display());
        }
        Ok(stream)
    }

    /// Current rotation index (starts at 1)
    pub fn rotation_index(&self) -> u32 {
        self.rotation
    }

    /// Number of open streams
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Sensors with an open stream
    pub fn sensors(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.streams.keys().copied()
    }

    /// Path of the open stream for `sensor`
    pub fn stream_path(&self, sensor: SensorId) -> Option<&Path> {
        self.streams.get(&sensor).map(|s| s.path.as_path())
    }

    /// Records written to the current stream of `sensor`
    pub fn stream_records(&self, sensor: SensorId) -> Option<u64> {
        self.streams.get(&sensor).map(|s| s.records)
    }

    /// Total header rows written since creation
    pub fn headers_written(&self) -> u64 {
        self.headers_written
    }

    /// Column header
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// File layout
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        for (sensor, e) in self.close_all() {
            log::warn!("closing stream for sensor {} failed: {}", sensor, e);
        }
    }
}

// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Size-bounded rotating text journal
//!
//! Diagnostic reports at or above the persist threshold land here. When the
//! next line would push the active file past its size limit, the files roll
//! over: `errors.log` becomes `errors.log.1`, `.1` becomes `.2`, and so on,
//! dropping the oldest beyond the backup count.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Default size limit of the active file
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Default number of rolled files kept
pub const DEFAULT_BACKUPS: usize = 5;

/// Rotating append-only journal
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: File,
    size: u64,
    max_bytes: u64,
    backups: usize,
}

impl Journal {
    /// Open (or create) the journal at `path`
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = open_append(&path)?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            path,
            file,
            size,
            max_bytes,
            backups,
        })
    }

    /// Append one line (a newline is added)
    pub fn append(&mut self, line: &str) -> Result<(), StorageError> {
        let len = line.len() as u64 + 1;
        if self.max_bytes > 0 && self.size > 0 && self.size + len > self.max_bytes {
            self.roll()?;
        }

        writeln!(self.file, "{}", line)
            .and_then(|()| self.file.flush())
            .map_err(|source| StorageError::Append {
                path: self.path.clone(),
                source,
            })?;
        self.size += len;
        Ok(())
    }

    fn roll(&mut self) -> Result<(), StorageError> {
        let append_err = |path: &Path, source| StorageError::Append {
            path: path.to_path_buf(),
            source,
        };

        if self.backups > 0 {
            for i in (1..self.backups).rev() {
                let from = self.backup_path(i);
                if from.exists() {
                    fs::rename(&from, self.backup_path(i + 1)).map_err(|e| append_err(&from, e))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1)).map_err(|e| append_err(&self.path, e))?;
        } else {
            fs::remove_file(&self.path).map_err(|e| append_err(&self.path, e))?;
        }

        self.file = open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }

    /// Path of the `index`-th rolled file
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    /// Path of the active file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the active file in bytes
    pub fn size(&self) -> u64 {
        self.size
    }
}

fn open_append(path: &Path) -> Result<File, StorageError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })
}

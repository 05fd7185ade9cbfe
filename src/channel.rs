// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Line source abstraction
//!
//! This module provides the trait the link reader consumes and an in-memory
//! implementation for tests and local replay. The real device (a serial
//! port) lives in the CLI crate; a simulated sensor array lives in
//! `basestation-sim`.

use crate::error::LinkError;
use std::collections::VecDeque;

/// Description of a candidate endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Address used to open the endpoint (e.g. `/dev/ttyACM0`, `COM6`)
    pub name: String,
    /// Free-form description (e.g. `USB Serial Device`)
    pub description: String,
}

impl Endpoint {
    /// Create a new endpoint description
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Choose an endpoint among `candidates`
///
/// An exact match on the hint wins. Otherwise the first candidate whose name
/// or description contains `detect` is used. With neither, nothing is chosen.
pub fn select_endpoint<'a>(
    hint: Option<&str>,
    detect: &str,
    candidates: &'a [Endpoint],
) -> Option<&'a Endpoint> {
    if let Some(hint) = hint {
        if let Some(found) = candidates
            .iter()
            .find(|c| c.name == hint || c.name.ends_with(&format!("/{}", hint)))
        {
            return Some(found);
        }
    }

    if detect.is_empty() {
        return None;
    }
    candidates
        .iter()
        .find(|c| c.description.contains(detect) || c.name.contains(detect))
}

/// A duplex, line-oriented byte stream
///
/// `has_line_waiting` must never block; `read_line` is only called after it
/// returned `true`.
pub trait LineSource {
    /// Open the connection
    fn connect(&mut self) -> Result<(), LinkError>;

    /// Close the connection (no-op when already closed)
    fn disconnect(&mut self);

    /// Whether a connection is currently open
    fn is_connected(&self) -> bool;

    /// Whether a complete line can be read without blocking
    fn has_line_waiting(&mut self) -> Result<bool, LinkError>;

    /// Read one line, without its line terminator
    fn read_line(&mut self) -> Result<String, LinkError>;

    /// Write one line (a terminator is appended)
    fn write_line(&mut self, line: &str) -> Result<(), LinkError>;

    /// Candidate endpoints this source could connect to
    fn enumerate_endpoints(&self) -> Vec<Endpoint>;
}

/// Scripted input for a [`MemoryLineSource`]
#[derive(Debug, Clone, PartialEq)]
pub enum Feed {
    /// A text line
    Line(String),
    /// Raw bytes (may be invalid UTF-8)
    Bytes(Vec<u8>),
    /// The link drops when this is reached
    Drop,
}

/// An in-memory line source for testing and local replay
#[derive(Debug)]
pub struct MemoryLineSource {
    /// Pending input
    incoming: VecDeque<Feed>,
    /// Lines written by the reader side
    outgoing: Vec<String>,
    /// Scripted connect results; `true` once exhausted
    connect_script: VecDeque<bool>,
    /// Whether the link is open
    is_open: bool,
    /// Number of connect attempts
    connect_attempts: usize,
    /// Number of read_line calls
    reads: usize,
    /// Endpoints reported by enumerate_endpoints
    endpoints: Vec<Endpoint>,
}

impl MemoryLineSource {
    /// Create a new, disconnected source
    pub fn new() -> Self {
        Self {
            incoming: VecDeque::new(),
            outgoing: Vec::new(),
            connect_script: VecDeque::new(),
            is_open: false,
            connect_attempts: 0,
            reads: 0,
            endpoints: vec![Endpoint::new("memory", "in-memory line source")],
        }
    }

    /// Create an already connected source
    pub fn connected() -> Self {
        Self {
            is_open: true,
            ..Self::new()
        }
    }

    /// Queue a text line
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.incoming.push_back(Feed::Line(line.into()));
    }

    /// Queue raw bytes
    pub fn push_bytes(&mut self, bytes: impl Into<Vec<u8>>) {
        self.incoming.push_back(Feed::Bytes(bytes.into()));
    }

    /// Queue a link drop
    pub fn push_drop(&mut self) {
        self.incoming.push_back(Feed::Drop);
    }

    /// Make the next `n` connect attempts fail
    pub fn fail_connects(&mut self, n: usize) {
        self.connect_script.extend(std::iter::repeat(false).take(n));
    }

    /// Set the endpoints returned by enumerate_endpoints
    pub fn with_endpoints(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Lines written so far
    pub fn written(&self) -> &[String] {
        &self.outgoing
    }

    /// Number of queued feed items
    pub fn pending(&self) -> usize {
        self.incoming.len()
    }

    /// Number of connect attempts so far
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts
    }

    /// Number of read_line calls so far
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Default for MemoryLineSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSource for MemoryLineSource {
    fn connect(&mut self) -> Result<(), LinkError> {
        self.connect_attempts += 1;
        if self.connect_script.pop_front().unwrap_or(true) {
            self.is_open = true;
            Ok(())
        } else {
            Err(LinkError::ConnectFailure {
                endpoint: "memory".to_string(),
                reason: "scripted failure".to_string(),
            })
        }
    }

    fn disconnect(&mut self) {
        self.is_open = false;
    }

    fn is_connected(&self) -> bool {
        self.is_open
    }

    fn has_line_waiting(&mut self) -> Result<bool, LinkError> {
        if !self.is_open {
            return Err(LinkError::NotConnected);
        }
        Ok(!self.incoming.is_empty())
    }

    fn read_line(&mut self) -> Result<String, LinkError> {
        if !self.is_open {
            return Err(LinkError::NotConnected);
        }
        self.reads += 1;

        match self.incoming.pop_front() {
            Some(Feed::Line(line)) => Ok(line),
            Some(Feed::Bytes(bytes)) => String::from_utf8(bytes)
                .map(|s| s.trim_end_matches(|c: char| c == '\r' || c == '\n').to_string())
                .map_err(|e| LinkError::Decode {
                    reason: e.to_string(),
                }),
            Some(Feed::Drop) => {
                self.is_open = false;
                Err(LinkError::Transport {
                    reason: "device disconnected".to_string(),
                })
            }
            None => Err(LinkError::Transport {
                reason: "read with no data waiting".to_string(),
            }),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        if !self.is_open {
            return Err(LinkError::NotConnected);
        }
        self.outgoing.push(line.to_string());
        Ok(())
    }

    fn enumerate_endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_connect() {
        let mut source = MemoryLineSource::new();
        assert!(!source.is_connected());
        source.connect().unwrap();
        assert!(source.is_connected());
        source.disconnect();
        assert!(!source.is_connected());
    }

    #[test]
    fn test_memory_source_scripted_failures() {
        let mut source = MemoryLineSource::new();
        source.fail_connects(2);
        assert!(source.connect().is_err());
        assert!(source.connect().is_err());
        assert!(source.connect().is_ok());
        assert_eq!(source.connect_attempts(), 3);
    }

    #[test]
    fn test_memory_source_lines() {
        let mut source = MemoryLineSource::connected();
        assert!(!source.has_line_waiting().unwrap());
        source.push_line("hello");
        assert!(source.has_line_waiting().unwrap());
        assert_eq!(source.read_line().unwrap(), "hello");
        assert_eq!(source.pending(), 0);
    }

    #[test]
    fn test_memory_source_invalid_bytes() {
        let mut source = MemoryLineSource::connected();
        source.push_bytes(vec![0xff, 0xfe, b'\n']);
        let result = source.read_line();
        assert!(matches!(result, Err(LinkError::Decode { .. })));
        assert!(source.is_connected());
    }

    #[test]
    fn test_memory_source_drop() {
        let mut source = MemoryLineSource::connected();
        source.push_drop();
        assert!(matches!(
            source.read_line(),
            Err(LinkError::Transport { .. })
        ));
        assert!(!source.is_connected());
    }

    #[test]
    fn test_memory_source_write_requires_connection() {
        let mut source = MemoryLineSource::new();
        assert_eq!(source.write_line("50"), Err(LinkError::NotConnected));
        source.connect().unwrap();
        source.write_line("50").unwrap();
        assert_eq!(source.written(), &["50".to_string()]);
    }

    #[test]
    fn test_select_endpoint_hint() {
        let candidates = vec![
            Endpoint::new("/dev/ttyS0", "PCI"),
            Endpoint::new("/dev/ttyACM0", "USB Serial"),
            Endpoint::new("/dev/ttyACM1", "USB Serial"),
        ];
        let chosen = select_endpoint(Some("ttyACM1"), "USB", &candidates).unwrap();
        assert_eq!(chosen.name, "/dev/ttyACM1");
    }

    #[test]
    fn test_select_endpoint_detect_fallback() {
        let candidates = vec![
            Endpoint::new("/dev/ttyS0", "PCI"),
            Endpoint::new("/dev/ttyACM3", "USB Serial"),
        ];
        // Hinted device was reassigned by the OS
        let chosen = select_endpoint(Some("/dev/ttyACM0"), "USB", &candidates).unwrap();
        assert_eq!(chosen.name, "/dev/ttyACM3");
        assert!(select_endpoint(Some("/dev/ttyACM0"), "", &candidates).is_none());
        assert!(select_endpoint(None, "Bluetooth", &candidates).is_none());
    }
}

// BaseStation CLI - Serial base station command-line tool
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Serial port line source
//!
//! The port is opened with a short read timeout and only ever read when the
//! driver has bytes available, so `has_line_waiting` never blocks: it drains
//! whatever the OS has buffered into a pending buffer and reports whether a
//! complete `\n`-terminated line is in it.

use std::io::{Read, Write};
use std::time::Duration;

use basestation::channel::{select_endpoint, Endpoint, LineSource};
use basestation::error::LinkError;
use basestation::LinkConfig;
use serialport::{FlowControl, SerialPort, SerialPortType};
use tracing::{debug, warn};

/// Line source backed by a serial port
pub struct SerialLineSource {
    hint: Option<String>,
    detect: String,
    baud_rate: u32,
    read_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
    endpoint: Option<String>,
    pending: Vec<u8>,
}

impl SerialLineSource {
    /// Create a disconnected source from link settings
    pub fn new(link: &LinkConfig) -> Self {
        Self {
            hint: link.port.clone(),
            detect: link.detect.clone(),
            baud_rate: link.baud_rate,
            read_timeout: link.read_timeout(),
            port: None,
            endpoint: None,
            pending: Vec::new(),
        }
    }

    /// Name of the endpoint currently open
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    fn resolve(&self) -> Result<String, LinkError> {
        let candidates = self.enumerate_endpoints();
        if let Some(endpoint) = select_endpoint(self.hint.as_deref(), &self.detect, &candidates) {
            return Ok(endpoint.name.clone());
        }
        // A configured port may exist without being enumerable (e.g. a pty)
        match &self.hint {
            Some(hint) => Ok(hint.clone()),
            None => Err(LinkError::NoEndpoint {
                hint: self.detect.clone(),
            }),
        }
    }

    fn transport(&mut self, reason: impl ToString) -> LinkError {
        self.disconnect();
        LinkError::Transport {
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Debug for SerialLineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLineSource")
            .field("hint", &self.hint)
            .field("baud_rate", &self.baud_rate)
            .field("endpoint", &self.endpoint)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Split the first complete line off `buffer`, without its terminator
pub fn take_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=end).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}

/// Human-readable description of a port, used for auto-detection
pub fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(info) => {
            let mut description = format!("USB (VID: 0x{:04x}, PID: 0x{:04x})", info.vid, info.pid);
            if let Some(manufacturer) = &info.manufacturer {
                description.push_str(&format!(" {}", manufacturer));
            }
            if let Some(product) = &info.product {
                description.push_str(&format!(" {}", product));
            }
            description
        }
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::Unknown => "Unknown".to_string(),
    }
}

impl LineSource for SerialLineSource {
    fn connect(&mut self) -> Result<(), LinkError> {
        let name = self.resolve()?;
        let port = serialport::new(&name, self.baud_rate)
            .timeout(self.read_timeout)
            .flow_control(FlowControl::None)
            .open()
            .map_err(|e| LinkError::ConnectFailure {
                endpoint: name.clone(),
                reason: e.to_string(),
            })?;

        debug!("opened {} at {} baud", name, self.baud_rate);
        self.pending.clear();
        self.port = Some(port);
        self.endpoint = Some(name);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(name) = self.endpoint.take() {
            debug!("closing {}", name);
        }
        self.port = None;
        self.pending.clear();
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn has_line_waiting(&mut self) -> Result<bool, LinkError> {
        if self.pending.contains(&b'\n') {
            return Ok(true);
        }
        let port = self.port.as_mut().ok_or(LinkError::NotConnected)?;

        let available = match port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => return Err(self.transport(e)),
        };
        if available > 0 {
            let mut chunk = vec![0u8; available];
            match port.read(&mut chunk) {
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(self.transport(e)),
            }
        }
        Ok(self.pending.contains(&b'\n'))
    }

    fn read_line(&mut self) -> Result<String, LinkError> {
        if self.port.is_none() {
            return Err(LinkError::NotConnected);
        }
        let line = take_line(&mut self.pending).ok_or_else(|| LinkError::Transport {
            reason: "read with no complete line buffered".to_string(),
        })?;
        String::from_utf8(line).map_err(|e| LinkError::Decode {
            reason: e.to_string(),
        })
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotConnected)?;
        let result = port
            .write_all(format!("{}\n", line).as_bytes())
            .and_then(|()| port.flush());
        result.map_err(|e| self.transport(e))
    }

    fn enumerate_endpoints(&self) -> Vec<Endpoint> {
        match serialport::available_ports() {
            Ok(ports) => ports
                .into_iter()
                .map(|p| Endpoint::new(p.port_name, describe(&p.port_type)))
                .collect(),
            Err(e) => {
                warn!("cannot enumerate serial ports: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_line() {
        let mut buffer = b"12 1.5 3\r\n7 0.".to_vec();
        assert_eq!(take_line(&mut buffer), Some(b"12 1.5 3".to_vec()));
        assert_eq!(buffer, b"7 0.".to_vec());
        assert_eq!(take_line(&mut buffer), None);

        buffer.extend_from_slice(b"5 1\n\n");
        assert_eq!(take_line(&mut buffer), Some(b"7 0.5 1".to_vec()));
        assert_eq!(take_line(&mut buffer), Some(Vec::new()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_disconnected_source() {
        let mut source = SerialLineSource::new(&LinkConfig::default());
        assert!(!source.is_connected());
        assert!(matches!(source.has_line_waiting(), Err(LinkError::NotConnected)));
        assert!(matches!(source.read_line(), Err(LinkError::NotConnected)));
        assert!(matches!(source.write_line("10"), Err(LinkError::NotConnected)));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&SerialPortType::PciPort), "PCI");
        assert_eq!(describe(&SerialPortType::Unknown), "Unknown");
    }
}

//! Serial bridge for radar boards
//!
//! Boards enumerate as a USB CDC serial port (directly or through a debugger
//! bridge). The link carries the framed protocol unchanged.

use std::io::{Read, Write};
use std::time::Duration;

use super::{Connector, Transport};
use crate::error::TransportError;

/// Opens serial ports via the `serialport` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialConnector;

impl SerialConnector {
    /// List available serial ports.
    ///
    /// # Errors
    ///
    /// Returns error if the ports cannot be enumerated.
    pub fn list_ports() -> Result<Vec<String>, TransportError> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }
}

impl Connector for SerialConnector {
    type Transport = SerialTransport;

    fn open(&self, identifier: &str, baud_rate: u32) -> Result<SerialTransport, TransportError> {
        let port = serialport::new(identifier, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| TransportError::Open {
                identifier: identifier.to_string(),
                baud_rate,
                reason: e.to_string(),
            })?;

        // Drop anything the board sent before we were listening
        port.clear(serialport::ClearBuffer::All)?;

        Ok(SerialTransport { identifier: identifier.to_string(), port: Some(port) })
    }
}

/// Open serial connection to a board.
pub struct SerialTransport {
    identifier: String,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    fn port(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("identifier", &self.identifier)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl Transport for SerialTransport {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn read(&mut self, max_bytes: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let port = self.port()?;
        port.set_timeout(timeout)?;

        let mut buffer = vec![0u8; max_bytes];
        match port.read(&mut buffer) {
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!("Closed serial port {}", self.identifier);
        }
    }
}

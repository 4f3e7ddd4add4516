//! A scripted stand-in for a board, for running the engine without hardware.
//!
//! Each scripted line becomes available at a fixed offset from the first
//! read on the link. Reads honour the configured timeout the way a real
//! port does: when nothing is due before the timeout, the read sleeps for
//! the full timeout and returns empty.

use crate::serial_link::{LineSource, SerialBackend};
use serialport::{SerialPortInfo, SerialPortType, UsbPortInfo};
use std::collections::VecDeque;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Line(Vec<u8>),
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedLine {
    at: Duration,
    event: Event,
}

impl ScriptedLine {
    /// Raw bytes, terminator included, available `at` after the first read.
    pub fn new(at: Duration, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            at,
            event: Event::Line(bytes.into()),
        }
    }

    /// The cable is pulled `at` after the first read.
    pub fn disconnect(at: Duration) -> Self {
        Self {
            at,
            event: Event::Disconnect,
        }
    }
}

/// Build the enumeration entry of a USB serial adapter.
pub fn usb_port(port_name: &str, manufacturer: &str) -> SerialPortInfo {
    SerialPortInfo {
        port_name: port_name.to_string(),
        port_type: SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x2341,
            pid: 0x0043,
            serial_number: None,
            manufacturer: Some(manufacturer.to_string()),
            product: None,
        }),
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    script: Vec<ScriptedLine>,
    ports: Vec<SerialPortInfo>,
    open_error: Option<serialport::ErrorKind>,
}

impl SimulatedBackend {
    pub fn new(script: Vec<ScriptedLine>) -> Self {
        Self {
            script,
            ports: Vec::new(),
            open_error: None,
        }
    }

    /// Board that answers every read immediately with `line`.
    pub fn streaming(line: &str, count: usize) -> Self {
        let script = (0..count)
            .map(|_| ScriptedLine::new(Duration::ZERO, line.as_bytes()))
            .collect();
        Self::new(script)
    }

    pub fn with_ports(mut self, ports: Vec<SerialPortInfo>) -> Self {
        self.ports = ports;
        self
    }

    /// Make every `open` fail with `kind`.
    pub fn failing_open(mut self, kind: serialport::ErrorKind) -> Self {
        self.open_error = Some(kind);
        self
    }
}

impl SerialBackend for SimulatedBackend {
    type Link = SimulatedLink;

    fn available_ports(&self) -> serialport::Result<Vec<SerialPortInfo>> {
        Ok(self.ports.clone())
    }

    fn open(
        &self,
        port: &str,
        _baud_rate: u32,
        timeout: Duration,
    ) -> serialport::Result<SimulatedLink> {
        if let Some(kind) = self.open_error {
            return Err(serialport::Error::new(
                kind,
                format!("simulated failure opening {port}"),
            ));
        }
        Ok(SimulatedLink {
            script: self.script.iter().cloned().collect(),
            timeout,
            origin: None,
            closed: false,
        })
    }
}

#[derive(Debug)]
pub struct SimulatedLink {
    script: VecDeque<ScriptedLine>,
    timeout: Duration,
    origin: Option<Instant>,
    closed: bool,
}

impl SimulatedLink {
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl LineSource for SimulatedLink {
    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        }

        let now = Instant::now();
        let origin = *self.origin.get_or_insert(now);
        let elapsed = now.duration_since(origin);

        let due_in = match self.script.front() {
            Some(next) => next.at.saturating_sub(elapsed),
            None => {
                thread::sleep(self.timeout);
                return Ok(Vec::new());
            }
        };

        if due_in > self.timeout {
            thread::sleep(self.timeout);
            return Ok(Vec::new());
        }

        thread::sleep(due_in);
        match self.script.pop_front().map(|line| line.event) {
            Some(Event::Line(bytes)) => Ok(bytes),
            Some(Event::Disconnect) => {
                self.script.clear();
                Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "simulated board disconnected",
                ))
            }
            None => Ok(Vec::new()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

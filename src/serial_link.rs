use serialport::{SerialPort, SerialPortInfo};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// A byte stream that hands out one newline-terminated line per call.
pub trait LineSource {
    /// Read until `\n` or until the read timeout elapses.
    ///
    /// Returns the bytes received including the terminator, the partial
    /// bytes received before the timeout, or an empty buffer when nothing
    /// arrived at all. Errors are reserved for a broken link.
    fn read_line(&mut self) -> io::Result<Vec<u8>>;

    /// Release the link. The handle is dropped right after either way.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Host facilities needed to find and open a board.
pub trait SerialBackend {
    type Link: LineSource;

    fn available_ports(&self) -> serialport::Result<Vec<SerialPortInfo>>;

    fn open(&self, port: &str, baud_rate: u32, timeout: Duration)
        -> serialport::Result<Self::Link>;
}

/// The host's real serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerial;

impl SerialBackend for SystemSerial {
    type Link = SerialLink;

    fn available_ports(&self) -> serialport::Result<Vec<SerialPortInfo>> {
        serialport::available_ports()
    }

    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> serialport::Result<SerialLink> {
        SerialLink::open(port, baud_rate, timeout)
    }
}

#[derive(Debug)]
pub struct SerialLink {
    serial: Box<dyn SerialPort>,
    timeout: Duration,
}

impl SerialLink {
    pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> serialport::Result<Self> {
        let serial = serialport::new(port, baud_rate).timeout(timeout).open()?;
        log::debug!("Opened {} at {} baud", port, baud_rate);
        Self::from_port(serial, timeout)
    }

    /// Wrap an already opened port.
    pub fn from_port(
        mut serial: Box<dyn SerialPort>,
        timeout: Duration,
    ) -> serialport::Result<Self> {
        serial.set_timeout(timeout)?;
        let mut link = Self { serial, timeout };
        link.discard_input()?;
        Ok(link)
    }

    /// Drop anything the board sent before we started listening.
    fn discard_input(&mut self) -> serialport::Result<()> {
        self.serial.clear(serialport::ClearBuffer::Input)
    }

    fn read_until(&mut self, deadline: Instant, line: &mut Vec<u8>) -> io::Result<()> {
        loop {
            // Each port read waits at most for what is left of the deadline.
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.serial.set_timeout(remaining)?;

            let mut byte = [0u8; 1];
            match self.serial.read(&mut byte) {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        return Ok(());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Ok(());
            }
        }
    }
}

impl LineSource for SerialLink {
    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        let deadline = Instant::now() + self.timeout;

        let result = self.read_until(deadline, &mut line);
        self.serial.set_timeout(self.timeout)?;
        result?;

        Ok(line)
    }

    fn close(&mut self) -> io::Result<()> {
        self.serial.flush()?;
        self.discard_input()?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serialport::TTYPort;
    use std::thread;

    fn link_pair(timeout: Duration) -> (SerialLink, TTYPort) {
        let (board, host) = TTYPort::pair().unwrap();
        let link = SerialLink::from_port(Box::new(host), timeout).unwrap();
        (link, board)
    }

    #[test]
    fn test_reads_one_full_line() {
        let (mut link, mut board) = link_pair(Duration::from_millis(500));
        board.write_all(b"512\r\n1023\r\n").unwrap();

        assert_eq!(link.read_line().unwrap(), b"512\r\n");
        assert_eq!(link.read_line().unwrap(), b"1023\r\n");
    }

    #[test]
    fn test_silent_board_gives_empty_line() {
        let (mut link, _board) = link_pair(Duration::from_millis(50));

        let start = Instant::now();
        let line = link.read_line().unwrap();
        let took = start.elapsed();

        assert!(line.is_empty());
        assert!(took >= Duration::from_millis(40));
        assert!(took < Duration::from_millis(150));
    }

    #[test]
    fn test_partial_line_is_cut_at_timeout() {
        let timeout = Duration::from_millis(300);
        let (mut link, mut board) = link_pair(timeout);

        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(250));
            board.write_all(b"12").unwrap();
            thread::sleep(Duration::from_millis(400));
            board
        });

        let start = Instant::now();
        let line = link.read_line().unwrap();
        let took = start.elapsed();
        let _board = writer.join().unwrap();

        assert_eq!(line, b"12");
        assert!(took < Duration::from_millis(400));
    }

    #[test]
    fn test_timeout_restored_after_read() {
        let timeout = Duration::from_millis(80);
        let (mut link, mut board) = link_pair(timeout);
        board.write_all(b"7\n").unwrap();

        link.read_line().unwrap();
        assert_eq!(link.serial.timeout(), timeout);
    }

    #[test]
    fn test_close_discards_pending_input() {
        let (mut link, mut board) = link_pair(Duration::from_millis(50));
        board.write_all(b"stale").unwrap();
        thread::sleep(Duration::from_millis(20));

        link.close().unwrap();
        assert!(link.read_line().unwrap().is_empty());
    }
}

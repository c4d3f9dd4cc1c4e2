use std::{
    io::{self, Read, Write},
    time::Duration,
};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use sirf::{Clock, Transport};

/// Host serial port, opened lazily by the session
pub struct SerialTransport {
    path: String,
    port: Option<Box<dyn SerialPort>>,
    /// Byte taken by a timed read and not yet handed out
    peeked: Option<u8>,
}

impl SerialTransport {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            port: None,
            peeked: None,
        }
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is closed"))
    }

    fn read_port(&mut self, timeout_ms: u32) -> io::Result<Option<u8>> {
        let port = self.port()?;
        port.set_timeout(Duration::from_millis(u64::from(timeout_ms)))?;
        let mut byte = [0; 1];
        match port.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Transport for SerialTransport {
    type Error = io::Error;

    fn open(&mut self, baud_rate: u32) -> io::Result<()> {
        log::debug!("opening {} at {} baud", self.path, baud_rate);
        let port = serialport::new(&self.path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(1))
            .open()?;
        self.port = Some(port);
        self.peeked = None;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.port = None;
        self.peeked = None;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.peeked = None;
        self.port()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let pending = self.port()?.bytes_to_read()?;
        Ok(pending as usize + usize::from(self.peeked.is_some()))
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(byte) = self.peeked.take() {
            return Ok(Some(byte));
        }
        if self.port()?.bytes_to_read()? == 0 {
            return Ok(None);
        }
        self.read_port(1)
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.write_all(&[byte])
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()
    }

    fn wait_for_byte<C: Clock>(&mut self, _clock: &mut C, timeout_ms: u32) -> io::Result<bool> {
        if self.bytes_available()? > 0 {
            return Ok(true);
        }
        if timeout_ms == 0 {
            return Ok(false);
        }
        self.peeked = self.read_port(timeout_ms)?;
        Ok(self.peeked.is_some())
    }
}

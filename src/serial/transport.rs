// src/serial/transport.rs - Byte-stream seam between the link engine and the device
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serial2_tokio::SerialPort;

/// Raw byte access to the device at the far end of the link. `SerialLink`
/// drives the whole protocol through this trait so tests and embedders can
/// substitute an in-memory device for a physical port.
#[async_trait]
pub trait LinkTransport: Send + Sync {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;
    async fn write_all(&self, buf: &[u8]) -> io::Result<()>;
}

/// Transport over a physical serial port.
pub struct SerialTransport {
    port: SerialPort,
}

impl SerialTransport {
    pub fn open(port: &str, baud: u32) -> io::Result<Self> {
        let port = SerialPort::open(port, baud)?;
        Ok(Self { port })
    }
}

#[async_trait]
impl LinkTransport for SerialTransport {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf).await
    }

    async fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.port.write(&buf[written..]).await?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            written += n;
        }
        Ok(())
    }
}

/// Enumerate serial devices present on this system.
pub fn available_ports() -> io::Result<Vec<PathBuf>> {
    SerialPort::available_ports()
}

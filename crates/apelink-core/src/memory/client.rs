//! TCP client for the emulator's memory-access socket.
//!
//! The emulator exposes a local request/response protocol: each packet
//! is a little-endian `u32` total length (including the length field
//! itself), one opcode byte, then opcode-specific arguments. Replies
//! carry a length, a status byte (zero on success) and a payload.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::RemoteMemory;

const OP_READ8: u8 = 0x00;
const OP_READ16: u8 = 0x01;
const OP_READ32: u8 = 0x02;
const OP_READ_N: u8 = 0x03;
const OP_WRITE8: u8 = 0x04;
const OP_WRITE16: u8 = 0x05;
const OP_WRITE32: u8 = 0x06;
const OP_WRITE_N: u8 = 0x07;
const OP_GAME_ID: u8 = 0x0B;

/// Port the emulator's memory socket listens on out of the box.
pub const DEFAULT_PORT: u16 = 28011;

const IO_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

pub struct EmulatorClient {
    addr: SocketAddr,
    stream: Option<TcpStream>,
}

impl EmulatorClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::Transport(format!("invalid emulator address {}:{}: {}", host, port, e)))?
            .next()
            .ok_or_else(|| {
                Error::Transport(format!("emulator address {}:{} did not resolve", host, port))
            })?;
        Ok(Self { addr, stream: None })
    }

    fn transport_err(&mut self, address: u32, err: std::io::Error) -> Error {
        // A failed exchange leaves the stream in an unknown framing
        // state; drop it and let the caller reconnect.
        self.stream = None;
        Error::MemoryAccessFailed {
            address,
            message: err.to_string(),
        }
    }

    /// Send one request and return the reply payload.
    fn request(&mut self, address: u32, opcode: u8, args: &[u8]) -> Result<Vec<u8>> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::Transport("not connected".into()));
        };

        let len = (4 + 1 + args.len()) as u32;
        let mut packet = Vec::with_capacity(len as usize);
        packet.extend_from_slice(&len.to_le_bytes());
        packet.push(opcode);
        packet.extend_from_slice(args);

        let exchange = |stream: &mut TcpStream| -> std::io::Result<Vec<u8>> {
            stream.write_all(&packet)?;

            let mut header = [0u8; 5];
            stream.read_exact(&mut header)?;
            let reply_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let status = header[4];
            if status != 0 {
                return Err(std::io::Error::other(format!(
                    "request failed with status {}",
                    status
                )));
            }
            let payload_len = (reply_len as usize).saturating_sub(header.len());
            let mut payload = vec![0u8; payload_len];
            stream.read_exact(&mut payload)?;
            Ok(payload)
        };

        exchange(stream).map_err(|e| self.transport_err(address, e))
    }

    fn read_op(&mut self, opcode: u8, address: u32, expect: usize) -> Result<Vec<u8>> {
        let payload = self.request(address, opcode, &address.to_le_bytes())?;
        if payload.len() < expect {
            return Err(Error::MemoryAccessFailed {
                address,
                message: format!("short reply: {} of {} bytes", payload.len(), expect),
            });
        }
        Ok(payload)
    }

    fn write_op(&mut self, opcode: u8, address: u32, value: &[u8]) -> Result<()> {
        let mut args = Vec::with_capacity(4 + value.len());
        args.extend_from_slice(&address.to_le_bytes());
        args.extend_from_slice(value);
        self.request(address, opcode, &args)?;
        Ok(())
    }
}

impl RemoteMemory for EmulatorClient {
    fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        match TcpStream::connect_timeout(&self.addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                stream.set_read_timeout(Some(IO_TIMEOUT))?;
                stream.set_write_timeout(Some(IO_TIMEOUT))?;
                stream.set_nodelay(true)?;
                debug!("Connected to emulator at {}", self.addr);
                self.stream = Some(stream);
            }
            Err(e) => {
                // Unreachable peer is the normal "emulator not running"
                // case, not an error.
                debug!("Emulator at {} unreachable: {}", self.addr, e);
                self.stream = None;
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stream = None;
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn game_id(&mut self) -> Result<String> {
        let payload = self.request(0, OP_GAME_ID, &[])?;
        let end = payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(payload.len());
        Ok(String::from_utf8_lossy(&payload[..end]).trim().to_string())
    }

    fn read_u8(&mut self, address: u32) -> Result<u8> {
        let payload = self.read_op(OP_READ8, address, 1)?;
        Ok(payload[0])
    }

    fn read_u16(&mut self, address: u32) -> Result<u16> {
        let payload = self.read_op(OP_READ16, address, 2)?;
        Ok(u16::from_le_bytes([payload[0], payload[1]]))
    }

    fn read_u32(&mut self, address: u32) -> Result<u32> {
        let payload = self.read_op(OP_READ32, address, 4)?;
        Ok(u32::from_le_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ]))
    }

    fn read_bytes(&mut self, address: u32, length: u32) -> Result<Vec<u8>> {
        let mut args = Vec::with_capacity(8);
        args.extend_from_slice(&address.to_le_bytes());
        args.extend_from_slice(&length.to_le_bytes());
        let payload = self.request(address, OP_READ_N, &args)?;
        if payload.len() < length as usize {
            return Err(Error::MemoryAccessFailed {
                address,
                message: format!("short reply: {} of {} bytes", payload.len(), length),
            });
        }
        Ok(payload)
    }

    fn write_u8(&mut self, address: u32, value: u8) -> Result<()> {
        self.write_op(OP_WRITE8, address, &[value])
    }

    fn write_u16(&mut self, address: u32, value: u16) -> Result<()> {
        self.write_op(OP_WRITE16, address, &value.to_le_bytes())
    }

    fn write_u32(&mut self, address: u32, value: u32) -> Result<()> {
        self.write_op(OP_WRITE32, address, &value.to_le_bytes())
    }

    fn write_bytes(&mut self, address: u32, bytes: &[u8]) -> Result<()> {
        let mut args = Vec::with_capacity(8 + bytes.len());
        args.extend_from_slice(&address.to_le_bytes());
        args.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        args.extend_from_slice(bytes);
        self.request(address, OP_WRITE_N, &args)?;
        Ok(())
    }
}

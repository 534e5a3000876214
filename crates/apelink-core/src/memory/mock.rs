//! In-memory fake of the emulator socket for tests.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::memory::RemoteMemory;

/// Byte-addressable fake memory with fault injection.
#[derive(Default)]
pub struct MockMemory {
    bytes: HashMap<u32, u8>,
    connected: bool,
    refuse_connect: bool,
    fail_io: bool,
    game_id: String,
    pub write_log: Vec<(u32, Vec<u8>)>,
}

impl MockMemory {
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    pub fn with_game_id(game_id: &str) -> Self {
        let mut mock = Self::new();
        mock.game_id = game_id.to_string();
        mock
    }

    pub fn set_game_id(&mut self, game_id: &str) {
        self.game_id = game_id.to_string();
    }

    /// Make `connect()` leave the link down, as an unreachable peer would.
    pub fn refuse_connections(&mut self) {
        self.refuse_connect = true;
        self.connected = false;
    }

    /// Fail every subsequent read/write with a transport error.
    pub fn fail_io(&mut self, fail: bool) {
        self.fail_io = fail;
    }

    pub fn set_u8(&mut self, address: u32, value: u8) {
        self.bytes.insert(address, value);
    }

    pub fn set_u32(&mut self, address: u32, value: u32) {
        for (i, b) in value.to_le_bytes().iter().enumerate() {
            self.bytes.insert(address + i as u32, *b);
        }
    }

    pub fn set_bytes(&mut self, address: u32, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.bytes.insert(address + i as u32, *b);
        }
    }

    pub fn get_u8(&self, address: u32) -> u8 {
        *self.bytes.get(&address).unwrap_or(&0)
    }

    pub fn get_u32(&self, address: u32) -> u32 {
        u32::from_le_bytes([
            self.get_u8(address),
            self.get_u8(address + 1),
            self.get_u8(address + 2),
            self.get_u8(address + 3),
        ])
    }

    fn check_link(&self, address: u32) -> Result<()> {
        if !self.connected {
            return Err(Error::Transport("not connected".into()));
        }
        if self.fail_io {
            return Err(Error::MemoryAccessFailed {
                address,
                message: "injected fault".into(),
            });
        }
        Ok(())
    }
}

impl RemoteMemory for MockMemory {
    fn connect(&mut self) -> Result<()> {
        if !self.refuse_connect {
            self.connected = true;
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn game_id(&mut self) -> Result<String> {
        self.check_link(0)?;
        Ok(self.game_id.clone())
    }

    fn read_u8(&mut self, address: u32) -> Result<u8> {
        self.check_link(address)?;
        Ok(self.get_u8(address))
    }

    fn read_u16(&mut self, address: u32) -> Result<u16> {
        self.check_link(address)?;
        Ok(u16::from_le_bytes([
            self.get_u8(address),
            self.get_u8(address + 1),
        ]))
    }

    fn read_u32(&mut self, address: u32) -> Result<u32> {
        self.check_link(address)?;
        Ok(self.get_u32(address))
    }

    fn read_bytes(&mut self, address: u32, length: u32) -> Result<Vec<u8>> {
        self.check_link(address)?;
        Ok((0..length).map(|i| self.get_u8(address + i)).collect())
    }

    fn write_u8(&mut self, address: u32, value: u8) -> Result<()> {
        self.write_bytes(address, &[value])
    }

    fn write_u16(&mut self, address: u32, value: u16) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn write_u32(&mut self, address: u32, value: u32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn write_bytes(&mut self, address: u32, bytes: &[u8]) -> Result<()> {
        self.check_link(address)?;
        self.set_bytes(address, bytes);
        self.write_log.push((address, bytes.to_vec()));
        Ok(())
    }
}

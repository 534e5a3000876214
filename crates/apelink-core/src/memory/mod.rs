//! Remote memory access over the emulator's request/response socket.

pub mod codec;

mod client;

#[cfg(test)]
pub mod mock;

pub use client::{DEFAULT_PORT, EmulatorClient};

#[cfg(test)]
pub use mock::MockMemory;

use crate::error::Result;

/// Typed read/write primitives against one external process.
///
/// Implementations either complete a call promptly or fail with a
/// transport error; nothing here blocks indefinitely. Address `0` is a
/// reserved sentinel meaning "no target" and callers must never issue
/// reads or writes against it.
pub trait RemoteMemory {
    /// Attempt to bring the link up. An unreachable peer is not an
    /// error; the client simply stays disconnected.
    fn connect(&mut self) -> Result<()>;

    /// Tear the link down. Always succeeds, idempotent.
    fn disconnect(&mut self);

    /// Non-blocking link status check.
    fn is_connected(&self) -> bool;

    /// Identify the loaded title. Empty string if nothing is loaded.
    fn game_id(&mut self) -> Result<String>;

    fn read_u8(&mut self, address: u32) -> Result<u8>;
    fn read_u16(&mut self, address: u32) -> Result<u16>;
    fn read_u32(&mut self, address: u32) -> Result<u32>;
    fn read_bytes(&mut self, address: u32, length: u32) -> Result<Vec<u8>>;

    fn write_u8(&mut self, address: u32, value: u8) -> Result<()>;
    fn write_u16(&mut self, address: u32, value: u16) -> Result<()>;
    fn write_u32(&mut self, address: u32, value: u32) -> Result<()>;
    fn write_bytes(&mut self, address: u32, bytes: &[u8]) -> Result<()>;

    /// Read a floating value stored as a raw 32-bit pattern.
    ///
    /// The transport's native float operation is unreliable for this
    /// category of value, so every floating read goes through bit
    /// reinterpretation of a plain integer read.
    fn read_f32(&mut self, address: u32) -> Result<f32> {
        Ok(codec::bits_to_f32(self.read_u32(address)?))
    }

    /// Write a floating value as a raw 32-bit pattern. See [`Self::read_f32`].
    fn write_f32(&mut self, address: u32, value: f32) -> Result<()> {
        self.write_u32(address, codec::f32_to_bits(value))
    }
}

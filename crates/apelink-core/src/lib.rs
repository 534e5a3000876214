//! # apelink-core
//!
//! Core library for the apelink multiplayer bridge.
//!
//! This crate provides:
//! - Remote memory access over the emulator's request/response socket
//! - Per-version address tables with pointer-chain resolution
//! - The game interface (connection state machine, typed reads/writes)
//! - The synchronization loop (item application, location checks)
//! - Durable per-seed session snapshots

pub mod error;
pub mod game;
pub mod interface;
pub mod memory;
pub mod server;
pub mod session;
pub mod sync;
pub mod table;

pub use error::{Error, Result};
pub use game::{Character, Gadget, ItemKind, PlayerState, item_catalog};
pub use interface::{ConnectionState, GameInterface};
pub use memory::{DEFAULT_PORT, EmulatorClient, RemoteMemory};
pub use server::{CoordinationSession, ItemGrant, SyncConfig};
pub use session::{SessionSnapshot, SessionStore};
pub use sync::{Shutdown, SyncEngine, channel_unlock_target, timing};
pub use table::{
    AddressTable, ChainKey, FlagBlock, ItemKey, LocationCategory, LocationId, StateKey, versions,
};

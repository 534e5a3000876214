//! Boundary to the coordination server.
//!
//! The server wire protocol lives outside this crate; the sync loop
//! only sees this trait. The CLI ships a file-backed implementation
//! for standalone use and a real network client plugs in the same way.

use crate::error::Result;
use crate::table::LocationCategory;

/// One item granted by the server. `index` is the unique item-instance
/// identifier; instances arrive in index order and never repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemGrant {
    pub index: u32,
    pub item: u32,
}

/// Session-scoped configuration handed down by the server.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Target for the unlocked-channel reconciliation, capped at the
    /// version maximum.
    pub channel_target: u32,
    /// Which location categories this session tracks.
    pub tracked: Vec<LocationCategory>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            channel_target: crate::table::versions::MAX_CHANNELS,
            tracked: vec![
                LocationCategory::Monkey,
                LocationCategory::Camera,
                LocationCategory::Cellphone,
                LocationCategory::Boss,
            ],
        }
    }
}

/// The coordination session as the sync loop sees it.
pub trait CoordinationSession {
    /// Seed identifier, known only after the server handshake.
    fn seed(&self) -> Option<String>;

    /// Whether the multiplayer session has been joined.
    fn is_active(&self) -> bool;

    /// All items granted so far, in instance order.
    fn received_items(&self) -> Vec<ItemGrant>;

    /// Report newly satisfied locations as one batch of flat ids.
    fn report_locations(&mut self, locations: &[u32]) -> Result<()>;

    fn config(&self) -> &SyncConfig;
}

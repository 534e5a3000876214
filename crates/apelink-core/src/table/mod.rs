//! Per-version address tables and pointer-chain resolution.
//!
//! Each supported game version gets one immutable [`AddressTable`]
//! selected at probe time. Keys are closed enumerations validated at
//! selection, so a version that lacks an address disables the feature
//! explicitly instead of silently returning garbage.

pub mod versions;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::error::{Error, Result};
use crate::memory::RemoteMemory;

/// Fixed game-state addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum StateKey {
    Progress,
    StageName,
    Character,
    PlayerState,
    EquippedGadget,
    UnlockedChannels,
    MorphDuration,
    MorphGaugeBase,
    HudCounterBase,
    AreaId,
    Command,
}

/// Item-backing addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ItemKey {
    GadgetFlags,
    Cookies,
    ChannelKeys,
}

impl ItemKey {
    /// Ceiling for clamped accumulation into this slot.
    pub fn maximum(self) -> u32 {
        match self {
            ItemKey::GadgetFlags => u32::MAX,
            ItemKey::Cookies => 100,
            ItemKey::ChannelKeys => versions::MAX_CHANNELS,
        }
    }
}

/// Tracked location flag groups.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    IntoStaticStr,
)]
pub enum LocationCategory {
    Monkey,
    Camera,
    Cellphone,
    Boss,
}

impl LocationCategory {
    /// Base of the flat id range the coordination server uses for this
    /// category.
    pub fn id_base(self) -> u32 {
        match self {
            LocationCategory::Monkey => 0,
            LocationCategory::Camera => 10_000,
            LocationCategory::Cellphone => 20_000,
            LocationCategory::Boss => 30_000,
        }
    }
}

/// One tracked location inside a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationId {
    pub category: LocationCategory,
    pub index: u16,
}

impl LocationId {
    pub fn new(category: LocationCategory, index: u16) -> Self {
        Self { category, index }
    }

    /// Flatten to the server-wide numeric id.
    pub fn flatten(self) -> u32 {
        self.category.id_base() + self.index as u32
    }
}

/// A contiguous run of one-byte completion flags.
#[derive(Debug, Clone, Copy)]
pub struct FlagBlock {
    pub base: u32,
    pub stride: u32,
    pub count: u16,
}

/// Pointer chains rooted at a governing base pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ChainKey {
    HudCounter,
    MorphGauge,
}

/// Immutable symbolic-key → address mapping for one game version.
pub struct AddressTable {
    pub game_id: &'static str,
    states: HashMap<StateKey, u32>,
    items: HashMap<ItemKey, u32>,
    locations: HashMap<LocationCategory, FlagBlock>,
    chains: HashMap<ChainKey, Vec<i32>>,
}

impl AddressTable {
    pub(crate) fn new(
        game_id: &'static str,
        states: HashMap<StateKey, u32>,
        items: HashMap<ItemKey, u32>,
        locations: HashMap<LocationCategory, FlagBlock>,
        chains: HashMap<ChainKey, Vec<i32>>,
    ) -> Self {
        Self {
            game_id,
            states,
            items,
            locations,
            chains,
        }
    }

    pub fn state(&self, key: StateKey) -> Result<u32> {
        self.states
            .get(&key)
            .copied()
            .ok_or_else(|| Error::KeyUnavailable(key.to_string()))
    }

    pub fn has_state(&self, key: StateKey) -> bool {
        self.states.contains_key(&key)
    }

    pub fn item(&self, key: ItemKey) -> Result<u32> {
        self.items
            .get(&key)
            .copied()
            .ok_or_else(|| Error::KeyUnavailable(key.to_string()))
    }

    pub fn location_block(&self, category: LocationCategory) -> Option<&FlagBlock> {
        self.locations.get(&category)
    }

    pub fn chain(&self, key: ChainKey) -> Option<&[i32]> {
        self.chains.get(&key).map(|c| c.as_slice())
    }

    /// Follow a pointer chain from `start` to a concrete data address.
    ///
    /// Reads the governing pointer at `start`; a non-positive value
    /// means the target object is not allocated yet and resolution is
    /// unresolved (`0`). Each offset but the last is added and then
    /// dereferenced; the last offset is added without dereferencing,
    /// yielding the data address itself. A `0` anywhere along the walk
    /// means unresolved. Callers must treat `0` as "feature currently
    /// unavailable", never as an address.
    pub fn resolve<M: RemoteMemory>(
        &self,
        mem: &mut M,
        start: u32,
        key: ChainKey,
    ) -> Result<u32> {
        let Some(chain) = self.chain(key) else {
            return Ok(0);
        };
        let base = mem.read_u32(start)?;
        if base as i32 <= 0 {
            return Ok(0);
        }

        let mut address = base;
        let last = chain.len().saturating_sub(1);
        for (i, offset) in chain.iter().enumerate() {
            address = address.wrapping_add_signed(*offset);
            if i == last {
                return Ok(address);
            }
            address = mem.read_u32(address)?;
            if address == 0 {
                return Ok(0);
            }
        }
        Ok(0)
    }

    /// Features this version cannot support because an address is
    /// missing. Reported once at selection; the corresponding sync
    /// paths are skipped rather than failed.
    pub fn missing_features(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for key in [
            StateKey::Progress,
            StateKey::StageName,
            StateKey::Character,
            StateKey::PlayerState,
            StateKey::UnlockedChannels,
        ] {
            if !self.states.contains_key(&key) {
                missing.push(format!("state read ({})", key));
            }
        }
        for key in [ItemKey::GadgetFlags, ItemKey::Cookies, ItemKey::ChannelKeys] {
            if !self.items.contains_key(&key) {
                missing.push(format!("item sync ({})", key));
            }
        }
        for category in [
            LocationCategory::Monkey,
            LocationCategory::Camera,
            LocationCategory::Cellphone,
            LocationCategory::Boss,
        ] {
            if !self.locations.contains_key(&category) {
                missing.push(format!("location checks ({})", category));
            }
        }
        missing
    }
}

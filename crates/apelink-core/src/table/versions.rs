//! Address table data for the supported game versions.
//!
//! These tables are data, not logic: offsets were dumped from the two
//! retail builds and differ only by a fixed relocation except where a
//! structure genuinely moved. The JP build predates the cellphone
//! message table, so that category is absent there and the feature is
//! disabled for that version.

use std::collections::HashMap;

use super::{AddressTable, ChainKey, FlagBlock, ItemKey, LocationCategory, StateKey};

/// NTSC-U retail build.
pub const GAME_ID_NTSC_U: &str = "SCUS-97501";
/// NTSC-J retail build.
pub const GAME_ID_NTSC_J: &str = "SCPS-15085";

/// Highest channel the channel-unlock write may produce.
pub const MAX_CHANNELS: u32 = 27;

/// Byte length of the in-memory stage name field.
pub const STAGE_NAME_LEN: u32 = 32;

/// Morph gauge ceiling, in seconds of morph time.
pub const MORPH_GAUGE_MAX: f32 = 60.0;

/// Select the table matching a probed game identifier.
pub fn for_game_id(game_id: &str) -> Option<AddressTable> {
    match game_id {
        GAME_ID_NTSC_U => Some(ntsc_u()),
        GAME_ID_NTSC_J => Some(ntsc_j()),
        _ => None,
    }
}

fn shared_chains() -> HashMap<ChainKey, Vec<i32>> {
    let mut chains = HashMap::new();
    chains.insert(ChainKey::HudCounter, vec![0x04, 0x20, 0x00]);
    chains.insert(ChainKey::MorphGauge, vec![0x10, 0x48]);
    chains
}

fn ntsc_u() -> AddressTable {
    let states = HashMap::from([
        (StateKey::Progress, 0x0030_8A20),
        (StateKey::StageName, 0x0030_8A40),
        (StateKey::Character, 0x0030_8A60),
        (StateKey::PlayerState, 0x0030_8A64),
        (StateKey::EquippedGadget, 0x0030_8A68),
        (StateKey::UnlockedChannels, 0x0030_8A6C),
        (StateKey::MorphDuration, 0x0030_8A70),
        (StateKey::MorphGaugeBase, 0x0030_8B00),
        (StateKey::HudCounterBase, 0x0030_8B04),
        (StateKey::AreaId, 0x0030_8A78),
        (StateKey::Command, 0x0030_8A7C),
    ]);
    let items = HashMap::from([
        (ItemKey::GadgetFlags, 0x0030_8C00),
        (ItemKey::Cookies, 0x0030_8C04),
        (ItemKey::ChannelKeys, 0x0030_8C08),
    ]);
    let locations = HashMap::from([
        (
            LocationCategory::Monkey,
            FlagBlock {
                base: 0x0030_9000,
                stride: 4,
                count: 300,
            },
        ),
        (
            LocationCategory::Camera,
            FlagBlock {
                base: 0x0030_9600,
                stride: 4,
                count: 24,
            },
        ),
        (
            LocationCategory::Cellphone,
            FlagBlock {
                base: 0x0030_9700,
                stride: 4,
                count: 40,
            },
        ),
        (
            LocationCategory::Boss,
            FlagBlock {
                base: 0x0030_9800,
                stride: 4,
                count: 8,
            },
        ),
    ]);
    AddressTable::new(GAME_ID_NTSC_U, states, items, locations, shared_chains())
}

fn ntsc_j() -> AddressTable {
    let states = HashMap::from([
        (StateKey::Progress, 0x0030_89E0),
        (StateKey::StageName, 0x0030_8A00),
        (StateKey::Character, 0x0030_8A20),
        (StateKey::PlayerState, 0x0030_8A24),
        (StateKey::EquippedGadget, 0x0030_8A28),
        (StateKey::UnlockedChannels, 0x0030_8A2C),
        (StateKey::MorphDuration, 0x0030_8A30),
        (StateKey::MorphGaugeBase, 0x0030_8AC0),
        (StateKey::HudCounterBase, 0x0030_8AC4),
        (StateKey::AreaId, 0x0030_8A38),
        (StateKey::Command, 0x0030_8A3C),
    ]);
    let items = HashMap::from([
        (ItemKey::GadgetFlags, 0x0030_8BC0),
        (ItemKey::Cookies, 0x0030_8BC4),
        (ItemKey::ChannelKeys, 0x0030_8BC8),
    ]);
    // No cellphone table in this build.
    let locations = HashMap::from([
        (
            LocationCategory::Monkey,
            FlagBlock {
                base: 0x0030_8FC0,
                stride: 4,
                count: 300,
            },
        ),
        (
            LocationCategory::Camera,
            FlagBlock {
                base: 0x0030_95C0,
                stride: 4,
                count: 24,
            },
        ),
        (
            LocationCategory::Boss,
            FlagBlock {
                base: 0x0030_97C0,
                stride: 4,
                count: 8,
            },
        ),
    ]);
    AddressTable::new(GAME_ID_NTSC_J, states, items, locations, shared_chains())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_ids() {
        assert!(for_game_id(GAME_ID_NTSC_U).is_some());
        assert!(for_game_id(GAME_ID_NTSC_J).is_some());
        assert!(for_game_id("SLUS-20001").is_none());
        assert!(for_game_id("").is_none());
    }

    #[test]
    fn test_ntsc_u_is_complete() {
        let table = for_game_id(GAME_ID_NTSC_U).unwrap();
        assert!(table.missing_features().is_empty());
    }

    #[test]
    fn test_ntsc_j_lacks_cellphones_only() {
        let table = for_game_id(GAME_ID_NTSC_J).unwrap();
        let missing = table.missing_features();
        assert_eq!(missing.len(), 1);
        assert!(missing[0].contains("Cellphone"));
    }
}

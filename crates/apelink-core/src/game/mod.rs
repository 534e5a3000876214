//! Domain enumerations and the inbound item catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, FromRepr, IntoStaticStr};

use crate::table::ItemKey;

/// Playable character, as stored in the character id slot.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    FromRepr,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[repr(u8)]
pub enum Character {
    Kei = 0,
    Yumi = 1,
}

impl Character {
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::from_repr(value)
    }
}

/// Equipment in the unlock bitfield, one bit per gadget.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    FromRepr,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[repr(u8)]
pub enum Gadget {
    StunClub = 0,
    MonkeyNet = 1,
    MonkeyRadar = 2,
    SuperHoop = 3,
    SlingbackShooter = 4,
    WaterNet = 5,
    RcCar = 6,
    SkyFlyer = 7,
}

impl Gadget {
    pub const ALL: [Gadget; 8] = [
        Gadget::StunClub,
        Gadget::MonkeyNet,
        Gadget::MonkeyRadar,
        Gadget::SuperHoop,
        Gadget::SlingbackShooter,
        Gadget::WaterNet,
        Gadget::RcCar,
        Gadget::SkyFlyer,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::from_repr(value)
    }

    /// Bit in the gadget unlock bitfield.
    pub fn bit(self) -> u32 {
        1 << (self as u8)
    }
}

/// Live player status code. Anything not recognized maps to `Unknown`
/// since the slot holds scratch values during loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Display)]
#[repr(u32)]
pub enum PlayerState {
    InControl = 0,
    Cutscene = 1,
    Menu = 2,
    Loading = 3,
    Unknown = 0xFFFF_FFFF,
}

impl PlayerState {
    pub fn from_code(code: u32) -> Self {
        Self::from_repr(code).unwrap_or(PlayerState::Unknown)
    }

    /// Whether the player can safely receive state mutations.
    pub fn in_control(self) -> bool {
        self == PlayerState::InControl
    }
}

/// How an inbound item mutates live state. Classification happens once
/// when the catalog is built, so applying an item is a single branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemKind {
    Equipment(Gadget),
    Collectable { key: ItemKey, amount: u32 },
    MorphEnergy { seconds: f32 },
}

/// Server item ids for the gadget unlocks, in bit order.
pub const ITEM_ID_GADGET_BASE: u32 = 0x01;
/// Server item id for a bundle of cookies.
pub const ITEM_ID_COOKIE_BUNDLE: u32 = 0x10;
/// Server item id for one channel key.
pub const ITEM_ID_CHANNEL_KEY: u32 = 0x11;
/// Server item id for a morph energy refill.
pub const ITEM_ID_MORPH_ENERGY: u32 = 0x12;

/// Cookies granted per bundle.
pub const COOKIE_BUNDLE_AMOUNT: u32 = 5;
/// Morph seconds granted per energy item.
pub const MORPH_ENERGY_SECONDS: f32 = 3.0;

/// Build the item id → kind catalog once at startup.
pub fn item_catalog() -> HashMap<u32, ItemKind> {
    let mut catalog = HashMap::new();
    for gadget in Gadget::ALL {
        catalog.insert(
            ITEM_ID_GADGET_BASE + gadget as u32,
            ItemKind::Equipment(gadget),
        );
    }
    catalog.insert(
        ITEM_ID_COOKIE_BUNDLE,
        ItemKind::Collectable {
            key: ItemKey::Cookies,
            amount: COOKIE_BUNDLE_AMOUNT,
        },
    );
    catalog.insert(
        ITEM_ID_CHANNEL_KEY,
        ItemKind::Collectable {
            key: ItemKey::ChannelKeys,
            amount: 1,
        },
    );
    catalog.insert(
        ITEM_ID_MORPH_ENERGY,
        ItemKind::MorphEnergy {
            seconds: MORPH_ENERGY_SECONDS,
        },
    );
    catalog
}

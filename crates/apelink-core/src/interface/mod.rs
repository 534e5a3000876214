//! Semantic layer over remote memory: the connection state machine and
//! the named read/mutate operations the sync loop drives.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::game::{Character, Gadget, PlayerState};
use crate::memory::codec::{self, CounterWidth};
use crate::memory::RemoteMemory;
use crate::table::versions::{self, MORPH_GAUGE_MAX, STAGE_NAME_LEN};
use crate::table::{AddressTable, ChainKey, ItemKey, LocationCategory, LocationId, StateKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    InGame,
    WrongGame,
}

pub struct GameInterface<M: RemoteMemory> {
    mem: M,
    state: ConnectionState,
    table: Option<AddressTable>,
}

impl<M: RemoteMemory> GameInterface<M> {
    pub fn new(mem: M) -> Self {
        Self {
            mem,
            state: ConnectionState::Disconnected,
            table: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn mem_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    pub fn game_id(&self) -> Option<&'static str> {
        self.table.as_ref().map(|t| t.game_id)
    }

    /// Log once per transition, never per probe.
    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        match next {
            ConnectionState::Disconnected => info!("Disconnected from emulator"),
            ConnectionState::Connected => info!("Emulator link up, no supported title yet"),
            ConnectionState::InGame => info!(
                "Attached to {}",
                self.game_id().unwrap_or("unknown title")
            ),
            ConnectionState::WrongGame => warn!("A title is loaded but it is not supported"),
        }
        self.state = next;
    }

    /// Bring the link up and probe the loaded title.
    pub fn connect(&mut self) {
        if !self.mem.is_connected() {
            // Unreachable peer is not an error; stay disconnected.
            let _ = self.mem.connect();
            if !self.mem.is_connected() {
                self.set_state(ConnectionState::Disconnected);
                return;
            }
        }

        match self.mem.game_id() {
            Ok(id) if !id.is_empty() => {
                if let Some(table) = versions::for_game_id(&id) {
                    for feature in table.missing_features() {
                        warn!("{}: {} unavailable for this version", id, feature);
                    }
                    self.table = Some(table);
                    self.set_state(ConnectionState::InGame);
                } else {
                    self.table = None;
                    self.set_state(ConnectionState::WrongGame);
                }
            }
            Ok(_) => {
                // Nothing loaded yet; keep whatever we knew, but record
                // that the transport itself is up.
                if self.state == ConnectionState::Disconnected {
                    self.set_state(ConnectionState::Connected);
                }
            }
            Err(e) if e.is_transport() => {
                debug!("Title probe failed: {}", e);
                self.disconnect();
            }
            Err(e) => {
                debug!("Title identifier unreadable: {}", e);
                if self.state == ConnectionState::Disconnected {
                    self.set_state(ConnectionState::Connected);
                }
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.mem.disconnect();
        self.table = None;
        self.set_state(ConnectionState::Disconnected);
    }

    /// All transport and logical failures collapse to `false` here.
    pub fn is_connected_and_in_game(&self) -> bool {
        self.state == ConnectionState::InGame && self.mem.is_connected()
    }

    fn table(&self) -> Result<&AddressTable> {
        self.table.as_ref().ok_or(Error::NotInGame)
    }

    /// Resolve a pointer chain rooted at a state key. A version without
    /// the root key reports unresolved rather than erroring.
    fn resolve_chain(&mut self, root: StateKey, chain: ChainKey) -> Result<u32> {
        let Some(table) = self.table.as_ref() else {
            return Err(Error::NotInGame);
        };
        if !table.has_state(root) {
            return Ok(0);
        }
        let start = table.state(root)?;
        table.resolve(&mut self.mem, start, chain)
    }

    // --- read accessors ---

    pub fn progress(&mut self) -> Result<u8> {
        let addr = self.table()?.state(StateKey::Progress)?;
        self.mem.read_u8(addr)
    }

    /// Current channel/stage name. Trailing NUL padding is stripped; a
    /// byte sequence that fails to decode yields an empty string, since
    /// live memory is transiently inconsistent mid-update.
    pub fn stage_name(&mut self) -> Result<String> {
        let addr = self.table()?.state(StateKey::StageName)?;
        let bytes = self.mem.read_bytes(addr, STAGE_NAME_LEN)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let (decoded, _, had_errors) = encoding_rs::SHIFT_JIS.decode(&bytes[..end]);
        if had_errors {
            return Ok(String::new());
        }
        Ok(decoded.into_owned())
    }

    pub fn character(&mut self) -> Result<Option<Character>> {
        let addr = self.table()?.state(StateKey::Character)?;
        Ok(Character::from_u8(self.mem.read_u8(addr)?))
    }

    pub fn player_state(&mut self) -> Result<PlayerState> {
        let addr = self.table()?.state(StateKey::PlayerState)?;
        Ok(PlayerState::from_code(self.mem.read_u32(addr)?))
    }

    pub fn cookie_count(&mut self) -> Result<u32> {
        let addr = self.table()?.item(ItemKey::Cookies)?;
        self.mem.read_u32(addr)
    }

    pub fn channel_key_count(&mut self) -> Result<u32> {
        let addr = self.table()?.item(ItemKey::ChannelKeys)?;
        self.mem.read_u32(addr)
    }

    pub fn equipped_gadget(&mut self) -> Result<Option<Gadget>> {
        let addr = self.table()?.state(StateKey::EquippedGadget)?;
        Ok(Gadget::from_u8(self.mem.read_u8(addr)?))
    }

    pub fn gadget_flags(&mut self) -> Result<u32> {
        let addr = self.table()?.item(ItemKey::GadgetFlags)?;
        self.mem.read_u32(addr)
    }

    pub fn unlocked_channels(&mut self) -> Result<u32> {
        let addr = self.table()?.state(StateKey::UnlockedChannels)?;
        self.mem.read_u32(addr)
    }

    pub fn morph_duration(&mut self) -> Result<f32> {
        let addr = self.table()?.state(StateKey::MorphDuration)?;
        self.mem.read_f32(addr)
    }

    /// Number of tracked flags in a category, `None` when this version
    /// has no table for it.
    pub fn location_count(&self, category: LocationCategory) -> Option<u16> {
        let table = self.table.as_ref()?;
        table.location_block(category).map(|b| b.count)
    }

    /// Live completion flag for one location. An untracked category
    /// reads as unchecked.
    pub fn location_checked(&mut self, location: LocationId) -> Result<bool> {
        let Some(block) = self
            .table()?
            .location_block(location.category)
            .copied()
        else {
            return Ok(false);
        };
        if location.index >= block.count {
            return Ok(false);
        }
        let addr = block.base + block.stride * location.index as u32;
        Ok(self.mem.read_u8(addr)? != 0)
    }

    // --- mutations ---

    pub fn unlock_equipment(&mut self, gadget: Gadget) -> Result<()> {
        let addr = self.table()?.item(ItemKey::GadgetFlags)?;
        let flags = self.mem.read_u32(addr)?;
        self.mem.write_u32(addr, flags | gadget.bit())?;
        debug!("Unlocked {}", gadget);
        Ok(())
    }

    pub fn lock_equipment(&mut self, gadget: Gadget) -> Result<()> {
        let addr = self.table()?.item(ItemKey::GadgetFlags)?;
        let flags = self.mem.read_u32(addr)?;
        self.mem.write_u32(addr, flags & !gadget.bit())?;
        debug!("Locked {}", gadget);
        Ok(())
    }

    pub fn clear_equipment(&mut self) -> Result<()> {
        let addr = self.table()?.item(ItemKey::GadgetFlags)?;
        self.mem.write_u32(addr, 0)
    }

    /// Grant a bounded collectable with clamped accumulation, then
    /// refresh the on-screen counter for it.
    pub fn give_collectable(&mut self, key: ItemKey, amount: u32) -> Result<u32> {
        let addr = self.table()?.item(key)?;
        let current = self.mem.read_u32(addr)?;
        let new_value = codec::clamped_add(current, amount, key.maximum());
        self.mem.write_u32(addr, new_value)?;
        self.update_hud_counter(new_value)?;
        Ok(new_value)
    }

    /// Refresh the HUD counter through its pointer chain. Unresolved
    /// means the HUD object is not allocated (menus, loads); skip.
    ///
    /// The write width follows the magnitude of the new value, and the
    /// full 4-byte slot is zeroed first so a value shrinking below a
    /// width boundary cannot leave stale high bytes behind.
    fn update_hud_counter(&mut self, value: u32) -> Result<()> {
        let addr = self.resolve_chain(StateKey::HudCounterBase, ChainKey::HudCounter)?;
        if addr == 0 {
            return Ok(());
        }
        self.mem.write_u32(addr, 0)?;
        match CounterWidth::for_value(value) {
            CounterWidth::Byte => self.mem.write_u8(addr, value as u8),
            CounterWidth::Word => self.mem.write_u16(addr, value as u16),
            CounterWidth::Dword => self.mem.write_u32(addr, value),
        }
    }

    /// Add morph seconds to the gauge, clamped at the gauge ceiling.
    /// Returns `false` when the gauge object is not resolvable yet.
    pub fn give_morph_energy(&mut self, seconds: f32) -> Result<bool> {
        let addr = self.resolve_chain(StateKey::MorphGaugeBase, ChainKey::MorphGauge)?;
        if addr == 0 {
            return Ok(false);
        }
        let current = self.mem.read_f32(addr)?;
        let new_value = codec::clamped_add_f32(current, seconds, MORPH_GAUGE_MAX);
        self.mem.write_f32(addr, new_value)?;
        Ok(true)
    }

    pub fn set_morph_duration(&mut self, seconds: f32) -> Result<()> {
        let addr = self.table()?.state(StateKey::MorphDuration)?;
        self.mem.write_f32(addr, seconds.min(MORPH_GAUGE_MAX))
    }

    pub fn set_progress(&mut self, value: u8) -> Result<()> {
        let addr = self.table()?.state(StateKey::Progress)?;
        self.mem.write_u8(addr, value)
    }

    pub fn set_unlocked_channels(&mut self, channels: u32) -> Result<()> {
        let addr = self.table()?.state(StateKey::UnlockedChannels)?;
        self.mem
            .write_u32(addr, channels.min(versions::MAX_CHANNELS))
    }

    pub fn change_area(&mut self, area: u32) -> Result<()> {
        let addr = self.table()?.state(StateKey::AreaId)?;
        self.mem.write_u32(addr, area)
    }

    pub fn send_command(&mut self, command: u32) -> Result<()> {
        let addr = self.table()?.state(StateKey::Command)?;
        self.mem.write_u32(addr, command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MockMemory;
    use crate::table::versions::{GAME_ID_NTSC_U, for_game_id};

    fn in_game() -> GameInterface<MockMemory> {
        let mem = MockMemory::with_game_id(GAME_ID_NTSC_U);
        let mut game = GameInterface::new(mem);
        game.connect();
        assert_eq!(game.state(), ConnectionState::InGame);
        game
    }

    fn addr(key: StateKey) -> u32 {
        for_game_id(GAME_ID_NTSC_U).unwrap().state(key).unwrap()
    }

    fn item_addr(key: ItemKey) -> u32 {
        for_game_id(GAME_ID_NTSC_U).unwrap().item(key).unwrap()
    }

    #[test]
    fn test_connect_unreachable_peer_stays_disconnected() {
        let mut mem = MockMemory::new();
        mem.refuse_connections();
        let mut game = GameInterface::new(mem);
        game.connect();
        assert_eq!(game.state(), ConnectionState::Disconnected);
        assert!(!game.is_connected_and_in_game());
    }

    #[test]
    fn test_connect_no_title_yet() {
        let mem = MockMemory::with_game_id("");
        let mut game = GameInterface::new(mem);
        game.connect();
        assert_eq!(game.state(), ConnectionState::Connected);
        assert!(!game.is_connected_and_in_game());
    }

    #[test]
    fn test_wrong_game_then_supported_then_disconnect() {
        let mem = MockMemory::with_game_id("SLUS-20001");
        let mut game = GameInterface::new(mem);

        game.connect();
        assert_eq!(game.state(), ConnectionState::WrongGame);

        game.mem.set_game_id(GAME_ID_NTSC_U);
        game.connect();
        assert_eq!(game.state(), ConnectionState::InGame);
        assert_eq!(game.game_id(), Some(GAME_ID_NTSC_U));

        game.disconnect();
        assert_eq!(game.state(), ConnectionState::Disconnected);
        assert_eq!(game.game_id(), None);
    }

    #[test]
    fn test_stage_name_strips_padding() {
        let mut game = in_game();
        let mut bytes = b"TV Station".to_vec();
        bytes.resize(STAGE_NAME_LEN as usize, 0);
        game.mem.set_bytes(addr(StateKey::StageName), &bytes);

        assert_eq!(game.stage_name().unwrap(), "TV Station");
    }

    #[test]
    fn test_stage_name_decode_failure_is_empty() {
        let mut game = in_game();
        // A lead byte followed by an invalid trail byte cannot decode.
        game.mem
            .set_bytes(addr(StateKey::StageName), &[0x82, 0xFF, 0x00]);

        assert_eq!(game.stage_name().unwrap(), "");
    }

    #[test]
    fn test_unlock_and_lock_equipment() {
        let mut game = in_game();
        game.unlock_equipment(Gadget::StunClub).unwrap();
        game.unlock_equipment(Gadget::SkyFlyer).unwrap();
        assert_eq!(
            game.gadget_flags().unwrap(),
            Gadget::StunClub.bit() | Gadget::SkyFlyer.bit()
        );

        game.lock_equipment(Gadget::StunClub).unwrap();
        assert_eq!(game.gadget_flags().unwrap(), Gadget::SkyFlyer.bit());

        game.clear_equipment().unwrap();
        assert_eq!(game.gadget_flags().unwrap(), 0);
    }

    #[test]
    fn test_give_collectable_clamps_at_maximum() {
        let mut game = in_game();
        game.mem.set_u32(item_addr(ItemKey::Cookies), 98);

        assert_eq!(game.give_collectable(ItemKey::Cookies, 5).unwrap(), 100);
        assert_eq!(game.cookie_count().unwrap(), 100);

        // Replay is a no-op at the ceiling.
        assert_eq!(game.give_collectable(ItemKey::Cookies, 5).unwrap(), 100);
    }

    #[test]
    fn test_hud_counter_zeroed_before_narrow_write() {
        let mut game = in_game();
        let base = addr(StateKey::HudCounterBase);
        // Wire up the chain [0x04, 0x20, 0x00] to land on 0x3000.
        game.mem.set_u32(base, 0x1000);
        game.mem.set_u32(0x1004, 0x2000);
        game.mem.set_u32(0x2020, 0x3000);
        // Stale wide value from an earlier write.
        game.mem.set_u32(0x3000, 300);

        game.mem.set_u32(item_addr(ItemKey::Cookies), 0);
        game.give_collectable(ItemKey::Cookies, 5).unwrap();

        // Narrow write, but the full slot reads back clean.
        assert_eq!(game.mem.get_u32(0x3000), 5);
    }

    #[test]
    fn test_hud_counter_skipped_when_unresolved() {
        let mut game = in_game();
        game.mem.set_u32(addr(StateKey::HudCounterBase), 0);
        game.mem.set_u32(item_addr(ItemKey::Cookies), 1);

        // No chain target allocated; the grant itself still lands.
        assert_eq!(game.give_collectable(ItemKey::Cookies, 2).unwrap(), 3);
    }

    #[test]
    fn test_give_morph_energy_bit_pattern_and_clamp() {
        let mut game = in_game();
        let start = addr(StateKey::MorphGaugeBase);
        // Chain [0x10, 0x48]: one dereference then the data address.
        game.mem.set_u32(start, 0x4000);
        game.mem.set_u32(0x4010, 0x5000);
        let gauge = 0x5048;
        game.mem.set_u32(gauge, 58.0f32.to_bits());

        assert!(game.give_morph_energy(3.0).unwrap());
        assert_eq!(f32::from_bits(game.mem.get_u32(gauge)), MORPH_GAUGE_MAX);
    }

    #[test]
    fn test_give_morph_energy_unresolved_gauge() {
        let mut game = in_game();
        game.mem.set_u32(addr(StateKey::MorphGaugeBase), 0);
        assert!(!game.give_morph_energy(3.0).unwrap());
    }

    #[test]
    fn test_set_unlocked_channels_caps_at_maximum() {
        let mut game = in_game();
        game.set_unlocked_channels(99).unwrap();
        assert_eq!(game.unlocked_channels().unwrap(), versions::MAX_CHANNELS);
    }

    #[test]
    fn test_location_checked() {
        let mut game = in_game();
        let block = for_game_id(GAME_ID_NTSC_U)
            .unwrap()
            .location_block(LocationCategory::Monkey)
            .copied()
            .unwrap();
        game.mem.set_u8(block.base + block.stride * 5, 1);

        assert!(game
            .location_checked(LocationId::new(LocationCategory::Monkey, 5))
            .unwrap());
        assert!(!game
            .location_checked(LocationId::new(LocationCategory::Monkey, 6))
            .unwrap());
        // Out-of-range index reads as unchecked.
        assert!(!game
            .location_checked(LocationId::new(LocationCategory::Monkey, block.count))
            .unwrap());
    }
}

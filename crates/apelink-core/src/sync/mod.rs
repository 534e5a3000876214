//! The driving loop: connection maintenance, item application and
//! location-check detection, all tick-scheduled on one thread.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::game::{item_catalog, Character, Gadget, ItemKind};
use crate::interface::GameInterface;
use crate::memory::RemoteMemory;
use crate::server::CoordinationSession;
use crate::session::{SessionSnapshot, SessionStore};
use crate::table::versions::MAX_CHANNELS;
use crate::table::{ItemKey, LocationId};

/// Tick scheduling constants.
pub mod timing {
    /// Wait after a failed connection attempt (ms).
    pub const RECONNECT_WAIT_MS: u64 = 3000;
    /// Wait between full sync ticks (ms).
    pub const TICK_WAIT_MS: u64 = 500;
    /// Wait while the multiplayer session is not joined yet (ms).
    pub const IDLE_WAIT_MS: u64 = 1000;
    /// Wait after an unclassified tick error (ms).
    pub const ERROR_WAIT_MS: u64 = 3000;
}

/// Known-good floor for the story progress marker; anything below it
/// can soft-lock the intro sequence.
const PROGRESS_FLOOR: u8 = 3;

/// Sleeps between ticks go through this so a shutdown request wakes
/// the loop instead of waiting out the full interval. Returns `true`
/// once shutdown has been requested.
pub trait Shutdown {
    fn wait(&self, duration: Duration) -> bool;
}

/// Channels that should be reachable for a given key count, capped by
/// the session target and the version maximum. The first channel is
/// always open.
pub fn channel_unlock_target(keys: u32, configured_target: u32) -> u32 {
    (1 + keys).min(configured_target).min(MAX_CHANNELS)
}

/// Map a non-transport failure to a fallback so a version missing one
/// address degrades that feature instead of the whole tick. Transport
/// failures still propagate.
fn soft<T>(result: Result<T>, fallback: T) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_transport() => Err(e),
        Err(e) => {
            debug!("Feature degraded: {}", e);
            Ok(fallback)
        }
    }
}

pub struct SyncEngine<M: RemoteMemory, S: CoordinationSession> {
    game: GameInterface<M>,
    session: S,
    store: SessionStore,
    catalog: HashMap<u32, ItemKind>,

    applied: BTreeSet<u32>,
    reported: BTreeSet<u32>,
    offline: BTreeSet<u32>,

    channel_keys: u32,
    restored_channel_keys: u32,
    restored_morph_duration: Option<f32>,
    morph_duration: f32,
    character: Option<Character>,
    granted_gadgets: u32,
    temp_gadget: Option<Gadget>,

    in_control: bool,
    stage_setup_done: bool,
    current_stage: String,
    last_status: Option<String>,
    snapshot_restored: bool,
}

impl<M: RemoteMemory, S: CoordinationSession> SyncEngine<M, S> {
    pub fn new(game: GameInterface<M>, session: S, store: SessionStore) -> Self {
        Self {
            game,
            session,
            store,
            catalog: item_catalog(),
            applied: BTreeSet::new(),
            reported: BTreeSet::new(),
            offline: BTreeSet::new(),
            channel_keys: 0,
            restored_channel_keys: 0,
            restored_morph_duration: None,
            morph_duration: 0.0,
            character: None,
            granted_gadgets: 0,
            temp_gadget: None,
            in_control: false,
            stage_setup_done: false,
            current_stage: String::new(),
            last_status: None,
            snapshot_restored: false,
        }
    }

    /// Drive ticks until shutdown is requested. Every inter-tick sleep
    /// is interruptible; in-flight transport calls finish naturally.
    pub fn run(&mut self, shutdown: &impl Shutdown) {
        info!("Sync loop started");
        while !shutdown.wait(Duration::ZERO) {
            let wait = self.tick();
            if shutdown.wait(wait) {
                break;
            }
        }
        self.game.disconnect();
        info!("Sync loop stopped");
    }

    /// One scheduling step. Never panics and never returns an error;
    /// the loop is the availability boundary.
    pub fn tick(&mut self) -> Duration {
        if !self.game.is_connected_and_in_game() {
            self.game.connect();
            // Even a successful attach settles for one interval so the
            // game finishes whatever load put it in this state.
            return Duration::from_millis(timing::RECONNECT_WAIT_MS);
        }

        match self.run_cycle() {
            Ok(wait) => wait,
            Err(e) if e.is_transport() => {
                warn!("Transport failure mid-tick: {}", e);
                self.game.disconnect();
                Duration::from_millis(timing::TICK_WAIT_MS)
            }
            Err(e) => {
                error!(
                    "Tick failed (stage '{}', {} items applied): {}",
                    self.current_stage,
                    self.applied.len(),
                    e
                );
                Duration::from_millis(timing::ERROR_WAIT_MS)
            }
        }
    }

    fn run_cycle(&mut self) -> Result<Duration> {
        self.restore_once();

        let state = self.game.player_state()?;
        if !state.in_control() {
            self.in_control = false;
            self.maintenance()?;
            return Ok(Duration::from_millis(timing::TICK_WAIT_MS));
        }
        if !self.in_control {
            self.in_control = true;
            debug!("Player in control");
        }

        if !self.session.is_active() {
            self.status_once("Waiting for the multiplayer session");
            return Ok(Duration::from_millis(timing::IDLE_WAIT_MS));
        }

        self.stage_setup()?;
        // Items before locations: a grant this tick can unlock a
        // location reported the same tick.
        self.apply_items()?;
        self.check_locations()?;
        Ok(Duration::from_millis(timing::TICK_WAIT_MS))
    }

    /// Load the persisted snapshot once the seed is known.
    fn restore_once(&mut self) {
        if self.snapshot_restored {
            return;
        }
        let Some(seed) = self.session.seed() else {
            return;
        };
        self.snapshot_restored = true;
        let Some(snapshot) = self.store.load(&seed) else {
            return;
        };
        // The applied cache persists as a count; instance indexes are
        // sequential, so the first `item_count` indexes are covered.
        self.applied.extend(0..snapshot.item_count);
        self.offline = snapshot.offline_checked_locations;
        self.restored_channel_keys = snapshot.channel_key_count;
        self.character = Character::from_u8(snapshot.character as u8);
        self.restored_morph_duration = Some(snapshot.morph_duration);
        self.morph_duration = snapshot.morph_duration;
        info!(
            "Restored session {}: {} items, {} offline checks",
            seed,
            snapshot.item_count,
            self.offline.len()
        );
    }

    fn persist(&mut self) {
        let Some(seed) = self.session.seed() else {
            return;
        };
        // The count restores as the first `item_count` instance
        // indexes, so only the contiguous prefix is safe to persist;
        // anything past a deferred instance replays after a restart.
        let item_count = (0u32..)
            .take_while(|index| self.applied.contains(index))
            .count() as u32;
        let snapshot = SessionSnapshot {
            item_count,
            offline_checked_locations: self.offline.clone(),
            channel_key_count: self.channel_keys,
            character: self.character.map(|c| c as u32).unwrap_or(0),
            morph_duration: self.morph_duration,
            saved_at: None,
        };
        self.store.save(&seed, &snapshot);
    }

    fn status_once(&mut self, message: &str) {
        if self.last_status.as_deref() != Some(message) {
            info!("{}", message);
            self.last_status = Some(message.to_string());
        }
    }

    /// Reads that run while the player is not in control: keep the
    /// progress marker at its floor and re-assert state the game may
    /// have reset during a load.
    fn maintenance(&mut self) -> Result<()> {
        let progress = soft(self.game.progress(), PROGRESS_FLOOR)?;
        if progress < PROGRESS_FLOOR {
            soft(self.game.set_progress(PROGRESS_FLOOR), ())?;
        }

        let flags = soft(self.game.gadget_flags(), self.granted_gadgets)?;
        if flags & self.granted_gadgets != self.granted_gadgets {
            for gadget in Gadget::ALL {
                if self.granted_gadgets & gadget.bit() != 0 && flags & gadget.bit() == 0 {
                    soft(self.game.unlock_equipment(gadget), ())?;
                }
            }
        }

        let channels = soft(self.game.unlocked_channels(), 0)?;
        if channels > MAX_CHANNELS {
            soft(self.game.set_unlocked_channels(MAX_CHANNELS), ())?;
        }
        Ok(())
    }

    /// One-time-per-stage setup, re-armed whenever the stage changes.
    fn stage_setup(&mut self) -> Result<()> {
        let stage = self.game.stage_name()?;
        if stage != self.current_stage {
            debug!("Stage changed: '{}' -> '{}'", self.current_stage, stage);
            // A menu-navigation grant from the previous stage that never
            // became a real item goes away again.
            if let Some(gadget) = self.temp_gadget.take() {
                if self.granted_gadgets & gadget.bit() == 0 {
                    soft(self.game.lock_equipment(gadget), ())?;
                }
            }
            self.current_stage = stage;
            self.stage_setup_done = false;
        }
        if self.stage_setup_done {
            return Ok(());
        }

        // Record the character id at the first opportunity.
        if self.character.is_none() {
            if let Some(character) = soft(self.game.character(), None)? {
                debug!("Playing as {}", character);
                self.character = Some(character);
            }
        }

        // Re-apply the persisted morph duration once per session, then
        // track whatever the game currently holds.
        if let Some(duration) = self.restored_morph_duration.take() {
            soft(self.game.set_morph_duration(duration), ())?;
        }
        self.morph_duration = soft(self.game.morph_duration(), self.morph_duration)?;

        // Reconcile unlocked channels with the configured target,
        // derived from the raw key count, capped at the maximum.
        let live_keys = soft(self.game.channel_key_count(), 0)?;
        self.channel_keys = live_keys.max(self.restored_channel_keys);
        let target = channel_unlock_target(self.channel_keys, self.session.config().channel_target);
        let current = soft(self.game.unlocked_channels(), target)?;
        if current < target {
            debug!("Unlocking channels: {} -> {}", current, target);
            soft(self.game.set_unlocked_channels(target), ())?;
        }

        // The gadget menu is only safe to navigate with the net
        // present; grant it temporarily until an item makes it real.
        let flags = soft(self.game.gadget_flags(), Gadget::MonkeyNet.bit())?;
        if flags & Gadget::MonkeyNet.bit() == 0
            && self.granted_gadgets & Gadget::MonkeyNet.bit() == 0
        {
            soft(self.game.unlock_equipment(Gadget::MonkeyNet), ())?;
            self.temp_gadget = Some(Gadget::MonkeyNet);
            debug!("Temporarily granted {} for menu navigation", Gadget::MonkeyNet);
        }

        self.stage_setup_done = true;
        self.persist();
        Ok(())
    }

    /// Apply inbound items not yet in the applied cache. Only grants
    /// that actually landed enter the cache, so a deferred or
    /// interrupted grant replays on a later tick, which is safe:
    /// unlocks are flag-sets and collectables clamp at their ceiling.
    fn apply_items(&mut self) -> Result<usize> {
        let new: Vec<_> = self
            .session
            .received_items()
            .into_iter()
            .filter(|grant| !self.applied.contains(&grant.index))
            .collect();
        if new.is_empty() {
            return Ok(0);
        }

        let mut landed = Vec::with_capacity(new.len());
        for grant in &new {
            match self.catalog.get(&grant.item).copied() {
                Some(ItemKind::Equipment(gadget)) => {
                    soft(self.game.unlock_equipment(gadget), ())?;
                    self.granted_gadgets |= gadget.bit();
                    if self.temp_gadget == Some(gadget) {
                        self.temp_gadget = None;
                    }
                }
                Some(ItemKind::Collectable { key, amount }) => {
                    let total = soft(self.game.give_collectable(key, amount), 0)?;
                    if key == ItemKey::ChannelKeys && total > 0 {
                        self.channel_keys = total;
                        // A fresh key may raise the channel target.
                        self.stage_setup_done = false;
                    }
                }
                Some(ItemKind::MorphEnergy { seconds }) => {
                    // The gauge object only exists while morphing is
                    // available; keep the grant pending until it does.
                    if !soft(self.game.give_morph_energy(seconds), false)? {
                        debug!("Morph gauge unavailable, deferring instance {}", grant.index);
                        continue;
                    }
                }
                None => warn!("Unknown item id {} (instance {})", grant.item, grant.index),
            }
            landed.push(grant.index);
        }

        let count = landed.len();
        self.applied.extend(landed);
        debug!("Applied {} new items", count);
        self.persist();
        Ok(count)
    }

    /// Read every tracked completion flag, then send newly satisfied
    /// locations (plus any offline backlog) as one batch. No network
    /// call happens when there is nothing to send.
    fn check_locations(&mut self) -> Result<usize> {
        let tracked = self.session.config().tracked.clone();
        let mut newly = Vec::new();
        for category in tracked {
            let Some(count) = self.game.location_count(category) else {
                // Version without this table: feature disabled.
                continue;
            };
            for index in 0..count {
                let location = LocationId::new(category, index);
                let id = location.flatten();
                if self.reported.contains(&id) || self.offline.contains(&id) {
                    continue;
                }
                if self.game.location_checked(location)? {
                    newly.push(id);
                }
            }
        }

        let batch: Vec<u32> = self
            .offline
            .iter()
            .copied()
            .chain(newly.iter().copied())
            .collect();
        if batch.is_empty() {
            return Ok(0);
        }

        match self.session.report_locations(&batch) {
            Ok(()) => {
                debug!("Reported {} locations", batch.len());
                self.reported.extend(batch.iter().copied());
                let flushed_offline = !self.offline.is_empty();
                self.offline.clear();
                if flushed_offline || !newly.is_empty() {
                    self.persist();
                }
                Ok(batch.len())
            }
            Err(e) => {
                warn!("Location report failed, queuing offline: {}", e);
                self.offline.extend(newly);
                self.persist();
                Ok(0)
            }
        }
    }
}

//! Durable snapshot of synchronization progress, one file per seed.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What survives a restart. Loaded once after the seed becomes known,
/// written after every mutation to session-relevant state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub item_count: u32,
    pub offline_checked_locations: BTreeSet<u32>,
    pub channel_key_count: u32,
    pub character: u32,
    pub morph_duration: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Local>>,
}

pub struct SessionStore {
    base_dir: PathBuf,
    disabled: bool,
}

impl SessionStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            disabled: false,
        }
    }

    fn path_for(&self, seed: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", seed))
    }

    /// Persist a snapshot for this seed. The first failure disables
    /// persistence for the rest of the session; callers never retry
    /// every tick.
    pub fn save(&mut self, seed: &str, snapshot: &SessionSnapshot) {
        if self.disabled {
            return;
        }
        let mut snapshot = snapshot.clone();
        snapshot.saved_at = Some(Local::now());

        let result = fs::create_dir_all(&self.base_dir).and_then(|_| {
            let content = serde_json::to_string_pretty(&snapshot)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            fs::write(self.path_for(seed), content)
        });
        if let Err(e) = result {
            warn!(
                "Session persistence disabled: cannot write {}: {}",
                self.base_dir.display(),
                e
            );
            self.disabled = true;
        }
    }

    /// Load the snapshot for this seed, if one exists and parses.
    pub fn load(&self, seed: &str) -> Option<SessionSnapshot> {
        let path = self.path_for(seed);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    debug!("No saved session at {}", path.display());
                } else {
                    warn!("Cannot read session file {}: {}", path.display(), e);
                }
                return None;
            }
        };
        match serde_json::from_str::<SessionSnapshot>(&content) {
            Ok(snapshot) => {
                debug!(
                    "Restored session for seed {} ({} items applied)",
                    seed, snapshot.item_count
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!("Corrupt session file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

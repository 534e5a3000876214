//! File-backed coordination session for standalone runs.
//!
//! The real multiplayer server speaks its own wire protocol and lives
//! behind the [`CoordinationSession`] trait; this implementation reads
//! the same information from a local JSON manifest so the bridge can be
//! exercised without a server. Reported locations are appended to a
//! log file next to the manifest.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use apelink_core::error::{Error, Result};
use apelink_core::{CoordinationSession, ItemGrant, LocationCategory, SyncConfig};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    seed: String,
    #[serde(default)]
    channel_target: Option<u32>,
    #[serde(default)]
    tracked: Option<Vec<LocationCategory>>,
    #[serde(default)]
    items: Vec<ManifestItem>,
}

#[derive(Debug, Deserialize)]
struct ManifestItem {
    index: u32,
    item: u32,
}

pub struct ManifestSession {
    seed: String,
    items: Vec<ItemGrant>,
    config: SyncConfig,
    report_log: PathBuf,
}

impl ManifestSession {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&content)?;

        let mut config = SyncConfig::default();
        if let Some(target) = manifest.channel_target {
            config.channel_target = target;
        }
        if let Some(tracked) = manifest.tracked {
            config.tracked = tracked;
        }

        let report_log = path.with_extension("checks.log");
        info!(
            "Loaded manifest for seed {} ({} items granted)",
            manifest.seed,
            manifest.items.len()
        );
        Ok(Self {
            seed: manifest.seed,
            items: manifest
                .items
                .into_iter()
                .map(|i| ItemGrant {
                    index: i.index,
                    item: i.item,
                })
                .collect(),
            config,
            report_log,
        })
    }
}

impl CoordinationSession for ManifestSession {
    fn seed(&self) -> Option<String> {
        Some(self.seed.clone())
    }

    fn is_active(&self) -> bool {
        true
    }

    fn received_items(&self) -> Vec<ItemGrant> {
        self.items.clone()
    }

    fn report_locations(&mut self, locations: &[u32]) -> Result<()> {
        info!("Locations checked: {:?}", locations);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.report_log)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        for id in locations {
            writeln!(file, "{}", id).map_err(|e| Error::Persistence(e.to_string()))?;
        }
        Ok(())
    }

    fn config(&self) -> &SyncConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(
            &path,
            r#"{
                "seed": "AB12",
                "channelTarget": 9,
                "tracked": ["Monkey", "Boss"],
                "items": [
                    { "index": 0, "item": 16 },
                    { "index": 1, "item": 17 }
                ]
            }"#,
        )
        .unwrap();

        let mut session = ManifestSession::load(&path).unwrap();
        assert_eq!(session.seed(), Some("AB12".to_string()));
        assert!(session.is_active());
        assert_eq!(session.config().channel_target, 9);
        assert_eq!(
            session.config().tracked,
            vec![LocationCategory::Monkey, LocationCategory::Boss]
        );
        assert_eq!(session.received_items().len(), 2);

        session.report_locations(&[3, 10_001]).unwrap();
        let log = fs::read_to_string(path.with_extension("checks.log")).unwrap();
        assert_eq!(log, "3\n10001\n");
    }

    #[test]
    fn test_manifest_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.json");
        fs::write(&path, r#"{ "seed": "X" }"#).unwrap();

        let session = ManifestSession::load(&path).unwrap();
        assert!(session.received_items().is_empty());
        assert_eq!(session.config().tracked.len(), 4);
    }
}

//! On-disk checkpoint store.
//!
//! Each checkpoint is two sibling files: a binary blob with the full
//! snapshot and a JSON metadata sidecar. Ids follow
//! `{session_id}_{YYYYMMDD_HHMMSS}`. Failures surface as
//! [`EngineError::Checkpoint`] and never touch engine state.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::engine::{DataInfo, EngineConfig, EvolutionSnapshot};
use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub checkpoint_id: String,
    pub session_id: String,
    pub name: String,
    pub created_at: String,
    pub generation: u64,
    pub config: EngineConfig,
    pub data_info: DataInfo,
    pub file_size_bytes: u64,
}

pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| EngineError::Checkpoint(format!("create {}: {e}", dir.display())))?;
        log::info!("checkpoint store at {}", dir.display());
        Ok(Self { dir })
    }

    fn blob_path(&self, checkpoint_id: &str) -> PathBuf {
        self.dir.join(format!("{checkpoint_id}.bin"))
    }

    fn metadata_path(&self, checkpoint_id: &str) -> PathBuf {
        self.dir.join(format!("{checkpoint_id}.json"))
    }

    /// Persist a snapshot and return its checkpoint id.
    pub fn save(
        &self,
        session_id: &str,
        snapshot: &EvolutionSnapshot,
        name: Option<&str>,
    ) -> Result<String, EngineError> {
        let now = Local::now();
        let checkpoint_id = format!("{session_id}_{}", now.format("%Y%m%d_%H%M%S"));

        let blob = bincode::serialize(snapshot)
            .map_err(|e| EngineError::Checkpoint(format!("serialize snapshot: {e}")))?;
        let blob_path = self.blob_path(&checkpoint_id);
        fs::write(&blob_path, &blob)
            .map_err(|e| EngineError::Checkpoint(format!("write {}: {e}", blob_path.display())))?;

        let metadata = CheckpointMetadata {
            checkpoint_id: checkpoint_id.clone(),
            session_id: session_id.to_string(),
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| format!("Checkpoint at generation {}", snapshot.generation)),
            created_at: now.to_rfc3339(),
            generation: snapshot.generation,
            config: snapshot.config.clone(),
            data_info: snapshot.data_info,
            file_size_bytes: blob.len() as u64,
        };
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| EngineError::Checkpoint(format!("serialize metadata: {e}")))?;
        let metadata_path = self.metadata_path(&checkpoint_id);
        fs::write(&metadata_path, json).map_err(|e| {
            EngineError::Checkpoint(format!("write {}: {e}", metadata_path.display()))
        })?;

        log::info!(
            "saved checkpoint {checkpoint_id} at generation {}",
            snapshot.generation
        );
        Ok(checkpoint_id)
    }

    pub fn load(&self, checkpoint_id: &str) -> Result<EvolutionSnapshot, EngineError> {
        let path = self.blob_path(checkpoint_id);
        if !path.exists() {
            return Err(EngineError::Checkpoint(format!(
                "checkpoint not found: {checkpoint_id}"
            )));
        }
        let blob = fs::read(&path)
            .map_err(|e| EngineError::Checkpoint(format!("read {}: {e}", path.display())))?;
        let snapshot = bincode::deserialize(&blob)
            .map_err(|e| EngineError::Checkpoint(format!("decode {}: {e}", path.display())))?;
        log::info!("loaded checkpoint {checkpoint_id}");
        Ok(snapshot)
    }

    /// All checkpoints, newest first, optionally filtered by session.
    /// Sidecars without a matching blob and unreadable sidecars are skipped.
    pub fn list(&self, session_id: Option<&str>) -> Result<Vec<CheckpointMetadata>, EngineError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| EngineError::Checkpoint(format!("read {}: {e}", self.dir.display())))?;

        let mut checkpoints = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let metadata = match read_metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("skipping unreadable metadata {}: {e}", path.display());
                    continue;
                }
            };
            if session_id.is_some_and(|s| s != metadata.session_id) {
                continue;
            }
            if !self.blob_path(&metadata.checkpoint_id).exists() {
                continue;
            }
            checkpoints.push(metadata);
        }

        checkpoints.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(checkpoints)
    }

    /// Remove both files. Returns whether anything existed.
    pub fn delete(&self, checkpoint_id: &str) -> Result<bool, EngineError> {
        let mut deleted = false;
        for path in [self.blob_path(checkpoint_id), self.metadata_path(checkpoint_id)] {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    EngineError::Checkpoint(format!("remove {}: {e}", path.display()))
                })?;
                deleted = true;
            }
        }
        if deleted {
            log::info!("deleted checkpoint {checkpoint_id}");
        }
        Ok(deleted)
    }

    /// Keep only the `keep_count` newest checkpoints of a session; returns
    /// how many were deleted.
    pub fn cleanup(&self, session_id: &str, keep_count: usize) -> Result<usize, EngineError> {
        let checkpoints = self.list(Some(session_id))?;
        let mut deleted = 0;
        for metadata in checkpoints.iter().skip(keep_count) {
            if self.delete(&metadata.checkpoint_id)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

fn read_metadata(path: &Path) -> Result<CheckpointMetadata, EngineError> {
    let json = fs::read_to_string(path)
        .map_err(|e| EngineError::Checkpoint(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&json)
        .map_err(|e| EngineError::Checkpoint(format!("parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Dataset, EngineConfig, GpEngine};

    fn snapshot_fixture() -> EvolutionSnapshot {
        let x: Vec<f64> = (0..20).map(|i| i as f64 / 4.0).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v + 1.0).collect();
        let dataset = Dataset::single_feature(x, y).unwrap();
        let mut engine = GpEngine::new(
            dataset,
            EngineConfig {
                variable_names: vec!["x".into()],
                population_size: 15,
                ..Default::default()
            },
        )
        .unwrap();
        engine.initialize();
        engine.step();
        engine.checkpoint_state()
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let snapshot = snapshot_fixture();

        let id = store.save("sess-a", &snapshot, Some("first")).unwrap();
        assert!(id.starts_with("sess-a_"));

        let loaded = store.load(&id).unwrap();
        assert_eq!(loaded.generation, snapshot.generation);
        assert_eq!(loaded.population.len(), snapshot.population.len());
        assert_eq!(loaded.rng_state, snapshot.rng_state);
    }

    #[test]
    fn listing_filters_by_session_and_requires_the_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let snapshot = snapshot_fixture();

        let id_a = store.save("sess-a", &snapshot, None).unwrap();
        let _id_b = store.save("sess-b", &snapshot, None).unwrap();

        let all = store.list(None).unwrap();
        assert_eq!(all.len(), 2);
        let only_a = store.list(Some("sess-a")).unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].checkpoint_id, id_a);
        assert!(only_a[0].name.starts_with("Checkpoint at generation"));

        // orphaned sidecar (blob removed) disappears from listings
        std::fs::remove_file(store.blob_path(&id_a)).unwrap();
        assert!(store.list(Some("sess-a")).unwrap().is_empty());
    }

    #[test]
    fn delete_and_missing_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let snapshot = snapshot_fixture();

        let id = store.save("sess", &snapshot, None).unwrap();
        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(store.load(&id).is_err());
    }

    #[test]
    fn cleanup_keeps_the_newest() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        let snapshot = snapshot_fixture();

        // ids collide within one second, so write sidecars by hand with
        // distinct ids and timestamps
        for i in 0..4 {
            let id = format!("sess_2026010{}_000000", i + 1);
            let blob = bincode::serialize(&snapshot).unwrap();
            std::fs::write(store.blob_path(&id), &blob).unwrap();
            let metadata = CheckpointMetadata {
                checkpoint_id: id.clone(),
                session_id: "sess".into(),
                name: format!("cp {i}"),
                created_at: format!("2026-01-0{}T00:00:00+00:00", i + 1),
                generation: i as u64,
                config: snapshot.config.clone(),
                data_info: snapshot.data_info,
                file_size_bytes: blob.len() as u64,
            };
            std::fs::write(
                store.metadata_path(&id),
                serde_json::to_string(&metadata).unwrap(),
            )
            .unwrap();
        }

        let deleted = store.cleanup("sess", 2).unwrap();
        assert_eq!(deleted, 2);
        let left = store.list(Some("sess")).unwrap();
        assert_eq!(left.len(), 2);
        // newest first
        assert_eq!(left[0].checkpoint_id, "sess_20260104_000000");
        assert_eq!(left[1].checkpoint_id, "sess_20260103_000000");
    }
}

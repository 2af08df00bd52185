//! Sound library store.
//!
//! Holds every [`GeneratedSound`] and [`SoundPack`] the user has
//! produced. Like the job queue it lives inside a
//! [`tokio::sync::watch`] channel: an entry is updated by cloning it,
//! applying the change, and writing the whole entry back, so readers
//! never see a torn record.
//!
//! Entries are never deleted automatically. The library can be saved to
//! and loaded from a JSON snapshot file.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use ccbell_core::sound::{GeneratedSound, SoundPack, SoundStatus};
use ccbell_core::types::{PackId, SoundId};

use crate::error::OrchestratorError;

/// Error recorded on entries that were still generating when the
/// previous session ended.
pub const INTERRUPTED_MESSAGE: &str = "Interrupted before completion";

/// The full library state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default)]
    pub packs: Vec<SoundPack>,
    #[serde(default)]
    pub sounds: Vec<GeneratedSound>,
}

impl Library {
    pub fn sound(&self, id: SoundId) -> Option<&GeneratedSound> {
        self.sounds.iter().find(|s| s.id == id)
    }

    pub fn pack(&self, id: PackId) -> Option<&SoundPack> {
        self.packs.iter().find(|p| p.id == id)
    }

    pub fn sounds_in_pack(&self, pack_id: PackId) -> impl Iterator<Item = &GeneratedSound> {
        self.sounds.iter().filter(move |s| s.pack_id == pack_id)
    }

    pub fn count_by_status(&self, status: SoundStatus) -> usize {
        self.sounds.iter().filter(|s| s.status == status).count()
    }
}

/// Shared handle to the library. Cheap to clone.
#[derive(Clone)]
pub struct LibraryStore {
    tx: Arc<watch::Sender<Library>>,
}

impl LibraryStore {
    pub fn new() -> Self {
        Self::from_library(Library::default())
    }

    pub fn from_library(library: Library) -> Self {
        let (tx, _) = watch::channel(library);
        Self { tx: Arc::new(tx) }
    }

    pub fn add_pack(&self, pack: SoundPack) {
        self.tx.send_modify(|lib| lib.packs.push(pack));
    }

    pub fn insert_sound(&self, sound: GeneratedSound) {
        self.tx.send_modify(|lib| lib.sounds.push(sound));
    }

    /// Apply `change` to a copy of the entry and write it back if the
    /// closure reports a change. Returns whether the entry was updated.
    pub fn update_sound<F>(&self, id: SoundId, change: F) -> bool
    where
        F: FnOnce(&mut GeneratedSound) -> bool,
    {
        self.tx.send_if_modified(|lib| {
            let Some(slot) = lib.sounds.iter_mut().find(|s| s.id == id) else {
                return false;
            };
            let mut updated = slot.clone();
            if !change(&mut updated) {
                return false;
            }
            *slot = updated;
            true
        })
    }

    /// Remove an entry. Returns it so the caller can clean up server-side.
    pub fn remove_sound(&self, id: SoundId) -> Option<GeneratedSound> {
        let mut removed = None;
        self.tx.send_if_modified(|lib| {
            if let Some(pos) = lib.sounds.iter().position(|s| s.id == id) {
                removed = Some(lib.sounds.remove(pos));
            }
            removed.is_some()
        });
        removed
    }

    /// Remove a pack record. Its sounds are left untouched.
    pub fn remove_pack(&self, id: PackId) -> Option<SoundPack> {
        let mut removed = None;
        self.tx.send_if_modified(|lib| {
            if let Some(pos) = lib.packs.iter().position(|p| p.id == id) {
                removed = Some(lib.packs.remove(pos));
            }
            removed.is_some()
        });
        removed
    }

    pub fn sound(&self, id: SoundId) -> Option<GeneratedSound> {
        self.tx.borrow().sound(id).cloned()
    }

    pub fn pack(&self, id: PackId) -> Option<SoundPack> {
        self.tx.borrow().pack(id).cloned()
    }

    pub fn snapshot(&self) -> Library {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Library> {
        self.tx.subscribe()
    }

    // ---- persistence ----

    /// Load a library snapshot. A missing file yields an empty library.
    ///
    /// Entries still `generating` belong to a session that can no longer
    /// be observed; they are finalized as errors.
    pub async fn load(path: &Path) -> Result<Self, OrchestratorError> {
        let mut library: Library = match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Library::default(),
            Err(e) => return Err(e.into()),
        };

        let mut interrupted = 0usize;
        for sound in &mut library.sounds {
            if sound.fail(INTERRUPTED_MESSAGE.to_string()) {
                interrupted += 1;
            }
        }

        tracing::info!(
            path = %path.display(),
            sounds = library.sounds.len(),
            packs = library.packs.len(),
            interrupted,
            "Library loaded",
        );

        Ok(Self::from_library(library))
    }

    /// Write the current state to `path`, replacing the file atomically.
    pub async fn save(&self, path: &Path) -> Result<(), OrchestratorError> {
        let json = serde_json::to_vec_pretty(&self.snapshot())?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::debug!(path = %path.display(), "Library saved");
        Ok(())
    }
}

impl Default for LibraryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use ccbell_core::request::{GenerationRequest, ModelId};

    use super::*;

    fn pending(pack: &SoundPack, hook: &str) -> GeneratedSound {
        GeneratedSound::pending(pack.id, &GenerationRequest::new(ModelId::Small, "chime", hook))
    }

    #[test]
    fn update_replaces_whole_entry() {
        let store = LibraryStore::new();
        let pack = SoundPack::new("Retro", None, ModelId::Small);
        let sound = pending(&pack, "Stop");
        let id = sound.id;
        store.insert_sound(sound);

        let mut rx = store.subscribe();
        assert!(store.update_sound(id, |s| s.apply_progress(0.4, "generating")));
        assert!(rx.has_changed().unwrap());

        let updated = rx.borrow_and_update().sound(id).cloned().unwrap();
        assert_eq!(updated.progress, 0.4);
        assert_eq!(updated.stage, "generating");
    }

    #[test]
    fn rejected_update_does_not_notify() {
        let store = LibraryStore::new();
        let pack = SoundPack::new("Retro", None, ModelId::Small);
        let sound = pending(&pack, "Stop");
        let id = sound.id;
        store.insert_sound(sound);
        store.update_sound(id, |s| s.complete("/api/audio/a".into()));

        let rx = store.subscribe();
        assert!(!store.update_sound(id, |s| s.fail("late".into())));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.sound(id).unwrap().status, SoundStatus::Completed);
    }

    #[test]
    fn update_of_missing_entry_is_false() {
        let store = LibraryStore::new();
        assert!(!store.update_sound(SoundId::new(), |_| true));
    }

    #[test]
    fn remove_returns_entry() {
        let store = LibraryStore::new();
        let pack = SoundPack::new("Retro", None, ModelId::Small);
        let sound = pending(&pack, "Stop");
        let id = sound.id;
        store.insert_sound(sound);

        assert_eq!(store.remove_sound(id).unwrap().id, id);
        assert!(store.sound(id).is_none());
        assert!(store.remove_sound(id).is_none());
    }

    #[tokio::test]
    async fn save_and_load_finalizes_interrupted_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("library.json");

        let store = LibraryStore::new();
        let pack = SoundPack::new("Retro", Some("retro-8bit".into()), ModelId::Small);
        let done = pending(&pack, "Stop");
        let done_id = done.id;
        let running = pending(&pack, "Notification");
        let running_id = running.id;
        store.add_pack(pack.clone());
        store.insert_sound(done);
        store.insert_sound(running);
        store.update_sound(done_id, |s| s.complete("/api/audio/a".into()));
        store.update_sound(running_id, |s| s.apply_progress(0.5, "generating"));

        store.save(&path).await.unwrap();
        let loaded = LibraryStore::load(&path).await.unwrap();
        let library = loaded.snapshot();

        assert_eq!(library.packs, vec![pack]);
        assert_eq!(library.sound(done_id).unwrap().status, SoundStatus::Completed);
        let interrupted = library.sound(running_id).unwrap();
        assert_eq!(interrupted.status, SoundStatus::Error);
        assert_eq!(interrupted.error.as_deref(), Some(INTERRUPTED_MESSAGE));
        assert_eq!(interrupted.progress, 0.5);
    }

    #[tokio::test]
    async fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LibraryStore::load(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert!(store.snapshot().sounds.is_empty());
    }

    #[tokio::test]
    async fn load_malformed_file_is_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let result = LibraryStore::load(&path).await;
        assert!(matches!(result, Err(OrchestratorError::Serde(_))));
    }
}

//! Media storage and temp file lifecycle.
//!
//! Two directories: one for inbound raw recordings (removed after use) and
//! one for synthesized replies (retained for the delivery window, whose
//! lifecycle belongs to the telephony layer). Both are created once at
//! process start; startup aborts if either is not writable. Files are
//! namespaced by session id, so concurrent sessions never contend on a path.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Extension for inbound recordings (providers deliver WAV).
const RECORDING_EXT: &str = "wav";

/// Extension for synthesized reply audio.
const REPLY_EXT: &str = "mp3";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create media directory {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("media directory {path} is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write reply audio {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    recordings_dir: PathBuf,
    replies_dir: PathBuf,
}

impl MediaStore {
    pub fn new(recordings_dir: impl Into<PathBuf>, replies_dir: impl Into<PathBuf>) -> Self {
        Self {
            recordings_dir: recordings_dir.into(),
            replies_dir: replies_dir.into(),
        }
    }

    /// Creates both directories and probes that they are writable.
    ///
    /// Idempotent; meant to run once at process start, before the server
    /// accepts traffic. A failure here must abort startup.
    pub fn init(&self) -> Result<(), StoreError> {
        for dir in [&self.recordings_dir, &self.replies_dir] {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Create {
                path: dir.clone(),
                source,
            })?;

            let probe = dir.join(".writable-probe");
            std::fs::write(&probe, b"probe").map_err(|source| StoreError::NotWritable {
                path: dir.clone(),
                source,
            })?;
            let _ = std::fs::remove_file(&probe);
        }
        Ok(())
    }

    /// Path of the session's temporary input recording.
    pub fn recording_path(&self, session_id: &str) -> PathBuf {
        self.recordings_dir
            .join(format!("{session_id}.{RECORDING_EXT}"))
    }

    /// Path of the session's synthesized reply audio.
    pub fn reply_path(&self, session_id: &str) -> PathBuf {
        self.replies_dir.join(format!("{session_id}.{REPLY_EXT}"))
    }

    /// Writes the synthesized reply audio and returns its path.
    ///
    /// Reply files are not touched by [`cleanup`]; the delivery layer owns
    /// their lifecycle.
    ///
    /// [`cleanup`]: MediaStore::cleanup
    pub async fn persist_reply(
        &self,
        session_id: &str,
        audio: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let path = self.reply_path(session_id);
        tokio::fs::write(&path, audio)
            .await
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
        debug!(session_id, path = %path.display(), bytes = audio.len(), "persisted reply audio");
        Ok(path)
    }

    /// Removes the session's temporary input recording if present.
    ///
    /// Delete-if-exists: repeated invocations are safe and never error.
    /// Unexpected filesystem failures are logged and swallowed — a leaked
    /// temp file must not change the session's terminal state.
    pub async fn cleanup(&self, session_id: &str) {
        let path = self.recording_path(session_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(session_id, path = %path.display(), "removed session recording"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(session_id, path = %path.display(), "failed to remove session recording: {e}");
            }
        }
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    pub fn replies_dir(&self) -> &Path {
        &self.replies_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, MediaStore) {
        let tmp = TempDir::new().unwrap();
        let store = MediaStore::new(tmp.path().join("recordings"), tmp.path().join("replies"));
        (tmp, store)
    }

    #[test]
    fn init_creates_both_directories() {
        let (_tmp, store) = store();
        store.init().unwrap();
        assert!(store.recordings_dir().is_dir());
        assert!(store.replies_dir().is_dir());
    }

    #[test]
    fn init_is_idempotent() {
        let (_tmp, store) = store();
        store.init().unwrap();
        store.init().unwrap();
    }

    #[test]
    fn paths_are_namespaced_by_session_id() {
        let (_tmp, store) = store();
        let a = store.recording_path("s-a");
        let b = store.recording_path("s-b");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with("s-a.wav"));
        assert!(store.reply_path("s-a").to_string_lossy().ends_with("s-a.mp3"));
    }

    #[tokio::test]
    async fn persist_reply_writes_bytes() {
        let (_tmp, store) = store();
        store.init().unwrap();
        let path = store.persist_reply("s-1", b"audio-bytes").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"audio-bytes");
    }

    #[tokio::test]
    async fn cleanup_removes_recording() {
        let (_tmp, store) = store();
        store.init().unwrap();
        let path = store.recording_path("s-1");
        std::fs::write(&path, b"wav").unwrap();
        store.cleanup("s-1").await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let (_tmp, store) = store();
        store.init().unwrap();
        let path = store.recording_path("s-1");
        std::fs::write(&path, b"wav").unwrap();
        store.cleanup("s-1").await;
        // Second (and third) invocation on an already-clean session: no panic,
        // no error surfaced.
        store.cleanup("s-1").await;
        store.cleanup("s-1").await;
    }

    #[tokio::test]
    async fn cleanup_leaves_reply_audio_alone() {
        let (_tmp, store) = store();
        store.init().unwrap();
        let reply = store.persist_reply("s-1", b"mp3").await.unwrap();
        store.cleanup("s-1").await;
        assert!(reply.exists());
    }
}

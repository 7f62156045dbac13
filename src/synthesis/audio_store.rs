/*!
 * On-disk storage for per-segment audio.
 *
 * Every job owns a directory `<root>/<job id>/` holding `seg_00000.wav`,
 * `seg_00001.wav`, ... A file only appears under its final name once it is
 * fully written, so a crash never leaves a truncated segment behind.
 */

use anyhow::{Context, Result};
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::errors::PersistenceError;

/// Directory name under the data dir for segment audio
const SEGMENTS_DIR_NAME: &str = "segments";

/// Segment audio directory of one job
#[derive(Debug, Clone)]
pub struct SegmentAudioStore {
    dir: PathBuf,
}

impl SegmentAudioStore {
    /// Store for `job_id` under `root`
    pub fn for_job(root: impl AsRef<Path>, job_id: &str) -> Self {
        Self { dir: root.as_ref().join(job_id) }
    }

    /// Default root: `<data dir>/narrador/segments`
    pub fn default_root() -> Result<PathBuf> {
        let database = crate::database::DatabaseConnection::default_database_path()?;
        let parent = database
            .parent()
            .context("Default database path has no parent directory")?;
        Ok(parent.join(SEGMENTS_DIR_NAME))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final path of a segment's audio
    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("seg_{:05}.wav", index))
    }

    /// Write audio for `index` atomically and return its path.
    ///
    /// The bytes go to a temporary file in the same directory, are synced,
    /// and the file is renamed over the final name.
    pub async fn commit(&self, index: usize, bytes: &[u8]) -> Result<PathBuf, PersistenceError> {
        let dir = self.dir.clone();
        let target = self.segment_path(index);
        let bytes = bytes.to_vec();

        tokio::task::spawn_blocking(move || -> Result<PathBuf, PersistenceError> {
            std::fs::create_dir_all(&dir)?;
            let mut temp = NamedTempFile::new_in(&dir)?;
            temp.write_all(&bytes)?;
            temp.as_file().sync_all()?;
            temp.persist(&target).map_err(|e| PersistenceError::Io(e.error.to_string()))?;
            debug!("Committed segment audio {}", target.display());
            Ok(target)
        })
        .await
        .map_err(|e| PersistenceError::Io(format!("audio commit task failed: {}", e)))?
    }

    /// Delete the job's segment directory; returns whether it existed
    pub fn remove_all(&self) -> std::io::Result<bool> {
        if !self.dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&self.dir)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_segmentPath_shouldBeZeroPadded() {
        let store = SegmentAudioStore::for_job("/data/segments", "abc123");
        assert_eq!(store.segment_path(7), PathBuf::from("/data/segments/abc123/seg_00007.wav"));
    }

    #[tokio::test]
    async fn test_commit_shouldWriteUnderFinalName() {
        let temp = TempDir::new().unwrap();
        let store = SegmentAudioStore::for_job(temp.path(), "job");

        let path = store.commit(3, b"RIFF-bytes").await.unwrap();

        assert_eq!(path, store.segment_path(3));
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF-bytes");
        // no temporary files left behind
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_commit_shouldReplaceExistingFile() {
        let temp = TempDir::new().unwrap();
        let store = SegmentAudioStore::for_job(temp.path(), "job");

        store.commit(0, b"old").await.unwrap();
        let path = store.commit(0, b"new").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_removeAll_shouldDeleteDirectory() {
        let temp = TempDir::new().unwrap();
        let store = SegmentAudioStore::for_job(temp.path(), "job");
        store.commit(0, b"x").await.unwrap();

        assert!(store.remove_all().unwrap());
        assert!(!store.dir().exists());
        assert!(!store.remove_all().unwrap());
    }
}

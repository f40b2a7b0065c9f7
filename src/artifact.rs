//! Fetched document content persisted for the render step.

use crate::{Error, Result};
use log::{debug, error};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Extension of fetched documents.
const DOCUMENT_EXT: &str = "html";

/// Names tried for one stem before giving up.
const MAX_CLAIM_ATTEMPTS: usize = 4096;

/// A local copy of one target's response body.
///
/// The file exists from [`Artifact::create`] until the artifact is removed or
/// dropped, whichever comes first. Dropping an artifact that was never
/// explicitly removed deletes the file, so a job that bails out early (or is
/// cancelled) never leaves a document behind.
///
/// Every artifact owns its file exclusively: when `<stem>.html` is already
/// taken, for example by a concurrent job for the same target, the next free
/// `<stem>-<n>.html` is used instead.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    removed: bool,
}

impl Artifact {
    /// Location of the `attempt`-th candidate name for `stem` inside `dir`.
    fn path_for(dir: &Path, stem: &str, ext: &str, attempt: usize) -> PathBuf {
        match attempt {
            0 => dir.join(format!("{}.{}", stem, ext)),
            n => dir.join(format!("{}-{}.{}", stem, n, ext)),
        }
    }

    /// Write `body` verbatim to a new document named after `stem` in `dir`.
    pub async fn create(dir: &Path, stem: &str, body: &[u8]) -> Result<Self> {
        Self::create_with_ext(dir, stem, DOCUMENT_EXT, body).await
    }

    /// Like [`Artifact::create`] with a custom extension.
    pub async fn create_with_ext(dir: &Path, stem: &str, ext: &str, body: &[u8]) -> Result<Self> {
        let (artifact, file) = Self::claim(dir, stem, ext).await?;
        artifact.fill(file, body).await
    }

    /// Atomically create the first free name for `stem`.
    async fn claim(dir: &Path, stem: &str, ext: &str) -> Result<(Self, tokio::fs::File)> {
        for attempt in 0..MAX_CLAIM_ATTEMPTS {
            let path = Self::path_for(dir, stem, ext, attempt);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    return Ok((
                        Self {
                            path,
                            removed: false,
                        },
                        file,
                    ))
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Error::artifact_io(&path, e)),
            }
        }
        Err(Error::artifact_io(
            Self::path_for(dir, stem, ext, 0),
            io::Error::new(io::ErrorKind::AlreadyExists, "no free artifact name"),
        ))
    }

    /// Write `body` through `writer`. On failure the artifact is dropped, which
    /// deletes whatever part of the file was already written.
    async fn fill<W>(self, mut writer: W, body: &[u8]) -> Result<Self>
    where
        W: AsyncWrite + Unpin,
    {
        let written = match writer.write_all(body).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        drop(writer);
        if let Err(e) = written {
            return Err(Error::artifact_io(&self.path, e));
        }
        debug!("Wrote artifact {} ({} bytes)", self.path.display(), body.len());
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now and report whether that worked.
    ///
    /// A file that is already gone counts as removed.
    pub fn remove(mut self) -> Result<()> {
        self.removed = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::artifact_io(&self.path, e)),
        }
    }

    /// Move the file to `dest`, replacing anything there.
    ///
    /// If the move fails the file is deleted and `dest` is left untouched.
    pub fn persist(mut self, dest: &Path) -> Result<()> {
        std::fs::rename(&self.path, dest).map_err(|e| Error::artifact_io(dest, e))?;
        self.removed = true;
        Ok(())
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                error!("Failed to delete artifact {}: {}", self.path.display(), e);
            }
        }
    }
}

//! Collision-free destination names in the managed directory.
//!
//! A name is reserved by creating the file exclusively (`create_new`), then
//! locking and truncating it. Concurrent processes writing to the same
//! directory can never both win the exclusive create, so no directory-wide
//! lock is needed. Contention only costs a retry with a fresh name, and the
//! number of retries is bounded.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// A reserved, locked, empty destination file.
///
/// The lock is released when the reservation is dropped, which happens
/// after the content has been renamed onto [`Reservation::path`].
#[derive(Debug)]
pub struct Reservation {
    path: PathBuf,
    file_name: String,
    _handle: File,
}

impl Reservation {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generated file name (stem plus extension); this is the stored id.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Give the name back after a failed commit.
    pub fn release(self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to release reservation {:?}: {}", self.path, e);
        }
    }
}

/// Reserves unique file names inside one directory.
#[derive(Debug, Clone)]
pub struct PathAllocator {
    dir: PathBuf,
    max_attempts: u32,
}

impl PathAllocator {
    pub fn new(dir: impl Into<PathBuf>, max_attempts: u32) -> Self {
        Self {
            dir: dir.into(),
            max_attempts,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve `<random>.<extension>` in the managed directory.
    pub fn allocate(&self, extension: &str) -> Result<Reservation, PipelineError> {
        self.allocate_with(extension, random_stem)
    }

    /// Reserve a name using `next_stem` to generate candidates.
    ///
    /// Every failed attempt (collision, create or lock failure) draws a new
    /// stem. After `max_attempts` failures the allocation fails.
    pub fn allocate_with(
        &self,
        extension: &str,
        mut next_stem: impl FnMut() -> String,
    ) -> Result<Reservation, PipelineError> {
        for attempt in 1..=self.max_attempts {
            let file_name = format!("{}.{}", next_stem(), extension);
            let path = self.dir.join(&file_name);

            match reserve(&path) {
                Ok(handle) => {
                    tracing::trace!("Reserved {:?} on attempt {}", path, attempt);
                    return Ok(Reservation {
                        path,
                        file_name,
                        _handle: handle,
                    });
                }
                Err(e) => {
                    tracing::debug!(
                        "Reservation attempt {}/{} for {:?} failed: {}",
                        attempt,
                        self.max_attempts,
                        path,
                        e
                    );
                }
            }
        }

        Err(PipelineError::AllocationExhausted {
            dir: self.dir.clone(),
            attempts: self.max_attempts,
        })
    }
}

/// 128 random bits as 32 lowercase hex characters.
pub fn random_stem() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Exclusive create, then lock and truncate.
///
/// A file created by this call is removed again if locking or truncating
/// fails, so a failed attempt leaves nothing behind.
fn reserve(path: &Path) -> io::Result<File> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;

    let locked = lock_exclusive(&file).and_then(|_| file.set_len(0));
    if let Err(e) = locked {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(e);
    }
    Ok(file)
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> io::Result<()> {
    use rustix::fs::{flock, FlockOperation};
    flock(file, FlockOperation::NonBlockingLockExclusive).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> io::Result<()> {
    // The exclusive create alone guards the name here.
    Ok(())
}

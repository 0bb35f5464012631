//! Temporary objects: local files that hold a source's bytes while it is
//! being checked.
//!
//! A [`TemporaryObject`] deletes its file when dropped. Ownership moves
//! through the pipeline, so whichever stage ends a run also ends the
//! temporary file, whether that stage succeeded or not.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::PipelineError;

const TEMP_PREFIX: &str = ".picstash-";
const TEMP_SUFFIX: &str = ".part";

/// A temporary file owned by exactly one pipeline run.
#[derive(Debug)]
pub struct TemporaryObject {
    file: NamedTempFile,
}

impl TemporaryObject {
    /// Location of the temporary file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Current size in bytes.
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.as_file().metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Writable handle, for transports that spool into the object.
    pub fn as_file_mut(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    /// Atomically rename the content onto `dest`, replacing whatever is there.
    ///
    /// On failure the temporary file is still deleted.
    pub fn persist(self, dest: &Path) -> Result<(), PipelineError> {
        self.file
            .as_file()
            .sync_all()
            .map_err(|e| PipelineError::storage(self.file.path(), e))?;
        self.file
            .persist(dest)
            .map(|_| ())
            .map_err(|e| PipelineError::storage(dest, e.error))
    }
}

/// Creates temporary objects in one directory.
#[derive(Debug, Clone)]
pub struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create an empty temporary object.
    pub fn create(&self) -> Result<TemporaryObject, PipelineError> {
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| PipelineError::storage(&self.dir, e))?;
        Ok(TemporaryObject { file })
    }

    /// Create a temporary object holding `bytes`.
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<TemporaryObject, PipelineError> {
        let mut temp = self.create()?;
        let written = {
            let file = temp.as_file_mut();
            file.write_all(bytes).and_then(|_| file.flush())
        };
        written.map_err(|e| PipelineError::storage(temp.path(), e))?;
        Ok(temp)
    }

    /// Copy a byte stream into a new temporary object, refusing more than
    /// `max_bytes`.
    pub fn copy_from(
        &self,
        reader: &mut dyn Read,
        max_bytes: u64,
        source_name: &str,
    ) -> Result<TemporaryObject, PipelineError> {
        let mut temp = self.create()?;
        let mut limited = reader.take(max_bytes.saturating_add(1));
        let copied = io::copy(&mut limited, temp.as_file_mut())
            .map_err(|e| PipelineError::storage(temp.path(), e))?;

        if copied > max_bytes {
            return Err(PipelineError::FileTooLarge {
                source_name: source_name.to_string(),
                size_mb: copied / (1024 * 1024),
                max_mb: max_bytes / (1024 * 1024),
            });
        }
        Ok(temp)
    }

    /// Whether `path` looks like one of this store's temporary files.
    pub fn is_temporary_name(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(TEMP_PREFIX) && n.ends_with(TEMP_SUFFIX))
    }
}

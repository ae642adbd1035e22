//! Session-file reading with memory mapping for large journals.
//!
//! Session logs range from a few kilobytes to hundreds of megabytes of
//! NDJSON. Small files are read directly; large ones are memory mapped.

// Memory mapping requires unsafe but is safe for read-only access
#![allow(unsafe_code)]

use crate::error::{IoError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Threshold for using memory mapping (1MB).
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Maximum session file size to read (1GB).
const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Reader for on-disk session files.
///
/// Chooses the reading strategy by file size: small files are read
/// directly, large files are memory mapped. Content is always handed to
/// the parsers as UTF-8 (invalid sequences replaced, since a single bad
/// byte must not sink a whole session).
pub struct SessionFileReader {
    file: File,
    size: u64,
    path: String,
}

impl SessionFileReader {
    /// Opens a session file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, can't be opened, or
    /// exceeds the size cap.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        if !path_ref.exists() {
            return Err(IoError::FileNotFound { path: path_str }.into());
        }

        let file = File::open(path_ref).map_err(|e| IoError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let size = file
            .metadata()
            .map_err(|e| IoError::ReadFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?
            .len();

        if size > MAX_FILE_SIZE {
            return Err(IoError::ReadFailed {
                path: path_str,
                reason: format!("file too large: {size} bytes (max: {MAX_FILE_SIZE} bytes)"),
            }
            .into());
        }

        Ok(Self {
            file,
            size,
            path: path_str,
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reads the whole file as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or mapping fails.
    pub fn read_to_string(&self) -> Result<String> {
        if self.size >= MMAP_THRESHOLD {
            self.read_mmap()
        } else {
            self.read_direct()
        }
    }

    fn read_direct(&self) -> Result<String> {
        let mut content = Vec::with_capacity(usize::try_from(self.size).unwrap_or(0));
        let mut file = &self.file;
        file.read_to_end(&mut content)
            .map_err(|e| IoError::ReadFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(String::from_utf8_lossy(&content).into_owned())
    }

    fn read_mmap(&self) -> Result<String> {
        // SAFETY: read-only map of a file we hold open; mutation races are
        // tolerable because parse skips malformed records.
        let mmap = unsafe {
            Mmap::map(&self.file).map_err(|e| IoError::MmapFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?
        };
        Ok(String::from_utf8_lossy(&mmap).into_owned())
    }
}

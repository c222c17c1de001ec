//! A family of fixed-size-capped blob files sharing a random prefix.

mod reader;
mod writer;

pub use reader::ReadHandle;
pub use writer::WriteHandle;

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::RngExt;
use tracing::{error, trace};

use crate::error::Result;
use crate::types::{Descriptor, WritePolicy, MAX_FILE_SIZE};

/// Manages `<dir>/<prefix><rand8hex><N>.cache` for `N = 0, 1, ...` until the
/// first missing index. Files are opened, used, and closed on every access;
/// no persistent handles are kept.
pub struct CacheFileSet {
    dir: PathBuf,
    full_prefix: String,
    open_count: AtomicUsize,
}

impl CacheFileSet {
    /// Ensure `dir` exists and claim a collision-free prefix by creating an
    /// empty `<prefix><rand>0.cache` namespace marker.
    pub fn initialize(dir: &Path, prefix: &str) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            error!(path = %dir.display(), op = "create_dir_all", error = %e, "cache directory creation failed");
            e
        })?;

        loop {
            let suffix: String = (0..8)
                .map(|_| {
                    const HEX: &[u8] = b"0123456789abcdef";
                    HEX[rand::rng().random_range(0..HEX.len())] as char
                })
                .collect();
            let full_prefix = format!("{prefix}{suffix}");
            let claim = dir.join(format!("{full_prefix}0.cache"));
            if claim.exists() {
                continue;
            }
            File::create(&claim).map_err(|e| {
                error!(path = %claim.display(), op = "create", error = %e, "cache namespace claim failed");
                e
            })?;
            trace!(prefix = %full_prefix, "claimed cache file set namespace");
            return Ok(Self { dir: dir.to_path_buf(), full_prefix, open_count: AtomicUsize::new(0) });
        }
    }

    /// Number of times a cache file has been opened for read or write since
    /// construction. Used to prove the coherent fast path performs zero I/O.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::Relaxed)
    }

    fn path(&self, file_number: usize) -> PathBuf {
        self.dir.join(format!("{}{file_number}.cache", self.full_prefix))
    }

    fn file_size(&self, file_number: usize) -> Result<u64> {
        match fs::metadata(self.path(file_number)) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Open the file backing `descriptor` and seek to its offset.
    pub fn open_for_read(&self, descriptor: &Descriptor) -> Result<ReadHandle> {
        let path = self.path(descriptor.file_number);
        let file = File::open(&path).map_err(|e| {
            error!(path = %path.display(), op = "open_for_read", error = %e, "cache file read open failed");
            e
        })?;
        self.open_count.fetch_add(1, Ordering::Relaxed);
        ReadHandle::new(file, descriptor.offset)
    }

    /// Obtain a write handle for `bytes` more data, honoring `policy`.
    ///
    /// Returns the handle plus the `(file_number, offset)` it was positioned
    /// at, so the caller can build the resulting descriptor.
    pub fn allocate_write(
        &mut self,
        reuse: Option<&Descriptor>,
        policy: WritePolicy,
        bytes: u64,
    ) -> Result<(WriteHandle, usize, u64)> {
        if policy == WritePolicy::InPlace {
            if let Some(desc) = reuse {
                let path = self.path(desc.file_number);
                let file = OpenOptions::new().write(true).open(&path).map_err(|e| {
                    error!(path = %path.display(), op = "allocate_write(in_place)", error = %e, "cache file reopen failed");
                    e
                })?;
                self.open_count.fetch_add(1, Ordering::Relaxed);
                let handle = WriteHandle::new(file, desc.file_number, desc.offset)?;
                trace!(file = desc.file_number, offset = desc.offset, bytes, "in-place write slot");
                return Ok((handle, desc.file_number, desc.offset));
            }
        }

        let mut file_number = 0usize;
        loop {
            let path = self.path(file_number);
            if !path.exists() {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&path)
                    .map_err(|e| {
                        error!(path = %path.display(), op = "allocate_write(new)", error = %e, "cache file creation failed");
                        e
                    })?;
                self.open_count.fetch_add(1, Ordering::Relaxed);
                let handle = WriteHandle::new(file, file_number, 0)?;
                trace!(file = file_number, offset = 0, bytes, "new cache file allocated");
                return Ok((handle, file_number, 0));
            }
            let size = self.file_size(file_number)?;
            if size + bytes < MAX_FILE_SIZE {
                let file = OpenOptions::new().write(true).open(&path).map_err(|e| {
                    error!(path = %path.display(), op = "allocate_write(append)", error = %e, "cache file reopen failed");
                    e
                })?;
                self.open_count.fetch_add(1, Ordering::Relaxed);
                let handle = WriteHandle::new(file, file_number, size)?;
                trace!(file = file_number, offset = size, bytes, "appended write slot");
                return Ok((handle, file_number, size));
            }
            file_number += 1;
        }
    }

    /// Shrink `file_number` to `size` bytes.
    pub fn truncate(&self, file_number: usize, size: u64) -> Result<()> {
        let path = self.path(file_number);
        let file = OpenOptions::new().write(true).open(&path).map_err(|e| {
            error!(path = %path.display(), op = "truncate", error = %e, "cache file truncate-open failed");
            e
        })?;
        self.open_count.fetch_add(1, Ordering::Relaxed);
        file.set_len(size).map_err(|e| {
            error!(path = %path.display(), op = "truncate", error = %e, "cache file truncate failed");
            e
        })?;
        trace!(file = file_number, size, "truncated cache file");
        Ok(())
    }

    /// Truncate every file in the set to size 0.
    pub fn clear_all(&self) -> Result<()> {
        let mut file_number = 0usize;
        loop {
            let path = self.path(file_number);
            if !path.exists() {
                return Ok(());
            }
            self.truncate(file_number, 0)?;
            file_number += 1;
        }
    }

    /// Unlink every file in the set.
    pub fn remove_all(&self) -> Result<()> {
        let mut file_number = 0usize;
        loop {
            let path = self.path(file_number);
            if !path.exists() {
                return Ok(());
            }
            fs::remove_file(&path).map_err(|e| {
                error!(path = %path.display(), op = "remove_all", error = %e, "cache file removal failed");
                e
            })?;
            file_number += 1;
        }
    }
}

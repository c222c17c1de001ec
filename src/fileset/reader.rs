//! Read-side handle returned by `CacheFileSet::open_for_read`.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::Result;

/// A positioned, read-only handle onto one cache file.
pub struct ReadHandle {
    reader: BufReader<File>,
}

impl ReadHandle {
    pub(crate) fn new(file: File, offset: u64) -> Result<Self> {
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset))?;
        Ok(Self { reader })
    }
}

impl Read for ReadHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

//! Write-side handle returned by `CacheFileSet::allocate_write`.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};

use crate::error::Result;

/// A positioned, write-capable handle onto one cache file.
///
/// Opened fresh for every write and dropped immediately after, per the
/// file-descriptor-budget policy: no handle outlives the call that needed it.
pub struct WriteHandle {
    writer: BufWriter<File>,
    file_number: usize,
    offset: u64,
}

impl WriteHandle {
    pub(crate) fn new(file: File, file_number: usize, offset: u64) -> Result<Self> {
        let mut writer = BufWriter::new(file);
        writer.seek(SeekFrom::Start(offset))?;
        Ok(Self {
            writer,
            file_number,
            offset,
        })
    }

    pub fn file_number(&self) -> usize {
        self.file_number
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Write for WriteHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

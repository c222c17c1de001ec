//! Generic, codec-parameterized orchestration of descriptor lookup, chunk
//! I/O, coherent-reuse, and unused-block reclamation.

use std::collections::HashMap;
use std::io::Write as _;
use std::marker::PhantomData;
use std::path::Path;

use tracing::{debug, trace};

use crate::codec::ChunkCodec;
use crate::descriptors::DescriptorTable;
use crate::error::{CacheError, Result};
use crate::fileset::CacheFileSet;
use crate::types::{Descriptor, WritePolicy};

/// Orchestrates a [`DescriptorTable`] and a [`CacheFileSet`] through a
/// [`ChunkCodec`]. Dense series and MD matrices share this engine; only the
/// codec differs.
pub struct CacheEngine<C: ChunkCodec> {
    files: CacheFileSet,
    table: DescriptorTable,
    chunk_size: usize,
    _codec: PhantomData<C>,
}

impl<C: ChunkCodec> CacheEngine<C> {
    pub fn new(dir: &Path, prefix: &str, chunk_size: usize) -> Result<Self> {
        Ok(Self {
            files: CacheFileSet::initialize(dir, prefix)?,
            table: DescriptorTable::new(),
            chunk_size,
            _codec: PhantomData,
        })
    }

    pub fn descriptor_count(&self) -> usize {
        self.table.len()
    }

    /// Number of cache files opened for read or write since construction.
    pub fn open_count(&self) -> usize {
        self.files.open_count()
    }

    /// Sum of `count` over valid descriptors (rows currently cached on disk).
    pub fn cached_row_count(&self) -> usize {
        self.table.valid_count_sum()
    }

    /// `ReadRange(t1, t2) -> (t_start, t_end, skip_count, chunk)`.
    pub fn read_range(&mut self, t1: f64, t2: f64) -> Result<(f64, f64, usize, C::Chunk)> {
        if self.table.is_empty() {
            return Ok((0.0, 0.0, 0, C::Chunk::default()));
        }

        let (lo, hi) = self.table.find_read_range(t1, t2);
        let skip_count: usize = (0..lo)
            .filter_map(|i| self.table.get(i))
            .filter(|d| d.valid)
            .map(|d| d.count)
            .sum();

        let mut sink = C::Chunk::default();
        let mut t_start = 0.0;
        let mut t_end = 0.0;
        let mut seen_any = false;
        for i in lo..=hi {
            let desc = *self
                .table
                .get(i)
                .ok_or(CacheError::DescriptorNotFound(i))?;
            if !desc.valid {
                continue;
            }
            let mut handle = self.files.open_for_read(&desc)?;
            let chunk = C::read(&mut handle)?;
            trace!(
                file = desc.file_number,
                offset = desc.offset,
                rows = C::chunk_len(&chunk),
                "read chunk"
            );
            if !seen_any {
                t_start = desc.t_start;
                seen_any = true;
            }
            t_end = desc.t_end;
            C::extend(&mut sink, chunk);
            self.table.invalidate(i, i);
        }

        debug!(t1, t2, lo, hi, skip_count, "read range");
        Ok((t_start, t_end, skip_count, sink))
    }

    /// `Write(source_rows, times, start, n, coherent)`.
    pub fn write(
        &mut self,
        source: &C::Chunk,
        times: &[f64],
        start: usize,
        n: usize,
        coherent: bool,
    ) -> Result<()> {
        if n == 0 {
            return Ok(());
        }

        let (idx, insert) = self.table.find_write(times[start]);

        if coherent && !insert {
            let mut idx = idx;
            let mut remaining = n;
            while remaining > 0 {
                let desc = *self
                    .table
                    .get(idx)
                    .ok_or(CacheError::DescriptorNotFound(idx))?;
                self.table.validate(idx);
                remaining = remaining.saturating_sub(desc.count);
                idx += 1;
            }
            debug!(rows = n, "coherent fast path: zero I/O re-validation");
            return Ok(());
        }

        let mut idx = idx;
        let mut cursor = 0usize;
        let mut t_index = start;
        let mut remaining = n;
        let chunk_size = self.chunk_size;

        while remaining >= 2 * chunk_size {
            let piece = C::slice(source, cursor, chunk_size);
            let t_start = times[t_index];
            let t_end = times[t_index + chunk_size - 1];
            self.write_one(idx, &piece, t_start, t_end, insert)?;
            idx += 1;
            cursor += chunk_size;
            t_index += chunk_size;
            remaining -= chunk_size;
        }

        let piece = C::slice(source, cursor, remaining);
        let t_start = times[t_index];
        let t_end = times[t_index + remaining - 1];
        self.write_one(idx, &piece, t_start, t_end, insert)?;

        self.table.trim_trailing_invalid();
        self.reclaim()?;

        debug!(rows = n, coherent, "write");
        Ok(())
    }

    /// `WriteOne(idx, rows, times, start, size, forceInsert)`.
    fn write_one(
        &mut self,
        idx: usize,
        chunk: &C::Chunk,
        t_start: f64,
        t_end: f64,
        force_insert: bool,
    ) -> Result<()> {
        let len = C::chunk_len(chunk);
        let existing = self.table.get(idx).copied();
        let table_insert = force_insert || existing.is_none_or(|d| d.valid);

        let reuse_file = !table_insert
            && existing.is_some_and(|d| C::fits_in_place(d.count, self.chunk_size, len));

        let (policy, reuse_desc) = if reuse_file {
            (WritePolicy::InPlace, existing.as_ref())
        } else {
            (WritePolicy::Append, None)
        };

        let mut buf = Vec::new();
        C::write(&mut buf, chunk)?;

        let (mut handle, file_number, offset) =
            self.files.allocate_write(reuse_desc, policy, buf.len() as u64)?;
        handle.write_all(&buf)?;
        handle.finish()?;

        trace!(file = file_number, offset, bytes = buf.len(), rows = len, "wrote chunk");

        let new_desc = Descriptor::new(file_number, len, t_start, t_end, offset);
        self.table.put(idx, table_insert, new_desc);
        Ok(())
    }

    /// Truncate every cache file whose trailing region is entirely invalid.
    pub fn reclaim(&mut self) -> Result<()> {
        let mut min_invalid: HashMap<usize, u64> = HashMap::new();
        let mut max_valid: HashMap<usize, u64> = HashMap::new();

        for d in self.table.iter() {
            if d.valid {
                max_valid
                    .entry(d.file_number)
                    .and_modify(|v| *v = (*v).max(d.offset))
                    .or_insert(d.offset);
            } else {
                min_invalid
                    .entry(d.file_number)
                    .and_modify(|v| *v = (*v).min(d.offset))
                    .or_insert(d.offset);
            }
        }

        for (file_number, min_inv) in min_invalid {
            match max_valid.get(&file_number) {
                // no surviving valid data in this file at all: drop everything.
                None => {
                    self.files.truncate(file_number, 0)?;
                    debug!(file = file_number, "reclaimed file with no valid descriptors");
                }
                Some(&max_val) if max_val < min_inv => {
                    self.files.truncate(file_number, min_inv)?;
                    debug!(file = file_number, size = min_inv, "reclaimed trailing invalid region");
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn clear_all(&self) -> Result<()> {
        self.files.clear_all()
    }

    pub fn remove_all(&self) -> Result<()> {
        self.files.remove_all()
    }
}

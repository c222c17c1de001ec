//! Variable-width sibling container to [`crate::distribution::Distribution`].
//!
//! Shares the generic [`CacheEngine`] and descriptor machinery through
//! [`MdCodec`], but exposes positional read/write of the time vector and
//! matrix without interpolation — the simulator indexes it positionally,
//! not by interpolated time.

use tracing::debug;

use crate::codec::{MdChunk, MdCodec};
use crate::config::CacheConfig;
use crate::engine::CacheEngine;
use crate::error::{CacheError, Result};

/// A time vector plus a `D x N` matrix, chunked and spilled like
/// [`crate::distribution::Distribution`] but without interpolation.
pub struct MdSeries {
    times: Vec<f64>,
    matrix: Vec<Vec<f64>>,
    offset: usize,
    win_start: f64,
    win_end: f64,
    coherent: bool,
    config: CacheConfig,
    engine: Option<CacheEngine<MdCodec>>,
}

impl MdSeries {
    pub fn new(config: CacheConfig) -> Result<Self> {
        let config = config.validated();
        let engine = if config.enabled {
            Some(CacheEngine::new(&config.cache_path, "MD_", config.w)?)
        } else {
            None
        };
        Ok(Self {
            times: Vec::new(),
            matrix: Vec::new(),
            offset: 0,
            win_start: 0.0,
            win_end: 0.0,
            coherent: true,
            config,
            engine,
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.matrix.len()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Rows currently resident, i.e. the width of every `matrix` row.
    fn resident_len(&self) -> usize {
        self.matrix.first().map_or(0, Vec::len)
    }

    fn flush(&mut self) -> Result<()> {
        if self.offset >= self.times.len() {
            return Ok(());
        }
        if self.engine.is_some() {
            let count = self.resident_len();
            let resident_times: Vec<f64> = self.times[self.offset..self.offset + count].to_vec();
            let chunk = MdChunk::new(resident_times, std::mem::take(&mut self.matrix));
            self.engine
                .as_mut()
                .expect("checked above")
                .write(&chunk, &self.times, self.offset, count, self.coherent)?;
        } else {
            self.matrix.clear();
        }
        self.offset = self.times.len();
        self.win_start = 0.0;
        self.win_end = 0.0;
        debug!(offset = self.offset, "flushed resident md window");
        Ok(())
    }

    fn ensure_window_covers(&mut self, t: f64) -> Result<()> {
        if self.resident_len() > 0 && t >= self.win_start && t <= self.win_end {
            return Ok(());
        }
        if self.resident_len() > 0 && self.win_end == *self.times.last().unwrap_or(&f64::NAN) && t > self.win_end {
            return Ok(());
        }
        if self.engine.is_none() {
            return Ok(());
        }
        self.flush()?;
        let engine = self.engine.as_mut().expect("checked above");
        let (t_start, t_end, skip_count, chunk) = engine.read_range(t, t)?;
        if chunk.times.is_empty() {
            return Ok(());
        }
        self.offset = skip_count;
        self.matrix = chunk.matrix;
        self.win_start = t_start;
        self.win_end = t_end;
        self.coherent = true;
        Ok(())
    }

    fn maybe_cache(&mut self) -> Result<()> {
        if self.engine.is_none() {
            return Ok(());
        }
        let w = self.config.w;
        while self.resident_len() > 2 * w {
            let piece_times: Vec<f64> = self.times[self.offset..self.offset + w].to_vec();
            let piece_matrix: Vec<Vec<f64>> =
                self.matrix.iter_mut().map(|row| row.drain(0..w).collect()).collect();
            let chunk = MdChunk::new(piece_times, piece_matrix);
            self.engine
                .as_mut()
                .expect("checked above")
                .write(&chunk, &self.times, self.offset, w, self.coherent)?;
            self.offset += w;
            self.correct_window_boundary();
        }
        Ok(())
    }

    fn correct_window_boundary(&mut self) {
        let count = self.resident_len();
        if count == 0 {
            self.win_start = 0.0;
            self.win_end = 0.0;
            return;
        }
        self.win_start = self.times[self.offset];
        self.win_end = self.times[self.offset + count - 1];
    }

    fn mark_dirty(&mut self) {
        self.coherent = false;
    }

    /// Append one time point with `D` matrix values (one per dimension).
    pub fn push(&mut self, t: f64, column: &[f64]) -> Result<()> {
        if let Some(&last) = self.times.last() {
            if t <= last {
                return Err(CacheError::BadArgument("md series time points must be strictly increasing".into()));
            }
        }
        // a resident window loaded by a prior `column_at` reload may not
        // reach the tail; flush it so the append below can't clobber it.
        if self.offset + self.resident_len() != self.times.len() {
            self.flush()?;
        }
        if self.matrix.is_empty() && !column.is_empty() {
            self.matrix = vec![Vec::new(); column.len()];
        }
        if column.len() != self.matrix.len() {
            return Ok(());
        }
        self.times.push(t);
        for (row, &v) in self.matrix.iter_mut().zip(column) {
            row.push(v);
        }
        self.mark_dirty();
        self.correct_window_boundary();
        self.maybe_cache()?;
        Ok(())
    }

    /// Fetch the column at logical index `i`, reloading the window if needed.
    pub fn column_at(&mut self, i: usize) -> Result<Vec<f64>> {
        if i >= self.times.len() {
            return Ok(Vec::new());
        }
        let t = self.times[i];
        self.ensure_window_covers(t)?;
        if i < self.offset || i - self.offset >= self.resident_len() {
            return Ok(Vec::new());
        }
        let local = i - self.offset;
        Ok(self.matrix.iter().map(|row| row[local]).collect())
    }
}

//! Time-indexed dense series with interpolation, extrapolation, binary
//! insertion, and a sliding in-memory window over the [`CacheEngine`].

use tracing::debug;

use crate::codec::{DenseChunk, DenseCodec};
use crate::config::CacheConfig;
use crate::engine::CacheEngine;
use crate::error::{CacheError, Result};

/// A time-indexed dense series.
///
/// Owns the full logical time index (`times`) and the resident suffix of
/// rows (`data`, starting at logical index `offset`). Rows beyond the
/// resident window live on disk, tracked by a [`CacheEngine<DenseCodec>`].
pub struct Distribution {
    dims: usize,
    times: Vec<f64>,
    data: Vec<Vec<f64>>,
    offset: usize,
    win_start: f64,
    win_end: f64,
    coherent: bool,
    labels: Vec<String>,
    config: CacheConfig,
    engine: Option<CacheEngine<DenseCodec>>,
}

impl Distribution {
    /// Construct an empty distribution with `dims` columns per row.
    pub fn new(dims: usize, config: CacheConfig) -> Result<Self> {
        let config = config.validated();
        let engine = if config.enabled {
            Some(CacheEngine::new(&config.cache_path, "DD_", config.w)?)
        } else {
            None
        };
        Ok(Self {
            dims,
            times: Vec::new(),
            data: Vec::new(),
            offset: 0,
            win_start: 0.0,
            win_end: 0.0,
            coherent: true,
            labels: vec![String::new(); dims],
            config,
            engine,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn dimension_labels(&self) -> &[String] {
        &self.labels
    }

    pub fn set_dimension_label(&mut self, i: usize, name: impl Into<String>) {
        if let Some(slot) = self.labels.get_mut(i) {
            *slot = name.into();
        }
    }

    // -- window machinery -------------------------------------------------

    /// `Flush`: spill the resident buffer to the cache engine.
    ///
    /// Public so a caller can force the window to disk without waiting for
    /// the next out-of-window access (e.g. before closing the process, or
    /// in tests that assert on on-disk file sizes after a mutation).
    pub fn flush(&mut self) -> Result<()> {
        if self.offset >= self.times.len() {
            return Ok(());
        }
        if let Some(engine) = &mut self.engine {
            let chunk = DenseChunk::new(self.dims, std::mem::take(&mut self.data));
            engine.write(&chunk, &self.times, self.offset, chunk.rows.len(), self.coherent)?;
        } else {
            self.data.clear();
        }
        self.offset = self.times.len();
        self.win_start = 0.0;
        self.win_end = 0.0;
        debug!(offset = self.offset, "flushed resident window");
        Ok(())
    }

    /// `EnsureWindowCovers(t)`.
    fn ensure_window_covers(&mut self, t: f64) -> Result<()> {
        if !self.data.is_empty() && t >= self.win_start && t <= self.win_end {
            return Ok(());
        }
        if !self.data.is_empty() && self.win_end == *self.times.last().unwrap_or(&f64::NAN) && t > self.win_end {
            return Ok(());
        }
        if self.engine.is_none() {
            return Ok(());
        }
        self.flush()?;
        let engine = self.engine.as_mut().expect("checked above");
        let (t_start, t_end, skip_count, chunk) = engine.read_range(t, t)?;
        if chunk.rows.is_empty() {
            return Ok(());
        }
        self.data = chunk.rows;
        self.offset = skip_count;
        self.win_start = t_start;
        self.win_end = t_end;
        self.coherent = true;
        debug!(win_start = t_start, win_end = t_end, offset = skip_count, "reloaded window");
        Ok(())
    }

    /// `EnsureWindowCovers(t1, t2)`.
    fn ensure_window_covers_range(&mut self, t1: f64, t2: f64) -> Result<()> {
        let (t1, t2) = if t2 < t1 { (t2, t1) } else { (t1, t2) };
        if !self.data.is_empty() && t1 >= self.win_start && t2 <= self.win_end {
            return Ok(());
        }
        if self.engine.is_none() {
            return Ok(());
        }
        self.flush()?;
        let engine = self.engine.as_mut().expect("checked above");
        let (t_start, t_end, skip_count, chunk) = engine.read_range(t1, t2)?;
        if chunk.rows.is_empty() {
            return Ok(());
        }
        self.data = chunk.rows;
        self.offset = skip_count;
        self.win_start = t_start;
        self.win_end = t_end;
        self.coherent = true;
        Ok(())
    }

    /// `MaybeCache`: spill the oldest window once the buffer exceeds `2*W`.
    fn maybe_cache(&mut self) -> Result<()> {
        if self.engine.is_none() {
            // caching disabled: the resident buffer grows unbounded.
            return Ok(());
        }
        let w = self.config.w;
        while self.data.len() > 2 * w {
            let piece: Vec<Vec<f64>> = self.data.drain(0..w).collect();
            let chunk = DenseChunk::new(self.dims, piece);
            self.engine
                .as_mut()
                .expect("checked above")
                .write(&chunk, &self.times, self.offset, w, self.coherent)?;
            self.offset += w;
            self.correct_window_boundary();
        }
        Ok(())
    }

    /// `CorrectWindowBoundary`: reconcile window bounds to the resident rows.
    fn correct_window_boundary(&mut self) {
        if self.data.is_empty() {
            self.win_start = 0.0;
            self.win_end = 0.0;
            return;
        }
        self.win_start = self.times[self.offset];
        self.win_end = self.times[self.offset + self.data.len() - 1];
    }

    fn mark_dirty(&mut self) {
        self.coherent = false;
    }

    // -- lookups ------------------------------------------------------------

    /// Binary search over the full logical index.
    fn search(&self, t: f64) -> std::result::Result<usize, usize> {
        self.times
            .binary_search_by(|probe| probe.partial_cmp(&t).expect("time points are never NaN"))
    }

    /// Fetch row `i` (logical index), reloading the window if necessary.
    fn row_at(&mut self, i: usize) -> Result<Vec<f64>> {
        let t = self.times[i];
        self.ensure_window_covers(t)?;
        if i >= self.offset && i - self.offset < self.data.len() {
            return Ok(self.data[i - self.offset].clone());
        }
        Err(CacheError::BadArgument(format!("time point index {i} not resident after reload")))
    }

    // -- interpolated read ----------------------------------------------------

    /// `GetValue(t)`: full row, linearly interpolated or flat-extrapolated.
    pub fn get_value(&mut self, t: f64) -> Result<Vec<f64>> {
        if self.times.is_empty() {
            return Ok(vec![0.0; self.dims]);
        }
        if t <= self.times[0] {
            return self.row_at(0);
        }
        if t >= *self.times.last().unwrap() {
            return self.row_at(self.times.len() - 1);
        }
        match self.search(t) {
            Ok(i) => self.row_at(i),
            Err(i) => {
                let (i0, i1) = (i - 1, i);
                let (t0, t1) = (self.times[i0], self.times[i1]);
                let r0 = self.row_at(i0)?;
                let r1 = self.row_at(i1)?;
                let frac = (t - t0) / (t1 - t0);
                Ok(r0.iter().zip(&r1).map(|(a, b)| a + frac * (b - a)).collect())
            }
        }
    }

    /// `GetValue(t, dim)`: single column, same interpolation rule.
    pub fn get_value_dim(&mut self, t: f64, dim: usize) -> Result<f64> {
        if dim >= self.dims {
            return Ok(0.0);
        }
        Ok(self.get_value(t)?[dim])
    }

    // -- mutation -------------------------------------------------------------

    /// `AddTimePoint(t, src)`. `src = None` selects the predecessor/successor
    /// row per the insertion-position rule; `Some(t_src)` copies (possibly
    /// interpolated) the row at `t_src`.
    pub fn add_time_point(&mut self, t: f64, src: Option<f64>) -> Result<()> {
        if t < 0.0 {
            return Ok(());
        }
        if !t.is_finite() {
            return Err(CacheError::BadArgument("time point must be finite".into()));
        }
        if self.search(t).is_ok() {
            return Ok(());
        }

        let row = if let Some(src_t) = src {
            if self.times.is_empty() {
                vec![0.0; self.dims]
            } else {
                self.get_value(src_t)?
            }
        } else if self.times.is_empty() {
            vec![0.0; self.dims]
        } else {
            let i = self.search(t).unwrap_err();
            if i == 0 {
                self.row_at(0)?
            } else if i >= self.times.len() {
                self.row_at(self.times.len() - 1)?
            } else {
                self.row_at(i - 1)?
            }
        };

        self.insert_time_point(t, row)?;
        debug!(t, len = self.times.len(), "added time point");
        Ok(())
    }

    fn insert_time_point(&mut self, t: f64, row: Vec<f64>) -> Result<()> {
        self.ensure_window_covers(t)?;
        let i = self.search(t).unwrap_err();
        self.times.insert(i, t);
        if i < self.offset {
            // insertion point precedes the resident window: it lands in
            // cached territory, shift offset to keep the invariant intact.
            self.offset += 1;
        } else {
            let local = (i - self.offset).min(self.data.len());
            self.data.insert(local, row);
        }
        self.mark_dirty();
        self.correct_window_boundary();
        self.maybe_cache()?;
        Ok(())
    }

    /// `SetValue(t, dim, v)`.
    pub fn set_value(&mut self, t: f64, dim: usize, v: f64) -> Result<()> {
        if dim >= self.dims {
            return Ok(());
        }
        if self.search(t).is_err() {
            self.add_time_point(t, None)?;
        }
        // `t` may still be absent: `add_time_point` silently no-ops on bad input (e.g. negative `t`).
        let Ok(i) = self.search(t) else { return Ok(()) };
        self.ensure_window_covers(t)?;
        if i >= self.offset && i - self.offset < self.data.len() {
            self.data[i - self.offset][dim] = v;
            self.mark_dirty();
        }
        Ok(())
    }

    /// `SetValue(t, row)`.
    pub fn set_row(&mut self, t: f64, row: &[f64]) -> Result<()> {
        if row.len() != self.dims {
            return Ok(());
        }
        if self.search(t).is_err() {
            self.add_time_point(t, None)?;
        }
        let Ok(i) = self.search(t) else { return Ok(()) };
        self.ensure_window_covers(t)?;
        if i >= self.offset && i - self.offset < self.data.len() {
            self.data[i - self.offset] = row.to_vec();
            self.mark_dirty();
        }
        Ok(())
    }

    /// `RemoveTimePoint(t)`.
    pub fn remove_time_point(&mut self, t: f64) -> Result<()> {
        let Ok(i) = self.search(t) else { return Ok(()) };
        self.remove_index(i)
    }

    fn remove_index(&mut self, i: usize) -> Result<()> {
        self.ensure_window_covers(self.times[i])?;
        self.times.remove(i);
        if i >= self.offset {
            let local = i - self.offset;
            if local < self.data.len() {
                self.data.remove(local);
            }
        } else {
            self.offset = self.offset.saturating_sub(1);
        }
        self.mark_dirty();
        self.correct_window_boundary();
        Ok(())
    }

    /// `RemoveTimePoints(t1, t2)` inclusive.
    pub fn remove_time_points(&mut self, t1: f64, t2: f64) -> Result<()> {
        let (t1, t2) = if t2 < t1 { (t2, t1) } else { (t1, t2) };
        self.ensure_window_covers_range(t1, t2)?;
        let indices = self.get_indexes_for_interval(t1, t2);
        for i in indices.into_iter().rev() {
            self.remove_index(i)?;
        }
        Ok(())
    }

    /// `RemoveAllDataAfter(t, include_t)`.
    pub fn remove_all_data_after(&mut self, t: f64, include_t: bool) -> Result<()> {
        let cut = match self.search(t) {
            Ok(i) => {
                if include_t {
                    i
                } else {
                    i + 1
                }
            }
            Err(i) => i,
        };
        if cut >= self.times.len() {
            return Ok(());
        }
        let last_t = *self.times.last().unwrap();
        self.ensure_window_covers_range(self.times[cut], last_t)?;
        for i in (cut..self.times.len()).rev() {
            self.remove_index(i)?;
        }
        Ok(())
    }

    /// `ChangeTimePoint(index, new_t)`.
    pub fn change_time_point(&mut self, index: usize, new_t: f64) -> Result<()> {
        if index >= self.times.len() || !new_t.is_finite() {
            return Ok(());
        }
        let lower_ok = index == 0 || self.times[index - 1] < new_t;
        let upper_ok = index + 1 >= self.times.len() || new_t < self.times[index + 1];
        if !lower_ok || !upper_ok {
            return Ok(());
        }
        self.ensure_window_covers(self.times[index])?;
        self.times[index] = new_t;
        self.mark_dirty();
        self.correct_window_boundary();
        Ok(())
    }

    /// Indices of every logical time point within `[t1, t2]`.
    pub fn get_indexes_for_interval(&self, t1: f64, t2: f64) -> Vec<usize> {
        let (t1, t2) = if t2 < t1 { (t2, t1) } else { (t1, t2) };
        let lo = self.times.partition_point(|&x| x < t1);
        let hi = self.times.partition_point(|&x| x <= t2);
        (lo..hi).collect()
    }

    // -- extrapolation --------------------------------------------------------

    /// Linear extrapolation through `(t1, r1)` and `(t2, r2)`, stored at `t_extra`.
    pub fn extrapolate_to_point_linear(&mut self, t1: f64, t2: f64, t_extra: f64) -> Result<()> {
        let r1 = self.get_value(t1)?;
        let r2 = self.get_value(t2)?;
        if (t2 - t1).abs() < f64::EPSILON {
            return self.insert_computed_point(t_extra, r1);
        }
        let frac = (t_extra - t1) / (t2 - t1);
        let row: Vec<f64> = r1.iter().zip(&r2).map(|(a, b)| a + frac * (b - a)).collect();
        self.insert_computed_point(t_extra, row)
    }

    /// Quadratic extrapolation through three points (falls back to two-point
    /// or single-row replication as fewer points are available).
    pub fn extrapolate_to_point_quadratic(&mut self, t0: f64, t1: f64, t2: f64, t_extra: f64) -> Result<()> {
        if self.times.len() < 3 {
            if self.times.len() == 2 {
                return self.extrapolate_to_point_linear(t1, t2, t_extra);
            }
            if self.times.len() == 1 {
                let row = self.get_value(self.times[0])?;
                return self.insert_computed_point(t_extra, row);
            }
            return Ok(());
        }
        let r0 = self.get_value(t0)?;
        let r1 = self.get_value(t1)?;
        let r2 = self.get_value(t2)?;
        let mut row = vec![0.0; self.dims];
        for d in 0..self.dims {
            row[d] = lagrange_quadratic(t0, r0[d], t1, r1[d], t2, r2[d], t_extra);
        }
        self.insert_computed_point(t_extra, row)
    }

    fn insert_computed_point(&mut self, t: f64, row: Vec<f64>) -> Result<()> {
        if self.search(t).is_ok() {
            return Ok(());
        }
        self.insert_time_point(t, row)
    }

    // -- dimension management ---------------------------------------------------

    /// `SetDimensionsNumber(D)`: resize every resident row; `D = 0` clears
    /// the series entirely.
    pub fn set_dimensions_number(&mut self, d: usize) -> Result<()> {
        if d == 0 {
            self.times.clear();
            self.data.clear();
            self.offset = 0;
            self.win_start = 0.0;
            self.win_end = 0.0;
            self.dims = 0;
            self.labels.clear();
            if let Some(engine) = &self.engine {
                engine.clear_all()?;
            }
            return Ok(());
        }
        // every chunk already spilled to disk stores `dims` in its own header;
        // make the whole series resident first so none is left at the old width.
        self.load_all()?;
        for row in &mut self.data {
            resize_row(row, d);
        }
        self.labels.resize(d, String::new());
        self.dims = d;
        self.mark_dirty();
        Ok(())
    }

    /// Append a new, zero-initialized dimension.
    pub fn add_dimension(&mut self) -> Result<()> {
        self.load_all()?;
        for row in &mut self.data {
            row.push(0.0);
        }
        self.labels.push(String::new());
        self.dims += 1;
        self.mark_dirty();
        Ok(())
    }

    /// Remove dimension `i`, shifting later columns down.
    pub fn remove_dimension(&mut self, i: usize) -> Result<()> {
        if i >= self.dims {
            return Ok(());
        }
        self.load_all()?;
        for row in &mut self.data {
            row.remove(i);
        }
        self.labels.remove(i);
        self.dims -= 1;
        self.mark_dirty();
        Ok(())
    }

    /// Force the entire logical series resident, used before a full save.
    pub fn load_all(&mut self) -> Result<()> {
        if self.times.is_empty() {
            return Ok(());
        }
        self.ensure_window_covers_range(self.times[0], *self.times.last().unwrap())
    }
}

fn resize_row(row: &mut Vec<f64>, d: usize) {
    row.resize(d, 0.0);
}

/// Evaluate the unique parabola through `(x0,y0), (x1,y1), (x2,y2)` at `x`.
fn lagrange_quadratic(x0: f64, y0: f64, x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    let l0 = ((x - x1) * (x - x2)) / ((x0 - x1) * (x0 - x2));
    let l1 = ((x - x0) * (x - x2)) / ((x1 - x0) * (x1 - x2));
    let l2 = ((x - x0) * (x - x1)) / ((x2 - x0) * (x2 - x1));
    y0 * l0 + y1 * l1 + y2 * l2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_config() -> CacheConfig {
        CacheConfig { enabled: false, ..CacheConfig::default() }
    }

    #[test]
    fn interpolates_and_extrapolates_flat() {
        let mut d = Distribution::new(2, disabled_config()).unwrap();
        d.set_row(0.0, &[1.0, 10.0]).unwrap();
        d.set_row(1.0, &[2.0, 20.0]).unwrap();
        d.set_row(2.0, &[3.0, 30.0]).unwrap();

        assert_eq!(d.get_value(0.5).unwrap(), vec![1.5, 15.0]);
        assert_eq!(d.get_value(-1.0).unwrap(), vec![1.0, 10.0]);
        assert_eq!(d.get_value(5.0).unwrap(), vec![3.0, 30.0]);
    }

    #[test]
    fn add_time_point_is_idempotent() {
        let mut d = Distribution::new(1, disabled_config()).unwrap();
        d.set_row(0.0, &[1.0]).unwrap();
        d.add_time_point(0.0, None).unwrap();
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn add_time_point_rejects_negative_time() {
        let mut d = Distribution::new(1, disabled_config()).unwrap();
        d.set_row(0.0, &[1.0]).unwrap();
        d.add_time_point(-5.0, None).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d.times(), &[0.0]);
    }

    #[test]
    fn set_value_overwrites_single_cell() {
        let mut d = Distribution::new(2, disabled_config()).unwrap();
        d.set_row(0.0, &[1.0, 2.0]).unwrap();
        d.set_value(0.0, 1, 42.0).unwrap();
        assert_eq!(d.get_value_dim(0.0, 1).unwrap(), 42.0);
    }

    #[test]
    fn remove_range_drops_only_requested_points() {
        let mut d = Distribution::new(1, disabled_config()).unwrap();
        for i in 0..5 {
            d.set_row(f64::from(i), &[f64::from(i)]).unwrap();
        }
        d.remove_time_points(1.0, 3.0).unwrap();
        assert_eq!(d.times(), &[0.0, 4.0]);
    }

    #[test]
    fn set_dimensions_number_extends_with_zeros() {
        let mut d = Distribution::new(2, disabled_config()).unwrap();
        d.set_row(0.0, &[1.0, 2.0]).unwrap();
        d.set_dimensions_number(3).unwrap();
        assert_eq!(d.get_value(0.0).unwrap(), vec![1.0, 2.0, 0.0]);
    }

    #[test]
    fn quadratic_extrapolation_matches_parabola() {
        let mut d = Distribution::new(1, disabled_config()).unwrap();
        d.set_row(0.0, &[0.0]).unwrap();
        d.set_row(1.0, &[2.0]).unwrap();
        d.set_row(2.0, &[6.0]).unwrap();
        d.extrapolate_to_point_quadratic(0.0, 1.0, 2.0, 3.0).unwrap();
        assert_eq!(d.get_value(3.0).unwrap(), vec![12.0]);
    }

    #[test]
    fn sliding_window_bounds_resident_rows_when_caching_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig { enabled: true, w: 2, cache_path: dir.path().to_path_buf() };
        let mut d = Distribution::new(2, config).unwrap();
        for i in 0..7 {
            d.set_row(f64::from(i), &[f64::from(i), -f64::from(i)]).unwrap();
            assert!(d.data.len() <= 2 * d.config.w);
        }
        assert_eq!(d.get_value(3.0).unwrap(), vec![3.0, -3.0]);
        assert_eq!(d.get_value(6.0).unwrap(), vec![6.0, -6.0]);
    }

    #[test]
    fn flush_reload_round_trip_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig { enabled: true, w: 3, cache_path: dir.path().to_path_buf() };
        let mut d = Distribution::new(1, config).unwrap();
        for i in 0..20 {
            d.set_row(f64::from(i), &[f64::from(i)]).unwrap();
        }
        for i in 0..20 {
            assert_eq!(d.get_value(f64::from(i)).unwrap(), vec![f64::from(i)]);
        }
    }
}

//! In-memory ordered table of chunk descriptors.

use crate::types::Descriptor;

/// Tracks where every chunk of a series lives on disk.
///
/// Valid descriptors are kept ordered by `t_start`; invalid descriptors are
/// tombstones that mark a reusable file slot until `compact` drops them.
#[derive(Debug, Default)]
pub struct DescriptorTable {
    descriptors: Vec<Descriptor>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        self.descriptors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    /// Sum of `count` over every valid descriptor.
    pub fn valid_count_sum(&self) -> usize {
        self.descriptors.iter().filter(|d| d.valid).map(|d| d.count).sum()
    }

    /// Find the index range `(lo, hi)` of valid descriptors covering `t`.
    fn find_read_one(&self, t: f64) -> (usize, usize) {
        let n = self.descriptors.len();
        if n == 0 {
            return (0, 0);
        }
        let first = &self.descriptors[0];
        let last = &self.descriptors[n - 1];
        if t <= first.t_end {
            return (0, 0);
        }
        if t >= last.t_start {
            return (n - 1, n - 1);
        }
        for i in 0..n {
            let d = &self.descriptors[i];
            if t > d.t_start && t < d.t_end {
                return (i, i);
            }
            if i + 1 < n {
                let next = &self.descriptors[i + 1];
                if t >= d.t_end && t <= next.t_start {
                    return (i, i + 1);
                }
            }
        }
        (n - 1, n - 1)
    }

    /// `FindRead(t) -> (lo, hi)`.
    pub fn find_read(&self, t: f64) -> (usize, usize) {
        self.find_read_one(t)
    }

    /// `FindRead(t1, t2)`, locating each endpoint independently.
    pub fn find_read_range(&self, t1: f64, t2: f64) -> (usize, usize) {
        let (t1, t2) = if t2 < t1 { (t2, t1) } else { (t1, t2) };
        let (lo, _) = self.find_read_one(t1);
        let (_, hi) = self.find_read_one(t2);
        (lo, hi)
    }

    /// `FindWrite(t) -> (index, insert)`.
    pub fn find_write(&self, t: f64) -> (usize, bool) {
        if let Some(idx) = self.descriptors.iter().position(|d| !d.valid) {
            // reusing this tombstone in place is only safe if every descriptor
            // after it is also invalid; a still-valid descriptor further down
            // depends on this slot's current t_start ordering, so force a
            // structural insert instead of clobbering it.
            let insert = self.descriptors[idx + 1..].iter().any(|d| d.valid);
            return (idx, insert);
        }
        if let Some(last) = self.descriptors.last() {
            if t < last.t_start {
                if let Some(idx) = self.descriptors.iter().position(|d| d.t_start > t) {
                    return (idx, true);
                }
            }
        }
        (self.descriptors.len(), true)
    }

    /// Insert a new descriptor or overwrite the slot at `index`.
    pub fn put(&mut self, index: usize, insert: bool, descriptor: Descriptor) {
        if insert || index >= self.descriptors.len() {
            self.descriptors.insert(index.min(self.descriptors.len()), descriptor);
        } else {
            self.descriptors[index] = descriptor;
        }
    }

    /// Mark descriptors in `[lo, hi]` invalid without removing them.
    pub fn invalidate(&mut self, lo: usize, hi: usize) {
        for d in &mut self.descriptors[lo..=hi] {
            d.valid = false;
        }
    }

    /// Flip a single descriptor back to valid without touching its data.
    pub fn validate(&mut self, index: usize) {
        if let Some(d) = self.descriptors.get_mut(index) {
            d.valid = true;
        }
    }

    /// Drop trailing invalid descriptors starting at `from`.
    pub fn truncate_from(&mut self, from: usize) {
        self.descriptors.truncate(from);
    }

    /// Erase every invalid descriptor at or beyond `from`, preserving order.
    pub fn compact_from(&mut self, from: usize) {
        self.descriptors.truncate(from.min(self.descriptors.len()));
    }

    /// Drop invalid descriptors from the tail, stopping at the first valid one.
    pub fn trim_trailing_invalid(&mut self) {
        while matches!(self.descriptors.last(), Some(d) if !d.valid) {
            self.descriptors.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(file: usize, count: usize, t_start: f64, t_end: f64, offset: u64) -> Descriptor {
        Descriptor::new(file, count, t_start, t_end, offset)
    }

    #[test]
    fn find_read_before_first_chunk() {
        let mut t = DescriptorTable::new();
        t.put(0, true, d(0, 10, 5.0, 10.0, 0));
        assert_eq!(t.find_read(1.0), (0, 0));
    }

    #[test]
    fn find_read_after_last_chunk() {
        let mut t = DescriptorTable::new();
        t.put(0, true, d(0, 10, 5.0, 10.0, 0));
        assert_eq!(t.find_read(20.0), (0, 0));
    }

    #[test]
    fn find_read_in_gap_spans_both_neighbors() {
        let mut t = DescriptorTable::new();
        t.put(0, true, d(0, 10, 0.0, 5.0, 0));
        t.put(1, true, d(0, 10, 10.0, 15.0, 800));
        assert_eq!(t.find_read(7.0), (0, 1));
    }

    #[test]
    fn find_write_reuses_a_trailing_invalid_slot() {
        let mut t = DescriptorTable::new();
        t.put(0, true, d(0, 10, 0.0, 5.0, 0));
        t.put(1, true, d(0, 10, 10.0, 15.0, 800));
        t.invalidate(1, 1);
        assert_eq!(t.find_write(1.0), (1, false));
    }

    #[test]
    fn find_write_forces_insert_when_a_later_descriptor_is_still_valid() {
        let mut t = DescriptorTable::new();
        t.put(0, true, d(0, 10, 0.0, 5.0, 0));
        t.invalidate(0, 0);
        t.put(1, true, d(0, 10, 10.0, 15.0, 800));
        assert_eq!(t.find_write(1.0), (0, true));
    }

    #[test]
    fn find_write_appends_when_no_invalid_slot_and_no_predecessor() {
        let mut t = DescriptorTable::new();
        t.put(0, true, d(0, 10, 0.0, 5.0, 0));
        let (idx, insert) = t.find_write(100.0);
        assert_eq!((idx, insert), (1, true));
    }
}

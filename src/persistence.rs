//! Dump/restore bridge to an external hierarchical key/value store.
//!
//! The original engine talks to an HDF5-like file handle; that dependency
//! is out of scope (see the purpose section of the specification this
//! crate implements), so it is modeled here as a narrow trait the crate
//! owns, the way the teacher keeps CDN and manifest backends behind traits
//! it controls rather than depending on them directly.

use tracing::info;

use crate::distribution::Distribution;
use crate::error::{CacheError, Result};

/// The save-format version written by [`save`] and checked by [`load`].
pub const SAVE_VERSION: u32 = 1;

/// Narrow surface this crate needs from an external hierarchical store
/// (HDF5, a zip-backed archive, a key/value database — anything that can
/// hold named attributes and datasets under a path).
pub trait HierarchicalStore {
    /// Write an unsigned attribute at `path/name`.
    fn write_attr_u32(&mut self, path: &str, name: &str, value: u32) -> Result<()>;
    /// Read an unsigned attribute at `path/name`.
    fn read_attr_u32(&self, path: &str, name: &str) -> Result<u32>;
    /// Write a double vector dataset at `path/name`.
    fn write_dataset_vec(&mut self, path: &str, name: &str, values: &[f64]) -> Result<()>;
    /// Read a double vector dataset at `path/name`.
    fn read_dataset_vec(&self, path: &str, name: &str) -> Result<Vec<f64>>;
    /// Write a double matrix dataset (row-major) at `path/name`.
    fn write_dataset_matrix(&mut self, path: &str, name: &str, rows: &[Vec<f64>]) -> Result<()>;
    /// Read a double matrix dataset at `path/name`.
    fn read_dataset_matrix(&self, path: &str, name: &str) -> Result<Vec<Vec<f64>>>;
}

/// Save `dist` to `store` under `path`.
///
/// Forces the entire series resident first so the saved data is contiguous,
/// then writes `SaveVersion`, `DimensionsNumber`, `TimePoints`, and `Data`.
/// As a compression optimization, if every row is identical only one row is
/// written; `load` re-expands it to match `TimePoints`.
pub fn save(dist: &mut Distribution, store: &mut impl HierarchicalStore, path: &str) -> Result<()> {
    dist.load_all()?;

    let times = dist.times().to_vec();
    let mut rows = Vec::with_capacity(times.len());
    for &t in &times {
        rows.push(dist.get_value(t)?);
    }

    let collapsed = if rows.len() > 1 && rows.windows(2).all(|w| w[0] == w[1]) {
        rows.first().cloned().into_iter().collect::<Vec<_>>()
    } else {
        rows
    };

    store.write_attr_u32(path, "SaveVersion", SAVE_VERSION)?;
    store.write_attr_u32(path, "DimensionsNumber", dist.dims() as u32)?;
    store.write_dataset_vec(path, "TimePoints", &times)?;
    store.write_dataset_matrix(path, "Data", &collapsed)?;

    info!(path, points = times.len(), dims = dist.dims(), "saved distribution to hierarchical store");
    Ok(())
}

/// Load a distribution from `store` at `path`, using `config` for the
/// reconstructed cache engine.
pub fn load(
    store: &impl HierarchicalStore,
    path: &str,
    config: crate::config::CacheConfig,
) -> Result<Distribution> {
    let version = store.read_attr_u32(path, "SaveVersion")?;
    if version != SAVE_VERSION {
        return Err(CacheError::BadArgument(format!(
            "unsupported save version {version}, expected {SAVE_VERSION}"
        )));
    }
    let dims = store.read_attr_u32(path, "DimensionsNumber")? as usize;
    let times = store.read_dataset_vec(path, "TimePoints")?;
    let mut data = store.read_dataset_matrix(path, "Data")?;

    if data.len() == 1 && times.len() > 1 {
        let row = data.pop().unwrap();
        data = vec![row; times.len()];
    }

    let mut dist = Distribution::new(dims, config)?;
    for (t, row) in times.iter().zip(data.iter()) {
        dist.set_row(*t, row)?;
    }

    info!(path, points = times.len(), dims, "loaded distribution from hierarchical store");
    Ok(dist)
}

/// In-memory [`HierarchicalStore`] used by tests and the persistence demo
/// in lieu of a real HDF5 binding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    attrs_u32: std::collections::HashMap<(String, String), u32>,
    vectors: std::collections::HashMap<(String, String), Vec<f64>>,
    matrices: std::collections::HashMap<(String, String), Vec<Vec<f64>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &str, name: &str) -> (String, String) {
        (path.to_string(), name.to_string())
    }
}

impl HierarchicalStore for MemoryStore {
    fn write_attr_u32(&mut self, path: &str, name: &str, value: u32) -> Result<()> {
        self.attrs_u32.insert(Self::key(path, name), value);
        Ok(())
    }

    fn read_attr_u32(&self, path: &str, name: &str) -> Result<u32> {
        self.attrs_u32
            .get(&Self::key(path, name))
            .copied()
            .ok_or_else(|| CacheError::BadArgument(format!("missing attribute {path}/{name}")))
    }

    fn write_dataset_vec(&mut self, path: &str, name: &str, values: &[f64]) -> Result<()> {
        self.vectors.insert(Self::key(path, name), values.to_vec());
        Ok(())
    }

    fn read_dataset_vec(&self, path: &str, name: &str) -> Result<Vec<f64>> {
        self.vectors
            .get(&Self::key(path, name))
            .cloned()
            .ok_or_else(|| CacheError::BadArgument(format!("missing dataset {path}/{name}")))
    }

    fn write_dataset_matrix(&mut self, path: &str, name: &str, rows: &[Vec<f64>]) -> Result<()> {
        self.matrices.insert(Self::key(path, name), rows.to_vec());
        Ok(())
    }

    fn read_dataset_matrix(&self, path: &str, name: &str) -> Result<Vec<Vec<f64>>> {
        self.matrices
            .get(&Self::key(path, name))
            .cloned()
            .ok_or_else(|| CacheError::BadArgument(format!("missing dataset {path}/{name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn disabled_config() -> CacheConfig {
        CacheConfig { enabled: false, ..CacheConfig::default() }
    }

    #[test]
    fn round_trips_through_memory_store() {
        let mut dist = Distribution::new(2, disabled_config()).unwrap();
        dist.set_row(0.0, &[1.0, 2.0]).unwrap();
        dist.set_row(1.0, &[3.0, 4.0]).unwrap();
        dist.set_row(2.0, &[5.0, 6.0]).unwrap();

        let mut store = MemoryStore::new();
        save(&mut dist, &mut store, "/series/a").unwrap();

        let mut reloaded = load(&store, "/series/a", disabled_config()).unwrap();
        assert_eq!(reloaded.times(), dist.times());
        for &t in reloaded.times().to_vec().iter() {
            assert_eq!(reloaded.get_value(t).unwrap(), dist.get_value(t).unwrap());
        }
    }

    #[test]
    fn identical_rows_are_collapsed_and_re_expanded() {
        let mut dist = Distribution::new(1, disabled_config()).unwrap();
        dist.set_row(0.0, &[9.0]).unwrap();
        dist.set_row(1.0, &[9.0]).unwrap();
        dist.set_row(2.0, &[9.0]).unwrap();

        let mut store = MemoryStore::new();
        save(&mut dist, &mut store, "/series/b").unwrap();
        assert_eq!(store.read_dataset_matrix("/series/b", "Data").unwrap().len(), 1);

        let mut reloaded = load(&store, "/series/b", disabled_config()).unwrap();
        assert_eq!(reloaded.get_value(1.0).unwrap(), vec![9.0]);
    }

    #[test]
    fn rejects_unsupported_save_version() {
        let mut store = MemoryStore::new();
        store.write_attr_u32("/x", "SaveVersion", 999).unwrap();
        store.write_attr_u32("/x", "DimensionsNumber", 1).unwrap();
        store.write_dataset_vec("/x", "TimePoints", &[0.0]).unwrap();
        store.write_dataset_matrix("/x", "Data", &[vec![1.0]]).unwrap();
        assert!(load(&store, "/x", disabled_config()).is_err());
    }
}

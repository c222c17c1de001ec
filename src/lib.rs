//! Time-indexed out-of-core cache for dense numerical time-series data.
//!
//! A running flowsheet simulation holds a window of recent values in
//! memory and spills older chunks to disk; it reads them back when a
//! solver requests values inside or outside the current window. The
//! in-memory footprint stays bounded to a configurable number of time
//! points while the logical series grows arbitrarily large.
//!
//! [`distribution::Distribution`] is the main entry point: a dense,
//! interpolated time series. [`md_series::MdSeries`] is its variable-width
//! sibling for unit models whose output dimensionality isn't fixed ahead
//! of time. Both ride on the generic [`engine::CacheEngine`], which is
//! parameterized over a [`codec::ChunkCodec`] (dense or MD) and backed by
//! a [`fileset::CacheFileSet`] of capped blob files indexed by an
//! in-memory [`descriptors::DescriptorTable`].

pub mod codec;
pub mod config;
pub mod descriptors;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod fileset;
pub mod md_series;
pub mod persistence;
pub mod types;

pub use config::CacheConfig;
pub use distribution::Distribution;
pub use error::{CacheError, Result};
pub use md_series::MdSeries;
pub use persistence::{HierarchicalStore, MemoryStore};
pub use types::{Descriptor, MAX_FILE_SIZE};

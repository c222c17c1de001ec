//! Wire formats for chunk bodies stored by the cache engine.

mod dense;
mod md;

pub use dense::{DenseChunk, DenseCodec};
pub use md::{MdChunk, MdCodec};

use std::io::{Read, Write};

use crate::error::Result;

/// Capability required by `CacheEngine` to serialize and deserialize chunks.
///
/// Dense and MD are two concrete implementations; there is no inheritance,
/// only this shared capability.
pub trait ChunkCodec {
    /// In-memory representation of one chunk's worth of rows/time-points.
    type Chunk: Default;

    /// Row/time-point count represented by `chunk`.
    fn chunk_len(chunk: &Self::Chunk) -> usize;

    /// Serialize `chunk` onto `w`.
    fn write<W: Write>(w: &mut W, chunk: &Self::Chunk) -> Result<()>;

    /// Deserialize one chunk from `r`.
    fn read<R: Read>(r: &mut R) -> Result<Self::Chunk>;

    /// Extract rows `[start, start+len)` of `chunk` as a standalone chunk.
    fn slice(chunk: &Self::Chunk, start: usize, len: usize) -> Self::Chunk;

    /// Append `more` onto the end of `sink`, in order.
    fn extend(sink: &mut Self::Chunk, more: Self::Chunk);

    /// Whether a chunk of `new_len` rows can reuse an invalid slot that
    /// previously held `existing_count` rows, given the engine's configured
    /// `chunk_size`.
    ///
    /// Dense chunks are always allocated at up to `chunk_size` rows, so any
    /// slot fits a replacement of up to `chunk_size` rows. MD rows vary in
    /// width, so reuse is restricted to payloads no larger than what the
    /// slot already held.
    fn fits_in_place(existing_count: usize, chunk_size: usize, new_len: usize) -> bool;
}

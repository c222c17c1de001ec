//! Fixed-width `N x D` block of doubles.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::ChunkCodec;
use crate::error::{CacheError, Result};

/// A fixed-width run of rows, all of dimension `dims`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DenseChunk {
    pub dims: usize,
    pub rows: Vec<Vec<f64>>,
}

impl DenseChunk {
    pub fn new(dims: usize, rows: Vec<Vec<f64>>) -> Self {
        Self { dims, rows }
    }
}

/// Codec for [`DenseChunk`]: `uint D, uint N, double[N*D]` little-endian.
pub struct DenseCodec;

impl ChunkCodec for DenseCodec {
    type Chunk = DenseChunk;

    fn chunk_len(chunk: &Self::Chunk) -> usize {
        chunk.rows.len()
    }

    fn write<W: Write>(w: &mut W, chunk: &Self::Chunk) -> Result<()> {
        w.write_u32::<LittleEndian>(chunk.dims as u32)?;
        w.write_u32::<LittleEndian>(chunk.rows.len() as u32)?;
        for row in &chunk.rows {
            for &v in row {
                w.write_f64::<LittleEndian>(v)?;
            }
        }
        Ok(())
    }

    fn read<R: Read>(r: &mut R) -> Result<Self::Chunk> {
        let dims = r.read_u32::<LittleEndian>()? as usize;
        let n = r.read_u32::<LittleEndian>()? as usize;
        let mut rows = Vec::with_capacity(n);
        for _ in 0..n {
            let mut row = Vec::with_capacity(dims);
            for _ in 0..dims {
                row.push(r.read_f64::<LittleEndian>()?);
            }
            rows.push(row);
        }
        Ok(DenseChunk { dims, rows })
    }

    fn slice(chunk: &Self::Chunk, start: usize, len: usize) -> Self::Chunk {
        DenseChunk {
            dims: chunk.dims,
            rows: chunk.rows[start..start + len].to_vec(),
        }
    }

    fn extend(sink: &mut Self::Chunk, more: Self::Chunk) {
        if sink.dims == 0 {
            sink.dims = more.dims;
        }
        sink.rows.extend(more.rows);
    }

    fn fits_in_place(_existing_count: usize, chunk_size: usize, new_len: usize) -> bool {
        new_len <= chunk_size
    }
}

/// Bad-argument guard used by callers that validate row width before encoding.
pub fn check_row_width(dims: usize, row: &[f64]) -> Result<()> {
    if row.len() != dims {
        return Err(CacheError::BadArgument(format!(
            "row width {} does not match series dimension {dims}",
            row.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let chunk = DenseChunk::new(2, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let mut buf = Vec::new();
        DenseCodec::write(&mut buf, &chunk).unwrap();
        let decoded = DenseCodec::read(&mut &buf[..]).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn empty_chunk_writes_header_only() {
        let chunk = DenseChunk::new(3, vec![]);
        let mut buf = Vec::new();
        DenseCodec::write(&mut buf, &chunk).unwrap();
        assert_eq!(buf.len(), 8);
    }
}

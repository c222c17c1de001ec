//! Variable-width time vector plus `D x N` data matrix.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::ChunkCodec;
use crate::error::Result;

/// A time vector of length `N` plus a matrix of `D` rows, each of length `N`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdChunk {
    pub times: Vec<f64>,
    pub matrix: Vec<Vec<f64>>,
}

impl MdChunk {
    pub fn new(times: Vec<f64>, matrix: Vec<Vec<f64>>) -> Self {
        Self { times, matrix }
    }

    pub fn dims(&self) -> usize {
        self.matrix.len()
    }
}

/// Codec for [`MdChunk`]: `uint N, uint D, double[N] times, double[D*N] matrix`.
pub struct MdCodec;

impl ChunkCodec for MdCodec {
    type Chunk = MdChunk;

    fn chunk_len(chunk: &Self::Chunk) -> usize {
        chunk.times.len()
    }

    fn write<W: Write>(w: &mut W, chunk: &Self::Chunk) -> Result<()> {
        let n = chunk.times.len();
        let d = chunk.matrix.len();
        w.write_u32::<LittleEndian>(n as u32)?;
        w.write_u32::<LittleEndian>(d as u32)?;
        for &t in &chunk.times {
            w.write_f64::<LittleEndian>(t)?;
        }
        for row in &chunk.matrix {
            for &v in row {
                w.write_f64::<LittleEndian>(v)?;
            }
        }
        Ok(())
    }

    fn read<R: Read>(r: &mut R) -> Result<Self::Chunk> {
        let n = r.read_u32::<LittleEndian>()? as usize;
        let d = r.read_u32::<LittleEndian>()? as usize;
        let mut times = Vec::with_capacity(n);
        for _ in 0..n {
            times.push(r.read_f64::<LittleEndian>()?);
        }
        let mut matrix = Vec::with_capacity(d);
        for _ in 0..d {
            let mut row = Vec::with_capacity(n);
            for _ in 0..n {
                row.push(r.read_f64::<LittleEndian>()?);
            }
            matrix.push(row);
        }
        Ok(MdChunk { times, matrix })
    }

    fn slice(chunk: &Self::Chunk, start: usize, len: usize) -> Self::Chunk {
        MdChunk {
            times: chunk.times[start..start + len].to_vec(),
            matrix: chunk
                .matrix
                .iter()
                .map(|row| row[start..start + len].to_vec())
                .collect(),
        }
    }

    fn extend(sink: &mut Self::Chunk, more: Self::Chunk) {
        let old_len = sink.times.len();
        let more_len = more.times.len();
        let more_dims = more.matrix.len();
        sink.times.extend(more.times);

        if sink.matrix.len() < more_dims {
            sink.matrix.resize_with(more_dims, || vec![0.0; old_len]);
        }
        for (i, row) in sink.matrix.iter_mut().enumerate() {
            if i < more_dims {
                row.extend(more.matrix[i].iter().copied());
            } else {
                row.extend(std::iter::repeat(0.0).take(more_len));
            }
        }
    }

    fn fits_in_place(existing_count: usize, _chunk_size: usize, new_len: usize) -> bool {
        // Stricter than the dense case, per the original's `_nSize >
        // m_descriptors[_nIndex].descriptorNumber` guard: reproduced as
        // written rather than loosened to match dense's chunk_size bound.
        new_len <= existing_count
    }
}

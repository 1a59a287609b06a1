//! `vectors.bin`: a fixed-width row file.
//!
//! Layout: `b"QDV1"`, `u32 LE dims`, `u64 LE row count`, then per row
//! `u64 LE record id` followed by `dims` little-endian `f32`s. The row count
//! is patched in when the writer finishes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use quarry_core::errors::QuarryResult;
use quarry_core::models::RecordId;

use crate::{corrupt, io_err};

pub const VECTORS_FILE: &str = "vectors.bin";

const MAGIC: &[u8; 4] = b"QDV1";
const HEADER_LEN: u64 = 16;
const COUNT_OFFSET: u64 = 8;

fn row_len(dims: usize) -> u64 {
    8 + 4 * dims as u64
}

pub struct VectorFileWriter {
    path: PathBuf,
    out: BufWriter<File>,
    dims: usize,
    count: u64,
}

impl VectorFileWriter {
    pub fn create(path: &Path, dims: usize) -> QuarryResult<Self> {
        let file = File::create(path).map_err(|e| io_err(path, e))?;
        let mut out = BufWriter::new(file);
        let mut header = Vec::with_capacity(HEADER_LEN as usize);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&(dims as u32).to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes());
        out.write_all(&header).map_err(|e| io_err(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            out,
            dims,
            count: 0,
        })
    }

    pub fn push(&mut self, id: RecordId, vector: &[f32]) -> QuarryResult<()> {
        debug_assert_eq!(vector.len(), self.dims);
        let mut row = Vec::with_capacity(row_len(self.dims) as usize);
        row.extend_from_slice(&id.to_le_bytes());
        for x in vector {
            row.extend_from_slice(&x.to_le_bytes());
        }
        self.out.write_all(&row).map_err(|e| io_err(&self.path, e))?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Flush, patch the row count and sync. Returns the row count.
    pub fn finish(self) -> QuarryResult<u64> {
        let path = self.path;
        let mut file = self.out.into_inner().map_err(|e| io_err(&path, e.into_error()))?;
        file.seek(SeekFrom::Start(COUNT_OFFSET)).map_err(|e| io_err(&path, e))?;
        file.write_all(&self.count.to_le_bytes()).map_err(|e| io_err(&path, e))?;
        file.sync_all().map_err(|e| io_err(&path, e))?;
        Ok(self.count)
    }
}

/// Sequential row reader.
pub struct VectorFileReader {
    path: PathBuf,
    input: BufReader<File>,
    dims: usize,
    count: u64,
    read: u64,
}

impl VectorFileReader {
    /// Open and validate the header against the file size and, if given,
    /// the expected dimensionality.
    pub fn open(path: &Path, expected_dims: Option<usize>) -> QuarryResult<Self> {
        let file = File::open(path).map_err(|_| corrupt(path, "vector file missing"))?;
        let file_len = file.metadata().map_err(|e| io_err(path, e))?.len();
        let mut input = BufReader::new(file);

        let mut header = [0u8; HEADER_LEN as usize];
        input
            .read_exact(&mut header)
            .map_err(|_| corrupt(path, "vector file header truncated"))?;
        if &header[..4] != MAGIC {
            return Err(corrupt(path, "bad vector file magic"));
        }
        let dims = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header[8..16]);
        let count = u64::from_le_bytes(count_bytes);

        if let Some(expected) = expected_dims {
            if dims != expected {
                return Err(corrupt(
                    path,
                    format!("vector file has {dims} dimensions, manifest says {expected}"),
                ));
            }
        }
        let expected_len = count
            .checked_mul(row_len(dims))
            .and_then(|body| body.checked_add(HEADER_LEN))
            .ok_or_else(|| corrupt(path, format!("row count {count} overflows the file size")))?;
        if file_len != expected_len {
            return Err(corrupt(
                path,
                format!("vector file is {file_len} bytes for {count} rows of {dims} dims"),
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
            input,
            dims,
            count,
            read: 0,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Read the next row into `buf` (resized to `dims`).
    pub fn next_row(&mut self, buf: &mut Vec<f32>) -> QuarryResult<Option<RecordId>> {
        if self.read == self.count {
            return Ok(None);
        }
        let mut raw = vec![0u8; row_len(self.dims) as usize];
        self.input
            .read_exact(&mut raw)
            .map_err(|_| corrupt(&self.path, format!("row {} truncated", self.read)))?;
        let mut id_bytes = [0u8; 8];
        id_bytes.copy_from_slice(&raw[..8]);
        buf.clear();
        buf.extend(
            raw[8..]
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
        );
        self.read += 1;
        Ok(Some(u64::from_le_bytes(id_bytes)))
    }
}

/// All rows of a vector file in memory, row-major.
#[derive(Debug, Clone, Default)]
pub struct VectorRows {
    dims: usize,
    ids: Vec<RecordId>,
    data: Vec<f32>,
}

impl VectorRows {
    pub fn load(path: &Path, dims: usize) -> QuarryResult<Self> {
        let mut reader = VectorFileReader::open(path, Some(dims))?;
        let count = reader.count() as usize;
        let mut ids = Vec::with_capacity(count);
        let mut data = Vec::with_capacity(count * dims);
        let mut buf = Vec::with_capacity(dims);
        while let Some(id) = reader.next_row(&mut buf)? {
            ids.push(id);
            data.extend_from_slice(&buf);
        }
        Ok(Self { dims, ids, data })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn id(&self, row: usize) -> RecordId {
        self.ids[row]
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.dims..(row + 1) * self.dims]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_written_are_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(VECTORS_FILE);
        let mut writer = VectorFileWriter::create(&path, 3).unwrap();
        writer.push(10, &[1.0, 2.0, 3.0]).unwrap();
        writer.push(11, &[-1.0, 0.5, 0.0]).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let rows = VectorRows::load(&path, 3).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.id(1), 11);
        assert_eq!(rows.row(0), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn dimension_disagreement_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(VECTORS_FILE);
        VectorFileWriter::create(&path, 4).unwrap().finish().unwrap();
        assert!(VectorRows::load(&path, 4).unwrap().is_empty());
        assert!(VectorRows::load(&path, 8).is_err());
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(VECTORS_FILE);
        let mut writer = VectorFileWriter::create(&path, 2).unwrap();
        writer.push(1, &[1.0, 1.0]).unwrap();
        writer.finish().unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        assert!(VectorRows::load(&path, 2).is_err());
    }

    #[test]
    fn oversized_row_count_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(VECTORS_FILE);
        let mut writer = VectorFileWriter::create(&path, 2).unwrap();
        writer.push(1, &[1.0, 1.0]).unwrap();
        writer.finish().unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            VectorFileReader::open(&path, Some(2)),
            Err(quarry_core::errors::QuarryError::CorruptIndex { .. })
        ));
    }
}

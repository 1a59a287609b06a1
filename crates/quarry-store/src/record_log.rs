//! Framed append-only record log.
//!
//! Frame layout: `[u32 LE payload length][payload JSON][u64 LE checksum]`,
//! where the checksum is the first eight bytes of the payload's blake3 hash.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use quarry_core::errors::{QuarryResult, StorageError};
use quarry_core::models::Record;

use crate::io_err;

pub const HEADER_LEN: u64 = 4;
pub const TRAILER_LEN: u64 = 8;

/// Payload checksum stored in the frame trailer.
pub fn checksum(payload: &[u8]) -> u64 {
    let hash = blake3::hash(payload);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

/// Serialize a record into a complete frame.
pub fn encode_frame(record: &Record) -> QuarryResult<Vec<u8>> {
    let payload = serde_json::to_vec(record)?;
    let len = u32::try_from(payload.len()).map_err(|_| StorageError::CorruptLog {
        offset: 0,
        details: format!("record {} payload exceeds u32 frame length", record.id),
    })?;
    let mut frame = Vec::with_capacity(payload.len() + (HEADER_LEN + TRAILER_LEN) as usize);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&checksum(&payload).to_le_bytes());
    Ok(frame)
}

/// Validate and decode a complete frame that starts at `offset`.
pub fn decode_frame(offset: u64, frame: &[u8]) -> QuarryResult<Record> {
    let corrupt = |details: String| StorageError::CorruptLog { offset, details };

    let overhead = (HEADER_LEN + TRAILER_LEN) as usize;
    if frame.len() < overhead {
        return Err(corrupt(format!("frame of {} bytes is too short", frame.len())).into());
    }
    let mut header = [0u8; 4];
    header.copy_from_slice(&frame[..4]);
    let payload_len = u32::from_le_bytes(header) as usize;
    if payload_len + overhead != frame.len() {
        return Err(corrupt(format!(
            "header length {payload_len} disagrees with frame length {}",
            frame.len()
        ))
        .into());
    }

    let payload = &frame[4..4 + payload_len];
    let mut trailer = [0u8; 8];
    trailer.copy_from_slice(&frame[4 + payload_len..]);
    if u64::from_le_bytes(trailer) != checksum(payload) {
        return Err(corrupt("checksum mismatch".to_string()).into());
    }

    serde_json::from_slice(payload)
        .map_err(|e| corrupt(format!("unparsable payload: {e}")).into())
}

/// Read and decode the frame at `offset` spanning `length` bytes.
pub fn read_frame(file: &mut File, path: &Path, offset: u64, length: u64) -> QuarryResult<Record> {
    let mut frame = vec![0u8; length as usize];
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| io_err(path, e))?;
    file.read_exact(&mut frame).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => StorageError::CorruptLog {
            offset,
            details: format!("frame of {length} bytes runs past end of log"),
        }
        .into(),
        _ => io_err(path, e),
    })?;
    decode_frame(offset, &frame)
}

/// Outcome of reading the next frame during a sequential pass.
#[derive(Debug)]
pub enum FrameRead {
    Frame { record: Record, length: u64 },
    /// The bytes at this offset do not form a valid frame.
    Torn { reason: String },
    End,
}

/// Read the frame starting at `offset`, treating anything short of a valid
/// frame as torn rather than failing.
pub fn read_next(file: &mut File, path: &Path, offset: u64, file_len: u64) -> QuarryResult<FrameRead> {
    if offset >= file_len {
        return Ok(FrameRead::End);
    }
    if file_len - offset < HEADER_LEN {
        return Ok(FrameRead::Torn {
            reason: "truncated header".to_string(),
        });
    }

    let mut header = [0u8; 4];
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| io_err(path, e))?;
    file.read_exact(&mut header).map_err(|e| io_err(path, e))?;
    let total = HEADER_LEN + u64::from(u32::from_le_bytes(header)) + TRAILER_LEN;
    if offset + total > file_len {
        return Ok(FrameRead::Torn {
            reason: format!("frame of {total} bytes runs past end of log"),
        });
    }

    let mut frame = vec![0u8; total as usize];
    frame[..4].copy_from_slice(&header);
    file.read_exact(&mut frame[4..]).map_err(|e| io_err(path, e))?;
    match decode_frame(offset, &frame) {
        Ok(record) => Ok(FrameRead::Frame {
            record,
            length: total,
        }),
        Err(e) => Ok(FrameRead::Torn {
            reason: e.to_string(),
        }),
    }
}

/// The single appender. Tracks the logical end of the log.
pub struct LogWriter {
    path: PathBuf,
    file: File,
    end: u64,
    sync: bool,
}

impl LogWriter {
    pub fn open(path: &Path, sync: bool) -> QuarryResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        let end = file.metadata().map_err(|e| io_err(path, e))?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            end,
            sync,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Append pre-encoded frames. Returns the offset of the first byte.
    pub fn append(&mut self, bytes: &[u8]) -> QuarryResult<u64> {
        let start = self.end;
        self.file
            .seek(SeekFrom::Start(start))
            .map_err(|e| io_err(&self.path, e))?;
        self.file
            .write_all(bytes)
            .and_then(|_| self.file.flush())
            .map_err(|e| io_err(&self.path, e))?;
        if self.sync {
            self.file.sync_data().map_err(|e| io_err(&self.path, e))?;
        }
        self.end = start + bytes.len() as u64;
        Ok(start)
    }

    /// Cut the log back to `len` bytes.
    pub fn truncate(&mut self, len: u64) -> QuarryResult<()> {
        self.file.set_len(len).map_err(|e| io_err(&self.path, e))?;
        self.file.sync_all().map_err(|e| io_err(&self.path, e))?;
        self.end = len;
        Ok(())
    }
}

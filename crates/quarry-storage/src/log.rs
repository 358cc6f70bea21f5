//! Quarry Log Store - Append-Only File Backend
//!
//! Every `set` appends one checksummed record to a single log file; the
//! latest record for a key wins. On open the log is replayed into an ordered
//! in-memory map that serves reads and scans.
//!
//! Record layout (little-endian):
//! key_len(4) + value_len(4) + header_crc(4) + key + value + crc32(4)
//!
//! `header_crc` covers the two length fields, so a damaged length is caught
//! before it is used to find the next record. The trailing `crc32` covers the
//! header and the body.
//!
//! Recovery on open truncates only bytes that can be the unfinished final
//! append: fewer bytes than a header, or a record with a valid header whose
//! body runs past the end of the file or fails its checksum as the very last
//! record. Any other damage is reported as corruption and the file is left
//! untouched.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use crate::backend::{KvStore, StoreStats};
use async_trait::async_trait;
use bytes::{Buf, BufMut, BytesMut};
use parking_lot::{Mutex, RwLock};
use quarry_common::utils::{crc32, format_size, verify_crc32};
use quarry_common::{QuarryError, Result};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

// =============================================================================
// Constants
// =============================================================================

/// key_len(4) + value_len(4) + header_crc(4)
pub const RECORD_HEADER_SIZE: usize = 12;
pub const RECORD_CHECKSUM_SIZE: usize = 4;

const LENGTHS_SIZE: usize = 8;

// =============================================================================
// Record Encoding
// =============================================================================

fn encode_record(key: &[u8], value: &[u8]) -> Result<BytesMut> {
    let key_len = u32::try_from(key.len())
        .map_err(|_| QuarryError::Storage(format!("key of {} bytes is too large", key.len())))?;
    let value_len = u32::try_from(value.len()).map_err(|_| {
        QuarryError::Storage(format!("value of {} bytes is too large", value.len()))
    })?;

    let mut buf =
        BytesMut::with_capacity(RECORD_HEADER_SIZE + key.len() + value.len() + RECORD_CHECKSUM_SIZE);
    buf.put_u32_le(key_len);
    buf.put_u32_le(value_len);
    let header_crc = crc32(&buf);
    buf.put_u32_le(header_crc);
    buf.put_slice(key);
    buf.put_slice(value);

    let checksum = crc32(&buf);
    buf.put_u32_le(checksum);
    Ok(buf)
}

/// Outcome of replaying a log image.
#[derive(Debug, Default)]
struct Replay {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    records: usize,
    /// Length of the well-formed prefix.
    valid_len: usize,
}

fn replay(data: &[u8]) -> Result<Replay> {
    let mut replay = Replay::default();
    let mut offset = 0;

    while offset < data.len() {
        let mut buf = &data[offset..];
        if buf.remaining() < RECORD_HEADER_SIZE {
            break;
        }

        let key_len = buf.get_u32_le() as usize;
        let value_len = buf.get_u32_le() as usize;
        let header_crc = buf.get_u32_le();
        if !verify_crc32(&data[offset..offset + LENGTHS_SIZE], header_crc) {
            return Err(QuarryError::Corruption(format!(
                "log record header checksum mismatch at offset {}",
                offset
            )));
        }

        let body_len = key_len + value_len;
        if buf.remaining() < body_len + RECORD_CHECKSUM_SIZE {
            break;
        }

        let record_len = RECORD_HEADER_SIZE + body_len;
        let mut checksum_buf = &data[offset + record_len..];
        let stored_checksum = checksum_buf.get_u32_le();
        let end = offset + record_len + RECORD_CHECKSUM_SIZE;

        if !verify_crc32(&data[offset..offset + record_len], stored_checksum) {
            if end == data.len() {
                break;
            }
            return Err(QuarryError::Corruption(format!(
                "log record checksum mismatch at offset {}",
                offset
            )));
        }

        let key_start = offset + RECORD_HEADER_SIZE;
        let key = data[key_start..key_start + key_len].to_vec();
        let value = data[key_start + key_len..key_start + body_len].to_vec();
        replay.entries.insert(key, value);
        replay.records += 1;

        offset = end;
        replay.valid_len = offset;
    }

    Ok(replay)
}

// =============================================================================
// Log Writer
// =============================================================================

/// File operations the writer needs beyond `Write`.
trait LogFile: Write {
    fn sync(&mut self) -> io::Result<()>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl LogFile for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Append side of the log. `len` is the length of the acknowledged prefix;
/// a failed append is cut back to it so no fragment sits ahead of later
/// records. If that cut fails too, the writer refuses further appends.
struct LogWriter<F = File> {
    file: F,
    len: u64,
    poisoned: bool,
}

impl<F: LogFile> LogWriter<F> {
    fn new(file: F, len: u64) -> Self {
        Self {
            file,
            len,
            poisoned: false,
        }
    }

    fn append(&mut self, record: &[u8], durable: bool) -> Result<()> {
        if self.poisoned {
            return Err(QuarryError::Storage(
                "log is unwritable after a failed rollback".to_string(),
            ));
        }

        let written = self
            .file
            .write_all(record)
            .and_then(|()| if durable { self.file.sync() } else { Ok(()) });

        if let Err(e) = written {
            self.rollback();
            return Err(e.into());
        }

        self.len += record.len() as u64;
        Ok(())
    }

    fn rollback(&mut self) {
        match self.file.truncate(self.len) {
            Ok(()) => tracing::warn!("Rolled back partial log record at offset {}", self.len),
            Err(e) => {
                tracing::error!(
                    "Failed to roll back partial log record at offset {}: {}",
                    self.len,
                    e
                );
                self.poisoned = true;
            }
        }
    }
}

// =============================================================================
// Log Store
// =============================================================================

/// File-backed store built on a single append-only log.
pub struct LogStore {
    writer: Mutex<LogWriter>,
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    stats: RwLock<StoreStats>,
}

impl LogStore {
    /// Open the log at `path`, creating it if needed and replaying any
    /// existing records.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let replay = replay(&data)?;
        if replay.valid_len < data.len() {
            tracing::warn!(
                "Truncating {} bytes of torn tail from {:?}",
                data.len() - replay.valid_len,
                path
            );
            file.set_len(replay.valid_len as u64)?;
            file.sync_all()?;
        }

        tracing::info!(
            "Opened log store {:?}: {} records, {} keys, {}",
            path,
            replay.records,
            replay.entries.len(),
            format_size(replay.valid_len as u64)
        );

        let stats = StoreStats {
            total_bytes: replay.valid_len as u64,
            ..Default::default()
        };

        Ok(Self {
            writer: Mutex::new(LogWriter::new(file, replay.valid_len as u64)),
            entries: RwLock::new(replay.entries),
            stats: RwLock::new(stats),
        })
    }
}

#[async_trait]
impl KvStore for LogStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self.entries.read().get(key).cloned();
        self.stats.write().read_ops += 1;
        Ok(value)
    }

    async fn set(&self, key: &[u8], value: &[u8], durable: bool) -> Result<()> {
        let record = encode_record(key, value)?;

        // The map is updated under the writer lock so readers never observe
        // a value that is not yet in the log.
        let mut writer = self.writer.lock();
        writer.append(&record, durable)?;
        self.entries.write().insert(key.to_vec(), value.to_vec());
        drop(writer);

        let mut stats = self.stats.write();
        stats.write_ops += 1;
        stats.total_bytes += record.len() as u64;
        if durable {
            stats.durable_writes += 1;
        }
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let snapshot = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.stats.write().scans += 1;
        Ok(snapshot)
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn stats(&self) -> StoreStats {
        self.stats.read().clone()
    }
}

// =============================================================================
// Tests
// =============================================================================

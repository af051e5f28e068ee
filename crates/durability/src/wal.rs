//! WAL (Write-Ahead Log)
//!
//! A committed transaction is written as one contiguous run of frames:
//!
//! ```text
//! BeginTxn { txn_id, timestamp }
//! Mutation { txn_id, .. }   (one per staged mutation)
//! CommitTxn { txn_id }      <- durability point
//! ```
//!
//! Only transactions whose `CommitTxn` frame made it to disk are replayed on
//! recovery. Aborted transactions are never written.
//!
//! A failed append is cut back off the file before the error is returned, so
//! the frames of a transaction reported as failed can never reach disk ahead
//! of a later commit. If the cut itself fails the WAL is poisoned and refuses
//! every further append until the database is reopened (recovery then drops
//! the unterminated tail).

use crate::encoding::{decode_entry, encode_entry};
use crate::mode::DurabilityMode;
use chrono::{DateTime, Utc};
use pharmastock_core::{Error, Mutation, Result, TxnId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// WAL entry types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalEntry {
    /// Start of a committed transaction
    BeginTxn {
        /// Transaction identifier
        txn_id: TxnId,
        /// Commit timestamp shared by every ledger entry of the transaction
        timestamp: DateTime<Utc>,
    },

    /// One staged mutation
    Mutation {
        /// Owning transaction
        txn_id: TxnId,
        /// The mutation
        mutation: Mutation,
    },

    /// Commit marker; the transaction is durable once this frame is synced
    CommitTxn {
        /// Transaction identifier
        txn_id: TxnId,
    },
}

impl WalEntry {
    /// Transaction this entry belongs to
    pub fn txn_id(&self) -> TxnId {
        match self {
            WalEntry::BeginTxn { txn_id, .. }
            | WalEntry::Mutation { txn_id, .. }
            | WalEntry::CommitTxn { txn_id } => *txn_id,
        }
    }

    /// Whether this entry opens or closes a transaction
    pub fn is_txn_boundary(&self) -> bool {
        matches!(self, WalEntry::BeginTxn { .. } | WalEntry::CommitTxn { .. })
    }
}

/// Append-only WAL file
pub struct Wal {
    path: PathBuf,
    file: File,
    mode: DurabilityMode,
    /// Bytes of whole, acknowledged transactions in the file
    size: u64,
    /// Commits appended since the last fsync
    unsynced: usize,
    last_sync: Instant,
    /// Set when a failed append could not be cut back off the file
    poisoned: Option<String>,
    #[cfg(test)]
    fault: Option<Fault>,
}

/// Write failure injected by tests
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) enum Fault {
    /// Write this many bytes of the next append, then fail
    PartialWrite(usize),
    /// Like `PartialWrite`, and the rollback fails too
    PartialWriteNoRollback(usize),
}

impl Wal {
    /// Open (or create) the WAL at `path`, appending after existing frames.
    pub fn open(path: impl AsRef<Path>, mode: DurabilityMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();

        tracing::debug!(path = %path.display(), size, mode = mode.description(), "WAL opened");

        Ok(Wal {
            path,
            file,
            mode,
            size,
            unsynced: 0,
            last_sync: Instant::now(),
            poisoned: None,
            #[cfg(test)]
            fault: None,
        })
    }

    /// Path of the WAL file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Durability mode in effect
    pub fn mode(&self) -> DurabilityMode {
        self.mode
    }

    /// Commits appended since the last fsync
    pub fn unsynced_commits(&self) -> usize {
        self.unsynced
    }

    /// Whether an unrecoverable write failure disabled this WAL
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Append one committed transaction.
    ///
    /// The frames are encoded up front and written with a single
    /// `write_all`, so an encoding failure writes nothing. Returns once the
    /// frames are handed to the OS, and after fsync when the mode requires it.
    ///
    /// # Errors
    ///
    /// On an I/O failure the file is truncated back to [`Wal::size`] and the
    /// error returned; the transaction left no trace. `Storage` if the WAL is
    /// poisoned.
    pub fn append_transaction(
        &mut self,
        txn_id: TxnId,
        timestamp: DateTime<Utc>,
        mutations: &[Mutation],
    ) -> Result<()> {
        let mut buf = encode_entry(&WalEntry::BeginTxn { txn_id, timestamp })?;
        for mutation in mutations {
            buf.extend(encode_entry(&WalEntry::Mutation {
                txn_id,
                mutation: mutation.clone(),
            })?);
        }
        buf.extend(encode_entry(&WalEntry::CommitTxn { txn_id })?);

        self.ensure_usable()?;
        let sync_now = self
            .mode
            .sync_due(self.unsynced + 1, self.last_sync.elapsed());
        let durable = self.write_frames(&buf).and_then(|()| {
            if sync_now {
                self.file.sync_data()
            } else {
                Ok(())
            }
        });

        match durable {
            Ok(()) => {
                self.size += buf.len() as u64;
                self.unsynced += 1;
                if sync_now {
                    self.mark_synced();
                }
                Ok(())
            }
            Err(e) => {
                self.roll_back(txn_id, &e);
                Err(e.into())
            }
        }
    }

    /// Force everything written so far to disk
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.file.sync_data()?;
        self.mark_synced();
        Ok(())
    }

    /// fsync if the mode's interval has run out with commits still unsynced.
    ///
    /// Returns whether an fsync happened.
    pub fn sync_if_due(&mut self) -> Result<bool> {
        if self.poisoned.is_some() || !self.mode.sync_due(self.unsynced, self.last_sync.elapsed())
        {
            return Ok(false);
        }
        self.file.sync_data()?;
        self.mark_synced();
        Ok(true)
    }

    fn ensure_usable(&self) -> Result<()> {
        match &self.poisoned {
            Some(reason) => Err(Error::Storage(format!(
                "WAL {} disabled after failed append: {}",
                self.path.display(),
                reason
            ))),
            None => Ok(()),
        }
    }

    fn mark_synced(&mut self) {
        self.unsynced = 0;
        self.last_sync = Instant::now();
    }

    #[cfg(not(test))]
    fn write_frames(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)
    }

    #[cfg(test)]
    fn write_frames(&mut self, buf: &[u8]) -> io::Result<()> {
        let written = match self.fault {
            Some(Fault::PartialWrite(n)) => {
                self.fault = None;
                n
            }
            Some(Fault::PartialWriteNoRollback(n)) => n,
            None => return self.file.write_all(buf),
        };
        self.file.write_all(&buf[..written.min(buf.len())])?;
        Err(io::Error::new(io::ErrorKind::Other, "injected write failure"))
    }

    #[cfg(test)]
    pub(crate) fn inject_fault(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    /// Cut a failed append back off the file
    fn roll_back(&mut self, txn_id: TxnId, cause: &io::Error) {
        let truncated = self.truncate_to_size().and_then(|()| self.file.sync_data());
        match truncated {
            Ok(()) => {
                tracing::warn!(txn_id = %txn_id, error = %cause, size = self.size, "WAL append failed, rolled back");
            }
            Err(e) => {
                tracing::error!(txn_id = %txn_id, error = %e, cause = %cause, "WAL rollback failed, disabling WAL");
                self.poisoned = Some(cause.to_string());
            }
        }
    }

    #[cfg(not(test))]
    fn truncate_to_size(&mut self) -> io::Result<()> {
        self.file.set_len(self.size)
    }

    #[cfg(test)]
    fn truncate_to_size(&mut self) -> io::Result<()> {
        if let Some(Fault::PartialWriteNoRollback(_)) = self.fault.take() {
            return Err(io::Error::new(io::ErrorKind::Other, "injected truncate failure"));
        }
        self.file.set_len(self.size)
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if self.poisoned.is_some() {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "WAL flush on drop failed");
        }
    }
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wal")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Result of scanning a WAL file
#[derive(Debug, Default)]
pub struct WalScan {
    /// Entries decoded from the valid prefix
    pub entries: Vec<WalEntry>,
    /// Length of the valid prefix in bytes
    pub valid_len: u64,
    /// Bytes after the valid prefix (torn or corrupt tail)
    pub discarded_bytes: u64,
}

/// Read every decodable frame from the start of the WAL.
///
/// Scanning stops at the first incomplete or corrupt frame; everything after
/// it is reported as discarded. A missing file scans as empty.
pub fn scan(path: impl AsRef<Path>) -> Result<WalScan> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    match File::open(path) {
        Ok(mut file) => {
            file.read_to_end(&mut bytes)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(WalScan::default()),
        Err(e) => return Err(e.into()),
    }

    let mut scan = WalScan::default();
    let mut offset = 0usize;
    while offset < bytes.len() {
        match decode_entry(&bytes[offset..]) {
            Ok(Some((entry, consumed))) => {
                scan.entries.push(entry);
                offset += consumed;
            }
            Ok(None) => {
                tracing::warn!(offset, "incomplete WAL frame at tail");
                break;
            }
            Err(e) => {
                tracing::warn!(offset, error = %e, "corrupt WAL frame, ignoring remainder");
                break;
            }
        }
    }
    scan.valid_len = offset as u64;
    scan.discarded_bytes = (bytes.len() - offset) as u64;
    Ok(scan)
}

/// Cut the WAL back to `len` bytes, dropping a torn tail
pub fn truncate(path: impl AsRef<Path>, len: u64) -> Result<()> {
    let file = OpenOptions::new().write(true).open(path.as_ref())?;
    file.set_len(len)?;
    file.sync_all()?;
    Ok(())
}

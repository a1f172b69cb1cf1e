//! Character device front end
//!
//! `CharDevice` owns the one [`SharedBuffer`] and routes open/close/read/write
//! to it. Every caller, through any session, sees the same bytes.
//!
//! The buffer sits behind a single mutex: each append or drain, including
//! its copy across the transfer boundary, runs atomically with respect to
//! every other. Nothing ever waits for space or data.

use crate::buffer::{
    BufferState, ReadOutcome, ReadStatus, SharedBuffer, WriteOutcome, WriteStatus,
    DEFAULT_CAPACITY,
};
use crate::error::{CharDevError, Result};
use crate::session::SessionTracker;
use crate::transfer::{DirectCopy, UserCopy};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Longest accepted device or class name
pub const MAX_NAME_LEN: usize = 64;

const DEFAULT_NAME: &str = "chardev";
const DEFAULT_CLASS: &str = "char";

/// Device configuration
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Device node name
    pub name: String,
    /// Device class name
    pub class: String,
    /// Buffer capacity in bytes
    pub capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            class: DEFAULT_CLASS.to_string(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl DeviceConfig {
    /// Check names and capacity before anything is allocated
    pub fn validate(&self) -> Result<()> {
        for name in [&self.name, &self.class] {
            if name.len() > MAX_NAME_LEN {
                return Err(CharDevError::NameTooLong {
                    max: MAX_NAME_LEN,
                    got: name.len(),
                });
            }
        }
        if self.capacity == 0 {
            return Err(CharDevError::InvalidCapacity(self.capacity));
        }
        Ok(())
    }
}

/// A single shared, capacity-bounded byte channel
pub struct CharDevice {
    name: String,
    class: String,
    buffer: Mutex<SharedBuffer>,
    sessions: SessionTracker,
    copier: Box<dyn UserCopy>,
}

impl CharDevice {
    /// Create a device that copies caller bytes with a plain memcpy
    pub fn new(config: DeviceConfig) -> Result<Self> {
        Self::with_copier(config, DirectCopy)
    }

    /// Create a device with a custom transfer boundary
    pub fn with_copier<C>(config: DeviceConfig, copier: C) -> Result<Self>
    where
        C: UserCopy + 'static,
    {
        config.validate()?;
        let buffer = SharedBuffer::new(config.capacity)?;

        Ok(Self {
            name: config.name,
            class: config.class,
            buffer: Mutex::new(buffer),
            sessions: SessionTracker::new(),
            copier: Box::new(copier),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn capacity(&self) -> usize {
        self.buffer.lock().capacity()
    }

    /// Pending byte count
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn state(&self) -> BufferState {
        self.buffer.lock().state()
    }

    /// Snapshot of pending bytes, oldest first
    pub fn pending(&self) -> Vec<u8> {
        self.buffer.lock().pending()
    }

    /// How many times the device has been opened
    pub fn open_count(&self) -> u64 {
        self.sessions.opens()
    }

    /// Open a new session. Always succeeds
    pub fn open(&self) -> Session<'_> {
        let id = self.sessions.open();
        info!(device = %self.name, opens = id, "device opened {} times", id);
        Session {
            device: self,
            id,
            open: true,
        }
    }

    /// Record a close. Always succeeds and never touches the buffer
    pub fn close(&self) -> Result<()> {
        self.sessions.close();
        info!(device = %self.name, "device closed");
        Ok(())
    }

    /// Append as much of `src` as fits
    ///
    /// Returns the accepted count and whether the write was truncated. A
    /// transfer fault leaves the buffer untouched.
    pub fn write(&self, src: &[u8]) -> Result<WriteOutcome> {
        let mut buffer = self.buffer.lock();
        let outcome = buffer.append(src, self.copier.as_ref()).map_err(|e| {
            warn!(device = %self.name, requested = src.len(), error = %e, "write failed");
            e
        })?;

        match outcome.status {
            WriteStatus::Complete => {
                debug!(
                    device = %self.name,
                    accepted = outcome.accepted,
                    len = buffer.len(),
                    "bytes written"
                );
            }
            WriteStatus::Truncated => {
                info!(
                    device = %self.name,
                    requested = outcome.requested,
                    accepted = outcome.accepted,
                    len = buffer.len(),
                    "input longer than remaining space, truncated"
                );
            }
            WriteStatus::Full => {
                debug!(device = %self.name, requested = outcome.requested, "buffer full, nothing written");
            }
            WriteStatus::NothingRequested => {
                debug!(device = %self.name, "empty write");
            }
        }

        Ok(outcome)
    }

    /// Drain up to `dst.len()` bytes into `dst`
    pub fn read(&self, dst: &mut [u8]) -> Result<ReadOutcome> {
        let requested = dst.len();
        let mut buffer = self.buffer.lock();
        let outcome = buffer.drain(dst, self.copier.as_ref()).map_err(|e| {
            warn!(device = %self.name, requested, error = %e, "read failed");
            e
        })?;

        match outcome.status {
            ReadStatus::Complete | ReadStatus::Short => {
                debug!(
                    device = %self.name,
                    returned = outcome.returned,
                    remaining = buffer.len(),
                    "bytes read"
                );
            }
            ReadStatus::NoDataAvailable => {
                debug!(device = %self.name, "no data available");
            }
            ReadStatus::NothingRequested => {
                debug!(device = %self.name, "empty read");
            }
        }

        Ok(outcome)
    }

    /// Drain up to `len` bytes into a fresh vector
    pub fn read_to_vec(&self, len: usize) -> Result<Vec<u8>> {
        // Never more than capacity can be pending
        let mut out = vec![0u8; len.min(self.capacity())];
        let outcome = self.read(&mut out)?;
        out.truncate(outcome.returned);
        Ok(out)
    }
}

impl std::fmt::Debug for CharDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharDevice")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("buffer", &*self.buffer.lock())
            .field("opens", &self.sessions.opens())
            .finish()
    }
}

/// One open-to-close interval on a [`CharDevice`]
///
/// Carries no buffer state of its own. Dropping an open session closes it.
pub struct Session<'a> {
    device: &'a CharDevice,
    id: u64,
    open: bool,
}

impl<'a> Session<'a> {
    /// Open ordinal of this session (1 for the first open)
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn device(&self) -> &'a CharDevice {
        self.device
    }

    pub fn write(&self, src: &[u8]) -> Result<WriteOutcome> {
        self.ensure_open()?;
        self.device.write(src)
    }

    pub fn read(&self, dst: &mut [u8]) -> Result<ReadOutcome> {
        self.ensure_open()?;
        self.device.read(dst)
    }

    pub fn read_to_vec(&self, len: usize) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.device.read_to_vec(len)
    }

    /// Close the session. Repeated calls are no-ops
    pub fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.device.close()?;
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(CharDevError::SessionClosed(self.id))
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

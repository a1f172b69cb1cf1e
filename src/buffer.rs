//! Buffer engine - fixed-capacity FIFO byte store
//!
//! Bytes accumulate at the back on write and drain from the front on read.
//! Storage is an index-based bounded deque: a `head` offset plus a length,
//! wrapping at `capacity`, so neither operation shifts the unread tail.
//!
//! `SharedBuffer` itself is not synchronized; [`CharDevice`](crate::CharDevice)
//! owns the single instance behind a mutex.
//!
//! # States
//! - `Empty`: `len == 0`, reads return nothing
//! - `Partial`: `0 < len < capacity`
//! - `Full`: `len == capacity`, writes accept nothing

use crate::error::{CharDevError, Direction, Result};
use crate::transfer::{self, UserCopy};

/// Default capacity in bytes (1KB)
pub const DEFAULT_CAPACITY: usize = 1024;

/// Occupancy state of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Empty,
    Partial,
    Full,
}

/// How a write was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Every requested byte was stored
    Complete,
    /// Some bytes were stored, the rest did not fit
    Truncated,
    /// Nothing was stored because the buffer is full
    Full,
    /// Zero bytes were requested
    NothingRequested,
}

/// How a read was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Every requested byte was returned
    Complete,
    /// Fewer bytes than requested were pending
    Short,
    /// The buffer is empty
    NoDataAvailable,
    /// Zero bytes were requested
    NothingRequested,
}

/// Result of a successful append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub requested: usize,
    pub accepted: usize,
    pub status: WriteStatus,
}

impl WriteOutcome {
    /// Bytes dropped because capacity ran out
    #[inline]
    pub fn dropped(&self) -> usize {
        self.requested - self.accepted
    }

    #[inline]
    pub fn is_truncated(&self) -> bool {
        matches!(self.status, WriteStatus::Truncated | WriteStatus::Full)
    }
}

/// Result of a successful drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    pub requested: usize,
    pub returned: usize,
    pub status: ReadStatus,
}

/// The single capacity-bounded byte store
pub struct SharedBuffer {
    storage: Box<[u8]>,
    /// Staging area for incoming bytes; committed only after a clean copy
    scratch: Box<[u8]>,
    /// Offset of the oldest pending byte
    head: usize,
    len: usize,
}

impl SharedBuffer {
    /// Create an empty buffer of `capacity` bytes
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CharDevError::InvalidCapacity(capacity));
        }

        Ok(Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            scratch: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        })
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of pending bytes
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Free space in bytes
    #[inline(always)]
    pub fn space(&self) -> usize {
        self.capacity() - self.len
    }

    pub fn state(&self) -> BufferState {
        if self.is_empty() {
            BufferState::Empty
        } else if self.is_full() {
            BufferState::Full
        } else {
            BufferState::Partial
        }
    }

    /// Append as much of `src` as fits
    ///
    /// The copy goes through `copier` into the scratch region first. If it
    /// faults, nothing is committed and the buffer is unchanged.
    pub fn append(&mut self, src: &[u8], copier: &dyn UserCopy) -> Result<WriteOutcome> {
        let requested = src.len();
        let accepted = requested.min(self.space());

        if accepted == 0 {
            let status = if requested == 0 {
                WriteStatus::NothingRequested
            } else {
                WriteStatus::Full
            };
            return Ok(WriteOutcome {
                requested,
                accepted: 0,
                status,
            });
        }

        let staged = &mut self.scratch[..accepted];
        let not_copied = copier.copy_from_user(staged, &src[..accepted]);
        transfer::check(Direction::FromUser, accepted, not_copied)?;

        // Commit: at most two segments when the tail wraps
        let capacity = self.capacity();
        let tail = (self.head + self.len) % capacity;
        let first = accepted.min(capacity - tail);
        self.storage[tail..tail + first].copy_from_slice(&self.scratch[..first]);
        self.storage[..accepted - first].copy_from_slice(&self.scratch[first..accepted]);
        self.len += accepted;

        let status = if accepted < requested {
            WriteStatus::Truncated
        } else {
            WriteStatus::Complete
        };

        Ok(WriteOutcome {
            requested,
            accepted,
            status,
        })
    }

    /// Drain up to `dst.len()` bytes from the front into `dst`
    ///
    /// Drained storage is zeroed. If the copy faults, the pending bytes stay
    /// where they were.
    pub fn drain(&mut self, dst: &mut [u8], copier: &dyn UserCopy) -> Result<ReadOutcome> {
        let requested = dst.len();

        if self.len == 0 {
            return Ok(ReadOutcome {
                requested,
                returned: 0,
                status: ReadStatus::NoDataAvailable,
            });
        }
        if requested == 0 {
            return Ok(ReadOutcome {
                requested,
                returned: 0,
                status: ReadStatus::NothingRequested,
            });
        }

        let n = requested.min(self.len);
        let capacity = self.capacity();
        let head = self.head;
        let first = n.min(capacity - head);

        let mut not_copied =
            copier.copy_to_user(&mut dst[..first], &self.storage[head..head + first]);
        if not_copied == 0 && n > first {
            not_copied = copier.copy_to_user(&mut dst[first..n], &self.storage[..n - first]);
        } else {
            not_copied += n - first;
        }
        transfer::check(Direction::ToUser, n, not_copied)?;

        // Scrub what was handed out so stale bytes never resurface
        self.storage[head..head + first].fill(0);
        self.storage[..n - first].fill(0);

        self.len -= n;
        self.head = if self.len == 0 { 0 } else { (head + n) % capacity };

        let status = if n < requested {
            ReadStatus::Short
        } else {
            ReadStatus::Complete
        };

        Ok(ReadOutcome {
            requested,
            returned: n,
            status,
        })
    }

    /// Copy of the pending bytes in FIFO order, without draining
    pub fn pending(&self) -> Vec<u8> {
        let capacity = self.capacity();
        let first = self.len.min(capacity - self.head);
        let mut out = Vec::with_capacity(self.len);
        out.extend_from_slice(&self.storage[self.head..self.head + first]);
        out.extend_from_slice(&self.storage[..self.len - first]);
        out
    }

    /// Raw storage, including stale bytes
    #[cfg(test)]
    pub(crate) fn raw(&self) -> &[u8] {
        &self.storage
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("head", &self.head)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::DirectCopy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Faults every copy once `budget` successful copies have been made
    struct FailAfter {
        budget: AtomicUsize,
    }

    impl FailAfter {
        fn new(budget: usize) -> Self {
            Self {
                budget: AtomicUsize::new(budget),
            }
        }

        fn take(&self, dst: &mut [u8], src: &[u8]) -> usize {
            let left = self.budget.load(Ordering::Relaxed);
            if left == 0 {
                // Simulate a partial copy before the fault
                let half = dst.len() / 2;
                dst[..half].copy_from_slice(&src[..half]);
                return dst.len() - half;
            }
            self.budget.store(left - 1, Ordering::Relaxed);
            dst.copy_from_slice(src);
            0
        }
    }

    impl UserCopy for FailAfter {
        fn copy_from_user(&self, dst: &mut [u8], src: &[u8]) -> usize {
            self.take(dst, src)
        }

        fn copy_to_user(&self, dst: &mut [u8], src: &[u8]) -> usize {
            self.take(dst, src)
        }
    }

    fn write(buf: &mut SharedBuffer, data: &[u8]) -> WriteOutcome {
        buf.append(data, &DirectCopy).unwrap()
    }

    fn read(buf: &mut SharedBuffer, n: usize) -> Vec<u8> {
        let mut out = vec![0u8; n];
        let outcome = buf.drain(&mut out, &DirectCopy).unwrap();
        out.truncate(outcome.returned);
        out
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            SharedBuffer::new(0).unwrap_err(),
            CharDevError::InvalidCapacity(0)
        );
    }

    #[test]
    fn test_roundtrip() {
        let mut buf = SharedBuffer::new(DEFAULT_CAPACITY).unwrap();
        let w = write(&mut buf, b"HELLO");
        assert_eq!(w.accepted, 5);
        assert_eq!(w.status, WriteStatus::Complete);

        assert_eq!(read(&mut buf, 5), b"HELLO");
        assert_eq!(buf.state(), BufferState::Empty);
    }

    #[test]
    fn test_partial_drain_keeps_fifo() {
        let mut buf = SharedBuffer::new(16).unwrap();
        write(&mut buf, b"ABCDE");

        assert_eq!(read(&mut buf, 2), b"AB");
        assert_eq!(buf.len(), 3);
        assert_eq!(read(&mut buf, 3), b"CDE");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_overflow_truncates() {
        let mut buf = SharedBuffer::new(10).unwrap();
        let w = write(&mut buf, b"01234567890123");
        assert_eq!(w.accepted, 10);
        assert_eq!(w.dropped(), 4);
        assert_eq!(w.status, WriteStatus::Truncated);
        assert_eq!(buf.pending(), b"0123456789");
        assert_eq!(buf.state(), BufferState::Full);
    }

    #[test]
    fn test_write_when_full_is_noop() {
        let mut buf = SharedBuffer::new(4).unwrap();
        write(&mut buf, b"WXYZ");

        let w = write(&mut buf, b"more");
        assert_eq!(w.accepted, 0);
        assert_eq!(w.status, WriteStatus::Full);
        assert!(w.is_truncated());
        assert_eq!(buf.pending(), b"WXYZ");
    }

    #[test]
    fn test_zero_length_write() {
        let mut buf = SharedBuffer::new(4).unwrap();
        let w = write(&mut buf, b"");
        assert_eq!(w.status, WriteStatus::NothingRequested);
        assert!(!w.is_truncated());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_when_empty() {
        let mut buf = SharedBuffer::new(4).unwrap();
        let mut out = [0xAAu8; 4];
        let r = buf.drain(&mut out, &DirectCopy).unwrap();
        assert_eq!(r.returned, 0);
        assert_eq!(r.status, ReadStatus::NoDataAvailable);
        assert_eq!(out, [0xAA; 4]);
    }

    #[test]
    fn test_short_read() {
        let mut buf = SharedBuffer::new(8).unwrap();
        write(&mut buf, b"abc");
        let mut out = [0u8; 8];
        let r = buf.drain(&mut out, &DirectCopy).unwrap();
        assert_eq!(r.returned, 3);
        assert_eq!(r.status, ReadStatus::Short);
        assert_eq!(&out[..3], b"abc");
    }

    #[test]
    fn test_zero_length_read_leaves_data() {
        let mut buf = SharedBuffer::new(8).unwrap();
        write(&mut buf, b"abc");
        let r = buf.drain(&mut [], &DirectCopy).unwrap();
        assert_eq!(r.status, ReadStatus::NothingRequested);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_wraparound() {
        let mut buf = SharedBuffer::new(8).unwrap();
        write(&mut buf, b"012345");
        assert_eq!(read(&mut buf, 4), b"0123");

        // Tail wraps past the end of storage
        let w = write(&mut buf, b"6789AB");
        assert_eq!(w.accepted, 6);
        assert!(buf.is_full());
        assert_eq!(buf.pending(), b"456789AB");

        assert_eq!(read(&mut buf, 5), b"45678");
        assert_eq!(read(&mut buf, 10), b"9AB");
    }

    #[test]
    fn test_drained_bytes_are_zeroed() {
        let mut buf = SharedBuffer::new(8).unwrap();
        write(&mut buf, b"SECRET");
        read(&mut buf, 6);
        assert!(buf.raw().iter().all(|&b| b == 0));

        write(&mut buf, b"abcdef");
        read(&mut buf, 2);
        assert_eq!(&buf.raw()[..2], &[0, 0]);
        assert_eq!(buf.pending(), b"cdef");
    }

    #[test]
    fn test_write_fault_leaves_state() {
        let mut buf = SharedBuffer::new(8).unwrap();
        write(&mut buf, b"ok");

        let err = buf.append(b"broken", &FailAfter::new(0)).unwrap_err();
        assert_eq!(
            err,
            CharDevError::TransferFault {
                direction: Direction::FromUser,
                requested: 6,
                not_copied: 3,
            }
        );
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.pending(), b"ok");

        // Retrying after the fault lands cleanly
        write(&mut buf, b"fine");
        assert_eq!(buf.pending(), b"okfine");
    }

    #[test]
    fn test_read_fault_leaves_state() {
        let mut buf = SharedBuffer::new(8).unwrap();
        write(&mut buf, b"keepme");

        let mut out = [0u8; 4];
        let err = buf.drain(&mut out, &FailAfter::new(0)).unwrap_err();
        assert!(matches!(
            err,
            CharDevError::TransferFault {
                direction: Direction::ToUser,
                ..
            }
        ));
        assert_eq!(buf.pending(), b"keepme");
    }

    #[test]
    fn test_read_fault_on_second_segment() {
        let mut buf = SharedBuffer::new(4).unwrap();
        write(&mut buf, b"abc");
        read(&mut buf, 2);
        write(&mut buf, b"def");
        // pending "cdef" wraps: "c" at the end and "def" at the front
        assert_eq!(buf.pending(), b"cdef");

        let mut out = [0u8; 4];
        let err = buf.drain(&mut out, &FailAfter::new(1)).unwrap_err();
        assert!(matches!(err, CharDevError::TransferFault { .. }));
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.pending(), b"cdef");
    }
}

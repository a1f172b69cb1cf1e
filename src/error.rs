//! Error types for chardev

use std::fmt;
use thiserror::Error;

/// Result type for chardev operations
pub type Result<T> = std::result::Result<T, CharDevError>;

/// Direction of a copy across the caller boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Caller memory into the device (write path)
    FromUser,
    /// Device into caller memory (read path)
    ToUser,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::FromUser => f.write_str("from user"),
            Direction::ToUser => f.write_str("to user"),
        }
    }
}

/// Errors that can occur in chardev operations
///
/// Truncated writes and empty reads are not errors; they are reported through
/// [`WriteStatus`](crate::WriteStatus) and [`ReadStatus`](crate::ReadStatus).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CharDevError {
    /// The copy across the caller boundary failed; the buffer was not modified
    #[error("Failed to copy {not_copied} of {requested} bytes {direction}")]
    TransferFault {
        direction: Direction,
        requested: usize,
        not_copied: usize,
    },

    /// Capacity must be non-zero
    #[error("Invalid buffer capacity: {0}")]
    InvalidCapacity(usize),

    /// Device or class name too long
    #[error("Name too long: max {max} chars, got {got}")]
    NameTooLong { max: usize, got: usize },

    /// I/O attempted through a session that was already closed
    #[error("Session {0} is closed")]
    SessionClosed(u64),

    /// The host refused to allocate a major number
    #[error("Could not register a major number for '{name}': {reason}")]
    RegisterNumber { name: String, reason: String },

    /// The host refused to create the device class
    #[error("Failed to register device class '{name}': {reason}")]
    RegisterClass { name: String, reason: String },

    /// The host refused to create the device node
    #[error("Failed to create the device '{name}': {reason}")]
    CreateDevice { name: String, reason: String },

    /// A teardown step referenced something the host does not know about
    #[error("'{0}' is not registered")]
    NotRegistered(String),
}

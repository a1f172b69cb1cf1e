//! chardev - a capacity-bounded shared byte channel
//!
//! Models a minimal character device: any number of callers open the device,
//! and every read and write acts on one shared fixed-capacity FIFO buffer.
//!
//! # Behavior
//!
//! - **Write**: appends what fits; the excess is dropped and the short count
//!   is reported, never waited on
//! - **Read**: drains from the front; an empty buffer returns zero bytes
//!   immediately
//! - **Faults**: a failed copy across the caller boundary leaves the buffer
//!   exactly as it was

pub mod error;
pub mod transfer;
pub mod buffer;
pub mod session;
pub mod device;
pub mod host;
pub mod bindings;

pub use error::{CharDevError, Direction, Result};
pub use buffer::{BufferState, ReadOutcome, ReadStatus, SharedBuffer, WriteOutcome, WriteStatus};
pub use device::{CharDevice, DeviceConfig, Session};
pub use host::{DeviceNumber, Host, MemoryHost, Registration};
pub use transfer::{DirectCopy, UserCopy};

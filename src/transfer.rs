//! Transfer boundary between caller memory and device memory
//!
//! Mirrors the kernel's `copy_from_user` / `copy_to_user` contract: a copy
//! reports how many bytes could *not* be transferred, and zero means success.

use crate::error::{CharDevError, Direction, Result};

/// Copies bytes across the caller/device trust boundary
///
/// Implementations must either copy `src` into `dst` completely or report a
/// non-zero count of bytes left uncopied. `dst` and `src` always have the
/// same length.
pub trait UserCopy: Send + Sync {
    /// Copy caller bytes (`src`) into device memory (`dst`)
    fn copy_from_user(&self, dst: &mut [u8], src: &[u8]) -> usize;

    /// Copy device bytes (`src`) into caller memory (`dst`)
    fn copy_to_user(&self, dst: &mut [u8], src: &[u8]) -> usize;
}

/// Plain in-process memcpy; never faults
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectCopy;

impl UserCopy for DirectCopy {
    #[inline]
    fn copy_from_user(&self, dst: &mut [u8], src: &[u8]) -> usize {
        dst.copy_from_slice(src);
        0
    }

    #[inline]
    fn copy_to_user(&self, dst: &mut [u8], src: &[u8]) -> usize {
        dst.copy_from_slice(src);
        0
    }
}

/// Turn a "bytes not copied" count into a result
#[inline]
pub(crate) fn check(direction: Direction, requested: usize, not_copied: usize) -> Result<()> {
    if not_copied == 0 {
        Ok(())
    } else {
        Err(CharDevError::TransferFault {
            direction,
            requested,
            not_copied: not_copied.min(requested),
        })
    }
}

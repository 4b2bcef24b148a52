use crate::sys;
use std::os::fd::RawFd;

/// Descriptor value of an instance that holds no open segment.
pub const INVALID_HANDLE: RawFd = -1;

/// Owning wrapper around a raw shared memory descriptor.
///
/// `close` invalidates the descriptor before reporting the outcome, so a
/// descriptor is released at most once no matter how often `close` or
/// `Drop` run.
#[derive(Debug)]
pub(crate) struct ShmHandle {
    fd: RawFd,
}

impl ShmHandle {
    pub(crate) const fn invalid() -> Self {
        Self { fd: INVALID_HANDLE }
    }

    pub(crate) const fn from_raw(fd: RawFd) -> Self {
        Self { fd }
    }

    #[inline]
    pub(crate) const fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    #[inline]
    pub(crate) const fn is_valid(&self) -> bool {
        self.fd != INVALID_HANDLE
    }

    /// Moves the descriptor out, leaving this handle invalid.
    pub(crate) fn take(&mut self) -> Self {
        Self {
            fd: std::mem::replace(&mut self.fd, INVALID_HANDLE),
        }
    }

    /// Releases the descriptor. No-op on an invalid handle.
    ///
    /// On error the handle is invalid all the same; retrying `close(2)`
    /// could release a descriptor another thread has been handed since.
    pub(crate) fn close(&mut self) -> Result<(), i32> {
        if !self.is_valid() {
            return Ok(());
        }
        let fd = std::mem::replace(&mut self.fd, INVALID_HANDLE);
        sys::close(fd)
    }
}

impl Drop for ShmHandle {
    fn drop(&mut self) {
        let fd = self.fd;
        if let Err(errnum) = self.close() {
            tracing::error!(fd, errnum, "failed to close shared memory descriptor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_handle_close_is_a_noop() {
        let mut h = ShmHandle::invalid();
        assert!(!h.is_valid());
        assert_eq!(h.close(), Ok(()));
        assert_eq!(h.close(), Ok(()));
        assert_eq!(h.as_raw_fd(), INVALID_HANDLE);
    }

    #[test]
    fn take_leaves_source_invalid() {
        let mut a = ShmHandle::from_raw(INVALID_HANDLE);
        let b = a.take();
        assert!(!a.is_valid());
        assert!(!b.is_valid());
    }
}

//! Closed error taxonomy for shared memory operations.
//!
//! Callers never see a raw errno: every OS failure is folded into exactly one
//! [`SharedMemoryError`] variant by [`SharedMemoryError::from_errno`], with
//! [`SharedMemoryError::UnknownError`] catching everything not listed.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum SharedMemoryError {
    #[error("operation requires an open shared memory segment")]
    InvalidState,

    #[error("no shared memory name specified")]
    EmptyName,

    #[error("shared memory name must start with a leading slash")]
    NameWithoutLeadingSlash,

    #[error("insufficient permissions to shared memory")]
    InsufficientPermissions,

    #[error("shared memory already exists")]
    DoesExist,

    #[error("process limit of open files reached")]
    ProcessLimitOfOpenFilesReached,

    #[error("system limit of open files reached")]
    SystemLimitOfOpenFilesReached,

    #[error("shared memory does not exist")]
    DoesNotExist,

    #[error("not enough memory available")]
    NotEnoughMemoryAvailable,

    #[error("requested shared memory is larger than the maximum file size")]
    RequestedMemoryExceedsMaximumFileSize,

    #[error("shared memory path is a directory")]
    PathIsADirectory,

    #[error("too many symbolic links in shared memory path")]
    TooManySymbolicLinks,

    #[error("resizing a file beyond its current size is not supported by the filesystem")]
    NoFileResizeSupport,

    #[error("resizing shared memory is not supported")]
    NoResizeSupport,

    #[error("provided file descriptor is not a valid file descriptor")]
    InvalidFileDescriptor,

    #[error("unknown shared memory error")]
    UnknownError,
}

impl SharedMemoryError {
    /// Classifies an errno reported by `shm_open`, `ftruncate`, `fstat`,
    /// `close` or `shm_unlink`.
    ///
    /// Total: codes outside the known set map to `UnknownError`.
    pub fn from_errno(errnum: i32) -> Self {
        match errnum {
            libc::EACCES => Self::InsufficientPermissions,
            libc::EPERM => Self::NoFileResizeSupport,
            // EINVAL from ftruncate: length too large or not a regular file
            libc::EFBIG | libc::EINVAL => Self::RequestedMemoryExceedsMaximumFileSize,
            libc::EBADF => Self::InvalidFileDescriptor,
            libc::EEXIST => Self::DoesExist,
            libc::EISDIR => Self::PathIsADirectory,
            libc::ELOOP => Self::TooManySymbolicLinks,
            libc::EMFILE => Self::ProcessLimitOfOpenFilesReached,
            libc::ENFILE => Self::SystemLimitOfOpenFilesReached,
            libc::ENOENT => Self::DoesNotExist,
            libc::ENOMEM => Self::NotEnoughMemoryAvailable,
            // equal on Linux, distinct on some BSDs
            e if e == libc::ENOTSUP || e == libc::EOPNOTSUPP => Self::NoResizeSupport,
            _ => Self::UnknownError,
        }
    }
}

use crate::SharedMemoryError;
use lithos_core::BoundedString;

/// Maximum length of a shared memory name in bytes, leading slash included.
pub const NAME_SIZE: usize = 128;

pub type SharedMemoryName = BoundedString<NAME_SIZE>;

/// Checks the namespace convention for POSIX shared memory names.
///
/// Runs before any OS call so that a malformed name has no side effects.
/// Names the OS itself refuses, such as `"/"` or `"/a/b"` on Linux, pass
/// here; `shm_open` fails with `EINVAL`, reported as
/// `RequestedMemoryExceedsMaximumFileSize`.
pub fn validate_name(name: &SharedMemoryName) -> Result<(), SharedMemoryError> {
    if name.is_empty() {
        return Err(SharedMemoryError::EmptyName);
    }
    if !name.starts_with('/') {
        return Err(SharedMemoryError::NameWithoutLeadingSlash);
    }
    Ok(())
}

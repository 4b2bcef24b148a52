use crate::handle::ShmHandle;
use crate::{
    AccessMode, OpenMode, Permissions, SharedMemoryError, SharedMemoryName, oflags_for, sys,
    validate_name,
};
use std::os::fd::{AsRawFd, RawFd};
use tracing::{debug, error, warn};

/// A named POSIX shared memory segment held open by this process.
///
/// The instance that created the segment owns its name and removes it when
/// dropped; an instance that merely opened an existing segment only closes
/// its descriptor. Ownership moves with the value (or with [`take`]); the
/// type is deliberately not `Clone`.
///
/// [`take`]: SharedMemory::take
#[derive(Debug)]
pub struct SharedMemory {
    name: SharedMemoryName,
    handle: ShmHandle,
    has_ownership: bool,
}

/// Logs an OS failure with its raw errno and folds it into the taxonomy.
fn classify(op: &'static str, name: &SharedMemoryName, errnum: i32) -> SharedMemoryError {
    let err = SharedMemoryError::from_errno(errnum);
    warn!(%name, op, errnum, error = %err, "shared memory call failed");
    err
}

impl SharedMemory {
    /// Creates or opens the segment `name` according to `open_mode`.
    ///
    /// `size` is applied with `ftruncate` only when this call created the
    /// segment; an opened segment keeps its length. `permissions` likewise
    /// only matter on creation.
    ///
    /// # Errors
    /// - `EmptyName` / `NameWithoutLeadingSlash` before any OS call
    /// - `RequestedMemoryExceedsMaximumFileSize` if `size` does not fit `off_t`
    /// - any classified failure of `shm_open` or `ftruncate`; if the segment
    ///   was created by this call it is removed again before returning
    pub fn create(
        name: &SharedMemoryName,
        access_mode: AccessMode,
        open_mode: OpenMode,
        permissions: Permissions,
        size: u64,
    ) -> Result<Self, SharedMemoryError> {
        validate_name(name)?;

        let mut shm = Self::unopened(*name);
        shm.open(access_mode, open_mode, permissions, size)?;

        debug!(
            %name,
            handle = shm.handle.as_raw_fd(),
            owner = shm.has_ownership,
            %access_mode,
            %open_mode,
            "shared memory opened"
        );
        Ok(shm)
    }

    fn unopened(name: SharedMemoryName) -> Self {
        Self {
            name,
            handle: ShmHandle::invalid(),
            has_ownership: false,
        }
    }

    fn open(
        &mut self,
        access_mode: AccessMode,
        open_mode: OpenMode,
        permissions: Permissions,
        size: u64,
    ) -> Result<(), SharedMemoryError> {
        let len = libc::off_t::try_from(size).map_err(|_| {
            warn!(name = %self.name, size, "requested shared memory size does not fit off_t");
            SharedMemoryError::RequestedMemoryExceedsMaximumFileSize
        })?;
        let c_name = self.name.to_c_string();

        if open_mode == OpenMode::PurgeAndCreate {
            match sys::shm_unlink(&c_name) {
                Ok(()) => debug!(name = %self.name, "purged stale shared memory"),
                Err(libc::ENOENT) => {}
                // the create below reports whatever still stands in the way
                Err(errnum) => {
                    classify("shm_unlink", &self.name, errnum);
                }
            }
        }

        match sys::shm_open(&c_name, oflags_for(access_mode, open_mode), permissions) {
            Ok(fd) => {
                self.handle = ShmHandle::from_raw(fd);
                self.has_ownership = open_mode.may_create();
            }
            // someone else created it first and owns it; open what is there
            Err(libc::EEXIST) if open_mode == OpenMode::OpenOrCreate => {
                let oflags = oflags_for(access_mode, OpenMode::OpenExisting);
                let fd = sys::shm_open(&c_name, oflags, permissions)
                    .map_err(|errnum| classify("shm_open", &self.name, errnum))?;
                self.handle = ShmHandle::from_raw(fd);
                self.has_ownership = false;
            }
            Err(errnum) => return Err(classify("shm_open", &self.name, errnum)),
        }

        if self.has_ownership {
            if let Err(errnum) = sys::ftruncate(self.handle.as_raw_fd(), len) {
                let err = classify("ftruncate", &self.name, errnum);
                self.discard_created();
                return Err(err);
            }
        }

        Ok(())
    }

    /// Rolls back a segment this instance created but could not finish setting up.
    fn discard_created(&mut self) {
        if let Err(err) = self.close() {
            error!(name = %self.name, error = %err, "failed to close partially created shared memory");
        }
        if let Err(err) = self.unlink() {
            error!(name = %self.name, error = %err, "failed to remove partially created shared memory");
        }
    }

    /// Removes `name` from the shared memory namespace if it is present.
    ///
    /// Not tied to any instance: use it to clear a segment left behind by a
    /// crashed owner. Processes that still have the segment open keep their
    /// mapping; only the name disappears.
    ///
    /// Returns `Ok(true)` if a segment was removed and `Ok(false)` if none
    /// existed.
    pub fn unlink_if_exist(name: &SharedMemoryName) -> Result<bool, SharedMemoryError> {
        validate_name(name)?;
        match sys::shm_unlink(&name.to_c_string()) {
            Ok(()) => {
                debug!(%name, "shared memory unlinked");
                Ok(true)
            }
            Err(libc::ENOENT) => Ok(false),
            Err(errnum) => Err(classify("shm_unlink", name, errnum)),
        }
    }

    /// Releases the descriptor. Ownership ends with it; repeated calls are no-ops.
    fn close(&mut self) -> Result<(), SharedMemoryError> {
        self.has_ownership = false;
        if !self.handle.is_valid() {
            return Ok(());
        }
        let fd = self.handle.as_raw_fd();
        self.handle
            .close()
            .map_err(|errnum| classify("close", &self.name, errnum))?;
        debug!(name = %self.name, fd, "shared memory closed");
        Ok(())
    }

    fn unlink(&self) -> Result<bool, SharedMemoryError> {
        Self::unlink_if_exist(&self.name)
    }

    fn destroy(&mut self) {
        let owned = self.has_ownership;
        if let Err(err) = self.close() {
            error!(name = %self.name, error = %err, "failed to close shared memory");
        }
        if owned {
            if let Err(err) = self.unlink() {
                error!(name = %self.name, error = %err, "failed to remove shared memory");
            }
        }
    }

    /// Transfers the segment into a new value, leaving `self` empty.
    ///
    /// Afterwards `self.handle()` is [`INVALID_HANDLE`](crate::INVALID_HANDLE),
    /// `self.has_ownership()` is false and dropping `self` does nothing.
    pub fn take(&mut self) -> Self {
        Self {
            name: std::mem::take(&mut self.name),
            handle: self.handle.take(),
            has_ownership: std::mem::replace(&mut self.has_ownership, false),
        }
    }

    /// The raw descriptor, or [`INVALID_HANDLE`](crate::INVALID_HANDLE).
    #[inline]
    pub fn handle(&self) -> RawFd {
        self.handle.as_raw_fd()
    }

    /// Whether dropping this instance removes the segment name.
    #[inline]
    pub fn has_ownership(&self) -> bool {
        self.has_ownership
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.handle.is_valid()
    }

    #[inline]
    pub fn name(&self) -> &SharedMemoryName {
        &self.name
    }

    /// Current length of the segment as reported by `fstat`.
    ///
    /// For a segment opened with `OpenExisting` this is the length its
    /// creator chose.
    pub fn segment_size(&self) -> Result<u64, SharedMemoryError> {
        if !self.handle.is_valid() {
            return Err(SharedMemoryError::InvalidState);
        }
        sys::fstat_size(self.handle.as_raw_fd()).map_err(|errnum| classify("fstat", &self.name, errnum))
    }
}

impl AsRawFd for SharedMemory {
    fn as_raw_fd(&self) -> RawFd {
        self.handle.as_raw_fd()
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::INVALID_HANDLE;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Unique per process and per call so parallel tests never share a segment.
    fn unique_name(tag: &str) -> SharedMemoryName {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let s = format!("/lithos_shm_unit_{}_{tag}_{n}", std::process::id());
        SharedMemoryName::try_from(s.as_str()).unwrap()
    }

    fn create(name: &SharedMemoryName, open_mode: OpenMode) -> Result<SharedMemory, SharedMemoryError> {
        SharedMemory::create(name, AccessMode::ReadWrite, open_mode, Permissions::OWNER_RW, 1024)
    }

    #[test]
    fn close_twice_is_a_noop() {
        let name = unique_name("close_twice");
        let mut shm = create(&name, OpenMode::ExclusiveCreate).unwrap();
        assert!(shm.is_open());

        assert_eq!(shm.close(), Ok(()));
        assert_eq!(shm.handle(), INVALID_HANDLE);
        assert!(!shm.has_ownership());

        assert_eq!(shm.close(), Ok(()));
        assert_eq!(shm.handle(), INVALID_HANDLE);

        // closing gave up ownership, so the name must be removed by hand
        assert_eq!(SharedMemory::unlink_if_exist(&name), Ok(true));
    }

    #[test]
    fn destroy_runs_release_once() {
        let name = unique_name("destroy_once");
        let mut shm = create(&name, OpenMode::ExclusiveCreate).unwrap();

        shm.destroy();
        assert!(!shm.is_open());
        assert_eq!(
            create(&name, OpenMode::OpenExisting).unwrap_err(),
            SharedMemoryError::DoesNotExist
        );

        // a second destroy (and the eventual drop) must not touch the namespace
        let squatter = create(&name, OpenMode::ExclusiveCreate).unwrap();
        shm.destroy();
        drop(shm);
        assert!(create(&name, OpenMode::OpenExisting).is_ok());
        drop(squatter);
    }

    #[test]
    fn segment_size_on_empty_instance_is_invalid_state() {
        let name = unique_name("size_empty");
        let mut shm = create(&name, OpenMode::ExclusiveCreate).unwrap();
        // some platforms round the reported length up to a page
        assert!(shm.segment_size().unwrap() >= 1024);

        let moved = shm.take();
        assert_eq!(shm.segment_size(), Err(SharedMemoryError::InvalidState));
        assert!(moved.segment_size().unwrap() >= 1024);
    }

    #[test]
    fn take_empties_the_name() {
        let name = unique_name("take_name");
        let mut shm = create(&name, OpenMode::ExclusiveCreate).unwrap();
        let moved = shm.take();
        assert!(shm.name().is_empty());
        assert_eq!(moved.name(), &name);
    }

    #[test]
    fn oversized_request_never_reaches_the_os() {
        let name = unique_name("oversized");
        let err = SharedMemory::create(
            &name,
            AccessMode::ReadWrite,
            OpenMode::ExclusiveCreate,
            Permissions::OWNER_RW,
            u64::MAX,
        )
        .unwrap_err();
        assert_eq!(err, SharedMemoryError::RequestedMemoryExceedsMaximumFileSize);
        assert_eq!(SharedMemory::unlink_if_exist(&name), Ok(false));
    }
}

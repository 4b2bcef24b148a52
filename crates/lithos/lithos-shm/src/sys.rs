//! Thin wrappers over the libc shared memory calls.
//!
//! Each wrapper returns the raw errno on failure; classification happens in
//! the caller, which knows the segment name for logging.

use crate::Permissions;
use std::ffi::CStr;
use std::io;
use std::os::fd::RawFd;

#[inline]
fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Runs `f` until it does not fail with `EINTR`.
fn restart_on_eintr<F: FnMut() -> libc::c_int>(mut f: F) -> Result<libc::c_int, i32> {
    loop {
        let rc = f();
        if rc != -1 {
            return Ok(rc);
        }
        let errnum = last_errno();
        if errnum != libc::EINTR {
            return Err(errnum);
        }
    }
}

pub(crate) fn shm_open(name: &CStr, oflags: libc::c_int, permissions: Permissions) -> Result<RawFd, i32> {
    restart_on_eintr(|| {
        // SAFETY: name is a valid NUL-terminated string for the duration of the call.
        unsafe { raw_shm_open(name, oflags, permissions) }
    })
}

#[cfg(not(target_vendor = "apple"))]
unsafe fn raw_shm_open(name: &CStr, oflags: libc::c_int, permissions: Permissions) -> libc::c_int {
    unsafe { libc::shm_open(name.as_ptr(), oflags, permissions.bits() as libc::mode_t) }
}

// variadic on apple targets; the mode is promoted to an unsigned int
#[cfg(target_vendor = "apple")]
unsafe fn raw_shm_open(name: &CStr, oflags: libc::c_int, permissions: Permissions) -> libc::c_int {
    unsafe { libc::shm_open(name.as_ptr(), oflags, permissions.bits() as libc::c_uint) }
}

pub(crate) fn shm_unlink(name: &CStr) -> Result<(), i32> {
    // SAFETY: name is a valid NUL-terminated string for the duration of the call.
    restart_on_eintr(|| unsafe { libc::shm_unlink(name.as_ptr()) }).map(drop)
}

pub(crate) fn ftruncate(fd: RawFd, len: libc::off_t) -> Result<(), i32> {
    // SAFETY: plain syscall on an integer descriptor.
    restart_on_eintr(|| unsafe { libc::ftruncate(fd, len) }).map(drop)
}

pub(crate) fn fstat_size(fd: RawFd) -> Result<u64, i32> {
    // SAFETY: stat is plain old data; fstat fills it completely on success.
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    restart_on_eintr(|| unsafe { libc::fstat(fd, &mut st) })?;
    Ok(st.st_size as u64)
}

/// Not restarted on `EINTR`: the descriptor is released either way on Linux.
pub(crate) fn close(fd: RawFd) -> Result<(), i32> {
    // SAFETY: the caller gives up fd with this call.
    if unsafe { libc::close(fd) } == -1 {
        return Err(last_errno());
    }
    Ok(())
}

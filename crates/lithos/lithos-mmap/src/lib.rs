//! Maps shared memory segments into the address space.
//!
//! [`SegmentMapMut`] and [`SegmentMap`] map the descriptor of an open
//! [`SharedMemory`]; [`MappedSegment`] bundles a segment with its mapping
//! and is what publishers and subscribers normally hold.

mod segment;

pub use segment::MappedSegment;

use lithos_shm::{SharedMemory, SharedMemoryError};
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("shared memory holds no open descriptor")]
    InvalidHandle,

    #[error("cannot map an empty shared memory segment")]
    ZeroLength,

    #[error(transparent)]
    Shm(#[from] SharedMemoryError),

    #[error("failed to map shared memory")]
    Io(#[from] io::Error),
}

fn check_mappable(shm: &SharedMemory, len: usize) -> Result<(), MapError> {
    if !shm.is_open() {
        return Err(MapError::InvalidHandle);
    }
    if len == 0 {
        return Err(MapError::ZeroLength);
    }
    Ok(())
}

/// Shared read-write mapping of a segment.
///
/// The mapping stays valid after the `SharedMemory` it came from is closed;
/// the OS keeps the pages alive until the last mapping goes away.
pub struct SegmentMapMut {
    mmap: MmapMut,
}

/// Shared read-only mapping of a segment.
pub struct SegmentMap {
    mmap: Mmap,
}

impl SegmentMapMut {
    /// Map the first `len` bytes of `shm` to read and write.
    ///
    /// `shm` must have been opened with `AccessMode::ReadWrite`.
    pub fn map(shm: &SharedMemory, len: usize) -> Result<Self, MapError> {
        check_mappable(shm, len)?;
        // SAFETY: the segment is shared with other processes by design; callers
        // coordinate access to its contents through their own protocol.
        let mmap = unsafe { MmapOptions::new().len(len).map_mut(shm)? };
        tracing::debug!(name = %shm.name(), len, "mapped shared memory read-write");
        Ok(Self { mmap })
    }

    /// Return raw pointer to start of the mapped segment
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Synchronously flush outstanding writes of the mapping.
    pub fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }
}

impl SegmentMap {
    /// Map the first `len` bytes of `shm` read-only.
    pub fn map(shm: &SharedMemory, len: usize) -> Result<Self, MapError> {
        check_mappable(shm, len)?;
        // SAFETY: see SegmentMapMut::map; this side never writes.
        let mmap = unsafe { MmapOptions::new().len(len).map(shm)? };
        tracing::debug!(name = %shm.name(), len, "mapped shared memory read-only");
        Ok(Self { mmap })
    }

    /// Return raw pointer to start of the mapped segment
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

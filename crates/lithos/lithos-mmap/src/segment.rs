use crate::{MapError, SegmentMap, SegmentMapMut};
use lithos_shm::{AccessMode, OpenMode, Permissions, SharedMemory, SharedMemoryName};

enum Mapping {
    ReadOnly(SegmentMap),
    ReadWrite(SegmentMapMut),
}

/// A shared memory segment together with its mapping.
///
/// Mapping length is the segment's actual size, so a segment opened with
/// `OpenExisting` is mapped at the length its creator chose.
pub struct MappedSegment {
    // declared first: unmapped before the segment is closed and unlinked
    mapping: Mapping,
    shm: SharedMemory,
}

impl MappedSegment {
    /// Create or open the segment `name` and map all of it.
    ///
    /// The protection of the mapping follows `access_mode`.
    pub fn create(
        name: &SharedMemoryName,
        access_mode: AccessMode,
        open_mode: OpenMode,
        permissions: Permissions,
        size: u64,
    ) -> Result<Self, MapError> {
        let shm = SharedMemory::create(name, access_mode, open_mode, permissions, size)?;
        Self::from_shared_memory(shm, access_mode)
    }

    /// Map an already opened segment.
    ///
    /// `access_mode` must not ask for more than the descriptor was opened with.
    pub fn from_shared_memory(shm: SharedMemory, access_mode: AccessMode) -> Result<Self, MapError> {
        let len = usize::try_from(shm.segment_size()?).map_err(|_| {
            MapError::Shm(lithos_shm::SharedMemoryError::RequestedMemoryExceedsMaximumFileSize)
        })?;

        let mapping = match access_mode {
            AccessMode::ReadOnly => Mapping::ReadOnly(SegmentMap::map(&shm, len)?),
            AccessMode::ReadWrite => Mapping::ReadWrite(SegmentMapMut::map(&shm, len)?),
        };

        Ok(Self { mapping, shm })
    }

    #[inline]
    pub fn shared_memory(&self) -> &SharedMemory {
        &self.shm
    }

    #[inline]
    pub fn name(&self) -> &SharedMemoryName {
        self.shm.name()
    }

    #[inline]
    pub fn has_ownership(&self) -> bool {
        self.shm.has_ownership()
    }

    #[inline]
    pub fn base_ptr(&self) -> *const u8 {
        match &self.mapping {
            Mapping::ReadOnly(m) => m.as_ptr(),
            Mapping::ReadWrite(m) => m.as_ptr(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.mapping {
            Mapping::ReadOnly(m) => m.len(),
            Mapping::ReadWrite(m) => m.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match &self.mapping {
            Mapping::ReadOnly(m) => m.as_slice(),
            Mapping::ReadWrite(m) => m.as_slice(),
        }
    }

    /// `None` if the segment was mapped read-only.
    #[inline]
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match &mut self.mapping {
            Mapping::ReadOnly(_) => None,
            Mapping::ReadWrite(m) => Some(m.as_mut_slice()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lithos_shm::SharedMemoryError;

    fn name(tag: &str) -> SharedMemoryName {
        let s = format!("/lithos_mmap_unit_{}_{tag}", std::process::id());
        SharedMemoryName::try_from(s.as_str()).unwrap()
    }

    #[test]
    fn writer_and_reader_share_bytes() {
        let name = name("share");
        let mut writer = MappedSegment::create(
            &name,
            AccessMode::ReadWrite,
            OpenMode::ExclusiveCreate,
            Permissions::OWNER_RW,
            4096,
        )
        .unwrap();
        assert!(writer.has_ownership());
        assert!(writer.len() >= 4096);

        let bytes = writer.as_mut_slice().unwrap();
        bytes[..5].copy_from_slice(b"hello");

        let mut reader = MappedSegment::create(
            &name,
            AccessMode::ReadOnly,
            OpenMode::OpenExisting,
            Permissions::NONE,
            0,
        )
        .unwrap();
        assert!(!reader.has_ownership());
        assert_eq!(reader.len(), writer.len());
        assert_eq!(&reader.as_slice()[..5], b"hello");
        assert!(reader.as_mut_slice().is_none());
    }

    #[test]
    fn flushed_writes_are_visible_to_a_new_mapping() {
        let name = name("flush");
        let shm = SharedMemory::create(
            &name,
            AccessMode::ReadWrite,
            OpenMode::ExclusiveCreate,
            Permissions::OWNER_RW,
            4096,
        )
        .unwrap();

        let mut map = SegmentMapMut::map(&shm, 4096).unwrap();
        assert!(!map.is_empty());
        map.as_mut_slice()[..4].copy_from_slice(b"sync");
        map.flush().unwrap();

        let view = SegmentMap::map(&shm, 4096).unwrap();
        assert_eq!(view.len(), 4096);
        assert_eq!(&view.as_slice()[..4], b"sync");
    }

    #[test]
    fn fresh_segment_is_zeroed() {
        let name = name("zeroed");
        let seg = MappedSegment::create(
            &name,
            AccessMode::ReadWrite,
            OpenMode::PurgeAndCreate,
            Permissions::OWNER_RW,
            256,
        )
        .unwrap();
        assert!(seg.as_slice()[..256].iter().all(|&b| b == 0));
    }

    #[test]
    fn zero_sized_segment_cannot_be_mapped() {
        let name = name("zero");
        let err = MappedSegment::create(
            &name,
            AccessMode::ReadWrite,
            OpenMode::ExclusiveCreate,
            Permissions::OWNER_RW,
            0,
        );
        assert!(matches!(err, Err(MapError::ZeroLength)));
        // the segment was dropped with the error, taking its name with it
        assert_eq!(SharedMemory::unlink_if_exist(&name), Ok(false));
    }

    #[test]
    fn factory_errors_pass_through() {
        let name = name("absent");
        let err = MappedSegment::create(
            &name,
            AccessMode::ReadOnly,
            OpenMode::OpenExisting,
            Permissions::NONE,
            0,
        );
        assert!(matches!(err, Err(MapError::Shm(SharedMemoryError::DoesNotExist))));
    }

    #[test]
    fn emptied_segment_cannot_be_mapped() {
        let name = name("emptied");
        let mut shm = SharedMemory::create(
            &name,
            AccessMode::ReadWrite,
            OpenMode::ExclusiveCreate,
            Permissions::OWNER_RW,
            64,
        )
        .unwrap();
        let _owner = shm.take();
        assert!(matches!(SegmentMapMut::map(&shm, 64), Err(MapError::InvalidHandle)));
    }
}

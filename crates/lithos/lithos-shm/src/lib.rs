//! Named POSIX shared memory segments.
//!
//! [`SharedMemory`] owns the descriptor of one named segment and, if it
//! created the segment, the obligation to remove the name again. It can only
//! be obtained through [`SharedMemory::create`], which either returns a fully
//! opened segment or a [`SharedMemoryError`]; a failed call never leaves a
//! descriptor open or a freshly created name behind.
//!
//! ```no_run
//! use lithos_shm::{AccessMode, OpenMode, Permissions, SharedMemory, SharedMemoryName};
//!
//! let name: SharedMemoryName = "/lithos_md_bus".parse().unwrap();
//! let shm = SharedMemory::create(
//!     &name,
//!     AccessMode::ReadWrite,
//!     OpenMode::OpenOrCreate,
//!     Permissions::OWNER_RW,
//!     4096,
//! )?;
//! assert!(shm.is_open());
//! # Ok::<(), lithos_shm::SharedMemoryError>(())
//! ```

mod error;
mod handle;
mod mode;
mod name;
mod shared_memory;
mod sys;

pub use error::SharedMemoryError;
pub use handle::INVALID_HANDLE;
pub use lithos_core::BoundedStringError;
pub use mode::{AccessMode, OpenMode, Permissions, oflags_for};
pub use name::{NAME_SIZE, SharedMemoryName, validate_name};
pub use shared_memory::SharedMemory;

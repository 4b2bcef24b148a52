//! Access and open modes, permission bits, and their mapping to `shm_open` flags.

use std::fmt;
use std::ops::BitOr;

/// Protection of the descriptor returned by `shm_open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::ReadWrite => "read_write",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a segment name is reconciled with what already exists in the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum OpenMode {
    /// Create the segment; fail with `DoesExist` if the name is taken.
    ExclusiveCreate,
    /// Remove any segment with this name, then create it fresh.
    ///
    /// Remove and create are two OS calls. Another process can recreate the
    /// name in between, in which case creation fails with `DoesExist`.
    PurgeAndCreate,
    /// Create the segment if absent, otherwise open the existing one as is.
    OpenOrCreate,
    /// Open an existing segment; fail with `DoesNotExist` if absent.
    OpenExisting,
}

impl OpenMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExclusiveCreate => "exclusive_create",
            Self::PurgeAndCreate => "purge_and_create",
            Self::OpenOrCreate => "open_or_create",
            Self::OpenExisting => "open_existing",
        }
    }

    /// Whether the first `shm_open` attempt creates the segment.
    #[inline]
    pub const fn may_create(self) -> bool {
        !matches!(self, Self::OpenExisting)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// POSIX permission bits applied when a segment is created.
///
/// Only the low twelve bits (`0o7777`) are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permissions(u32);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const OWNER_READ: Self = Self(0o400);
    pub const OWNER_WRITE: Self = Self(0o200);
    pub const OWNER_RW: Self = Self(0o600);
    pub const OWNER_ALL: Self = Self(0o700);
    pub const GROUP_READ: Self = Self(0o040);
    pub const GROUP_WRITE: Self = Self(0o020);
    pub const OTHERS_READ: Self = Self(0o004);
    pub const OTHERS_WRITE: Self = Self(0o002);
    pub const ALL: Self = Self(0o777);

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & 0o7777)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::OWNER_RW
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#o}", self.0)
    }
}

/// Resolves the `oflag` argument of `shm_open`.
///
/// Every creating mode asks for `O_CREAT | O_EXCL` so the caller learns
/// whether it created the segment and therefore owns it. `OpenOrCreate`
/// falls back to the `OpenExisting` flags when the name already exists, and
/// `PurgeAndCreate` unlinks the name before this call.
pub const fn oflags_for(access_mode: AccessMode, open_mode: OpenMode) -> libc::c_int {
    let access = match access_mode {
        AccessMode::ReadOnly => libc::O_RDONLY,
        AccessMode::ReadWrite => libc::O_RDWR,
    };
    let create = match open_mode {
        OpenMode::ExclusiveCreate | OpenMode::PurgeAndCreate | OpenMode::OpenOrCreate => {
            libc::O_CREAT | libc::O_EXCL
        }
        OpenMode::OpenExisting => 0,
    };
    access | create
}

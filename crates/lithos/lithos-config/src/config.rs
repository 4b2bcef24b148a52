use lithos_shm::{
    AccessMode, BoundedStringError, OpenMode, Permissions, SharedMemory, SharedMemoryError,
    SharedMemoryName,
};
use serde::Deserialize;
use std::path::Path;

/// Shared memory segment settings, read from a TOML file.
///
/// ```toml
/// name = "/lithos_md_bus"
/// open_mode = "purge_and_create"
/// size = 1048576
/// permissions = 0o640
/// ```
#[derive(Deserialize, Debug)]
pub struct SegmentConfig {
    pub name: String,
    #[serde(default = "defaults::access_mode")]
    pub access_mode: AccessMode,
    #[serde(default = "defaults::open_mode")]
    pub open_mode: OpenMode,
    #[serde(default = "defaults::permissions")]
    pub permissions: u32,
    #[serde(default = "defaults::size")]
    pub size: u64,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid segment name")]
    Name(#[from] BoundedStringError),

    #[error("failed to open shared memory segment")]
    Shm(#[from] SharedMemoryError),
}

mod defaults {
    use lithos_shm::{AccessMode, OpenMode};

    pub fn access_mode() -> AccessMode {
        AccessMode::ReadWrite
    }

    pub fn open_mode() -> OpenMode {
        OpenMode::OpenOrCreate
    }

    pub fn permissions() -> u32 {
        0o600
    }

    pub fn size() -> u64 {
        1 << 16 // 65536
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl SegmentConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&toml_to_str)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: SegmentConfig = toml::from_str(s)?;
        // reject names that cannot be represented up front, not at create time
        config.segment_name()?;
        Ok(config)
    }

    pub fn segment_name(&self) -> Result<SharedMemoryName, BoundedStringError> {
        SharedMemoryName::try_from(self.name.as_str())
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::from_bits(self.permissions)
    }

    /// Create or open the configured segment.
    pub fn create_segment(&self) -> Result<SharedMemory, ConfigError> {
        let name = self.segment_name()?;
        Ok(SharedMemory::create(
            &name,
            self.access_mode,
            self.open_mode,
            self.permissions(),
            self.size,
        )?)
    }
}

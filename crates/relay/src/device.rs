//! Raw relay device access.

use crate::RelayError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A write-only byte sink driving the relay board. There is no read-back;
/// the board is trusted to follow.
pub trait RelayDevice {
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    fn describe(&self) -> String;
}

/// The board's character device (e.g. `/dev/ttyUSB0`), opened per write.
#[derive(Debug, Clone)]
pub struct DeviceFile {
    path: PathBuf,
}

impl DeviceFile {
    /// Wrap a path without checking it; for suppressed runs.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Wrap a path that must already exist.
    pub fn open_checked(path: impl Into<PathBuf>) -> Result<Self, RelayError> {
        let path = path.into();
        if !path.exists() {
            return Err(RelayError::DeviceMissing { path });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RelayDevice for DeviceFile {
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.write_all(bytes)?;
        file.flush()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_rejected() {
        let result = DeviceFile::open_checked("/nonexistent/ttyUSB9");
        assert!(matches!(result, Err(RelayError::DeviceMissing { .. })));
    }

    #[test]
    fn test_write_bytes_to_file() {
        let dir = std::env::temp_dir().join(format!("linkguard-relay-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ttyUSB0");
        std::fs::write(&path, b"").unwrap();

        let mut device = DeviceFile::open_checked(&path).unwrap();
        device.write_bytes(&[0x50]).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![0x50]);
        assert_eq!(device.path(), path.as_path());
    }
}

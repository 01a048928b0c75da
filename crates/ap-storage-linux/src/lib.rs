//! Linux specific storage interface.
//!
//! Disk images are regular files. Opening one takes an advisory `flock` so
//! that two builders cannot work on the same image at the same time.

use ap_storage::{Error, Offset, Read};
use std::fs::File;
use std::os::fd::AsRawFd;

mod disk_rw;
pub use disk_rw::LinuxDiskRW;

/// Why a disk image could not be opened.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OpenError {
    NotFound,
    NotRegularFile,
    /// Somebody else holds a conflicting lock on the image.
    Busy,
}

impl core::fmt::Display for OpenError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            Self::NotFound => write!(fmt, "no such file"),
            Self::NotRegularFile => write!(fmt, "not a regular file"),
            Self::Busy => write!(fmt, "image is in use"),
        }
    }
}

impl std::error::Error for OpenError {}

/// Open an image file and lock it.
///
/// Writers take an exclusive lock, readers a shared one.
fn open_image(filename: &str, write: bool) -> Result<File, Error> {
    let meta = std::fs::metadata(filename).map_err(|e| {
        let err = if e.kind() == std::io::ErrorKind::NotFound {
            Error::new(OpenError::NotFound)
        } else {
            Error::new(e)
        };
        err.context(filename.to_string())
    })?;
    if !meta.is_file() {
        return Err(Error::new(OpenError::NotRegularFile).context(filename.to_string()));
    }
    let file = File::options()
        .read(true)
        .write(write)
        .open(filename)
        .map_err(|e| Error::new(e).context(filename.to_string()))?;

    let op = if write { libc::LOCK_EX } else { libc::LOCK_SH };
    let res = unsafe { libc::flock(file.as_raw_fd(), op | libc::LOCK_NB) };
    if res == -1 {
        let e = std::io::Error::last_os_error();
        if e.raw_os_error() == Some(libc::EWOULDBLOCK) {
            return Err(Error::new(OpenError::Busy).context(filename.to_string()));
        }
        return Err(Error::new(e).context(filename.to_string()));
    }
    log::debug!("opened {filename} write={write}");
    Ok(file)
}

/// A disk backed by a file in Linux.
pub struct LinuxDisk {
    file: File,
    offset: u64,
}

impl LinuxDisk {
    /// Open a read-only disk at the given offset.
    pub fn new(filename: &str, offset: u64) -> Result<Self, Error> {
        Ok(Self {
            file: open_image(filename, false)?,
            offset,
        })
    }
}

impl Read for LinuxDisk {
    fn read_bytes(&self, offset: Offset, buf: &mut [u8]) -> Result<usize, Error> {
        let res = unsafe {
            libc::pread(
                self.file.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                (self.offset + offset) as i64,
            )
        };
        if res == -1 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(res as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ap_storage::ReadExt;
    use tempfile::NamedTempFile;

    fn kind(err: &Error) -> Option<OpenError> {
        err.downcast_ref::<OpenError>().copied()
    }

    #[test]
    fn open_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.img");
        let err = LinuxDisk::new(path.to_str().unwrap(), 0).err().unwrap();
        assert_eq!(kind(&err), Some(OpenError::NotFound), "{err:?}");
    }

    #[test]
    fn open_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = LinuxDisk::new(dir.path().to_str().unwrap(), 0).err().unwrap();
        assert_eq!(kind(&err), Some(OpenError::NotRegularFile), "{err:?}");
    }

    #[test]
    fn read_with_offset() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), [1u8, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let disk = LinuxDisk::new(file.path().to_str().unwrap(), 2).unwrap();

        let r = &disk as &dyn Read;
        let mut buf = [0u8; 3];
        r.read_exact(1, &mut buf).unwrap();
        assert_eq!(buf, [4, 5, 6]);
        assert_eq!(r.detect_size(), 6);
        assert!(r.read_exact(4, &mut buf).is_err());
    }

    #[test]
    fn shared_readers() {
        let file = NamedTempFile::new().unwrap();
        let name = file.path().to_str().unwrap();
        let _a = LinuxDisk::new(name, 0).unwrap();
        let _b = LinuxDisk::new(name, 0).unwrap();
    }
}

use super::*;
use ap_storage::Write;

/// A writeable Linux disk.
///
/// Writes go straight to the file. They are only guaranteed to be durable
/// after [`LinuxDiskRW::close`] returned.
pub struct LinuxDiskRW(LinuxDisk);

impl LinuxDiskRW {
    pub fn new(filename: &str, offset: u64) -> Result<Self, Error> {
        Ok(Self(LinuxDisk {
            file: open_image(filename, true)?,
            offset,
        }))
    }

    /// Flush all writes to the media and release the image.
    pub fn close(self) -> Result<(), Error> {
        self.0.file.sync_all()?;
        log::debug!("image synced");
        Ok(())
    }
}

impl Read for LinuxDiskRW {
    fn read_bytes(&self, offset: Offset, buf: &mut [u8]) -> Result<usize, Error> {
        self.0.read_bytes(offset, buf)
    }
}

impl Write for LinuxDiskRW {
    fn write_bytes(&self, offset: Offset, buf: &[u8]) -> Result<usize, Error> {
        let res = unsafe {
            libc::pwrite(
                self.0.file.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                (self.0.offset + offset) as i64,
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
    use ap_storage::{ReadExt, Sectors};
    use tempfile::NamedTempFile;

    #[test]
    fn write_sectors_to_file() {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(4 * 512).unwrap();
        let name = file.path().to_str().unwrap();

        let disk = LinuxDiskRW::new(name, 0).unwrap();
        assert_eq!((&disk as &dyn Read).detect_size(), 2048);
        let sectors = Sectors::new(&disk, 512).unwrap();
        sectors.write_sectors(2, &[0x5a; 512]).unwrap();
        let mut buf = [0u8; 1024];
        sectors.read_sectors(1, &mut buf).unwrap();
        assert!(buf[..512].iter().all(|&x| x == 0));
        assert!(buf[512..].iter().all(|&x| x == 0x5a));
        disk.close().unwrap();

        let data = std::fs::read(file.path()).unwrap();
        assert_eq!(data.len(), 2048);
        assert_eq!(data[1023], 0);
        assert_eq!(data[1024], 0x5a);
    }

    #[test]
    fn exclusive_writer() {
        let file = NamedTempFile::new().unwrap();
        let name = file.path().to_str().unwrap();

        let disk = LinuxDiskRW::new(name, 0).unwrap();
        let err = LinuxDiskRW::new(name, 0).err().unwrap();
        assert_eq!(err.downcast_ref::<OpenError>(), Some(&OpenError::Busy), "{err:?}");
        let err = LinuxDisk::new(name, 0).err().unwrap();
        assert_eq!(err.downcast_ref::<OpenError>(), Some(&OpenError::Busy), "{err:?}");

        // the lock is gone with the disk
        disk.close().unwrap();
        LinuxDiskRW::new(name, 0).unwrap();
    }
}

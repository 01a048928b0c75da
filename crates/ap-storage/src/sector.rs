//! Sector-addressed access to a disk.
use crate::{msg2err, Error, Offset, Read, ReadExt, Write, WriteExt};

/// A logical block address, counted in sectors from the start of the disk.
pub type Lba = u64;

/// View a byte-addressed disk as an array of fixed-size sectors.
///
/// All transfers cover whole sectors. A buffer that is not a multiple of the
/// sector size is rejected before the disk is touched.
pub struct Sectors<'a, D> {
    disk: &'a D,
    sector_size: u32,
}

impl<'a, D: Read + Write> Sectors<'a, D> {
    /// Wrap the disk. The sector size has to be a power of two.
    pub fn new(disk: &'a D, sector_size: u32) -> Result<Self, Error> {
        if !sector_size.is_power_of_two() {
            return Err(msg2err!("sector_size must be a power of two"));
        }
        Ok(Self { disk, sector_size })
    }

    /// The size of a sector in bytes.
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Byte offset of a sector.
    fn offset(&self, lba: Lba) -> Result<Offset, Error> {
        lba.checked_mul(self.sector_size as u64)
            .ok_or_else(|| msg2err!("lba out of range"))
    }

    fn check_len(&self, len: usize) -> Result<(), Error> {
        if len % self.sector_size as usize != 0 {
            return Err(msg2err!(SectorLengthError {
                len,
                sector_size: self.sector_size
            }));
        }
        Ok(())
    }

    /// Read `buf.len() / sector_size` sectors starting at `lba`.
    pub fn read_sectors(&self, lba: Lba, buf: &mut [u8]) -> Result<(), Error> {
        self.check_len(buf.len())?;
        let disk: &dyn Read = self.disk;
        disk.read_exact(self.offset(lba)?, buf)
    }

    /// Write whole sectors starting at `lba`.
    pub fn write_sectors(&self, lba: Lba, buf: &[u8]) -> Result<(), Error> {
        self.check_len(buf.len())?;
        let disk: &dyn Write = self.disk;
        disk.write_exact(self.offset(lba)?, buf)
    }
}

/// The buffer does not cover a whole number of sectors.
#[derive(Debug)]
pub struct SectorLengthError {
    pub len: usize,
    pub sector_size: u32,
}

impl core::fmt::Display for SectorLengthError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(fmt, "{} bytes are not a multiple of the {} byte sector", self.len, self.sector_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PartialReadError, PartialWriteError};
    use core::cell::RefCell;

    /// A tiny disk of 8 sectors with 512 bytes each.
    struct TestDisk(RefCell<[u8; 4096]>);

    impl Read for TestDisk {
        fn read_bytes(&self, offset: Offset, buf: &mut [u8]) -> Result<usize, Error> {
            let data = self.0.borrow();
            if offset >= data.len() as Offset {
                return Ok(0);
            }
            let ofs = offset as usize;
            let n = core::cmp::min(data.len() - ofs, buf.len());
            buf[..n].copy_from_slice(&data[ofs..ofs + n]);
            Ok(n)
        }
    }

    impl Write for TestDisk {
        fn write_bytes(&self, offset: Offset, buf: &[u8]) -> Result<usize, Error> {
            let mut data = self.0.borrow_mut();
            if offset >= data.len() as Offset {
                return Ok(0);
            }
            let ofs = offset as usize;
            let n = core::cmp::min(data.len() - ofs, buf.len());
            data[ofs..ofs + n].copy_from_slice(&buf[..n]);
            Ok(n)
        }
    }

    #[test]
    fn sector_offsets() {
        let disk = TestDisk(RefCell::new([0; 4096]));
        let sectors = Sectors::new(&disk, 512).unwrap();
        sectors.write_sectors(3, &[0xab; 512]).unwrap();
        assert_eq!(disk.0.borrow()[3 * 512 - 1], 0);
        assert_eq!(disk.0.borrow()[3 * 512], 0xab);
        assert_eq!(disk.0.borrow()[4 * 512 - 1], 0xab);
        assert_eq!(disk.0.borrow()[4 * 512], 0);

        let mut buf = [0u8; 1024];
        sectors.read_sectors(2, &mut buf).unwrap();
        assert!(buf[..512].iter().all(|&x| x == 0));
        assert!(buf[512..].iter().all(|&x| x == 0xab));
    }

    #[test]
    fn sector_partial_buffers() {
        let disk = TestDisk(RefCell::new([0; 4096]));
        let sectors = Sectors::new(&disk, 512).unwrap();
        let err = sectors.write_sectors(0, &[1; 100]).unwrap_err();
        assert!(err.downcast_ref::<SectorLengthError>().is_some(), "{err:?}");
        assert!(disk.0.borrow().iter().all(|&x| x == 0));

        let mut buf = [0u8; 513];
        assert!(sectors.read_sectors(0, &mut buf).is_err());
    }

    #[test]
    fn sector_beyond_end() {
        let disk = TestDisk(RefCell::new([0; 4096]));
        let sectors = Sectors::new(&disk, 512).unwrap();
        let err = sectors.write_sectors(8, &[1; 512]).unwrap_err();
        assert!(err.downcast_ref::<PartialWriteError>().is_some(), "{err:?}");
        let mut buf = [0u8; 512];
        let err = sectors.read_sectors(8, &mut buf).unwrap_err();
        assert!(err.downcast_ref::<PartialReadError>().is_some(), "{err:?}");
    }

    #[test]
    fn sector_size_power_of_two() {
        let disk = TestDisk(RefCell::new([0; 4096]));
        assert!(Sectors::new(&disk, 500).is_err());
        assert!(Sectors::new(&disk, 4096).is_ok());
    }
}

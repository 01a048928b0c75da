use ap_storage::{Error, Offset, Read, Write};
use core::cell::RefCell;

/// A read-write disk backed by a slice of memory.
///
/// The disk has a fixed size. Accesses beyond the end return zero bytes.
pub struct SliceDisk<'a>(RefCell<&'a mut [u8]>);

impl<'a> SliceDisk<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self(RefCell::new(data))
    }

    /// The size in bytes.
    pub fn len(&self) -> Offset {
        self.0.borrow().len() as Offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Give the slice back.
    pub fn into_inner(self) -> &'a mut [u8] {
        self.0.into_inner()
    }
}

impl Read for SliceDisk<'_> {
    fn read_bytes(&self, ofs: Offset, buf: &mut [u8]) -> Result<usize, Error> {
        let data = self.0.borrow();
        if ofs >= data.len() as Offset {
            return Ok(0);
        }
        let ofs = ofs as usize;
        let n = core::cmp::min(data.len() - ofs, buf.len());
        buf[..n].copy_from_slice(&data[ofs..ofs + n]);
        Ok(n)
    }
}

impl Write for SliceDisk<'_> {
    fn write_bytes(&self, ofs: Offset, buf: &[u8]) -> Result<usize, Error> {
        let mut data = self.0.borrow_mut();
        if ofs >= data.len() as Offset {
            return Ok(0);
        }
        let ofs = ofs as usize;
        let n = core::cmp::min(data.len() - ofs, buf.len());
        data[ofs..ofs + n].copy_from_slice(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ap_storage::{ReadExt, WriteExt};

    #[test]
    fn slice_disk_bounds() {
        let mut data = [0u8; 1024];
        let disk = SliceDisk::new(&mut data);
        assert_eq!(disk.len(), 1024);

        let w = &disk as &dyn Write;
        w.write_exact(1000, &[7; 24]).unwrap();
        assert!(w.write_exact(1020, &[7; 8]).is_err());
        assert_eq!(disk.write_bytes(1024, &[1]).unwrap(), 0);

        let r = &disk as &dyn Read;
        assert_eq!(r.detect_size(), 1024);
        let mut buf = [0u8; 4];
        r.read_exact(1020, &mut buf).unwrap();
        assert_eq!(buf, [7; 4]);
        assert_eq!(disk.read_bytes(1024, &mut buf).unwrap(), 0);

        let data = disk.into_inner();
        assert_eq!(data[999], 0);
        assert_eq!(data[1000], 7);
    }
}

//! Traits for writing.
use crate::{msg2err, Error, Offset};

/// Write to a file or disk at a certain offset.
pub trait Write {
    /// Write some byte buffer. Returning zero means the end of the disk is reached.
    fn write_bytes(&self, offset: Offset, buf: &[u8]) -> Result<usize, Error>;
}

/// Trait extension to simplify writing.
pub trait WriteExt {
    /// Write the whole buffer.
    fn write_exact(&self, offset: Offset, buf: &[u8]) -> Result<(), Error>;
}

impl WriteExt for &dyn Write {
    fn write_exact(&self, offset: Offset, buf: &[u8]) -> Result<(), Error> {
        let mut done = 0;
        while done != buf.len() {
            match self.write_bytes(offset + done as Offset, &buf[done..])? {
                0 => return Err(msg2err!(PartialWriteError)),
                n => done += n,
            }
        }
        Ok(())
    }
}

/// An exact write could only be partially done.
#[derive(Debug)]
pub struct PartialWriteError;

impl core::fmt::Display for PartialWriteError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(fmt, "{:?}", self)
    }
}

//! What the caller asks for.

use crate::error::{invalid, MbrError};
use ap_storage::Error;
use ap_storage_mbr::FsKind;
use core::str::FromStr;

/// The kind of partition table.
///
/// Only MBR tables are built. The other kinds are recognized so that they can
/// be rejected with a proper error.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum TableKind {
    #[default]
    Mbr,
    Gpt,
    Iso9660,
}

impl core::fmt::Display for TableKind {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        fmt.write_str(match self {
            Self::Mbr => "mbr",
            Self::Gpt => "gpt",
            Self::Iso9660 => "iso9660",
        })
    }
}

impl FromStr for TableKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        [Self::Mbr, Self::Gpt, Self::Iso9660]
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| invalid(None, "table", "must be one of {mbr,gpt,iso9660}"))
    }
}

/// A single partition.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PartitionRequest {
    pub size_sectors: u32,
    pub filesystem: FsKind,
    pub bootable: bool,
}

impl PartitionRequest {
    pub fn new(size_sectors: u32, filesystem: FsKind) -> Self {
        Self {
            size_sectors,
            filesystem,
            bootable: false,
        }
    }

    /// Mark the partition as the one to boot from.
    pub fn bootable(self, v: bool) -> Self {
        Self { bootable: v, ..self }
    }
}

/// The whole table to build.
///
/// The order of the partitions is the allocation order as well as the order
/// of the entries on disk.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PartitionTableRequest {
    pub kind: TableKind,
    pub sector_size: u32,
    /// Informational only.
    pub block_size: u32,
    pub total_sectors: u32,
    pub partitions: Vec<PartitionRequest>,
}

impl PartitionTableRequest {
    pub const DEFAULT_SECTOR_SIZE: u32 = 512;
    pub const DEFAULT_BLOCK_SIZE: u32 = 1024;

    /// An empty MBR table for a disk of the given size.
    pub fn new(total_sectors: u32) -> Self {
        Self {
            kind: TableKind::Mbr,
            sector_size: Self::DEFAULT_SECTOR_SIZE,
            block_size: Self::DEFAULT_BLOCK_SIZE,
            total_sectors,
            partitions: Vec::new(),
        }
    }

    pub fn kind(self, v: TableKind) -> Self {
        Self { kind: v, ..self }
    }

    /// The size of the sector in bytes. A power of two in the range {512,32768}.
    pub fn sector_size(self, v: u32) -> Result<Self, Error> {
        check_sector_size(v)?;
        Ok(Self { sector_size: v, ..self })
    }

    /// The block size in bytes. A multiple of the sector size.
    pub fn block_size(self, v: u32) -> Result<Self, Error> {
        check_block_size(v, self.sector_size)?;
        Ok(Self { block_size: v, ..self })
    }

    /// Append a partition.
    pub fn partition(mut self, v: PartitionRequest) -> Self {
        self.partitions.push(v);
        self
    }

    /// Check everything that does not depend on the layout.
    ///
    /// The aligned placement can still run out of space later.
    pub fn validate(&self) -> Result<(), Error> {
        check_sector_size(self.sector_size)?;
        check_block_size(self.block_size, self.sector_size)?;
        if self.total_sectors == 0 {
            return Err(Error::new(MbrError::OutOfRange {
                index: None,
                end: 1,
                total: 0,
            }));
        }

        let mut boot = None;
        for (i, part) in self.partitions.iter().enumerate() {
            if part.size_sectors == 0 {
                return Err(invalid(Some(i), "size", "must not be zero"));
            }
            if part.size_sectors >= self.total_sectors {
                return Err(Error::new(MbrError::OutOfRange {
                    index: Some(i),
                    end: part.size_sectors as u64 + 1,
                    total: self.total_sectors,
                }));
            }
            if part.bootable {
                if let Some(first) = boot {
                    return Err(Error::new(MbrError::MultipleBootPartitions { first, second: i }));
                }
                boot = Some(i);
            }
        }
        Ok(())
    }
}

fn check_sector_size(v: u32) -> Result<(), Error> {
    if !v.is_power_of_two() || !(512..=32768).contains(&v) {
        return Err(invalid(None, "sector_size", "must be a power of two in the range {512,32768}"));
    }
    Ok(())
}

fn check_block_size(v: u32, sector_size: u32) -> Result<(), Error> {
    if v == 0 || v % sector_size != 0 {
        return Err(invalid(None, "block_size", "must be a multiple of the sector size"));
    }
    Ok(())
}

/// A partition as given on the command line: `start,size,fs,boot`.
///
/// The start is a hint that is only checked against the disk size.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PartitionSpec {
    pub start: u32,
    pub request: PartitionRequest,
}

impl PartitionSpec {
    /// The hinted extent has to fit on the disk.
    pub fn check_range(&self, index: usize, total_sectors: u32) -> Result<(), Error> {
        let end = self.start as u64 + self.request.size_sectors as u64;
        if end > total_sectors as u64 {
            return Err(Error::new(MbrError::OutOfRange {
                index: Some(index),
                end,
                total: total_sectors,
            }));
        }
        Ok(())
    }
}

impl FromStr for PartitionSpec {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        let mut fields = s.split(',');
        let mut next = |field| fields.next().map(str::trim).ok_or_else(|| invalid(None, field, "missing"));
        let number = |v: &str, field| match v.parse::<u32>() {
            Ok(0) | Err(_) => Err(invalid(None, field, "must be a positive number")),
            Ok(n) => Ok(n),
        };

        let start = number(next("start")?, "start")?;
        let size = number(next("size")?, "size")?;
        let filesystem = next("fs")?
            .parse::<FsKind>()
            .map_err(|_| invalid(None, "fs", "must be one of {fat32,fat16,ext2}"))?;
        let bootable = match next("boot")? {
            "0" => false,
            "1" => true,
            _ => return Err(invalid(None, "boot", "must be 0 or 1")),
        };
        if fields.next().is_some() {
            return Err(invalid(None, "spec", "too many fields"));
        }
        Ok(Self {
            start,
            request: PartitionRequest::new(size, filesystem).bootable(bootable),
        })
    }
}

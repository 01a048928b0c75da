//! Lay out and write MBR partition tables.
//!
//! A [`PartitionTableRequest`] lists the partitions in the order they should
//! appear on disk. [`MakeMbr::layout`] places them on 1 MiB boundaries and
//! produces the MBR plus an EBR chain when there are more than four.
//! [`MakeMbr::write`] puts the records into their sectors.
//!
//! ```no_run
//! # use ap_storage_mbr::FsKind;
//! # use ap_storage_mbr_mkpart::*;
//! # fn run(disk: &ap_storage_memory::SliceDisk) -> Result<(), ap_storage::Error> {
//! let req = PartitionTableRequest::new(204800)
//!     .partition(PartitionRequest::new(102400, FsKind::Fat32).bootable(true))
//!     .partition(PartitionRequest::new(51200, FsKind::Ext2));
//! MakeMbr::default().build(&req, disk)
//! # }
//! ```

use ap_storage::{Error, Read, Write};
use log::warn;

mod error;
mod layout;
mod request;
mod write;

pub use error::MbrError;
pub use layout::{Container, Layout, PlacedRecord, ResolvedPartition};
pub use request::*;

/// An MBR builder.
#[derive(Debug)]
pub struct MakeMbr {
    disk_id: u32,
    align_bytes: u32,
    preserve_boot_code: bool,
}

impl Default for MakeMbr {
    fn default() -> Self {
        Self {
            disk_id: rand_disk_id(),
            align_bytes: 1 << 20,
            preserve_boot_code: true,
        }
    }
}

impl MakeMbr {
    /// The disk signature stored in the MBR.
    pub fn disk_id(self, v: u32) -> Self {
        Self { disk_id: v, ..self }
    }

    /// Partitions start at multiples of this many bytes.
    pub fn align_bytes(self, v: u32) -> Result<Self, Error> {
        if v == 0 {
            return Err(error::invalid(None, "align", "must not be zero"));
        }
        Ok(Self { align_bytes: v, ..self })
    }

    /// Keep the boot code that is already in sector zero.
    pub fn preserve_boot_code(self, v: bool) -> Self {
        Self {
            preserve_boot_code: v,
            ..self
        }
    }

    pub fn get_disk_id(&self) -> u32 {
        self.disk_id
    }

    pub fn get_align_bytes(&self) -> u32 {
        self.align_bytes
    }

    /// The alignment in sectors. 2048 for 512 byte sectors.
    pub fn align_sectors(&self, sector_size: u32) -> Result<u32, Error> {
        if self.align_bytes < sector_size || self.align_bytes % sector_size != 0 {
            return Err(error::invalid(None, "align", "must be a multiple of the sector size"));
        }
        Ok(self.align_bytes / sector_size)
    }

    /// Compute where everything goes. This does not touch any disk.
    pub fn layout(&self, req: &PartitionTableRequest) -> Result<Layout, Error> {
        if req.kind != TableKind::Mbr {
            return Err(Error::new(MbrError::UnsupportedTableKind(req.kind)));
        }
        req.validate()?;
        let align = self.align_sectors(req.sector_size)?;
        if self.disk_id == 0 {
            warn!("disk id is zero");
        }
        layout::layout(req, align, self.disk_id)
    }

    /// Write a computed layout to the disk.
    pub fn write<D: Read + Write>(&self, layout: Layout, disk: &D) -> Result<(), Error> {
        write::write_table(layout, disk, self.preserve_boot_code)
    }

    /// Lay out and write the table. Nothing is written if the layout fails.
    pub fn build<D: Read + Write>(&self, req: &PartitionTableRequest, disk: &D) -> Result<(), Error> {
        let layout = self.layout(req)?;
        self.write(layout, disk)
    }
}

/// Get a randomized non-zero disk id.
fn rand_disk_id() -> u32 {
    match rand::random::<u32>() {
        0 => 1,
        v => v,
    }
}

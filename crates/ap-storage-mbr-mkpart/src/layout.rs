//! Place the partitions on the disk.
//!
//! Up to four partitions go straight into the MBR. With more, the MBR keeps
//! three of them and its last entry points to an extended partition holding a
//! chain of EBRs, one per remaining partition. Every EBR sits in the sector
//! right in front of its partition:
//!
//! ```text
//! | MBR | .. | P0 | .. | P1 | .. | P2 | .. |EBR|P3| .. |EBR|P4| ..
//!                                 ^ extended partition start
//! ```
//!
//! Inside an EBR the partition is addressed relative to the EBR itself while
//! the link to the next EBR is relative to the start of the extended partition.
//!
//! The extended partition therefore starts at the first EBR, one sector in
//! front of the first logical partition, and spans up to the end of the last
//! one. The alignment gaps between the logical partitions are part of it, so
//! its size is larger than the sum of their sizes.

use crate::{error::MbrError, request::PartitionTableRequest};
use ap_storage::Error;
use ap_storage_mbr::{BootRecord, PartitionEntry, TYPE_EXTENDED_LBA};
use log::{debug, trace};

/// Which record holds the entry of a partition.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Container {
    Primary,
    /// Index into [`Layout::records`].
    Extended(usize),
}

/// A partition with its final place on the disk.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ResolvedPartition {
    /// Absolute sector.
    pub start_lba: u32,
    pub size_sectors: u32,
    pub type_byte: u8,
    pub active: bool,
    pub container: Container,
}

impl ResolvedPartition {
    /// The first sector behind the partition.
    pub fn end_lba(&self) -> u64 {
        self.start_lba as u64 + self.size_sectors as u64
    }
}

/// A boot record and the sector it belongs to.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PlacedRecord {
    pub lba: u32,
    pub record: BootRecord,
}

/// The result of the layout: the partitions and all records to write.
///
/// The MBR is always the first record, the EBRs follow in chain order.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Layout {
    pub sector_size: u32,
    pub align: u32,
    pub partitions: Vec<ResolvedPartition>,
    pub records: Vec<PlacedRecord>,
}

impl Layout {
    /// # Panics
    ///
    /// If the records are empty. [`crate::MakeMbr::layout`] always puts the MBR first.
    pub fn mbr(&self) -> &BootRecord {
        &self.records[0].record
    }

    pub fn ebrs(&self) -> &[PlacedRecord] {
        &self.records[1..]
    }

    pub fn disk_id(&self) -> u32 {
        self.mbr().disk_id()
    }
}

impl core::fmt::Display for Layout {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        let disk_id = self.records.first().map_or(0, |r| r.record.disk_id());
        writeln!(fmt, "disk id {disk_id:#010x}, aligned to {} sectors", self.align)?;
        writeln!(fmt, "{:>3} {:>9} {:>10} {:>10} {:>10} {:>4} boot", "nr", "record", "start", "end", "size", "type")?;
        for (i, part) in self.partitions.iter().enumerate() {
            let record = match part.container {
                Container::Primary => 0,
                Container::Extended(n) => self.records.get(n).map_or(0, |r| r.lba),
            };
            writeln!(
                fmt,
                "{i:>3} {record:>9} {:>10} {:>10} {:>10} {:>#4x} {}",
                part.start_lba,
                part.end_lba(),
                part.size_sectors,
                part.type_byte,
                if part.active { "*" } else { "" }
            )?;
        }
        Ok(())
    }
}

/// Find the start of the next extent of `size` sectors behind the cursor.
///
/// The first extent starts at the alignment. Later ones are rounded up to the
/// next multiple of it while keeping `reserve` sectors free in front of them.
/// Returns the start and the new cursor.
fn place(cursor: u64, reserve: u64, size: u32, align: u64, total: u32, index: usize) -> Result<(u64, u64), Error> {
    let start = if cursor == 0 {
        align
    } else {
        (cursor + reserve).next_multiple_of(align)
    };
    let end = start + size as u64;
    if end > total as u64 {
        return Err(Error::new(MbrError::OutOfRange {
            index: Some(index),
            end,
            total,
        }));
    }
    debug!("partition {index} at [{start:#x}, {end:#x}) cursor {cursor:#x}");
    Ok((start, end))
}

/// Compute the placement of all partitions and the records describing them.
///
/// The request has to be validated before.
pub(crate) fn layout(req: &PartitionTableRequest, align: u32, disk_id: u32) -> Result<Layout, Error> {
    let chained = req.partitions.len() > 4;
    let primary = if chained { 3 } else { req.partitions.len() };

    let mut mbr = BootRecord::default();
    mbr.set_disk_id(disk_id);
    let mut records = vec![];
    let mut partitions = Vec::with_capacity(req.partitions.len());
    let mut cursor = 0;

    for (i, part) in req.partitions.iter().enumerate() {
        let typ = part.filesystem.type_byte();
        // logical partitions need a free sector for their EBR
        let reserve = if i < primary { 0 } else { 1 };
        let (start, end) = place(cursor, reserve, part.size_sectors, align as u64, req.total_sectors, i)?;
        cursor = end;

        let container = if i < primary {
            mbr.entries[i] = PartitionEntry::new(typ, start as u32, part.size_sectors).active(part.bootable);
            Container::Primary
        } else {
            // the EBR directly precedes its partition
            let ebr_lba = start - 1;
            let mut ebr = BootRecord::default();
            ebr.entries[0] =
                PartitionEntry::new(typ, (start - ebr_lba) as u32, part.size_sectors).active(part.bootable);
            records.push(PlacedRecord {
                lba: ebr_lba as u32,
                record: ebr,
            });
            Container::Extended(records.len())
        };
        partitions.push(ResolvedPartition {
            start_lba: start as u32,
            size_sectors: part.size_sectors,
            type_byte: typ,
            active: part.bootable,
            container,
        });
    }

    if chained {
        let ext_start = records[0].lba;
        mbr.entries[3] = PartitionEntry::new(TYPE_EXTENDED_LBA, ext_start, (cursor - ext_start as u64) as u32);
        debug!("extended partition at {ext_start:#x} with {:#x} sectors", mbr.entries[3].size);

        // link every EBR to its successor
        for n in 1..records.len() {
            let next_lba = records[n].lba;
            let next_end = partitions[primary + n].end_lba();
            records[n - 1].record.entries[1] =
                PartitionEntry::new(TYPE_EXTENDED_LBA, next_lba - ext_start, (next_end - next_lba as u64) as u32);
        }
    }

    records.insert(0, PlacedRecord { lba: 0, record: mbr });
    for placed in &records {
        trace!("record at {:#x}: {:x?}", placed.lba, placed.record.entries);
    }
    Ok(Layout {
        sector_size: req.sector_size,
        align,
        partitions,
        records,
    })
}

//! Write the records of a layout to disk.

use crate::{error::MbrError, layout::Layout};
use ap_storage::{msg2err, Error, Read, Sectors, Write};
use ap_storage_mbr::{DISK_ID_OFFSET, RECORD_SIZE};
use log::debug;

/// Write every record of the layout with a single sector write each.
///
/// The MBR goes first, the EBRs follow in chain order. The first failure
/// aborts; records written before stay on disk.
///
/// With `preserve_boot_code` the boot code of sector zero survives. EBR
/// sectors are always zero apart from their entries.
///
/// A layout without the MBR in sector zero is rejected before anything is written.
pub(crate) fn write_table<D: Read + Write>(layout: Layout, disk: &D, preserve_boot_code: bool) -> Result<(), Error> {
    if layout.records.first().map(|r| r.lba) != Some(0) {
        return Err(msg2err!("layout does not start with the MBR in sector zero"));
    }
    let sectors = Sectors::new(disk, layout.sector_size)?;
    let mut buf = vec![0u8; layout.sector_size as usize];

    for (i, placed) in layout.records.into_iter().enumerate() {
        let lba = placed.lba;
        let raw = placed.record.to_bytes();
        if i == 0 && preserve_boot_code {
            sectors
                .read_sectors(lba as u64, &mut buf)
                .map_err(|e| e.context(MbrError::Io { lba }))?;
            buf[DISK_ID_OFFSET..RECORD_SIZE].copy_from_slice(&raw[DISK_ID_OFFSET..]);
        } else {
            buf.fill(0);
            buf[..RECORD_SIZE].copy_from_slice(&raw);
        }
        sectors
            .write_sectors(lba as u64, &buf)
            .map_err(|e| e.context(MbrError::Io { lba }))?;
        debug!("wrote {} at sector {lba:#x}", if i == 0 { "MBR" } else { "EBR" });
    }
    Ok(())
}

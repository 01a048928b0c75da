//! On-disk structures of MBR partition tables.
//!
//! The same 512 byte layout is used for the Master Boot Record in sector zero
//! and for every Extended Boot Record of a logical-partition chain:
//!
//! | offset  | size | content                                   |
//! |---------|------|-------------------------------------------|
//! | `0x000` | 446  | boot code, the MBR keeps its disk id at 440 |
//! | `0x1be` | 4*16 | partition entries                         |
//! | `0x1fe` | 2    | boot signature `55 aa`                    |
//!
//! All fields are encoded explicitly in little-endian byte order.
#![no_std]

// This crate contains on-disk structures that are already defined in various specifications.
// There is no need to copy-paste their docs here.
#![allow(missing_docs)]

use ap_storage::{msg2err, Error};
use core::str::FromStr;

pub const RECORD_SIZE: usize = 512;
pub const BOOT_CODE_SIZE: usize = 0x1be;
pub const DISK_ID_OFFSET: usize = 440;
pub const ENTRIES_OFFSET: usize = 0x1be;
pub const ENTRY_SIZE: usize = 16;
pub const SIGNATURE_OFFSET: usize = 0x1fe;
pub const BOOT_SIGNATURE: u16 = 0xaa55;

/// Status byte of the bootable partition.
pub const ACTIVE: u8 = 0x80;
/// CHS addressing is not used, LBA only.
pub const CHS_UNUSED: [u8; 3] = [0xff; 3];

pub const TYPE_EMPTY: u8 = 0x00;
pub const TYPE_FAT16: u8 = 0x04;
pub const TYPE_FAT32_LBA: u8 = 0x0c;
pub const TYPE_EXTENDED_LBA: u8 = 0x0f;
pub const TYPE_LINUX: u8 = 0x83;

/// The filesystems a partition can be prepared for.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FsKind {
    Fat32,
    Ext2,
    Fat16,
}

impl FsKind {
    /// The partition type code.
    pub fn type_byte(self) -> u8 {
        match self {
            Self::Fat32 => TYPE_FAT32_LBA,
            Self::Ext2 => TYPE_LINUX,
            Self::Fat16 => TYPE_FAT16,
        }
    }
}

impl FromStr for FsKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        [("fat32", Self::Fat32), ("ext2", Self::Ext2), ("fat16", Self::Fat16)]
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, kind)| kind)
            .ok_or_else(|| msg2err!("filesystem must be one of {fat32,fat16,ext2}"))
    }
}

/// A single partition entry.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct PartitionEntry {
    pub status: u8,
    pub chs_start: [u8; 3],
    pub typ: u8,
    pub chs_end: [u8; 3],
    pub lba: u32,
    pub size: u32,
}

impl PartitionEntry {
    /// An inactive LBA-only entry.
    pub fn new(typ: u8, lba: u32, size: u32) -> Self {
        Self {
            status: 0,
            chs_start: CHS_UNUSED,
            typ,
            chs_end: CHS_UNUSED,
            lba,
            size,
        }
    }

    /// Set or clear the boot flag.
    pub fn active(self, v: bool) -> Self {
        Self {
            status: if v { ACTIVE } else { 0 },
            ..self
        }
    }

    pub fn is_active(&self) -> bool {
        self.status & ACTIVE != 0
    }

    pub fn is_used(&self) -> bool {
        self.typ != TYPE_EMPTY && self.size != 0
    }

    pub fn is_extended(&self) -> bool {
        self.typ == TYPE_EXTENDED_LBA
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut res = [0u8; ENTRY_SIZE];
        res[0] = self.status;
        res[1..4].copy_from_slice(&self.chs_start);
        res[4] = self.typ;
        res[5..8].copy_from_slice(&self.chs_end);
        res[8..12].copy_from_slice(&self.lba.to_le_bytes());
        res[12..16].copy_from_slice(&self.size.to_le_bytes());
        res
    }

    pub fn from_bytes(buf: &[u8; ENTRY_SIZE]) -> Self {
        let u32_at = |ofs: usize| u32::from_le_bytes([buf[ofs], buf[ofs + 1], buf[ofs + 2], buf[ofs + 3]]);
        Self {
            status: buf[0],
            chs_start: [buf[1], buf[2], buf[3]],
            typ: buf[4],
            chs_end: [buf[5], buf[6], buf[7]],
            lba: u32_at(8),
            size: u32_at(12),
        }
    }
}

/// A Master or Extended Boot Record.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BootRecord {
    pub code: [u8; BOOT_CODE_SIZE],
    pub entries: [PartitionEntry; 4],
}

impl Default for BootRecord {
    fn default() -> Self {
        Self {
            code: [0; BOOT_CODE_SIZE],
            entries: [PartitionEntry::default(); 4],
        }
    }
}

impl BootRecord {
    /// The disk signature. Only meaningful in the MBR.
    pub fn disk_id(&self) -> u32 {
        let b = &self.code[DISK_ID_OFFSET..DISK_ID_OFFSET + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    pub fn set_disk_id(&mut self, id: u32) {
        self.code[DISK_ID_OFFSET..DISK_ID_OFFSET + 4].copy_from_slice(&id.to_le_bytes());
    }

    /// The first entry pointing to an extended partition or the next EBR.
    pub fn extended(&self) -> Option<(usize, &PartitionEntry)> {
        self.entries.iter().enumerate().find(|(_, e)| e.is_extended())
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut res = [0u8; RECORD_SIZE];
        res[..BOOT_CODE_SIZE].copy_from_slice(&self.code);
        for (i, entry) in self.entries.iter().enumerate() {
            let ofs = ENTRIES_OFFSET + i * ENTRY_SIZE;
            res[ofs..ofs + ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
        }
        res[SIGNATURE_OFFSET..].copy_from_slice(&BOOT_SIGNATURE.to_le_bytes());
        res
    }

    /// Decode a record. Fails without the boot signature.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < RECORD_SIZE {
            return Err(msg2err!("record too short"));
        }
        if buf[SIGNATURE_OFFSET..RECORD_SIZE] != BOOT_SIGNATURE.to_le_bytes() {
            return Err(msg2err!("not a boot record"));
        }
        let mut res = Self::default();
        res.code.copy_from_slice(&buf[..BOOT_CODE_SIZE]);
        for (i, entry) in res.entries.iter_mut().enumerate() {
            let ofs = ENTRIES_OFFSET + i * ENTRY_SIZE;
            let mut raw = [0u8; ENTRY_SIZE];
            raw.copy_from_slice(&buf[ofs..ofs + ENTRY_SIZE]);
            *entry = PartitionEntry::from_bytes(&raw);
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_layout() {
        let entry = PartitionEntry::new(TYPE_FAT32_LBA, 2048, 102400).active(true);
        assert_eq!(
            entry.to_bytes(),
            [0x80, 0xff, 0xff, 0xff, 0x0c, 0xff, 0xff, 0xff, 0x00, 0x08, 0x00, 0x00, 0x00, 0x90, 0x01, 0x00]
        );
        assert!(!entry.active(false).is_active());
        assert_eq!(entry.active(false).to_bytes()[0], 0);
    }

    #[test]
    fn record_layout() {
        let mut record = BootRecord::default();
        record.set_disk_id(0xdeadbeef);
        record.entries[1] = PartitionEntry::new(TYPE_LINUX, 104448, 51200);
        record.entries[3] = PartitionEntry::new(TYPE_EXTENDED_LBA, 1, 2);

        let raw = record.to_bytes();
        assert_eq!(raw[440..444], [0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(raw[444..446], [0, 0]);
        assert_eq!(raw[0x1be..0x1ce], [0; 16]);
        assert_eq!(raw[0x1ce + 4], TYPE_LINUX);
        assert_eq!(raw[0x1ee + 4], TYPE_EXTENDED_LBA);
        assert_eq!(raw[510..], [0x55, 0xaa]);

        let back = BootRecord::from_bytes(&raw).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.disk_id(), 0xdeadbeef);
        assert_eq!(back.extended().map(|(i, _)| i), Some(3));
    }

    #[test]
    fn record_without_signature() {
        let raw = [0u8; RECORD_SIZE];
        assert!(BootRecord::from_bytes(&raw).is_err());
        assert!(BootRecord::from_bytes(&raw[..100]).is_err());
    }

    #[test]
    fn fs_kind_names() {
        assert_eq!("fat32".parse::<FsKind>().unwrap(), FsKind::Fat32);
        assert_eq!("EXT2".parse::<FsKind>().unwrap(), FsKind::Ext2);
        assert_eq!("Fat16".parse::<FsKind>().unwrap(), FsKind::Fat16);
        assert!("ntfs".parse::<FsKind>().is_err());
        assert_eq!(FsKind::Fat32.type_byte(), 0x0c);
        assert_eq!(FsKind::Ext2.type_byte(), 0x83);
        assert_eq!(FsKind::Fat16.type_byte(), 0x04);
    }
}

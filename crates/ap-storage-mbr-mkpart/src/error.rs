//! Failures when building a partition table.

use crate::TableKind;

/// Why a partition table could not be built.
///
/// The variants travel inside an [`ap_storage::Error`]. Get them back with
/// `err.downcast_ref::<MbrError>()`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum MbrError {
    /// A field of the request is invalid. `index` is `None` for table-level fields.
    InvalidPartitionSpec {
        index: Option<usize>,
        field: &'static str,
        reason: &'static str,
    },
    /// More than a single partition wants to be bootable.
    MultipleBootPartitions { first: usize, second: usize },
    /// An extent ends behind the last sector of the disk.
    OutOfRange {
        index: Option<usize>,
        end: u64,
        total: u32,
    },
    UnsupportedTableKind(TableKind),
    /// Writing the record at this sector failed. The cause is the source of the error.
    Io { lba: u32 },
}

impl core::fmt::Display for MbrError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            Self::InvalidPartitionSpec {
                index: Some(index),
                field,
                reason,
            } => write!(fmt, "partition {index}: invalid {field}: {reason}"),
            Self::InvalidPartitionSpec { index: None, field, reason } => {
                write!(fmt, "invalid {field}: {reason}")
            }
            Self::MultipleBootPartitions { first, second } => {
                write!(fmt, "partitions {first} and {second} are bootable, only one is allowed")
            }
            Self::OutOfRange {
                index: Some(index),
                end,
                total,
            } => write!(fmt, "partition {index} ends at sector {end} behind the disk of {total} sectors"),
            Self::OutOfRange { index: None, end, total } => {
                write!(fmt, "table needs {end} sectors but the disk has {total}")
            }
            Self::UnsupportedTableKind(kind) => write!(fmt, "unsupported partition table {kind}"),
            Self::Io { lba } => write!(fmt, "writing the boot record at sector {lba} failed"),
        }
    }
}

impl std::error::Error for MbrError {}

/// Shorthand for a field error.
pub(crate) fn invalid(index: Option<usize>, field: &'static str, reason: &'static str) -> ap_storage::Error {
    ap_storage::Error::new(MbrError::InvalidPartitionSpec { index, field, reason })
}

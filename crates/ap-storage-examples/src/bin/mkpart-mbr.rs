//! Write an MBR partition table into a disk image.
//!
//! The image has to exist already with its final size. Partitions are given
//! in disk order as `start,size,fs,boot`:
//!
//! - `start` - a positive sector number. Only checked against the image size,
//!             the partition itself is placed on the next 1 MiB boundary.
//! - `size`  - the size in sectors.
//! - `fs`    - one of `fat32`, `fat16` or `ext2`.
//! - `boot`  - `1` for the single bootable partition, `0` otherwise.
//!
//! With more than four partitions the last primary entry becomes an extended
//! partition holding the rest.
use ap_storage::{msg2err, Error, Read, ReadExt};
use ap_storage_linux::{LinuxDisk, LinuxDiskRW};
use ap_storage_mbr_mkpart::{Layout, MakeMbr, PartitionSpec, PartitionTableRequest, TableKind};
use core::str::FromStr;
use gumdrop::Options;
use log::info;

#[derive(Debug, Options)]
struct CommandOptions {
    /// Print the help message.
    help: bool,
    /// Verbose output.
    verbose: bool,
    /// Do not write.
    dry_run: bool,
    /// The image file.
    #[options(meta = "PATH")]
    image: String,
    /// Partition table type. One of {mbr,gpt,iso9660}.
    #[options(default = "mbr")]
    table: String,
    /// Partition as start,size,fs,boot. Repeat for every partition.
    #[options(meta = "SPEC")]
    part: Vec<String>,

    /// Power of two in the range {512,32768}. Typically 512 or 4096.
    #[options(meta = "N")]
    sector_size: UnsetField<u32>,
    /// Block size in bytes. A multiple of the sector size.
    #[options(meta = "N")]
    block_size: UnsetField<u32>,
    /// Disk signature. Random by default.
    #[options(meta = "N")]
    disk_id: UnsetField<u32>,
    /// Zero the boot code instead of keeping it.
    no_preserve: bool,
}

#[derive(PartialEq, Default, Debug)]
struct UnsetField<T>(Option<T>);

impl<T> core::ops::Deref for UnsetField<T> {
    type Target = Option<T>;
    fn deref(&self) -> &Option<T> {
        &self.0
    }
}

impl<T: FromStr> FromStr for UnsetField<T> {
    type Err = T::Err;
    fn from_str(s: &str) -> Result<Self, <Self as FromStr>::Err> {
        Ok(Self(Some(T::from_str(s)?)))
    }
}

/// Size the request to the disk and lay it out.
fn plan(
    builder: &MakeMbr,
    req: PartitionTableRequest,
    specs: &[PartitionSpec],
    disk: &dyn Read,
) -> Result<Layout, Error> {
    // silently limit the usable sectors to 32-bit -> this means 2 TiB with 512 byte sectors
    let sectors = core::cmp::min(u32::MAX as u64, disk.detect_size() / req.sector_size as u64) as u32;
    let mut req = PartitionTableRequest {
        total_sectors: sectors,
        ..req
    };
    for (i, spec) in specs.iter().enumerate() {
        spec.check_range(i, sectors)?;
        req = req.partition(spec.request);
    }
    builder.layout(&req)
}

fn main() -> Result<(), Error> {
    let opts = CommandOptions::parse_args_default_or_exit();
    let level = if opts.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if opts.image.is_empty() {
        return Err(msg2err!("no image given"));
    }

    let mut req = PartitionTableRequest::new(0).kind(TableKind::from_str(&opts.table)?);
    // let the options override the parameters
    if let Some(v) = *opts.sector_size {
        req = req.sector_size(v)?;
    }
    if let Some(v) = *opts.block_size {
        req = req.block_size(v)?;
    }
    let mut builder = MakeMbr::default().preserve_boot_code(!opts.no_preserve);
    if let Some(v) = *opts.disk_id {
        builder = builder.disk_id(v);
    }

    let mut specs = vec![];
    for (i, s) in opts.part.iter().enumerate() {
        specs.push(PartitionSpec::from_str(s).map_err(|e| e.context(format!("partition {i}: {s}")))?);
    }
    if specs.is_empty() && req.kind == TableKind::Mbr {
        return Err(msg2err!("at least one partition is required"));
    }

    if opts.verbose {
        println!("{builder:#?}");
    }

    if opts.dry_run {
        let disk = LinuxDisk::new(&opts.image, 0)?;
        let layout = plan(&builder, req, &specs, &disk)?;
        println!("{layout}");
        return Ok(());
    }

    let disk = LinuxDiskRW::new(&opts.image, 0)?;
    let layout = plan(&builder, req, &specs, &disk)?;
    if opts.verbose {
        println!("{layout}");
    }
    let records = layout.records.len();
    builder.write(layout, &disk)?;
    info!("wrote {records} records to {}", opts.image);
    disk.close()
}

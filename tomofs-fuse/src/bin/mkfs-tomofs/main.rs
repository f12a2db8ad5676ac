mod cli;

use std::io;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use enumflags2::BitFlags;
use tomofs::{
    BLOCK_SIZE, CancelToken, EXTENT_BLOCK_ID, INODE_TABLE_BLOCK_ID, Permission, RESERVED_BLOCKS,
    ROOT_DIR_BLOCK_ID, SUPER_BLOCK_ID, TomoFileSystem,
};
use tomofs_fuse::{BlockFile, SystemClock};

use self::cli::Cli;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mode = BitFlags::<Permission>::from_bits(cli.mode)
        .map_err(|_| io::Error::other("invalid mode"))?;
    let device: Arc<dyn BlockDevice> = Arc::new(match cli.blocks {
        Some(blocks) => BlockFile::create(&cli.device, blocks)?,
        None => BlockFile::open(&cli.device)?,
    });

    let fs =
        TomoFileSystem::format(device.clone(), Arc::new(SystemClock)).map_err(io::Error::other)?;
    fs.unmount().map_err(io::Error::other)?;

    // mount what was written, the way a kernel would see it
    let fs = TomoFileSystem::mount_with_clock(device, Arc::new(SystemClock))
        .map_err(io::Error::other)?;

    for (region, block) in [
        ("superblock", SUPER_BLOCK_ID),
        ("free extent", EXTENT_BLOCK_ID),
        ("inode table", INODE_TABLE_BLOCK_ID),
        ("root directory", ROOT_DIR_BLOCK_ID),
        ("free pool", RESERVED_BLOCKS),
    ] {
        println!("{region:<15} {:#x}", block * BLOCK_SIZE as u64);
    }

    if let Some(source) = &cli.source {
        for (name, ino) in tomofs_fuse::populate(&fs, source, mode)? {
            println!("{name} -> inode {ino}");
        }
    }

    let stat = fs.stat_fs(&CancelToken::new()).map_err(io::Error::other)?;
    println!(
        "{} blocks, {} free, {}/{} inodes",
        stat.total_blocks, stat.free_blocks, stat.inode_count, stat.max_inodes
    );

    fs.unmount().map_err(io::Error::other)
}

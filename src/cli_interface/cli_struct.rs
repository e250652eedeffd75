use clap::Parser;
use std::path::PathBuf;

use crate::{
    config::{
        ImageConfig, DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE, DEFAULT_IMAGE_FILE_PATH,
        DEFAULT_INODE_COUNT, DEFAULT_VOLUME_NAME,
    },
    utils::time_util::Timestamp,
};

/// make a new ext2 image holding a root directory, `lost+found`,
/// one regular file and one symbolic link
#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub struct MkfsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long, default_value = DEFAULT_IMAGE_FILE_PATH)]
    pub image_file_path: String,
    /// the block size of the file system
    #[clap(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: u32,
    /// the block count of the file system
    #[clap(short = 'c', long, default_value_t = DEFAULT_BLOCK_COUNT)]
    pub block_count: u32,
    /// the inode count of the file system
    #[clap(short, long, default_value_t = DEFAULT_INODE_COUNT)]
    pub inode_count: u32,
    /// the volume name, at most 16 bytes
    #[clap(long, default_value = DEFAULT_VOLUME_NAME)]
    pub volume_name: String,
    /// seconds since the epoch stamped on every inode and the superblock,
    /// the current time when unset
    #[clap(long)]
    pub timestamp: Option<u32>,
    /// let the current user own the regular file and the symlink
    #[clap(long)]
    pub current_user: bool,
}

impl From<MkfsArgs> for ImageConfig {
    fn from(args: MkfsArgs) -> Self {
        let mut config = ImageConfig {
            image_file_path: PathBuf::from(args.image_file_path),
            block_size: args.block_size,
            block_count: args.block_count,
            inode_count: args.inode_count,
            volume_name: args.volume_name,
            timestamp: args.timestamp.map(Timestamp),
            ..Default::default()
        };
        if args.current_user {
            config.owner_uid = users::get_effective_uid();
            config.owner_gid = users::get_effective_gid();
        }
        config
    }
}

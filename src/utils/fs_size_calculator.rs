//! This module contains functions to calculate the size of differennt fs components

use crate::fs::{INODE_SIZE, SECTOR_SIZE};

/// how many inode records one block of the inode table holds
/// # Example
/// ```
/// use mkext2::utils::fs_size_calculator::inodes_per_block;
/// assert_eq!(inodes_per_block(1024), 8);
/// assert_eq!(inodes_per_block(4096), 32);
/// ```
pub const fn inodes_per_block(block_size: u32) -> u32 {
    block_size / INODE_SIZE
}

/// how many blocks or inodes a single group can describe,
/// one bit for each in a one-block bitmap
/// # Example
/// ```
/// use mkext2::utils::fs_size_calculator::units_per_group;
/// assert_eq!(units_per_group(1024), 8192);
/// ```
pub const fn units_per_group(block_size: u32) -> u32 {
    block_size * 8
}

/// calculate needed Inode Table size in blocks
/// # Arguments
/// - `inode_count`: the number of inodes
/// - `block_size`: the block size of the filesystem
/// # Example
/// ```
/// use mkext2::utils::fs_size_calculator::inode_table_blocks;
/// assert_eq!(inode_table_blocks(128, 1024), 16);
/// assert_eq!(inode_table_blocks(100, 1024), 13);
/// ```
pub const fn inode_table_blocks(inode_count: u32, block_size: u32) -> u32 {
    (inode_count as u64 * INODE_SIZE as u64).div_ceil(block_size as u64) as u32
}

/// how many blocks are needed to hold `len` bytes
/// # Example
/// ```
/// use mkext2::utils::fs_size_calculator::blocks_for;
/// assert_eq!(blocks_for(0, 1024), 0);
/// assert_eq!(blocks_for(12, 1024), 1);
/// assert_eq!(blocks_for(1025, 1024), 2);
/// ```
pub const fn blocks_for(len: u64, block_size: u32) -> u32 {
    len.div_ceil(block_size as u64) as u32
}

/// `i_blocks` counts 512-byte sectors, not filesystem blocks
/// # Example
/// ```
/// use mkext2::utils::fs_size_calculator::sectors_per_block;
/// assert_eq!(sectors_per_block(1024), 2);
/// assert_eq!(sectors_per_block(4096), 8);
/// ```
pub const fn sectors_per_block(block_size: u32) -> u32 {
    block_size / SECTOR_SIZE
}

/// calculate the image file size
/// # Example
/// ```
/// use mkext2::utils::fs_size_calculator::image_size;
/// assert_eq!(image_size(1024, 1024), 1 << 20);
/// ```
pub const fn image_size(block_count: u32, block_size: u32) -> u64 {
    block_count as u64 * block_size as u64
}

use serde::{Deserialize, Serialize};

use crate::{
    config::ImageConfig,
    utils::{fs_size_calculator, time_util::Timestamp, traits::OnDiskRecord},
};

use super::{Layout, EXT2_MAGIC, SUPERBLOCK_SIZE};

pub const EXT2_VALID_FS: u16 = 1;
pub const EXT2_ERRORS_CONTINUE: u16 = 1;
pub const EXT2_OS_LINUX: u32 = 0;
pub const EXT2_GOOD_OLD_REV: u32 = 0;

/// The superblock of a revision 0 ext2 filesystem,
/// the rest of its 1024 bytes are zero
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SuperBlock {
    pub s_inodes_count: u32,
    pub s_blocks_count: u32,
    pub s_r_blocks_count: u32,
    pub s_free_blocks_count: u32,
    pub s_free_inodes_count: u32,
    pub s_first_data_block: u32,
    /// block size is `1024 << s_log_block_size`
    pub s_log_block_size: u32,
    pub s_log_frag_size: i32,
    pub s_blocks_per_group: u32,
    pub s_frags_per_group: u32,
    pub s_inodes_per_group: u32,
    /// mount time
    pub s_mtime: u32,
    /// write time
    pub s_wtime: u32,
    pub s_mnt_count: u16,
    /// -1 disables the mount-count check
    pub s_max_mnt_count: i16,
    pub s_magic: u16,
    pub s_state: u16,
    pub s_errors: u16,
    pub s_minor_rev_level: u16,
    pub s_lastcheck: u32,
    pub s_checkinterval: u32,
    pub s_creator_os: u32,
    pub s_rev_level: u32,
    pub s_def_resuid: u16,
    pub s_def_resgid: u16,
    pub s_pad: [u32; 5],
    pub s_uuid: [u8; 16],
    pub s_volume_name: [u8; 16],
}

impl OnDiskRecord for SuperBlock {
    const SIZE: usize = SUPERBLOCK_SIZE;
}

impl SuperBlock {
    pub fn new(layout: &Layout, config: &ImageConfig, now: Timestamp) -> Self {
        let per_group = fs_size_calculator::units_per_group(layout.block_size);
        let mut volume_name = [0u8; 16];
        let name = config.volume_name.as_bytes();
        let len = name.len().min(volume_name.len());
        volume_name[..len].copy_from_slice(&name[..len]);

        SuperBlock {
            s_inodes_count: layout.inode_count,
            s_blocks_count: layout.block_count,
            s_r_blocks_count: 0,
            s_free_blocks_count: layout.free_blocks_count(),
            s_free_inodes_count: layout.free_inodes_count(),
            s_first_data_block: layout.first_data_block,
            s_log_block_size: config.log_block_size(),
            s_log_frag_size: config.log_block_size() as i32,
            s_blocks_per_group: per_group,
            s_frags_per_group: per_group,
            s_inodes_per_group: layout.inode_count,
            s_mtime: 0,
            s_wtime: now.into(),
            s_mnt_count: 0,
            s_max_mnt_count: -1,
            s_magic: EXT2_MAGIC,
            s_state: EXT2_VALID_FS,
            s_errors: EXT2_ERRORS_CONTINUE,
            s_minor_rev_level: 0,
            s_lastcheck: now.into(),
            s_checkinterval: 0,
            s_creator_os: EXT2_OS_LINUX,
            s_rev_level: EXT2_GOOD_OLD_REV,
            s_def_resuid: 0,
            s_def_resgid: 0,
            s_pad: [0; 5],
            s_uuid: config.uuid,
            s_volume_name: volume_name,
        }
    }

    pub fn block_size(&self) -> u32 {
        1024 << self.s_log_block_size
    }

    /// the volume name up to its first NUL
    pub fn volume_name(&self) -> &[u8] {
        let end = self
            .s_volume_name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.s_volume_name.len());
        &self.s_volume_name[..end]
    }
}

//! what image to build: geometry, owners and the contents of the tree
use anyhow::{anyhow, bail};
use std::path::PathBuf;

use crate::{
    fs::{
        DIRECT_POINTERS, FIRST_INODE, LOST_AND_FOUND, MAX_BLOCK_SIZE, MAX_NAME_LEN,
        MIN_BLOCK_SIZE, SUPERBLOCK_OFFSET,
    },
    utils::{fs_size_calculator, time_util::Timestamp},
};

pub const DEFAULT_IMAGE_FILE_PATH: &str = "cs111-base.img";
pub const DEFAULT_BLOCK_SIZE: u32 = 1024;
pub const DEFAULT_BLOCK_COUNT: u32 = 1024;
pub const DEFAULT_INODE_COUNT: u32 = 128;
pub const DEFAULT_VOLUME_NAME: &str = "cs111-base";
pub const DEFAULT_UUID: [u8; 16] = [
    0x5A, 0x1E, 0xAB, 0x1E, 0x13, 0x37, 0x13, 0x37, 0x13, 0x37, 0xC0, 0xFF, 0xEE, 0xC0, 0xFF,
    0xEE,
];
pub const DEFAULT_FILE_NAME: &str = "hello-world";
pub const DEFAULT_FILE_CONTENTS: &[u8] = b"Hello world\n";
pub const DEFAULT_SYMLINK_NAME: &str = "hello";
pub const DEFAULT_OWNER_ID: u32 = 1000;
/// regular files and symlinks the image creates, besides the two directories
const OBJECT_INODES: u32 = 2;

/// every knob of the image, defaults reproduce the reference image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    /// the path of the image file
    pub image_file_path: PathBuf,
    pub block_size: u32,
    pub block_count: u32,
    pub inode_count: u32,
    /// at most 16 bytes, stored without a terminator when it fills the field
    pub volume_name: String,
    pub uuid: [u8; 16],
    /// name of the regular file in the root directory
    pub file_name: String,
    pub file_contents: Vec<u8>,
    /// name of the symbolic link in the root directory
    pub symlink_name: String,
    pub symlink_target: String,
    /// owner of the regular file and the symlink, directories belong to root
    pub owner_uid: u32,
    pub owner_gid: u32,
    /// fixed build time, the wall clock is read when unset
    pub timestamp: Option<Timestamp>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        ImageConfig {
            image_file_path: PathBuf::from(DEFAULT_IMAGE_FILE_PATH),
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: DEFAULT_BLOCK_COUNT,
            inode_count: DEFAULT_INODE_COUNT,
            volume_name: DEFAULT_VOLUME_NAME.to_string(),
            uuid: DEFAULT_UUID,
            file_name: DEFAULT_FILE_NAME.to_string(),
            file_contents: DEFAULT_FILE_CONTENTS.to_vec(),
            symlink_name: DEFAULT_SYMLINK_NAME.to_string(),
            symlink_target: DEFAULT_FILE_NAME.to_string(),
            owner_uid: DEFAULT_OWNER_ID,
            owner_gid: DEFAULT_OWNER_ID,
            timestamp: None,
        }
    }
}

impl ImageConfig {
    /// `s_first_data_block`: with 1024-byte blocks the superblock lives in block 1
    pub fn first_data_block(&self) -> u32 {
        if self.block_size as u64 > SUPERBLOCK_OFFSET {
            0
        } else {
            1
        }
    }

    /// `s_log_block_size`, the block size as a shift of 1024
    pub fn log_block_size(&self) -> u32 {
        self.block_size.trailing_zeros() - MIN_BLOCK_SIZE.trailing_zeros()
    }

    /// the reserved inodes plus the objects of the tree,
    /// rounded up to whole blocks of the inode table
    fn min_inode_count(&self) -> u32 {
        let inodes_per_block = fs_size_calculator::inodes_per_block(self.block_size);
        (FIRST_INODE + OBJECT_INODES).next_multiple_of(inodes_per_block)
    }

    /// reject configurations the single-group, direct-pointer layout can't express
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.block_size.is_power_of_two()
            || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size)
        {
            bail!(
                "block size must be a power of two between {MIN_BLOCK_SIZE} and {MAX_BLOCK_SIZE}, got {}",
                self.block_size
            );
        }
        let per_group = fs_size_calculator::units_per_group(self.block_size);
        if self.block_count <= self.first_data_block()
            || self.block_count - self.first_data_block() > per_group
        {
            bail!(
                "block count {} does not fit one block group of {per_group} blocks",
                self.block_count
            );
        }
        let min_inodes = self.min_inode_count();
        if !(min_inodes..=per_group).contains(&self.inode_count) {
            bail!(
                "inode count must be between {min_inodes} and {per_group}, got {}",
                self.inode_count
            );
        }
        // readers take whole bitmap bytes and whole inode table blocks
        let inodes_per_block = fs_size_calculator::inodes_per_block(self.block_size);
        if self.inode_count % inodes_per_block != 0 {
            bail!(
                "inode count {} is not a multiple of the {inodes_per_block} inodes in a {}-byte block",
                self.inode_count,
                self.block_size
            );
        }
        if self.volume_name.len() > 16 {
            bail!("volume name {:?} is longer than 16 bytes", self.volume_name);
        }
        for name in [&self.file_name, &self.symlink_name] {
            validate_name(name)?;
        }
        if self.file_name == self.symlink_name
            || self.file_name == LOST_AND_FOUND
            || self.symlink_name == LOST_AND_FOUND
        {
            bail!(
                "{:?}, {:?} and {LOST_AND_FOUND:?} must be distinct names",
                self.file_name,
                self.symlink_name
            );
        }
        let file_blocks =
            fs_size_calculator::blocks_for(self.file_contents.len() as u64, self.block_size);
        if file_blocks as usize > DIRECT_POINTERS {
            bail!(
                "file contents of {} bytes need {file_blocks} blocks, only {DIRECT_POINTERS} direct blocks are available",
                self.file_contents.len()
            );
        }
        if self.symlink_target.is_empty() || self.symlink_target.len() > self.block_size as usize {
            bail!(
                "symlink target must be between 1 and {} bytes, got {}",
                self.block_size,
                self.symlink_target.len()
            );
        }
        for id in [self.owner_uid, self.owner_gid] {
            u16::try_from(id).map_err(|_| anyhow!("owner id {id} does not fit 16 bits"))?;
        }
        Ok(())
    }
}

/// a directory entry name: non-empty, no `/` or NUL, at most 255 bytes
pub fn validate_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        bail!("name {name:?} must be between 1 and {MAX_NAME_LEN} bytes");
    }
    if name.contains(['/', '\0']) || name == "." || name == ".." {
        bail!("{name:?} is not a valid directory entry name");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ImageConfig::default();
        config.validate().unwrap();
        assert_eq!(config.first_data_block(), 1);
        assert_eq!(config.log_block_size(), 0);
    }

    #[test]
    fn test_larger_blocks() {
        let config = ImageConfig {
            block_size: 4096,
            block_count: 256,
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.first_data_block(), 0);
        assert_eq!(config.log_block_size(), 2);
    }

    #[test]
    fn test_rejects_bad_block_size() {
        for block_size in [512, 1000, 3072, 8192, 65536, 131072] {
            let config = ImageConfig {
                block_size,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "block size {block_size}");
        }
    }

    #[test]
    fn test_rejects_more_than_one_group() {
        let config = ImageConfig {
            block_count: 8194,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        // 8192 blocks after the boot block still fit
        let config = ImageConfig {
            block_count: 8193,
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_too_few_inodes() {
        let config = ImageConfig {
            inode_count: 12,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inode_count_fills_whole_table_blocks() {
        // 13 inodes cover the tree but not a whole block of the inode table
        for inode_count in [13, 100, 130] {
            let config = ImageConfig {
                inode_count,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "inode count {inode_count}");
        }
        let config = ImageConfig {
            inode_count: 16,
            ..Default::default()
        };
        config.validate().unwrap();

        // 32 inodes fill one 4096-byte block
        let config = ImageConfig {
            block_size: 4096,
            block_count: 64,
            inode_count: 48,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("not a multiple"));
        let config = ImageConfig {
            inode_count: 32,
            ..config
        };
        config.validate().unwrap();
        assert_eq!(config.min_inode_count(), 32);
    }

    #[test]
    fn test_rejects_oversized_file() {
        let config = ImageConfig {
            file_contents: vec![b'x'; 12 * 1024 + 1],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("direct blocks"));

        let config = ImageConfig {
            file_contents: vec![b'x'; 12 * 1024],
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_names() {
        for name in ["", "a/b", ".", "..", "lost+found"] {
            let config = ImageConfig {
                file_name: name.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "name {name:?}");
        }
        let config = ImageConfig {
            symlink_name: DEFAULT_FILE_NAME.to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(validate_name(&"n".repeat(256)).is_err());
        assert!(validate_name(&"n".repeat(255)).is_ok());
    }

    #[test]
    fn test_rejects_long_volume_name_and_wide_ids() {
        let config = ImageConfig {
            volume_name: "a-volume-name-too-long".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = ImageConfig {
            owner_uid: 70000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

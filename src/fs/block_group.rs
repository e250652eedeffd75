use anyhow::anyhow;
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::{fs_size_calculator, traits::OnDiskRecord};

use super::{Layout, GROUP_DESCRIPTOR_SIZE};

/// the one entry of the block group descriptor table
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub bg_block_bitmap: u32,
    pub bg_inode_bitmap: u32,
    pub bg_inode_table: u32,
    pub bg_free_blocks_count: u16,
    pub bg_free_inodes_count: u16,
    pub bg_used_dirs_count: u16,
    pub bg_pad: u16,
    pub bg_reserved: [u32; 3],
}

impl OnDiskRecord for GroupDescriptor {
    const SIZE: usize = GROUP_DESCRIPTOR_SIZE;
}

impl GroupDescriptor {
    pub fn new(layout: &Layout) -> anyhow::Result<Self> {
        let narrow = |what: &str, count: u32| {
            u16::try_from(count)
                .map_err(|_| anyhow!("{count} {what} don't fit a group descriptor"))
        };
        Ok(GroupDescriptor {
            bg_block_bitmap: layout.block_bitmap,
            bg_inode_bitmap: layout.inode_bitmap,
            bg_inode_table: layout.inode_table,
            bg_free_blocks_count: narrow("free blocks", layout.free_blocks_count())?,
            bg_free_inodes_count: narrow("free inodes", layout.free_inodes_count())?,
            bg_used_dirs_count: narrow("directories", layout.directory_count())?,
            ..Default::default()
        })
    }
}

/// allocation bitmaps of the single block group, one block of bits each
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Group {
    /// bit `i` is block `s_first_data_block + i`
    pub block_bitmap: BitVec<u8, Lsb0>,
    /// bit `i` is inode `i + 1`
    pub inode_bitmap: BitVec<u8, Lsb0>,
    first_data_block: u32,
}

impl Group {
    /// mark every reserved block and inode as used, and every bit past the
    /// block or inode count too, so readers never see them as free
    pub fn build(layout: &Layout) -> Self {
        let bits = fs_size_calculator::units_per_group(layout.block_size) as usize;

        let mut block_bitmap = bitvec![u8, Lsb0; 0; bits];
        let tracked_blocks = (layout.block_count - layout.first_data_block) as usize;
        for (i, mut bit) in block_bitmap.iter_mut().enumerate() {
            let block = layout.first_data_block + i as u32;
            *bit = i >= tracked_blocks || layout.is_block_reserved(block);
        }

        let mut inode_bitmap = bitvec![u8, Lsb0; 0; bits];
        for (i, mut bit) in inode_bitmap.iter_mut().enumerate() {
            let inode = i as u32 + 1;
            *bit = i >= layout.inode_count as usize || layout.is_inode_reserved(inode);
        }

        Group {
            block_bitmap,
            inode_bitmap,
            first_data_block: layout.first_data_block,
        }
    }

    pub fn from_raw(block_bitmap: &[u8], inode_bitmap: &[u8], first_data_block: u32) -> Self {
        Group {
            block_bitmap: BitVec::from_slice(block_bitmap),
            inode_bitmap: BitVec::from_slice(inode_bitmap),
            first_data_block,
        }
    }
}

impl Group {
    /// check if inode is marked used
    /// # Params
    /// - `i`: inode number,start at 1
    pub fn has_inode(&self, i: u32) -> bool {
        i >= 1
            && self
                .inode_bitmap
                .get(i as usize - 1)
                .as_deref()
                .copied()
                .unwrap_or(true)
    }

    /// check if block is marked used,
    /// blocks before the group and past the bitmap count as used
    pub fn has_block(&self, block: u32) -> bool {
        block < self.first_data_block
            || self
                .block_bitmap
                .get((block - self.first_data_block) as usize)
                .as_deref()
                .copied()
                .unwrap_or(true)
    }

    /// calculate the number of free inodes
    pub fn free_inodes(&self) -> usize {
        self.inode_bitmap.count_zeros()
    }

    /// calculate the number of free data blocks
    pub fn free_blocks(&self) -> usize {
        self.block_bitmap.count_zeros()
    }

    // first free inode, start at 1
    pub fn first_free_inode(&self) -> Option<u32> {
        self.inode_bitmap.first_zero().map(|p| p as u32 + 1)
    }

    pub fn first_free_block(&self) -> Option<u32> {
        self.block_bitmap
            .first_zero()
            .map(|p| p as u32 + self.first_data_block)
    }
}

//! where every structure of the image lives
//!
//! Blocks are handed out in order, starting at `s_first_data_block`:
//! - superblock
//! - block group descriptor table
//! - block bitmap
//! - inode bitmap
//! - inode table
//! - root directory, lost+found, regular file data, slow symlink data
use anyhow::{anyhow, bail};
use byte_unit::Byte;
use log::debug;

use crate::{config::ImageConfig, utils::fs_size_calculator};

use super::{
    BAD_BLOCKS_INODE, FAST_SYMLINK_MAX_LEN, FIRST_INODE, INODE_SIZE, ROOT_INODE, SUPERBLOCK_OFFSET,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReservationKind {
    Block,
    Inode,
}

/// what a reserved block or inode is used for
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Purpose {
    Superblock,
    GroupDescriptorTable,
    BlockBitmap,
    InodeBitmap,
    InodeTable,
    /// inodes the format sets aside, like the bad blocks inode
    FormatReserved,
    RootDirectory,
    LostAndFound,
    RegularFile,
    SymbolicLink,
}

/// a run of `count` blocks or inodes starting at `first`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub kind: ReservationKind,
    pub first: u32,
    pub count: u32,
    pub purpose: Purpose,
}

impl Reservation {
    pub fn last(&self) -> u32 {
        self.first + self.count - 1
    }

    pub fn contains(&self, number: u32) -> bool {
        (self.first..=self.last()).contains(&number)
    }
}

/// block and inode numbers of everything in the image, derived from one reservation table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub block_size: u32,
    pub block_count: u32,
    pub inode_count: u32,
    pub first_data_block: u32,
    pub superblock: u32,
    pub group_descriptor_table: u32,
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
    pub inode_table_blocks: u32,
    pub root_dir_block: u32,
    pub lost_and_found_block: u32,
    /// direct blocks of the regular file, empty for an empty file
    pub file_blocks: Vec<u32>,
    /// only a symlink too long to be stored inline gets a block
    pub symlink_block: Option<u32>,
    pub root_inode: u32,
    pub lost_and_found_inode: u32,
    pub file_inode: u32,
    pub symlink_inode: u32,
    reservations: Vec<Reservation>,
}

/// hands out consecutive numbers and records every reservation
struct Planner {
    next_block: u32,
    next_inode: u32,
    reservations: Vec<Reservation>,
}

impl Planner {
    fn reserve(&mut self, kind: ReservationKind, first: u32, count: u32, purpose: Purpose) {
        if count > 0 {
            self.reservations.push(Reservation {
                kind,
                first,
                count,
                purpose,
            });
        }
    }

    fn blocks(&mut self, count: u32, purpose: Purpose) -> u32 {
        let first = self.next_block;
        self.reserve(ReservationKind::Block, first, count, purpose);
        self.next_block += count;
        first
    }

    fn inode(&mut self, purpose: Purpose) -> u32 {
        let number = self.next_inode;
        self.reserve(ReservationKind::Inode, number, 1, purpose);
        self.next_inode += 1;
        number
    }
}

impl Layout {
    /// assign every block and inode number for the given configuration
    pub fn plan(config: &ImageConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let block_size = config.block_size;
        let first_data_block = config.first_data_block();
        let mut planner = Planner {
            next_block: first_data_block,
            next_inode: FIRST_INODE,
            reservations: Vec::new(),
        };

        // inodes 1..FIRST_INODE belong to the format, the root directory among them
        planner.reserve(
            ReservationKind::Inode,
            BAD_BLOCKS_INODE,
            ROOT_INODE - BAD_BLOCKS_INODE,
            Purpose::FormatReserved,
        );
        planner.reserve(ReservationKind::Inode, ROOT_INODE, 1, Purpose::RootDirectory);
        planner.reserve(
            ReservationKind::Inode,
            ROOT_INODE + 1,
            FIRST_INODE - ROOT_INODE - 1,
            Purpose::FormatReserved,
        );
        let lost_and_found_inode = planner.inode(Purpose::LostAndFound);
        let file_inode = planner.inode(Purpose::RegularFile);
        let symlink_inode = planner.inode(Purpose::SymbolicLink);

        let superblock = planner.blocks(1, Purpose::Superblock);
        let group_descriptor_table = planner.blocks(1, Purpose::GroupDescriptorTable);
        let block_bitmap = planner.blocks(1, Purpose::BlockBitmap);
        let inode_bitmap = planner.blocks(1, Purpose::InodeBitmap);
        let inode_table_blocks =
            fs_size_calculator::inode_table_blocks(config.inode_count, block_size);
        let inode_table = planner.blocks(inode_table_blocks, Purpose::InodeTable);
        let root_dir_block = planner.blocks(1, Purpose::RootDirectory);
        let lost_and_found_block = planner.blocks(1, Purpose::LostAndFound);
        let file_block_count =
            fs_size_calculator::blocks_for(config.file_contents.len() as u64, block_size);
        let first_file_block = planner.blocks(file_block_count, Purpose::RegularFile);
        let file_blocks = (first_file_block..first_file_block + file_block_count).collect();
        let symlink_block = (config.symlink_target.len() > FAST_SYMLINK_MAX_LEN)
            .then(|| planner.blocks(1, Purpose::SymbolicLink));

        let layout = Layout {
            block_size,
            block_count: config.block_count,
            inode_count: config.inode_count,
            first_data_block,
            superblock,
            group_descriptor_table,
            block_bitmap,
            inode_bitmap,
            inode_table,
            inode_table_blocks,
            root_dir_block,
            lost_and_found_block,
            file_blocks,
            symlink_block,
            root_inode: ROOT_INODE,
            lost_and_found_inode,
            file_inode,
            symlink_inode,
            reservations: planner.reservations,
        };
        layout.check_bounds()?;
        for reservation in layout.reservations() {
            debug!("{reservation:?}");
        }
        Ok(layout)
    }

    fn check_bounds(&self) -> anyhow::Result<()> {
        let blocks_needed = self.last_reserved_block() + 1;
        if blocks_needed > self.block_count {
            bail!(
                "an image of {} blocks ({}) is too small, the layout needs {blocks_needed} blocks",
                self.block_count,
                Byte::from_bytes(self.image_size() as _).get_appropriate_unit(true),
            );
        }
        if self.last_reserved_inode() > self.inode_count {
            bail!(
                "{} inodes are not enough, the layout needs {}",
                self.inode_count,
                self.last_reserved_inode()
            );
        }
        // group descriptor counters are 16 bits wide
        for (what, free) in [
            ("blocks", self.free_blocks_count()),
            ("inodes", self.free_inodes_count()),
        ] {
            u16::try_from(free)
                .map_err(|_| anyhow!("{free} free {what} don't fit a group descriptor"))?;
        }
        Ok(())
    }
}

/// derived counts, all from the reservation table
impl Layout {
    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    fn reservations_of(&self, kind: ReservationKind) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter().filter(move |r| r.kind == kind)
    }

    pub fn last_reserved_block(&self) -> u32 {
        self.reservations_of(ReservationKind::Block)
            .map(Reservation::last)
            .max()
            .unwrap_or(self.first_data_block)
    }

    pub fn last_reserved_inode(&self) -> u32 {
        self.reservations_of(ReservationKind::Inode)
            .map(Reservation::last)
            .max()
            .unwrap_or(FIRST_INODE - 1)
    }

    pub fn free_blocks_count(&self) -> u32 {
        self.block_count - (self.last_reserved_block() + 1)
    }

    pub fn free_inodes_count(&self) -> u32 {
        self.inode_count - self.last_reserved_inode()
    }

    /// blocks in front of `s_first_data_block` are outside the group and never free
    pub fn is_block_reserved(&self, block: u32) -> bool {
        block < self.first_data_block
            || self
                .reservations_of(ReservationKind::Block)
                .any(|r| r.contains(block))
    }

    pub fn is_inode_reserved(&self, inode: u32) -> bool {
        self.reservations_of(ReservationKind::Inode)
            .any(|r| r.contains(inode))
    }

    /// `bg_used_dirs_count`
    pub fn directory_count(&self) -> u32 {
        self.reservations_of(ReservationKind::Inode)
            .filter(|r| matches!(r.purpose, Purpose::RootDirectory | Purpose::LostAndFound))
            .map(|r| r.count)
            .sum()
    }
}

/// byte offsets into the image
impl Layout {
    #[inline]
    pub fn block_offset(&self, block: u32) -> u64 {
        block as u64 * self.block_size as u64
    }

    #[inline]
    pub fn superblock_offset(&self) -> u64 {
        SUPERBLOCK_OFFSET
    }

    #[inline]
    pub fn inode_offset(&self, inode: u32) -> u64 {
        self.block_offset(self.inode_table) + (inode as u64 - 1) * INODE_SIZE as u64
    }

    #[inline]
    pub fn image_size(&self) -> u64 {
        fs_size_calculator::image_size(self.block_count, self.block_size)
    }
}

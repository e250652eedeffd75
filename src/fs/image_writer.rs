//! positioned writes of every structure into the image
use anyhow::{bail, Context};
use log::debug;
use std::io::{Seek, SeekFrom, Write};

use crate::utils::{fs_size_calculator, traits::OnDiskRecord};

use super::{Directory, Group, GroupDescriptor, Inode, Layout, SuperBlock};

/// writes records at the offsets the [Layout] assigns them
pub struct ImageWriter<'a, W> {
    w: W,
    layout: &'a Layout,
}

impl<'a, W> ImageWriter<'a, W>
where
    W: Write + Seek,
{
    pub fn new(w: W, layout: &'a Layout) -> Self {
        ImageWriter { w, layout }
    }

    pub fn into_inner(self) -> W {
        self.w
    }

    /// seek to `offset` and write all of `bytes`, a short write is an error
    fn write_at(&mut self, offset: u64, bytes: &[u8], what: &str) -> anyhow::Result<()> {
        debug!("writing {what}: {} bytes at offset {offset}", bytes.len());
        self.w
            .seek(SeekFrom::Start(offset))
            .with_context(|| format!("failed to seek to the {what} at offset {offset}"))?;
        self.w
            .write_all(bytes)
            .with_context(|| format!("failed to write the {what} at offset {offset}"))
    }

    fn write_block(&mut self, block: u32, bytes: &[u8], what: &str) -> anyhow::Result<()> {
        if block >= self.layout.block_count {
            bail!(
                "{what} block {block} is outside an image of {} blocks",
                self.layout.block_count
            );
        }
        if bytes.len() > self.layout.block_size as usize {
            bail!("{what} of {} bytes does not fit one block", bytes.len());
        }
        self.write_at(self.layout.block_offset(block), bytes, what)
    }
}

/// metadata
impl<'a, W> ImageWriter<'a, W>
where
    W: Write + Seek,
{
    pub fn save_superblock(&mut self, superblock: &SuperBlock) -> anyhow::Result<()> {
        let offset = self.layout.superblock_offset();
        self.write_at(offset, &superblock.encode()?, "superblock")
    }

    pub fn save_group_descriptor(&mut self, descriptor: &GroupDescriptor) -> anyhow::Result<()> {
        let block = self.layout.group_descriptor_table;
        self.write_block(block, &descriptor.encode()?, "group descriptor table")
    }

    pub fn save_block_bitmap(&mut self, group: &Group) -> anyhow::Result<()> {
        let block = self.layout.block_bitmap;
        self.write_block(block, group.block_bitmap.as_raw_slice(), "block bitmap")
    }

    pub fn save_inode_bitmap(&mut self, group: &Group) -> anyhow::Result<()> {
        let block = self.layout.inode_bitmap;
        self.write_block(block, group.inode_bitmap.as_raw_slice(), "inode bitmap")
    }

    /// # Params
    /// - `number`: inode number,start at 1
    pub fn save_inode(&mut self, number: u32, inode: &Inode) -> anyhow::Result<()> {
        if number == 0 || number > self.layout.inode_count {
            bail!(
                "inode {number} is outside the inode table of {} inodes",
                self.layout.inode_count
            );
        }
        for block in inode.direct_blocks() {
            if block >= self.layout.block_count {
                bail!("inode {number} points at block {block} outside the image");
            }
        }
        let offset = self.layout.inode_offset(number);
        self.write_at(offset, &inode.encode()?, &format!("inode {number}"))
    }
}

/// data blocks
impl<'a, W> ImageWriter<'a, W>
where
    W: Write + Seek,
{
    pub fn save_dir(&mut self, block: u32, dir: &Directory) -> anyhow::Result<()> {
        let packed = dir.pack(self.layout.block_size)?;
        self.write_block(block, &packed, &format!("directory block {block}"))
    }

    /// spread `data` over `blocks`, one block-sized chunk each
    pub fn write_data(&mut self, blocks: &[u32], data: &[u8]) -> anyhow::Result<()> {
        let block_size = self.layout.block_size;
        let needed = fs_size_calculator::blocks_for(data.len() as u64, block_size);
        if needed as usize != blocks.len() {
            bail!(
                "{} bytes of data need {needed} blocks, {} were planned",
                data.len(),
                blocks.len()
            );
        }
        for (block, chunk) in blocks.iter().zip(data.chunks(block_size as usize)) {
            self.write_block(*block, chunk, &format!("data block {block}"))?;
        }
        Ok(())
    }
}

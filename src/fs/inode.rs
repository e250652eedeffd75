use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::utils::{fs_size_calculator, time_util::Timestamp, traits::OnDiskRecord};

use super::{filekind::FileKind, BLOCK_POINTERS, DIRECT_POINTERS, FAST_SYMLINK_MAX_LEN, INODE_SIZE};

/// A 128-byte revision 0 inode
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Inode {
    pub i_mode: u16,
    pub i_uid: u16,
    pub i_size: u32,
    pub i_atime: u32,
    pub i_ctime: u32,
    pub i_mtime: u32,
    /// deletion time, zero while the inode is live
    pub i_dtime: u32,
    pub i_gid: u16,
    pub i_links_count: u16,
    /// counted in 512-byte sectors
    pub i_blocks: u32,
    pub i_flags: u32,
    pub i_reserved1: u32,
    /// 12 direct pointers, then the indirect slots which stay zero
    pub i_block: [u32; BLOCK_POINTERS],
    pub i_version: u32,
    pub i_file_acl: u32,
    pub i_dir_acl: u32,
    pub i_faddr: u32,
    pub i_frag: u8,
    pub i_fsize: u8,
    pub i_pad1: u16,
    pub i_reserved2: [u32; 2],
}

impl OnDiskRecord for Inode {
    const SIZE: usize = INODE_SIZE as usize;
}

/// who owns an inode
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Owner {
    pub uid: u16,
    pub gid: u16,
}

impl Inode {
    /// a live inode of `file_kind` with every timestamp set to `now`
    pub fn new(file_kind: FileKind, owner: Owner, now: Timestamp) -> Self {
        Inode {
            i_mode: file_kind.mode_bits() | file_kind.default_permissions(),
            i_uid: owner.uid,
            i_gid: owner.gid,
            i_atime: now.into(),
            i_ctime: now.into(),
            i_mtime: now.into(),
            i_dtime: 0,
            i_links_count: 1,
            ..Inode::default()
        }
    }

    /// a directory whose entries fill one block
    /// # Params
    /// - `links`: `.`, the entry in its parent and one `..` from each child directory
    pub fn directory(block: u32, block_size: u32, links: u16, now: Timestamp) -> Self {
        let mut inode = Inode::new(FileKind::Directory, Owner::default(), now);
        inode.i_size = block_size;
        inode.i_links_count = links;
        inode.i_block[0] = block;
        inode.i_blocks = fs_size_calculator::sectors_per_block(block_size);
        inode
    }

    /// a regular file of `size` bytes stored in `blocks`
    pub fn regular_file(
        blocks: &[u32],
        size: u32,
        block_size: u32,
        owner: Owner,
        now: Timestamp,
    ) -> anyhow::Result<Self> {
        if fs_size_calculator::blocks_for(size as u64, block_size) as usize != blocks.len() {
            bail!(
                "{size} bytes need {} blocks of {block_size} bytes, got {}",
                fs_size_calculator::blocks_for(size as u64, block_size),
                blocks.len()
            );
        }
        let mut inode = Inode::new(FileKind::RegularFile, owner, now);
        inode.i_size = size;
        for (index, block) in blocks.iter().enumerate() {
            inode.add_block(*block, index)?;
        }
        inode.i_blocks = blocks.len() as u32 * fs_size_calculator::sectors_per_block(block_size);
        Ok(inode)
    }

    /// a symbolic link, stored inline when `data_block` is `None`
    pub fn symlink(
        target: &[u8],
        data_block: Option<u32>,
        block_size: u32,
        owner: Owner,
        now: Timestamp,
    ) -> anyhow::Result<Self> {
        let mut inode = Inode::new(FileKind::SymbolicLink, owner, now);
        inode.i_size = target.len() as u32;
        match data_block {
            None => {
                if target.len() > FAST_SYMLINK_MAX_LEN {
                    bail!(
                        "symlink target of {} bytes is too long to store in the inode",
                        target.len()
                    );
                }
                // the target bytes take the place of the block pointers
                let mut bytes = [0u8; BLOCK_POINTERS * 4];
                bytes[..target.len()].copy_from_slice(target);
                for (pointer, chunk) in inode.i_block.iter_mut().zip(bytes.chunks_exact(4)) {
                    *pointer = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
            }
            Some(block) => {
                if target.len() > block_size as usize {
                    bail!(
                        "symlink target of {} bytes does not fit one block",
                        target.len()
                    );
                }
                inode.add_block(block, 0)?;
                inode.i_blocks = fs_size_calculator::sectors_per_block(block_size);
            }
        }
        Ok(inode)
    }
}

/// This block is about file metadata
impl Inode {
    pub fn file_kind(&self) -> Option<FileKind> {
        FileKind::from_mode(self.i_mode)
    }

    pub fn is_dir(&self) -> bool {
        self.file_kind() == Some(FileKind::Directory)
    }

    pub fn is_regular_file(&self) -> bool {
        self.file_kind() == Some(FileKind::RegularFile)
    }

    pub fn is_symlink(&self) -> bool {
        self.file_kind() == Some(FileKind::SymbolicLink)
    }

    /// a symlink with no data block keeps its target in `i_block`
    pub fn is_fast_symlink(&self) -> bool {
        self.is_symlink() && self.i_blocks == 0
    }

    /// the link target of a fast symlink
    pub fn inline_target(&self) -> Option<Vec<u8>> {
        if !self.is_fast_symlink() {
            return None;
        }
        let bytes: Vec<u8> = self.i_block.iter().flat_map(|p| p.to_le_bytes()).collect();
        Some(bytes[..self.i_size as usize].to_vec())
    }
}

/// This block is about block pointers
impl Inode {
    /// the non-zero direct pointers, empty for a fast symlink
    pub fn direct_blocks(&self) -> Vec<u32> {
        if self.is_fast_symlink() {
            return Vec::new();
        }
        self.i_block[..DIRECT_POINTERS]
            .iter()
            .filter_map(|x| if *x != 0 { Some(*x) } else { None })
            .collect()
    }

    pub fn add_block(&mut self, block: u32, index: usize) -> anyhow::Result<()> {
        if index >= DIRECT_POINTERS {
            bail!("No space in direct blocks")
        } else {
            self.i_block[index] = block;
            Ok(())
        }
    }
}

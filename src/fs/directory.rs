use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::{config::validate_name, utils::traits::OnDiskRecord};

/// the fixed part in front of every directory entry name
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirEntryHeader {
    /// zero marks an unused entry
    pub inode: u32,
    /// bytes from the start of this entry to the next one
    pub rec_len: u16,
    pub name_len: u16,
}

impl OnDiskRecord for DirEntryHeader {
    const SIZE: usize = 8;
}

/// a name bound to an inode number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u32,
    pub name: Vec<u8>,
}

impl DirEntry {
    /// room taken by an entry with a name of `name_len` bytes:
    /// the 8-byte header plus the name, rounded up to a multiple of 4
    /// # Example
    /// ```
    /// use mkext2::DirEntry;
    /// assert_eq!(DirEntry::record_len(1), 12);
    /// assert_eq!(DirEntry::record_len(4), 12);
    /// assert_eq!(DirEntry::record_len(10), 20);
    /// ```
    pub const fn record_len(name_len: usize) -> usize {
        if name_len % 4 != 0 {
            12 + name_len / 4 * 4
        } else {
            8 + name_len
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>, rec_len: usize) -> anyhow::Result<()> {
        let header = DirEntryHeader {
            inode: self.inode,
            rec_len: u16::try_from(rec_len)
                .map_err(|_| anyhow!("record length {rec_len} does not fit 16 bits"))?,
            name_len: self.name.len() as u16,
        };
        let start = buf.len();
        header.encode_into(buf)?;
        buf.extend_from_slice(&self.name);
        buf.resize(start + rec_len, 0);
        Ok(())
    }
}

/// the entries of one directory, in the order they are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    entries: Vec<DirEntry>,
}

impl Directory {
    /// a directory holding only `.` and `..`
    pub fn new(inode: u32, parent: u32) -> Self {
        Directory {
            entries: vec![
                DirEntry {
                    inode,
                    name: b".".to_vec(),
                },
                DirEntry {
                    inode: parent,
                    name: b"..".to_vec(),
                },
            ],
        }
    }

    /// append a child entry after the ones already present
    pub fn add(&mut self, name: &str, inode: u32) -> anyhow::Result<()> {
        validate_name(name)?;
        if inode == 0 {
            bail!("entry {name:?} can't point at inode 0");
        }
        if self.entry(name).is_some() {
            bail!("entry {name:?} already exists");
        }
        self.entries.push(DirEntry {
            inode,
            name: name.as_bytes().to_vec(),
        });
        Ok(())
    }

    pub fn entry(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.name == name.as_bytes())
            .map(|e| e.inode)
    }

    pub fn get_entries(&self) -> &[DirEntry] {
        &self.entries
    }

    /// serialize into exactly one block
    ///
    /// Entries are followed by an unused entry spanning the rest of the block,
    /// readers find the end of the block through its record length.
    /// When the gap is too small for an entry header, the last real entry takes it.
    pub fn pack(&self, block_size: u32) -> anyhow::Result<Vec<u8>> {
        let block_size = block_size as usize;
        let used: usize = self
            .entries
            .iter()
            .map(|e| DirEntry::record_len(e.name.len()))
            .sum();
        if used > block_size {
            bail!(
                "{} directory entries need {used} bytes, more than one {block_size}-byte block",
                self.entries.len()
            );
        }
        let remaining = block_size - used;
        let filler = remaining >= DirEntryHeader::SIZE;

        let mut buf = Vec::with_capacity(block_size);
        let last = self.entries.len() - 1;
        for (index, entry) in self.entries.iter().enumerate() {
            let mut rec_len = DirEntry::record_len(entry.name.len());
            if index == last && !filler {
                rec_len += remaining;
            }
            entry.encode_into(&mut buf, rec_len)?;
        }
        if filler {
            let unused = DirEntry {
                inode: 0,
                name: Vec::new(),
            };
            unused.encode_into(&mut buf, remaining)?;
        }
        assert_eq!(buf.len(), block_size);
        Ok(buf)
    }

    /// walk a directory block by record length
    /// # Returns
    /// every entry, including unused ones, with its header
    pub fn unpack(block: &[u8]) -> anyhow::Result<Vec<(DirEntryHeader, Vec<u8>)>> {
        let mut entries = Vec::new();
        let mut offset = 0;
        while offset < block.len() {
            let header = DirEntryHeader::decode(&block[offset..])?;
            let rec_len = header.rec_len as usize;
            let name_len = header.name_len as usize;
            if rec_len < DirEntryHeader::SIZE + name_len
                || rec_len % 4 != 0
                || offset + rec_len > block.len()
            {
                bail!("corrupt directory entry at offset {offset}: {header:?}");
            }
            let name_start = offset + DirEntryHeader::SIZE;
            entries.push((header, block[name_start..name_start + name_len].to_vec()));
            offset += rec_len;
        }
        Ok(entries)
    }
}

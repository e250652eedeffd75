//! ext2 on-disk structures and the writer that lays them into an image
pub mod block_group;
pub mod directory;
pub mod filekind;
pub mod fs_layout;
pub mod image_writer;
pub mod inode;
pub mod superblock;
pub use block_group::*;
pub use directory::*;
pub use filekind::*;
pub use fs_layout::*;
pub use image_writer::*;
pub use inode::*;
pub use superblock::*;

pub const EXT2_MAGIC: u16 = 0xEF53;
/// the superblock always starts 1024 bytes into the image, whatever the block size
pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const SUPERBLOCK_SIZE: usize = 1024;
pub const GROUP_DESCRIPTOR_SIZE: usize = 32;
/// inode record size of a revision 0 filesystem
pub const INODE_SIZE: u32 = 128;
pub const SECTOR_SIZE: u32 = 512;
pub const MIN_BLOCK_SIZE: u32 = 1024;
/// larger blocks would need more than the 65528 blocks a group may hold
pub const MAX_BLOCK_SIZE: u32 = 4096;

pub const BAD_BLOCKS_INODE: u32 = 1;
pub const ROOT_INODE: u32 = 2;
/// inodes below this number are reserved by the format
pub const FIRST_INODE: u32 = 11;

pub const DIRECT_POINTERS: usize = 12;
/// direct pointers plus the single, double and triple indirect slots
pub const BLOCK_POINTERS: usize = DIRECT_POINTERS + 3;
/// a symlink target shorter than the pointer array is stored inline
pub const FAST_SYMLINK_MAX_LEN: usize = BLOCK_POINTERS * 4 - 1;
pub const MAX_NAME_LEN: usize = 255;

pub const LOST_AND_FOUND: &str = "lost+found";

//! create our filesystem image
use crate::{
    config::ImageConfig,
    fs::{
        Directory, Group, GroupDescriptor, ImageWriter, Inode, Layout, Owner, SuperBlock,
        LOST_AND_FOUND,
    },
    image_cursor::ImageCursor,
    utils::{
        digest,
        time_util::{self, Timestamp},
    },
};
use anyhow::Context;
use byte_unit::Byte;
use log::info;
use memmap2::MmapMut;
use std::{
    fs::OpenOptions,
    io::{Seek, Write},
    path::PathBuf,
};

/// what a successful [mkfs] produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkfsReport {
    pub image_file_path: PathBuf,
    pub size: u64,
    /// blake3 of the whole image, in hex
    pub digest: String,
}

/// create a new ext2 image file, replacing any file at the configured path
/// # Params
/// - `config`: geometry and contents of the image
///
/// # Return
/// an [anyhow::Result] type to indicate whether the operation is successful.
/// On failure the file may be left partially written and must not be used.
pub fn mkfs(config: &ImageConfig) -> anyhow::Result<MkfsReport> {
    // everything that can be rejected is rejected before the file is touched
    let layout = Layout::plan(config)?;
    let now = build_time(config)?;
    let file_len = layout.image_size();

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&config.image_file_path)
        .with_context(|| format!("failed to create {}", config.image_file_path.display()))?;
    // all other region are set to zero using `set_len` method
    file.set_len(file_len)
        .with_context(|| format!("failed to resize image to {file_len} bytes"))?;
    info!(
        "created {} of {}",
        config.image_file_path.display(),
        Byte::from_bytes(file_len as _).get_appropriate_unit(true)
    );

    // Safety
    // the file was opened for read and write above and nothing else maps or resizes it
    let file_mmap_area = unsafe { MmapMut::map_mut(&file)? };
    let cursor = write_image(ImageCursor::new(file_mmap_area), &layout, config, now)?;
    let file_mmap_area = cursor.into_inner();
    file_mmap_area.flush().context("failed to flush image file")?;

    let digest = digest::digest(&file_mmap_area);
    info!("image digest {digest}");
    Ok(MkfsReport {
        image_file_path: config.image_file_path.clone(),
        size: file_len,
        digest,
    })
}

/// build the same image as [mkfs] in memory
pub fn build_image(config: &ImageConfig) -> anyhow::Result<Vec<u8>> {
    let layout = Layout::plan(config)?;
    let now = build_time(config)?;
    let image = vec![0u8; layout.image_size() as usize];
    let cursor = write_image(ImageCursor::new(image), &layout, config, now)?;
    Ok(cursor.into_inner())
}

fn build_time(config: &ImageConfig) -> anyhow::Result<Timestamp> {
    match config.timestamp {
        Some(timestamp) => Ok(timestamp),
        None => time_util::now(),
    }
}

/// write every structure of the image into `w`, which must already span the whole image
/// and read as zeros where nothing is written
pub fn write_image<W>(
    w: W,
    layout: &Layout,
    config: &ImageConfig,
    now: Timestamp,
) -> anyhow::Result<W>
where
    W: Write + Seek,
{
    let owner = Owner {
        uid: u16::try_from(config.owner_uid)?,
        gid: u16::try_from(config.owner_gid)?,
    };
    let mut writer = ImageWriter::new(w, layout);

    info!("writing superblock");
    writer.save_superblock(&SuperBlock::new(layout, config, now))?;

    info!("writing block group descriptor table");
    writer.save_group_descriptor(&GroupDescriptor::new(layout)?)?;

    let group = Group::build(layout);
    info!("writing block bitmap, {} free blocks", group.free_blocks());
    writer.save_block_bitmap(&group)?;
    info!("writing inode bitmap, {} free inodes", group.free_inodes());
    writer.save_inode_bitmap(&group)?;

    let mut root = Directory::new(layout.root_inode, layout.root_inode);
    root.add(LOST_AND_FOUND, layout.lost_and_found_inode)?;
    root.add(&config.file_name, layout.file_inode)?;
    root.add(&config.symlink_name, layout.symlink_inode)?;
    let lost_and_found = Directory::new(layout.lost_and_found_inode, layout.root_inode);

    info!("writing inode table");
    let child_directories = 1;
    let inodes = [
        (
            layout.root_inode,
            Inode::directory(
                layout.root_dir_block,
                layout.block_size,
                2 + child_directories,
                now,
            ),
        ),
        (
            layout.lost_and_found_inode,
            Inode::directory(layout.lost_and_found_block, layout.block_size, 2, now),
        ),
        (
            layout.file_inode,
            Inode::regular_file(
                &layout.file_blocks,
                config.file_contents.len() as u32,
                layout.block_size,
                owner,
                now,
            )?,
        ),
        (
            layout.symlink_inode,
            Inode::symlink(
                config.symlink_target.as_bytes(),
                layout.symlink_block,
                layout.block_size,
                owner,
                now,
            )?,
        ),
    ];
    for (number, inode) in &inodes {
        writer.save_inode(*number, inode)?;
    }

    info!("writing root directory");
    writer.save_dir(layout.root_dir_block, &root)?;
    info!("writing {LOST_AND_FOUND} directory");
    writer.save_dir(layout.lost_and_found_block, &lost_and_found)?;

    info!("writing {}", config.file_name);
    writer.write_data(&layout.file_blocks, &config.file_contents)?;
    if let Some(block) = layout.symlink_block {
        info!("writing {} target", config.symlink_name);
        writer.write_data(&[block], config.symlink_target.as_bytes())?;
    }

    let mut w = writer.into_inner();
    w.flush()?;
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::{DirEntryHeader, INODE_SIZE, SUPERBLOCK_OFFSET},
        utils::{init_test_environment::fresh_image_path, traits::OnDiskRecord},
        FileKind,
    };

    const NOW: Timestamp = Timestamp(1_700_000_000);

    fn reference_config() -> ImageConfig {
        ImageConfig {
            timestamp: Some(NOW),
            ..Default::default()
        }
    }

    fn block(image: &[u8], number: u32, block_size: u32) -> &[u8] {
        let start = number as usize * block_size as usize;
        &image[start..start + block_size as usize]
    }

    fn read_superblock(image: &[u8]) -> SuperBlock {
        SuperBlock::decode(&image[SUPERBLOCK_OFFSET as usize..]).unwrap()
    }

    fn read_group_descriptor(image: &[u8], superblock: &SuperBlock) -> GroupDescriptor {
        let block_size = superblock.block_size();
        GroupDescriptor::decode(block(image, superblock.s_first_data_block + 1, block_size))
            .unwrap()
    }

    fn read_inode(image: &[u8], number: u32) -> Inode {
        let superblock = read_superblock(image);
        let descriptor = read_group_descriptor(image, &superblock);
        let offset = descriptor.bg_inode_table as usize * superblock.block_size() as usize
            + (number as usize - 1) * INODE_SIZE as usize;
        Inode::decode(&image[offset..]).unwrap()
    }

    fn read_dir(image: &[u8], inode: &Inode) -> Vec<(DirEntryHeader, Vec<u8>)> {
        let block_size = read_superblock(image).block_size();
        Directory::unpack(block(image, inode.i_block[0], block_size)).unwrap()
    }

    #[test]
    fn test_image_size() {
        let image = build_image(&reference_config()).unwrap();
        assert_eq!(image.len(), 1024 * 1024);
        // the boot block is left empty
        assert!(image[..1024].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_superblock_and_descriptor() {
        let image = build_image(&reference_config()).unwrap();
        let superblock = read_superblock(&image);
        assert_eq!(superblock.s_magic, 0xEF53);
        assert_eq!(superblock.s_blocks_count, 1024);
        assert_eq!(superblock.s_inodes_count, 128);
        assert_eq!(superblock.s_wtime, NOW.0);

        let descriptor = read_group_descriptor(&image, &superblock);
        assert_eq!(descriptor.bg_block_bitmap, 3);
        assert_eq!(descriptor.bg_inode_bitmap, 4);
        assert_eq!(descriptor.bg_inode_table, 5);
        assert_eq!(
            descriptor.bg_free_blocks_count as u32,
            superblock.s_free_blocks_count
        );
        assert_eq!(
            descriptor.bg_free_inodes_count as u32,
            superblock.s_free_inodes_count
        );
        assert_eq!(descriptor.bg_used_dirs_count, 2);
    }

    #[test]
    fn test_root_directory_block() {
        let image = build_image(&reference_config()).unwrap();
        let root = read_inode(&image, 2);
        assert!(root.is_dir());
        assert_eq!(root.i_block[0], 21);
        assert_eq!(root.i_links_count, 3);

        let entries = read_dir(&image, &root);
        let real: Vec<_> = entries.iter().filter(|(h, _)| h.inode != 0).collect();
        assert_eq!(real.len(), 5);
        let names: Vec<String> = real
            .iter()
            .map(|(_, n)| String::from_utf8(n.clone()).unwrap())
            .collect();
        assert_eq!(names, [".", "..", "lost+found", "hello-world", "hello"]);
        let total: usize = entries.iter().map(|(h, _)| h.rec_len as usize).sum();
        assert_eq!(total, 1024);
    }

    #[test]
    fn test_lost_and_found() {
        let image = build_image(&reference_config()).unwrap();
        let inode = read_inode(&image, 11);
        assert!(inode.is_dir());
        assert_eq!(inode.i_links_count, 2);
        assert_eq!(inode.i_size, 1024);
        let entries = read_dir(&image, &inode);
        assert_eq!(entries.len(), 3);
        assert_eq!((entries[0].0.inode, entries[0].1.as_slice()), (11, &b"."[..]));
        assert_eq!((entries[1].0.inode, entries[1].1.as_slice()), (2, &b".."[..]));
        assert_eq!(entries[2].0.inode, 0);
    }

    #[test]
    fn test_regular_file() {
        let image = build_image(&reference_config()).unwrap();
        let inode = read_inode(&image, 12);
        assert!(inode.is_regular_file());
        assert_eq!(inode.i_size, 12);
        assert_eq!(inode.i_uid, 1000);
        assert_eq!(inode.i_gid, 1000);
        assert_eq!(inode.i_blocks, 2);
        assert_eq!(inode.direct_blocks(), vec![23]);
        let data = block(&image, 23, 1024);
        assert_eq!(&data[..12], b"Hello world\n");
        assert!(data[12..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_fast_symlink() {
        let image = build_image(&reference_config()).unwrap();
        let inode = read_inode(&image, 13);
        assert!(inode.is_fast_symlink());
        assert_eq!(inode.i_size, 11);
        assert_eq!(inode.i_blocks, 0);
        assert_eq!(inode.inline_target().unwrap(), b"hello-world");
    }

    #[test]
    fn test_block_bitmap_in_image() {
        let image = build_image(&reference_config()).unwrap();
        let group = Group::from_raw(block(&image, 3, 1024), block(&image, 4, 1024), 1);
        assert!((0..=23).all(|b| group.has_block(b)));
        assert!(!group.has_block(24));
        assert!((1..=13).all(|i| group.has_inode(i)));
        assert!(!group.has_inode(14));
        assert_eq!(group.free_blocks(), 1000);
        assert_eq!(group.free_inodes(), 115);
    }

    #[test]
    fn test_every_reference_resolves() {
        let image = build_image(&reference_config()).unwrap();
        let superblock = read_superblock(&image);
        let group = Group::from_raw(block(&image, 3, 1024), block(&image, 4, 1024), 1);
        let mut pending = vec![2u32];
        let mut seen = Vec::new();
        while let Some(number) = pending.pop() {
            if seen.contains(&number) {
                continue;
            }
            seen.push(number);
            assert!(number >= 1 && number <= superblock.s_inodes_count);
            assert!(group.has_inode(number), "inode {number} not marked used");
            let inode = read_inode(&image, number);
            assert_ne!(inode.i_mode, 0, "inode {number} was never written");
            for b in inode.direct_blocks() {
                assert!(b < superblock.s_blocks_count);
                assert!(group.has_block(b), "block {b} not marked used");
            }
            if inode.file_kind() == Some(FileKind::Directory) {
                for (header, _) in read_dir(&image, &inode) {
                    if header.inode != 0 {
                        pending.push(header.inode);
                    }
                }
            }
        }
        seen.sort();
        assert_eq!(seen, vec![2, 11, 12, 13]);
    }

    #[test]
    fn test_same_config_same_image() {
        let first = build_image(&reference_config()).unwrap();
        let second = build_image(&reference_config()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_larger_geometry() {
        let config = ImageConfig {
            block_size: 4096,
            block_count: 128,
            inode_count: 256,
            file_contents: vec![b'x'; 10_000],
            symlink_target: format!("{}/hello-world", "d".repeat(60)),
            ..reference_config()
        };
        let image = build_image(&config).unwrap();
        assert_eq!(image.len(), 4096 * 128);
        let superblock = read_superblock(&image);
        assert_eq!(superblock.block_size(), 4096);
        assert_eq!(superblock.s_first_data_block, 0);

        let file = read_inode(&image, 12);
        assert_eq!(file.i_size, 10_000);
        assert_eq!(file.i_blocks, 3 * 8);
        let blocks = file.direct_blocks();
        assert_eq!(blocks.len(), 3);
        let mut contents = Vec::new();
        for b in &blocks {
            contents.extend_from_slice(block(&image, *b, 4096));
        }
        assert_eq!(&contents[..10_000], config.file_contents.as_slice());

        let symlink = read_inode(&image, 13);
        assert!(!symlink.is_fast_symlink());
        let target_block = symlink.direct_blocks()[0];
        let target = &block(&image, target_block, 4096)[..symlink.i_size as usize];
        assert_eq!(target, config.symlink_target.as_bytes());
    }

    /// the smallest and largest accepted inode count for every accepted block size
    fn boundary_geometries() -> Vec<ImageConfig> {
        let mut configs = Vec::new();
        for block_size in [1024, 2048, 4096] {
            let inodes_per_block = block_size / INODE_SIZE;
            let smallest = 16u32.next_multiple_of(inodes_per_block);
            let largest = block_size * 8;
            for inode_count in [smallest, largest] {
                configs.push(ImageConfig {
                    block_size,
                    // room for a full inode table of 1024 blocks
                    block_count: 1100,
                    inode_count,
                    ..reference_config()
                });
            }
        }
        configs
    }

    #[test]
    fn test_boundary_geometries_follow_format_limits() {
        for config in boundary_geometries() {
            let image = build_image(&config).unwrap();
            let superblock = read_superblock(&image);
            let block_size = superblock.block_size();
            let inodes_per_block = block_size / INODE_SIZE;
            let geometry = format!(
                "{} blocks of {block_size} bytes, {} inodes",
                config.block_count, config.inode_count
            );

            assert_eq!(superblock.s_inodes_per_group % 8, 0, "{geometry}");
            assert_eq!(
                superblock.s_inodes_per_group % inodes_per_block,
                0,
                "{geometry}"
            );
            assert!(superblock.s_blocks_per_group <= 65528, "{geometry}");
            assert!(superblock.s_frags_per_group <= 65528, "{geometry}");
            assert!(
                superblock.s_inodes_per_group <= 65536 - inodes_per_block,
                "{geometry}"
            );
            assert!(superblock.s_blocks_per_group <= block_size * 8, "{geometry}");

            // every bit past the real inodes and blocks is set in the raw bitmap blocks
            let descriptor = read_group_descriptor(&image, &superblock);
            let inode_bitmap = block(&image, descriptor.bg_inode_bitmap, block_size);
            for bit in superblock.s_inodes_count as usize..block_size as usize * 8 {
                assert_eq!(
                    inode_bitmap[bit / 8] >> (bit % 8) & 1,
                    1,
                    "inode bit {bit}, {geometry}"
                );
            }
            let block_bitmap = block(&image, descriptor.bg_block_bitmap, block_size);
            let tracked = (superblock.s_blocks_count - superblock.s_first_data_block) as usize;
            for bit in tracked..block_size as usize * 8 {
                assert_eq!(
                    block_bitmap[bit / 8] >> (bit % 8) & 1,
                    1,
                    "block bit {bit}, {geometry}"
                );
            }

            // the reserved inodes are inside the bitmap and marked used
            for inode in 1..=13u32 {
                let bit = inode as usize - 1;
                assert_eq!(inode_bitmap[bit / 8] >> (bit % 8) & 1, 1, "{geometry}");
            }
            assert_eq!(descriptor.bg_used_dirs_count, 2, "{geometry}");
        }
    }

    #[test]
    fn test_mkfs_writes_file() {
        let image_file_path = fresh_image_path("mkext2_test_mkfs.img");
        let config = ImageConfig {
            image_file_path: image_file_path.clone(),
            ..reference_config()
        };
        let report = mkfs(&config).unwrap();
        assert_eq!(report.size, 1024 * 1024);

        let on_disk = std::fs::read(&image_file_path).unwrap();
        assert_eq!(on_disk, build_image(&config).unwrap());
        assert_eq!(report.digest, digest::digest(&on_disk));

        // running again replaces the image instead of failing
        std::fs::write(&image_file_path, vec![0xffu8; 3 * 1024 * 1024]).unwrap();
        mkfs(&config).unwrap();
        assert_eq!(std::fs::metadata(&image_file_path).unwrap().len(), 1024 * 1024);
        assert_eq!(std::fs::read(&image_file_path).unwrap(), on_disk);

        std::fs::remove_file(&image_file_path).unwrap()
    }

    #[test]
    fn test_mkfs_rejects_before_touching_file() {
        let image_file_path = fresh_image_path("mkext2_test_rejected.img");
        let config = ImageConfig {
            image_file_path: image_file_path.clone(),
            block_count: 10,
            ..reference_config()
        };
        assert!(mkfs(&config).is_err());
        assert!(!image_file_path.exists());
    }
}

use byte_unit::Byte;
use clap::Parser;
use mkext2::{cli_interface::MkfsArgs, config::ImageConfig};
/// a CLI interface to users to create a small ext2 image,
/// ready to be mounted or inspected with `debugfs` and `fsck.ext2`
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = MkfsArgs::parse();
    let config = ImageConfig::from(args);
    let report = mkext2::mkfs::mkfs(&config)?;
    println!(
        "wrote {} ({}), blake3 {}",
        report.image_file_path.display(),
        Byte::from_bytes(report.size as _).get_appropriate_unit(true),
        report.digest
    );
    Ok(())
}

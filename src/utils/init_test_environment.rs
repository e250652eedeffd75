use std::path::PathBuf;

/// a path under the system temp directory, with any leftover file from an earlier run removed
pub fn fresh_image_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    if path.exists() {
        std::fs::remove_file(&path).expect("Failed to remove old image file");
    }
    path
}

/// cacluate [blake3] hash of a built image, printed as hex
pub fn digest(image: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(image);
    hasher.finalize().to_hex().to_string()
}

use std::io::Write;

use anyhow::anyhow;
use serde::{de::DeserializeOwned, Serialize};

/// Trait for fixed-size records stored on disk
/// # Note
/// Fields are encoded in declaration order, little-endian and fixed width
/// (bincode's legacy configuration). The encoding is zero padded up to [SIZE](OnDiskRecord::SIZE).
pub trait OnDiskRecord: Serialize + DeserializeOwned {
    /// size of the record on disk, in bytes
    const SIZE: usize;

    /// serialize into a [Vec](std::vec::Vec) of exactly [SIZE](OnDiskRecord::SIZE) bytes
    fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let mut buf = vec![0u8; Self::SIZE];
        let config = bincode::config::legacy();
        let written = bincode::serde::encode_into_slice(self, &mut buf, config)?;
        assert!(
            written <= Self::SIZE,
            "record encoded to {written} bytes, more than its on-disk size {}",
            Self::SIZE
        );
        Ok(buf)
    }

    /// serialize into a writer implementing [Write](std::io::Write)
    /// # Returns
    /// The number of bytes written if successful
    fn encode_into<W>(&self, w: &mut W) -> anyhow::Result<usize>
    where
        W: Write,
    {
        let buf = self.encode()?;
        w.write_all(&buf)?;
        Ok(buf.len())
    }

    /// deserialize from the first [SIZE](OnDiskRecord::SIZE) bytes of a slice
    fn decode(buf: &[u8]) -> anyhow::Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(anyhow!(
                "need {} bytes to decode a record, got {}",
                Self::SIZE,
                buf.len()
            ));
        }
        let config = bincode::config::legacy();
        let (object, _bytes_read): (Self, usize) =
            bincode::serde::decode_from_slice(&buf[..Self::SIZE], config)?;
        Ok(object)
    }
}

//! a cursor over a fixed-size image buffer, such as a memory-mapped image file.
//! Unlike [std::io::Cursor] over a [Vec], it never grows the buffer:
//! a write running past the end fails instead of producing a short image.
use std::io::{ErrorKind, Seek, SeekFrom, Write};

/// cursor struct
#[derive(Debug, Default, Clone)]
pub struct ImageCursor<T> {
    inner: T,
    pos: u64,
}

impl<T> ImageCursor<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, pos: 0 }
    }
    /// get underlying buffer
    pub fn into_inner(self) -> T {
        self.inner
    }
    /// get read only reference to underlying buffer
    pub const fn get_ref(&self) -> &T {
        &self.inner
    }
    /// get the current position of the cursor
    pub const fn position(&self) -> u64 {
        self.pos
    }
    /// set the current position of the cursor
    ///
    /// # Examples
    ///
    /// ```
    /// use mkext2::image_cursor::ImageCursor;
    /// use std::io::Write;
    ///
    /// let mut buff = ImageCursor::new(vec![0u8; 5]);
    /// buff.set_position(2);
    /// buff.write_all(&[7, 8]).unwrap();
    /// assert_eq!(buff.position(), 4);
    /// assert_eq!(buff.into_inner(), vec![0, 0, 7, 8, 0]);
    /// ```
    pub fn set_position(&mut self, pos: u64) {
        self.pos = pos;
    }
}

impl<T> Seek for ImageCursor<T>
where
    T: AsRef<[u8]>,
{
    fn seek(&mut self, style: SeekFrom) -> std::io::Result<u64> {
        let (base_pos, offset) = match style {
            SeekFrom::Start(n) => {
                self.pos = n;
                return Ok(n);
            }
            SeekFrom::End(n) => (self.inner.as_ref().len() as u64, n),
            SeekFrom::Current(n) => (self.pos, n),
        };
        match base_pos.checked_add_signed(offset) {
            Some(n) => {
                self.pos = n;
                Ok(self.pos)
            }
            None => Err(ErrorKind::InvalidInput.into()),
        }
    }

    fn stream_position(&mut self) -> std::io::Result<u64> {
        Ok(self.pos)
    }
}

impl<T> Write for ImageCursor<T>
where
    T: AsMut<[u8]>,
{
    // Non-resizing write implementation
    #[inline]
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let inner = self.inner.as_mut();
        let pos = std::cmp::min(self.pos, inner.len() as u64) as usize;
        let n = Write::write(&mut &mut inner[pos..], buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    #[inline]
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

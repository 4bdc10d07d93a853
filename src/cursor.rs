use crate::errors::{Error, ErrorKind};
use crate::utils::{le_u16, le_u32};

/// Bounds-checked, little-endian access into a fixed byte buffer.
///
/// Every read and write validates `offset + width` against the length of the
/// buffer and reports [`ErrorKind::OutOfRange`] rather than panicking, so
/// offsets lifted straight out of an untrusted archive can be followed
/// without any additional checks.
///
/// Reads are available for anything that derefs to bytes. Writes require a
/// mutable buffer:
///
/// ```rust
/// let mut data = [0u8; 6];
/// let mut cursor = zipfix::ByteCursor::new(&mut data[..]);
/// cursor.write_u32_le(2, 0x06054b50)?;
/// assert_eq!(cursor.read_u16_le(2)?, 0x4b50);
/// assert!(cursor.read_u32_le(4).is_err());
/// # Ok::<(), zipfix::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ByteCursor<B> {
    data: B,
}

impl<B> ByteCursor<B> {
    /// Wraps a buffer
    pub fn new(data: B) -> Self {
        ByteCursor { data }
    }

    /// Returns the wrapped buffer
    pub fn into_inner(self) -> B {
        self.data
    }
}

impl<B> ByteCursor<B>
where
    B: AsRef<[u8]>,
{
    /// The number of addressable bytes
    pub fn len(&self) -> usize {
        self.data.as_ref().len()
    }

    /// Returns true when there are no addressable bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The entire underlying buffer
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Returns the bytes in `[start, end)`.
    pub fn copy_range(&self, start: usize, end: usize) -> Result<&[u8], Error> {
        let data = self.data.as_ref();
        if start > end {
            return Err(Error::out_of_range(start, 0, data.len()));
        }

        data.get(start..end)
            .ok_or_else(|| Error::out_of_range(start, end - start, data.len()))
    }

    /// Reads a little-endian `u16` at `offset`, `OutOfRange` if it runs past the end
    pub fn read_u16_le(&self, offset: usize) -> Result<u16, Error> {
        self.window(offset, 2).map(le_u16)
    }

    /// Reads a little-endian `u32` at `offset`, `OutOfRange` if it runs past the end
    pub fn read_u32_le(&self, offset: usize) -> Result<u32, Error> {
        self.window(offset, 4).map(le_u32)
    }

    /// Reads the signature at `offset` and verifies it is `expected`.
    pub fn expect_signature(&self, offset: usize, expected: u32) -> Result<(), Error> {
        let actual = self.read_u32_le(offset)?;
        if actual != expected {
            return Err(Error::from(ErrorKind::InvalidSignature {
                expected,
                actual,
                offset,
            }));
        }

        Ok(())
    }

    fn window(&self, offset: usize, width: usize) -> Result<&[u8], Error> {
        let end = offset
            .checked_add(width)
            .ok_or_else(|| Error::out_of_range(offset, width, self.len()))?;
        self.copy_range(offset, end)
    }
}

impl<B> ByteCursor<B>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Overwrites two bytes at `offset`. Fails with `OutOfRange`, leaving the
    /// buffer untouched, when they run past the end.
    pub fn write_u16_le(&mut self, offset: usize, value: u16) -> Result<(), Error> {
        self.window_mut(offset, 2)?
            .copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Overwrites four bytes at `offset`. Fails with `OutOfRange`, leaving the
    /// buffer untouched, when they run past the end.
    pub fn write_u32_le(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        self.window_mut(offset, 4)?
            .copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn window_mut(&mut self, offset: usize, width: usize) -> Result<&mut [u8], Error> {
        let len = self.len();
        let end = offset
            .checked_add(width)
            .ok_or_else(|| Error::out_of_range(offset, width, len))?;
        self.data
            .as_mut()
            .get_mut(offset..end)
            .ok_or_else(|| Error::out_of_range(offset, width, len))
    }
}
